use std::sync::Arc;
use crate::core::error::GenerationError;
use crate::core::historical::{HistoricalComparator, HistoricalParallel, HistoricalQuery};
use crate::core::lexicon;
use crate::core::llm::{self, CompletionClient, CompletionRequest};
use crate::core::models::{
    read_time_minutes, ArticleStyle, ContentCategory, GeneratedContent, GenerationRequest,
};

pub const MIN_TOPIC_CHARS: usize = 5;
pub const MAX_TOPIC_CHARS: usize = 500;
pub const MAX_CUSTOM_PROMPT_CHARS: usize = 10_000;
pub const DEFAULT_SHORT_SECONDS: u32 = 60;

/// Similarity above which a near-miss category name is snapped to the
/// whitelisted spelling.
const CATEGORY_SIMILARITY: f64 = 0.85;

/// Article fields as parsed from the model, before local derivations.
#[derive(Debug, Clone, Default, PartialEq)]
struct ArticleDraft {
    title: String,
    content: String,
    summary: String,
    tags: Vec<String>,
    category: Option<String>,
    key_points: Vec<String>,
    sources: Vec<String>,
}

pub struct ContentGenerator {
    llm: Arc<dyn CompletionClient>,
    historian: Arc<HistoricalComparator>,
    language: String,
}

impl ContentGenerator {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        historian: Arc<HistoricalComparator>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            historian,
            language: language.into(),
        }
    }

    /// Completion-service reachability, used by the facade's health probe.
    pub async fn probe(&self) -> bool {
        match self.llm.health_check().await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Completion service health check failed: {}", e);
                false
            }
        }
    }

    /// Generates one article. Fails only when the request is invalid or the
    /// model gives back nothing usable; historical enrichment is best-effort.
    pub async fn generate_article(&self, request: &GenerationRequest) -> Result<GeneratedContent, GenerationError> {
        let (article, _) = self.generate_enriched(request).await?;
        Ok(article)
    }

    /// Same as [`generate_article`](Self::generate_article), also handing back
    /// the enrichment search so callers can build on it without searching
    /// the topic again.
    pub async fn generate_enriched(
        &self,
        request: &GenerationRequest,
    ) -> Result<(GeneratedContent, anyhow::Result<Vec<HistoricalParallel>>), GenerationError> {
        validate(request)?;

        let prompt = self.build_article_prompt(request);
        let completion = CompletionRequest::new(prompt)
            .system(system_prompt(request.style))
            .temperature(0.3)
            .max_tokens(request.length.max_tokens());

        log::info!(
            "Generating {:?}/{:?} article on '{}'",
            request.style, request.length, request.topic.trim()
        );

        let response = self
            .llm
            .complete(completion)
            .await
            .map_err(GenerationError::Completion)?;

        if response.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        let draft = match parse_article(&response) {
            Some(draft) => draft,
            None => {
                log::warn!("Article response was not a valid JSON envelope; salvaging from raw text");
                salvage_article(&response).ok_or(GenerationError::Unsalvageable)?
            }
        };

        let sources = if request.include_sources {
            let mut sources = draft.sources.clone();
            if let Some(url) = &request.source_url {
                if !sources.contains(url) {
                    sources.insert(0, url.clone());
                }
            }
            Some(sources)
        } else {
            None
        };

        let search = self
            .historian
            .find_parallels(&HistoricalQuery::new(request.topic.trim()))
            .await;
        let parallels = match &search {
            Ok(found) => found.iter().map(|p| p.to_comparison()).collect(),
            Err(e) => {
                log::warn!("Historical enrichment failed for '{}': {:#}", request.topic.trim(), e);
                Vec::new()
            }
        };

        let article = GeneratedContent {
            read_time: read_time_minutes(&draft.content),
            bias_score: provisional_bias_score(&draft.content),
            category: normalize_category(draft.category.as_deref()),
            title: draft.title,
            content: draft.content,
            summary: draft.summary,
            tags: draft.tags,
            key_points: draft.key_points,
            sources,
            historical_parallels: Some(parallels),
            generated_at: chrono::Utc::now(),
        };

        Ok((article, search))
    }

    /// Narration script for a short vertical video, segmented with `[M:SS]`
    /// markers.
    pub async fn generate_short_script(
        &self,
        article: &GeneratedContent,
        duration_secs: u32,
    ) -> Result<String, GenerationError> {
        if !(15..=180).contains(&duration_secs) {
            return Err(GenerationError::InvalidRequest(format!(
                "short duration must be between 15 and 180 seconds, got {}",
                duration_secs
            )));
        }

        let key_points = if article.key_points.is_empty() {
            String::new()
        } else {
            format!("Key points:\n- {}\n", article.key_points.join("\n- "))
        };

        let prompt = format!(
            "Turn this article into a narration script for a {}-second vertical video.\n\n\
            Title: {}\nSummary: {}\n{}\n\
            Rules:\n\
            1. Start every segment with a timestamp marker like [0:00], [0:15], [0:30].\n\
            2. The first segment starts at [0:00]; one segment every 10 to 15 seconds.\n\
            3. Spoken text only: no stage directions, no emojis, no markdown.\n\
            4. Stay neutral and factual.\n\
            5. Write in {}.",
            duration_secs, article.title, article.summary, key_points, self.language
        );

        let response = self
            .llm
            .complete(CompletionRequest::new(prompt).temperature(0.6).max_tokens(800))
            .await
            .map_err(GenerationError::Completion)?;

        let script = response.trim().trim_matches('`').trim().to_string();
        if script.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(script)
    }

    /// Free-form completion.
    pub async fn generate_custom(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GenerationError::InvalidRequest("prompt cannot be empty".to_string()));
        }
        if prompt.chars().count() > MAX_CUSTOM_PROMPT_CHARS {
            return Err(GenerationError::InvalidRequest(format!(
                "prompt exceeds {} characters",
                MAX_CUSTOM_PROMPT_CHARS
            )));
        }

        let mut request = CompletionRequest::new(prompt)
            .temperature(temperature.clamp(0.0, 2.0))
            .max_tokens(max_tokens);
        if let Some(system) = system {
            request = request.system(system);
        }

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(GenerationError::Completion)?;

        if response.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(response)
    }

    fn build_article_prompt(&self, request: &GenerationRequest) -> String {
        let source = match &request.source_url {
            Some(url) => format!("Reference source: {}\n", url),
            None => String::new(),
        };
        let sources_rule = if request.include_sources {
            "List every source you relied on in \"sources\"."
        } else {
            "Leave \"sources\" as an empty list."
        };
        let categories = ContentCategory::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Write a news article about: {}\n{}\
            Audience: {}\n\
            Target length: about {} words.\n\
            Language: {}.\n\n\
            Rules:\n\
            1. Attribute claims; separate facts from opinion.\n\
            2. Avoid loaded, emotional or absolutist wording.\n\
            3. {}\n\n\
            Output JSON only, with exactly these fields:\n\
            {{\"title\": \"...\", \"content\": \"full article, paragraphs separated by blank lines\", \
            \"summary\": \"2-3 sentences\", \"tags\": [\"...\"], \"category\": \"one of: {}\", \
            \"keyPoints\": [\"...\"], \"sources\": [\"...\"]}}",
            request.topic.trim(),
            source,
            request.target_audience.describe(),
            request.length.target_words(),
            self.language,
            sources_rule,
            categories
        )
    }
}

/// Request checks, all done before any network call.
pub fn validate(request: &GenerationRequest) -> Result<(), GenerationError> {
    let topic_len = request.topic.trim().chars().count();
    if topic_len < MIN_TOPIC_CHARS {
        return Err(GenerationError::InvalidRequest(format!(
            "topic must be at least {} characters",
            MIN_TOPIC_CHARS
        )));
    }
    if topic_len > MAX_TOPIC_CHARS {
        return Err(GenerationError::InvalidRequest(format!(
            "topic must be at most {} characters",
            MAX_TOPIC_CHARS
        )));
    }
    if let Some(url) = &request.source_url {
        let valid = reqwest::Url::parse(url)
            .map(|u| u.scheme() == "http" || u.scheme() == "https")
            .unwrap_or(false);
        if !valid {
            return Err(GenerationError::InvalidRequest(format!("sourceUrl is not a valid URL: {}", url)));
        }
    }
    Ok(())
}

fn system_prompt(style: ArticleStyle) -> &'static str {
    match style {
        ArticleStyle::Neutral => {
            "You are an impartial news journalist. Report verifiable facts, attribute every claim, \
            and avoid taking sides or using emotional language."
        }
        ArticleStyle::Analytical => {
            "You are an analytical journalist. Explain causes, context and consequences with data, \
            keep facts apart from interpretation, and present competing viewpoints fairly."
        }
        ArticleStyle::Comprehensive => {
            "You are an in-depth reporter. Cover background, current developments, stakeholders and \
            possible outcomes thoroughly while staying balanced and factual."
        }
    }
}

/// Cheap lexical pre-estimate of bias; the bias detector's analysis is
/// authoritative.
pub fn provisional_bias_score(text: &str) -> f64 {
    let scan = lexicon::scan(text);
    (scan.political() + scan.emotional() + scan.linguistic_with_loaded()) / 3.0
}

fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

fn english_alias(folded: &str) -> Option<ContentCategory> {
    let category = match folded {
        "politics" | "political" => ContentCategory::Politica,
        "economy" | "economics" | "business" | "finance" => ContentCategory::Economia,
        "technology" | "tech" => ContentCategory::Tecnologia,
        "health" => ContentCategory::Saude,
        "science" => ContentCategory::Ciencia,
        "sports" | "sport" => ContentCategory::Esportes,
        "culture" | "entertainment" => ContentCategory::Cultura,
        "international" | "world" => ContentCategory::Internacional,
        "general" => ContentCategory::Geral,
        _ => return None,
    };
    Some(category)
}

/// Maps a model-supplied category onto the whitelist, defaulting to `Geral`.
pub fn normalize_category(raw: Option<&str>) -> ContentCategory {
    let Some(raw) = raw else {
        return ContentCategory::Geral;
    };
    let folded = fold_accents(&raw.trim().to_lowercase());
    if folded.is_empty() {
        return ContentCategory::Geral;
    }

    if let Some(category) = english_alias(&folded) {
        return category;
    }

    let mut best: Option<(ContentCategory, f64)> = None;
    for category in ContentCategory::ALL {
        let candidate = fold_accents(&category.as_str().to_lowercase());
        let similarity = strsim::normalized_levenshtein(&folded, &candidate);
        if best.map_or(true, |(_, s)| similarity > s) {
            best = Some((category, similarity));
        }
    }

    match best {
        Some((category, similarity)) if similarity >= CATEGORY_SIMILARITY => category,
        _ => {
            log::debug!("Unrecognized category '{}', defaulting to Geral", raw);
            ContentCategory::Geral
        }
    }
}

fn parse_article(response: &str) -> Option<ArticleDraft> {
    let json = llm::parse_json_object(response)?;
    let title = json["title"].as_str()?.trim().to_string();
    let content = json["content"].as_str()?.trim().to_string();
    if title.is_empty() || content.is_empty() {
        return None;
    }

    let key_points = {
        let camel = llm::string_list(&json["keyPoints"]);
        if camel.is_empty() {
            llm::string_list(&json["key_points"])
        } else {
            camel
        }
    };

    Some(ArticleDraft {
        summary: json["summary"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| first_paragraph(&content, 200)),
        title,
        content,
        tags: llm::string_list(&json["tags"]),
        category: json["category"].as_str().map(|s| s.to_string()),
        key_points,
        sources: llm::string_list(&json["sources"]),
    })
}

fn clean_heading(line: &str) -> String {
    line.trim()
        .trim_start_matches('#')
        .trim()
        .trim_matches(|c: char| c == '*' || c == '"' || c == '\'')
        .trim()
        .to_string()
}

fn strip_title_label(line: &str) -> Option<String> {
    let lower = line.to_lowercase();
    for label in ["title:", "título:", "titulo:"] {
        if lower.starts_with(label) {
            // labels are ASCII apart from 'í', so slice by char count
            let rest: String = line.chars().skip(label.chars().count()).collect();
            return Some(clean_heading(&rest));
        }
    }
    None
}

fn first_paragraph(text: &str, max_chars: usize) -> String {
    let paragraph = text
        .split("\n\n")
        .map(|p| p.trim())
        .find(|p| !p.is_empty())
        .unwrap_or_default();
    if paragraph.chars().count() <= max_chars {
        paragraph.to_string()
    } else {
        let cut: String = paragraph.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

/// Line-scanning recovery for replies that are not a JSON envelope: the raw
/// text becomes the content and a title is pulled from the first plausible
/// line.
fn salvage_article(raw: &str) -> Option<ArticleDraft> {
    let text = raw.trim().trim_matches('`').trim();
    if text.is_empty() {
        return None;
    }

    let lines: Vec<&str> = text.lines().map(|l| l.trim()).filter(|l| !l.is_empty()).collect();

    let title = lines
        .iter()
        .find_map(|l| strip_title_label(l))
        .or_else(|| lines.iter().find(|l| l.starts_with('#')).map(|l| clean_heading(l)))
        .or_else(|| lines.first().map(|l| clean_heading(l)))
        .map(|t| t.chars().take(120).collect::<String>())
        .filter(|t| !t.is_empty())?;

    let body_without_title: String = text
        .lines()
        .filter(|l| clean_heading(l) != title && strip_title_label(l.trim()).as_deref() != Some(title.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    let key_points = lines
        .iter()
        .filter_map(|l| {
            l.strip_prefix("- ")
                .or_else(|| l.strip_prefix("* "))
                .or_else(|| l.strip_prefix("• "))
        })
        .map(|p| p.trim().to_string())
        .take(5)
        .collect();

    Some(ArticleDraft {
        summary: first_paragraph(&body_without_title, 200),
        title,
        content: text.to_string(),
        tags: Vec::new(),
        category: None,
        key_points,
        sources: Vec::new(),
    })
}
