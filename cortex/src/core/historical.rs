use anyhow::{anyhow, bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::core::config::HistoricalConfig;
use crate::core::labels;
use crate::core::llm::{self, CompletionClient, CompletionRequest};
use crate::core::models::{clamp_unit, normalize_score, HistoricalComparison};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalQuery {
    pub topic: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub min_relevance_score: Option<f64>,
}

impl HistoricalQuery {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalParallel {
    pub id: String,
    pub title: String,
    pub year: i32,
    pub description: String,
    pub relevance_score: f64,
    pub similarities: Vec<String>,
    pub differences: Vec<String>,
    pub lessons: Vec<String>,
    pub sources: Vec<String>,
}

impl HistoricalParallel {
    /// Compact form attached to generated articles.
    pub fn to_comparison(&self) -> HistoricalComparison {
        HistoricalComparison {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            year: self.year,
            relevance_score: self.relevance_score,
            source_url: self
                .sources
                .iter()
                .find(|s| reqwest::Url::parse(s).is_ok())
                .cloned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternAnalysis {
    pub summary: String,
    pub key_insights: Vec<String>,
    pub patterns: Vec<String>,
    pub lessons: Vec<String>,
    pub confidence: f64,
    #[serde(default)]
    pub is_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalAnalysis {
    pub parallels: Vec<HistoricalParallel>,
    pub summary: String,
    pub key_insights: Vec<String>,
    pub patterns: Vec<String>,
    pub lessons: Vec<String>,
    pub confidence: f64,
    /// Set when the search or the synthesis fell back.
    #[serde(default)]
    pub is_fallback: bool,
}

impl HistoricalAnalysis {
    fn fallback(topic: &str) -> Self {
        Self {
            parallels: Vec::new(),
            summary: format!("Fallback analysis: historical context for \"{}\" is unavailable.", topic),
            key_insights: Vec::new(),
            patterns: Vec::new(),
            lessons: Vec::new(),
            confidence: 0.0,
            is_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalEvent {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub score: f64,
    pub reasoning: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicCategory {
    Economic,
    Political,
    Social,
    Technological,
    Environmental,
    International,
    Health,
    General,
}

impl TopicCategory {
    fn keywords(self) -> &'static [&'static str] {
        match self {
            TopicCategory::Economic => &[
                "economy", "economic", "inflation", "recession", "market", "bank", "debt", "trade",
                "economia", "inflação", "recessão", "mercado", "banco", "dívida", "juros", "crise financeira",
            ],
            TopicCategory::Political => &[
                "election", "government", "president", "parliament", "congress", "policy", "vote",
                "eleição", "governo", "presidente", "congresso", "política", "voto", "senado",
            ],
            TopicCategory::Social => &[
                "protest", "inequality", "education", "migration", "rights", "strike",
                "protesto", "desigualdade", "educação", "migração", "direitos", "greve", "sociedade",
            ],
            TopicCategory::Technological => &[
                "ai", "artificial intelligence", "technology", "internet", "automation", "computer",
                "inteligência artificial", "tecnologia", "automação", "digital", "robô",
            ],
            TopicCategory::Environmental => &[
                "climate", "pollution", "drought", "flood", "deforestation", "energy",
                "clima", "poluição", "seca", "enchente", "desmatamento", "energia", "amazônia",
            ],
            TopicCategory::International => &[
                "war", "treaty", "sanctions", "diplomacy", "alliance", "border",
                "guerra", "tratado", "sanções", "diplomacia", "aliança", "fronteira",
            ],
            TopicCategory::Health => &[
                "health", "healthcare", "pandemic", "epidemic", "vaccine", "disease", "hospital",
                "saúde", "pandemia", "epidemia", "vacina", "doença",
            ],
            TopicCategory::General => &[],
        }
    }

    const SEARCHABLE: [TopicCategory; 7] = [
        TopicCategory::Economic,
        TopicCategory::Political,
        TopicCategory::Social,
        TopicCategory::Technological,
        TopicCategory::Environmental,
        TopicCategory::International,
        TopicCategory::Health,
    ];

    fn search_hint(self) -> &'static str {
        match self {
            TopicCategory::Economic => "financial crises, market crashes and monetary reforms",
            TopicCategory::Political => "elections, regime changes and institutional crises",
            TopicCategory::Social => "social movements, reforms and demographic shifts",
            TopicCategory::Technological => "technological revolutions and their social impact",
            TopicCategory::Environmental => "natural disasters, resource crises and environmental policy",
            TopicCategory::International => "wars, treaties and diplomatic realignments",
            TopicCategory::Health => "epidemics, public-health reforms and medical breakthroughs",
            TopicCategory::General => "any well-documented events with comparable dynamics",
        }
    }
}

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d{1,4}").unwrap());

/// Keyword membership against the seven category lists. Only steers the
/// search prompt; results are never filtered by category.
pub fn categorize_topic(topic: &str) -> Vec<TopicCategory> {
    let lower = topic.to_lowercase();
    let words: Vec<&str> = WORD.find_iter(&lower).map(|m| m.as_str()).collect();

    let matched: Vec<TopicCategory> = TopicCategory::SEARCHABLE
        .iter()
        .copied()
        .filter(|category| {
            category.keywords().iter().any(|kw| {
                if kw.contains(' ') {
                    lower.contains(kw)
                } else {
                    words.contains(kw)
                }
            })
        })
        .collect();

    if matched.is_empty() {
        vec![TopicCategory::General]
    } else {
        matched
    }
}

/// Confidence of a pairwise similarity score from how decisive it is.
///
/// A score near 0 or 1 is a clear verdict from the model; a score near 0.5
/// means the model could not tell. Maps `|score - 0.5|` linearly onto
/// `[0.5, 1.0]`.
pub fn decisiveness_confidence(score: f64) -> f64 {
    clamp_unit(0.5 + (clamp_unit(score) - 0.5).abs())
}

fn parse_year(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(y) => i32::try_from(y).ok(),
            None => n
                .as_f64()
                .map(f64::round)
                .filter(|y| *y >= i32::MIN as f64 && *y <= i32::MAX as f64)
                .map(|y| y as i32),
        },
        serde_json::Value::String(s) => {
            let year: i32 = YEAR.find(s)?.as_str().parse().ok()?;
            let lower = s.to_lowercase();
            if year > 0 && (lower.contains("bc") || lower.contains("a.c.")) {
                Some(-year)
            } else {
                Some(year)
            }
        }
        _ => None,
    }
}

fn parse_parallel(value: &serde_json::Value) -> Option<HistoricalParallel> {
    let title = value["title"].as_str()?.trim();
    if title.is_empty() {
        return None;
    }
    let year = parse_year(&value["year"])?;
    let relevance = llm::loose_f64(&value["relevanceScore"])
        .or_else(|| llm::loose_f64(&value["relevance_score"]))
        .or_else(|| llm::loose_f64(&value["relevance"]))
        .map(normalize_score)
        .unwrap_or(0.0);

    Some(HistoricalParallel {
        id: uuid::Uuid::new_v4().to_string(),
        title: title.to_string(),
        year,
        description: value["description"].as_str().unwrap_or_default().trim().to_string(),
        relevance_score: relevance,
        similarities: llm::string_list(&value["similarities"]),
        differences: llm::string_list(&value["differences"]),
        lessons: llm::string_list(&value["lessons"]),
        sources: llm::string_list(&value["sources"]),
    })
}

/// Items come either wrapped as `{"parallels": [...]}` or as a bare array.
fn parse_parallel_items(response: &str) -> Result<Vec<serde_json::Value>> {
    if let Some(obj) = llm::parse_json_object(response) {
        if let Some(items) = obj["parallels"].as_array() {
            return Ok(items.clone());
        }
    }
    let array = llm::extract_json_array(response)
        .ok_or_else(|| anyhow!("no JSON list of parallels in response"))?;
    let items: Vec<serde_json::Value> = serde_json::from_str(array)?;
    Ok(items)
}

pub struct HistoricalComparator {
    llm: Arc<dyn CompletionClient>,
    config: HistoricalConfig,
    language: String,
}

impl HistoricalComparator {
    pub fn new(llm: Arc<dyn CompletionClient>, config: HistoricalConfig, language: impl Into<String>) -> Self {
        Self {
            llm,
            config,
            language: language.into(),
        }
    }

    pub fn relevance_label(&self, score: f64) -> &'static str {
        labels::relevance_label(score)
    }

    /// Search plus cross-parallel synthesis. Never fails: any error yields a
    /// zero-confidence analysis with no parallels.
    pub async fn find_historical_parallels(&self, query: &HistoricalQuery) -> HistoricalAnalysis {
        let found = self.find_parallels(query).await;
        self.analyze_search(&query.topic, found).await
    }

    /// Synthesis over a search that has already run. A failed search becomes
    /// the fallback analysis.
    pub async fn analyze_search(&self, topic: &str, found: Result<Vec<HistoricalParallel>>) -> HistoricalAnalysis {
        let parallels = match found {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Historical search failed for '{}': {:#}. Using fallback.", topic, e);
                return HistoricalAnalysis::fallback(topic);
            }
        };

        let analysis = self.analyze_patterns(topic, &parallels).await;

        HistoricalAnalysis {
            parallels,
            summary: analysis.summary,
            key_insights: analysis.key_insights,
            patterns: analysis.patterns,
            lessons: analysis.lessons,
            confidence: analysis.confidence,
            is_fallback: analysis.is_fallback,
        }
    }

    /// The search call alone: parallels at or above the relevance threshold,
    /// in the order the model returned them, capped to `max_results`.
    pub async fn find_parallels(&self, query: &HistoricalQuery) -> Result<Vec<HistoricalParallel>> {
        let topic = query.topic.trim();
        if topic.is_empty() {
            bail!("historical query topic is empty");
        }

        let min_relevance = query.min_relevance_score.unwrap_or(self.config.min_relevance_score);
        let max_results = query.max_results.unwrap_or(self.config.max_results);
        let categories = categorize_topic(topic);

        let prompt = self.build_search_prompt(query, &categories);
        let response = self
            .llm
            .complete(
                CompletionRequest::new(prompt)
                    .system("You are a historian who finds well-documented historical parallels to current events. Answer only with JSON.")
                    .temperature(0.4)
                    .max_tokens(2000),
            )
            .await?;

        let items = parse_parallel_items(&response)?;
        let total = items.len();

        let parallels: Vec<HistoricalParallel> = items
            .iter()
            .filter_map(parse_parallel)
            .filter(|p| p.relevance_score >= min_relevance)
            .take(max_results)
            .collect();

        log::info!(
            "Historical search for '{}' ({:?}): {} candidates, {} kept (min relevance {})",
            topic, categories, total, parallels.len(), min_relevance
        );

        Ok(parallels)
    }

    /// Cross-parallel synthesis. Skips the model call when there is nothing
    /// to synthesize.
    pub async fn analyze_patterns(&self, topic: &str, parallels: &[HistoricalParallel]) -> PatternAnalysis {
        if parallels.is_empty() {
            return PatternAnalysis {
                summary: format!("Insufficient data: no relevant historical parallels found for \"{}\".", topic),
                key_insights: Vec::new(),
                patterns: Vec::new(),
                lessons: Vec::new(),
                confidence: 0.0,
                is_fallback: false,
            };
        }

        let listing = parallels
            .iter()
            .enumerate()
            .map(|(i, p)| {
                format!(
                    "{}. {} ({}), relevance {:.2}\n   {}\n   Lessons: {}",
                    i + 1, p.title, p.year, p.relevance_score, p.description, p.lessons.join("; ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Current topic: {}\n\nHistorical parallels:\n{}\n\n\
            Identify what these parallels have in common and what they teach about the current topic.\n\
            Write all text in {}.\n\n\
            Output JSON only:\n\
            {{\"summary\": \"...\", \"keyInsights\": [\"...\"], \"patterns\": [\"...\"], \"lessons\": [\"...\"], \"confidence\": 0.0}}",
            topic, listing, self.language
        );

        let response = match self
            .llm
            .complete(CompletionRequest::new(prompt).temperature(0.3).max_tokens(1200))
            .await
        {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Pattern analysis call failed for '{}': {}", topic, e);
                return Self::pattern_fallback(parallels);
            }
        };

        match llm::parse_json_object(&response) {
            Some(json) => PatternAnalysis {
                summary: json["summary"].as_str().unwrap_or_default().trim().to_string(),
                key_insights: llm::string_list(&json["keyInsights"]),
                patterns: llm::string_list(&json["patterns"]),
                lessons: llm::string_list(&json["lessons"]),
                confidence: llm::loose_f64(&json["confidence"]).map(normalize_score).unwrap_or(0.5),
                is_fallback: false,
            },
            None => {
                log::warn!("Pattern analysis for '{}' was not JSON; using fallback", topic);
                Self::pattern_fallback(parallels)
            }
        }
    }

    fn pattern_fallback(parallels: &[HistoricalParallel]) -> PatternAnalysis {
        let titles: Vec<String> = parallels.iter().map(|p| format!("{} ({})", p.title, p.year)).collect();
        PatternAnalysis {
            summary: format!("Fallback analysis: related events include {}.", titles.join(", ")),
            key_insights: Vec::new(),
            patterns: Vec::new(),
            lessons: parallels.iter().flat_map(|p| p.lessons.iter().cloned()).take(5).collect(),
            confidence: 0.2,
            is_fallback: true,
        }
    }

    /// Pairwise similarity of two events on a `0..1` scale. Never fails.
    pub async fn calculate_similarity_score(&self, a: &HistoricalEvent, b: &HistoricalEvent) -> SimilarityScore {
        let describe = |e: &HistoricalEvent| match e.year {
            Some(y) => format!("{} ({}): {}", e.title, y, e.description),
            None => format!("{}: {}", e.title, e.description),
        };

        let prompt = format!(
            "Compare these two events and rate how similar their causes, dynamics and outcomes are.\n\n\
            Event A: {}\nEvent B: {}\n\n\
            Output JSON only: {{\"score\": 0.0, \"reasoning\": \"one or two sentences in {}\"}}\n\
            score is between 0 (unrelated) and 1 (nearly identical dynamics).",
            describe(a), describe(b), self.language
        );

        let response = self
            .llm
            .complete(CompletionRequest::new(prompt).temperature(0.1).max_tokens(300))
            .await;

        let parsed = response.ok().and_then(|r| llm::parse_json_object(&r)).and_then(|json| {
            let score = normalize_score(llm::loose_f64(&json["score"])?);
            let reasoning = json["reasoning"].as_str().unwrap_or_default().trim().to_string();
            Some((score, reasoning))
        });

        match parsed {
            Some((score, reasoning)) => SimilarityScore {
                score,
                reasoning,
                confidence: decisiveness_confidence(score),
            },
            None => {
                log::warn!("Similarity scoring failed for '{}' vs '{}'", a.title, b.title);
                SimilarityScore {
                    score: 0.0,
                    reasoning: "Fallback: similarity could not be computed.".to_string(),
                    confidence: 0.0,
                }
            }
        }
    }

    fn build_search_prompt(&self, query: &HistoricalQuery, categories: &[TopicCategory]) -> String {
        let hints = categories
            .iter()
            .map(|c| format!("- {}", c.search_hint()))
            .collect::<Vec<_>>()
            .join("\n");

        let mut constraints = String::new();
        if let Some(context) = &query.context {
            constraints.push_str(&format!("Context: {}\n", context));
        }
        if let Some(timeframe) = &query.timeframe {
            constraints.push_str(&format!("Restrict to the period: {}\n", timeframe));
        }
        if let Some(region) = &query.region {
            constraints.push_str(&format!("Prefer events from: {}\n", region));
        }

        format!(
            "Current topic: {}\n{}\n\
            Look especially at:\n{}\n\n\
            Find 5 to 7 historical events that parallel this topic. Write all text in {}.\n\
            For each give title, year (integer, negative for BC), description, relevanceScore (0 to 1), \
            similarities, differences, lessons and sources (URLs when known).\n\n\
            Output JSON only:\n\
            {{\"parallels\": [{{\"title\": \"...\", \"year\": 1929, \"description\": \"...\", \"relevanceScore\": 0.8, \
            \"similarities\": [\"...\"], \"differences\": [\"...\"], \"lessons\": [\"...\"], \"sources\": [\"...\"]}}]}}",
            query.topic.trim(), constraints, hints, self.language
        )
    }
}
