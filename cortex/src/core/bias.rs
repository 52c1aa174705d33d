use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::core::fanout::settle_all;
use crate::core::labels;
use crate::core::lexicon::{self, LexicalScan};
use crate::core::llm::{self, CompletionClient, CompletionRequest};
use crate::core::models::{clamp_unit, normalize_score, word_count, BiasAnalysis, BiasCategories};

pub const LLM_WEIGHT: f64 = 0.7;
pub const RULE_WEIGHT: f64 = 0.3;

/// Score assumed for a category the model's reply does not mention.
pub const UNREADABLE_SCORE: f64 = 0.3;
pub const HEURISTIC_CONFIDENCE: f64 = 0.3;
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

/// Longest text excerpt sent to the model.
const MAX_ANALYSIS_CHARS: usize = 8000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasOptions {
    /// Ask for more indicators and suggestions.
    #[serde(default)]
    pub detailed: bool,
    /// Title, topic or outlet the text comes from.
    #[serde(default)]
    pub context: Option<String>,
}

/// What the model said about the text, before blending.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmBiasScores {
    pub categories: BiasCategories,
    pub confidence: f64,
    pub explanation: String,
    pub indicators: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleComparison {
    pub article1_bias: BiasAnalysis,
    pub article2_bias: BiasAnalysis,
    pub comparison: String,
    pub recommendation: String,
}

static LABELED_SCORES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("political", r"(?:political|pol[ií]tic[oa])"),
        ("emotional", r"(?:emotional|emocional)"),
        ("linguistic", r"(?:linguistic|lingu[ií]stic[oa])"),
        ("factual", r"(?:factual|fact[ou]al)"),
    ]
    .into_iter()
    .map(|(key, label)| {
        let re = Regex::new(&format!(r#"(?i){}"?\s*[:=]\s*"?([0-9]*\.?[0-9]+)"#, label)).unwrap();
        (key, re)
    })
    .collect()
});

fn blend(llm_score: f64, rule_score: f64) -> f64 {
    clamp_unit(LLM_WEIGHT * clamp_unit(llm_score) + RULE_WEIGHT * clamp_unit(rule_score))
}

/// Blends the lexical scan with the model's scores. `factual` comes from
/// the model alone since the scanner has no factual-accuracy patterns.
pub fn combine_analyses(rule: &LexicalScan, llm: &LlmBiasScores) -> BiasAnalysis {
    let categories = BiasCategories {
        political: blend(llm.categories.political, rule.political()),
        emotional: blend(llm.categories.emotional, rule.emotional()),
        linguistic: blend(llm.categories.linguistic, rule.linguistic_with_loaded()),
        factual: clamp_unit(llm.categories.factual),
    };

    let mut indicators = llm.indicators.clone();
    for indicator in rule.indicators() {
        if !indicators.contains(&indicator) {
            indicators.push(indicator);
        }
    }
    indicators.truncate(10);

    let suggestions = if llm.suggestions.is_empty() {
        default_suggestions(&categories)
    } else {
        llm.suggestions.clone()
    };

    let explanation = if llm.explanation.trim().is_empty() {
        format!(
            "Combined analysis: {:.0}% model judgement, {:.0}% lexical scan over {} words.",
            LLM_WEIGHT * 100.0,
            RULE_WEIGHT * 100.0,
            rule.word_count
        )
    } else {
        llm.explanation.clone()
    };

    BiasAnalysis {
        overall_score: categories.mean(),
        categories,
        indicators,
        suggestions,
        confidence: clamp_unit(llm.confidence),
        explanation,
        is_fallback: false,
    }
}

fn default_suggestions(categories: &BiasCategories) -> Vec<String> {
    let mut out = Vec::new();
    if categories.political >= labels::BIAS_HIGH_THRESHOLD {
        out.push("Balance the political framing by including opposing viewpoints.".to_string());
    }
    if categories.emotional >= labels::BIAS_HIGH_THRESHOLD {
        out.push("Replace emotionally charged adjectives with neutral descriptions.".to_string());
    }
    if categories.linguistic >= labels::BIAS_HIGH_THRESHOLD {
        out.push("Avoid absolutist and loaded wording; qualify generalizations.".to_string());
    }
    if categories.factual >= labels::BIAS_HIGH_THRESHOLD {
        out.push("Attribute claims to verifiable sources and add supporting data.".to_string());
    }
    out
}

/// Placeholder returned when the normal path fails. Scores depend on text
/// length only.
pub fn fallback_analysis(text: &str) -> BiasAnalysis {
    let words = word_count(text);
    let base = clamp_unit(0.3 * (words as f64 / 500.0).min(1.0));
    let categories = BiasCategories::uniform(base);
    BiasAnalysis {
        overall_score: categories.mean(),
        categories,
        indicators: vec!["Automated bias analysis unavailable".to_string()],
        suggestions: vec!["Review the text manually for bias.".to_string()],
        confidence: FALLBACK_CONFIDENCE,
        explanation: format!(
            "Fallback analysis: the model-based analysis failed; placeholder scores derived from text length ({} words).",
            words
        ),
        is_fallback: true,
    }
}

/// Strict JSON reading of the model's reply.
fn parse_llm_scores(response: &str) -> Option<LlmBiasScores> {
    let json = llm::parse_json_object(response)?;
    let scores = if json["categories"].is_object() {
        &json["categories"]
    } else {
        &json
    };

    let read = |key: &str| {
        llm::loose_f64(&scores[key])
            .map(normalize_score)
            .unwrap_or(UNREADABLE_SCORE)
    };

    let categories = BiasCategories {
        political: read("political"),
        emotional: read("emotional"),
        linguistic: read("linguistic"),
        factual: read("factual"),
    };

    // A reply with none of the four scores is not a bias analysis.
    let any_present = ["political", "emotional", "linguistic", "factual"]
        .iter()
        .any(|k| llm::loose_f64(&scores[*k]).is_some());
    if !any_present {
        return None;
    }

    Some(LlmBiasScores {
        categories,
        confidence: llm::loose_f64(&json["confidence"]).map(normalize_score).unwrap_or(0.5),
        explanation: json["explanation"].as_str().unwrap_or_default().trim().to_string(),
        indicators: llm::string_list(&json["indicators"]),
        suggestions: llm::string_list(&json["suggestions"]),
    })
}

/// Labeled-number extraction (`political: 0.4`) for replies that are not
/// JSON. Categories that cannot be found default to [`UNREADABLE_SCORE`].
fn heuristic_scores(response: &str) -> LlmBiasScores {
    let mut categories = BiasCategories::uniform(UNREADABLE_SCORE);
    for (key, re) in LABELED_SCORES.iter() {
        let Some(value) = re
            .captures(response)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
        else {
            continue;
        };
        let value = normalize_score(value);
        match *key {
            "political" => categories.political = value,
            "emotional" => categories.emotional = value,
            "linguistic" => categories.linguistic = value,
            _ => categories.factual = value,
        }
    }

    LlmBiasScores {
        categories,
        confidence: HEURISTIC_CONFIDENCE,
        explanation: "Scores extracted heuristically from a non-JSON model response.".to_string(),
        indicators: Vec::new(),
        suggestions: Vec::new(),
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

pub struct BiasDetector {
    llm: Arc<dyn CompletionClient>,
    language: String,
}

impl BiasDetector {
    pub fn new(llm: Arc<dyn CompletionClient>, language: impl Into<String>) -> Self {
        Self {
            llm,
            language: language.into(),
        }
    }

    pub fn bias_label(&self, score: f64) -> &'static str {
        labels::bias_label(score)
    }

    pub fn bias_color(&self, score: f64) -> &'static str {
        labels::bias_color(score)
    }

    /// Never fails: any internal error yields [`fallback_analysis`].
    pub async fn analyze_content(&self, text: &str, options: &BiasOptions) -> BiasAnalysis {
        match self.try_analyze(text, options).await {
            Ok(analysis) => analysis,
            Err(e) => {
                log::warn!("Bias analysis failed: {}. Using fallback analysis.", e);
                fallback_analysis(text)
            }
        }
    }

    async fn try_analyze(&self, text: &str, options: &BiasOptions) -> Result<BiasAnalysis> {
        if text.trim().is_empty() {
            bail!("text to analyze is empty");
        }

        let rule = lexicon::scan(text);
        let scores = self.llm_scores(text, options).await?;
        let analysis = combine_analyses(&rule, &scores);

        log::debug!(
            "Bias analysis: overall={:.2} rule_hits={} confidence={:.2}",
            analysis.overall_score,
            rule.total_matches(),
            analysis.confidence
        );

        Ok(analysis)
    }

    async fn llm_scores(&self, text: &str, options: &BiasOptions) -> Result<LlmBiasScores> {
        let context = options
            .context
            .as_ref()
            .map(|c| format!("Context: {}\n", c))
            .unwrap_or_default();
        let depth = if options.detailed {
            "Give up to 8 indicators (quote the exact words) and up to 5 concrete suggestions."
        } else {
            "Give up to 3 indicators and up to 3 suggestions."
        };

        let prompt = format!(
            "Analyze the following text for bias.\n{}\
            Score each category from 0 (none) to 1 (severe):\n\
            - political: partisan framing or one-sided political positioning\n\
            - emotional: emotionally manipulative or sensational language\n\
            - linguistic: loaded, absolutist or presumptive wording\n\
            - factual: unsupported claims, missing attribution or selective facts\n\
            {} Write explanation, indicators and suggestions in {}.\n\n\
            Output JSON only:\n\
            {{\"political\": 0.0, \"emotional\": 0.0, \"linguistic\": 0.0, \"factual\": 0.0, \"overall\": 0.0, \
            \"confidence\": 0.0, \"explanation\": \"...\", \"indicators\": [\"...\"], \"suggestions\": [\"...\"]}}\n\n\
            Text:\n\"\"\"\n{}\n\"\"\"",
            context,
            depth,
            self.language,
            excerpt(text, MAX_ANALYSIS_CHARS)
        );

        let response = self
            .llm
            .complete(
                CompletionRequest::new(prompt)
                    .system("You are a media-bias analyst. You answer only with JSON.")
                    .temperature(0.2)
                    .max_tokens(if options.detailed { 1000 } else { 600 }),
            )
            .await?;

        Ok(match parse_llm_scores(&response) {
            Some(scores) => scores,
            None => {
                log::warn!("Bias response was not JSON; extracting labeled scores heuristically");
                heuristic_scores(&response)
            }
        })
    }

    /// One result per input, in input order. A failing item gets its own
    /// fallback analysis without affecting the others.
    pub async fn batch_analyze(&self, contents: &[String], options: &BiasOptions) -> Vec<BiasAnalysis> {
        let settled = settle_all(contents.iter().map(|text| self.try_analyze(text, options))).await;

        settled
            .into_iter()
            .zip(contents)
            .enumerate()
            .map(|(idx, (result, text))| match result {
                Ok(analysis) => analysis,
                Err(e) => {
                    log::warn!("Batch item {} failed: {}. Using fallback analysis.", idx, e);
                    fallback_analysis(text)
                }
            })
            .collect()
    }

    /// Analyzes both texts independently, then asks the model for a
    /// structured `{comparison, recommendation}` verdict.
    pub async fn compare_articles(&self, first: &str, second: &str) -> ArticleComparison {
        let options = BiasOptions::default();
        let (article1_bias, article2_bias) = tokio::join!(
            self.analyze_content(first, &options),
            self.analyze_content(second, &options)
        );

        let prompt = format!(
            "Compare the bias of two articles.\n\n\
            Article 1 (overall bias {:.2}; political {:.2}, emotional {:.2}, linguistic {:.2}, factual {:.2}):\n\"\"\"\n{}\n\"\"\"\n\n\
            Article 2 (overall bias {:.2}; political {:.2}, emotional {:.2}, linguistic {:.2}, factual {:.2}):\n\"\"\"\n{}\n\"\"\"\n\n\
            Write in {}. Output JSON only:\n\
            {{\"comparison\": \"a short paragraph contrasting how each article frames the story\", \
            \"recommendation\": \"one sentence telling the reader which article is more balanced and why\"}}",
            article1_bias.overall_score,
            article1_bias.categories.political,
            article1_bias.categories.emotional,
            article1_bias.categories.linguistic,
            article1_bias.categories.factual,
            excerpt(first, 1500),
            article2_bias.overall_score,
            article2_bias.categories.political,
            article2_bias.categories.emotional,
            article2_bias.categories.linguistic,
            article2_bias.categories.factual,
            excerpt(second, 1500),
            self.language
        );

        let verdict = self
            .llm
            .complete(CompletionRequest::new(prompt).temperature(0.3).max_tokens(600))
            .await;

        let (comparison, recommendation) = match verdict {
            Ok(response) => match llm::parse_json_object(&response) {
                Some(json) => {
                    let comparison = json["comparison"].as_str().unwrap_or_default().trim().to_string();
                    let recommendation = json["recommendation"].as_str().unwrap_or_default().trim().to_string();
                    (
                        if comparison.is_empty() {
                            score_comparison(&article1_bias, &article2_bias)
                        } else {
                            comparison
                        },
                        if recommendation.is_empty() {
                            score_recommendation(&article1_bias, &article2_bias)
                        } else {
                            recommendation
                        },
                    )
                }
                None => {
                    log::warn!("Comparison response was not JSON; keeping raw text as the comparison");
                    (
                        response.trim().to_string(),
                        score_recommendation(&article1_bias, &article2_bias),
                    )
                }
            },
            Err(e) => {
                log::warn!("Comparison call failed: {}. Deriving verdict from scores.", e);
                (
                    score_comparison(&article1_bias, &article2_bias),
                    score_recommendation(&article1_bias, &article2_bias),
                )
            }
        };

        ArticleComparison {
            article1_bias,
            article2_bias,
            comparison,
            recommendation,
        }
    }
}

fn score_comparison(a: &BiasAnalysis, b: &BiasAnalysis) -> String {
    format!(
        "Article 1 shows {} ({:.2}); article 2 shows {} ({:.2}).",
        labels::bias_label(a.overall_score).to_lowercase(),
        a.overall_score,
        labels::bias_label(b.overall_score).to_lowercase(),
        b.overall_score
    )
}

fn score_recommendation(a: &BiasAnalysis, b: &BiasAnalysis) -> String {
    let diff = a.overall_score - b.overall_score;
    if diff.abs() < 0.05 {
        "Both articles show a similar level of bias; read them together for a fuller picture.".to_string()
    } else if diff < 0.0 {
        "Article 1 appears more balanced.".to_string()
    } else {
        "Article 2 appears more balanced.".to_string()
    }
}
