use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Words per minute used for the read-time estimate.
pub const WORDS_PER_MINUTE: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStyle {
    #[default]
    Neutral,
    Analytical,
    Comprehensive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl ArticleLength {
    pub fn target_words(self) -> u32 {
        match self {
            ArticleLength::Short => 400,
            ArticleLength::Medium => 800,
            ArticleLength::Long => 1500,
        }
    }

    pub fn max_tokens(self) -> u32 {
        match self {
            ArticleLength::Short => 600,
            ArticleLength::Medium => 1200,
            ArticleLength::Long => 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetAudience {
    #[default]
    General,
    Expert,
    Young,
}

impl TargetAudience {
    pub fn describe(self) -> &'static str {
        match self {
            TargetAudience::General => "a general audience with no special background",
            TargetAudience::Expert => "domain experts who expect precise terminology and data",
            TargetAudience::Young => "young readers; keep sentences short and explain jargon",
        }
    }
}

/// Caller input for article generation. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub topic: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub style: ArticleStyle,
    #[serde(default)]
    pub length: ArticleLength,
    #[serde(default)]
    pub target_audience: TargetAudience,
    #[serde(default)]
    pub include_sources: bool,
}

impl GenerationRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            source_url: None,
            style: ArticleStyle::default(),
            length: ArticleLength::default(),
            target_audience: TargetAudience::default(),
            include_sources: false,
        }
    }
}

/// The closed set of editorial categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentCategory {
    #[serde(rename = "Política")]
    Politica,
    #[serde(rename = "Economia")]
    Economia,
    #[serde(rename = "Tecnologia")]
    Tecnologia,
    #[serde(rename = "Saúde")]
    Saude,
    #[serde(rename = "Ciência")]
    Ciencia,
    #[serde(rename = "Esportes")]
    Esportes,
    #[serde(rename = "Cultura")]
    Cultura,
    #[serde(rename = "Internacional")]
    Internacional,
    #[default]
    #[serde(rename = "Geral")]
    Geral,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 9] = [
        ContentCategory::Politica,
        ContentCategory::Economia,
        ContentCategory::Tecnologia,
        ContentCategory::Saude,
        ContentCategory::Ciencia,
        ContentCategory::Esportes,
        ContentCategory::Cultura,
        ContentCategory::Internacional,
        ContentCategory::Geral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentCategory::Politica => "Política",
            ContentCategory::Economia => "Economia",
            ContentCategory::Tecnologia => "Tecnologia",
            ContentCategory::Saude => "Saúde",
            ContentCategory::Ciencia => "Ciência",
            ContentCategory::Esportes => "Esportes",
            ContentCategory::Cultura => "Cultura",
            ContentCategory::Internacional => "Internacional",
            ContentCategory::Geral => "Geral",
        }
    }
}

impl std::fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub category: ContentCategory,
    /// Minutes, `ceil(words / 200)`.
    pub read_time: u32,
    /// Cheap lexical pre-estimate; the bias detector is authoritative.
    pub bias_score: f64,
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_parallels: Option<Vec<HistoricalComparison>>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BiasCategories {
    pub political: f64,
    pub emotional: f64,
    pub linguistic: f64,
    pub factual: f64,
}

impl BiasCategories {
    pub fn uniform(score: f64) -> Self {
        Self {
            political: score,
            emotional: score,
            linguistic: score,
            factual: score,
        }
    }

    /// Unweighted mean of the four axes, clamped to 1.
    pub fn mean(&self) -> f64 {
        ((self.political + self.emotional + self.linguistic + self.factual) / 4.0).min(1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasAnalysis {
    pub overall_score: f64,
    pub categories: BiasCategories,
    pub indicators: Vec<String>,
    pub suggestions: Vec<String>,
    pub confidence: f64,
    pub explanation: String,
    #[serde(default)]
    pub is_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalComparison {
    pub id: String,
    pub title: String,
    pub description: String,
    pub year: i32,
    pub relevance_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// One synthesized text segment. `duration` is estimated from character
/// count, never measured from the audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResult {
    #[serde(with = "audio_base64")]
    pub audio_buffer: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub duration: u32,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SynthesisResult {
    pub fn failed(error: impl Into<String>, duration: u32) -> Self {
        Self {
            audio_buffer: Bytes::new(),
            content_type: None,
            duration,
            success: false,
            error: Some(error.into()),
        }
    }
}

mod audio_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let raw = String::deserialize(deserializer)?;
        STANDARD
            .decode(raw.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Accepts `0..1` scores and `0..100` percentages.
pub fn normalize_score(raw: f64) -> f64 {
    if raw > 1.0 && raw <= 100.0 {
        raw / 100.0
    } else {
        clamp_unit(raw)
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn read_time_minutes(content: &str) -> u32 {
    word_count(content).div_ceil(WORDS_PER_MINUTE) as u32
}
