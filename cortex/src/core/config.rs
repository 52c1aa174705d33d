use serde::Deserialize;
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub historical: HistoricalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub api_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TtsConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub voice_id: String,
    #[serde(default = "default_tts_model")]
    pub model_id: String,
    #[serde(default = "default_stability")]
    pub stability: f32,
    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f32,
    #[serde(default)]
    pub style: f32,
    #[serde(default = "default_true")]
    pub use_speaker_boost: bool,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self { language: default_language() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoricalConfig {
    #[serde(default = "default_min_relevance")]
    pub min_relevance_score: f64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for HistoricalConfig {
    fn default() -> Self {
        Self {
            min_relevance_score: default_min_relevance(),
            max_results: default_max_results(),
        }
    }
}

fn default_tts_model() -> String { "eleven_multilingual_v2".to_string() }
fn default_stability() -> f32 { 0.5 }
fn default_similarity_boost() -> f32 { 0.75 }
fn default_true() -> bool { true }
fn default_language() -> String { "pt-BR".to_string() }
fn default_min_relevance() -> f64 { 0.6 }
fn default_max_results() -> usize { 3 }

pub fn load_config(path: &str) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path))?;
    let mut config = parse_config(&content)?;
    config.apply_env_secrets();
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    Ok(config)
}

impl Config {
    /// Secrets left out of the file are taken from the environment.
    pub fn apply_env_secrets(&mut self) {
        if self.llm.api_key.is_none() {
            self.llm.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if self.tts.api_key.is_none() {
            self.tts.api_key = std::env::var("ELEVENLABS_API_KEY").ok();
        }
    }
}
