use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use crate::core::config::TtsConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub voice_id: String,
    pub text: String,
    pub model_id: String,
    pub voice_settings: VoiceSettings,
}

#[derive(Debug, Clone)]
pub struct SpeechAudio {
    pub bytes: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
    pub category: Option<String>,
}

/// Seam over the hosted voice-synthesis service.
#[async_trait]
pub trait SpeechClient: Send + Sync {
    async fn speak(&self, request: &SpeechRequest) -> Result<SpeechAudio>;

    async fn voices(&self) -> Result<Vec<Voice>>;
}

pub struct TtsClient {
    client: Client,
    config: TtsConfig,
}

impl TtsClient {
    pub fn new(config: TtsConfig) -> Self {
        let timeout = config.timeout_secs.unwrap_or(60);
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(timeout))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    fn base_url(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("xi-api-key", key),
            None => builder,
        }
    }
}

#[async_trait]
impl SpeechClient for TtsClient {
    async fn speak(&self, request: &SpeechRequest) -> Result<SpeechAudio> {
        let url = format!("{}/v1/text-to-speech/{}", self.base_url(), request.voice_id);
        let body = json!({
            "text": request.text,
            "model_id": request.model_id,
            "voice_settings": request.voice_settings,
        });

        log::info!(
            "Requesting speech for {} chars with voice {}: {}...",
            request.text.chars().count(),
            request.voice_id,
            request.text.chars().take(20).collect::<String>()
        );

        let res = match self
            .authorize(self.client.post(&url))
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Failed to connect to TTS at {}: {}", url, e);
                return Err(anyhow!("TTS Connection Failed: {}", e));
            }
        };

        if !res.status().is_success() {
            let status = res.status();
            let error_text = res.text().await.unwrap_or_default();
            log::error!("TTS Error {}: {}", status, error_text);
            return Err(anyhow!("TTS API Error {}: {}", status, error_text));
        }

        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let bytes = res.bytes().await?;

        if bytes.is_empty() {
            return Err(anyhow!("TTS returned an empty audio body"));
        }

        Ok(SpeechAudio { bytes, content_type })
    }

    async fn voices(&self) -> Result<Vec<Voice>> {
        let url = format!("{}/v1/voices", self.base_url());
        let res = self.authorize(self.client.get(&url)).send().await?;

        if !res.status().is_success() {
            return Err(anyhow!("Failed to list voices: {}", res.status()));
        }

        let json: serde_json::Value = res.json().await?;
        let voices = json["voices"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| {
                        Some(Voice {
                            voice_id: v["voice_id"].as_str()?.to_string(),
                            name: v["name"].as_str().unwrap_or_default().to_string(),
                            category: v["category"].as_str().map(|s| s.to_string()),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(voices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_settings_serialize_with_wire_names() {
        let settings = VoiceSettings {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        };
        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["similarity_boost"], json!(0.75));
        assert_eq!(value["use_speaker_boost"], json!(true));
    }
}
