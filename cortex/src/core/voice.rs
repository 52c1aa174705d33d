use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::core::config::TtsConfig;
use crate::core::error::SynthesisError;
use crate::core::fanout::settle_all;
use crate::core::models::SynthesisResult;
use crate::core::tts::{SpeechClient, SpeechRequest, Voice, VoiceSettings};

/// Hard cap on a single synthesis request, checked before any upstream call.
pub const MAX_TEXT_CHARS: usize = 5000;

/// Speaking rate used for duration estimates.
pub const CHARS_PER_SECOND: usize = 15;

/// Caller-facing error for any upstream speech failure.
pub const SPEECH_UNAVAILABLE: &str = "speech service unavailable";

static TIMESTAMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d{1,2}:\d{2})\]").unwrap());
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static IMAGES: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]+\)").unwrap());
static LINKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static CODE_BLOCKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[^`]*```").unwrap());
static HEADINGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*#+\s+").unwrap());
static EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*|__|\*|`").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Per-call overrides of the configured voice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisOptions {
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub stability: Option<f32>,
    #[serde(default)]
    pub similarity_boost: Option<f32>,
    #[serde(default)]
    pub style: Option<f32>,
    #[serde(default)]
    pub use_speaker_boost: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSegment {
    pub timestamp: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSynthesis {
    pub timestamp: String,
    pub text: String,
    pub result: SynthesisResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSynthesis {
    pub segments: Vec<SegmentSynthesis>,
    /// Sum of per-segment estimates.
    pub total_duration: u32,
    /// True only when every segment produced audio.
    pub success: bool,
}

/// Rough speaking time, `ceil(chars / 15)`. Not measured from audio, so
/// treat it as a hint only.
pub fn estimate_duration_secs(text: &str) -> u32 {
    text.chars().count().div_ceil(CHARS_PER_SECOND) as u32
}

/// Splits a script on `[M:SS]` / `[MM:SS]` markers. Text before the first
/// marker joins the first segment; a script without markers is one segment
/// at `0:00`.
pub fn parse_script(script: &str) -> Vec<ScriptSegment> {
    let markers: Vec<_> = TIMESTAMP.captures_iter(script).collect();
    if markers.is_empty() {
        return vec![ScriptSegment {
            timestamp: "0:00".to_string(),
            text: script.trim().to_string(),
        }];
    }

    let mut segments = Vec::with_capacity(markers.len());
    let mut preamble = script[..markers[0].get(0).map_or(0, |m| m.start())].trim().to_string();

    for (idx, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(stamp)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = markers
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map_or(script.len(), |m| m.start());
        let mut text = script[whole.end()..end].trim().to_string();
        if !preamble.is_empty() {
            text = format!("{} {}", std::mem::take(&mut preamble), text).trim().to_string();
        }
        if text.is_empty() {
            continue;
        }
        segments.push(ScriptSegment {
            timestamp: stamp.as_str().to_string(),
            text,
        });
    }

    segments
}

/// Removes markup the voice would otherwise read aloud.
pub fn prepare_text(input: &str) -> String {
    let cleaned = CODE_BLOCKS.replace_all(input, "");
    let cleaned = TAGS.replace_all(&cleaned, "");
    let cleaned = cleaned
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let cleaned = IMAGES.replace_all(&cleaned, "");
    let cleaned = LINKS.replace_all(&cleaned, "$1");
    let cleaned = HEADINGS.replace_all(&cleaned, "");
    let cleaned = TIMESTAMP.replace_all(&cleaned, "");
    let cleaned = EMPHASIS.replace_all(&cleaned, "");
    SPACES.replace_all(&cleaned, " ").trim().to_string()
}

pub struct VoiceSynthesizer {
    speech: Arc<dyn SpeechClient>,
    config: TtsConfig,
}

impl VoiceSynthesizer {
    pub fn new(speech: Arc<dyn SpeechClient>, config: TtsConfig) -> Self {
        Self { speech, config }
    }

    pub async fn probe(&self) -> bool {
        match self.speech.voices().await {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Speech service probe failed: {}", e);
                false
            }
        }
    }

    pub async fn list_voices(&self) -> Result<Vec<Voice>> {
        self.speech.voices().await
    }

    fn request_for(&self, text: String, options: &SynthesisOptions) -> SpeechRequest {
        SpeechRequest {
            voice_id: options.voice_id.clone().unwrap_or_else(|| self.config.voice_id.clone()),
            text,
            model_id: options.model_id.clone().unwrap_or_else(|| self.config.model_id.clone()),
            voice_settings: VoiceSettings {
                stability: options.stability.unwrap_or(self.config.stability),
                similarity_boost: options.similarity_boost.unwrap_or(self.config.similarity_boost),
                style: options.style.unwrap_or(self.config.style),
                use_speaker_boost: options.use_speaker_boost.unwrap_or(self.config.use_speaker_boost),
            },
        }
    }

    /// Input is validated locally; an upstream failure comes back as an
    /// unsuccessful [`SynthesisResult`], not as an error.
    pub async fn synthesize_text(
        &self,
        text: &str,
        options: &SynthesisOptions,
    ) -> Result<SynthesisResult, SynthesisError> {
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyText);
        }
        let len = text.chars().count();
        if len > MAX_TEXT_CHARS {
            return Err(SynthesisError::TextTooLong { len, max: MAX_TEXT_CHARS });
        }

        let prepared = prepare_text(text);
        if prepared.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let duration = estimate_duration_secs(&prepared);
        let request = self.request_for(prepared, options);

        log::info!(
            "Synthesizing {} chars with voice {} (~{}s)",
            request.text.chars().count(),
            request.voice_id,
            duration
        );

        match self.speech.speak(&request).await {
            Ok(audio) => Ok(SynthesisResult {
                audio_buffer: audio.bytes,
                content_type: Some(audio.content_type),
                duration,
                success: true,
                error: None,
            }),
            Err(e) => {
                log::warn!("Speech synthesis failed: {:#}", e);
                Ok(SynthesisResult::failed(SPEECH_UNAVAILABLE, duration))
            }
        }
    }

    /// Synthesizes each timestamped segment independently.
    pub async fn synthesize_short_script(&self, script: &str, options: &SynthesisOptions) -> ScriptSynthesis {
        let segments = parse_script(script);

        let settled = settle_all(segments.iter().map(|segment| async move {
            self.synthesize_text(&segment.text, options)
                .await
                .map_err(anyhow::Error::from)
        }))
        .await;

        let segments: Vec<SegmentSynthesis> = segments
            .into_iter()
            .zip(settled)
            .map(|(segment, result)| {
                let result = result.unwrap_or_else(|e| {
                    log::warn!("Segment {} rejected: {}", segment.timestamp, e);
                    SynthesisResult::failed(e.to_string(), estimate_duration_secs(&segment.text))
                });
                SegmentSynthesis {
                    timestamp: segment.timestamp,
                    text: segment.text,
                    result,
                }
            })
            .collect();

        let total_duration = segments.iter().map(|s| s.result.duration).sum();
        let success = !segments.is_empty() && segments.iter().all(|s| s.result.success);

        ScriptSynthesis {
            segments,
            total_duration,
            success,
        }
    }
}
