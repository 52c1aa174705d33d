use anyhow::Result;
use echonow_cortex::core::config::load_config;
use echonow_cortex::core::llm::LlmClient;
use echonow_cortex::core::tts::TtsClient;
use echonow_cortex::core::{AiService, SynthesisOptions};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Checks both upstream services and, given some text, writes a test
/// narration to `probe_output.mp3`.
///
/// Usage: `probe [text to synthesize]`
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let config_path = std::env::var("ECHONOW_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    if !Path::new(&config_path).exists() {
        log::error!("Config file not found at {}", config_path);
        return Ok(());
    }

    let config = load_config(&config_path)?;
    log::info!("Loaded config: model={} voice={}", config.llm.model, config.tts.voice_id);

    let service = AiService::from_clients(
        Arc::new(LlmClient::new(config.llm.clone())),
        Arc::new(TtsClient::new(config.tts.clone())),
        &config,
    );

    let health = service.initialize().await;
    log::info!("Completion service: {}", if health.completion { "ok" } else { "unreachable" });
    log::info!("Speech service: {}", if health.speech { "ok" } else { "unreachable" });

    let text: Vec<String> = std::env::args().skip(1).collect();
    if text.is_empty() {
        return Ok(());
    }
    let text = text.join(" ");

    log::info!("Generating audio for text: {}", text);
    match service.voice().synthesize_text(&text, &SynthesisOptions::default()).await {
        Ok(result) if result.success => {
            let output_path = "probe_output.mp3";
            fs::write(output_path, &result.audio_buffer)?;
            log::info!(
                "Saved {} bytes (~{}s estimated) to {}",
                result.audio_buffer.len(),
                result.duration,
                output_path
            );
        }
        Ok(result) => {
            log::error!("Synthesis failed: {}", result.error.unwrap_or_default());
        }
        Err(e) => {
            log::error!("Rejected input: {}", e);
        }
    }

    Ok(())
}
