use anyhow::Context;
use echonow_cortex::core::config::load_config;
use echonow_cortex::core::llm::LlmClient;
use echonow_cortex::core::tts::TtsClient;
use echonow_cortex::core::AiService;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod routes;

#[derive(Clone)]
pub struct AppState {
    pub ai: Arc<AiService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "echonow_nexus=debug,echonow_cortex=info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("ECHONOW_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = load_config(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;

    // Every client and service is built once here and shared by all handlers.
    let ai = Arc::new(AiService::from_clients(
        Arc::new(LlmClient::new(config.llm.clone())),
        Arc::new(TtsClient::new(config.tts.clone())),
        &config,
    ));

    let health = ai.initialize().await;
    if !health.ready() {
        tracing::warn!(
            completion = health.completion,
            speech = health.speech,
            "starting with degraded upstream services"
        );
    }

    let app = routes::router(AppState { ai });

    let port = std::env::var("PORT").unwrap_or_else(|_| "8899".to_string()).parse::<u16>().unwrap_or(8899);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
