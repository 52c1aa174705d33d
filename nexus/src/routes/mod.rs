use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use echonow_cortex::core::{GenerationError, SynthesisError};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use crate::AppState;

pub mod articles;
pub mod bias;
pub mod health;
pub mod historical;
pub mod voice;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/articles", post(articles::create_article))
        .route("/api/content/comprehensive", post(articles::create_comprehensive))
        .route("/api/content/short", post(articles::create_short))
        .route("/api/custom", post(articles::custom_prompt))
        .route("/api/bias/analyze", post(bias::analyze))
        .route("/api/bias/batch", post(bias::batch))
        .route("/api/bias/compare", post(bias::compare))
        .route("/api/historical", post(historical::context))
        .route("/api/historical/similarity", post(historical::similarity))
        .route("/api/voice/synthesize", post(voice::synthesize))
        .route("/api/voice/voices", get(voice::list_voices))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

pub(crate) fn bad_request(message: impl Into<String>) -> Response {
    error_body(StatusCode::BAD_REQUEST, message)
}

pub(crate) fn bad_gateway(message: impl Into<String>) -> Response {
    error_body(StatusCode::BAD_GATEWAY, message)
}

pub(crate) fn generation_error(e: GenerationError) -> Response {
    if e.is_invalid_request() {
        bad_request(e.to_string())
    } else {
        tracing::error!(error = ?e, "generation failed");
        bad_gateway(e.to_string())
    }
}

pub(crate) fn synthesis_error(e: SynthesisError) -> Response {
    bad_request(e.to_string())
}

#[cfg(test)]
pub(crate) mod test_support;
