use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json},
};
use echonow_cortex::core::voice::SPEECH_UNAVAILABLE;
use echonow_cortex::core::SynthesisOptions;
use serde::Deserialize;
use super::{bad_gateway, synthesis_error};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeRequest {
    pub text: String,
    #[serde(flatten)]
    pub options: SynthesisOptions,
}

/// Returns the raw audio; the estimated duration goes in `x-audio-duration`.
pub async fn synthesize(
    State(state): State<AppState>,
    Json(payload): Json<SynthesizeRequest>,
) -> impl IntoResponse {
    match state.ai.voice().synthesize_text(&payload.text, &payload.options).await {
        Ok(result) if result.success => {
            let content_type = result.content_type.unwrap_or_else(|| "audio/mpeg".to_string());
            (
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::HeaderName::from_static("x-audio-duration"), result.duration.to_string()),
                ],
                result.audio_buffer,
            )
                .into_response()
        }
        Ok(result) => bad_gateway(result.error.unwrap_or_else(|| SPEECH_UNAVAILABLE.to_string())),
        Err(e) => synthesis_error(e),
    }
}

pub async fn list_voices(State(state): State<AppState>) -> impl IntoResponse {
    match state.ai.voice().list_voices().await {
        Ok(voices) => Json(voices).into_response(),
        Err(e) => {
            tracing::warn!(error = ?e, "voice listing failed");
            bad_gateway(SPEECH_UNAVAILABLE)
        }
    }
}
