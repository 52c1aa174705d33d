use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use echonow_cortex::core::models::{GeneratedContent, GenerationRequest};
use echonow_cortex::core::service::{ComprehensiveRequest, CustomPromptOptions, ShortOptions};
use serde::Deserialize;
use super::generation_error;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortRequest {
    pub article: GeneratedContent,
    #[serde(flatten)]
    pub options: ShortOptions,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRequest {
    pub prompt: String,
    #[serde(flatten)]
    pub options: CustomPromptOptions,
}

pub async fn create_article(
    State(state): State<AppState>,
    Json(payload): Json<GenerationRequest>,
) -> impl IntoResponse {
    match state.ai.content().generate_article(&payload).await {
        Ok(article) => Json(article).into_response(),
        Err(e) => generation_error(e),
    }
}

pub async fn create_comprehensive(
    State(state): State<AppState>,
    Json(payload): Json<ComprehensiveRequest>,
) -> impl IntoResponse {
    match state.ai.create_comprehensive_content(&payload).await {
        Ok(content) => Json(content).into_response(),
        Err(e) => generation_error(e),
    }
}

pub async fn create_short(
    State(state): State<AppState>,
    Json(payload): Json<ShortRequest>,
) -> impl IntoResponse {
    match state.ai.create_short_from_article(&payload.article, &payload.options).await {
        Ok(short) => Json(short).into_response(),
        Err(e) => generation_error(e),
    }
}

pub async fn custom_prompt(
    State(state): State<AppState>,
    Json(payload): Json<CustomRequest>,
) -> impl IntoResponse {
    match state.ai.process_custom_prompt(&payload.prompt, &payload.options).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => generation_error(e),
    }
}
