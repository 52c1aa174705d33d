use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use echonow_cortex::core::service::BiasReport;
use echonow_cortex::core::BiasOptions;
use serde::Deserialize;
use super::bad_request;
use crate::AppState;

/// Largest batch accepted in one request.
const MAX_BATCH: usize = 20;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(alias = "content")]
    pub text: String,
    #[serde(flatten)]
    pub options: BiasOptions,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub contents: Vec<String>,
    #[serde(flatten)]
    pub options: BiasOptions,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    pub article1: String,
    pub article2: String,
}

pub async fn analyze(
    State(state): State<AppState>,
    Json(payload): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    if payload.text.trim().is_empty() {
        return bad_request("text cannot be empty");
    }
    Json(state.ai.analyze_content_bias(&payload.text, &payload.options).await).into_response()
}

pub async fn batch(
    State(state): State<AppState>,
    Json(payload): Json<BatchRequest>,
) -> impl IntoResponse {
    if payload.contents.is_empty() {
        return bad_request("contents cannot be empty");
    }
    if payload.contents.len() > MAX_BATCH {
        return bad_request(format!("at most {} texts per batch", MAX_BATCH));
    }

    let results: Vec<BiasReport> = state
        .ai
        .bias()
        .batch_analyze(&payload.contents, &payload.options)
        .await
        .into_iter()
        .map(BiasReport::new)
        .collect();
    Json(results).into_response()
}

pub async fn compare(
    State(state): State<AppState>,
    Json(payload): Json<CompareRequest>,
) -> impl IntoResponse {
    if payload.article1.trim().is_empty() || payload.article2.trim().is_empty() {
        return bad_request("both articles are required");
    }
    Json(state.ai.bias().compare_articles(&payload.article1, &payload.article2).await).into_response()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{call, test_router};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn analyze_returns_labeled_report() {
        let (app, _, _) = test_router();
        let (status, body) = call(
            app,
            "POST",
            "/api/bias/analyze",
            json!({"content": "O ministério publicou o relatório anual.", "detailed": true}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["label"], "Low bias");
        assert_eq!(body["color"], "#16a34a");
        assert_eq!(body["isFallback"], false);
        assert!(body["categories"]["factual"].is_number());
    }

    #[tokio::test]
    async fn batch_keeps_input_order_and_length() {
        let (app, llm, _) = test_router();
        let (status, body) = call(
            app,
            "POST",
            "/api/bias/batch",
            json!({"contents": ["primeiro texto", "segundo texto", "terceiro texto"]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected() {
        let (app, llm, _) = test_router();
        let contents: Vec<String> = (0..21).map(|i| format!("texto {}", i)).collect();
        let (status, _) = call(app, "POST", "/api/bias/batch", json!({ "contents": contents })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn compare_returns_structured_verdict() {
        let (app, _, _) = test_router();
        let (status, body) = call(
            app,
            "POST",
            "/api/bias/compare",
            json!({"article1": "Texto um.", "article2": "Texto dois."}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["comparison"], "Ambos são equilibrados.");
        assert_eq!(body["recommendation"], "Leia os dois.");
        assert!(body["article1Bias"]["overallScore"].is_number());
    }

    #[tokio::test]
    async fn malformed_json_is_rejected_by_extractor() {
        let (app, _, _) = test_router();
        let (status, _) = call(app, "POST", "/api/bias/analyze", json!({"wrong": 1})).await;
        assert!(status.is_client_error());
    }
}
