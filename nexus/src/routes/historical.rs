use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use echonow_cortex::core::historical::HistoricalEvent;
use echonow_cortex::core::HistoricalQuery;
use serde::Deserialize;
use super::bad_request;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityRequest {
    pub event1: HistoricalEvent,
    pub event2: HistoricalEvent,
}

pub async fn context(
    State(state): State<AppState>,
    Json(query): Json<HistoricalQuery>,
) -> impl IntoResponse {
    if query.topic.trim().is_empty() {
        return bad_request("topic cannot be empty");
    }
    Json(state.ai.get_historical_context(&query).await).into_response()
}

pub async fn similarity(
    State(state): State<AppState>,
    Json(payload): Json<SimilarityRequest>,
) -> impl IntoResponse {
    Json(
        state
            .ai
            .historian()
            .calculate_similarity_score(&payload.event1, &payload.event2)
            .await,
    )
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{call, test_router};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn context_filters_and_labels_parallels() {
        let (app, _, _) = test_router();
        let (status, body) = call(app, "POST", "/api/historical", json!({"topic": "Pandemias e saúde pública"})).await;
        assert_eq!(status, StatusCode::OK);
        let parallels = body["parallels"].as_array().unwrap();
        assert_eq!(parallels.len(), 1);
        assert_eq!(parallels[0]["title"], "Gripe espanhola");
        assert_eq!(body["relevanceLabels"], json!(["Highly relevant"]));
        assert_eq!(body["summary"], "Crises sanitárias aceleram a inovação.");
    }

    #[tokio::test]
    async fn similarity_carries_decisiveness_confidence() {
        let (app, _, _) = test_router();
        let (status, body) = call(
            app,
            "POST",
            "/api/historical/similarity",
            json!({
                "event1": {"title": "Gripe espanhola", "description": "Pandemia", "year": 1918},
                "event2": {"title": "Covid-19", "description": "Pandemia"}
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!((body["score"].as_f64().unwrap() - 0.8).abs() < 1e-9);
        assert!((body["confidence"].as_f64().unwrap() - 0.8).abs() < 1e-9);
    }
}
