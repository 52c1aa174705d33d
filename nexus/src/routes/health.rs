use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use serde_json::json;
use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.ai.initialize().await;
    Json(json!({
        "status": if health.ready() { "ok" } else { "degraded" },
        "completion": health.completion,
        "speech": health.speech,
        "checkedAt": health.checked_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{call, test_router};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn health_reports_both_services() {
        let (app, llm, _) = test_router();
        let (status, body) = call(app, "GET", "/api/health", json!(null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["completion"], true);
        assert_eq!(body["speech"], true);
        assert_eq!(llm.call_count(), 0);
    }
}
