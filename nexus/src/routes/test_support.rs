//! Scripted upstream clients and request helpers for the route tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bytes::Bytes;
use echonow_cortex::core::config::parse_config;
use echonow_cortex::core::llm::{CompletionClient, CompletionRequest};
use echonow_cortex::core::tts::{SpeechAudio, SpeechClient, SpeechRequest, Voice};
use echonow_cortex::core::AiService;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use crate::AppState;

/// Answers each service prompt with a well-formed reply.
#[derive(Default)]
pub struct RoutedCompletion {
    calls: AtomicUsize,
    down: AtomicBool,
}

impl RoutedCompletion {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_everything(&self) {
        self.down.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CompletionClient for RoutedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(anyhow!("LLM API Error 401 Unauthorized: {{\"error\":\"invalid key sk-test-0000\"}}"));
        }

        let prompt = request.prompt.as_str();
        let reply = if prompt.starts_with("Write a news article") {
            article_json().to_string()
        } else if prompt.starts_with("Analyze the following text for bias") {
            json!({"political": 0.1, "emotional": 0.1, "linguistic": 0.1, "factual": 0.1, "confidence": 0.9}).to_string()
        } else if prompt.starts_with("Compare the bias") {
            json!({"comparison": "Ambos são equilibrados.", "recommendation": "Leia os dois."}).to_string()
        } else if prompt.starts_with("Compare these two events") {
            json!({"score": 0.8, "reasoning": "Dinâmicas parecidas."}).to_string()
        } else if prompt.contains("Find 5 to 7 historical events") {
            json!({"parallels": [
                {"title": "Gripe espanhola", "year": 1918, "description": "Pandemia global", "relevanceScore": 0.85},
                {"title": "Evento irrelevante", "year": 1700, "description": "Sem relação", "relevanceScore": 0.2}
            ]})
            .to_string()
        } else if prompt.contains("Historical parallels:") {
            json!({"summary": "Crises sanitárias aceleram a inovação.", "keyInsights": [], "patterns": [], "lessons": [], "confidence": 0.6}).to_string()
        } else if prompt.starts_with("Turn this article into a narration script") {
            "[0:00] Abertura. [0:15] Encerramento.".to_string()
        } else {
            "Resposta livre.".to_string()
        };
        Ok(reply)
    }
}

/// Echoes the text back as audio; fails on texts containing `FAIL`.
#[derive(Default)]
pub struct EchoSpeech {
    calls: AtomicUsize,
}

impl EchoSpeech {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechClient for EchoSpeech {
    async fn speak(&self, request: &SpeechRequest) -> Result<SpeechAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.text.contains("FAIL") {
            return Err(anyhow!("TTS API Error 500"));
        }
        Ok(SpeechAudio {
            bytes: Bytes::from(request.text.clone().into_bytes()),
            content_type: "audio/mpeg".to_string(),
        })
    }

    async fn voices(&self) -> Result<Vec<Voice>> {
        Ok(vec![Voice {
            voice_id: "narrador".to_string(),
            name: "Narrador".to_string(),
            category: None,
        }])
    }
}

pub fn article_json() -> Value {
    json!({
        "title": "IA na saúde",
        "content": "Hospitais testam modelos de diagnóstico. Médicos revisam cada laudo.",
        "summary": "Modelos chegam aos hospitais.",
        "tags": ["ia"],
        "category": "Saúde",
        "readTime": 1,
        "biasScore": 0.0,
        "keyPoints": ["Revisão humana"],
        "sources": [],
        "generatedAt": "2026-01-01T00:00:00Z"
    })
}

pub fn test_router() -> (Router, Arc<RoutedCompletion>, Arc<EchoSpeech>) {
    let config = parse_config(
        r#"
        [llm]
        model = "gpt-4o-mini"
        api_url = "http://localhost:9"

        [tts]
        api_url = "http://localhost:9"
        voice_id = "narrador"
        "#,
    )
    .unwrap();
    let llm = Arc::new(RoutedCompletion::default());
    let speech = Arc::new(EchoSpeech::default());
    let ai = Arc::new(AiService::from_clients(llm.clone(), speech.clone(), &config));
    (super::router(AppState { ai }), llm, speech)
}

pub async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, String, Bytes) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, bytes)
}

/// JSON request, JSON response.
pub async fn call(app: Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let body = if method == "GET" { None } else { Some(body) };
    let (status, _, bytes) = send(app, method, uri, body).await;
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
