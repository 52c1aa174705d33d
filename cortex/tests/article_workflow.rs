use anyhow::{anyhow, Result};
use async_trait::async_trait;
use echonow_cortex::core::config::HistoricalConfig;
use echonow_cortex::core::llm::{CompletionClient, CompletionRequest};
use echonow_cortex::core::models::{word_count, ContentCategory, GenerationRequest};
use echonow_cortex::core::{ContentGenerator, HistoricalComparator};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Answers article prompts with a fixed JSON envelope and historical
/// searches with three parallels of mixed relevance.
struct EnvelopeClient {
    category: &'static str,
    calls: AtomicUsize,
}

impl EnvelopeClient {
    fn new(category: &'static str) -> Self {
        Self {
            category,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CompletionClient for EnvelopeClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.prompt.starts_with("Write a news article") {
            let paragraph = "Hospitals are testing diagnostic models that read scans and flag anomalies for radiologists to review. ";
            return Ok(format!(
                "```json\n{}\n```",
                json!({
                    "title": "AI in healthcare moves from pilots to wards",
                    "content": paragraph.repeat(30),
                    "summary": "Diagnostic models are entering routine hospital use.",
                    "tags": ["ai", "health"],
                    "category": self.category,
                    "keyPoints": ["Regulators ask for audits", "Radiologists keep the final say"],
                    "sources": ["https://example.org/report"]
                })
            ));
        }
        if request.prompt.contains("historical events") {
            return Ok(json!({"parallels": [
                {"title": "Introduction of X-ray imaging", "year": 1896, "description": "New imaging changed diagnosis.", "relevanceScore": 0.9, "sources": ["https://example.org/xray"]},
                {"title": "Telegraph", "year": 1844, "description": "Communication shift.", "relevanceScore": 0.4},
                {"title": "Computerized tomography", "year": 1971, "description": "Machines assisted radiology.", "relevanceScore": 0.7}
            ]})
            .to_string());
        }
        Err(anyhow!("unexpected prompt"))
    }
}

fn generator(client: Arc<EnvelopeClient>) -> ContentGenerator {
    let historian = Arc::new(HistoricalComparator::new(
        client.clone(),
        HistoricalConfig::default(),
        "en-US",
    ));
    ContentGenerator::new(client, historian, "en-US")
}

fn healthcare_request() -> GenerationRequest {
    serde_json::from_value(json!({
        "topic": "AI in healthcare",
        "type": "article",
        "style": "neutral",
        "length": "medium"
    }))
    .unwrap()
}

#[tokio::test]
async fn healthcare_article_end_to_end() {
    let client = Arc::new(EnvelopeClient::new("Saúde"));
    let article = generator(client.clone())
        .generate_article(&healthcare_request())
        .await
        .unwrap();

    let words = word_count(&article.content) as u32;
    assert_eq!(article.read_time, words.div_ceil(200));
    assert!(ContentCategory::ALL.contains(&article.category));
    assert_eq!(article.category, ContentCategory::Saude);
    assert!((0.0..=1.0).contains(&article.bias_score));

    let parallels = article.historical_parallels.unwrap();
    let years: Vec<i32> = parallels.iter().map(|p| p.year).collect();
    assert_eq!(years, vec![1896, 1971]);
    assert_eq!(parallels[0].source_url.as_deref(), Some("https://example.org/xray"));

    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unlisted_category_falls_back_to_geral() {
    let client = Arc::new(EnvelopeClient::new("Astrologia"));
    let article = generator(client)
        .generate_article(&healthcare_request())
        .await
        .unwrap();
    assert_eq!(article.category, ContentCategory::Geral);

    let json = serde_json::to_value(&article).unwrap();
    assert_eq!(json["category"], "Geral");
    assert!(json["readTime"].is_u64());
}
