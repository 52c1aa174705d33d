use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use crate::core::config::LlmConfig;

/// One chat-completion call: optional system prompt, one user prompt.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: 0.3,
            max_tokens: 1000,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Seam over the hosted language model.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the text of the first choice.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Cheap reachability probe.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let timeout = config.timeout_secs.unwrap_or(120);
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(timeout))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    fn base_url(&self) -> &str {
        // api_url is like "https://api.openai.com/v1"
        self.config.api_url.trim_end_matches('/')
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl CompletionClient for LlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": false
        });

        let url = format!("{}/chat/completions", self.base_url());
        log::debug!("Sending LLM request to {} (max_tokens={}, temperature={})", url, request.max_tokens, request.temperature);

        let res = match self.authorize(self.client.post(&url)).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Failed to connect to LLM at {}: {}", url, e);
                return Err(anyhow!("LLM Connection Failed: {}", e));
            }
        };

        if !res.status().is_success() {
            let status = res.status();
            let error_text = res.text().await.unwrap_or_default();
            log::error!("LLM Error {}: {}", status, error_text);
            return Err(anyhow!("LLM API Error {}: {}", status, error_text));
        }

        let response_json: serde_json::Value = res.json().await?;

        // OpenAI format: choices[0].message.content
        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                log::warn!("Unexpected LLM response format: {}", response_json);
                anyhow!("LLM response carried no message content")
            })?;

        Ok(strip_reasoning(content))
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models", self.base_url());
        let res = self.authorize(self.client.get(&url)).send().await?;
        if !res.status().is_success() {
            return Err(anyhow!("LLM health check failed: {}", res.status()));
        }
        Ok(())
    }
}

/// Drops a `<think>...</think>` preamble emitted by reasoning models.
pub fn strip_reasoning(content: &str) -> String {
    match content.find("</think>") {
        Some(idx) => content[idx + "</think>".len()..].trim().to_string(),
        None => content.trim().to_string(),
    }
}

/// Cuts the outermost JSON object out of a reply that may be wrapped in code
/// fences or prose.
pub fn extract_json_object(response: &str) -> Option<&str> {
    extract_delimited(response, '{', '}')
}

/// Same as [`extract_json_object`] for a top-level array.
pub fn extract_json_array(response: &str) -> Option<&str> {
    extract_delimited(response, '[', ']')
}

fn extract_delimited(response: &str, open: char, close: char) -> Option<&str> {
    let start = response.find(open)?;
    let end = response.rfind(close)?;
    if start <= end {
        Some(&response[start..=end])
    } else {
        None
    }
}

/// Parses the outermost JSON object of a reply into a loose value.
pub fn parse_json_object(response: &str) -> Option<serde_json::Value> {
    let json_str = extract_json_object(response)?;
    serde_json::from_str::<serde_json::Value>(json_str)
        .ok()
        .filter(|v| v.is_object())
}

/// Reads a string array field, skipping non-string entries.
pub fn string_list(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Reads a numeric field that the model may have sent as a number or a
/// numeric string.
pub fn loose_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_think_preamble() {
        assert_eq!(strip_reasoning("<think>hmm</think>\n  answer "), "answer");
        assert_eq!(strip_reasoning("  plain "), "plain");
    }

    #[test]
    fn extracts_object_from_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"a\": {\"b\": 1}}\n```";
        assert_eq!(extract_json_object(reply), Some("{\"a\": {\"b\": 1}}"));
        assert!(parse_json_object(reply).is_some());
    }

    #[test]
    fn extract_rejects_reversed_delimiters() {
        assert_eq!(extract_json_object("} nothing {"), None);
        assert_eq!(extract_json_array("no array here"), None);
        assert!(parse_json_object("[1, 2]").is_none());
    }

    #[test]
    fn loose_numbers_accept_strings() {
        assert_eq!(loose_f64(&json!(0.4)), Some(0.4));
        assert_eq!(loose_f64(&json!(" 0.7 ")), Some(0.7));
        assert_eq!(loose_f64(&json!("high")), None);
        assert_eq!(loose_f64(&json!(null)), None);
    }

    #[test]
    fn string_list_skips_blanks_and_non_strings() {
        let value = json!(["a", "", 3, " b "]);
        assert_eq!(string_list(&value), vec!["a".to_string(), "b".to_string()]);
        assert!(string_list(&json!("not a list")).is_empty());
    }

    #[test]
    fn request_builder_sets_fields() {
        let req = CompletionRequest::new("hi").system("sys").temperature(0.1).max_tokens(42);
        assert_eq!(req.system.as_deref(), Some("sys"));
        assert_eq!(req.max_tokens, 42);
        assert!((req.temperature - 0.1).abs() < f32::EPSILON);
    }
}
