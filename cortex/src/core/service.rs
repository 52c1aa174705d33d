use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use crate::core::bias::{BiasDetector, BiasOptions};
use crate::core::config::Config;
use crate::core::content::{ContentGenerator, DEFAULT_SHORT_SECONDS};
use crate::core::error::GenerationError;
use crate::core::historical::{HistoricalAnalysis, HistoricalComparator, HistoricalQuery};
use crate::core::labels;
use crate::core::llm::CompletionClient;
use crate::core::models::{BiasAnalysis, GeneratedContent, GenerationRequest};
use crate::core::tts::SpeechClient;
use crate::core::voice::{parse_script, ScriptSegment, ScriptSynthesis, SynthesisOptions, VoiceSynthesizer};

fn default_true() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub completion: bool,
    pub speech: bool,
    pub checked_at: DateTime<Utc>,
}

impl ServiceHealth {
    pub fn ready(&self) -> bool {
        self.completion && self.speech
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensiveRequest {
    #[serde(flatten)]
    pub article: GenerationRequest,
    #[serde(default = "default_true")]
    pub include_bias_analysis: bool,
    #[serde(default = "default_true")]
    pub include_historical: bool,
    #[serde(default)]
    pub include_short: bool,
    #[serde(default)]
    pub include_audio: bool,
    #[serde(default)]
    pub short_duration: Option<u32>,
    #[serde(default)]
    pub synthesis: SynthesisOptions,
}

impl ComprehensiveRequest {
    pub fn new(article: GenerationRequest) -> Self {
        Self {
            article,
            include_bias_analysis: true,
            include_historical: true,
            include_short: false,
            include_audio: false,
            short_duration: None,
            synthesis: SynthesisOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensiveContent {
    pub article: GeneratedContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias_analysis: Option<BiasReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical_context: Option<HistoricalAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<ScriptSynthesis>,
    /// Steps that degraded to a fallback value.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortOptions {
    #[serde(default)]
    pub duration_secs: Option<u32>,
    #[serde(default)]
    pub synthesize_audio: bool,
    #[serde(default)]
    pub synthesis: SynthesisOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortContent {
    pub script: String,
    pub segments: Vec<ScriptSegment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<ScriptSynthesis>,
    pub warnings: Vec<String>,
}

/// A bias analysis with its display label and color.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BiasReport {
    #[serde(flatten)]
    pub analysis: BiasAnalysis,
    pub label: &'static str,
    pub color: &'static str,
}

impl BiasReport {
    pub fn new(analysis: BiasAnalysis) -> Self {
        Self {
            label: labels::bias_label(analysis.overall_score),
            color: labels::bias_color(analysis.overall_score),
            analysis,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalContext {
    #[serde(flatten)]
    pub analysis: HistoricalAnalysis,
    /// One relevance label per parallel, same order.
    pub relevance_labels: Vec<&'static str>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPromptOptions {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub analyze_bias: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResponse {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias_analysis: Option<BiasReport>,
    pub warnings: Vec<String>,
}

/// Workflow-level entry point composing the four services. Stateless per
/// call apart from the cached health probe.
pub struct AiService {
    content: Arc<ContentGenerator>,
    bias: Arc<BiasDetector>,
    historian: Arc<HistoricalComparator>,
    voice: Arc<VoiceSynthesizer>,
    health: OnceCell<ServiceHealth>,
}

impl AiService {
    pub fn new(
        content: Arc<ContentGenerator>,
        bias: Arc<BiasDetector>,
        historian: Arc<HistoricalComparator>,
        voice: Arc<VoiceSynthesizer>,
    ) -> Self {
        Self {
            content,
            bias,
            historian,
            voice,
            health: OnceCell::new(),
        }
    }

    /// Wires every service over one completion client and one speech client.
    pub fn from_clients(llm: Arc<dyn CompletionClient>, speech: Arc<dyn SpeechClient>, config: &Config) -> Self {
        let language = config.content.language.clone();
        let historian = Arc::new(HistoricalComparator::new(
            llm.clone(),
            config.historical.clone(),
            language.clone(),
        ));
        let content = Arc::new(ContentGenerator::new(llm.clone(), historian.clone(), language.clone()));
        let bias = Arc::new(BiasDetector::new(llm, language));
        let voice = Arc::new(VoiceSynthesizer::new(speech, config.tts.clone()));
        Self::new(content, bias, historian, voice)
    }

    pub fn content(&self) -> &ContentGenerator {
        &self.content
    }

    pub fn bias(&self) -> &BiasDetector {
        &self.bias
    }

    pub fn historian(&self) -> &HistoricalComparator {
        &self.historian
    }

    pub fn voice(&self) -> &VoiceSynthesizer {
        &self.voice
    }

    /// Probes both upstream services once; later calls return the cached result.
    pub async fn initialize(&self) -> ServiceHealth {
        self.health
            .get_or_init(|| async {
                let (completion, speech) = tokio::join!(self.content.probe(), self.voice.probe());
                let health = ServiceHealth {
                    completion,
                    speech,
                    checked_at: Utc::now(),
                };
                log::info!(
                    "AI services initialized: completion={} speech={}",
                    health.completion,
                    health.speech
                );
                health
            })
            .await
            .clone()
    }

    pub fn health(&self) -> Option<ServiceHealth> {
        self.health.get().cloned()
    }

    /// Article, then bias analysis and historical context concurrently, then
    /// the short script and its narration. Only the article itself can fail
    /// the workflow.
    pub async fn create_comprehensive_content(
        &self,
        request: &ComprehensiveRequest,
    ) -> Result<ComprehensiveContent, GenerationError> {
        let wants_short = request.include_short || request.include_audio;
        let duration = request.short_duration.unwrap_or(DEFAULT_SHORT_SECONDS);
        if wants_short && !(15..=180).contains(&duration) {
            return Err(GenerationError::InvalidRequest(format!(
                "short duration must be between 15 and 180 seconds, got {}",
                duration
            )));
        }

        let (article, search) = self.content.generate_enriched(&request.article).await?;
        let mut warnings = Vec::new();

        let bias_task = async {
            if request.include_bias_analysis {
                Some(self.bias.analyze_content(&article.content, &BiasOptions {
                    detailed: true,
                    context: Some(article.title.clone()),
                }).await)
            } else {
                None
            }
        };
        let historical_task = async {
            if request.include_historical {
                Some(self.historian.analyze_search(request.article.topic.trim(), search).await)
            } else {
                None
            }
        };
        let (bias_analysis, historical_context) = tokio::join!(bias_task, historical_task);

        if bias_analysis.as_ref().is_some_and(|a| a.is_fallback) {
            warnings.push("bias_analysis".to_string());
        }
        if historical_context.as_ref().is_some_and(|h| h.is_fallback) {
            warnings.push("historical_context".to_string());
        }

        let short_script = if wants_short {
            match self.content.generate_short_script(&article, duration).await {
                Ok(script) => Some(script),
                Err(e) => {
                    log::warn!("Short script generation failed: {}. Using summary script.", e);
                    warnings.push("short_script".to_string());
                    Some(summary_script(&article))
                }
            }
        } else {
            None
        };

        let audio = match (&short_script, request.include_audio) {
            (Some(script), true) => {
                let synthesis = self.voice.synthesize_short_script(script, &request.synthesis).await;
                if !synthesis.success {
                    warnings.push("audio".to_string());
                }
                Some(synthesis)
            }
            _ => None,
        };

        if !warnings.is_empty() {
            log::warn!("Comprehensive content for '{}' degraded: {:?}", article.title, warnings);
        }

        Ok(ComprehensiveContent {
            article,
            bias_analysis: bias_analysis.map(BiasReport::new),
            historical_context,
            short_script,
            audio,
            warnings,
        })
    }

    /// Script for an existing article, optionally narrated segment by segment.
    pub async fn create_short_from_article(
        &self,
        article: &GeneratedContent,
        options: &ShortOptions,
    ) -> Result<ShortContent, GenerationError> {
        let duration = options.duration_secs.unwrap_or(DEFAULT_SHORT_SECONDS);
        let script = self.content.generate_short_script(article, duration).await?;
        let segments = parse_script(&script);
        let mut warnings = Vec::new();

        let audio = if options.synthesize_audio {
            let synthesis = self.voice.synthesize_short_script(&script, &options.synthesis).await;
            if !synthesis.success {
                warnings.push("audio".to_string());
            }
            Some(synthesis)
        } else {
            None
        };

        Ok(ShortContent {
            script,
            segments,
            audio,
            warnings,
        })
    }

    pub async fn analyze_content_bias(&self, text: &str, options: &BiasOptions) -> BiasReport {
        BiasReport::new(self.bias.analyze_content(text, options).await)
    }

    pub async fn get_historical_context(&self, query: &HistoricalQuery) -> HistoricalContext {
        let analysis = self.historian.find_historical_parallels(query).await;
        let relevance_labels = analysis
            .parallels
            .iter()
            .map(|p| labels::relevance_label(p.relevance_score))
            .collect();
        HistoricalContext {
            analysis,
            relevance_labels,
        }
    }

    pub async fn process_custom_prompt(
        &self,
        prompt: &str,
        options: &CustomPromptOptions,
    ) -> Result<CustomResponse, GenerationError> {
        let response = self
            .content
            .generate_custom(
                prompt,
                options.system.as_deref(),
                options.temperature.unwrap_or(0.7),
                options.max_tokens.unwrap_or(1000),
            )
            .await?;

        let mut warnings = Vec::new();
        let bias_analysis = if options.analyze_bias {
            let analysis = self.bias.analyze_content(&response, &BiasOptions::default()).await;
            if analysis.is_fallback {
                warnings.push("bias_analysis".to_string());
            }
            Some(BiasReport::new(analysis))
        } else {
            None
        };

        Ok(CustomResponse {
            response,
            bias_analysis,
            warnings,
        })
    }
}

/// Single-segment script read straight from the article when the model
/// cannot write one.
fn summary_script(article: &GeneratedContent) -> String {
    let body = if article.summary.trim().is_empty() {
        &article.title
    } else {
        &article.summary
    };
    format!("[0:00] {}. {}", article.title.trim_end_matches('.'), body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::parse_config;
    use crate::core::testing::{EchoSpeech, ScriptedCompletion};
    use crate::core::llm::CompletionRequest;
    use anyhow::{anyhow, Result};
    use serde_json::json;

    fn config() -> Config {
        parse_config(
            r#"
            [llm]
            model = "gpt-4o-mini"
            api_url = "https://api.openai.com/v1"

            [tts]
            api_url = "https://api.elevenlabs.io"
            voice_id = "narrador"
            "#,
        )
        .unwrap()
    }

    fn article_reply() -> String {
        json!({
            "title": "Reforma tributária avança",
            "content": "O Senado aprovou a proposta. Economistas divergem sobre os efeitos.",
            "summary": "Senado aprova a reforma.",
            "tags": ["impostos"],
            "category": "Economia",
            "keyPoints": ["Aprovação no Senado"],
            "sources": []
        })
        .to_string()
    }

    fn parallels_reply() -> String {
        json!({"parallels": [
            {"title": "Plano Real", "year": 1994, "description": "Reforma monetária", "relevanceScore": 0.9},
            {"title": "Reforma de 1965", "year": 1965, "description": "Código tributário", "relevanceScore": 0.7}
        ]})
        .to_string()
    }

    /// Answers each service's prompt with a well-formed reply unless the
    /// prompt kind is listed in `failing`.
    fn router(failing: &'static [&'static str]) -> impl Fn(&CompletionRequest) -> Result<String> + Send + Sync {
        move |req| {
            let kind = if req.prompt.starts_with("Write a news article") {
                "article"
            } else if req.prompt.starts_with("Analyze the following text for bias") {
                "bias"
            } else if req.prompt.contains("Find 5 to 7 historical events") {
                "parallels"
            } else if req.prompt.contains("Historical parallels:") {
                "patterns"
            } else if req.prompt.starts_with("Turn this article into a narration script") {
                "script"
            } else {
                "custom"
            };
            if failing.contains(&kind) {
                return Err(anyhow!("{} upstream down", kind));
            }
            Ok(match kind {
                "article" => article_reply(),
                "bias" => json!({"political": 0.2, "emotional": 0.1, "linguistic": 0.1, "factual": 0.2, "confidence": 0.8}).to_string(),
                "parallels" => parallels_reply(),
                "patterns" => json!({"summary": "Reformas exigem consenso.", "keyInsights": ["x"], "patterns": ["y"], "lessons": ["z"], "confidence": 0.7}).to_string(),
                "script" => "[0:00] Abertura. [0:20] Detalhes. [0:40] Fim.".to_string(),
                _ => "Resposta livre.".to_string(),
            })
        }
    }

    fn service(failing: &'static [&'static str]) -> (Arc<ScriptedCompletion>, Arc<EchoSpeech>, AiService) {
        let llm = Arc::new(ScriptedCompletion::with(router(failing)));
        let speech = Arc::new(EchoSpeech::default());
        let service = AiService::from_clients(llm.clone(), speech.clone(), &config());
        (llm, speech, service)
    }

    #[tokio::test]
    async fn comprehensive_workflow_runs_every_step() {
        let (_, speech, service) = service(&[]);
        let mut request = ComprehensiveRequest::new(GenerationRequest::new("Reforma tributária"));
        request.include_audio = true;

        let result = service.create_comprehensive_content(&request).await.unwrap();

        assert_eq!(result.article.title, "Reforma tributária avança");
        let bias = result.bias_analysis.unwrap();
        assert!(!bias.analysis.is_fallback);
        assert_eq!(bias.label, labels::bias_label(bias.analysis.overall_score));
        let history = result.historical_context.unwrap();
        assert_eq!(history.parallels.len(), 2);
        assert_eq!(history.summary, "Reformas exigem consenso.");
        assert!(result.short_script.unwrap().starts_with("[0:00]"));
        let audio = result.audio.unwrap();
        assert!(audio.success);
        assert_eq!(audio.segments.len(), 3);
        assert_eq!(speech.call_count(), 3);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn comprehensive_workflow_searches_the_topic_once() {
        let (llm, _, service) = service(&[]);
        let request = ComprehensiveRequest::new(GenerationRequest::new("Reforma tributária"));

        let result = service.create_comprehensive_content(&request).await.unwrap();

        let searches = llm
            .calls()
            .iter()
            .filter(|c| c.prompt.contains("Find 5 to 7 historical events"))
            .count();
        assert_eq!(searches, 1);
        let article_ids: Vec<String> = result
            .article
            .historical_parallels
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        let context_ids: Vec<String> = result
            .historical_context
            .unwrap()
            .parallels
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(article_ids.len(), 2);
        assert_eq!(article_ids, context_ids);
    }

    #[tokio::test]
    async fn degraded_steps_are_reported_not_fatal() {
        let (_, _, service) = service(&["bias", "parallels", "script"]);
        let mut request = ComprehensiveRequest::new(GenerationRequest::new("Reforma tributária"));
        request.include_short = true;

        let result = service.create_comprehensive_content(&request).await.unwrap();

        assert!(result.bias_analysis.unwrap().analysis.is_fallback);
        assert!(result.historical_context.unwrap().parallels.is_empty());
        assert_eq!(
            result.short_script.as_deref(),
            Some("[0:00] Reforma tributária avança. Senado aprova a reforma.")
        );
        assert_eq!(result.warnings, vec!["bias_analysis", "historical_context", "short_script"]);
    }

    #[tokio::test]
    async fn article_failure_aborts_the_workflow() {
        let (llm, speech, service) = service(&["article"]);
        let request = ComprehensiveRequest::new(GenerationRequest::new("Reforma tributária"));
        let err = service.create_comprehensive_content(&request).await.unwrap_err();
        assert!(matches!(err, GenerationError::Completion(_)));
        assert_eq!(llm.call_count(), 1);
        assert_eq!(speech.call_count(), 0);
    }

    #[tokio::test]
    async fn invalid_short_duration_is_rejected_before_any_call() {
        let (llm, _, service) = service(&[]);
        let mut request = ComprehensiveRequest::new(GenerationRequest::new("Reforma tributária"));
        request.include_short = true;
        request.short_duration = Some(600);
        let err = service.create_comprehensive_content(&request).await.unwrap_err();
        assert!(err.is_invalid_request());
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn optional_steps_can_be_skipped() {
        let (llm, _, service) = service(&[]);
        let mut request = ComprehensiveRequest::new(GenerationRequest::new("Reforma tributária"));
        request.include_bias_analysis = false;
        request.include_historical = false;

        let result = service.create_comprehensive_content(&request).await.unwrap();
        assert!(result.bias_analysis.is_none());
        assert!(result.historical_context.is_none());
        assert!(result.short_script.is_none());
        // article plus its best-effort enrichment lookup
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn short_from_article_parses_and_narrates_segments() {
        let (_, _, service) = service(&[]);
        let article = service
            .content()
            .generate_article(&GenerationRequest::new("Reforma tributária"))
            .await
            .unwrap();
        let options = ShortOptions {
            synthesize_audio: true,
            ..Default::default()
        };
        let short = service.create_short_from_article(&article, &options).await.unwrap();
        let stamps: Vec<_> = short.segments.iter().map(|s| s.timestamp.as_str()).collect();
        assert_eq!(stamps, vec!["0:00", "0:20", "0:40"]);
        assert!(short.audio.unwrap().success);
        assert!(short.warnings.is_empty());
    }

    #[tokio::test]
    async fn bias_report_carries_label_and_color() {
        let (_, _, service) = service(&[]);
        let report = service
            .analyze_content_bias("O governo anunciou o plano.", &BiasOptions::default())
            .await;
        assert_eq!(report.label, "Low bias");
        assert_eq!(report.color, labels::bias_color(report.analysis.overall_score));

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["overallScore"].is_number());
        assert_eq!(json["label"], "Low bias");
    }

    #[tokio::test]
    async fn historical_context_labels_each_parallel() {
        let (_, _, service) = service(&[]);
        let context = service
            .get_historical_context(&HistoricalQuery::new("Reforma tributária"))
            .await;
        assert_eq!(context.relevance_labels, vec!["Highly relevant", "Relevant"]);
    }

    #[tokio::test]
    async fn custom_prompt_with_bias_analysis() {
        let (llm, _, service) = service(&[]);
        let options = CustomPromptOptions {
            analyze_bias: true,
            ..Default::default()
        };
        let result = service.process_custom_prompt("Explique a reforma.", &options).await.unwrap();
        assert_eq!(result.response, "Resposta livre.");
        assert!(result.bias_analysis.is_some());
        assert_eq!(llm.call_count(), 2);
        assert!((llm.calls()[0].temperature - 0.7).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn empty_custom_prompt_is_invalid() {
        let (llm, _, service) = service(&[]);
        let err = service
            .process_custom_prompt("  ", &CustomPromptOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_invalid_request());
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn initialize_probes_once() {
        let (_, speech, service) = service(&[]);
        assert!(service.health().is_none());
        let first = service.initialize().await;
        assert!(first.ready());
        let second = service.initialize().await;
        assert_eq!(first.checked_at, second.checked_at);
        assert!(service.health().is_some());
        assert_eq!(speech.call_count(), 0);
    }
}
