//! In-memory client doubles shared by the unit tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;
use crate::core::llm::{CompletionClient, CompletionRequest};
use crate::core::tts::{SpeechAudio, SpeechClient, SpeechRequest, Voice};

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

pub struct ScriptedCompletion {
    queue: Mutex<VecDeque<Result<String>>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    /// Answers calls in order; errors once the queue runs dry.
    pub fn queue(responses: Vec<Result<String>>) -> Self {
        Self {
            queue: Mutex::new(responses.into()),
            responder: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replies(responses: &[&str]) -> Self {
        Self::queue(responses.iter().map(|r| Ok(r.to_string())).collect())
    }

    /// Answers every call from the request itself.
    pub fn with<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(responder)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::with(|_| Err(anyhow!("upstream unavailable")))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.calls.lock().unwrap().push(request.clone());
        if let Some(responder) = &self.responder {
            return responder(&request);
        }
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted response left")))
    }
}

/// Speech double: echoes the text back as audio, fails on texts containing
/// `FAIL`.
#[derive(Default)]
pub struct EchoSpeech {
    calls: Mutex<Vec<SpeechRequest>>,
}

impl EchoSpeech {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<SpeechRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechClient for EchoSpeech {
    async fn speak(&self, request: &SpeechRequest) -> Result<SpeechAudio> {
        self.calls.lock().unwrap().push(request.clone());
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
            voice_id: "test-voice".to_string(),
            name: "Test".to_string(),
            category: Some("premade".to_string()),
        }])
    }
}
