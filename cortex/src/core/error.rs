use thiserror::Error;

/// Failures of the primary generation calls. Everything else in the
/// orchestration layer degrades to a fallback value instead.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("completion client returned no content")]
    EmptyResponse,

    #[error("completion response could not be turned into an article")]
    Unsalvageable,

    /// The upstream detail stays in the source chain for logging only.
    #[error("completion service unavailable")]
    Completion(#[source] anyhow::Error),
}

impl GenerationError {
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, GenerationError::InvalidRequest(_))
    }
}

/// Local precondition failures of the voice synthesizer, raised before any
/// network call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("text cannot be empty")]
    EmptyText,

    #[error("text too long: {len} characters (max {max})")]
    TextTooLong { len: usize, max: usize },
}
