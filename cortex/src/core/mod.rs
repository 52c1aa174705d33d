pub mod bias;
pub mod config;
pub mod content;
pub mod error;
pub mod fanout;
pub mod historical;
pub mod labels;
pub mod lexicon;
pub mod llm;
pub mod models;
pub mod service;
pub mod tts;
pub mod voice;

#[cfg(test)]
mod testing;

pub use bias::{ArticleComparison, BiasDetector, BiasOptions};
pub use content::ContentGenerator;
pub use error::{GenerationError, SynthesisError};
pub use historical::{HistoricalComparator, HistoricalQuery};
pub use service::AiService;
pub use voice::{SynthesisOptions, VoiceSynthesizer};
