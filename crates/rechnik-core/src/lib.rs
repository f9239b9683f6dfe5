//! rechnik-core: Core library for Bulgarian vocabulary enrichment
//!
//! This crate provides:
//! - Domain model for vocabulary entries and their two lifecycles
//! - SQLite storage with short claim/apply transactions
//! - The model-call pipeline: lemma detection fanning out to parallel
//!   inflection and metadata generation
//! - Resilience around every model call: response cache, circuit
//!   breaker, strict output validation
//! - Best-effort Bulgarian→English translation

pub mod breaker;
pub mod cache;
pub mod entry;
pub mod metrics;
pub mod ollama;
pub mod pipeline;
pub mod prompts;
pub mod responses;
pub mod stage;
pub mod storage;
pub mod translate;
pub mod validator;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use entry::{
    Difficulty, ExampleSentence, Inflection, PartOfSpeech, ProcessingStatus, SentenceStatus,
    VocabularyEntry,
};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use ollama::{ChatBackend, ModelOptions, OllamaClient};
pub use pipeline::{PipelineConfig, WordPipeline};
pub use responses::ProcessingResult;
pub use storage::Db;
pub use translate::{translate_with_fallback, GoogleTranslator, TranslationBackend};
