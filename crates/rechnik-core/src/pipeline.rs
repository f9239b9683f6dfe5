//! Word-enrichment orchestrator.
//!
//! One run fans out like this:
//!
//! ```text
//! input word → [lemma detection] → lemma + POS
//!                    │
//!         ┌─────────┴──────────┐        (parallel)
//!   [inflection table]   [metadata]
//!         └─────────┬──────────┘
//!                 merge → ProcessingResult
//! ```
//!
//! The run itself holds no database resources; callers persist the
//! merged result afterwards. A run never returns an error: every stage
//! failure is folded into the result as a warning.

use std::sync::Arc;
use std::time::Duration;

use tokio::task;
use tracing::{debug, warn};

use crate::breaker::{BreakerConfig, BreakerState, CircuitBreaker};
use crate::cache::normalize_key;
use crate::entry::PartOfSpeech;
use crate::metrics::PipelineMetrics;
use crate::ollama::{parse_model_json, ChatBackend};
use crate::prompts;
use crate::responses::{InflectionSet, LemmaDetection, Metadata, ProcessingResult, SentenceSet};
use crate::stage::StageService;
use crate::validator;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub cache_ttl: Duration,
    pub word_breaker: BreakerConfig,
    pub sentence_breaker: BreakerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            cache_ttl: crate::cache::DEFAULT_TTL,
            word_breaker: BreakerConfig::default(),
            sentence_breaker: BreakerConfig::default(),
        }
    }
}

pub struct WordPipeline {
    word_backend: Arc<dyn ChatBackend>,
    sentence_backend: Arc<dyn ChatBackend>,
    lemma_stage: StageService<LemmaDetection>,
    inflection_stage: StageService<InflectionSet>,
    metadata_stage: StageService<Metadata>,
    sentence_stage: StageService<SentenceSet>,
    word_breaker: Arc<CircuitBreaker>,
    sentence_breaker: Arc<CircuitBreaker>,
    metrics: Arc<PipelineMetrics>,
}

impl WordPipeline {
    /// Wires up the stage services. The three word stages share one
    /// breaker; sentence generation has its own so a struggling large
    /// model never blocks word enrichment.
    pub fn new(
        word_backend: Arc<dyn ChatBackend>,
        sentence_backend: Arc<dyn ChatBackend>,
        config: &PipelineConfig,
    ) -> Self {
        let word_breaker = Arc::new(CircuitBreaker::new("ollama", config.word_breaker));
        let sentence_breaker = Arc::new(CircuitBreaker::new(
            "ollama-sentence",
            config.sentence_breaker,
        ));
        let metrics = Arc::new(PipelineMetrics::default());
        WordPipeline {
            lemma_stage: StageService::new(
                "lemma-detection",
                config.cache_ttl,
                Arc::clone(&word_breaker),
                Arc::clone(&metrics.lemma),
            ),
            inflection_stage: StageService::new(
                "inflection-generation",
                config.cache_ttl,
                Arc::clone(&word_breaker),
                Arc::clone(&metrics.inflections),
            ),
            metadata_stage: StageService::new(
                "metadata-generation",
                config.cache_ttl,
                Arc::clone(&word_breaker),
                Arc::clone(&metrics.metadata),
            ),
            sentence_stage: StageService::new(
                "sentence-generation",
                config.cache_ttl,
                Arc::clone(&sentence_breaker),
                Arc::clone(&metrics.sentences),
            ),
            word_backend,
            sentence_backend,
            word_breaker,
            sentence_breaker,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    pub fn breaker_states(&self) -> [(String, BreakerState); 2] {
        [
            (self.word_breaker.name().to_string(), self.word_breaker.state()),
            (
                self.sentence_breaker.name().to_string(),
                self.sentence_breaker.state(),
            ),
        ]
    }

    fn detect_lemma(&self, word: &str) -> Option<LemmaDetection> {
        self.lemma_stage.execute(word, || {
            let raw = self.word_backend.generate(&prompts::lemma_detection(word))?;
            let detection: LemmaDetection = parse_model_json(&raw)?;
            validator::validate_lemma_detection(&detection)?;
            Ok(detection)
        })
    }

    fn generate_inflections(&self, lemma: &str, part_of_speech: &str) -> Option<InflectionSet> {
        let key = format!("{lemma}|{part_of_speech}");
        self.inflection_stage.execute(&key, || {
            let raw = self
                .word_backend
                .generate(&prompts::inflections(part_of_speech, lemma))?;
            let set: InflectionSet = parse_model_json(&raw)?;
            validator::validate_inflection_set(&set)?;
            Ok(set)
        })
    }

    fn generate_metadata(&self, lemma: &str, hint: Option<&str>) -> Option<Metadata> {
        let key = format!("{lemma}|{}", hint.unwrap_or(""));
        self.metadata_stage.execute(&key, || {
            let raw = self
                .word_backend
                .generate(&prompts::metadata(lemma, hint))?;
            let metadata: Metadata = parse_model_json(&raw)?;
            validator::validate_metadata(&metadata)?;
            Ok(metadata)
        })
    }

    /// Generates validated example sentences for a lemma, or `None` on
    /// any failure. Blocking; callers run it on a blocking thread.
    pub fn generate_sentences(
        &self,
        lemma: &str,
        translation: Option<&str>,
        part_of_speech: Option<&str>,
    ) -> Option<SentenceSet> {
        self.sentence_stage.execute(lemma, || {
            let raw = self
                .sentence_backend
                .generate(&prompts::sentences(lemma, translation, part_of_speech))?;
            let set: SentenceSet = parse_model_json(&raw)?;
            validator::validate_sentence_set(&set)?;
            Ok(set)
        })
    }

    /// Runs the full word pipeline for one input. `hint` is the user's
    /// combined translation and notes, used both to disambiguate
    /// metadata and, when it unambiguously names a part of speech, to
    /// override the detected one.
    pub async fn process_word(self: &Arc<Self>, input: &str, hint: Option<&str>) -> ProcessingResult {
        let input = normalize_key(input);

        let pipeline = Arc::clone(self);
        let word = input.clone();
        let detection = match task::spawn_blocking(move || pipeline.detect_lemma(&word)).await {
            Ok(Some(d)) => d,
            Ok(None) => {
                return ProcessingResult::unavailable(
                    &input,
                    format!("failed to detect lemma from input: '{input}'"),
                );
            }
            Err(e) => {
                warn!(word = %input, "detection task panicked: {e}");
                return ProcessingResult::unavailable(
                    &input,
                    format!("processing failed unexpectedly for '{input}'"),
                );
            }
        };

        if detection.detection_failed {
            debug!(word = %input, "model declined lemma detection, skipping enrichment");
            return ProcessingResult::detection_declined(
                &input,
                detection,
                format!("could not detect lemma for '{input}'"),
            );
        }

        let lemma = normalize_key(&detection.lemma);
        let hint_pos = hint.and_then(PartOfSpeech::from_hint);
        let part_of_speech = match hint_pos {
            Some(pos) => {
                debug!(word = %input, pos = pos.as_str(), "part of speech overridden by hint");
                pos.as_str().to_string()
            }
            None => detection.part_of_speech.trim().to_ascii_uppercase(),
        };

        let p = Arc::clone(self);
        let (l, pos) = (lemma.clone(), part_of_speech.clone());
        let inflection_task = task::spawn_blocking(move || p.generate_inflections(&l, &pos));

        let p = Arc::clone(self);
        let l = lemma.clone();
        let h = hint.map(str::to_string);
        let metadata_task = task::spawn_blocking(move || p.generate_metadata(&l, h.as_deref()));

        let (inflections, metadata) = tokio::join!(inflection_task, metadata_task);
        let inflections = inflections.ok().flatten();
        let metadata = metadata.ok().flatten();

        let mut warnings = Vec::new();
        if inflections.is_none() {
            warnings.push(format!("inflection generation failed for '{lemma}'"));
        }
        if metadata.is_none() {
            warnings.push(format!("metadata generation failed for '{lemma}'"));
        }
        let fully_successful = inflections.is_some() && metadata.is_some();

        // Effective POS: hint wins, then metadata, then detection. The
        // model's strings are parsed defensively so a stray value never
        // poisons the entry.
        let part_of_speech = hint_pos
            .or_else(|| {
                metadata
                    .as_ref()
                    .and_then(|m| PartOfSpeech::parse(&m.part_of_speech))
            })
            .or_else(|| PartOfSpeech::parse(&detection.part_of_speech));

        ProcessingResult {
            original_input: input,
            detection,
            inflections,
            metadata,
            part_of_speech,
            fully_successful,
            warnings,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted backend: routes on prompt content, records call counts.
    struct ScriptedBackend {
        calls: AtomicUsize,
        detection: Mutex<Result<String, String>>,
        inflections: Mutex<Result<String, String>>,
        metadata: Mutex<Result<String, String>>,
    }

    impl ScriptedBackend {
        fn happy_cat() -> Self {
            ScriptedBackend {
                calls: AtomicUsize::new(0),
                detection: Mutex::new(Ok(
                    r#"{"wordForm":"котки","lemma":"котка","partOfSpeech":"NOUN"}"#.into(),
                )),
                inflections: Mutex::new(Ok(r#"{"lemma":"котка","partOfSpeech":"NOUN",
                    "inflections":[
                      {"text":"котка","grammaticalTags":"sg.indef","difficultyLevel":"BASIC"},
                      {"text":"котки","grammaticalTags":"pl.indef","difficultyLevel":"INTERMEDIATE"}
                    ]}"#
                    .into())),
                metadata: Mutex::new(Ok(r#"{"lemma":"котка","partOfSpeech":"NOUN",
                    "category":"animals","difficultyLevel":"BEGINNER"}"#
                    .into())),
            }
        }

        fn with_metadata(self, result: Result<String, String>) -> Self {
            *self.metadata.lock().unwrap() = result;
            self
        }

        fn with_detection(self, result: Result<String, String>) -> Self {
            *self.detection.lock().unwrap() = result;
            self
        }
    }

    impl ChatBackend for ScriptedBackend {
        fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let slot = if prompt.contains("identify its lemma") {
                &self.detection
            } else if prompt.contains("Generate ALL inflections") {
                &self.inflections
            } else {
                &self.metadata
            };
            match &*slot.lock().unwrap() {
                Ok(s) => Ok(s.clone()),
                Err(e) => anyhow::bail!("{e}"),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct FailingBackend;

    impl ChatBackend for FailingBackend {
        fn generate(&self, _prompt: &str) -> Result<String> {
            anyhow::bail!("connection refused")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn pipeline(backend: ScriptedBackend) -> (Arc<WordPipeline>, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let p = Arc::new(WordPipeline::new(
            Arc::clone(&backend) as Arc<dyn ChatBackend>,
            Arc::new(FailingBackend),
            &PipelineConfig::default(),
        ));
        (p, backend)
    }

    #[tokio::test]
    async fn test_happy_path() {
        let (p, backend) = pipeline(ScriptedBackend::happy_cat());
        let result = p.process_word("Котки", None).await;
        assert!(result.fully_successful);
        assert!(result.warnings.is_empty());
        assert_eq!(result.detection.lemma, "котка");
        assert_eq!(result.part_of_speech, Some(PartOfSpeech::Noun));
        assert!(result.error.is_none());
        assert_eq!(result.inflections.as_ref().unwrap().inflections.len(), 2);
        assert_eq!(
            result.metadata.as_ref().unwrap().difficulty_level,
            "BEGINNER"
        );
        // one call per stage
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_repeat_run_is_fully_cached() {
        let (p, backend) = pipeline(ScriptedBackend::happy_cat());
        p.process_word("котки", None).await;
        let second = p.process_word("КОТКИ ", None).await;
        assert!(second.fully_successful);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_stage() {
        let backend =
            ScriptedBackend::happy_cat().with_metadata(Err("model timed out".into()));
        let (p, _) = pipeline(backend);
        let result = p.process_word("котки", None).await;
        assert!(!result.fully_successful);
        assert!(result.inflections.is_some());
        assert!(result.metadata.is_none());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("metadata"));
    }

    #[tokio::test]
    async fn test_declared_detection_failure_short_circuits() {
        let backend = ScriptedBackend::happy_cat().with_detection(Ok(
            r#"{"wordForm":"xyzzy","lemma":"","partOfSpeech":"","detectionFailed":true}"#.into(),
        ));
        let (p, backend) = pipeline(backend);
        let result = p.process_word("xyzzy", None).await;
        assert!(!result.fully_successful);
        assert!(result.detection.detection_failed);
        // declined, not failed: the entry still completes, with a warning
        assert!(result.error.is_none());
        assert!(result.inflections.is_none());
        assert!(result.metadata.is_none());
        assert_eq!(result.warnings.len(), 1);
        // only the detection call went out
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hint_overrides_detected_pos() {
        // detection says NOUN; hint says verb
        let (p, _) = pipeline(ScriptedBackend::happy_cat());
        let result = p.process_word("котки", Some("this is actually a verb")).await;
        assert_eq!(result.part_of_speech, Some(PartOfSpeech::Verb));
    }

    #[tokio::test]
    async fn test_detection_unavailable_is_hard_failure() {
        let p = Arc::new(WordPipeline::new(
            Arc::new(FailingBackend),
            Arc::new(FailingBackend),
            &PipelineConfig::default(),
        ));
        let result = p.process_word("котки", None).await;
        assert!(!result.fully_successful);
        assert!(result.error.is_some());
        assert!(result.error.as_ref().unwrap().contains("котки"));
    }

    #[test]
    fn test_sentence_generation_validates() {
        let p = WordPipeline::new(
            Arc::new(FailingBackend),
            Arc::new(FailingBackend),
            &PipelineConfig::default(),
        );
        assert!(p.generate_sentences("котка", Some("cat"), Some("NOUN")).is_none());
    }
}
