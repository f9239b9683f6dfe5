//! Transient shapes the language model fills in, one per pipeline stage.
//!
//! These are parsed strictly from the model's JSON output: a missing
//! required field is a validation failure, never a panic or a retry.

use serde::{Deserialize, Serialize};

/// Stage 1 output: lemma and part of speech for a raw word form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LemmaDetection {
    pub word_form: String,
    pub lemma: String,
    pub part_of_speech: String,
    /// Set by the model when the input is not recognizable Bulgarian.
    /// A failed detection is a *valid* response and gets cached like any
    /// other, so repeated junk input never re-hits the model.
    #[serde(default)]
    pub detection_failed: bool,
}

impl LemmaDetection {
    /// Sentinel used when the detection stage itself was unavailable.
    pub fn unavailable(word_form: &str) -> Self {
        LemmaDetection {
            word_form: word_form.to_string(),
            lemma: String::new(),
            part_of_speech: String::new(),
            detection_failed: true,
        }
    }
}

/// One inflected form inside an [`InflectionSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InflectionEntry {
    pub text: String,
    pub grammatical_tags: String,
    #[serde(default)]
    pub difficulty_level: Option<String>,
    #[serde(default)]
    pub accented_form: Option<String>,
}

/// Stage 2a output: the full inflection table for a lemma.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InflectionSet {
    pub lemma: String,
    pub part_of_speech: String,
    pub inflections: Vec<InflectionEntry>,
}

/// Stage 2b output: learner-facing metadata for a lemma.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub lemma: String,
    pub part_of_speech: String,
    #[serde(default)]
    pub category: Option<String>,
    pub difficulty_level: String,
}

/// One generated sentence pair inside a [`SentenceSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceEntry {
    pub bulgarian_text: String,
    pub english_translation: String,
}

/// Output of the sentence stage: example sentences for a lemma.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceSet {
    pub lemma: String,
    pub sentences: Vec<SentenceEntry>,
}

/// Merged outcome of one word-enrichment run, handed back to the caller
/// for persistence.
///
/// `error` is set only when the pipeline itself was unavailable (breaker
/// open, transport down); that marks the entry FAILED. Everything softer,
/// including the model declaring it cannot detect a lemma, completes with
/// warnings and whatever stages did succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingResult {
    pub original_input: String,
    pub detection: LemmaDetection,
    pub inflections: Option<InflectionSet>,
    pub metadata: Option<Metadata>,
    /// Effective part of speech after hint override and defensive
    /// parsing of model output. `None` when nothing usable came back.
    pub part_of_speech: Option<crate::entry::PartOfSpeech>,
    /// True only when detection succeeded and both fan-out stages
    /// produced validated output.
    pub fully_successful: bool,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl ProcessingResult {
    /// Result for a run where the detection stage itself was unavailable.
    pub fn unavailable(input: &str, error: String) -> Self {
        ProcessingResult {
            original_input: input.to_string(),
            detection: LemmaDetection::unavailable(input),
            inflections: None,
            metadata: None,
            part_of_speech: None,
            fully_successful: false,
            warnings: Vec::new(),
            error: Some(error),
        }
    }

    /// Result for a run the model declined at the detection step.
    pub fn detection_declined(input: &str, detection: LemmaDetection, warning: String) -> Self {
        ProcessingResult {
            original_input: input.to_string(),
            detection,
            inflections: None,
            metadata: None,
            part_of_speech: None,
            fully_successful: false,
            warnings: vec![warning],
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_parses_camel_case() {
        let d: LemmaDetection = serde_json::from_str(
            r#"{"wordForm":"котки","lemma":"котка","partOfSpeech":"NOUN"}"#,
        )
        .unwrap();
        assert_eq!(d.lemma, "котка");
        assert!(!d.detection_failed);
    }

    #[test]
    fn test_detection_missing_field_is_error() {
        let r: Result<LemmaDetection, _> =
            serde_json::from_str(r#"{"wordForm":"котки","lemma":"котка"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn test_inflection_optional_fields_default() {
        let set: InflectionSet = serde_json::from_str(
            r#"{"lemma":"котка","partOfSpeech":"NOUN",
                "inflections":[{"text":"котки","grammaticalTags":"plural"}]}"#,
        )
        .unwrap();
        assert_eq!(set.inflections.len(), 1);
        assert!(set.inflections[0].difficulty_level.is_none());
        assert!(set.inflections[0].accented_form.is_none());
    }
}
