//! Structural validation of model output before anything touches the
//! database. A response that parses but fails these checks is treated
//! exactly like a transport failure by the stage layer: counted against
//! the circuit breaker and replaced with `None`.

use std::error::Error;
use std::fmt;

use crate::entry::{Difficulty, PartOfSpeech};
use crate::responses::{InflectionSet, LemmaDetection, Metadata, SentenceSet};

pub const MAX_LEMMA_LEN: usize = 100;

/// A model response that is well-formed JSON but semantically unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    msg: String,
}

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        ValidationError { msg: msg.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid model output: {}", self.msg)
    }
}

impl Error for ValidationError {}

fn is_cyrillic(c: char) -> bool {
    ('\u{0400}'..='\u{04FF}').contains(&c)
}

/// True if the string contains at least one Cyrillic character.
pub fn contains_cyrillic(s: &str) -> bool {
    s.chars().any(is_cyrillic)
}

/// Minimum number of inflected forms a usable set must contain.
/// Verbs conjugate across persons, nouns decline for number and
/// definiteness, adjectives agree in gender.
pub fn minimum_inflections(pos: &str) -> usize {
    match pos.trim().to_ascii_uppercase().as_str() {
        "VERB" => 6,
        "ADJECTIVE" => 3,
        "NOUN" => 2,
        _ => 1,
    }
}

pub fn validate_lemma_detection(d: &LemmaDetection) -> Result<(), ValidationError> {
    if d.detection_failed {
        // A declared failure is a legitimate answer; nothing to check.
        return Ok(());
    }
    let lemma = d.lemma.trim();
    if lemma.is_empty() {
        return Err(ValidationError::new("detection returned a blank lemma"));
    }
    if lemma.chars().count() > MAX_LEMMA_LEN {
        return Err(ValidationError::new(format!(
            "lemma exceeds {MAX_LEMMA_LEN} characters"
        )));
    }
    if !contains_cyrillic(lemma) {
        return Err(ValidationError::new(format!(
            "lemma '{lemma}' contains no Cyrillic characters"
        )));
    }
    if PartOfSpeech::parse(&d.part_of_speech).is_none() {
        return Err(ValidationError::new(format!(
            "unknown part of speech '{}'",
            d.part_of_speech
        )));
    }
    Ok(())
}

pub fn validate_inflection_set(set: &InflectionSet) -> Result<(), ValidationError> {
    if !contains_cyrillic(set.lemma.trim()) {
        return Err(ValidationError::new("inflection set lemma is not Cyrillic"));
    }
    let min = minimum_inflections(&set.part_of_speech);
    if set.inflections.len() < min {
        return Err(ValidationError::new(format!(
            "{} inflections for {} lemma '{}', need at least {min}",
            set.inflections.len(),
            set.part_of_speech,
            set.lemma,
        )));
    }
    let mut seen = std::collections::HashSet::new();
    for inf in &set.inflections {
        let form = inf.text.trim();
        if form.is_empty() || !contains_cyrillic(form) {
            return Err(ValidationError::new(format!(
                "inflection '{}' is blank or not Cyrillic",
                inf.text
            )));
        }
        if !seen.insert(form.to_lowercase()) {
            return Err(ValidationError::new(format!(
                "duplicate inflected form '{form}'"
            )));
        }
        if inf.grammatical_tags.trim().is_empty() {
            return Err(ValidationError::new(format!(
                "inflection '{form}' has no grammatical tags"
            )));
        }
    }
    Ok(())
}

pub fn validate_metadata(m: &Metadata) -> Result<(), ValidationError> {
    if !contains_cyrillic(m.lemma.trim()) {
        return Err(ValidationError::new("metadata lemma is not Cyrillic"));
    }
    if PartOfSpeech::parse(&m.part_of_speech).is_none() {
        return Err(ValidationError::new(format!(
            "unknown part of speech '{}'",
            m.part_of_speech
        )));
    }
    if Difficulty::parse(&m.difficulty_level).is_none() {
        return Err(ValidationError::new(format!(
            "unknown difficulty level '{}'",
            m.difficulty_level
        )));
    }
    Ok(())
}

pub fn validate_sentence_set(set: &SentenceSet) -> Result<(), ValidationError> {
    if set.sentences.is_empty() {
        return Err(ValidationError::new("sentence set is empty"));
    }
    for s in &set.sentences {
        if !contains_cyrillic(s.bulgarian_text.trim()) {
            return Err(ValidationError::new(format!(
                "sentence '{}' is not Bulgarian text",
                s.bulgarian_text
            )));
        }
        if s.english_translation.trim().is_empty() {
            return Err(ValidationError::new("sentence has a blank translation"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responses::{InflectionEntry, SentenceEntry};

    fn entry(text: &str) -> InflectionEntry {
        InflectionEntry {
            text: text.to_string(),
            grammatical_tags: "tag".to_string(),
            difficulty_level: None,
            accented_form: None,
        }
    }

    fn verb_set(n: usize) -> InflectionSet {
        let forms = ["чета", "четеш", "чете", "четем", "четете", "четат", "четейки"];
        InflectionSet {
            lemma: "чета".to_string(),
            part_of_speech: "VERB".to_string(),
            inflections: forms[..n].iter().map(|f| entry(f)).collect(),
        }
    }

    #[test]
    fn test_verb_minimum_boundary() {
        assert!(validate_inflection_set(&verb_set(5)).is_err());
        assert!(validate_inflection_set(&verb_set(6)).is_ok());
    }

    #[test]
    fn test_minimums_by_pos() {
        assert_eq!(minimum_inflections("VERB"), 6);
        assert_eq!(minimum_inflections("noun"), 2);
        assert_eq!(minimum_inflections("Adjective"), 3);
        assert_eq!(minimum_inflections("PARTICLE"), 1);
        assert_eq!(minimum_inflections("whatever"), 1);
    }

    #[test]
    fn test_duplicate_forms_rejected() {
        let mut set = verb_set(6);
        set.inflections[5] = entry("чета");
        let err = validate_inflection_set(&set).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_non_cyrillic_form_rejected() {
        let mut set = verb_set(6);
        set.inflections[0] = entry("cheta");
        assert!(validate_inflection_set(&set).is_err());
    }

    #[test]
    fn test_detection_rules() {
        let ok = LemmaDetection {
            word_form: "котки".into(),
            lemma: "котка".into(),
            part_of_speech: "noun".into(),
            detection_failed: false,
        };
        assert!(validate_lemma_detection(&ok).is_ok());

        let mut bad = ok.clone();
        bad.lemma = "cat".into();
        assert!(validate_lemma_detection(&bad).is_err());

        let mut bad = ok.clone();
        bad.part_of_speech = "GERUND".into();
        assert!(validate_lemma_detection(&bad).is_err());

        let mut bad = ok.clone();
        bad.lemma = "а".repeat(101);
        assert!(validate_lemma_detection(&bad).is_err());

        // declared failure passes untouched
        let failed = LemmaDetection::unavailable("xyz");
        assert!(validate_lemma_detection(&failed).is_ok());
    }

    #[test]
    fn test_metadata_enums_closed() {
        let m = Metadata {
            lemma: "котка".into(),
            part_of_speech: "NOUN".into(),
            category: Some("animals".into()),
            difficulty_level: "beginner".into(),
        };
        assert!(validate_metadata(&m).is_ok());

        let mut bad = m.clone();
        bad.difficulty_level = "BASIC".into();
        assert!(validate_metadata(&bad).is_err());
    }

    #[test]
    fn test_sentence_set_rules() {
        let good = SentenceSet {
            lemma: "котка".into(),
            sentences: vec![SentenceEntry {
                bulgarian_text: "Котката спи.".into(),
                english_translation: "The cat is sleeping.".into(),
            }],
        };
        assert!(validate_sentence_set(&good).is_ok());

        let empty = SentenceSet { lemma: "котка".into(), sentences: vec![] };
        assert!(validate_sentence_set(&empty).is_err());

        let mut blank = good.clone();
        blank.sentences[0].english_translation = " ".into();
        assert!(validate_sentence_set(&blank).is_err());
    }
}
