//! Domain types for vocabulary entries and their enrichment state.

use serde::{Deserialize, Serialize};

/// Lifecycle of the word-enrichment pipeline for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Queued => "QUEUED",
            ProcessingStatus::Processing => "PROCESSING",
            ProcessingStatus::Completed => "COMPLETED",
            ProcessingStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Some(ProcessingStatus::Queued),
            "PROCESSING" => Some(ProcessingStatus::Processing),
            "COMPLETED" => Some(ProcessingStatus::Completed),
            "FAILED" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }
}

/// Lifecycle of example-sentence generation, independent of word processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentenceStatus {
    None,
    Queued,
    Generating,
    Done,
    Failed,
}

impl SentenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentenceStatus::None => "NONE",
            SentenceStatus::Queued => "QUEUED",
            SentenceStatus::Generating => "GENERATING",
            SentenceStatus::Done => "DONE",
            SentenceStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Some(SentenceStatus::None),
            "QUEUED" => Some(SentenceStatus::Queued),
            "GENERATING" => Some(SentenceStatus::Generating),
            "DONE" => Some(SentenceStatus::Done),
            "FAILED" => Some(SentenceStatus::Failed),
            _ => None,
        }
    }
}

/// Closed set of Bulgarian parts of speech the pipeline recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Pronoun,
    Preposition,
    Conjunction,
    Numeral,
    Interjection,
    Particle,
    Interrogative,
}

impl PartOfSpeech {
    pub const ALL: [PartOfSpeech; 11] = [
        PartOfSpeech::Noun,
        PartOfSpeech::Verb,
        PartOfSpeech::Adjective,
        PartOfSpeech::Adverb,
        PartOfSpeech::Pronoun,
        PartOfSpeech::Preposition,
        PartOfSpeech::Conjunction,
        PartOfSpeech::Numeral,
        PartOfSpeech::Interjection,
        PartOfSpeech::Particle,
        PartOfSpeech::Interrogative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartOfSpeech::Noun => "NOUN",
            PartOfSpeech::Verb => "VERB",
            PartOfSpeech::Adjective => "ADJECTIVE",
            PartOfSpeech::Adverb => "ADVERB",
            PartOfSpeech::Pronoun => "PRONOUN",
            PartOfSpeech::Preposition => "PREPOSITION",
            PartOfSpeech::Conjunction => "CONJUNCTION",
            PartOfSpeech::Numeral => "NUMERAL",
            PartOfSpeech::Interjection => "INTERJECTION",
            PartOfSpeech::Particle => "PARTICLE",
            PartOfSpeech::Interrogative => "INTERROGATIVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let norm = s.trim().to_ascii_uppercase();
        Self::ALL.iter().copied().find(|p| p.as_str() == norm)
    }

    /// Scans free-form user hint text for an English part-of-speech name.
    ///
    /// Matches whole words case-insensitively. Returns `None` when the hint
    /// names no part of speech or names more than one distinct part of
    /// speech, so an ambiguous hint never overrides detection.
    pub fn from_hint(hint: &str) -> Option<Self> {
        let mut found: Option<PartOfSpeech> = None;
        for word in hint.split(|c: char| !c.is_ascii_alphabetic()) {
            if word.is_empty() {
                continue;
            }
            for pos in Self::ALL {
                if word.eq_ignore_ascii_case(pos.as_str()) {
                    match found {
                        Some(prev) if prev != pos => return None,
                        _ => found = Some(pos),
                    }
                }
            }
        }
        found
    }
}

/// Learner-facing difficulty grade assigned during metadata generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "BEGINNER",
            Difficulty::Intermediate => "INTERMEDIATE",
            Difficulty::Advanced => "ADVANCED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BEGINNER" => Some(Difficulty::Beginner),
            "INTERMEDIATE" => Some(Difficulty::Intermediate),
            "ADVANCED" => Some(Difficulty::Advanced),
            _ => None,
        }
    }
}

/// One generated inflected form of a lemma.
///
/// `difficulty` carries the per-form grade the model emits
/// (BASIC/INTERMEDIATE/ADVANCED) and is stored verbatim; it uses a
/// different scale than the entry-level [`Difficulty`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inflection {
    pub form: String,
    pub grammatical_tags: String,
    pub difficulty: Option<String>,
    pub accented_form: Option<String>,
}

/// A generated example sentence pair, ordered within its entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleSentence {
    pub text: String,
    pub translation: String,
    pub sort_order: i64,
}

/// A vocabulary entry with everything enrichment has attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub id: i64,
    /// Canonical text. Starts as the user's raw input and is replaced by
    /// the detected lemma once processing completes.
    pub text: String,
    pub translation: Option<String>,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub part_of_speech: Option<PartOfSpeech>,
    pub difficulty: Option<Difficulty>,
    pub processing_status: ProcessingStatus,
    pub processing_error: Option<String>,
    pub sentence_status: SentenceStatus,
    pub created_at: i64,
    pub updated_at: i64,
    pub inflections: Vec<Inflection>,
    pub example_sentences: Vec<ExampleSentence>,
}

impl VocabularyEntry {
    /// Builds the disambiguation hint passed to the model: the user's
    /// translation and notes joined with "; ", or `None` if both are blank.
    pub fn disambiguation_hint(&self) -> Option<String> {
        join_hint(self.translation.as_deref(), self.notes.as_deref())
    }
}

/// Joins optional translation and notes into a single hint string.
pub fn join_hint(translation: Option<&str>, notes: Option<&str>) -> Option<String> {
    let t = translation.map(str::trim).filter(|s| !s.is_empty());
    let n = notes.map(str::trim).filter(|s| !s.is_empty());
    match (t, n) {
        (Some(t), Some(n)) => Some(format!("{t}; {n}")),
        (Some(t), None) => Some(t.to_string()),
        (None, Some(n)) => Some(n.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in [
            ProcessingStatus::Queued,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(ProcessingStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ProcessingStatus::parse("queued"), Some(ProcessingStatus::Queued));
        assert_eq!(ProcessingStatus::parse("bogus"), None);
    }

    #[test]
    fn test_part_of_speech_parse_case_insensitive() {
        assert_eq!(PartOfSpeech::parse("verb"), Some(PartOfSpeech::Verb));
        assert_eq!(PartOfSpeech::parse(" Noun "), Some(PartOfSpeech::Noun));
        assert_eq!(PartOfSpeech::parse("gerund"), None);
    }

    #[test]
    fn test_from_hint_single_match() {
        assert_eq!(
            PartOfSpeech::from_hint("this is a verb, perfective"),
            Some(PartOfSpeech::Verb)
        );
        assert_eq!(PartOfSpeech::from_hint("NOUN"), Some(PartOfSpeech::Noun));
    }

    #[test]
    fn test_from_hint_requires_whole_word() {
        // "verbose" must not match VERB
        assert_eq!(PartOfSpeech::from_hint("verbose description"), None);
    }

    #[test]
    fn test_from_hint_ambiguous_returns_none() {
        assert_eq!(PartOfSpeech::from_hint("noun or maybe a verb"), None);
        // same POS twice is still unambiguous
        assert_eq!(
            PartOfSpeech::from_hint("a verb, definitely a verb"),
            Some(PartOfSpeech::Verb)
        );
    }

    #[test]
    fn test_join_hint() {
        assert_eq!(join_hint(Some("cat"), Some("animal")), Some("cat; animal".into()));
        assert_eq!(join_hint(Some("cat"), None), Some("cat".into()));
        assert_eq!(join_hint(None, Some("  animal ")), Some("animal".into()));
        assert_eq!(join_hint(Some("  "), None), None);
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!(Difficulty::parse("beginner"), Some(Difficulty::Beginner));
        assert_eq!(Difficulty::parse("BASIC"), None);
    }
}
