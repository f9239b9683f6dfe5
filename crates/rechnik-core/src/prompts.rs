//! Prompt builders for the four model stages. Each prompt pins down the
//! exact JSON shape the strict parsers in [`crate::responses`] expect.

pub const WORD_SYSTEM: &str = "You are an expert in Bulgarian grammar and morphology. \
You always respond with a single JSON object and nothing else.";

pub const SENTENCE_SYSTEM: &str = "You are a Bulgarian language teacher writing natural \
example sentences for learners. You always respond with a single JSON object and nothing else.";

pub fn lemma_detection(word: &str) -> String {
    format!(
        r#"Given the Bulgarian word "{word}", identify its lemma (dictionary form).
For verbs, the lemma is the 1st person singular present tense form.
For nouns, the lemma is the singular indefinite form.
For adjectives, the lemma is the masculine singular indefinite form.

If the input is not a recognizable Bulgarian word, set "detectionFailed" to true.

Respond in JSON format matching this structure:
{{
  "wordForm": "the original word",
  "lemma": "detected lemma",
  "partOfSpeech": "VERB|NOUN|ADJECTIVE|etc",
  "detectionFailed": false
}}"#
    )
}

pub fn inflections(part_of_speech: &str, lemma: &str) -> String {
    let pos = part_of_speech.to_lowercase();
    format!(
        r#"Generate ALL inflections for the Bulgarian {pos} "{lemma}".

For verbs, include all persons (1st, 2nd, 3rd) and numbers (singular, plural)
for present tense, past aorist, past imperfect, and imperative mood.
Include the grammatical tags for each form (e.g., "1sg.pres", "3pl.past.aor").

Tag each inflection with a difficulty level:
- BASIC: only 1sg.pres and 3sg.pres for verbs, sg.indef for nouns, masculine for adjectives
- INTERMEDIATE: remaining present-tense verb forms, pl.indef for nouns, fem/neut/pl for adjectives
- ADVANCED: past tenses and imperative for verbs, definite-article forms for nouns and adjectives

For nouns, include singular and plural forms, with and without the definite article
(tags e.g. "sg.indef", "sg.def", "pl.indef", "pl.def").
For adjectives, include masculine, feminine, neuter, and plural forms,
with and without the definite article.

For each inflection, add accentedForm with the Unicode combining acute accent (U+0301)
on the stressed vowel (e.g. часа́, ра́бота), or null if stress is unambiguous.

Respond in JSON format matching this structure:
{{
  "lemma": "{lemma}",
  "partOfSpeech": "VERB|NOUN|ADJECTIVE|etc",
  "inflections": [
    {{
      "text": "inflected form",
      "grammaticalTags": "tags",
      "difficultyLevel": "BASIC|INTERMEDIATE|ADVANCED",
      "accentedForm": "form with acute accent, or null"
    }}
  ]
}}"#
    )
}

pub fn metadata(lemma: &str, hint: Option<&str>) -> String {
    let hint_line = match hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(h) => format!(
            "\nIMPORTANT: The user says this word means \"{h}\" in English. \
Use this to determine the correct part of speech."
        ),
        None => String::new(),
    };
    format!(
        r#"For the Bulgarian word "{lemma}", determine:{hint_line}
1. Part of speech (one of: NOUN, VERB, ADJECTIVE, ADVERB, PRONOUN, PREPOSITION, CONJUNCTION, NUMERAL, INTERJECTION, PARTICLE, INTERROGATIVE)
2. Topic category (e.g., "food", "travel", "emotions", "daily life", "academic")
3. Difficulty level (one of: BEGINNER, INTERMEDIATE, ADVANCED)

BEGINNER: common everyday words (greetings, numbers, family, food basics)
INTERMEDIATE: general conversation words (opinions, descriptions, activities)
ADVANCED: specialized or abstract vocabulary (politics, philosophy, technical)

Respond in JSON format matching this structure:
{{
  "lemma": "the lemma",
  "partOfSpeech": "VERB|NOUN|ADJECTIVE|etc",
  "category": "topic category",
  "difficultyLevel": "BEGINNER|INTERMEDIATE|ADVANCED"
}}"#
    )
}

pub fn sentences(lemma: &str, translation: Option<&str>, part_of_speech: Option<&str>) -> String {
    let pos_label = part_of_speech
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_else(|| "word".to_string());
    let translation_clause = match translation.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => format!(", means \"{t}\""),
        None => String::new(),
    };
    format!(
        r#"Generate 4 natural Bulgarian example sentences for the {pos_label} "{lemma}"{translation_clause}.

Requirements:
- Each sentence must clearly feature "{lemma}" used naturally
- Sentences should progress from simple to more complex
- Include a mix of contexts (everyday conversation, questions, descriptions)
- Bulgarian text must be grammatically correct
- Translations must be accurate English

Respond ONLY in this exact JSON format:
{{
  "lemma": "{lemma}",
  "sentences": [
    {{"bulgarianText": "...", "englishTranslation": "..."}},
    {{"bulgarianText": "...", "englishTranslation": "..."}},
    {{"bulgarianText": "...", "englishTranslation": "..."}},
    {{"bulgarianText": "...", "englishTranslation": "..."}}
  ]
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_hint_line() {
        let with = metadata("котка", Some("cat; the animal"));
        assert!(with.contains("means \"cat; the animal\""));
        let without = metadata("котка", None);
        assert!(!without.contains("IMPORTANT"));
        let blank = metadata("котка", Some("  "));
        assert!(!blank.contains("IMPORTANT"));
    }

    #[test]
    fn test_sentence_prompt_clauses() {
        let p = sentences("котка", Some("cat"), Some("NOUN"));
        assert!(p.contains("for the noun \"котка\", means \"cat\""));
        let bare = sentences("котка", None, None);
        assert!(bare.contains("for the word \"котка\"."));
    }

    #[test]
    fn test_inflection_prompt_mentions_pos() {
        let p = inflections("VERB", "чета");
        assert!(p.contains("Bulgarian verb \"чета\""));
        assert!(p.contains("accentedForm"));
    }
}
