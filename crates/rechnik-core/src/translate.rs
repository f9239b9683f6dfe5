//! Bulgarian→English translation via Google's free web endpoint.
//!
//! Translation is best-effort: the pipeline never fails a word because
//! the translation service was down, it just leaves the field blank.

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::warn;

pub const DEFAULT_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";

/// Seam for the translation service so tests can stub it out.
pub trait TranslationBackend: Send + Sync {
    fn translate(&self, text: &str) -> Result<String>;
}

pub struct GoogleTranslator {
    base_url: String,
}

impl GoogleTranslator {
    pub fn new() -> Self {
        GoogleTranslator {
            base_url: DEFAULT_TRANSLATE_URL.to_string(),
        }
    }

    pub fn with_base_url(url: impl Into<String>) -> Self {
        GoogleTranslator { base_url: url.into() }
    }
}

impl Default for GoogleTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl TranslationBackend for GoogleTranslator {
    fn translate(&self, text: &str) -> Result<String> {
        let response = ureq::get(&self.base_url)
            .query("client", "gtx")
            .query("sl", "bg")
            .query("tl", "en")
            .query("dt", "t")
            .query("q", text)
            .call()
            .context("translation request failed")?;

        let body: Value = response
            .into_json()
            .context("translation response was not JSON")?;

        // Response shape: [[["translation","original",...],...],...]
        let translated = body
            .get(0)
            .and_then(|v| v.get(0))
            .and_then(|v| v.get(0))
            .and_then(Value::as_str)
            .context("unexpected translation response shape")?;

        let translated = translated.trim();
        if translated.is_empty() {
            anyhow::bail!("translation service returned an empty string");
        }
        Ok(translated.to_string())
    }
}

/// Resolves a translation for `text`, preferring a meaning the user
/// already supplied. Returns `None` on service failure; callers leave
/// the translation blank and move on.
pub fn translate_with_fallback(
    backend: &dyn TranslationBackend,
    text: &str,
    user_translation: Option<&str>,
) -> Option<String> {
    if let Some(meaning) = user_translation.map(str::trim).filter(|s| !s.is_empty()) {
        return Some(meaning.to_string());
    }
    match backend.translate(text) {
        Ok(t) => Some(t),
        Err(e) => {
            warn!(text, error = %e, "translation unavailable, leaving blank");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedTranslator {
        calls: AtomicUsize,
        result: Option<String>,
    }

    impl TranslationBackend for FixedTranslator {
        fn translate(&self, _text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Some(t) => Ok(t.clone()),
                None => anyhow::bail!("service down"),
            }
        }
    }

    #[test]
    fn test_user_translation_bypasses_service() {
        let backend = FixedTranslator {
            calls: AtomicUsize::new(0),
            result: Some("wrong".into()),
        };
        let out = translate_with_fallback(&backend, "котка", Some("cat"));
        assert_eq!(out, Some("cat".to_string()));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_blank_user_translation_calls_service() {
        let backend = FixedTranslator {
            calls: AtomicUsize::new(0),
            result: Some("cat".into()),
        };
        let out = translate_with_fallback(&backend, "котка", Some("  "));
        assert_eq!(out, Some("cat".to_string()));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_yields_none() {
        let backend = FixedTranslator {
            calls: AtomicUsize::new(0),
            result: None,
        };
        assert_eq!(translate_with_fallback(&backend, "котка", None), None);
    }
}
