//! SQLite storage for vocabulary entries.
//!
//! Schema:
//! - entries: the word itself plus enrichment metadata and both
//!   lifecycle columns (processing_status, sentence_status)
//! - inflections: generated forms, replaced wholesale on reprocessing
//! - example_sentences: generated sentence pairs, ordered
//!
//! Every mutating method here is one short transaction. Callers run the
//! slow model calls between transactions, never inside them, and the
//! apply methods tolerate the entry having been deleted in the gap.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;

use crate::entry::{
    join_hint, Difficulty, ExampleSentence, Inflection, PartOfSpeech, ProcessingStatus,
    SentenceStatus, VocabularyEntry,
};
use crate::responses::{ProcessingResult, SentenceSet};
use tracing::{info, warn};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY,
    text TEXT NOT NULL,
    translation TEXT,
    notes TEXT,
    category TEXT,
    part_of_speech TEXT,
    difficulty TEXT,
    processing_status TEXT NOT NULL DEFAULT 'QUEUED',
    processing_error TEXT,
    sentence_status TEXT NOT NULL DEFAULT 'NONE',
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE IF NOT EXISTS inflections (
    id INTEGER PRIMARY KEY,
    entry_id INTEGER NOT NULL,
    form TEXT NOT NULL,
    grammatical_tags TEXT NOT NULL,
    difficulty TEXT,
    accented_form TEXT,
    position INTEGER NOT NULL,
    FOREIGN KEY (entry_id) REFERENCES entries(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS example_sentences (
    id INTEGER PRIMARY KEY,
    entry_id INTEGER NOT NULL,
    text TEXT NOT NULL,
    translation TEXT NOT NULL,
    sort_order INTEGER NOT NULL,
    FOREIGN KEY (entry_id) REFERENCES entries(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_entries_processing_status ON entries(processing_status);
CREATE INDEX IF NOT EXISTS idx_entries_sentence_status ON entries(sentence_status);
CREATE INDEX IF NOT EXISTS idx_inflections_entry_id ON inflections(entry_id);
CREATE INDEX IF NOT EXISTS idx_sentences_entry_id ON example_sentences(entry_id);
";

/// Word text and hints captured in the claim transaction, carried
/// across the lock-free stretch of processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordJob {
    pub text: String,
    /// Combined translation + notes, for model disambiguation.
    pub hint: Option<String>,
    /// The user's own translation, if any. Lets the translation step
    /// skip the network entirely.
    pub user_translation: Option<String>,
}

/// Inputs for sentence generation, captured in the claim transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceJob {
    pub text: String,
    pub translation: Option<String>,
    pub part_of_speech: Option<String>,
}

/// Database connection wrapper
pub struct Db {
    conn: Connection,
}

impl Db {
    /// Open or create database at path
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        conn.execute_batch(SCHEMA)?;

        Ok(Self { conn })
    }

    /// Open in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert a new entry in QUEUED state and return its ID.
    pub fn add_entry(
        &self,
        text: &str,
        translation: Option<&str>,
        notes: Option<&str>,
    ) -> Result<i64> {
        let text = text.trim();
        if text.is_empty() {
            anyhow::bail!("entry text must not be blank");
        }
        self.conn
            .execute(
                "INSERT INTO entries (text, translation, notes) VALUES (?, ?, ?)",
                params![text, none_if_blank(translation), none_if_blank(notes)],
            )
            .context("Failed to insert entry")?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Load one entry with its inflections and example sentences.
    pub fn get_entry(&self, id: i64) -> Result<Option<VocabularyEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT id, text, translation, notes, category, part_of_speech, difficulty,
                        processing_status, processing_error, sentence_status, created_at, updated_at
                 FROM entries WHERE id = ?",
                params![id],
                |row| {
                    Ok(VocabularyEntry {
                        id: row.get(0)?,
                        text: row.get(1)?,
                        translation: row.get(2)?,
                        notes: row.get(3)?,
                        category: row.get(4)?,
                        part_of_speech: row
                            .get::<_, Option<String>>(5)?
                            .as_deref()
                            .and_then(PartOfSpeech::parse),
                        difficulty: row
                            .get::<_, Option<String>>(6)?
                            .as_deref()
                            .and_then(Difficulty::parse),
                        processing_status: ProcessingStatus::parse(&row.get::<_, String>(7)?)
                            .unwrap_or(ProcessingStatus::Failed),
                        processing_error: row.get(8)?,
                        sentence_status: SentenceStatus::parse(&row.get::<_, String>(9)?)
                            .unwrap_or(SentenceStatus::None),
                        created_at: row.get(10)?,
                        updated_at: row.get(11)?,
                        inflections: Vec::new(),
                        example_sentences: Vec::new(),
                    })
                },
            )
            .optional()
            .context("Failed to load entry")?;

        let Some(mut entry) = entry else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT form, grammatical_tags, difficulty, accented_form
             FROM inflections WHERE entry_id = ? ORDER BY position",
        )?;
        entry.inflections = stmt
            .query_map(params![id], |row| {
                Ok(Inflection {
                    form: row.get(0)?,
                    grammatical_tags: row.get(1)?,
                    difficulty: row.get(2)?,
                    accented_form: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT text, translation, sort_order
             FROM example_sentences WHERE entry_id = ? ORDER BY sort_order",
        )?;
        entry.example_sentences = stmt
            .query_map(params![id], |row| {
                Ok(ExampleSentence {
                    text: row.get(0)?,
                    translation: row.get(1)?,
                    sort_order: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(entry))
    }

    /// Claim transaction for word processing: load the entry, mark it
    /// PROCESSING, and return everything the pipeline needs so no
    /// database state is touched until the apply transaction. Returns
    /// `None` if the entry no longer exists.
    pub fn claim_for_processing(&mut self, id: i64) -> Result<Option<WordJob>> {
        let tx = self.conn.transaction()?;
        let row = tx
            .query_row(
                "SELECT text, translation, notes FROM entries WHERE id = ?",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((text, translation, notes)) = row else {
            warn!(id, "entry not found, skipping processing");
            return Ok(None);
        };

        tx.execute(
            "UPDATE entries SET processing_status = ?, updated_at = strftime('%s', 'now')
             WHERE id = ?",
            params![ProcessingStatus::Processing.as_str(), id],
        )?;
        tx.commit()?;

        let hint = join_hint(translation.as_deref(), notes.as_deref());
        let user_translation = translation.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        Ok(Some(WordJob {
            text,
            hint,
            user_translation,
        }))
    }

    /// Apply transaction for word processing. Returns `false` if the
    /// entry vanished while the pipeline ran; results are dropped
    /// silently in that case.
    pub fn apply_word_result(
        &mut self,
        id: i64,
        result: &ProcessingResult,
        translation: Option<&str>,
    ) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let row = tx
            .query_row(
                "SELECT translation FROM entries WHERE id = ?",
                params![id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;

        let Some(existing_translation) = row else {
            warn!(id, "entry disappeared before results could be saved");
            return Ok(false);
        };

        if let Some(error) = &result.error {
            tx.execute(
                "UPDATE entries SET processing_status = ?, processing_error = ?,
                        updated_at = strftime('%s', 'now')
                 WHERE id = ?",
                params![ProcessingStatus::Failed.as_str(), error, id],
            )?;
            tx.commit()?;
            return Ok(true);
        }

        // Canonical text: the detected lemma replaces the raw input.
        let lemma = result.detection.lemma.trim();
        if !lemma.is_empty() {
            tx.execute(
                "UPDATE entries SET text = ? WHERE id = ?",
                params![lemma, id],
            )?;
        }

        // Translation: never overwrite one the user typed.
        let user_has_translation = existing_translation
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false);
        if let Some(t) = translation {
            if !user_has_translation {
                tx.execute(
                    "UPDATE entries SET translation = ? WHERE id = ?",
                    params![t, id],
                )?;
            }
        }

        // Inflections: replace-all, but only when a non-empty set came
        // back. A failed stage must not wipe forms from an earlier run.
        if let Some(set) = &result.inflections {
            if !set.inflections.is_empty() {
                replace_inflections(&tx, id, set)?;
            } else {
                warn!(id, lemma, "no inflections generated");
            }
        }

        if let Some(pos) = result.part_of_speech {
            tx.execute(
                "UPDATE entries SET part_of_speech = ? WHERE id = ?",
                params![pos.as_str(), id],
            )?;
        }

        if let Some(metadata) = &result.metadata {
            if let Some(category) = metadata.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                tx.execute(
                    "UPDATE entries SET category = ? WHERE id = ?",
                    params![category, id],
                )?;
            }
            match Difficulty::parse(&metadata.difficulty_level) {
                Some(d) => {
                    tx.execute(
                        "UPDATE entries SET difficulty = ? WHERE id = ?",
                        params![d.as_str(), id],
                    )?;
                }
                None => {
                    warn!(
                        id,
                        value = %metadata.difficulty_level,
                        "invalid difficulty level, leaving unset"
                    );
                }
            }
        }

        tx.execute(
            "UPDATE entries SET processing_status = ?, processing_error = NULL,
                    updated_at = strftime('%s', 'now')
             WHERE id = ?",
            params![ProcessingStatus::Completed.as_str(), id],
        )?;
        tx.commit()?;

        for w in &result.warnings {
            warn!(id, "processing completed with warning: {w}");
        }
        Ok(true)
    }

    /// Reset an entry for another enrichment run: wipe inflections,
    /// clear the error, append the new hint to notes, back to QUEUED.
    pub fn reset_for_reprocessing(&mut self, id: i64, hint: Option<&str>) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let notes = tx
            .query_row(
                "SELECT notes FROM entries WHERE id = ?",
                params![id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;

        let Some(notes) = notes else {
            return Ok(false);
        };

        if let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) {
            let combined = join_hint(notes.as_deref(), Some(hint));
            tx.execute(
                "UPDATE entries SET notes = ? WHERE id = ?",
                params![combined, id],
            )?;
        }

        tx.execute("DELETE FROM inflections WHERE entry_id = ?", params![id])?;
        tx.execute(
            "UPDATE entries SET processing_status = ?, processing_error = NULL,
                    updated_at = strftime('%s', 'now')
             WHERE id = ?",
            params![ProcessingStatus::Queued.as_str(), id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Queue sentence generation for one entry, discarding any stale
    /// sentences in the same transaction.
    pub fn queue_sentences(&mut self, id: i64) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let exists = tx
            .query_row("SELECT 1 FROM entries WHERE id = ?", params![id], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Ok(false);
        }
        tx.execute("DELETE FROM example_sentences WHERE entry_id = ?", params![id])?;
        tx.execute(
            "UPDATE entries SET sentence_status = ?, updated_at = strftime('%s', 'now')
             WHERE id = ?",
            params![SentenceStatus::Queued.as_str(), id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Queue a batch of completed entries that never got sentences.
    /// Returns the queued IDs, at most `limit` of them.
    pub fn queue_sentence_backfill(&mut self, limit: usize) -> Result<Vec<i64>> {
        let tx = self.conn.transaction()?;
        let ids: Vec<i64> = {
            let mut stmt = tx.prepare(
                "SELECT id FROM entries
                 WHERE processing_status = ? AND sentence_status = ?
                 ORDER BY id LIMIT ?",
            )?;
            let ids = stmt
                .query_map(
                    params![
                        ProcessingStatus::Completed.as_str(),
                        SentenceStatus::None.as_str(),
                        limit as i64
                    ],
                    |row| row.get(0),
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids
        };
        for id in &ids {
            tx.execute(
                "UPDATE entries SET sentence_status = ?, updated_at = strftime('%s', 'now')
                 WHERE id = ?",
                params![SentenceStatus::Queued.as_str(), id],
            )?;
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Claim transaction for sentence generation: mark GENERATING and
    /// return the generation inputs. `None` if the entry vanished.
    pub fn claim_for_sentences(&mut self, id: i64) -> Result<Option<SentenceJob>> {
        let tx = self.conn.transaction()?;
        let row = tx
            .query_row(
                "SELECT text, translation, part_of_speech FROM entries WHERE id = ?",
                params![id],
                |row| {
                    Ok(SentenceJob {
                        text: row.get(0)?,
                        translation: row.get(1)?,
                        part_of_speech: row.get(2)?,
                    })
                },
            )
            .optional()?;

        let Some(job) = row else {
            warn!(id, "entry not found, skipping sentence generation");
            return Ok(None);
        };

        tx.execute(
            "UPDATE entries SET sentence_status = ?, updated_at = strftime('%s', 'now')
             WHERE id = ?",
            params![SentenceStatus::Generating.as_str(), id],
        )?;
        tx.commit()?;
        Ok(Some(job))
    }

    /// Apply transaction for sentence generation: replace sentences and
    /// mark DONE, or mark FAILED when no set was produced.
    pub fn apply_sentence_result(&mut self, id: i64, set: Option<&SentenceSet>) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let exists = tx
            .query_row("SELECT 1 FROM entries WHERE id = ?", params![id], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            warn!(id, "entry disappeared before sentences could be saved");
            return Ok(false);
        }

        match set {
            Some(set) => {
                tx.execute("DELETE FROM example_sentences WHERE entry_id = ?", params![id])?;
                for (i, s) in set.sentences.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO example_sentences (entry_id, text, translation, sort_order)
                         VALUES (?, ?, ?, ?)",
                        params![id, s.bulgarian_text, s.english_translation, i as i64],
                    )?;
                }
                tx.execute(
                    "UPDATE entries SET sentence_status = ?, updated_at = strftime('%s', 'now')
                     WHERE id = ?",
                    params![SentenceStatus::Done.as_str(), id],
                )?;
            }
            None => {
                tx.execute(
                    "UPDATE entries SET sentence_status = ?, updated_at = strftime('%s', 'now')
                     WHERE id = ?",
                    params![SentenceStatus::Failed.as_str(), id],
                )?;
            }
        }
        tx.commit()?;
        Ok(true)
    }

    /// IDs of entries in any of the given processing states.
    pub fn entries_with_processing_status(
        &self,
        statuses: &[ProcessingStatus],
    ) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        for status in statuses {
            let mut stmt = self
                .conn
                .prepare("SELECT id FROM entries WHERE processing_status = ? ORDER BY id")?;
            let batch = stmt
                .query_map(params![status.as_str()], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            ids.extend(batch);
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// IDs of entries in any of the given sentence states.
    pub fn entries_with_sentence_status(&self, statuses: &[SentenceStatus]) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        for status in statuses {
            let mut stmt = self
                .conn
                .prepare("SELECT id FROM entries WHERE sentence_status = ? ORDER BY id")?;
            let batch = stmt
                .query_map(params![status.as_str()], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            ids.extend(batch);
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Entry counts per processing status, for the status report.
    pub fn processing_status_counts(&self) -> Result<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT processing_status, COUNT(*) FROM entries
             GROUP BY processing_status ORDER BY processing_status",
        )?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    pub fn delete_entry(&self, id: i64) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM entries WHERE id = ?", params![id])
            .context("Failed to delete entry")?;
        Ok(n > 0)
    }
}

fn replace_inflections(tx: &Transaction<'_>, id: i64, set: &crate::responses::InflectionSet) -> Result<()> {
    tx.execute("DELETE FROM inflections WHERE entry_id = ?", params![id])?;
    for (i, inf) in set.inflections.iter().enumerate() {
        tx.execute(
            "INSERT INTO inflections (entry_id, form, grammatical_tags, difficulty, accented_form, position)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                id,
                inf.text,
                inf.grammatical_tags,
                inf.difficulty_level,
                inf.accented_form,
                i as i64
            ],
        )?;
    }
    info!(id, count = set.inflections.len(), "inflections replaced");
    Ok(())
}

fn none_if_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
