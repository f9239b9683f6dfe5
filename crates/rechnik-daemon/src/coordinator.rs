//! Background coordinators for word enrichment and sentence generation.
//!
//! Every run follows the same bracket: one short claim transaction on
//! the shared database, the slow model calls with no lock held, then
//! one short apply transaction that tolerates the entry having been
//! deleted in between. The database mutex is never held across a model
//! call.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use rechnik_core::cache::normalize_key;
use rechnik_core::storage::Db;
use rechnik_core::translate::{translate_with_fallback, TranslationBackend};
use rechnik_core::WordPipeline;
use tokio::sync::{Mutex, Notify};
use tokio::task;
use tracing::{error, info, warn};

/// Batch cap for the queue-all-sentences sweep.
pub const SENTENCE_BATCH_LIMIT: usize = 50;

/// Shared state for the daemon.
/// Note: Db is wrapped in a Mutex because rusqlite::Connection is not
/// Sync; handlers and coordinators take the lock only for the short
/// claim/apply transactions.
pub struct DaemonState {
    pub db: Mutex<Db>,
    pub pipeline: Arc<WordPipeline>,
    pub translator: Arc<dyn TranslationBackend>,
    pub shutdown: Notify,
    pub start_time: Instant,
}

impl DaemonState {
    pub fn new(
        db: Db,
        pipeline: Arc<WordPipeline>,
        translator: Arc<dyn TranslationBackend>,
    ) -> Self {
        DaemonState {
            db: Mutex::new(db),
            pipeline,
            translator,
            shutdown: Notify::new(),
            start_time: Instant::now(),
        }
    }
}

/// Fire-and-forget word enrichment for one entry. Callers invoke this
/// only after the transaction that queued the entry has committed.
pub fn spawn_word_processing(state: &Arc<DaemonState>, id: i64) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        process_entry(&state, id).await;
    });
}

/// Runs the full enrichment bracket for one entry.
pub async fn process_entry(state: &Arc<DaemonState>, id: i64) {
    let start = Instant::now();
    info!(id, "background processing started");

    // Claim transaction: mark PROCESSING, capture the inputs.
    let job = {
        let mut db = state.db.lock().await;
        match db.claim_for_processing(id) {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                error!(id, "claim failed: {e:#}");
                return;
            }
        }
    };

    // No database lock held below this line during model calls.
    let result = state
        .pipeline
        .process_word(&job.text, job.hint.as_deref())
        .await;

    // Translation is also outside any transaction; it may hit the
    // network. Skipped when there is no detected lemma to translate.
    let translation = if result.error.is_none() && !result.detection.detection_failed {
        let translator = Arc::clone(&state.translator);
        let lemma = result.detection.lemma.clone();
        let user_translation = job.user_translation.clone();
        task::spawn_blocking(move || {
            translate_with_fallback(translator.as_ref(), &lemma, user_translation.as_deref())
        })
        .await
        .ok()
        .flatten()
    } else {
        None
    };

    // Apply transaction: persist whatever came back.
    let applied = {
        let mut db = state.db.lock().await;
        db.apply_word_result(id, &result, translation.as_deref())
    };

    let metrics = state.pipeline.metrics();
    match applied {
        Ok(false) => {}
        Ok(true) => {
            if let Some(error) = &result.error {
                metrics.record_word_failed();
                error!(
                    id,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "background processing failed: {error}"
                );
            } else {
                metrics.record_word_completed();
                info!(
                    id,
                    lemma = %result.detection.lemma,
                    fully_successful = result.fully_successful,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "background processing completed"
                );
            }
        }
        Err(e) => {
            metrics.record_word_failed();
            error!(id, "failed to save processing results: {e:#}");
        }
    }
}

/// Fire-and-forget sentence generation for one queued entry.
pub fn spawn_sentence_generation(state: &Arc<DaemonState>, id: i64) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        generate_sentences_for(&state, id).await;
    });
}

/// Runs the sentence-generation bracket for one entry.
pub async fn generate_sentences_for(state: &Arc<DaemonState>, id: i64) {
    let job = {
        let mut db = state.db.lock().await;
        match db.claim_for_sentences(id) {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                error!(id, "sentence claim failed: {e:#}");
                return;
            }
        }
    };

    let pipeline = Arc::clone(&state.pipeline);
    let set = task::spawn_blocking(move || {
        pipeline.generate_sentences(
            &normalize_key(&job.text),
            job.translation.as_deref(),
            job.part_of_speech.as_deref(),
        )
    })
    .await
    .ok()
    .flatten();

    let metrics = state.pipeline.metrics();
    match set {
        Some(_) => metrics.record_sentence_run_done(),
        None => metrics.record_sentence_run_failed(),
    }

    let applied = {
        let mut db = state.db.lock().await;
        db.apply_sentence_result(id, set.as_ref())
    };
    match applied {
        Ok(true) => info!(id, generated = set.is_some(), "sentence generation finished"),
        Ok(false) => {}
        Err(e) => error!(id, "failed to save sentences: {e:#}"),
    }
}

/// Queues sentence generation for every completed entry that has none,
/// capped at [`SENTENCE_BATCH_LIMIT`] per sweep, and spawns a run for
/// each after the queueing transaction commits.
pub async fn queue_all_missing_sentences(state: &Arc<DaemonState>) -> Result<usize> {
    let ids = {
        let mut db = state.db.lock().await;
        db.queue_sentence_backfill(SENTENCE_BATCH_LIMIT)?
    };
    if !ids.is_empty() {
        info!(count = ids.len(), "queued sentence backfill batch");
    }
    if ids.len() == SENTENCE_BATCH_LIMIT {
        warn!(
            limit = SENTENCE_BATCH_LIMIT,
            "sentence backfill hit the batch cap, more entries remain"
        );
    }
    for id in &ids {
        spawn_sentence_generation(state, *id);
    }
    Ok(ids.len())
}
