//! Startup recovery of entries stranded by a previous crash.
//!
//! Words left QUEUED or PROCESSING and sentence runs left QUEUED or
//! GENERATING are resubmitted before the daemon accepts connections.
//! Resubmission reuses the normal claim/apply bracket: the claim
//! transactions mark PROCESSING/GENERATING regardless of the current
//! state, so a stranded entry needs no explicit reset back to QUEUED
//! first.

use std::sync::Arc;

use anyhow::Result;
use rechnik_core::{ProcessingStatus, SentenceStatus};
use tracing::info;

use crate::coordinator::{spawn_sentence_generation, spawn_word_processing, DaemonState};

/// Scans for stuck entries and resubmits them. Returns the number of
/// resubmitted word runs and sentence runs.
pub async fn recover_stuck_entries(state: &Arc<DaemonState>) -> Result<(usize, usize)> {
    let (word_ids, sentence_ids) = {
        let db = state.db.lock().await;
        let words = db.entries_with_processing_status(&[
            ProcessingStatus::Queued,
            ProcessingStatus::Processing,
        ])?;
        let sentences = db.entries_with_sentence_status(&[
            SentenceStatus::Queued,
            SentenceStatus::Generating,
        ])?;
        (words, sentences)
    };

    if word_ids.is_empty() && sentence_ids.is_empty() {
        info!("no stuck entries found at startup");
        return Ok((0, 0));
    }

    info!(
        words = word_ids.len(),
        sentences = sentence_ids.len(),
        "resubmitting stuck entries"
    );
    for id in &word_ids {
        spawn_word_processing(state, *id);
    }
    for id in &sentence_ids {
        spawn_sentence_generation(state, *id);
    }
    Ok((word_ids.len(), sentence_ids.len()))
}
