//! Process-wide pipeline counters. Observability only: nothing reads
//! these to make decisions, they are reported through the daemon's
//! status response.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Default)]
pub struct StageCounters {
    successes: AtomicU64,
    failures: AtomicU64,
    success_millis: AtomicU64,
    failure_millis: AtomicU64,
}

impl StageCounters {
    pub fn record_success(&self, elapsed: Duration) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.success_millis
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, elapsed: Duration) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.failure_millis
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            success_millis: self.success_millis.load(Ordering::Relaxed),
            failure_millis: self.failure_millis.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageSnapshot {
    pub successes: u64,
    pub failures: u64,
    pub success_millis: u64,
    pub failure_millis: u64,
}

/// One set of counters per pipeline stage plus whole-word outcomes.
/// Stage counters are `Arc`s so each stage service can hold its own
/// handle while this struct snapshots them all.
#[derive(Default)]
pub struct PipelineMetrics {
    pub lemma: Arc<StageCounters>,
    pub inflections: Arc<StageCounters>,
    pub metadata: Arc<StageCounters>,
    pub sentences: Arc<StageCounters>,
    words_completed: AtomicU64,
    words_failed: AtomicU64,
    sentence_runs_done: AtomicU64,
    sentence_runs_failed: AtomicU64,
}

impl PipelineMetrics {
    pub fn record_word_completed(&self) {
        self.words_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_word_failed(&self) {
        self.words_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sentence_run_done(&self) {
        self.sentence_runs_done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sentence_run_failed(&self) {
        self.sentence_runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lemma: self.lemma.snapshot(),
            inflections: self.inflections.snapshot(),
            metadata: self.metadata.snapshot(),
            sentences: self.sentences.snapshot(),
            words_completed: self.words_completed.load(Ordering::Relaxed),
            words_failed: self.words_failed.load(Ordering::Relaxed),
            sentence_runs_done: self.sentence_runs_done.load(Ordering::Relaxed),
            sentence_runs_failed: self.sentence_runs_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub lemma: StageSnapshot,
    pub inflections: StageSnapshot,
    pub metadata: StageSnapshot,
    pub sentences: StageSnapshot,
    pub words_completed: u64,
    pub words_failed: u64,
    pub sentence_runs_done: u64,
    pub sentence_runs_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_counters() {
        let c = StageCounters::default();
        c.record_success(Duration::from_millis(120));
        c.record_success(Duration::from_millis(80));
        c.record_failure(Duration::from_millis(30));
        let snap = c.snapshot();
        assert_eq!(snap.successes, 2);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.success_millis, 200);
        assert_eq!(snap.failure_millis, 30);
    }

    #[test]
    fn test_word_outcomes() {
        let m = PipelineMetrics::default();
        m.record_word_completed();
        m.record_word_completed();
        m.record_word_failed();
        let snap = m.snapshot();
        assert_eq!(snap.words_completed, 2);
        assert_eq!(snap.words_failed, 1);
    }
}
