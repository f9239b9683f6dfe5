//! Cache → breaker → call composition shared by every model stage.
//!
//! This layer is where errors stop propagating: transport failures and
//! validation failures alike are recorded against the breaker, logged,
//! and collapsed into `None`. Callers only ever see "got a validated
//! response" or "didn't".

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, warn};

use crate::breaker::CircuitBreaker;
use crate::cache::ResponseCache;
use crate::metrics::StageCounters;
use crate::validator::ValidationError;

pub struct StageService<T> {
    name: &'static str,
    cache: ResponseCache<T>,
    breaker: Arc<CircuitBreaker>,
    counters: Arc<StageCounters>,
}

impl<T: Clone> StageService<T> {
    pub fn new(
        name: &'static str,
        ttl: Duration,
        breaker: Arc<CircuitBreaker>,
        counters: Arc<StageCounters>,
    ) -> Self {
        StageService {
            name,
            cache: ResponseCache::new(ttl),
            breaker,
            counters,
        }
    }

    /// Runs one stage call: cache lookup, breaker gate, then `call`,
    /// whose result must already be validated. A cached response costs
    /// no breaker state and no metrics.
    pub fn execute<F>(&self, cache_key: &str, call: F) -> Option<T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(cached) = self.cache.get(cache_key) {
            debug!(stage = self.name, key = cache_key, "cache hit");
            return Some(cached);
        }

        if !self.breaker.allow_call() {
            warn!(
                stage = self.name,
                key = cache_key,
                breaker = self.breaker.name(),
                "breaker open, falling back"
            );
            return None;
        }

        let start = Instant::now();
        match call() {
            Ok(value) => {
                self.breaker.record_success();
                self.counters.record_success(start.elapsed());
                self.cache.insert(cache_key, value.clone());
                Some(value)
            }
            Err(e) => {
                self.breaker.record_failure();
                self.counters.record_failure(start.elapsed());
                if e.downcast_ref::<ValidationError>().is_some() {
                    warn!(stage = self.name, key = cache_key, "validation failed: {e:#}");
                } else {
                    warn!(stage = self.name, key = cache_key, "call failed: {e:#}");
                }
                None
            }
        }
    }

    /// (hits, misses) for the stage cache.
    pub fn cache_stats(&self) -> (u64, u64) {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerConfig;
    use crate::cache::DEFAULT_TTL;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn stage() -> StageService<String> {
        StageService::new(
            "test",
            DEFAULT_TTL,
            Arc::new(CircuitBreaker::new("test", BreakerConfig::default())),
            Arc::new(StageCounters::default()),
        )
    }

    #[test]
    fn test_second_call_served_from_cache() {
        let stage = stage();
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let out = stage.execute("Котка", || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("ok".to_string())
            });
            assert_eq!(out, Some("ok".to_string()));
        }
        // normalized key: different spelling of the same word also hits
        let out = stage.execute("котка ", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("other".to_string())
        });
        assert_eq!(out, Some("ok".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_returns_none_and_is_not_cached() {
        let stage = stage();
        let out = stage.execute("дума", || anyhow::bail!("boom"));
        assert_eq!(out, None);
        let out = stage.execute("дума", || Ok("ok".to_string()));
        assert_eq!(out, Some("ok".to_string()));
    }

    #[test]
    fn test_open_breaker_short_circuits() {
        let stage = stage();
        // breaker defaults: opens after 4 failures in the window
        for i in 0..4 {
            stage.execute(&format!("k{i}"), || anyhow::bail!("down"));
        }
        let calls = AtomicUsize::new(0);
        let out = stage.execute("котка", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("ok".to_string())
        });
        assert_eq!(out, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_validation_error_counts_as_failure() {
        let stage = stage();
        for i in 0..4 {
            stage.execute(&format!("k{i}"), || {
                Err(ValidationError::new("bad shape").into())
            });
        }
        assert_eq!(stage.execute("котка", || Ok("ok".to_string())), None);
    }
}
