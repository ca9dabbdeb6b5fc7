//! Component D: the Adaptive Retry Controller. Runs a caller-supplied
//! transactional function against fresh, batch-priority transactions,
//! classifying failures by walking the `anyhow` causal chain (grounded on
//! the teacher's backoff/error-classification idiom) rather than matching
//! on error strings, shrinking the row limit on capacity exhaustion and
//! backing off with jitter before retrying.

use std::{
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use errors::ErrorMetadata;
use futures::future::BoxFuture;
use rand::Rng;

use crate::{
    config::BuilderConfig,
    kv::{KvDatabase, KvTransaction, Priority},
    record_store::{IndexId, IndexState, RecordStore},
};

/// Holds the adaptive row limit shared across every call to
/// [`RetryController::run_with_retry`] for the lifetime of one builder run.
/// `spec.md` §4.D: "the limit is sticky: once shrunk it remains at the new
/// value; it does not recover during the run." `tries` and `wait` are local
/// to each `run_with_retry` call, not shared here.
pub struct RetryController {
    limit: AtomicU32,
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryController {
    pub fn new(config: &BuilderConfig) -> Self {
        Self {
            limit: AtomicU32::new(config.limit),
            max_retries: config.max_retries,
            initial_delay: config.initial_delay,
            max_delay: config.max_delay,
        }
    }

    /// The current adaptive row limit, post any shrinkage so far this run.
    pub fn limit(&self) -> u32 {
        self.limit.load(Ordering::Relaxed)
    }

    /// `spec.md` §4.D. `f` is applied to a fresh transaction at batch
    /// priority, with the record store's index first checked to be
    /// `WRITE_ONLY` (a configuration error, never retried, if not). On a
    /// capacity error the limit shrinks by a quarter (floor 1), a random
    /// jittered delay in `[0, wait)` is slept, `wait` doubles (capped at
    /// `max_delay`), and the loop retries from a new transaction.
    ///
    /// `f` returns a boxed future borrowing its arguments (rather than a
    /// plain generic `Future`-returning closure) because the closure must
    /// be higher-ranked over the per-attempt transaction's lifetime, which
    /// a bare associated-type `Fut` cannot express.
    pub async fn run_with_retry<R>(
        &self,
        db: &dyn KvDatabase,
        store: &dyn RecordStore,
        index: IndexId,
        mut f: impl for<'a> FnMut(&'a dyn RecordStore, &'a mut dyn KvTransaction, u32) -> BoxFuture<'a, anyhow::Result<R>>,
    ) -> anyhow::Result<R> {
        let mut tries = 0u32;
        let mut wait = self.initial_delay;

        loop {
            let mut tx = db.begin_transaction().await?;
            tx.set_priority(Priority::Batch);

            if store.index_state(index) != IndexState::WriteOnly {
                return Err(anyhow::anyhow!(ErrorMetadata::configuration(
                    "AttemptedBuildOfReadableIndex",
                    "the online builder requires the index to be in WRITE_ONLY state",
                )));
            }

            let limit = self.limit();
            let result = match f(store, tx.as_mut(), limit).await {
                Ok(value) => tx.commit().await.map(|()| value),
                Err(err) => Err(err),
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            tries += 1;
            if tries >= self.max_retries {
                return Err(err);
            }

            let Some(code) = errors::ErrorMetadataAnyhowExt::capacity_code(&err) else {
                return Err(err);
            };

            let new_limit = std::cmp::max(1, 3 * limit / 4);
            self.limit.store(new_limit, Ordering::Relaxed);
            crate::metrics::LIMIT_SHRINKS_TOTAL.inc();
            tracing::info!(?code, old_limit = limit, new_limit, "shrinking chunk limit after capacity error");

            let wait_ms = wait.as_millis().max(1) as u64;
            let delay_ms = rand::rng().random_range(0..wait_ms);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            wait = std::cmp::min(wait * 2, self.max_delay);
        }
    }
}
