//! Component F: the Build Driver. Primes the endpoints, enumerates missing
//! intervals into a FIFO queue, and pumps each through the Unbuilt-Range
//! Transaction under the Retry Controller, applying the configured rate
//! limit and recovering `RangeAlreadyBuilt` by re-querying the Built-Range
//! Set for what another actor left for us to do.

use std::{collections::VecDeque, time::Duration};

use errors::ErrorMetadataAnyhowExt;
use futures::FutureExt;

use crate::{
    config::{BuilderConfig, RateLimit},
    kv::KvDatabase,
    metrics,
    pk::Interval,
    primer::build_endpoints,
    range_set::RangeSet,
    record_store::{IndexId, RecordStore},
    retry::RetryController,
    unbuilt_range::build_unbuilt,
};

/// Totals accumulated over one `build_index` call (SPEC_FULL.md supplement
/// over `spec.md` §6's observability counters); purely additive reporting,
/// does not affect the driver's control flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub records_scanned: u64,
    pub records_indexed: u64,
    pub chunks_committed: u64,
}

/// `spec.md` §4.F.
pub async fn build_index(
    retry: &RetryController,
    db: &dyn KvDatabase,
    store: &dyn RecordStore,
    index: IndexId,
    config: &BuilderConfig,
    mark_readable: bool,
) -> anyhow::Result<BuildSummary> {
    let _timer = metrics::WAIT_ONLINE_BUILD_INDEX_SECONDS.start_timer();
    let scanned_before = metrics::RECORDS_SCANNED_TOTAL.get();
    let indexed_before = metrics::RECORDS_INDEXED_TOTAL.get();
    let mut summary = BuildSummary::default();

    let interior = build_endpoints(retry, db, store, index, config.record_types.as_ref(), &config.records_range).await?;

    let Some(interior) = interior else {
        if mark_readable {
            mark_readable_under_retry(retry, db, store, index).await?;
        }
        summary.records_scanned = metrics::RECORDS_SCANNED_TOTAL.get() - scanned_before;
        summary.records_indexed = metrics::RECORDS_INDEXED_TOTAL.get() - indexed_before;
        return Ok(summary);
    };

    let mut queue: VecDeque<Interval> = query_missing(retry, db, store, index, &interior.begin, &interior.end)
        .await?
        .into();

    while let Some(Interval { begin, end }) = queue.pop_front() {
        let begin_for_closure = begin.clone();
        let end_for_closure = end.clone();
        let records_range = config.records_range.clone();
        let record_types = config.record_types.clone();
        let result = retry
            .run_with_retry(db, store, index, move |store, tx, limit| {
                let begin = begin_for_closure.clone();
                let end = end_for_closure.clone();
                let records_range = records_range.clone();
                let record_types = record_types.clone();
                async move { build_unbuilt(store, tx, index, &begin, &end, &records_range, record_types.as_ref(), limit).await }.boxed()
            })
            .await;

        match result {
            Ok(real_end) => {
                summary.chunks_committed += 1;
                metrics::CHUNKS_COMMITTED_TOTAL.inc();
                if real_end != end {
                    // Partial progress: the row limit was hit before the
                    // whole interval was consumed; requeue the remainder.
                    queue.push_back(Interval::new(real_end, end));
                }
                sleep_for_rate_limit(config, retry.limit()).await;
            },
            Err(err) if err.is_range_already_built() => {
                // Another actor committed inside our interval first. Our
                // transaction never committed (the chunk's maintainer
                // updates were rolled back with it), so re-querying and
                // continuing is safe: nothing was double-applied.
                metrics::RANGE_ALREADY_BUILT_TOTAL.inc();
                tracing::info!(?begin, ?end, "range already built by another actor, re-querying");
                let remaining = query_missing(retry, db, store, index, &begin, &end).await?;
                queue.extend(remaining);
                sleep_for_rate_limit(config, retry.limit()).await;
            },
            Err(err) => return Err(err),
        }
    }

    if mark_readable {
        mark_readable_under_retry(retry, db, store, index).await?;
    }

    summary.records_scanned = metrics::RECORDS_SCANNED_TOTAL.get() - scanned_before;
    summary.records_indexed = metrics::RECORDS_INDEXED_TOTAL.get() - indexed_before;
    Ok(summary)
}

async fn query_missing(
    retry: &RetryController,
    db: &dyn KvDatabase,
    store: &dyn RecordStore,
    index: IndexId,
    begin: &crate::pk::PrimaryKey,
    end: &crate::pk::PrimaryKey,
) -> anyhow::Result<Vec<Interval>> {
    let begin = begin.clone();
    let end = end.clone();
    retry
        .run_with_retry(db, store, index, move |store, tx, _limit| {
            let begin = begin.clone();
            let end = end.clone();
            async move {
                let subspace = store.index_range_subspace(index);
                let range_set = RangeSet::new(&subspace);
                range_set.missing(tx, &begin, &end).await
            }
            .boxed()
        })
        .await
}

async fn mark_readable_under_retry(retry: &RetryController, db: &dyn KvDatabase, store: &dyn RecordStore, index: IndexId) -> anyhow::Result<()> {
    retry
        .run_with_retry(db, store, index, move |store, tx, _limit| {
            async move { store.mark_index_readable(tx, index).await }.boxed()
        })
        .await
}

/// `spec.md` §4.F step 4c: `1000 * limit / records_per_second` milliseconds,
/// using the *current* (possibly shrunk) limit so throughput adapts.
async fn sleep_for_rate_limit(config: &BuilderConfig, limit: u32) {
    if let RateLimit::PerSecond(records_per_second) = config.records_per_second {
        let millis = 1000u64 * limit as u64 / records_per_second as u64;
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }
}
