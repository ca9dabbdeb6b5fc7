//! Component E: the Endpoint Primer. Marks the key-space regions outside
//! `RecordsRange` as already built, then registers the first and last live
//! record keys as built too, localizing the hot-spot contention most
//! writers create near the tail of the key space into a short prelude
//! before the long-running interior build.

use std::collections::BTreeSet;

use errors::ErrorMetadataAnyhowExt;
use futures::FutureExt;

use crate::{
    kv::KvDatabase,
    pk::{Interval, PrimaryKey},
    range_set::RangeSet,
    record_store::{IndexId, RecordStore, RecordType},
    retry::RetryController,
    unbuilt_range::build_unbuilt,
};

struct Endpoints {
    p_lo: Option<PrimaryKey>,
    p_hi: Option<PrimaryKey>,
}

/// `spec.md` §4.E. Returns the interior interval `[p_lo, p_hi)` still to be
/// built by the main Driver loop, or `None` if the record range is empty or
/// a single record (fully covered by priming alone).
pub async fn build_endpoints(
    retry: &RetryController,
    db: &dyn KvDatabase,
    store: &dyn RecordStore,
    index: IndexId,
    record_types: Option<&BTreeSet<RecordType>>,
    records_range: &Interval,
) -> anyhow::Result<Option<Interval>> {
    let endpoints = probe_endpoints(retry, db, store, index, records_range).await?;
    let Some(p_lo) = endpoints.p_lo else {
        return Ok(None);
    };
    let p_hi = endpoints.p_hi.expect("p_hi is set whenever p_lo is");

    build_endpoint_range(retry, db, store, index, records_range, record_types, &PrimaryKey::NegInf, &p_lo.immediate_successor()).await?;
    build_endpoint_range(retry, db, store, index, records_range, record_types, &p_hi, &PrimaryKey::PosInf).await?;

    if p_lo == p_hi {
        return Ok(None);
    }
    Ok(Some(Interval::new(p_lo, p_hi)))
}

/// `spec.md` §4.E steps 1-3: inserts the two tail regions outside
/// `records_range` (no records can exist there) and finds the first/last
/// live record keys, all within one transaction.
async fn probe_endpoints(
    retry: &RetryController,
    db: &dyn KvDatabase,
    store: &dyn RecordStore,
    index: IndexId,
    records_range: &Interval,
) -> anyhow::Result<Endpoints> {
    let records_range = records_range.clone();
    retry
        .run_with_retry(db, store, index, move |store, tx, _limit| {
            let records_range = records_range.clone();
            async move {
                let subspace = store.index_range_subspace(index);
                let range_set = RangeSet::new(&subspace);

                if !records_range.begin.is_unbounded_low() {
                    range_set.insert(tx, &PrimaryKey::NegInf, &records_range.begin).await?;
                }
                if !records_range.end.is_unbounded_high() {
                    range_set.insert(tx, &records_range.end, &PrimaryKey::PosInf).await?;
                }

                let mut first = store.scan_records(tx, &records_range, false, Some(1));
                if !first.has_next().await? {
                    range_set.insert(tx, &PrimaryKey::NegInf, &PrimaryKey::PosInf).await?;
                    return Ok(Endpoints { p_lo: None, p_hi: None });
                }
                let p_lo = first.next().pk;

                let mut last = store.scan_records(tx, &records_range, true, Some(1));
                last.has_next().await?;
                let p_hi = last.next().pk;

                Ok(Endpoints { p_lo: Some(p_lo), p_hi: Some(p_hi) })
            }
            .boxed()
        })
        .await
}

/// `spec.md` §4.E step 4: builds one endpoint range "as a normal chunk"
/// under the Retry Controller. A `RangeAlreadyBuilt` here means a concurrent
/// builder (or an earlier run of this same builder) already primed this
/// endpoint; that's expected and recovered exactly like the Driver recovers
/// it in the main loop (`spec.md` §7 class 2), not retried as a capacity
/// error, since it carries no capacity code.
async fn build_endpoint_range(
    retry: &RetryController,
    db: &dyn KvDatabase,
    store: &dyn RecordStore,
    index: IndexId,
    records_range: &Interval,
    record_types: Option<&BTreeSet<RecordType>>,
    begin: &PrimaryKey,
    end: &PrimaryKey,
) -> anyhow::Result<()> {
    let begin = begin.clone();
    let end = end.clone();
    let records_range = records_range.clone();
    let record_types = record_types.cloned();
    let result = retry
        .run_with_retry(db, store, index, move |store, tx, limit| {
            let begin = begin.clone();
            let end = end.clone();
            let records_range = records_range.clone();
            let record_types = record_types.clone();
            async move {
                build_unbuilt(store, tx, index, &begin, &end, &records_range, record_types.as_ref(), limit).await?;
                Ok(())
            }
            .boxed()
        })
        .await;

    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_range_already_built() => {
            crate::metrics::RANGE_ALREADY_BUILT_TOTAL.inc();
            Ok(())
        },
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::{
        config::BuilderConfig,
        kv::KvTransaction,
        record_store::{IndexMaintainer, IndexState, Record, RecordCursor},
        testing::InMemoryKv,
    };

    struct NoopMaintainer;

    #[async_trait]
    impl IndexMaintainer for NoopMaintainer {
        async fn update(&self, _tx: &mut dyn KvTransaction, _old: Option<&Record>, _new: Option<&Record>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct VecCursor {
        rows: Vec<Record>,
        pos: usize,
    }

    #[async_trait]
    impl RecordCursor for VecCursor {
        async fn has_next(&mut self) -> anyhow::Result<bool> {
            Ok(self.pos < self.rows.len())
        }

        fn next(&mut self) -> Record {
            let r = self.rows[self.pos].clone();
            self.pos += 1;
            r
        }

        fn continuation(&self) -> Vec<u8> {
            vec![]
        }
    }

    struct FakeStore {
        records: Vec<Record>,
    }

    #[async_trait]
    impl RecordStore for FakeStore {
        fn index_state(&self, _index: IndexId) -> IndexState {
            IndexState::WriteOnly
        }

        fn index_maintainer(&self, _index: IndexId) -> Arc<dyn IndexMaintainer> {
            Arc::new(NoopMaintainer)
        }

        fn scan_records(
            &self,
            _tx: &mut dyn KvTransaction,
            interval: &Interval,
            reverse: bool,
            limit: Option<u32>,
        ) -> Box<dyn RecordCursor> {
            let mut rows: Vec<Record> = self
                .records
                .iter()
                .filter(|r| r.pk >= interval.begin && r.pk < interval.end)
                .cloned()
                .collect();
            if reverse {
                rows.reverse();
            }
            if let Some(limit) = limit {
                rows.truncate(limit as usize);
            }
            Box::new(VecCursor { rows, pos: 0 })
        }

        fn clear_index_data(&self, _tx: &mut dyn KvTransaction, _index: IndexId) {}

        async fn mark_index_readable(&self, _tx: &mut dyn KvTransaction, _index: IndexId) -> anyhow::Result<()> {
            Ok(())
        }

        fn index_range_subspace(&self, _index: IndexId) -> Vec<u8> {
            b"idx".to_vec()
        }
    }

    fn pk(n: u8) -> PrimaryKey {
        PrimaryKey::key(Bytes::copy_from_slice(&[n]))
    }

    #[tokio::test]
    async fn empty_store_primes_whole_universe_and_returns_none() {
        let store = FakeStore { records: vec![] };
        let cfg = BuilderConfig::new(None, Interval::unbounded());
        let rc = RetryController::new(&cfg);
        let kv = InMemoryKv::new();

        let interior = build_endpoints(&rc, &kv, &store, IndexId(0), None, &Interval::unbounded())
            .await
            .unwrap();
        assert_eq!(interior, None);

        let mut tx = kv.begin();
        let range_set = RangeSet::new(b"idx");
        let missing = range_set.missing(&mut tx, &PrimaryKey::NegInf, &PrimaryKey::PosInf).await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn single_record_is_fully_primed_with_no_interior() {
        let store = FakeStore { records: vec![Record { pk: pk(5), record_type: 0, payload: Bytes::new() }] };
        let cfg = BuilderConfig::new(None, Interval::unbounded());
        let rc = RetryController::new(&cfg);
        let kv = InMemoryKv::new();

        let interior = build_endpoints(&rc, &kv, &store, IndexId(0), None, &Interval::unbounded())
            .await
            .unwrap();
        assert_eq!(interior, None);
    }

    #[tokio::test]
    async fn multi_record_range_returns_interior_interval() {
        let store = FakeStore {
            records: vec![
                Record { pk: pk(1), record_type: 0, payload: Bytes::new() },
                Record { pk: pk(5), record_type: 0, payload: Bytes::new() },
                Record { pk: pk(9), record_type: 0, payload: Bytes::new() },
            ],
        };
        let cfg = BuilderConfig::new(None, Interval::unbounded());
        let rc = RetryController::new(&cfg);
        let kv = InMemoryKv::new();

        let interior = build_endpoints(&rc, &kv, &store, IndexId(0), None, &Interval::unbounded())
            .await
            .unwrap();
        assert_eq!(interior, Some(Interval::new(pk(1), pk(9))));

        // endpoints [-inf, succ(1)) and [9, +inf) are primed; only the gap
        // between the primed prefix and p_hi remains missing.
        let mut tx = kv.begin();
        let range_set = RangeSet::new(b"idx");
        let missing = range_set.missing(&mut tx, &PrimaryKey::NegInf, &PrimaryKey::PosInf).await.unwrap();
        assert_eq!(missing, vec![Interval::new(pk(1).immediate_successor(), pk(9))]);
    }
}
