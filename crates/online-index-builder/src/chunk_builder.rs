//! Component B: `build_chunk`, the innermost unit of work — one forward scan
//! over a bounded prefix of an interval, applying the index maintainer to
//! each record in strict cursor order.

use crate::{
    pk::{Interval, PrimaryKey},
    record_store::RecordStore,
};

/// `spec.md` §3: the outcome of one chunk scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// The cursor reached `interval.end` without hitting the row limit.
    Complete,
    /// The row limit was hit; more work remains starting at this PK.
    Partial(PrimaryKey),
    /// No records were seen in the interval at all.
    Empty,
}

impl ChunkOutcome {
    /// `spec.md` §4.C step 1: "if `real_end` is `None`, treat as `end`".
    pub fn real_end(&self, interval_end: &PrimaryKey) -> PrimaryKey {
        match self {
            ChunkOutcome::Complete | ChunkOutcome::Empty => interval_end.clone(),
            ChunkOutcome::Partial(pk) => pk.clone(),
        }
    }
}

/// `spec.md` §4.B: scans `interval ∩ RecordsRange` within the caller's
/// transaction, applying `store`'s index maintainer to every record whose
/// type is in the Record Type Set. Maintainer updates are applied strictly
/// sequentially in cursor order — never pipelined — because some index
/// kinds have internal ordering dependencies (rank/score indexes) that
/// break under concurrent application.
pub async fn build_chunk(
    store: &dyn RecordStore,
    tx: &mut dyn crate::kv::KvTransaction,
    index: crate::record_store::IndexId,
    interval: &Interval,
    records_range: &Interval,
    record_types: Option<&std::collections::BTreeSet<crate::record_store::RecordType>>,
    respect_limit: bool,
    limit: u32,
) -> anyhow::Result<ChunkOutcome> {
    let Some(interval) = interval.intersect(records_range) else {
        return Ok(ChunkOutcome::Empty);
    };
    let interval = &interval;
    if interval.is_empty() {
        return Ok(ChunkOutcome::Empty);
    }

    let maintainer = store.index_maintainer(index);
    let scan_limit = respect_limit.then_some(limit);
    let mut cursor = store.scan_records(tx, interval, false, scan_limit);

    let mut rows_seen = 0u32;
    let mut last_pk: Option<PrimaryKey> = None;
    while cursor.has_next().await? {
        let record = cursor.next();
        crate::metrics::RECORDS_SCANNED_TOTAL.inc();
        if record_types.map_or(true, |types| types.contains(&record.record_type)) {
            maintainer.update(tx, None, Some(&record)).await?;
            crate::metrics::RECORDS_INDEXED_TOTAL.inc();
        }
        last_pk = Some(record.pk.clone());
        rows_seen += 1;
    }

    if rows_seen == 0 {
        return Ok(ChunkOutcome::Empty);
    }
    if respect_limit && rows_seen >= limit {
        // Row limit reached: find the PK strictly after the last consumed
        // row via a one-row continuation cursor, which becomes the resume
        // point for the next chunk.
        let last_pk = last_pk.expect("rows_seen > 0 implies last_pk is set");
        let remainder = Interval::new(last_pk.immediate_successor(), interval.end.clone());
        let mut continuation = store.scan_records(tx, &remainder, false, Some(1));
        if continuation.has_next().await? {
            return Ok(ChunkOutcome::Partial(continuation.next().pk));
        }
        return Ok(ChunkOutcome::Complete);
    }
    Ok(ChunkOutcome::Complete)
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, sync::Arc};

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::{
        kv::KvTransaction,
        record_store::{IndexState, Record, RecordCursor},
        testing::InMemoryKv,
    };

    struct FakeMaintainer {
        applied: parking_lot::Mutex<Vec<PrimaryKey>>,
    }

    #[async_trait]
    impl crate::record_store::IndexMaintainer for FakeMaintainer {
        async fn update(
            &self,
            _tx: &mut dyn KvTransaction,
            old_record: Option<&Record>,
            new_record: Option<&Record>,
        ) -> anyhow::Result<()> {
            assert!(old_record.is_none(), "initial build must pass old_record=None");
            self.applied.lock().push(new_record.unwrap().pk.clone());
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
        maintainer: Arc<FakeMaintainer>,
    }

    #[async_trait]
    impl RecordStore for FakeStore {
        fn index_state(&self, _index: crate::record_store::IndexId) -> IndexState {
            IndexState::WriteOnly
        }

        fn index_maintainer(&self, _index: crate::record_store::IndexId) -> Arc<dyn crate::record_store::IndexMaintainer> {
            self.maintainer.clone()
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

        fn clear_index_data(&self, _tx: &mut dyn KvTransaction, _index: crate::record_store::IndexId) {}

        async fn mark_index_readable(&self, _tx: &mut dyn KvTransaction, _index: crate::record_store::IndexId) -> anyhow::Result<()> {
            Ok(())
        }

        fn index_range_subspace(&self, _index: crate::record_store::IndexId) -> Vec<u8> {
            b"idx".to_vec()
        }
    }

    fn pk(n: u8) -> PrimaryKey {
        PrimaryKey::key(Bytes::copy_from_slice(&[n]))
    }

    fn record(n: u8, record_type: u32) -> Record {
        Record {
            pk: pk(n),
            record_type,
            payload: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn scans_fewer_than_limit_and_returns_complete() {
        let maintainer = Arc::new(FakeMaintainer { applied: Default::default() });
        let store = FakeStore {
            records: vec![record(1, 0), record(2, 0), record(3, 0)],
            maintainer: maintainer.clone(),
        };
        let kv = InMemoryKv::new();
        let mut tx = kv.begin();
        let outcome = build_chunk(
            &store,
            &mut tx,
            crate::record_store::IndexId(0),
            &Interval::unbounded(),
            &Interval::unbounded(),
            None,
            true,
            100,
        )
        .await
        .unwrap();
        assert_eq!(outcome, ChunkOutcome::Complete);
        assert_eq!(maintainer.applied.lock().len(), 3);
    }

    #[tokio::test]
    async fn hits_limit_and_returns_partial_with_resume_point() {
        let maintainer = Arc::new(FakeMaintainer { applied: Default::default() });
        let store = FakeStore {
            records: vec![record(1, 0), record(2, 0), record(3, 0)],
            maintainer: maintainer.clone(),
        };
        let kv = InMemoryKv::new();
        let mut tx = kv.begin();
        let outcome = build_chunk(
            &store,
            &mut tx,
            crate::record_store::IndexId(0),
            &Interval::unbounded(),
            &Interval::unbounded(),
            None,
            true,
            2,
        )
        .await
        .unwrap();
        assert_eq!(outcome, ChunkOutcome::Partial(pk(3)));
        assert_eq!(maintainer.applied.lock().len(), 2);
    }

    #[tokio::test]
    async fn empty_interval_is_a_no_op() {
        let maintainer = Arc::new(FakeMaintainer { applied: Default::default() });
        let store = FakeStore {
            records: vec![record(1, 0)],
            maintainer: maintainer.clone(),
        };
        let kv = InMemoryKv::new();
        let mut tx = kv.begin();
        let outcome = build_chunk(
            &store,
            &mut tx,
            crate::record_store::IndexId(0),
            &Interval::new(pk(5), pk(5)),
            &Interval::unbounded(),
            None,
            true,
            10,
        )
        .await
        .unwrap();
        assert_eq!(outcome, ChunkOutcome::Empty);
    }

    #[tokio::test]
    async fn record_type_outside_rts_is_scanned_but_not_indexed() {
        let maintainer = Arc::new(FakeMaintainer { applied: Default::default() });
        let store = FakeStore {
            records: vec![record(1, 0), record(2, 1)],
            maintainer: maintainer.clone(),
        };
        let kv = InMemoryKv::new();
        let mut tx = kv.begin();
        let mut rts = BTreeSet::new();
        rts.insert(0u32);
        build_chunk(
            &store,
            &mut tx,
            crate::record_store::IndexId(0),
            &Interval::unbounded(),
            &Interval::unbounded(),
            Some(&rts),
            true,
            100,
        )
        .await
        .unwrap();
        assert_eq!(maintainer.applied.lock().clone(), vec![pk(1)]);
    }

    #[tokio::test]
    async fn records_outside_records_range_are_not_scanned() {
        let maintainer = Arc::new(FakeMaintainer { applied: Default::default() });
        let store = FakeStore {
            records: vec![record(1, 0), record(5, 0), record(9, 0)],
            maintainer: maintainer.clone(),
        };
        let kv = InMemoryKv::new();
        let mut tx = kv.begin();
        // The query spans the whole universe, but RecordsRange only covers
        // [pk(3), pk(9)); the record at pk(1) sits outside it and must not
        // reach the maintainer even though it's inside the query interval.
        let outcome = build_chunk(
            &store,
            &mut tx,
            crate::record_store::IndexId(0),
            &Interval::unbounded(),
            &Interval::new(pk(3), pk(9)),
            None,
            true,
            100,
        )
        .await
        .unwrap();
        assert_eq!(outcome, ChunkOutcome::Complete);
        assert_eq!(maintainer.applied.lock().clone(), vec![pk(5)]);
    }

    #[tokio::test]
    async fn chaining_partial_chunks_never_reapplies_the_boundary_record() {
        let maintainer = Arc::new(FakeMaintainer { applied: Default::default() });
        let store = FakeStore {
            records: vec![record(1, 0), record(2, 0), record(3, 0)],
            maintainer: maintainer.clone(),
        };
        let kv = InMemoryKv::new();
        let mut tx = kv.begin();

        let outcome = build_chunk(
            &store,
            &mut tx,
            crate::record_store::IndexId(0),
            &Interval::unbounded(),
            &Interval::unbounded(),
            None,
            true,
            2,
        )
        .await
        .unwrap();
        let ChunkOutcome::Partial(resume) = outcome else {
            panic!("expected Partial, got {outcome:?}");
        };

        build_chunk(
            &store,
            &mut tx,
            crate::record_store::IndexId(0),
            &Interval::new(resume, PrimaryKey::PosInf),
            &Interval::unbounded(),
            None,
            true,
            2,
        )
        .await
        .unwrap();

        // Every PK applied exactly once across the two chained chunks, in
        // particular the boundary record (pk(2)) that ended the first chunk.
        assert_eq!(maintainer.applied.lock().clone(), vec![pk(1), pk(2), pk(3)]);
    }
}
