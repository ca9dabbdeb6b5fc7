//! External collaborators, interfaces only (`spec.md` §1): record-store
//! opening/schema resolution and index-maintainer update semantics per index
//! kind are out of scope. This module defines the trait shapes the rest of
//! the crate needs in order to compile and be testable against a fake.

use async_trait::async_trait;

use crate::{kv::KvTransaction, pk::PrimaryKey};

/// Opaque record-type identifier. Records whose type is not in the
/// builder's Record Type Set are scanned but not indexed (`spec.md` §3).
pub type RecordType = u32;

/// Opaque index identifier, scoped to one record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexId(pub u64);

/// `spec.md` §4.G's index state machine: `DISABLED -> WRITE_ONLY -> READABLE`,
/// with a rebuild request returning `READABLE -> WRITE_ONLY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Disabled,
    WriteOnly,
    Readable,
}

/// A record read from the store: an opaque payload tagged with its PK and
/// type. The builder reads but never mutates records (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub pk: PrimaryKey,
    pub record_type: RecordType,
    pub payload: bytes::Bytes,
}

/// A forward (or reverse) cursor over records in a PK interval, per
/// `spec.md` §6's `scan_records(range, continuation, props) -> Cursor<Record>`.
#[async_trait]
pub trait RecordCursor: Send {
    async fn has_next(&mut self) -> anyhow::Result<bool>;
    fn next(&mut self) -> Record;
    fn continuation(&self) -> Vec<u8>;
}

/// Applies a record's effect to an index's stored representation.
/// `old_record = None` marks an initial build, not an update (`spec.md` §4.B).
#[async_trait]
pub trait IndexMaintainer: Send + Sync {
    async fn update(
        &self,
        tx: &mut dyn KvTransaction,
        old_record: Option<&Record>,
        new_record: Option<&Record>,
    ) -> anyhow::Result<()>;
}

/// The record store: opening/schema resolution is out of scope, so this
/// trait assumes a store has already been opened and resolved against a
/// particular transaction.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn index_state(&self, index: IndexId) -> IndexState;

    fn index_maintainer(&self, index: IndexId) -> std::sync::Arc<dyn IndexMaintainer>;

    /// Opens a record cursor over `interval`, honoring `limit` if given.
    fn scan_records(
        &self,
        tx: &mut dyn KvTransaction,
        interval: &crate::pk::Interval,
        reverse: bool,
        limit: Option<u32>,
    ) -> Box<dyn RecordCursor>;

    fn clear_index_data(&self, tx: &mut dyn KvTransaction, index: IndexId);

    async fn mark_index_readable(&self, tx: &mut dyn KvTransaction, index: IndexId) -> anyhow::Result<()>;

    /// The KV key prefix under which Built-Range Set entries for `index` live.
    fn index_range_subspace(&self, index: IndexId) -> Vec<u8>;
}
