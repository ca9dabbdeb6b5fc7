//! The KV store contract from `spec.md` §6, expressed as traits so the rest
//! of this crate is independent of any concrete KV client. Opening a record
//! store, resolving schema, and the transaction API beyond this contract are
//! out of scope (`spec.md` §1) — these traits are the seam.

use async_trait::async_trait;

/// Transaction priority. `Batch` is the lowest priority, yielding to user
/// traffic, and is what the Retry Controller always uses (`spec.md` §4.D
/// step 1, §5 "batch priority").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Batch,
    Default,
}

/// One row yielded by a [`KvCursor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvRow {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// A forward or reverse range cursor over a transaction, matching
/// `spec.md` §6's `Cursor`: `has_next`/`next`/`continuation`.
#[async_trait]
pub trait KvCursor: Send {
    /// Whether another row is available. May perform I/O (a suspension
    /// point per `spec.md` §5).
    async fn has_next(&mut self) -> anyhow::Result<bool>;

    /// Consumes and returns the next row. Panics if `has_next` was not
    /// called first and did not return `true`, mirroring typical cursor
    /// contracts in KV client libraries.
    fn next(&mut self) -> KvRow;

    /// An opaque continuation that can be used to resume this scan from
    /// just past the last row consumed.
    fn continuation(&self) -> Vec<u8>;
}

/// A single KV transaction, per `spec.md` §6.
#[async_trait]
pub trait KvTransaction: Send {
    fn set_priority(&mut self, priority: Priority);

    async fn get(&mut self, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>>;

    fn set(&mut self, key: &[u8], value: &[u8]);

    fn clear_range(&mut self, begin: &[u8], end: &[u8]);

    /// Opens a forward (or, if `reverse`, backward) cursor over
    /// `[begin, end)`, capped at `limit` rows if given.
    fn scan(&self, begin: &[u8], end: &[u8], reverse: bool, limit: Option<u32>) -> Box<dyn KvCursor>;

    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
}

/// The database handle. `spec.md` §6's `run(fn) -> Future<T>` is realized
/// as the composition `begin_transaction` + apply `f` + `commit`, performed
/// by the Retry Controller (`retry.rs`) itself — that composition *is*
/// component D's "begin a fresh transaction ... apply f(store) ... on
/// success, return" loop body, so there is no separate `run` method here.
#[async_trait]
pub trait KvDatabase: Send + Sync {
    async fn begin_transaction(&self) -> anyhow::Result<Box<dyn KvTransaction>>;
}
