//! An in-memory fake of the [`crate::kv`] traits (SPEC_FULL.md component K),
//! used by this crate's own tests and exported under the `testing` feature
//! for downstream integration tests. Modeled on the teacher's practice of
//! shipping a `Fake`/in-memory backend alongside its real store adapters.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::kv::{KvCursor, KvDatabase, KvRow, KvTransaction, Priority};

/// Installs a best-effort `tracing` subscriber controlled by `RUST_LOG`, so a
/// failing test can be re-run with logs visible. Safe to call from many
/// tests concurrently; only the first call actually installs a subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).try_init();
}

#[derive(Default)]
struct Inner {
    rows: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// A single, process-local ordered map standing in for a KV cluster.
/// Transactions opened against it see a snapshot read view and buffer their
/// writes locally until `commit`, matching the contract in `kv.rs` closely
/// enough for unit and integration tests; it does not model conflict
/// detection, since nothing in this crate depends on commits actually
/// failing with a conflict (capacity errors are injected directly in tests
/// that need them).
#[derive(Clone, Default)]
pub struct InMemoryKv {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test convenience: begin a transaction without going through the
    /// `KvDatabase` trait object, for tests that only need one transaction
    /// at a time and want to avoid a `Box<dyn KvTransaction>` downcast.
    pub fn begin(&self) -> InMemoryTransaction {
        InMemoryTransaction {
            store: self.inner.clone(),
            snapshot: self.inner.lock().unwrap().rows.clone(),
            writes: BTreeMap::new(),
            clears: Vec::new(),
            _priority: Priority::Default,
        }
    }

    pub fn row_count(&self) -> usize {
        self.inner.lock().unwrap().rows.len()
    }
}

#[async_trait]
impl KvDatabase for InMemoryKv {
    async fn begin_transaction(&self) -> anyhow::Result<Box<dyn KvTransaction>> {
        Ok(Box::new(self.begin()))
    }
}

pub struct InMemoryTransaction {
    store: Arc<Mutex<Inner>>,
    snapshot: BTreeMap<Vec<u8>, Vec<u8>>,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    clears: Vec<(Vec<u8>, Vec<u8>)>,
    _priority: Priority,
}

impl InMemoryTransaction {
    /// The transaction's read view: the original snapshot with buffered
    /// writes/clears applied, matching how a real transaction sees its own
    /// uncommitted mutations.
    fn view(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        let mut view = self.snapshot.clone();
        for (begin, end) in &self.clears {
            let keys: Vec<Vec<u8>> = view
                .range(begin.clone()..end.clone())
                .map(|(k, _)| k.clone())
                .collect();
            for k in keys {
                view.remove(&k);
            }
        }
        for (k, v) in &self.writes {
            match v {
                Some(value) => {
                    view.insert(k.clone(), value.clone());
                },
                None => {
                    view.remove(k);
                },
            }
        }
        view
    }
}

#[async_trait]
impl KvTransaction for InMemoryTransaction {
    fn set_priority(&mut self, priority: Priority) {
        self._priority = priority;
    }

    async fn get(&mut self, key: &[u8]) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.view().get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn clear_range(&mut self, begin: &[u8], end: &[u8]) {
        self.clears.push((begin.to_vec(), end.to_vec()));
    }

    fn scan(&self, begin: &[u8], end: &[u8], reverse: bool, limit: Option<u32>) -> Box<dyn KvCursor> {
        let view = self.view();
        let mut rows: Vec<KvRow> = view
            .range(begin.to_vec()..end.to_vec())
            .map(|(k, v)| KvRow {
                key: k.clone(),
                value: v.clone(),
            })
            .collect();
        if reverse {
            rows.reverse();
        }
        if let Some(limit) = limit {
            rows.truncate(limit as usize);
        }
        Box::new(InMemoryCursor { rows, pos: 0 })
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let mut store = self.store.lock().unwrap();
        for (begin, end) in &self.clears {
            let keys: Vec<Vec<u8>> = store.rows.range(begin.clone()..end.clone()).map(|(k, _)| k.clone()).collect();
            for k in keys {
                store.rows.remove(&k);
            }
        }
        for (k, v) in self.writes {
            match v {
                Some(value) => {
                    store.rows.insert(k, value);
                },
                None => {
                    store.rows.remove(&k);
                },
            }
        }
        Ok(())
    }
}

struct InMemoryCursor {
    rows: Vec<KvRow>,
    pos: usize,
}

#[async_trait]
impl KvCursor for InMemoryCursor {
    async fn has_next(&mut self) -> anyhow::Result<bool> {
        Ok(self.pos < self.rows.len())
    }

    fn next(&mut self) -> KvRow {
        let row = self.rows[self.pos].clone();
        self.pos += 1;
        row
    }

    fn continuation(&self) -> Vec<u8> {
        self.rows
            .get(self.pos.saturating_sub(1))
            .map(|r| r.key.clone())
            .unwrap_or_default()
    }
}
