//! An online secondary-index builder: walks a record store's primary key
//! space in small, rate-limited, independently-committed transactions and
//! incrementally brings one or more indexes up to date, without blocking
//! concurrent readers or writers and without requiring an outage window.
//!
//! The crate is organized the way the Build Driver itself is: a persistent
//! ledger of already-built key ranges (`range_set`), a single
//! transaction's worth of indexing work (`chunk_builder`), the loop that
//! repeatedly asks "what's still missing" and builds it (`unbuilt_range`),
//! a wrapper that retries that loop under contention with an adaptive limit
//! (`retry`), a pass that seeds both ends of the key space before the main
//! build to de-contend hot endpoints (`primer`), the top-level entry points
//! (`driver`), and the degenerate single-transaction path for stores too
//! small to need any of the above (`rebuild`).

pub mod chunk_builder;
pub mod config;
pub mod driver;
pub mod kv;
pub mod metrics;
pub mod pk;
pub mod primer;
pub mod range_set;
pub mod rebuild;
pub mod record_store;
pub mod retry;
pub mod unbuilt_range;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{BuilderConfig, RateLimit};
pub use driver::{build_index, BuildSummary};
pub use record_store::{IndexId, IndexState, Record, RecordStore, RecordType};
