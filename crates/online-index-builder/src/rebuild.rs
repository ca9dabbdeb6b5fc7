//! Component G: the single-transaction Rebuild path for stores small enough
//! that the whole index fits in one commit. No retry, no rate limit — if
//! the transaction grows too large the underlying KV store rejects the
//! commit and the caller must fall back to the online path (`driver.rs`).

use crate::{
    chunk_builder::{build_chunk, ChunkOutcome},
    kv::KvTransaction,
    pk::{Interval, PrimaryKey},
    range_set::RangeSet,
    record_store::{IndexId, RecordStore, RecordType},
};

/// `spec.md` §4.G. Clears all existing index data and the Built-Range Set,
/// re-inserts the universe as built, then walks `RecordsRange` chunk by
/// chunk (chaining `real_end` into the next chunk's low bound) until the
/// whole range is consumed — all within the caller's single transaction.
pub async fn rebuild(
    store: &dyn RecordStore,
    tx: &mut dyn KvTransaction,
    index: IndexId,
    record_types: Option<&std::collections::BTreeSet<RecordType>>,
    records_range: &Interval,
    limit: u32,
) -> anyhow::Result<()> {
    store.clear_index_data(tx, index);

    let subspace = store.index_range_subspace(index);
    let range_set = RangeSet::new(&subspace);
    range_set.clear(tx);
    range_set.insert(tx, &PrimaryKey::NegInf, &PrimaryKey::PosInf).await?;

    let mut low = records_range.begin.clone();
    loop {
        let remaining = Interval::new(low.clone(), records_range.end.clone());
        if remaining.is_empty() {
            break;
        }
        let outcome = build_chunk(store, tx, index, &remaining, records_range, record_types, true, limit).await?;
        match outcome {
            ChunkOutcome::Complete | ChunkOutcome::Empty => break,
            ChunkOutcome::Partial(next_low) => low = next_low,
        }
    }

    Ok(())
}
