//! Component C: `build_unbuilt`, composing the Chunk Builder with a
//! Built-Range Set insert inside one transaction, so a record is either
//! both indexed and recorded as built, or neither.

use std::collections::BTreeSet;

use errors::ErrorMetadata;

use crate::{
    chunk_builder::build_chunk,
    kv::KvTransaction,
    pk::{Interval, PrimaryKey},
    range_set::RangeSet,
    record_store::{IndexId, RecordStore, RecordType},
};

/// `spec.md` §4.C. Returns the PK actually reached (`real_end`), which may
/// equal `end` (the whole interval was consumed) or fall short of it (the
/// row limit was hit first).
///
/// Fails with an [`ErrorMetadata::range_already_built`]-tagged error if the
/// Range Set insert turns out to be a no-op — meaning some other actor (or
/// an earlier, ambiguously-committed attempt of this same caller) already
/// covered the interval. This is the mechanism `spec.md` §7 relies on to
/// detect duplicated work after a `commit_unknown_result`.
pub async fn build_unbuilt(
    store: &dyn RecordStore,
    tx: &mut dyn KvTransaction,
    index: IndexId,
    begin: &PrimaryKey,
    end: &PrimaryKey,
    records_range: &Interval,
    record_types: Option<&BTreeSet<RecordType>>,
    limit: u32,
) -> anyhow::Result<PrimaryKey> {
    let outcome = build_chunk(
        store,
        tx,
        index,
        &Interval::new(begin.clone(), end.clone()),
        records_range,
        record_types,
        true,
        limit,
    )
    .await?;
    let real_end = outcome.real_end(end);

    let subspace = store.index_range_subspace(index);
    let range_set = RangeSet::new(&subspace);
    let changed = range_set.insert(tx, begin, &real_end).await?;
    if !changed {
        return Err(anyhow::anyhow!(ErrorMetadata::range_already_built(begin, end)));
    }
    Ok(real_end)
}
