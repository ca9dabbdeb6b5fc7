//! Component A: the Built-Range Set (`spec.md` §3, §4.A). A persistent set
//! of disjoint, maximally-merged PK intervals, stored as KV pairs
//! `begin_bytes -> end_bytes` under the index's subspace, manipulated
//! transactionally so concurrent builders see linearizable updates.
//!
//! Key insight this implementation leans on: because the set is *always*
//! kept merged and disjoint (the class invariant), a query interval
//! `[begin, end)` is either fully covered by exactly one stored entry, or it
//! is not fully covered at all — two disjoint, non-adjacent entries can
//! never jointly cover a contiguous range without a gap between them. That
//! turns `insert`'s "did this change anything" check into a single
//! predecessor lookup rather than a full coverage scan.

use crate::{
    kv::KvTransaction,
    pk::{Interval, PrimaryKey},
};

/// One stored entry: `[begin, end)` already built.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BrsEntry {
    begin: PrimaryKey,
    end: PrimaryKey,
}

/// Appends a zero byte, producing the lexicographically-smallest key that is
/// still strictly greater than `key` and every one of its extensions — the
/// standard trick for turning an inclusive bound into the exclusive end of a
/// KV range scan.
fn key_after(key: &[u8]) -> Vec<u8> {
    let mut out = key.to_vec();
    out.push(0x00);
    out
}

fn entry_key(subspace: &[u8], begin: &PrimaryKey) -> Vec<u8> {
    let mut out = subspace.to_vec();
    out.extend_from_slice(&begin.encode());
    out
}

pub struct RangeSet<'s> {
    subspace: &'s [u8],
}

impl<'s> RangeSet<'s> {
    pub fn new(subspace: &'s [u8]) -> Self {
        Self { subspace }
    }

    /// The entry (if any) whose `begin` is the largest key `<= at`.
    async fn floor_entry(
        &self,
        tx: &mut dyn KvTransaction,
        at: &PrimaryKey,
    ) -> anyhow::Result<Option<BrsEntry>> {
        let scan_end = key_after(&entry_key(self.subspace, at));
        let mut cursor = tx.scan(self.subspace, &scan_end, true, Some(1));
        if !cursor.has_next().await? {
            return Ok(None);
        }
        let row = cursor.next();
        Ok(Some(self.decode_row(&row.key, &row.value)))
    }

    /// All stored entries with `begin` in `[start, through]` (inclusive of
    /// both ends), in ascending order.
    async fn entries_in(
        &self,
        tx: &mut dyn KvTransaction,
        start: &PrimaryKey,
        through: &PrimaryKey,
    ) -> anyhow::Result<Vec<BrsEntry>> {
        let scan_begin = entry_key(self.subspace, start);
        let scan_end = key_after(&entry_key(self.subspace, through));
        let mut cursor = tx.scan(&scan_begin, &scan_end, false, None);
        let mut out = Vec::new();
        while cursor.has_next().await? {
            let row = cursor.next();
            out.push(self.decode_row(&row.key, &row.value));
        }
        Ok(out)
    }

    fn decode_row(&self, key: &[u8], value: &[u8]) -> BrsEntry {
        let begin = PrimaryKey::decode(&key[self.subspace.len()..]);
        let end = PrimaryKey::decode(value);
        BrsEntry { begin, end }
    }

    /// `spec.md` §4.A: the complement of the BRS within `[begin, end)`, as
    /// disjoint intervals in ascending order.
    pub async fn missing(
        &self,
        tx: &mut dyn KvTransaction,
        begin: &PrimaryKey,
        end: &PrimaryKey,
    ) -> anyhow::Result<Vec<Interval>> {
        if begin >= end {
            return Ok(vec![]);
        }
        let predecessor = self.floor_entry(tx, begin).await?;
        let scan_start = predecessor
            .as_ref()
            .map(|p| p.begin.clone())
            .unwrap_or_else(|| begin.clone());
        // Entries with begin < end overlap our window; entries with begin
        // == end only touch it and carry no information about coverage
        // inside [begin, end), so the inclusive scan bound is `end` itself
        // only to simplify iteration (it's dropped below if begin == end).
        let entries = self.entries_in(tx, &scan_start, end).await?;

        let mut gaps = Vec::new();
        let mut frontier = begin.clone();
        for e in &entries {
            if e.end <= frontier {
                continue;
            }
            if e.begin > frontier {
                gaps.push(Interval::new(frontier.clone(), e.begin.clone().min(end.clone())));
            }
            if e.end > frontier {
                frontier = e.end.clone();
            }
            if frontier >= *end {
                break;
            }
        }
        if frontier < *end {
            gaps.push(Interval::new(frontier, end.clone()));
        }
        Ok(gaps)
    }

    /// `spec.md` §4.A: inserts `[begin, end)`, merging with any
    /// adjacent/overlapping entries, and returns whether the interval was
    /// not already fully covered.
    pub async fn insert(
        &self,
        tx: &mut dyn KvTransaction,
        begin: &PrimaryKey,
        end: &PrimaryKey,
    ) -> anyhow::Result<bool> {
        if begin >= end {
            return Ok(false);
        }
        let predecessor = self.floor_entry(tx, begin).await?;
        if let Some(ref p) = predecessor {
            if p.begin <= *begin && p.end >= *end {
                // Already fully covered by a single entry: a no-op by the
                // merge invariant (see module docs).
                return Ok(false);
            }
        }
        let scan_start = predecessor
            .as_ref()
            .map(|p| p.begin.clone())
            .unwrap_or_else(|| begin.clone());
        let entries = self.entries_in(tx, &scan_start, end).await?;

        let mut merged_begin = begin.clone();
        let mut merged_end = end.clone();
        for e in &entries {
            if e.end < *begin || e.begin > *end {
                continue;
            }
            if e.begin < merged_begin {
                merged_begin = e.begin.clone();
            }
            if e.end > merged_end {
                merged_end = e.end.clone();
            }
            tx.clear_range(&entry_key(self.subspace, &e.begin), &key_after(&entry_key(self.subspace, &e.begin)));
        }
        tx.set(&entry_key(self.subspace, &merged_begin), &merged_end.encode());
        Ok(true)
    }

    /// `spec.md` §4.A: removes all entries. Used only by the
    /// single-transaction Rebuild (component G).
    pub fn clear(&self, tx: &mut dyn KvTransaction) {
        // The largest key any BRS entry under this subspace could ever have
        // is `subspace ++ PosInf.encode()` (the single byte 0xff); one more
        // `key_after` past that is a safe exclusive upper bound for clearing
        // the whole subspace.
        let max_entry_key = entry_key(self.subspace, &PrimaryKey::PosInf);
        tx.clear_range(self.subspace, &key_after(&max_entry_key));
    }
}
