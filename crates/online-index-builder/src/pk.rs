//! Primary keys as the ordered sum type recommended by `spec.md` §9:
//! `NegInf | Key(bytes) | PosInf`, translated to/from the on-disk `0x00` /
//! `0xff` sentinels only at the Built-Range Set boundary (`range_set.rs`).

use std::cmp::Ordering;

use bytes::Bytes;

/// A totally-ordered primary key, or one of the two unbounded endpoints.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum PrimaryKey {
    /// Before every real key.
    NegInf,
    /// An actual, tuple-encoded primary key.
    Key(Bytes),
    /// After every real key.
    PosInf,
}

impl PrimaryKey {
    pub fn key(bytes: impl Into<Bytes>) -> Self {
        PrimaryKey::Key(bytes.into())
    }

    pub fn is_unbounded_low(&self) -> bool {
        matches!(self, PrimaryKey::NegInf)
    }

    pub fn is_unbounded_high(&self) -> bool {
        matches!(self, PrimaryKey::PosInf)
    }

    /// The lexicographically-smallest key strictly greater than this one and
    /// every one of its extensions — used only by the Endpoint Primer
    /// (`primer.rs`) to turn an inclusive "build through and including the
    /// first/last record" bound into the half-open form every other
    /// operation in this crate expects. `PosInf` has no successor.
    pub fn immediate_successor(&self) -> Self {
        match self {
            PrimaryKey::NegInf => PrimaryKey::Key(Bytes::new()),
            PrimaryKey::Key(bytes) => {
                let mut out = Vec::with_capacity(bytes.len() + 1);
                out.extend_from_slice(bytes);
                out.push(0x00);
                PrimaryKey::Key(Bytes::from(out))
            },
            PrimaryKey::PosInf => PrimaryKey::PosInf,
        }
    }

    /// Bit-exact persistent encoding per `spec.md` §6: the single byte
    /// `0x00` for `-inf`, the single byte `0xff` for `+inf`, and a `0x01`
    /// type tag followed by the raw key bytes otherwise (a stand-in for a
    /// real KV client's tuple layer, whose job is only to guarantee that no
    /// real encoded key collides with either sentinel and that encoded
    /// byte-order matches key-order).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            PrimaryKey::NegInf => vec![0x00],
            PrimaryKey::PosInf => vec![0xff],
            PrimaryKey::Key(bytes) => {
                let mut out = Vec::with_capacity(bytes.len() + 1);
                out.push(0x01);
                out.extend_from_slice(bytes);
                out
            },
        }
    }

    pub fn decode(raw: &[u8]) -> Self {
        match raw {
            [0x00] => PrimaryKey::NegInf,
            [0xff] => PrimaryKey::PosInf,
            [0x01, rest @ ..] => PrimaryKey::Key(Bytes::copy_from_slice(rest)),
            other => PrimaryKey::Key(Bytes::copy_from_slice(other)),
        }
    }
}

impl Ord for PrimaryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        use PrimaryKey::*;
        match (self, other) {
            (NegInf, NegInf) | (PosInf, PosInf) => Ordering::Equal,
            (NegInf, _) => Ordering::Less,
            (_, NegInf) => Ordering::Greater,
            (PosInf, _) => Ordering::Greater,
            (_, PosInf) => Ordering::Less,
            (Key(a), Key(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for PrimaryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A half-open `[begin, end)` primary-key interval. `end == PosInf` means
/// "unbounded above"; `begin == NegInf` means "unbounded below".
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Interval {
    pub begin: PrimaryKey,
    pub end: PrimaryKey,
}

impl Interval {
    pub fn new(begin: PrimaryKey, end: PrimaryKey) -> Self {
        Self { begin, end }
    }

    pub fn unbounded() -> Self {
        Self::new(PrimaryKey::NegInf, PrimaryKey::PosInf)
    }

    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }

    /// The intersection of this interval with `other`, or `None` if they
    /// don't overlap.
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let begin = std::cmp::max(self.begin.clone(), other.begin.clone());
        let end = std::cmp::min(self.end.clone(), other.end.clone());
        if begin < end {
            Some(Interval::new(begin, end))
        } else {
            None
        }
    }
}
