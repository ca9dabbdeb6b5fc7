//! Builder configuration: the enumerated option table from `spec.md` §6,
//! validated once at construction as recommended in §9's Design Notes.

use std::{collections::BTreeSet, time::Duration};

use errors::ErrorMetadata;

use crate::{pk::Interval, record_store::RecordType};

/// Caps throughput of the Build Driver (`spec.md` §4.F step 4c). `Unlimited`
/// disables the rate-limit sleep entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimit {
    Unlimited,
    PerSecond(u32),
}

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Initial rows per chunk; shrunk adaptively by the Retry Controller.
    pub limit: u32,
    /// Rate cap on records/second; `Unlimited` disables the sleep.
    pub records_per_second: RateLimit,
    /// Per-run retry cap in the Retry Controller.
    pub max_retries: u32,
    /// Subset of record types to index; `None` means infer from the index
    /// (the caller is expected to have already resolved this before
    /// constructing a `BuilderConfig`, since schema resolution is out of
    /// scope per `spec.md` §1).
    pub record_types: Option<BTreeSet<RecordType>>,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// The half-open PK interval covering every record that could belong to
    /// the Record Type Set (`spec.md` §3). Computing this from RTS type
    /// prefixes requires schema resolution, which is out of scope (`spec.md`
    /// §1), so the caller supplies it already resolved; `Interval::unbounded`
    /// is always a safe, if less efficient, choice.
    pub records_range: Interval,
}

impl BuilderConfig {
    pub fn new(record_types: Option<BTreeSet<RecordType>>, records_range: Interval) -> Self {
        Self {
            limit: 100,
            records_per_second: RateLimit::PerSecond(10_000),
            max_retries: 100,
            record_types,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(30),
            records_range,
        }
    }

    /// Validates the configuration, per `spec.md` §9: `limit > 0`,
    /// `max_retries > 0`, `records_per_second > 0`.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.limit == 0 {
            return Err(anyhow::anyhow!(ErrorMetadata::configuration(
                "InvalidLimit",
                "limit must be greater than zero",
            )));
        }
        if self.max_retries == 0 {
            return Err(anyhow::anyhow!(ErrorMetadata::configuration(
                "InvalidMaxRetries",
                "max_retries must be greater than zero",
            )));
        }
        if let RateLimit::PerSecond(0) = self.records_per_second {
            return Err(anyhow::anyhow!(ErrorMetadata::configuration(
                "InvalidRecordsPerSecond",
                "records_per_second must be greater than zero, or Unlimited",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        BuilderConfig::new(None, Interval::unbounded()).validate().unwrap();
    }

    #[test]
    fn zero_limit_rejected() {
        let mut cfg = BuilderConfig::new(None, Interval::unbounded());
        cfg.limit = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_records_per_second_rejected() {
        let mut cfg = BuilderConfig::new(None, Interval::unbounded());
        cfg.records_per_second = RateLimit::PerSecond(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unlimited_rate_is_valid() {
        let mut cfg = BuilderConfig::new(None, Interval::unbounded());
        cfg.records_per_second = RateLimit::Unlimited;
        cfg.validate().unwrap();
    }
}
