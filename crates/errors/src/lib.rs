//! A small `ErrorMetadata`/`ErrorCode` taxonomy attached to `anyhow` error
//! chains, so callers can classify a failure without string-matching its
//! message. Errors that don't carry an `ErrorMetadata` are treated as opaque
//! store errors and are never retried by [`ErrorMetadataAnyhowExt`].

use std::borrow::Cow;

/// One of the capacity-exhaustion conditions a transactional KV store can
/// raise. The remedy for all of these is "do less work per transaction".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapacityCode {
    TransactionTooLarge,
    TransactionTooOld,
    CommitConflict,
    ProcessBehind,
    NotCommitted,
    CommitUnknownResult,
}

impl CapacityCode {
    /// Maps a raw KV store error code onto a [`CapacityCode`], if it is one
    /// of the codes the Retry Controller knows how to shrink and retry past.
    pub fn from_raw_code(code: i64) -> Option<Self> {
        Some(match code {
            1004 => CapacityCode::TransactionTooLarge,
            1007 => CapacityCode::TransactionTooOld,
            1020 => CapacityCode::CommitConflict,
            1031 => CapacityCode::ProcessBehind,
            2002 => CapacityCode::NotCommitted,
            2101 => CapacityCode::CommitUnknownResult,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// One of the [`CapacityCode`] conditions: retry with a smaller chunk.
    Capacity(CapacityCode),
    /// The interval was already fully covered by the Built-Range Set.
    RangeAlreadyBuilt,
    /// Bad configuration or metadata mismatch: never retried.
    Configuration,
    /// Opaque error from the underlying KV store or index maintainer.
    Store,
}

/// Attached to an `anyhow` error chain via `.context(e /* ErrorMetadata */)`
/// so the Retry Controller can classify a failure by walking the chain with
/// [`ErrorMetadataAnyhowExt`] instead of matching on display strings.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{msg}")]
pub struct ErrorMetadata {
    pub code: ErrorCode,
    /// Short, stable tag usable in tests and metrics (e.g. `RangeAlreadyBuilt`).
    pub short_msg: Cow<'static, str>,
    /// Human readable, developer-facing description.
    pub msg: Cow<'static, str>,
}

impl ErrorMetadata {
    pub fn capacity(
        capacity: CapacityCode,
        short_msg: impl Into<Cow<'static, str>>,
        msg: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code: ErrorCode::Capacity(capacity),
            short_msg: short_msg.into(),
            msg: msg.into(),
        }
    }

    pub fn range_already_built(begin: impl std::fmt::Debug, end: impl std::fmt::Debug) -> Self {
        Self {
            code: ErrorCode::RangeAlreadyBuilt,
            short_msg: "RangeAlreadyBuilt".into(),
            msg: format!("range [{begin:?}, {end:?}) was already built by another actor").into(),
        }
    }

    pub fn configuration(
        short_msg: impl Into<Cow<'static, str>>,
        msg: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            code: ErrorCode::Configuration,
            short_msg: short_msg.into(),
            msg: msg.into(),
        }
    }

    pub fn store(msg: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: ErrorCode::Store,
            short_msg: "StoreError".into(),
            msg: msg.into(),
        }
    }

    pub fn capacity_code(&self) -> Option<CapacityCode> {
        match self.code {
            ErrorCode::Capacity(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_range_already_built(&self) -> bool {
        matches!(self.code, ErrorCode::RangeAlreadyBuilt)
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self.code, ErrorCode::Configuration)
    }
}

/// Walks an `anyhow` error's causal chain looking for an attached
/// [`ErrorMetadata`], the way the Retry Controller (`spec.md` §4.D) and
/// Driver (§4.F) classify failures. An error with no `ErrorMetadata`
/// anywhere in its chain is an opaque store error: never retried here.
pub trait ErrorMetadataAnyhowExt {
    fn error_metadata(&self) -> Option<&ErrorMetadata>;
    fn capacity_code(&self) -> Option<CapacityCode>;
    fn is_range_already_built(&self) -> bool;
    fn is_configuration(&self) -> bool;
}

impl ErrorMetadataAnyhowExt for anyhow::Error {
    fn error_metadata(&self) -> Option<&ErrorMetadata> {
        self.chain().find_map(|cause| cause.downcast_ref::<ErrorMetadata>())
    }

    fn capacity_code(&self) -> Option<CapacityCode> {
        self.error_metadata().and_then(ErrorMetadata::capacity_code)
    }

    fn is_range_already_built(&self) -> bool {
        self.error_metadata()
            .is_some_and(ErrorMetadata::is_range_already_built)
    }

    fn is_configuration(&self) -> bool {
        self.error_metadata().is_some_and(ErrorMetadata::is_configuration)
    }
}
