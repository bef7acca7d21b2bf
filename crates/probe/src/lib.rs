//! Media probe abstractions: the contract the scanner uses to decide whether a
//! file is recognizable media and which elementary stream types it carries.
//!
//! The real heavy lifting (demuxing, codec detection) belongs to whatever
//! implementation sits behind [`MediaProbe`]; the built-in [`SignatureProbe`]
//! recognizes containers from magic bytes, which is enough to drive the index
//! without an external media framework.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

pub mod noop;
pub mod signature;

pub use noop::NoopProbe;
pub use signature::SignatureProbe;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("probe failed: {0}")]
    Failed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse category reported by the quick type check. Only files falling into
/// one of these families are worth a deep probe; everything else is skipped
/// without touching the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoarseCategory {
    Audio,
    Video,
    OggContainer,
    Id3Tagged,
}

#[async_trait::async_trait]
pub trait MediaProbe: Send + Sync {
    /// Quick check: is this file recognizable media at all?
    /// Returns `None` for anything that is not, within a short bounded time.
    async fn probe_type(&self, path: &Path) -> Result<Option<CoarseCategory>, ProbeError>;

    /// Deep check: the set of elementary stream type names for the file.
    ///
    /// Raw (uncompressed) streams are not meaningful discriminators;
    /// implementations must report the encoded/container type one level up
    /// instead of descending into them. Must complete within `deadline` or
    /// fail with [`ProbeError::Timeout`].
    async fn probe_streams(
        &self,
        path: &Path,
        deadline: Duration,
    ) -> Result<Vec<String>, ProbeError>;
}
