//! A probe that recognizes nothing. Useful as a placeholder and in tests that
//! only exercise the walk itself.

use std::path::Path;
use std::time::Duration;

use crate::{CoarseCategory, MediaProbe, ProbeError};

pub struct NoopProbe;

#[async_trait::async_trait]
impl MediaProbe for NoopProbe {
    async fn probe_type(&self, _path: &Path) -> Result<Option<CoarseCategory>, ProbeError> {
        Ok(None)
    }

    async fn probe_streams(
        &self,
        _path: &Path,
        _deadline: Duration,
    ) -> Result<Vec<String>, ProbeError> {
        Ok(Vec::new())
    }
}
