//! One-shot recursive indexing of a source directory tree.
//!
//! A blocking walker task feeds file paths over a channel; the async side does
//! the probing and the index writes. Dropping the scan future closes the
//! receiver and stops the walk between files, which at worst leaves a tagless
//! file row behind; that state matches only the empty selection and is
//! re-detected on the next run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use probe::MediaProbe;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::FacetError;
use crate::index::TagIndex;

#[derive(Debug, Clone)]
struct ScannedFile {
    path: PathBuf,
    mtime: i64,
}

/// What happened to one file during the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Classified and written to the index.
    Indexed,
    /// Recorded mtime is not older than the on-disk one; nothing to do.
    Fresh,
    /// The quick probe did not recognize it as media.
    NotMedia,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ScanSummary {
    pub seen: u64,
    pub indexed: u64,
    pub fresh: u64,
    pub not_media: u64,
    pub failed: u64,
}

/// Walks `root` once, classifying every new or changed regular file and
/// upserting the results. Directories are recursed into unconditionally. A
/// failure on one file never aborts the walk.
pub async fn scan(
    root: &Path,
    index: &TagIndex,
    probe: &dyn MediaProbe,
    deadline: Duration,
) -> anyhow::Result<ScanSummary> {
    let (tx, mut rx) = mpsc::channel(100);
    let root = root.to_path_buf();

    let walker_handle = task::spawn_blocking(move || {
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("walk error: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(_) => continue,
            };
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or_default();

            let item = ScannedFile {
                path: entry.into_path(),
                mtime,
            };
            if tx.blocking_send(item).is_err() {
                // Receiver dropped, stop walking.
                break;
            }
        }
    });

    let mut summary = ScanSummary::default();
    while let Some(item) = rx.recv().await {
        summary.seen += 1;
        match process_file(index, probe, &item.path, item.mtime, deadline).await {
            Ok(FileOutcome::Indexed) => summary.indexed += 1,
            Ok(FileOutcome::Fresh) => summary.fresh += 1,
            Ok(FileOutcome::NotMedia) => summary.not_media += 1,
            Err(e) => {
                warn!(path = %item.path.display(), "classification skipped: {e}");
                summary.failed += 1;
            }
        }
    }

    walker_handle.await?;
    info!(
        seen = summary.seen,
        indexed = summary.indexed,
        fresh = summary.fresh,
        "scan complete"
    );
    Ok(summary)
}

/// Classifies a single path and upserts the result. Idempotent: safe to call
/// again on an unchanged file (it becomes a no-op), so a future
/// change-notification hook can reuse it without a full rescan.
pub async fn process_file(
    index: &TagIndex,
    probe: &dyn MediaProbe,
    path: &Path,
    mtime: i64,
    deadline: Duration,
) -> Result<FileOutcome, FacetError> {
    let path_str = path.to_string_lossy();

    // One-way freshness check: only a strictly newer on-disk mtime triggers
    // reclassification.
    let prior = index.file_mtime(&path_str).await?;
    if let Some(seen) = prior {
        if seen >= mtime {
            return Ok(FileOutcome::Fresh);
        }
    }

    let Some(category) = probe.probe_type(path).await? else {
        return Ok(FileOutcome::NotMedia);
    };
    debug!(path = %path.display(), ?category, "media recognized");

    let file_id = index.record_file(&path_str, mtime).await?;
    if prior.is_some() {
        // The file changed; edges from the previous classification may no
        // longer hold.
        index.unlink_all(file_id).await?;
    }

    let names = probe.probe_streams(path, deadline).await?;
    for name in &names {
        let tag_id = index.ensure_tag(name).await?;
        index.link(file_id, tag_id).await?;
    }
    index.mark_seen(file_id, mtime).await?;
    Ok(FileOutcome::Indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe::{CoarseCategory, ProbeError};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Recognizes exactly the files it was given, counting every probe call.
    struct StubProbe {
        media: HashMap<PathBuf, Vec<String>>,
        fail_deep: bool,
        calls: AtomicUsize,
    }

    impl StubProbe {
        fn new(media: HashMap<PathBuf, Vec<String>>) -> Self {
            Self {
                media,
                fail_deep: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl MediaProbe for StubProbe {
        async fn probe_type(&self, path: &Path) -> Result<Option<CoarseCategory>, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .media
                .contains_key(path)
                .then_some(CoarseCategory::Audio))
        }

        async fn probe_streams(
            &self,
            path: &Path,
            _deadline: Duration,
        ) -> Result<Vec<String>, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_deep {
                return Err(ProbeError::Failed("decode error".into()));
            }
            Ok(self.media.get(path).cloned().unwrap_or_default())
        }
    }

    async fn test_index() -> TagIndex {
        let pool = storage::connect("sqlite::memory:").await.unwrap();
        storage::migrate(&pool).await.unwrap();
        TagIndex::new(pool)
    }

    const DEADLINE: Duration = Duration::from_secs(3);

    #[tokio::test]
    async fn scan_indexes_media_and_skips_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("albums");
        std::fs::create_dir_all(&sub).unwrap();
        let song = sub.join("song.mp3");
        std::fs::write(&song, b"fake").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not media").unwrap();

        let probe = StubProbe::new(HashMap::from([(
            song.clone(),
            vec!["audio/mpeg".to_string(), "application/x-id3".to_string()],
        )]));
        let index = test_index().await;

        let summary = scan(dir.path(), &index, &probe, DEADLINE).await.unwrap();
        assert_eq!(summary.seen, 2);
        assert_eq!(summary.indexed, 1);
        assert_eq!(summary.not_media, 1);
        assert_eq!(summary.failed, 0);

        let files = index
            .files_matching(&["audio_mpeg".to_string(), "application_x-id3".to_string()], 0, -1)
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, song.to_string_lossy());
    }

    #[tokio::test]
    async fn rescan_of_unchanged_file_does_no_work() {
        let dir = tempfile::tempdir().unwrap();
        let song = dir.path().join("song.mp3");
        std::fs::write(&song, b"fake").unwrap();

        let probe = StubProbe::new(HashMap::from([(
            song.clone(),
            vec!["audio/mpeg".to_string()],
        )]));
        let index = test_index().await;

        scan(dir.path(), &index, &probe, DEADLINE).await.unwrap();
        let calls_after_first = probe.call_count();
        assert!(calls_after_first > 0);

        let summary = scan(dir.path(), &index, &probe, DEADLINE).await.unwrap();
        assert_eq!(summary.fresh, 1);
        assert_eq!(summary.indexed, 0);
        // Zero classifier invocations on the second pass.
        assert_eq!(probe.call_count(), calls_after_first);
    }

    #[tokio::test]
    async fn changed_file_is_reclassified_and_stale_tags_cleared() {
        let index = test_index().await;
        let path = PathBuf::from("/music/track.mp3");

        let first = StubProbe::new(HashMap::from([(
            path.clone(),
            vec!["audio/mpeg".to_string(), "application/x-id3".to_string()],
        )]));
        process_file(&index, &first, &path, 10, DEADLINE)
            .await
            .unwrap();

        // Same mtime: nothing happens, even with different streams on offer.
        let unchanged = StubProbe::new(HashMap::from([(
            path.clone(),
            vec!["audio/flac".to_string()],
        )]));
        assert_eq!(
            process_file(&index, &unchanged, &path, 10, DEADLINE)
                .await
                .unwrap(),
            FileOutcome::Fresh
        );
        assert_eq!(unchanged.call_count(), 0);

        // Newer mtime: old edges go away, new ones replace them.
        let second = StubProbe::new(HashMap::from([(
            path.clone(),
            vec!["audio/flac".to_string()],
        )]));
        assert_eq!(
            process_file(&index, &second, &path, 20, DEADLINE)
                .await
                .unwrap(),
            FileOutcome::Indexed
        );

        assert!(index
            .files_matching(&["application_x-id3".to_string()], 0, -1)
            .await
            .unwrap()
            .is_empty());
        let flac = index
            .files_matching(&["audio_flac".to_string()], 0, -1)
            .await
            .unwrap();
        assert_eq!(flac.len(), 1);
        assert_eq!(flac[0].mtime, 20);
    }

    #[tokio::test]
    async fn deep_probe_failure_skips_file_but_walk_continues() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("corrupt.mp3");
        std::fs::write(&bad, b"fake").unwrap();

        let mut probe = StubProbe::new(HashMap::from([(
            bad.clone(),
            vec!["audio/mpeg".to_string()],
        )]));
        probe.fail_deep = true;

        let index = test_index().await;
        let summary = scan(dir.path(), &index, &probe, DEADLINE).await.unwrap();
        assert_eq!(summary.failed, 1);

        // The row exists but carries no tags: it matches only the empty
        // selection, which the faceted queries treat correctly.
        assert_eq!(index.count_files_matching(&[]).await.unwrap(), 1);
        assert!(index
            .files_matching(&["audio_mpeg".to_string()], 0, -1)
            .await
            .unwrap()
            .is_empty());
    }
}
