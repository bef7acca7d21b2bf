//! Magic-byte media detection built on the `infer` database of file
//! signatures. Cheap (reads a fixed-size header) but container-level only: the
//! stream names it reports are the container/codec family, never the raw
//! decoded streams underneath, which matches the contract in [`crate::MediaProbe`].

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task;
use tracing::debug;

use crate::{CoarseCategory, MediaProbe, ProbeError};

/// Enough header for every signature `infer` knows about.
const HEADER_BYTES: usize = 8192;

const ID3_MAGIC: &[u8] = b"ID3";
const OGG_MAGIC: &[u8] = b"OggS";

#[derive(Default)]
pub struct SignatureProbe;

impl SignatureProbe {
    pub fn new() -> Self {
        Self
    }
}

async fn read_header(path: &Path) -> Result<Vec<u8>, ProbeError> {
    let path: PathBuf = path.to_path_buf();
    let buf = task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
        let mut file = std::fs::File::open(&path)?;
        let mut buf = vec![0u8; HEADER_BYTES];
        let n = file.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    })
    .await
    .map_err(|e| ProbeError::Failed(e.to_string()))??;
    Ok(buf)
}

fn categorize(header: &[u8]) -> Option<CoarseCategory> {
    if header.starts_with(ID3_MAGIC) {
        return Some(CoarseCategory::Id3Tagged);
    }
    if header.starts_with(OGG_MAGIC) {
        return Some(CoarseCategory::OggContainer);
    }
    match infer::get(header).map(|t| t.matcher_type()) {
        Some(infer::MatcherType::Audio) => Some(CoarseCategory::Audio),
        Some(infer::MatcherType::Video) => Some(CoarseCategory::Video),
        _ => None,
    }
}

fn stream_names(header: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    // An Ogg page header means we are looking at the container; without
    // demuxing we cannot see the codecs inside, so the container name is the
    // whole report.
    if header.starts_with(OGG_MAGIC) {
        names.push("application/ogg".to_string());
    }
    if header.starts_with(ID3_MAGIC) {
        names.push("application/x-id3".to_string());
    }
    if let Some(t) = infer::get(header) {
        match t.matcher_type() {
            infer::MatcherType::Audio | infer::MatcherType::Video => {
                // WAV/AIFF style containers hold raw PCM; the container mime
                // is the encoded type "one level up" and is all we report.
                let mime = t.mime_type().to_string();
                if !mime.ends_with("/ogg") && !names.contains(&mime) {
                    names.push(mime);
                }
            }
            _ => {}
        }
    }
    names
}

#[async_trait::async_trait]
impl MediaProbe for SignatureProbe {
    async fn probe_type(&self, path: &Path) -> Result<Option<CoarseCategory>, ProbeError> {
        let header = read_header(path).await?;
        Ok(categorize(&header))
    }

    async fn probe_streams(
        &self,
        path: &Path,
        deadline: Duration,
    ) -> Result<Vec<String>, ProbeError> {
        let names = tokio::time::timeout(deadline, async {
            let header = read_header(path).await?;
            Ok::<_, ProbeError>(stream_names(&header))
        })
        .await
        .map_err(|_| ProbeError::Timeout(deadline))??;
        debug!(?path, ?names, "probed streams");
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_temp(bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample");
        std::fs::write(&path, bytes).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn id3_tagged_mp3_is_audio_with_id3_stream() {
        let mut bytes = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        let (_dir, path) = write_temp(&bytes);

        let probe = SignatureProbe::new();
        let cat = probe.probe_type(&path).await.unwrap();
        assert_eq!(cat, Some(CoarseCategory::Id3Tagged));

        let streams = probe
            .probe_streams(&path, Duration::from_secs(3))
            .await
            .unwrap();
        assert!(streams.contains(&"audio/mpeg".to_string()));
        assert!(streams.contains(&"application/x-id3".to_string()));
    }

    #[tokio::test]
    async fn ogg_page_header_is_an_ogg_container() {
        let mut bytes = b"OggS\x00\x02".to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        let (_dir, path) = write_temp(&bytes);

        let probe = SignatureProbe::new();
        let cat = probe.probe_type(&path).await.unwrap();
        assert_eq!(cat, Some(CoarseCategory::OggContainer));

        let streams = probe
            .probe_streams(&path, Duration::from_secs(3))
            .await
            .unwrap();
        assert!(streams.iter().any(|n| n.contains("ogg")));
    }

    #[tokio::test]
    async fn plain_text_is_not_media() {
        let (_dir, path) = write_temp(b"just some notes\n");
        let probe = SignatureProbe::new();
        assert_eq!(probe.probe_type(&path).await.unwrap(), None);
    }
}
