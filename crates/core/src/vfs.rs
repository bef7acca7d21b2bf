//! The surface a filesystem binding calls: attribute lookup, directory
//! listing, symlink resolution. A stateless composition of the resolver and
//! the index; it owns no knowledge of any particular kernel protocol.

use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::error::FacetError;
use crate::index::TagIndex;
use crate::resolver::{self, ResolvedPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Directory,
    Symlink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

pub struct VfsAdapter {
    index: TagIndex,
    /// Whether the root's `files` pseudo-directory (every indexed file, no
    /// facet chosen) is browsable. Facet-level `files` listings are always on.
    list_all_at_root: bool,
}

impl VfsAdapter {
    pub fn new(index: TagIndex) -> Self {
        Self {
            index,
            list_all_at_root: true,
        }
    }

    pub fn with_root_listing(mut self, enabled: bool) -> Self {
        self.list_all_at_root = enabled;
        self
    }

    fn empty_selection_gated(&self, resolved: &ResolvedPath) -> bool {
        resolved.inside_files() && resolved.selected().is_empty() && !self.list_all_at_root
    }

    /// Attribute query: what kind of entry is this path, if any?
    pub async fn getattr(&self, path: &str) -> Result<EntryKind, FacetError> {
        let resolved = resolver::parse(path).ok_or(FacetError::NotFound)?;
        if self.empty_selection_gated(&resolved) {
            return Err(FacetError::NotFound);
        }
        match resolved {
            ResolvedPath::Root | ResolvedPath::FilesDir { .. } => Ok(EntryKind::Directory),
            ResolvedPath::TagDir { selected } => {
                let last = selected.last().ok_or(FacetError::NotFound)?;
                match self.index.tag_by_name(last).await? {
                    Some(_) => Ok(EntryKind::Directory),
                    None => Err(FacetError::NotFound),
                }
            }
            ResolvedPath::FileLeaf { file_id, .. } => {
                match self.index.file_by_id(file_id).await? {
                    Some(_) => Ok(EntryKind::Symlink),
                    None => Err(FacetError::NotFound),
                }
            }
        }
    }

    /// Directory listing. Outside `files`: the `files` entry (present only
    /// when the current selection matches at least one file) plus every
    /// still-discriminating tag. Inside `files`: the matching file ids.
    pub async fn readdir(&self, path: &str) -> Result<Vec<DirEntry>, FacetError> {
        let resolved = resolver::parse(path).ok_or(FacetError::NotFound)?;
        if self.empty_selection_gated(&resolved) {
            return Err(FacetError::NotFound);
        }
        let selected = resolved.selected().to_vec();
        match resolved {
            ResolvedPath::Root | ResolvedPath::TagDir { .. } => {
                if let Some(last) = selected.last() {
                    if self.index.tag_by_name(last).await?.is_none() {
                        return Err(FacetError::NotFound);
                    }
                }
                let mut entries = Vec::new();
                let show_files = !(selected.is_empty() && !self.list_all_at_root);
                if show_files && self.index.count_files_matching(&selected).await? > 0 {
                    entries.push(DirEntry {
                        name: resolver::FILES_TOKEN.to_string(),
                        kind: EntryKind::Directory,
                    });
                }
                for tag in self.index.tags_excluding(&selected).await? {
                    entries.push(DirEntry {
                        name: tag.name,
                        kind: EntryKind::Directory,
                    });
                }
                debug!(path, entries = entries.len(), "listed facet directory");
                Ok(entries)
            }
            ResolvedPath::FilesDir { .. } => {
                let files = self.index.files_matching(&selected, 0, -1).await?;
                Ok(files
                    .into_iter()
                    .map(|f| DirEntry {
                        name: resolver::format_file_id(f.id),
                        kind: EntryKind::Symlink,
                    })
                    .collect())
            }
            ResolvedPath::FileLeaf { .. } => Err(FacetError::NotFound),
        }
    }

    /// Symlink target for a file-id leaf: the stored real path.
    pub async fn readlink(&self, path: &str) -> Result<PathBuf, FacetError> {
        match resolver::parse(path) {
            Some(ResolvedPath::FileLeaf { file_id, .. }) => {
                let file = self
                    .index
                    .file_by_id(file_id)
                    .await?
                    .ok_or(FacetError::NotFound)?;
                Ok(PathBuf::from(file.path))
            }
            _ => Err(FacetError::NotFound),
        }
    }

    /// The virtual tree is read-only; renames are rejected unconditionally.
    pub fn rename(&self, _from: &str, _to: &str) -> Result<(), FacetError> {
        Err(FacetError::ReadOnly)
    }
}
