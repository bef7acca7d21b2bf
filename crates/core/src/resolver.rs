//! Virtual path resolution: turns a slash-delimited path into the ordered
//! selected-tag sequence plus what kind of entry the path is asking about.
//!
//! Pure and stateless; whether a tag name or file id actually exists is the
//! adapter's business, not the resolver's.

/// Reserved path segment that switches listing mode from "further facets" to
/// "matching files".
pub const FILES_TOKEN: &str = "files";

/// Width of a rendered file id (`00000007`).
pub const FILE_ID_WIDTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    /// The mount root.
    Root,
    /// A path whose last segment is a tag-name candidate; `selected` includes
    /// that segment.
    TagDir { selected: Vec<String> },
    /// A path ending in the `files` pseudo-directory.
    FilesDir { selected: Vec<String> },
    /// A numeric leaf directly under a `files` pseudo-directory.
    FileLeaf { selected: Vec<String>, file_id: i64 },
}

impl ResolvedPath {
    /// The selected-tag sequence this path implies.
    pub fn selected(&self) -> &[String] {
        match self {
            ResolvedPath::Root => &[],
            ResolvedPath::TagDir { selected }
            | ResolvedPath::FilesDir { selected }
            | ResolvedPath::FileLeaf { selected, .. } => selected,
        }
    }

    pub fn inside_files(&self) -> bool {
        matches!(
            self,
            ResolvedPath::FilesDir { .. } | ResolvedPath::FileLeaf { .. }
        )
    }
}

/// Parses a virtual path. Returns `None` for shapes that can never name an
/// entry: a non-numeric leaf under `files`, or anything nested below one.
pub fn parse(path: &str) -> Option<ResolvedPath> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Some(ResolvedPath::Root);
    }

    match segments.iter().position(|s| *s == FILES_TOKEN) {
        None => Some(ResolvedPath::TagDir {
            selected: segments.iter().map(|s| s.to_string()).collect(),
        }),
        Some(pos) => {
            let selected: Vec<String> = segments[..pos].iter().map(|s| s.to_string()).collect();
            match segments.len() - pos {
                1 => Some(ResolvedPath::FilesDir { selected }),
                2 => {
                    let file_id = parse_file_id(segments[pos + 1])?;
                    Some(ResolvedPath::FileLeaf { selected, file_id })
                }
                _ => None,
            }
        }
    }
}

/// Renders a file id the way it appears in directory listings.
pub fn format_file_id(id: i64) -> String {
    format!("{:0width$}", id, width = FILE_ID_WIDTH)
}

/// Accepts the numeric value regardless of leading zeros.
pub fn parse_file_id(segment: &str) -> Option<i64> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn root_paths() {
        assert_eq!(parse("/"), Some(ResolvedPath::Root));
        assert_eq!(parse(""), Some(ResolvedPath::Root));
        assert_eq!(parse("///"), Some(ResolvedPath::Root));
    }

    #[test]
    fn tag_paths_keep_order() {
        assert_eq!(
            parse("/a/b"),
            Some(ResolvedPath::TagDir {
                selected: sel(&["a", "b"])
            })
        );
        assert_eq!(
            parse("a/b"),
            Some(ResolvedPath::TagDir {
                selected: sel(&["a", "b"])
            })
        );
    }

    #[test]
    fn trailing_files_token() {
        let parsed = parse("/a/b/files").unwrap();
        assert_eq!(
            parsed,
            ResolvedPath::FilesDir {
                selected: sel(&["a", "b"])
            }
        );
        assert!(parsed.inside_files());
        assert_eq!(parsed.selected(), &sel(&["a", "b"])[..]);

        assert!(!parse("/a/b").unwrap().inside_files());
        assert_eq!(parse("/files"), Some(ResolvedPath::FilesDir { selected: vec![] }));
    }

    #[test]
    fn file_leaf_parses_padded_id() {
        assert_eq!(
            parse("/a/b/files/00000007"),
            Some(ResolvedPath::FileLeaf {
                selected: sel(&["a", "b"]),
                file_id: 7
            })
        );
        // Leading zeros are a display convention, not a requirement.
        assert_eq!(
            parse("/files/42"),
            Some(ResolvedPath::FileLeaf {
                selected: vec![],
                file_id: 42
            })
        );
    }

    #[test]
    fn junk_under_files_is_unresolvable() {
        assert_eq!(parse("/a/files/notanumber"), None);
        assert_eq!(parse("/a/files/00000001/deeper"), None);
        assert_eq!(parse("/a/files/-3"), None);
    }

    #[test]
    fn id_round_trip() {
        assert_eq!(format_file_id(7), "00000007");
        assert_eq!(parse_file_id("00000007"), Some(7));
        assert_eq!(parse_file_id("7"), Some(7));
        assert_eq!(parse_file_id("files"), None);
        assert_eq!(parse_file_id(""), None);
        // Ids wider than the display width still parse.
        assert_eq!(parse_file_id("123456789"), Some(123456789));
    }
}
