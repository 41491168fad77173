//! File record assembly and stable record ids

use md5::{Digest, Md5};
use std::path::{Component, Path};

use crate::models::{ExternalLink, FileRecord, MediaKind, Metadata, Previews};

/// Hex characters kept from the path digest
pub const RECORD_ID_LEN: usize = 16;

/// Root-relative path joined with `/` regardless of platform
pub fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Stable id of a file: truncated MD5 of its root-relative path.
///
/// Identical paths give identical ids across runs; file contents do not
/// take part.
pub fn record_id(relative_path: &Path) -> String {
    let digest = Md5::digest(slash_path(relative_path).as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(RECORD_ID_LEN);
    hex
}

/// Compose one record from the outputs of the pipeline stages
pub fn build(relative_path: &Path, kind: MediaKind, metadata: Metadata, previews: Previews) -> FileRecord {
    let file_name = relative_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    FileRecord {
        id: record_id(relative_path),
        kind,
        relative_path: slash_path(relative_path),
        file_name,
        metadata,
        previews,
        external_link: ExternalLink::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Resolution;
    use proptest::prelude::*;
    use std::path::PathBuf;

    #[test]
    fn test_record_id_shape() {
        let id = record_id(Path::new("a/b.jpg"));
        assert_eq!(id.len(), RECORD_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_record_id_known_value() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(record_id(Path::new("")), "d41d8cd98f00b204");
    }

    #[test]
    fn test_record_id_depends_on_path_only() {
        assert_eq!(record_id(Path::new("x/y.png")), record_id(Path::new("x/y.png")));
        assert_ne!(record_id(Path::new("x/y.png")), record_id(Path::new("x/z.png")));
        assert_eq!(record_id(Path::new("./x/y.png")), record_id(Path::new("x/y.png")));
    }

    #[test]
    fn test_build() {
        let metadata = Metadata {
            creation_date: "2024-01-01T00:00:00Z".to_string(),
            file_size: 2048,
            resolution: Some(Resolution::new(4, 3)),
            duration: None,
            format: "jpeg".to_string(),
        };
        let relative: PathBuf = ["holiday", "beach.jpg"].iter().collect();
        let record = build(&relative, MediaKind::Image, metadata.clone(), Previews::default());

        assert_eq!(record.id, record_id(Path::new("holiday/beach.jpg")));
        assert_eq!(record.relative_path, "holiday/beach.jpg");
        assert_eq!(record.file_name, "beach.jpg");
        assert_eq!(record.metadata, metadata);
        assert_eq!(record.external_link, ExternalLink::default());
    }

    proptest! {
        #[test]
        fn id_ignores_the_scan_root(
            root_a in proptest::collection::vec("[a-z]{1,6}", 1..4),
            root_b in proptest::collection::vec("[a-z]{1,6}", 1..4),
            rel in proptest::collection::vec("[a-zA-Z0-9]{1,6}", 1..4),
        ) {
            let relative: PathBuf = rel.iter().collect();
            let a: PathBuf = root_a.iter().collect::<PathBuf>().join(&relative);
            let b: PathBuf = root_b.iter().collect::<PathBuf>().join(&relative);
            let from_a = record_id(a.strip_prefix(root_a.iter().collect::<PathBuf>()).unwrap());
            let from_b = record_id(b.strip_prefix(root_b.iter().collect::<PathBuf>()).unwrap());
            prop_assert_eq!(from_a, from_b);
        }
    }
}
