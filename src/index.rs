//! Index document assembly and persistence

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::ScanError;
use crate::metadata::now_iso;
use crate::models::{FileRecord, IndexDocument, IndexMetadata, KindStats};

/// Wrap the records with per-kind counts and a generation timestamp
pub fn assemble(source_volume: &str, files: Vec<FileRecord>) -> IndexDocument {
    let mut stats = KindStats::default();
    for file in &files {
        stats.record(file.kind);
    }

    IndexDocument {
        metadata: IndexMetadata {
            generated_at: now_iso(),
            source_volume: source_volume.to_string(),
            total_files: files.len() as u64,
            stats,
        },
        files,
    }
}

/// Serialize the whole document, then move it into place in one rename.
///
/// Readers of `path` see either the previous index or the new one, never a
/// partial write.
pub fn write_index(document: &IndexDocument, path: &Path) -> Result<(), ScanError> {
    let json = serde_json::to_string_pretty(document)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| ScanError::from(e).with_path(dir.to_path_buf()))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ScanError::from(e).with_path(dir.to_path_buf()))?;
    let write = |tmp: &mut NamedTempFile| -> std::io::Result<()> {
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()
    };
    write(&mut tmp).map_err(|e| ScanError::from(e).with_path(path.to_path_buf()))?;
    tmp.persist(path)
        .map_err(|e| ScanError::from(e.error).with_path(path.to_path_buf()))?;
    Ok(())
}

/// Read an index document back
pub fn read_index(path: &Path) -> Result<IndexDocument, ScanError> {
    let text = std::fs::read_to_string(path).map_err(|e| ScanError::from(e).with_path(path.to_path_buf()))?;
    Ok(serde_json::from_str(&text)?)
}
