//! Core data models for the media index

use serde::{Deserialize, Serialize};

/// Media kind classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Image files (jpg, png, webp, etc.)
    Image,
    /// Video files (mp4, mkv, mov, etc.)
    Video,
    /// Audio files (mp3, flac, wav, etc.)
    Audio,
}

impl MediaKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pixel dimensions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Descriptive metadata of a source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// ISO-8601 creation timestamp
    pub creation_date: String,
    /// File size in bytes
    pub file_size: u64,
    /// Pixel dimensions (None for audio)
    pub resolution: Option<Resolution>,
    /// Duration in seconds (None for images)
    pub duration: Option<f64>,
    /// Container or codec format, lowercase
    pub format: String,
}

/// Preview artifacts, relative to the output directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Previews {
    /// Main thumbnail
    pub main: Option<String>,
    /// Frame captures in timeline order (video only)
    pub frames: Vec<String>,
}

impl Previews {
    /// A single preview with no frame sequence
    pub fn single(path: String) -> Self {
        Self {
            main: Some(path),
            frames: Vec::new(),
        }
    }

    /// Frame sequence whose middle surviving frame becomes the main preview
    pub fn from_frames(frames: Vec<String>) -> Self {
        let main = frames.get(frames.len() / 2).cloned();
        Self { main, frames }
    }
}

/// Slot for a future remote-storage mapping, always empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalLink {
    pub url: String,
    pub file_id: String,
}

/// One indexed source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Stable key derived from the root-relative path
    pub id: String,
    /// Media kind
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Path relative to the scan root, `/`-separated
    pub relative_path: String,
    /// File name with extension
    pub file_name: String,
    /// Descriptive metadata
    pub metadata: Metadata,
    /// Preview artifacts
    #[serde(rename = "thumbnails")]
    pub previews: Previews,
    /// Remote-storage association
    #[serde(rename = "googleDrive")]
    pub external_link: ExternalLink,
}

/// Per-kind record counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    pub images: u64,
    pub videos: u64,
    pub audio: u64,
}

impl KindStats {
    /// Count one record of the given kind
    pub fn record(&mut self, kind: MediaKind) {
        match kind {
            MediaKind::Image => self.images += 1,
            MediaKind::Video => self.videos += 1,
            MediaKind::Audio => self.audio += 1,
        }
    }
}

/// Run-level metadata of the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    /// RFC 3339 generation timestamp
    pub generated_at: String,
    /// Scanned volume as given on the command line
    pub source_volume: String,
    /// Number of records in `files`
    pub total_files: u64,
    /// Per-kind counts
    pub stats: KindStats,
}

/// The index document produced by one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub metadata: IndexMetadata,
    pub files: Vec<FileRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_serialization() {
        assert_eq!(serde_json::to_string(&MediaKind::Image).unwrap(), "\"image\"");
        assert_eq!(serde_json::to_string(&MediaKind::Video).unwrap(), "\"video\"");
        assert_eq!(serde_json::to_string(&MediaKind::Audio).unwrap(), "\"audio\"");
    }

    #[test]
    fn test_previews_from_frames_picks_middle() {
        let previews = Previews::from_frames(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(previews.main.as_deref(), Some("b"));

        let previews = Previews::from_frames(vec!["a".into(), "b".into()]);
        assert_eq!(previews.main.as_deref(), Some("b"));

        let previews = Previews::from_frames(vec!["a".into()]);
        assert_eq!(previews.main.as_deref(), Some("a"));

        let previews = Previews::from_frames(Vec::new());
        assert!(previews.main.is_none());
        assert!(previews.frames.is_empty());
    }

    #[test]
    fn test_file_record_wire_names() {
        let record = FileRecord {
            id: "0123456789abcdef".to_string(),
            kind: MediaKind::Audio,
            relative_path: "music/song.mp3".to_string(),
            file_name: "song.mp3".to_string(),
            metadata: Metadata {
                creation_date: "2024-01-01T00:00:00Z".to_string(),
                file_size: 42,
                resolution: None,
                duration: Some(12.5),
                format: "mp3".to_string(),
            },
            previews: Previews::single("thumbnails/music/song_waveform.webp".to_string()),
            external_link: ExternalLink::default(),
        };

        let parsed: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(parsed["type"], "audio");
        assert_eq!(parsed["relativePath"], "music/song.mp3");
        assert_eq!(parsed["fileName"], "song.mp3");
        assert_eq!(parsed["metadata"]["creationDate"], "2024-01-01T00:00:00Z");
        assert_eq!(parsed["metadata"]["fileSize"], 42);
        assert!(parsed["metadata"]["resolution"].is_null());
        assert_eq!(parsed["metadata"]["duration"], 12.5);
        assert_eq!(parsed["thumbnails"]["main"], "thumbnails/music/song_waveform.webp");
        assert_eq!(parsed["thumbnails"]["frames"].as_array().unwrap().len(), 0);
        assert_eq!(parsed["googleDrive"]["url"], "");
        assert_eq!(parsed["googleDrive"]["fileId"], "");
    }

    #[test]
    fn test_kind_stats_record() {
        let mut stats = KindStats::default();
        stats.record(MediaKind::Image);
        stats.record(MediaKind::Image);
        stats.record(MediaKind::Audio);
        assert_eq!(stats, KindStats { images: 2, videos: 0, audio: 1 });
    }
}
