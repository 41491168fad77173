//! Path classification: media kind by extension and the skip rule for
//! hidden and system directories

use std::collections::HashSet;
use std::path::{Component, Path};

use crate::config::ScanConfig;
use crate::models::MediaKind;

const HIDDEN_MARKER: char = '.';

/// Classifies paths using the extension sets and skip lists of a config
#[derive(Debug, Clone)]
pub struct Classifier {
    image_extensions: HashSet<String>,
    video_extensions: HashSet<String>,
    audio_extensions: HashSet<String>,
    system_dirs: HashSet<String>,
    reserved_hidden_dir: String,
}

impl Classifier {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            image_extensions: config.image_extensions.clone(),
            video_extensions: config.video_extensions.clone(),
            audio_extensions: config.audio_extensions.clone(),
            system_dirs: config.system_dirs.clone(),
            reserved_hidden_dir: config.reserved_hidden_dir.clone(),
        }
    }

    /// Media kind of a path, `None` when the extension is not media.
    pub fn classify(&self, path: &Path) -> Option<MediaKind> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if self.image_extensions.contains(&ext) {
            Some(MediaKind::Image)
        } else if self.video_extensions.contains(&ext) {
            Some(MediaKind::Video)
        } else if self.audio_extensions.contains(&ext) {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }

    /// Whether any segment of `path` is a system or hidden directory.
    ///
    /// Every hidden segment is rejected except the reserved previews
    /// directory name, so nesting depth does not matter.
    pub fn should_skip(&self, path: &Path) -> bool {
        path.components().any(|component| match component {
            Component::Normal(segment) => self.is_skipped_segment(&segment.to_string_lossy()),
            _ => false,
        })
    }

    fn is_skipped_segment(&self, segment: &str) -> bool {
        if !segment.starts_with(HIDDEN_MARKER) {
            return false;
        }
        if self.system_dirs.contains(segment) {
            return true;
        }
        segment.len() > 1 && segment != self.reserved_hidden_dir
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&ScanConfig::default())
    }
}

/// Extension of a path, lowercase and without the dot
pub fn extension_format(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
