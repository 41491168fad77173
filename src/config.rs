//! Configuration for the media indexer

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Default maximum preview width in pixels
pub const DEFAULT_PREVIEW_WIDTH: u32 = 800;

/// Default number of frames captured per video
pub const DEFAULT_FRAME_COUNT: usize = 5;

/// Default waveform image height in pixels
pub const DEFAULT_WAVEFORM_HEIGHT: u32 = 400;

/// Default WebP quality factor
pub const DEFAULT_WEBP_QUALITY: f32 = 85.0;

/// Default progress log interval (processed files)
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10;

/// Hidden directory name that is never skipped
pub const RESERVED_HIDDEN_DIR: &str = ".thumbnails";

/// Configuration for one indexing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Volume to scan
    pub root: PathBuf,

    /// Directory receiving the index and the previews tree
    pub output_dir: PathBuf,

    /// Name of the previews directory below `output_dir`
    pub previews_dir: String,

    /// File name of the index document below `output_dir`
    pub index_file: String,

    /// Image extensions (lowercase, without dot)
    pub image_extensions: HashSet<String>,

    /// Video extensions (lowercase, without dot)
    pub video_extensions: HashSet<String>,

    /// Audio extensions (lowercase, without dot)
    pub audio_extensions: HashSet<String>,

    /// Known system and trash directories
    pub system_dirs: HashSet<String>,

    /// Hidden directory name exempt from the hidden-directory rule
    pub reserved_hidden_dir: String,

    /// Maximum preview width; narrower sources keep their size
    pub preview_width: u32,

    /// Frames captured per video
    pub frame_count: usize,

    /// Waveform image height
    pub waveform_height: u32,

    /// Waveform color as understood by ffmpeg
    pub waveform_color: String,

    /// WebP quality for image thumbnails
    pub webp_quality: f32,

    /// Timeout for width/height/duration probes
    pub probe_timeout: Duration,

    /// Timeout for the creation-time probe
    pub creation_probe_timeout: Duration,

    /// Timeout for frame extraction and waveform rendering
    pub render_timeout: Duration,

    /// ffprobe executable
    pub ffprobe_bin: String,

    /// ffmpeg executable
    pub ffmpeg_bin: String,

    /// Number of files processed concurrently
    /// 1 processes strictly sequentially, 0 means auto-detect
    pub workers: usize,

    /// Log progress every N processed files
    pub progress_interval: u64,

    /// Emit JSON progress lines on stderr
    pub progress_json: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            output_dir: PathBuf::from("public"),
            previews_dir: "thumbnails".to_string(),
            index_file: "media_index.json".to_string(),
            image_extensions: Self::default_image_extensions(),
            video_extensions: Self::default_video_extensions(),
            audio_extensions: Self::default_audio_extensions(),
            system_dirs: Self::default_system_dirs(),
            reserved_hidden_dir: RESERVED_HIDDEN_DIR.to_string(),
            preview_width: DEFAULT_PREVIEW_WIDTH,
            frame_count: DEFAULT_FRAME_COUNT,
            waveform_height: DEFAULT_WAVEFORM_HEIGHT,
            waveform_color: "0x3b82f6".to_string(),
            webp_quality: DEFAULT_WEBP_QUALITY,
            probe_timeout: Duration::from_secs(30),
            creation_probe_timeout: Duration::from_secs(10),
            render_timeout: Duration::from_secs(30),
            ffprobe_bin: "ffprobe".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            workers: 1,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            progress_json: false,
        }
    }
}

fn to_set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ScanConfig {
    /// Create a new config for the given volume
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::new()
    }

    /// Get the default image extensions
    pub fn default_image_extensions() -> HashSet<String> {
        to_set(&[
            "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "heic", "heif",
        ])
    }

    /// Get the default video extensions
    pub fn default_video_extensions() -> HashSet<String> {
        to_set(&[
            "mp4", "mov", "avi", "mkv", "m4v", "wmv", "flv", "webm", "mpeg", "mpg", "3gp",
        ])
    }

    /// Get the default audio extensions
    pub fn default_audio_extensions() -> HashSet<String> {
        to_set(&["mp3", "wav", "flac", "m4a", "aac", "ogg", "wma", "opus"])
    }

    /// Get the default system and trash directories
    pub fn default_system_dirs() -> HashSet<String> {
        to_set(&[
            ".Trash",
            ".Spotlight-V100",
            ".fseventsd",
            ".DocumentRevisions-V100",
            ".TemporaryItems",
            ".VolumeIcon.icns",
        ])
    }

    /// Root of the previews tree
    pub fn previews_root(&self) -> PathBuf {
        self.output_dir.join(&self.previews_dir)
    }

    /// Location of the index document
    pub fn index_path(&self) -> PathBuf {
        self.output_dir.join(&self.index_file)
    }

    /// Get the effective number of workers
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        } else {
            self.workers
        }
    }
}

/// Builder for ScanConfig
#[derive(Debug, Default)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the volume to scan
    pub fn root(mut self, root: PathBuf) -> Self {
        self.config.root = root;
        self
    }

    /// Set the output directory
    pub fn output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output_dir = dir;
        self
    }

    /// Set the previews directory name
    pub fn previews_dir(mut self, name: impl Into<String>) -> Self {
        self.config.previews_dir = name.into();
        self
    }

    /// Set the index file name
    pub fn index_file(mut self, name: impl Into<String>) -> Self {
        self.config.index_file = name.into();
        self
    }

    /// Add a system directory to skip
    pub fn add_system_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.system_dirs.insert(dir.into());
        self
    }

    /// Set the maximum preview width
    pub fn preview_width(mut self, width: u32) -> Self {
        self.config.preview_width = width;
        self
    }

    /// Set the number of frames per video
    pub fn frame_count(mut self, count: usize) -> Self {
        self.config.frame_count = count;
        self
    }

    /// Set the WebP quality
    pub fn webp_quality(mut self, quality: f32) -> Self {
        self.config.webp_quality = quality;
        self
    }

    /// Set the ffprobe executable
    pub fn ffprobe_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.ffprobe_bin = bin.into();
        self
    }

    /// Set the ffmpeg executable
    pub fn ffmpeg_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.ffmpeg_bin = bin.into();
        self
    }

    /// Set the number of workers
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set the progress log interval
    pub fn progress_interval(mut self, interval: u64) -> Self {
        self.config.progress_interval = interval;
        self
    }

    /// Enable or disable JSON progress output
    pub fn progress_json(mut self, enabled: bool) -> Self {
        self.config.progress_json = enabled;
        self
    }

    /// Build the config
    pub fn build(self) -> ScanConfig {
        self.config
    }
}
