//! Error types for the media indexer

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error kinds that can occur during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanErrorKind {
    /// The scan root does not exist or is not a directory
    RootNotFound,
    /// Permission denied when accessing a file or directory
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// I/O error during file operations
    IoError,
    /// Path could not be expressed relative to the scan root
    InvalidPath,
    /// Per-file processing panicked
    Panic,
    /// Index document could not be serialized
    Serialization,
    /// Unknown error
    Unknown,
}

/// Represents an error that occurred during scanning
#[derive(Debug, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct ScanError {
    /// The kind of error
    pub kind: ScanErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

impl ScanError {
    /// Create a new scan error
    pub fn new(kind: ScanErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create a missing scan root error
    pub fn root_not_found(path: PathBuf) -> Self {
        Self::new(
            ScanErrorKind::RootNotFound,
            Some(path.clone()),
            format!("Volume not found: {}", path.display()),
        )
    }

    /// Create an I/O error
    pub fn io_error(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::IoError, path, message)
    }

    /// Create an invalid path error
    pub fn invalid_path(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::InvalidPath, Some(path), message)
    }

    /// Create an error for a panic caught at the per-file boundary
    pub fn panic(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ScanErrorKind::Panic, Some(path), message)
    }

    /// Attach a path to an error that was created without one
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path.get_or_insert(path);
        self
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => ScanErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => ScanErrorKind::NotFound,
            _ => ScanErrorKind::IoError,
        };
        Self::new(kind, None, err.to_string())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ScanErrorKind::Serialization, None, err.to_string())
    }
}

/// Failure of a single external tool invocation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolFailure {
    /// The executable could not be started
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    /// Non-zero exit, or killed by a signal when `code` is `None`
    #[error("{program} exited with status {code:?}: {stderr}")]
    ExitCode {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Still running at the deadline and killed
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// Why a metadata source produced nothing usable
#[derive(Debug, Error)]
pub enum ExtractionFailure {
    /// ffprobe could not be run to completion
    #[error(transparent)]
    Tool(#[from] ToolFailure),

    /// ffprobe printed something that is not its JSON report
    #[error("unreadable probe output: {0}")]
    ProbeOutput(#[from] serde_json::Error),

    /// The image header could not be read
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// No readable EXIF block in the container
    #[error("exif read failed: {0}")]
    Exif(#[from] exif::Error),

    /// The source answered but lacked the named field
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A date tag that does not match the expected pattern
    #[error("malformed timestamp {0:?}")]
    MalformedTimestamp(String),

    /// Filesystem error while opening or statting the file
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why a preview could not be produced
#[derive(Debug, Error)]
pub enum GenerationFailure {
    /// Video without a positive duration; no frame is attempted
    #[error("no positive duration to position frames")]
    MissingDuration,

    /// Source image could not be decoded
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// The WebP encoder rejected the image
    #[error("webp encoding failed: {0}")]
    Encode(String),

    /// ffmpeg failed, timed out or could not be started
    #[error(transparent)]
    Tool(#[from] ToolFailure),

    /// ffmpeg exited cleanly without producing the file
    #[error("tool reported success but {0:?} was not written")]
    OutputMissing(PathBuf),

    /// Every frame of a video failed
    #[error("no frame could be extracted")]
    NoFrames,

    /// Preview directory could not be created or written
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
