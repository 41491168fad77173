//! Media volume indexer
//!
//! Walks a volume, classifies images, videos and audio by extension,
//! extracts best-effort metadata, renders WebP previews (thumbnails, frame
//! strips, waveforms) and writes one JSON index describing every file.

pub mod classifier;
pub mod config;
pub mod error;
pub mod index;
pub mod metadata;
pub mod models;
pub mod preview;
pub mod probe;
pub mod progress;
pub mod record;
pub mod scanner;
pub mod tool;

pub use classifier::Classifier;
pub use config::ScanConfig;
pub use error::{ExtractionFailure, GenerationFailure, ScanError, ScanErrorKind, ToolFailure};
pub use metadata::MetadataExtractor;
pub use models::{
    ExternalLink, FileRecord, IndexDocument, IndexMetadata, KindStats, MediaKind, Metadata,
    Previews, Resolution,
};
pub use preview::PreviewGenerator;
pub use progress::ProgressReporter;
pub use scanner::{
    candidates, index_volume, index_volume_with_system_tools, Candidate, ScanOutcome, ScanState,
    VolumeScanner,
};
pub use tool::{SystemToolRunner, ToolInvocation, ToolOutput, ToolRunner};
