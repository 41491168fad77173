//! Progress reporting for indexing runs
//!
//! Progress is always logged every `interval` processed files. When JSON
//! output is enabled, start/progress/error/done messages are additionally
//! written to stderr as one JSON object per line for external callers.

use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::models::{KindStats, MediaKind};
use crate::scanner::ScanOutcome;

/// Start message sent when the run begins
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    /// Message type identifier
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Scanned volume
    pub root: String,
    /// Output directory
    pub output: String,
    /// Concurrent workers
    pub workers: usize,
    /// Maximum preview width
    pub preview_width: u32,
    /// Frames per video
    pub frame_count: usize,
}

/// Progress message sent every `interval` processed files
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMessage {
    /// Message type identifier ("p" for progress)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Files processed so far
    #[serde(rename = "f")]
    pub files: u64,
    /// Images processed so far
    #[serde(rename = "i")]
    pub images: u64,
    /// Videos processed so far
    #[serde(rename = "v")]
    pub videos: u64,
    /// Audio files processed so far
    #[serde(rename = "a")]
    pub audio: u64,
    /// Last processed path, relative to the root
    pub path: String,
}

/// Error message sent when a file is excluded from the index
#[derive(Debug, Clone, Serialize)]
pub struct ErrorProgressMessage {
    /// Message type identifier ("err" for error)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Error type/category
    pub error_type: String,
    /// Error message description
    pub message: String,
    /// Path that caused the error (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Done message sent when the scan completes
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    /// Message type identifier ("done" for completion)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Indexed files
    #[serde(rename = "tf")]
    pub total_files: u64,
    /// Per-kind counts
    pub stats: KindStats,
    /// Files excluded because of errors
    #[serde(rename = "ec")]
    pub error_count: usize,
    /// Total scan duration in milliseconds
    pub ms: u64,
}

/// Progress reporter shared by all workers of a run
pub struct ProgressReporter {
    /// Whether JSON lines are written to stderr
    json: bool,
    /// Log every N processed files
    interval: u64,
    processed: AtomicU64,
    images: AtomicU64,
    videos: AtomicU64,
    audio: AtomicU64,
    /// Sequence number for JSON messages
    seq: AtomicU64,
    start_time: Instant,
}

impl ProgressReporter {
    pub fn new(json: bool, interval: u64) -> Self {
        Self {
            json,
            interval: interval.max(1),
            processed: AtomicU64::new(0),
            images: AtomicU64::new(0),
            videos: AtomicU64::new(0),
            audio: AtomicU64::new(0),
            seq: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.progress_json, config.progress_interval)
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Milliseconds since reporter creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Number of files recorded so far
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    fn output_to_stderr<T: Serialize>(&self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            eprintln!("{}", json);
            std::io::stderr().flush().ok();
        }
    }

    pub fn report_start(&self, config: &ScanConfig) {
        log::info!("Starting scan of {}...", config.root.display());
        if !self.json {
            return;
        }
        self.output_to_stderr(&StartMessage {
            msg_type: "start",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            root: config.root.to_string_lossy().into_owned(),
            output: config.output_dir.to_string_lossy().into_owned(),
            workers: config.effective_workers(),
            preview_width: config.preview_width,
            frame_count: config.frame_count,
        });
    }

    /// Count one indexed file; returns true when a progress line was emitted.
    pub fn record_processed(&self, kind: MediaKind, relative_path: &str) -> bool {
        match kind {
            MediaKind::Image => self.images.fetch_add(1, Ordering::Relaxed),
            MediaKind::Video => self.videos.fetch_add(1, Ordering::Relaxed),
            MediaKind::Audio => self.audio.fetch_add(1, Ordering::Relaxed),
        };
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if processed % self.interval != 0 {
            return false;
        }

        log::info!("Progress: {} files processed", processed);
        if self.json {
            self.output_to_stderr(&ProgressMessage {
                msg_type: "p",
                seq: self.next_seq(),
                ts: self.current_timestamp(),
                files: processed,
                images: self.images.load(Ordering::Relaxed),
                videos: self.videos.load(Ordering::Relaxed),
                audio: self.audio.load(Ordering::Relaxed),
                path: relative_path.to_string(),
            });
        }
        true
    }

    pub fn report_error(&self, error: &ScanError) {
        match &error.path {
            Some(path) => log::error!("Error processing {}: {}", path.display(), error.message),
            None => log::error!("Error during scan: {}", error.message),
        }
        if !self.json {
            return;
        }
        self.output_to_stderr(&ErrorProgressMessage {
            msg_type: "err",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            error_type: format!("{:?}", error.kind),
            message: error.message.clone(),
            path: error.path.as_ref().map(|p| p.to_string_lossy().into_owned()),
        });
    }

    pub fn report_done(&self, outcome: &ScanOutcome) {
        log::info!(
            "Scan complete! Processed {} out of {} media files",
            outcome.records.len(),
            outcome.accepted
        );
        if !self.json {
            return;
        }
        self.output_to_stderr(&DoneMessage {
            msg_type: "done",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            total_files: outcome.records.len() as u64,
            stats: outcome.stats(),
            error_count: outcome.errors.len(),
            ms: outcome.duration_ms,
        });
    }
}
