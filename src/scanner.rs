//! Scanner module - traversal of the volume and per-file processing
//!
//! Traversal ([`candidates`]) lazily yields the media files worth indexing.
//! Processing ([`VolumeScanner::scan`]) consumes them one at a time, or on a
//! bounded rayon pool when more than one worker is configured, and isolates
//! every file behind its own failure boundary.

use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use walkdir::WalkDir;

use crate::classifier::Classifier;
use crate::config::ScanConfig;
use crate::error::{ScanError, ScanErrorKind};
use crate::index;
use crate::metadata::MetadataExtractor;
use crate::models::{FileRecord, IndexDocument, KindStats, MediaKind};
use crate::preview::PreviewGenerator;
use crate::progress::ProgressReporter;
use crate::record;
use crate::tool::{SystemToolRunner, ToolRunner};

/// Lifecycle of a scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    NotStarted,
    Scanning,
    Complete,
}

/// A media file found by the traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub kind: MediaKind,
}

/// Result of a scan
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Records in traversal order
    pub records: Vec<FileRecord>,
    /// Files excluded from the index and traversal errors
    pub errors: Vec<ScanError>,
    /// Media files accepted by the classifier
    pub accepted: u64,
    /// Total scan duration in milliseconds
    pub duration_ms: u64,
}

impl ScanOutcome {
    pub fn stats(&self) -> KindStats {
        let mut stats = KindStats::default();
        for record in &self.records {
            stats.record(record.kind);
        }
        stats
    }
}

/// Media files below `root`, sorted by name within each directory.
///
/// Skipped directories and the root-relative directories in `excluded`
/// are pruned without being descended into. Paths are judged relative to
/// `root`, so the root itself may live anywhere. Symlinked directories are
/// not followed; a symlink to a regular file is indexed under its own path.
pub fn candidates(
    root: &Path,
    classifier: &Classifier,
    excluded: &[PathBuf],
) -> impl Iterator<Item = Result<Candidate, ScanError>> {
    let root = root.to_path_buf();
    let classifier = classifier.clone();
    let prune_root = root.clone();
    let prune = classifier.clone();
    let excluded = excluded.to_vec();

    WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            match entry.path().strip_prefix(&prune_root) {
                Ok(relative) => {
                    !prune.should_skip(relative) && !excluded.iter().any(|dir| dir == relative)
                }
                Err(_) => true,
            }
        })
        .filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(walk_error(e))),
            };
            if entry.file_type().is_dir() {
                log::debug!("Scanning directory: {}", entry.path().display());
                return None;
            }
            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink() && entry.path().is_file());
            if !is_file {
                return None;
            }

            let path = entry.into_path();
            let relative_path = match path.strip_prefix(&root) {
                Ok(relative) => relative.to_path_buf(),
                Err(e) => return Some(Err(ScanError::invalid_path(path.clone(), e.to_string()))),
            };
            if classifier.should_skip(&relative_path) {
                return None;
            }
            let kind = classifier.classify(&relative_path)?;
            Some(Ok(Candidate {
                path,
                relative_path,
                kind,
            }))
        })
}

/// Root-relative location of the preview tree when it sits inside `root`.
///
/// The previews directory may not exist yet, so only its nearest existing
/// ancestor is canonicalized.
pub fn artifact_dirs(config: &ScanConfig) -> Vec<PathBuf> {
    let root = match config.root.canonicalize() {
        Ok(root) => root,
        Err(_) => return Vec::new(),
    };
    let previews = match resolve(&config.previews_root()) {
        Some(previews) => previews,
        None => return Vec::new(),
    };
    match previews.strip_prefix(&root) {
        Ok(relative) if !relative.as_os_str().is_empty() => vec![relative.to_path_buf()],
        _ => Vec::new(),
    }
}

fn resolve(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };

    let mut missing = Vec::new();
    let mut existing = absolute.as_path();
    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                resolved.extend(missing.iter().rev());
                return Some(resolved);
            }
            Err(_) => {
                missing.push(existing.file_name()?.to_os_string());
                existing = existing.parent()?;
            }
        }
    }
}

fn walk_error(e: walkdir::Error) -> ScanError {
    let path = e.path().map(Path::to_path_buf);
    let kind = if e.io_error().map(|e| e.kind()) == Some(std::io::ErrorKind::PermissionDenied) {
        ScanErrorKind::PermissionDenied
    } else {
        ScanErrorKind::IoError
    };
    ScanError::new(kind, path, e.to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// One-shot indexing run over `config.root`
pub struct VolumeScanner {
    config: ScanConfig,
    classifier: Classifier,
    extractor: MetadataExtractor,
    generator: PreviewGenerator,
    state: ScanState,
}

impl VolumeScanner {
    pub fn new(config: ScanConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            classifier: Classifier::new(&config),
            extractor: MetadataExtractor::new(&config, runner.clone()),
            generator: PreviewGenerator::new(&config, runner),
            config,
            state: ScanState::NotStarted,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan the volume from scratch.
    ///
    /// Only a missing root aborts the run; every other failure is confined to
    /// the file it happened on.
    pub fn scan(&mut self) -> Result<ScanOutcome, ScanError> {
        self.state = ScanState::NotStarted;
        if !self.config.root.is_dir() {
            return Err(ScanError::root_not_found(self.config.root.clone()));
        }

        self.state = ScanState::Scanning;
        let start = Instant::now();
        let reporter = ProgressReporter::from_config(&self.config);
        reporter.report_start(&self.config);

        let excluded = artifact_dirs(&self.config);
        for dir in &excluded {
            log::debug!("Leaving out preview tree: {}", dir.display());
        }

        let workers = self.config.effective_workers();
        let mut outcome = if workers <= 1 {
            let results = candidates(&self.config.root, &self.classifier, &excluded)
                .map(|item| self.process_item(item, &reporter));
            collect_outcome(results, &reporter)
        } else {
            self.scan_parallel(workers, &excluded, &reporter)?
        };

        outcome.duration_ms = start.elapsed().as_millis() as u64;
        reporter.report_done(&outcome);
        self.state = ScanState::Complete;
        Ok(outcome)
    }

    fn scan_parallel(
        &self,
        workers: usize,
        excluded: &[PathBuf],
        reporter: &ProgressReporter,
    ) -> Result<ScanOutcome, ScanError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| ScanError::new(ScanErrorKind::Unknown, None, e.to_string()))?;

        let items: Vec<_> = candidates(&self.config.root, &self.classifier, excluded).collect();
        log::debug!("Processing {} entries on {} workers", items.len(), workers);

        // indexed collect keeps traversal order
        let results: Vec<_> = pool.install(|| {
            items
                .into_par_iter()
                .map(|item| self.process_item(item, reporter))
                .collect()
        });
        Ok(collect_outcome(results, reporter))
    }

    fn process_item(
        &self,
        item: Result<Candidate, ScanError>,
        reporter: &ProgressReporter,
    ) -> (bool, Result<FileRecord, ScanError>) {
        match item {
            Ok(candidate) => (true, self.process_file(&candidate, reporter)),
            Err(e) => (false, Err(e)),
        }
    }

    /// Run one file through extraction, preview generation and record
    /// assembly inside a failure boundary.
    pub fn process_file(&self, candidate: &Candidate, reporter: &ProgressReporter) -> Result<FileRecord, ScanError> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.build_record(candidate)))
            .unwrap_or_else(|payload| {
                Err(ScanError::panic(
                    candidate.path.clone(),
                    panic_message(payload.as_ref()),
                ))
            });

        if let Ok(record) = &result {
            reporter.record_processed(record.kind, &record.relative_path);
        }
        result
    }

    fn build_record(&self, candidate: &Candidate) -> Result<FileRecord, ScanError> {
        log::info!(
            "Processing {}: {}",
            candidate.kind,
            candidate.relative_path.display()
        );

        // the file may have vanished since traversal
        std::fs::metadata(&candidate.path).map_err(|e| ScanError::from(e).with_path(candidate.path.clone()))?;

        let metadata = self.extractor.extract(&candidate.path, candidate.kind);
        let previews = self.generator.generate(
            &candidate.path,
            &candidate.relative_path,
            candidate.kind,
            &metadata,
        );
        Ok(record::build(
            &candidate.relative_path,
            candidate.kind,
            metadata,
            previews,
        ))
    }
}

fn collect_outcome<I>(results: I, reporter: &ProgressReporter) -> ScanOutcome
where
    I: IntoIterator<Item = (bool, Result<FileRecord, ScanError>)>,
{
    let mut outcome = ScanOutcome::default();
    for (accepted, result) in results {
        if accepted {
            outcome.accepted += 1;
        }
        match result {
            Ok(record) => outcome.records.push(record),
            Err(e) => {
                reporter.report_error(&e);
                outcome.errors.push(e);
            }
        }
    }
    outcome
}

/// Scan, assemble and write the index for `config` using `runner` for
/// external tools.
pub fn index_volume(config: &ScanConfig, runner: Arc<dyn ToolRunner>) -> Result<IndexDocument, ScanError> {
    let mut scanner = VolumeScanner::new(config.clone(), runner);
    let outcome = scanner.scan()?;

    log::info!("Building JSON structure...");
    let document = index::assemble(&config.root.to_string_lossy(), outcome.records);

    let index_path = config.index_path();
    log::info!("Writing JSON to {}", index_path.display());
    index::write_index(&document, &index_path)?;
    Ok(document)
}

/// [`index_volume`] with the real ffprobe/ffmpeg runner
pub fn index_volume_with_system_tools(config: &ScanConfig) -> Result<IndexDocument, ScanError> {
    index_volume(config, Arc::new(SystemToolRunner))
}
