//! Best-effort metadata extraction
//!
//! Each source (EXIF, ffprobe, image header, filesystem) is tried through a
//! `try_*` function returning [`ExtractionFailure`]; [`MetadataExtractor::extract`]
//! turns failures into the documented fallback values and never fails itself.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use exif::{In, Tag, Value};
use image::ImageFormat;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::classifier::extension_format;
use crate::config::ScanConfig;
use crate::error::ExtractionFailure;
use crate::models::{MediaKind, Metadata, Resolution};
use crate::probe::{self, AUDIO_ENTRIES, CREATION_TIME_ENTRIES, VIDEO_ENTRIES};
use crate::tool::ToolRunner;

/// Pattern of EXIF date/time tags
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Type-specific part of the metadata
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDetails {
    pub resolution: Option<Resolution>,
    pub duration: Option<f64>,
    pub format: String,
}

impl MediaDetails {
    /// Placeholder used when the type-specific source failed
    pub fn fallback(path: &Path, kind: MediaKind) -> Self {
        let resolution = match kind {
            MediaKind::Audio => None,
            MediaKind::Image | MediaKind::Video => Some(Resolution::default()),
        };
        Self {
            resolution,
            duration: None,
            format: extension_format(path),
        }
    }
}

/// Reads creation date, size and type-specific details of a media file.
///
/// Video and audio are probed with ffprobe through the injected runner;
/// images are read in-process.
pub struct MetadataExtractor {
    runner: Arc<dyn ToolRunner>,
    ffprobe: String,
    probe_timeout: Duration,
    creation_probe_timeout: Duration,
}

impl MetadataExtractor {
    /// Extractor using the ffprobe binary and timeouts from `config`
    pub fn new(config: &ScanConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            runner,
            ffprobe: config.ffprobe_bin.clone(),
            probe_timeout: config.probe_timeout,
            creation_probe_timeout: config.creation_probe_timeout,
        }
    }

    /// Extract metadata for a classified file, degrading to fallbacks.
    pub fn extract(&self, path: &Path, kind: MediaKind) -> Metadata {
        let stat = std::fs::metadata(path);
        let file_size = stat.as_ref().map(|m| m.len()).unwrap_or(0);
        let creation_date = self.creation_date(path, kind, stat.as_ref().ok());

        let details = self.try_details(path, kind).unwrap_or_else(|e| {
            log::warn!("Error reading {} metadata for {}: {}", kind, path.display(), e);
            MediaDetails::fallback(path, kind)
        });

        Metadata {
            creation_date,
            file_size,
            resolution: details.resolution,
            duration: details.duration,
            format: details.format,
        }
    }

    /// Resolution, duration and format without any fallback
    pub fn try_details(&self, path: &Path, kind: MediaKind) -> Result<MediaDetails, ExtractionFailure> {
        match kind {
            MediaKind::Image => try_image_details(path),
            MediaKind::Video => self.try_video_details(path),
            MediaKind::Audio => self.try_audio_details(path),
        }
    }

    /// Creation date resolution: embedded tag, then filesystem, then now.
    pub fn creation_date(&self, path: &Path, kind: MediaKind, stat: Option<&std::fs::Metadata>) -> String {
        let embedded = match kind {
            MediaKind::Image => try_exif_creation_date(path),
            MediaKind::Video | MediaKind::Audio => self.try_probe_creation_date(path),
        };
        match embedded {
            Ok(date) => return date,
            Err(e) => log::debug!("No embedded creation date for {}: {}", path.display(), e),
        }

        match stat.map(filesystem_creation_date) {
            Some(Ok(date)) => date,
            Some(Err(e)) => {
                log::warn!("Could not get creation date for {}: {}", path.display(), e);
                now_iso()
            }
            None => {
                log::warn!("Could not get creation date for {}: stat failed", path.display());
                now_iso()
            }
        }
    }

    fn try_probe_creation_date(&self, path: &Path) -> Result<String, ExtractionFailure> {
        let probe = probe::run_probe(
            self.runner.as_ref(),
            &self.ffprobe,
            path,
            CREATION_TIME_ENTRIES,
            self.creation_probe_timeout,
        )?;
        probe
            .creation_time()
            .map(str::to_string)
            .ok_or(ExtractionFailure::MissingField("creation_time"))
    }

    fn try_video_details(&self, path: &Path) -> Result<MediaDetails, ExtractionFailure> {
        let probe = probe::run_probe(
            self.runner.as_ref(),
            &self.ffprobe,
            path,
            VIDEO_ENTRIES,
            self.probe_timeout,
        )?;
        Ok(MediaDetails {
            resolution: Some(probe.resolution()),
            duration: probe.stream_or_format_duration(),
            format: extension_format(path),
        })
    }

    fn try_audio_details(&self, path: &Path) -> Result<MediaDetails, ExtractionFailure> {
        let probe = probe::run_probe(
            self.runner.as_ref(),
            &self.ffprobe,
            path,
            AUDIO_ENTRIES,
            self.probe_timeout,
        )?;
        Ok(MediaDetails {
            resolution: None,
            duration: probe.format_duration(),
            format: extension_format(path),
        })
    }
}

/// Dimensions and decoder format from the image header
pub fn try_image_details(path: &Path) -> Result<MediaDetails, ExtractionFailure> {
    let reader = image::io::Reader::open(path)?.with_guessed_format()?;
    let format = reader
        .format()
        .map(format_name)
        .unwrap_or_else(|| extension_format(path));
    let (width, height) = reader.into_dimensions()?;
    Ok(MediaDetails {
        resolution: Some(Resolution::new(width, height)),
        duration: None,
        format,
    })
}

fn format_name(format: ImageFormat) -> String {
    format!("{format:?}").to_lowercase()
}

/// `DateTimeOriginal` from the EXIF block
pub fn try_exif_creation_date(path: &Path) -> Result<String, ExtractionFailure> {
    let mut reader = BufReader::new(File::open(path)?);
    let exif = exif::Reader::new().read_from_container(&mut reader)?;
    let field = exif
        .get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .ok_or(ExtractionFailure::MissingField("DateTimeOriginal"))?;
    let raw = match &field.value {
        Value::Ascii(values) => values
            .first()
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .ok_or(ExtractionFailure::MissingField("DateTimeOriginal"))?,
        other => return Err(ExtractionFailure::MalformedTimestamp(format!("{other:?}"))),
    };
    parse_exif_datetime(&raw)
}

/// Parse `YYYY:MM:DD HH:MM:SS` into an ISO-8601 UTC timestamp
pub fn parse_exif_datetime(raw: &str) -> Result<String, ExtractionFailure> {
    let raw = raw.trim_end_matches('\0').trim();
    NaiveDateTime::parse_from_str(raw, EXIF_DATETIME_FORMAT)
        .map(|dt| to_iso(dt.and_utc()))
        .map_err(|_| ExtractionFailure::MalformedTimestamp(raw.to_string()))
}

/// Birth time when the platform has it, modification time otherwise
pub fn filesystem_creation_date(stat: &std::fs::Metadata) -> Result<String, ExtractionFailure> {
    let time: SystemTime = stat.created().or_else(|_| stat.modified())?;
    Ok(to_iso(DateTime::<Utc>::from(time)))
}

/// Current time as `YYYY-MM-DDTHH:MM:SSZ`
pub fn now_iso() -> String {
    to_iso(Utc::now())
}

fn to_iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
