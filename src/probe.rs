//! ffprobe invocations and output parsing

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::ExtractionFailure;
use crate::models::Resolution;
use crate::tool::{ToolInvocation, ToolRunner};

/// Entries requested for video files
pub const VIDEO_ENTRIES: &str = "stream=width,height,duration:format=duration";

/// Entries requested for audio files
pub const AUDIO_ENTRIES: &str = "format=duration";

/// Entries requested for the creation time lookup
pub const CREATION_TIME_ENTRIES: &str = "format_tags=creation_time";

#[derive(Debug, Default, Deserialize)]
pub struct ProbeOutput {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeStream {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeFormat {
    pub duration: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl ProbeOutput {
    pub fn parse(json: &str) -> Result<Self, ExtractionFailure> {
        Ok(serde_json::from_str(json)?)
    }

    /// First stream reporting a non-zero width
    pub fn video_stream(&self) -> Option<&ProbeStream> {
        self.streams.iter().find(|s| s.width.unwrap_or(0) > 0)
    }

    /// Resolution of the video stream, zero when there is none
    pub fn resolution(&self) -> Resolution {
        self.video_stream()
            .map(|s| Resolution::new(s.width.unwrap_or(0), s.height.unwrap_or(0)))
            .unwrap_or_default()
    }

    /// Video stream duration, falling back to the container duration
    pub fn stream_or_format_duration(&self) -> Option<f64> {
        self.video_stream()
            .and_then(|s| parse_seconds(s.duration.as_deref()))
            .or_else(|| self.format_duration())
    }

    /// Container duration
    pub fn format_duration(&self) -> Option<f64> {
        self.format
            .as_ref()
            .and_then(|f| parse_seconds(f.duration.as_deref()))
    }

    /// Container `creation_time` tag
    pub fn creation_time(&self) -> Option<&str> {
        self.format
            .as_ref()
            .and_then(|f| f.tags.get("creation_time"))
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// ffprobe reports numbers as strings, and "N/A" when unknown
fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Run ffprobe for `entries` and parse its JSON output.
pub fn run_probe(
    runner: &dyn ToolRunner,
    ffprobe: &str,
    path: &Path,
    entries: &str,
    timeout: Duration,
) -> Result<ProbeOutput, ExtractionFailure> {
    let invocation = ToolInvocation::new(ffprobe, timeout)
        .args(["-v", "quiet", "-print_format", "json", "-show_entries", entries])
        .arg(path);
    let output = runner.run(&invocation)?;
    ProbeOutput::parse(&output.stdout_lossy())
}
