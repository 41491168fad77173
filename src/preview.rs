//! Preview generation: WebP thumbnails for images, evenly spaced frame
//! captures for videos and waveform renderings for audio
//!
//! Previews are written under `<output_dir>/<previews_dir>`, mirroring the
//! source's directory relative to the scan root. Recorded paths are relative
//! to `output_dir` and always use `/`.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ScanConfig;
use crate::error::GenerationFailure;
use crate::models::{MediaKind, Metadata, Previews};
use crate::record::slash_path;
use crate::tool::{ToolInvocation, ToolRunner};

/// Extension of every generated preview
pub const PREVIEW_EXTENSION: &str = "webp";

/// Where a preview lands on disk and how the index refers to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewTarget {
    /// Path the file is written to
    pub absolute: PathBuf,
    /// `/`-separated path relative to the output directory
    pub relative: String,
}

/// Renders the previews of a media file below `<output_dir>/<previews_dir>`,
/// mirroring the file's directory inside the volume.
///
/// Images are thumbnailed in-process; video frames and audio waveforms are
/// rendered by ffmpeg through the injected runner.
pub struct PreviewGenerator {
    runner: Arc<dyn ToolRunner>,
    ffmpeg: String,
    output_dir: PathBuf,
    previews_dir: String,
    width: u32,
    frame_count: usize,
    waveform_height: u32,
    waveform_color: String,
    quality: f32,
    render_timeout: Duration,
}

impl PreviewGenerator {
    /// Generator using the ffmpeg binary and preview settings from `config`
    pub fn new(config: &ScanConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            runner,
            ffmpeg: config.ffmpeg_bin.clone(),
            output_dir: config.output_dir.clone(),
            previews_dir: config.previews_dir.clone(),
            width: config.preview_width,
            frame_count: config.frame_count,
            waveform_height: config.waveform_height,
            waveform_color: config.waveform_color.clone(),
            quality: config.webp_quality,
            render_timeout: config.render_timeout,
        }
    }

    /// Generate the previews of one file; failures yield empty previews.
    pub fn generate(&self, path: &Path, relative_path: &Path, kind: MediaKind, metadata: &Metadata) -> Previews {
        let result = match kind {
            MediaKind::Image => self.try_image(path, relative_path).map(Previews::single),
            MediaKind::Video => self.try_video(path, relative_path, metadata.duration),
            MediaKind::Audio => self.try_waveform(path, relative_path).map(Previews::single),
        };

        result.unwrap_or_else(|e| {
            match e {
                GenerationFailure::MissingDuration => {
                    log::debug!("No frames for {}: {}", path.display(), e)
                }
                _ => log::warn!("Error generating previews for {}: {}", path.display(), e),
            }
            Previews::default()
        })
    }

    /// Output location for a preview named `name` next to `relative_path`
    pub fn target(&self, relative_path: &Path, name: &str) -> PreviewTarget {
        let parent = relative_path.parent().unwrap_or_else(|| Path::new(""));
        let absolute = self
            .output_dir
            .join(&self.previews_dir)
            .join(parent)
            .join(name);

        let mut relative = self.previews_dir.clone();
        let parent = slash_path(parent);
        if !parent.is_empty() {
            relative.push('/');
            relative.push_str(&parent);
        }
        relative.push('/');
        relative.push_str(name);

        PreviewTarget { absolute, relative }
    }

    /// `<stem>.webp`, at most the configured width wide
    pub fn try_image(&self, path: &Path, relative_path: &Path) -> Result<String, GenerationFailure> {
        let target = self.target(relative_path, &format!("{}.{PREVIEW_EXTENSION}", stem(relative_path)));
        ensure_parent(&target.absolute)?;
        render_image_thumbnail(path, &target.absolute, self.width, self.quality)?;
        Ok(target.relative)
    }

    /// `<stem>_frame_<i>.webp` at evenly spaced interior timestamps.
    ///
    /// A failed frame is dropped and the rest still count; the call only
    /// fails when no frame could be positioned or none was written.
    pub fn try_video(
        &self,
        path: &Path,
        relative_path: &Path,
        duration: Option<f64>,
    ) -> Result<Previews, GenerationFailure> {
        let timestamps = frame_timestamps(duration, self.frame_count);
        if timestamps.is_empty() {
            return Err(GenerationFailure::MissingDuration);
        }

        let stem = stem(relative_path);
        let mut frames = Vec::with_capacity(timestamps.len());
        for (index, timestamp) in timestamps.iter().enumerate() {
            let target = self.target(relative_path, &format!("{stem}_frame_{index}.{PREVIEW_EXTENSION}"));
            match self.extract_frame(path, *timestamp, &target.absolute) {
                Ok(()) => frames.push(target.relative),
                Err(e) => log::debug!(
                    "Frame {} at {:.3}s of {} failed: {}",
                    index,
                    timestamp,
                    path.display(),
                    e
                ),
            }
        }

        if frames.is_empty() {
            return Err(GenerationFailure::NoFrames);
        }
        Ok(Previews::from_frames(frames))
    }

    fn extract_frame(&self, path: &Path, timestamp: f64, output: &Path) -> Result<(), GenerationFailure> {
        ensure_parent(output)?;
        let invocation = ToolInvocation::new(&self.ffmpeg, self.render_timeout)
            .arg("-ss")
            .arg(timestamp.to_string())
            .arg("-i")
            .arg(path)
            .args(["-vframes", "1", "-vf"])
            .arg(format!("scale={}:-1", self.width))
            .arg("-y")
            .arg(output);
        self.runner.run(&invocation)?;
        require_output(output)
    }

    /// `<stem>_waveform.webp` drawn by ffmpeg's `showwavespic` filter
    pub fn try_waveform(&self, path: &Path, relative_path: &Path) -> Result<String, GenerationFailure> {
        let target = self.target(
            relative_path,
            &format!("{}_waveform.{PREVIEW_EXTENSION}", stem(relative_path)),
        );
        ensure_parent(&target.absolute)?;

        let filter = format!(
            "showwavespic=s={}x{}:colors={}",
            self.width, self.waveform_height, self.waveform_color
        );
        let invocation = ToolInvocation::new(&self.ffmpeg, self.render_timeout)
            .arg("-i")
            .arg(path)
            .arg("-filter_complex")
            .arg(filter)
            .args(["-frames:v", "1", "-y"])
            .arg(&target.absolute);
        self.runner.run(&invocation)?;
        require_output(&target.absolute)?;
        Ok(target.relative)
    }
}

/// Interior timestamps `duration * i / (count + 1)` for `i = 1..=count`.
///
/// Empty when the duration is absent or not positive.
pub fn frame_timestamps(duration: Option<f64>, count: usize) -> Vec<f64> {
    match duration {
        Some(d) if d > 0.0 && d.is_finite() => (1..=count)
            .map(|i| d * i as f64 / (count + 1) as f64)
            .collect(),
        _ => Vec::new(),
    }
}

/// Size after capping the width at `max_width`, keeping the aspect ratio
pub fn fit_width(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let scaled = (u64::from(height) * u64::from(max_width) / u64::from(width)) as u32;
    (max_width, scaled.max(1))
}

/// Composite any transparency onto white and drop the alpha channel
pub fn flatten_onto_white(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }

    let rgba = img.into_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// Decode, flatten, downscale and encode one image as lossy WebP
pub fn render_image_thumbnail(
    source: &Path,
    output: &Path,
    max_width: u32,
    quality: f32,
) -> Result<(), GenerationFailure> {
    let img = image::open(source)?;
    let (width, height) = img.dimensions();
    let mut rgb = flatten_onto_white(img);

    let (w_scaled, h_scaled) = fit_width(width, height, max_width);
    if (w_scaled, h_scaled) != (width, height) {
        rgb = imageops::resize(&rgb, w_scaled, h_scaled, FilterType::Lanczos3);
    }

    let img = DynamicImage::ImageRgb8(rgb);
    let encoder = webp::Encoder::from_image(&img)
        .map_err(|reason| GenerationFailure::Encode(reason.to_string()))?;
    let encoded = encoder.encode(quality);
    fs::write(output, &*encoded)?;
    Ok(())
}

fn stem(relative_path: &Path) -> String {
    relative_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn ensure_parent(path: &Path) -> Result<(), GenerationFailure> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn require_output(path: &Path) -> Result<(), GenerationFailure> {
    if path.exists() {
        Ok(())
    } else {
        Err(GenerationFailure::OutputMissing(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolFailure;
    use crate::models::Resolution;
    use crate::tool::ToolOutput;
    use image::{Rgba, RgbaImage};
    use proptest::prelude::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Fake ffmpeg: writes the output file unless its name contains a
    /// failing marker
    struct FakeFfmpeg {
        fail_markers: Vec<String>,
        calls: Mutex<Vec<ToolInvocation>>,
    }

    impl FakeFfmpeg {
        fn new(fail_markers: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                fail_markers: fail_markers.iter().map(|s| s.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl ToolRunner for FakeFfmpeg {
        fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolFailure> {
            self.calls.lock().unwrap().push(invocation.clone());
            let output = PathBuf::from(invocation.last_arg().unwrap());
            let name = output.to_string_lossy().into_owned();
            if self.fail_markers.iter().any(|m| name.contains(m.as_str())) {
                return Err(ToolFailure::ExitCode {
                    program: invocation.program.clone(),
                    code: Some(1),
                    stderr: "decode error".to_string(),
                });
            }
            fs::write(&output, b"webp").unwrap();
            Ok(ToolOutput::default())
        }
    }

    fn generator(dir: &Path, runner: Arc<FakeFfmpeg>) -> PreviewGenerator {
        let config = ScanConfig::builder().output_dir(dir.to_path_buf()).build();
        PreviewGenerator::new(&config, runner)
    }

    fn video_metadata(duration: Option<f64>) -> Metadata {
        Metadata {
            creation_date: "2024-01-01T00:00:00Z".to_string(),
            file_size: 1,
            resolution: Some(Resolution::new(1920, 1080)),
            duration,
            format: "mp4".to_string(),
        }
    }

    #[test]
    fn test_frame_timestamps_are_interior() {
        let timestamps = frame_timestamps(Some(10.0), 5);
        let expected: Vec<f64> = (1..=5).map(|i| 10.0 * i as f64 / 6.0).collect();
        assert_eq!(timestamps, expected);
        assert!(frame_timestamps(None, 5).is_empty());
        assert!(frame_timestamps(Some(0.0), 5).is_empty());
        assert!(frame_timestamps(Some(-3.0), 5).is_empty());
    }

    #[test]
    fn test_fit_width() {
        assert_eq!(fit_width(1600, 900, 800), (800, 450));
        assert_eq!(fit_width(801, 3, 800), (800, 2));
        assert_eq!(fit_width(640, 480, 800), (640, 480));
        assert_eq!(fit_width(800, 600, 800), (800, 600));
        assert_eq!(fit_width(10_000, 1, 800), (800, 1));
    }

    #[test]
    fn test_flatten_onto_white() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([10, 20, 30, 255]));

        let rgb = flatten_onto_white(DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_target_mirrors_relative_path() {
        let dir = TempDir::new().unwrap();
        let generator = generator(dir.path(), FakeFfmpeg::new(&[]));

        let target = generator.target(Path::new("2024/trip/IMG_1.jpg"), "IMG_1.webp");
        assert_eq!(target.relative, "thumbnails/2024/trip/IMG_1.webp");
        assert_eq!(
            target.absolute,
            dir.path().join("thumbnails").join("2024").join("trip").join("IMG_1.webp")
        );

        let target = generator.target(Path::new("top.jpg"), "top.webp");
        assert_eq!(target.relative, "thumbnails/top.webp");
    }

    #[test]
    fn test_image_thumbnail_is_written() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("wide.png");
        RgbaImage::from_pixel(1600, 400, Rgba([200, 10, 10, 128]))
            .save(&source)
            .unwrap();

        let generator = generator(&dir.path().join("out"), FakeFfmpeg::new(&[]));
        let previews = generator.generate(
            &source,
            Path::new("albums/wide.png"),
            MediaKind::Image,
            &video_metadata(None),
        );

        assert_eq!(previews.main.as_deref(), Some("thumbnails/albums/wide.webp"));
        assert!(previews.frames.is_empty());
        let written = dir.path().join("out/thumbnails/albums/wide.webp");
        assert!(fs::metadata(written).unwrap().len() > 0);
    }

    #[test]
    fn test_undecodable_image_has_no_preview() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("broken.jpg");
        fs::write(&source, b"nope").unwrap();

        let generator = generator(dir.path(), FakeFfmpeg::new(&[]));
        let result = generator.try_image(&source, Path::new("broken.jpg"));
        assert!(matches!(result, Err(GenerationFailure::Decode(_))));
    }

    #[test]
    fn test_video_without_duration_attempts_nothing() {
        let dir = TempDir::new().unwrap();
        let runner = FakeFfmpeg::new(&[]);
        let generator = generator(dir.path(), runner.clone());

        for duration in [None, Some(0.0), Some(-1.0)] {
            let previews = generator.generate(
                Path::new("/src/clip.mp4"),
                Path::new("clip.mp4"),
                MediaKind::Video,
                &video_metadata(duration),
            );
            assert_eq!(previews, Previews::default());
        }
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn test_video_frames_all_succeed() {
        let dir = TempDir::new().unwrap();
        let runner = FakeFfmpeg::new(&[]);
        let generator = generator(dir.path(), runner.clone());

        let previews = generator.generate(
            Path::new("/src/movies/clip.mp4"),
            Path::new("movies/clip.mp4"),
            MediaKind::Video,
            &video_metadata(Some(12.0)),
        );

        assert_eq!(previews.frames.len(), 5);
        assert_eq!(previews.frames[0], "thumbnails/movies/clip_frame_0.webp");
        assert_eq!(previews.main.as_deref(), Some("thumbnails/movies/clip_frame_2.webp"));

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0].args[1], "2");
        assert_eq!(calls[4].args[1], "10");
        assert!(calls[0].has_arg("scale=800:-1"));
    }

    #[test]
    fn test_partial_frame_failures() {
        let dir = TempDir::new().unwrap();
        let runner = FakeFfmpeg::new(&["_frame_0.", "_frame_2."]);
        let generator = generator(dir.path(), runner);

        let previews = generator.generate(
            Path::new("/src/clip.mp4"),
            Path::new("clip.mp4"),
            MediaKind::Video,
            &video_metadata(Some(10.0)),
        );

        assert_eq!(
            previews.frames,
            vec![
                "thumbnails/clip_frame_1.webp".to_string(),
                "thumbnails/clip_frame_3.webp".to_string(),
                "thumbnails/clip_frame_4.webp".to_string(),
            ]
        );
        assert_eq!(previews.main.as_ref(), Some(&previews.frames[1]));
    }

    #[test]
    fn test_short_video_seeks_stay_interior() {
        let dir = TempDir::new().unwrap();
        let runner = FakeFfmpeg::new(&[]);
        let generator = generator(dir.path(), runner.clone());
        let duration = 0.002;

        let previews = generator.generate(
            Path::new("/src/blip.mp4"),
            Path::new("blip.mp4"),
            MediaKind::Video,
            &video_metadata(Some(duration)),
        );
        assert_eq!(previews.frames.len(), 5);

        let seeks: Vec<f64> = runner
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.args[1].to_string_lossy().parse().unwrap())
            .collect();
        assert_eq!(seeks, frame_timestamps(Some(duration), 5));
        for t in &seeks {
            assert!(*t > 0.0 && *t < duration, "seek {t} outside (0, {duration})");
        }
        for pair in seeks.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_all_frames_fail() {
        let dir = TempDir::new().unwrap();
        let generator = generator(dir.path(), FakeFfmpeg::new(&["_frame_"]));
        let result = generator.try_video(Path::new("/src/clip.mp4"), Path::new("clip.mp4"), Some(10.0));
        assert!(matches!(result, Err(GenerationFailure::NoFrames)));
    }

    #[test]
    fn test_waveform() {
        let dir = TempDir::new().unwrap();
        let runner = FakeFfmpeg::new(&[]);
        let generator = generator(dir.path(), runner.clone());

        let previews = generator.generate(
            Path::new("/src/music/song.mp3"),
            Path::new("music/song.mp3"),
            MediaKind::Audio,
            &video_metadata(Some(180.0)),
        );
        assert_eq!(previews.main.as_deref(), Some("thumbnails/music/song_waveform.webp"));
        assert!(previews.frames.is_empty());

        let calls = runner.calls.lock().unwrap();
        assert!(calls[0].has_arg("showwavespic=s=800x400:colors=0x3b82f6"));
    }

    #[test]
    fn test_waveform_failure() {
        let dir = TempDir::new().unwrap();
        let generator = generator(dir.path(), FakeFfmpeg::new(&["_waveform"]));
        let previews = generator.generate(
            Path::new("/src/song.mp3"),
            Path::new("song.mp3"),
            MediaKind::Audio,
            &video_metadata(None),
        );
        assert_eq!(previews, Previews::default());
    }

    proptest! {
        #[test]
        fn timestamps_never_touch_boundaries(duration in 0.001f64..100_000.0, count in 1usize..12) {
            let timestamps = frame_timestamps(Some(duration), count);
            prop_assert_eq!(timestamps.len(), count);
            for t in &timestamps {
                prop_assert!(*t > 0.0 && *t < duration);
            }
            for pair in timestamps.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }
}
