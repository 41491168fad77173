//! Media Indexer CLI
//!
//! Scans a volume and writes the media index plus its preview tree.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use media_indexer::{index_volume_with_system_tools, ScanConfig};

const ABOUT: &str = r#"
Media Indexer - scans a volume for images, videos and audio, generates
previews and writes a JSON index for the media viewer.

Examples:
  media_indexer scan -r /Volumes/USB                  index a volume into ./public
  media_indexer scan -r /Volumes/USB -o site/public   choose the output directory
  media_indexer scan -r /media --width 640 --frames 3 smaller previews, fewer frames
  media_indexer scan -r /media -t 4                   process 4 files at a time
"#;

/// Media volume indexer
#[derive(Parser)]
#[command(name = "media_indexer")]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a volume and write the index
    Scan {
        /// Volume to scan
        #[arg(short = 'r', long)]
        root: PathBuf,

        /// Output directory for the index and previews
        #[arg(short = 'o', long, default_value = "public")]
        output: PathBuf,

        /// Name of the previews directory inside the output directory
        #[arg(long, default_value = "thumbnails")]
        previews_dir: String,

        /// Index file name inside the output directory
        #[arg(long, default_value = "media_index.json")]
        index_file: String,

        /// Maximum preview width in pixels
        #[arg(long, default_value = "800")]
        width: u32,

        /// Frames captured per video
        #[arg(long, default_value = "5")]
        frames: usize,

        /// Files processed concurrently (0 = auto-detect)
        #[arg(short = 't', long, default_value = "1")]
        threads: usize,

        /// ffmpeg executable
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: String,

        /// ffprobe executable
        #[arg(long, default_value = "ffprobe")]
        ffprobe: String,

        /// Emit JSON progress lines on stderr
        #[arg(long)]
        progress_json: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Scan {
            root,
            output,
            previews_dir,
            index_file,
            width,
            frames,
            threads,
            ffmpeg,
            ffprobe,
            progress_json,
        }) => {
            let config = ScanConfig::builder()
                .root(root)
                .output_dir(output)
                .previews_dir(previews_dir)
                .index_file(index_file)
                .preview_width(width)
                .frame_count(frames)
                .workers(threads)
                .ffmpeg_bin(ffmpeg)
                .ffprobe_bin(ffprobe)
                .progress_json(progress_json)
                .build();

            info!("{}", "=".repeat(60));
            info!("Media Indexer");
            info!("{}", "=".repeat(60));
            info!("Output directory: {}", config.output_dir.display());
            info!("Previews directory: {}", config.previews_root().display());

            match index_volume_with_system_tools(&config) {
                Ok(document) => {
                    let stats = document.metadata.stats;
                    info!("{}", "=".repeat(60));
                    info!("SUCCESS! Generated {}", config.index_path().display());
                    info!("Total files: {}", document.metadata.total_files);
                    info!("  - Images: {}", stats.images);
                    info!("  - Videos: {}", stats.videos);
                    info!("  - Audio: {}", stats.audio);
                    info!("Previews stored in: {}", config.previews_root().display());
                    info!("{}", "=".repeat(60));
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
        None => {
            println!("{}", ABOUT);
            println!("Run 'media_indexer scan -h' for the scan options");
            ExitCode::SUCCESS
        }
    }
}
