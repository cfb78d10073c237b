//! Clipmix CLI: screen recording with a composited webcam overlay.
//!
//! Usage:
//!   clipmix presets             List quality presets and size estimates
//!   clipmix estimate            Estimate the data rate of one preset
//!   clipmix demo [OPTIONS]      Record synthetic feeds end to end
//!   clipmix record [OPTIONS]    Record the screen (needs the `gstreamer` feature)
//!   clipmix sources             List capturable sources
//!   clipmix config              Print or write the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clipmix_common::AppConfig;
use clipmix_media_model::{OverlayCorner, OverlayShape, QualityPreset};

mod commands;

#[derive(Parser)]
#[command(
    name = "clipmix",
    about = "Screen recording with a live webcam overlay",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the quality presets with their expected file sizes
    Presets {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Estimate the data rate of a preset
    Estimate {
        /// Quality preset: low, medium, or high
        #[arg(short, long, default_value = "medium")]
        quality: QualityPreset,

        /// Leave the audio track out of the estimate
        #[arg(long)]
        no_audio: bool,
    },

    /// Record synthetic screen and webcam feeds through the full pipeline
    Demo {
        /// Recording length in seconds
        #[arg(long, default_value = "3")]
        seconds: u64,

        /// Overlay a synthetic webcam
        #[arg(long)]
        webcam: bool,

        /// Record a synthetic microphone
        #[arg(long)]
        audio: bool,

        /// Quality preset: low, medium, or high
        #[arg(short, long)]
        quality: Option<QualityPreset>,

        /// Overlay shape: rectangle, rounded, or circle
        #[arg(long)]
        shape: Option<OverlayShape>,

        /// Overlay corner: top-left, top-right, bottom-left, or bottom-right
        #[arg(long)]
        corner: Option<OverlayCorner>,

        /// Also save one composited frame as PNG
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record the screen
    Record {
        /// Quality preset: low, medium, or high
        #[arg(short, long)]
        quality: Option<QualityPreset>,

        /// Disable microphone capture
        #[arg(long)]
        no_mic: bool,

        /// Overlay the default webcam
        #[arg(long)]
        webcam: bool,

        /// Source id from `clipmix sources`
        #[arg(long)]
        source: Option<String>,

        /// Seconds to count down before capture begins
        #[arg(long)]
        countdown: Option<u32>,

        /// Overlay shape: rectangle, rounded, or circle
        #[arg(long)]
        shape: Option<OverlayShape>,

        /// Overlay corner: top-left, top-right, bottom-left, or bottom-right
        #[arg(long)]
        corner: Option<OverlayCorner>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List capturable screens, windows, and cameras
    Sources,

    /// Print the effective configuration
    Config {
        /// Save it to the config file, creating one with defaults if needed
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    clipmix_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Presets { json } => commands::presets::run(json),
        Commands::Estimate { quality, no_audio } => commands::estimate::run(quality, !no_audio),
        Commands::Demo {
            seconds,
            webcam,
            audio,
            quality,
            shape,
            corner,
            snapshot,
            output,
        } => {
            let overlay = commands::OverlayArgs { shape, corner };
            commands::demo::run(
                &config,
                commands::demo::DemoArgs {
                    seconds,
                    webcam,
                    audio,
                    quality,
                    overlay,
                    snapshot,
                    output,
                },
            )
            .await
        }
        Commands::Record {
            quality,
            no_mic,
            webcam,
            source,
            countdown,
            shape,
            corner,
            output,
        } => {
            let overlay = commands::OverlayArgs { shape, corner };
            commands::record::run(
                &config,
                commands::record::RecordArgs {
                    quality,
                    mic: !no_mic,
                    webcam,
                    source,
                    countdown,
                    overlay,
                    output,
                },
            )
            .await
        }
        Commands::Sources => commands::sources::run().await,
        Commands::Config { write } => commands::config::run(&config, write),
    }
}
