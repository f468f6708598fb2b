// SPDX-License-Identifier: GPL-3.0-only

use camera_relay::config::{Config, SourceKind};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-relay")]
#[command(about = "Relay a live camera feed to WebSocket viewers and record it on command")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Settings that override the config file
#[derive(Args)]
struct Overrides {
    /// JSON config file (missing fields use defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Listen port
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Listen address
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Directory recordings are written under
    #[arg(long, global = true)]
    upload_root: Option<PathBuf>,

    /// Capture and recording frame rate
    #[arg(long, global = true)]
    fps: Option<u32>,

    /// Frame width
    #[arg(long, global = true)]
    width: Option<u32>,

    /// Frame height
    #[arg(long, global = true)]
    height: Option<u32>,

    /// Frame source: "test" or a V4L2 device path such as /dev/video0
    #[arg(long, global = true)]
    source: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server (default)
    Serve,

    /// Record from the frame source without serving
    Record {
        /// Folder under the upload root (default: current timestamp)
        #[arg(short, long)]
        folder: Option<String>,

        /// File name inside the folder (default: the full-session name)
        #[arg(long)]
        file: Option<String>,

        /// Recording duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,
    },

    /// Print what a recorded AVI file contains
    Inspect {
        /// AVI file to read
        file: PathBuf,
    },

    /// List available frame sources
    List,
}

impl Overrides {
    fn resolve(&self) -> Result<Config, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = &self.bind {
            config.bind_address = bind.clone();
        }
        if let Some(root) = &self.upload_root {
            config.upload_root = root.clone();
        }
        if let Some(fps) = self.fps {
            config.framerate = fps;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(source) = &self.source {
            config.source = SourceKind::from_arg(source);
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("camera_relay=info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::List) => cli::list_sources(),
        Some(Commands::Inspect { file }) => cli::inspect(&file),
        Some(Commands::Record {
            folder,
            file,
            duration,
        }) => cli::record(cli.overrides.resolve()?, folder, file, duration),
        Some(Commands::Serve) | None => cli::serve(cli.overrides.resolve()?),
    }
}
