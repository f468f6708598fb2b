// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Serving the relay
//! - Recording without a server
//! - Inspecting recordings
//! - Listing frame sources

use camera_relay::backends::camera::{available_sources, open_source};
use camera_relay::config::Config;
use camera_relay::errors::{AppError, AppResult};
use camera_relay::media::AviSummary;
use camera_relay::media::encoders::JpegFrameEncoder;
use camera_relay::pipelines::video::{
    AviSinkFactory, Command, CommandOutcome, RecordingController, RecordingMode,
};
use camera_relay::pipelines::{PipelineDriver, PipelineHandle};
use camera_relay::server::{BroadcastHub, RelayServer};
use chrono::Local;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};

fn build_controller(config: &Config) -> AppResult<Arc<RecordingController>> {
    std::fs::create_dir_all(&config.upload_root)?;
    if !AviSinkFactory::is_available() {
        warn!("GStreamer recording elements missing, START commands will fail");
    }
    Ok(Arc::new(RecordingController::new(
        config.upload_root.clone(),
        config.video_format(),
        Box::new(AviSinkFactory::new(config.recording_quality)),
    )))
}

/// Run the relay until Ctrl+C or a frame source failure
pub fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve_async(config))
}

async fn serve_async(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let format = config.video_format();
    let controller = build_controller(&config)?;
    let hub = Arc::new(BroadcastHub::new(config.viewer_buffer));

    let source = open_source(&config.source, format)?;
    info!(source = %source.name(), upload_root = %config.upload_root.display(), "Frame source ready");

    let server = RelayServer::bind(
        config.listen_addr()?,
        Arc::clone(&hub),
        Arc::clone(&controller),
    )
    .await?;

    let driver = PipelineDriver::new(
        source,
        Arc::clone(&controller),
        Arc::clone(&hub),
        Box::new(JpegFrameEncoder::new(config.jpeg_quality)),
    );
    let (mut pipeline, pipeline_exit) = PipelineHandle::spawn(driver)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_task = tokio::spawn(server.run(shutdown_rx));

    let outcome: Result<(), Box<dyn std::error::Error>> = tokio::select! {
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                info!("Ctrl+C received, shutting down");
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        exit = pipeline_exit => match exit {
            Ok(Ok(stats)) => {
                info!(frames = stats.frames, "Pipeline finished");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "Frame source failed");
                Err(e.into())
            }
            Err(_) => Err(AppError::Server("pipeline thread exited without reporting".into()).into()),
        },
    };

    // Receivers may already be gone
    let _ = shutdown_tx.send(true);
    if let Err(e) = server_task.await {
        warn!(error = %e, "Server task failed");
    }

    let teardown = tokio::task::spawn_blocking(move || {
        pipeline.stop();
        controller.shutdown();
    });
    if let Err(e) = teardown.await {
        warn!(error = %e, "Shutdown task failed");
    }

    outcome
}

/// Record straight from the frame source
pub fn record(
    config: Config,
    folder: Option<String>,
    file: Option<String>,
    duration: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = config.video_format();
    let controller = build_controller(&config)?;
    let source = open_source(&config.source, format)?;
    println!("Using source: {}", source.name());

    let folder = folder.unwrap_or_else(|| Local::now().format("%Y%m%d_%H%M%S").to_string());
    let mode = match file {
        Some(file) => RecordingMode::Segment { file },
        None => RecordingMode::Full,
    };

    let CommandOutcome::Started { path, .. } =
        controller.apply(Command::Start { folder, mode })?
    else {
        return Err("recording did not start".into());
    };

    println!("Output: {}", path.display());
    println!("Duration: {} seconds", duration);

    // No viewers, so nothing is ever encoded for the feed
    let hub = Arc::new(BroadcastHub::new(1));
    let mut driver = PipelineDriver::new(
        source,
        Arc::clone(&controller),
        hub,
        Box::new(JpegFrameEncoder::new(config.jpeg_quality)),
    );

    println!();
    println!("Recording... (press Ctrl+C to stop early)");

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let start = Instant::now();
    let target_duration = Duration::from_secs(duration);
    let mut last_progress = 0;

    while start.elapsed() < target_duration {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }

        if let Err(e) = driver.step() {
            controller.shutdown();
            return Err(e.into());
        }
        if !controller.is_recording() {
            return Err("recording stopped after a write failure".into());
        }

        let elapsed = start.elapsed().as_secs();
        if elapsed != last_progress {
            last_progress = elapsed;
            print!("\rRecording: {:02}:{:02}", elapsed / 60, elapsed % 60);
            std::io::Write::flush(&mut std::io::stdout())?;
        }
    }
    println!();

    match controller.stop()? {
        Some(summary) => println!(
            "Video saved: {} ({} frames in {:.1}s)",
            summary.path.display(),
            summary.frames,
            summary.duration.as_secs_f64()
        ),
        None => return Err("recording was not active".into()),
    }

    Ok(())
}

/// Print the contents of a recorded file
pub fn inspect(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let summary = AviSummary::read(path)?;
    println!("{}", path.display());
    println!("  Size:       {}x{}", summary.width, summary.height);
    println!("  Frame rate: {} fps", summary.framerate);
    println!(
        "  Frames:     {} (header), {} (chunks), {} (index)",
        summary.header_frames, summary.video_chunks, summary.index_entries
    );
    println!("  File size:  {} bytes", summary.file_size);

    if summary.header_frames != summary.video_chunks {
        println!("  Warning: header frame count does not match the data, file may be unfinished");
    }
    Ok(())
}

/// List all usable frame sources
pub fn list_sources() -> Result<(), Box<dyn std::error::Error>> {
    println!("Available frame sources:");
    println!();
    for (index, source) in available_sources().iter().enumerate() {
        println!("  [{}] {}", index, source);
    }
    Ok(())
}
