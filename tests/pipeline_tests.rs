// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the frame pipeline
//!
//! A scripted frame source drives the real recording controller and
//! broadcast hub; no camera or network is involved.

use bytes::Bytes;
use camera_relay::backends::camera::{Frame, FrameSource, PixelFormat, VideoFormat};
use camera_relay::errors::{CaptureError, EncodeError, RecordingError};
use camera_relay::media::AviSummary;
use camera_relay::media::encoders::FrameEncoder;
use camera_relay::pipelines::video::{
    AviSinkFactory, RecordingController, RecordingSink, RecordingSummary, SinkFactory,
};
use camera_relay::pipelines::{PipelineDriver, PipelineHandle, StepOutcome};
use camera_relay::server::hub::BroadcastHub;
use camera_relay::server::protocol::parse_command;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;

const WIDTH: u32 = 16;
const HEIGHT: u32 = 8;

fn format() -> VideoFormat {
    VideoFormat::new(WIDTH, HEIGHT, 30)
}

/// Yields `frames` frames, optionally a gap every few pulls, then ends
struct ScriptedSource {
    frames: u64,
    gap_every: Option<u64>,
    pulls: u64,
    sequence: u64,
}

impl ScriptedSource {
    fn new(frames: u64) -> Self {
        Self {
            frames,
            gap_every: None,
            pulls: 0,
            sequence: 0,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn format(&self) -> VideoFormat {
        format()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        self.pulls += 1;
        if let Some(every) = self.gap_every {
            if self.pulls % every == 0 {
                return Ok(None);
            }
        }
        if self.sequence >= self.frames {
            return Err(CaptureError::StreamEnded);
        }
        let data = vec![self.sequence as u8; (WIDTH * HEIGHT * 3) as usize];
        let frame = Frame::new(WIDTH, HEIGHT, PixelFormat::Rgb24, data, self.sequence);
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn name(&self) -> String {
        "scripted".into()
    }
}

/// Encodes a frame as its sequence number and counts calls
struct CountingEncoder {
    calls: Arc<AtomicUsize>,
}

impl FrameEncoder for CountingEncoder {
    fn encode(&mut self, frame: &Frame) -> Result<Bytes, EncodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::copy_from_slice(&frame.sequence.to_le_bytes()))
    }
}

fn sequence_of(bytes: &Bytes) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}

/// Sink that remembers the sequence numbers it was given
struct LoggingSink {
    path: PathBuf,
    written: Arc<Mutex<Vec<u64>>>,
    fail_at: Option<usize>,
}

impl RecordingSink for LoggingSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        let mut written = self.written.lock();
        if self.fail_at == Some(written.len()) {
            return Err(RecordingError::Write {
                path: self.path.clone(),
                reason: "device full".into(),
            });
        }
        written.push(frame.sequence);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<RecordingSummary, RecordingError> {
        Ok(RecordingSummary {
            frames: self.written.lock().len() as u32,
            path: self.path,
            duration: Duration::ZERO,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn frames_written(&self) -> u32 {
        self.written.lock().len() as u32
    }
}

struct LoggingFactory {
    written: Arc<Mutex<Vec<u64>>>,
    fail_at: Option<usize>,
}

impl SinkFactory for LoggingFactory {
    fn open(
        &self,
        path: &Path,
        _format: VideoFormat,
    ) -> Result<Box<dyn RecordingSink>, RecordingError> {
        Ok(Box::new(LoggingSink {
            path: path.to_path_buf(),
            written: Arc::clone(&self.written),
            fail_at: self.fail_at,
        }))
    }
}

/// Fails one `open` call and records which sinks get closed
struct FlakyFactory {
    inner: LoggingFactory,
    opens: AtomicUsize,
    /// Zero-based index of the `open` call that fails
    fail_on: usize,
    closed: Arc<Mutex<Vec<PathBuf>>>,
}

struct TrackedSink {
    inner: Box<dyn RecordingSink>,
    closed: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingSink for TrackedSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), RecordingError> {
        self.inner.write_frame(frame)
    }

    fn finish(self: Box<Self>) -> Result<RecordingSummary, RecordingError> {
        self.closed.lock().push(self.inner.path().to_path_buf());
        self.inner.finish()
    }

    fn path(&self) -> &Path {
        self.inner.path()
    }

    fn frames_written(&self) -> u32 {
        self.inner.frames_written()
    }
}

impl SinkFactory for FlakyFactory {
    fn open(
        &self,
        path: &Path,
        format: VideoFormat,
    ) -> Result<Box<dyn RecordingSink>, RecordingError> {
        if self.opens.fetch_add(1, Ordering::SeqCst) == self.fail_on {
            return Err(RecordingError::Open {
                path: path.to_path_buf(),
                reason: "permission denied".into(),
            });
        }
        Ok(Box::new(TrackedSink {
            inner: self.inner.open(path, format)?,
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct Rig {
    driver: PipelineDriver,
    controller: Arc<RecordingController>,
    hub: Arc<BroadcastHub>,
    encodes: Arc<AtomicUsize>,
}

fn rig(source: ScriptedSource, root: &Path, factory: Box<dyn SinkFactory>) -> Rig {
    let controller = Arc::new(RecordingController::new(
        root.to_path_buf(),
        format(),
        factory,
    ));
    let hub = Arc::new(BroadcastHub::new(32));
    let encodes = Arc::new(AtomicUsize::new(0));
    let driver = PipelineDriver::new(
        Box::new(source),
        Arc::clone(&controller),
        Arc::clone(&hub),
        Box::new(CountingEncoder {
            calls: Arc::clone(&encodes),
        }),
    );
    Rig {
        driver,
        controller,
        hub,
        encodes,
    }
}

fn apply(controller: &RecordingController, json: &str) {
    let command = parse_command(json).unwrap().unwrap();
    controller.apply(command).unwrap();
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn test_viewer_receives_every_frame_without_recording() {
    let dir = tempdir().unwrap();
    let mut rig = rig(
        ScriptedSource::new(10),
        dir.path(),
        Box::new(AviSinkFactory::new(90)),
    );
    let mut viewer = rig.hub.join();

    for _ in 0..10 {
        rig.driver.step().unwrap();
    }

    let received: Vec<u64> = std::iter::from_fn(|| viewer.try_recv().ok())
        .map(|bytes| sequence_of(&bytes))
        .collect();
    assert_eq!(received, (0..10).collect::<Vec<_>>());
    assert_eq!(entries(dir.path()), 0, "No file should be created");
}

#[test]
fn test_full_recording_writes_exactly_the_frames_in_between() {
    if !AviSinkFactory::is_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let mut rig = rig(
        ScriptedSource::new(20),
        dir.path(),
        Box::new(AviSinkFactory::new(90)),
    );

    rig.driver.step().unwrap();
    apply(
        &rig.controller,
        r#"{"action":"START","folderName":"session1","mode":"FULL"}"#,
    );
    for _ in 0..5 {
        rig.driver.step().unwrap();
    }
    apply(&rig.controller, r#"{"action":"STOP"}"#);
    rig.driver.step().unwrap();

    let path = dir.path().join("session1/recording_realsense.avi");
    let summary = AviSummary::read(&path).unwrap();
    assert_eq!(summary.header_frames, 5);
    assert_eq!(summary.video_chunks, 5);
    assert_eq!((summary.width, summary.height), (WIDTH, HEIGHT));
    assert!(!rig.controller.is_recording());
    assert_eq!(entries(&dir.path().join("session1")), 1);
}

#[test]
fn test_second_start_closes_first_segment() {
    if !AviSinkFactory::is_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let mut rig = rig(
        ScriptedSource::new(20),
        dir.path(),
        Box::new(AviSinkFactory::new(90)),
    );

    apply(
        &rig.controller,
        r#"{"action":"START","folderName":"s","mode":"SEGMENT","fileName":"a.avi"}"#,
    );
    apply(
        &rig.controller,
        r#"{"action":"START","folderName":"s","mode":"SEGMENT","fileName":"b.avi"}"#,
    );
    for _ in 0..3 {
        rig.driver.step().unwrap();
    }
    rig.controller.shutdown();

    let a = AviSummary::read(&dir.path().join("s/a.avi")).unwrap();
    let b = AviSummary::read(&dir.path().join("s/b.avi")).unwrap();
    assert_eq!(a.header_frames, 0);
    assert_eq!(b.header_frames, 3);
}

#[test]
fn test_no_viewers_means_no_encoding() {
    let dir = tempdir().unwrap();
    let mut rig = rig(
        ScriptedSource::new(10),
        dir.path(),
        Box::new(AviSinkFactory::new(90)),
    );

    for _ in 0..5 {
        assert!(matches!(
            rig.driver.step().unwrap(),
            StepOutcome::Processed { delivered: 0, .. }
        ));
    }
    assert_eq!(rig.encodes.load(Ordering::SeqCst), 0);

    let _viewer = rig.hub.join();
    rig.driver.step().unwrap();
    assert_eq!(rig.encodes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_recorded_frames_keep_source_order() {
    let dir = tempdir().unwrap();
    let written = Arc::new(Mutex::new(Vec::new()));
    let mut rig = rig(
        ScriptedSource::new(50),
        dir.path(),
        Box::new(LoggingFactory {
            written: Arc::clone(&written),
            fail_at: None,
        }),
    );

    rig.controller
        .apply(parse_command(r#"{"action":"START","folderName":"o"}"#).unwrap().unwrap())
        .unwrap();

    // Viewers come and go while recording
    for i in 0..50 {
        let viewer = rig.hub.join();
        rig.driver.step().unwrap();
        if i % 2 == 0 {
            drop(viewer);
        } else {
            viewer.leave();
        }
    }

    assert_eq!(*written.lock(), (0..50).collect::<Vec<u64>>());
}

#[test]
fn test_disconnect_only_affects_that_viewer() {
    let dir = tempdir().unwrap();
    let mut rig = rig(
        ScriptedSource::new(10),
        dir.path(),
        Box::new(AviSinkFactory::new(90)),
    );
    let mut stays = rig.hub.join();
    let leaves = rig.hub.join();

    rig.driver.step().unwrap();
    drop(leaves);
    assert_eq!(rig.hub.viewer_count(), 1);

    for _ in 0..4 {
        assert!(matches!(
            rig.driver.step().unwrap(),
            StepOutcome::Processed { delivered: 1, .. }
        ));
    }
    let received = std::iter::from_fn(|| stays.try_recv().ok()).count();
    assert_eq!(received, 5);
}

#[test]
fn test_unwritable_root_keeps_controller_idle() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("blocked");
    std::fs::write(&root, b"a file, not a directory").unwrap();

    let mut rig = rig(
        ScriptedSource::new(10),
        &root,
        Box::new(AviSinkFactory::new(90)),
    );
    let mut viewer = rig.hub.join();

    let command = parse_command(r#"{"action":"START","folderName":"x","mode":"FULL"}"#)
        .unwrap()
        .unwrap();
    assert!(matches!(
        rig.controller.apply(command),
        Err(RecordingError::Open { .. })
    ));
    assert!(!rig.controller.is_recording());

    rig.driver.step().unwrap();
    assert!(viewer.try_recv().is_ok(), "Broadcast must be unaffected");
}

#[test]
fn test_failed_reopen_closes_previous_and_stays_idle() {
    let dir = tempdir().unwrap();
    let written = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(Mutex::new(Vec::new()));
    let mut rig = rig(
        ScriptedSource::new(10),
        dir.path(),
        Box::new(FlakyFactory {
            inner: LoggingFactory {
                written: Arc::clone(&written),
                fail_at: None,
            },
            opens: AtomicUsize::new(0),
            fail_on: 1,
            closed: Arc::clone(&closed),
        }),
    );
    let mut viewer = rig.hub.join();

    apply(
        &rig.controller,
        r#"{"action":"START","folderName":"s","mode":"SEGMENT","fileName":"a.avi"}"#,
    );
    for _ in 0..3 {
        rig.driver.step().unwrap();
    }

    let second = parse_command(
        r#"{"action":"START","folderName":"s","mode":"SEGMENT","fileName":"b.avi"}"#,
    )
    .unwrap()
    .unwrap();
    assert!(matches!(
        rig.controller.apply(second),
        Err(RecordingError::Open { .. })
    ));

    assert_eq!(*closed.lock(), vec![dir.path().join("s/a.avi")]);
    assert!(!rig.controller.is_recording());

    // Frames after the failed START are broadcast but not recorded
    for _ in 0..2 {
        rig.driver.step().unwrap();
    }
    assert_eq!(*written.lock(), vec![0, 1, 2]);
    assert_eq!(rig.driver.stats().recorded, 3);
    assert_eq!(std::iter::from_fn(|| viewer.try_recv().ok()).count(), 5);
}

#[test]
fn test_write_failure_returns_to_idle_and_pipeline_continues() {
    let dir = tempdir().unwrap();
    let written = Arc::new(Mutex::new(Vec::new()));
    let mut rig = rig(
        ScriptedSource::new(10),
        dir.path(),
        Box::new(LoggingFactory {
            written: Arc::clone(&written),
            fail_at: Some(2),
        }),
    );
    let mut viewer = rig.hub.join();

    apply(&rig.controller, r#"{"action":"START","folderName":"f"}"#);
    for _ in 0..5 {
        rig.driver.step().unwrap();
    }

    assert!(!rig.controller.is_recording());
    assert_eq!(*written.lock(), vec![0, 1]);
    assert_eq!(rig.driver.stats().recorded, 2);
    assert_eq!(std::iter::from_fn(|| viewer.try_recv().ok()).count(), 5);
}

#[test]
fn test_missing_frames_are_skipped() {
    let dir = tempdir().unwrap();
    let mut source = ScriptedSource::new(10);
    source.gap_every = Some(3);
    let mut rig = rig(source, dir.path(), Box::new(AviSinkFactory::new(90)));

    let outcomes: Vec<StepOutcome> = (0..6).map(|_| rig.driver.step().unwrap()).collect();
    assert_eq!(outcomes[2], StepOutcome::Skipped);
    assert_eq!(outcomes[5], StepOutcome::Skipped);

    let stats = rig.driver.stats();
    assert_eq!(stats.frames, 4);
    assert_eq!(stats.skipped, 2);
}

#[test]
fn test_source_failure_ends_spawned_pipeline() {
    let dir = tempdir().unwrap();
    let rig = rig(
        ScriptedSource::new(3),
        dir.path(),
        Box::new(AviSinkFactory::new(90)),
    );

    let (mut handle, exit) = PipelineHandle::spawn(rig.driver).unwrap();
    let result = exit.blocking_recv().unwrap();
    assert!(matches!(result, Err(CaptureError::StreamEnded)));
    handle.stop();
    assert!(!handle.is_running());
}
