// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic frame source
//!
//! Scrolling colour bars paced at the configured framerate. Lets the relay
//! run, and be tested, without a camera attached.

use super::types::{Frame, PixelFormat, VideoFormat};
use super::FrameSource;
use crate::errors::CaptureError;
use std::time::Instant;

const BARS: [[u8; 3]; 8] = [
    [255, 255, 255],
    [255, 255, 0],
    [0, 255, 255],
    [0, 255, 0],
    [255, 0, 255],
    [255, 0, 0],
    [0, 0, 255],
    [0, 0, 0],
];

pub struct TestPatternSource {
    format: VideoFormat,
    sequence: u64,
    next_deadline: Option<Instant>,
    paced: bool,
}

impl TestPatternSource {
    /// Create a source paced at the format's framerate
    pub fn new(format: VideoFormat) -> Self {
        Self {
            format,
            sequence: 0,
            next_deadline: None,
            paced: true,
        }
    }

    /// Create a source that yields frames as fast as they are pulled
    pub fn unpaced(format: VideoFormat) -> Self {
        Self {
            paced: false,
            ..Self::new(format)
        }
    }

    fn render(&self) -> Vec<u8> {
        let width = self.format.width as usize;
        let height = self.format.height as usize;
        let bar_width = (width / BARS.len()).max(1);
        let offset = self.sequence as usize;

        let mut row = Vec::with_capacity(width * 3);
        for x in 0..width {
            let bar = ((x + offset) / bar_width) % BARS.len();
            row.extend_from_slice(&BARS[bar]);
        }

        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..height {
            data.extend_from_slice(&row);
        }
        data
    }

    fn wait_for_tick(&mut self) {
        let interval = self.format.frame_interval();
        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now);

        if deadline > now {
            std::thread::sleep(deadline - now);
        }

        // Fall behind by more than a frame and the schedule restarts from now
        let next = deadline + interval;
        self.next_deadline = Some(if next + interval < Instant::now() {
            Instant::now() + interval
        } else {
            next
        });
    }
}

impl FrameSource for TestPatternSource {
    fn format(&self) -> VideoFormat {
        self.format
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.paced {
            self.wait_for_tick();
        }

        let frame = Frame::new(
            self.format.width,
            self.format.height,
            PixelFormat::Rgb24,
            self.render(),
            self.sequence,
        );
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn name(&self) -> String {
        format!("test pattern {}", self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_sequenced_and_sized() {
        let mut source = TestPatternSource::unpaced(VideoFormat::new(16, 8, 30));
        for expected in 0..3 {
            let frame = source.next_frame().unwrap().unwrap();
            assert_eq!(frame.sequence, expected);
            assert_eq!(frame.format, PixelFormat::Rgb24);
            assert!(frame.is_well_formed());
        }
    }

    #[test]
    fn test_pattern_scrolls() {
        let mut source = TestPatternSource::unpaced(VideoFormat::new(16, 2, 30));
        let first = source.next_frame().unwrap().unwrap();
        let second = source.next_frame().unwrap().unwrap();
        assert_ne!(&first.data[..], &second.data[..]);
    }

    #[test]
    fn test_paced_source_respects_framerate() {
        let format = VideoFormat::new(8, 8, 100);
        let mut source = TestPatternSource::new(format);
        let start = Instant::now();
        for _ in 0..5 {
            source.next_frame().unwrap();
        }
        // The first frame is immediate, the following four wait one interval each
        assert!(start.elapsed() >= format.frame_interval() * 4);
    }
}
