// SPDX-License-Identifier: GPL-3.0-only

//! Motion-JPEG AVI inspection
//!
//! Recordings are muxed by GStreamer's `avimux`; this module only walks the
//! resulting RIFF tree to report what a file contains:
//!
//! ```text
//! RIFF 'AVI '
//! ├── LIST 'hdrl'
//! │   ├── avih            main header (total frames, size)
//! │   └── LIST 'strl'
//! │       ├── strh 'vids' 'MJPG'
//! │       └── strf
//! ├── LIST 'movi'
//! │   ├── 00dc <jpeg>
//! │   └── ...
//! └── idx1                one entry per chunk
//! ```
//!
//! Unknown chunks (`JUNK`, OpenDML `indx`/`ix00`, `LIST 'odml'`) are skipped.

use crate::errors::RecordingError;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const VIDEO_CHUNK_ID: &[u8; 4] = b"00dc";
const AVIH_LEN: u32 = 56;

/// What a written AVI file contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AviSummary {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    /// Frame count recorded in the main header
    pub header_frames: u32,
    /// `00dc` chunks actually present in the movi list
    pub video_chunks: u32,
    /// Entries in the idx1 index
    pub index_entries: u32,
    /// File size in bytes
    pub file_size: u64,
}

impl AviSummary {
    /// Walk the RIFF tree of `path`
    pub fn read(path: &Path) -> Result<Self, RecordingError> {
        let malformed = |msg: String| RecordingError::Malformed(format!("{}: {}", path.display(), msg));

        let file = File::open(path).map_err(|e| malformed(e.to_string()))?;
        let file_size = file.metadata().map_err(|e| malformed(e.to_string()))?.len();
        let mut reader = BufReader::new(file);

        let mut riff = [0u8; 12];
        reader
            .read_exact(&mut riff)
            .map_err(|_| malformed("shorter than a RIFF header".into()))?;
        if &riff[0..4] != b"RIFF" || &riff[8..12] != b"AVI " {
            return Err(malformed("missing RIFF/AVI signature".into()));
        }

        // An unfinished file has a zero RIFF size; fall back to the file length
        let declared = le_u32(&riff[4..8]) as u64 + 8;
        let end = if declared > 12 { declared.min(file_size) } else { file_size };

        let mut summary = AviSummary {
            width: 0,
            height: 0,
            framerate: 0,
            header_frames: 0,
            video_chunks: 0,
            index_entries: 0,
            file_size,
        };

        let mut position = 12u64;
        while position + 8 <= end {
            let mut header = [0u8; 8];
            if reader.read_exact(&mut header).is_err() {
                break;
            }
            let id = [header[0], header[1], header[2], header[3]];
            let size = le_u32(&header[4..8]) as u64;
            position += 8;

            if &id == b"LIST" {
                // Descend into every list; only the 4-byte list type is consumed
                let mut list_type = [0u8; 4];
                reader
                    .read_exact(&mut list_type)
                    .map_err(|_| malformed("truncated LIST".into()))?;
                position += 4;
                continue;
            }

            let padded = size + (size & 1);
            match &id {
                b"avih" if size >= AVIH_LEN as u64 => {
                    let body = read_body(&mut reader, size).map_err(|e| malformed(e.to_string()))?;
                    summary.header_frames = le_u32(&body[16..20]);
                    summary.width = le_u32(&body[32..36]);
                    summary.height = le_u32(&body[36..40]);
                    let micros = le_u32(&body[0..4]);
                    if micros > 0 && summary.framerate == 0 {
                        summary.framerate = (1_000_000f64 / micros as f64).round() as u32;
                    }
                    skip(&mut reader, padded - size).map_err(|e| malformed(e.to_string()))?;
                }
                b"strh" if size >= 32 => {
                    let body = read_body(&mut reader, size).map_err(|e| malformed(e.to_string()))?;
                    let scale = le_u32(&body[20..24]);
                    let rate = le_u32(&body[24..28]);
                    if scale > 0 {
                        summary.framerate = rate / scale;
                    }
                    skip(&mut reader, padded - size).map_err(|e| malformed(e.to_string()))?;
                }
                b"idx1" => {
                    summary.index_entries = (size / 16) as u32;
                    skip(&mut reader, padded).map_err(|e| malformed(e.to_string()))?;
                }
                _ => {
                    if &id == VIDEO_CHUNK_ID {
                        summary.video_chunks += 1;
                    }
                    skip(&mut reader, padded).map_err(|e| malformed(e.to_string()))?;
                }
            }
            position += padded;
        }

        Ok(summary)
    }
}

impl std::fmt::Display for AviSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} @ {}fps, {} frames ({} chunks, {} indexed), {} bytes",
            self.width,
            self.height,
            self.framerate,
            self.header_frames,
            self.video_chunks,
            self.index_entries,
            self.file_size
        )
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_body<R: Read>(reader: &mut R, size: u64) -> io::Result<Vec<u8>> {
    let mut body = vec![0u8; size as usize];
    reader.read_exact(&mut body)?;
    Ok(body)
}

fn skip<R: Seek>(reader: &mut R, bytes: u64) -> io::Result<()> {
    if bytes > 0 {
        reader.seek(SeekFrom::Current(bytes as i64))?;
    }
    Ok(())
}
