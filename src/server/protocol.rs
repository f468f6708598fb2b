// SPDX-License-Identifier: GPL-3.0-only

//! Control protocol
//!
//! Clients send JSON text messages:
//!
//! ```json
//! {"action": "START", "folderName": "session1", "mode": "FULL"}
//! {"action": "START", "folderName": "s", "mode": "SEGMENT", "fileName": "a.avi"}
//! {"action": "STOP"}
//! {"action": "STATUS"}
//! ```
//!
//! A successful START or STOP is silent: viewers treat every message as a
//! frame, so the only text the server sends is a `STATUS` answer or an
//! `ERROR` for a command that failed, and only to the connection that sent
//! it. Binary messages in either direction are frames only.

use crate::errors::{ProtocolError, RecordingError};
use crate::pipelines::video::{Command, CommandOutcome, RecordingMode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
enum ControlMessage {
    #[serde(rename_all = "camelCase")]
    Start {
        folder_name: Option<String>,
        mode: Option<String>,
        file_name: Option<String>,
    },
    Stop,
    Status,
    #[serde(other)]
    Unknown,
}

/// Parse one control message
///
/// # Returns
/// * `Ok(Some(command))` - A command to dispatch
/// * `Ok(None)` - Well-formed but unknown action, ignored
/// * `Err(ProtocolError)` - Malformed message
pub fn parse_command(text: &str) -> Result<Option<Command>, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    if !value.get("action").is_some_and(Value::is_string) {
        return Err(ProtocolError::MissingAction);
    }

    let command = match serde_json::from_value::<ControlMessage>(value)? {
        ControlMessage::Start {
            folder_name,
            mode,
            file_name,
        } => {
            let folder = folder_name.ok_or(ProtocolError::MissingFolder)?;
            let mode = match mode.as_deref() {
                None | Some("FULL") => RecordingMode::Full,
                Some("SEGMENT") => match file_name {
                    Some(file) if !file.trim().is_empty() => RecordingMode::Segment { file },
                    _ => return Err(ProtocolError::MissingFileName),
                },
                Some(other) => return Err(ProtocolError::UnknownMode(other.to_string())),
            };
            Command::Start { folder, mode }
        }
        ControlMessage::Stop => Command::Stop,
        ControlMessage::Status => Command::Status,
        ControlMessage::Unknown => return Ok(None),
    };

    Ok(Some(command))
}

/// Reply sent to the connection that issued a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    Status {
        recording: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        frames: u32,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Reply for a successful command, if it warrants one
    ///
    /// Paths are shown relative to `root`.
    pub fn from_outcome(outcome: &CommandOutcome, root: &Path) -> Option<Self> {
        match outcome {
            CommandOutcome::Started { .. } | CommandOutcome::Stopped(_) => None,
            CommandOutcome::Status(status) => Some(ServerEvent::Status {
                recording: status.recording,
                path: status.path.as_deref().map(|p| display_relative(p, root)),
                frames: status.frames,
            }),
        }
    }

    pub fn error(err: &RecordingError) -> Self {
        ServerEvent::Error {
            message: err.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::video::{RecordingStatus, RecordingSummary};
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_parse_start_full() {
        let cmd = parse_command(r#"{"action":"START","folderName":"session1","mode":"FULL"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            cmd,
            Command::Start {
                folder: "session1".into(),
                mode: RecordingMode::Full
            }
        );
    }

    #[test]
    fn test_mode_defaults_to_full() {
        let cmd = parse_command(r#"{"action":"START","folderName":"x"}"#)
            .unwrap()
            .unwrap();
        assert!(matches!(
            cmd,
            Command::Start {
                mode: RecordingMode::Full,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_segment() {
        let cmd = parse_command(
            r#"{"action":"START","folderName":"s","mode":"SEGMENT","fileName":"q1/a.avi"}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            cmd,
            Command::Start {
                folder: "s".into(),
                mode: RecordingMode::Segment {
                    file: "q1/a.avi".into()
                }
            }
        );
    }

    #[test]
    fn test_stop_and_status() {
        assert_eq!(
            parse_command(r#"{"action":"STOP"}"#).unwrap(),
            Some(Command::Stop)
        );
        assert_eq!(
            parse_command(r#"{"action":"STOP","extra":1}"#).unwrap(),
            Some(Command::Stop)
        );
        assert_eq!(
            parse_command(r#"{"action":"STATUS"}"#).unwrap(),
            Some(Command::Status)
        );
    }

    #[test]
    fn test_unknown_action_ignored() {
        assert_eq!(parse_command(r#"{"action":"DANCE"}"#).unwrap(), None);
    }

    #[test]
    fn test_malformed_messages() {
        assert!(matches!(parse_command("not json"), Err(ProtocolError::Json(_))));
        assert!(matches!(
            parse_command(r#"{"folderName":"x"}"#),
            Err(ProtocolError::MissingAction)
        ));
        assert!(matches!(
            parse_command(r#"{"action":"START","mode":"FULL"}"#),
            Err(ProtocolError::MissingFolder)
        ));
        assert!(matches!(
            parse_command(r#"{"action":"START","folderName":"s","mode":"SEGMENT"}"#),
            Err(ProtocolError::MissingFileName)
        ));
        assert!(matches!(
            parse_command(r#"{"action":"START","folderName":"s","mode":"SEGMENT","fileName":" "}"#),
            Err(ProtocolError::MissingFileName)
        ));
        assert!(matches!(
            parse_command(r#"{"action":"START","folderName":"s","mode":"LOOP"}"#),
            Err(ProtocolError::UnknownMode(m)) if m == "LOOP"
        ));
    }

    #[test]
    fn test_start_and_stop_are_silent() {
        let root = Path::new("/up");
        let started = CommandOutcome::Started {
            path: PathBuf::from("/up/s/a.avi"),
            replaced: None,
        };
        assert_eq!(ServerEvent::from_outcome(&started, root), None);

        let stopped = CommandOutcome::Stopped(Some(RecordingSummary {
            path: PathBuf::from("/up/s/a.avi"),
            frames: 5,
            duration: Duration::from_millis(250),
        }));
        assert_eq!(ServerEvent::from_outcome(&stopped, root), None);
        assert_eq!(
            ServerEvent::from_outcome(&CommandOutcome::Stopped(None), root),
            None
        );
    }

    #[test]
    fn test_event_json_shape() {
        let root = Path::new("/up");
        let recording = ServerEvent::from_outcome(
            &CommandOutcome::Status(RecordingStatus {
                recording: true,
                path: Some(PathBuf::from("/up/s/a.avi")),
                frames: 12,
            }),
            root,
        )
        .unwrap();
        assert_eq!(
            recording.to_json().unwrap(),
            r#"{"event":"STATUS","recording":true,"path":"s/a.avi","frames":12}"#
        );

        let idle = ServerEvent::from_outcome(
            &CommandOutcome::Status(RecordingStatus {
                recording: false,
                path: None,
                frames: 0,
            }),
            root,
        )
        .unwrap();
        assert_eq!(
            idle.to_json().unwrap(),
            r#"{"event":"STATUS","recording":false,"frames":0}"#
        );

        let error = ServerEvent::error(&RecordingError::InvalidPath("../x".into()));
        assert_eq!(
            error.to_json().unwrap(),
            r#"{"event":"ERROR","message":"Invalid recording path: ../x"}"#
        );
    }
}
