// SPDX-License-Identifier: GPL-3.0-only

//! Recording target resolution
//!
//! Control messages name a folder and (in segment mode) a file relative to
//! the upload root. Both may contain `/`-separated sub-directories, but the
//! resolved path must never leave the root.

use super::controller::RecordingMode;
use crate::constants::recording::FULL_MODE_FILE_NAME;
use crate::errors::RecordingError;
use std::path::{Component, Path, PathBuf};

/// Resolve `<root>/<folder>/<file>` for a recording request
///
/// # Arguments
/// * `root` - Upload root directory
/// * `folder` - Client supplied folder, may be empty
/// * `mode` - Full mode uses the fixed file name, segment mode its own
///
/// # Returns
/// * `Ok(PathBuf)` - Target file path under `root`
/// * `Err(RecordingError::InvalidPath)` - Absolute path, `..` or empty file name
pub fn resolve_target(
    root: &Path,
    folder: &str,
    mode: &RecordingMode,
) -> Result<PathBuf, RecordingError> {
    let file = match mode {
        RecordingMode::Full => FULL_MODE_FILE_NAME,
        RecordingMode::Segment { file } => file.as_str(),
    };

    let folder = relative_part(folder, "folder")?;
    let file = relative_part(file, "file name")?;
    if file.as_os_str().is_empty() {
        return Err(RecordingError::InvalidPath("empty file name".into()));
    }

    Ok(root.join(folder).join(file))
}

/// Keep only normal components, rejecting anything that could escape
fn relative_part(raw: &str, what: &str) -> Result<PathBuf, RecordingError> {
    let mut clean = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(RecordingError::InvalidPath(format!(
                    "{} {:?} contains '..'",
                    what, raw
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(RecordingError::InvalidPath(format!(
                    "{} {:?} must be relative",
                    what, raw
                )));
            }
        }
    }
    Ok(clean)
}
