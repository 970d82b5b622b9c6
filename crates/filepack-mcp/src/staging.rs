#![forbid(unsafe_code)]

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Owns a temporary intermediate file for the duration of one operation.
///
/// The file is removed on drop if it exists, so every exit path (success,
/// failure, unwind) releases it. Removal failures are logged, not raised;
/// there is nothing useful the operation could do with them at that point.
#[derive(Debug)]
pub struct StagedArtifact {
    path: PathBuf,
}

impl StagedArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if self.path.exists()
            && let Err(err) = fs::remove_file(&self.path)
        {
            warn!(path = %self.path.display(), %err, "failed to remove staged artifact");
        }
    }
}

/// Derives a staging path by appending `.{suffix}` to the output path.
///
/// Two concurrent invocations with the same output path would share this
/// temp path; callers targeting distinct outputs cannot collide.
pub fn staged_path(output: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = output.as_os_str().to_os_string();
    os.push(".");
    os.push(suffix);
    PathBuf::from(os)
}
