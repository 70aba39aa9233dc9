//! Discovery of run files in a readout directory.

use crate::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name prefix written by the S-bit readout.
pub const RUN_FILE_PREFIX: &str = "sbitReadOut_run";
/// File name extension of run files.
pub const RUN_FILE_EXTENSION: &str = "dat";

/// Returns true if `name` looks like `sbitReadOut_run*.dat`.
#[must_use]
pub fn is_run_file(name: &str) -> bool {
    name.strip_prefix(RUN_FILE_PREFIX)
        .and_then(|rest| rest.strip_suffix(RUN_FILE_EXTENSION))
        .is_some_and(|rest| rest.ends_with('.'))
}

/// Scanner for run files in a directory.
pub struct RunScanner;

impl RunScanner {
    /// Lists the run files directly inside `dir`, sorted by name.
    ///
    /// Subdirectories are not searched.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read.
    pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if name.to_str().is_some_and(is_run_file) {
                files.push(entry.path());
            }
        }
        files.sort();
        info!(dir = %dir.display(), files = files.len(), "run files discovered");
        Ok(files)
    }
}
