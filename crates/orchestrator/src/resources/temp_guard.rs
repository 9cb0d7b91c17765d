//! RAII guard for a task's uncommitted output file.

use std::path::PathBuf;

use tracing::{debug, warn};

/// Deletes the temp file when dropped, unless the file was committed.
///
/// The executor's future can be dropped at any await point (timeout,
/// cancellation), so cleanup cannot rely on code after the await running.
///
/// # Example
///
/// ```ignore
/// let mut guard = TempFileGuard::new(store.temp_path(&subject));
/// // ... run worker, validate ...
/// store.commit(&subject).await?;
/// guard.mark_committed(); // otherwise Drop removes the temp file
/// ```
pub struct TempFileGuard {
    path: PathBuf,
    committed: bool,
}

impl TempFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(path = %path.display(), "Temp file guard created");
        Self {
            path,
            committed: false,
        }
    }

    /// The file has been renamed into place; nothing to clean up.
    pub fn mark_committed(&mut self) {
        self.committed = true;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed uncommitted temp file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove uncommitted temp file"
            ),
        }
    }
}
