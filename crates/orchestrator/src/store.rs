//! Filesystem-backed artifact store.
//!
//! One CSV file per subject lives at `<dir>/<filename_key>.csv`. Writers never
//! touch that path directly: they write to `<dir>/.<filename_key>.csv.tmp`
//! and the file is renamed into place only after it validates. A visible
//! canonical file therefore always holds a complete, validated artifact.

use std::path::{Path, PathBuf};

use research_core::domain::subject::ARTIFACT_EXTENSION;
use research_core::{ResearchProfile, Subject};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, Result};

/// Marks a file as uncommitted.
const TEMP_PREFIX: &str = ".";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    combined_file: String,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, combined_file: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            combined_file: combined_file.into(),
        }
    }

    /// Store rooted at `base` using the profile's directory and combined file name.
    pub fn for_profile(base: &Path, profile: &ResearchProfile) -> Self {
        Self::new(base.join(profile.output_dir), profile.combined_file)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn combined_file_name(&self) -> &str {
        &self.combined_file
    }

    pub fn combined_path(&self) -> PathBuf {
        self.dir.join(&self.combined_file)
    }

    /// Final location of a subject's artifact.
    pub fn canonical_path(&self, subject: &Subject) -> PathBuf {
        self.dir.join(subject.artifact_file_name())
    }

    /// Uncommitted location of a subject's artifact.
    pub fn temp_path(&self, subject: &Subject) -> PathBuf {
        self.dir.join(temp_name(&subject.artifact_file_name()))
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| OrchestratorError::store(&self.dir, e))
    }

    /// Whether a committed artifact exists for the subject.
    pub async fn contains(&self, subject: &Subject) -> bool {
        let path = self.canonical_path(subject);
        matches!(fs::metadata(&path).await, Ok(meta) if meta.is_file())
    }

    /// Move a validated temp file to the subject's canonical path.
    ///
    /// `rename` within one directory is atomic, so readers see either the
    /// previous state or the complete new artifact.
    pub async fn commit(&self, subject: &Subject) -> std::io::Result<PathBuf> {
        let temp = self.temp_path(subject);
        let path = self.canonical_path(subject);
        fs::rename(&temp, &path).await?;
        debug!(subject = %subject, path = %path.display(), "Committed artifact");
        Ok(path)
    }

    /// Remove the subject's temp file if present.
    pub async fn discard_temp(&self, subject: &Subject) {
        let temp = self.temp_path(subject);
        match fs::remove_file(&temp).await {
            Ok(()) => debug!(path = %temp.display(), "Removed temp file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %temp.display(), error = %e, "Failed to remove temp file"),
        }
    }

    /// Delete every file matching the temp marker. Returns how many were removed.
    pub async fn purge_temp_files(&self) -> Result<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(OrchestratorError::store(&self.dir, e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OrchestratorError::store(&self.dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !is_temp_name(name) {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Failed to purge temp file")
                }
            }
        }

        if removed > 0 {
            info!(dir = %self.dir.display(), removed, "Purged orphaned temp files");
        }
        Ok(removed)
    }

    /// Committed artifact files, sorted by name. Excludes the combined
    /// dataset and anything carrying the temp marker.
    pub async fn artifact_paths(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(OrchestratorError::store(&self.dir, e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OrchestratorError::store(&self.dir, e))?
        {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name == self.combined_file || name.starts_with(TEMP_PREFIX) {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// Write `content` to `file_name` inside the store via temp file + rename.
    pub async fn write_atomic(&self, file_name: &str, content: &[u8]) -> Result<PathBuf> {
        self.ensure_dir().await?;
        let path = self.dir.join(file_name);
        let temp_path = self.dir.join(temp_name(file_name));

        fs::write(&temp_path, content)
            .await
            .map_err(|e| OrchestratorError::store(&temp_path, e))?;

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(OrchestratorError::store(&path, e));
        }

        Ok(path)
    }
}

fn temp_name(file_name: &str) -> String {
    format!("{}{}{}", TEMP_PREFIX, file_name, TEMP_SUFFIX)
}

pub(crate) fn is_temp_name(name: &str) -> bool {
    name.len() > TEMP_PREFIX.len() + TEMP_SUFFIX.len()
        && name.starts_with(TEMP_PREFIX)
        && name.ends_with(TEMP_SUFFIX)
}
