//! Runs the worker for one subject and commits its output.
//!
//! Per call: one worker invocation, and at most one artifact committed. Every
//! path that does not commit leaves the store exactly as it found it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use research_core::{ResearchProfile, Subject};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::artifact::validate_artifact;
use crate::error::TaskFailure;
use crate::prompts::ResearchPrompts;
use crate::resources::TempFileGuard;
use crate::store::ArtifactStore;
use crate::worker::{WorkRequest, Worker, WorkerExit};

/// Longest worker stderr excerpt carried in a failure message.
pub const DIAGNOSTIC_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Committed { records: usize, path: PathBuf },
    Failed(TaskFailure),
    /// Interrupted by the operator. Not a failure.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub subject: Subject,
    pub outcome: TaskOutcome,
    pub elapsed: Duration,
}

impl TaskReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Committed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Cancelled)
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        match &self.outcome {
            TaskOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// One-line operator message.
    pub fn message(&self) -> String {
        match &self.outcome {
            TaskOutcome::Committed { records, .. } => format!(
                "Created {} ({} records)",
                self.subject.artifact_file_name(),
                records
            ),
            TaskOutcome::Failed(failure) => format!("Failed: {}", failure),
            TaskOutcome::Cancelled => "Cancelled".to_string(),
        }
    }
}

pub struct WorkerExecutor {
    store: ArtifactStore,
    profile: ResearchProfile,
    worker: Arc<dyn Worker>,
    timeout: Duration,
}

impl WorkerExecutor {
    pub fn new(store: ArtifactStore, profile: ResearchProfile, worker: Arc<dyn Worker>) -> Self {
        Self {
            store,
            timeout: profile.timeout(),
            profile,
            worker,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn execute(&self, subject: &Subject, cancel: &CancellationToken) -> TaskReport {
        let started = Instant::now();
        let outcome = self.run(subject, cancel).await;
        let report = TaskReport {
            subject: subject.clone(),
            outcome,
            elapsed: started.elapsed(),
        };

        match &report.outcome {
            TaskOutcome::Committed { records, path } => info!(
                subject = %subject,
                records,
                path = %path.display(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Artifact committed"
            ),
            TaskOutcome::Failed(failure) => warn!(
                subject = %subject,
                kind = failure.kind(),
                error = %failure,
                "Subject failed, it stays pending"
            ),
            TaskOutcome::Cancelled => debug!(subject = %subject, "Subject cancelled"),
        }

        report
    }

    async fn run(&self, subject: &Subject, cancel: &CancellationToken) -> TaskOutcome {
        if let Err(e) = self.store.ensure_dir().await {
            return TaskOutcome::Failed(TaskFailure::ProcessError(e.to_string()));
        }

        // Left over from an earlier interrupted attempt.
        self.store.discard_temp(subject).await;

        let temp_path = self.store.temp_path(subject);
        let mut guard = TempFileGuard::new(&temp_path);
        let request = WorkRequest {
            subject: subject.clone(),
            instructions: ResearchPrompts::build(&self.profile, subject, &temp_path),
            output_path: temp_path.clone(),
        };

        let exit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TaskOutcome::Cancelled,
            result = tokio::time::timeout(self.timeout, self.worker.run(&request)) => match result {
                Err(_) => return TaskOutcome::Failed(TaskFailure::Timeout(self.timeout)),
                Ok(Err(e)) => return TaskOutcome::Failed(TaskFailure::ProcessError(e.to_string())),
                Ok(Ok(exit)) => exit,
            },
        };

        debug!(subject = %subject, code = ?exit.code, "Worker exited");

        let bytes = match tokio::fs::read(&temp_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return TaskOutcome::Failed(TaskFailure::NoOutput(no_output_detail(&exit)));
            }
            Err(e) => {
                return TaskOutcome::Failed(TaskFailure::ProcessError(format!(
                    "Failed to read {}: {}",
                    temp_path.display(),
                    e
                )));
            }
        };

        let records = match validate_artifact(&bytes, &self.profile.schema) {
            Ok(records) => records.rows.len(),
            Err(e) => return TaskOutcome::Failed(TaskFailure::ValidationFailed(e)),
        };

        match self.store.commit(subject).await {
            Ok(path) => {
                guard.mark_committed();
                TaskOutcome::Committed { records, path }
            }
            Err(e) => TaskOutcome::Failed(TaskFailure::CommitFailed(e.to_string())),
        }
    }
}

fn no_output_detail(exit: &WorkerExit) -> String {
    let stderr = exit.stderr.trim();
    if !stderr.is_empty() {
        return preview(stderr, DIAGNOSTIC_CHARS);
    }
    match exit.code {
        Some(code) => format!("worker exited with code {}", code),
        None => "worker terminated by signal".to_string(),
    }
}

/// First `max` characters of `text`, with an ellipsis when cut.
pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("short", 200), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("ééééé", 2), "éé...");
    }

    #[test]
    fn test_no_output_detail() {
        assert_eq!(
            no_output_detail(&WorkerExit::failed(1, "  rate limited \n")),
            "rate limited"
        );
        assert_eq!(
            no_output_detail(&WorkerExit::success()),
            "worker exited with code 0"
        );
        let long = "x".repeat(500);
        assert_eq!(
            no_output_detail(&WorkerExit::failed(1, long)).len(),
            DIAGNOSTIC_CHARS + 3
        );
    }

    #[test]
    fn test_report_messages() {
        let subject = Subject::parse("Sega Saturn").unwrap();
        let ok = TaskReport {
            subject: subject.clone(),
            outcome: TaskOutcome::Committed {
                records: 4,
                path: PathBuf::from("rom_sources/sega_saturn.csv"),
            },
            elapsed: Duration::from_secs(1),
        };
        assert!(ok.is_success());
        assert_eq!(ok.message(), "Created sega_saturn.csv (4 records)");

        let failed = TaskReport {
            subject,
            outcome: TaskOutcome::Failed(TaskFailure::Timeout(Duration::from_secs(600))),
            elapsed: Duration::from_secs(600),
        };
        assert!(!failed.is_success());
        assert_eq!(failed.message(), "Failed: Timeout after 600s");
    }
}
