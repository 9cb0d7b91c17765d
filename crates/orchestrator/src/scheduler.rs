//! Bounded worker pool.
//!
//! Keeps up to `parallelism` executors in flight and refills a slot as soon
//! as any task finishes. Dispatch follows the input order; completion order
//! is whatever the workers produce.

use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use research_core::Subject;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::TaskFailure;
use crate::executor::{preview, TaskOutcome, TaskReport, WorkerExecutor, DIAGNOSTIC_CHARS};

/// Pause between dispatches when running one task at a time.
pub const DEFAULT_INTER_TASK_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub parallelism: usize,
    /// Only applied when `parallelism == 1`.
    pub inter_task_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            parallelism: 1,
            inter_task_delay: DEFAULT_INTER_TASK_DELAY,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    Dispatched {
        subject: Subject,
        index: usize,
        total: usize,
    },
    Finished {
        completed: usize,
        total: usize,
        report: TaskReport,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNote {
    pub subject: Subject,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// In flight when the run was cancelled.
    pub interrupted: usize,
    /// Never dispatched because the run was cancelled.
    pub not_started: usize,
    pub cancelled: bool,
    pub failures: Vec<FailureNote>,
    pub purged_temp_files: usize,
}

impl RunSummary {
    fn record(&mut self, report: &TaskReport) {
        match &report.outcome {
            TaskOutcome::Committed { .. } => self.succeeded += 1,
            TaskOutcome::Failed(failure) => {
                self.failed += 1;
                self.failures.push(FailureNote {
                    subject: report.subject.clone(),
                    message: failure.to_string(),
                });
            }
            TaskOutcome::Cancelled => self.interrupted += 1,
        }
    }

    /// A task that ended without producing a report still counts as failed.
    fn record_lost(&mut self, subject: Subject, error: &JoinError) {
        self.failed += 1;
        self.failures.push(FailureNote {
            subject,
            message: format!(
                "Process error: worker task lost: {}",
                preview(&error.to_string(), DIAGNOSTIC_CHARS)
            ),
        });
    }
}

pub struct Scheduler {
    executor: Arc<WorkerExecutor>,
    config: SchedulerConfig,
    events: Option<UnboundedSender<SchedulerEvent>>,
}

impl Scheduler {
    pub fn new(executor: Arc<WorkerExecutor>, config: SchedulerConfig) -> Self {
        Self {
            executor,
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<SchedulerEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: SchedulerEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    }

    /// Run every subject once, or until `cancel` fires.
    ///
    /// Per-subject failures are collected into the summary and never stop
    /// the pool. After cancellation, in-flight workers are dropped (which
    /// kills their processes) and orphaned temp files are purged.
    pub async fn run(&self, subjects: Vec<Subject>, cancel: CancellationToken) -> RunSummary {
        let total = subjects.len();
        let parallelism = self.config.parallelism.max(1);
        let sequential = parallelism == 1;
        let mut queue: VecDeque<Subject> = subjects.into();
        let mut in_flight: JoinSet<TaskReport> = JoinSet::new();
        let mut running: HashMap<Id, Subject> = HashMap::new();
        let mut summary = RunSummary {
            total,
            ..Default::default()
        };
        let mut dispatched = 0;
        let mut completed = 0;

        info!(total, parallelism, "Starting research run");

        loop {
            while in_flight.len() < parallelism && !queue.is_empty() && !cancel.is_cancelled() {
                if sequential && dispatched > 0 && !self.config.inter_task_delay.is_zero() {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.inter_task_delay) => {}
                    }
                }
                let Some(subject) = queue.pop_front() else {
                    break;
                };

                dispatched += 1;
                self.emit(SchedulerEvent::Dispatched {
                    subject: subject.clone(),
                    index: dispatched,
                    total,
                });

                let executor = Arc::clone(&self.executor);
                let token = cancel.clone();
                let tracked = subject.clone();
                let handle = in_flight.spawn(async move {
                    let started = std::time::Instant::now();
                    let result = AssertUnwindSafe(executor.execute(&subject, &token))
                        .catch_unwind()
                        .await;
                    match result {
                        Ok(report) => report,
                        Err(panic) => TaskReport {
                            outcome: TaskOutcome::Failed(TaskFailure::ProcessError(format!(
                                "executor panicked: {}",
                                preview(&panic_message(panic.as_ref()), DIAGNOSTIC_CHARS)
                            ))),
                            subject,
                            elapsed: started.elapsed(),
                        },
                    }
                });
                running.insert(handle.id(), tracked);
            }

            let Some(joined) = in_flight.join_next_with_id().await else {
                break;
            };
            completed += 1;

            match joined {
                Ok((id, report)) => {
                    running.remove(&id);
                    summary.record(&report);
                    self.emit(SchedulerEvent::Finished {
                        completed,
                        total,
                        report,
                    });
                }
                Err(e) => {
                    error!(error = %e, "Worker task aborted");
                    match running.remove(&e.id()) {
                        Some(subject) => summary.record_lost(subject, &e),
                        None => summary.failed += 1,
                    }
                }
            }
        }

        summary.not_started = total - dispatched;
        summary.cancelled = cancel.is_cancelled();

        if summary.cancelled {
            warn!(
                interrupted = summary.interrupted,
                not_started = summary.not_started,
                "Run cancelled"
            );
            match self.executor.store().purge_temp_files().await {
                Ok(purged) => summary.purged_temp_files = purged,
                Err(e) => warn!(error = %e, "Temp file cleanup failed"),
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Research run finished"
        );

        summary
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_sequential() {
        let config = SchedulerConfig::default();
        assert_eq!(config.parallelism, 1);
        assert_eq!(config.inter_task_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_summary_records_outcomes() {
        let subject = Subject::parse("Atari 2600").unwrap();
        let mut summary = RunSummary::default();
        let report = |outcome| TaskReport {
            subject: subject.clone(),
            outcome,
            elapsed: Duration::ZERO,
        };

        summary.record(&report(TaskOutcome::Committed {
            records: 2,
            path: "atari_2600.csv".into(),
        }));
        summary.record(&report(TaskOutcome::Failed(TaskFailure::NoOutput(
            "worker exited with code 1".to_string(),
        ))));
        summary.record(&report(TaskOutcome::Cancelled));

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.interrupted, 1);
        assert_eq!(
            summary.failures[0].message,
            "No output file created: worker exited with code 1"
        );
    }

    #[tokio::test]
    async fn test_lost_task_is_reported() {
        let mut tasks = JoinSet::new();
        let handle = tasks.spawn(std::future::pending::<()>());
        handle.abort();
        let error = tasks.join_next().await.unwrap().unwrap_err();

        let mut summary = RunSummary::default();
        summary.record_lost(Subject::parse("Vectrex").unwrap(), &error);

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].subject.as_str(), "Vectrex");
        assert!(summary.failures[0]
            .message
            .starts_with("Process error: worker task lost:"));
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
