//! Executes a plan. Every normal run ends with a combine pass.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use orchestrator::{
    AggregateReport, Aggregator, ArtifactStore, CommandWorker, RunSummary, Scheduler,
    SchedulerConfig, SchedulerEvent, TaskReport, Worker, WorkerExecutor,
};
use research_core::{ResearchProfile, Subject};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    CombineOnly,
    DryRun,
    Execute,
}

impl Mode {
    pub fn from_flags(combine_only: bool, dry_run: bool) -> Self {
        if combine_only {
            Self::CombineOnly
        } else if dry_run {
            Self::DryRun
        } else {
            Self::Execute
        }
    }

    /// Whether this mode may launch workers.
    pub fn needs_worker(self) -> bool {
        self == Self::Execute
    }
}

/// Locate the worker program on `PATH`.
pub fn resolve_worker(config: &WorkerConfig) -> Result<CommandWorker> {
    let program = which::which(&config.program)
        .with_context(|| format!("Worker program {:?} not found on PATH", config.program))?;
    Ok(CommandWorker::new(program)
        .with_allowed_tools(config.allowed_tools.clone())
        .with_extra_args(config.extra_args.clone()))
}

#[derive(Debug)]
pub struct RunOutcome {
    /// `None` when nothing was pending.
    pub summary: Option<RunSummary>,
    pub combined: AggregateReport,
}

pub struct Runner {
    store: ArtifactStore,
    profile: ResearchProfile,
    scheduler: SchedulerConfig,
    timeout: Duration,
    verbose: bool,
}

impl Runner {
    pub fn new(
        store: ArtifactStore,
        profile: ResearchProfile,
        scheduler: SchedulerConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            profile,
            scheduler,
            timeout,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Process `pending`, then rebuild the combined dataset. The worker is
    /// only resolved when there is something to do; the combine also runs
    /// when nothing was pending or the run was cancelled.
    pub async fn run<F>(
        &self,
        pending: Vec<Subject>,
        worker: F,
        cancel: CancellationToken,
    ) -> Result<RunOutcome>
    where
        F: FnOnce() -> Result<Arc<dyn Worker>>,
    {
        let summary = if pending.is_empty() {
            println!("{}", "All platforms processed!".green());
            None
        } else {
            let summary = self.schedule(worker()?, pending, cancel).await;
            print_summary(&summary);
            Some(summary)
        };

        let combined = self.combine().await?;
        Ok(RunOutcome { summary, combined })
    }

    async fn schedule(
        &self,
        worker: Arc<dyn Worker>,
        pending: Vec<Subject>,
        cancel: CancellationToken,
    ) -> RunSummary {
        let executor = WorkerExecutor::new(self.store.clone(), self.profile, worker)
            .with_timeout(self.timeout);

        println!(
            "\nProcessing {} platforms with {} worker(s)...\n",
            pending.len(),
            self.scheduler.parallelism.max(1)
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_progress(rx, self.verbose));

        let summary = Scheduler::new(Arc::new(executor), self.scheduler.clone())
            .with_events(tx)
            .run(pending, cancel)
            .await;

        // The scheduler owned the sender, so the printer drains and exits.
        let _ = printer.await;
        summary
    }

    pub async fn combine(&self) -> Result<AggregateReport> {
        let report = Aggregator::new(&self.store, self.profile.schema)
            .combine()
            .await
            .context("Failed to write the combined dataset")?;

        for skipped in &report.skipped {
            println!(
                "  {} skipped {}: {}",
                "!".yellow(),
                skipped.path.display(),
                skipped.reason
            );
        }
        println!(
            "Combined {} entries from {} files into {}",
            report.rows,
            report.files_read,
            report.output.display()
        );
        Ok(report)
    }
}

async fn print_progress(mut rx: mpsc::UnboundedReceiver<SchedulerEvent>, verbose: bool) {
    while let Some(event) = rx.recv().await {
        match event {
            SchedulerEvent::Dispatched {
                subject,
                index,
                total,
            } => {
                if verbose {
                    println!("{}", format!("  started [{}/{}] {}", index, total, subject).dimmed());
                }
            }
            SchedulerEvent::Finished {
                completed,
                total,
                report,
            } => println!("[{}/{}] {}: {}", completed, total, report.subject, render(&report)),
        }
    }
}

fn render(report: &TaskReport) -> colored::ColoredString {
    if report.is_success() {
        report.message().green()
    } else if report.is_cancelled() {
        report.message().yellow()
    } else {
        report.message().red()
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "════════════════════════════════════════".dimmed());
    println!(
        "Done: {} succeeded, {} failed",
        summary.succeeded.to_string().green(),
        summary.failed.to_string().red()
    );
    if summary.cancelled {
        println!(
            "{}",
            format!(
                "Cancelled: {} interrupted, {} not started, {} temp files removed",
                summary.interrupted, summary.not_started, summary.purged_temp_files
            )
            .yellow()
        );
    }
    if !summary.failures.is_empty() {
        println!();
        println!("Failures (will be retried on the next run):");
        for failure in &summary.failures {
            println!("  {} {}: {}", "✗".red(), failure.subject, failure.message);
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use orchestrator::{WorkRequest, WorkerError, WorkerExit};
    use research_core::ProfileKind;
    use tempfile::TempDir;

    /// Writes two rows for "Amiga"; any other subject cancels the run and
    /// never finishes.
    struct CancellingWorker {
        profile: ResearchProfile,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl Worker for CancellingWorker {
        async fn run(&self, request: &WorkRequest) -> Result<WorkerExit, WorkerError> {
            if request.subject.as_str() == "Amiga" {
                let csv = format!(
                    "{}\nAmiga,FS-UAE,,,,,,,,,\nAmiga,WinUAE,,,,,,,,,\n",
                    self.profile.schema.header_line()
                );
                tokio::fs::write(&request.output_path, csv).await.unwrap();
                return Ok(WorkerExit::success());
            }
            self.cancel.cancel();
            std::future::pending().await
        }
    }

    fn setup() -> (Runner, ArtifactStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let profile = *ProfileKind::Emulators.profile();
        let store = ArtifactStore::for_profile(temp_dir.path(), &profile);
        let runner = Runner::new(
            store.clone(),
            profile,
            SchedulerConfig {
                parallelism: 1,
                inter_task_delay: Duration::ZERO,
            },
            Duration::from_secs(5),
        );
        (runner, store, temp_dir)
    }

    fn subjects(names: &[&str]) -> Vec<Subject> {
        names.iter().map(|n| Subject::parse(*n).unwrap()).collect()
    }

    #[test]
    fn test_only_execute_mode_needs_worker() {
        assert_eq!(Mode::from_flags(true, true), Mode::CombineOnly);
        assert_eq!(Mode::from_flags(false, true), Mode::DryRun);
        assert!(!Mode::from_flags(true, false).needs_worker());
        assert!(!Mode::from_flags(false, true).needs_worker());
        assert!(Mode::from_flags(false, false).needs_worker());
    }

    #[test]
    fn test_missing_worker_program_is_an_error() {
        let config = WorkerConfig {
            program: "platform-research-no-such-worker".to_string(),
            ..Default::default()
        };
        let err = resolve_worker(&config).unwrap_err();
        assert!(err.to_string().contains("not found on PATH"));
    }

    #[tokio::test]
    async fn test_nothing_pending_still_combines() {
        let (runner, store, _temp_dir) = setup();

        let outcome = runner
            .run(
                Vec::new(),
                || bail!("worker must not be resolved"),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(outcome.summary.is_none());
        assert_eq!(outcome.combined.rows, 0);
        assert!(store.combined_path().exists());
    }

    #[tokio::test]
    async fn test_cancelled_run_refreshes_combined_dataset() {
        let (runner, store, _temp_dir) = setup();
        store.ensure_dir().await.unwrap();
        tokio::fs::write(store.combined_path(), "stale\n").await.unwrap();

        let cancel = CancellationToken::new();
        let worker: Arc<dyn Worker> = Arc::new(CancellingWorker {
            profile: *ProfileKind::Emulators.profile(),
            cancel: cancel.clone(),
        });

        let outcome = runner
            .run(subjects(&["Amiga", "Vectrex", "ZX Spectrum"]), || Ok(worker), cancel)
            .await
            .unwrap();

        let summary = outcome.summary.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.interrupted, 1);
        assert_eq!(summary.not_started, 1);

        assert_eq!(outcome.combined.rows, 2);
        let combined = tokio::fs::read_to_string(store.combined_path()).await.unwrap();
        let lines: Vec<&str> = combined.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Amiga,FS-UAE"));
        assert!(lines[2].starts_with("Amiga,WinUAE"));
        assert!(!store.dir().join(".vectrex.csv.tmp").exists());
    }
}
