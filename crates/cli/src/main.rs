mod config;
mod plan;
mod run;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use db::CatalogRepository;
use orchestrator::{
    ArtifactStore, CompletionOracle, OrchestratorError, SchedulerConfig, TaskEnumerator, Worker,
};
use research_core::{CatalogEntry, ProfileKind};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Overrides, RunConfig};
use crate::plan::{not_found_lines, RunPlan};
use crate::run::{resolve_worker, Mode, Runner};

/// Subjects listed by a dry run before the rest is elided.
const DRY_RUN_PREVIEW: usize = 30;

#[derive(Parser)]
#[command(name = "platform-research")]
#[command(about = "Research emulators and ROM sources for every catalog platform", long_about = None)]
#[command(version)]
struct Cli {
    /// Research profile: emulators or rom_sources
    #[arg(long)]
    profile: Option<ProfileKind>,

    /// Number of workers running at once
    #[arg(long)]
    parallel: Option<usize>,

    /// Print what would be processed without running any worker
    #[arg(long)]
    dry_run: bool,

    /// Process only this platform, even if it is already done or filtered out
    #[arg(long)]
    platform: Option<String>,

    /// Only rebuild the combined dataset from existing artifacts
    #[arg(long)]
    combine_only: bool,

    /// Skip platforms with fewer games than this
    #[arg(long, visible_alias = "min-games")]
    min_weight: Option<i64>,

    /// Process at most this many remaining platforms (0 = all)
    #[arg(long)]
    limit: Option<usize>,

    /// Per-platform worker timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Directory the profile's artifact folder is created in
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Path to the games catalog database
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Config file (defaults to ./research.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            profile: self.profile,
            catalog_path: self.catalog.clone(),
            output_dir: self.output_dir.clone(),
            parallelism: self.parallel,
            timeout_secs: self.timeout,
            min_weight: self.min_weight,
            limit: self.limit,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = RunConfig::load(cli.config.as_deref())
        .await?
        .apply(cli.overrides());
    let profile = config.research_profile();
    let store = ArtifactStore::for_profile(&config.output_base(), &profile);
    let mode = Mode::from_flags(cli.combine_only, cli.dry_run);
    let runner = Runner::new(
        store.clone(),
        profile,
        SchedulerConfig {
            parallelism: config.parallelism,
            inter_task_delay: config.inter_task_delay(),
        },
        config.timeout(),
    )
    .verbose(cli.verbose);

    tracing::debug!("Artifact store: {}", store.dir().display());

    if mode == Mode::CombineOnly {
        println!("Combining all CSV files...");
        runner.combine().await?;
        return Ok(());
    }

    if mode.needs_worker() {
        store
            .ensure_dir()
            .await
            .context("Failed to create artifact directory")?;
        store.purge_temp_files().await?;
    }

    let catalog_path = config.catalog_path()?;
    tracing::info!("Catalog: {}", catalog_path.display());
    let pool = db::open_catalog(&catalog_path)
        .await
        .context("Failed to open the games catalog")?;

    let enumerator = TaskEnumerator::new(CatalogRepository::new(pool), config.enumerator_config());
    let min_weight = enumerator.config().min_weight;
    let enumeration = enumerator.enumerate().await?;
    let (done, remaining) = CompletionOracle::new(&store)
        .partition(enumeration.eligible.clone())
        .await;

    let plan = match RunPlan::build(
        &enumeration,
        done.len(),
        remaining,
        cli.platform.as_deref(),
        config.limit,
        min_weight,
    ) {
        Ok(plan) => plan,
        Err(OrchestratorError::NotFound(name)) => {
            for line in not_found_lines(&name, &enumeration, min_weight) {
                println!("{}", line);
            }
            bail!("unknown platform {:?}", name);
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(note) = plan.note() {
        eprintln!("{}", note.yellow());
    }

    if mode == Mode::DryRun {
        // stdout carries only the subject list.
        eprintln!("{}", plan.status_line());
        print_dry_run(&plan.pending, cli.verbose);
        return Ok(());
    }

    println!("{}", plan.status_line());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{}", "Interrupted, stopping workers...".yellow());
                cancel.cancel();
            }
        });
    }

    let pending = plan.pending.into_iter().map(|e| e.subject).collect();
    runner
        .run(
            pending,
            || Ok(Arc::new(resolve_worker(&config.worker)?) as Arc<dyn Worker>),
            cancel,
        )
        .await?;
    Ok(())
}

fn print_dry_run(pending: &[CatalogEntry], verbose: bool) {
    for line in dry_run_lines(pending, verbose) {
        println!("{}", line);
    }
    if pending.len() > DRY_RUN_PREVIEW {
        eprintln!("... and {} more", pending.len() - DRY_RUN_PREVIEW);
    }
}

fn dry_run_lines(pending: &[CatalogEntry], verbose: bool) -> Vec<String> {
    pending
        .iter()
        .take(DRY_RUN_PREVIEW)
        .map(|entry| {
            if verbose {
                format!(
                    "{} ({} games) -> {}",
                    entry.subject,
                    entry.weight,
                    entry.subject.artifact_file_name()
                )
            } else {
                entry.subject.to_string()
            }
        })
        .collect()
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "platform_research=debug,orchestrator=debug,db=debug"
    } else {
        "platform_research=info,orchestrator=info,db=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::Subject;

    fn entry(name: &str, weight: i64) -> CatalogEntry {
        CatalogEntry::new(Subject::parse(name).unwrap(), weight)
    }

    #[test]
    fn test_dry_run_lists_one_subject_per_line() {
        let pending = vec![entry("B", 40)];
        assert_eq!(dry_run_lines(&pending, false), vec!["B"]);
        assert_eq!(
            dry_run_lines(&[entry("Sega CD", 120)], true),
            vec!["Sega CD (120 games) -> sega_cd.csv"]
        );
    }

    #[test]
    fn test_dry_run_preview_is_capped() {
        let pending: Vec<CatalogEntry> = (0..45).map(|i| entry(&format!("P{}", i), 10)).collect();
        assert_eq!(dry_run_lines(&pending, false).len(), DRY_RUN_PREVIEW);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "platform-research",
            "--profile",
            "emulators",
            "--parallel",
            "4",
            "--min-games",
            "25",
            "--dry-run",
        ])
        .unwrap();

        assert!(cli.dry_run);
        let overrides = cli.overrides();
        assert_eq!(overrides.profile, Some(ProfileKind::Emulators));
        assert_eq!(overrides.parallelism, Some(4));
        assert_eq!(overrides.min_weight, Some(25));
        assert_eq!(overrides.limit, None);
    }
}
