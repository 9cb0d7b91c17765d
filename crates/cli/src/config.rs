use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use orchestrator::worker::DEFAULT_ALLOWED_TOOLS;
use orchestrator::EnumeratorConfig;
use research_core::{ProfileKind, ResearchProfile};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "research.toml";
const DEFAULT_CATALOG: &str = "lunchbox/games.db";
const DEFAULT_WORKER: &str = "claude";
const DEFAULT_INTER_TASK_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub profile: ProfileKind,
    /// Subject catalog database. Defaults to `<data dir>/lunchbox/games.db`.
    pub catalog_path: Option<PathBuf>,
    /// Artifact store. Defaults to the profile's directory under the cwd.
    pub output_dir: Option<PathBuf>,
    pub parallelism: usize,
    pub timeout_secs: Option<u64>,
    pub min_weight: Option<i64>,
    pub skip: Option<Vec<String>>,
    /// 0 means no limit.
    pub limit: usize,
    pub inter_task_delay_ms: u64,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub program: String,
    pub allowed_tools: Vec<String>,
    pub extra_args: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            profile: ProfileKind::default(),
            catalog_path: None,
            output_dir: None,
            parallelism: 1,
            timeout_secs: None,
            min_weight: None,
            skip: None,
            limit: 0,
            inter_task_delay_ms: DEFAULT_INTER_TASK_DELAY_MS,
            worker: WorkerConfig::default(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_WORKER.to_string(),
            allowed_tools: DEFAULT_ALLOWED_TOOLS.iter().map(|t| t.to_string()).collect(),
            extra_args: Vec::new(),
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub profile: Option<ProfileKind>,
    pub catalog_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub parallelism: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub min_weight: Option<i64>,
    pub limit: Option<usize>,
}

impl RunConfig {
    /// Read `path`, or `research.toml` in the working directory when no path
    /// is given. Only the implicit file may be absent.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(CONFIG_FILE), false),
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(profile) = overrides.profile {
            self.profile = profile;
        }
        if let Some(path) = overrides.catalog_path {
            self.catalog_path = Some(path);
        }
        if let Some(dir) = overrides.output_dir {
            self.output_dir = Some(dir);
        }
        if let Some(parallelism) = overrides.parallelism {
            self.parallelism = parallelism;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout_secs = Some(secs);
        }
        if let Some(weight) = overrides.min_weight {
            self.min_weight = Some(weight);
        }
        if let Some(limit) = overrides.limit {
            self.limit = limit;
        }
        self
    }

    pub fn research_profile(&self) -> ResearchProfile {
        *self.profile.profile()
    }

    pub fn catalog_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.catalog_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir().context("Could not determine the user data directory")?;
        Ok(data_dir.join(DEFAULT_CATALOG))
    }

    /// Parent of the artifact store; the profile's directory is joined to it.
    pub fn output_base(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.research_profile().timeout())
    }

    pub fn inter_task_delay(&self) -> Duration {
        Duration::from_millis(self.inter_task_delay_ms)
    }

    pub fn enumerator_config(&self) -> EnumeratorConfig {
        let mut config = EnumeratorConfig::for_profile(&self.research_profile());
        if let Some(weight) = self.min_weight {
            config.min_weight = weight;
        }
        if let Some(skip) = &self.skip {
            config.skip = skip.iter().cloned().collect();
        }
        config
    }
}
