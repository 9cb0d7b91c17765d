//! The external worker boundary.
//!
//! A worker receives an instruction payload and a path to write its CSV to.
//! Its exit status is informational only: the executor decides success by
//! looking at the file it left behind.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use research_core::Subject;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Environment variable carrying the output path to command workers.
pub const OUTPUT_PATH_ENV: &str = "RESEARCH_OUTPUT_PATH";

/// Capabilities granted to the research agent by default.
pub const DEFAULT_ALLOWED_TOOLS: &[&str] = &["WebFetch", "WebSearch", "Write", "Read"];

#[derive(Debug, Clone)]
pub struct WorkRequest {
    pub subject: Subject,
    pub instructions: String,
    /// Temp path the worker must write to. Never the canonical artifact path.
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerExit {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    pub stderr: String,
}

impl WorkerExit {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stderr: stderr.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for worker: {0}")]
    Wait(#[source] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// One invocation of the opaque external process.
///
/// Implementations must stop all work when the returned future is dropped;
/// the executor drops it on timeout and on cancellation.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn run(&self, request: &WorkRequest) -> Result<WorkerExit, WorkerError>;
}

/// Runs `<program> -p <instructions> --allowedTools <tools> [extra args]`.
#[derive(Debug, Clone)]
pub struct CommandWorker {
    program: PathBuf,
    allowed_tools: Vec<String>,
    extra_args: Vec<String>,
}

impl CommandWorker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            allowed_tools: DEFAULT_ALLOWED_TOOLS.iter().map(|t| t.to_string()).collect(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_allowed_tools(mut self, tools: Vec<String>) -> Self {
        self.allowed_tools = tools;
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    fn command(&self, request: &WorkRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-p")
            .arg(&request.instructions)
            .arg("--allowedTools")
            .arg(self.allowed_tools.join(","))
            .args(&self.extra_args)
            .env(OUTPUT_PATH_ENV, &request.output_path);
        cmd.kill_on_drop(true);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl Worker for CommandWorker {
    async fn run(&self, request: &WorkRequest) -> Result<WorkerExit, WorkerError> {
        debug!(
            subject = %request.subject,
            program = %self.program.display(),
            "Spawning worker"
        );

        let child = self.command(request).spawn().map_err(|e| WorkerError::Spawn {
            program: self.program.display().to_string(),
            source: e,
        })?;

        let output = child.wait_with_output().await.map_err(WorkerError::Wait)?;

        Ok(WorkerExit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
