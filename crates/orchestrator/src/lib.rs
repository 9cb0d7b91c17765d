pub mod aggregator;
pub mod artifact;
pub mod enumerator;
pub mod error;
pub mod executor;
pub mod oracle;
pub mod prompts;
mod resources;
pub mod scheduler;
pub mod store;
pub mod worker;

pub use aggregator::{AggregateReport, Aggregator, SkippedArtifact};
pub use artifact::{validate_artifact, ArtifactRecords};
pub use enumerator::{Enumeration, EnumeratorConfig, Selection, SubjectCatalog, TaskEnumerator};
pub use error::{OrchestratorError, Result, TaskFailure, ValidationError};
pub use executor::{TaskOutcome, TaskReport, WorkerExecutor};
pub use oracle::CompletionOracle;
pub use prompts::ResearchPrompts;
pub use scheduler::{FailureNote, RunSummary, Scheduler, SchedulerConfig, SchedulerEvent};
pub use store::ArtifactStore;
pub use worker::{CommandWorker, WorkRequest, Worker, WorkerError, WorkerExit};
