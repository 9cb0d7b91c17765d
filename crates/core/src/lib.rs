pub mod domain;
mod error;

pub use domain::profile::{ArtifactSchema, ProfileKind, ResearchProfile};
pub use domain::subject::{CatalogEntry, Subject};
pub use error::*;
