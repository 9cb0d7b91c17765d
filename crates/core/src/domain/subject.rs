use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Extension of every artifact file in the store.
pub const ARTIFACT_EXTENSION: &str = "csv";

fn non_alphanumeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex"))
}

/// One independently processable unit of work, e.g. a platform name.
///
/// The identifier is immutable once enumerated. Its filename key is derived
/// on demand and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subject(String);

impl Subject {
    /// Accepts any name whose filename key is non-empty.
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if slugify(&name).is_empty() {
            return Err(CoreError::InvalidSubject(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase slug with every non-alphanumeric run collapsed to `_` and
    /// leading/trailing separators trimmed.
    pub fn filename_key(&self) -> String {
        slugify(&self.0)
    }

    /// `<filename_key>.csv`
    pub fn artifact_file_name(&self) -> String {
        format!("{}.{}", self.filename_key(), ARTIFACT_EXTENSION)
    }
}

fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    non_alphanumeric()
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Subject {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.0
    }
}

/// A catalog row: a subject together with its weight (e.g. item count).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub subject: Subject,
    pub weight: i64,
}

impl CatalogEntry {
    pub fn new(subject: Subject, weight: i64) -> Self {
        Self { subject, weight }
    }
}
