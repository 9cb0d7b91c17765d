//! Task enumeration: turns the external catalog into the ordered sequence of
//! eligible subjects.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use db::CatalogRepository;
use research_core::{CatalogEntry, ResearchProfile};
use tracing::debug;

use crate::error::{OrchestratorError, Result};

/// Source of `(subject, weight)` pairs.
#[async_trait]
pub trait SubjectCatalog: Send + Sync {
    async fn entries(&self) -> Result<Vec<CatalogEntry>>;
}

#[async_trait]
impl SubjectCatalog for CatalogRepository {
    async fn entries(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.subjects_with_weight().await?)
    }
}

/// A fixed, in-memory catalog.
#[async_trait]
impl SubjectCatalog for Vec<CatalogEntry> {
    async fn entries(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnumeratorConfig {
    /// Subject identifiers excluded unconditionally.
    pub skip: BTreeSet<String>,
    /// Entries with a lower weight are not eligible.
    pub min_weight: i64,
    /// File names no subject may map to (e.g. the combined dataset).
    pub reserved_files: Vec<String>,
}

impl EnumeratorConfig {
    pub fn for_profile(profile: &ResearchProfile) -> Self {
        Self {
            skip: profile.skip.iter().map(|s| s.to_string()).collect(),
            min_weight: profile.min_weight,
            reserved_files: vec![profile.combined_file.to_string()],
        }
    }
}

/// How a single explicitly named subject was selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The subject passes the skip-set and min-weight filters.
    Eligible(CatalogEntry),
    /// The subject is normally filtered out but was explicitly requested.
    Forced(CatalogEntry),
}

impl Selection {
    pub fn entry(&self) -> &CatalogEntry {
        match self {
            Self::Eligible(entry) | Self::Forced(entry) => entry,
        }
    }

    pub fn is_forced(&self) -> bool {
        matches!(self, Self::Forced(_))
    }
}

/// Snapshot of the catalog after filtering.
#[derive(Debug, Clone)]
pub struct Enumeration {
    /// Every catalog entry, ascending by identifier.
    pub all: Vec<CatalogEntry>,
    /// Entries passing both filters, in the same order.
    pub eligible: Vec<CatalogEntry>,
    /// Entries removed by the skip-set.
    pub skipped: usize,
    /// Entries removed by the min-weight threshold (not counting skipped ones).
    pub below_min_weight: usize,
    reserved_files: Vec<String>,
}

impl Enumeration {
    /// Select one explicitly named subject, bypassing the filters if needed.
    /// A forced subject must not share a key with an eligible one.
    pub fn select(&self, name: &str) -> Result<Selection> {
        if let Some(entry) = self.eligible.iter().find(|e| e.subject.as_str() == name) {
            return Ok(Selection::Eligible(entry.clone()));
        }
        let entry = self
            .all
            .iter()
            .find(|e| e.subject.as_str() == name)
            .ok_or_else(|| OrchestratorError::NotFound(name.to_string()))?;

        check_keys(self.eligible.iter().chain([entry]), &self.reserved_files)?;
        Ok(Selection::Forced(entry.clone()))
    }
}

/// Every subject must map to its own artifact file, and none may map to a
/// reserved one.
fn check_keys<'a>(
    entries: impl IntoIterator<Item = &'a CatalogEntry>,
    reserved_files: &[String],
) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for entry in entries {
        let file = entry.subject.artifact_file_name();
        if reserved_files.iter().any(|r| *r == file) {
            return Err(OrchestratorError::ReservedKey {
                subject: entry.subject.to_string(),
                file,
            });
        }
        if let Some(first) = seen.insert(entry.subject.filename_key(), entry.subject.as_str()) {
            return Err(OrchestratorError::KeyCollision {
                first: first.to_string(),
                second: entry.subject.to_string(),
                key: entry.subject.filename_key(),
            });
        }
    }
    Ok(())
}

pub struct TaskEnumerator<C> {
    catalog: C,
    config: EnumeratorConfig,
}

impl<C: SubjectCatalog> TaskEnumerator<C> {
    pub fn new(catalog: C, config: EnumeratorConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &EnumeratorConfig {
        &self.config
    }

    /// Load the catalog, sort it by identifier, apply the filters, and check
    /// that every eligible subject has a distinct artifact key. Entries the
    /// filters remove are only checked when selected explicitly.
    pub async fn enumerate(&self) -> Result<Enumeration> {
        let mut all = self.catalog.entries().await?;
        all.sort_by(|a, b| a.subject.cmp(&b.subject));
        all.dedup_by(|a, b| a.subject == b.subject);

        let mut eligible = Vec::with_capacity(all.len());
        let mut skipped = 0;
        let mut below_min_weight = 0;
        for entry in &all {
            if self.config.skip.contains(entry.subject.as_str()) {
                skipped += 1;
            } else if entry.weight < self.config.min_weight {
                below_min_weight += 1;
            } else {
                eligible.push(entry.clone());
            }
        }

        check_keys(&eligible, &self.config.reserved_files)?;

        debug!(
            total = all.len(),
            eligible = eligible.len(),
            skipped,
            below_min_weight,
            "Enumerated catalog"
        );

        Ok(Enumeration {
            all,
            eligible,
            skipped,
            below_min_weight,
            reserved_files: self.config.reserved_files.clone(),
        })
    }
}
