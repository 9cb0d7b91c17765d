//! Completion oracle.
//!
//! A subject is done exactly when its canonical artifact file exists. The
//! store only ever renames validated files into canonical paths, so existence
//! implies validity and there is nothing else to consult.

use research_core::{CatalogEntry, Subject};

use crate::store::ArtifactStore;

#[derive(Debug, Clone, Copy)]
pub struct CompletionOracle<'a> {
    store: &'a ArtifactStore,
}

impl<'a> CompletionOracle<'a> {
    pub fn new(store: &'a ArtifactStore) -> Self {
        Self { store }
    }

    pub async fn is_done(&self, subject: &Subject) -> bool {
        self.store.contains(subject).await
    }

    /// Split entries into (done, pending), preserving input order in both.
    pub async fn partition(
        &self,
        entries: Vec<CatalogEntry>,
    ) -> (Vec<CatalogEntry>, Vec<CatalogEntry>) {
        let mut done = Vec::new();
        let mut pending = Vec::new();
        for entry in entries {
            if self.is_done(&entry.subject).await {
                done.push(entry);
            } else {
                pending.push(entry);
            }
        }
        (done, pending)
    }
}
