//! Picks the subjects a run will process.

use orchestrator::{Enumeration, OrchestratorError, Selection};
use research_core::CatalogEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    /// Every remaining eligible subject, capped by `--limit`.
    Remaining,
    /// One named subject that passes the filters.
    Explicit,
    /// One named subject the filters would have removed.
    Forced,
}

#[derive(Debug, Clone)]
pub struct RunPlan {
    pub kind: PlanKind,
    pub pending: Vec<CatalogEntry>,
    pub eligible: usize,
    pub skipped: usize,
    pub below_min_weight: usize,
    pub min_weight: i64,
    pub done: usize,
}

impl RunPlan {
    /// `remaining` is the eligible set minus committed subjects. A named
    /// `platform` replaces it and ignores `limit`; `limit == 0` means all.
    pub fn build(
        enumeration: &Enumeration,
        done: usize,
        remaining: Vec<CatalogEntry>,
        platform: Option<&str>,
        limit: usize,
        min_weight: i64,
    ) -> Result<Self, OrchestratorError> {
        let (kind, pending) = match platform {
            Some(name) => match enumeration.select(name)? {
                Selection::Eligible(entry) => (PlanKind::Explicit, vec![entry]),
                Selection::Forced(entry) => (PlanKind::Forced, vec![entry]),
            },
            None => {
                let mut pending = remaining;
                if limit > 0 {
                    pending.truncate(limit);
                }
                (PlanKind::Remaining, pending)
            }
        };

        Ok(Self {
            kind,
            pending,
            eligible: enumeration.eligible.len(),
            skipped: enumeration.skipped,
            below_min_weight: enumeration.below_min_weight,
            min_weight,
            done,
        })
    }

    pub fn status_line(&self) -> String {
        format!(
            "Platforms: {} total (skipping {}, {} below {} games), {} done, {} remaining",
            self.eligible,
            self.skipped,
            self.below_min_weight,
            self.min_weight,
            self.done,
            self.pending.len()
        )
    }

    pub fn note(&self) -> Option<String> {
        match (self.kind, self.pending.first()) {
            (PlanKind::Forced, Some(entry)) => Some(format!(
                "Note: {} is normally filtered out but processing since explicitly requested",
                entry.subject
            )),
            _ => None,
        }
    }
}

/// What to print when `--platform` names nothing in the catalog.
pub fn not_found_lines(name: &str, enumeration: &Enumeration, min_weight: i64) -> Vec<String> {
    let mut lines = vec![
        format!("Platform not found: {}", name),
        format!("Available platforms with >= {} games:", min_weight),
    ];
    lines.extend(
        enumeration
            .eligible
            .iter()
            .take(20)
            .map(|entry| format!("  {} ({} games)", entry.subject, entry.weight)),
    );
    lines
}
