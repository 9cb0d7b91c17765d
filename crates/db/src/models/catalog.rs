use research_core::{CatalogEntry, Subject};

/// One row of the catalog query: a platform name and its game count.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogRow {
    pub name: String,
    pub weight: i64,
}

impl CatalogRow {
    /// `None` when the name has no filesystem-safe characters.
    pub fn into_domain(self) -> Option<CatalogEntry> {
        Subject::parse(self.name)
            .ok()
            .map(|subject| CatalogEntry::new(subject, self.weight))
    }
}
