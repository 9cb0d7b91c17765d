//! Parsing and validation of artifact CSV files.

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord};
use research_core::ArtifactSchema;

use crate::error::ValidationError;

/// A parsed artifact: its header and data rows as written by the worker.
#[derive(Debug, Clone)]
pub struct ArtifactRecords {
    pub header: Vec<String>,
    pub rows: Vec<StringRecord>,
}

impl ArtifactRecords {
    /// Parse CSV bytes. Rows may be shorter or longer than the header; blank
    /// lines are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, ValidationError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let header = reader
            .headers()
            .map_err(|e| ValidationError::Malformed(e.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;

        Ok(Self { header, rows })
    }

    /// Check the record set against `schema`: every required column present
    /// and at least one data row. Returns the row count.
    pub fn validate(&self, schema: &ArtifactSchema) -> Result<usize, ValidationError> {
        let missing = schema.missing_columns(&self.header);
        if !missing.is_empty() {
            return Err(ValidationError::MissingColumns(
                missing.into_iter().map(String::from).collect(),
            ));
        }
        if self.rows.is_empty() {
            return Err(ValidationError::NoDataRows);
        }
        Ok(self.rows.len())
    }

    /// Rows reordered into the schema's column order. Columns the schema does
    /// not name are dropped; schema columns a row lacks become empty strings.
    pub fn project<'a>(
        &'a self,
        schema: &'a ArtifactSchema,
    ) -> impl Iterator<Item = Vec<&'a str>> + 'a {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, name) in self.header.iter().enumerate() {
            index.entry(name.as_str()).or_insert(i);
        }
        let positions: Vec<Option<usize>> = schema
            .columns()
            .iter()
            .map(|c| index.get(c).copied())
            .collect();

        self.rows.iter().map(move |row| {
            positions
                .iter()
                .map(|pos| pos.and_then(|i| row.get(i)).unwrap_or(""))
                .collect()
        })
    }
}

/// Parse and validate in one step.
pub fn validate_artifact(
    bytes: &[u8],
    schema: &ArtifactSchema,
) -> Result<ArtifactRecords, ValidationError> {
    let records = ArtifactRecords::parse(bytes)?;
    records.validate(schema)?;
    Ok(records)
}
