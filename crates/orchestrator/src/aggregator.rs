//! Builds the combined dataset from every committed artifact.

use std::path::PathBuf;

use csv::WriterBuilder;
use research_core::ArtifactSchema;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactRecords;
use crate::error::{OrchestratorError, Result};
use crate::store::ArtifactStore;

#[derive(Debug, Clone)]
pub struct SkippedArtifact {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct AggregateReport {
    pub output: PathBuf,
    pub files_read: usize,
    pub rows: usize,
    pub skipped: Vec<SkippedArtifact>,
}

pub struct Aggregator<'a> {
    store: &'a ArtifactStore,
    schema: ArtifactSchema,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a ArtifactStore, schema: ArtifactSchema) -> Self {
        Self { store, schema }
    }

    /// Union all artifacts into the combined file, in the schema's column
    /// order. Columns an artifact lacks are left empty. The file is rewritten
    /// from scratch each time; an unreadable artifact is skipped with a warning.
    pub async fn combine(&self) -> Result<AggregateReport> {
        let paths = self.store.artifact_paths().await?;

        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(self.schema.columns())?;

        let mut files_read = 0;
        let mut rows = 0;
        let mut skipped = Vec::new();

        for path in paths {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable artifact");
                    skipped.push(SkippedArtifact {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let records = match ArtifactRecords::parse(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping malformed artifact");
                    skipped.push(SkippedArtifact {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let mut file_rows = 0;
            for row in records.project(&self.schema) {
                writer.write_record(&row)?;
                file_rows += 1;
            }
            debug!(path = %path.display(), rows = file_rows, "Aggregated artifact");
            files_read += 1;
            rows += file_rows;
        }

        let content = writer
            .into_inner()
            .map_err(|e| OrchestratorError::Io(e.into_error()))?;
        let output = self
            .store
            .write_atomic(self.store.combined_file_name(), &content)
            .await?;

        info!(
            output = %output.display(),
            files = files_read,
            rows,
            skipped = skipped.len(),
            "Combined dataset written"
        );

        Ok(AggregateReport {
            output,
            files_read,
            rows,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::domain::profile::EMULATORS_SCHEMA;
    use tempfile::TempDir;

    const HEADER: &str = "platform,emulator_name,supported_os,homepage,winget_id,homebrew_formula,flatpak_id,retroarch_core,save_directory,save_extensions,notes";

    fn setup_store() -> (ArtifactStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp_dir.path(), "all_emulators.csv");
        (store, temp_dir)
    }

    async fn write(store: &ArtifactStore, name: &str, content: &str) {
        tokio::fs::write(store.dir().join(name), content).await.unwrap();
    }

    #[tokio::test]
    async fn test_combine_unions_in_schema_order() {
        let (store, _temp_dir) = setup_store();
        write(
            &store,
            "amiga.csv",
            &format!("{}\nAmiga,FS-UAE,Linux,https://fs-uae.net,,,,,,,\n", HEADER),
        )
        .await;
        write(
            &store,
            "sega_cd.csv",
            &format!(
                "notes,{},confidence\nneeds bios,Sega CD,Genesis Plus GX,,,,,,,,,high\n",
                HEADER.replace(",notes", "")
            ),
        )
        .await;

        let report = Aggregator::new(&store, EMULATORS_SCHEMA).combine().await.unwrap();
        assert_eq!(report.files_read, 2);
        assert_eq!(report.rows, 2);
        assert!(report.skipped.is_empty());

        let combined = tokio::fs::read_to_string(store.combined_path()).await.unwrap();
        let lines: Vec<&str> = combined.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "Amiga,FS-UAE,Linux,https://fs-uae.net,,,,,,,");
        assert_eq!(lines[2], "Sega CD,Genesis Plus GX,,,,,,,,,needs bios");
    }

    #[tokio::test]
    async fn test_corrupt_artifact_is_skipped() {
        let (store, _temp_dir) = setup_store();
        write(&store, "amiga.csv", &format!("{}\nAmiga,FS-UAE,,,,,,,,,\n", HEADER)).await;
        let mut broken = format!("{}\n", HEADER).into_bytes();
        broken.extend_from_slice(&[0xff, 0xfe, b',', 0xc3, b'\n']);
        tokio::fs::write(store.dir().join("broken.csv"), broken).await.unwrap();

        let report = Aggregator::new(&store, EMULATORS_SCHEMA).combine().await.unwrap();
        assert_eq!(report.files_read, 1);
        assert_eq!(report.rows, 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].path.ends_with("broken.csv"));
    }

    #[tokio::test]
    async fn test_missing_columns_are_filled_empty() {
        let (store, _temp_dir) = setup_store();
        write(
            &store,
            "amiga.csv",
            &format!(
                "{}\nAmiga,FS-UAE,Linux,https://fs-uae.net,,,,,,\n",
                HEADER.replace(",notes", "")
            ),
        )
        .await;
        write(&store, "msx.csv", "platform,emulator_name\nMSX,openMSX\n").await;

        let report = Aggregator::new(&store, EMULATORS_SCHEMA).combine().await.unwrap();
        assert_eq!(report.files_read, 2);
        assert_eq!(report.rows, 2);
        assert!(report.skipped.is_empty());

        let combined = tokio::fs::read_to_string(store.combined_path()).await.unwrap();
        let lines: Vec<&str> = combined.lines().collect();
        assert_eq!(lines[1], "Amiga,FS-UAE,Linux,https://fs-uae.net,,,,,,,");
        assert_eq!(lines[2], "MSX,openMSX,,,,,,,,,");
    }

    #[tokio::test]
    async fn test_empty_store_writes_header_only() {
        let (store, _temp_dir) = setup_store();

        let report = Aggregator::new(&store, EMULATORS_SCHEMA).combine().await.unwrap();
        assert_eq!(report.rows, 0);
        let combined = tokio::fs::read_to_string(&report.output).await.unwrap();
        assert_eq!(combined, format!("{}\n", HEADER));
    }

    #[tokio::test]
    async fn test_combine_is_idempotent() {
        let (store, _temp_dir) = setup_store();
        write(&store, "amiga.csv", &format!("{}\nAmiga,FS-UAE,,,,,,,,,\n", HEADER)).await;

        let aggregator = Aggregator::new(&store, EMULATORS_SCHEMA);
        aggregator.combine().await.unwrap();
        let first = tokio::fs::read(store.combined_path()).await.unwrap();
        let report = aggregator.combine().await.unwrap();
        let second = tokio::fs::read(store.combined_path()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(report.files_read, 1);
    }
}
