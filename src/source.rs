// src/source.rs
//
// Read-side boundary. The registry and the scraped staging tables are
// produced by external collaborators; the core only needs them materialized
// as typed records once per run.

use anyhow::{Context, Result};
use log::info;
use std::path::Path;

use crate::models::{CanonicalEntity, ScrapedRecord};

/// Everything one reconciliation run reads, materialized up front.
#[derive(Debug, Clone, Default)]
pub struct RunInput {
    /// The canonical registry, read-only for the whole run
    pub registry: Vec<CanonicalEntity>,

    /// Target rows needing enrichment
    pub targets: Vec<ScrapedRecord>,

    /// Freshly scraped candidate descriptions
    pub candidates: Vec<ScrapedRecord>,
}

/// Supplies the run input. Implementations adapt whatever store the host
/// system scrapes into; tests construct [`RunInput`] directly.
pub trait RecordSource {
    fn load(&self) -> Result<RunInput>;
}

/// Loads the three tables from JSON array files, the interchange format the
/// scraping collaborators drop off.
pub struct JsonFileSource {
    pub registry_path: String,
    pub targets_path: String,
    pub candidates_path: String,
}

impl JsonFileSource {
    /// Paths come from the environment so the binary needs no CLI surface:
    /// RECONCILE_REGISTRY, RECONCILE_TARGETS, RECONCILE_CANDIDATES.
    pub fn from_env() -> Result<Self> {
        Ok(JsonFileSource {
            registry_path: std::env::var("RECONCILE_REGISTRY")
                .context("RECONCILE_REGISTRY is not set")?,
            targets_path: std::env::var("RECONCILE_TARGETS")
                .context("RECONCILE_TARGETS is not set")?,
            candidates_path: std::env::var("RECONCILE_CANDIDATES")
                .context("RECONCILE_CANDIDATES is not set")?,
        })
    }
}

impl RecordSource for JsonFileSource {
    fn load(&self) -> Result<RunInput> {
        let registry: Vec<CanonicalEntity> = read_json(&self.registry_path)?;
        let targets = read_records(&self.targets_path)?;
        let candidates = read_records(&self.candidates_path)?;
        info!(
            "Loaded {} registry entries, {} targets, {} candidates",
            registry.len(),
            targets.len(),
            candidates.len()
        );
        Ok(RunInput {
            registry,
            targets,
            candidates,
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let raw = std::fs::read_to_string(Path::new(path))
        .with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path))
}

/// Reads scraped records, assigning row indices by file position only to
/// records the source did not number itself. An explicit `"row"` value is
/// always kept, including `"row": 0` on a non-first record.
fn read_records(path: &str) -> Result<Vec<ScrapedRecord>> {
    let raw: Vec<serde_json::Value> = read_json(path)?;
    let mut records = Vec::with_capacity(raw.len());
    for (i, value) in raw.into_iter().enumerate() {
        let has_row = value.get("row").is_some();
        let mut record: ScrapedRecord = serde_json::from_value(value)
            .with_context(|| format!("Failed to parse record {} in {}", i, path))?;
        if !has_row {
            record.row = i;
        }
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_source_loads_all_three_tables() {
        let dir = std::env::temp_dir().join("reconcile_source_test");
        std::fs::create_dir_all(&dir).unwrap();
        let write = |name: &str, body: &str| {
            let p = dir.join(name);
            std::fs::write(&p, body).unwrap();
            p.to_string_lossy().into_owned()
        };

        let source = JsonFileSource {
            registry_path: write(
                "registry.json",
                r#"[{"id": 1, "name": "PT Adaro Energy Tbk"}]"#,
            ),
            targets_path: write(
                "targets.json",
                r#"[{"row": 0, "raw_name": "ADARO ENERGY", "latitude": "-2.5", "longitude": "113.0"}]"#,
            ),
            candidates_path: write("candidates.json", "[]"),
        };

        let input = source.load().unwrap();
        assert_eq!(input.registry.len(), 1);
        assert_eq!(input.targets[0].latitude, Some(-2.5));
        assert!(input.candidates.is_empty());
    }

    #[test]
    fn explicit_row_numbers_survive_and_gaps_fill_positionally() {
        let dir = std::env::temp_dir().join("reconcile_row_numbering_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("records.json");
        // Second record explicitly claims row 0; third carries no row at all.
        std::fs::write(
            &path,
            r#"[
                {"row": 7, "raw_name": "First"},
                {"row": 0, "raw_name": "Second"},
                {"raw_name": "Third"}
            ]"#,
        )
        .unwrap();

        let records = read_records(&path.to_string_lossy()).unwrap();
        assert_eq!(records[0].row, 7);
        assert_eq!(records[1].row, 0, "explicit row 0 must not be renumbered");
        assert_eq!(records[2].row, 2, "unnumbered record takes its file position");
    }

    #[test]
    fn missing_file_is_a_contextual_error() {
        let source = JsonFileSource {
            registry_path: "/nonexistent/registry.json".to_string(),
            targets_path: "/nonexistent/targets.json".to_string(),
            candidates_path: "/nonexistent/candidates.json".to_string(),
        };
        let err = source.load().unwrap_err();
        assert!(err.to_string().contains("registry.json"));
    }
}
