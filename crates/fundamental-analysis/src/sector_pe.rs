use analysis_core::AnalysisError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Average trailing P/E per sector, e.g. `{ "Technology": 28.5 }`.
///
/// Sector names are matched case-insensitively and ignoring surrounding
/// whitespace; non-positive averages are discarded on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, f64>", into = "HashMap<String, f64>")]
pub struct SectorPeTable {
    averages: HashMap<String, f64>,
}

impl SectorPeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::ConfigError(format!("{}: {}", path.display(), e)))?;
        let table = Self::from_json(&raw)?;
        tracing::debug!("Loaded {} sector P/E averages from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn from_json(raw: &str) -> Result<Self, AnalysisError> {
        serde_json::from_str(raw).map_err(|e| AnalysisError::InvalidData(format!("sector P/E table: {}", e)))
    }

    pub fn insert(&mut self, sector: &str, average_pe: f64) {
        if average_pe.is_finite() && average_pe > 0.0 {
            self.averages.insert(key(sector), average_pe);
        }
    }

    pub fn with(mut self, sector: &str, average_pe: f64) -> Self {
        self.insert(sector, average_pe);
        self
    }

    pub fn average_pe(&self, sector: &str) -> Option<f64> {
        self.averages.get(&key(sector)).copied()
    }

    pub fn len(&self) -> usize {
        self.averages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.averages.is_empty()
    }
}

fn key(sector: &str) -> String {
    sector.trim().to_lowercase()
}

impl From<HashMap<String, f64>> for SectorPeTable {
    fn from(raw: HashMap<String, f64>) -> Self {
        let mut table = Self::new();
        for (sector, pe) in raw {
            table.insert(&sector, pe);
        }
        table
    }
}

impl From<SectorPeTable> for HashMap<String, f64> {
    fn from(table: SectorPeTable) -> Self {
        table.averages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case_and_padding() {
        let table = SectorPeTable::from_json(r#"{"Technology": 28.5, "Energy": 11.0}"#).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.average_pe("technology"), Some(28.5));
        assert_eq!(table.average_pe(" ENERGY "), Some(11.0));
        assert_eq!(table.average_pe("Utilities"), None);
    }

    #[test]
    fn test_unusable_averages_dropped() {
        let table = SectorPeTable::from_json(r#"{"Financials": 0.0, "Health Care": -2.0}"#).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_malformed_table() {
        assert!(matches!(
            SectorPeTable::from_json(r#"{"Technology": "high"}"#),
            Err(AnalysisError::InvalidData(_))
        ));
        assert!(matches!(
            SectorPeTable::from_file("/nonexistent/sector_pe.json"),
            Err(AnalysisError::ConfigError(_))
        ));
    }
}
