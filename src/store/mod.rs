//! Results store loading and lookup.
//!
//! The store maps run file names to error records. Column 0 of every
//! record is the position error in meters.

use globset::Glob;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Per-run error statistics.
pub type ErrorRecord = Vec<f64>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read results store {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse results store {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid run pattern `{pattern}`")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Precomputed error records keyed by run file name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultsStore {
    records: BTreeMap<String, ErrorRecord>,
}

impl ResultsStore {
    /// Load a store from a JSON file.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let store: ResultsStore =
            serde_json::from_str(&content).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("Loaded {} records from {}", store.len(), path.display());
        Ok(store)
    }

    #[cfg(test)]
    pub fn from_records<I, K>(records: I) -> Self
    where
        I: IntoIterator<Item = (K, ErrorRecord)>,
        K: Into<String>,
    {
        Self {
            records: records.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records whose key matches a glob pattern, in key order.
    pub fn matching(&self, pattern: &str) -> Result<Vec<(&str, &[f64])>, StoreError> {
        let matcher = Glob::new(pattern)
            .map_err(|source| StoreError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();

        Ok(self
            .records
            .iter()
            .filter(|(key, _)| matcher.is_match(key.as_str()))
            .map(|(key, record)| (key.as_str(), record.as_slice()))
            .collect())
    }

    /// Number of records matching a pattern.
    pub fn count_matching(&self, pattern: &str) -> Result<usize, StoreError> {
        Ok(self.matching(pattern)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_store() -> ResultsStore {
        ResultsStore::from_records([
            ("res/Line(01Hz,00s,1)(0.1,1m,0.10).CV.00.csv", vec![0.4, 0.02]),
            ("res/Line(01Hz,00s,1)(0.1,1m,0.10).CV.01.csv", vec![0.6, 0.03]),
            ("res/Line(01Hz,00s,1)(0.1,1m,0.10).HT.00.csv", vec![0.3, 0.01]),
            ("res/Line(10Hz,00s,1)(0.1,1m,0.10).CV.00.csv", vec![0.2, 0.01]),
        ])
    }

    #[test]
    fn test_matching_literal_parentheses_and_wildcard() {
        let store = sample_store();
        let matches = store
            .matching("res/Line(01Hz,00s,1)(0.1,1m,0.10).CV.*.csv")
            .unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].0, "res/Line(01Hz,00s,1)(0.1,1m,0.10).CV.00.csv");
        assert_eq!(matches[1].1, &[0.6, 0.03]);
    }

    #[test]
    fn test_matching_nothing() {
        let store = sample_store();
        let count = store
            .count_matching("res/Line(05Hz,00s,1)(0.1,1m,0.10).CV.*.csv")
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_invalid_pattern() {
        let store = sample_store();
        assert!(matches!(
            store.matching("res/[unclosed"),
            Err(StoreError::Pattern { .. })
        ));
    }

    #[test]
    fn test_load_json_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"res/Line(01Hz,00s,1)(0.1,0m,0.10).GPS.00.csv": [0.9, 0.0]}}"#
        )
        .unwrap();

        let store = ResultsStore::load(file.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_load_errors() {
        let missing = ResultsStore::load(Path::new("/nonexistent/results.json"));
        assert!(matches!(missing, Err(StoreError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let malformed = ResultsStore::load(file.path());
        assert!(matches!(malformed, Err(StoreError::Parse { .. })));
    }
}
