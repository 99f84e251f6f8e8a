//! Error record aggregation.
//!
//! Reduces every run matching a pattern to one summary value by applying
//! a statistic column-wise.

use crate::models::{Statistic, SummaryValue};
use crate::store::{ResultsStore, StoreError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no runs match `{pattern}`")]
    NoMatch { pattern: String },
    #[error("run `{key}` has no error columns")]
    EmptyRecord { key: String },
    #[error("run `{key}` has {found} columns, expected {expected} (pattern `{pattern}`)")]
    RaggedRecords {
        pattern: String,
        key: String,
        expected: usize,
        found: usize,
    },
}

/// Summarize each pattern in order (list lookup).
pub fn summarize<S: AsRef<str>>(
    store: &ResultsStore,
    patterns: &[S],
    statistic: Statistic,
) -> Result<Vec<SummaryValue>, AggregateError> {
    patterns
        .iter()
        .map(|p| summarize_one(store, p.as_ref(), statistic))
        .collect()
}

/// Summarize the runs matching a single pattern (point lookup).
pub fn summarize_one(
    store: &ResultsStore,
    pattern: &str,
    statistic: Statistic,
) -> Result<SummaryValue, AggregateError> {
    let matches = store.matching(pattern)?;

    let Some(&(first_key, first)) = matches.first() else {
        return Err(AggregateError::NoMatch {
            pattern: pattern.to_string(),
        });
    };
    if first.is_empty() {
        return Err(AggregateError::EmptyRecord {
            key: first_key.to_string(),
        });
    }

    let width = first.len();
    if let Some(&(key, record)) = matches.iter().find(|(_, r)| r.len() != width) {
        return Err(AggregateError::RaggedRecords {
            pattern: pattern.to_string(),
            key: key.to_string(),
            expected: width,
            found: record.len(),
        });
    }

    let mut column = Vec::with_capacity(matches.len());
    let mut columns = Vec::with_capacity(width);
    for i in 0..width {
        column.clear();
        column.extend(matches.iter().map(|(_, r)| r[i]));
        // Non-empty by construction.
        columns.push(statistic.apply(&column).unwrap_or(f64::NAN));
    }

    debug!("{} runs match {} -> {:?}", matches.len(), pattern, columns);
    Ok(SummaryValue::new(columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ResultsStore {
        ResultsStore::from_records([
            ("r/a(0.1).CV.00.csv", vec![0.2, 1.0]),
            ("r/a(0.1).CV.01.csv", vec![0.4, 3.0]),
            ("r/a(0.1).CV.02.csv", vec![0.9, 2.0]),
            ("r/a(0.2).CV.00.csv", vec![0.5, 1.0]),
            ("r/a(0.2).CV.01.csv", vec![0.7, 1.0]),
            ("r/b(0.1).CV.00.csv", vec![0.1]),
            ("r/b(0.1).CV.01.csv", vec![0.1, 0.2]),
            ("r/c(0.1).CV.00.csv", vec![]),
        ])
    }

    #[test]
    fn test_summarize_one_median_per_column() {
        let value = summarize_one(&store(), "r/a(0.1).CV.*.csv", Statistic::Median).unwrap();
        assert_eq!(value.columns(), &[0.4, 2.0]);
        assert_eq!(value.position_error(), 0.4);
    }

    #[test]
    fn test_summarize_keeps_pattern_order() {
        let patterns = ["r/a(0.2).CV.*.csv", "r/a(0.1).CV.*.csv"];
        let values = summarize(&store(), &patterns, Statistic::Mean).unwrap();

        assert_eq!(values.len(), 2);
        assert!((values[0].position_error() - 0.6).abs() < 1e-12);
        assert!((values[1].position_error() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_no_match_is_an_error() {
        let err = summarize_one(&store(), "r/z(0.1).CV.*.csv", Statistic::Median).unwrap_err();
        match &err {
            AggregateError::NoMatch { pattern } => assert_eq!(pattern, "r/z(0.1).CV.*.csv"),
            other => panic!("unexpected error: {}", other),
        }
        assert!(err.to_string().contains("r/z(0.1).CV.*.csv"));
    }

    #[test]
    fn test_ragged_records_are_an_error() {
        let err = summarize_one(&store(), "r/b(0.1).CV.*.csv", Statistic::Median).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::RaggedRecords {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_record_is_an_error() {
        let err = summarize_one(&store(), "r/c(0.1).CV.*.csv", Statistic::Median).unwrap_err();
        assert!(matches!(err, AggregateError::EmptyRecord { .. }));
    }

    #[test]
    fn test_one_failing_pattern_fails_the_list() {
        let patterns = ["r/a(0.1).CV.*.csv", "r/missing.*.csv"];
        assert!(summarize(&store(), &patterns, Statistic::Median).is_err());
    }
}
