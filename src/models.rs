//! Data models for the trajectory error reports.
//!
//! This module contains the core data structures shared by the
//! aggregator, the report sections and the renderers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Trajectory estimation method compared in the experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Raw GPS fixes (baseline)
    Gps,
    /// Constant-velocity model
    Cv,
    /// HT estimator
    Ht,
    /// ZG estimator
    Zg,
}

impl Method {
    /// All methods in plotting order.
    pub const ALL: [Method; 4] = [Method::Gps, Method::Cv, Method::Ht, Method::Zg];

    /// Methods that take part in the joint heatmaps.
    pub const ESTIMATORS: [Method; 3] = [Method::Cv, Method::Ht, Method::Zg];

    /// Code used in run file names.
    pub fn code(&self) -> &'static str {
        match self {
            Method::Gps => "GPS",
            Method::Cv => "CV",
            Method::Ht => "HT",
            Method::Zg => "ZG",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Offset and bias a method's runs were produced with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MethodProfile {
    /// Initial position offset in meters.
    pub offset: f64,
    /// Bias parameter.
    pub bias: f64,
}

impl MethodProfile {
    pub fn new(offset: f64, bias: f64) -> Self {
        Self { offset, bias }
    }
}

/// Identifies the runs of one experiment configuration.
///
/// Renders to a glob pattern following the run file-name grammar:
/// `<dir>/<traj>(<freq:02>Hz,<tag>)(<sigma:.1>,<offset>m,<bias:.2>).<METHOD>.*.csv`
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentKey<'a> {
    pub results_path: &'a str,
    pub traj: &'a str,
    pub freq_hz: u32,
    pub run_tag: &'a str,
    pub sigma: f64,
    pub profile: MethodProfile,
    pub method: Method,
}

impl ExperimentKey<'_> {
    /// Pattern matching every run of this configuration.
    pub fn pattern(&self) -> String {
        let name = format!(
            "{}({:02}Hz,{})({:.1},{}m,{:.2}).{}.*.csv",
            self.traj,
            self.freq_hz,
            self.run_tag,
            self.sigma,
            self.profile.offset,
            self.profile.bias,
            self.method.code()
        );
        join_results_path(self.results_path, &name)
    }
}

impl fmt::Display for ExperimentKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern())
    }
}

/// Prefix a run file name with the results directory.
pub fn join_results_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }
}

/// Statistic used to reduce per-run samples to one value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    #[default]
    Median,
    Mean,
    Min,
    Max,
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Median => write!(f, "median"),
            Statistic::Mean => write!(f, "mean"),
            Statistic::Min => write!(f, "min"),
            Statistic::Max => write!(f, "max"),
        }
    }
}

impl Statistic {
    /// Apply the statistic to a sample.
    ///
    /// Returns `None` for an empty sample. Any NaN in the sample yields NaN.
    pub fn apply(&self, samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        if samples.iter().any(|v| v.is_nan()) {
            return Some(f64::NAN);
        }

        let value = match self {
            Statistic::Median => {
                let mut sorted = samples.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
            Statistic::Mean => samples.iter().sum::<f64>() / samples.len() as f64,
            Statistic::Min => samples.iter().copied().fold(f64::INFINITY, f64::min),
            Statistic::Max => samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };

        Some(value)
    }
}

/// Column-wise summary of the records matching one pattern.
///
/// Element 0 is the position error in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SummaryValue(Vec<f64>);

impl SummaryValue {
    pub(crate) fn new(columns: Vec<f64>) -> Self {
        Self(columns)
    }

    /// Summarized position error.
    pub fn position_error(&self) -> f64 {
        self.0.first().copied().unwrap_or(f64::NAN)
    }

    #[cfg(test)]
    pub fn columns(&self) -> &[f64] {
        &self.0
    }
}

/// Shape mismatch between report matrices.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    #[error("row {row} has {found} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("cannot subtract a {rhs:?} matrix from a {lhs:?} matrix")]
    ShapeMismatch {
        lhs: (usize, usize),
        rhs: (usize, usize),
    },
}

/// Error values indexed by `[frequency, noise]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportMatrix {
    rows: Vec<Vec<f64>>,
}

impl ReportMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row; every row must have the length of the first.
    pub fn push_row(&mut self, row: Vec<f64>) -> Result<(), MatrixError> {
        if let Some(first) = self.rows.first() {
            if first.len() != row.len() {
                return Err(MatrixError::RaggedRow {
                    row: self.rows.len(),
                    expected: first.len(),
                    found: row.len(),
                });
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.rows.first().map_or(0, Vec::len))
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    #[cfg(test)]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Element-wise `self - other`.
    pub fn difference(&self, other: &ReportMatrix) -> Result<ReportMatrix, MatrixError> {
        if self.shape() != other.shape() {
            return Err(MatrixError::ShapeMismatch {
                lhs: self.shape(),
                rhs: other.shape(),
            });
        }

        let rows = self
            .rows
            .iter()
            .zip(&other.rows)
            .map(|(a, b)| a.iter().zip(b).map(|(x, y)| x - y).collect())
            .collect();

        Ok(ReportMatrix { rows })
    }
}

/// One method's curve in a line chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Curve {
    pub method: Method,
    pub values: Vec<f64>,
}

/// Error-vs-parameter line chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineChart {
    /// Chart title.
    pub title: String,
    /// Output name without extension, e.g. `e_p-sigma(freq01Hz)`.
    pub file_stem: String,
    pub x_label: String,
    pub y_label: String,
    /// Shared x values of all curves.
    pub x: Vec<f64>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    /// Decimals shown on x tick labels.
    pub x_precision: usize,
    pub curves: Vec<Curve>,
}

/// Frequency by noise heatmap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heatmap {
    pub title: String,
    pub file_stem: String,
    pub x_label: String,
    pub y_label: String,
    /// Noise levels, one per column.
    pub sigmas: Vec<f64>,
    /// Frequencies, one per row (descending).
    pub freqs: Vec<u32>,
    pub matrix: ReportMatrix,
    /// Color scale limits.
    pub range: (f64, f64),
}

/// Metadata about a report run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Trajectory name.
    pub traj: String,
    /// Results store the report was built from.
    pub store_path: String,
    /// Number of run records in the store.
    pub records: usize,
    /// Statistic applied to the runs.
    pub statistic: Statistic,
    /// Date and time of generation.
    pub generated_at: DateTime<Utc>,
    /// Number of figures produced.
    pub figures: usize,
}

/// Everything computed for one report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// Error vs GPS noise, one chart per frequency.
    pub noise_sweep: Vec<LineChart>,
    /// Error vs GPS frequency, one chart per noise level.
    pub frequency_sweep: Vec<LineChart>,
    /// Joint frequency/noise heatmaps.
    pub heatmaps: Vec<Heatmap>,
}

impl Report {
    pub fn figure_count(&self) -> usize {
        self.noise_sweep.len() + self.frequency_sweep.len() + self.heatmaps.len()
    }
}
