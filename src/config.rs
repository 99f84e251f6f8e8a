//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.trajreport.toml` files.

use crate::models::{Method, MethodProfile, Statistic};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".trajreport.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Experiment layout.
    #[serde(default)]
    pub experiment: ExperimentConfig,

    /// Summarization settings.
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Figure output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Heatmap settings.
    #[serde(default)]
    pub heatmap: HeatmapConfig,
}

/// Which runs were produced and how their files are named.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Trajectory name.
    #[serde(default = "default_traj")]
    pub traj: String,

    /// Directory prefix of run keys; also names the store file.
    #[serde(default = "default_results_path")]
    pub results_path: String,

    /// Explicit store file, overriding `<results_path>.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<PathBuf>,

    /// Fixed fragment shared by all run names.
    #[serde(default = "default_run_tag")]
    pub run_tag: String,

    /// GPS update frequencies in Hz.
    #[serde(default = "default_frequencies")]
    pub frequencies: Vec<u32>,

    /// GPS noise sweep.
    #[serde(default)]
    pub sigma: SigmaSweep,

    /// Offset and bias per method.
    #[serde(default)]
    pub methods: MethodProfiles,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            traj: default_traj(),
            results_path: default_results_path(),
            store: None,
            run_tag: default_run_tag(),
            frequencies: default_frequencies(),
            sigma: SigmaSweep::default(),
            methods: MethodProfiles::default(),
        }
    }
}

fn default_traj() -> String {
    "Line".to_string()
}

fn default_results_path() -> String {
    "results_200623".to_string()
}

fn default_run_tag() -> String {
    "00s,1".to_string()
}

fn default_frequencies() -> Vec<u32> {
    (1..=10).collect()
}

impl ExperimentConfig {
    /// Path of the results store file.
    pub fn store_path(&self) -> PathBuf {
        self.store
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.json", self.results_path)))
    }
}

/// Evenly spaced GPS noise levels, inclusive of both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigmaSweep {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Default for SigmaSweep {
    fn default() -> Self {
        Self {
            start: 0.1,
            stop: 1.0,
            step: 0.1,
        }
    }
}

impl SigmaSweep {
    /// Noise levels of the sweep.
    ///
    /// Values are computed by index and rounded to 1e-9 so that
    /// accumulated float error never adds or drops a level.
    pub fn values(&self) -> Vec<f64> {
        if self.step <= 0.0 || self.stop < self.start {
            return Vec::new();
        }
        let count = ((self.stop - self.start) / self.step + 1e-9).floor() as usize + 1;
        (0..count)
            .map(|i| ((self.start + i as f64 * self.step) * 1e9).round() / 1e9)
            .collect()
    }
}

/// Method profiles keyed by method code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodProfiles {
    #[serde(rename = "GPS")]
    pub gps: MethodProfile,
    #[serde(rename = "CV")]
    pub cv: MethodProfile,
    #[serde(rename = "HT")]
    pub ht: MethodProfile,
    #[serde(rename = "ZG")]
    pub zg: MethodProfile,
}

impl Default for MethodProfiles {
    fn default() -> Self {
        Self {
            gps: MethodProfile::new(0.0, 0.10),
            cv: MethodProfile::new(1.0, 0.10),
            ht: MethodProfile::new(1.0, 0.10),
            zg: MethodProfile::new(1.0, 0.50),
        }
    }
}

impl MethodProfiles {
    pub fn get(&self, method: Method) -> MethodProfile {
        match method {
            Method::Gps => self.gps,
            Method::Cv => self.cv,
            Method::Ht => self.ht,
            Method::Zg => self.zg,
        }
    }
}

/// Summarization settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Statistic applied to the runs of one configuration.
    #[serde(default)]
    pub statistic: Statistic,
}

/// How figures are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Print figures to the terminal; write no files.
    Preview,
    Png,
    Svg,
}

impl OutputMode {
    /// File extension, if files are written.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            OutputMode::Preview => None,
            OutputMode::Png => Some("png"),
            OutputMode::Svg => Some("svg"),
        }
    }
}

/// Figure output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output toggle: empty previews in the terminal, otherwise the
    /// image extension (`png` or `svg`).
    #[serde(default)]
    pub save_file: String,

    /// Report directory.
    #[serde(default = "default_save_path")]
    pub save_path: PathBuf,

    #[serde(default = "default_font_size")]
    pub font_size: u32,

    #[serde(default = "default_line_width")]
    pub line_width: u32,

    /// Figure width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Figure height in pixels (line charts).
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_file: String::new(),
            save_path: default_save_path(),
            font_size: default_font_size(),
            line_width: default_line_width(),
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_save_path() -> PathBuf {
    PathBuf::from("report_200623")
}

fn default_font_size() -> u32 {
    14
}

fn default_line_width() -> u32 {
    2
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

impl OutputConfig {
    /// Interpret the output toggle.
    pub fn mode(&self) -> Result<OutputMode> {
        match self.save_file.trim().to_lowercase().as_str() {
            "" => Ok(OutputMode::Preview),
            "png" => Ok(OutputMode::Png),
            "svg" => Ok(OutputMode::Svg),
            other => bail!("Unsupported output format '{}' (expected png, svg or empty)", other),
        }
    }
}

/// Heatmap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapConfig {
    /// Color range of raw error heatmaps.
    #[serde(default = "default_ep_range")]
    pub ep_range: (f64, f64),

    /// Color range of difference heatmaps.
    #[serde(default = "default_dp_range")]
    pub dp_range: (f64, f64),

    /// Display ratio of one frequency unit to one noise unit.
    #[serde(default = "default_aspect")]
    pub aspect: f64,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            ep_range: default_ep_range(),
            dp_range: default_dp_range(),
            aspect: default_aspect(),
        }
    }
}

fn default_ep_range() -> (f64, f64) {
    (0.0, 1.2)
}

fn default_dp_range() -> (f64, f64) {
    (-0.2, 0.2)
}

fn default_aspect() -> f64 {
    0.1
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given on the command line override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref store) = args.store {
            self.experiment.store = Some(store.clone());
        }
        if let Some(ref traj) = args.traj {
            self.experiment.traj = traj.clone();
        }
        if let Some(ref save_file) = args.save_file {
            self.output.save_file = save_file.clone();
        }
        if let Some(ref save_path) = args.save_path {
            self.output.save_path = save_path.clone();
        }
        if let Some(statistic) = args.statistic {
            self.summary.statistic = statistic;
        }
    }

    /// Check settings that would otherwise fail halfway through a report.
    pub fn validate(&self) -> Result<()> {
        self.output.mode()?;

        if self.experiment.traj.is_empty() {
            bail!("Trajectory name must not be empty");
        }
        if self.experiment.frequencies.is_empty() {
            bail!("At least one GPS frequency is required");
        }
        if self.experiment.frequencies.windows(2).any(|w| w[0] >= w[1]) {
            bail!(
                "GPS frequencies must be strictly increasing, got {:?}",
                self.experiment.frequencies
            );
        }
        if !(self.experiment.sigma.step > 0.0) {
            bail!("Sigma step must be positive");
        }
        if self.experiment.sigma.values().is_empty() {
            bail!("Sigma sweep is empty (stop < start)");
        }
        for (name, (lo, hi)) in [
            ("ep_range", self.heatmap.ep_range),
            ("dp_range", self.heatmap.dp_range),
        ] {
            if !(lo < hi) {
                bail!("Heatmap {} must be increasing, got [{}, {}]", name, lo, hi);
            }
        }
        if !(self.heatmap.aspect > 0.0) {
            bail!("Heatmap aspect must be positive");
        }
        if self.output.width < 200 || self.output.height < 150 {
            bail!("Figure size must be at least 200x150 pixels");
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
