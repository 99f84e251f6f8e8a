//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Statistic;
use clap::Parser;
use std::path::PathBuf;

/// trajreport - trajectory-tracking error reports
///
/// Summarizes localization error runs across GPS noise and GPS update
/// frequency, and renders line charts and heatmaps comparing the
/// GPS, CV, HT and ZG methods.
///
/// Examples:
///   trajreport
///   trajreport --save-file png --save-path report_200623
///   trajreport --store results.json --section heatmap --save-file svg
///   trajreport --summary summary.md --dry-run
///   trajreport --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .trajreport.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Results store file (JSON)
    ///
    /// Defaults to `<results_path>.json` from the configuration.
    #[arg(short, long, value_name = "FILE", env = "TRAJREPORT_STORE")]
    pub store: Option<PathBuf>,

    /// Trajectory name
    #[arg(long, value_name = "NAME")]
    pub traj: Option<String>,

    /// Output toggle: empty to preview in the terminal, or png / svg
    #[arg(long, value_name = "EXT", env = "TRAJREPORT_SAVE_FILE")]
    pub save_file: Option<String>,

    /// Directory figures are written to
    #[arg(short = 'o', long, value_name = "DIR")]
    pub save_path: Option<PathBuf>,

    /// Statistic used to summarize runs
    #[arg(long, value_name = "STAT")]
    pub statistic: Option<Statistic>,

    /// Write a summary of all computed values to this file
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,

    /// Summary format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub summary_format: SummaryFormat,

    /// Report sections to produce (comma-separated; default all)
    ///
    /// Example: --section noise,heatmap
    #[arg(long, value_name = "SECTIONS", value_delimiter = ',')]
    pub section: Vec<Section>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: check which run patterns match the store, render nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .trajreport.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the summary document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SummaryFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Report section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum Section {
    /// Position error w.r.t. GPS noise, one chart per frequency
    Noise,
    /// Position error w.r.t. GPS frequency, one chart per noise level
    Frequency,
    /// Position error w.r.t. GPS noise and frequency
    Heatmap,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Noise, Section::Frequency, Section::Heatmap];
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref traj) = self.traj {
            if traj.trim().is_empty() {
                return Err("Trajectory name must not be empty".to_string());
            }
        }

        if let Some(ref store) = self.store {
            if store.is_dir() {
                return Err(format!("Store path is a directory: {}", store.display()));
            }
        }

        if let Some(ref summary) = self.summary {
            if summary.is_dir() {
                return Err(format!("Summary path is a directory: {}", summary.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Sections to run, in report order, without duplicates.
    pub fn sections(&self) -> Vec<Section> {
        if self.section.is_empty() {
            return Section::ALL.to_vec();
        }
        let mut sections = self.section.clone();
        sections.sort();
        sections.dedup();
        sections
    }
}
