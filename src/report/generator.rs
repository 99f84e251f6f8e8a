//! Summary document generation.
//!
//! This module renders every number behind the figures of a report as a
//! Markdown or JSON document.

use crate::cli::SummaryFormat;
use crate::models::{Heatmap, LineChart, Report, ReportMetadata};
use anyhow::{Context, Result};
use std::path::Path;

/// Generate a complete Markdown summary.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Trajectory Error Report\n\n");

    // Metadata section
    output.push_str(&generate_metadata_section(&report.metadata));

    output.push_str(&format!("## {}\n\n", report.metadata.traj));

    output.push_str(&generate_chart_section(
        "Position Error w.r.t. GPS Noise",
        &report.noise_sweep,
    ));
    output.push_str(&generate_chart_section(
        "Position Error w.r.t. GPS Frequency",
        &report.frequency_sweep,
    ));
    output.push_str(&generate_heatmap_section(&report.heatmaps));

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Trajectory:** {}\n", metadata.traj));
    section.push_str(&format!("- **Results Store:** `{}`\n", metadata.store_path));
    section.push_str(&format!("- **Run Records:** {}\n", metadata.records));
    section.push_str(&format!("- **Statistic:** {}\n", metadata.statistic));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Figures:** {}\n", metadata.figures));
    section.push('\n');

    section
}

fn cell(v: f64) -> String {
    if v.is_finite() {
        format!("{:.4}", v)
    } else {
        "n/a".to_string()
    }
}

/// One table per chart; skipped entirely when the section did not run.
fn generate_chart_section(heading: &str, charts: &[LineChart]) -> String {
    if charts.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str(&format!("### {}\n\n", heading));

    for chart in charts {
        section.push_str(&format!("#### {}\n\n", chart.title));

        section.push_str(&format!("| {} |", chart.x_label));
        for curve in &chart.curves {
            section.push_str(&format!(" {} |", curve.method));
        }
        section.push('\n');
        section.push_str("|:---|");
        section.push_str(&":---:|".repeat(chart.curves.len()));
        section.push('\n');

        for (i, x) in chart.x.iter().enumerate() {
            section.push_str(&format!("| {:.*} |", chart.x_precision, x));
            for curve in &chart.curves {
                let v = curve.values.get(i).copied().unwrap_or(f64::NAN);
                section.push_str(&format!(" {} |", cell(v)));
            }
            section.push('\n');
        }
        section.push('\n');
    }

    section
}

/// One frequency-by-noise table per heatmap.
fn generate_heatmap_section(maps: &[Heatmap]) -> String {
    if maps.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("### Position Error w.r.t. GPS Noise and Frequency\n\n");

    for map in maps {
        section.push_str(&format!("#### {}\n\n", map.title));
        section.push_str(&format!(
            "*Color range: [{}, {}]*\n\n",
            map.range.0, map.range.1
        ));

        section.push_str("| f_G \\ σ_G |");
        for sigma in &map.sigmas {
            section.push_str(&format!(" {:.1} |", sigma));
        }
        section.push('\n');
        section.push_str("|:---|");
        section.push_str(&":---:|".repeat(map.sigmas.len()));
        section.push('\n');

        for (row, freq) in map.matrix.rows().iter().zip(&map.freqs) {
            section.push_str(&format!("| {}Hz |", freq));
            for &v in row {
                section.push_str(&format!(" {} |", cell(v)));
            }
            section.push('\n');
        }
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by trajreport v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON summary.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write the summary in the requested format.
pub fn write_summary(report: &Report, path: &Path, format: SummaryFormat) -> Result<()> {
    let content = match format {
        SummaryFormat::Json => generate_json_report(report)?,
        SummaryFormat::Markdown => generate_markdown_report(report),
    };

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write summary to {}", path.display()))
}
