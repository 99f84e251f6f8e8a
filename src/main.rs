//! trajreport - trajectory-tracking error reports
//!
//! A CLI tool that summarizes localization error runs from a results
//! store and renders error-vs-noise charts, error-vs-frequency charts and
//! joint heatmaps comparing the GPS, CV, HT and ZG methods.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, store, missing runs, rendering), or
//!       unmatched run patterns in --dry-run

mod analysis;
mod cli;
mod config;
mod models;
mod naming;
mod report;
mod store;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, Section};
use config::{Config, OutputMode, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Report, ReportMetadata};
use report::{Renderer, SectionContext};
use std::path::PathBuf;
use std::time::Instant;
use store::ResultsStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const NOISE_HEADING: &str = "Position Error w.r.t. GPS Noise";
const FREQUENCY_HEADING: &str = "Position Error w.r.t. GPS Frequency";
const HEATMAP_HEADING: &str = "Position Error w.r.t. GPS Noise and Frequency";

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("trajreport v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_report(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Report failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .trajreport.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the trajectory, sweeps, method profiles and output.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete report workflow. Returns the exit code.
fn run_report(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    // Step 1: Load the results store
    let store_path = config.experiment.store_path();
    println!("📂 Loading results store: {}", store_path.display());
    let store = ResultsStore::load(&store_path)
        .with_context(|| format!("Failed to load results store {}", store_path.display()))?;
    info!("Loaded {} run records", store.len());
    if store.is_empty() {
        warn!("Results store {} has no records", store_path.display());
    }

    let ctx = SectionContext::new(&store, &config);
    let sections = args.sections();

    // Handle --dry-run: resolve patterns and exit
    if args.dry_run {
        return handle_dry_run(&ctx, &sections);
    }

    let renderer = Renderer::new(&config.output, &config.heatmap)?;
    renderer.prepare()?;

    println!("📐 Summarizing runs...");
    println!("   Trajectory: {}", config.experiment.traj);
    println!("   Statistic: {}", ctx.statistic);
    println!(
        "   Frequencies: {} | Noise levels: {}",
        ctx.freqs().len(),
        ctx.sigmas().len()
    );

    // Step 2: Build the selected sections
    let mut report = Report {
        metadata: ReportMetadata {
            traj: config.experiment.traj.clone(),
            store_path: store_path.display().to_string(),
            records: store.len(),
            statistic: ctx.statistic,
            generated_at: Utc::now(),
            figures: 0,
        },
        noise_sweep: Vec::new(),
        frequency_sweep: Vec::new(),
        heatmaps: Vec::new(),
    };

    for section in &sections {
        match section {
            Section::Noise => {
                report.noise_sweep = report::noise_sweep(&ctx).context(NOISE_HEADING)?;
            }
            Section::Frequency => {
                report.frequency_sweep =
                    report::frequency_sweep(&ctx).context(FREQUENCY_HEADING)?;
            }
            Section::Heatmap => {
                report.heatmaps = report::joint_heatmaps(&ctx).context(HEATMAP_HEADING)?;
            }
        }
    }
    report.metadata.figures = report.figure_count();

    // Step 3: Emit the figures
    let written = emit_figures(&report, &renderer, args.quiet)?;

    // Step 4: Optional summary document
    if let Some(ref summary_path) = args.summary {
        report::write_summary(&report, summary_path, args.summary_format)?;
        info!("Summary written to {}", summary_path.display());
    }

    // Print summary
    let duration = start_time.elapsed().as_secs_f64();
    println!("\n📊 Report Summary:");
    println!("   Run records: {}", report.metadata.records);
    println!(
        "   Figures: {} ({} noise, {} frequency, {} heatmap)",
        report.figure_count(),
        report.noise_sweep.len(),
        report.frequency_sweep.len(),
        report.heatmaps.len()
    );
    if let Some(ref summary_path) = args.summary {
        println!("   Summary: {}", summary_path.display());
    }
    println!("   Duration: {:.1}s", duration);

    if written.is_empty() {
        println!("\n✅ Report complete!");
    } else {
        println!(
            "\n✅ Report complete! {} figures saved to: {}",
            written.len(),
            renderer.save_path().display()
        );
    }

    Ok(0)
}

/// Render or preview every figure of the report, in section order.
fn emit_figures(report: &Report, renderer: &Renderer, quiet: bool) -> Result<Vec<PathBuf>> {
    let preview = renderer.mode() == OutputMode::Preview;

    let progress_bar = if !preview && !quiet {
        let pb = ProgressBar::new(report.figure_count() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let heading = |text: &str| {
        if preview {
            println!("\n### {}", text);
        } else {
            info!("{}", text);
        }
    };

    if preview {
        println!("\n## {}", report.metadata.traj);
    }

    let mut written = Vec::new();

    for (title, charts) in [
        (NOISE_HEADING, &report.noise_sweep),
        (FREQUENCY_HEADING, &report.frequency_sweep),
    ] {
        if charts.is_empty() {
            continue;
        }
        heading(title);
        for chart in charts {
            if let Some(ref pb) = progress_bar {
                pb.set_message(chart.file_stem.clone());
            }
            let path = renderer
                .line_chart(chart)
                .with_context(|| format!("{}: {}", title, chart.title))?;
            written.extend(path);
            if let Some(ref pb) = progress_bar {
                pb.inc(1);
            }
        }
    }

    if !report.heatmaps.is_empty() {
        heading(HEATMAP_HEADING);
        for map in &report.heatmaps {
            if let Some(ref pb) = progress_bar {
                pb.set_message(map.file_stem.clone());
            }
            let path = renderer
                .heatmap(map)
                .with_context(|| format!("{}: {}", HEATMAP_HEADING, map.title))?;
            written.extend(path);
            if let Some(ref pb) = progress_bar {
                pb.inc(1);
            }
        }
    }

    if let Some(pb) = progress_bar {
        pb.finish_with_message("done");
    }

    Ok(written)
}

/// Handle --dry-run: count the records behind every pattern, render nothing.
fn handle_dry_run(ctx: &SectionContext<'_>, sections: &[Section]) -> Result<i32> {
    println!("\n🔍 Dry run: resolving run patterns (nothing is rendered)...\n");

    let patterns = report::planned_patterns(ctx, sections)?;
    let mut unmatched = Vec::new();
    let mut runs = 0;

    for pattern in &patterns {
        let count = ctx.store.count_matching(pattern)?;
        debug!("{} -> {} runs", pattern, count);
        if count == 0 {
            unmatched.push(pattern);
        }
        runs += count;
    }

    println!(
        "   {} patterns, {} matched, {} run records in total",
        patterns.len(),
        patterns.len() - unmatched.len(),
        runs
    );

    if !unmatched.is_empty() {
        println!("\n   {} patterns match no runs:\n", unmatched.len());
        for pattern in &unmatched {
            println!("     ❌ {}", pattern);
        }
        eprintln!("\n⛔ Missing runs. A full report would fail (exit code 1).");
        return Ok(1);
    }

    println!("\n✅ Dry run complete. Every pattern matches at least one run.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
