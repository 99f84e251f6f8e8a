//! The three report sections.
//!
//! Each section looks up summarized runs in the results store and
//! reshapes them into chart data:
//! - error vs GPS noise, one line chart per frequency;
//! - error vs GPS frequency, one line chart per noise level;
//! - frequency by noise heatmaps of every estimator and their differences.

use crate::analysis::{summarize, summarize_one};
use crate::cli::Section;
use crate::config::Config;
use crate::models::{Curve, ExperimentKey, Heatmap, LineChart, Method, ReportMatrix, Statistic};
use crate::naming::{escape, file_list};
use crate::store::ResultsStore;
use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{debug, info};

/// y range of the line charts, in meters.
pub const ERROR_RANGE: (f64, f64) = (0.0, 1.4);

const NOISE_LABEL: &str = "GPS Noise σ_G [m]";
const FREQUENCY_LABEL: &str = "GPS Frequency f_G [Hz]";
const ERROR_LABEL: &str = "Position Error e_p [m]";

/// Inputs shared by all sections.
pub struct SectionContext<'a> {
    pub store: &'a ResultsStore,
    pub config: &'a Config,
    pub statistic: Statistic,
    sigmas: Vec<f64>,
}

impl<'a> SectionContext<'a> {
    pub fn new(store: &'a ResultsStore, config: &'a Config) -> Self {
        Self {
            store,
            config,
            statistic: config.summary.statistic,
            sigmas: config.experiment.sigma.values(),
        }
    }

    /// Noise levels of the sweep.
    pub fn sigmas(&self) -> &[f64] {
        &self.sigmas
    }

    /// Frequencies in configured order.
    pub fn freqs(&self) -> &[u32] {
        &self.config.experiment.frequencies
    }

    fn key(&self, freq_hz: u32, sigma: f64, method: Method) -> ExperimentKey<'a> {
        let experiment = &self.config.experiment;
        ExperimentKey {
            results_path: &experiment.results_path,
            traj: &experiment.traj,
            freq_hz,
            run_tag: &experiment.run_tag,
            sigma,
            profile: experiment.methods.get(method),
            method,
        }
    }

    /// Name template over the noise levels of one frequency and method.
    fn sigma_template(&self, freq_hz: u32, method: Method) -> String {
        let experiment = &self.config.experiment;
        let profile = experiment.methods.get(method);
        format!(
            "{}({:02}Hz,{})({{value:.1}},{}m,{:.2}).{{method}}.*.csv",
            escape(&experiment.traj),
            freq_hz,
            escape(&experiment.run_tag),
            profile.offset,
            profile.bias
        )
    }

    fn sigma_patterns(&self, freq_hz: u32, method: Method) -> Result<Vec<String>> {
        let template = self.sigma_template(freq_hz, method);
        Ok(file_list(
            &template,
            &self.sigmas,
            &[method.code()],
            &self.config.experiment.results_path,
        )?)
    }

    /// Position error of one method at every noise level.
    fn sigma_errors(&self, freq_hz: u32, method: Method) -> Result<Vec<f64>> {
        let patterns = self.sigma_patterns(freq_hz, method)?;
        let values = summarize(self.store, &patterns, self.statistic)
            .with_context(|| format!("{} at {:02}Hz", method, freq_hz))?;
        Ok(values.iter().map(|v| v.position_error()).collect())
    }

    /// Position error of one method at one frequency and noise level.
    fn point_error(&self, freq_hz: u32, sigma: f64, method: Method) -> Result<f64> {
        let pattern = self.key(freq_hz, sigma, method).pattern();
        let value = summarize_one(self.store, &pattern, self.statistic)
            .with_context(|| format!("{} at {:02}Hz, sigma {:.1}", method, freq_hz, sigma))?;
        Ok(value.position_error())
    }
}

fn span<T: Copy + Into<f64>>(values: &[T]) -> (f64, f64) {
    match (values.first(), values.last()) {
        (Some(&a), Some(&b)) => (a.into(), b.into()),
        _ => (0.0, 1.0),
    }
}

/// Position error w.r.t. GPS noise, one chart per frequency.
pub fn noise_sweep(ctx: &SectionContext<'_>) -> Result<Vec<LineChart>> {
    info!("Position error w.r.t. GPS noise");

    let mut charts = Vec::with_capacity(ctx.freqs().len());
    for &freq in ctx.freqs() {
        let curves = Method::ALL
            .iter()
            .map(|&method| {
                Ok(Curve {
                    method,
                    values: ctx.sigma_errors(freq, method)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let freq_label = format!("{:02}Hz", freq);
        charts.push(LineChart {
            title: format!("GPS Frequency: {}", freq_label),
            file_stem: format!("e_p-sigma(freq{})", freq_label),
            x_label: NOISE_LABEL.to_string(),
            y_label: ERROR_LABEL.to_string(),
            x: ctx.sigmas().to_vec(),
            x_range: span(ctx.sigmas()),
            y_range: ERROR_RANGE,
            x_precision: 1,
            curves,
        });
    }

    Ok(charts)
}

/// Position error w.r.t. GPS frequency, one chart per noise level.
pub fn frequency_sweep(ctx: &SectionContext<'_>) -> Result<Vec<LineChart>> {
    info!("Position error w.r.t. GPS frequency");

    let freqs: Vec<f64> = ctx.freqs().iter().map(|&f| f64::from(f)).collect();

    let mut charts = Vec::with_capacity(ctx.sigmas().len());
    for &sigma in ctx.sigmas() {
        let mut curves: Vec<Curve> = Method::ALL
            .iter()
            .map(|&method| Curve {
                method,
                values: Vec::with_capacity(freqs.len()),
            })
            .collect();

        for &freq in ctx.freqs() {
            for curve in curves.iter_mut() {
                curve.values.push(ctx.point_error(freq, sigma, curve.method)?);
            }
        }

        let sigma_label = format!("{:.1}", sigma);
        charts.push(LineChart {
            title: format!("GPS Noise: {}", sigma_label),
            file_stem: format!("e_p-freq(sigma{})", sigma_label),
            x_label: FREQUENCY_LABEL.to_string(),
            y_label: ERROR_LABEL.to_string(),
            x: freqs.clone(),
            x_range: span(&freqs),
            y_range: ERROR_RANGE,
            x_precision: 0,
            curves,
        });
    }

    Ok(charts)
}

/// Position error w.r.t. GPS noise and frequency.
///
/// Produces the CV, HT and ZG matrices followed by HT - CV, ZG - CV and
/// HT - ZG. Rows run from the highest frequency down.
pub fn joint_heatmaps(ctx: &SectionContext<'_>) -> Result<Vec<Heatmap>> {
    info!("Position error w.r.t. GPS noise and frequency");

    let mut freqs = ctx.freqs().to_vec();
    freqs.sort_unstable_by(|a, b| b.cmp(a));
    freqs.dedup();

    let mut cv = ReportMatrix::new();
    let mut ht = ReportMatrix::new();
    let mut zg = ReportMatrix::new();
    for &freq in &freqs {
        cv.push_row(ctx.sigma_errors(freq, Method::Cv)?)?;
        ht.push_row(ctx.sigma_errors(freq, Method::Ht)?)?;
        zg.push_row(ctx.sigma_errors(freq, Method::Zg)?)?;
    }
    debug!("Heatmap matrices are {:?}", cv.shape());

    let heatmap = &ctx.config.heatmap;
    let differences = [
        ("HT - CV", ht.difference(&cv)?, heatmap.dp_range),
        ("ZG - CV", zg.difference(&cv)?, heatmap.dp_range),
        ("HT - ZG", ht.difference(&zg)?, heatmap.dp_range),
    ];
    let raw = [
        ("CV", cv, heatmap.ep_range),
        ("HT", ht, heatmap.ep_range),
        ("ZG", zg, heatmap.ep_range),
    ];

    Ok(raw
        .into_iter()
        .chain(differences)
        .map(|(title, matrix, range)| Heatmap {
            title: title.to_string(),
            file_stem: format!("freq-sigma({})", title),
            x_label: NOISE_LABEL.to_string(),
            y_label: FREQUENCY_LABEL.to_string(),
            sigmas: ctx.sigmas().to_vec(),
            freqs: freqs.clone(),
            matrix,
            range,
        })
        .collect())
}

/// Every pattern the given sections look up, without duplicates.
pub fn planned_patterns(ctx: &SectionContext<'_>, sections: &[Section]) -> Result<Vec<String>> {
    let mut patterns = Vec::new();

    for section in sections {
        match section {
            Section::Noise => {
                for &freq in ctx.freqs() {
                    for method in Method::ALL {
                        patterns.extend(ctx.sigma_patterns(freq, method)?);
                    }
                }
            }
            Section::Frequency => {
                for &sigma in ctx.sigmas() {
                    for &freq in ctx.freqs() {
                        for method in Method::ALL {
                            patterns.push(ctx.key(freq, sigma, method).pattern());
                        }
                    }
                }
            }
            Section::Heatmap => {
                for &freq in ctx.freqs().iter().rev() {
                    for method in Method::ESTIMATORS {
                        patterns.extend(ctx.sigma_patterns(freq, method)?);
                    }
                }
            }
        }
    }

    let mut seen = HashSet::new();
    patterns.retain(|p| seen.insert(p.clone()));
    Ok(patterns)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_sigma_template_matches_experiment_key() {
        let config = small_config();
        let store = ResultsStore::default();
        let ctx = SectionContext::new(&store, &config);

        for method in Method::ALL {
            let patterns = ctx.sigma_patterns(2, method).unwrap();
            let expected: Vec<String> = ctx
                .sigmas()
                .iter()
                .map(|&s| ctx.key(2, s, method).pattern())
                .collect();
            assert_eq!(patterns, expected);
        }
    }

    #[test]
    fn test_noise_sweep() {
        let config = small_config();
        let store = synthetic_store(&config);
        let ctx = SectionContext::new(&store, &config);

        let charts = noise_sweep(&ctx).unwrap();
        assert_eq!(charts.len(), 3);

        let chart = &charts[1];
        assert_eq!(chart.title, "GPS Frequency: 02Hz");
        assert_eq!(chart.file_stem, "e_p-sigma(freq02Hz)");
        assert_eq!(chart.x, vec![0.1, 0.2, 0.3]);
        assert_eq!(chart.x_range, (0.1, 0.3));
        assert_eq!(chart.y_range, (0.0, 1.4));
        assert_eq!(chart.curves.len(), 4);

        for curve in &chart.curves {
            for (i, &sigma) in chart.x.iter().enumerate() {
                assert_close(curve.values[i], expected_error(curve.method, 2, sigma));
            }
        }
    }

    #[test]
    fn test_frequency_sweep() {
        let config = small_config();
        let store = synthetic_store(&config);
        let ctx = SectionContext::new(&store, &config);

        let charts = frequency_sweep(&ctx).unwrap();
        assert_eq!(charts.len(), 3);

        let chart = &charts[2];
        assert_eq!(chart.title, "GPS Noise: 0.3");
        assert_eq!(chart.file_stem, "e_p-freq(sigma0.3)");
        assert_eq!(chart.x, vec![1.0, 2.0, 4.0]);
        assert_eq!(chart.x_precision, 0);

        let zg = chart.curves.iter().find(|c| c.method == Method::Zg).unwrap();
        assert_close(zg.values[0], expected_error(Method::Zg, 1, 0.3));
        assert_close(zg.values[2], expected_error(Method::Zg, 4, 0.3));
    }

    #[test]
    fn test_joint_heatmaps() {
        let config = small_config();
        let store = synthetic_store(&config);
        let ctx = SectionContext::new(&store, &config);

        let maps = joint_heatmaps(&ctx).unwrap();
        let titles: Vec<&str> = maps.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, ["CV", "HT", "ZG", "HT - CV", "ZG - CV", "HT - ZG"]);

        for map in &maps {
            assert_eq!(map.matrix.shape(), (3, 3));
            assert_eq!(map.freqs, vec![4, 2, 1]);
        }
        assert_eq!(maps[0].range, (0.0, 1.2));
        assert_eq!(maps[3].range, (-0.2, 0.2));
        assert_eq!(maps[4].file_stem, "freq-sigma(ZG - CV)");

        // Row 0 is the highest frequency.
        let cv_top_left = maps[0].matrix.get(0, 0).unwrap();
        assert_close(cv_top_left, expected_error(Method::Cv, 4, 0.1));

        let ht_minus_cv = maps[3].matrix.get(1, 2).unwrap();
        assert_close(
            ht_minus_cv,
            expected_error(Method::Ht, 2, 0.3) - expected_error(Method::Cv, 2, 0.3),
        );
    }

    #[test]
    fn test_missing_runs_fail_the_section() {
        let config = small_config();
        let mut bigger = config.clone();
        bigger.experiment.frequencies = vec![1, 2, 4, 8];
        let store = synthetic_store(&config);
        let ctx = SectionContext::new(&store, &bigger);

        let err = noise_sweep(&ctx).unwrap_err();
        assert!(format!("{:#}", err).contains("08Hz"));
    }

    #[test]
    fn test_planned_patterns() {
        let config = small_config();
        let store = ResultsStore::default();
        let ctx = SectionContext::new(&store, &config);

        // 3 freqs x 3 sigmas x 4 methods
        let all = planned_patterns(&ctx, &Section::ALL).unwrap();
        assert_eq!(all.len(), 36);

        let heatmap = planned_patterns(&ctx, &[Section::Heatmap]).unwrap();
        assert_eq!(heatmap.len(), 27);
        assert!(heatmap.iter().all(|p| !p.contains(".GPS.")));
    }
}
