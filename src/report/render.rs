//! Figure output.
//!
//! Figures are either written as PNG/SVG files with plotters or, when the
//! output toggle is empty, printed to the terminal as text tables.

use crate::config::{HeatmapConfig, OutputConfig, OutputMode};
use crate::models::{Heatmap, LineChart, Method};
use anyhow::{Context, Result};
use plotters::coord::combinators::BindKeyPoints;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

const FONT: &str = "sans-serif";
const COLORBAR_WIDTH: u32 = 120;
const COLORBAR_STEPS: usize = 120;
const DASHES_PER_AXIS: f64 = 40.0;

/// Diverging red-grey scale, low to high.
const RDGY: [RGBColor; 11] = [
    RGBColor(103, 0, 31),
    RGBColor(178, 24, 43),
    RGBColor(214, 96, 77),
    RGBColor(244, 165, 130),
    RGBColor(253, 219, 199),
    RGBColor(255, 255, 255),
    RGBColor(224, 224, 224),
    RGBColor(186, 186, 186),
    RGBColor(135, 135, 135),
    RGBColor(77, 77, 77),
    RGBColor(26, 26, 26),
];

/// Curve color of a method.
pub fn method_color(method: Method) -> RGBColor {
    match method {
        Method::Gps => BLACK,
        Method::Cv => RGBColor(0, 0, 255),
        Method::Ht => RGBColor(0, 128, 0),
        Method::Zg => RGBColor(255, 0, 0),
    }
}

/// Map a value onto the red-grey scale, clamping outside `range`.
pub fn colormap(value: f64, range: (f64, f64)) -> RGBColor {
    let (lo, hi) = range;
    let t = ((value - lo) / (hi - lo)).clamp(0.0, 1.0);
    let pos = t * (RDGY.len() - 1) as f64;
    let i = (pos.floor() as usize).min(RDGY.len() - 2);
    let frac = pos - i as f64;

    let RGBColor(r0, g0, b0) = RDGY[i];
    let RGBColor(r1, g1, b1) = RDGY[i + 1];
    let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * frac).round() as u8;
    RGBColor(lerp(r0, r1), lerp(g0, g1), lerp(b0, b1))
}

/// Plot extent `(x0, x1, y0, y1)` with every cell centered on its value.
fn heatmap_extent(map: &Heatmap) -> (f64, f64, f64, f64) {
    let half_x = match map.sigmas.as_slice() {
        [a, b, ..] => (b - a).abs() / 2.0,
        _ => 0.05,
    };
    let x_min = map.sigmas.iter().copied().fold(f64::INFINITY, f64::min);
    let x_max = map.sigmas.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let y_min = map.freqs.iter().copied().min().unwrap_or(0);
    let y_max = map.freqs.iter().copied().max().unwrap_or(0);

    (
        x_min - half_x,
        x_max + half_x,
        f64::from(y_min) - 0.5,
        f64::from(y_max) + 0.5,
    )
}

/// Cut a polyline into dashes `dash` x-units long, separated by equal gaps.
fn dashes(points: &[(f64, f64)], dash: f64) -> Vec<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    let mut on = true;
    let mut left = dash;

    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        let len = b.0 - a.0;
        if !(len > 0.0) || !(dash > 0.0) {
            continue;
        }
        if on && current.is_empty() {
            current.push(a);
        }

        let mut t = 0.0;
        while len - t > left {
            t += left;
            let p = (a.0 + t, a.1 + (b.1 - a.1) * t / len);
            if on {
                current.push(p);
                out.push(std::mem::take(&mut current));
            } else {
                current = vec![p];
            }
            on = !on;
            left = dash;
        }
        left -= len - t;
        if on {
            current.push(b);
        }
    }

    if current.len() > 1 {
        out.push(current);
    }
    out
}

/// Flush a drawing area once its figure is drawn.
fn present<DB>(root: &DrawingArea<DB, Shift>, drawn: Result<()>) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    drawn?;
    root.present()?;
    Ok(())
}

/// Tick positions of a heatmap: every second noise level and every second
/// frequency, lowest first.
fn heatmap_ticks(map: &Heatmap) -> (Vec<f64>, Vec<f64>) {
    let sigmas = map.sigmas.iter().step_by(2).copied().collect();

    let mut freqs = map.freqs.clone();
    freqs.sort_unstable();
    let freqs = freqs.iter().step_by(2).map(|&f| f64::from(f)).collect();

    (sigmas, freqs)
}

/// Vertical extent of each heatmap row, in the order of `freqs`.
///
/// Rows meet halfway between neighbouring frequencies; the outermost rows
/// reach half a hertz past their frequency.
fn row_bounds(freqs: &[u32]) -> Vec<(f64, f64)> {
    freqs
        .iter()
        .map(|&freq| {
            let f = f64::from(freq);
            let below = freqs.iter().copied().filter(|&g| g < freq).max();
            let above = freqs.iter().copied().filter(|&g| g > freq).min();
            let lo = below.map_or(f - 0.5, |g| (f + f64::from(g)) / 2.0);
            let hi = above.map_or(f + 0.5, |g| (f + f64::from(g)) / 2.0);
            (lo, hi)
        })
        .collect()
}

/// Widen a degenerate axis range.
fn padded((lo, hi): (f64, f64)) -> (f64, f64) {
    if hi > lo {
        (lo, hi)
    } else {
        (lo - 0.5, hi + 0.5)
    }
}

/// Writes or previews figures.
#[derive(Debug, Clone)]
pub struct Renderer {
    mode: OutputMode,
    save_path: PathBuf,
    font_size: u32,
    line_width: u32,
    width: u32,
    height: u32,
    aspect: f64,
}

impl Renderer {
    pub fn new(output: &OutputConfig, heatmap: &HeatmapConfig) -> Result<Self> {
        Ok(Self {
            mode: output.mode()?,
            save_path: output.save_path.clone(),
            font_size: output.font_size,
            line_width: output.line_width,
            width: output.width,
            height: output.height,
            aspect: heatmap.aspect,
        })
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    /// Create the report directory when files will be written.
    pub fn prepare(&self) -> Result<()> {
        if self.mode.extension().is_some() {
            std::fs::create_dir_all(&self.save_path).with_context(|| {
                format!("Failed to create report directory {}", self.save_path.display())
            })?;
        }
        Ok(())
    }

    /// `<save_path>/<stem>.<ext>`, or `None` in preview mode.
    pub fn output_path(&self, stem: &str) -> Option<PathBuf> {
        self.mode
            .extension()
            .map(|ext| self.save_path.join(format!("{}.{}", stem, ext)))
    }

    /// Emit a line chart. Returns the written file, if any.
    pub fn line_chart(&self, chart: &LineChart) -> Result<Option<PathBuf>> {
        let Some(path) = self.output_path(&chart.file_stem) else {
            println!("{}", preview_line_chart(chart));
            return Ok(None);
        };

        let size = (self.width, self.height);
        let drawn = match self.mode {
            OutputMode::Svg => {
                let root = SVGBackend::new(&path, size).into_drawing_area();
                let drawn = self.draw_line_chart(&root, chart);
                present(&root, drawn)
            }
            _ => {
                let root = BitMapBackend::new(&path, size).into_drawing_area();
                let drawn = self.draw_line_chart(&root, chart);
                present(&root, drawn)
            }
        };
        drawn.with_context(|| format!("Failed to render {}", path.display()))?;

        debug!("Wrote {}", path.display());
        Ok(Some(path))
    }

    /// Emit a heatmap. Returns the written file, if any.
    pub fn heatmap(&self, map: &Heatmap) -> Result<Option<PathBuf>> {
        let Some(path) = self.output_path(&map.file_stem) else {
            println!("{}", preview_heatmap(map));
            return Ok(None);
        };

        let size = self.heatmap_size(map);
        let drawn = match self.mode {
            OutputMode::Svg => {
                let root = SVGBackend::new(&path, size).into_drawing_area();
                let drawn = self.draw_heatmap(&root, map);
                present(&root, drawn)
            }
            _ => {
                let root = BitMapBackend::new(&path, size).into_drawing_area();
                let drawn = self.draw_heatmap(&root, map);
                present(&root, drawn)
            }
        };
        drawn.with_context(|| format!("Failed to render {}", path.display()))?;

        debug!("Wrote {}", path.display());
        Ok(Some(path))
    }

    fn label_area(&self) -> u32 {
        self.font_size * 4 + 10
    }

    /// Figure size giving the plot area the configured data aspect.
    fn heatmap_size(&self, map: &Heatmap) -> (u32, u32) {
        let (x0, x1, y0, y1) = heatmap_extent(map);
        let ratio = ((y1 - y0) * self.aspect / (x1 - x0)).clamp(0.25, 4.0);

        let plot_width = self
            .width
            .saturating_sub(COLORBAR_WIDTH + self.label_area() + 30);
        let plot_height = (f64::from(plot_width) * ratio).round() as u32;
        let chrome = self.label_area() + self.font_size * 2 + 40;
        (self.width, (plot_height + chrome).max(200))
    }

    fn draw_line_chart<DB>(&self, root: &DrawingArea<DB, Shift>, chart: &LineChart) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;

        let (x0, x1) = padded(chart.x_range);
        let (y0, y1) = padded(chart.y_range);
        let fs = self.font_size;
        let lw = self.line_width;

        let mut cc = ChartBuilder::on(root)
            .caption(&chart.title, (FONT, fs + 4))
            .margin(15)
            .x_label_area_size(fs * 3 + 10)
            .y_label_area_size(self.label_area())
            .build_cartesian_2d(x0..x1, y0..y1)?;

        let precision = chart.x_precision;
        let x_fmt = |v: &f64| format!("{:.*}", precision, v);
        cc.configure_mesh()
            .x_labels(chart.x.len().max(2))
            .x_label_formatter(&x_fmt)
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .label_style((FONT, fs))
            .axis_desc_style((FONT, fs))
            .light_line_style(WHITE.mix(0.0))
            .bold_line_style(BLACK.mix(0.5))
            .draw()?;

        for curve in &chart.curves {
            let color = method_color(curve.method);
            let points: Vec<(f64, f64)> = chart
                .x
                .iter()
                .copied()
                .zip(curve.values.iter().copied())
                .filter(|(_, y)| y.is_finite())
                .collect();

            let anno = if curve.method == Method::Gps {
                let dash = (x1 - x0) / DASHES_PER_AXIS;
                cc.draw_series(
                    dashes(&points, dash)
                        .into_iter()
                        .map(|d| PathElement::new(d, color.stroke_width(lw))),
                )?
            } else {
                cc.draw_series(LineSeries::new(points, color.stroke_width(lw)))?
            };
            anno.label(curve.method.code()).legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(lw))
            });
        }

        cc.configure_series_labels()
            .label_font((FONT, fs))
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK.mix(0.2))
            .position(SeriesLabelPosition::UpperLeft)
            .draw()?;

        Ok(())
    }

    fn draw_heatmap<DB>(&self, root: &DrawingArea<DB, Shift>, map: &Heatmap) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;

        let (x0, x1, y0, y1) = heatmap_extent(map);
        let half_x = (x1 - x0) / (2.0 * map.sigmas.len().max(1) as f64);
        let fs = self.font_size;
        let (plot_area, bar_area) =
            root.split_horizontally(self.width.saturating_sub(COLORBAR_WIDTH));

        let (x_ticks, y_ticks) = heatmap_ticks(map);
        let (x_count, y_count) = (x_ticks.len(), y_ticks.len());

        let mut cc = ChartBuilder::on(&plot_area)
            .caption(&map.title, (FONT, fs + 4))
            .margin(15)
            .x_label_area_size(fs * 3 + 10)
            .y_label_area_size(self.label_area())
            .build_cartesian_2d(
                (x0..x1).with_key_points(x_ticks),
                (y0..y1).with_key_points(y_ticks),
            )?;

        let x_fmt = |v: &f64| format!("{:.1}", v);
        let y_fmt = |v: &f64| format!("{:.0}", v);
        cc.configure_mesh()
            .disable_mesh()
            .x_labels(x_count)
            .y_labels(y_count)
            .x_label_formatter(&x_fmt)
            .y_label_formatter(&y_fmt)
            .x_desc(map.x_label.as_str())
            .y_desc(map.y_label.as_str())
            .label_style((FONT, fs))
            .axis_desc_style((FONT, fs))
            .draw()?;

        let range = map.range;
        let bounds = row_bounds(&map.freqs);
        cc.draw_series(
            map.matrix
                .rows()
                .iter()
                .zip(bounds)
                .flat_map(|(row, (lo, hi))| {
                    row.iter()
                        .zip(&map.sigmas)
                        .filter(|(v, _)| v.is_finite())
                        .map(move |(&v, &s)| {
                            Rectangle::new(
                                [(s - half_x, lo), (s + half_x, hi)],
                                colormap(v, range).filled(),
                            )
                        })
                }),
        )?;

        let (lo, hi) = range;
        let mut bar = ChartBuilder::on(&bar_area)
            .margin_top(fs * 2 + 25)
            .margin_bottom(fs * 3 + 25)
            .margin_left(10)
            .margin_right(5)
            .right_y_label_area_size(fs * 3 + 20)
            .build_cartesian_2d(0.0..1.0, lo..hi)?;

        let bar_fmt = |v: &f64| format!("{:.2}", v);
        bar.configure_mesh()
            .disable_mesh()
            .disable_x_axis()
            .y_labels(5)
            .y_label_formatter(&bar_fmt)
            .label_style((FONT, fs))
            .draw()?;

        let step = (hi - lo) / COLORBAR_STEPS as f64;
        bar.draw_series((0..COLORBAR_STEPS).map(|i| {
            let a = lo + step * i as f64;
            let b = a + step;
            Rectangle::new([(0.0, a), (1.0, b)], colormap((a + b) / 2.0, range).filled())
        }))?;

        Ok(())
    }
}

fn format_cell(v: f64) -> String {
    if v.is_finite() {
        format!("{:.3}", v)
    } else {
        "-".to_string()
    }
}

/// Text table of a line chart: one row per x value, one column per method.
pub fn preview_line_chart(chart: &LineChart) -> String {
    let mut out = String::new();

    out.push_str(&format!("\n{}\n", chart.title));
    out.push_str(&format!("{} vs {}\n", chart.y_label, chart.x_label));

    out.push_str(&format!("{:>8}", "x"));
    for curve in &chart.curves {
        out.push_str(&format!(" {:>8}", curve.method.code()));
    }
    out.push('\n');

    for (i, x) in chart.x.iter().enumerate() {
        out.push_str(&format!("{:>8.*}", chart.x_precision, x));
        for curve in &chart.curves {
            let v = curve.values.get(i).copied().unwrap_or(f64::NAN);
            out.push_str(&format!(" {:>8}", format_cell(v)));
        }
        out.push('\n');
    }

    out
}

/// Text grid of a heatmap: frequency rows, noise columns.
pub fn preview_heatmap(map: &Heatmap) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n{} (range {:.1} to {:.1})\n",
        map.title, map.range.0, map.range.1
    ));

    out.push_str(&format!("{:>6}", "Hz"));
    for sigma in &map.sigmas {
        out.push_str(&format!(" {:>7.1}", sigma));
    }
    out.push('\n');

    for (row, freq) in map.matrix.rows().iter().zip(&map.freqs) {
        out.push_str(&format!("{:>6}", freq));
        for &v in row {
            out.push_str(&format!(" {:>7}", format_cell(v)));
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::report::sections::test_support::{small_config, synthetic_store};
    use crate::report::sections::{joint_heatmaps, noise_sweep, SectionContext};

    fn renderer(save_file: &str, dir: &Path) -> Renderer {
        let mut config = Config::default();
        config.output.save_file = save_file.to_string();
        config.output.save_path = dir.to_path_buf();
        Renderer::new(&config.output, &config.heatmap).unwrap()
    }

    #[test]
    fn test_colormap_ends_and_middle() {
        assert_eq!(colormap(0.0, (0.0, 1.2)), RDGY[0]);
        assert_eq!(colormap(1.2, (0.0, 1.2)), RDGY[10]);
        assert_eq!(colormap(0.0, (-0.2, 0.2)), RGBColor(255, 255, 255));
        // Clamped outside the range.
        assert_eq!(colormap(-5.0, (-0.2, 0.2)), RDGY[0]);
        assert_eq!(colormap(5.0, (-0.2, 0.2)), RDGY[10]);
    }

    #[test]
    fn test_output_path() {
        let dir = Path::new("report_200623");
        let png = renderer("png", dir);
        assert_eq!(
            png.output_path("e_p-sigma(freq01Hz)"),
            Some(dir.join("e_p-sigma(freq01Hz).png"))
        );
        assert_eq!(renderer("", dir).output_path("x"), None);
        assert!(Renderer::new(
            &OutputConfig {
                save_file: "bmp".to_string(),
                ..OutputConfig::default()
            },
            &HeatmapConfig::default()
        )
        .is_err());
    }

    #[test]
    fn test_heatmap_extent_and_size() {
        let config = Config::default();
        let map = Heatmap {
            title: "CV".to_string(),
            file_stem: "freq-sigma(CV)".to_string(),
            x_label: String::new(),
            y_label: String::new(),
            sigmas: config.experiment.sigma.values(),
            freqs: (1..=10).rev().collect(),
            matrix: Default::default(),
            range: (0.0, 1.2),
        };

        let (x0, x1, y0, y1) = heatmap_extent(&map);
        assert!((x0 - 0.05).abs() < 1e-9);
        assert!((x1 - 1.05).abs() < 1e-9);
        assert_eq!((y0, y1), (0.5, 10.5));

        // Aspect 0.1 over a 1 x 10 extent gives a square plot area.
        let r = renderer("png", Path::new("."));
        let (w, h) = r.heatmap_size(&map);
        let plot_w = w - COLORBAR_WIDTH - r.label_area() - 30;
        let plot_h = h - r.label_area() - r.font_size * 2 - 40;
        assert_eq!(plot_w, plot_h);
    }

    #[test]
    fn test_heatmap_ticks_every_second_value() {
        let config = Config::default();
        let map = Heatmap {
            title: "CV".to_string(),
            file_stem: "freq-sigma(CV)".to_string(),
            x_label: String::new(),
            y_label: String::new(),
            sigmas: config.experiment.sigma.values(),
            freqs: (1..=10).rev().collect(),
            matrix: Default::default(),
            range: (0.0, 1.2),
        };

        let (x, y) = heatmap_ticks(&map);
        assert_eq!(x, vec![0.1, 0.3, 0.5, 0.7, 0.9]);
        assert_eq!(y, vec![1.0, 3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_row_bounds() {
        // Unit spacing gives one-hertz rows.
        assert_eq!(row_bounds(&[3, 2, 1]), vec![(2.5, 3.5), (1.5, 2.5), (0.5, 1.5)]);

        // Uneven spacing leaves no gaps between rows.
        assert_eq!(row_bounds(&[10, 5, 1]), vec![(7.5, 10.5), (3.0, 7.5), (0.5, 3.0)]);
    }

    #[test]
    fn test_dashes() {
        let d = dashes(&[(0.0, 0.0), (1.0, 2.0)], 0.25);
        assert_eq!(d, vec![vec![(0.0, 0.0), (0.25, 0.5)], vec![(0.5, 1.0), (0.75, 1.5)]]);

        // Dashes carry across vertices.
        let d = dashes(&[(0.0, 0.0), (0.125, 0.0), (0.5, 0.0)], 0.25);
        assert_eq!(d[0], vec![(0.0, 0.0), (0.125, 0.0), (0.25, 0.0)]);
        assert!(dashes(&[(0.0, 0.0)], 0.25).is_empty());
    }

    #[test]
    fn test_prepare_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report_200623");
        renderer("svg", &out).prepare().unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn test_preview_tables() {
        let config = small_config();
        let store = synthetic_store(&config);
        let ctx = SectionContext::new(&store, &config);

        let chart = &noise_sweep(&ctx).unwrap()[0];
        let text = preview_line_chart(chart);
        assert!(text.contains("GPS Frequency: 01Hz"));
        assert!(text.contains("GPS"));
        assert_eq!(text.lines().filter(|l| !l.is_empty()).count(), 3 + 3);

        let map = &joint_heatmaps(&ctx).unwrap()[3];
        let text = preview_heatmap(map);
        assert!(text.contains("HT - CV"));
        let first_row = text.lines().find(|l| l.trim_start().starts_with('4'));
        assert!(first_row.is_some());
    }

    #[test]
    fn test_preview_mode_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report");
        let config = small_config();
        let store = synthetic_store(&config);
        let ctx = SectionContext::new(&store, &config);

        let r = renderer("", &out);
        r.prepare().unwrap();
        let chart = &noise_sweep(&ctx).unwrap()[0];
        assert_eq!(r.line_chart(chart).unwrap(), None);
        assert!(!out.exists());
    }

    /// Text layout needs a system sans-serif font.
    fn fonts_available() -> bool {
        FontDesc::new(FontFamily::SansSerif, 12.0, FontStyle::Normal)
            .box_size("0.1")
            .is_ok()
    }

    /// Render the noise charts and heatmaps of the small fixture into `dir`.
    fn render_fixture(save_file: &str, dir: &Path) -> Vec<PathBuf> {
        let config = small_config();
        let store = synthetic_store(&config);
        let ctx = SectionContext::new(&store, &config);

        let r = renderer(save_file, dir);
        r.prepare().unwrap();

        let mut written = Vec::new();
        for chart in noise_sweep(&ctx).unwrap() {
            written.extend(r.line_chart(&chart).unwrap());
        }
        for map in joint_heatmaps(&ctx).unwrap() {
            written.extend(r.heatmap(&map).unwrap());
        }
        written
    }

    #[test]
    fn test_renders_svg_files() {
        if !fonts_available() {
            eprintln!("skipping: no sans-serif font");
            return;
        }
        let dir = tempfile::tempdir().unwrap();

        let written = render_fixture("svg", dir.path());
        assert_eq!(written.len(), 3 + 6);
        assert!(written.iter().all(|p| p.exists()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3 + 6);

        let chart = std::fs::read_to_string(dir.path().join("e_p-sigma(freq01Hz).svg")).unwrap();
        assert!(chart.contains("<svg"));
        assert!(chart.contains("GPS Frequency: 01Hz"));
        assert!(dir.path().join("freq-sigma(HT - ZG).svg").exists());
    }

    #[test]
    fn test_renders_png_files() {
        if !fonts_available() {
            eprintln!("skipping: no sans-serif font");
            return;
        }
        let dir = tempfile::tempdir().unwrap();

        let written = render_fixture("png", dir.path());
        assert_eq!(written.len(), 3 + 6);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3 + 6);

        let bytes = std::fs::read(dir.path().join("freq-sigma(CV).png")).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        assert!(dir.path().join("e_p-sigma(freq04Hz).png").exists());
    }
}
