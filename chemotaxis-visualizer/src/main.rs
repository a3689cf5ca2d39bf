use anyhow::{Context, Result};
use chemotaxis_common::RunReport;
use clap::Parser;
use env_logger::Builder;
use log::{info, warn, LevelFilter};
use plotters::prelude::*;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input report file path (.json, .bin or .msgpack)
    #[arg(short, long)]
    input: PathBuf,

    /// Directory the figures are written to
    #[arg(short, long, default_value = "figures")]
    output_dir: PathBuf,

    /// Width of each figure in pixels
    #[arg(long, default_value_t = 1000)]
    width: u32,

    /// Height of each figure in pixels
    #[arg(long, default_value_t = 1000)]
    height: u32,

    /// Number of bins in the threshold histogram
    #[arg(long, default_value_t = 50)]
    bins: usize,
}

/// Serialized report layouts the engine can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Json,
    Bincode,
    MessagePack,
}

impl ReportFormat {
    /// Picks the layout from the file extension.
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(ReportFormat::Json),
            "bin" | "bincode" => Some(ReportFormat::Bincode),
            "msgpack" | "mpk" => Some(ReportFormat::MessagePack),
            _ => None,
        }
    }
}

fn load_report(path: &Path) -> Result<RunReport> {
    let format = ReportFormat::from_path(path)
        .with_context(|| format!("Cannot infer report format from '{}'", path.display()))?;
    let file = File::open(path).with_context(|| format!("Failed to open input file: {}", path.display()))?;
    let reader = BufReader::new(file);
    let report = match format {
        ReportFormat::Json => serde_json::from_reader(reader).context("Failed to parse JSON report")?,
        ReportFormat::Bincode => bincode::deserialize_from(reader).context("Failed to parse bincode report")?,
        ReportFormat::MessagePack => rmp_serde::from_read(reader).context("Failed to parse MessagePack report")?,
    };
    Ok(report)
}

/// Maps `value` in [0, 1] to a blue (low) to red (high) color.
fn heat_color(value: f64) -> HSLColor {
    let v = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    HSLColor((1.0 - v) * 240.0 / 360.0, 0.85, 0.5)
}

/// Bin edges and counts over `[lo, hi]`. Values outside the range land in the
/// edge bins.
fn histogram(values: &[f64], bins: usize, lo: f64, hi: f64) -> Vec<(f64, f64, usize)> {
    if bins == 0 || !(hi > lo) {
        return Vec::new();
    }
    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = ((v - lo) / width).floor();
        let idx = if idx < 0.0 { 0 } else { (idx as usize).min(bins - 1) };
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| (lo + i as f64 * width, lo + (i + 1) as f64 * width, c))
        .collect()
}

fn plot_error<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow::anyhow!("Plotting failed: {}", e)
}

/// Half-spacing of a sorted axis, used to size heatmap cells.
fn half_step(axis: &[f64]) -> f64 {
    if axis.len() < 2 {
        0.5
    } else {
        (axis[axis.len() - 1] - axis[0]) / (axis.len() - 1) as f64 / 2.0
    }
}

/// Heatmap over distance (x) and time in minutes (y), normalized by `max_value`.
fn draw_heatmap(
    path: &Path,
    size: (u32, u32),
    caption: &str,
    distances: &[f64],
    times_min: &[f64],
    values: &[f64],
    max_value: f64,
) -> Result<()> {
    let (Some(&d_first), Some(&d_last)) = (distances.first(), distances.last()) else {
        warn!("Empty distance axis; skipping {}", path.display());
        return Ok(());
    };
    let (Some(&t_first), Some(&t_last)) = (times_min.first(), times_min.last()) else {
        warn!("Empty time axis; skipping {}", path.display());
        return Ok(());
    };
    let dx = half_step(distances);
    let dy = half_step(times_min);

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d((d_first - dx)..(d_last + dx), (t_first - dy)..(t_last + dy))
        .map_err(plot_error)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Distance from secretion source (um)")
        .y_desc("Time (min)")
        .draw()
        .map_err(plot_error)?;

    let scale = if max_value > 0.0 { max_value } else { 1.0 };
    let columns = distances.len();
    chart
        .draw_series(values.iter().enumerate().map(|(i, &v)| {
            let d = distances[i % columns];
            let t = times_min[i / columns];
            Rectangle::new([(d - dx, t - dy), (d + dx, t + dy)], heat_color(v / scale).filled())
        }))
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn draw_cdf(path: &Path, size: (u32, u32), report: &RunReport) -> Result<()> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Chemotactic sensitivity threshold CDF", ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..1.0, 0.0..1.0)
        .map_err(plot_error)?;
    chart
        .configure_mesh()
        .x_desc("Normalized threshold")
        .y_desc("Cumulative probability")
        .draw()
        .map_err(plot_error)?;
    chart
        .draw_series(LineSeries::new(report.cdf_curve.iter().copied(), &BLUE))
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn draw_threshold_histogram(path: &Path, size: (u32, u32), report: &RunReport, bins: usize) -> Result<()> {
    let thresholds = report.pooled_thresholds();
    if thresholds.is_empty() {
        warn!("Report holds no sampled thresholds; skipping {}", path.display());
        return Ok(());
    }
    // Legacy logistic draws are unbounded; widen the axis to cover them.
    let lo = thresholds.iter().copied().fold(0.0, f64::min);
    let hi = thresholds.iter().copied().fold(1.0, f64::max);
    let counts = histogram(&thresholds, bins, lo, hi);
    let peak = counts.iter().map(|c| c.2).max().unwrap_or(1).max(1);

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Sampled thresholds ({} agents)", thresholds.len()), ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(lo..hi, 0usize..peak + peak / 10 + 1)
        .map_err(plot_error)?;
    chart
        .configure_mesh()
        .x_desc("Normalized threshold")
        .y_desc("Agents")
        .draw()
        .map_err(plot_error)?;
    chart
        .draw_series(counts.iter().map(|&(x0, x1, c)| Rectangle::new([(x0, 0), (x1, c)], BLUE.mix(0.6).filled())))
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    run_with_args(args)
}

fn run_with_args(args: Args) -> Result<()> {
    // Initialize logger
    Builder::from_default_env()
        .filter(None, LevelFilter::Info)
        .init();

    info!("Starting Chemotaxis Visualizer...");
    info!("Input file: {}", args.input.display());
    info!("Output directory: {}", args.output_dir.display());

    let start_time = Instant::now();
    let report = load_report(&args.input)?;
    info!(
        "Loaded report: {} x {} concentration grid, {} repetitions",
        report.concentration.times.len(),
        report.concentration.distances.len(),
        report.repetitions.len()
    );

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create output directory: {}", args.output_dir.display()))?;

    let size = (args.width, args.height);
    let times_min: Vec<f64> = report.concentration.times.iter().map(|t| t / 60.0).collect();
    let heatmap_path = args.output_dir.join("concentration_heatmap.png");
    let activation_path = args.output_dir.join("activation_heatmap.png");
    let cdf_path = args.output_dir.join("sensitivity_cdf.png");
    let histogram_path = args.output_dir.join("threshold_histogram.png");

    // Figures are independent; render them in parallel.
    let ((heatmap, activation), (cdf, hist)) = rayon::join(
        || {
            rayon::join(
                || {
                    draw_heatmap(
                        &heatmap_path,
                        size,
                        "Attractant concentration",
                        &report.concentration.distances,
                        &times_min,
                        &report.concentration.values,
                        report.concentration.max_value(),
                    )
                },
                || {
                    draw_heatmap(
                        &activation_path,
                        size,
                        "Fraction of agents above threshold",
                        &report.concentration.distances,
                        &times_min,
                        &report.activation,
                        1.0,
                    )
                },
            )
        },
        || {
            rayon::join(
                || draw_cdf(&cdf_path, size, &report),
                || draw_threshold_histogram(&histogram_path, size, &report, args.bins),
            )
        },
    );
    heatmap?;
    activation?;
    cdf?;
    hist?;

    info!("Figures rendered in {:.2?}", start_time.elapsed());
    Ok(())
}

// Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(ReportFormat::from_path(Path::new("run_report.json")), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::from_path(Path::new("run_report.bin")), Some(ReportFormat::Bincode));
        assert_eq!(ReportFormat::from_path(Path::new("run_report.MSGPACK")), Some(ReportFormat::MessagePack));
        assert_eq!(ReportFormat::from_path(Path::new("run_report.xml")), None);
        assert_eq!(ReportFormat::from_path(Path::new("run_report")), None);
    }

    #[test]
    fn histogram_covers_every_value() {
        let values = [0.0, 0.1, 0.2, 0.5, 0.99, 1.0];
        let bins = histogram(&values, 4, 0.0, 1.0);
        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().map(|b| b.2).sum::<usize>(), values.len());
        assert_eq!(bins[3].2, 2);
        assert!(histogram(&values, 0, 0.0, 1.0).is_empty());
    }

    #[test]
    fn heat_color_spans_blue_to_red() {
        assert_eq!(heat_color(0.0).0, 240.0 / 360.0);
        assert_eq!(heat_color(1.0).0, 0.0);
        assert_eq!(heat_color(f64::NAN).0, heat_color(0.0).0);
    }

    #[test]
    fn half_step_of_uniform_axis() {
        assert_eq!(half_step(&[1.0, 2.0, 3.0]), 0.5);
        assert_eq!(half_step(&[4.0]), 0.5);
    }
}
