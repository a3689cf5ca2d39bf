use anyhow::{Context, Result};
use std::time::Instant;
use std::fs::File;
use std::io::{BufWriter, Write};
use log::{info, error, debug};

// Define modules used by main
mod grid;
mod simulation;

use chemotaxis_common::{ChemotaxisConfig, RunReport};
use simulation::ChemotaxisRun;

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Chemotaxis Engine...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = ChemotaxisConfig::load(&config_path)?;
    info!("Loaded configuration from {}", config_path);

    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize Run ---
    let mut run = ChemotaxisRun::new(config)?;
    debug!("Model Parameters: {:#?}", run.params());

    let start_time = Instant::now();
    if let Err(e) = run.run() {
        error!("Profiling run failed: {:#}", e);
        anyhow::bail!("Profiling run failed.");
    }
    let total_duration = start_time.elapsed();
    info!("Profiling finished in {:.3} seconds.", total_duration.as_secs_f64());

    let report = run.report().context("No report recorded")?;
    for rep in &report.repetitions {
        info!(
            "Repetition {} (seed {}): {} agents, mean threshold {:.4}",
            rep.repetition,
            rep.seed,
            rep.thresholds.len(),
            rep.mean
        );
    }

    // --- Save Recorded Data ---
    info!("Saving recorded data...");
    let output = &run.config().output;
    save_report(report, &output.base_filename, &output.format)?;

    if output.save_grid_csv {
        let filename = format!("{}_concentration.csv", output.base_filename);
        save_concentration_csv(report, &filename)?;
        info!("Concentration grid saved to {}", filename);
    } else {
        info!("Skipping concentration CSV as per config.");
    }

    if output.save_thresholds_csv {
        let filename = format!("{}_thresholds.csv", output.base_filename);
        save_thresholds_csv(report, run.params().max_secretion_rate, &filename)?;
        info!("Sampled thresholds saved to {}", filename);
    } else {
        info!("Skipping thresholds CSV as per config.");
    }

    info!("Run Complete.");
    Ok(())
}

/// Writes the full report in the configured format.
fn save_report(report: &RunReport, base_filename: &str, format: &str) -> Result<()> {
    match format {
        "json" => {
            let filename = format!("{}_report.json", base_filename);
            let json_string = serde_json::to_string(report).context("Error serializing report to JSON")?;
            let mut file = File::create(&filename)
                .with_context(|| format!("Error creating report file '{}'", filename))?;
            file.write_all(json_string.as_bytes())
                .with_context(|| format!("Error writing report JSON to file '{}'", filename))?;
            info!("Report saved to {} ({} KB)", filename, json_string.len() / 1024);
        }
        "bincode" => {
            let filename = format!("{}_report.bin", base_filename);
            let file = File::create(&filename)
                .with_context(|| format!("Error creating report file '{}'", filename))?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(&mut writer, report).context("Error serializing report to bincode")?;
            writer.flush()?;
            info!("Report saved to {} (binary format)", filename);
        }
        "messagepack" => {
            let filename = format!("{}_report.msgpack", base_filename);
            let mut file = BufWriter::new(
                File::create(&filename).with_context(|| format!("Error creating report file '{}'", filename))?,
            );
            rmp_serde::encode::write(&mut file, report).context("Error serializing report to MessagePack")?;
            file.flush()?;
            info!("Report saved to {} (MessagePack format)", filename);
        }
        other => anyhow::bail!("Unknown output format: {}", other),
    }
    Ok(())
}

fn save_concentration_csv(report: &RunReport, filename: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(filename)
        .with_context(|| format!("Error creating CSV file '{}'", filename))?;
    writer.write_record(["distance_um", "time_min", "concentration"])?;
    for (d, t_s, c) in report.concentration.iter_cells() {
        writer.write_record(&[format!("{:.4}", d), format!("{:.4}", t_s / 60.0), format!("{:.6e}", c)])?;
    }
    writer.flush()?;
    Ok(())
}

fn save_thresholds_csv(report: &RunReport, max_secretion_rate: f64, filename: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(filename)
        .with_context(|| format!("Error creating CSV file '{}'", filename))?;
    writer.write_record(["repetition", "seed", "agent", "threshold", "rescaled_threshold"])?;
    for rep in &report.repetitions {
        for (agent, &threshold) in rep.thresholds.iter().enumerate() {
            writer.write_record(&[
                rep.repetition.to_string(),
                rep.seed.to_string(),
                agent.to_string(),
                format!("{:.6}", threshold),
                format!("{:.4}", threshold * max_secretion_rate),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}
