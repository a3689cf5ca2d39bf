use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::model_params::ModelParams;
use crate::sensitivity::{SensitivityDistribution, SensitivityShapeParams};
use crate::diffusion::DiffusionField;
use crate::vecmath::{arange, linspace};
use std::path::Path;

// Finest CDF axis accepted: one million points over [0, 1).
const MIN_CDF_STEP: f64 = 1e-6;

// Attractant release, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FieldConfig {
    pub diffusion_coefficient_um2_per_s: f64,
    pub quantity_secreted: f64,
}

// Distance/time mesh the field is profiled over
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GridConfig {
    pub distance_min_um: f64,
    pub distance_max_um: f64,
    pub distance_points: usize,
    pub time_min_min: f64,
    pub time_max_min: f64,
    pub time_points: usize,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityKind {
    Beta,
    Logistic,
}

// Sensitivity threshold distribution and its rescaling
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SensitivityConfig {
    #[serde(default = "default_sensitivity_kind")]
    pub kind: SensitivityKind,

    // Beta shape (used if kind == Beta)
    #[serde(default)]
    pub a: Option<f64>,
    #[serde(default)]
    pub b: Option<f64>,

    // Logistic curve (used if kind == Logistic, requires allow_legacy_logistic)
    #[serde(default)]
    pub k: Option<f64>,
    #[serde(default)]
    pub x0: Option<f64>,
    #[serde(default)]
    pub allow_legacy_logistic: bool,

    #[serde(default = "default_max_secretion_rate")]
    pub max_secretion_rate: f64,
    #[serde(default = "default_cdf_step")]
    pub cdf_step: f64,
}

// Agents drawn per repetition, one seed per repetition
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PopulationConfig {
    pub agents_per_repetition: usize,
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,
    #[serde(default)]
    pub base_seed: u64,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    #[serde(default = "default_format")]
    pub format: String, // "json", "bincode", "messagepack"
    #[serde(default = "default_true")]
    pub save_grid_csv: bool,
    #[serde(default = "default_true")]
    pub save_thresholds_csv: bool,
}

impl SensitivityConfig {
    /// Shape parameters, with unset values taken from the prototyping runs.
    pub fn shape(&self) -> SensitivityShapeParams {
        match self.kind {
            SensitivityKind::Beta => SensitivityShapeParams::Beta {
                a: self.a.unwrap_or(5.0),
                b: self.b.unwrap_or(10.0),
            },
            SensitivityKind::Logistic => SensitivityShapeParams::Logistic {
                k: self.k.unwrap_or(0.1),
                x0: self.x0.unwrap_or(0.1),
            },
        }
    }
}

// Main configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ChemotaxisConfig {
    pub field: FieldConfig,
    pub grid: GridConfig,
    pub sensitivity: SensitivityConfig,
    pub population: PopulationConfig,
    pub output: OutputConfig,
}

impl ChemotaxisConfig {
    /// Loads the configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: ChemotaxisConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        // The numeric core re-checks these, but failing here names the config key.
        DiffusionField::new(self.field.diffusion_coefficient_um2_per_s, self.field.quantity_secreted)
            .map_err(|e| anyhow::anyhow!("[field] {}", e))?;
        SensitivityDistribution::from_params(&self.sensitivity.shape(), self.sensitivity.allow_legacy_logistic)
            .map_err(|e| anyhow::anyhow!("[sensitivity] {}", e))?;

        let grid = &self.grid;
        if !(grid.distance_min_um >= 0.0) || !(grid.distance_max_um >= grid.distance_min_um) {
            anyhow::bail!("grid distances must satisfy 0 <= distance_min_um <= distance_max_um.");
        }
        if !(grid.time_min_min > 0.0) || !(grid.time_max_min >= grid.time_min_min) {
            anyhow::bail!("grid times must satisfy 0 < time_min_min <= time_max_min.");
        }
        if grid.distance_points == 0 || grid.time_points == 0 {
            anyhow::bail!("distance_points and time_points must be greater than 0.");
        }
        if !(self.sensitivity.max_secretion_rate > 0.0) || !self.sensitivity.max_secretion_rate.is_finite() {
            anyhow::bail!("max_secretion_rate must be positive and finite.");
        }
        if !(self.sensitivity.cdf_step >= MIN_CDF_STEP) || self.sensitivity.cdf_step >= 1.0 {
            anyhow::bail!("cdf_step must be in [{:e}, 1).", MIN_CDF_STEP);
        }
        if self.population.repetitions == 0 {
            anyhow::bail!("repetitions must be greater than 0.");
        }
        match self.output.format.as_str() {
            "json" | "bincode" | "messagepack" => {}
            other => anyhow::bail!("Unknown output format '{}'.", other),
        }
        Ok(())
    }

    /// Converts the configuration into the parameters used at runtime.
    pub fn get_model_params(&self) -> ModelParams {
        let grid = &self.grid;
        let distances_um = linspace(grid.distance_min_um, grid.distance_max_um, grid.distance_points);
        let times_min = linspace(grid.time_min_min, grid.time_max_min, grid.time_points);
        // The field is evaluated in seconds.
        let times_s = times_min.iter().map(|t| t * 60.0).collect();

        let seeds = (0..self.population.repetitions)
            .map(|rep| self.population.base_seed.wrapping_add(u64::from(rep)))
            .collect();

        ModelParams {
            diffusion_coefficient: self.field.diffusion_coefficient_um2_per_s,
            quantity_secreted: self.field.quantity_secreted,
            distances_um,
            times_min,
            times_s,
            sensitivity: self.sensitivity.shape(),
            allow_legacy_logistic: self.sensitivity.allow_legacy_logistic,
            max_secretion_rate: self.sensitivity.max_secretion_rate,
            cdf_points: arange(0.0, 1.0, self.sensitivity.cdf_step),
            agents_per_repetition: self.population.agents_per_repetition,
            seeds,
        }
    }
}

// Defaults follow the prototyping runs: ~40k molecules is roughly the
// secretion rate, the highest concentration likely to be encountered.
fn default_max_secretion_rate() -> f64 {
    40_000.0
}

fn default_sensitivity_kind() -> SensitivityKind {
    SensitivityKind::Beta
}

fn default_cdf_step() -> f64 {
    0.001
}

fn default_repetitions() -> u32 {
    1
}

fn default_format() -> String {
    "bincode".to_string()
}

fn default_true() -> bool {
    true
}
