use crate::sensitivity::SensitivityShapeParams;
use serde::{Deserialize, Serialize};

/// Runtime parameters derived from the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    // Field
    pub diffusion_coefficient: f64, // um^2/s
    pub quantity_secreted: f64,     // molecules

    // Evaluation mesh
    pub distances_um: Vec<f64>,
    pub times_min: Vec<f64>,
    pub times_s: Vec<f64>, // times_min * 60, what the field is evaluated at

    // Sensitivity
    pub sensitivity: SensitivityShapeParams,
    pub allow_legacy_logistic: bool,
    pub max_secretion_rate: f64,
    pub cdf_points: Vec<f64>,

    // Population
    pub agents_per_repetition: usize,
    pub seeds: Vec<u64>, // one per repetition, base_seed + repetition index
}

impl ModelParams {
    pub fn repetitions(&self) -> usize {
        self.seeds.len()
    }

    pub fn total_agents(&self) -> usize {
        self.agents_per_repetition * self.seeds.len()
    }
}
