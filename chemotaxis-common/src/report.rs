use crate::diffusion::ConcentrationGrid;
use crate::model_params::ModelParams;
use serde::{Deserialize, Serialize};

/// Thresholds drawn for one repetition of the population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepetitionSummary {
    /// Repetition index (0-based), as passed to the external engine.
    pub repetition: u32,
    /// Seed the repetition's generator was created from.
    pub seed: u64,
    /// Normalized thresholds, in draw order.
    pub thresholds: Vec<f64>,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl RepetitionSummary {
    pub fn new(repetition: u32, seed: u64, thresholds: Vec<f64>) -> Self {
        let n = thresholds.len();
        let (mean, min, max) = if n == 0 {
            (0.0, 0.0, 0.0)
        } else {
            let sum: f64 = thresholds.iter().sum();
            let min = thresholds.iter().copied().fold(f64::INFINITY, f64::min);
            let max = thresholds.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (sum / n as f64, min, max)
        };
        Self { repetition, seed, thresholds, mean, min, max }
    }
}

/// Everything one profiling run produces, written by the engine and read by
/// the visualizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Parameters the run was performed with.
    pub params: ModelParams,
    /// Concentration over the (time, distance) mesh. Times are in seconds.
    pub concentration: ConcentrationGrid,
    /// `(x, cdf(x))` over `params.cdf_points`.
    pub cdf_curve: Vec<(f64, f64)>,
    pub repetitions: Vec<RepetitionSummary>,
    /// Fraction of all sampled agents whose rescaled threshold is reached,
    /// laid out like `concentration.values`.
    pub activation: Vec<f64>,
}

impl RunReport {
    /// All thresholds across repetitions.
    pub fn pooled_thresholds(&self) -> Vec<f64> {
        self.repetitions.iter().flat_map(|r| r.thresholds.iter().copied()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_statistics() {
        let summary = RepetitionSummary::new(2, 9, vec![0.2, 0.4, 0.6]);
        assert!((summary.mean - 0.4).abs() < 1e-12);
        assert_eq!(summary.min, 0.2);
        assert_eq!(summary.max, 0.6);
    }

    #[test]
    fn empty_summary_is_zeroed() {
        let summary = RepetitionSummary::new(0, 0, Vec::new());
        assert_eq!((summary.mean, summary.min, summary.max), (0.0, 0.0, 0.0));
    }
}
