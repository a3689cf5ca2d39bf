use crate::grid::{activation_grid, sorted_thresholds};
use anyhow::{Context, Result};
use chemotaxis_common::{
    ChemotaxisConfig, ConcentrationGrid, DiffusionField, ModelParams, RepetitionSummary, RunReport,
    SensitivityDistribution,
};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

/// Profiles the attractant field and the sensitivity distribution the
/// external engine will use, for one configuration.
pub struct ChemotaxisRun {
    /// The configuration the run was built from.
    pub config: ChemotaxisConfig,
    /// Parameters derived from `config`.
    params: ModelParams,
    /// Field of a single secretion event.
    field: DiffusionField,
    /// Distribution agents draw their thresholds from.
    sensitivity: SensitivityDistribution,
    /// Result of the last call to `run`.
    recorded_report: Option<RunReport>,
}

impl ChemotaxisRun {
    /// Validates the configuration and builds the field and distribution.
    pub fn new(config: ChemotaxisConfig) -> Result<Self> {
        let params = config.get_model_params();

        let field = DiffusionField::new(params.diffusion_coefficient, params.quantity_secreted)
            .context("Invalid diffusion field parameters")?;
        let sensitivity = SensitivityDistribution::from_params(&params.sensitivity, params.allow_legacy_logistic)
            .context("Invalid sensitivity distribution parameters")?;
        if !sensitivity.is_bounded() {
            warn!("Sampled thresholds are not confined to [0, 1]; rescaled values may be negative.");
        }

        Ok(Self {
            config,
            params,
            field,
            sensitivity,
            recorded_report: None,
        })
    }

    /// Concentration over the configured distance/time mesh.
    pub fn evaluate_field(&self) -> Result<ConcentrationGrid> {
        let grid = self
            .field
            .concentration_grid(&self.params.distances_um, &self.params.times_s)
            .context("Failed to evaluate concentration grid")?;
        debug!(
            "Concentration grid: {} x {} cells, max {:.4e}.",
            grid.times.len(),
            grid.distances.len(),
            grid.max_value()
        );
        Ok(grid)
    }

    /// `(x, cdf(x))` over the configured CDF axis.
    pub fn evaluate_cdf(&self) -> Result<Vec<(f64, f64)>> {
        let ys = self
            .sensitivity
            .cdf_many(&self.params.cdf_points)
            .context("Failed to evaluate sensitivity CDF")?;
        Ok(self.params.cdf_points.iter().copied().zip(ys).collect())
    }

    /// Draws thresholds for every repetition. Each repetition has its own
    /// generator seeded from `params.seeds`, so repetitions run in parallel
    /// and are reproducible individually.
    pub fn sample_repetitions(&self) -> Result<Vec<RepetitionSummary>> {
        let count = self.params.agents_per_repetition;
        self.params
            .seeds
            .par_iter()
            .enumerate()
            .map(|(rep, &seed)| -> Result<RepetitionSummary> {
                let mut rng = StdRng::seed_from_u64(seed);
                let thresholds = self
                    .sensitivity
                    .sample(count, &mut rng)
                    .with_context(|| format!("Failed to sample repetition {} (seed {})", rep, seed))?
                    .into_iter()
                    .map(f64::from)
                    .collect();
                let summary = RepetitionSummary::new(rep as u32, seed, thresholds);
                debug!(
                    "Repetition {} (seed {}): mean threshold {:.4}, range [{:.4}, {:.4}].",
                    rep, seed, summary.mean, summary.min, summary.max
                );
                Ok(summary)
            })
            .collect()
    }

    /// Runs every stage and records the report.
    pub fn run(&mut self) -> Result<&RunReport> {
        info!(
            "Evaluating field over {} distances x {} times...",
            self.params.distances_um.len(),
            self.params.times_s.len()
        );
        let concentration = self.evaluate_field()?;

        info!("Evaluating sensitivity CDF at {} points...", self.params.cdf_points.len());
        let cdf_curve = self.evaluate_cdf()?;

        info!(
            "Sampling {} agents ({} per repetition, {} repetitions)...",
            self.params.total_agents(),
            self.params.agents_per_repetition,
            self.params.repetitions()
        );
        let repetitions = self.sample_repetitions()?;

        let pooled = repetitions.iter().flat_map(|r| r.thresholds.iter().copied());
        let sorted = sorted_thresholds(pooled).context("Sampled thresholds are not finite")?;
        if let (Some(expected), false) = (self.sensitivity.mean(), sorted.is_empty()) {
            let empirical = sorted.iter().map(|t| t.value()).sum::<f64>() / sorted.len() as f64;
            info!("Pooled mean threshold {:.4} (analytic {:.4}).", empirical, expected);
        }
        let activation = activation_grid(&concentration, &sorted, self.params.max_secretion_rate)
            .context("Failed to compute activation fractions")?;

        self.recorded_report = Some(RunReport {
            params: self.params.clone(),
            concentration,
            cdf_curve,
            repetitions,
            activation,
        });
        self.report().context("Report missing after run")
    }

    pub fn report(&self) -> Option<&RunReport> {
        self.recorded_report.as_ref()
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn config(&self) -> &ChemotaxisConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CONFIG: &str = r#"
[field]
diffusion_coefficient_um2_per_s = 1e-3
quantity_secreted = 1e6

[grid]
distance_min_um = 0.0
distance_max_um = 2.0
distance_points = 5
time_min_min = 1.0
time_max_min = 10.0
time_points = 4

[sensitivity]
kind = "beta"
a = 5.0
b = 10.0

[population]
agents_per_repetition = 200
repetitions = 3
base_seed = 0

[output]
base_filename = "test_run"
format = "json"
"#;

    fn test_run() -> ChemotaxisRun {
        ChemotaxisRun::new(ChemotaxisConfig::from_toml_str(TEST_CONFIG).unwrap()).unwrap()
    }

    #[test]
    fn report_has_consistent_shapes() {
        let mut run = test_run();
        let report = run.run().unwrap();
        assert_eq!(report.concentration.values.len(), 20);
        assert_eq!(report.activation.len(), 20);
        assert_eq!(report.cdf_curve.len(), 1000);
        assert_eq!(report.repetitions.len(), 3);
        assert!(report.repetitions.iter().all(|r| r.thresholds.len() == 200));
        assert_eq!(report.pooled_thresholds().len(), 600);
    }

    #[test]
    fn repetitions_use_launcher_seeds() {
        let run = test_run();
        let reps = run.sample_repetitions().unwrap();
        let seeds: Vec<u64> = reps.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![0, 1, 2]);
        assert_ne!(reps[0].thresholds, reps[1].thresholds);
    }

    #[test]
    fn runs_are_reproducible() {
        let a = test_run().sample_repetitions().unwrap();
        let b = test_run().sample_repetitions().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn cdf_curve_is_monotone_and_bounded() {
        let curve = test_run().evaluate_cdf().unwrap();
        assert_eq!(curve[0], (0.0, 0.0));
        assert!(curve.windows(2).all(|w| w[0].1 <= w[1].1));
        assert!(curve.last().unwrap().1 <= 1.0);
    }

    #[test]
    fn activation_is_highest_at_the_source() {
        let mut run = test_run();
        let report = run.run().unwrap();
        let columns = report.concentration.distances.len();
        for row in report.activation.chunks(columns) {
            assert!(row.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn legacy_logistic_needs_opt_in() {
        let text = TEST_CONFIG.replace("kind = \"beta\"\na = 5.0\nb = 10.0", "kind = \"logistic\"\nk = 0.1\nx0 = 0.1");
        assert!(ChemotaxisConfig::from_toml_str(&text).is_err());
        let opted_in = text.replace("x0 = 0.1", "x0 = 0.1\nallow_legacy_logistic = true");
        let mut run = ChemotaxisRun::new(ChemotaxisConfig::from_toml_str(&opted_in).unwrap()).unwrap();
        assert!(run.run().is_ok());
    }
}
