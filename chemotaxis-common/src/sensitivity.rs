//! Per-agent chemotactic sensitivity thresholds.
//!
//! Agents do not share one fixed threshold. Each agent draws its own value
//! from a distribution over the normalized domain [0, 1] when it is created;
//! the value is later rescaled by the maximum secretion rate so it can be
//! compared against [`crate::diffusion::concentration`] output.

use crate::error::{require_finite, require_positive, ModelError, ModelResult};
use crate::special::regularized_incomplete_beta;
use log::{debug, warn};
use rand::distr::{Distribution, Open01};
use rand::Rng;
use rand_distr::Beta;
use serde::{Deserialize, Serialize};

/// Shape parameters of a sensitivity distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SensitivityShapeParams {
    /// Beta(a, b), supported exactly on [0, 1].
    Beta { a: f64, b: f64 },
    /// Legacy logistic curve `1 / (1 + exp(-k·(x + x0)))`. Unbounded; see
    /// [`LogisticSensitivity`].
    Logistic { k: f64, x0: f64 },
}

/// Capability shared by the sensitivity variants.
pub trait ThresholdDistribution {
    /// Cumulative probability at `x`. Non-decreasing in `x`.
    fn cdf(&self, x: f64) -> ModelResult<f64>;

    /// One draw from the distribution. Not checked for finiteness.
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64;
}

/// Smallest Beta shape parameter accepted. Below it the CDF varies less
/// across [0, 1] than f64 rounding can resolve.
pub const MIN_BETA_SHAPE: f64 = 1e-10;

/// Beta(a, b) sensitivity. The preferred variant: bounded to [0, 1] and
/// flexible in shape (unimodal, skewed, U-shaped).
#[derive(Debug, Clone)]
pub struct BetaSensitivity {
    a: f64,
    b: f64,
    sampler: Beta<f64>,
}

impl BetaSensitivity {
    pub fn new(a: f64, b: f64) -> ModelResult<Self> {
        require_positive("a", a)?;
        require_positive("b", b)?;
        for (name, shape) in [("a", a), ("b", b)] {
            if shape < MIN_BETA_SHAPE {
                return Err(ModelError::invalid(name, format!("must be >= {:e}, got {:e}", MIN_BETA_SHAPE, shape)));
            }
        }
        if !(a + b).is_finite() {
            return Err(ModelError::invalid("a", format!("a + b must be finite, got {} + {}", a, b)));
        }
        let sampler = Beta::new(a, b).map_err(|e| ModelError::invalid("a", format!("Beta({}, {}) rejected: {}", a, b, e)))?;
        Ok(Self { a, b, sampler })
    }

    pub fn a(&self) -> f64 {
        self.a
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn mean(&self) -> f64 {
        self.a / (self.a + self.b)
    }
}

impl ThresholdDistribution for BetaSensitivity {
    fn cdf(&self, x: f64) -> ModelResult<f64> {
        require_not_nan(x)?;
        regularized_incomplete_beta(x, self.a, self.b)
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.sampler.sample(rng).clamp(0.0, 1.0)
    }
}

/// Legacy logistic sensitivity, kept only to compare against older runs.
///
/// Known defects, reproduced as-is:
/// - it assigns probability to thresholds below zero, i.e. agents that react
///   to no attractant at all;
/// - it has no upper bound;
/// - `x0` is documented as the median, but the curve is centred on `-x0`.
///
/// `k` must be positive so the curve stays non-decreasing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticSensitivity {
    k: f64,
    x0: f64,
}

impl LogisticSensitivity {
    fn new(k: f64, x0: f64) -> ModelResult<Self> {
        require_positive("k", k)?;
        require_finite("x0", x0)?;
        Ok(Self { k, x0 })
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    pub fn x0(&self) -> f64 {
        self.x0
    }

    /// The actual median of the curve, `-x0`.
    pub fn median(&self) -> f64 {
        -self.x0
    }
}

impl ThresholdDistribution for LogisticSensitivity {
    fn cdf(&self, x: f64) -> ModelResult<f64> {
        require_not_nan(x)?;
        Ok(1.0 / (1.0 + (-self.k * (x + self.x0)).exp()))
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = Open01.sample(rng);
        (u / (1.0 - u)).ln() / self.k - self.x0
    }
}

/// A validated sensitivity distribution.
#[derive(Debug, Clone)]
pub enum SensitivityDistribution {
    Beta(BetaSensitivity),
    Logistic(LogisticSensitivity),
}

impl SensitivityDistribution {
    pub fn beta(a: f64, b: f64) -> ModelResult<Self> {
        BetaSensitivity::new(a, b).map(SensitivityDistribution::Beta)
    }

    /// Explicit opt-in to the legacy logistic curve. See [`LogisticSensitivity`].
    pub fn legacy_logistic(k: f64, x0: f64) -> ModelResult<Self> {
        let logistic = LogisticSensitivity::new(k, x0)?;
        warn!(
            "Using legacy logistic sensitivity (k = {}, x0 = {}): unbounded, median at {}.",
            k,
            x0,
            logistic.median()
        );
        Ok(SensitivityDistribution::Logistic(logistic))
    }

    /// Builds a distribution from shape parameters. The logistic variant is
    /// refused unless `allow_legacy` is set.
    pub fn from_params(params: &SensitivityShapeParams, allow_legacy: bool) -> ModelResult<Self> {
        match *params {
            SensitivityShapeParams::Beta { a, b } => Self::beta(a, b),
            SensitivityShapeParams::Logistic { k, x0 } if allow_legacy => Self::legacy_logistic(k, x0),
            SensitivityShapeParams::Logistic { .. } => Err(ModelError::invalid(
                "kind",
                "the logistic sensitivity variant is legacy-only and must be enabled explicitly",
            )),
        }
    }

    pub fn params(&self) -> SensitivityShapeParams {
        match self {
            SensitivityDistribution::Beta(beta) => SensitivityShapeParams::Beta { a: beta.a, b: beta.b },
            SensitivityDistribution::Logistic(l) => SensitivityShapeParams::Logistic { k: l.k, x0: l.x0 },
        }
    }

    /// Whether every draw is guaranteed to land in [0, 1].
    pub fn is_bounded(&self) -> bool {
        matches!(self, SensitivityDistribution::Beta(_))
    }

    pub fn cdf(&self, x: f64) -> ModelResult<f64> {
        match self {
            SensitivityDistribution::Beta(beta) => beta.cdf(x),
            SensitivityDistribution::Logistic(logistic) => logistic.cdf(x),
        }
    }

    /// CDF at each point of `xs`. Every point is checked before any is evaluated.
    pub fn cdf_many(&self, xs: &[f64]) -> ModelResult<Vec<f64>> {
        for &x in xs {
            require_not_nan(x)?;
        }
        xs.iter().map(|&x| self.cdf(x)).collect()
    }

    /// Analytic mean, `a / (a + b)`. The legacy logistic curve has none
    /// within its documented domain.
    pub fn mean(&self) -> Option<f64> {
        match self {
            SensitivityDistribution::Beta(beta) => Some(beta.mean()),
            SensitivityDistribution::Logistic(_) => None,
        }
    }

    /// Draws `count` independent thresholds from `rng`, in order. A draw that
    /// is not finite fails the whole call.
    pub fn sample<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> ModelResult<Vec<SensitivityThreshold>> {
        debug!("Drawing {} sensitivity thresholds from {:?}.", count, self.params());
        (0..count)
            .map(|_| {
                let value = match self {
                    SensitivityDistribution::Beta(beta) => beta.draw(&mut *rng),
                    SensitivityDistribution::Logistic(logistic) => logistic.draw(&mut *rng),
                };
                if value.is_finite() {
                    Ok(SensitivityThreshold(value))
                } else {
                    Err(ModelError::overflow("a sensitivity threshold draw"))
                }
            })
            .collect()
    }
}

/// CDF of the bounded Beta variant at `x`.
///
/// The logistic variant is rejected here; it is only reachable through
/// [`SensitivityDistribution::legacy_logistic`].
pub fn cdf(x: f64, params: &SensitivityShapeParams) -> ModelResult<f64> {
    SensitivityDistribution::from_params(params, false)?.cdf(x)
}

/// Draws `count` thresholds of the bounded Beta variant from `rng`.
pub fn sample<R: Rng + ?Sized>(
    params: &SensitivityShapeParams,
    count: usize,
    rng: &mut R,
) -> ModelResult<Vec<SensitivityThreshold>> {
    SensitivityDistribution::from_params(params, false)?.sample(count, rng)
}

/// Concentration below which an agent does not perform chemotaxis, on the
/// normalized scale (within [0, 1] for the Beta variant).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensitivityThreshold(f64);

impl SensitivityThreshold {
    /// Wraps a previously drawn value, e.g. one read back from a report.
    pub fn new(value: f64) -> ModelResult<Self> {
        require_finite("threshold", value).map(SensitivityThreshold)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Converts to absolute concentration units.
    pub fn rescale(self, max_secretion_rate: f64) -> ModelResult<f64> {
        require_positive("max_secretion_rate", max_secretion_rate)?;
        Ok(self.0 * max_secretion_rate)
    }

    /// True when `concentration` reaches the rescaled threshold.
    pub fn permits_chemotaxis(self, concentration: f64, max_secretion_rate: f64) -> ModelResult<bool> {
        require_not_nan(concentration)?;
        Ok(concentration >= self.rescale(max_secretion_rate)?)
    }
}

impl From<SensitivityThreshold> for f64 {
    fn from(threshold: SensitivityThreshold) -> f64 {
        threshold.0
    }
}

fn require_not_nan(x: f64) -> ModelResult<f64> {
    if x.is_nan() {
        Err(ModelError::invalid("x", "must not be NaN"))
    } else {
        Ok(x)
    }
}
