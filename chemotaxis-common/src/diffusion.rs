//! Point-source diffusion of a secreted attractant.
//!
//! Concentration is the fundamental solution of the isotropic 3-D diffusion
//! equation for an instantaneous release of `Q` molecules at `t = 0`:
//!
//! ```text
//! C(r, t) = Q / (4·π·D·t)^1.5 · exp(-r² / (4·D·t))
//! ```
//!
//! Units follow the caller: distance in L, `D` in L²/time, elapsed time in
//! time. The engine uses µm, µm²/s and seconds.
//!
//! # Numeric contract
//!
//! Evaluation fails fast. Non-finite or out-of-domain inputs yield
//! [`ModelError::InvalidArgument`]. When `(4·π·D·t)^1.5` underflows to zero
//! (roughly `D·t < 1e-206`) or the result does not fit in an `f64`, the call
//! yields [`ModelError::NumericOverflow`]. NaN and infinity are never returned.

use crate::error::{require_non_negative, require_positive, ModelError, ModelResult};
use crate::vecmath::Vec3;
use log::trace;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Attractant concentration (molecules per unit volume). Always finite and `>= 0`.
pub type Concentration = f64;

/// Concentration at `distance` from a point release, `elapsed_time` after it.
///
/// Preconditions: `elapsed_time > 0`, `diffusion_coefficient > 0`,
/// `quantity_secreted >= 0`, `distance >= 0`, all finite.
pub fn concentration(
    distance: f64,
    elapsed_time: f64,
    diffusion_coefficient: f64,
    quantity_secreted: f64,
) -> ModelResult<Concentration> {
    require_non_negative("distance", distance)?;
    require_positive("elapsed_time", elapsed_time)?;
    require_positive("diffusion_coefficient", diffusion_coefficient)?;
    require_non_negative("quantity_secreted", quantity_secreted)?;
    evaluate_unchecked(distance, elapsed_time, diffusion_coefficient, quantity_secreted)
}

/// The Green's function itself. Inputs must already be validated.
#[inline]
fn evaluate_unchecked(distance: f64, elapsed_time: f64, diffusion: f64, quantity: f64) -> ModelResult<Concentration> {
    let four_dt = 4.0 * diffusion * elapsed_time;
    let denominator = (PI * four_dt).powf(1.5);
    if denominator == 0.0 {
        return Err(ModelError::overflow("normalisation coefficient (4·π·D·t)^-1.5"));
    }
    let coeff = 1.0 / denominator;
    let decay = (-(distance * distance) / four_dt).exp();
    let value = quantity * coeff * decay;
    if value.is_finite() && coeff.is_finite() {
        Ok(value)
    } else {
        Err(ModelError::overflow("point-source concentration"))
    }
}

/// An instantaneous point release of attractant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecretionEvent {
    pub location: Vec3,
    /// Number of molecules released.
    pub quantity_secreted: f64,
    /// Diffusion coefficient (area / time).
    pub diffusion_coefficient: f64,
}

impl SecretionEvent {
    pub fn new(location: Vec3, quantity_secreted: f64, diffusion_coefficient: f64) -> ModelResult<Self> {
        if !location.is_finite() {
            return Err(ModelError::invalid("location", format!("must be finite, got {:?}", location)));
        }
        require_non_negative("quantity_secreted", quantity_secreted)?;
        require_positive("diffusion_coefficient", diffusion_coefficient)?;
        Ok(Self { location, quantity_secreted, diffusion_coefficient })
    }

    /// The field this release produces, independent of where it happened.
    pub fn field(&self) -> DiffusionField {
        DiffusionField {
            diffusion_coefficient: self.diffusion_coefficient,
            quantity_secreted: self.quantity_secreted,
        }
    }

    pub fn evaluate(&self, query: ConcentrationQuery) -> ModelResult<Concentration> {
        concentration(query.distance, query.elapsed_time, self.diffusion_coefficient, self.quantity_secreted)
    }

    /// Concentration seen by an observer at `observer`, `elapsed_time` after release.
    pub fn concentration_at(&self, observer: Vec3, elapsed_time: f64) -> ModelResult<Concentration> {
        if !observer.is_finite() {
            return Err(ModelError::invalid("observer", format!("must be finite, got {:?}", observer)));
        }
        let query = ConcentrationQuery::new(self.location.distance(observer), elapsed_time)?;
        self.evaluate(query)
    }
}

/// Distance and elapsed time to evaluate against a single [`SecretionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationQuery {
    pub distance: f64,
    pub elapsed_time: f64,
}

impl ConcentrationQuery {
    pub fn new(distance: f64, elapsed_time: f64) -> ModelResult<Self> {
        require_non_negative("distance", distance)?;
        require_positive("elapsed_time", elapsed_time)?;
        Ok(Self { distance, elapsed_time })
    }
}

/// Validated diffusion parameters of one release, evaluated at arbitrary
/// distances and times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiffusionField {
    diffusion_coefficient: f64,
    quantity_secreted: f64,
}

impl DiffusionField {
    pub fn new(diffusion_coefficient: f64, quantity_secreted: f64) -> ModelResult<Self> {
        require_positive("diffusion_coefficient", diffusion_coefficient)?;
        require_non_negative("quantity_secreted", quantity_secreted)?;
        Ok(Self { diffusion_coefficient, quantity_secreted })
    }

    pub fn diffusion_coefficient(&self) -> f64 {
        self.diffusion_coefficient
    }

    pub fn quantity_secreted(&self) -> f64 {
        self.quantity_secreted
    }

    pub fn concentration(&self, distance: f64, elapsed_time: f64) -> ModelResult<Concentration> {
        concentration(distance, elapsed_time, self.diffusion_coefficient, self.quantity_secreted)
    }

    /// Time at which the concentration at `distance` peaks: `r² / (6·D)`.
    ///
    /// At the source itself (`distance == 0`) the concentration only decays,
    /// so the peak is reported as `0.0`.
    pub fn peak_time(&self, distance: f64) -> ModelResult<f64> {
        require_non_negative("distance", distance)?;
        let t = distance * distance / (6.0 * self.diffusion_coefficient);
        if t.is_finite() {
            Ok(t)
        } else {
            Err(ModelError::overflow("peak time"))
        }
    }

    /// Evaluates every `(time, distance)` pair.
    ///
    /// All inputs are validated before anything is computed. Each element is
    /// the scalar [`concentration`] of its pair; rows are filled in parallel.
    pub fn concentration_grid(&self, distances: &[f64], times: &[f64]) -> ModelResult<ConcentrationGrid> {
        for &d in distances {
            require_non_negative("distance", d)?;
        }
        for &t in times {
            require_positive("elapsed_time", t)?;
        }

        let columns = distances.len();
        let mut values = vec![0.0; columns * times.len()];
        if columns > 0 {
            values
                .par_chunks_mut(columns)
                .zip(times.par_iter())
                .try_for_each(|(row, &t)| -> ModelResult<()> {
                    for (out, &d) in row.iter_mut().zip(distances) {
                        *out = evaluate_unchecked(d, t, self.diffusion_coefficient, self.quantity_secreted)?;
                    }
                    Ok(())
                })?;
        }
        trace!("Evaluated concentration grid of {} times x {} distances.", times.len(), columns);

        Ok(ConcentrationGrid {
            distances: distances.to_vec(),
            times: times.to_vec(),
            values,
        })
    }
}

/// Concentrations over a (time, distance) mesh.
///
/// `values` is row-major with one row per time:
/// `values[time_index * distances.len() + distance_index]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationGrid {
    pub distances: Vec<f64>,
    pub times: Vec<f64>,
    pub values: Vec<Concentration>,
}

impl ConcentrationGrid {
    pub fn value(&self, time_index: usize, distance_index: usize) -> Option<Concentration> {
        if time_index >= self.times.len() || distance_index >= self.distances.len() {
            return None;
        }
        self.values.get(time_index * self.distances.len() + distance_index).copied()
    }

    pub fn row(&self, time_index: usize) -> Option<&[Concentration]> {
        if time_index >= self.times.len() {
            return None;
        }
        let n = self.distances.len();
        self.values.get(time_index * n..(time_index + 1) * n)
    }

    pub fn max_value(&self) -> Concentration {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// `(distance, time, concentration)` for every cell, row by row.
    pub fn iter_cells(&self) -> impl Iterator<Item = (f64, f64, Concentration)> + '_ {
        self.times.iter().enumerate().flat_map(move |(ti, &t)| {
            self.distances
                .iter()
                .enumerate()
                .map(move |(di, &d)| (d, t, self.values[ti * self.distances.len() + di]))
        })
    }
}
