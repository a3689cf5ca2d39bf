use chemotaxis_common::{ConcentrationGrid, ModelResult, SensitivityThreshold};
use rayon::prelude::*;

/// Wraps normalized thresholds and sorts them ascending, ready for
/// [`activation_fraction`].
pub fn sorted_thresholds<I>(thresholds: I) -> ModelResult<Vec<SensitivityThreshold>>
where
    I: IntoIterator<Item = f64>,
{
    let mut sorted = thresholds
        .into_iter()
        .map(SensitivityThreshold::new)
        .collect::<ModelResult<Vec<_>>>()?;
    sorted.sort_by(|a, b| a.value().total_cmp(&b.value()));
    Ok(sorted)
}

/// Fraction of agents whose threshold permits chemotaxis at `concentration`.
#[inline]
pub fn activation_fraction(sorted: &[SensitivityThreshold], concentration: f64, max_secretion_rate: f64) -> ModelResult<f64> {
    let Some(&lowest) = sorted.first() else {
        return Ok(0.0);
    };
    // Checks both arguments once; the predicate below cannot fail after this.
    if !lowest.permits_chemotaxis(concentration, max_secretion_rate)? {
        return Ok(0.0);
    }
    // Sorted ascending, so the responding agents form a prefix.
    let active = sorted.partition_point(|t| matches!(t.permits_chemotaxis(concentration, max_secretion_rate), Ok(true)));
    Ok(active as f64 / sorted.len() as f64)
}

/// Activation fraction for every cell of `grid`, laid out like `grid.values`.
pub fn activation_grid(
    grid: &ConcentrationGrid,
    sorted: &[SensitivityThreshold],
    max_secretion_rate: f64,
) -> ModelResult<Vec<f64>> {
    grid.values
        .par_iter()
        .map(|&c| activation_fraction(sorted, c, max_secretion_rate))
        .collect()
}
