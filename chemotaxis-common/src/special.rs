//! Special functions backing the Beta sensitivity CDF.

use crate::error::{ModelError, ModelResult};
use std::f64::consts::PI;

// Lanczos approximation, g = 7, n = 9.
const LANCZOS_G: f64 = 7.0;
#[allow(clippy::excessive_precision)]
const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_13,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

// Above this shape, log-gamma terms use Stirling's series so that large
// shapes do not cancel against each other.
const STIRLING_CUTOFF: f64 = 10.0;

// The continued fraction needs O(sqrt(max(a, b))) terms near the mean.
const CF_MIN_ITERATIONS: f64 = 300.0;
const CF_ITERATION_LIMIT: f64 = 100_000.0;
const CF_EPSILON: f64 = 1e-15;
const CF_TINY: f64 = 1e-300;

/// Natural log of the gamma function for `x > 0`.
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection keeps the series in its accurate range.
        (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let t = x + LANCZOS_G + 0.5;
        let series = LANCZOS_COEFFS[1..]
            .iter()
            .enumerate()
            .fold(LANCZOS_COEFFS[0], |acc, (i, c)| acc + c / (x + (i + 1) as f64));
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
    }
}

/// `ln Γ(x) - [(x - 1/2)·ln x - x + ln(2π)/2]` for `x >= STIRLING_CUTOFF`.
fn stirling_correction(x: f64) -> f64 {
    let x2 = 1.0 / (x * x);
    (1.0 / 12.0 - x2 * (1.0 / 360.0 - x2 * (1.0 / 1260.0 - x2 * (1.0 / 1680.0 - x2 / 1188.0)))) / x
}

/// `ln B(a, b)`.
pub fn ln_beta(a: f64, b: f64) -> f64 {
    let (small, big) = if a <= b { (a, b) } else { (b, a) };
    let sum = a + b;
    if big < STIRLING_CUTOFF {
        ln_gamma(a) + ln_gamma(b) - ln_gamma(sum)
    } else if small < STIRLING_CUTOFF {
        // ln Γ(big + small) - ln Γ(big), without forming either term.
        let ratio = (big - 0.5) * (small / big).ln_1p() + small * sum.ln() - small
            + stirling_correction(sum)
            - stirling_correction(big);
        ln_gamma(small) - ratio
    } else {
        0.5 * (2.0 * PI).ln() - 0.5 * sum.ln() - (a - 0.5) * (b / a).ln_1p() - (b - 0.5) * (a / b).ln_1p()
            + stirling_correction(a)
            + stirling_correction(b)
            - stirling_correction(sum)
    }
}

/// `ln[a · B(a, b)]`, accurate for tiny shapes where `ln B(a, b)` is
/// dominated by `-ln a`.
fn ln_scaled_beta(a: f64, b: f64) -> f64 {
    if a.max(b) < STIRLING_CUTOFF {
        // a · B(a, b) = Γ(a + 1) · Γ(b + 1) · (a + b) / (b · Γ(a + b + 1))
        ln_gamma(a + 1.0) + ln_gamma(b + 1.0) - ln_gamma(a + b + 1.0) + (a / b).ln_1p()
    } else if a < STIRLING_CUTOFF {
        let sum = a + b;
        let ratio = (b - 0.5) * (a / b).ln_1p() + a * sum.ln() - a + stirling_correction(sum) - stirling_correction(b);
        ln_gamma(a + 1.0) - ratio
    } else {
        a.ln() + ln_beta(a, b)
    }
}

/// `ln[x^a · (1 - x)^b / (a · B(a, b))]` for `0 < x < 1`, the factor in
/// front of the lower-tail continued fraction.
fn ln_prefactor(x: f64, a: f64, b: f64) -> f64 {
    if a.min(b) < STIRLING_CUTOFF {
        return a * x.ln() + b * (-x).ln_1p() - ln_scaled_beta(a, b);
    }
    // Both shapes large: expand around the mean a / (a + b) so the terms
    // linear in the offset cancel exactly.
    let sum = a + b;
    let lambda = if a <= b { a - sum * x } else { sum * (1.0 - x) - b };
    let excess = |t: f64| t - t.ln_1p();
    -(a * excess(-lambda / a) + b * excess(lambda / b)) + 0.5 * (b.ln() - a.ln() - sum.ln())
        - 0.5 * (2.0 * PI).ln()
        - (stirling_correction(a) + stirling_correction(b) - stirling_correction(sum))
}

/// Regularized incomplete beta function `I_x(a, b)`, i.e. the CDF of
/// Beta(a, b) at `x`. Callers validate `a > 0`, `b > 0` and a finite `a + b`.
///
/// Returns exactly 0 for `x <= 0` and exactly 1 for `x >= 1`. Otherwise the
/// result is finite and within [0, 1], or `NumericOverflow` when it cannot be
/// evaluated to full precision.
pub fn regularized_incomplete_beta(x: f64, a: f64, b: f64) -> ModelResult<f64> {
    if x <= 0.0 {
        return Ok(0.0);
    }
    if x >= 1.0 {
        return Ok(1.0);
    }
    let lower_tail = x < (a + 1.0) / (a + b + 2.0);
    let ln_front = if lower_tail { ln_prefactor(x, a, b) } else { ln_prefactor(1.0 - x, b, a) };
    if ln_front.is_nan() || ln_front > f64::MAX.ln() {
        return Err(ModelError::overflow("the Beta CDF prefactor"));
    }
    let front = ln_front.exp();
    if front == 0.0 {
        return Ok(if lower_tail { 0.0 } else { 1.0 });
    }
    let value = if lower_tail {
        front * beta_continued_fraction(x, a, b)?
    } else {
        1.0 - front * beta_continued_fraction(1.0 - x, b, a)?
    };
    if !value.is_finite() {
        return Err(ModelError::overflow("the Beta CDF"));
    }
    Ok(value.clamp(0.0, 1.0))
}

/// Modified Lentz evaluation of the incomplete beta continued fraction.
fn beta_continued_fraction(x: f64, a: f64, b: f64) -> ModelResult<f64> {
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let guard = |v: f64| if v.abs() < CF_TINY { CF_TINY } else { v };

    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - qab * x / qap);
    let mut h = d;

    // Coefficients are products of ratios near 1, so huge shapes cannot
    // overflow them.
    let budget = (CF_MIN_ITERATIONS + 10.0 * a.max(b).sqrt()).min(CF_ITERATION_LIMIT) as usize;
    for m in 1..=budget {
        let m = m as f64;
        let m2 = 2.0 * m;

        // Even step.
        let aa = (m / (qam + m2)) * ((b - m) / (a + m2)) * x;
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        h *= d * c;

        // Odd step.
        let aa = -((a + m) / (a + m2)) * ((qab + m) / (qap + m2)) * x;
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < CF_EPSILON {
            return Ok(h);
        }
    }
    Err(ModelError::overflow("the Beta CDF continued fraction (no convergence)"))
}
