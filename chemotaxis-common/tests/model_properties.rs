use chemotaxis_common::{
    concentration, DiffusionField, ModelError, SensitivityDistribution, SensitivityShapeParams,
};
use chemotaxis_common::sensitivity;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::f64::consts::PI;

fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() <= epsilon
}

/// Composite Simpson integral of the concentration over a ball of radius
/// `radius`, using spherical shells.
fn total_mass(field: &DiffusionField, elapsed_time: f64, radius: f64, intervals: usize) -> f64 {
    let h = radius / intervals as f64;
    let shell = |r: f64| 4.0 * PI * r * r * field.concentration(r, elapsed_time).unwrap();
    let mut sum = shell(0.0) + shell(radius);
    for i in 1..intervals {
        let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * shell(i as f64 * h);
    }
    sum * h / 3.0
}

#[test]
fn concentration_decreases_with_distance() {
    for &(d_coeff, t) in &[(1e-3, 60.0), (1.0, 0.5), (50.0, 10.0)] {
        let distances: Vec<f64> = (0..500).map(|i| i as f64 * 0.05).collect();
        let values: Vec<f64> = distances.iter().map(|&d| concentration(d, t, d_coeff, 1e6).unwrap()).collect();
        assert!(
            values.windows(2).all(|w| w[0] >= w[1]),
            "not monotone for D = {}, t = {}",
            d_coeff,
            t
        );
    }
}

#[test]
fn concentration_rises_then_decays_in_time() {
    let field = DiffusionField::new(1e-3, 1e6).unwrap();
    let distance = 0.5;
    let t_star = field.peak_time(distance).unwrap();
    let times: Vec<f64> = (1..=400).map(|i| t_star * i as f64 / 100.0).collect();
    let values: Vec<f64> = times.iter().map(|&t| field.concentration(distance, t).unwrap()).collect();

    let (peak_index, _) = values
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
    assert!(approx_eq(times[peak_index], t_star, t_star * 0.011), "peak at {} vs {}", times[peak_index], t_star);
    assert!(values[..=peak_index].windows(2).all(|w| w[0] <= w[1]));
    assert!(values[peak_index..].windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn concentration_vanishes_far_away_and_late() {
    let field = DiffusionField::new(1.0, 1e6).unwrap();
    assert!(field.concentration(1e3, 1.0).unwrap() < 1e-300);
    assert!(field.concentration(1.0, 1e12).unwrap() < 1e-10);
}

#[test]
fn field_integrates_to_quantity_secreted() {
    let field = DiffusionField::new(1.0, 2.5e4).unwrap();
    let mass = total_mass(&field, 1.0, 30.0, 20_000);
    assert!(approx_eq(mass / 2.5e4, 1.0, 1e-8), "integrated mass {}", mass);

    // The prototype's parameters: D = 1e-3 um^2/s, one minute after release.
    let field = DiffusionField::new(1e-3, 1e6).unwrap();
    let mass = total_mass(&field, 60.0, 5.0, 20_000);
    assert!(approx_eq(mass / 1e6, 1.0, 1e-8), "integrated mass {}", mass);
}

#[test]
fn reference_scenario_is_reproducible() {
    let c = concentration(0.0, 60.0, 1e-3, 1e6).unwrap();
    let coeff = (4.0 * PI * 0.001 * 60.0).powf(-1.5);
    assert!(approx_eq(c / (1e6 * coeff), 1.0, 1e-14));
    assert!(approx_eq(c, 1_527_419.491_602_588, 1e-6));
}

#[test]
fn non_positive_time_is_an_invalid_argument() {
    for t in [0.0, -0.0, -60.0] {
        match concentration(0.0, t, 1e-3, 1e6) {
            Err(ModelError::InvalidArgument { name, .. }) => assert_eq!(name, "elapsed_time"),
            other => panic!("expected InvalidArgument for t = {}, got {:?}", t, other),
        }
    }
}

#[test]
fn grid_equals_scalar_evaluation() {
    let field = DiffusionField::new(1e-3, 1e6).unwrap();
    let distances = chemotaxis_common::linspace(1.0, 25.0, 100);
    let times: Vec<f64> = chemotaxis_common::linspace(1.0, 10.0, 100).iter().map(|t| t * 60.0).collect();
    let grid = field.concentration_grid(&distances, &times).unwrap();
    for (ti, &t) in times.iter().enumerate() {
        for (di, &d) in distances.iter().enumerate() {
            assert_eq!(grid.value(ti, di).unwrap().to_bits(), concentration(d, t, 1e-3, 1e6).unwrap().to_bits());
        }
    }
}

#[test]
fn beta_cdf_is_monotone_for_many_shapes() {
    let xs: Vec<f64> = (0..=1000).map(|i| i as f64 / 1000.0).collect();
    let shapes = [
        (5.0, 10.0),
        (0.5, 0.5),
        (1.0, 1.0),
        (0.2, 3.0),
        (30.0, 2.0),
        (2.0, 2.0),
        (1e-3, 1e-3),
        (1e-3, 50.0),
        (12.0, 30.0),
        (1e4, 1e4),
        (1e6, 1e6),
    ];
    for &(a, b) in &shapes {
        let dist = SensitivityDistribution::beta(a, b).unwrap();
        let ys = dist.cdf_many(&xs).unwrap();
        assert!(ys.windows(2).all(|w| w[0] <= w[1]), "Beta({}, {}) CDF not monotone", a, b);
        assert!(ys.iter().all(|y| (0.0..=1.0).contains(y)));
        assert_eq!(ys[0], 0.0);
        assert_eq!(ys[1000], 1.0);
    }
}

#[test]
fn large_symmetric_beta_is_centred() {
    for a in [1e4, 1e6, 1e8] {
        let dist = SensitivityDistribution::beta(a, a).unwrap();
        assert!(approx_eq(dist.cdf(0.5).unwrap(), 0.5, 1e-9), "Beta({a}, {a}) cdf(0.5)");
    }
}

#[test]
fn out_of_range_shapes_fail_instead_of_returning_nan() {
    assert!(matches!(SensitivityDistribution::beta(f64::MAX, f64::MAX), Err(ModelError::InvalidArgument { .. })));
    assert!(matches!(SensitivityDistribution::beta(1e-300, 1.0), Err(ModelError::InvalidArgument { .. })));

    let xs: Vec<f64> = (0..=1000).map(|i| i as f64 / 1000.0).collect();
    let dist = SensitivityDistribution::beta(1e300, 1e300).unwrap();
    assert!(matches!(dist.cdf_many(&xs), Err(ModelError::NumericOverflow { .. })));

    for &(a, b) in &[(1e300, 1.0), (1.0, 1e300), (1e-10, 1.0), (1e-10, 1e-10), (50.0, 1e-10)] {
        let dist = SensitivityDistribution::beta(a, b).unwrap();
        let ys = dist.cdf_many(&xs).unwrap();
        assert!(ys.iter().all(|y| (0.0..=1.0).contains(y)), "Beta({}, {})", a, b);
        assert!(ys.windows(2).all(|w| w[0] <= w[1]), "Beta({}, {}) CDF not monotone", a, b);
        let draws = dist.sample(100, &mut StdRng::seed_from_u64(1)).unwrap();
        assert!(draws.iter().all(|t| (0.0..=1.0).contains(&t.value())));
    }
}

#[test]
fn beta_cdf_boundaries_via_params() {
    let params = SensitivityShapeParams::Beta { a: 5.0, b: 10.0 };
    assert!(approx_eq(sensitivity::cdf(0.0, &params).unwrap(), 0.0, 1e-12));
    assert!(approx_eq(sensitivity::cdf(1.0, &params).unwrap(), 1.0, 1e-12));
    assert!(sensitivity::cdf(1e-9, &params).unwrap() < 1e-30);
}

#[test]
fn invalid_shape_params_are_rejected() {
    let params = SensitivityShapeParams::Beta { a: 0.0, b: 10.0 };
    assert!(matches!(sensitivity::cdf(0.3, &params), Err(ModelError::InvalidArgument { .. })));
    let mut rng = StdRng::seed_from_u64(0);
    assert!(sensitivity::sample(&params, 10, &mut rng).is_err());
}

#[test]
fn beta_samples_stay_in_support_with_expected_mean() {
    let params = SensitivityShapeParams::Beta { a: 5.0, b: 10.0 };
    let mut rng = StdRng::seed_from_u64(2018);
    let draws = sensitivity::sample(&params, 10_000, &mut rng).unwrap();
    assert_eq!(draws.len(), 10_000);
    assert!(draws.iter().all(|t| (0.0..=1.0).contains(&t.value())));
    let mean = draws.iter().map(|t| t.value()).sum::<f64>() / draws.len() as f64;
    assert!(approx_eq(mean, 5.0 / 15.0, 0.01), "empirical mean {}", mean);
}

#[test]
fn sampling_is_deterministic_per_seed() {
    let params = SensitivityShapeParams::Beta { a: 5.0, b: 10.0 };
    let draw = |seed: u64| sensitivity::sample(&params, 256, &mut StdRng::seed_from_u64(seed)).unwrap();
    assert_eq!(draw(42), draw(42));
    assert_ne!(draw(42), draw(43));
}

#[test]
fn independently_seeded_generators_sample_in_parallel() {
    let dist = SensitivityDistribution::beta(5.0, 10.0).unwrap();
    let seeds: Vec<u64> = (0..8).collect();
    let parallel: Vec<_> = seeds
        .par_iter()
        .map(|&seed| dist.sample(100, &mut StdRng::seed_from_u64(seed)).unwrap())
        .collect();
    let serial: Vec<_> = seeds
        .iter()
        .map(|&seed| dist.sample(100, &mut StdRng::seed_from_u64(seed)).unwrap())
        .collect();
    assert_eq!(parallel, serial);
}

#[test]
fn successive_draws_from_one_generator_continue_the_stream() {
    let dist = SensitivityDistribution::beta(2.0, 5.0).unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let first = dist.sample(50, &mut rng).unwrap();
    let second = dist.sample(50, &mut rng).unwrap();
    let both = dist.sample(100, &mut StdRng::seed_from_u64(5)).unwrap();
    assert_eq!([first, second].concat(), both);
}
