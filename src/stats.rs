//! Statistical primitives shared by the validators
//!
//! Everything here is a pure function over `f64`/`u64` with no external
//! statistics dependency, so the numeric behaviour stays identical wherever the
//! engine is embedded.

/// Coefficients of the Abramowitz–Stegun 7.1.26 rational approximation
const A1: f64 = 0.254_829_592;
const A2: f64 = -0.284_496_736;
const A3: f64 = 1.421_413_741;
const A4: f64 = -1.453_152_027;
const A5: f64 = 1.061_405_429;
const P: f64 = 0.327_591_1;

/// Error function, max absolute error ≈ 1.5×10⁻⁷
pub fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;

    sign * (1.0 - poly * (-x * x).exp())
}

/// Standard normal cumulative distribution Φ(z)
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Two-tailed pooled two-proportion z-test
///
/// Returns `NaN` when either total is zero; callers must guard zero-traffic
/// variants before asking for a p-value. When both proportions sit at 0 or 1
/// the standard error vanishes and the rates are necessarily equal, so the
/// p-value is 1.
pub fn two_proportion_p_value(a_success: u64, a_total: u64, b_success: u64, b_total: u64) -> f64 {
    if a_total == 0 || b_total == 0 {
        return f64::NAN;
    }

    let (a_total_f, b_total_f) = (a_total as f64, b_total as f64);
    let rate_a = a_success as f64 / a_total_f;
    let rate_b = b_success as f64 / b_total_f;

    let pooled = (a_success as f64 + b_success as f64) / (a_total_f + b_total_f);
    let standard_error = (pooled * (1.0 - pooled) * (1.0 / a_total_f + 1.0 / b_total_f)).sqrt();

    if standard_error == 0.0 || !standard_error.is_finite() {
        return 1.0;
    }

    let z = (rate_b - rate_a) / standard_error;
    (2.0 * (1.0 - normal_cdf(z.abs()))).clamp(0.0, 1.0)
}

/// Relative difference |rate_b − rate_a| / rate_a
///
/// `None` when the control rate is zero: the relative lift is undefined.
pub fn effect_size(rate_a: f64, rate_b: f64) -> Option<f64> {
    if rate_a == 0.0 || !rate_a.is_finite() || !rate_b.is_finite() {
        return None;
    }
    Some((rate_b - rate_a).abs() / rate_a.abs())
}

/// Bounded power heuristic: min(1, effect·√n / 3)
///
/// Not a rigorous power calculation. It is monotonically non-decreasing in
/// both effect size and sample size and capped at 1.
pub fn statistical_power(effect: f64, min_sample_size: u64) -> f64 {
    if !effect.is_finite() || effect <= 0.0 {
        return 0.0;
    }
    (effect * (min_sample_size as f64).sqrt() / 3.0).min(1.0)
}

/// Maximum sample-ratio deviation across variants, in percent of the expected share
///
/// Expected share is 1/variantCount; each variant's deviation is
/// |actualShare − expectedShare| / expectedShare × 100. `None` when there is no
/// traffic to compare.
pub fn sample_ratio_deviation(visitors: &[u64]) -> Option<f64> {
    let total: u128 = visitors.iter().map(|&count| u128::from(count)).sum();
    if visitors.is_empty() || total == 0 {
        return None;
    }
    let total = total as f64;

    let expected_share = 1.0 / visitors.len() as f64;
    let max_deviation = visitors
        .iter()
        .map(|&count| {
            let actual_share = count as f64 / total;
            (actual_share - expected_share).abs() / expected_share * 100.0
        })
        .fold(0.0_f64, f64::max);

    Some(max_deviation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erf_known_values() {
        assert!(erf(0.0).abs() < 1e-7);
        assert!((erf(1.0) - 0.842_700_79).abs() < 2e-7);
        assert!((erf(-1.0) + 0.842_700_79).abs() < 2e-7);
        assert!((erf(3.0) - 0.999_977_91).abs() < 2e-7);
    }

    #[test]
    fn test_normal_cdf_known_values() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.96) - 0.975_002_1).abs() < 1e-6);
        assert!((normal_cdf(-1.96) - 0.024_997_9).abs() < 1e-6);
        assert!(normal_cdf(8.0) > 0.999_999);
    }

    #[test]
    fn test_p_value_identical_rates_approaches_one() {
        let p = two_proportion_p_value(1_000, 10_000, 1_000, 10_000);
        assert!(p > 0.999, "p = {}", p);

        // Identical totals and successes: both rates are 1
        assert_eq!(two_proportion_p_value(5_000, 5_000, 5_000, 5_000), 1.0);
    }

    #[test]
    fn test_p_value_clear_difference_approaches_zero() {
        let p = two_proportion_p_value(0, 10_000, 2_000, 10_000);
        assert!(p < 1e-6, "p = {}", p);
    }

    #[test]
    fn test_p_value_textbook_case() {
        // 10% vs 12% on 5000 visitors each: z ≈ 3.17, p ≈ 0.0015
        let p = two_proportion_p_value(500, 5_000, 600, 5_000);
        assert!((p - 0.0015).abs() < 0.0005, "p = {}", p);
    }

    #[test]
    fn test_p_value_zero_total_is_nan() {
        assert!(two_proportion_p_value(0, 0, 10, 100).is_nan());
        assert!(two_proportion_p_value(10, 100, 0, 0).is_nan());
    }

    #[test]
    fn test_effect_size() {
        assert_eq!(effect_size(0.10, 0.12).map(|e| (e * 1000.0).round()), Some(200.0));
        assert_eq!(effect_size(0.10, 0.08).map(|e| (e * 1000.0).round()), Some(200.0));
        assert_eq!(effect_size(0.0, 0.1), None);
    }

    #[test]
    fn test_statistical_power_bounds() {
        assert_eq!(statistical_power(0.0, 1_000), 0.0);
        assert_eq!(statistical_power(5.0, 10_000), 1.0);
        let power = statistical_power(0.05, 900);
        assert!((power - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_sample_ratio_deviation_even_split_is_zero() {
        assert_eq!(sample_ratio_deviation(&[500, 500]), Some(0.0));
        assert_eq!(sample_ratio_deviation(&[300, 300, 300]), Some(0.0));
    }

    #[test]
    fn test_sample_ratio_deviation_uneven_split() {
        // 60/40 split: each side deviates 20% of its 50% expected share
        let deviation = sample_ratio_deviation(&[600, 400]).unwrap();
        assert!((deviation - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_extreme_counts_stay_finite() {
        assert_eq!(sample_ratio_deviation(&[u64::MAX, u64::MAX]), Some(0.0));
        assert_eq!(two_proportion_p_value(u64::MAX, u64::MAX, u64::MAX, u64::MAX), 1.0);

        let p = two_proportion_p_value(u64::MAX / 2, u64::MAX, u64::MAX / 2, u64::MAX);
        assert!(p.is_finite());
    }

    #[test]
    fn test_sample_ratio_deviation_no_traffic() {
        assert_eq!(sample_ratio_deviation(&[]), None);
        assert_eq!(sample_ratio_deviation(&[0, 0]), None);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn prop_normal_cdf_is_bounded_and_symmetric(z: i16) -> bool {
        let z = z as f64 / 1000.0;
        let upper = normal_cdf(z);
        let lower = normal_cdf(-z);
        (0.0..=1.0).contains(&upper) && (upper + lower - 1.0).abs() < 1e-6
    }

    #[quickcheck]
    fn prop_p_value_in_unit_interval(a: u16, a_extra: u16, b: u16, b_extra: u16) -> bool {
        let a_total = a as u64 + a_extra as u64 + 1;
        let b_total = b as u64 + b_extra as u64 + 1;
        let p = two_proportion_p_value(a as u64, a_total, b as u64, b_total);
        (0.0..=1.0).contains(&p)
    }

    #[quickcheck]
    fn prop_power_monotonic_and_capped(effect: u16, extra_effect: u16, n: u16, extra_n: u16) -> bool {
        let small_effect = effect as f64 / 1000.0;
        let large_effect = small_effect + extra_effect as f64 / 1000.0;
        let small_n = n as u64;
        let large_n = small_n + extra_n as u64;

        let base = statistical_power(small_effect, small_n);
        base <= statistical_power(large_effect, small_n)
            && base <= statistical_power(small_effect, large_n)
            && statistical_power(large_effect, large_n) <= 1.0
    }

    // Moving traffic from one variant to the other never reduces the deviation
    #[quickcheck]
    fn prop_srm_deviation_grows_with_divergence(base: u16, shift: u16, more: u16) -> bool {
        let base = base as u64 + 1;
        let shift = (shift as u64) % base;
        let further = shift + (more as u64) % (base - shift);

        let near = sample_ratio_deviation(&[base + shift, base - shift]).unwrap();
        let far = sample_ratio_deviation(&[base + further, base - further]).unwrap();
        near <= far + 1e-9
    }
}
