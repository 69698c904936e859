//! Tolerance model
//!
//! A single continuous tolerance drives both the decimal precision used for
//! fingerprinting and the epsilon used for direct comparisons. The combined
//! comparison is `|a - b| <= max(abs_tol, max(|a|, |b|) * rel_tol)`.

use nalgebra::{Matrix4, Vector3};

/// Precision used when the tolerance is zero or negative
pub const MAX_DIGITS: u32 = 6;

/// Convert a tolerance into a number of decimal places, clamped to `0..=6`.
pub fn digits_from_tolerance(tolerance: f32) -> u32 {
    if tolerance <= 0.0 || tolerance.is_nan() {
        return MAX_DIGITS;
    }
    let digits = (-tolerance.log10()).round();
    digits.clamp(0.0, MAX_DIGITS as f32) as u32
}

/// Smallest determinant magnitude treated as invertible at this precision
pub fn singularity_epsilon(digits: u32) -> f32 {
    10f32.powi(-(digits as i32))
}

/// Round a value to `digits` decimal places.
///
/// Halves round away from zero (`f64::round`). The scaling is done in f64 so
/// that re-rounding an already rounded f32 lands on the same value, and
/// negative zero collapses onto positive zero so both share one bit pattern.
pub fn round_to_digits(value: f32, digits: u32) -> f32 {
    let scale = 10f64.powi(digits as i32);
    let rounded = ((value as f64 * scale).round() / scale) as f32;
    rounded + 0.0
}

/// Round every component of a matrix independently.
pub fn round_matrix(matrix: &Matrix4<f32>, digits: u32) -> Matrix4<f32> {
    matrix.map(|value| round_to_digits(value, digits))
}

/// Scalar comparison with combined absolute and relative tolerance.
pub fn nearly_equal(a: f32, b: f32, abs_tol: f32, rel_tol: f32) -> bool {
    let diff = (a - b).abs();
    let max_abs = a.abs().max(b.abs());
    diff <= abs_tol.max(max_abs * rel_tol)
}

/// Component-wise comparison of two vectors.
pub fn nearly_equal_vec3(a: &Vector3<f32>, b: &Vector3<f32>, abs_tol: f32, rel_tol: f32) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(&x, &y)| nearly_equal(x, y, abs_tol, rel_tol))
}

/// Component-wise comparison of all 16 matrix components.
pub fn nearly_equal_matrix(a: &Matrix4<f32>, b: &Matrix4<f32>, abs_tol: f32, rel_tol: f32) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(&x, &y)| nearly_equal(x, y, abs_tol, rel_tol))
}

/// Whether any matrix in `list` is nearly equal to `target`.
pub fn contains_matrix(list: &[Matrix4<f32>], target: &Matrix4<f32>, abs_tol: f32, rel_tol: f32) -> bool {
    index_of_matrix(list, target, abs_tol, rel_tol).is_some()
}

/// Index of the first matrix in `list` nearly equal to `target`.
pub fn index_of_matrix(
    list: &[Matrix4<f32>],
    target: &Matrix4<f32>,
    abs_tol: f32,
    rel_tol: f32,
) -> Option<usize> {
    list.iter()
        .position(|candidate| nearly_equal_matrix(candidate, target, abs_tol, rel_tol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_digits_from_tolerance() {
        assert_eq!(digits_from_tolerance(1e-4), 4);
        assert_eq!(digits_from_tolerance(1.0), 0);
        assert_eq!(digits_from_tolerance(0.0), 6);
        assert_eq!(digits_from_tolerance(-1.0), 6);
        assert_eq!(digits_from_tolerance(1e-9), 6);
        assert_eq!(digits_from_tolerance(100.0), 0);
        assert_eq!(digits_from_tolerance(5e-3), 2);
    }

    #[test]
    fn test_round_to_digits() {
        assert_eq!(round_to_digits(1.23456, 2), 1.23);
        assert_eq!(round_to_digits(1.235, 0), 1.0);
        assert_eq!(round_to_digits(2.5, 0), 3.0);
        assert_eq!(round_to_digits(-2.5, 0), -3.0);
    }

    #[test]
    fn test_negative_zero_is_canonical() {
        let rounded = round_to_digits(-0.0001, 2);
        assert_eq!(rounded.to_bits(), 0.0f32.to_bits());
        assert_eq!(round_to_digits(-0.0, 4).to_bits(), 0.0f32.to_bits());
    }

    #[test]
    fn test_nan_propagates() {
        assert!(round_to_digits(f32::NAN, 3).is_nan());
        assert_eq!(round_to_digits(f32::INFINITY, 3), f32::INFINITY);
    }

    #[test]
    fn test_nearly_equal_absolute_and_relative() {
        assert!(nearly_equal(1.0, 1.000_001, 1e-5, 0.0));
        assert!(!nearly_equal(1.0, 1.1, 1e-5, 1e-5));
        // Relative term dominates for large magnitudes
        assert!(nearly_equal(1_000_000.0, 1_000_005.0, 1e-5, 1e-5));
        assert!(!nearly_equal(f32::NAN, f32::NAN, 1.0, 1.0));
    }

    #[test]
    fn test_nearly_equal_vec3() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = Vector3::new(1.0, 2.0, 3.000_001);
        assert!(nearly_equal_vec3(&a, &b, 1e-5, 1e-5));
        assert!(!nearly_equal_vec3(&a, &Vector3::new(1.0, 2.1, 3.0), 1e-5, 1e-5));
    }

    #[test]
    fn test_matrix_lookup_helpers() {
        let list = vec![
            Matrix4::identity(),
            Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0)),
        ];
        let target = Matrix4::new_translation(&Vector3::new(1.000_001, 0.0, 0.0));

        assert_eq!(index_of_matrix(&list, &target, 1e-4, 1e-4), Some(1));
        assert!(contains_matrix(&list, &Matrix4::identity(), 1e-4, 1e-4));
        assert!(!contains_matrix(&list, &Matrix4::from_element(7.0), 1e-4, 1e-4));
    }

    proptest! {
        #[test]
        fn prop_rounding_is_idempotent(value in -100.0f32..100.0, digits in 0u32..=4) {
            let once = round_to_digits(value, digits);
            let twice = round_to_digits(once, digits);
            prop_assert_eq!(once.to_bits(), twice.to_bits());
        }

        #[test]
        fn prop_rounding_is_idempotent_for_unit_values(value in -1.0f32..1.0, digits in 0u32..=6) {
            let once = round_to_digits(value, digits);
            prop_assert_eq!(once.to_bits(), round_to_digits(once, digits).to_bits());
        }

        #[test]
        fn prop_rounding_stays_within_half_step(value in -100.0f32..100.0, digits in 0u32..=4) {
            let step = 10f32.powi(-(digits as i32));
            prop_assert!((round_to_digits(value, digits) - value).abs() <= step * 0.5 + 1e-4);
        }
    }
}
