//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp a value symmetrically into `[-limit, limit]`.
///
/// A non-finite or negative limit leaves the value untouched.
pub fn clamp_sym<T>(value: T, limit: T) -> T
where
    T: Float
{
    if !limit.is_finite() || limit < T::zero() {
        return value;
    }

    value.max(-limit).min(limit)
}

/// Wrap an angle into the range `[-pi, pi)`.
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap_or_else(T::zero);
    let tau_t: T = pi_t + pi_t;

    rem_euclid(angle + pi_t, tau_t) - pi_t
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

#[cfg(test)]
mod test {
    use super::*;

    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn test_clamp_sym() {
        assert_eq!(clamp_sym(2f64, 1f64), 1f64);
        assert_eq!(clamp_sym(-2f64, 1f64), -1f64);
        assert_eq!(clamp_sym(0.5f64, 1f64), 0.5f64);
        assert_eq!(clamp_sym(5f64, f64::INFINITY), 5f64);
    }

    #[test]
    fn test_wrap_pi() {
        assert!((wrap_pi(0f64)).abs() < 1e-12);
        assert!((wrap_pi(3f64 * PI / 2f64) + PI / 2f64).abs() < 1e-12);
        assert!((wrap_pi(-3f64 * PI / 2f64) - PI / 2f64).abs() < 1e-12);
        assert!((wrap_pi(4f64 * PI + 0.1) - 0.1).abs() < 1e-9);
        // pi itself lands on the lower bound
        assert!((wrap_pi(PI) + PI).abs() < 1e-12);
    }
}
