//! Numeric helpers for formula values.
//!
//! Every value is an `f64`. Comparisons and truthiness use a fixed tolerance
//! so that values such as `0.1 + 0.2` and `0.3` compare equal.

/// Value type produced by every expression.
pub type StatValue = f64;

/// Tolerance used by equality and truthiness.
pub const EPSILON: StatValue = 1e-3;

/// Operations formulas need on top of plain arithmetic.
pub trait FormulaNumber: Copy {
    /// `true` when `self` and `other` differ by less than [`EPSILON`].
    fn is_close_to(self, other: Self) -> bool;

    /// `true` unless the value is close to zero.
    fn is_truthy(self) -> bool;

    /// `1.0` for `true`, `0.0` for `false`.
    fn from_bool(value: bool) -> Self;
}

impl FormulaNumber for StatValue {
    fn is_close_to(self, other: Self) -> bool {
        (self - other).abs() < EPSILON
    }

    fn is_truthy(self) -> bool {
        !self.is_close_to(0.0)
    }

    fn from_bool(value: bool) -> Self {
        if value {
            1.0
        } else {
            0.0
        }
    }
}
