use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// A closed interval over the reals with special kinds encoded directly in
/// the endpoints:
///
/// - `min > max` is the empty set,
/// - `min == max` is a scalar,
/// - `(-MAX, MAX)` is "reals" (unrestricted but finite-representable),
/// - a non-finite or NaN endpoint is the "reals-or-NaN" trap state signaling
///   loss of precision (e.g. a division spanning a pole),
/// - anything else is a finite range.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(with = "crate::json::float")]
    pub min: f64,
    #[serde(with = "crate::json::float")]
    pub max: f64,
}

impl Range {
    /// The empty set.
    pub const EMPTY: Range = Range {
        min: f64::MAX,
        max: -f64::MAX,
    };
    /// Any number from the reals.
    pub const REALS: Range = Range {
        min: -f64::MAX,
        max: f64::MAX,
    };
    /// Any number from the reals, or NaN. The trap state.
    pub const REALS_NAN: Range = Range {
        min: f64::NEG_INFINITY,
        max: f64::INFINITY,
    };

    pub const fn new(min: f64, max: f64) -> Self {
        Range { min, max }
    }

    pub const fn scalar(c: f64) -> Self {
        Range { min: c, max: c }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
    pub fn is_scalar(&self) -> bool {
        self.min == self.max
    }
    pub fn is_reals(&self) -> bool {
        self.min == -f64::MAX && self.max == f64::MAX
    }
    pub fn is_reals_nan(&self) -> bool {
        self.min.is_nan() || self.max.is_nan() || self.min.is_infinite() || self.max.is_infinite()
    }
    /// A genuine finite range: not empty, not a scalar, both endpoints finite.
    pub fn is_range(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && !self.is_empty() && !self.is_scalar()
    }
    pub fn is_finite(&self) -> bool {
        self.min != f64::NEG_INFINITY && self.max != f64::INFINITY
    }

    /// True if this operand requires special treatment in arithmetic.
    pub fn is_trap(&self) -> bool {
        self.is_empty() || self.is_reals_nan()
    }
    pub fn is_trap_with(&self, other: &Range) -> bool {
        self.is_trap() || other.is_trap()
    }

    pub fn is_strictly_positive(&self) -> bool {
        self.min > 0.0
    }
    pub fn is_strictly_negative(&self) -> bool {
        self.max < 0.0
    }
    pub fn is_weakly_positive(&self) -> bool {
        self.min >= 0.0
    }
    pub fn is_weakly_negative(&self) -> bool {
        self.max <= 0.0
    }

    pub fn add(&self, other: &Range) -> Range {
        Range::new(self.min + other.min, self.max + other.max)
    }

    pub fn sub(&self, other: &Range) -> Range {
        Range::new(self.min - other.max, self.max - other.min)
    }

    pub fn neg(&self) -> Range {
        Range::new((-self.max).min(-self.min), (-self.max).max(-self.min))
    }

    pub fn mul(&self, other: &Range) -> Range {
        let products = [
            self.min * other.min,
            self.min * other.max,
            self.max * other.min,
            self.max * other.max,
        ];
        let mut lo = products[0];
        let mut hi = products[0];
        for p in &products[1..] {
            lo = lo.min(*p);
            hi = hi.max(*p);
        }
        Range::new(lo, hi)
    }

    /// Smallest enclosing range of both operands.
    pub fn join(&self, other: &Range) -> Range {
        if self.is_finite() && other.is_finite() {
            return Range::new(self.min.min(other.min), self.max.max(other.max));
        }
        Range::REALS_NAN
    }

    pub fn intersect(&self, other: &Range) -> Range {
        Range::new(self.min.max(other.min), self.max.min(other.max))
    }

    pub fn contains(&self, x: f64) -> bool {
        self.min <= x && x <= self.max
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "{{}}")
        } else if self.is_scalar() {
            write!(f, "{}", self.min)
        } else if self.is_reals() {
            write!(f, "(-oo; +oo)")
        } else if self.is_reals_nan() {
            write!(f, "[-oo; +oo]")
        } else {
            write!(f, "[{:.2}; {:.2}]", self.min, self.max)
        }
    }
}
