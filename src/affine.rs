use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::range::Range;

/// Distance from `x` to the next representable magnitude, used as the
/// per-operation rounding-error contribution.
pub(crate) fn ulp(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x.is_infinite() {
        return f64::INFINITY;
    }
    let a = x.abs();
    if a == f64::MAX {
        return a - f64::from_bits(a.to_bits() - 1);
    }
    f64::from_bits(a.to_bits() + 1) - a
}

/// An affine form
///
/// ```text
/// x := x0 + x1*e1 + x2*e2 + ... + xn*en +- r
/// ```
///
/// where `x0` is the central value, `xi` are the partial deviations over the
/// noise symbols `ei` in `[-1, 1]`, and `r` bounds all non-linear and
/// rounding effects. The form is a hybrid: it also carries an interval that
/// may be tighter than the pure affine evaluation, and construction always
/// intersects the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffineForm {
    #[serde(flatten)]
    range: Range,
    #[serde(with = "crate::json::float")]
    pub x0: f64,
    #[serde(with = "crate::json::float")]
    pub r: f64,
    pub xi: BTreeMap<u32, f64>,
}

impl AffineForm {
    /// Creates a form from a prior interval and the affine terms, tightening
    /// the interval against the affine evaluation. Any non-finite center,
    /// slack, or coefficient degrades the form to the reals-or-NaN trap.
    pub fn new(iv: Range, x0: f64, r: f64, xi: BTreeMap<u32, f64>) -> Self {
        let mut range = iv;
        if iv.is_reals() && xi.is_empty() {
            // unrestricted form, nothing to tighten
        } else if iv.is_range() {
            if !x0.is_finite() || !r.is_finite() || xi.values().any(|v| !v.is_finite()) {
                range = Range::REALS_NAN;
            } else {
                let radius = Self::radius_of(&xi);
                if radius.is_nan() || radius.is_infinite() {
                    range = Range::REALS_NAN;
                } else {
                    range = Range::new(
                        iv.min.max(x0 - r - radius),
                        iv.max.min(x0 + r + radius),
                    );
                }
            }
        }
        AffineForm { range, x0, r, xi }
    }

    /// A scalar form equivalent to the floating point number `c`.
    pub fn scalar(c: f64) -> Self {
        AffineForm::new(Range::scalar(c), c, 0.0, BTreeMap::new())
    }

    /// A form over `[min, max]` with a single noise symbol.
    pub fn range(min: f64, max: f64, symbol: u32) -> Self {
        let mut xi = BTreeMap::new();
        xi.insert(symbol, (max - min) / 2.0);
        AffineForm::new(Range::new(min, max), (max + min) / 2.0, 0.0, xi)
    }

    pub fn reals() -> Self {
        AffineForm::new(Range::REALS, 0.0, 0.0, BTreeMap::new())
    }

    pub fn empty() -> Self {
        AffineForm::new(Range::EMPTY, 0.0, 0.0, BTreeMap::new())
    }

    pub fn reals_nan() -> Self {
        AffineForm::new(Range::REALS_NAN, 0.0, 0.0, BTreeMap::new())
    }

    pub fn min(&self) -> f64 {
        self.range.min
    }
    pub fn max(&self) -> f64 {
        self.range.max
    }
    pub fn interval(&self) -> Range {
        self.range
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
    pub fn is_scalar(&self) -> bool {
        self.range.is_scalar()
    }
    pub fn is_reals(&self) -> bool {
        self.range.is_reals()
    }
    pub fn is_reals_nan(&self) -> bool {
        self.range.is_reals_nan()
    }
    pub fn is_finite(&self) -> bool {
        self.range.is_finite()
    }
    pub fn is_trap(&self) -> bool {
        self.range.is_trap()
    }

    fn radius_of(xi: &BTreeMap<u32, f64>) -> f64 {
        let mut rad = 0.0;
        for v in xi.values() {
            if !v.is_finite() {
                return f64::INFINITY;
            }
            rad += v.abs();
            rad += ulp(rad);
        }
        rad
    }

    /// Total linear deviation `sum |xi|`, not counting `r`. NaN for the
    /// empty form, infinite if any coefficient is non-finite.
    pub fn radius(&self) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        Self::radius_of(&self.xi)
    }

    fn key_union(&self, other: &AffineForm) -> BTreeSet<u32> {
        let mut keys: BTreeSet<u32> = self.xi.keys().copied().collect();
        keys.extend(other.xi.keys().copied());
        keys
    }

    fn coeff(&self, i: u32) -> f64 {
        self.xi.get(&i).copied().unwrap_or(0.0)
    }

    pub fn add(&self, other: &AffineForm) -> AffineForm {
        if self.is_empty() || other.is_empty() {
            return AffineForm::empty();
        }
        let nc = self.x0 + other.x0;
        let mut err = ulp(nc);
        let mut nts = BTreeMap::new();
        for i in self.key_union(other) {
            let sum = self.coeff(i) + other.coeff(i);
            err += ulp(sum);
            nts.insert(i, sum);
        }
        let mut nr = self.r + other.r + err;
        nr += ulp(nr);
        AffineForm::new(self.range.add(&other.range), nc, nr, nts)
    }

    pub fn sub(&self, other: &AffineForm) -> AffineForm {
        if self.is_empty() || other.is_empty() {
            return AffineForm::empty();
        }
        let nc = self.x0 - other.x0;
        let mut err = ulp(nc);
        let mut nts = BTreeMap::new();
        for i in self.key_union(other) {
            let dif = self.coeff(i) - other.coeff(i);
            err += ulp(dif);
            nts.insert(i, dif);
        }
        let mut nr = self.r + other.r + err;
        nr += ulp(nr);
        AffineForm::new(self.range.sub(&other.range), nc, nr, nts)
    }

    /// Multiplies the form by a scalar.
    pub fn scale(&self, alpha: f64) -> AffineForm {
        if self.is_empty() {
            return AffineForm::empty();
        }
        if self.is_reals() {
            return AffineForm::reals();
        }
        if alpha.is_nan() {
            return AffineForm::empty();
        }
        let nts = self.xi.iter().map(|(i, v)| (*i, v * alpha)).collect();
        AffineForm::new(
            self.range.mul(&Range::scalar(alpha)),
            self.x0 * alpha,
            self.r * alpha.abs(),
            nts,
        )
    }

    pub fn neg(&self) -> AffineForm {
        if self.is_empty() {
            return AffineForm::empty();
        }
        if self.is_reals() {
            return AffineForm::reals();
        }
        let nts = self.xi.iter().map(|(i, v)| (*i, -v)).collect();
        AffineForm::new(self.range.neg(), -self.x0, self.r, nts)
    }

    /// Multiplication with the simpler approximation proposed by Stolfi et
    /// al.: the quadratic cross term is folded conservatively into the
    /// slack. The interval product is computed as well and the intersection
    /// kept, minimizing error propagation.
    pub fn mul(&self, other: &AffineForm) -> AffineForm {
        if self.is_empty() || other.is_empty() {
            return AffineForm::empty();
        }
        if self.is_scalar() && other.is_scalar() {
            return AffineForm::scalar(self.x0 * other.x0);
        }
        let c = self.x0 * other.x0;
        let noise = self.x0.abs() * other.r
            + other.x0.abs() * self.r
            + (self.radius() + self.r) * (other.radius() + other.r);
        let mut nts = BTreeMap::new();
        for i in self.key_union(other) {
            nts.insert(i, self.coeff(i) * other.x0 + other.coeff(i) * self.x0);
        }
        AffineForm::new(self.range.mul(&other.range), c, noise, nts)
    }

    /// Scalar multiplication, scalar addition and noise increment in one
    /// step: `x*alpha + delta +- noise`, with rounding slack accumulated on
    /// the center, every coefficient, and the derived interval.
    pub fn affine(&self, alpha: f64, delta: f64, noise: f64) -> AffineForm {
        if self.is_empty() {
            return AffineForm::empty();
        }
        if self.is_reals() {
            return AffineForm::reals();
        }
        let nc = self.x0 * alpha + delta;
        let mut nr = self.r * alpha.abs() + noise;
        nr += ulp(nr) + ulp(nc);
        let mut nts = BTreeMap::new();
        for (sym, v) in &self.xi {
            let nval = v * alpha;
            nr += ulp(nval);
            nts.insert(*sym, nval);
        }
        let mut nmin = self.min() * alpha + delta;
        nmin -= ulp(nmin);
        let mut nmax = self.max() * alpha + delta;
        nmax += ulp(nmax);
        AffineForm::new(
            Range::new(
                (nmin - noise).min(nmax - noise),
                (nmin + noise).max(nmax + noise),
            ),
            nc,
            nr,
            nts,
        )
    }

    /// Exponentiation by minimax affine approximation over `[min, max]`.
    pub fn exp(&self) -> AffineForm {
        if self.is_empty() {
            return AffineForm::empty();
        }
        if self.is_reals() {
            return AffineForm::reals();
        }
        let ia_min = self.min().exp();
        let ia_max = self.max().exp();
        let delta = (ia_max + ia_min * (1.0 - self.min() - self.max())) / 2.0;
        let noise = (ia_max + ia_min * (self.min() - self.max() - 1.0)) / 2.0;
        if noise < 0.0 || self.is_scalar() {
            return AffineForm::scalar(self.x0.exp().max(f64::MIN_POSITIVE));
        }
        let aux = self.affine(ia_min, delta, noise);
        // The approximation must not undercut exp's own lower bound, and the
        // result is always strictly positive.
        if aux.min() > ia_min {
            let d = aux.min() - ia_min;
            AffineForm::new(
                Range::new(ia_min, aux.max()),
                aux.x0 - d,
                aux.r + d,
                aux.xi,
            )
        } else if aux.min() < 0.0 {
            let d = f64::MIN_POSITIVE - aux.min();
            AffineForm::new(
                Range::new(f64::MIN_POSITIVE, aux.max()),
                aux.x0 + d,
                aux.r + d,
                aux.xi,
            )
        } else {
            aux
        }
    }

    /// Natural logarithm by Chebyshev-style affine approximation.
    ///
    /// A lower bound below zero yields the `-inf` scalar sentinel, which
    /// lands in the reals-or-NaN trap encoding.
    pub fn log(&self) -> AffineForm {
        if self.is_empty() {
            return AffineForm::empty();
        }
        if self.is_reals() {
            return AffineForm::reals();
        }
        if self.min() < 0.0 {
            return AffineForm::scalar(f64::NEG_INFINITY);
        }
        if self.is_scalar() {
            return AffineForm::scalar(self.x0.ln());
        }
        let l = self.min().ln();
        let u = self.max().ln();
        let alpha = (u - l) / (self.max() - self.min());
        let xs = 1.0 / alpha;
        let ys = (xs - self.min()) * alpha + l;
        let logxs = xs.ln();
        let delta = (logxs + ys) / 2.0 - alpha * xs;
        let noise = (logxs - ys).abs() / 2.0;
        self.affine(alpha, delta, noise)
    }

    /// Square root via `exp(0.5 * log(x))`.
    pub fn sqrt(&self) -> AffineForm {
        if self.is_empty() {
            return AffineForm::empty();
        }
        if self.is_reals() {
            return AffineForm::reals();
        }
        self.log().scale(0.5).exp()
    }

    /// Reciprocal by minimax affine approximation. An interval straddling
    /// zero is a pole crossing and yields the reals-or-NaN trap; the scalar
    /// zero yields the `+inf` scalar.
    pub fn inv(&self) -> AffineForm {
        if self.is_empty() {
            return AffineForm::empty();
        }
        if self.is_reals() {
            return AffineForm::reals();
        }
        if self.is_scalar() {
            return if self.x0 == 0.0 {
                AffineForm::scalar(f64::INFINITY)
            } else {
                AffineForm::scalar(1.0 / self.x0)
            };
        }
        if self.min() < 0.0 && self.max() > 0.0 {
            return AffineForm::reals_nan();
        }
        let l = self.min().abs().min(self.max().abs());
        let u = self.min().abs().max(self.max().abs());
        let alpha = -1.0 / (u * u);
        let aux_low = 2.0 / u;
        let aux_upp = 1.0 / l - alpha * l;
        let den = if self.min() < 0.0 { -2.0 } else { 2.0 };
        let delta = (aux_upp + aux_low) / den;
        let noise = (aux_upp - aux_low) / 2.0;
        self.affine(alpha, delta, noise.max(0.0))
    }

    /// Division as `a * inv(b)`, as suggested by Stolfi.
    pub fn div(&self, other: &AffineForm) -> AffineForm {
        self.mul(&other.inv())
    }

    /// Square via self-multiplication with a symmetry correction: excess
    /// slack over the center is shifted into the center, and the interval
    /// minimum is clamped at zero when the operand straddles zero.
    pub fn sqr(&self) -> AffineForm {
        if self.is_empty() {
            return AffineForm::empty();
        }
        if self.is_reals() {
            return AffineForm::reals();
        }
        if self.is_scalar() {
            return AffineForm::scalar(self.x0 * self.x0);
        }
        let aux = self.mul(self);
        let mut x0 = aux.x0;
        let mut r = aux.r;
        let mut d = r - x0;
        if d > 0.0 {
            d /= 2.0;
            r -= d;
            x0 += d;
        }
        let mut min = aux.min();
        let mut max = aux.max();
        if max > 0.0 && min < 0.0 {
            max = max.max(-min);
            min = 0.0;
        }
        AffineForm::new(Range::new(min, max), x0, r, aux.xi)
    }

    /// Sine. Scalars are exact; otherwise the conservative `[-1, 1]` range
    /// over a fresh noise symbol supplied by the caller.
    pub fn sin(&self, symbol: u32) -> AffineForm {
        if self.is_empty() {
            return AffineForm::empty();
        }
        if self.is_reals() {
            return AffineForm::reals();
        }
        if self.is_scalar() {
            AffineForm::scalar(self.x0.sin())
        } else {
            AffineForm::range(-1.0, 1.0, symbol)
        }
    }

    /// Cosine, same contract as [`sin`](Self::sin).
    pub fn cos(&self, symbol: u32) -> AffineForm {
        if self.is_empty() {
            return AffineForm::empty();
        }
        if self.is_reals() {
            return AffineForm::reals();
        }
        if self.is_scalar() {
            AffineForm::scalar(self.x0.cos())
        } else {
            AffineForm::range(-1.0, 1.0, symbol)
        }
    }

    /// An affine model of the common range of both forms, preserving as
    /// much correlation information as possible: per shared symbol the
    /// smaller-magnitude coefficient survives and the disagreement moves
    /// into the slack.
    pub fn join(&self, other: &AffineForm) -> AffineForm {
        let nc = (self.x0 + other.x0) / 2.0;
        let mut nr = (self.x0 - other.x0).abs();
        nr = (nr + 2.0 * ulp(nr)) / 2.0;
        nr += self.r;
        nr += ulp(nr);
        nr += other.r;
        nr += ulp(nr);
        let mut nxi = BTreeMap::new();
        for i in self.key_union(other) {
            let xi = self.coeff(i);
            let yi = other.coeff(i);
            if xi * yi > 0.0 {
                nxi.insert(i, xi.abs().min(yi.abs()) * xi.signum());
                nr += (xi - yi).abs();
                nr += ulp(nr);
            } else {
                nr += xi.abs();
                nr += ulp(nr);
                nr += yi.abs();
                nr += ulp(nr);
            }
        }
        AffineForm::new(self.range.join(&other.range), nc, nr, nxi)
    }

    /// Similarity is the amount of uncorrelated deviation that merging both
    /// forms into one would introduce, compared against `tol`.
    pub fn is_similar(&self, other: &AffineForm, tol: f64) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.range.is_trap_with(&other.range) {
            return false;
        }
        let mut nr = (self.x0 - other.x0).abs();
        nr = (nr + ulp(nr)) / 2.0;
        for i in self.key_union(other) {
            let xi = self.coeff(i);
            let yi = other.coeff(i);
            nr += if xi * yi > 0.0 { (xi - yi).abs() } else { xi + yi };
        }
        nr < tol
    }
}

impl PartialEq for AffineForm {
    fn eq(&self, other: &Self) -> bool {
        if self.is_scalar() && other.is_scalar() {
            return self.x0 == other.x0;
        }
        if self.range.is_range() && other.range.is_range() {
            return self.x0 == other.x0
                && self.r == other.r
                && self.xi == other.xi
                && self.min() == other.min()
                && self.max() == other.max();
        }
        // Special kinds compare by their interval encoding.
        self.range == other.range
    }
}

impl Display for AffineForm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.range)?;
        if self.is_scalar() || self.is_finite() {
            write!(f, " ~ {:.2}", self.x0)?;
            for (i, v) in &self.xi {
                write!(f, " + {:.2}*e{}", v, i)?;
            }
            write!(f, " +- {:.2}", self.r)?;
        }
        Ok(())
    }
}
