use log::debug;

use crate::affine::AffineForm;
use crate::context::{Aadd, Bdd, Context};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::range::Range;

/// Direction of a relational operator on affine diagrams.
#[derive(Debug, Copy, Clone)]
enum Cmp {
    Lt,
    Le,
    Gt,
    Ge,
}

/// A leaf range is considered to touch zero within this margin when a
/// relational operator decides between the weak and strict side.
const TOUCH_ZERO: f64 = 2.0 * f64::MIN_POSITIVE;

impl Context {
    /// A leaf holding the exact scalar `value`.
    pub fn scalar(&self, value: f64) -> Aadd {
        self.affine_leaf(AffineForm::scalar(value))
    }

    /// A leaf over `[min, max]` with a fresh anonymous noise symbol.
    pub fn range(&self, min: f64, max: f64) -> Result<Aadd> {
        if min >= max {
            return Err(Error::InvalidRange { min, max });
        }
        Ok(self.affine_leaf(AffineForm::range(min, max, self.noise.fresh())))
    }

    /// A leaf over `[min, max]` reusing the given noise symbol, preserving
    /// correlation with other quantities derived from the same source.
    pub fn range_with_symbol(&self, min: f64, max: f64, symbol: u32) -> Result<Aadd> {
        if min >= max {
            return Err(Error::InvalidRange { min, max });
        }
        Ok(self.affine_leaf(AffineForm::range(min, max, symbol)))
    }

    /// A leaf over `[min, max]` whose noise symbol is interned by name.
    pub fn range_named(&self, min: f64, max: f64, name: &str) -> Result<Aadd> {
        if min >= max {
            return Err(Error::InvalidRange { min, max });
        }
        Ok(self.affine_leaf(AffineForm::range(min, max, self.noise.named(name))))
    }

    /// Applies a unary operator to every leaf value, infeasible-propagating.
    fn apply_affine_unary<F>(&self, op: &F, a: &Aadd) -> Aadd
    where
        F: Fn(&AffineForm) -> AffineForm,
    {
        if a.is_infeasible() {
            return self.infeasible();
        }
        if a.is_leaf() {
            return self.affine_leaf(op(a.value()));
        }
        let tr = self.apply_affine_unary(op, a.t());
        let fr = self.apply_affine_unary(op, a.f());
        self.internal(a.index(), tr, fr)
    }

    /// Applies a binary operator on the leaf values of two diagrams,
    /// interleaved by index order: recursion descends into the diagram(s)
    /// whose root index is smaller, holding the other constant across that
    /// step.
    fn apply_affine<F>(&self, op: &F, a: &Aadd, b: &Aadd) -> Aadd
    where
        F: Fn(&AffineForm, &AffineForm) -> AffineForm,
    {
        if a.is_infeasible() || b.is_infeasible() {
            return self.infeasible();
        }
        if a.is_leaf() && a.value().is_empty() {
            return self.empty();
        }
        if b.is_leaf() && b.value().is_empty() {
            return self.empty();
        }
        if a.is_leaf() && b.is_leaf() {
            return self.affine_leaf(op(a.value(), b.value()));
        }

        let index = a.index().min(b.index());
        let (at, af) = if a.index() <= b.index() {
            (a.t(), a.f())
        } else {
            (a, a)
        };
        let (bt, bf) = if b.index() <= a.index() {
            (b.t(), b.f())
        } else {
            (b, b)
        };
        let tr = self.apply_affine(op, at, bt);
        let fr = self.apply_affine(op, af, bf);
        self.internal(index, tr, fr)
    }

    pub fn add(&self, a: &Aadd, b: &Aadd) -> Aadd {
        debug!("add(...)");
        self.apply_affine(&|x, y| x.add(y), a, b)
    }

    pub fn sub(&self, a: &Aadd, b: &Aadd) -> Aadd {
        debug!("sub(...)");
        self.apply_affine(&|x, y| x.sub(y), a, b)
    }

    pub fn mul(&self, a: &Aadd, b: &Aadd) -> Aadd {
        debug!("mul(...)");
        self.apply_affine(&|x, y| x.mul(y), a, b)
    }

    pub fn div(&self, a: &Aadd, b: &Aadd) -> Aadd {
        debug!("div(...)");
        self.apply_affine(&|x, y| x.div(y), a, b)
    }

    pub fn mul_scalar(&self, a: &Aadd, c: f64) -> Aadd {
        self.mul(a, &self.scalar(c))
    }

    pub fn neg(&self, a: &Aadd) -> Aadd {
        self.apply_affine_unary(&AffineForm::neg, a)
    }

    pub fn exp(&self, a: &Aadd) -> Aadd {
        self.apply_affine_unary(&AffineForm::exp, a)
    }

    pub fn log(&self, a: &Aadd) -> Aadd {
        self.apply_affine_unary(&AffineForm::log, a)
    }

    pub fn sqrt(&self, a: &Aadd) -> Aadd {
        self.apply_affine_unary(&AffineForm::sqrt, a)
    }

    pub fn inv(&self, a: &Aadd) -> Aadd {
        self.apply_affine_unary(&AffineForm::inv, a)
    }

    pub fn sqr(&self, a: &Aadd) -> Aadd {
        self.apply_affine_unary(&AffineForm::sqr, a)
    }

    pub fn sin(&self, a: &Aadd) -> Aadd {
        self.apply_affine_unary(&|v| v.sin(self.noise.fresh()), a)
    }

    pub fn cos(&self, a: &Aadd) -> Aadd {
        self.apply_affine_unary(&|v| v.cos(self.noise.fresh()), a)
    }

    /// Deep copy of a diagram. Leaves carry over their (refined) bounds but
    /// start unsolved again; the copy is re-reduced on the way up.
    fn clone_tree(&self, a: &Aadd) -> Aadd {
        if a.is_leaf() {
            if a.is_infeasible() {
                return self.empty();
            }
            return self.affine_leaf(a.solved_value());
        }
        let tr = self.clone_tree(a.t());
        let fr = self.clone_tree(a.f());
        self.internal(a.index(), tr, fr)
    }

    /// Multiplies an affine diagram by a Boolean diagram, interpreting
    /// `True` as 1.0 and `False` as 0.0. The diagrams are interleaved by
    /// index order like any binary apply.
    pub fn mul_bdd(&self, a: &Aadd, g: &Bdd) -> Aadd {
        if a.is_infeasible() || g.is_infeasible() {
            return self.infeasible();
        }
        if g.is_leaf() {
            // Note: Empty * False is the scalar 0.0.
            return if *g.value() {
                self.clone_tree(a)
            } else {
                self.scalar(0.0)
            };
        }

        let index = a.index().min(g.index());
        let (at, af) = if a.index() <= g.index() {
            (a.t(), a.f())
        } else {
            (a, a)
        };
        let (gt, gf) = if g.index() <= a.index() {
            (g.t(), g.f())
        } else {
            (g, g)
        };
        let tr = self.mul_bdd(at, gt);
        let fr = self.mul_bdd(af, gf);
        self.internal(index, tr, fr)
    }

    /// If-then-else composition of two affine diagrams under a Boolean
    /// condition: `t*cond + e*(NOT cond)`.
    pub fn ite(&self, c: &Bdd, t: &Aadd, e: &Aadd) -> Aadd {
        debug!("ite(...)");
        if c.is_infeasible() {
            return self.infeasible();
        }
        if c.is_leaf() {
            return if *c.value() {
                self.clone_tree(t)
            } else {
                self.clone_tree(e)
            };
        }
        self.add(&self.mul_bdd(t, c), &self.mul_bdd(e, &self.not(c)))
    }

    /// Constrains the diagram to `[lb, ub]`: paths where the value provably
    /// leaves the bounds become empty, undecided leaves pick up fresh
    /// linear constraints that the next range query resolves.
    pub fn intersect(&self, a: &Aadd, lb: f64, ub: f64) -> Result<Aadd> {
        let not_too_low = self.ge(a, &self.scalar(lb))?;
        let not_too_large = self.le(a, &self.scalar(ub))?;
        let overlap = self.and(&not_too_low, &not_too_large);
        Ok(self.ite(&overlap, a, &self.empty()))
    }

    /// Constrains the diagram to the refined range of another diagram.
    pub fn intersect_aadd(&self, a: &Aadd, other: &Aadd) -> Result<Aadd> {
        let range = self.range_of(other)?;
        self.intersect(a, range.min, range.max)
    }

    fn check_objective(&self, d: &Aadd, op: Cmp) -> Bdd {
        if d.is_leaf() {
            if d.is_infeasible() || d.value().is_empty() {
                return self.bool_infeasible();
            }
            let range = d.solved_range();
            match op {
                Cmp::Ge => {
                    if range.min > 0.0 || range.min.abs() < TOUCH_ZERO {
                        return self.tru();
                    }
                    if range.max < 0.0 {
                        return self.fls();
                    }
                }
                Cmp::Gt => {
                    if range.min > 0.0 {
                        return self.tru();
                    }
                    if range.max < 0.0 || range.max.abs() < TOUCH_ZERO {
                        return self.fls();
                    }
                }
                Cmp::Le => {
                    if range.min > 0.0 {
                        return self.fls();
                    }
                    if range.max < 0.0 || range.max.abs() < TOUCH_ZERO {
                        return self.tru();
                    }
                }
                Cmp::Lt => {
                    if range.min > 0.0 || range.min.abs() < TOUCH_ZERO {
                        return self.fls();
                    }
                    if range.max < 0.0 {
                        return self.tru();
                    }
                }
            }
            // Undecided: the leaf's own affine form becomes a fresh linear
            // constraint, ordered below everything already in play.
            let index = self.conditions.new_constraint(d.value().clone(), "");
            return match op {
                Cmp::Ge | Cmp::Gt => self.internal(index, self.tru(), self.fls()),
                Cmp::Le | Cmp::Lt => self.internal(index, self.fls(), self.tru()),
            };
        }
        let tr = self.check_objective(d.t(), op);
        let fr = self.check_objective(d.f(), op);
        self.internal(d.index(), tr, fr)
    }

    fn compare(&self, a: &Aadd, b: &Aadd, op: Cmp) -> Result<Bdd> {
        let d = self.sub(a, b);
        // Forces refinement so leaves decide on their tightest known bounds.
        self.range_of(&d)?;
        Ok(self.check_objective(&d, op))
    }

    /// `a < b` as a Boolean diagram.
    pub fn lt(&self, a: &Aadd, b: &Aadd) -> Result<Bdd> {
        debug!("lt(...)");
        self.compare(a, b, Cmp::Lt)
    }

    /// `a <= b` as a Boolean diagram.
    pub fn le(&self, a: &Aadd, b: &Aadd) -> Result<Bdd> {
        debug!("le(...)");
        self.compare(a, b, Cmp::Le)
    }

    /// `a > b` as a Boolean diagram.
    pub fn gt(&self, a: &Aadd, b: &Aadd) -> Result<Bdd> {
        debug!("gt(...)");
        self.compare(a, b, Cmp::Gt)
    }

    /// `a >= b` as a Boolean diagram.
    pub fn ge(&self, a: &Aadd, b: &Aadd) -> Result<Bdd> {
        debug!("ge(...)");
        self.compare(a, b, Cmp::Ge)
    }

    /// Equality of two affine diagrams is not a supported comparison; it is
    /// signaled as an error to the caller.
    pub fn eq_aadd(&self, _a: &Aadd, _b: &Aadd) -> Result<Bdd> {
        Err(Error::AaddEquality)
    }
}

impl Node<AffineForm> {
    /// The tightest bounds known for a leaf: the memoized LP refinement if
    /// present, otherwise the affine form's own interval.
    pub(crate) fn solved_range(&self) -> Range {
        let refined = self.solve().refined;
        refined.unwrap_or_else(|| self.value().interval())
    }

    /// The leaf value with the refined bounds baked into its interval.
    pub(crate) fn solved_value(&self) -> AffineForm {
        let v = self.value();
        match self.solve().refined {
            Some(range) => AffineForm::new(range, v.x0, v.r, v.xi.clone()),
            None => v.clone(),
        }
    }

    /// Number of leaves holding a usable value (neither empty nor the
    /// reals-or-NaN trap).
    pub fn num_feasible_leaves(&self) -> usize {
        if self.is_leaf() {
            usize::from(!self.value().is_trap())
        } else {
            self.t().num_feasible_leaves() + self.f().num_feasible_leaves()
        }
    }

    /// True if some leaf's current bounds contain `x`.
    pub fn contains(&self, x: f64) -> bool {
        if self.is_leaf() {
            self.solved_range().contains(x)
        } else {
            self.t().contains(x) || self.f().contains(x)
        }
    }

    /// True if some leaf's current bounds overlap `[lo, hi]`.
    pub fn contains_range(&self, lo: f64, hi: f64) -> bool {
        if self.is_leaf() {
            let range = self.solved_range();
            !(lo > range.max || hi < range.min)
        } else {
            self.t().contains_range(lo, hi) || self.f().contains_range(lo, hi)
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_scalar_add() {
        let ctx = Context::new();
        let a = ctx.scalar(10.0);
        let b = ctx.scalar(1.0);
        let r = ctx.add(&a, &b);
        assert!(r.is_leaf());
        assert_eq!(r.value().x0, 11.0);
        assert_eq!(r.value().radius(), 0.0);
        assert_eq!(r.value().min(), 11.0);
        assert_eq!(r.value().max(), 11.0);
    }

    #[test]
    fn test_scalar_mul() {
        let ctx = Context::new();
        let r = ctx.mul(&ctx.scalar(10.0), &ctx.scalar(3.0));
        assert_eq!(r.value().x0, 30.0);
    }

    #[test]
    fn test_range_factory_validates() {
        let ctx = Context::new();
        assert!(ctx.range(1.0, 3.0).is_ok());
        assert!(matches!(
            ctx.range(3.0, 1.0),
            Err(Error::InvalidRange { .. })
        ));
        assert!(matches!(
            ctx.range(1.0, 1.0),
            Err(Error::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_correlated_symbols() {
        let ctx = Context::new();
        let a = ctx.range_named(1.0, 2.0, "u").unwrap();
        let b = ctx.range_named(1.0, 2.0, "u").unwrap();
        // Same source: the difference collapses to (almost) zero deviation.
        let d = ctx.sub(&a, &b);
        assert!(d.value().radius() < 1e-6);

        let c = ctx.range_named(1.0, 2.0, "v").unwrap();
        let d2 = ctx.sub(&a, &c);
        assert!((d2.value().radius() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_negate_tree_cancels() {
        let ctx = Context::new();
        let a = ctx.scalar(10.0);
        let r = ctx.neg(&a);
        assert_eq!(r.value().x0, -10.0);

        let cond = ctx
            .conditions
            .new_constraint(AffineForm::range(1.0, 2.0, 3), "");
        let t = ctx.internal(cond, a, r);
        let tn = ctx.neg(&t);
        let s = ctx.add(&tn, &t);
        // value + negated value reduces to the single scalar leaf 0.
        assert!(s.is_leaf());
        assert_eq!(s.value().x0, 0.0);
    }

    #[test]
    fn test_exp_diagram() {
        let ctx = Context::new();
        let exp1 = ctx.exp(&ctx.scalar(3.5));
        assert!((exp1.value().x0 - 3.5f64.exp()).abs() < 1e-6);

        let c = ctx.range_with_symbol(1.0, 2.0, ctx.noise.fresh()).unwrap();
        let exp3 = ctx.exp(&c);
        assert!((exp3.value().x0 - 5.06).abs() < 0.01);
        assert!((exp3.value().r - 0.98).abs() < 0.01);
        assert!((exp3.value().min() - 2.72).abs() < 0.01);
        assert!((exp3.value().max() - 7.39).abs() < 0.01);
    }

    #[test]
    fn test_div_by_zero_traps() {
        let ctx = Context::new();
        let a = ctx.range(1.0, 2.0).unwrap();
        let r = ctx.div(&a, &ctx.scalar(0.0));
        assert!(r.value().is_reals_nan());
    }

    #[test]
    fn test_ite_constant_condition() {
        let ctx = Context::new();
        let t = ctx.scalar(1.0);
        let e = ctx.scalar(2.0);
        let r = ctx.ite(&ctx.tru(), &t, &e);
        assert_eq!(r.value().x0, 1.0);
        let r = ctx.ite(&ctx.fls(), &t, &e);
        assert_eq!(r.value().x0, 2.0);
        assert!(ctx.ite(&ctx.bool_infeasible(), &t, &e).is_infeasible());
    }

    #[test]
    fn test_ite_builds_decision_tree() {
        let ctx = Context::new();
        let a = ctx.range(0.0, 1.0).unwrap();
        let b = ctx.range(3.0, 4.0).unwrap();
        let c = ctx.variable("c");
        let r = ctx.ite(&c, &a, &b);
        assert!(r.is_internal());
        assert_eq!(r.index(), c.index());
        assert_eq!(r.num_leaves(), 2);
        assert!((r.t().value().x0 - 0.5).abs() < 1e-9);
        assert!((r.f().value().x0 - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_decided_comparisons_need_no_constraint() {
        let ctx = Context::new();
        let a = ctx.range(1.0, 2.0).unwrap();
        let before = ctx.conditions.len();

        // [1,2] - 3 is entirely negative: decided without a constraint.
        let lt = ctx.lt(&a, &ctx.scalar(3.0)).unwrap();
        assert_eq!(lt, ctx.tru());
        let gt = ctx.gt(&a, &ctx.scalar(3.0)).unwrap();
        assert_eq!(gt, ctx.fls());
        let ge = ctx.ge(&a, &ctx.scalar(0.5)).unwrap();
        assert_eq!(ge, ctx.tru());
        let le = ctx.le(&a, &ctx.scalar(0.5)).unwrap();
        assert_eq!(le, ctx.fls());
        assert_eq!(ctx.conditions.len(), before);
    }

    #[test]
    fn test_undecided_comparison_allocates_constraint() {
        let ctx = Context::new();
        let a = ctx.range(1.0, 2.0).unwrap();
        let before = ctx.conditions.len();
        let c = ctx.gt(&a, &ctx.scalar(1.5)).unwrap();
        assert!(c.is_internal());
        assert_eq!(ctx.conditions.len(), before + 1);
        assert!(*c.t().value());
        assert!(!*c.f().value());

        // The mirrored comparison orders its children the other way.
        let d = ctx.lt(&a, &ctx.scalar(1.5)).unwrap();
        assert!(!*d.t().value());
        assert!(*d.f().value());
    }

    #[test]
    fn test_eq_is_unsupported() {
        let ctx = Context::new();
        let a = ctx.range(1.0, 2.0).unwrap();
        let b = ctx.range(1.0, 2.0).unwrap();
        assert!(matches!(ctx.eq_aadd(&a, &b), Err(Error::AaddEquality)));
    }

    #[test]
    fn test_contains() {
        let ctx = Context::new();
        let a = ctx.range(1.0, 2.0).unwrap();
        let b = ctx.range(5.0, 6.0).unwrap();
        let c = ctx.variable("c");
        let d = ctx.ite(&c, &a, &b);
        assert!(d.contains(1.5));
        assert!(d.contains(5.5));
        assert!(!d.contains(3.0));
        assert!(d.contains_range(1.8, 2.5));
        assert!(!d.contains_range(2.5, 4.5));
    }

    #[test]
    fn test_feasible_leaf_count() {
        let ctx = Context::new();
        let a = ctx.range(1.0, 2.0).unwrap();
        let c = ctx.variable("c");
        let d = ctx.ite(&c, &a, &ctx.empty());
        assert_eq!(d.num_feasible_leaves(), 1);
        assert_eq!(d.num_leaves(), 2);
    }
}
