use std::sync::Arc;

use log::debug;

use crate::affine::AffineForm;
use crate::conditions::Conditions;
use crate::node::{Node, Status};
use crate::noise::NoiseSymbols;

/// A Boolean decision diagram: a reduced ordered diagram with `bool` leaves.
pub type Bdd = Arc<Node<bool>>;

/// An affine-arithmetic decision diagram: a reduced ordered diagram with
/// [`AffineForm`] leaves.
pub type Aadd = Arc<Node<AffineForm>>;

/// The leaf algebra a diagram kind plugs into the generic core: a merge
/// tolerance check used by reduction, the join of two mergeable values, and
/// the (deduplicating) leaf factory.
pub trait LeafAlgebra: Sized + Clone + Send + Sync {
    fn is_similar(&self, other: &Self, tol: f64) -> bool;
    fn join_values(&self, other: &Self) -> Self;
    fn leaf(ctx: &Context, value: Self) -> Arc<Node<Self>>;
}

impl LeafAlgebra for bool {
    fn is_similar(&self, other: &Self, _tol: f64) -> bool {
        self == other
    }
    fn join_values(&self, _other: &Self) -> Self {
        *self
    }
    fn leaf(ctx: &Context, value: Self) -> Arc<Node<Self>> {
        ctx.bool_const(value)
    }
}

impl LeafAlgebra for AffineForm {
    fn is_similar(&self, other: &Self, tol: f64) -> bool {
        AffineForm::is_similar(self, other, tol)
    }
    fn join_values(&self, other: &Self) -> Self {
        AffineForm::join(self, other)
    }
    fn leaf(ctx: &Context, value: Self) -> Arc<Node<Self>> {
        ctx.affine_leaf(value)
    }
}

/// The manager every diagram operation goes through.
///
/// It owns the condition and noise-symbol registries shared by all diagrams
/// built with it, the numeric parameters of reduction and refinement, and
/// the deduplicated constant leaves. Registries are append-only during
/// normal operation and mutex-guarded, so a `Context` can be shared across
/// threads; range refinement relies on that.
pub struct Context {
    pub conditions: Conditions,
    pub noise: NoiseSymbols,
    /// Leaves whose radius is below this are not worth an LP call.
    lp_call_threshold: f64,
    /// Similarity tolerance for merging affine leaves during reduction.
    join_threshold: f64,
    tru: Bdd,
    fls: Bdd,
    bool_infeasible: Bdd,
    aadd_reals: Aadd,
    aadd_empty: Aadd,
    aadd_reals_nan: Aadd,
    aadd_infeasible: Aadd,
}

impl Context {
    pub fn new() -> Self {
        Context {
            conditions: Conditions::new(),
            noise: NoiseSymbols::new(),
            lp_call_threshold: 1e-3,
            join_threshold: 1e-3,
            tru: Node::leaf(true, Status::NotSolved),
            fls: Node::leaf(false, Status::NotSolved),
            bool_infeasible: Node::leaf(true, Status::Infeasible),
            aadd_reals: Node::leaf(AffineForm::reals(), Status::NotSolved),
            aadd_empty: Node::leaf(AffineForm::empty(), Status::NotSolved),
            aadd_reals_nan: Node::leaf(AffineForm::reals_nan(), Status::NotSolved),
            aadd_infeasible: Node::leaf(AffineForm::empty(), Status::Infeasible),
        }
    }

    pub fn lp_call_threshold(&self) -> f64 {
        self.lp_call_threshold
    }

    pub fn join_threshold(&self) -> f64 {
        self.join_threshold
    }

    /// The `True` leaf.
    pub fn tru(&self) -> Bdd {
        Arc::clone(&self.tru)
    }

    /// The `False` leaf.
    pub fn fls(&self) -> Bdd {
        Arc::clone(&self.fls)
    }

    /// The Boolean leaf whose path condition is infeasible.
    pub fn bool_infeasible(&self) -> Bdd {
        Arc::clone(&self.bool_infeasible)
    }

    /// An arbitrary real number without any constraints.
    pub fn reals(&self) -> Aadd {
        Arc::clone(&self.aadd_reals)
    }

    /// The empty range; also a non-existing number such as NaN.
    pub fn empty(&self) -> Aadd {
        Arc::clone(&self.aadd_empty)
    }

    /// The trap state: any real, or NaN.
    pub fn reals_nan(&self) -> Aadd {
        Arc::clone(&self.aadd_reals_nan)
    }

    /// The affine leaf whose path condition is infeasible.
    pub fn infeasible(&self) -> Aadd {
        Arc::clone(&self.aadd_infeasible)
    }

    /// The Boolean leaf for `value`. Deduplicated, so pointer identity works
    /// on the results.
    pub fn bool_const(&self, value: bool) -> Bdd {
        if value {
            self.tru()
        } else {
            self.fls()
        }
    }

    /// A fresh affine leaf. Empty values deduplicate to the `Empty` leaf.
    pub(crate) fn affine_leaf(&self, value: AffineForm) -> Aadd {
        if value.is_empty() {
            self.empty()
        } else {
            Node::leaf(value, Status::NotSolved)
        }
    }

    /// Creates an internal node with the given, existing index. This is the
    /// single path by which non-leaf nodes come to be; reduction is applied
    /// first:
    ///
    /// 1. identical children, or an infeasible child, collapse to the
    ///    surviving child;
    /// 2. two similar leaves merge into one holding the join of the values;
    /// 3. otherwise a genuine node is allocated.
    pub(crate) fn internal<V: LeafAlgebra>(
        &self,
        index: i32,
        t: Arc<Node<V>>,
        f: Arc<Node<V>>,
    ) -> Arc<Node<V>> {
        if Arc::ptr_eq(&t, &f) || t.is_infeasible() {
            debug!("reduce({}): collapse to F", index);
            return f;
        }
        if f.is_infeasible() {
            debug!("reduce({}): collapse to T", index);
            return t;
        }
        if t.is_leaf() && f.is_leaf() && t.value().is_similar(f.value(), self.join_threshold) {
            debug!("reduce({}): merge similar leaves", index);
            return V::leaf(self, t.value().join_values(f.value()));
        }
        assert!(
            self.conditions.contains(index),
            "internal node with unallocated condition index {}",
            index
        );
        Node::internal(index, t, f)
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_constants_are_deduplicated() {
        let ctx = Context::new();
        assert!(Arc::ptr_eq(&ctx.tru(), &ctx.bool_const(true)));
        assert!(Arc::ptr_eq(&ctx.fls(), &ctx.bool_const(false)));
        assert!(ctx.bool_infeasible().is_infeasible());
        assert!(ctx.infeasible().is_infeasible());
        assert!(ctx.empty().value().is_empty());
        assert!(ctx.reals().value().is_reals());
    }

    #[test]
    fn test_reduction_identical_children() {
        let ctx = Context::new();
        let idx = ctx.conditions.new_variable("x");
        let t = ctx.tru();
        // Same node on both branches never allocates.
        let reduced = ctx.internal(idx, Arc::clone(&t), Arc::clone(&t));
        assert!(Arc::ptr_eq(&reduced, &t));
    }

    #[test]
    fn test_reduction_infeasible_child() {
        let ctx = Context::new();
        let idx2 = ctx.conditions.new_variable("y");
        let idx = ctx.conditions.new_variable("x");
        let x = ctx.internal(idx, ctx.tru(), ctx.fls());

        // An infeasible branch contributes nothing to the feasible result.
        let collapsed = ctx.internal(idx2, Arc::clone(&x), ctx.bool_infeasible());
        assert!(Arc::ptr_eq(&collapsed, &x));
        let collapsed = ctx.internal(idx2, ctx.bool_infeasible(), Arc::clone(&x));
        assert!(Arc::ptr_eq(&collapsed, &x));
    }

    #[test]
    fn test_reduction_merges_equal_bool_leaves() {
        let ctx = Context::new();
        let idx = ctx.conditions.new_variable("x");
        let merged = ctx.internal(idx, ctx.tru(), ctx.tru());
        assert!(merged.is_leaf());
        assert!(*merged.value());
    }

    #[test]
    #[should_panic(expected = "unallocated condition index")]
    fn test_unallocated_index_is_fatal() {
        let ctx = Context::new();
        ctx.internal(3, ctx.tru(), ctx.fls());
    }

    #[test]
    fn test_merges_similar_affine_leaves() {
        let ctx = Context::new();
        let idx = ctx.conditions.new_variable("x");
        let a = ctx.affine_leaf(AffineForm::range(1.0, 2.0, 1));
        let b = ctx.affine_leaf(AffineForm::range(1.0, 2.0, 1));
        let merged = ctx.internal(idx, a, b);
        assert!(merged.is_leaf());

        let c = ctx.affine_leaf(AffineForm::range(1.0, 2.0, 1));
        let d = ctx.affine_leaf(AffineForm::range(4.0, 5.0, 1));
        let node = ctx.internal(idx, c, d);
        assert!(node.is_internal());
    }
}
