use std::collections::BTreeSet;

use log::debug;

use crate::affine::AffineForm;
use crate::context::{Aadd, Context};
use crate::error::{Error, Result};
use crate::lp;
use crate::node::{Node, Status};
use crate::range::Range;

impl Context {
    /// Computes the tightest known `[min, max]` of an affine diagram.
    ///
    /// Along every root-to-leaf path the linear constraints of the internal
    /// nodes are collected; each unsolved leaf whose deviation exceeds the
    /// LP-call threshold is tightened by solving two linear programs over
    /// the noise symbols (maximize and minimize the leaf's affine form
    /// subject to the path constraints and the `[-1, 1]` box). Results are
    /// memoized in the leaf's solve state: contradictory paths settle as
    /// infeasible and contribute nothing, everything else is joined upward.
    pub fn range_of(&self, a: &Aadd) -> Result<Range> {
        self.bounds(a, Vec::new())
    }

    fn bounds(&self, node: &Aadd, path: Vec<(i32, bool)>) -> Result<Range> {
        if node.is_leaf() {
            if node.is_infeasible() || node.value().is_empty() {
                return Ok(Range::EMPTY);
            }
            if node.value().is_finite()
                && !path.is_empty()
                && node.value().radius() > self.lp_call_threshold()
                && node.status() == Status::NotSolved
            {
                self.call_lp(node, &path)?;
            }
            if node.is_infeasible() {
                return Ok(Range::EMPTY);
            }
            return Ok(node.solved_range());
        }

        if !self.conditions.is_bool_var(node.index()) {
            // A linear-constraint node narrows the feasible region: record
            // the branch and explore both children in parallel. The results
            // are combined commutatively, so the fork order is free.
            let mut path_t = path.clone();
            path_t.push((node.index(), true));
            let mut path_f = path;
            path_f.push((node.index(), false));
            let (rt, rf) = rayon::join(
                || self.bounds(node.t(), path_t),
                || self.bounds(node.f(), path_f),
            );
            return Ok(rt?.join(&rf?));
        }

        // A free Boolean variable does not narrow the numeric region; no LP
        // work is dispatched below it, so traverse sequentially.
        let rt = self.bounds(node.t(), path.clone())?;
        let rf = self.bounds(node.f(), path)?;
        Ok(rt.join(&rf))
    }

    /// Solves the two LPs for one leaf and settles its solve state.
    fn call_lp(&self, leaf: &Node<AffineForm>, path: &[(i32, bool)]) -> Result<()> {
        assert!(!path.is_empty(), "LP call without path constraints");
        let value = leaf.value();

        // Dense variable set: union of the noise symbols in the leaf and in
        // every path condition.
        let mut symbols: BTreeSet<u32> = value.xi.keys().copied().collect();
        let mut conditions = Vec::with_capacity(path.len());
        for (index, branch) in path {
            let c = self
                .conditions
                .constraint(*index)
                .expect("path condition must be a linear constraint");
            symbols.extend(c.xi.keys().copied());
            conditions.push((c, *branch));
        }
        let symbols: Vec<u32> = symbols.into_iter().collect();

        let mut problem = lp::Problem::new(symbols.len());
        for (c, branch) in &conditions {
            let coeffs: Vec<f64> = symbols
                .iter()
                .map(|s| c.xi.get(s).copied().unwrap_or(0.0))
                .collect();
            if *branch {
                problem.constrain(coeffs, lp::Relation::Ge, -c.x0 - c.r);
            } else {
                problem.constrain(coeffs, lp::Relation::Le, -c.x0 + c.r);
            }
        }
        let objective: Vec<f64> = symbols
            .iter()
            .map(|s| value.xi.get(s).copied().unwrap_or(0.0))
            .collect();

        debug!(
            "LP: {} variables, {} path constraints",
            symbols.len(),
            conditions.len()
        );
        let sol_max = problem.solve(&objective, lp::Goal::Maximize);
        let sol_min = problem.solve(&objective, lp::Goal::Minimize);
        match (sol_max, sol_min) {
            (lp::Outcome::Infeasible, _) | (_, lp::Outcome::Infeasible) => {
                debug!("LP infeasible: leaf settles infeasible");
                leaf.solve().status = Status::Infeasible;
                Ok(())
            }
            (lp::Outcome::Unbounded, _) | (_, lp::Outcome::Unbounded) => {
                Err(Error::UnboundedLp {
                    model: format!("{}objective: {:?}", problem, objective),
                })
            }
            (lp::Outcome::Optimal(vmax), lp::Outcome::Optimal(vmin)) => {
                let max = vmax + value.x0 + value.r;
                let min = vmin + value.x0 - value.r;
                let mut solve = leaf.solve();
                let prior = solve.refined.unwrap_or_else(|| value.interval());
                solve.refined = Some(Range::new(prior.min.max(min), prior.max.min(max)));
                solve.status = Status::Feasible;
                debug!("LP bounds: [{}, {}]", min, max);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_leaf_range_needs_no_lp() {
        let ctx = Context::new();
        let a = ctx.range(1.0, 3.0).unwrap();
        let range = ctx.range_of(&a).unwrap();
        assert!((range.min - 1.0).abs() < 1e-9);
        assert!((range.max - 3.0).abs() < 1e-9);
        assert_eq!(a.status(), Status::NotSolved);
    }

    #[test]
    fn test_empty_and_infeasible_leaves() {
        let ctx = Context::new();
        assert!(ctx.range_of(&ctx.empty()).unwrap().is_empty());
        assert!(ctx.range_of(&ctx.infeasible()).unwrap().is_empty());
    }

    #[test]
    fn test_intersect_narrower_interval() {
        let ctx = Context::new();
        let a = ctx.range(1.0, 3.0).unwrap();
        let b = ctx.intersect(&a, 1.2, 2.2).unwrap();
        let range = ctx.range_of(&b).unwrap();
        assert!((range.min - 1.2).abs() < 1e-3);
        assert!((range.max - 2.2).abs() < 1e-3);
    }

    #[test]
    fn test_intersect_wider_interval_is_noop() {
        let ctx = Context::new();
        let a = ctx.range(1.0, 3.0).unwrap();
        let b = ctx.intersect(&a, 0.5, 4.0).unwrap();
        let range = ctx.range_of(&b).unwrap();
        assert!((range.min - 1.0).abs() < 1e-3);
        assert!((range.max - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_intersect_overlapping_interval() {
        let ctx = Context::new();
        let a = ctx.range(1.5, 3.0).unwrap();
        let b = ctx.intersect(&a, 0.9, 2.2).unwrap();
        let range = ctx.range_of(&b).unwrap();
        assert!((range.min - 1.5).abs() < 1e-3);
        assert!((range.max - 2.2).abs() < 1e-3);
    }

    #[test]
    fn test_intersect_aadd() {
        let ctx = Context::new();
        let a = ctx.range(2.2, 3.0).unwrap();
        let b = ctx.range(1.2, 2.5).unwrap();
        let c = ctx.intersect_aadd(&a, &b).unwrap();
        let range = ctx.range_of(&c).unwrap();
        assert!((range.min - 2.2).abs() < 1e-3);
        assert!((range.max - 2.5).abs() < 1e-3);
    }

    #[test]
    fn test_infeasible_path_detection() {
        let ctx = Context::new();
        let symbol = ctx.noise.named("n");
        let a = ctx.range_with_symbol(0.0, 1.0, symbol).unwrap();
        let b = ctx.range_with_symbol(3.0, 4.0, symbol).unwrap();
        let c1 = ctx.gt(&a, &ctx.scalar(0.5)).unwrap();
        let c2 = ctx.lt(&a, &ctx.scalar(0.3)).unwrap();
        let d = ctx.ite(&c1, &a, &b);
        let e = ctx.ite(&c2, &a, &b);
        let f = ctx.add(&d, &e);
        ctx.range_of(&f).unwrap();
        assert_eq!(f.num_infeasible(), 1);
    }

    #[test]
    fn test_ite_range_joins_branches() {
        let ctx = Context::new();
        let a = ctx.range(0.0, 1.0).unwrap();
        let b = ctx.range(3.0, 4.0).unwrap();
        let cond = ctx.variable("choice");
        let d = ctx.ite(&cond, &a, &b);
        let range = ctx.range_of(&d).unwrap();
        assert!((range.min - 0.0).abs() < 1e-9);
        assert!((range.max - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_memoized_second_query() {
        let ctx = Context::new();
        let a = ctx.range(1.0, 3.0).unwrap();
        let b = ctx.intersect(&a, 1.2, 2.2).unwrap();
        let first = ctx.range_of(&b).unwrap();
        // Second query reuses the settled leaves.
        let second = ctx.range_of(&b).unwrap();
        assert_eq!(first.min, second.min);
        assert_eq!(first.max, second.max);
    }

    #[test]
    fn test_relational_after_refinement() {
        let ctx = Context::new();
        let a = ctx.range(1.0, 3.0).unwrap();
        let b = ctx.intersect(&a, 1.2, 2.2).unwrap();
        // After refinement the bounds are tight enough to decide.
        let decided = ctx.lt(&b, &ctx.scalar(2.5)).unwrap();
        assert_eq!(decided.num_false(), 0);
    }
}
