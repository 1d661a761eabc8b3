use log::debug;

use crate::context::{Bdd, Context};
use crate::node::Node;

impl Context {
    /// A Boolean decision variable: a fresh condition index with `True` and
    /// `False` children.
    pub fn variable(&self, name: &str) -> Bdd {
        debug!("variable({:?})", name);
        self.internal(self.conditions.new_variable(name), self.tru(), self.fls())
    }

    /// Applies a unary operator to every leaf. Infeasible leaves stay
    /// infeasible.
    fn apply_bool_unary(&self, op: fn(bool) -> bool, f: &Bdd) -> Bdd {
        if f.is_leaf() {
            if f.is_infeasible() {
                return self.bool_infeasible();
            }
            return self.bool_const(op(*f.value()));
        }
        let tr = self.apply_bool_unary(op, f.t());
        let fr = self.apply_bool_unary(op, f.f());
        self.internal(f.index(), tr, fr)
    }

    /// Applies a binary operator, interleaving both diagrams by index
    /// order: recursion descends into the diagram(s) whose root index is
    /// smaller, holding the other constant.
    fn apply_bool(&self, op: fn(bool, bool) -> bool, f: &Bdd, g: &Bdd) -> Bdd {
        if f.is_infeasible() || g.is_infeasible() {
            return self.bool_infeasible();
        }
        if f.is_leaf() && g.is_leaf() {
            return self.bool_const(op(*f.value(), *g.value()));
        }

        let index = f.index().min(g.index());
        let (ft, ff) = if f.index() <= g.index() {
            (f.t(), f.f())
        } else {
            (f, f)
        };
        let (gt, gf) = if g.index() <= f.index() {
            (g.t(), g.f())
        } else {
            (g, g)
        };
        let tr = self.apply_bool(op, ft, gt);
        let fr = self.apply_bool(op, ff, gf);
        self.internal(index, tr, fr)
    }

    pub fn not(&self, f: &Bdd) -> Bdd {
        debug!("not(...)");
        self.apply_bool_unary(|a| !a, f)
    }

    pub fn and(&self, f: &Bdd, g: &Bdd) -> Bdd {
        debug!("and(...)");
        self.apply_bool(|a, b| a && b, f, g)
    }

    pub fn or(&self, f: &Bdd, g: &Bdd) -> Bdd {
        debug!("or(...)");
        self.apply_bool(|a, b| a || b, f, g)
    }

    pub fn xor(&self, f: &Bdd, g: &Bdd) -> Bdd {
        debug!("xor(...)");
        self.apply_bool(|a, b| a != b, f, g)
    }

    pub fn nand(&self, f: &Bdd, g: &Bdd) -> Bdd {
        debug!("nand(...)");
        self.apply_bool(|a, b| !(a && b), f, g)
    }

    pub fn nor(&self, f: &Bdd, g: &Bdd) -> Bdd {
        debug!("nor(...)");
        self.apply_bool(|a, b| !(a || b), f, g)
    }

    pub fn xnor(&self, f: &Bdd, g: &Bdd) -> Bdd {
        debug!("xnor(...)");
        self.apply_bool(|a, b| a == b, f, g)
    }

    /// If-then-else composition of two Boolean diagrams under a Boolean
    /// condition: `(c AND t) OR (NOT c AND e)`.
    pub fn bool_ite(&self, c: &Bdd, t: &Bdd, e: &Bdd) -> Bdd {
        debug!("bool_ite(...)");
        if c.is_infeasible() {
            return self.bool_infeasible();
        }
        if c.is_leaf() {
            return if *c.value() {
                std::sync::Arc::clone(t)
            } else {
                std::sync::Arc::clone(e)
            };
        }
        self.or(&self.and(c, t), &self.and(&self.not(c), e))
    }
}

impl Node<bool> {
    /// Number of feasible leaves holding `true`; the satisfying count.
    pub fn num_true(&self) -> usize {
        if self.is_leaf() {
            usize::from(self.is_feasible() && *self.value())
        } else {
            self.t().num_true() + self.f().num_true()
        }
    }

    /// Number of feasible leaves holding `false`.
    pub fn num_false(&self) -> usize {
        if self.is_leaf() {
            usize::from(self.is_feasible() && !*self.value())
        } else {
            self.t().num_false() + self.f().num_false()
        }
    }
}
