use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::range::Range;

/// Index value marking a leaf. Leaves compare greater than every internal
/// node, which keeps the ordering invariant uniform.
pub const LEAF: i32 = i32::MAX;

/// Solver status of a node's path condition. A freshly built node is not
/// solved; the range-refinement pass settles it to feasible or infeasible.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Status {
    NotSolved,
    Feasible,
    Infeasible,
}

/// Mutable per-leaf solver state: the settled status plus the memoized
/// LP-refined interval, if any. Everything else in a node is immutable.
#[derive(Debug, Clone)]
pub(crate) struct Solve {
    pub status: Status,
    pub refined: Option<Range>,
}

/// A node of an ordered decision diagram with leaf values of type `V`.
///
/// Internal nodes hold an index into the condition registry and two shared
/// children; leaves hold a value. The diagram is a DAG purely by
/// construction discipline: children are immutable `Arc`-shared
/// substructures created strictly before their parents, so cycles cannot
/// occur.
#[derive(Debug)]
pub struct Node<V> {
    index: i32,
    t: Option<Arc<Node<V>>>,
    f: Option<Arc<Node<V>>>,
    value: Option<V>,
    solve: Mutex<Solve>,
}

impl<V> Node<V> {
    /// Creates a leaf with the given value and status.
    pub(crate) fn leaf(value: V, status: Status) -> Arc<Self> {
        Arc::new(Node {
            index: LEAF,
            t: None,
            f: None,
            value: Some(value),
            solve: Mutex::new(Solve {
                status,
                refined: None,
            }),
        })
    }

    /// Creates an internal node. This is the raw allocator used by the
    /// canonicalizing constructor; it only checks the ordering invariant.
    /// The index must refer to an existing condition, which the caller
    /// checks against its registry.
    pub(crate) fn internal(index: i32, t: Arc<Self>, f: Arc<Self>) -> Arc<Self> {
        assert!(
            index < t.index,
            "diagram insane: index {} but T {}",
            index,
            t.index
        );
        assert!(
            index < f.index,
            "diagram insane: index {} but F {}",
            index,
            f.index
        );
        Arc::new(Node {
            index,
            t: Some(t),
            f: Some(f),
            value: None,
            solve: Mutex::new(Solve {
                status: Status::NotSolved,
                refined: None,
            }),
        })
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn is_leaf(&self) -> bool {
        self.index == LEAF
    }

    pub fn is_internal(&self) -> bool {
        self.index != LEAF
    }

    /// The true child. Panics on leaves.
    pub fn t(&self) -> &Arc<Self> {
        self.t.as_ref().expect("leaf has no T child")
    }

    /// The false child. Panics on leaves.
    pub fn f(&self) -> &Arc<Self> {
        self.f.as_ref().expect("leaf has no F child")
    }

    /// The leaf value. Panics on internal nodes.
    pub fn value(&self) -> &V {
        self.value.as_ref().expect("internal node has no value")
    }

    pub fn status(&self) -> Status {
        self.solve.lock().unwrap().status
    }

    pub fn is_feasible(&self) -> bool {
        self.status() != Status::Infeasible
    }

    pub fn is_infeasible(&self) -> bool {
        self.status() == Status::Infeasible
    }

    pub(crate) fn solve(&self) -> std::sync::MutexGuard<'_, Solve> {
        self.solve.lock().unwrap()
    }

    /// Number of leaves of the (logical) tree.
    pub fn num_leaves(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.t().num_leaves() + self.f().num_leaves()
        }
    }

    /// Number of leaves settled as infeasible.
    pub fn num_infeasible(&self) -> usize {
        if self.is_leaf() {
            usize::from(self.is_infeasible())
        } else {
            self.t().num_infeasible() + self.f().num_infeasible()
        }
    }

    /// Height of the diagram; leaves have height 0.
    pub fn height(&self) -> usize {
        if self.is_leaf() {
            0
        } else {
            1 + self.t().height().max(self.f().height())
        }
    }
}

impl<V: PartialEq> PartialEq for Node<V> {
    /// Structural equality: internal nodes compare by index and children,
    /// leaves by value and feasibility.
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.index != other.index {
            return false;
        }
        if self.is_leaf() {
            return self.value() == other.value() && self.is_infeasible() == other.is_infeasible();
        }
        self.t() == other.t() && self.f() == other.f()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_leaf() {
        let leaf = Node::leaf(true, Status::NotSolved);
        assert!(leaf.is_leaf());
        assert!(!leaf.is_internal());
        assert_eq!(leaf.index(), LEAF);
        assert_eq!(*leaf.value(), true);
        assert!(leaf.is_feasible());
        assert_eq!(leaf.num_leaves(), 1);
        assert_eq!(leaf.num_infeasible(), 0);
        assert_eq!(leaf.height(), 0);
    }

    #[test]
    fn test_internal_counting() {
        let t = Node::leaf(true, Status::NotSolved);
        let f = Node::leaf(false, Status::Infeasible);
        let node = Node::internal(1, t, f);
        assert!(node.is_internal());
        assert_eq!(node.num_leaves(), 2);
        assert_eq!(node.num_infeasible(), 1);
        assert_eq!(node.height(), 1);
    }

    #[test]
    #[should_panic(expected = "diagram insane")]
    fn test_ordering_violation() {
        let t = Node::leaf(true, Status::NotSolved);
        let f = Node::leaf(false, Status::NotSolved);
        let inner = Node::internal(5, t, f);
        let other = Node::leaf(true, Status::NotSolved);
        // Parent index must be strictly smaller than both child indices.
        Node::internal(5, inner, other);
    }

    #[test]
    fn test_structural_equality() {
        let a = Node::internal(
            1,
            Node::leaf(true, Status::NotSolved),
            Node::leaf(false, Status::NotSolved),
        );
        let b = Node::internal(
            1,
            Node::leaf(true, Status::NotSolved),
            Node::leaf(false, Status::NotSolved),
        );
        let c = Node::internal(
            2,
            Node::leaf(true, Status::NotSolved),
            Node::leaf(false, Status::NotSolved),
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
