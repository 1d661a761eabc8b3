use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::affine::AffineForm;

/// What an index in the registry stands for: a linear constraint of the form
/// `AffineForm >= 0` over the noise symbols, or a free Boolean decision
/// variable that does not restrict the numeric feasible region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionKind {
    Constraint(AffineForm),
    BoolVar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub kind: ConditionKind,
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ConditionKind::Constraint(c) => write!(f, "constraint {} {} >= 0", self.name, c),
            ConditionKind::BoolVar => write!(f, "bool {}", self.name),
        }
    }
}

/// The registry of decision conditions shared by all diagrams of a context.
///
/// Indices are allocated from two independent counters: `top` grows upward
/// from 1 (used by most constructors, so a fresh condition always compares
/// greater than every node of an existing diagram), `bottom` grows downward
/// from 0 (used when a node must carry an index numerically below all
/// existing ones, i.e. sit above the current root). Entries are append-only;
/// `reset` is the only way to start over.
#[derive(Debug, Default)]
pub struct Conditions {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    table: BTreeMap<i32, Condition>,
    top: i32,
    bottom: i32,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a linear constraint `c >= 0`. Returns its index from the top
    /// counter.
    pub fn new_constraint(&self, c: AffineForm, name: &str) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        inner.top += 1;
        let index = inner.top;
        debug!("condition {} := constraint {} ({})", index, c, name);
        inner.table.insert(
            index,
            Condition {
                name: name.to_string(),
                kind: ConditionKind::Constraint(c),
            },
        );
        index
    }

    /// Adds a linear constraint below all existing indices, from the bottom
    /// counter.
    pub fn new_bottom_constraint(&self, c: AffineForm, name: &str) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        inner.bottom -= 1;
        let index = inner.bottom;
        debug!("condition {} := bottom constraint {} ({})", index, c, name);
        inner.table.insert(
            index,
            Condition {
                name: name.to_string(),
                kind: ConditionKind::Constraint(c),
            },
        );
        index
    }

    /// Adds a free Boolean decision variable. Returns its index from the
    /// top counter.
    pub fn new_variable(&self, name: &str) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        inner.top += 1;
        let index = inner.top;
        debug!("condition {} := bool variable ({})", index, name);
        inner.table.insert(
            index,
            Condition {
                name: name.to_string(),
                kind: ConditionKind::BoolVar,
            },
        );
        index
    }

    /// The linear constraint behind `index`, or `None` for a Boolean
    /// variable. An index outside the allocated window is a structurally
    /// corrupt diagram and fails the assertion.
    pub fn constraint(&self, index: i32) -> Option<AffineForm> {
        let inner = self.inner.lock().unwrap();
        assert!(
            inner.bottom <= index && index <= inner.top,
            "condition index out of range: {}",
            index
        );
        let entry = inner.table.get(&index).expect("condition not defined");
        match &entry.kind {
            ConditionKind::Constraint(c) => Some(c.clone()),
            ConditionKind::BoolVar => None,
        }
    }

    /// True if `index` names a free Boolean variable.
    pub fn is_bool_var(&self, index: i32) -> bool {
        self.constraint(index).is_none()
    }

    /// True if `index` has been allocated.
    pub fn contains(&self, index: i32) -> bool {
        self.inner.lock().unwrap().table.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn top(&self) -> i32 {
        self.inner.lock().unwrap().top
    }

    pub fn bottom(&self) -> i32 {
        self.inner.lock().unwrap().bottom
    }

    /// Explicit re-initialization; drops all entries and both counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.table.clear();
        inner.top = 0;
        inner.bottom = 0;
    }

    pub(crate) fn export(&self) -> BTreeMap<i32, Condition> {
        self.inner.lock().unwrap().table.clone()
    }

    pub(crate) fn import(&self, table: BTreeMap<i32, Condition>) {
        let mut inner = self.inner.lock().unwrap();
        inner.top = table.keys().copied().max().unwrap_or(0).max(0);
        inner.bottom = table.keys().copied().min().unwrap_or(0).min(0);
        inner.table = table;
    }
}

impl Display for Conditions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        writeln!(f, "conditions:")?;
        for (index, cond) in &inner.table {
            writeln!(f, "  {} -> {}", index, cond)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_counters_grow_apart() {
        let conds = Conditions::new();
        let a = conds.new_constraint(AffineForm::range(1.0, 2.0, 1), "a");
        let b = conds.new_variable("b");
        let c = conds.new_bottom_constraint(AffineForm::range(1.0, 2.0, 1), "c");
        let d = conds.new_bottom_constraint(AffineForm::range(0.0, 1.0, 2), "d");
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(c, -1);
        assert_eq!(d, -2);
        assert_eq!(conds.top(), 2);
        assert_eq!(conds.bottom(), -2);
        assert_eq!(conds.len(), 4);
    }

    #[test]
    fn test_kinds() {
        let conds = Conditions::new();
        let c = conds.new_constraint(AffineForm::range(1.0, 2.0, 1), "");
        let v = conds.new_variable("x");
        assert!(conds.constraint(c).is_some());
        assert!(!conds.is_bool_var(c));
        assert!(conds.constraint(v).is_none());
        assert!(conds.is_bool_var(v));
    }

    #[test]
    #[should_panic(expected = "condition index out of range")]
    fn test_out_of_range_index() {
        let conds = Conditions::new();
        conds.new_variable("x");
        conds.constraint(7);
    }

    #[test]
    fn test_reset() {
        let conds = Conditions::new();
        conds.new_variable("x");
        conds.reset();
        assert!(conds.is_empty());
        assert_eq!(conds.top(), 0);
        assert_eq!(conds.bottom(), 0);
    }
}
