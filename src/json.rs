//! JSON import/export of the persisted entities: ranges, affine forms, the
//! condition and noise-symbol tables, and whole diagrams.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::affine::AffineForm;
use crate::context::{Aadd, Bdd, Context};
use crate::error::Result;
use crate::node::{Node, Status};
use crate::range::Range;

/// Serde adapter for `f64` fields that must survive JSON, which has no
/// literal for non-finite values. Finite values stay plain numbers; the
/// trap encodings become the strings `"Infinity"`, `"-Infinity"`, `"NaN"`.
pub(crate) mod float {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_finite() {
            s.serialize_f64(*v)
        } else if v.is_nan() {
            s.serialize_str("NaN")
        } else if *v > 0.0 {
            s.serialize_str("Infinity")
        } else {
            s.serialize_str("-Infinity")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(f64),
            Text(String),
        }
        match Repr::deserialize(d)? {
            Repr::Num(v) => Ok(v),
            Repr::Text(t) => match t.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(serde::de::Error::custom(format!(
                    "not a float: {:?}",
                    other
                ))),
            },
        }
    }
}

/// Serialized shape of a diagram: a plain nested tree. Structural sharing
/// is expanded on export and not recovered on import; semantics are
/// unaffected since nodes are immutable.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DiagramRepr<V> {
    Leaf {
        value: V,
        status: Status,
    },
    Node {
        index: i32,
        t: Box<DiagramRepr<V>>,
        f: Box<DiagramRepr<V>>,
    },
}

fn to_repr<V: Clone>(
    node: &Arc<Node<V>>,
    leaf_value: &impl Fn(&Node<V>) -> V,
) -> DiagramRepr<V> {
    if node.is_leaf() {
        DiagramRepr::Leaf {
            value: leaf_value(node),
            status: node.status(),
        }
    } else {
        DiagramRepr::Node {
            index: node.index(),
            t: Box::new(to_repr(node.t(), leaf_value)),
            f: Box::new(to_repr(node.f(), leaf_value)),
        }
    }
}

fn from_repr<V>(ctx: &Context, repr: DiagramRepr<V>) -> Arc<Node<V>> {
    match repr {
        DiagramRepr::Leaf { value, status } => Node::leaf(value, status),
        DiagramRepr::Node { index, t, f } => {
            // Same invariant as the canonicalizing constructor: the index
            // must exist; the ordering is revalidated by the allocator.
            assert!(
                ctx.conditions.contains(index),
                "imported node references unallocated condition index {}",
                index
            );
            Node::internal(index, from_repr(ctx, *t), from_repr(ctx, *f))
        }
    }
}

fn diagram_from_json<V: DeserializeOwned>(ctx: &Context, json: &str) -> Result<Arc<Node<V>>> {
    let repr: DiagramRepr<V> = serde_json::from_str(json)?;
    Ok(from_repr(ctx, repr))
}

pub fn range_to_json(range: &Range) -> Result<String> {
    Ok(serde_json::to_string_pretty(range)?)
}

pub fn range_from_json(json: &str) -> Result<Range> {
    Ok(serde_json::from_str(json)?)
}

pub fn affine_to_json(form: &AffineForm) -> Result<String> {
    Ok(serde_json::to_string_pretty(form)?)
}

pub fn affine_from_json(json: &str) -> Result<AffineForm> {
    Ok(serde_json::from_str(json)?)
}

impl Context {
    pub fn bdd_to_json(&self, a: &Bdd) -> Result<String> {
        Ok(serde_json::to_string_pretty(&to_repr(a, &|n| *n.value()))?)
    }

    pub fn bdd_from_json(&self, json: &str) -> Result<Bdd> {
        diagram_from_json(self, json)
    }

    /// Exports an affine diagram. Leaf values are written with their
    /// refined bounds baked into the interval, so tightening survives the
    /// round-trip the same way it does in memory.
    pub fn aadd_to_json(&self, a: &Aadd) -> Result<String> {
        Ok(serde_json::to_string_pretty(&to_repr(a, &|n| {
            n.solved_value()
        }))?)
    }

    pub fn aadd_from_json(&self, json: &str) -> Result<Aadd> {
        diagram_from_json(self, json)
    }

    /// Exports the whole condition table as `index -> {name, kind}`.
    pub fn conditions_to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.conditions.export())?)
    }

    /// Replaces the condition table; both counters are recomputed from the
    /// imported indices.
    pub fn conditions_from_json(&self, json: &str) -> Result<()> {
        self.conditions.import(serde_json::from_str(json)?);
        Ok(())
    }

    /// Exports the noise-symbol names as `id -> name`.
    pub fn noise_to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.noise.export())?)
    }

    /// Replaces the noise-symbol table; the counter resumes after the
    /// largest imported id.
    pub fn noise_from_json(&self, json: &str) -> Result<()> {
        self.noise.import(serde_json::from_str(json)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::conditions::ConditionKind;

    fn roundtrip_range(range: Range) {
        let json = range_to_json(&range).unwrap();
        let back = range_from_json(&json).unwrap();
        assert!(range.min == back.min || (range.min.is_nan() && back.min.is_nan()));
        assert!(range.max == back.max || (range.max.is_nan() && back.max.is_nan()));
    }

    #[test]
    fn test_range_roundtrip() {
        roundtrip_range(Range::new(1.25, 2.5));
        roundtrip_range(Range::scalar(-3.0));
        roundtrip_range(Range::EMPTY);
        roundtrip_range(Range::REALS);
        roundtrip_range(Range::REALS_NAN);
        roundtrip_range(Range::new(f64::NAN, f64::NAN));
    }

    #[test]
    fn test_affine_roundtrip() {
        let a = AffineForm::range(1.0, 2.0, 1);
        let b = AffineForm::range(1.0, 2.0, 2);
        let sum = a.add(&b);
        let json = affine_to_json(&sum).unwrap();
        let back = affine_from_json(&json).unwrap();
        // Bitwise on the scalar fields, set-equal on the coefficients.
        assert_eq!(sum.x0, back.x0);
        assert_eq!(sum.r, back.r);
        assert_eq!(sum.min(), back.min());
        assert_eq!(sum.max(), back.max());
        assert_eq!(sum.xi, back.xi);
        assert_eq!(sum, back);

        let scalar_inf = AffineForm::scalar(f64::INFINITY);
        let back = affine_from_json(&affine_to_json(&scalar_inf).unwrap()).unwrap();
        assert!(back.is_reals_nan());
    }

    #[test]
    fn test_conditions_roundtrip() {
        let ctx = Context::new();
        ctx.conditions
            .new_constraint(AffineForm::range(1.0, 2.0, 1), "c");
        ctx.conditions.new_variable("x");
        ctx.conditions
            .new_bottom_constraint(AffineForm::range(0.0, 4.0, 2), "b");
        let json = ctx.conditions_to_json().unwrap();

        let other = Context::new();
        other.conditions_from_json(&json).unwrap();
        assert_eq!(other.conditions.len(), 3);
        assert_eq!(other.conditions.top(), 2);
        assert_eq!(other.conditions.bottom(), -1);
        assert_eq!(
            other.conditions.constraint(1),
            Some(AffineForm::range(1.0, 2.0, 1))
        );
        assert!(other.conditions.is_bool_var(2));
        let exported = other.conditions.export();
        assert!(matches!(
            exported.get(&-1).unwrap().kind,
            ConditionKind::Constraint(_)
        ));
    }

    #[test]
    fn test_noise_roundtrip() {
        let ctx = Context::new();
        ctx.noise.named("vin");
        ctx.noise.fresh();
        ctx.noise.named("vout");
        let json = ctx.noise_to_json().unwrap();

        let other = Context::new();
        other.noise_from_json(&json).unwrap();
        assert_eq!(other.noise.len(), 3);
        assert_eq!(other.noise.name_of(1).as_deref(), Some("vin"));
        assert_eq!(other.noise.name_of(3).as_deref(), Some("vout"));
        // The counter resumes after the imported ids.
        assert_eq!(other.noise.fresh(), 4);
    }

    #[test]
    fn test_bdd_roundtrip() {
        let ctx = Context::new();
        let x = ctx.variable("x");
        let y = ctx.variable("y");
        let f = ctx.or(&ctx.and(&x, &y), &ctx.not(&y));
        let json = ctx.bdd_to_json(&f).unwrap();
        let back = ctx.bdd_from_json(&json).unwrap();
        assert_eq!(back, f);
        assert_eq!(back.num_leaves(), f.num_leaves());
        assert_eq!(back.height(), f.height());
    }

    #[test]
    fn test_aadd_roundtrip() {
        let ctx = Context::new();
        let a = ctx.range(0.0, 1.0).unwrap();
        let b = ctx.range(3.0, 4.0).unwrap();
        let c = ctx.variable("c");
        let d = ctx.ite(&c, &a, &b);
        let json = ctx.aadd_to_json(&d).unwrap();
        let back = ctx.aadd_from_json(&json).unwrap();
        assert_eq!(back, d);
        assert_eq!(back.num_leaves(), d.num_leaves());
    }

    #[test]
    fn test_aadd_roundtrip_preserves_status() {
        let ctx = Context::new();
        let json = ctx.aadd_to_json(&ctx.infeasible()).unwrap();
        let back = ctx.aadd_from_json(&json).unwrap();
        assert!(back.is_infeasible());
    }
}
