//! # aadd-rs: Affine Arithmetic Decision Diagrams in Rust
//!
//! **`aadd-rs`** computes guaranteed, tightened numeric ranges and Boolean
//! satisfiability results over expressions built from uncertain real
//! quantities and uncertain Boolean conditions. Instead of single-point
//! simulation it carries rigorous bounds, which makes it useful for
//! analyzing control and embedded-system models whose inputs and parameters
//! are only known as intervals.
//!
//! ## How it works
//!
//! Uncertain reals are **affine forms** `x0 + x1*e1 + ... + xn*en +- r`
//! over shared noise symbols `ei` in `[-1, 1]`, so quantities derived from
//! the same source stay correlated. Decisions over them live in **ordered,
//! reduced decision diagrams**: Boolean leaves give a BDD, affine leaves an
//! AADD. Comparisons of affine diagrams allocate linear constraints in a
//! shared condition registry; the range-refinement pass then walks every
//! root-to-leaf path and calls an LP solver with the path constraints to
//! tighten the leaf bounds, detecting infeasible paths along the way.
//!
//! ## Key features
//!
//! - **Manager-centric architecture**: all operations go through the
//!   [`Context`], which owns the condition and noise-symbol registries and
//!   maintains the canonical-form invariant via its reducing constructors.
//! - **Sound numerics**: every affine operation accumulates explicit
//!   rounding slack; invalid results degrade to sentinel values (`Empty`,
//!   reals-or-NaN) instead of silently lying.
//! - **LP-backed refinement**: ranges are tightened along decision paths
//!   with a two-phase simplex, in parallel across branches.
//! - **Round-tripping**: ranges, affine forms, the registries, and whole
//!   diagrams serialize to JSON and back.
//!
//! ## Basic usage
//!
//! ```rust
//! use aadd_rs::Context;
//!
//! // 1. Initialize the manager
//! let ctx = Context::new();
//!
//! // 2. An uncertain value, only known to lie in [1.0, 3.0]
//! let a = ctx.range(1.0, 3.0).unwrap();
//!
//! // 3. Constrain it: paths outside [1.2, 2.2] become empty
//! let b = ctx.intersect(&a, 1.2, 2.2).unwrap();
//!
//! // 4. The refined range reflects the constraints
//! let range = ctx.range_of(&b).unwrap();
//! assert!((range.min - 1.2).abs() < 1e-3);
//! assert!((range.max - 2.2).abs() < 1e-3);
//!
//! // 5. Boolean reasoning works the same way
//! let x = ctx.variable("x");
//! let f = ctx.and(&x, &ctx.not(&x));
//! assert_eq!(f, ctx.fls());
//! ```
//!
//! ## Core components
//!
//! - [`range`]: the interval value type with its special kinds.
//! - [`affine`]: affine forms and their arithmetic.
//! - [`conditions`] / [`noise`]: the shared registries.
//! - [`node`] / [`context`]: the generic diagram core and the manager.
//! - [`bdd`] / [`aadd`]: the two leaf algebras' operator sets.
//! - [`refine`] / [`lp`]: the LP-backed range refinement.
//! - [`json`]: JSON import/export.

pub mod aadd;
pub mod affine;
pub mod bdd;
pub mod conditions;
pub mod context;
pub mod error;
pub mod json;
pub mod lp;
pub mod node;
pub mod noise;
pub mod range;
pub mod refine;

pub use affine::AffineForm;
pub use conditions::{Condition, ConditionKind, Conditions};
pub use context::{Aadd, Bdd, Context};
pub use error::{Error, Result};
pub use node::{Node, Status};
pub use noise::NoiseSymbols;
pub use range::Range;
