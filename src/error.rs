use thiserror::Error;

/// Errors surfaced by fallible operations.
///
/// Structural-corruption preconditions (a condition index outside the
/// registry's allocated window, a child index not greater than its parent's)
/// are programming errors and fail with an assertion instead.
#[derive(Debug, Error)]
pub enum Error {
    /// An interval factory was called with `min >= max`.
    #[error("invalid range: min ({min}) must be less than max ({max})")]
    InvalidRange { min: f64, max: f64 },

    /// Equality comparison of two affine diagrams is not supported;
    /// compare via `<=` and `>=` instead.
    #[error("equality comparison of affine diagrams is not supported")]
    AaddEquality,

    /// The LP solver reported an unbounded solution. The diagram's own
    /// interval bounds guarantee boundedness for a consistent model, so this
    /// indicates an internal defect; the full model is attached.
    #[error("unbounded LP solution for a model that is bounded by construction:\n{model}")]
    UnboundedLp { model: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
