use thiserror::Error;

/// Crate-wide error type.
///
/// Transport failures (`ModelUnavailable`) and content defects
/// (`NoStructuredBlockFound`, `MissingRequiredField`, `DanglingReference`)
/// are deliberately distinct variants: the generator retries on content
/// defects but surfaces transport failures to the caller untouched.
/// Rule violations are not errors at all - they travel inside
/// [`crate::types::ValidationResult`].
#[derive(Debug, Error)]
pub enum OkrError {
    /// The text-completion dependency timed out, was rate-limited or
    /// returned a server-side failure. Fatal for the current call.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The raw model output carries no ```yaml fenced block.
    #[error("model output contains no fenced yaml block")]
    NoStructuredBlockFound,

    /// A payload entity is missing a required field, or the field has the
    /// wrong shape.
    #[error("missing or invalid field `{field}` on {entity}")]
    MissingRequiredField { entity: &'static str, field: String },

    /// A child entity references a parent id that does not exist in the
    /// same structure.
    #[error("dangling reference: `{child_id}` points to unknown {parent_kind} `{parent_id}`")]
    DanglingReference {
        child_id: String,
        parent_kind: &'static str,
        parent_id: String,
    },

    /// The caller supplied an empty or unrecognized category set.
    /// Rejected before any model call.
    #[error("invalid category request: {0}")]
    InvalidCategoryRequest(String),

    #[error("{0}")]
    Generic(String),
}
