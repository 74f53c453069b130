//! Transform error types.

use thiserror::Error;

/// Errors raised while constructing the transform machinery.
///
/// Rewriting itself never fails: malformed constructs are skipped
/// individually and irrelevant units are reported unchanged.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A registration or decorator pattern failed to compile.
    #[error("pattern construction failed: {0}")]
    Pattern(#[from] regex::Error),

    /// The options name an empty pattern set, leaving nothing to match.
    #[error("transform options declare no registration forms")]
    EmptyOptions,
}
