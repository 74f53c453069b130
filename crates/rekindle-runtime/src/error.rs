//! Session error types.

use thiserror::Error;

use rekindle_transform::TransformError;

/// Errors raised while assembling a dev session.
///
/// Running a session never fails: malformed directives are logged and
/// skipped, and escalations surface as reload outcomes, not errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The session's transformer could not be built from its options.
    #[error(transparent)]
    Transform(#[from] TransformError),
}
