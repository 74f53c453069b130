//! Engine error types.

use thiserror::Error;

/// Errors raised by [`crate::ElementRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The name is already bound. The platform registry never rebinds.
    #[error("`{0}` is already defined")]
    AlreadyDefined(String),
    /// The name does not satisfy the custom-element naming rule.
    #[error("`{0}` is not a valid custom element name")]
    InvalidName(String),
}

/// Errors raised while reading a class declaration into a
/// [`crate::ComponentClass`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReaderError {
    /// The text contains no `class` declaration.
    #[error("no class declaration found")]
    NoClass,
    /// The class has no identifier to register under.
    #[error("class declaration is anonymous")]
    Anonymous,
    /// The class body's braces never balance.
    #[error("body of class `{0}` never closes")]
    UnbalancedBody(String),
}

/// Error surfaced by an instance's render hook.
///
/// Hot-swap propagation treats these as non-fatal: the failure is logged and
/// the remaining instances still get their re-render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("render failed: {0}")]
pub struct RenderError(pub String);
