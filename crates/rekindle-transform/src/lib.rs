//! Rekindle source transform
//!
//! Build-side half of the hot-swap toolchain. Given one unit of component
//! source text, the transform reroutes every one-time registration site
//! through the runtime indirection layer and captures reactive-field
//! initializers so live state can be restored after a patch:
//!
//! - **Pattern matching** (`patterns`): textual location of registration
//!   calls, registration decorators, and reactive-field declarations.
//! - **Rewriting** (`rewrite`): span replacement, bootstrap and
//!   update-acceptance injection, snapshot embedding, edit-list source map.
//! - **Post-pass** (`postpass`): runs after decorator/class-field lowering;
//!   neutralizes compiled private-brand guards and appends finalize calls
//!   that re-drive captured values through accessors.
//!
//! The transform is pure text-in/text-out: it performs no I/O and never
//! executes the code it rewrites. Units without a relevant construct are
//! reported unchanged so the host pipeline can skip them.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod emit;
pub mod error;
pub mod options;
pub mod patterns;
pub mod postpass;
pub mod rewrite;

pub use error::TransformError;
pub use options::TransformOptions;
pub use patterns::{Match, Matcher};
pub use postpass::{apply_post_pass, PostPassOutcome};
pub use rewrite::{rewrite_unit, Edit, RewriteOutcome, Transformer};
