//! Rekindle dev-session host
//!
//! Ties the build-side transform to the runtime engine the way a dev
//! server would: each source unit is rewritten, its emitted directives
//! are evaluated against a live [`ExecutionEnv`], and edits to an
//! already-loaded unit either patch in place or escalate to a full
//! reload of the whole environment.
//!
//! - **Evaluation** (`eval`): interprets the transform's own directive
//!   protocol (bootstrap marker, snapshot payload line, entry-point and
//!   finalize calls) plus class declarations, and nothing else.
//! - **Session** (`session`): [`DevSession`] owns the environment and a
//!   load-ordered unit cache, and converts an escalation flag into the
//!   discard-and-re-evaluate reload cycle.
//!
//! [`ExecutionEnv`]: rekindle_engine::ExecutionEnv

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod eval;
pub mod session;

pub use error::RuntimeError;
pub use eval::{evaluate_unit, EvalSummary};
pub use session::{DevSession, UpdateOutcome};
