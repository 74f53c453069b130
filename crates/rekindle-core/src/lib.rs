//! Rekindle core types
//!
//! Shared leaf crate for the Rekindle hot-swap toolchain:
//! - **Value model**: dynamic [`Value`] and the fixed [`ValueKind`] tag set
//!   used by property snapshots (`value` module)
//! - **Literal evaluation**: the restricted literal evaluator that turns
//!   initializer text into a [`Value`] without executing code (`literal`
//!   module)
//! - **Snapshots**: [`PropertySnapshot`] records carried across a patch
//!   boundary (`snapshot` module)
//! - **Scanning**: string/comment/brace-aware text walking shared by the
//!   transform's pattern matcher and the engine's class reader (`scan`
//!   module)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod literal;
pub mod scan;
pub mod snapshot;
pub mod value;

pub use literal::{evaluate_literal, classify_literal, LiteralError};
pub use snapshot::PropertySnapshot;
pub use value::{Value, ValueKind};
