//! Runtime registry and hot-swap engine.
//!
//! The custom-element registry binds a tag name to a class exactly once per
//! page lifetime. This crate works around that by binding a stable proxy
//! class per name and swapping the real implementation behind it. When a
//! replacement class arrives, a three-axis compatibility check decides
//! whether to patch the proxy in place or to escalate to a full reload.
//!
//! The entry type is [`ExecutionEnv`]: it owns the registry, one
//! [`RegistrationRecord`] per bound name, and the per-unit snapshot store
//! that restores reactive field values after a patch.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod class;
pub mod diff;
pub mod engine;
pub mod error;
pub mod instance;
pub mod proxy;
pub mod reader;
pub mod record;
pub mod registry;

pub use class::{ComponentClass, Descriptor, PropertyEntry, PropertyKey};
pub use diff::{check_compatibility, CompatReport};
pub use engine::ExecutionEnv;
pub use error::{ReaderError, RegistryError, RenderError};
pub use instance::{ComponentInstance, InstanceHooks};
pub use proxy::ProxyClass;
pub use reader::read_component_class;
pub use record::RegistrationRecord;
pub use registry::ElementRegistry;
