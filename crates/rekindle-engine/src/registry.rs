//! One-time-only element registry.
//!
//! Models the platform registry's contract: a name binds to exactly one
//! class for the lifetime of the page, and the binding cannot be replaced
//! or removed. The hot-swap engine therefore binds each name once, to a
//! [`ProxyClass`], and never comes back. The per-name bind counter exists
//! so tests and diagnostics can prove that invariant held.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::RegistryError;
use crate::proxy::ProxyClass;

/// Hyphenated names the platform reserves for SVG and MathML.
const RESERVED_NAMES: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// The custom-element name registry.
#[derive(Debug, Default)]
pub struct ElementRegistry {
    bindings: RefCell<FxHashMap<String, Rc<ProxyClass>>>,
    bind_counts: RefCell<FxHashMap<String, u64>>,
}

impl ElementRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `class`, exactly once.
    pub fn define(&self, name: &str, class: Rc<ProxyClass>) -> Result<(), RegistryError> {
        if !is_valid_name(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(name) {
            return Err(RegistryError::AlreadyDefined(name.to_string()));
        }
        bindings.insert(name.to_string(), class);
        *self.bind_counts.borrow_mut().entry(name.to_string()).or_insert(0) += 1;
        Ok(())
    }

    /// The class bound to `name`, if any.
    pub fn get(&self, name: &str) -> Option<Rc<ProxyClass>> {
        self.bindings.borrow().get(name).cloned()
    }

    /// Whether `name` is bound.
    pub fn is_defined(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// How many times `name` was successfully bound. Stays at most 1 while
    /// the one-time-only contract holds.
    pub fn bind_count(&self, name: &str) -> u64 {
        self.bind_counts.borrow().get(name).copied().unwrap_or(0)
    }

    /// Number of bound names.
    pub fn len(&self) -> usize {
        self.bindings.borrow().len()
    }

    /// Whether nothing is bound yet.
    pub fn is_empty(&self) -> bool {
        self.bindings.borrow().is_empty()
    }
}

/// The platform naming rule, in practical form: ASCII lowercase start, at
/// least one hyphen, no uppercase, and not one of the reserved names.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    if !name.contains('-') || RESERVED_NAMES.contains(&name) {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
}
