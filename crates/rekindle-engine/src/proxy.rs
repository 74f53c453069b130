//! The stable class bound into the element registry.
//!
//! The registry never rebinds a name, so what it gets is a proxy: a thin
//! subclass of the first delegate that arrived for the name. Later
//! replacements are absorbed by copying their descriptors onto the proxy's
//! own tables, which shadow the original delegate. The tables start empty;
//! an empty slot means the lookup falls through to the delegate.
//!
//! The observed attribute list is the one thing the platform reads exactly
//! once, at bind time. It is frozen here and never revisited; changing it
//! is what the attribute axis of the compatibility check escalates over.

use std::cell::{Cell, RefCell};

use log::{debug, warn};

use crate::class::{ComponentClass, PropertyEntry};

/// Stable per-name class. See the module docs for the shadowing model.
#[derive(Debug)]
pub struct ProxyClass {
    name: String,
    base_ident: String,
    observed_attributes: Vec<String>,
    prototype: RefCell<Vec<PropertyEntry>>,
    statics: RefCell<Vec<PropertyEntry>>,
    reactive: RefCell<Vec<String>>,
    styles: RefCell<Option<String>>,
    finalized: Cell<bool>,
}

impl ProxyClass {
    /// Creates the proxy for a name from the first delegate that arrived.
    pub fn subclass_of(delegate: &ComponentClass, name: &str) -> ProxyClass {
        ProxyClass {
            name: name.to_string(),
            base_ident: delegate.ident.clone(),
            observed_attributes: delegate.observed_attributes.clone(),
            prototype: RefCell::new(Vec::new()),
            statics: RefCell::new(Vec::new()),
            reactive: RefCell::new(delegate.reactive.clone()),
            styles: RefCell::new(delegate.styles.clone()),
            finalized: Cell::new(false),
        }
    }

    /// The registration name this proxy is bound under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the delegate this proxy subclasses.
    pub fn base_ident(&self) -> &str {
        &self.base_ident
    }

    /// The attribute list frozen at bind time.
    pub fn observed_attributes(&self) -> &[String] {
        &self.observed_attributes
    }

    /// Current reactive property metadata.
    pub fn reactive(&self) -> Vec<String> {
        self.reactive.borrow().clone()
    }

    /// Current style sheet source.
    pub fn styles(&self) -> Option<String> {
        self.styles.borrow().clone()
    }

    /// Whether per-class framework metadata has been derived.
    pub fn is_finalized(&self) -> bool {
        self.finalized.get()
    }

    /// Marks per-class framework metadata as derived.
    pub fn mark_finalized(&self) {
        self.finalized.set(true);
    }

    /// A descriptor this proxy shadows on its prototype, when it has one.
    pub fn own_prototype_entry(&self, name: &str) -> Option<PropertyEntry> {
        self.prototype
            .borrow()
            .iter()
            .find(|entry| entry.key.as_str() == Some(name))
            .cloned()
    }

    /// A descriptor this proxy shadows on the class side, when it has one.
    pub fn own_static_entry(&self, name: &str) -> Option<PropertyEntry> {
        self.statics
            .borrow()
            .iter()
            .find(|entry| entry.key.as_str() == Some(name))
            .cloned()
    }

    /// Places a descriptor directly on the proxy's prototype table.
    pub fn define_own(&self, entry: PropertyEntry) {
        let mut table = self.prototype.borrow_mut();
        match table.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => *existing = entry,
            None => table.push(entry),
        }
    }

    /// Absorbs a replacement class in place.
    ///
    /// Copies prototype and static descriptors onto the proxy's shadow
    /// tables, skipping accessor pairs (their values are re-driven through
    /// snapshots afterwards) and the constructor slot. A non-configurable
    /// shadowed slot cannot be redefined; the failure is logged and the
    /// copy moves on. Framework caches (reactive metadata, styles, the
    /// finalized marker) are reset so the next use re-derives them.
    pub fn patch_from(&self, delegate: &ComponentClass) {
        copy_descriptors(&self.name, &self.prototype, &delegate.prototype, "prototype");
        copy_descriptors(&self.name, &self.statics, &delegate.statics, "static");
        *self.reactive.borrow_mut() = delegate.reactive.clone();
        *self.styles.borrow_mut() = delegate.styles.clone();
        self.finalized.set(false);
        debug!("patched `{}` from class `{}`", self.name, delegate.ident);
    }
}

fn copy_descriptors(
    name: &str,
    table: &RefCell<Vec<PropertyEntry>>,
    source: &[PropertyEntry],
    which: &str,
) {
    let mut table = table.borrow_mut();
    for entry in source {
        if entry.descriptor.is_accessor() || entry.key.as_str() == Some("constructor") {
            continue;
        }
        match table.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) if !existing.configurable => {
                warn!(
                    "cannot redefine non-configurable {which} property `{}` of `{name}`",
                    entry.key
                );
            }
            Some(existing) => *existing = entry.clone(),
            None => table.push(entry.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{Descriptor, PropertyKey};

    fn delegate_with_method(ident: &str, method: &str, body: &str) -> ComponentClass {
        let mut class = ComponentClass::stub(ident);
        class.prototype.push(PropertyEntry::named(
            method,
            Descriptor::Method { params: String::new(), body: body.to_string() },
        ));
        class
    }

    #[test]
    fn test_proxy_freezes_observed_attributes() {
        let mut first = ComponentClass::stub("CounterV1");
        first.observed_attributes = vec!["label".to_string()];
        let proxy = ProxyClass::subclass_of(&first, "x-counter");

        let mut second = ComponentClass::stub("CounterV2");
        second.observed_attributes = vec!["label".to_string(), "data-theme".to_string()];
        proxy.patch_from(&second);

        assert_eq!(proxy.observed_attributes(), ["label".to_string()]);
    }

    #[test]
    fn test_patch_copies_methods_and_skips_accessors() {
        let first = delegate_with_method("V1", "render", "return 1;");
        let proxy = ProxyClass::subclass_of(&first, "x-a");
        assert!(
            proxy.own_prototype_entry("render").is_none(),
            "fresh proxy inherits; it shadows nothing"
        );

        let mut second = delegate_with_method("V2", "render", "return 2;");
        second.prototype.push(PropertyEntry::named(
            "count",
            Descriptor::Accessor { getter: None, setter: None },
        ));
        proxy.patch_from(&second);

        let render = proxy.own_prototype_entry("render").unwrap();
        assert!(matches!(
            render.descriptor,
            Descriptor::Method { ref body, .. } if body == "return 2;"
        ));
        assert!(
            proxy.own_prototype_entry("count").is_none(),
            "accessor pairs must not be copied"
        );
    }

    #[test]
    fn test_patch_never_copies_a_constructor_slot() {
        let mut second = ComponentClass::stub("V2");
        second.prototype.push(PropertyEntry::named(
            "constructor",
            Descriptor::Method { params: String::new(), body: "super();".to_string() },
        ));
        let proxy = ProxyClass::subclass_of(&ComponentClass::stub("V1"), "x-a");
        proxy.patch_from(&second);
        assert!(proxy.own_prototype_entry("constructor").is_none());
    }

    #[test]
    fn test_non_configurable_slot_survives_a_patch() {
        let proxy = ProxyClass::subclass_of(&ComponentClass::stub("V1"), "x-a");
        proxy.define_own(PropertyEntry {
            key: PropertyKey::String("sealed".to_string()),
            descriptor: Descriptor::Method { params: String::new(), body: "return 'old';".to_string() },
            configurable: false,
        });

        let second = delegate_with_method("V2", "sealed", "return 'new';");
        proxy.patch_from(&second);

        let kept = proxy.own_prototype_entry("sealed").unwrap();
        assert!(matches!(
            kept.descriptor,
            Descriptor::Method { ref body, .. } if body == "return 'old';"
        ));
    }

    #[test]
    fn test_patch_resets_framework_caches() {
        let mut first = ComponentClass::stub("V1");
        first.reactive = vec!["count".to_string()];
        let proxy = ProxyClass::subclass_of(&first, "x-a");
        proxy.mark_finalized();

        let mut second = ComponentClass::stub("V2");
        second.reactive = vec!["count".to_string(), "busy".to_string()];
        second.styles = Some("css`p { color: red; }`".to_string());
        proxy.patch_from(&second);

        assert!(!proxy.is_finalized(), "patch must clear the finalized marker");
        assert_eq!(proxy.reactive(), ["count".to_string(), "busy".to_string()]);
        assert_eq!(proxy.styles().as_deref(), Some("css`p { color: red; }`"));
    }
}
