//! Structural model of a component class.
//!
//! A [`ComponentClass`] is the engine's view of one `class` declaration: its
//! prototype and static property tables, its constructor body, and the
//! framework-level metadata the hot-swap diff cares about (reactive property
//! names, observed attributes, style sheet text). Instances of this type are
//! immutable once read; the only mutable bit is the framework's
//! "already finalized" cache marker.

use std::cell::Cell;

use rekindle_core::Value;

/// Property key on a prototype or static table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Ordinary string-named property.
    String(String),
    /// Symbol-keyed property, identified by the computed-key source text
    /// (for example `Symbol.iterator`).
    Symbol(String),
}

impl PropertyKey {
    /// The string name, when this is a string key.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyKey::String(name) => Some(name),
            PropertyKey::Symbol(_) => None,
        }
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyKey::String(name) => write!(f, "{name}"),
            PropertyKey::Symbol(text) => write!(f, "[{text}]"),
        }
    }
}

/// What a property slot holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    /// Plain data slot. The initializer source text is always kept; the
    /// evaluated value is present only when the initializer was a literal.
    Data {
        /// Initializer source text, verbatim.
        source: String,
        /// Evaluated literal value, when the initializer was one.
        value: Option<Value>,
    },
    /// Function-valued slot. The body text stands in for the function.
    Method {
        /// Parameter list source text, without the surrounding parentheses.
        params: String,
        /// Body source text, without the surrounding braces.
        body: String,
    },
    /// Getter/setter pair. Either half may be absent.
    Accessor {
        /// Getter body text.
        getter: Option<String>,
        /// Setter body text.
        setter: Option<String>,
    },
}

impl Descriptor {
    /// Whether this slot is an accessor pair.
    pub fn is_accessor(&self) -> bool {
        matches!(self, Descriptor::Accessor { .. })
    }
}

/// One entry in a prototype or static property table.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyEntry {
    /// Property key.
    pub key: PropertyKey,
    /// The slot's shape and contents.
    pub descriptor: Descriptor,
    /// Whether the slot can be redefined. Non-configurable slots survive a
    /// patch untouched; the copy step logs and moves on.
    pub configurable: bool,
}

impl PropertyEntry {
    /// A configurable entry under a string key.
    pub fn named(name: impl Into<String>, descriptor: Descriptor) -> Self {
        PropertyEntry {
            key: PropertyKey::String(name.into()),
            descriptor,
            configurable: true,
        }
    }
}

/// The engine's view of one class declaration.
#[derive(Debug)]
pub struct ComponentClass {
    /// Class identifier.
    pub ident: String,
    /// Heritage expression after `extends`, when present.
    pub superclass: Option<String>,
    /// Full declaration source text.
    pub source: String,
    /// Constructor body text, when the class declares one.
    pub constructor_body: Option<String>,
    /// Instance-side property table: methods and accessors, including the
    /// accessor pairs the framework defines for reactive fields.
    pub prototype: Vec<PropertyEntry>,
    /// Class-side property table: static fields and static methods.
    pub statics: Vec<PropertyEntry>,
    /// Reactive property names, in declaration order.
    pub reactive: Vec<String>,
    /// Externally observed attribute names, in declaration order.
    pub observed_attributes: Vec<String>,
    /// Declared style sheet source, when the class carries one.
    pub styles: Option<String>,
    finalized: Cell<bool>,
}

impl ComponentClass {
    /// Looks up a prototype entry by string name.
    pub fn prototype_entry(&self, name: &str) -> Option<&PropertyEntry> {
        self.prototype
            .iter()
            .find(|entry| entry.key.as_str() == Some(name))
    }

    /// Looks up a static entry by string name.
    pub fn static_entry(&self, name: &str) -> Option<&PropertyEntry> {
        self.statics
            .iter()
            .find(|entry| entry.key.as_str() == Some(name))
    }

    /// Whether the framework has already derived per-class metadata.
    pub fn is_finalized(&self) -> bool {
        self.finalized.get()
    }

    /// Marks the per-class metadata as derived.
    pub fn mark_finalized(&self) {
        self.finalized.set(true);
    }

    /// Minimal class for tests and synthetic registrations.
    pub fn stub(ident: impl Into<String>) -> Self {
        let ident = ident.into();
        ComponentClass {
            source: format!("class {ident} {{}}"),
            ident,
            superclass: None,
            constructor_body: None,
            prototype: Vec::new(),
            statics: Vec::new(),
            reactive: Vec::new(),
            observed_attributes: Vec::new(),
            styles: None,
            finalized: Cell::new(false),
        }
    }

    pub(crate) fn from_parts(
        ident: String,
        superclass: Option<String>,
        source: String,
        constructor_body: Option<String>,
        prototype: Vec<PropertyEntry>,
        statics: Vec<PropertyEntry>,
        reactive: Vec<String>,
        observed_attributes: Vec<String>,
        styles: Option<String>,
    ) -> Self {
        ComponentClass {
            ident,
            superclass,
            source,
            constructor_body,
            prototype,
            statics,
            reactive,
            observed_attributes,
            styles,
            finalized: Cell::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_key_display() {
        let plain = PropertyKey::String("render".to_string());
        let symbol = PropertyKey::Symbol("Symbol.iterator".to_string());
        assert_eq!(plain.to_string(), "render");
        assert_eq!(symbol.to_string(), "[Symbol.iterator]");
        assert_eq!(plain.as_str(), Some("render"));
        assert_eq!(symbol.as_str(), None);
    }

    #[test]
    fn test_stub_class_starts_unfinalized() {
        let class = ComponentClass::stub("Widget");
        assert_eq!(class.ident, "Widget");
        assert!(!class.is_finalized(), "fresh class must not be finalized");
        class.mark_finalized();
        assert!(class.is_finalized());
    }

    #[test]
    fn test_entry_lookup_by_name() {
        let mut class = ComponentClass::stub("Widget");
        class.prototype.push(PropertyEntry::named(
            "render",
            Descriptor::Method {
                params: String::new(),
                body: "return null;".to_string(),
            },
        ));
        assert!(class.prototype_entry("render").is_some());
        assert!(class.prototype_entry("update").is_none());
        assert!(class.static_entry("render").is_none());
    }
}
