//! Transform configuration.

/// Names the transform recognizes in component source.
///
/// The defaults target the lit-flavored component stack; [`TransformOptions::vanilla`]
/// keeps only the bare platform registration call. All entries are matched
/// literally (they are escaped before being compiled into patterns), so a
/// custom framework can be supported by listing its decorator and callee
/// names here.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Import specifiers that mark a unit as using the component framework.
    /// A specifier matches if it equals an entry or starts with `entry + "/"`.
    pub framework_packages: Vec<String>,
    /// Dotted callee paths of the direct registration call.
    pub define_callees: Vec<String>,
    /// Decorator names that register the class they annotate.
    pub element_decorators: Vec<String>,
    /// Decorator names declaring an observed (attribute-reflecting) reactive field.
    pub property_decorators: Vec<String>,
    /// Decorator names declaring a local-only reactive state field.
    pub state_decorators: Vec<String>,
}

impl TransformOptions {
    /// Options for lit-style components: `@customElement`, `@property`,
    /// `@state` (plus the older `@internalProperty` spelling), and the
    /// platform define call.
    pub fn lit_flavored() -> Self {
        TransformOptions {
            framework_packages: vec![
                "lit".to_string(),
                "lit-element".to_string(),
                "@lit/reactive-element".to_string(),
            ],
            define_callees: default_define_callees(),
            element_decorators: vec!["customElement".to_string()],
            property_decorators: vec!["property".to_string()],
            state_decorators: vec!["state".to_string(), "internalProperty".to_string()],
        }
    }

    /// Options for undecorated components that register through the
    /// platform call alone. No decorator or reactive-field matching.
    pub fn vanilla() -> Self {
        TransformOptions {
            framework_packages: Vec::new(),
            define_callees: default_define_callees(),
            element_decorators: Vec::new(),
            property_decorators: Vec::new(),
            state_decorators: Vec::new(),
        }
    }

    /// True when no registration form is configured at all.
    pub fn is_empty(&self) -> bool {
        self.define_callees.is_empty() && self.element_decorators.is_empty()
    }

    /// True if `specifier` refers to one of the configured framework packages.
    pub fn is_framework_specifier(&self, specifier: &str) -> bool {
        self.framework_packages.iter().any(|pkg| {
            specifier == pkg || specifier.strip_prefix(pkg.as_str()).is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self::lit_flavored()
    }
}

fn default_define_callees() -> Vec<String> {
    vec![
        "customElements.define".to_string(),
        "window.customElements.define".to_string(),
        "globalThis.customElements.define".to_string(),
    ]
}
