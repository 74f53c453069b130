//! Patch-or-escalate compatibility check.
//!
//! Given the class currently behind a name and its replacement, decides
//! whether the update can be absorbed by patching the bound proxy. Three
//! axes are checked, in a fixed order: construction behavior, reactive
//! property schema, and externally observed attributes. Any difference on
//! any axis produces an itemized reason; renames and bodies of ordinary
//! methods never escalate.

use std::collections::BTreeSet;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use rekindle_core::scan::opaque_spans;

use crate::class::ComponentClass;

/// `this.name =` inside a constructor body. Compound assignment and
/// comparison operators are filtered at the call site.
static SELF_ASSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bthis\s*\.\s*([A-Za-z_$][\w$]*)\s*=").expect("self-assignment pattern compiles")
});

/// Outcome of [`check_compatibility`].
#[derive(Debug, Clone, Default)]
pub struct CompatReport {
    /// Itemized escalation reasons, ordered construction, schema,
    /// attributes. Empty means the update is patchable.
    pub reasons: Vec<String>,
}

impl CompatReport {
    /// Whether the proxy can absorb the replacement in place.
    pub fn is_patchable(&self) -> bool {
        self.reasons.is_empty()
    }

    /// All reasons joined for the reload request.
    pub fn reason_text(&self) -> String {
        self.reasons.join("; ")
    }
}

/// Compares the class behind a registration with its replacement.
pub fn check_compatibility(old: &ComponentClass, new: &ComponentClass) -> CompatReport {
    let mut reasons = Vec::new();

    // Construction axis: the constructor's body text, with an absent
    // constructor reading as empty. A textual difference escalates; the
    // assignment sets make the reason concrete when they diverge.
    let old_body = old.constructor_body.as_deref().unwrap_or("");
    let new_body = new.constructor_body.as_deref().unwrap_or("");
    if collapse_whitespace(old_body) != collapse_whitespace(new_body) {
        let old_fields = assigned_fields(old_body);
        let new_fields = assigned_fields(new_body);
        match set_change_reason("Constructor assignments", &old_fields, &new_fields) {
            Some(reason) => reasons.push(reason),
            None => reasons.push("Constructor body changed".to_string()),
        }
    }

    // Schema axis: the set of reactive property names.
    let old_schema: BTreeSet<String> = old.reactive.iter().cloned().collect();
    let new_schema: BTreeSet<String> = new.reactive.iter().cloned().collect();
    if let Some(reason) = set_change_reason("Reactive properties", &old_schema, &new_schema) {
        reasons.push(reason);
    }

    // Attribute axis: the platform reads observedAttributes once at bind
    // time, so any membership change forces a reload.
    let old_attrs: BTreeSet<String> = old.observed_attributes.iter().cloned().collect();
    let new_attrs: BTreeSet<String> = new.observed_attributes.iter().cloned().collect();
    if let Some(reason) = set_change_reason("Observed attributes", &old_attrs, &new_attrs) {
        reasons.push(reason);
    }

    CompatReport { reasons }
}

/// Field names a constructor body assigns through `this.name = …`.
pub fn assigned_fields(body: &str) -> BTreeSet<String> {
    let spans = opaque_spans(body);
    let bytes = body.as_bytes();
    let mut fields = BTreeSet::new();
    for caps in SELF_ASSIGN.captures_iter(body) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        if in_opaque(&spans, whole.start()) {
            continue;
        }
        // `==` and `=>` are not assignments.
        if matches!(bytes.get(whole.end()), Some(b'=') | Some(b'>')) {
            continue;
        }
        fields.insert(caps[1].to_string());
    }
    fields
}

fn in_opaque(spans: &[Range<usize>], pos: usize) -> bool {
    let idx = spans.partition_point(|span| span.end <= pos);
    spans.get(idx).map_or(false, |span| span.contains(&pos))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn set_change_reason(
    label: &str,
    old: &BTreeSet<String>,
    new: &BTreeSet<String>,
) -> Option<String> {
    let added: Vec<&str> = new.difference(old).map(String::as_str).collect();
    let removed: Vec<&str> = old.difference(new).map(String::as_str).collect();
    if added.is_empty() && removed.is_empty() {
        return None;
    }
    let mut text = format!("{label} changed:");
    if !added.is_empty() {
        text.push_str(&format!(" added [{}]", added.join(", ")));
    }
    if !removed.is_empty() {
        if !added.is_empty() {
            text.push(',');
        }
        text.push_str(&format!(" removed [{}]", removed.join(", ")));
    }
    Some(text)
}
