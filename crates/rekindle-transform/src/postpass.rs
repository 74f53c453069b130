//! Post-lowering pass over already rewritten text.
//!
//! Runs after decorator and class-field lowering has been applied to a
//! unit, so it scans compiled output, not authored source. Two jobs:
//! neutralize compiled private-brand guards that would reject field writes
//! coming from the hot-swap engine, and append one finalize call per
//! registration declared in the unit so captured reactive values are
//! re-driven through their accessors after a patch.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use rekindle_core::scan::opaque_spans;

use crate::emit;

/// Result of the post-pass.
#[derive(Debug, Clone)]
pub enum PostPassOutcome {
    /// No brand guard and nothing to finalize; input returned untouched.
    Unchanged,
    /// The unit was patched.
    Rewritten {
        /// The patched text.
        code: String,
        /// Registration names recovered from the unit's entry-point calls.
        names: Vec<String>,
    },
}

impl PostPassOutcome {
    /// True for [`PostPassOutcome::Unchanged`].
    pub fn is_unchanged(&self) -> bool {
        matches!(self, PostPassOutcome::Unchanged)
    }
}

// Lowered private-field access guards come in two shapes. The common one
// tests the brand map and throws when the receiver is missing:
//
//   if (!privateMap.has(receiver)) { throw new TypeError(...); }
//   ... : !state.has(receiver)) throw new TypeError(...);
//
// The condition is rewritten to `false` so the throw is never taken. The
// hot-swap engine constructs instances of the proxy class, which never
// carries the brand of the delegate that declared the private slot.
static BRAND_GUARD_IF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"!\s*[A-Za-z_$][\w$]*\s*\.\s*has\s*\(\s*[A-Za-z_$][\w$]*\s*\)(?P<sep>\s*\)+\s*\{?\s*)throw\b",
    )
    .expect("brand guard pattern compiles")
});

// The second shape short-circuits into a throw helper:
//
//   brand.has(obj) || throwForMissingBrand(obj);
static BRAND_GUARD_OR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b[A-Za-z_$][\w$]*\s*\.\s*has\s*\(\s*[A-Za-z_$][\w$]*\s*\)\s*\|\|\s*(?P<callee>_*[Tt]hrow[\w$]*\s*\()",
    )
    .expect("brand guard pattern compiles")
});

static ENTRY_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"__rekindleDefine\(\s*"(?P<name>(?:[^"\\]|\\.)*)"\s*,\s*[A-Za-z_$][\w$]*\s*,\s*"(?P<unit>(?:[^"\\]|\\.)*)""#,
    )
    .expect("entry call pattern compiles")
});

/// Apply the post-pass to one unit of already rewritten text.
///
/// Absent guard patterns are a no-op, not an error. Registration names are
/// recovered from the `__rekindleDefine` calls the primary rewrite left in
/// the text (which also carry the unit identifier), so this pass needs no
/// configuration. A unit that already carries a finalize block is left
/// alone, keeping the pass idempotent.
pub fn apply_post_pass(code: &str) -> PostPassOutcome {
    let opaque = opaque_spans(code);
    let in_opaque = |pos: usize| {
        let idx = opaque.partition_point(|r| r.end <= pos);
        opaque.get(idx).is_some_and(|r| r.start <= pos)
    };

    let pass_if = BRAND_GUARD_IF.replace_all(code, |caps: &Captures<'_>| {
        let whole = &caps[0];
        let at = caps.get(0).map(|g| g.start()).unwrap_or(0);
        if in_opaque(at) {
            return whole.to_string();
        }
        format!("false{}throw", &caps["sep"])
    });
    let pass_or = BRAND_GUARD_OR.replace_all(&pass_if, |caps: &Captures<'_>| {
        let whole = &caps[0];
        let at = caps.get(0).map(|g| g.start()).unwrap_or(0);
        if in_opaque(at) {
            return whole.to_string();
        }
        format!("true || {}", &caps["callee"])
    });
    let guards_changed = pass_or != code;
    if guards_changed {
        log::debug!("neutralized private-brand guards");
    }

    let mut entries: Vec<(String, String)> = Vec::new();
    if !code.contains(emit::FINALIZE_MARKER) {
        for caps in ENTRY_CALL.captures_iter(code) {
            let at = caps.get(0).map(|g| g.start()).unwrap_or(0);
            if in_opaque(at) {
                continue;
            }
            let name = unquote(&caps["name"]);
            let unit = unquote(&caps["unit"]);
            if !entries.iter().any(|(n, _)| *n == name) {
                entries.push((name, unit));
            }
        }
    }

    if !guards_changed && entries.is_empty() {
        return PostPassOutcome::Unchanged;
    }

    let mut out = pass_or.into_owned();
    let names: Vec<String> = entries.iter().map(|(n, _)| n.clone()).collect();
    if !entries.is_empty() {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&emit::finalize_block(&entries));
    }
    PostPassOutcome::Rewritten { code: out, names }
}

/// Decode the inner text of a double-quoted literal recovered by regex.
fn unquote(inner: &str) -> String {
    match serde_json::from_str::<String>(&format!("\"{}\"", inner)) {
        Ok(s) => s,
        Err(_) => inner.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewritten(outcome: PostPassOutcome) -> (String, Vec<String>) {
        match outcome {
            PostPassOutcome::Rewritten { code, names } => (code, names),
            PostPassOutcome::Unchanged => panic!("expected a rewrite"),
        }
    }

    #[test]
    fn test_brand_guard_if_form() {
        let src = "function _get(receiver, privateMap) {\n  if (!privateMap.has(receiver)) {\n    throw new TypeError(\"attempted to get private field\");\n  }\n  return privateMap.get(receiver);\n}\n";
        let (code, names) = rewritten(apply_post_pass(src));
        assert!(code.contains("if (false) {\n    throw"));
        assert!(!code.contains("!privateMap.has"));
        assert!(names.is_empty());
    }

    #[test]
    fn test_brand_guard_ternary_form() {
        let src = "if (typeof state === \"function\" ? receiver !== state : !state.has(receiver)) throw new TypeError(\"no access\");\n";
        let (code, _) = rewritten(apply_post_pass(src));
        assert!(code.contains(": false) throw"));
    }

    #[test]
    fn test_brand_guard_or_form() {
        let src = "_brand.has(obj) || throwForMissingBrand(obj);\n";
        let (code, _) = rewritten(apply_post_pass(src));
        assert!(code.starts_with("true || throwForMissingBrand(obj);"));
    }

    #[test]
    fn test_plain_has_call_untouched() {
        let src = "if (cache.has(key)) { return cache.get(key); }\n";
        assert!(apply_post_pass(src).is_unchanged());
    }

    #[test]
    fn test_guard_inside_string_untouched() {
        let src = "const doc = \"if (!m.has(o)) throw\";\n";
        assert!(apply_post_pass(src).is_unchanged());
    }

    #[test]
    fn test_finalize_appended_per_name() {
        let src = "__rekindleDefine(\"x-a\", A, \"src/a.ts\", []);\n__rekindleDefine(\"x-b\", B, \"src/a.ts\", []);\n";
        let (code, names) = rewritten(apply_post_pass(src));
        assert_eq!(names, vec!["x-a".to_string(), "x-b".to_string()]);
        assert!(code.contains(emit::FINALIZE_MARKER));
        assert!(code.contains("__rekindleFinalize(\"x-a\", \"src/a.ts\");"));
        assert!(code.contains("__rekindleFinalize(\"x-b\", \"src/a.ts\");"));
    }

    #[test]
    fn test_duplicate_names_finalize_once() {
        let src = "__rekindleDefine(\"x-a\", A, \"src/a.ts\", []);\n__rekindleDefine(\"x-a\", A2, \"src/a.ts\", []);\n";
        let (code, names) = rewritten(apply_post_pass(src));
        assert_eq!(names.len(), 1);
        assert_eq!(code.matches("__rekindleFinalize(").count(), 1);
    }

    #[test]
    fn test_post_pass_is_idempotent() {
        let src = "if (!map.has(o)) { throw new TypeError(\"x\"); }\n__rekindleDefine(\"x-c\", C, \"src/c.ts\", []);\n";
        let (first, _) = rewritten(apply_post_pass(src));
        assert!(apply_post_pass(&first).is_unchanged());
    }

    #[test]
    fn test_irrelevant_unit_unchanged() {
        assert!(apply_post_pass("export const n = 1;\n").is_unchanged());
    }
}
