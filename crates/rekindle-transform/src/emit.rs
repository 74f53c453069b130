//! Emitted directive names and snippet builders.
//!
//! Everything the rewriter injects into a unit is defined here so the
//! runtime side can recognize it again. The emitted protocol is small:
//! a guarded bootstrap block, one snapshot payload line per unit, entry
//! point calls for each registration, an update-acceptance hook, and the
//! post-pass finalize calls.

/// Name of the process-wide runtime state object.
pub const RUNTIME_GLOBAL: &str = "__REKINDLE__";

/// Name of the runtime entry point every rewritten registration calls.
pub const ENTRY_POINT: &str = "__rekindleDefine";

/// Name of the finalize call appended by the post-pass.
pub const FINALIZE_POINT: &str = "__rekindleFinalize";

/// Marker line opening the injected bootstrap block.
pub const BOOTSTRAP_MARKER: &str = "// <rekindle:bootstrap>";

/// Marker line opening the appended update-acceptance hook.
pub const ACCEPT_MARKER: &str = "// <rekindle:accept>";

/// Marker line opening the post-pass finalize block.
pub const FINALIZE_MARKER: &str = "// <rekindle:finalize>";

/// Prefix of the embedded snapshot payload line.
pub const SNAPSHOT_SET_PREFIX: &str = "__REKINDLE__.snapshots.set(";

/// The update-acceptance hook appended once per rewritten unit. Absorbed
/// updates only log; a prior escalation flagged on the runtime state is
/// converted into a full reload with its reason, clearing the flags.
pub const ACCEPT_SNIPPET: &str = r#"// <rekindle:accept>
if (import.meta.hot) {
  import.meta.hot.accept(() => {
    if (__REKINDLE__.reload.requested) {
      const reason = __REKINDLE__.reload.reason;
      __REKINDLE__.reload.requested = false;
      __REKINDLE__.reload.reason = "";
      console.warn("[rekindle] full reload: " + reason);
      import.meta.hot.invalidate();
    } else {
      console.debug("[rekindle] update absorbed");
    }
  });
}
"#;

/// Quote `s` as a source string literal (JSON escaping is valid JS).
pub fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// The bootstrap block prepended once per unit.
///
/// Both guards are environment-side: re-evaluating this unit, or
/// evaluating another rewritten unit, never re-initializes the runtime
/// state or redefines the entry points. The snapshot payload line is the
/// one per-unit piece and must stay on a single line.
pub fn bootstrap_snippet(unit_id: &str, snapshots_json: &str) -> String {
    let mut out = String::new();
    out.push_str(BOOTSTRAP_MARKER);
    out.push('\n');
    out.push_str(concat!(
        "if (!globalThis.__REKINDLE__) {\n",
        "  globalThis.__REKINDLE__ = {\n",
        "    records: new Map(),\n",
        "    snapshots: new Map(),\n",
        "    reload: { requested: false, reason: \"\" },\n",
        "  };\n",
        "}\n",
        "if (typeof globalThis.__rekindleDefine !== \"function\") {\n",
        "  globalThis.__rekindleDefine = (name, ctor, moduleId, deps) =>\n",
        "    __REKINDLE__.define(name, ctor, moduleId, deps || []);\n",
        "  globalThis.__rekindleFinalize = (name, moduleId) =>\n",
        "    __REKINDLE__.finalize(name, moduleId);\n",
        "}\n",
    ));
    out.push_str(SNAPSHOT_SET_PREFIX);
    out.push_str(&js_string(unit_id));
    out.push_str(", ");
    out.push_str(snapshots_json);
    out.push_str(");\n");
    out
}

/// An entry-point call expression (no trailing semicolon; the rewriter
/// replaces call spans in place and appends `;` only for inserted
/// statements).
pub fn define_call(name: &str, class_ident: &str, unit_id: &str, deps: &[String]) -> String {
    format!(
        "{}({}, {}, {}, [{}])",
        ENTRY_POINT,
        js_string(name),
        class_ident,
        js_string(unit_id),
        deps.join(", "),
    )
}

/// The inert comment left where a registration decorator used to be.
pub fn decorator_marker(name: &str) -> String {
    format!("/* rekindle:registered {} */", name)
}

/// The finalize block appended by the post-pass, one call per recovered
/// registration name.
pub fn finalize_block(entries: &[(String, String)]) -> String {
    let mut out = String::new();
    out.push_str(FINALIZE_MARKER);
    out.push('\n');
    for (name, unit_id) in entries {
        out.push_str(FINALIZE_POINT);
        out.push('(');
        out.push_str(&js_string(name));
        out.push_str(", ");
        out.push_str(&js_string(unit_id));
        out.push_str(");\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("x-counter"), "\"x-counter\"");
        assert_eq!(js_string("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn test_bootstrap_contains_guards_and_payload() {
        let snippet = bootstrap_snippet("src/counter.ts", "[]");
        assert!(snippet.starts_with(BOOTSTRAP_MARKER));
        assert!(snippet.contains("if (!globalThis.__REKINDLE__)"));
        assert!(snippet.contains("typeof globalThis.__rekindleDefine"));
        assert!(snippet.contains("__REKINDLE__.snapshots.set(\"src/counter.ts\", []);"));
    }

    #[test]
    fn test_define_call_shape() {
        let call = define_call("x-counter", "Counter", "src/counter.ts", &[]);
        assert_eq!(
            call,
            "__rekindleDefine(\"x-counter\", Counter, \"src/counter.ts\", [])"
        );
        let with_deps = define_call(
            "x-card",
            "Card",
            "src/card.ts",
            &["Avatar".to_string(), "Badge".to_string()],
        );
        assert!(with_deps.ends_with(", [Avatar, Badge])"));
    }

    #[test]
    fn test_finalize_block_one_call_per_name() {
        let block = finalize_block(&[
            ("x-a".to_string(), "u.ts".to_string()),
            ("x-b".to_string(), "u.ts".to_string()),
        ]);
        assert!(block.starts_with(FINALIZE_MARKER));
        assert_eq!(block.matches(FINALIZE_POINT).count(), 2);
        assert!(block.contains("__rekindleFinalize(\"x-a\", \"u.ts\");"));
    }
}
