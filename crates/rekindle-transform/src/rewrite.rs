//! Unit rewriting: span replacement and snippet injection.
//!
//! The rewriter consumes the matcher's output and produces the final text
//! delivered to the execution environment: registration sites rerouted
//! through the runtime entry point, a guarded bootstrap block up top, the
//! unit's snapshot payload, and the update-acceptance hook at the bottom.
//! It is a pure function of its input; the host pipeline owns all I/O.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use rekindle_core::scan::{line_number, read_ident};
use rekindle_core::snapshot::{encode_snapshots, PropertySnapshot};

use crate::emit;
use crate::error::TransformError;
use crate::options::TransformOptions;
use crate::patterns::{Match, Matcher};

/// One applied edit: an original span and the byte length of the text that
/// replaced it. An empty span is an insertion. The ordered list is the
/// source-map surface handed back to the host pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// Replaced span in the original text.
    pub span: Range<usize>,
    /// Byte length of the replacement.
    pub new_len: usize,
}

/// Result of rewriting one unit.
#[derive(Debug, Clone)]
pub enum RewriteOutcome {
    /// The unit has no relevant construct. The host pipeline should skip
    /// further hot-swap processing for it.
    Unchanged,
    /// The unit was rewritten.
    Rewritten {
        /// The full rewritten text.
        code: String,
        /// Ordered edits mapping original spans to replacement lengths.
        edits: Vec<Edit>,
        /// Human-readable notes: initializers that will not restore,
        /// payload encoding trouble.
        warnings: Vec<String>,
        /// Registration names this unit declares, in source order.
        names: Vec<String>,
    },
}

impl RewriteOutcome {
    /// True for [`RewriteOutcome::Unchanged`].
    pub fn is_unchanged(&self) -> bool {
        matches!(self, RewriteOutcome::Unchanged)
    }
}

/// Reusable rewriter: compile the patterns once, rewrite many units.
pub struct Transformer {
    matcher: Matcher,
}

impl Transformer {
    /// Build a transformer for `options`.
    pub fn new(options: TransformOptions) -> Result<Transformer, TransformError> {
        Ok(Transformer {
            matcher: Matcher::new(options)?,
        })
    }

    /// The options this transformer was built from.
    pub fn options(&self) -> &TransformOptions {
        self.matcher.options()
    }

    /// Rewrite one unit of source text. `unit_id` is the stable per-unit
    /// identifier (typically the project-relative path) forwarded to the
    /// runtime with every registration.
    pub fn rewrite_unit(&self, source: &str, unit_id: &str) -> RewriteOutcome {
        if !self.matcher.is_relevant(source) {
            return RewriteOutcome::Unchanged;
        }
        let matches = self.matcher.scan(source);
        if matches.is_empty() {
            return RewriteOutcome::Unchanged;
        }

        let deps = relative_import_idents(source);
        let mut warnings = Vec::new();
        let mut names = Vec::new();
        let mut snapshots = Vec::new();
        let mut replacements: Vec<(Range<usize>, String)> = Vec::new();

        for m in &matches {
            match m {
                Match::DefineCall {
                    span,
                    name,
                    class_ident,
                } => {
                    replacements.push((
                        span.clone(),
                        emit::define_call(name, class_ident, unit_id, &deps),
                    ));
                    push_unique(&mut names, name);
                }
                Match::DecoratorRegistration {
                    span,
                    name,
                    class_ident,
                    insert_at,
                } => {
                    replacements.push((span.clone(), emit::decorator_marker(name)));
                    replacements.push((
                        *insert_at..*insert_at,
                        format!(
                            "\n{};",
                            emit::define_call(name, class_ident, unit_id, &deps)
                        ),
                    ));
                    push_unique(&mut names, name);
                }
                Match::ReactiveField {
                    span,
                    field,
                    initializer,
                    ..
                } => {
                    let init_text = initializer.clone().map(|r| &source[r]);
                    let snap = PropertySnapshot::capture(field, init_text);
                    if init_text.is_some() && snap.value.is_none() {
                        let note = format!(
                            "line {}: initializer of `{}` is not a literal; its value will not restore after a patch",
                            line_number(source, span.start),
                            field
                        );
                        log::warn!("{}", note);
                        warnings.push(note);
                    }
                    snapshots.push(snap);
                }
            }
        }

        let payload = match encode_snapshots(&snapshots) {
            Ok(json) => json,
            Err(err) => {
                let note = format!("snapshot payload not encodable: {}", err);
                log::warn!("{}", note);
                warnings.push(note);
                "[]".to_string()
            }
        };
        replacements.push((0..0, emit::bootstrap_snippet(unit_id, &payload)));

        let tail = if source.ends_with('\n') { "" } else { "\n" };
        replacements.push((
            source.len()..source.len(),
            format!("{}{}", tail, emit::ACCEPT_SNIPPET),
        ));

        replacements.sort_by_key(|(span, _)| (span.start, span.end));
        let (code, edits) = apply_replacements(source, &replacements);
        RewriteOutcome::Rewritten {
            code,
            edits,
            warnings,
            names,
        }
    }
}

/// One-shot convenience over [`Transformer`] for hosts that rewrite a
/// single unit at a time.
pub fn rewrite_unit(
    source: &str,
    unit_id: &str,
    options: &TransformOptions,
) -> Result<RewriteOutcome, TransformError> {
    Ok(Transformer::new(options.clone())?.rewrite_unit(source, unit_id))
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

fn apply_replacements(source: &str, replacements: &[(Range<usize>, String)]) -> (String, Vec<Edit>) {
    let mut out = String::with_capacity(source.len() + 512);
    let mut edits = Vec::with_capacity(replacements.len());
    let mut cursor = 0;
    for (span, text) in replacements {
        if span.start < cursor || span.end > source.len() {
            // Overlapping or out-of-range spans would corrupt the output.
            log::warn!(
                "dropping out-of-order edit at {}..{}",
                span.start,
                span.end
            );
            continue;
        }
        out.push_str(&source[cursor..span.start]);
        out.push_str(text);
        edits.push(Edit {
            span: span.clone(),
            new_len: text.len(),
        });
        cursor = span.end;
    }
    out.push_str(&source[cursor..]);
    (out, edits)
}

static IMPORT_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*import\s+([^;'"]+?)\s+from\s*["']([^"']+)["']"#)
        .expect("import pattern compiles")
});

/// Local identifiers imported from relative (same-project) specifiers.
/// Forwarded to the runtime so it can correlate collaborating classes;
/// not required for correctness.
fn relative_import_idents(source: &str) -> Vec<String> {
    let mut out = Vec::new();
    for caps in IMPORT_CLAUSE.captures_iter(source) {
        let specifier = &caps[2];
        if !specifier.starts_with("./") && !specifier.starts_with("../") {
            continue;
        }
        for ident in clause_idents(&caps[1]) {
            push_unique(&mut out, &ident);
        }
    }
    out
}

fn clause_idents(clause: &str) -> Vec<String> {
    let mut out = Vec::new();
    for entry in clause.split(',') {
        let entry = entry
            .trim()
            .trim_matches(|c| c == '{' || c == '}')
            .trim();
        if entry.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = entry.split_whitespace().collect();
        // Type-only entries are erased at build time; naming them in the
        // emitted call would reference a binding that no longer exists.
        if tokens.first() == Some(&"type") {
            continue;
        }
        let local = match tokens.iter().position(|t| *t == "as") {
            Some(idx) => tokens.get(idx + 1).copied(),
            None if tokens.len() == 1 => Some(tokens[0]),
            None => None,
        };
        if let Some(tok) = local {
            if read_ident(tok, 0) == Some((tok, tok.len())) {
                out.push(tok.to_string());
            }
        }
    }
    out
}
