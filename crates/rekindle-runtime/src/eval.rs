//! Evaluation of transformed units.
//!
//! This is not a general interpreter. It recognizes exactly what the
//! rewriter emits: the bootstrap marker, the per-unit snapshot payload
//! line, entry-point and finalize calls, plus class declarations (read
//! through the engine's class reader so each definition has a class to
//! carry). Everything else in the unit is inert text.
//!
//! Evaluation is forgiving end to end. A directive that does not parse,
//! or that names a class the unit never declares, is logged and skipped
//! so one bad construct cannot take down the session.

use std::ops::Range;
use std::rc::Rc;

use log::{debug, trace, warn};
use rustc_hash::FxHashMap;

use rekindle_core::scan::{
    is_ident_char, is_ident_start, line_number, matching_brace, matching_bracket, matching_paren,
    opaque_spans, quoted_end, read_ident, skip_opaque, skip_trivia,
};
use rekindle_core::snapshot::decode_snapshots;
use rekindle_core::{evaluate_literal, Value};
use rekindle_engine::{read_component_class, ComponentClass, ExecutionEnv};
use rekindle_transform::emit::{BOOTSTRAP_MARKER, ENTRY_POINT, FINALIZE_POINT, SNAPSHOT_SET_PREFIX};

/// Counts of what one evaluation applied to the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalSummary {
    /// True when this evaluation installed the runtime state. Only the
    /// first bootstrap marker an environment sees sets this.
    pub bootstrap_installed: bool,
    /// Class declarations the reader modeled.
    pub classes_read: usize,
    /// Entry-point calls applied.
    pub defines: usize,
    /// Finalize calls applied.
    pub finalizes: usize,
    /// Units whose snapshot payloads were stored, in evaluation order.
    pub snapshot_units: Vec<String>,
}

/// Evaluate one rewritten unit against `env`.
///
/// Classes are read in a first pass so a registration may precede its
/// class in the text; directives are then applied in source order.
pub fn evaluate_unit(env: &ExecutionEnv, code: &str) -> EvalSummary {
    let classes = read_classes(code);
    let mut summary = EvalSummary {
        classes_read: classes.len(),
        ..EvalSummary::default()
    };
    for (_, directive) in parse_directives(code) {
        match directive {
            Directive::Bootstrap => {
                if env.bootstrap() {
                    summary.bootstrap_installed = true;
                }
            }
            Directive::Snapshots { unit_id, payload } => match decode_snapshots(&payload) {
                Ok(snapshots) => {
                    env.set_unit_snapshots(&unit_id, snapshots);
                    summary.snapshot_units.push(unit_id);
                }
                Err(err) => warn!("snapshot payload for `{unit_id}` does not decode: {err}"),
            },
            Directive::Define {
                name,
                class_ident,
                unit_id,
                deps,
            } => match classes.get(&class_ident) {
                Some(class) => {
                    env.define(&name, Rc::clone(class), &unit_id, &deps);
                    summary.defines += 1;
                }
                None => warn!("definition of `{name}` names `{class_ident}`, which this unit does not declare"),
            },
            Directive::Finalize { name, unit_id } => {
                env.finalize_patch(&name, &unit_id);
                summary.finalizes += 1;
            }
        }
    }
    debug!(
        "evaluated unit: {} classes, {} defines, {} finalizes",
        summary.classes_read, summary.defines, summary.finalizes
    );
    summary
}

enum Directive {
    Bootstrap,
    Snapshots {
        unit_id: String,
        payload: String,
    },
    Define {
        name: String,
        class_ident: String,
        unit_id: String,
        deps: Vec<String>,
    },
    Finalize {
        name: String,
        unit_id: String,
    },
}

/// Every class declaration in the unit, keyed by identifier.
///
/// Top level only: `class` tokens inside brackets belong to expressions
/// or nested scopes the evaluator does not model. Declarations the
/// reader rejects (anonymous class expressions, mostly) are skipped
/// whole so their bodies are never rescanned.
fn read_classes(code: &str) -> FxHashMap<String, Rc<ComponentClass>> {
    let bytes = code.as_bytes();
    let mut classes = FxHashMap::default();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if let Some(next) = skip_opaque(code, i) {
            i = next.max(i + 1);
            continue;
        }
        match bytes[i] {
            b'(' | b'[' | b'{' => {
                depth += 1;
                i += 1;
            }
            b')' | b']' | b'}' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            b if is_ident_start(b) => {
                let Some((word, after)) = read_ident(code, i) else {
                    i += 1;
                    continue;
                };
                if word == "class" && depth == 0 && !preceded_by_member_access(code, i) {
                    if let Some(body_close) = class_extent(code, i) {
                        match read_component_class(&code[i..=body_close]) {
                            Ok(class) => {
                                trace!(
                                    "read class `{}` at line {}",
                                    class.ident,
                                    line_number(code, i)
                                );
                                classes.insert(class.ident.clone(), Rc::new(class));
                            }
                            Err(err) => {
                                trace!("skipping class at line {}: {err}", line_number(code, i))
                            }
                        }
                        i = body_close + 1;
                        continue;
                    }
                    warn!("class at line {} never closes its body", line_number(code, i));
                }
                i = after;
            }
            _ => i += 1,
        }
    }
    classes
}

/// Offset of the `}` closing the body of the class declaration whose
/// `class` keyword starts at `class_kw`. Heritage-clause brackets are
/// stepped over so a superclass expression cannot open the body early.
fn class_extent(code: &str, class_kw: usize) -> Option<usize> {
    let bytes = code.as_bytes();
    let mut depth = 0usize;
    let mut i = class_kw + "class".len();
    while i < bytes.len() {
        if let Some(next) = skip_opaque(code, i) {
            i = next.max(i + 1);
            continue;
        }
        match bytes[i] {
            b'{' if depth == 0 => return matching_brace(code, i),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.checked_sub(1)?,
            b';' if depth == 0 => return None,
            _ => {}
        }
        i += 1;
    }
    None
}

/// All directives in the unit, in source order.
fn parse_directives(code: &str) -> Vec<(usize, Directive)> {
    let spans = opaque_spans(code);
    let mut directives = Vec::new();

    for (pos, _) in code.match_indices(BOOTSTRAP_MARKER) {
        // The marker is itself a line comment, so a genuine one *starts*
        // its opaque span. A hit that merely falls inside one is quoted
        // or commented text.
        if spans.binary_search_by_key(&pos, |span| span.start).is_ok() {
            directives.push((pos, Directive::Bootstrap));
        }
    }

    for (pos, _) in code.match_indices(SNAPSHOT_SET_PREFIX) {
        if in_opaque(&spans, pos) || preceded_by_member_access(code, pos) {
            continue;
        }
        match parse_snapshot_args(code, pos + SNAPSHOT_SET_PREFIX.len()) {
            Some((unit_id, payload)) => {
                directives.push((pos, Directive::Snapshots { unit_id, payload }))
            }
            None => warn!(
                "malformed snapshot payload line at line {}",
                line_number(code, pos)
            ),
        }
    }

    for (pos, _) in code.match_indices(ENTRY_POINT) {
        let Some(open) = call_open(code, &spans, pos, ENTRY_POINT) else {
            continue;
        };
        match parse_define_args(code, open) {
            Some(directive) => directives.push((pos, directive)),
            None => warn!(
                "malformed {ENTRY_POINT} call at line {}",
                line_number(code, pos)
            ),
        }
    }

    for (pos, _) in code.match_indices(FINALIZE_POINT) {
        let Some(open) = call_open(code, &spans, pos, FINALIZE_POINT) else {
            continue;
        };
        match parse_finalize_args(code, open) {
            Some(directive) => directives.push((pos, directive)),
            None => warn!(
                "malformed {FINALIZE_POINT} call at line {}",
                line_number(code, pos)
            ),
        }
    }

    directives.sort_by_key(|(pos, _)| *pos);
    directives
}

/// Offset of the `(` for a standalone `name(...)` call at `pos`, or
/// `None` when the hit is quoted, a member access (the bootstrap block
/// references the entry points as `globalThis.` properties), part of a
/// longer identifier, or not a call at all.
fn call_open(code: &str, spans: &[Range<usize>], pos: usize, name: &str) -> Option<usize> {
    let bytes = code.as_bytes();
    if in_opaque(spans, pos) || preceded_by_member_access(code, pos) {
        return None;
    }
    let after = pos + name.len();
    if bytes.get(after).map_or(false, |&b| is_ident_char(b)) {
        return None;
    }
    let open = skip_trivia(code, after);
    if bytes.get(open) == Some(&b'(') {
        Some(open)
    } else {
        None
    }
}

fn preceded_by_member_access(code: &str, pos: usize) -> bool {
    pos > 0
        && match code.as_bytes()[pos - 1] {
            b'.' => true,
            b => is_ident_char(b),
        }
}

fn in_opaque(spans: &[Range<usize>], pos: usize) -> bool {
    let idx = spans.partition_point(|span| span.end <= pos);
    spans.get(idx).map_or(false, |span| span.start <= pos)
}

/// Arguments of a snapshot payload line: the quoted unit id and the raw
/// JSON array text, brackets included.
fn parse_snapshot_args(code: &str, from: usize) -> Option<(String, String)> {
    let bytes = code.as_bytes();
    let at = skip_trivia(code, from);
    let (unit_id, after) = parse_string_literal(code, at)?;
    let comma = skip_trivia(code, after);
    if bytes.get(comma) != Some(&b',') {
        return None;
    }
    let open = skip_trivia(code, comma + 1);
    if bytes.get(open) != Some(&b'[') {
        return None;
    }
    let close = matching_bracket(code, open)?;
    Some((unit_id, code[open..=close].to_string()))
}

fn parse_define_args(code: &str, open: usize) -> Option<Directive> {
    matching_paren(code, open)?;
    let at = skip_trivia(code, open + 1);
    let (name, after) = parse_string_literal(code, at)?;
    let at = next_argument(code, after)?;
    let (class_ident, after) = read_ident(code, at)?;
    let at = next_argument(code, after)?;
    let (unit_id, after) = parse_string_literal(code, at)?;
    let at = next_argument(code, after)?;
    if code.as_bytes().get(at) != Some(&b'[') {
        return None;
    }
    let close = matching_bracket(code, at)?;
    let deps = ident_list(&code[at + 1..close]);
    Some(Directive::Define {
        name,
        class_ident: class_ident.to_string(),
        unit_id,
        deps,
    })
}

fn parse_finalize_args(code: &str, open: usize) -> Option<Directive> {
    matching_paren(code, open)?;
    let at = skip_trivia(code, open + 1);
    let (name, after) = parse_string_literal(code, at)?;
    let at = next_argument(code, after)?;
    let (unit_id, _) = parse_string_literal(code, at)?;
    Some(Directive::Finalize { name, unit_id })
}

/// Step over the comma separating two arguments; returns the offset of
/// the next argument's first byte.
fn next_argument(code: &str, from: usize) -> Option<usize> {
    let comma = skip_trivia(code, from);
    if code.as_bytes().get(comma) != Some(&b',') {
        return None;
    }
    Some(skip_trivia(code, comma + 1))
}

fn parse_string_literal(code: &str, at: usize) -> Option<(String, usize)> {
    match code.as_bytes().get(at)? {
        b'"' | b'\'' => {
            let end = quoted_end(code, at)?;
            match evaluate_literal(&code[at..end]) {
                Ok(Value::Str(text)) => Some((text, end)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn ident_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
