//! Textual pattern matching over one unit of source.
//!
//! Matching is regular-expression seeded and refined with the shared
//! scanning primitives; it is not a parser. The contract is soundness of
//! what is matched, not completeness: unusual formatting, computed names,
//! or registration calls built at runtime are left alone. A construct the
//! scanner cannot finish (an unbalanced class body, a non-literal name)
//! is skipped with a log line rather than rewritten badly.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use rekindle_core::literal::evaluate_literal;
use rekindle_core::scan::{
    line_number, matching_brace, matching_paren, opaque_spans, quoted_end, read_ident,
    skip_opaque, skip_trivia, statement_end,
};
use rekindle_core::Value;

use crate::error::TransformError;
use crate::options::TransformOptions;

/// One matched construct. Transient: produced per rewrite pass, discarded
/// with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    /// A direct registration call binding a literal name to a class
    /// identifier.
    DefineCall {
        /// Span of the whole call expression, excluding any trailing `;`.
        span: Range<usize>,
        /// The registration name.
        name: String,
        /// The class identifier passed as the implementation.
        class_ident: String,
    },
    /// A registration decorator immediately preceding a class declaration.
    DecoratorRegistration {
        /// Span of the decorator text, `@` through its closing paren.
        span: Range<usize>,
        /// The registration name.
        name: String,
        /// Identifier of the decorated class.
        class_ident: String,
        /// Offset just past the class body's closing brace; the emitted
        /// registration call is inserted here.
        insert_at: usize,
    },
    /// A reactive-field declaration.
    ReactiveField {
        /// Span from the annotation through the end of the declaration.
        span: Range<usize>,
        /// Declared field name.
        field: String,
        /// Span of the initializer expression, when one is present.
        initializer: Option<Range<usize>>,
        /// True for the local-only state flavor, false for the observed
        /// property flavor.
        state_only: bool,
    },
}

impl Match {
    /// Start offset, used to keep matches in source order.
    pub fn start(&self) -> usize {
        match self {
            Match::DefineCall { span, .. } => span.start,
            Match::DecoratorRegistration { span, .. } => span.start,
            Match::ReactiveField { span, .. } => span.start,
        }
    }
}

static IMPORT_SPECIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^\s*(?:import|export)\b[^;]*?\bfrom\s*["']([^"']+)["']|^\s*import\s*["']([^"']+)["']"#,
    )
    .expect("import pattern compiles")
});

/// Compiled patterns for one [`TransformOptions`] set.
///
/// Construction escapes every configured name, so pattern compilation only
/// fails on a regex engine limit, never on user input shape.
pub struct Matcher {
    options: TransformOptions,
    define_call: Option<Regex>,
    decorator: Option<Regex>,
    field: Option<Regex>,
}

impl Matcher {
    /// Compile the patterns for `options`.
    pub fn new(options: TransformOptions) -> Result<Matcher, TransformError> {
        if options.is_empty() {
            return Err(TransformError::EmptyOptions);
        }
        let define_call = alternation(&options.define_callees, dotted_callee)
            .map(|alts| Regex::new(&format!(r"\b(?:{})\s*\(", alts)))
            .transpose()?;
        let decorator = alternation(&options.element_decorators, |s| regex::escape(s))
            .map(|alts| Regex::new(&format!(r"@\s*(?:{})\s*\(", alts)))
            .transpose()?;
        let field_names: Vec<String> = options
            .property_decorators
            .iter()
            .chain(options.state_decorators.iter())
            .cloned()
            .collect();
        let field = alternation(&field_names, |s| regex::escape(s))
            .map(|alts| Regex::new(&format!(r"@\s*({})\b", alts)))
            .transpose()?;
        Ok(Matcher {
            options,
            define_call,
            decorator,
            field,
        })
    }

    /// The options this matcher was compiled from.
    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Cheap necessary-but-not-sufficient pre-filter: a unit with no
    /// registration construct and no framework import is not worth
    /// scanning.
    pub fn is_relevant(&self, src: &str) -> bool {
        if self.define_call.as_ref().is_some_and(|re| re.is_match(src)) {
            return true;
        }
        if self.decorator.as_ref().is_some_and(|re| re.is_match(src)) {
            return true;
        }
        IMPORT_SPECIFIER.captures_iter(src).any(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .is_some_and(|spec| self.options.is_framework_specifier(spec.as_str()))
        })
    }

    /// Produce every match in the unit, in source order.
    pub fn scan(&self, src: &str) -> Vec<Match> {
        let opaque = opaque_spans(src);
        let mut matches = Vec::new();
        if let Some(re) = &self.define_call {
            self.scan_define_calls(src, re, &opaque, &mut matches);
        }
        if let Some(re) = &self.decorator {
            self.scan_decorators(src, re, &opaque, &mut matches);
        }
        if let Some(re) = &self.field {
            self.scan_fields(src, re, &opaque, &mut matches);
        }
        matches.sort_by_key(Match::start);
        matches
    }

    fn scan_define_calls(
        &self,
        src: &str,
        re: &Regex,
        opaque: &[Range<usize>],
        out: &mut Vec<Match>,
    ) {
        for m in re.find_iter(src) {
            if in_opaque(opaque, m.start()) {
                continue;
            }
            // A dot before the callee means a member chain the configured
            // spellings do not cover; leave it alone.
            if m.start() > 0 && src.as_bytes()[m.start() - 1] == b'.' {
                continue;
            }
            let open = m.end() - 1;
            let Some(close) = matching_paren(src, open) else {
                log::warn!(
                    "line {}: registration call never closes, leaving it alone",
                    line_number(src, m.start())
                );
                continue;
            };
            let Some((name, after_name)) = quoted_literal(src, open + 1) else {
                log::debug!(
                    "line {}: registration call without a literal name, leaving it alone",
                    line_number(src, m.start())
                );
                continue;
            };
            let mut cur = skip_trivia(src, after_name);
            if src.as_bytes().get(cur) != Some(&b',') {
                continue;
            }
            cur = skip_trivia(src, cur + 1);
            let Some((ident, after_ident)) = read_ident(src, cur) else {
                log::debug!(
                    "line {}: registration of `{}` does not pass a bare class identifier",
                    line_number(src, m.start()),
                    name
                );
                continue;
            };
            let rest = skip_trivia(src, after_ident);
            if !matches!(src.as_bytes().get(rest), Some(b',') | Some(b')')) {
                continue;
            }
            out.push(Match::DefineCall {
                span: m.start()..close + 1,
                name,
                class_ident: ident.to_string(),
            });
        }
    }

    fn scan_decorators(
        &self,
        src: &str,
        re: &Regex,
        opaque: &[Range<usize>],
        out: &mut Vec<Match>,
    ) {
        for m in re.find_iter(src) {
            if in_opaque(opaque, m.start()) {
                continue;
            }
            let open = m.end() - 1;
            let Some(close) = matching_paren(src, open) else {
                log::warn!(
                    "line {}: registration decorator never closes, leaving it alone",
                    line_number(src, m.start())
                );
                continue;
            };
            let Some((name, _)) = quoted_literal(src, open + 1) else {
                log::debug!(
                    "line {}: registration decorator without a literal name, leaving it alone",
                    line_number(src, m.start())
                );
                continue;
            };
            let Some((class_ident, insert_at)) = decorated_class(src, close + 1) else {
                log::warn!(
                    "line {}: could not locate the class body for `{}`, leaving its registration alone",
                    line_number(src, m.start()),
                    name
                );
                continue;
            };
            out.push(Match::DecoratorRegistration {
                span: m.start()..close + 1,
                name,
                class_ident,
                insert_at,
            });
        }
    }

    fn scan_fields(&self, src: &str, re: &Regex, opaque: &[Range<usize>], out: &mut Vec<Match>) {
        let bytes = src.as_bytes();
        for caps in re.captures_iter(src) {
            let m = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            if in_opaque(opaque, m.start()) {
                continue;
            }
            let deco = &caps[1];
            let state_only = self.options.state_decorators.iter().any(|d| d == deco);
            let mut cur = skip_trivia(src, m.end());
            if bytes.get(cur) == Some(&b'(') {
                let Some(close) = matching_paren(src, cur) else {
                    log::warn!(
                        "line {}: field annotation never closes, skipping",
                        line_number(src, m.start())
                    );
                    continue;
                };
                cur = skip_trivia(src, close + 1);
            }
            while let Some((word, end)) = read_ident(src, cur) {
                if FIELD_QUALIFIERS.contains(&word) {
                    cur = skip_trivia(src, end);
                } else {
                    break;
                }
            }
            let Some((field, after_field)) = read_ident(src, cur) else {
                log::debug!(
                    "line {}: annotated field without a plain name, skipping",
                    line_number(src, m.start())
                );
                continue;
            };
            let field = field.to_string();
            cur = after_field;
            // TS optional / definite-assignment markers
            if matches!(bytes.get(cur), Some(b'?') | Some(b'!')) {
                cur += 1;
            }
            let (initializer, decl_end) = find_initializer(src, cur);
            out.push(Match::ReactiveField {
                span: m.start()..decl_end,
                field,
                initializer,
                state_only,
            });
        }
    }
}

const FIELD_QUALIFIERS: [&str; 7] = [
    "public",
    "private",
    "protected",
    "readonly",
    "declare",
    "override",
    "accessor",
];

fn alternation<F>(names: &[String], mut each: F) -> Option<String>
where
    F: FnMut(&str) -> String,
{
    if names.is_empty() {
        return None;
    }
    // Longest first so dotted prefixes do not shadow fuller spellings.
    let mut parts: Vec<String> = names.iter().map(|n| each(n)).collect();
    parts.sort_by_key(|p| std::cmp::Reverse(p.len()));
    Some(parts.join("|"))
}

fn dotted_callee(path: &str) -> String {
    path.split('.')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s*\.\s*")
}

fn in_opaque(spans: &[Range<usize>], pos: usize) -> bool {
    let idx = spans.partition_point(|r| r.end <= pos);
    spans.get(idx).is_some_and(|r| r.start <= pos)
}

/// Read the string literal starting at or after `from`; returns its decoded
/// text plus the offset just past the closing quote.
fn quoted_literal(src: &str, from: usize) -> Option<(String, usize)> {
    let at = skip_trivia(src, from);
    let quote = *src.as_bytes().get(at)?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let end = quoted_end(src, at)?;
    match evaluate_literal(&src[at..end]) {
        Ok(Value::Str(text)) => Some((text, end)),
        _ => None,
    }
}

/// Walk from the end of a registration decorator to the class declaration
/// it annotates, over any further decorators and modifier keywords.
/// Returns the class identifier and the offset just past the class body.
fn decorated_class(src: &str, from: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    let mut cur = skip_trivia(src, from);
    while bytes.get(cur) == Some(&b'@') {
        let (_, end) = read_ident(src, cur + 1)?;
        cur = skip_trivia(src, end);
        if bytes.get(cur) == Some(&b'(') {
            cur = matching_paren(src, cur)? + 1;
        }
        cur = skip_trivia(src, cur);
    }
    loop {
        let (word, end) = read_ident(src, cur)?;
        cur = skip_trivia(src, end);
        match word {
            "export" | "default" | "abstract" => {}
            "class" => break,
            _ => return None,
        }
    }
    let (ident, end) = read_ident(src, cur)?;
    if ident == "extends" || ident == "implements" {
        // Anonymous class; there is no identifier to re-register with.
        return None;
    }
    let ident = ident.to_string();

    // Run to the body's opening brace, stepping over a heritage clause
    // that may itself contain parenthesized mixin arguments.
    let mut depth = 0usize;
    let mut i = skip_trivia(src, end);
    let body_open = loop {
        if i >= bytes.len() {
            return None;
        }
        if let Some(next) = skip_opaque(src, i) {
            i = next.max(i + 1);
            continue;
        }
        match bytes[i] {
            b'{' if depth == 0 => break i,
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.checked_sub(1)?,
            b';' if depth == 0 => return None,
            _ => {}
        }
        i += 1;
    };
    let body_close = matching_brace(src, body_open)?;
    Some((ident, body_close + 1))
}

/// Locate a field declaration's initializer after its name/type, plus the
/// end of the whole declaration.
fn find_initializer(src: &str, from: usize) -> (Option<Range<usize>>, usize) {
    let bytes = src.as_bytes();
    let end = statement_end(src, from);
    let mut depth = 0usize;
    let mut i = from;
    while i < end {
        if let Some(next) = skip_opaque(src, i) {
            i = next.max(i + 1);
            continue;
        }
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'=' if depth == 0 => {
                // Not the `=` of `=>`, `==`, `<=`, `>=`, or `!=`.
                if bytes.get(i + 1) == Some(&b'>') || bytes.get(i + 1) == Some(&b'=') {
                    i += 2;
                    continue;
                }
                if i > from && matches!(bytes[i - 1], b'!' | b'<' | b'>' | b'=') {
                    i += 1;
                    continue;
                }
                let init_start = skip_trivia(src, i + 1);
                if init_start >= end {
                    return (None, end);
                }
                return (Some(init_start..end), end);
            }
            _ => {}
        }
        i += 1;
    }
    (None, end)
}
