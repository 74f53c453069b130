//! Pattern-based class reader.
//!
//! Builds a [`ComponentClass`] from one class declaration's source text the
//! same way the rest of the system treats component source: by scanning, not
//! parsing. The reader recognizes the member shapes component classes
//! actually use (methods, getter/setter pairs, fields, `static properties`,
//! `static observedAttributes` as a field or a getter, `static styles`) and
//! skips what it cannot model, logging at trace level.
//!
//! Reactive fields declared through decorators surface in the finished class
//! the way the rendering framework leaves them after finalization: as
//! accessor pairs on the prototype. Private (`#name`) members and computed
//! keys that are neither string literals nor `Symbol.*` expressions are
//! read past but never recorded.

use log::{debug, trace};

use rekindle_core::evaluate_literal;
use rekindle_core::scan::{
    is_ident_char, is_ident_start, line_number, matching_brace, matching_bracket, matching_paren,
    quoted_end, read_ident, skip_opaque, skip_trivia, statement_end,
};
use rekindle_core::Value;

use crate::class::{ComponentClass, Descriptor, PropertyEntry, PropertyKey};
use crate::error::ReaderError;

/// Decorator names that mark a field as reactive.
const REACTIVE_DECORATORS: &[&str] = &["property", "state", "internalProperty"];

/// Modifiers that may precede a member name.
const MEMBER_MODIFIERS: &[&str] = &[
    "static",
    "async",
    "get",
    "set",
    "public",
    "private",
    "protected",
    "readonly",
    "override",
    "accessor",
    "declare",
];

/// Reads one class declaration into the engine's structural model.
///
/// `source` is the declaration text, optionally preceded by decorators and
/// `export`/`default`/`abstract` keywords. Trailing text after the class
/// body is ignored.
pub fn read_component_class(source: &str) -> Result<ComponentClass, ReaderError> {
    let bytes = source.as_bytes();
    let mut cur = skip_trivia(source, 0);

    // Leading decorators and declaration keywords, in any order.
    loop {
        if bytes.get(cur) == Some(&b'@') {
            cur = skip_trivia(source, cur + 1);
            let Some((_, after)) = read_ident(source, cur) else {
                return Err(ReaderError::NoClass);
            };
            cur = skip_trivia(source, after);
            if bytes.get(cur) == Some(&b'(') {
                let close = matching_paren(source, cur).ok_or(ReaderError::NoClass)?;
                cur = skip_trivia(source, close + 1);
            }
            continue;
        }
        let Some((word, after)) = read_ident(source, cur) else {
            return Err(ReaderError::NoClass);
        };
        match word {
            "export" | "default" | "abstract" => cur = skip_trivia(source, after),
            "class" => {
                cur = skip_trivia(source, after);
                break;
            }
            _ => return Err(ReaderError::NoClass),
        }
    }

    let ident = match read_ident(source, cur) {
        Some((name, after)) if name != "extends" && name != "implements" => {
            cur = skip_trivia(source, after);
            name.to_string()
        }
        _ => return Err(ReaderError::Anonymous),
    };

    // Heritage clause: everything between `extends` and the body brace, with
    // any `implements` list cut off.
    let mut superclass: Option<String> = None;
    if let Some(("extends", after)) = read_ident(source, cur) {
        let start = skip_trivia(source, after);
        let mut i = start;
        let mut depth = 0usize;
        let mut heritage_end: Option<usize> = None;
        while i < bytes.len() {
            if let Some(next) = skip_opaque(source, i) {
                i = next.max(i + 1);
                continue;
            }
            match bytes[i] {
                b'{' if depth == 0 => break,
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b';' if depth == 0 => return Err(ReaderError::UnbalancedBody(ident)),
                b => {
                    if depth == 0
                        && heritage_end.is_none()
                        && is_ident_start(b)
                        && (i == start || !is_ident_char(bytes[i - 1]))
                    {
                        if let Some(("implements", after_kw)) = read_ident(source, i) {
                            heritage_end = Some(i);
                            i = after_kw;
                            continue;
                        }
                    }
                }
            }
            i += 1;
        }
        if i >= bytes.len() {
            return Err(ReaderError::UnbalancedBody(ident));
        }
        let text = source[start..heritage_end.unwrap_or(i)].trim();
        if !text.is_empty() {
            superclass = Some(text.to_string());
        }
        cur = i;
    }

    if bytes.get(cur) != Some(&b'{') {
        return Err(ReaderError::UnbalancedBody(ident));
    }
    let body_close = match matching_brace(source, cur) {
        Some(close) => close,
        None => return Err(ReaderError::UnbalancedBody(ident)),
    };

    let mut constructor_body: Option<String> = None;
    let mut prototype: Vec<PropertyEntry> = Vec::new();
    let mut statics: Vec<PropertyEntry> = Vec::new();
    let mut reactive: Vec<String> = Vec::new();
    let mut observed: Vec<String> = Vec::new();
    let mut styles: Option<String> = None;

    cur += 1;
    while cur < body_close {
        cur = skip_trivia(source, cur);
        if cur >= body_close {
            break;
        }
        if bytes[cur] == b';' || bytes[cur] == b',' {
            cur += 1;
            continue;
        }

        // Decorators ahead of the member.
        let mut decorators: Vec<&str> = Vec::new();
        while bytes.get(cur) == Some(&b'@') {
            let at = cur;
            cur = skip_trivia(source, cur + 1);
            match read_ident(source, cur) {
                Some((name, after)) => {
                    decorators.push(name);
                    cur = skip_trivia(source, after);
                    if bytes.get(cur) == Some(&b'(') {
                        match matching_paren(source, cur) {
                            Some(close) => cur = skip_trivia(source, close + 1),
                            None => return Err(ReaderError::UnbalancedBody(ident)),
                        }
                    }
                }
                None => {
                    trace!(
                        "stray `@` in class `{ident}` at line {}",
                        line_number(source, at)
                    );
                    cur = at + 1;
                    break;
                }
            }
        }

        // Modifiers. A modifier only counts when a member name still
        // follows; `get(…)` is a method named get.
        let mut is_static = false;
        let mut kind_get = false;
        let mut kind_set = false;
        loop {
            cur = skip_trivia(source, cur);
            let Some((word, after)) = read_ident(source, cur) else {
                break;
            };
            let next = skip_trivia(source, after);
            let shape = bytes.get(next);
            let still_a_name = !matches!(
                shape,
                Some(b'(') | Some(b'=') | Some(b';') | Some(b':') | Some(b'?') | Some(b'!')
                    | Some(b'<') | Some(b'}')
            );
            if !(still_a_name && MEMBER_MODIFIERS.contains(&word)) {
                break;
            }
            match word {
                "static" => is_static = true,
                "get" => kind_get = true,
                "set" => kind_set = true,
                _ => {}
            }
            cur = next;
        }
        if bytes.get(cur) == Some(&b'*') {
            cur = skip_trivia(source, cur + 1);
        }
        if cur >= body_close {
            break;
        }

        // Member name.
        let parsed = match bytes[cur] {
            b'#' => read_ident(source, cur + 1)
                .map(|(name, end)| (PropertyKey::String(format!("#{name}")), end)),
            b'"' | b'\'' => quoted_end(source, cur).map(|end| {
                let text = &source[cur..end];
                let name = match evaluate_literal(text) {
                    Ok(Value::Str(s)) => s,
                    _ => text.trim_matches(|c| c == '"' || c == '\'').to_string(),
                };
                (PropertyKey::String(name), end)
            }),
            b'[' => matching_bracket(source, cur).map(|close| {
                let inner = source[cur + 1..close].trim();
                let key = match evaluate_literal(inner) {
                    Ok(Value::Str(s)) => PropertyKey::String(s),
                    _ => PropertyKey::Symbol(inner.to_string()),
                };
                (key, close + 1)
            }),
            _ => read_ident(source, cur).map(|(name, end)| (PropertyKey::String(name.to_string()), end)),
        };
        let Some((key, after_key)) = parsed else {
            trace!(
                "unreadable member in class `{ident}` at line {}",
                line_number(source, cur)
            );
            let end = statement_end(source, cur).min(body_close);
            // Always at least one byte forward, or junk would pin the scan.
            cur = if bytes.get(end) == Some(&b';') { end + 1 } else { end.max(cur + 1) };
            continue;
        };
        cur = skip_trivia(source, after_key);

        // Optional/definite-assignment markers, then generic parameters.
        while matches!(bytes.get(cur), Some(b'?') | Some(b'!')) {
            cur = skip_trivia(source, cur + 1);
        }
        if bytes.get(cur) == Some(&b'<') {
            let mut depth = 0usize;
            let mut i = cur;
            while i < body_close {
                if let Some(next) = skip_opaque(source, i) {
                    i = next.max(i + 1);
                    continue;
                }
                match bytes[i] {
                    b'<' => depth += 1,
                    b'>' => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            i += 1;
                            break;
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            cur = skip_trivia(source, i);
        }

        match bytes.get(cur) {
            Some(b'(') => {
                let params_close = match matching_paren(source, cur) {
                    Some(close) => close,
                    None => return Err(ReaderError::UnbalancedBody(ident)),
                };
                let params = source[cur + 1..params_close].trim().to_string();

                // Step over a return-type annotation to the body brace.
                let mut i = skip_trivia(source, params_close + 1);
                if bytes.get(i) == Some(&b':') {
                    i += 1;
                    let mut depth = 0usize;
                    while i < body_close {
                        if let Some(next) = skip_opaque(source, i) {
                            i = next.max(i + 1);
                            continue;
                        }
                        match bytes[i] {
                            b'(' | b'[' => depth += 1,
                            b')' | b']' => depth = depth.saturating_sub(1),
                            b'{' | b';' if depth == 0 => break,
                            _ => {}
                        }
                        i += 1;
                    }
                }
                if bytes.get(i) != Some(&b'{') {
                    // Signature without a body (overload or abstract member).
                    trace!("bodyless member `{key}` in class `{ident}`");
                    cur = if bytes.get(i) == Some(&b';') { i + 1 } else { i };
                    continue;
                }
                let close = match matching_brace(source, i) {
                    Some(close) => close,
                    None => return Err(ReaderError::UnbalancedBody(ident)),
                };
                let body = source[i + 1..close].trim().to_string();
                cur = close + 1;

                if !modeled_key(&key) {
                    trace!("skipping member `{key}` of class `{ident}`");
                    continue;
                }
                if !is_static && !kind_get && !kind_set && key.as_str() == Some("constructor") {
                    constructor_body = Some(body);
                    continue;
                }
                if kind_get || kind_set {
                    if is_static && kind_get {
                        match key.as_str() {
                            Some("observedAttributes") => {
                                let names = returned_expression(&body)
                                    .and_then(|expr| evaluate_literal(expr).ok())
                                    .and_then(|value| literal_string_list(&value));
                                match names {
                                    Some(names) => observed = names,
                                    None => debug!(
                                        "observedAttributes getter of `{ident}` does not return a string array literal"
                                    ),
                                }
                            }
                            Some("properties") => {
                                if let Some(expr) = returned_expression(&body) {
                                    for name in object_literal_keys(expr) {
                                        push_unique(&mut reactive, &name);
                                    }
                                }
                            }
                            Some("styles") => {
                                styles = returned_expression(&body).map(str::to_string);
                            }
                            _ => {}
                        }
                    }
                    let table = if is_static { &mut statics } else { &mut prototype };
                    upsert(
                        table,
                        PropertyEntry {
                            key,
                            descriptor: Descriptor::Accessor {
                                getter: kind_get.then(|| body.clone()),
                                setter: kind_set.then(|| body.clone()),
                            },
                            configurable: true,
                        },
                    );
                } else {
                    let table = if is_static { &mut statics } else { &mut prototype };
                    upsert(table, PropertyEntry { key, descriptor: Descriptor::Method { params, body }, configurable: true });
                }
            }
            Some(b'=') | Some(b':') => {
                // Field, possibly with a type annotation before the `=`.
                let stmt_end = statement_end(source, cur).min(body_close);
                let mut init: Option<&str> = None;
                let mut i = cur;
                if bytes[i] == b':' {
                    i += 1;
                    let mut depth = 0usize;
                    while i < stmt_end {
                        if let Some(next) = skip_opaque(source, i) {
                            i = next.max(i + 1);
                            continue;
                        }
                        match bytes[i] {
                            b'(' | b'[' | b'{' => depth += 1,
                            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                            b'=' if depth == 0 => {
                                if bytes.get(i + 1) == Some(&b'>') || bytes.get(i + 1) == Some(&b'=') {
                                    i += 2;
                                    continue;
                                }
                                break;
                            }
                            _ => {}
                        }
                        i += 1;
                    }
                }
                if bytes.get(i) == Some(&b'=') {
                    let text = source[i + 1..stmt_end].trim();
                    if !text.is_empty() {
                        init = Some(text);
                    }
                }
                cur = if bytes.get(stmt_end) == Some(&b';') { stmt_end + 1 } else { stmt_end };

                if !modeled_key(&key) {
                    trace!("skipping member `{key}` of class `{ident}`");
                    continue;
                }
                record_field(
                    &key,
                    init,
                    is_static,
                    &decorators,
                    &mut statics,
                    &mut reactive,
                    &mut observed,
                    &mut styles,
                    &ident,
                );
            }
            Some(b';') => {
                cur += 1;
                if modeled_key(&key) {
                    record_field(
                        &key, None, is_static, &decorators, &mut statics, &mut reactive,
                        &mut observed, &mut styles, &ident,
                    );
                }
            }
            _ => {
                // Bare declaration ended by a newline or the body brace; the
                // cursor already sits on the next member.
                if modeled_key(&key) {
                    record_field(
                        &key, None, is_static, &decorators, &mut statics, &mut reactive,
                        &mut observed, &mut styles, &ident,
                    );
                }
            }
        }
    }

    // Reactive fields end up as framework-defined accessor pairs on the
    // prototype; the bodies live in the framework, not the class text.
    for name in &reactive {
        let present = prototype.iter().any(|entry| entry.key.as_str() == Some(name));
        if !present {
            prototype.push(PropertyEntry {
                key: PropertyKey::String(name.clone()),
                descriptor: Descriptor::Accessor { getter: None, setter: None },
                configurable: true,
            });
        }
    }

    Ok(ComponentClass::from_parts(
        ident,
        superclass,
        source.trim().to_string(),
        constructor_body,
        prototype,
        statics,
        reactive,
        observed,
        styles,
    ))
}

/// Whether the engine records this key at all.
fn modeled_key(key: &PropertyKey) -> bool {
    match key {
        PropertyKey::String(name) => !name.starts_with('#'),
        PropertyKey::Symbol(text) => text.starts_with("Symbol"),
    }
}

#[allow(clippy::too_many_arguments)]
fn record_field(
    key: &PropertyKey,
    init: Option<&str>,
    is_static: bool,
    decorators: &[&str],
    statics: &mut Vec<PropertyEntry>,
    reactive: &mut Vec<String>,
    observed: &mut Vec<String>,
    styles: &mut Option<String>,
    class_ident: &str,
) {
    if !is_static {
        if decorators.iter().any(|d| REACTIVE_DECORATORS.contains(d)) {
            if let PropertyKey::String(name) = key {
                push_unique(reactive, name);
            }
        }
        // Plain instance fields initialize per construction; they have no
        // slot on the prototype.
        return;
    }

    let source_text = init.unwrap_or("").to_string();
    let value = match init {
        Some(text) => evaluate_literal(text).ok(),
        None => Some(Value::Undefined),
    };

    match key.as_str() {
        Some("properties") => {
            if let Some(text) = init {
                for name in object_literal_keys(text) {
                    push_unique(reactive, &name);
                }
            }
        }
        Some("observedAttributes") => match init.map(evaluate_literal) {
            Some(Ok(ref list)) => match literal_string_list(list) {
                Some(names) => *observed = names,
                None => debug!("observedAttributes of `{class_ident}` is not a string array"),
            },
            _ => debug!("observedAttributes of `{class_ident}` is not an array literal"),
        },
        Some("styles") => {
            *styles = init.map(str::to_string);
        }
        _ => {}
    }

    upsert(
        statics,
        PropertyEntry {
            key: key.clone(),
            descriptor: Descriptor::Data { source: source_text, value },
            configurable: true,
        },
    );
}

fn literal_string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::List(items) => items
            .iter()
            .map(|item| match item {
                Value::Str(s) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

/// The expression a single-`return` getter body yields, when it has one.
fn returned_expression(body: &str) -> Option<&str> {
    let start = skip_trivia(body, 0);
    let (word, after) = read_ident(body, start)?;
    if word != "return" {
        return None;
    }
    let expr_start = skip_trivia(body, after);
    let end = statement_end(body, expr_start);
    let text = body[expr_start..end].trim();
    (!text.is_empty()).then_some(text)
}

/// Keys of an object-literal expression, shorthand included. Values are
/// stepped over without evaluation; computed keys and spreads record
/// nothing.
fn object_literal_keys(src: &str) -> Vec<String> {
    let bytes = src.as_bytes();
    let open = skip_trivia(src, 0);
    if bytes.get(open) != Some(&b'{') {
        return Vec::new();
    }
    let Some(close) = matching_brace(src, open) else {
        return Vec::new();
    };
    let mut keys = Vec::new();
    let mut i = open + 1;
    while i < close {
        i = skip_trivia(src, i);
        if i >= close {
            break;
        }
        match bytes[i] {
            b'"' | b'\'' => match quoted_end(src, i) {
                Some(end) => {
                    if let Ok(Value::Str(name)) = evaluate_literal(&src[i..end]) {
                        keys.push(name);
                    }
                    i = end;
                }
                None => break,
            },
            b'[' => {
                i = matching_bracket(src, i).map(|end| end + 1).unwrap_or(close);
            }
            _ => match read_ident(src, i) {
                Some((name, end)) => {
                    keys.push(name.to_string());
                    i = end;
                }
                None => i += 1,
            },
        }
        // Step over the value to the comma at this nesting level.
        let mut depth = 0usize;
        while i < close {
            if let Some(next) = skip_opaque(src, i) {
                i = next.max(i + 1);
                continue;
            }
            match bytes[i] {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => {
                    i += 1;
                    break;
                }
                _ => {}
            }
            i += 1;
        }
    }
    keys
}

fn upsert(table: &mut Vec<PropertyEntry>, entry: PropertyEntry) {
    let Some(existing) = table.iter_mut().find(|e| e.key == entry.key) else {
        table.push(entry);
        return;
    };
    match (&mut existing.descriptor, entry.descriptor) {
        (
            Descriptor::Accessor { getter, setter },
            Descriptor::Accessor { getter: new_getter, setter: new_setter },
        ) => {
            if new_getter.is_some() {
                *getter = new_getter;
            }
            if new_setter.is_some() {
                *setter = new_setter;
            }
        }
        (slot, descriptor) => *slot = descriptor,
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|existing| existing == name) {
        list.push(name.to_string());
    }
}
