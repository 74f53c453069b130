//! Low-level source-text scanning.
//!
//! The transform's pattern matcher and the engine's class reader both walk
//! units of component source without parsing them. These primitives keep
//! that walking honest: strings, template literals, and comments are
//! skipped as opaque spans so that braces and statement terminators inside
//! them never confuse structural scanning.
//!
//! Known fragility: this is textual scanning, not a parser.
//! Regex literals (`/…/`) are not recognized, and pathological formatting
//! can defeat brace balancing. Callers treat a failed scan as "leave this
//! construct alone", never as an error.

/// True if `c` can start an identifier.
pub fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$'
}

/// True if `c` can continue an identifier.
pub fn is_ident_char(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

/// Read the identifier starting at `from`, returning it with its end offset.
pub fn read_ident(src: &str, from: usize) -> Option<(&str, usize)> {
    let bytes = src.as_bytes();
    if from >= bytes.len() || !is_ident_start(bytes[from]) {
        return None;
    }
    let mut end = from + 1;
    while end < bytes.len() && is_ident_char(bytes[end]) {
        end += 1;
    }
    Some((&src[from..end], end))
}

/// 1-based line number of byte offset `pos` (for warnings).
pub fn line_number(src: &str, pos: usize) -> usize {
    let upto = pos.min(src.len());
    1 + src.as_bytes()[..upto].iter().filter(|&&b| b == b'\n').count()
}

/// If `src[i]` opens an opaque span (string, template literal, or comment),
/// return the offset just past it. Line comments report the offset of the
/// terminating newline so callers still observe the line break.
pub fn skip_opaque(src: &str, i: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    match bytes.get(i)? {
        b'"' | b'\'' => Some(skip_quoted(bytes, i)),
        b'`' => skip_template(src, i),
        b'/' => match bytes.get(i + 1) {
            Some(b'/') => {
                let mut j = i + 2;
                while j < bytes.len() && bytes[j] != b'\n' {
                    j += 1;
                }
                Some(j)
            }
            Some(b'*') => {
                let mut j = i + 2;
                while j + 1 < bytes.len() {
                    if bytes[j] == b'*' && bytes[j + 1] == b'/' {
                        return Some(j + 2);
                    }
                    j += 1;
                }
                Some(bytes.len())
            }
            _ => None,
        },
        _ => None,
    }
}

/// Skip a single- or double-quoted string starting at `open`; returns the
/// offset just past the closing quote (or end of input if unterminated).
fn skip_quoted(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i, // unterminated on this line; stop at the break
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Skip a template literal starting at the backtick at `open`, including
/// any nested `${ … }` interpolations. Returns the offset just past the
/// closing backtick, or `None` if the template never closes.
fn skip_template(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return Some(i + 1),
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                let close = matching_brace(src, i + 1)?;
                i = close + 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// Offset just past the closing quote of the string starting at `open`,
/// or `None` when the string does not terminate before a line break.
pub fn quoted_end(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let quote = *bytes.get(open)?;
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            c if c == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Find the `}` matching the `{` at `open`, skipping strings, templates,
/// and comments. Returns `None` when `open` is not a `{` or the scan runs
/// off the end of the unit without returning to balance zero.
pub fn matching_brace(src: &str, open: usize) -> Option<usize> {
    matching_pair(src, open, b'{', b'}')
}

/// Find the `)` matching the `(` at `open`, with the same opaque-span
/// skipping as [`matching_brace`].
pub fn matching_paren(src: &str, open: usize) -> Option<usize> {
    matching_pair(src, open, b'(', b')')
}

/// Find the `]` matching the `[` at `open`, with the same opaque-span
/// skipping as [`matching_brace`].
pub fn matching_bracket(src: &str, open: usize) -> Option<usize> {
    matching_pair(src, open, b'[', b']')
}

fn matching_pair(src: &str, open: usize, open_ch: u8, close_ch: u8) -> Option<usize> {
    let bytes = src.as_bytes();
    if bytes.get(open) != Some(&open_ch) {
        return None;
    }
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        if let Some(next) = skip_opaque(src, i) {
            i = next.max(i + 1);
            continue;
        }
        let b = bytes[i];
        if b == open_ch {
            depth += 1;
        } else if b == close_ch {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Find where the expression starting at `from` ends: the offset of the
/// terminating `;`, a newline at bracket depth zero, or a closing bracket
/// that belongs to an enclosing scope. Nested `()`/`[]`/`{}` (and therefore
/// multi-line literals) are stepped over.
pub fn statement_end(src: &str, from: usize) -> usize {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut i = from;
    while i < bytes.len() {
        if let Some(next) = skip_opaque(src, i) {
            i = next.max(i + 1);
            continue;
        }
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                if depth == 0 {
                    return i;
                }
                depth -= 1;
            }
            b';' if depth == 0 => return i,
            b'\n' if depth == 0 => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// All string, template, and comment spans in `src`, ordered and
/// non-overlapping. Pattern hits inside these spans are not code.
pub fn opaque_spans(src: &str) -> Vec<std::ops::Range<usize>> {
    let mut spans = Vec::new();
    let mut i = 0;
    while i < src.len() {
        match skip_opaque(src, i) {
            Some(next) => {
                let end = next.max(i + 1);
                spans.push(i..end);
                i = end;
            }
            None => i += 1,
        }
    }
    spans
}

/// Advance past whitespace and comments starting at `from`.
pub fn skip_trivia(src: &str, from: usize) -> usize {
    let bytes = src.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if bytes[i] == b'/' {
            if let Some(next) = skip_opaque(src, i) {
                i = next.max(i + 1);
                continue;
            }
        }
        break;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_brace_plain() {
        let src = "{ a { b } c }";
        assert_eq!(matching_brace(src, 0), Some(src.len() - 1));
    }

    #[test]
    fn test_matching_brace_ignores_strings_and_comments() {
        let src = "{ \"}\" '}' // }\n /* } */ }";
        assert_eq!(matching_brace(src, 0), Some(src.len() - 1));
    }

    #[test]
    fn test_matching_brace_template_interpolation() {
        let src = "{ `a ${ {x: 1} } b` }";
        assert_eq!(matching_brace(src, 0), Some(src.len() - 1));
    }

    #[test]
    fn test_matching_brace_unbalanced() {
        assert_eq!(matching_brace("{ { }", 0), None);
        assert_eq!(matching_brace("no brace", 0), None);
    }

    #[test]
    fn test_matching_paren_nested_object_arg() {
        let src = "define('x', { a: (1), b: ')' })";
        assert_eq!(matching_paren(src, 6), Some(src.len() - 1));
    }

    #[test]
    fn test_matching_bracket_computed_key() {
        let src = "[Symbol.iterator]() {}";
        assert_eq!(matching_bracket(src, 0), Some(16));
    }

    #[test]
    fn test_quoted_end() {
        let src = "'a\\'b' rest";
        assert_eq!(quoted_end(src, 0), Some(6));
        assert_eq!(quoted_end("'open\n'", 0), None);
    }

    #[test]
    fn test_statement_end_semicolon() {
        let src = "42; rest";
        assert_eq!(statement_end(src, 0), 2);
    }

    #[test]
    fn test_statement_end_multiline_literal() {
        let src = "{\n a: 1,\n b: 2\n};";
        assert_eq!(statement_end(src, 0), src.len() - 1);
    }

    #[test]
    fn test_statement_end_newline() {
        let src = "1 + 2\nnext";
        assert_eq!(statement_end(src, 0), 5);
    }

    #[test]
    fn test_statement_end_enclosing_close() {
        // Initializer that runs up against the class body's closing brace.
        let src = "42 }";
        assert_eq!(statement_end(src, 0), 3);
    }

    #[test]
    fn test_opaque_spans() {
        let src = "a 'str' b // tail";
        let spans = opaque_spans(src);
        assert_eq!(spans, vec![2..7, 10..src.len()]);
    }

    #[test]
    fn test_read_ident() {
        assert_eq!(read_ident("$abc1 =", 0), Some(("$abc1", 5)));
        assert_eq!(read_ident("1abc", 0), None);
    }

    #[test]
    fn test_skip_trivia() {
        let src = "  // c\n /* b */ x";
        assert_eq!(skip_trivia(src, 0), src.len() - 1);
    }

    #[test]
    fn test_line_number() {
        let src = "a\nb\nc";
        assert_eq!(line_number(src, 0), 1);
        assert_eq!(line_number(src, 2), 2);
        assert_eq!(line_number(src, 4), 3);
    }
}
