//! Restricted literal evaluation.
//!
//! Reactive-field initializers are captured at rewrite time so that patched
//! instances can be reset to their declared initial values. The capture is
//! deliberately not an expression evaluator: only the safe literal subset is
//! accepted (numbers, strings, booleans, `null`, `undefined`, bigint
//! literals, and arrays/objects built from those). Anything else yields a
//! [`LiteralError`]; callers record the snapshot with an absent value and
//! keep going.

use crate::scan::{is_ident_char, is_ident_start, read_ident, skip_trivia};
use crate::value::{Value, ValueKind};

/// Why an initializer could not be captured as a literal value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiteralError {
    /// The initializer ended before a complete value was read.
    #[error("initializer ended unexpectedly")]
    UnexpectedEnd,

    /// The initializer is not in the supported literal subset.
    #[error("unsupported initializer expression near offset {offset}")]
    Unsupported {
        /// Byte offset of the offending token.
        offset: usize,
    },

    /// A numeric literal that could not be read.
    #[error("malformed number at offset {offset}")]
    BadNumber {
        /// Byte offset of the number.
        offset: usize,
    },

    /// A string or template literal that never closes.
    #[error("unterminated string literal at offset {offset}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        offset: usize,
    },

    /// Extra tokens after a complete literal value.
    #[error("trailing input after literal at offset {offset}")]
    TrailingInput {
        /// Byte offset of the first extra token.
        offset: usize,
    },
}

/// Evaluate initializer text as a restricted literal.
pub fn evaluate_literal(src: &str) -> Result<Value, LiteralError> {
    let mut parser = LiteralParser { src, pos: 0 };
    let value = parser.parse_value()?;
    parser.pos = skip_trivia(parser.src, parser.pos);
    if parser.pos < parser.src.trim_end().len() {
        return Err(LiteralError::TrailingInput { offset: parser.pos });
    }
    Ok(value)
}

/// Classify initializer text by its syntactic shape without evaluating it.
///
/// This is what gives snapshots a kind tag even when the value itself is
/// outside the literal subset (functions, symbols, constructor calls).
pub fn classify_literal(src: &str) -> ValueKind {
    let start = skip_trivia(src, 0);
    let bytes = src.as_bytes();
    let Some(&first) = bytes.get(start) else {
        return ValueKind::Undefined;
    };

    match first {
        b'"' | b'\'' | b'`' => ValueKind::String,
        b'[' | b'{' => ValueKind::Object,
        b'0'..=b'9' | b'.' => number_kind(src, start),
        b'-' | b'+' => {
            let next = skip_trivia(src, start + 1);
            match bytes.get(next) {
                Some(b'0'..=b'9') | Some(b'.') => number_kind(src, next),
                _ => ValueKind::Undefined,
            }
        }
        b'(' => {
            if is_arrow_after_parens(src, start) {
                ValueKind::Function
            } else {
                ValueKind::Undefined
            }
        }
        _ => match read_ident(src, start) {
            Some(("true" | "false", _)) => ValueKind::Boolean,
            Some(("null" | "new", _)) => ValueKind::Object,
            Some(("undefined" | "void", _)) => ValueKind::Undefined,
            Some(("function", _)) => ValueKind::Function,
            Some(("async", rest)) => {
                let next = skip_trivia(src, rest);
                match read_ident(src, next) {
                    Some(("function", _)) => ValueKind::Function,
                    _ if bytes.get(next) == Some(&b'(') => ValueKind::Function,
                    _ => ValueKind::Undefined,
                }
            }
            Some(("Symbol", rest)) => match bytes.get(skip_trivia(src, rest)) {
                Some(b'(') | Some(b'.') => ValueKind::Symbol,
                _ => ValueKind::Undefined,
            },
            Some((_, rest)) => {
                // Bare identifier arrow: `x => …`
                let next = skip_trivia(src, rest);
                if src[next..].starts_with("=>") {
                    ValueKind::Function
                } else {
                    ValueKind::Undefined
                }
            }
            None => ValueKind::Undefined,
        },
    }
}

fn number_kind(src: &str, start: usize) -> ValueKind {
    let bytes = src.as_bytes();
    let mut i = start;
    while i < bytes.len() && (is_ident_char(bytes[i]) || bytes[i] == b'.') {
        if bytes[i] == b'n' {
            return ValueKind::BigInt;
        }
        i += 1;
    }
    ValueKind::Number
}

fn is_arrow_after_parens(src: &str, open: usize) -> bool {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    let after = skip_trivia(src, i + 1);
                    return src[after..].starts_with("=>");
                }
            }
            _ => {}
        }
        i += 1;
    }
    false
}

struct LiteralParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_trivia(&mut self) {
        self.pos = skip_trivia(self.src, self.pos);
    }

    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        self.skip_trivia();
        let Some(c) = self.peek() else {
            return Err(LiteralError::UnexpectedEnd);
        };
        match c {
            b'"' | b'\'' => self.parse_string(c).map(Value::Str),
            b'`' => self.parse_template(),
            b'[' => self.parse_array(),
            b'{' => self.parse_object(),
            b'-' | b'+' => {
                let sign = c;
                self.pos += 1;
                self.skip_trivia();
                let value = self.parse_number()?;
                if sign == b'-' {
                    Ok(match value {
                        Value::Number(n) => Value::Number(-n),
                        Value::BigInt(digits) => Value::BigInt(format!("-{}", digits)),
                        other => other,
                    })
                } else {
                    Ok(value)
                }
            }
            b'0'..=b'9' | b'.' => self.parse_number(),
            _ => {
                let offset = self.pos;
                match read_ident(self.src, self.pos) {
                    Some(("true", end)) => {
                        self.pos = end;
                        Ok(Value::Bool(true))
                    }
                    Some(("false", end)) => {
                        self.pos = end;
                        Ok(Value::Bool(false))
                    }
                    Some(("null", end)) => {
                        self.pos = end;
                        Ok(Value::Null)
                    }
                    Some(("undefined", end)) => {
                        self.pos = end;
                        Ok(Value::Undefined)
                    }
                    _ => Err(LiteralError::Unsupported { offset }),
                }
            }
        }
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let mut i = self.pos;
        let mut is_bigint = false;
        while i < bytes.len() {
            let b = bytes[i];
            if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' {
                if b == b'n' {
                    is_bigint = true;
                    i += 1;
                    break;
                }
                i += 1;
            } else if (b == b'+' || b == b'-')
                && matches!(bytes.get(i.wrapping_sub(1)), Some(b'e') | Some(b'E'))
            {
                // exponent sign
                i += 1;
            } else {
                break;
            }
        }
        if i == start {
            return Err(LiteralError::BadNumber { offset: start });
        }
        let raw: String = self.src[start..i].chars().filter(|&c| c != '_').collect();
        self.pos = i;

        if is_bigint {
            let digits = &raw[..raw.len() - 1];
            let normalized = parse_integer_digits(digits)
                .ok_or(LiteralError::BadNumber { offset: start })?;
            return Ok(Value::BigInt(normalized));
        }

        let parsed = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16).ok().map(|v| v as f64)
        } else if let Some(oct) = raw.strip_prefix("0o").or_else(|| raw.strip_prefix("0O")) {
            i64::from_str_radix(oct, 8).ok().map(|v| v as f64)
        } else if let Some(bin) = raw.strip_prefix("0b").or_else(|| raw.strip_prefix("0B")) {
            i64::from_str_radix(bin, 2).ok().map(|v| v as f64)
        } else {
            raw.parse::<f64>().ok()
        };
        parsed
            .map(Value::Number)
            .ok_or(LiteralError::BadNumber { offset: start })
    }

    fn parse_string(&mut self, quote: u8) -> Result<String, LiteralError> {
        let open = self.pos;
        let bytes = self.src.as_bytes();
        let mut out = String::new();
        let mut i = self.pos + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => {
                    let (ch, next) = read_escape(self.src, i);
                    out.push_str(&ch);
                    i = next;
                }
                b'\n' => return Err(LiteralError::UnterminatedString { offset: open }),
                c if c == quote => {
                    self.pos = i + 1;
                    return Ok(out);
                }
                _ => {
                    let ch = self.src[i..].chars().next().unwrap_or('\u{FFFD}');
                    out.push(ch);
                    i += ch.len_utf8();
                }
            }
        }
        Err(LiteralError::UnterminatedString { offset: open })
    }

    fn parse_template(&mut self) -> Result<Value, LiteralError> {
        let open = self.pos;
        let bytes = self.src.as_bytes();
        let mut out = String::new();
        let mut i = self.pos + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => {
                    let (ch, next) = read_escape(self.src, i);
                    out.push_str(&ch);
                    i = next;
                }
                b'`' => {
                    self.pos = i + 1;
                    return Ok(Value::Str(out));
                }
                b'$' if bytes.get(i + 1) == Some(&b'{') => {
                    // Interpolation means this is no longer a literal.
                    return Err(LiteralError::Unsupported { offset: i });
                }
                _ => {
                    let ch = self.src[i..].chars().next().unwrap_or('\u{FFFD}');
                    out.push(ch);
                    i += ch.len_utf8();
                }
            }
        }
        Err(LiteralError::UnterminatedString { offset: open })
    }

    fn parse_array(&mut self) -> Result<Value, LiteralError> {
        self.pos += 1; // past '['
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::List(items));
                }
                Some(b',') => {
                    self.pos += 1;
                }
                Some(_) => {
                    items.push(self.parse_value()?);
                    self.skip_trivia();
                    match self.peek() {
                        Some(b',') => self.pos += 1,
                        Some(b']') => {}
                        Some(_) => {
                            return Err(LiteralError::Unsupported { offset: self.pos });
                        }
                        None => return Err(LiteralError::UnexpectedEnd),
                    }
                }
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
    }

    fn parse_object(&mut self) -> Result<Value, LiteralError> {
        self.pos += 1; // past '{'
        let mut entries = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Object(entries));
                }
                Some(b',') => {
                    self.pos += 1;
                }
                Some(_) => {
                    let key = self.parse_object_key()?;
                    self.skip_trivia();
                    if self.peek() != Some(b':') {
                        // Shorthand (`{ foo }`) references a binding, which
                        // is an expression, not a literal.
                        return Err(LiteralError::Unsupported { offset: self.pos });
                    }
                    self.pos += 1;
                    let value = self.parse_value()?;
                    entries.push((key, value));
                    self.skip_trivia();
                    match self.peek() {
                        Some(b',') => self.pos += 1,
                        Some(b'}') => {}
                        Some(_) => {
                            return Err(LiteralError::Unsupported { offset: self.pos });
                        }
                        None => return Err(LiteralError::UnexpectedEnd),
                    }
                }
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
    }

    fn parse_object_key(&mut self) -> Result<String, LiteralError> {
        self.skip_trivia();
        let offset = self.pos;
        match self.peek() {
            Some(q @ (b'"' | b'\'')) => self.parse_string(q),
            Some(b'0'..=b'9') => match self.parse_number()? {
                Value::Number(n) => Ok(format_numeric_key(n)),
                Value::BigInt(digits) => Ok(digits),
                _ => Err(LiteralError::Unsupported { offset }),
            },
            Some(c) if is_ident_start(c) => {
                let (name, end) = read_ident(self.src, self.pos)
                    .ok_or(LiteralError::Unsupported { offset: self.pos })?;
                self.pos = end;
                Ok(name.to_string())
            }
            Some(_) => Err(LiteralError::Unsupported { offset: self.pos }),
            None => Err(LiteralError::UnexpectedEnd),
        }
    }
}

/// Normalize integer digit text (possibly hex/octal/binary) to decimal form.
fn parse_integer_digits(digits: &str) -> Option<String> {
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        return i128::from_str_radix(hex, 16).ok().map(|v| v.to_string());
    }
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Strip leading zeros but keep a lone zero.
    let trimmed = digits.trim_start_matches('0');
    Some(if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    })
}

/// JS-style numeric object keys stringify without a trailing `.0`.
fn format_numeric_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Decode the escape sequence starting at the backslash at `i`, returning
/// the decoded text and the offset just past the sequence. Unknown escapes
/// decode to the escaped character itself.
fn read_escape(src: &str, i: usize) -> (String, usize) {
    let bytes = src.as_bytes();
    let Some(&next) = bytes.get(i + 1) else {
        return ("\\".to_string(), i + 1);
    };
    match next {
        b'n' => ("\n".to_string(), i + 2),
        b't' => ("\t".to_string(), i + 2),
        b'r' => ("\r".to_string(), i + 2),
        b'0' => ("\0".to_string(), i + 2),
        b'b' => ("\u{8}".to_string(), i + 2),
        b'f' => ("\u{c}".to_string(), i + 2),
        b'v' => ("\u{b}".to_string(), i + 2),
        b'u' => {
            // \uHHHH or \u{H…}
            if bytes.get(i + 2) == Some(&b'{') {
                if let Some(close) = src[i + 3..].find('}') {
                    let hex = &src[i + 3..i + 3 + close];
                    if let Some(ch) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                        return (ch.to_string(), i + 4 + close);
                    }
                }
                ("u".to_string(), i + 2)
            } else {
                match src
                    .get(i + 2..i + 6)
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .and_then(char::from_u32)
                {
                    Some(ch) => (ch.to_string(), i + 6),
                    None => ("u".to_string(), i + 2),
                }
            }
        }
        b'x' => {
            match src
                .get(i + 2..i + 4)
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .and_then(char::from_u32)
            {
                Some(ch) => (ch.to_string(), i + 4),
                None => ("x".to_string(), i + 2),
            }
        }
        _ => {
            let ch = src[i + 1..].chars().next().unwrap_or('\u{FFFD}');
            (ch.to_string(), i + 1 + ch.len_utf8())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers() {
        assert_eq!(evaluate_literal("42"), Ok(Value::Number(42.0)));
        assert_eq!(evaluate_literal("-3.5"), Ok(Value::Number(-3.5)));
        assert_eq!(evaluate_literal("0xff"), Ok(Value::Number(255.0)));
        assert_eq!(evaluate_literal("1_000"), Ok(Value::Number(1000.0)));
        assert_eq!(evaluate_literal("1e3"), Ok(Value::Number(1000.0)));
        assert_eq!(evaluate_literal("1e+2"), Ok(Value::Number(100.0)));
    }

    #[test]
    fn test_bigint() {
        assert_eq!(evaluate_literal("123n"), Ok(Value::BigInt("123".into())));
        assert_eq!(evaluate_literal("-9n"), Ok(Value::BigInt("-9".into())));
    }

    #[test]
    fn test_strings() {
        assert_eq!(evaluate_literal("'hi'"), Ok(Value::Str("hi".into())));
        assert_eq!(
            evaluate_literal("\"a\\nb\""),
            Ok(Value::Str("a\nb".into()))
        );
        assert_eq!(evaluate_literal("`plain`"), Ok(Value::Str("plain".into())));
    }

    #[test]
    fn test_template_interpolation_rejected() {
        assert!(matches!(
            evaluate_literal("`x ${y}`"),
            Err(LiteralError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(evaluate_literal("true"), Ok(Value::Bool(true)));
        assert_eq!(evaluate_literal("null"), Ok(Value::Null));
        assert_eq!(evaluate_literal("undefined"), Ok(Value::Undefined));
    }

    #[test]
    fn test_containers() {
        assert_eq!(
            evaluate_literal("[1, 'a', true]"),
            Ok(Value::List(vec![
                Value::Number(1.0),
                Value::Str("a".into()),
                Value::Bool(true),
            ]))
        );
        assert_eq!(
            evaluate_literal("{ a: 1, 'b': [2], }"),
            Ok(Value::Object(vec![
                ("a".into(), Value::Number(1.0)),
                ("b".into(), Value::List(vec![Value::Number(2.0)])),
            ]))
        );
    }

    #[test]
    fn test_multiline_object() {
        let src = "{\n  open: false,\n  label: 'menu'\n}";
        let value = evaluate_literal(src).unwrap();
        assert_eq!(
            value,
            Value::Object(vec![
                ("open".into(), Value::Bool(false)),
                ("label".into(), Value::Str("menu".into())),
            ])
        );
    }

    #[test]
    fn test_expressions_rejected() {
        assert!(evaluate_literal("window.count").is_err());
        assert!(evaluate_literal("1 + 2").is_err());
        assert!(evaluate_literal("() => 1").is_err());
        assert!(evaluate_literal("new Map()").is_err());
        assert!(evaluate_literal("{ shorthand }").is_err());
    }

    #[test]
    fn test_classify_shapes() {
        assert_eq!(classify_literal("'x'"), ValueKind::String);
        assert_eq!(classify_literal("`t`"), ValueKind::String);
        assert_eq!(classify_literal("42"), ValueKind::Number);
        assert_eq!(classify_literal("-1.5"), ValueKind::Number);
        assert_eq!(classify_literal("10n"), ValueKind::BigInt);
        assert_eq!(classify_literal("true"), ValueKind::Boolean);
        assert_eq!(classify_literal("null"), ValueKind::Object);
        assert_eq!(classify_literal("[1]"), ValueKind::Object);
        assert_eq!(classify_literal("{}"), ValueKind::Object);
        assert_eq!(classify_literal("new Map()"), ValueKind::Object);
        assert_eq!(classify_literal("undefined"), ValueKind::Undefined);
        assert_eq!(classify_literal("() => 1"), ValueKind::Function);
        assert_eq!(classify_literal("x => x"), ValueKind::Function);
        assert_eq!(classify_literal("function f() {}"), ValueKind::Function);
        assert_eq!(classify_literal("Symbol('tag')"), ValueKind::Symbol);
        assert_eq!(classify_literal("someRef"), ValueKind::Undefined);
    }

    #[test]
    fn test_evaluate_matches_classification_for_literals() {
        for (src, kind) in [
            ("'s'", ValueKind::String),
            ("3", ValueKind::Number),
            ("4n", ValueKind::BigInt),
            ("false", ValueKind::Boolean),
            ("[true]", ValueKind::Object),
        ] {
            let value = evaluate_literal(src).unwrap();
            assert_eq!(value.kind(), kind, "kind mismatch for {}", src);
            assert_eq!(classify_literal(src), kind, "classify mismatch for {}", src);
        }
    }
}
