//! Dynamic value model for captured property state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse value-kind tag attached to every property snapshot.
///
/// The set mirrors the host language's `typeof` partition and is fixed:
/// snapshots always carry one of these eight tags, even when the literal
/// value itself could not be captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// A string literal (`"…"`, `'…'`, or an expression-free template).
    String,
    /// A numeric literal, including hex and float forms.
    Number,
    /// `true` or `false`.
    Boolean,
    /// A bigint literal (`123n`).
    BigInt,
    /// A symbol-producing initializer (`Symbol(…)`); value is never captured.
    Symbol,
    /// No recognizable shape, or an initializer that failed to evaluate.
    Undefined,
    /// `null`, array literals, and object literals.
    Object,
    /// A function or arrow-function initializer; value is never captured.
    Function,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::BigInt => "bigint",
            ValueKind::Symbol => "symbol",
            ValueKind::Undefined => "undefined",
            ValueKind::Object => "object",
            ValueKind::Function => "function",
        };
        f.write_str(s)
    }
}

/// A dynamic value produced by the restricted literal evaluator and stored
/// in instance field slots.
///
/// Containers preserve insertion order so that re-applied values compare
/// stably in tests and logs.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The absent value (`undefined`).
    Undefined,
    /// The null object.
    Null,
    /// A boolean.
    Bool(bool),
    /// A double-precision number.
    Number(f64),
    /// A bigint, kept as its (sign-bearing) digit string.
    BigInt(String),
    /// A string.
    Str(String),
    /// An array literal.
    List(Vec<Value>),
    /// An object literal; entries keep source order.
    Object(Vec<(String, Value)>),
}

impl Value {
    /// The coarse kind tag for this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Null | Value::List(_) | Value::Object(_) => ValueKind::Object,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::BigInt(_) => ValueKind::BigInt,
            Value::Str(_) => ValueKind::String,
        }
    }

    /// Convert into the plain JSON representation embedded in emitted
    /// bootstrap payloads.
    ///
    /// `undefined` maps to JSON `null` (the snapshot's kind tag is what
    /// disambiguates on the way back in), and bigints are carried as their
    /// digit strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            // Whole numbers emit without a fractional part, as source
            // literals write them.
            Value::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                serde_json::Value::Number(serde_json::Number::from(*n as i64))
            }
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::BigInt(digits) => serde_json::Value::String(digits.clone()),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(entries) => {
                let map = entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                serde_json::Value::Object(map)
            }
        }
    }

    /// Rebuild a value from its JSON representation, steered by the kind
    /// tag stored next to it.
    pub fn from_json(kind: ValueKind, json: &serde_json::Value) -> Value {
        match kind {
            ValueKind::BigInt => match json {
                serde_json::Value::String(s) => Value::BigInt(s.clone()),
                _ => Value::Undefined,
            },
            ValueKind::Undefined | ValueKind::Symbol | ValueKind::Function => Value::Undefined,
            _ => Self::from_plain_json(json),
        }
    }

    fn from_plain_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Self::from_plain_json).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_plain_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::BigInt(digits) => write!(f, "{}n", digits),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}
