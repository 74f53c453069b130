//! Reactive-field snapshots.
//!
//! The rewriter records one snapshot per reactive field declaration and
//! embeds the set in the emitted unit as a single JSON line. The runtime
//! reads them back to learn a component's reactive schema and to seed
//! patched instances with their declared initial values.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::literal::{classify_literal, evaluate_literal};
use crate::value::{Value, ValueKind};

/// What the rewriter knows about one reactive field at build time.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySnapshot {
    /// Field name as declared on the class.
    pub name: String,
    /// Syntactic kind of the initializer (best effort).
    pub kind: ValueKind,
    /// Initial value, when the initializer is in the literal subset.
    /// Absent for expressions that can only be evaluated at runtime.
    pub value: Option<Value>,
}

impl PropertySnapshot {
    /// Build a snapshot from a field declaration's initializer text.
    ///
    /// A declaration without an initializer snapshots as `undefined`. An
    /// initializer outside the literal subset keeps its kind tag but
    /// records no value.
    pub fn capture(name: &str, initializer: Option<&str>) -> PropertySnapshot {
        match initializer {
            None => PropertySnapshot {
                name: name.to_string(),
                kind: ValueKind::Undefined,
                value: Some(Value::Undefined),
            },
            Some(src) => {
                let kind = classify_literal(src);
                let value = match evaluate_literal(src) {
                    Ok(v) => Some(v),
                    Err(err) => {
                        log::debug!("field `{}` initializer not captured: {}", name, err);
                        None
                    }
                };
                PropertySnapshot {
                    name: name.to_string(),
                    kind,
                    value,
                }
            }
        }
    }
}

// The wire form keeps `value` as plain JSON so the emitted unit stays
// readable; the kind tag steers decoding back into a typed `Value`.
#[derive(Serialize, Deserialize)]
struct RawSnapshot {
    name: String,
    kind: ValueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
}

impl Serialize for PropertySnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawSnapshot {
            name: self.name.clone(),
            kind: self.kind,
            value: self.value.as_ref().map(Value::to_json),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PropertySnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawSnapshot::deserialize(deserializer)?;
        let value = raw.value.as_ref().map(|json| Value::from_json(raw.kind, json));
        Ok(PropertySnapshot {
            name: raw.name,
            kind: raw.kind,
            value,
        })
    }
}

/// Serialize a snapshot set to the single-line JSON form embedded in units.
pub fn encode_snapshots(snapshots: &[PropertySnapshot]) -> serde_json::Result<String> {
    serde_json::to_string(snapshots)
}

/// Parse a snapshot set back out of its embedded JSON form.
pub fn decode_snapshots(json: &str) -> serde_json::Result<Vec<PropertySnapshot>> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_literal() {
        let snap = PropertySnapshot::capture("count", Some("0"));
        assert_eq!(snap.kind, ValueKind::Number);
        assert_eq!(snap.value, Some(Value::Number(0.0)));
    }

    #[test]
    fn test_capture_expression_keeps_kind_only() {
        let snap = PropertySnapshot::capture("items", Some("new Map()"));
        assert_eq!(snap.kind, ValueKind::Object);
        assert_eq!(snap.value, None);
    }

    #[test]
    fn test_capture_without_initializer() {
        let snap = PropertySnapshot::capture("label", None);
        assert_eq!(snap.kind, ValueKind::Undefined);
        assert_eq!(snap.value, Some(Value::Undefined));
    }

    #[test]
    fn test_wire_round_trip() {
        let snaps = vec![
            PropertySnapshot::capture("count", Some("42")),
            PropertySnapshot::capture("big", Some("7n")),
            PropertySnapshot::capture("handler", Some("() => 1")),
        ];
        let json = encode_snapshots(&snaps).unwrap();
        let back = decode_snapshots(&json).unwrap();
        assert_eq!(back, snaps);
    }

    #[test]
    fn test_wire_omits_absent_values() {
        let snaps = vec![PropertySnapshot::capture("cb", Some("window.onTick"))];
        let json = encode_snapshots(&snaps).unwrap();
        assert!(!json.contains("\"value\""));
        assert!(json.contains("\"kind\":\"undefined\""));
    }

    #[test]
    fn test_single_line_encoding() {
        let snaps = vec![
            PropertySnapshot::capture("open", Some("false")),
            PropertySnapshot::capture("note", Some("'multi\\nline'")),
        ];
        let json = encode_snapshots(&snaps).unwrap();
        assert!(!json.contains('\n'), "embedded form must stay on one line");
    }
}
