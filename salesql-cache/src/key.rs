//! Deterministic cache key derivation.
//!
//! Keys have the form `namespace:hash`, where `hash` is the BLAKE3 digest of
//! the payload's canonical JSON form. Object keys are sorted recursively, so
//! two payloads that differ only in field order produce the same key.

use std::fmt::{Debug, Write as _};

use serde::Serialize;
use serde_json::Value;

/// Separator between the namespace and the payload digest.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Derives cache keys from a namespace and a structured payload.
///
/// Derivation is a pure function and never fails: a payload that cannot be
/// represented as JSON is hashed through its `Debug` rendering instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDeriver;

impl KeyDeriver {
    pub fn new() -> Self {
        Self
    }

    /// Derive the key for `payload` under `namespace`.
    pub fn derive<P>(&self, namespace: &str, payload: &P) -> String
    where
        P: Serialize + Debug + ?Sized,
    {
        let canonical = match serde_json::to_value(payload) {
            Ok(value) => canonical_json(&value),
            Err(_) => format!("{:?}", payload),
        };
        let digest = blake3::hash(canonical.as_bytes());
        format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, digest.to_hex())
    }

    /// The namespace part of a derived key.
    pub fn namespace_of(key: &str) -> Option<&str> {
        key.split_once(NAMESPACE_SEPARATOR).map(|(ns, _)| ns)
    }
}

/// Render a JSON value with object keys sorted at every depth.
///
/// Does not rely on the map ordering `serde_json` was compiled with.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Serializing a plain string cannot fail.
                let _ = write!(out, "{}", Value::String(key.clone()));
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{}", scalar);
        }
    }
}
