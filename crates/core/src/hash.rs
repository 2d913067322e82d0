//! Canonical state hashing.
//!
//! A state hash is FNV-1a (64-bit) over the canonical JSON form: keys
//! recursively sorted, no whitespace. Two semantically equal states hash
//! identically regardless of map insertion order, and the 16-hex-char
//! output is the conformance surface replay bundles verify against.

use serde_json::Value;

use crate::state::GameState;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// FNV-1a 64-bit over raw bytes.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Render a JSON value in canonical form: object keys sorted, no
/// whitespace, scalars in `serde_json`'s standard rendering.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Object keys are plain strings; reuse the scalar renderer
                // for correct escaping.
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
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
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Hash an arbitrary JSON value in canonical form, as 16 hex characters.
pub fn hash_json(value: &Value) -> String {
    format!("{:016x}", fnv1a64(canonical_json(value).as_bytes()))
}

/// Deterministic hash of a full game state.
pub fn state_hash(state: &GameState) -> String {
    let value = serde_json::to_value(state).expect("GameState serialization should not fail");
    hash_json(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Published FNV-1a 64 test vectors.
    #[test]
    fn fnv1a64_reference_vectors() {
        assert_eq!(fnv1a64(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a64(b"a"), 0xaf63dc4c8601ec8c);
        assert_eq!(fnv1a64(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn canonical_form_sorts_keys_recursively() {
        let value = json!({"b": 1, "a": {"d": [true, null], "c": "x"}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":"x","d":[true,null]},"b":1}"#
        );
    }

    #[test]
    fn canonical_form_escapes_keys() {
        let value = json!({"k\"ey": 1});
        assert_eq!(canonical_json(&value), r#"{"k\"ey":1}"#);
    }

    #[test]
    fn hash_ignores_insertion_order() {
        let a: Value = serde_json::from_str(r#"{"x": 1, "y": [2, 3]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y": [2, 3], "x": 1}"#).unwrap();
        assert_eq!(hash_json(&a), hash_json(&b));
    }

    #[test]
    fn hash_is_sixteen_hex_chars() {
        let value = json!({"hello": "world"});
        let hash = hash_json(&value);
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
