//! Hashing System - SHA-256 over canonical JSON
//!
//! Two independent builds of the same configuration must hash equal, so the
//! canonical form sorts keys and pins every float to a fixed precision.

use serde::Serialize;
use serde_json::{to_string, Number, Value};
use sha2::{Digest, Sha256};

/// Floats are rounded to this many decimal places (1 nm in mm space).
pub const CANONICAL_DECIMALS: i32 = 6;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, fixed float precision, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&canonical_value(&v))
}

/// Canonical form as a `Value`, for callers that pretty-print it.
pub fn canonical_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), canonical_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(canonical_value).collect()),
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .map(round_float)
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        _ => v.clone(),
    }
}

fn round_float(x: f64) -> f64 {
    let scale = 10f64.powi(CANONICAL_DECIMALS);
    let r = (x * scale).round() / scale;
    // -0.0 and 0.0 must serialize the same
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// Digest of any serializable artifact in canonical form.
pub fn compute_digest<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(value)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Input hash for a build: identifies what was built, not when.
/// input_hash = sha256(generator + version + canonical_config + grid_digest)
pub fn compute_input_hash(
    generator: &str,
    version: &str,
    config: &impl Serialize,
    grid_digest: &str,
) -> Result<String, serde_json::Error> {
    let canonical_config = canonical_json(config)?;
    let combined = format!("{}:{}:{}:{}", generator, version, canonical_config, grid_digest);
    Ok(sha256_hex(combined.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_keys_are_sorted() {
        let obj = json!({"slit": {"width": 4.5, "height": 20}, "canvasWidth": 240});
        assert_eq!(
            canonical_json(&obj).unwrap(),
            r#"{"canvasWidth":240,"slit":{"height":20,"width":4.5}}"#
        );
    }

    #[test]
    fn test_float_precision_is_fixed() {
        let a = json!({"x": 1.3000000000000003});
        let b = json!({"x": 1.3});
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
        assert_eq!(canonical_json(&json!(-0.0)).unwrap(), canonical_json(&json!(0.0)).unwrap());
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_input_hash_changes_with_grid() {
        let cfg = json!({"moduleSize": 2.0});
        let h1 = compute_input_hash("dualtag", "1.0.0", &cfg, "aa").unwrap();
        let h2 = compute_input_hash("dualtag", "1.0.0", &cfg, "bb").unwrap();
        assert_ne!(h1, h2);
    }
}
