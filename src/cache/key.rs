// Cache key derivation.
// A key is the endpoint name plus a canonical serialization of the
// arguments, so structurally equal args always map to the same entry.

use std::fmt;

use serde_json::Value;

/// Deterministic identifier for a query's endpoint + arguments pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for an endpoint and its arguments.
    ///
    /// Object keys are serialized in sorted order at every nesting
    /// level, so two argument objects that are deep-equal but built in
    /// different field order produce the same key.
    pub fn derive(endpoint: &str, args: &Value) -> Self {
        let mut out = String::with_capacity(endpoint.len() + 16);
        out.push_str(endpoint);
        out.push('#');
        write_canonical(&mut out, args);
        CacheKey(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            out.push_str(&value.to_string());
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(out, &map[key]);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_order_does_not_matter() {
        let a = CacheKey::derive("getAllPromotions", &json!({ "page": 2, "size": 10 }));
        let b = CacheKey::derive("getAllPromotions", &json!({ "size": 10, "page": 2 }));
        assert_eq!(a, b);
    }

    #[test]
    fn test_nested_objects_are_canonical() {
        let a = CacheKey::derive("q", &json!({ "f": { "x": 1, "y": [1, 2] }, "g": null }));
        let b = CacheKey::derive("q", &json!({ "g": null, "f": { "y": [1, 2], "x": 1 } }));
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_endpoints_differ() {
        let a = CacheKey::derive("getAllPromotions", &json!({}));
        let b = CacheKey::derive("getAllUsers", &json!({}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_different_args_differ() {
        let a = CacheKey::derive("getPromotionById", &json!({ "id": 1 }));
        let b = CacheKey::derive("getPromotionById", &json!({ "id": 2 }));
        assert_ne!(a, b);
    }

    #[test]
    fn test_array_order_is_preserved() {
        let a = CacheKey::derive("q", &json!({ "ids": [1, 2] }));
        let b = CacheKey::derive("q", &json!({ "ids": [2, 1] }));
        assert_ne!(a, b);
    }
}
