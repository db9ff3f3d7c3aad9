//! Flattening of nested status documents into topic/value pairs
//!
//! Walks a nested mapping depth-first and yields one `(topic, value)` pair per
//! leaf. Keys are lower-cased on the way down; arrays contribute their index
//! as a path segment.

use serde_json::{map, Map, Value};
use std::iter::Enumerate;
use std::slice;

/// Lazily flatten `map` below `base`
///
/// Each call returns a fresh iterator; nothing is cached between calls.
pub fn flatten<'a>(base: &str, map: &'a Map<String, Value>) -> Flatten<'a> {
    Flatten {
        stack: vec![Frame::Object(base.to_string(), map.iter())],
    }
}

/// Iterator returned by [`flatten`]
pub struct Flatten<'a> {
    stack: Vec<Frame<'a>>,
}

enum Frame<'a> {
    Object(String, map::Iter<'a>),
    Array(String, Enumerate<slice::Iter<'a, Value>>),
}

impl<'a> Iterator for Flatten<'a> {
    type Item = (String, String);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (topic, value) = match self.stack.last_mut()? {
                Frame::Object(prefix, entries) => match entries.next() {
                    Some((key, value)) => (format!("{}/{}", prefix, key.to_lowercase()), value),
                    None => {
                        self.stack.pop();
                        continue;
                    }
                },
                Frame::Array(prefix, items) => match items.next() {
                    Some((index, value)) => (format!("{}/{}", prefix, index), value),
                    None => {
                        self.stack.pop();
                        continue;
                    }
                },
            };

            match value {
                Value::Object(children) => self.stack.push(Frame::Object(topic, children.iter())),
                Value::Array(items) => {
                    self.stack.push(Frame::Array(topic, items.iter().enumerate()))
                }
                leaf => return Some((topic, scalar_to_string(leaf))),
            }
        }
    }
}

/// Stringify a scalar the way it would be printed as a message payload
///
/// Strings are unquoted, `null` becomes `"null"`, and floats without a
/// fractional part print as integers.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if n.is_f64() {
                if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 && f.abs() < 1e15 {
                        return format!("{}", f as i64);
                    }
                }
            }
            n.to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn collect(base: &str, value: Value) -> HashMap<String, String> {
        let map = value.as_object().cloned().unwrap_or_default();
        flatten(base, &map).collect()
    }

    #[test]
    fn test_flatten_nested_mapping() {
        let pairs = collect("x", json!({ "A": { "B": 1, "C": { "D": 2 } } }));
        let expected: HashMap<String, String> = [
            ("x/a/b".to_string(), "1".to_string()),
            ("x/a/c/d".to_string(), "2".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn test_flatten_lowercases_keys_only() {
        let pairs = collect("base", json!({ "Green": { "Mode": "ECO" } }));
        assert_eq!(pairs.get("base/green/mode").map(String::as_str), Some("ECO"));
    }

    #[test]
    fn test_flatten_null_and_bool_leaves() {
        let pairs = collect("b", json!({ "Gone": null, "Flag": true }));
        assert_eq!(pairs["b/gone"], "null");
        assert_eq!(pairs["b/flag"], "true");
    }

    #[test]
    fn test_flatten_arrays_use_indices() {
        let pairs = collect("b", json!({ "Tires": [ { "Psi": 36 }, 2.5 ] }));
        assert_eq!(pairs["b/tires/0/psi"], "36");
        assert_eq!(pairs["b/tires/1"], "2.5");
    }

    #[test]
    fn test_flatten_empty_containers_yield_nothing() {
        let pairs = collect("b", json!({ "Empty": {}, "None": [] }));
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_flatten_is_restartable() {
        let map = json!({ "A": { "B": 1 }, "C": 2 }).as_object().cloned().unwrap();
        let first: Vec<_> = flatten("x", &map).collect();
        let second: Vec<_> = flatten("x", &map).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_flatten_is_lazy() {
        let map = json!({ "A": 1, "B": 2, "C": 3 }).as_object().cloned().unwrap();
        let mut iter = flatten("x", &map);
        assert!(iter.next().is_some());
        assert_eq!(iter.count(), 2);
    }

    #[test]
    fn test_scalar_to_string_integral_float() {
        assert_eq!(scalar_to_string(&json!(80.0)), "80");
        assert_eq!(scalar_to_string(&json!(80.25)), "80.25");
        assert_eq!(scalar_to_string(&json!(-4)), "-4");
        assert_eq!(scalar_to_string(&json!("OFF")), "OFF");
    }
}
