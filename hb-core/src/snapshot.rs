//! Raw vehicle status documents and path-tolerant field lookup
//!
//! The upstream status document has no fixed schema: field paths move between
//! vehicle software generations. Lookups therefore go through dotted paths
//! and ordered candidate lists instead of typed structs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One point-in-time status document as returned by the vehicle backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetrySnapshot(Value);

impl TelemetrySnapshot {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The document exactly as received
    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// Top-level mapping of the document, if it is one
    pub fn as_map(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    /// The vehicle status payload, unwrapping a `{"data": {...}}` envelope
    pub fn payload(&self) -> &Value {
        match self.0.get("data") {
            Some(inner @ Value::Object(_)) => inner,
            _ => &self.0,
        }
    }

    /// Resolve a dotted path against the payload
    ///
    /// Returns `None` when any segment is missing, when an intermediate node
    /// is not a mapping, or when the leaf is `null`.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        resolve(self.payload(), path)
    }

    /// Return the first present value among `candidates`, in declared order
    pub fn extract(&self, candidates: &[&str]) -> Option<&Value> {
        candidates.iter().find_map(|path| self.resolve(path))
    }

    /// Numeric extraction; numeric strings are accepted
    pub fn extract_f64(&self, candidates: &[&str], default: f64) -> f64 {
        self.extract(candidates)
            .and_then(lenient_f64)
            .unwrap_or(default)
    }

    /// Integral status code extraction; strings and fractional numbers do not match
    pub fn extract_code(&self, candidates: &[&str]) -> Option<i64> {
        self.extract(candidates).and_then(strict_code)
    }

    /// True when any candidate path holds exactly `code`
    pub fn any_equals(&self, candidates: &[&str], code: i64) -> bool {
        candidates
            .iter()
            .filter_map(|path| self.resolve(path))
            .any(|v| strict_code(v) == Some(code))
    }
}

impl From<Value> for TelemetrySnapshot {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Walk `root` along a dotted path
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.split('.') {
        node = node.as_object()?.get(segment)?;
    }
    if node.is_null() {
        None
    } else {
        Some(node)
    }
}

/// Numbers as-is, strings when they parse as a number
pub fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Numbers with no fractional part
pub fn strict_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}
