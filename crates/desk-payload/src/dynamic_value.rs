//! Untyped report data.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Deepest list/map nesting accepted by either payload format. Same bound as
/// serde_json's recursion limit.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Numeric payload value; keeps integers exact across encodings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DynamicNumber {
    PosInt(u64),
    /// Always negative; non-negative integers normalize to `PosInt`.
    NegInt(i64),
    Float(f64),
}

impl DynamicNumber {
    pub fn from_i64(value: i64) -> Self {
        match u64::try_from(value) {
            Ok(unsigned) => Self::PosInt(unsigned),
            Err(_) => Self::NegInt(value),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::PosInt(value) => value as f64,
            Self::NegInt(value) => value as f64,
            Self::Float(value) => value,
        }
    }

    fn to_json(self) -> Value {
        match self {
            Self::PosInt(value) => Value::from(value),
            Self::NegInt(value) => Value::from(value),
            Self::Float(value) => serde_json::Number::from_f64(value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        }
    }
}

impl From<&serde_json::Number> for DynamicNumber {
    fn from(number: &serde_json::Number) -> Self {
        if let Some(value) = number.as_u64() {
            Self::PosInt(value)
        } else if let Some(value) = number.as_i64() {
            Self::from_i64(value)
        } else {
            Self::Float(number.as_f64().unwrap_or(0.0))
        }
    }
}

/// Recursive tagged union for report data and secondary-decode results.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DynamicValue {
    #[default]
    Null,
    Bool(bool),
    Number(DynamicNumber),
    String(String),
    List(Vec<DynamicValue>),
    Map(BTreeMap<String, DynamicValue>),
}

impl DynamicValue {
    /// Parses JSON text into a value.
    pub fn from_json_text(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Value>(raw).map(Self::from)
    }

    pub fn to_json(&self) -> Value {
        Value::from(self)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, DynamicValue>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DynamicValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Looks up `key` when this value is a map.
    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.as_map().and_then(|entries| entries.get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of lists/maps on the deepest path; scalars are 0. Iterative, so
    /// it is safe on values of any depth.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 0_usize)];
        while let Some((value, enclosing)) = pending.pop() {
            let level = enclosing + 1;
            match value {
                Self::List(items) => pending.extend(items.iter().map(|child| (child, level))),
                Self::Map(entries) => {
                    pending.extend(entries.values().map(|child| (child, level)))
                }
                _ => continue,
            }
            deepest = deepest.max(level);
        }
        deepest
    }
}

impl From<Value> for DynamicValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => Self::Number(DynamicNumber::from(&number)),
            Value::String(text) => Self::String(text),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&DynamicValue> for Value {
    fn from(value: &DynamicValue) -> Self {
        match value {
            DynamicValue::Null => Value::Null,
            DynamicValue::Bool(flag) => Value::Bool(*flag),
            DynamicValue::Number(number) => number.to_json(),
            DynamicValue::String(text) => Value::String(text.clone()),
            DynamicValue::List(items) => Value::Array(items.iter().map(Value::from).collect()),
            DynamicValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for DynamicValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for DynamicValue {
    fn from(value: i64) -> Self {
        Self::Number(DynamicNumber::from_i64(value))
    }
}

impl From<u64> for DynamicValue {
    fn from(value: u64) -> Self {
        Self::Number(DynamicNumber::PosInt(value))
    }
}

impl From<f64> for DynamicValue {
    fn from(value: f64) -> Self {
        Self::Number(DynamicNumber::Float(value))
    }
}

impl From<&str> for DynamicValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<DynamicValue>> From<Vec<T>> for DynamicValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl FromIterator<(String, DynamicValue)> for DynamicValue {
    fn from_iter<I: IntoIterator<Item = (String, DynamicValue)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().collect())
    }
}

/// Serializes in the natural self-describing shape (plain JSON-like values).
impl Serialize for DynamicValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(flag) => serializer.serialize_bool(*flag),
            Self::Number(DynamicNumber::PosInt(value)) => serializer.serialize_u64(*value),
            Self::Number(DynamicNumber::NegInt(value)) => serializer.serialize_i64(*value),
            Self::Number(DynamicNumber::Float(value)) => serializer.serialize_f64(*value),
            Self::String(text) => serializer.serialize_str(text),
            Self::List(items) => serializer.collect_seq(items),
            Self::Map(entries) => serializer.collect_map(entries),
        }
    }
}

/// Requires a self-describing format; the primary binary format goes through
/// `primary_wire` instead.
impl<'de> Deserialize<'de> for DynamicValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::{DynamicNumber, DynamicValue};
    use serde_json::json;

    #[test]
    fn unit_from_json_preserves_integer_kinds() {
        let value = DynamicValue::from(json!({
            "revenue": 1000,
            "delta": -42,
            "ratio": 0.25,
            "tags": ["q1", true, null],
        }));

        assert_eq!(
            value.get("revenue"),
            Some(&DynamicValue::Number(DynamicNumber::PosInt(1000)))
        );
        assert_eq!(
            value.get("delta"),
            Some(&DynamicValue::Number(DynamicNumber::NegInt(-42)))
        );
        assert_eq!(
            value.get("ratio"),
            Some(&DynamicValue::Number(DynamicNumber::Float(0.25)))
        );
        assert_eq!(value.get("tags").map(DynamicValue::kind), Some("list"));
    }

    #[test]
    fn unit_from_i64_normalizes_non_negative_values() {
        assert_eq!(DynamicNumber::from_i64(7), DynamicNumber::PosInt(7));
        assert_eq!(DynamicNumber::from_i64(-7), DynamicNumber::NegInt(-7));
        assert_eq!(DynamicValue::from(0_i64), DynamicValue::from(0_u64));
    }

    #[test]
    fn functional_json_text_round_trip_is_lossless() {
        let raw = r#"{"nested":{"list":[1,-2,3.5,"x"],"flag":false},"empty":{}}"#;
        let value = DynamicValue::from_json_text(raw).expect("parse");
        let rendered = serde_json::to_string(&value).expect("serialize");
        let reparsed = DynamicValue::from_json_text(&rendered).expect("reparse");
        assert_eq!(value, reparsed);
        assert_eq!(value.to_json(), serde_json::from_str::<serde_json::Value>(raw).unwrap());
    }

    #[test]
    fn unit_map_helpers_ignore_non_map_values() {
        let list = DynamicValue::from(vec!["a", "b"]);
        assert!(list.get("a").is_none());
        assert!(!list.contains_key("a"));
        assert_eq!(list.as_list().map(<[DynamicValue]>::len), Some(2));

        let map: DynamicValue = [("k".to_string(), DynamicValue::from("v"))]
            .into_iter()
            .collect();
        assert!(map.contains_key("k"));
        assert_eq!(map.get("k").and_then(DynamicValue::as_str), Some("v"));
    }

    #[test]
    fn unit_depth_counts_every_container_level() {
        assert_eq!(DynamicValue::from("scalar").depth(), 0);
        assert_eq!(DynamicValue::from(json!([])).depth(), 1);
        assert_eq!(
            DynamicValue::from(json!({"a": [1, {"b": []}], "c": {}})).depth(),
            4
        );
    }

    #[test]
    fn regression_depth_of_very_deep_value_does_not_recurse() {
        let mut value = DynamicValue::Null;
        for _ in 0..10_000 {
            value = DynamicValue::List(vec![value]);
        }
        assert_eq!(value.depth(), 10_000);
        // Unwind iteratively so the test itself never drops deep recursion.
        while let DynamicValue::List(mut items) = value {
            value = items.pop().unwrap_or_default();
        }
    }

    #[test]
    fn regression_non_finite_floats_render_as_null() {
        let value = DynamicValue::from(f64::NAN);
        assert_eq!(value.to_json(), serde_json::Value::Null);
    }
}
