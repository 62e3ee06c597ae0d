//! Closed value model for answers, attributes and event data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::ValueError;

/// String-keyed map of answer values.
pub type ValueMap = BTreeMap<String, AnswerValue>;

/// A value collected from the user or attached to an analytics event.
///
/// The JSON encoding is the natural one (`true`, `3.5`, `"text"`, `[...]`,
/// `{...}`). `null` matches no variant and is rejected on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<AnswerValue>),
    Map(ValueMap),
}

impl AnswerValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnswerValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnswerValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AnswerValue]> {
        match self {
            AnswerValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            AnswerValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Check that the value survives a JSON round trip.
    ///
    /// JSON has no NaN or infinity, so a non-finite number anywhere in the
    /// tree would be written as `null` and could not be read back.
    pub fn validate(&self) -> std::result::Result<(), ValueError> {
        match self {
            AnswerValue::Number(n) if !n.is_finite() => Err(ValueError::NonFinite(n.to_string())),
            AnswerValue::List(items) => items.iter().try_for_each(AnswerValue::validate),
            AnswerValue::Map(map) => map.values().try_for_each(AnswerValue::validate),
            _ => Ok(()),
        }
    }
}

impl From<bool> for AnswerValue {
    fn from(value: bool) -> Self {
        AnswerValue::Bool(value)
    }
}

impl From<f64> for AnswerValue {
    fn from(value: f64) -> Self {
        AnswerValue::Number(value)
    }
}

impl From<i64> for AnswerValue {
    fn from(value: i64) -> Self {
        AnswerValue::Number(value as f64)
    }
}

impl From<u32> for AnswerValue {
    fn from(value: u32) -> Self {
        AnswerValue::Number(f64::from(value))
    }
}

impl From<u64> for AnswerValue {
    fn from(value: u64) -> Self {
        AnswerValue::Number(value as f64)
    }
}

impl From<usize> for AnswerValue {
    fn from(value: usize) -> Self {
        AnswerValue::Number(value as f64)
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::String(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::String(value)
    }
}

impl<T: Into<AnswerValue>> From<Vec<T>> for AnswerValue {
    fn from(values: Vec<T>) -> Self {
        AnswerValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<ValueMap> for AnswerValue {
    fn from(map: ValueMap) -> Self {
        AnswerValue::Map(map)
    }
}

impl TryFrom<serde_json::Value> for AnswerValue {
    type Error = ValueError;

    fn try_from(value: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        use serde_json::Value;
        match value {
            Value::Null => Err(ValueError::Null),
            Value::Bool(b) => Ok(AnswerValue::Bool(b)),
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(AnswerValue::Number)
                .ok_or_else(|| ValueError::NonFinite(n.to_string())),
            Value::String(s) => Ok(AnswerValue::String(s)),
            Value::Array(items) => items
                .into_iter()
                .map(AnswerValue::try_from)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(AnswerValue::List),
            Value::Object(fields) => fields
                .into_iter()
                .map(|(k, v)| AnswerValue::try_from(v).map(|v| (k, v)))
                .collect::<std::result::Result<ValueMap, _>>()
                .map(AnswerValue::Map),
        }
    }
}

impl From<AnswerValue> for serde_json::Value {
    fn from(value: AnswerValue) -> Self {
        use serde_json::Value;
        match value {
            AnswerValue::Bool(b) => Value::Bool(b),
            AnswerValue::Number(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AnswerValue::String(s) => Value::String(s),
            AnswerValue::List(items) => Value::Array(items.into_iter().map(Into::into).collect()),
            AnswerValue::Map(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_every_variant() {
        let value: AnswerValue = serde_json::from_value(json!({
            "agree": true,
            "age": 31,
            "name": "Ada",
            "goals": ["sleep", "focus"],
        }))
        .unwrap();

        let map = value.as_map().unwrap();
        assert_eq!(map["agree"].as_bool(), Some(true));
        assert_eq!(map["age"].as_f64(), Some(31.0));
        assert_eq!(map["name"].as_str(), Some("Ada"));
        assert_eq!(map["goals"].as_list().map(|l| l.len()), Some(2));
    }

    #[test]
    fn null_rejected_by_serde() {
        assert!(serde_json::from_value::<AnswerValue>(json!(null)).is_err());
        assert!(serde_json::from_value::<AnswerValue>(json!({"a": null})).is_err());
    }

    #[test]
    fn null_rejected_by_try_from() {
        assert_eq!(AnswerValue::try_from(json!(null)), Err(ValueError::Null));
        assert_eq!(
            AnswerValue::try_from(json!(["ok", null])),
            Err(ValueError::Null)
        );
    }

    #[test]
    fn non_finite_numbers_fail_validation() {
        assert_eq!(
            AnswerValue::from(f64::NAN).validate(),
            Err(ValueError::NonFinite("NaN".to_string()))
        );
        assert!(AnswerValue::from(vec![1.0, f64::INFINITY]).validate().is_err());

        let mut map = ValueMap::new();
        map.insert("score".to_string(), AnswerValue::from(f64::NEG_INFINITY));
        assert!(AnswerValue::Map(map).validate().is_err());

        assert_eq!(AnswerValue::from(vec![0.5, -2.0]).validate(), Ok(()));
        assert_eq!(AnswerValue::from("NaN").validate(), Ok(()));
    }

    #[test]
    fn nested_value_encodes_naturally() {
        let mut inner = ValueMap::new();
        inner.insert("level".to_string(), AnswerValue::from(2u32));
        let value = AnswerValue::from(vec![AnswerValue::Map(inner), AnswerValue::from("x")]);

        let encoded = serde_json::to_value(&value).unwrap();
        assert_eq!(encoded, json!([{"level": 2.0}, "x"]));
    }
}
