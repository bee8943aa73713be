use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

/// One decoded argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<ArgValue>),
    Object(BTreeMap<String, ArgValue>),
}

impl From<Value> for ArgValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ArgValue::Null,
            Value::Bool(b) => ArgValue::Bool(b),
            Value::Number(n) => ArgValue::Number(n),
            Value::String(s) => ArgValue::String(s),
            Value::Array(items) => ArgValue::List(items.into_iter().map(ArgValue::from).collect()),
            Value::Object(map) => {
                ArgValue::Object(map.into_iter().map(|(k, v)| (k, ArgValue::from(v))).collect())
            }
        }
    }
}

impl From<&ArgValue> for Value {
    fn from(value: &ArgValue) -> Self {
        match value {
            ArgValue::Null => Value::Null,
            ArgValue::Bool(b) => Value::Bool(*b),
            ArgValue::Number(n) => Value::Number(n.clone()),
            ArgValue::String(s) => Value::String(s.clone()),
            ArgValue::List(items) => Value::Array(items.iter().map(Value::from).collect()),
            ArgValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Tool arguments, decoded once from the model's raw JSON blob.
///
/// Anything that is not a JSON object (malformed text, arrays, scalars, the
/// empty string) becomes [`ToolArgs::Empty`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ToolArgs {
    #[default]
    Empty,
    Map(BTreeMap<String, ArgValue>),
}

impl ToolArgs {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) if !map.is_empty() => ToolArgs::Map(
                map.into_iter()
                    .map(|(k, v)| (k, ArgValue::from(v)))
                    .collect(),
            ),
            Ok(Value::Object(_)) => ToolArgs::Empty,
            Ok(other) => {
                tracing::debug!(kind = ?other, "tool arguments are not an object; using empty set");
                ToolArgs::Empty
            }
            Err(e) => {
                tracing::debug!(error = %e, "malformed tool arguments; using empty set");
                ToolArgs::Empty
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ToolArgs::Empty => true,
            ToolArgs::Map(map) => map.is_empty(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        match self {
            ToolArgs::Empty => None,
            ToolArgs::Map(map) => map.get(key),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            ArgValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Always a JSON object, `{}` for [`ToolArgs::Empty`].
    pub fn to_json(&self) -> Value {
        match self {
            ToolArgs::Empty => Value::Object(Map::new()),
            ToolArgs::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_inputs_are_empty() {
        for raw in ["", "{", "not json", "[1,2]", "42", "\"path\"", "null", "{}", "{\"a\":"] {
            assert_eq!(ToolArgs::parse(raw), ToolArgs::Empty, "input: {:?}", raw);
        }
    }

    #[test]
    fn test_nested_values_decode() {
        let args = ToolArgs::parse(r#"{"path":"src","depth":2,"opts":{"hidden":true},"tags":["a"]}"#);
        assert_eq!(args.get_str("path"), Some("src"));
        assert!(matches!(args.get("depth"), Some(ArgValue::Number(_))));
        assert!(matches!(args.get("opts"), Some(ArgValue::Object(m)) if m.get("hidden") == Some(&ArgValue::Bool(true))));
        assert_eq!(args.get_str("depth"), None);
        assert_eq!(args.to_json()["tags"][0], "a");
    }
}
