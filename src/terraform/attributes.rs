use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::TfstateError;

/// Dot-separated path into an instance's attribute mapping, e.g. `tags.Environment`.
///
/// Attribute values stay opaque: a path only walks nested mappings and never
/// looks inside arrays or interprets provider-specific meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePath {
    segments: Vec<String>,
}

impl AttributePath {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn get<'v>(&self, attributes: &'v Map<String, Value>) -> Option<&'v Value> {
        let (leaf, parents) = self.segments.split_last()?;
        let mut current = attributes;
        for segment in parents {
            current = current.get(segment)?.as_object()?;
        }
        current.get(leaf)
    }

    /// Sets the leaf value, creating missing intermediate mappings, and returns
    /// the value it replaced. Fails when an existing intermediate segment is
    /// not a mapping; in that case `attributes` is left as it was.
    pub fn set(
        &self,
        attributes: &mut Map<String, Value>,
        value: Value,
    ) -> Result<Option<Value>, TfstateError> {
        let Some((leaf, parents)) = self.segments.split_last() else {
            return Err(TfstateError::path("", "empty attribute path"));
        };

        // Check the whole walk before inserting anything.
        let mut cursor = Some(&*attributes);
        for (depth, segment) in parents.iter().enumerate() {
            cursor = match cursor.and_then(|map| map.get(segment)) {
                Some(Value::Object(map)) => Some(map),
                Some(_) => return Err(self.not_a_mapping(depth)),
                None => None,
            };
        }

        let mut current = attributes;
        for (depth, segment) in parents.iter().enumerate() {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            let Value::Object(map) = entry else {
                return Err(self.not_a_mapping(depth));
            };
            current = map;
        }
        Ok(current.insert(leaf.clone(), value))
    }

    fn not_a_mapping(&self, depth: usize) -> TfstateError {
        TfstateError::path(
            self.to_string(),
            format!("'{}' is not a mapping", self.segments[..=depth].join(".")),
        )
    }
}

impl FromStr for AttributePath {
    type Err = TfstateError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return Err(TfstateError::path(input, "empty attribute path"));
        }
        let segments: Vec<String> = input.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(TfstateError::path(input, "empty path segment"));
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Interprets a command-line value: JSON when it parses as JSON, otherwise a
/// plain string. `true`, `3`, `null` and `{"a":1}` become typed values while
/// `production` stays a string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_parse_path_segments() {
        let path: AttributePath = "tags.Environment".parse().unwrap();
        assert_eq!(path.segments(), ["tags", "Environment"]);
        assert_eq!(path.to_string(), "tags.Environment");
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        for bad in ["", "tags.", ".tags", "tags..Name"] {
            assert!(
                matches!(bad.parse::<AttributePath>(), Err(TfstateError::Path { .. })),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_get_nested_value() {
        let map = attrs(json!({"tags": {"Environment": "staging"}}));
        let path: AttributePath = "tags.Environment".parse().unwrap();
        assert_eq!(path.get(&map), Some(&json!("staging")));

        let missing: AttributePath = "tags.Owner".parse().unwrap();
        assert_eq!(missing.get(&map), None);
    }

    #[test]
    fn test_set_replaces_leaf_and_returns_previous() {
        let mut map = attrs(json!({"tags": {"Environment": "staging", "Name": "web"}}));
        let path: AttributePath = "tags.Environment".parse().unwrap();
        let previous = path.set(&mut map, json!("production")).unwrap();
        assert_eq!(previous, Some(json!("staging")));
        assert_eq!(
            Value::Object(map),
            json!({"tags": {"Environment": "production", "Name": "web"}})
        );
    }

    #[test]
    fn test_set_creates_intermediate_mappings() {
        let mut map = attrs(json!({"ami": "ami-123"}));
        let path: AttributePath = "metadata.labels.team".parse().unwrap();
        assert_eq!(path.set(&mut map, json!("infra")).unwrap(), None);
        assert_eq!(
            Value::Object(map),
            json!({"ami": "ami-123", "metadata": {"labels": {"team": "infra"}}})
        );
    }

    #[test]
    fn test_set_through_scalar_fails_without_changes() {
        let original = json!({"tags": {"Name": "web"}});
        let mut map = attrs(original.clone());
        let path: AttributePath = "tags.Name.first".parse().unwrap();
        match path.set(&mut map, json!(1)) {
            Err(TfstateError::Path { path, message }) => {
                assert_eq!(path, "tags.Name.first");
                assert_eq!(message, "'tags.Name' is not a mapping");
            }
            other => panic!("expected Path error, got {other:?}"),
        }
        assert_eq!(Value::Object(map), original);
    }

    #[test]
    fn test_set_through_array_fails() {
        let mut map = attrs(json!({"security_groups": ["sg-1"]}));
        let path: AttributePath = "security_groups.0".parse().unwrap();
        assert!(path.set(&mut map, json!("sg-2")).is_err());
    }

    #[test]
    fn test_parse_value_prefers_json() {
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("null"), Value::Null);
        assert_eq!(parse_value("[\"a\"]"), json!(["a"]));
        assert_eq!(parse_value("\"quoted\""), json!("quoted"));
        assert_eq!(parse_value("production"), json!("production"));
        assert_eq!(parse_value(""), json!(""));
    }
}
