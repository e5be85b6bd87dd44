//! # Request/Response Transformation
//!
//! Declarative reshaping of JSON payloads attached to a route.
//!
//! Response rules run in a fixed order, each step only if configured:
//! 1. **extract** – walk a dotted path into the payload (missing segments yield `null`)
//! 2. **rename** – move top-level keys to new names
//! 3. **remove** – delete top-level keys
//! 4. **wrap** – nest the whole result under a single field
//!
//! Request rules run rename, remove, then add, before the request leaves the dispatcher.
//!
//! Rules that contradict each other (a key renamed and removed, two keys renamed onto the
//! same target, ...) are a configuration defect and fail with
//! [`GatewayError::Transformation`] instead of producing silently corrupted output.

use crate::core::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Request- and response-side rules declared on a route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestTransformation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseTransformation>,
}

impl TransformationConfig {
    pub fn is_empty(&self) -> bool {
        self.request.is_none() && self.response.is_none()
    }
}

/// Rules applied to the inbound body before dispatch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestTransformation {
    /// old key -> new key
    pub rename: BTreeMap<String, String>,
    pub remove: BTreeSet<String>,
    /// key -> value inserted (overwriting) after rename and remove
    pub add: BTreeMap<String, JsonValue>,
}

/// Rules applied to the upstream result before caching
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseTransformation {
    pub rename: BTreeMap<String, String>,
    pub remove: BTreeSet<String>,
    /// Dotted path into the nested response, e.g. `data.results`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract_path: Option<String>,
    /// Field to nest the whole result under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap_field: Option<String>,
}

impl RequestTransformation {
    /// Reject contradictory rule sets
    pub fn validate(&self) -> GatewayResult<()> {
        validate_rename_remove(&self.rename, &self.remove)?;

        for key in self.add.keys() {
            if self.remove.contains(key) {
                return Err(GatewayError::transformation(format!(
                    "request key '{}' is both added and removed",
                    key
                )));
            }
            if self.rename.values().any(|target| target == key) {
                return Err(GatewayError::transformation(format!(
                    "request key '{}' is both a rename target and added",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Apply rename, remove and add to an inbound body
    ///
    /// Non-object bodies pass through untouched, except `null` which becomes an object
    /// when there is something to add.
    pub fn apply(&self, body: JsonValue) -> GatewayResult<JsonValue> {
        self.validate()?;

        let mut object = match body {
            JsonValue::Object(object) => object,
            JsonValue::Null if !self.add.is_empty() => Map::new(),
            other => return Ok(other),
        };

        rename_keys(&mut object, &self.rename);
        remove_keys(&mut object, &self.remove);
        for (key, value) in &self.add {
            object.insert(key.clone(), value.clone());
        }

        Ok(JsonValue::Object(object))
    }
}

impl ResponseTransformation {
    /// Reject contradictory or malformed rule sets
    pub fn validate(&self) -> GatewayResult<()> {
        validate_rename_remove(&self.rename, &self.remove)?;

        if let Some(path) = &self.extract_path {
            if path.is_empty() || path.split('.').any(str::is_empty) {
                return Err(GatewayError::transformation(format!(
                    "extract path '{}' has an empty segment",
                    path
                )));
            }
        }

        if let Some(field) = &self.wrap_field {
            if field.is_empty() {
                return Err(GatewayError::transformation("wrap field must not be empty"));
            }
        }
        Ok(())
    }

    /// Apply extract, rename, remove and wrap, in that order
    pub fn apply(&self, data: JsonValue) -> GatewayResult<JsonValue> {
        self.validate()?;

        let mut current = match &self.extract_path {
            Some(path) => extract_path(data, path),
            None => data,
        };

        if let JsonValue::Object(object) = &mut current {
            rename_keys(object, &self.rename);
            remove_keys(object, &self.remove);
        }

        Ok(match &self.wrap_field {
            Some(field) => {
                let mut wrapper = Map::new();
                wrapper.insert(field.clone(), current);
                JsonValue::Object(wrapper)
            }
            None => current,
        })
    }
}

/// Apply response-side rules
pub fn transform_response(data: JsonValue, config: &ResponseTransformation) -> GatewayResult<JsonValue> {
    config.apply(data)
}

/// Apply request-side rules
pub fn transform_request(body: JsonValue, config: &RequestTransformation) -> GatewayResult<JsonValue> {
    config.apply(body)
}

fn validate_rename_remove(rename: &BTreeMap<String, String>, remove: &BTreeSet<String>) -> GatewayResult<()> {
    let mut targets = HashSet::new();

    for (source, target) in rename {
        if source == target {
            continue;
        }
        if !targets.insert(target.as_str()) {
            return Err(GatewayError::transformation(format!(
                "more than one key is renamed to '{}'",
                target
            )));
        }
        if rename.contains_key(target) {
            return Err(GatewayError::transformation(format!(
                "rename target '{}' is itself renamed",
                target
            )));
        }
        if remove.contains(source) || remove.contains(target) {
            return Err(GatewayError::transformation(format!(
                "key '{}' is both renamed and removed",
                if remove.contains(source) { source } else { target }
            )));
        }
    }
    Ok(())
}

/// Walk a dotted path; array segments are numeric indexes
fn extract_path(data: JsonValue, path: &str) -> JsonValue {
    let mut current = data;
    for segment in path.split('.') {
        current = match current {
            JsonValue::Object(mut object) => object.remove(segment).unwrap_or(JsonValue::Null),
            JsonValue::Array(mut items) => match segment.parse::<usize>() {
                Ok(index) if index < items.len() => items.swap_remove(index),
                _ => JsonValue::Null,
            },
            _ => JsonValue::Null,
        };
        if current.is_null() {
            break;
        }
    }
    current
}

fn rename_keys(object: &mut Map<String, JsonValue>, rename: &BTreeMap<String, String>) {
    for (source, target) in rename {
        if source == target {
            continue;
        }
        if let Some(value) = object.remove(source) {
            object.insert(target.clone(), value);
        }
    }
}

fn remove_keys(object: &mut Map<String, JsonValue>, remove: &BTreeSet<String>) {
    for key in remove {
        object.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(
        rename: &[(&str, &str)],
        remove: &[&str],
        extract_path: Option<&str>,
        wrap_field: Option<&str>,
    ) -> ResponseTransformation {
        ResponseTransformation {
            rename: rename
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            remove: remove.iter().map(|k| k.to_string()).collect(),
            extract_path: extract_path.map(str::to_string),
            wrap_field: wrap_field.map(str::to_string),
        }
    }

    #[test]
    fn test_rename_remove_wrap_composition() {
        let config = response(&[("a", "x")], &["b"], None, Some("data"));
        let output = transform_response(json!({"a": 1, "b": 2, "c": 3}), &config).unwrap();
        assert_eq!(output, json!({"data": {"x": 1, "c": 3}}));
    }

    #[test]
    fn test_extract_runs_before_rename() {
        let config = response(&[("id", "hotelId")], &[], Some("data.hotel"), None);
        let output = transform_response(
            json!({"data": {"hotel": {"id": 7, "name": "Seaside"}}, "meta": {}}),
            &config,
        )
        .unwrap();
        assert_eq!(output, json!({"hotelId": 7, "name": "Seaside"}));
    }

    #[test]
    fn test_extract_missing_segment_yields_null() {
        let config = response(&[], &[], Some("data.missing.deeper"), Some("result"));
        let output = transform_response(json!({"data": {"present": true}}), &config).unwrap();
        assert_eq!(output, json!({"result": null}));
    }

    #[test]
    fn test_extract_indexes_arrays() {
        let config = response(&[], &[], Some("flights.1.code"), None);
        let output = transform_response(
            json!({"flights": [{"code": "LH1"}, {"code": "BA2"}]}),
            &config,
        )
        .unwrap();
        assert_eq!(output, json!("BA2"));
    }

    #[test]
    fn test_rename_ignores_absent_keys_and_non_objects() {
        let config = response(&[("missing", "x")], &["also_missing"], None, None);
        assert_eq!(
            transform_response(json!({"a": 1}), &config).unwrap(),
            json!({"a": 1})
        );
        assert_eq!(transform_response(json!([1, 2]), &config).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_conflicting_rules_are_rejected() {
        let renamed_and_removed = response(&[("a", "x")], &["a"], None, None);
        assert!(matches!(
            transform_response(json!({}), &renamed_and_removed),
            Err(GatewayError::Transformation { .. })
        ));

        let target_removed = response(&[("a", "x")], &["x"], None, None);
        assert!(target_removed.validate().is_err());

        let duplicate_target = response(&[("a", "x"), ("b", "x")], &[], None, None);
        assert!(duplicate_target.validate().is_err());

        let chained = response(&[("a", "b"), ("b", "c")], &[], None, None);
        assert!(chained.validate().is_err());

        let empty_segment = response(&[], &[], Some("data..x"), None);
        assert!(empty_segment.validate().is_err());

        let empty_wrap = response(&[], &[], None, Some(""));
        assert!(empty_wrap.validate().is_err());
    }

    #[test]
    fn test_request_rename_remove_add() {
        let config = RequestTransformation {
            rename: [("dest".to_string(), "destination".to_string())].into(),
            remove: ["debug".to_string()].into(),
            add: [("channel".to_string(), json!("web"))].into(),
        };
        let body = transform_request(json!({"dest": "LIS", "debug": true, "adults": 2}), &config).unwrap();
        assert_eq!(
            body,
            json!({"destination": "LIS", "adults": 2, "channel": "web"})
        );
    }

    #[test]
    fn test_request_add_on_null_body() {
        let config = RequestTransformation {
            add: [("source".to_string(), json!("gateway"))].into(),
            ..Default::default()
        };
        assert_eq!(
            transform_request(JsonValue::Null, &config).unwrap(),
            json!({"source": "gateway"})
        );
    }

    #[test]
    fn test_request_add_and_remove_same_key_is_rejected() {
        let config = RequestTransformation {
            remove: ["k".to_string()].into(),
            add: [("k".to_string(), json!(1))].into(),
            ..Default::default()
        };
        assert!(matches!(
            transform_request(json!({}), &config),
            Err(GatewayError::Transformation { .. })
        ));
    }
}
