//! Flattening provider responses into a [`SecretBundle`].
//!
//! Accepted shapes:
//!
//! | Shape                 | Location of the mapping                          | Seen from            |
//! |-----------------------|--------------------------------------------------|----------------------|
//! | v2 key/value secret   | `data`                                           | API, saved responses |
//! | v2 arbitrary secret   | `payload` (JSON string or object)                | API, saved responses |
//! | v1 arbitrary secret   | `resources[0].secret_data.payload`               | saved responses only |
//! | bare mapping          | the document itself                              | local files          |
//!
//! The client only calls the v2 API; the v1 shape is read so that responses
//! exported from the older API still work as `--secrets-file` input.

use serde_json::{Map, Value};

use offsite_core::SecretBundle;

use crate::error::SecretError;

const RESPONSE_FIELDS: &[&str] = &["data", "payload", "resources"];

/// Extract the bundle from a Secrets Manager `GET /secrets/{id}` response.
pub fn bundle_from_response(body: &Value) -> Result<SecretBundle, SecretError> {
    if let Some(data) = body.get("data") {
        return bundle_from_mapping(data);
    }
    if let Some(payload) = body.get("payload") {
        return bundle_from_payload(payload);
    }
    if let Some(payload) = body
        .get("resources")
        .and_then(|r| r.get(0))
        .and_then(|r| r.get("secret_data"))
        .and_then(|d| d.get("payload"))
    {
        return bundle_from_payload(payload);
    }

    Err(SecretError::MalformedPayload(
        "response has no `data`, `payload` or `resources[0].secret_data.payload`".to_owned(),
    ))
}

/// A local document: either a saved provider response or a bare mapping.
pub fn bundle_from_document(value: &Value) -> Result<SecretBundle, SecretError> {
    let looks_like_response = value
        .as_object()
        .is_some_and(|map| RESPONSE_FIELDS.iter().any(|f| map.contains_key(*f)));
    if looks_like_response {
        bundle_from_response(value)
    } else {
        bundle_from_mapping(value)
    }
}

fn bundle_from_payload(payload: &Value) -> Result<SecretBundle, SecretError> {
    match payload {
        Value::String(encoded) => {
            let decoded: Value = serde_json::from_str(encoded).map_err(|e| {
                SecretError::MalformedPayload(format!("payload string is not JSON: {e}"))
            })?;
            bundle_from_mapping(&decoded)
        }
        other => bundle_from_mapping(other),
    }
}

/// Turn a flat JSON object into a bundle. Scalars are stringified; nested
/// values and nulls are rejected.
pub fn bundle_from_mapping(value: &Value) -> Result<SecretBundle, SecretError> {
    let Value::Object(map) = value else {
        return Err(SecretError::MalformedPayload(format!(
            "expected a key/value object, found {}",
            kind(value)
        )));
    };
    flatten(map)
}

fn flatten(map: &Map<String, Value>) -> Result<SecretBundle, SecretError> {
    let mut entries = Vec::with_capacity(map.len());
    for (key, value) in map {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(SecretError::MalformedPayload(format!(
                    "value for `{key}` is {}, expected a string",
                    kind(other)
                )))
            }
        };
        entries.push((key.clone(), text));
    }
    Ok(SecretBundle::from_iter(entries))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn v2_kv_secret() {
        let body = json!({
            "id": "e4d3",
            "secret_type": "kv",
            "data": {"SOURCE_ENDPOINT": "s3.src", "DIAS_PARA_ARCHIVAR": 30}
        });
        let bundle = bundle_from_response(&body).unwrap();
        assert_eq!(bundle.get("SOURCE_ENDPOINT"), Some("s3.src"));
        assert_eq!(bundle.get("DIAS_PARA_ARCHIVAR"), Some("30"));
    }

    #[test]
    fn v2_arbitrary_secret_payload_string() {
        let body = json!({
            "id": "e4d3",
            "secret_type": "arbitrary",
            "payload": "{\"COS_SOURCE_NAME\":\"prod-data\",\"DIAS_PARA_ELIMINAR\":90}"
        });
        let bundle = bundle_from_response(&body).unwrap();
        assert_eq!(bundle.get("COS_SOURCE_NAME"), Some("prod-data"));
        assert_eq!(bundle.get("DIAS_PARA_ELIMINAR"), Some("90"));
    }

    #[test]
    fn document_without_response_fields_is_bare_mapping() {
        let bundle = bundle_from_document(&json!({"SOURCE_ENDPOINT": "s3.src"})).unwrap();
        assert_eq!(bundle.get("SOURCE_ENDPOINT"), Some("s3.src"));
    }

    #[test]
    fn v1_payload_object() {
        let body = json!({
            "resources": [{"secret_data": {"payload": {"COS_SOURCE_NAME": "prod-data"}}}]
        });
        let bundle = bundle_from_response(&body).unwrap();
        assert_eq!(bundle.get("COS_SOURCE_NAME"), Some("prod-data"));
    }

    #[test]
    fn v1_payload_json_string() {
        let body = json!({
            "resources": [{"secret_data": {"payload": "{\"COS_SOURCE_NAME\":\"prod-data\"}"}}]
        });
        let bundle = bundle_from_response(&body).unwrap();
        assert_eq!(bundle.get("COS_SOURCE_NAME"), Some("prod-data"));
    }

    #[test]
    fn unexpected_shape_is_malformed() {
        let err = bundle_from_response(&json!({"resources": []})).unwrap_err();
        assert!(matches!(err, SecretError::MalformedPayload(_)));
    }

    #[test]
    fn nested_values_are_rejected() {
        let err = bundle_from_mapping(&json!({"A": {"nested": true}})).unwrap_err();
        assert!(err.to_string().contains("`A`"));
    }

    #[test]
    fn non_object_data_is_rejected() {
        let err = bundle_from_response(&json!({"data": ["a", "b"]})).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }
}
