//! Job payload type.

use serde_json::{Map, Value};

use filequeue_core::error::AppError;
use filequeue_core::result::AppResult;

/// Ordered mapping of string keys to arbitrary JSON values.
pub type JobPayload = Map<String, Value>;

/// Convert a JSON value into a payload, rejecting anything but an object.
///
/// `null` is accepted and yields an empty payload.
pub fn payload_from_value(value: Value) -> AppResult<JobPayload> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(AppError::invalid_job(format!(
            "Job payload must be a JSON object, got: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_keeps_key_order() {
        let payload = payload_from_value(json!({"zeta": 1, "alpha": 2})).expect("payload");
        let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_null_is_empty() {
        assert!(payload_from_value(Value::Null).expect("payload").is_empty());
    }

    #[test]
    fn test_scalar_rejected() {
        let err = payload_from_value(json!(42)).unwrap_err();
        assert_eq!(err.kind, filequeue_core::ErrorKind::InvalidJob);
    }
}
