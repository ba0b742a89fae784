//! Robot-mode output.
//!
//! Every command prints a single [`RobotOutput`] envelope so scripts can
//! parse success and failure the same way.

use serde::Serialize;

use crate::core::models::RobotOutput;
use crate::error::{PortalError, Result};

/// Render any serializable value as JSON.
pub fn render_json<T: Serialize>(output: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(output)?
    } else {
        serde_json::to_string(output)?
    })
}

/// Wrap `data` in the success envelope.
pub fn render_envelope<T: Serialize>(command: &str, data: &T, pretty: bool) -> Result<String> {
    render_json(&RobotOutput::new(command, data), pretty)
}

/// The failure envelope for `err`.
pub fn render_failure(command: &str, err: &PortalError, pretty: bool) -> Result<String> {
    render_json(&RobotOutput::<()>::failure(command, err), pretty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn envelope_wraps_data() {
        let out = render_envelope("usage", &json!({"total": 3}), false).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["schemaVersion"], "reip.v1");
        assert_eq!(value["command"], "usage");
        assert_eq!(value["data"]["total"], 3);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn failure_has_null_data_and_error_code() {
        let err = PortalError::QuotaExceeded { used: 30, limit: 30 };
        let out = render_failure("lookup", &err, true).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert!(value["data"].is_null());
        assert_eq!(value["error"]["code"], err.error_code());
        assert_eq!(value["error"]["retryable"], false);
    }
}
