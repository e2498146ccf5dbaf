use crate::codec::{Parameters, Value, WireRecord};
use crate::error::{FactoryError, Result};
use crate::identity::{is_valid_model_id, Identity};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A unit under test, as it announces itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub serial: String,
    pub random_id: String,
    pub model_id: String,
    pub fw_version: String,
    pub hw_version: String,
}

impl Device {
    #[must_use]
    pub fn new(
        serial: impl Into<String>,
        random_id: impl Into<String>,
        model_id: impl Into<String>,
        fw_version: impl Into<String>,
        hw_version: impl Into<String>,
    ) -> Self {
        Self {
            serial: serial.into(),
            random_id: random_id.into(),
            model_id: model_id.into(),
            fw_version: fw_version.into(),
            hw_version: hw_version.into(),
        }
    }

    /// Builds the announcement a provisioned device would send.
    #[must_use]
    pub fn from_identity(identity: &Identity, fw_version: impl Into<String>) -> Self {
        Self {
            serial: identity.serial.clone(),
            random_id: identity.random_id.clone(),
            model_id: identity.model_id.clone(),
            fw_version: fw_version.into(),
            hw_version: identity.hw_version.clone(),
        }
    }
}

impl WireRecord for Device {
    const RECORD: &'static str = "Device";
}

/// The test a runner hands to every matching device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpecification {
    pub description: String,
    pub target_model_id: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl TestSpecification {
    #[must_use]
    pub fn new(description: impl Into<String>, target_model_id: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            target_model_id: target_model_id.into(),
            parameters: Parameters::new(),
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_model_id(&self.target_model_id) {
            return Err(FactoryError::invalid(
                "target_model_id",
                format!(
                    "'{}' must be a letter followed by a digit",
                    self.target_model_id
                ),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn matches_model(&self, model_id: &str) -> bool {
        self.target_model_id == model_id
    }
}

impl WireRecord for TestSpecification {
    const RECORD: &'static str = "TestSpecification";
}

/// Outcome reported by a device once its test has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub device: Device,
    pub passed: bool,
    #[serde(default)]
    pub parameters: Parameters,
}

impl TestResult {
    #[must_use]
    pub fn new(device: Device, passed: bool) -> Self {
        Self {
            device,
            passed,
            parameters: Parameters::new(),
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Failed result recorded on behalf of a device that never reported back.
    #[must_use]
    pub fn timed_out(device: Device, timeout: Duration) -> Self {
        Self::new(device, false)
            .with_parameter("failure", "timeout")
            .with_parameter("timeout_secs", timeout.as_secs())
    }

    #[must_use]
    pub fn serial(&self) -> &str {
        &self.device.serial
    }
}

impl WireRecord for TestResult {
    const RECORD: &'static str = "TestResult";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, decode_str, encode};
    use serde_json::json;

    fn device() -> Device {
        Device::new("2301-001", "A1B2C3", "A1", "1.0.4", "1.1")
    }

    #[test]
    fn test_device_wire_names() {
        let text = encode(&device()).unwrap();
        assert_eq!(
            text,
            r#"{"serial":"2301-001","random_id":"A1B2C3","model_id":"A1","fw_version":"1.0.4","hw_version":"1.1"}"#
        );
    }

    #[test]
    fn test_result_rebuilds_nested_device() {
        let text = r#"{
            "device": {"serial":"2301-001","random_id":"A1B2C3","model_id":"A1","fw_version":"1.0.4","hw_version":"1.1"},
            "passed": true,
            "parameters": {"vbat_mv": 3012, "buttons": [true, true, false]}
        }"#;
        let result: TestResult = decode_str(text).unwrap();
        assert_eq!(result.device, device());
        assert!(result.passed);
        assert_eq!(result.parameters["vbat_mv"], json!(3012));
        assert_eq!(result.serial(), "2301-001");
    }

    #[test]
    fn test_result_nested_type_error_path() {
        let text = r#"{"device":{"serial":5,"random_id":"A1B2C3","model_id":"A1","fw_version":"1","hw_version":"1.1"},"passed":true}"#;
        let err = decode::<TestResult>(text.as_bytes()).unwrap_err();
        match err {
            FactoryError::Decode { path, .. } => assert_eq!(path, "TestResult.device.serial"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_result_missing_device_field() {
        let text = r#"{"device":{"serial":"2301-001","model_id":"A1","fw_version":"1","hw_version":"1.1"},"passed":false}"#;
        let err = decode::<TestResult>(text.as_bytes()).unwrap_err();
        match err {
            FactoryError::Decode { path, message } => {
                assert_eq!(path, "TestResult.device");
                assert!(message.contains("random_id"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_specification_parameters_optional() {
        let spec: TestSpecification =
            decode_str(r#"{"description":"Button check","target_model_id":"A1"}"#).unwrap();
        assert!(spec.parameters.is_empty());
        assert!(spec.matches_model("A1"));
        assert!(!spec.matches_model("B2"));
    }

    #[test]
    fn test_specification_validate() {
        assert!(TestSpecification::new("ok", "A1").validate().is_ok());
        assert!(matches!(
            TestSpecification::new("bad", "11").validate(),
            Err(FactoryError::InvalidField {
                field: "target_model_id",
                ..
            })
        ));
    }

    #[test]
    fn test_specification_keeps_parameter_order() {
        let spec = TestSpecification::new("Full", "A1")
            .with_parameter("timeout_s", 30)
            .with_parameter("leds", json!({"red": true, "green": false}))
            .with_parameter("buttons", 4);
        let text = encode(&spec).unwrap();
        assert_eq!(
            text,
            r#"{"description":"Full","target_model_id":"A1","parameters":{"timeout_s":30,"leds":{"red":true,"green":false},"buttons":4}}"#
        );
    }

    #[test]
    fn test_timed_out_result() {
        let result = TestResult::timed_out(device(), Duration::from_secs(90));
        assert!(!result.passed);
        assert_eq!(result.parameters["failure"], json!("timeout"));
        assert_eq!(result.parameters["timeout_secs"], json!(90));
    }

    #[test]
    fn test_device_from_identity() {
        let identity = Identity::new("2301-007", "ZZ99AA", "B2", "2.0");
        let device = Device::from_identity(&identity, "3.1.0");
        assert_eq!(device.serial, "2301-007");
        assert_eq!(device.model_id, "B2");
        assert_eq!(device.fw_version, "3.1.0");
        assert_eq!(device.hw_version, "2.0");
    }
}
