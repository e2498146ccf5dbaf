//! Topic layout under the factory root.
//!
//! ```text
//! <root>/devices/<serial>              announcement (device -> runner)
//! <root>/devices/<serial>/test_start   test specification (runner -> device)
//! <root>/devices/<serial>/test_result  result (device -> runner)
//! ```
//!
//! Anything else under the root, including the runner's own `test_start`
//! echoes, classifies as [`TopicKind::Other`] and is ignored.

use crate::codec::decode;
use crate::error::{FactoryError, Result};
use crate::types::{Device, TestResult};

pub const DEFAULT_ROOT_TOPIC: &str = "homebuttons-factory";
pub const DEVICES_SEGMENT: &str = "devices";
pub const TEST_START_SEGMENT: &str = "test_start";
pub const TEST_RESULT_SEGMENT: &str = "test_result";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind<'a> {
    Announcement { serial: &'a str },
    TestResult { serial: &'a str },
    Other,
}

/// A classified and decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Announcement(Device),
    TestResult(TestResult),
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRouter {
    root: String,
}

impl TopicRouter {
    /// # Errors
    ///
    /// `Configuration` if `root` is empty, contains wildcards or has a
    /// leading or trailing `/`.
    pub fn new(root: impl Into<String>) -> Result<Self> {
        let root = root.into();
        validate_root_topic(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Filter covering every topic under the root.
    #[must_use]
    pub fn subscription_filter(&self) -> String {
        format!("{}/#", self.root)
    }

    #[must_use]
    pub fn announcement_topic(&self, serial: &str) -> String {
        format!("{}/{DEVICES_SEGMENT}/{serial}", self.root)
    }

    #[must_use]
    pub fn test_start_topic(&self, serial: &str) -> String {
        format!("{}/{DEVICES_SEGMENT}/{serial}/{TEST_START_SEGMENT}", self.root)
    }

    #[must_use]
    pub fn test_result_topic(&self, serial: &str) -> String {
        format!("{}/{DEVICES_SEGMENT}/{serial}/{TEST_RESULT_SEGMENT}", self.root)
    }

    #[must_use]
    pub fn classify<'t>(&self, topic: &'t str) -> TopicKind<'t> {
        let Some(rest) = topic
            .strip_prefix(self.root.as_str())
            .and_then(|r| r.strip_prefix('/'))
            .and_then(|r| r.strip_prefix(DEVICES_SEGMENT))
            .and_then(|r| r.strip_prefix('/'))
        else {
            return TopicKind::Other;
        };

        let mut segments = rest.split('/');
        let serial = segments.next().unwrap_or_default();
        if serial.is_empty() {
            return TopicKind::Other;
        }

        match (segments.next(), segments.next()) {
            (None, _) => TopicKind::Announcement { serial },
            (Some(TEST_RESULT_SEGMENT), None) => TopicKind::TestResult { serial },
            _ => TopicKind::Other,
        }
    }

    /// Classifies `topic` and decodes `payload` into the matching record.
    ///
    /// Empty payloads are ignored. The serial carried in the payload must
    /// equal the serial segment of the topic.
    ///
    /// # Errors
    ///
    /// `Decode` for malformed payloads, `TopicMismatch` when the serials
    /// disagree.
    pub fn route(&self, topic: &str, payload: &[u8]) -> Result<Inbound> {
        if payload.is_empty() {
            return Ok(Inbound::Ignored);
        }

        match self.classify(topic) {
            TopicKind::Announcement { serial } => {
                let device: Device = decode(payload)?;
                ensure_serial(topic, serial, &device.serial)?;
                Ok(Inbound::Announcement(device))
            }
            TopicKind::TestResult { serial } => {
                let result: TestResult = decode(payload)?;
                ensure_serial(topic, serial, &result.device.serial)?;
                Ok(Inbound::TestResult(result))
            }
            TopicKind::Other => Ok(Inbound::Ignored),
        }
    }
}

impl Default for TopicRouter {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT_TOPIC.to_string(),
        }
    }
}

fn ensure_serial(topic: &str, topic_serial: &str, payload_serial: &str) -> Result<()> {
    if topic_serial == payload_serial {
        Ok(())
    } else {
        Err(FactoryError::TopicMismatch {
            topic: topic.to_string(),
            payload_serial: payload_serial.to_string(),
        })
    }
}

/// # Errors
///
/// `Configuration` describing the first problem found.
pub fn validate_root_topic(root: &str) -> Result<()> {
    if root.is_empty() {
        return Err(FactoryError::Configuration(
            "root topic cannot be empty".to_string(),
        ));
    }
    if root.contains(['+', '#']) {
        return Err(FactoryError::Configuration(format!(
            "root topic '{root}' cannot contain wildcards"
        )));
    }
    if root.starts_with('/') || root.ends_with('/') {
        return Err(FactoryError::Configuration(format!(
            "root topic '{root}' cannot start or end with '/'"
        )));
    }
    if root.contains('\0') {
        return Err(FactoryError::Configuration(
            "root topic cannot contain null characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;

    fn router() -> TopicRouter {
        TopicRouter::new("root").unwrap()
    }

    fn device(serial: &str) -> Device {
        Device::new(serial, "A1B2C3", "A1", "1.0.0", "1.1")
    }

    #[test]
    fn test_build_topics() {
        let router = router();
        assert_eq!(router.subscription_filter(), "root/#");
        assert_eq!(router.announcement_topic("2301-001"), "root/devices/2301-001");
        assert_eq!(
            router.test_start_topic("2301-001"),
            "root/devices/2301-001/test_start"
        );
        assert_eq!(
            router.test_result_topic("2301-001"),
            "root/devices/2301-001/test_result"
        );
        assert_eq!(TopicRouter::default().root(), "homebuttons-factory");
    }

    #[test]
    fn test_classify() {
        let router = router();
        assert_eq!(
            router.classify("root/devices/2301-001"),
            TopicKind::Announcement { serial: "2301-001" }
        );
        assert_eq!(
            router.classify("root/devices/2301-001/test_result"),
            TopicKind::TestResult { serial: "2301-001" }
        );
        for topic in [
            "root/devices/2301-001/test_start",
            "root/devices/2301-001/test_result/extra",
            "root/devices/",
            "root/devices",
            "root/status",
            "rootx/devices/2301-001",
            "other/devices/2301-001",
            "root//devices/2301-001",
        ] {
            assert_eq!(router.classify(topic), TopicKind::Other, "{topic}");
        }
    }

    #[test]
    fn test_classify_nested_root() {
        let router = TopicRouter::new("plant/line-3").unwrap();
        assert_eq!(
            router.classify("plant/line-3/devices/2301-001"),
            TopicKind::Announcement { serial: "2301-001" }
        );
        assert_eq!(router.classify("plant/devices/2301-001"), TopicKind::Other);
    }

    #[test]
    fn test_route_announcement() {
        let payload = encode(&device("2301-001")).unwrap();
        let inbound = router()
            .route("root/devices/2301-001", payload.as_bytes())
            .unwrap();
        assert_eq!(inbound, Inbound::Announcement(device("2301-001")));
    }

    #[test]
    fn test_route_announcement_mismatch() {
        let payload = encode(&device("2301-002")).unwrap();
        let err = router()
            .route("root/devices/2301-001", payload.as_bytes())
            .unwrap_err();
        assert!(matches!(err, FactoryError::TopicMismatch { .. }));
    }

    #[test]
    fn test_route_result_mismatch() {
        let result = TestResult::new(device("9999-999"), true);
        let payload = encode(&result).unwrap();
        let err = router()
            .route("root/devices/2301-001/test_result", payload.as_bytes())
            .unwrap_err();
        assert_eq!(
            err,
            FactoryError::TopicMismatch {
                topic: "root/devices/2301-001/test_result".to_string(),
                payload_serial: "9999-999".to_string(),
            }
        );
    }

    #[test]
    fn test_route_result() {
        let result = TestResult::new(device("2301-001"), false);
        let payload = encode(&result).unwrap();
        let inbound = router()
            .route("root/devices/2301-001/test_result", payload.as_bytes())
            .unwrap();
        assert_eq!(inbound, Inbound::TestResult(result));
    }

    #[test]
    fn test_route_ignores_empty_and_other() {
        let router = router();
        assert_eq!(
            router.route("root/devices/2301-001", b"").unwrap(),
            Inbound::Ignored
        );
        assert_eq!(
            router
                .route("root/devices/2301-001/test_start", b"{\"x\":1}")
                .unwrap(),
            Inbound::Ignored
        );
        assert_eq!(router.route("root/status", b"garbage").unwrap(), Inbound::Ignored);
    }

    #[test]
    fn test_route_malformed_payload() {
        let err = router()
            .route("root/devices/2301-001", b"{\"serial\":\"2301-001\"}")
            .unwrap_err();
        assert!(matches!(err, FactoryError::Decode { ref path, .. } if path == "Device"));
    }

    #[test]
    fn test_root_validation() {
        assert!(TopicRouter::new("homebuttons-factory").is_ok());
        assert!(TopicRouter::new("a/b").is_ok());
        for root in ["", "a/#", "a/+/b", "/a", "a/"] {
            assert!(
                matches!(TopicRouter::new(root), Err(FactoryError::Configuration(_))),
                "{root}"
            );
        }
    }
}
