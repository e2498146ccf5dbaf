use thiserror::Error;

pub type Result<T> = std::result::Result<T, FactoryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Encoding integrity check failed: {0}")]
    EncodingIntegrity(String),

    #[error("Decode error at {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Topic {topic} does not match device serial {payload_serial}")]
    TopicMismatch {
        topic: String,
        payload_serial: String,
    },

    #[error("Serial number overflow: {0}")]
    Overflow(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FactoryError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for FactoryError {
    fn from(err: std::io::Error) -> Self {
        FactoryError::Io(err.to_string())
    }
}
