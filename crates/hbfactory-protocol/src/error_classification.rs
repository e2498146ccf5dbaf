use crate::error::FactoryError;

/// How far the damage of an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorScope {
    /// Confined to one inbound message; drop it and keep going.
    Message,
    /// Confined to one provisioning or encode attempt.
    Operation,
    /// Broker connectivity; surfaced to the caller, never retried here.
    Transport,
    /// Must halt the surrounding workflow until an operator intervenes.
    Fatal,
}

impl FactoryError {
    #[must_use]
    pub fn scope(&self) -> ErrorScope {
        match self {
            Self::Decode { .. } | Self::TopicMismatch { .. } => ErrorScope::Message,
            Self::InvalidField { .. } | Self::Encode(_) | Self::Io(_) => ErrorScope::Operation,
            Self::ConnectionError(_)
            | Self::SubscriptionFailed(_)
            | Self::PublishFailed(_)
            | Self::NotConnected => ErrorScope::Transport,
            Self::EncodingIntegrity(_) | Self::Overflow(_) | Self::Configuration(_) => {
                ErrorScope::Fatal
            }
        }
    }

    /// Errors that only invalidate the message that produced them.
    #[must_use]
    pub fn is_per_message(&self) -> bool {
        self.scope() == ErrorScope::Message
    }

    #[must_use]
    pub fn is_transport(&self) -> bool {
        self.scope() == ErrorScope::Transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_scoped_errors() {
        let err = FactoryError::Decode {
            path: "Device".to_string(),
            message: "missing field `serial`".to_string(),
        };
        assert!(err.is_per_message());

        let err = FactoryError::TopicMismatch {
            topic: "root/devices/2301-001".to_string(),
            payload_serial: "2301-002".to_string(),
        };
        assert!(err.is_per_message());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_transport_and_fatal_scopes() {
        assert!(FactoryError::PublishFailed("broker gone".into()).is_transport());
        assert!(FactoryError::NotConnected.is_transport());
        assert_eq!(
            FactoryError::Overflow("2301-999".into()).scope(),
            ErrorScope::Fatal
        );
        assert_eq!(
            FactoryError::EncodingIntegrity("width".into()).scope(),
            ErrorScope::Fatal
        );
        assert_eq!(
            FactoryError::InvalidField {
                field: "serial",
                reason: "too short".into()
            }
            .scope(),
            ErrorScope::Operation
        );
    }
}
