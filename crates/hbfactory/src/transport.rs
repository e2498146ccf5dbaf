//! Broker transport seam.
//!
//! The orchestrator only needs four primitives from a message broker client:
//! connect, subscribe to everything under a filter, publish, and disconnect.
//! [`MqttTransport`] provides them over `mqtt5`; [`MockTransport`] records
//! calls for tests.

use hbfactory_protocol::Result;
use std::fmt;
use std::future::Future;
use std::time::Duration;

pub mod mock;
pub mod mqtt;

pub use mock::{MockCall, MockTransport};
pub use mqtt::MqttTransport;

/// A message delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and how to reach the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub keep_alive: Duration,
    pub credentials: Option<Credentials>,
}

impl BrokerEndpoint {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            keep_alive: Duration::from_secs(60),
            credentials: None,
        }
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("mqtt://{}:{}", self.host, self.port)
    }
}

/// Publish/subscribe primitives the orchestrator depends on.
///
/// Inbound messages are handed to the subscription callback as they arrive,
/// with no ordering guarantee across topics.
pub trait Transport: Send + Sync {
    fn connect<'a>(
        &'a self,
        endpoint: &'a BrokerEndpoint,
    ) -> impl Future<Output = Result<()>> + Send + 'a;

    fn subscribe_all<'a, F>(
        &'a self,
        filter: &'a str,
        callback: F,
    ) -> impl Future<Output = Result<()>> + Send + 'a
    where
        F: Fn(InboundMessage) + Send + Sync + 'static;

    fn publish<'a>(
        &'a self,
        topic: &'a str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<()>> + Send + 'a;

    fn disconnect(&self) -> impl Future<Output = Result<()>> + Send + '_;

    fn is_connected(&self) -> impl Future<Output = bool> + Send + '_;
}
