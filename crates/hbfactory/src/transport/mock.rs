use crate::transport::{BrokerEndpoint, InboundMessage, Transport};
use hbfactory_protocol::{FactoryError, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

type Callback = Arc<dyn Fn(InboundMessage) + Send + Sync>;

/// A call recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Connect {
        host: String,
        port: u16,
        username: Option<String>,
    },
    SubscribeAll {
        filter: String,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
    },
    Disconnect,
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    connected: bool,
    callback: Option<Callback>,
    fail_connect: bool,
    fail_publish: bool,
}

/// In-memory [`Transport`] that records every call.
///
/// Clones share state, so a test can hand one clone to the orchestrator and
/// keep another to inject messages and inspect publishes.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Every successful publish as `(topic, payload)`.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Publish { topic, payload } => Some((topic.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn publishes_to(&self, topic: &str) -> usize {
        self.published().iter().filter(|(t, _)| t == topic).count()
    }

    pub fn set_connect_failure(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    pub fn set_publish_failure(&self, fail: bool) {
        self.state.lock().fail_publish = fail;
    }

    /// Delivers a message to the subscription callback as the broker would.
    ///
    /// Returns `false` when nothing is subscribed.
    pub fn inject(&self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> bool {
        let callback = self.state.lock().callback.clone();
        match callback {
            Some(callback) => {
                callback(InboundMessage::new(topic, payload));
                true
            }
            None => false,
        }
    }
}

#[allow(clippy::manual_async_fn)]
impl Transport for MockTransport {
    fn connect<'a>(
        &'a self,
        endpoint: &'a BrokerEndpoint,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move {
            let mut state = self.state.lock();
            if state.fail_connect {
                return Err(FactoryError::ConnectionError(format!(
                    "{}: connection refused",
                    endpoint.url()
                )));
            }
            state.calls.push(MockCall::Connect {
                host: endpoint.host.clone(),
                port: endpoint.port,
                username: endpoint.credentials.as_ref().map(|c| c.username.clone()),
            });
            state.connected = true;
            Ok(())
        }
    }

    fn subscribe_all<'a, F>(
        &'a self,
        filter: &'a str,
        callback: F,
    ) -> impl Future<Output = Result<()>> + Send + 'a
    where
        F: Fn(InboundMessage) + Send + Sync + 'static,
    {
        async move {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(FactoryError::NotConnected);
            }
            state.calls.push(MockCall::SubscribeAll {
                filter: filter.to_string(),
            });
            state.callback = Some(Arc::new(callback));
            Ok(())
        }
    }

    fn publish<'a>(
        &'a self,
        topic: &'a str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(FactoryError::NotConnected);
            }
            if state.fail_publish {
                return Err(FactoryError::PublishFailed(format!(
                    "{topic}: injected failure"
                )));
            }
            state.calls.push(MockCall::Publish {
                topic: topic.to_string(),
                payload,
            });
            Ok(())
        }
    }

    fn disconnect(&self) -> impl Future<Output = Result<()>> + Send + '_ {
        async move {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(FactoryError::NotConnected);
            }
            state.calls.push(MockCall::Disconnect);
            state.connected = false;
            state.callback = None;
            Ok(())
        }
    }

    fn is_connected(&self) -> impl Future<Output = bool> + Send + '_ {
        async move { self.state.lock().connected }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_records_calls() {
        let mock = MockTransport::new();
        let endpoint = BrokerEndpoint::new("localhost", 1883).with_credentials("op", "pw");
        mock.connect(&endpoint).await.unwrap();
        mock.subscribe_all("root/#", |_| {}).await.unwrap();
        mock.publish("root/x", b"hi".to_vec()).await.unwrap();
        mock.disconnect().await.unwrap();

        assert_eq!(
            mock.calls(),
            vec![
                MockCall::Connect {
                    host: "localhost".to_string(),
                    port: 1883,
                    username: Some("op".to_string()),
                },
                MockCall::SubscribeAll {
                    filter: "root/#".to_string()
                },
                MockCall::Publish {
                    topic: "root/x".to_string(),
                    payload: b"hi".to_vec()
                },
                MockCall::Disconnect,
            ]
        );
        assert_eq!(mock.publishes_to("root/x"), 1);
    }

    #[tokio::test]
    async fn test_inject_reaches_callback() {
        let mock = MockTransport::new();
        assert!(!mock.inject("root/x", b"early".to_vec()));

        mock.connect(&BrokerEndpoint::new("localhost", 1883))
            .await
            .unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        mock.subscribe_all("root/#", move |msg| {
            assert_eq!(msg.topic, "root/x");
            seen_clone.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

        assert!(mock.inject("root/x", b"one".to_vec()));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let mock = MockTransport::new();
        assert_eq!(
            mock.publish("t", Vec::new()).await,
            Err(FactoryError::NotConnected)
        );

        mock.set_connect_failure(true);
        assert!(matches!(
            mock.connect(&BrokerEndpoint::new("localhost", 1883)).await,
            Err(FactoryError::ConnectionError(_))
        ));
        mock.set_connect_failure(false);
        mock.connect(&BrokerEndpoint::new("localhost", 1883))
            .await
            .unwrap();

        mock.set_publish_failure(true);
        assert!(matches!(
            mock.publish("t", Vec::new()).await,
            Err(FactoryError::PublishFailed(_))
        ));
        assert!(mock.published().is_empty());
    }
}
