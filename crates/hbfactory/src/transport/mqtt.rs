use crate::transport::{BrokerEndpoint, InboundMessage, Transport};
use hbfactory_protocol::{FactoryError, Result};
use mqtt5::{ConnectOptions, MqttClient, QoS, SubscribeOptions};
use std::future::Future;
use tracing::instrument;

/// [`Transport`] over an MQTT v5 broker connection.
pub struct MqttTransport {
    client: MqttClient,
    client_id: String,
}

impl MqttTransport {
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        Self {
            client: MqttClient::new(client_id.clone()),
            client_id,
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[instrument(skip(self, endpoint), fields(client_id = %self.client_id, host = %endpoint.host, port = endpoint.port), level = "debug")]
    async fn connect_endpoint(&self, endpoint: &BrokerEndpoint) -> Result<()> {
        let mut options = ConnectOptions::new(self.client_id.clone())
            .with_clean_start(true)
            .with_keep_alive(endpoint.keep_alive);

        if let Some(credentials) = &endpoint.credentials {
            options = options.with_credentials(
                credentials.username.clone(),
                credentials.password.clone().into_bytes(),
            );
        }

        let url = endpoint.url();
        match self.client.connect_with_options(&url, options).await {
            Ok(_) => {
                tracing::info!(client_id = %self.client_id, url = %url, "Connected to broker");
                Ok(())
            }
            Err(e) => {
                tracing::error!(client_id = %self.client_id, url = %url, error = %e, "Failed to connect to broker");
                Err(FactoryError::ConnectionError(format!("{url}: {e}")))
            }
        }
    }

    #[instrument(skip(self, callback), fields(client_id = %self.client_id), level = "debug")]
    async fn subscribe_filter<F>(&self, filter: &str, callback: F) -> Result<()>
    where
        F: Fn(InboundMessage) + Send + Sync + 'static,
    {
        let options = SubscribeOptions {
            qos: QoS::AtLeastOnce,
            ..Default::default()
        };
        let (_, granted_qos) = self
            .client
            .subscribe_with_options(filter, options, move |message| {
                callback(InboundMessage {
                    topic: message.topic,
                    payload: message.payload,
                });
            })
            .await
            .map_err(|e| FactoryError::SubscriptionFailed(format!("{filter}: {e}")))?;

        tracing::debug!(filter = %filter, granted_qos = ?granted_qos, "Subscription confirmed");
        Ok(())
    }

    async fn publish_payload(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish_qos(topic, payload, QoS::AtLeastOnce)
            .await
            .map(|_| ())
            .map_err(|e| FactoryError::PublishFailed(format!("{topic}: {e}")))
    }

    #[instrument(skip(self), fields(client_id = %self.client_id), level = "debug")]
    async fn disconnect_client(&self) -> Result<()> {
        if !self.client.is_connected().await {
            return Err(FactoryError::NotConnected);
        }
        self.client
            .disconnect()
            .await
            .map_err(|e| FactoryError::ConnectionError(e.to_string()))
    }
}

#[allow(clippy::manual_async_fn)]
impl Transport for MqttTransport {
    fn connect<'a>(
        &'a self,
        endpoint: &'a BrokerEndpoint,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move { self.connect_endpoint(endpoint).await }
    }

    fn subscribe_all<'a, F>(
        &'a self,
        filter: &'a str,
        callback: F,
    ) -> impl Future<Output = Result<()>> + Send + 'a
    where
        F: Fn(InboundMessage) + Send + Sync + 'static,
    {
        async move { self.subscribe_filter(filter, callback).await }
    }

    fn publish<'a>(
        &'a self,
        topic: &'a str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move { self.publish_payload(topic, payload).await }
    }

    fn disconnect(&self) -> impl Future<Output = Result<()>> + Send + '_ {
        async move { self.disconnect_client().await }
    }

    fn is_connected(&self) -> impl Future<Output = bool> + Send + '_ {
        async move { self.client.is_connected().await }
    }
}
