//! Runner configuration
//!
//! Loaded from a JSON file and overridden from the command line. Durations
//! use humantime strings such as `"90s"` or `"2m"`.

use crate::orchestrator::OrchestratorOptions;
use crate::transport::BrokerEndpoint;
use hbfactory_protocol::topic::validate_root_topic;
use hbfactory_protocol::{FactoryError, Result, DEFAULT_ROOT_TOPIC};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    /// Client id presented to the broker
    pub client_id: String,

    #[serde(with = "humantime_serde")]
    pub keep_alive: Duration,

    /// Topic prefix shared with the devices
    pub root_topic: String,

    /// Report file; no report is written when unset
    pub report_path: Option<PathBuf>,

    /// How long a dispatched device may stay silent before it is failed.
    /// Unset means devices wait indefinitely.
    #[serde(with = "humantime_serde")]
    pub dispatch_timeout: Option<Duration>,

    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            username: None,
            password: None,
            client_id: format!("hbfactory-runner-{}", rand::rng().random::<u32>()),
            keep_alive: Duration::from_secs(60),
            root_topic: DEFAULT_ROOT_TOPIC.to_string(),
            report_path: None,
            dispatch_timeout: None,
            sweep_interval: Duration::from_secs(5),
        }
    }
}

impl RunnerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a JSON configuration file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FactoryError::Configuration(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| FactoryError::Configuration(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_broker(mut self, host: impl Into<String>, port: u16) -> Self {
        self.broker_host = host.into();
        self.broker_port = port;
        self
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    #[must_use]
    pub fn with_root_topic(mut self, root_topic: impl Into<String>) -> Self {
        self.root_topic = root_topic.into();
        self
    }

    #[must_use]
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<&Self> {
        if self.broker_host.is_empty() {
            return Err(FactoryError::Configuration(
                "broker_host cannot be empty".to_string(),
            ));
        }

        if self.broker_port == 0 {
            return Err(FactoryError::Configuration(
                "broker_port must be greater than 0".to_string(),
            ));
        }

        if self.username.is_some() != self.password.is_some() {
            return Err(FactoryError::Configuration(
                "username and password must be given together".to_string(),
            ));
        }

        if self.client_id.is_empty() {
            return Err(FactoryError::Configuration(
                "client_id cannot be empty".to_string(),
            ));
        }

        validate_root_topic(&self.root_topic)?;

        if self.sweep_interval.is_zero() {
            return Err(FactoryError::Configuration(
                "sweep_interval must be greater than 0".to_string(),
            ));
        }

        if self.dispatch_timeout.is_some_and(|t| t.is_zero()) {
            return Err(FactoryError::Configuration(
                "dispatch_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(self)
    }

    #[must_use]
    pub fn endpoint(&self) -> BrokerEndpoint {
        let endpoint =
            BrokerEndpoint::new(self.broker_host.clone(), self.broker_port).with_keep_alive(self.keep_alive);
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => {
                endpoint.with_credentials(username.clone(), password.clone())
            }
            _ => endpoint,
        }
    }

    #[must_use]
    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            dispatch_timeout: self.dispatch_timeout,
            sweep_interval: self.sweep_interval,
        }
    }
}
