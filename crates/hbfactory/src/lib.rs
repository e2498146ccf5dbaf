//! # Factory test runner
//!
//! Drives the factory test protocol over an MQTT broker: devices announce
//! themselves, the runner dispatches a test specification to every device of
//! the target model and records each result in an append-only report.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hbfactory::{MqttTransport, ReportWriter, RunnerConfig, TestOrchestrator};
//! use hbfactory::protocol::{decode_str, TestSpecification, TopicRouter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunnerConfig::default().with_report_path("report.txt");
//!     let spec: TestSpecification = decode_str(&std::fs::read_to_string("spec.json")?)?;
//!
//!     let mut orchestrator = TestOrchestrator::new(
//!         spec,
//!         TopicRouter::new(config.root_topic.clone())?,
//!         MqttTransport::new(config.client_id.clone()),
//!         ReportWriter::new("report.txt"),
//!     )?
//!     .with_options(config.orchestrator_options());
//!
//!     let inbound = orchestrator.start(&config.endpoint()).await?;
//!     orchestrator.run_until(inbound, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!     orchestrator.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub use hbfactory_protocol as protocol;

pub mod config;
pub mod orchestrator;
pub mod report;
pub mod transport;

pub use config::RunnerConfig;
pub use hbfactory_protocol::{FactoryError, Result};
pub use orchestrator::{
    DeviceState, InFlightDevice, OrchestratorOptions, Outcome, RunStats, TestOrchestrator, Verdict,
    MIN_SWEEP_INTERVAL,
};
pub use report::ReportWriter;
pub use transport::{
    BrokerEndpoint, Credentials, InboundMessage, MockCall, MockTransport, MqttTransport, Transport,
};
