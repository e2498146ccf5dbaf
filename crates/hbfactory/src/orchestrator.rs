//! Test orchestration state machine.
//!
//! Per device serial:
//!
//! ```text
//! Unknown --announce (model matches)--> Dispatched --result--> Completed(verdict)
//!                                       Dispatched --deadline--> Completed(TimedOut)
//! ```
//!
//! Inbound messages are processed one at a time by [`TestOrchestrator::run_until`],
//! so every insert and removal on the in-flight set happens in a single
//! sequence while devices progress independently of each other.

use crate::report::ReportWriter;
use crate::transport::{BrokerEndpoint, InboundMessage, Transport};
use hbfactory_protocol::{
    encode, Device, ErrorScope, FactoryError, Inbound, Result, TestResult, TestSpecification,
    TopicRouter,
};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Shortest sweep period the run loop will use.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Deadline for a dispatched device to report. `None` waits forever.
    pub dispatch_timeout: Option<Duration>,
    /// How often expired devices are swept while a timeout is set.
    /// Periods below [`MIN_SWEEP_INTERVAL`] are raised to it.
    pub sweep_interval: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            dispatch_timeout: None,
            sweep_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Passed,
    Failed,
    TimedOut,
}

impl Verdict {
    fn from_passed(passed: bool) -> Self {
        if passed {
            Self::Passed
        } else {
            Self::Failed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Unknown,
    Dispatched,
    Completed(Verdict),
}

#[derive(Debug, Clone)]
pub struct InFlightDevice {
    pub device: Device,
    pub dispatched_at: Instant,
    pub deadline: Option<Instant>,
}

/// What handling one inbound message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Dispatched,
    AlreadyTracked,
    ModelMismatch,
    Completed(Verdict),
    UnknownDevice,
    Ignored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub announcements: u64,
    pub dispatched: u64,
    pub duplicates: u64,
    pub model_mismatches: u64,
    pub passed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub unknown_results: u64,
    pub rejected_messages: u64,
    pub publish_failures: u64,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Announcements:    {}", self.announcements)?;
        writeln!(f, "Dispatched:       {}", self.dispatched)?;
        writeln!(f, "Passed:           {}", self.passed)?;
        writeln!(f, "Failed:           {}", self.failed)?;
        writeln!(f, "Timed out:        {}", self.timed_out)?;
        writeln!(f, "Wrong model:      {}", self.model_mismatches)?;
        writeln!(f, "Duplicates:       {}", self.duplicates)?;
        writeln!(f, "Unknown results:  {}", self.unknown_results)?;
        writeln!(f, "Rejected:         {}", self.rejected_messages)?;
        write!(f, "Publish failures: {}", self.publish_failures)
    }
}

/// Dispatches one test specification to every matching device and records
/// the results.
pub struct TestOrchestrator<T: Transport> {
    spec: TestSpecification,
    spec_payload: Vec<u8>,
    router: TopicRouter,
    transport: T,
    report: ReportWriter,
    options: OrchestratorOptions,
    in_flight: HashMap<String, InFlightDevice>,
    // Last verdict per serial. Grows by one entry per tested device until
    // `clear_completed` is called.
    completed: HashMap<String, Verdict>,
    stats: RunStats,
}

impl<T: Transport> TestOrchestrator<T> {
    /// # Errors
    ///
    /// `InvalidField` if the specification targets a malformed model id.
    pub fn new(
        spec: TestSpecification,
        router: TopicRouter,
        transport: T,
        report: ReportWriter,
    ) -> Result<Self> {
        spec.validate()?;
        let spec_payload = encode(&spec)?.into_bytes();
        Ok(Self {
            spec,
            spec_payload,
            router,
            transport,
            report,
            options: OrchestratorOptions::default(),
            in_flight: HashMap::new(),
            completed: HashMap::new(),
            stats: RunStats::default(),
        })
    }

    #[must_use]
    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn spec(&self) -> &TestSpecification {
        &self.spec
    }

    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn in_flight(&self, serial: &str) -> Option<&InFlightDevice> {
        self.in_flight.get(serial)
    }

    pub fn in_flight_serials(&self) -> Vec<String> {
        let mut serials: Vec<String> = self.in_flight.keys().cloned().collect();
        serials.sort();
        serials
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Forgets every recorded verdict. In-flight devices are kept.
    pub fn clear_completed(&mut self) {
        self.completed.clear();
    }

    pub fn device_state(&self, serial: &str) -> DeviceState {
        if self.in_flight.contains_key(serial) {
            DeviceState::Dispatched
        } else if let Some(verdict) = self.completed.get(serial) {
            DeviceState::Completed(*verdict)
        } else {
            DeviceState::Unknown
        }
    }

    /// Connects, subscribes under the root topic and returns the inbound
    /// message stream to pass to [`run_until`](Self::run_until).
    pub async fn start(
        &mut self,
        endpoint: &BrokerEndpoint,
    ) -> Result<mpsc::UnboundedReceiver<InboundMessage>> {
        self.transport.connect(endpoint).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let filter = self.router.subscription_filter();
        self.transport
            .subscribe_all(&filter, move |message| {
                if tx.send(message).is_err() {
                    tracing::trace!("Inbound channel closed, message dropped");
                }
            })
            .await?;

        info!(
            filter = %filter,
            target_model_id = %self.spec.target_model_id,
            description = %self.spec.description,
            "Waiting for devices"
        );
        Ok(rx)
    }

    /// Classifies, decodes and applies one inbound message.
    ///
    /// # Errors
    ///
    /// Per-message errors (`Decode`, `TopicMismatch`) leave all state
    /// untouched. A failed `test_start` publish or report append is returned
    /// with the device still `Dispatched`.
    pub async fn handle_message(&mut self, message: &InboundMessage) -> Result<Outcome> {
        match self.router.route(&message.topic, &message.payload) {
            Ok(Inbound::Announcement(device)) => self.handle_announcement(device).await,
            Ok(Inbound::TestResult(result)) => self.handle_result(result).await,
            Ok(Inbound::Ignored) => Ok(Outcome::Ignored),
            Err(e) => {
                if e.is_per_message() {
                    self.stats.rejected_messages += 1;
                }
                Err(e)
            }
        }
    }

    pub async fn handle_announcement(&mut self, device: Device) -> Result<Outcome> {
        self.stats.announcements += 1;

        if self.in_flight.contains_key(&device.serial) {
            self.stats.duplicates += 1;
            debug!(serial = %device.serial, "Device already discovered");
            return Ok(Outcome::AlreadyTracked);
        }

        if !self.spec.matches_model(&device.model_id) {
            self.stats.model_mismatches += 1;
            warn!(
                serial = %device.serial,
                model_id = %device.model_id,
                expected = %self.spec.target_model_id,
                "Device has unsupported model ID"
            );
            return Ok(Outcome::ModelMismatch);
        }

        let serial = device.serial.clone();
        let now = Instant::now();
        let deadline = self.options.dispatch_timeout.map(|timeout| now + timeout);
        info!(
            serial = %serial,
            model_id = %device.model_id,
            fw_version = %device.fw_version,
            hw_version = %device.hw_version,
            "Discovered device"
        );
        self.completed.remove(&serial);
        self.in_flight.insert(
            serial.clone(),
            InFlightDevice {
                device,
                dispatched_at: now,
                deadline,
            },
        );
        self.stats.dispatched += 1;

        let topic = self.router.test_start_topic(&serial);
        if let Err(e) = self.transport.publish(&topic, self.spec_payload.clone()).await {
            self.stats.publish_failures += 1;
            error!(serial = %serial, topic = %topic, error = %e, "Failed to dispatch test");
            return Err(e);
        }

        debug!(serial = %serial, topic = %topic, "Test dispatched");
        Ok(Outcome::Dispatched)
    }

    pub async fn handle_result(&mut self, result: TestResult) -> Result<Outcome> {
        let serial = result.serial().to_string();
        if !self.in_flight.contains_key(&serial) {
            self.stats.unknown_results += 1;
            error!(serial = %serial, "Received test result for unknown device");
            return Ok(Outcome::UnknownDevice);
        }

        self.report.append(&result).await?;

        let verdict = Verdict::from_passed(result.passed);
        self.finish(&serial, verdict);
        if result.passed {
            info!(serial = %serial, "Test PASSED for device");
        } else {
            warn!(serial = %serial, parameters = ?result.parameters, "Test FAILED for device");
        }
        Ok(Outcome::Completed(verdict))
    }

    /// Fails every dispatched device whose deadline is at or before `now`.
    ///
    /// Each expired device gets a synthesized failed result in the report
    /// before it leaves the in-flight set. Returns the expired serials.
    pub async fn sweep_expired(&mut self, now: Instant) -> Result<Vec<String>> {
        let Some(timeout) = self.options.dispatch_timeout else {
            return Ok(Vec::new());
        };

        let mut expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.deadline.is_some_and(|deadline| deadline <= now))
            .map(|(serial, _)| serial.clone())
            .collect();
        expired.sort();

        for serial in &expired {
            let Some(entry) = self.in_flight.get(serial) else {
                continue;
            };
            let result = TestResult::timed_out(entry.device.clone(), timeout);
            self.report.append(&result).await?;
            self.finish(serial, Verdict::TimedOut);
            warn!(
                serial = %serial,
                timeout_secs = timeout.as_secs(),
                "Test TIMED OUT for device"
            );
        }

        Ok(expired)
    }

    /// Stops tracking a device without recording a result.
    pub fn release(&mut self, serial: &str) -> Option<InFlightDevice> {
        let entry = self.in_flight.remove(serial);
        if entry.is_some() {
            info!(serial = %serial, "Device released by operator");
        }
        entry
    }

    fn finish(&mut self, serial: &str, verdict: Verdict) {
        self.in_flight.remove(serial);
        self.completed.insert(serial.to_string(), verdict);
        match verdict {
            Verdict::Passed => self.stats.passed += 1,
            Verdict::Failed => self.stats.failed += 1,
            Verdict::TimedOut => self.stats.timed_out += 1,
        }
    }

    /// Processes inbound messages until the stream ends.
    pub async fn run(
        &mut self,
        inbound: mpsc::UnboundedReceiver<InboundMessage>,
    ) -> Result<RunStats> {
        self.run_until(inbound, std::future::pending()).await
    }

    /// Processes inbound messages until `shutdown` resolves or the stream
    /// ends, sweeping expired devices when a dispatch timeout is set.
    ///
    /// Message-scoped and transport errors are logged and the loop carries
    /// on. Only fatal errors end the run.
    pub async fn run_until<S>(
        &mut self,
        mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
        shutdown: S,
    ) -> Result<RunStats>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let sweeping = self.options.dispatch_timeout.is_some();
        let period = self.options.sweep_interval.max(MIN_SWEEP_INTERVAL);
        let mut sweep = tokio::time::interval(period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    debug!("Shutdown requested");
                    break;
                }
                message = inbound.recv() => {
                    let Some(message) = message else {
                        debug!("Inbound stream closed");
                        break;
                    };
                    if let Err(e) = self.handle_message(&message).await {
                        Self::log_failure(&message.topic, &e)?;
                    }
                }
                _ = sweep.tick(), if sweeping => {
                    if let Err(e) = self.sweep_expired(Instant::now()).await {
                        Self::log_failure("<sweep>", &e)?;
                    }
                }
            }
        }

        Ok(self.stats)
    }

    fn log_failure(topic: &str, e: &FactoryError) -> Result<()> {
        match e.scope() {
            ErrorScope::Message => {
                warn!(topic = %topic, error = %e, "Dropped inbound message");
                Ok(())
            }
            ErrorScope::Operation | ErrorScope::Transport => {
                error!(topic = %topic, error = %e, "Message handling failed");
                Ok(())
            }
            ErrorScope::Fatal => {
                error!(topic = %topic, error = %e, "Stopping orchestrator");
                Err(e.clone())
            }
        }
    }

    /// Disconnects from the broker and returns the final counters.
    pub async fn shutdown(&mut self) -> Result<RunStats> {
        if !self.in_flight.is_empty() {
            warn!(
                pending = ?self.in_flight_serials(),
                "Stopping with devices still under test"
            );
        }
        if self.transport.is_connected().await {
            self.transport.disconnect().await?;
        }
        info!(
            announcements = self.stats.announcements,
            dispatched = self.stats.dispatched,
            passed = self.stats.passed,
            failed = self.stats.failed,
            timed_out = self.stats.timed_out,
            "Orchestrator stopped"
        );
        Ok(self.stats)
    }
}
