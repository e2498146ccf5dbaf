use super::parsers::parse_duration;
use anyhow::{Context, Result};
use clap::Args;
use hbfactory::protocol::{decode, TestSpecification, TopicRouter};
use hbfactory::{MqttTransport, ReportWriter, RunnerConfig, TestOrchestrator};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal;
use tracing::{debug, info, warn};

#[derive(Args)]
pub struct TestCommand {
    /// Test specification (JSON with description, target_model_id, parameters)
    pub spec: PathBuf,

    /// Append results to this report file
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Runner configuration file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// MQTT broker host
    #[arg(long, short = 'H')]
    pub host: Option<String>,

    /// MQTT broker port
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Username for authentication
    #[arg(long, short, requires = "password")]
    pub username: Option<String>,

    /// Password for authentication
    #[arg(long, short = 'P', requires = "username")]
    pub password: Option<String>,

    /// Topic prefix shared with the devices
    #[arg(long)]
    pub root_topic: Option<String>,

    /// Fail devices that do not report within this time (e.g. 90s, 5m)
    #[arg(long, value_parser = parse_duration)]
    pub dispatch_timeout: Option<Duration>,

    /// Client ID
    #[arg(long, short)]
    pub client_id: Option<String>,
}

fn build_config(cmd: &TestCommand) -> Result<RunnerConfig> {
    let mut config = if let Some(path) = &cmd.config {
        debug!("Loading configuration from: {:?}", path);
        RunnerConfig::load(path).with_context(|| format!("Failed to load config from {path:?}"))?
    } else {
        RunnerConfig::default()
    };

    if let Some(host) = &cmd.host {
        config.broker_host.clone_from(host);
    }
    if let Some(port) = cmd.port {
        config.broker_port = port;
    }
    if let (Some(username), Some(password)) = (&cmd.username, &cmd.password) {
        config = config.with_credentials(username, password);
    }
    if let Some(root_topic) = &cmd.root_topic {
        config.root_topic.clone_from(root_topic);
    }
    if let Some(output) = &cmd.output {
        config.report_path = Some(output.clone());
    }
    if let Some(timeout) = cmd.dispatch_timeout {
        config.dispatch_timeout = Some(timeout);
    }
    if let Some(client_id) = &cmd.client_id {
        config.client_id.clone_from(client_id);
    }

    config.validate().context("Invalid runner configuration")?;
    Ok(config)
}

async fn load_spec(path: &Path) -> Result<TestSpecification> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read test specification {path:?}"))?;
    let spec: TestSpecification =
        decode(&bytes).with_context(|| format!("Invalid test specification {path:?}"))?;
    spec.validate()
        .with_context(|| format!("Invalid test specification {path:?}"))?;
    Ok(spec)
}

pub async fn execute(cmd: TestCommand, verbose: bool, debug: bool) -> Result<()> {
    crate::init_basic_tracing(verbose, debug);

    let config = build_config(&cmd)?;
    let spec = load_spec(&cmd.spec).await?;

    let report = match &config.report_path {
        Some(path) => ReportWriter::new(path.clone()),
        None => {
            warn!("No report file given, results are only logged");
            ReportWriter::disabled()
        }
    };

    let router = TopicRouter::new(config.root_topic.clone())?;
    let transport = MqttTransport::new(config.client_id.clone());
    let target_model_id = spec.target_model_id.clone();
    let mut orchestrator = TestOrchestrator::new(spec, router, transport, report.clone())?
        .with_options(config.orchestrator_options());

    let endpoint = config.endpoint();
    info!("Connecting to {}...", endpoint.url());
    let inbound = orchestrator
        .start(&endpoint)
        .await
        .context("Failed to connect to MQTT broker")?;

    println!(
        "✓ Waiting for {target_model_id} devices under '{}' (Ctrl+C to stop)",
        config.root_topic
    );

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        println!("\n✓ Received Ctrl+C, stopping...");
    };

    let run_result = orchestrator.run_until(inbound, shutdown).await;
    let stats = orchestrator.shutdown().await?;
    run_result?;

    println!("\nRun summary:\n{stats}");
    if let Some(path) = report.path() {
        println!("Report: {} ({} entries)", path.display(), report.entries_written());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> TestCommand {
        TestCommand {
            spec: PathBuf::from("spec.json"),
            output: None,
            config: None,
            host: None,
            port: None,
            username: None,
            password: None,
            root_topic: None,
            dispatch_timeout: None,
            client_id: None,
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("runner.json");
        std::fs::write(
            &config_path,
            r#"{"broker_host": "file-host", "broker_port": 1884, "root_topic": "file-root"}"#,
        )
        .unwrap();

        let mut cmd = command();
        cmd.config = Some(config_path);
        cmd.host = Some("flag-host".to_string());
        cmd.output = Some(dir.path().join("report.txt"));
        cmd.dispatch_timeout = Some(Duration::from_secs(45));

        let config = build_config(&cmd).unwrap();
        assert_eq!(config.broker_host, "flag-host");
        assert_eq!(config.broker_port, 1884);
        assert_eq!(config.root_topic, "file-root");
        assert_eq!(config.report_path, Some(dir.path().join("report.txt")));
        assert_eq!(config.dispatch_timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut cmd = command();
        cmd.root_topic = Some("bad/#".to_string());
        assert!(build_config(&cmd).is_err());
    }

    #[tokio::test]
    async fn test_load_spec() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.json");
        std::fs::write(
            &path,
            r#"{"description": "Buttons", "target_model_id": "A1", "parameters": {"presses": 3}}"#,
        )
        .unwrap();
        let spec = load_spec(&path).await.unwrap();
        assert_eq!(spec.target_model_id, "A1");

        std::fs::write(&path, r#"{"description": "Buttons", "target_model_id": "1A"}"#).unwrap();
        assert!(load_spec(&path).await.is_err());

        std::fs::write(&path, r#"{"description": "Buttons"}"#).unwrap();
        let err = load_spec(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("TestSpecification"));
    }
}
