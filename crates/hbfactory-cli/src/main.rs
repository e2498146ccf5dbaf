use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{identity_cmd, serial_cmd, test_cmd};

#[derive(Parser)]
#[command(name = "hbfactory")]
#[command(author, version, about = "Factory identity provisioning and device test runner", long_about = None)]
struct Cli {
    /// Show debug output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Include MQTT client internals in debug output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a test specification against every announcing device
    Test(test_cmd::TestCommand),
    /// Encode or inspect 32-byte identity blocks
    Identity(identity_cmd::IdentityCommand),
    /// Serial number helpers for series-mode provisioning
    Serial(serial_cmd::SerialCommand),
}

pub(crate) fn init_basic_tracing(verbose: bool, debug: bool) {
    let level = if verbose || debug { "debug" } else { "info" };
    let client_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "hbfactory={level},hbfactory_protocol={level},mqtt5={client_level}"
        ))
    });

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Test(cmd) => test_cmd::execute(cmd, cli.verbose, cli.debug).await,
        Commands::Identity(cmd) => identity_cmd::execute(cmd, cli.verbose, cli.debug).await,
        Commands::Serial(cmd) => serial_cmd::execute(cmd, cli.verbose, cli.debug),
    }
}
