use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use dialoguer::Confirm;
use hbfactory::protocol::{Identity, IDENTITY_BLOCK_LEN};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Args)]
pub struct IdentityCommand {
    #[command(subcommand)]
    pub action: IdentityAction,
}

#[derive(Subcommand)]
pub enum IdentityAction {
    /// Validate factory data and write it as a 32-byte identity block
    Encode(EncodeArgs),
    /// Print the factory data stored in an identity block file
    Decode(DecodeArgs),
}

#[derive(Args)]
pub struct EncodeArgs {
    /// Model ID, a letter followed by a digit (e.g. A1)
    #[arg(long, short)]
    pub model_id: String,

    /// Hardware version, digit.digit (e.g. 1.1)
    #[arg(long = "hw-version")]
    pub hw_version: String,

    /// Serial number, YYMM-NNN (e.g. 2301-001)
    #[arg(long, short)]
    pub serial: String,

    /// Random ID, 6 alphanumeric characters (generated when omitted)
    #[arg(long, short)]
    pub random_id: Option<String>,

    /// Where to write the identity block
    #[arg(long, short)]
    pub output: PathBuf,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,

    /// Overwrite an existing output file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct DecodeArgs {
    /// Identity block file
    pub file: PathBuf,
}

fn build_identity(args: &EncodeArgs) -> Result<Identity> {
    let identity = match &args.random_id {
        Some(random_id) => Identity::new(
            args.serial.clone(),
            random_id.clone(),
            args.model_id.clone(),
            args.hw_version.clone(),
        ),
        None => Identity::with_generated_random_id(
            args.serial.clone(),
            args.model_id.clone(),
            args.hw_version.clone(),
        ),
    };
    identity.check().context("Invalid factory data")?;
    Ok(identity)
}

async fn write_block(identity: &Identity, output: &Path, force: bool) -> Result<()> {
    if !force && tokio::fs::try_exists(output).await.unwrap_or(false) {
        anyhow::bail!("{output:?} already exists, use --force to overwrite");
    }
    let block = identity
        .encode()
        .context("Failed to encode identity block")?;
    tokio::fs::write(output, block)
        .await
        .with_context(|| format!("Failed to write identity block to {output:?}"))?;
    debug!(path = ?output, serial = %identity.serial, "Identity block written");
    Ok(())
}

async fn encode(args: EncodeArgs) -> Result<()> {
    let identity = build_identity(&args)?;
    println!("{identity}");

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt("Write this identity block? Burned identity data cannot be changed")
            .default(false)
            .interact()
            .context("Failed to get confirmation")?;
        if !confirmed {
            println!("✗ Aborted, nothing written");
            return Ok(());
        }
    }

    write_block(&identity, &args.output, args.force).await?;
    println!(
        "✓ Wrote {IDENTITY_BLOCK_LEN}-byte identity block to {}",
        args.output.display()
    );
    Ok(())
}

async fn decode(args: DecodeArgs) -> Result<()> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {:?}", args.file))?;
    let identity = Identity::decode(&bytes)
        .with_context(|| format!("{:?} is not a valid identity block", args.file))?;

    println!("{identity}");
    if let Err(e) = identity.check() {
        warn!(error = %e, "Stored factory data does not pass format validation");
    }
    Ok(())
}

pub async fn execute(cmd: IdentityCommand, verbose: bool, debug: bool) -> Result<()> {
    crate::init_basic_tracing(verbose, debug);

    match cmd.action {
        IdentityAction::Encode(args) => encode(args).await,
        IdentityAction::Decode(args) => decode(args).await,
    }
}
