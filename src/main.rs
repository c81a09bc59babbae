use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use stratus::consts::{DEFAULT_PAGE_SIZE, default_db_path};
use stratus::profile::{Profile, ProfileStore};
use stratus::{ClientConfig, ClientError, CloudStack, ParameterSet};

#[derive(Parser)]
#[command(
    name = "stratus",
    version,
    about = "Run CloudStack API commands: signed, paged and followed to the end."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Stored profile to take endpoint and keys from
    #[arg(short, long)]
    profile: Option<String>,

    /// SQLite database holding profiles (default: ~/.stratus/stratus.db)
    #[arg(long)]
    db: Option<PathBuf>,

    /// API endpoint, e.g. https://cloud.example.com/client/api
    #[arg(long)]
    endpoint: Option<String>,

    /// API key
    #[arg(long)]
    api_key: Option<String>,

    /// Secret key used to sign requests
    #[arg(long)]
    secret: Option<String>,

    /// Seconds to wait between async job polls
    #[arg(long, default_value_t = 2)]
    poll_interval: u64,

    /// Items per page for list commands
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Give up on an async job after this many pending polls (default: never)
    #[arg(long)]
    max_polls: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one API command and print its result as JSON
    Call {
        /// API command, e.g. listVirtualMachines
        command: String,

        /// Parameters as key=value
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Manage stored profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Create or replace a profile
    Set {
        name: String,
        #[arg(long)]
        endpoint: String,
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        secret: String,
    },
    /// Delete a profile
    Remove { name: String },
    /// List profile names
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Call { command, params } => {
            let config = resolve_config(&cli)?;
            let params: ParameterSet = params.iter().cloned().collect();
            handle_call(config, command, params).await
        }
        Command::Profile { action } => handle_profile(&cli, action),
    }
}

async fn handle_call(config: ClientConfig, command: &str, params: ParameterSet) -> Result<()> {
    let client = CloudStack::connect(config)?;
    let cancel = CancellationToken::new();

    // Ctrl+C cancels the call; the transport is closed either way.
    let result = tokio::select! {
        result = client.execute_with_cancel(command, params, &cancel) => result,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            Err(ClientError::Cancelled)
        }
    };
    client.close().await;

    let payload = result.with_context(|| format!("{command} failed"))?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn handle_profile(cli: &Cli, action: &ProfileAction) -> Result<()> {
    let store = open_store(cli)?;
    match action {
        ProfileAction::Set {
            name,
            endpoint,
            api_key,
            secret,
        } => {
            let profile = Profile {
                endpoint: endpoint.clone(),
                api_key: api_key.clone(),
                secret: secret.clone(),
            };
            store.set(name, &profile)?;
            println!("✓ Saved profile '{name}'.");
        }
        ProfileAction::Remove { name } => {
            store.remove(name)?;
            println!("✓ Removed profile '{name}'.");
        }
        ProfileAction::List => {
            for name in store.names()? {
                println!("{name}");
            }
        }
    }
    Ok(())
}

/// Flags win over the named profile, which wins over the environment.
fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
    let base = match &cli.profile {
        Some(name) => Some(
            open_store(cli)?
                .get(name)?
                .ok_or_else(|| anyhow!("no profile named '{name}'"))?
                .into_config(),
        ),
        None => ClientConfig::from_env(),
    };

    let pick = |flag: &Option<String>, stored: Option<&str>, what: &str| -> Result<String> {
        flag.as_deref()
            .or(stored)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow!("no {what} given. Pass --{what}, use --profile, or set CLOUDSTACK_* variables.")
            })
    };
    let endpoint = pick(&cli.endpoint, base.as_ref().map(|c| c.endpoint.as_str()), "endpoint")?;
    let api_key = pick(&cli.api_key, base.as_ref().map(|c| c.api_key.as_str()), "api-key")?;
    let secret = pick(&cli.secret, base.as_ref().map(|c| c.secret.as_str()), "secret")?;

    Ok(ClientConfig::new(endpoint, api_key, secret)
        .with_page_size(cli.page_size)
        .with_poll_interval(Duration::from_secs(cli.poll_interval))
        .with_max_poll_attempts(cli.max_polls))
}

fn open_store(cli: &Cli) -> Result<ProfileStore> {
    let path = match &cli.db {
        Some(path) => path.clone(),
        None => default_db_path().context("cannot determine home directory, pass --db")?,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let Some(path) = path.to_str() else {
        bail!("database path is not valid UTF-8: {}", path.display());
    };
    ProfileStore::open(path)
}

fn parse_param(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}
