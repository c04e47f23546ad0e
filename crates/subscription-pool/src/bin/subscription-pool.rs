//! Subscription pool CLI - lease Azure subscriptions out of a management group pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use subscription_pool::lease::{LeaseController, LeaseRecord, LeaseSpec};
use subscription_pool::pool::{scan_pool, Pool};
use subscription_pool::providers::azure::{AzureHierarchy, ClientSecretCredential};
use subscription_pool::{LeaseState, PoolConfig, PoolConfigOverrides};

/// Subscription pool CLI - lease pre-provisioned Azure subscriptions.
#[derive(Parser)]
#[command(name = "subscription-pool")]
#[command(about = "Lease Azure subscriptions out of a management group pool")]
#[command(version)]
struct Cli {
    /// Azure AD tenant id [fallback: `ARM_TENANT_ID`].
    #[arg(long)]
    tenant_id: Option<String>,

    /// Service principal client id [fallback: `ARM_CLIENT_ID`].
    #[arg(long)]
    client_id: Option<String>,

    /// Service principal client secret [fallback: `ARM_CLIENT_SECRET`].
    #[arg(long)]
    client_secret: Option<String>,

    /// Management group holding the pool [fallback: `SUBSCRIPTION_POOL_MANAGEMENT_GROUP`].
    #[arg(long)]
    pool_management_group: Option<String>,

    /// Display name prefix of pool subscriptions [fallback: `SUBSCRIPTION_POOL_NAME_PREFIX`].
    #[arg(long)]
    pool_name_prefix: Option<String>,

    /// TOML file with provider settings. Flags override it; it overrides the environment.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lease state file.
    #[arg(long, global = true, default_value_os_t = LeaseState::default_path())]
    state: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the subscriptions currently available in the pool.
    Pool,

    #[command(flatten)]
    Lease(LeaseCommand),
}

#[derive(Subcommand)]
enum LeaseCommand {
    /// Lease a subscription into a management group.
    Create {
        /// Management group to move the subscription into.
        #[arg(long)]
        target_group: String,

        /// Display name to give the subscription.
        #[arg(long)]
        target_name: String,
    },

    /// Refresh the tracked lease from Azure.
    Read,

    /// Adopt an existing subscription as a lease.
    Import {
        /// Subscription id.
        #[arg(long)]
        subscription_id: String,
    },

    /// Move and/or rename the leased subscription.
    Update {
        /// Management group the subscription should live under.
        #[arg(long)]
        target_group: String,

        /// Display name the subscription should carry.
        #[arg(long)]
        target_name: String,
    },

    /// Return the leased subscription to the pool.
    Release,
}

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_record(record: &LeaseRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record).context("Failed to serialize lease")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let explicit = PoolConfigOverrides {
        tenant_id: cli.tenant_id.clone(),
        client_id: cli.client_id.clone(),
        client_secret: cli.client_secret.clone(),
        pool_management_group: cli.pool_management_group.clone(),
        pool_name_prefix: cli.pool_name_prefix.clone(),
    };
    let overrides = explicit.with_file(cli.config.as_deref())?;
    let config = PoolConfig::from_env(overrides).context("Invalid provider configuration")?;

    let token = ClientSecretCredential::new(
        &config.tenant_id,
        &config.client_id,
        &config.client_secret,
    )
    .context("Failed to create Azure credential")?
    .get_token()
    .await
    .context("Failed to acquire Azure access token")?;
    if let Some(expires_at) = token.expires_at() {
        debug!(expires_at = %expires_at, "Access token valid until");
    }
    let api = Arc::new(AzureHierarchy::new(token).context("Failed to create Azure client")?);

    let command = match cli.command {
        Commands::Pool => {
            let ids = scan_pool(
                api.as_ref(),
                &config.pool_parent_group_id,
                &config.pool_name_prefix,
            )
            .await?;
            for id in ids {
                println!("{id}");
            }
            return Ok(());
        }
        Commands::Lease(command) => command,
    };

    let pool = Arc::new(
        Pool::scan(
            api.as_ref(),
            &config.pool_parent_group_id,
            &config.pool_name_prefix,
        )
        .await
        .context("Failed while fetching subscription pool content")?,
    );
    let leases = LeaseController::new(api, pool);

    run_lease_command(&leases, command, &cli.state).await
}

async fn run_lease_command(
    leases: &LeaseController<AzureHierarchy>,
    command: LeaseCommand,
    state_path: &Path,
) -> Result<()> {
    match command {
        LeaseCommand::Create {
            target_group,
            target_name,
        } => {
            if LeaseState::load(state_path)?.is_some() {
                anyhow::bail!(
                    "Lease state already exists at {}; release it first",
                    state_path.display()
                );
            }
            let record = leases
                .create(&LeaseSpec::new(target_group, target_name))
                .await?;
            LeaseState::new(record.clone()).save(state_path)?;
            print_record(&record)?;
        }
        LeaseCommand::Read => {
            let mut state = LeaseState::load_required(state_path)?;
            leases.refresh(&mut state.record).await?;
            state.save(state_path)?;
            print_record(&state.record)?;
        }
        LeaseCommand::Import { subscription_id } => {
            let record = leases.import(&subscription_id).await?;
            LeaseState::new(record.clone()).save(state_path)?;
            print_record(&record)?;
        }
        LeaseCommand::Update {
            target_group,
            target_name,
        } => {
            let mut state = LeaseState::load_required(state_path)?;
            let desired = LeaseSpec::new(target_group, target_name);
            let result = leases.update(&mut state.record, &desired).await;
            // Persist whatever landed before a failure.
            state.save(state_path)?;
            result?;
            print_record(&state.record)?;
        }
        LeaseCommand::Release => {
            let state = LeaseState::load_required(state_path)?;
            leases.delete(&state.record).await?;
            LeaseState::remove(state_path)?;
            info!(subscription_id = %state.record.subscription_id, "Lease released");
        }
    }

    Ok(())
}
