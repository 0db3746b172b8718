//! Score Relay Node
//!
//! Runs the backend score relay, a read-only score watcher, or a one-shot
//! item collection through the full score session.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use relay_server::{RelayContext, RelayServer};
use score_client::{
    ChainRpc, ConnectTrigger, HttpRelayClient, JsonRpcChainClient, KeypairWallet, ScorePoller,
    ScoreSessionBuilder, SyncOutcome, TransactionSubmitter,
};
use score_protocol::{derive_score_address, AccountState};
use solana_sdk::signer::Signer;
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::{load_keypair, parse_pubkey, ConfigError, RelayConfig};

/// Node mode
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Serve POST /collect-item and submit increments
    Relay,
    /// Poll a player's score account and log changes
    Watch,
    /// Connect the keypair as a wallet and collect one item
    Collect,
}

/// On-chain score relay
#[derive(Parser, Debug)]
#[command(name = "score-relay")]
#[command(about = "Backend relay and tooling for on-chain game scores", long_about = None)]
struct Args {
    /// Node mode
    #[arg(long, value_enum, default_value = "relay")]
    mode: Mode,

    /// Chain JSON-RPC URL
    #[arg(long, env = "SOLANA_RPC_URL", default_value = "http://127.0.0.1:8899")]
    rpc_url: String,

    /// Relay HTTP bind address
    #[arg(long, default_value = "127.0.0.1:3001")]
    bind_addr: String,

    /// Score program ID
    #[arg(long, env = "SCORE_PROGRAM_ID")]
    program_id: Option<String>,

    /// Keypair file for the relay payer (collect mode: the player)
    #[arg(long)]
    payer_keypair: Option<PathBuf>,

    /// Base58 secret key, used when no keypair file is given
    #[arg(long, env = "RELAY_PAYER_SECRET", hide_env_values = true)]
    payer_secret: Option<String>,

    /// Skip preflight simulation when sending
    #[arg(long)]
    skip_preflight: bool,

    /// Submit attempts per transaction
    #[arg(long, default_value = "3")]
    max_attempts: u32,

    /// Player to watch (watch mode)
    #[arg(long)]
    player: Option<String>,

    /// Poll interval in milliseconds (watch mode)
    #[arg(long, default_value = "2000")]
    poll_interval_ms: u64,

    /// Item to collect (collect mode)
    #[arg(long, default_value = "coin")]
    item: String,

    /// Send the increment through this relay instead of signing it (collect mode)
    #[arg(long)]
    relay_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn config(&self) -> RelayConfig {
        RelayConfig {
            rpc_url: self.rpc_url.clone(),
            bind_addr: self.bind_addr.clone(),
            program_id: self.program_id.clone(),
            skip_preflight: self.skip_preflight,
            max_attempts: self.max_attempts,
            poll_interval_ms: self.poll_interval_ms,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = args.config();
    tracing::debug!("Config: {}", serde_json::to_string(&config)?);

    match args.mode {
        Mode::Relay => run_relay(&args, &config).await,
        Mode::Watch => run_watch(&args, &config).await,
        Mode::Collect => run_collect(&args, &config).await,
    }
}

fn chain_client(config: &RelayConfig) -> Result<Arc<dyn ChainRpc>> {
    let client = JsonRpcChainClient::new(&config.rpc_url)?;
    Ok(Arc::new(client))
}

/// Run the relay until Ctrl+C
async fn run_relay(args: &Args, config: &RelayConfig) -> Result<()> {
    let program_id = config.program_id()?;
    let submitter_config = config.submitter_config()?;
    let payer = Arc::new(load_keypair(
        args.payer_keypair.as_deref(),
        args.payer_secret.as_deref(),
    )?);

    tracing::info!("Starting score relay");
    tracing::info!("  RPC: {}", config.rpc_url);
    tracing::info!("  Bind: {}", config.bind_addr);
    tracing::info!("  Program: {}", program_id);
    tracing::info!("  Payer: {}", payer.pubkey());
    tracing::info!("  Skip preflight: {}", config.skip_preflight);

    let rpc = chain_client(config)?;
    match rpc.get_balance(&payer.pubkey()).await {
        Ok(balance) => tracing::info!("  Payer balance: {} lamports", balance),
        Err(e) => tracing::warn!("Could not read payer balance: {}", e),
    }

    let context = Arc::new(RelayContext::new(
        TransactionSubmitter::new(rpc, submitter_config),
        payer,
        program_id,
    ));

    let bind_addr = config.bind_addr.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = RelayServer::new(context).run(&bind_addr).await {
            tracing::error!("Relay server error: {}", e);
        }
    });

    tracing::info!("Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    server.abort();
    tracing::info!("Relay stopped");

    Ok(())
}

/// Log score account changes for one player until Ctrl+C
async fn run_watch(args: &Args, config: &RelayConfig) -> Result<()> {
    let program_id = config.program_id()?;
    let player = parse_pubkey(
        "player",
        args.player.as_deref().ok_or(ConfigError::MissingPlayer)?,
    )?;
    let (address, _) = derive_score_address(&player, &program_id)?;

    tracing::info!("Watching score account {} of {}", address, player);

    let mut poller = ScorePoller::spawn(chain_client(config)?, address, config.poll_interval());

    loop {
        tokio::select! {
            state = poller.changed() => match state {
                Some(AccountState::Active { score, .. }) => {
                    tracing::info!("Score of {}: {}", player, score)
                }
                Some(state) => tracing::info!("Score account {}: {:?}", address, state),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down watcher...");
                break;
            }
        }
    }

    poller.stop();
    Ok(())
}

/// Connect the keypair as a wallet, collect one item and wait for its sync
async fn run_collect(args: &Args, config: &RelayConfig) -> Result<()> {
    let program_id = config.program_id()?;
    let keypair = load_keypair(args.payer_keypair.as_deref(), args.payer_secret.as_deref())?;

    let mut builder = ScoreSessionBuilder::new(program_id)
        .rpc(chain_client(config)?)
        .wallet(Arc::new(KeypairWallet::new("local", keypair)))
        .submitter_config(config.submitter_config()?);
    if let Some(relay_url) = &args.relay_url {
        builder = builder.relay(Arc::new(HttpRelayClient::new(relay_url)));
    }
    let session = builder.build()?;

    let connected = session.connect(ConnectTrigger::UserRequested).await?;
    tracing::info!(
        "Connected {} ({}), score account {}: {:?}",
        connected.wallet,
        connected.player,
        connected.score_address,
        connected.account
    );

    let receipt = session.collect_item_key(&args.item)?;
    tracing::info!(
        "Collected {} (+{}), local score {}",
        receipt.item,
        receipt.item.points(),
        receipt.local_score
    );

    let Some(sync) = receipt.sync else {
        tracing::warn!("Session is local-only: {:?}", session.degraded());
        return Ok(());
    };

    match sync.await? {
        SyncOutcome::Synced { signature } => tracing::info!("Synced on-chain: {}", signature),
        SyncOutcome::Failed(e) => tracing::warn!("Sync failed: {}", e),
        SyncOutcome::Stale => tracing::warn!("Sync result ignored after disconnect"),
    }

    match session.fetch_account_state().await? {
        AccountState::Active { score, .. } => tracing::info!("On-chain score: {}", score),
        state => tracing::info!("Score account: {:?}", state),
    }

    session.disconnect().await;
    Ok(())
}
