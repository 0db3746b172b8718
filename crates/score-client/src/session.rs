//! Score Sync Session
//!
//! Per-player session context driving the score protocol:
//!
//! ```text
//! Disconnected -> Connecting -> AccountCheck -> Initializing -> Ready <-> Syncing
//!                                          \________________/
//! ```
//!
//! The local score is authoritative for gameplay and is bumped as soon as an
//! item is collected. The on-chain score is a best-effort mirror: each
//! collection spawns a fire-and-forget sync, failures are logged and
//! reported as notices, and the local score is never rolled back. The two
//! values may diverge.
//!
//! Disconnecting bumps the session generation. Work started under an older
//! generation still runs to completion but its result is ignored.

use crate::{
    error::ScoreError,
    poller::ScorePoller,
    relay_client::{RelayClientError, ScoreRelay},
    rpc::ChainRpc,
    submitter::{SubmitterConfig, TransactionSubmitter},
    wallet::{SignerCapability, WalletProvider},
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use score_protocol::{
    derive_score_address, increment_instruction, initialize_instruction, read_account_state,
    AccountState, CollectItemRequest, ItemKind,
};
use solana_sdk::pubkey::Pubkey;
use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::broadcast, task::JoinHandle};

/// Default minimum balance before attempting Initialize
///
/// Covers rent exemption for the 41-byte account plus fees.
pub const DEFAULT_MIN_BALANCE_LAMPORTS: u64 = 2_000_000;

/// Default leaderboard poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Protocol phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncPhase {
    Disconnected,
    Connecting,
    AccountCheck,
    Initializing,
    Ready,
    /// Ready with at least one increment in flight
    Syncing,
}

/// Why a Ready session only scores locally
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DegradedReason {
    InsufficientFunds { balance: u64, required: u64 },
    AccountUnreadable(String),
    InitializeFailed(String),
}

/// What started a connect
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectTrigger {
    /// Explicit user action; wallets may prompt
    UserRequested,
    /// Silent reconnect; only already-trusted wallets connect
    Auto,
}

/// How increments reach the chain
#[derive(Clone)]
pub enum SyncTransport {
    /// The player's wallet signs and pays for each increment
    Direct,
    /// The backend relay signs and pays
    Relay(Arc<dyn ScoreRelay>),
}

/// Notice severity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Non-blocking notice for the game's banner
#[derive(Clone, Debug)]
pub struct Notice {
    pub at: DateTime<Utc>,
    pub level: NoticeLevel,
    pub message: String,
}

/// Result of the AccountCheck step
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountCheckOutcome {
    /// Account already existed
    Active { score: u64 },
    /// Account was created by this check
    Initialized { signature: String },
    /// Ready, but on-chain writes are disabled
    Degraded(DegradedReason),
    /// The session was disconnected while checking
    Stale,
}

/// Result of a successful connect
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub wallet: String,
    pub player: Pubkey,
    pub score_address: Pubkey,
    pub account: AccountCheckOutcome,
}

/// Result of one increment sync
#[derive(Debug)]
pub enum SyncOutcome {
    Synced { signature: String },
    Failed(ScoreError),
    /// Finished after a disconnect; ignored
    Stale,
}

/// Returned by [`ScoreSession::collect_item`]
#[derive(Debug)]
pub struct CollectReceipt {
    pub item: ItemKind,
    /// Local score after this collection
    pub local_score: u64,
    /// In-flight on-chain sync, `None` when scoring locally only
    pub sync: Option<JoinHandle<SyncOutcome>>,
}

/// Session configuration
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub program_id: Pubkey,
    pub min_balance_lamports: u64,
    pub poll_interval: Duration,
    pub submitter: SubmitterConfig,
}

impl SessionConfig {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            min_balance_lamports: DEFAULT_MIN_BALANCE_LAMPORTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            submitter: SubmitterConfig::default(),
        }
    }
}

#[derive(Clone)]
struct Connection {
    provider: Arc<dyn WalletProvider>,
    player: Pubkey,
    score_address: Pubkey,
}

enum ConnectStart {
    Fresh(u64),
    InProgress,
    Checking,
    Connected(Connection),
}

struct SessionState {
    phase: SyncPhase,
    connection: Option<Connection>,
    degraded: Option<DegradedReason>,
    /// Generation of the running account check
    checking: Option<u64>,
}

struct Shared {
    config: SessionConfig,
    rpc: Arc<dyn ChainRpc>,
    submitter: TransactionSubmitter,
    providers: Vec<Arc<dyn WalletProvider>>,
    transport: SyncTransport,
    state: Mutex<SessionState>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
    local_score: AtomicU64,
    notices: broadcast::Sender<Notice>,
}

/// Decrements the in-flight counter when a sync task ends
struct InFlightGuard(Arc<Shared>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Releases the account check slot when a check ends or is dropped
struct AccountCheckGuard {
    shared: Arc<Shared>,
    generation: u64,
}

impl Drop for AccountCheckGuard {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        if state.checking == Some(self.generation) {
            state.checking = None;
        }
    }
}

/// Score protocol session for one player
#[derive(Clone)]
pub struct ScoreSession {
    shared: Arc<Shared>,
}

impl ScoreSession {
    /// Current phase
    pub fn phase(&self) -> SyncPhase {
        let phase = self.shared.state.lock().phase;
        if phase == SyncPhase::Ready && self.in_flight() > 0 {
            SyncPhase::Syncing
        } else {
            phase
        }
    }

    /// Degraded reason while Ready in local-only mode
    pub fn degraded(&self) -> Option<DegradedReason> {
        self.shared.state.lock().degraded.clone()
    }

    pub fn is_degraded(&self) -> bool {
        self.shared.state.lock().degraded.is_some()
    }

    /// Connected player
    pub fn player(&self) -> Option<Pubkey> {
        self.shared.state.lock().connection.as_ref().map(|c| c.player)
    }

    /// Score account PDA of the connected player
    pub fn score_address(&self) -> Option<Pubkey> {
        self.shared
            .state
            .lock()
            .connection
            .as_ref()
            .map(|c| c.score_address)
    }

    /// Optimistic local score
    pub fn local_score(&self) -> u64 {
        self.shared.local_score.load(Ordering::SeqCst)
    }

    /// Number of increments currently syncing
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Subscribe to banner notices
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.shared.notices.subscribe()
    }

    /// Connect the first wallet provider that accepts, then check the account
    ///
    /// Providers are tried in preference order. Chain failures during the
    /// account check do not fail the connect; they leave the session Ready
    /// in degraded mode.
    pub async fn connect(&self, trigger: ConnectTrigger) -> Result<ConnectOutcome, ScoreError> {
        let start = {
            let mut state = self.shared.state.lock();
            let phase = state.phase;
            match phase {
                SyncPhase::Disconnected => {
                    state.phase = SyncPhase::Connecting;
                    ConnectStart::Fresh(self.shared.generation.load(Ordering::SeqCst))
                }
                SyncPhase::Connecting => ConnectStart::InProgress,
                SyncPhase::AccountCheck | SyncPhase::Initializing => ConnectStart::Checking,
                _ => match state.connection.clone() {
                    Some(connection) => ConnectStart::Connected(connection),
                    None => ConnectStart::InProgress,
                },
            }
        };

        let generation = match start {
            ConnectStart::Fresh(generation) => generation,
            ConnectStart::InProgress => {
                tracing::debug!("Connect already in progress");
                return Err(ScoreError::WalletNotConnected);
            }
            ConnectStart::Checking => {
                tracing::debug!("Account check already in progress");
                return Err(ScoreError::AccountCheckInProgress);
            }
            ConnectStart::Connected(connection) => {
                let account = self.check_account().await?;
                return Ok(ConnectOutcome {
                    wallet: connection.provider.name().to_string(),
                    player: connection.player,
                    score_address: connection.score_address,
                    account,
                });
            }
        };

        let only_if_trusted = trigger == ConnectTrigger::Auto;
        let mut connected = None;
        for provider in &self.shared.providers {
            match provider.connect(only_if_trusted).await {
                Ok(player) => {
                    connected = Some((provider.clone(), player));
                    break;
                }
                Err(e) => {
                    tracing::debug!("Wallet {} did not connect: {}", provider.name(), e);
                }
            }
        }

        let Some((provider, player)) = connected else {
            self.with_current(generation, |state| state.phase = SyncPhase::Disconnected);
            if trigger == ConnectTrigger::UserRequested {
                self.notify(NoticeLevel::Warning, "No wallet connected; scoring locally");
            }
            return Err(ScoreError::WalletNotConnected);
        };

        let score_address = match derive_score_address(&player, &self.shared.config.program_id) {
            Ok((address, _)) => address,
            Err(e) => {
                self.with_current(generation, |state| state.phase = SyncPhase::Disconnected);
                return Err(e.into());
            }
        };

        let connection = Connection {
            provider: provider.clone(),
            player,
            score_address,
        };
        let installed = self.with_current(generation, |state| {
            state.connection = Some(connection);
            state.phase = SyncPhase::AccountCheck;
        });
        if installed.is_none() {
            tracing::debug!("Disconnected while connecting {}", provider.name());
            return Err(ScoreError::WalletNotConnected);
        }

        tracing::info!(
            "Wallet {} connected: player {}, score account {}",
            provider.name(),
            player,
            score_address
        );

        let account = self.check_account().await?;
        Ok(ConnectOutcome {
            wallet: provider.name().to_string(),
            player,
            score_address,
            account,
        })
    }

    /// Make sure the score account exists, initializing it if needed
    ///
    /// Safe to call repeatedly: an Active account goes straight to Ready and
    /// no second Initialize is sent. Only one check runs at a time; a
    /// concurrent call fails with `AccountCheckInProgress`.
    pub async fn check_account(&self) -> Result<AccountCheckOutcome, ScoreError> {
        let (generation, connection) = {
            let mut state = self.shared.state.lock();
            let connection = state
                .connection
                .clone()
                .ok_or(ScoreError::WalletNotConnected)?;
            let generation = self.shared.generation.load(Ordering::SeqCst);
            if state.checking == Some(generation) {
                return Err(ScoreError::AccountCheckInProgress);
            }
            state.checking = Some(generation);
            state.phase = SyncPhase::AccountCheck;
            state.degraded = None;
            (generation, connection)
        };
        let _guard = AccountCheckGuard {
            shared: self.shared.clone(),
            generation,
        };

        Ok(self.run_account_check(generation, connection).await)
    }

    async fn run_account_check(
        &self,
        generation: u64,
        connection: Connection,
    ) -> AccountCheckOutcome {
        let data = match self
            .shared
            .rpc
            .get_account_data(&connection.score_address)
            .await
        {
            Ok(data) => data,
            Err(e) => {
                return self.degrade(generation, DegradedReason::AccountUnreadable(e.to_string()))
            }
        };

        match read_account_state(data.as_deref()) {
            AccountState::Active { score, .. } => {
                if self.enter_ready(generation).is_none() {
                    return AccountCheckOutcome::Stale;
                }
                tracing::info!(
                    "Score account {} active with score {}",
                    connection.score_address,
                    score
                );
                return AccountCheckOutcome::Active { score };
            }
            state => {
                tracing::info!(
                    "Score account {} is {:?}, initializing",
                    connection.score_address,
                    state
                );
            }
        }

        let balance = match self.shared.rpc.get_balance(&connection.player).await {
            Ok(balance) => balance,
            Err(e) => {
                return self.degrade(generation, DegradedReason::AccountUnreadable(e.to_string()))
            }
        };

        let required = self.shared.config.min_balance_lamports;
        if balance < required {
            return self.degrade(
                generation,
                DegradedReason::InsufficientFunds { balance, required },
            );
        }

        if self
            .with_current(generation, |state| state.phase = SyncPhase::Initializing)
            .is_none()
        {
            return AccountCheckOutcome::Stale;
        }

        let instruction = initialize_instruction(
            &self.shared.config.program_id,
            &connection.score_address,
            &connection.player,
        );
        let signer = SignerCapability::Wallet(connection.provider.clone());

        match self
            .shared
            .submitter
            .submit(&[instruction], &signer, &connection.player)
            .await
        {
            Ok(signature) => {
                if self.enter_ready(generation).is_none() {
                    return AccountCheckOutcome::Stale;
                }
                tracing::info!(
                    "Initialized score account {} ({})",
                    connection.score_address,
                    signature
                );
                self.notify(NoticeLevel::Info, "Score account created");
                AccountCheckOutcome::Initialized {
                    signature: signature.to_string(),
                }
            }
            Err(e) => self.degrade(generation, DegradedReason::InitializeFailed(e.to_string())),
        }
    }

    /// Handle a collected item by its game key
    pub fn collect_item_key(&self, key: &str) -> Result<CollectReceipt, ScoreError> {
        let item: ItemKind = key.parse()?;
        Ok(self.collect_item(item))
    }

    /// Handle a collected item
    ///
    /// The local score is bumped immediately. When Ready and not degraded an
    /// on-chain sync is spawned; increments are not serialized against each
    /// other. Must be called from within a Tokio runtime.
    pub fn collect_item(&self, item: ItemKind) -> CollectReceipt {
        let points = item.points();
        let local_score = self.shared.local_score.fetch_add(points, Ordering::SeqCst) + points;

        let target = {
            let state = self.shared.state.lock();
            if state.phase == SyncPhase::Ready && state.degraded.is_none() {
                state.connection.clone()
            } else {
                None
            }
        };

        let Some(connection) = target else {
            tracing::debug!("Collected {} (+{}), local score {} (local only)", item, points, local_score);
            return CollectReceipt {
                item,
                local_score,
                sync: None,
            };
        };

        let generation = self.shared.generation.load(Ordering::SeqCst);
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard(self.shared.clone());

        let session = self.clone();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            session.sync_increment(connection, item, generation).await
        });

        tracing::debug!("Collected {} (+{}), local score {}, syncing", item, points, local_score);

        CollectReceipt {
            item,
            local_score,
            sync: Some(handle),
        }
    }

    /// Disconnect the wallet and return to Disconnected
    ///
    /// In-flight work is not aborted; its results are ignored.
    pub async fn disconnect(&self) {
        let provider = {
            let mut state = self.shared.state.lock();
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            state.phase = SyncPhase::Disconnected;
            state.degraded = None;
            state.checking = None;
            state.connection.take().map(|c| c.provider)
        };

        if let Some(provider) = provider {
            provider.disconnect().await;
            tracing::info!("Wallet {} disconnected", provider.name());
        }
    }

    /// Read the on-chain score account once
    pub async fn fetch_account_state(&self) -> Result<AccountState, ScoreError> {
        let address = self.score_address().ok_or(ScoreError::WalletNotConnected)?;
        let data = self.shared.rpc.get_account_data(&address).await?;
        Ok(read_account_state(data.as_deref()))
    }

    /// Start the read-only leaderboard poller for the connected player
    pub fn spawn_score_poller(&self) -> Result<ScorePoller, ScoreError> {
        let address = self.score_address().ok_or(ScoreError::WalletNotConnected)?;
        Ok(ScorePoller::spawn(
            self.shared.rpc.clone(),
            address,
            self.shared.config.poll_interval,
        ))
    }

    async fn sync_increment(
        &self,
        connection: Connection,
        item: ItemKind,
        generation: u64,
    ) -> SyncOutcome {
        let amount = item.points();

        let result = match &self.shared.transport {
            SyncTransport::Direct => {
                let instruction = increment_instruction(
                    &self.shared.config.program_id,
                    &connection.score_address,
                    &connection.player,
                    amount,
                );
                let signer = SignerCapability::Wallet(connection.provider.clone());
                self.shared
                    .submitter
                    .submit(&[instruction], &signer, &connection.player)
                    .await
                    .map(|signature| signature.to_string())
                    .map_err(ScoreError::from)
            }
            SyncTransport::Relay(relay) => {
                let request = CollectItemRequest {
                    increment: amount,
                    score_account_address: connection.score_address.to_string(),
                    player_public_key: connection.player.to_string(),
                };
                match relay.collect_item(&request).await {
                    Ok(response) if response.success => Ok(response.signature),
                    Ok(_) => Err(ScoreError::Relay(RelayClientError::InvalidResponse(
                        "relay reported failure".to_string(),
                    ))),
                    Err(e) => Err(e.into()),
                }
            }
        };

        if self.shared.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Ignoring score sync for {} after disconnect", connection.player);
            return SyncOutcome::Stale;
        }

        match result {
            Ok(signature) => {
                tracing::info!("Synced +{} for {} ({})", amount, connection.player, signature);
                SyncOutcome::Synced { signature }
            }
            Err(e) => {
                tracing::warn!(
                    "Score sync of +{} for {} failed, keeping local score {}: {}",
                    amount,
                    connection.player,
                    self.local_score(),
                    e
                );
                self.notify(
                    NoticeLevel::Warning,
                    &format!("Score not saved on-chain: {}", e),
                );
                SyncOutcome::Failed(e)
            }
        }
    }

    /// Apply `f` if no disconnect happened since `generation` was read
    fn with_current<R>(&self, generation: u64, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let mut state = self.shared.state.lock();
        if self.shared.generation.load(Ordering::SeqCst) != generation {
            return None;
        }
        Some(f(&mut state))
    }

    fn enter_ready(&self, generation: u64) -> Option<()> {
        self.with_current(generation, |state| {
            state.phase = SyncPhase::Ready;
            state.degraded = None;
        })
    }

    fn degrade(&self, generation: u64, reason: DegradedReason) -> AccountCheckOutcome {
        let applied = self.with_current(generation, |state| {
            state.phase = SyncPhase::Ready;
            state.degraded = Some(reason.clone());
        });
        if applied.is_none() {
            return AccountCheckOutcome::Stale;
        }

        tracing::warn!("Score sync degraded to local-only: {:?}", reason);
        let message = match &reason {
            DegradedReason::InsufficientFunds { balance, required } => format!(
                "Not enough SOL to create a score account ({} < {} lamports); scoring locally",
                balance, required
            ),
            DegradedReason::AccountUnreadable(e) => {
                format!("Cannot reach the chain ({}); scoring locally", e)
            }
            DegradedReason::InitializeFailed(e) => {
                format!("Score account setup failed ({}); scoring locally", e)
            }
        };
        self.notify(NoticeLevel::Warning, &message);
        AccountCheckOutcome::Degraded(reason)
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        // No subscribers is fine
        let _ = self.shared.notices.send(Notice {
            at: Utc::now(),
            level,
            message: message.to_string(),
        });
    }
}

/// Builder for [`ScoreSession`]
pub struct ScoreSessionBuilder {
    config: SessionConfig,
    rpc: Option<Arc<dyn ChainRpc>>,
    providers: Vec<Arc<dyn WalletProvider>>,
    transport: SyncTransport,
}

impl ScoreSessionBuilder {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            config: SessionConfig::new(program_id),
            rpc: None,
            providers: Vec::new(),
            transport: SyncTransport::Direct,
        }
    }

    pub fn rpc(mut self, rpc: Arc<dyn ChainRpc>) -> Self {
        self.rpc = Some(rpc);
        self
    }

    /// Add a wallet provider; earlier providers are preferred
    pub fn wallet(mut self, provider: Arc<dyn WalletProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Send increments through the backend relay
    pub fn relay(mut self, relay: Arc<dyn ScoreRelay>) -> Self {
        self.transport = SyncTransport::Relay(relay);
        self
    }

    pub fn min_balance_lamports(mut self, lamports: u64) -> Self {
        self.config.min_balance_lamports = lamports;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn submitter_config(mut self, config: SubmitterConfig) -> Self {
        self.config.submitter = config;
        self
    }

    pub fn build(self) -> Result<ScoreSession, ScoreError> {
        let rpc = self
            .rpc
            .ok_or_else(|| ScoreError::Configuration("chain RPC not set".to_string()))?;
        if self.providers.is_empty() {
            return Err(ScoreError::Configuration(
                "no wallet providers configured".to_string(),
            ));
        }

        let submitter = TransactionSubmitter::new(rpc.clone(), self.config.submitter.clone());
        let (notices, _) = broadcast::channel(32);

        Ok(ScoreSession {
            shared: Arc::new(Shared {
                config: self.config,
                rpc,
                submitter,
                providers: self.providers,
                transport: self.transport,
                state: Mutex::new(SessionState {
                    phase: SyncPhase::Disconnected,
                    connection: None,
                    degraded: None,
                    checking: None,
                }),
                generation: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                local_score: AtomicU64::new(0),
                notices,
            }),
        })
    }
}
