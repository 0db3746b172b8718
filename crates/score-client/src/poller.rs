//! Leaderboard poller - periodic read-only score account reads
//!
//! Decoupled from the write path: it never submits anything and never
//! touches the local score.

use crate::rpc::ChainRpc;
use score_protocol::{read_account_state, AccountState};
use solana_sdk::pubkey::Pubkey;
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a running poller; stops when dropped
pub struct ScorePoller {
    address: Pubkey,
    updates: watch::Receiver<Option<AccountState>>,
    handle: JoinHandle<()>,
}

impl ScorePoller {
    /// Start polling `address` every `interval` (at least 1ms)
    pub fn spawn(rpc: Arc<dyn ChainRpc>, address: Pubkey, interval: Duration) -> Self {
        let interval = interval.max(MIN_POLL_INTERVAL);
        let (sender, updates) = watch::channel(None);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::debug!("Polling score account {} every {:?}", address, interval);

            loop {
                ticker.tick().await;

                match rpc.get_account_data(&address).await {
                    Ok(data) => {
                        let state = read_account_state(data.as_deref());
                        sender.send_if_modified(|current| {
                            if *current == Some(state) {
                                return false;
                            }
                            *current = Some(state);
                            true
                        });
                    }
                    Err(e) => {
                        tracing::warn!("Score poll for {} failed: {}", address, e);
                    }
                }

                if sender.is_closed() {
                    break;
                }
            }
        });

        Self {
            address,
            updates,
            handle,
        }
    }

    pub fn address(&self) -> &Pubkey {
        &self.address
    }

    /// Most recently observed state
    pub fn latest(&self) -> Option<AccountState> {
        *self.updates.borrow()
    }

    /// Wait for the next change; `None` once the poller has stopped
    pub async fn changed(&mut self) -> Option<AccountState> {
        self.updates.changed().await.ok()?;
        *self.updates.borrow_and_update()
    }

    /// Stop polling
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for ScorePoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
