//! Transaction Submitter
//!
//! Builds, signs, sends and confirms score program transactions. Every
//! attempt fetches its own blockhash and rebuilds the transaction; a stale
//! blockhash cannot be resent verbatim.

use crate::{
    error::{AttemptError, SubmitError},
    retry::{retry_with_backoff, RetryError, RetryPolicy},
    rpc::{ChainRpc, Commitment, PendingTransaction, SendOptions},
    wallet::SignerCapability,
};
use solana_sdk::{
    instruction::Instruction,
    message::Message,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use std::{sync::Arc, time::Duration};

/// Submitter configuration
#[derive(Clone, Debug)]
pub struct SubmitterConfig {
    /// Commitment the transaction must reach
    pub commitment: Commitment,
    /// Preflight settings for sendTransaction
    pub send_options: SendOptions,
    /// Interval between signature status polls
    pub confirm_poll_interval: Duration,
    /// Retry policy for whole attempts
    pub retry: RetryPolicy,
    /// Consecutive failed status/height polls before giving up on a sent
    /// transaction without resending it
    pub max_confirm_poll_failures: u32,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            commitment: Commitment::Confirmed,
            send_options: SendOptions::default(),
            confirm_poll_interval: Duration::from_millis(400),
            retry: RetryPolicy::default(),
            max_confirm_poll_failures: 20,
        }
    }
}

/// Submits transactions against a [`ChainRpc`]
pub struct TransactionSubmitter {
    rpc: Arc<dyn ChainRpc>,
    config: SubmitterConfig,
}

impl TransactionSubmitter {
    pub fn new(rpc: Arc<dyn ChainRpc>, config: SubmitterConfig) -> Self {
        Self { rpc, config }
    }

    pub fn config(&self) -> &SubmitterConfig {
        &self.config
    }

    /// Submit `instructions` and wait for confirmation
    pub async fn submit(
        &self,
        instructions: &[Instruction],
        signer: &SignerCapability,
        fee_payer: &Pubkey,
    ) -> Result<Signature, SubmitError> {
        tracing::debug!(
            "Submitting {} instruction(s), fee payer {}, signer {}",
            instructions.len(),
            fee_payer,
            signer.describe()
        );

        let result = retry_with_backoff(&self.config.retry, "submit transaction", |attempt| {
            self.attempt(attempt, instructions, signer, fee_payer)
        })
        .await;

        match result {
            Ok(signature) => Ok(signature),
            Err(RetryError::Fatal { attempt, error }) => {
                Err(SubmitError::from_attempt(attempt, error))
            }
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => Err(SubmitError::from_attempt(attempts, last_error)),
        }
    }

    /// One full attempt: fresh blockhash, build, sign, send, confirm
    async fn attempt(
        &self,
        attempt: u32,
        instructions: &[Instruction],
        signer: &SignerCapability,
        fee_payer: &Pubkey,
    ) -> Result<Signature, AttemptError> {
        let latest = self.rpc.get_latest_blockhash(self.config.commitment).await?;

        let message = Message::new_with_blockhash(instructions, Some(fee_payer), &latest.blockhash);
        let mut transaction = Transaction::new_unsigned(message);

        let transaction = match signer {
            SignerCapability::Local(keypair) => {
                transaction
                    .try_sign(&[keypair.as_ref()], latest.blockhash)
                    .map_err(|e| AttemptError::Signing(e.to_string()))?;
                transaction
            }
            SignerCapability::Wallet(wallet) => wallet.sign_transaction(transaction).await?,
        };

        if !transaction.is_signed() {
            return Err(AttemptError::Signing(
                "transaction is missing required signatures".to_string(),
            ));
        }

        let signature = self
            .rpc
            .send_transaction(&transaction, self.config.send_options)
            .await?;

        tracing::debug!(
            "Attempt {}: sent {} (blockhash {}, valid until height {})",
            attempt,
            signature,
            latest.blockhash,
            latest.last_valid_block_height
        );

        let pending = PendingTransaction {
            signature,
            recent_blockhash: latest.blockhash,
            last_valid_block_height: latest.last_valid_block_height,
        };
        self.confirm(&pending).await?;

        Ok(signature)
    }

    /// Poll until the signature reaches the configured commitment or the
    /// blockhash expires
    ///
    /// Poll errors never trigger a resend: the transaction may already have
    /// landed. Expiry is only reported once the block height has passed
    /// `last_valid_block_height` and a later status read finds nothing.
    async fn confirm(&self, pending: &PendingTransaction) -> Result<(), AttemptError> {
        let mut poll_failures = 0u32;
        let mut expired = false;

        loop {
            match self.rpc.get_signature_status(&pending.signature).await {
                Ok(Some(status)) => {
                    poll_failures = 0;
                    if let Some(details) = status.err {
                        return Err(AttemptError::Execution {
                            signature: pending.signature.to_string(),
                            details,
                        });
                    }
                    if status.satisfies(self.config.commitment) {
                        tracing::debug!(
                            "Transaction {} reached {}",
                            pending.signature,
                            self.config.commitment.as_str()
                        );
                        return Ok(());
                    }
                }
                Ok(None) if expired => {
                    return Err(AttemptError::Expired {
                        signature: pending.signature.to_string(),
                        last_valid_block_height: pending.last_valid_block_height,
                    });
                }
                Ok(None) => poll_failures = 0,
                Err(e) => {
                    poll_failures += 1;
                    tracing::warn!("Status poll for {} failed: {}", pending.signature, e);
                    if poll_failures >= self.config.max_confirm_poll_failures {
                        return Err(self.unconfirmed(pending, e.to_string()));
                    }
                }
            }

            if !expired {
                match self.rpc.get_block_height(self.config.commitment).await {
                    Ok(height) => expired = height > pending.last_valid_block_height,
                    Err(e) => {
                        poll_failures += 1;
                        tracing::warn!("Block height poll failed: {}", e);
                        if poll_failures >= self.config.max_confirm_poll_failures {
                            return Err(self.unconfirmed(pending, e.to_string()));
                        }
                    }
                }
            }

            tokio::time::sleep(self.config.confirm_poll_interval).await;
        }
    }

    fn unconfirmed(&self, pending: &PendingTransaction, last_error: String) -> AttemptError {
        AttemptError::Unconfirmed {
            signature: pending.signature.to_string(),
            last_error,
        }
    }
}
