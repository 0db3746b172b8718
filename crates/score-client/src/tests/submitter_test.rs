//! Transaction Submitter Tests
//!
//! Covers:
//! - Fresh blockhash per attempt across transient send failures
//! - Retry exhaustion
//! - Expiry of dropped transactions
//! - Execution errors and user rejection are not retried
//! - Local-key signing for relay-paid increments
//! - Failed confirmation polls never resend a sent transaction

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use score_protocol::{
    derive_score_address, increment_instruction, initialize_instruction, ScoreAccount,
};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};

use super::{fast_submitter_config, FUNDED_LAMPORTS};
use crate::{
    error::SubmitError,
    rpc::{ChainRpc, Commitment, LatestBlockhash, RpcError, SendOptions, SignatureStatus},
    submitter::{SubmitterConfig, TransactionSubmitter},
    testing::{MockChain, MockWallet},
    wallet::{SignerCapability, WalletProvider},
};

/// Chain whose signature status and block height reads fail on demand
struct FlakyPolls {
    chain: Arc<MockChain>,
    status_failures: AtomicU32,
    height_failures: AtomicU32,
}

impl FlakyPolls {
    fn new(chain: Arc<MockChain>, status_failures: u32, height_failures: u32) -> Self {
        Self {
            chain,
            status_failures: AtomicU32::new(status_failures),
            height_failures: AtomicU32::new(height_failures),
        }
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ChainRpc for FlakyPolls {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        self.chain.get_balance(address).await
    }

    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError> {
        self.chain.get_account_data(address).await
    }

    async fn get_latest_blockhash(
        &self,
        commitment: Commitment,
    ) -> Result<LatestBlockhash, RpcError> {
        self.chain.get_latest_blockhash(commitment).await
    }

    async fn send_transaction(
        &self,
        transaction: &Transaction,
        options: SendOptions,
    ) -> Result<Signature, RpcError> {
        self.chain.send_transaction(transaction, options).await
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        if Self::take_failure(&self.status_failures) {
            return Err(RpcError::Transport("timeout".to_string()));
        }
        self.chain.get_signature_status(signature).await
    }

    async fn get_block_height(&self, commitment: Commitment) -> Result<u64, RpcError> {
        if Self::take_failure(&self.height_failures) {
            return Err(RpcError::Transport("timeout".to_string()));
        }
        self.chain.get_block_height(commitment).await
    }
}

struct Fixture {
    chain: Arc<MockChain>,
    wallet: Arc<MockWallet>,
    program_id: Pubkey,
    score_address: Pubkey,
}

fn fixture(validity_window: u64) -> Fixture {
    let program_id = Pubkey::new_unique();
    let chain = Arc::new(MockChain::with_validity_window(program_id, validity_window));
    let wallet = Arc::new(MockWallet::new("phantom"));
    chain.airdrop(&wallet.pubkey(), FUNDED_LAMPORTS);
    let (score_address, _) = derive_score_address(&wallet.pubkey(), &program_id).unwrap();

    Fixture {
        chain,
        wallet,
        program_id,
        score_address,
    }
}

fn submitter(chain: &Arc<MockChain>, config: SubmitterConfig) -> TransactionSubmitter {
    let rpc: Arc<dyn ChainRpc> = chain.clone();
    TransactionSubmitter::new(rpc, config)
}

fn wallet_signer(wallet: &Arc<MockWallet>) -> SignerCapability {
    let provider: Arc<dyn WalletProvider> = wallet.clone();
    SignerCapability::Wallet(provider)
}

async fn initialize(f: &Fixture, submitter: &TransactionSubmitter) {
    let player = f.wallet.pubkey();
    let ix = initialize_instruction(&f.program_id, &f.score_address, &player);
    submitter
        .submit(&[ix], &wallet_signer(&f.wallet), &player)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_transient_failures_then_success_uses_fresh_blockhashes() {
    let f = fixture(150);
    let submitter = submitter(&f.chain, fast_submitter_config());
    let player = f.wallet.pubkey();

    f.chain.fail_next_sends(2);
    let ix = initialize_instruction(&f.program_id, &f.score_address, &player);
    let signature = submitter
        .submit(&[ix], &wallet_signer(&f.wallet), &player)
        .await
        .unwrap();

    let issued = f.chain.issued_blockhashes();
    assert_eq!(issued.len(), 3, "one blockhash per attempt");
    assert_eq!(issued.iter().collect::<HashSet<_>>().len(), 3);
    assert_eq!(f.wallet.sign_requests(), 3);

    let sent = f.chain.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].signature, signature);
    assert_eq!(sent[0].blockhash, issued[2]);
    assert_eq!(f.chain.score(&f.score_address), Some(0));
}

#[tokio::test]
async fn test_exhausted_retries_surface_submit_failed() {
    let f = fixture(150);
    let submitter = submitter(&f.chain, fast_submitter_config());
    let player = f.wallet.pubkey();

    f.chain.fail_next_sends(10);
    let ix = initialize_instruction(&f.program_id, &f.score_address, &player);
    let err = submitter
        .submit(&[ix], &wallet_signer(&f.wallet), &player)
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::SubmitFailed { attempts: 3, .. }), "{:?}", err);
    assert_eq!(f.chain.issued_blockhashes().len(), 3);
    assert!(f.chain.account(&f.score_address).is_none());
}

#[tokio::test]
async fn test_dropped_transaction_expires_and_is_rebuilt() {
    let f = fixture(3);
    let submitter = submitter(&f.chain, fast_submitter_config());
    let player = f.wallet.pubkey();

    f.chain.drop_next_sends(1);
    let ix = initialize_instruction(&f.program_id, &f.score_address, &player);
    submitter
        .submit(&[ix], &wallet_signer(&f.wallet), &player)
        .await
        .unwrap();

    let sent = f.chain.sent_transactions();
    assert_eq!(sent.len(), 2);
    assert!(!sent[0].landed);
    assert!(sent[1].landed);
    assert_ne!(sent[0].blockhash, sent[1].blockhash);
    assert_eq!(f.chain.initialize_count(), 1);
}

#[tokio::test]
async fn test_execution_error_is_not_retried() {
    let f = fixture(150);
    let mut config = fast_submitter_config();
    config.send_options.skip_preflight = true;
    let submitter = submitter(&f.chain, config);
    let player = f.wallet.pubkey();

    // Increment before Initialize lands but fails on-chain
    let ix = increment_instruction(&f.program_id, &f.score_address, &player, 10);
    let err = submitter
        .submit(&[ix], &wallet_signer(&f.wallet), &player)
        .await
        .unwrap_err();

    match err {
        SubmitError::ExecutionError(details) => assert!(details.contains("UninitializedAccount")),
        other => panic!("expected execution error, got {:?}", other),
    }
    assert_eq!(f.chain.issued_blockhashes().len(), 1);
    assert!(f.chain.sent_transactions()[0].landed);
}

#[tokio::test]
async fn test_preflight_failure_is_execution_error() {
    let f = fixture(150);
    let submitter = submitter(&f.chain, fast_submitter_config());
    initialize(&f, &submitter).await;

    let player = f.wallet.pubkey();
    let ix = initialize_instruction(&f.program_id, &f.score_address, &player);
    let err = submitter
        .submit(&[ix], &wallet_signer(&f.wallet), &player)
        .await
        .unwrap_err();

    match err {
        SubmitError::ExecutionError(details) => {
            assert!(details.contains("AccountAlreadyInitialized"))
        }
        other => panic!("expected execution error, got {:?}", other),
    }
    assert_eq!(f.chain.initialize_count(), 1);
}

#[tokio::test]
async fn test_user_rejection_is_not_retried() {
    let f = fixture(150);
    let submitter = submitter(&f.chain, fast_submitter_config());
    let player = f.wallet.pubkey();

    f.wallet.set_reject_signing(true);
    let ix = initialize_instruction(&f.program_id, &f.score_address, &player);
    let err = submitter
        .submit(&[ix], &wallet_signer(&f.wallet), &player)
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::UserRejected));
    assert_eq!(f.wallet.sign_requests(), 1);
    assert!(f.chain.sent_transactions().is_empty());
}

#[tokio::test]
async fn test_local_key_pays_for_increment() {
    let f = fixture(150);
    let submitter = submitter(&f.chain, fast_submitter_config());
    initialize(&f, &submitter).await;

    let relay_payer = Arc::new(Keypair::new());
    f.chain.airdrop(&relay_payer.pubkey(), FUNDED_LAMPORTS);
    let player_balance = f.chain.balance(&f.wallet.pubkey());

    let ix = increment_instruction(&f.program_id, &f.score_address, &f.wallet.pubkey(), 25);
    submitter
        .submit(&[ix], &SignerCapability::Local(relay_payer.clone()), &relay_payer.pubkey())
        .await
        .unwrap();

    assert_eq!(f.chain.score(&f.score_address), Some(25));
    assert_eq!(f.chain.balance(&f.wallet.pubkey()), player_balance);
    assert!(f.chain.balance(&relay_payer.pubkey()) < FUNDED_LAMPORTS);
}

#[tokio::test]
async fn test_unsigned_local_key_mismatch_is_signing_error() {
    let f = fixture(150);
    let submitter = submitter(&f.chain, fast_submitter_config());

    // Fee payer is the player but only an unrelated key is available
    let stranger = Arc::new(Keypair::new());
    let ix = increment_instruction(&f.program_id, &f.score_address, &f.wallet.pubkey(), 10);
    let err = submitter
        .submit(&[ix], &SignerCapability::Local(stranger), &f.wallet.pubkey())
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::Signing(_)), "{:?}", err);
    assert!(f.chain.sent_transactions().is_empty());
}

#[tokio::test]
async fn test_failed_status_poll_does_not_resend() {
    let f = fixture(150);
    let player = f.wallet.pubkey();
    f.chain
        .set_account_data(&f.score_address, ScoreAccount::initialized(player).pack());

    let rpc: Arc<dyn ChainRpc> = Arc::new(FlakyPolls::new(f.chain.clone(), 1, 1));
    let submitter = TransactionSubmitter::new(rpc, fast_submitter_config());

    let ix = increment_instruction(&f.program_id, &f.score_address, &player, 10);
    submitter
        .submit(&[ix], &wallet_signer(&f.wallet), &player)
        .await
        .unwrap();

    assert_eq!(f.chain.score(&f.score_address), Some(10));
    assert_eq!(f.chain.issued_blockhashes().len(), 1);
    assert_eq!(f.chain.sent_transactions().len(), 1);
    assert_eq!(f.wallet.sign_requests(), 1);
}

#[tokio::test]
async fn test_unreadable_status_gives_up_without_resend() {
    let f = fixture(150);
    let player = f.wallet.pubkey();
    f.chain
        .set_account_data(&f.score_address, ScoreAccount::initialized(player).pack());

    let rpc: Arc<dyn ChainRpc> = Arc::new(FlakyPolls::new(f.chain.clone(), u32::MAX, 0));
    let mut config = fast_submitter_config();
    config.max_confirm_poll_failures = 5;
    let submitter = TransactionSubmitter::new(rpc, config);

    let ix = increment_instruction(&f.program_id, &f.score_address, &player, 25);
    let err = submitter
        .submit(&[ix], &wallet_signer(&f.wallet), &player)
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::SubmitFailed { attempts: 1, .. }), "{:?}", err);
    assert_eq!(f.chain.sent_transactions().len(), 1);
    assert_eq!(f.chain.score(&f.score_address), Some(25));
}
