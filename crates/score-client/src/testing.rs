//! In-memory chain and wallet for tests
//!
//! [`MockChain`] implements [`ChainRpc`] over a DashMap ledger and executes
//! score program instructions with the program's rules (PDA check,
//! initialize-once, MAX_SCORE ceiling, checked add). Blockhashes expire
//! after a configurable number of blocks and every `getBlockHeight` call
//! advances the chain by one block.

use crate::{
    rpc::{ChainRpc, Commitment, LatestBlockhash, RpcError, SendOptions, SignatureStatus},
    wallet::{WalletError, WalletProvider},
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use score_protocol::{derive_score_address, read_account_state, ScoreAccount, ScoreInstruction};
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
};

/// Lamports moved into a new score account
pub const MOCK_RENT_LAMPORTS: u64 = 1_176_240;
/// Flat fee charged to the fee payer per landed transaction
pub const MOCK_FEE_LAMPORTS: u64 = 5_000;

/// Ledger account
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MockAccount {
    pub lamports: u64,
    pub data: Vec<u8>,
    pub owner: Pubkey,
}

/// Record of a transaction accepted by `send_transaction`
#[derive(Clone, Debug)]
pub struct SentTransaction {
    pub signature: Signature,
    pub blockhash: Hash,
    pub fee_payer: Pubkey,
    pub instructions: Vec<ScoreInstruction>,
    /// False for dropped transactions and failed preflights
    pub landed: bool,
}

#[derive(Default)]
struct Faults {
    fail_sends: u32,
    drop_sends: u32,
    fail_reads: bool,
}

/// In-memory chain
pub struct MockChain {
    program_id: Pubkey,
    accounts: DashMap<Pubkey, MockAccount>,
    block_height: AtomicU64,
    validity_window: u64,
    blockhashes: DashMap<Hash, u64>,
    issued: Mutex<Vec<Hash>>,
    sent: Mutex<Vec<SentTransaction>>,
    statuses: DashMap<Signature, SignatureStatus>,
    faults: Mutex<Faults>,
}

impl MockChain {
    pub fn new(program_id: Pubkey) -> Self {
        Self::with_validity_window(program_id, 150)
    }

    /// Blockhashes stay valid for `blocks` blocks after issue
    pub fn with_validity_window(program_id: Pubkey, blocks: u64) -> Self {
        Self {
            program_id,
            accounts: DashMap::new(),
            block_height: AtomicU64::new(1),
            validity_window: blocks,
            blockhashes: DashMap::new(),
            issued: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            statuses: DashMap::new(),
            faults: Mutex::new(Faults::default()),
        }
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    pub fn airdrop(&self, address: &Pubkey, lamports: u64) {
        self.accounts.entry(*address).or_default().lamports += lamports;
    }

    pub fn set_account_data(&self, address: &Pubkey, data: Vec<u8>) {
        self.accounts.entry(*address).or_default().data = data;
    }

    pub fn account(&self, address: &Pubkey) -> Option<MockAccount> {
        self.accounts.get(address).map(|r| r.value().clone())
    }

    pub fn balance(&self, address: &Pubkey) -> u64 {
        self.accounts.get(address).map(|a| a.lamports).unwrap_or(0)
    }

    /// On-chain score of an active account
    pub fn score(&self, address: &Pubkey) -> Option<u64> {
        let data = self.accounts.get(address).map(|a| a.data.clone());
        read_account_state(data.as_deref()).score()
    }

    /// The next `n` sends fail with a transport error
    pub fn fail_next_sends(&self, n: u32) {
        self.faults.lock().fail_sends = n;
    }

    /// The next `n` sends are accepted but never land
    pub fn drop_next_sends(&self, n: u32) {
        self.faults.lock().drop_sends = n;
    }

    /// Make balance and account reads fail
    pub fn fail_account_reads(&self, fail: bool) {
        self.faults.lock().fail_reads = fail;
    }

    pub fn advance_blocks(&self, blocks: u64) {
        self.block_height.fetch_add(blocks, Ordering::SeqCst);
    }

    /// Every blockhash handed out, in order
    pub fn issued_blockhashes(&self) -> Vec<Hash> {
        self.issued.lock().clone()
    }

    pub fn sent_transactions(&self) -> Vec<SentTransaction> {
        self.sent.lock().clone()
    }

    /// Landed Initialize instructions
    pub fn initialize_count(&self) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|tx| tx.landed)
            .flat_map(|tx| tx.instructions.iter())
            .filter(|ix| **ix == ScoreInstruction::Initialize)
            .count()
    }

    fn check_reads(&self) -> Result<(), RpcError> {
        if self.faults.lock().fail_reads {
            return Err(RpcError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn score_instructions(&self, transaction: &Transaction) -> Vec<ScoreInstruction> {
        let message = &transaction.message;
        message
            .instructions
            .iter()
            .filter(|ix| message.account_keys[ix.program_id_index as usize] == self.program_id)
            .filter_map(|ix| ScoreInstruction::unpack(&ix.data).ok())
            .collect()
    }

    fn load(&self, writes: &HashMap<Pubkey, MockAccount>, address: &Pubkey) -> Option<MockAccount> {
        writes
            .get(address)
            .cloned()
            .or_else(|| self.account(address))
    }

    /// Run the transaction's score instructions, returning the account writes
    fn execute(&self, transaction: &Transaction) -> Result<HashMap<Pubkey, MockAccount>, String> {
        let message = &transaction.message;
        let mut writes = HashMap::new();

        for (index, ix) in message.instructions.iter().enumerate() {
            if message.account_keys[ix.program_id_index as usize] != self.program_id {
                continue;
            }

            let key = |i: usize| ix.accounts.get(i).map(|&a| message.account_keys[a as usize]);
            let (Some(score_key), Some(player_key)) = (key(0), key(1)) else {
                return Err(format!("Instruction {}: NotEnoughAccountKeys", index));
            };

            let (pda, _) = derive_score_address(&player_key, &self.program_id)
                .map_err(|e| format!("Instruction {}: {}", index, e))?;
            if pda != score_key {
                return Err(format!("Instruction {}: InvalidAccountData", index));
            }

            let current = self.load(&writes, &score_key);
            let initialized = current
                .as_ref()
                .map(|a| a.data.len() == ScoreAccount::LEN && a.data[0] == 1)
                .unwrap_or(false);

            match ScoreInstruction::unpack(&ix.data) {
                Ok(ScoreInstruction::Initialize) => {
                    if initialized {
                        return Err(format!("Instruction {}: AccountAlreadyInitialized", index));
                    }
                    if !message.is_signer(ix.accounts[1] as usize) {
                        return Err(format!("Instruction {}: MissingRequiredSignature", index));
                    }

                    let mut payer = self.load(&writes, &player_key).unwrap_or_default();
                    if payer.lamports < MOCK_RENT_LAMPORTS {
                        return Err(format!("Instruction {}: insufficient lamports", index));
                    }
                    payer.lamports -= MOCK_RENT_LAMPORTS;
                    writes.insert(player_key, payer);
                    writes.insert(
                        score_key,
                        MockAccount {
                            lamports: MOCK_RENT_LAMPORTS,
                            data: ScoreAccount::initialized(player_key).pack(),
                            owner: self.program_id,
                        },
                    );
                }
                Ok(ScoreInstruction::IncrementScore { amount }) => {
                    let Some(mut account) = current.filter(|_| initialized) else {
                        return Err(format!("Instruction {}: UninitializedAccount", index));
                    };
                    let mut record = ScoreAccount::unpack(&account.data)
                        .map_err(|e| format!("Instruction {}: {}", index, e))?;
                    record
                        .apply_increment(amount)
                        .map_err(|e| format!("Instruction {}: {}", index, e))?;
                    account.data = record.pack();
                    writes.insert(score_key, account);
                }
                Err(_) => {
                    return Err(format!("Instruction {}: InvalidInstructionData", index));
                }
            }
        }

        Ok(writes)
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        self.check_reads()?;
        Ok(self.balance(address))
    }

    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError> {
        self.check_reads()?;
        Ok(self.account(address).map(|a| a.data))
    }

    async fn get_latest_blockhash(
        &self,
        _commitment: Commitment,
    ) -> Result<LatestBlockhash, RpcError> {
        let blockhash = Hash::new_unique();
        let last_valid_block_height =
            self.block_height.load(Ordering::SeqCst) + self.validity_window;

        self.blockhashes.insert(blockhash, last_valid_block_height);
        self.issued.lock().push(blockhash);

        Ok(LatestBlockhash {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn send_transaction(
        &self,
        transaction: &Transaction,
        options: SendOptions,
    ) -> Result<Signature, RpcError> {
        {
            let mut faults = self.faults.lock();
            if faults.fail_sends > 0 {
                faults.fail_sends -= 1;
                return Err(RpcError::Transport("connection reset by peer".to_string()));
            }
        }

        let blockhash = transaction.message.recent_blockhash;
        let height = self.block_height.load(Ordering::SeqCst);
        let fresh = self
            .blockhashes
            .get(&blockhash)
            .map(|last_valid| height <= *last_valid)
            .unwrap_or(false);
        if !fresh {
            return Err(RpcError::Node {
                code: -32002,
                message: "Transaction simulation failed: Blockhash not found".to_string(),
            });
        }

        transaction.verify().map_err(|_| RpcError::Node {
            code: -32003,
            message: "Transaction signature verification failure".to_string(),
        })?;

        let signature = transaction.signatures[0];
        let mut record = SentTransaction {
            signature,
            blockhash,
            fee_payer: transaction.message.account_keys[0],
            instructions: self.score_instructions(transaction),
            landed: false,
        };

        let dropped = {
            let mut faults = self.faults.lock();
            let dropped = faults.drop_sends > 0;
            if dropped {
                faults.drop_sends -= 1;
            }
            dropped
        };
        if dropped {
            self.sent.lock().push(record);
            return Ok(signature);
        }

        let result = self.execute(transaction);
        if let Err(details) = &result {
            if !options.skip_preflight {
                self.sent.lock().push(record);
                return Err(RpcError::PreflightFailure(details.clone()));
            }
        }

        let err = match result {
            Ok(writes) => {
                for (address, account) in writes {
                    self.accounts.insert(address, account);
                }
                None
            }
            Err(details) => Some(details),
        };

        if let Some(mut payer) = self.accounts.get_mut(&record.fee_payer) {
            payer.lamports = payer.lamports.saturating_sub(MOCK_FEE_LAMPORTS);
        }

        self.statuses.insert(
            signature,
            SignatureStatus {
                confirmation: Commitment::Confirmed,
                err,
            },
        );
        record.landed = true;
        self.sent.lock().push(record);

        Ok(signature)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        Ok(self.statuses.get(signature).map(|s| s.value().clone()))
    }

    async fn get_block_height(&self, _commitment: Commitment) -> Result<u64, RpcError> {
        Ok(self.block_height.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Scriptable wallet
pub struct MockWallet {
    name: String,
    keypair: Keypair,
    trusted: bool,
    available: bool,
    reject_signing: AtomicBool,
    connect_attempts: AtomicUsize,
    sign_requests: AtomicUsize,
}

impl MockWallet {
    /// Trusted, available wallet with a fresh key
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            keypair: Keypair::new(),
            trusted: true,
            available: true,
            reject_signing: AtomicBool::new(false),
            connect_attempts: AtomicUsize::new(0),
            sign_requests: AtomicUsize::new(0),
        }
    }

    /// Has not approved the site; silent connects fail
    pub fn untrusted(mut self) -> Self {
        self.trusted = false;
        self
    }

    /// Extension not installed
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Decline every signing prompt from now on
    pub fn set_reject_signing(&self, reject: bool) {
        self.reject_signing.store(reject, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn sign_requests(&self) -> usize {
        self.sign_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, only_if_trusted: bool) -> Result<Pubkey, WalletError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(WalletError::Unavailable(format!("{} not installed", self.name)));
        }
        if only_if_trusted && !self.trusted {
            return Err(WalletError::NotTrusted);
        }
        Ok(self.keypair.pubkey())
    }

    async fn sign_transaction(
        &self,
        mut transaction: Transaction,
    ) -> Result<Transaction, WalletError> {
        self.sign_requests.fetch_add(1, Ordering::SeqCst);
        if self.reject_signing.load(Ordering::SeqCst) {
            return Err(WalletError::UserRejected);
        }

        let blockhash = transaction.message.recent_blockhash;
        transaction
            .try_partial_sign(&[&self.keypair], blockhash)
            .map_err(|e| WalletError::Unavailable(e.to_string()))?;
        Ok(transaction)
    }
}
