//! JSON-RPC HTTP implementation of [`ChainRpc`]
//!
//! Talks to a Solana-compatible node (`getAccountInfo`, `sendTransaction`,
//! `getLatestBlockhash`, ...) without pulling in solana-client.

use crate::rpc::{
    ChainRpc, Commitment, LatestBlockhash, RpcError, SendOptions, SignatureStatus,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use jsonrpsee::{
    core::{client::ClientT, params::ArrayParams, ClientError},
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};
use std::{str::FromStr, time::Duration};

/// JSON-RPC code for a failed sendTransaction preflight simulation
const SEND_TRANSACTION_PREFLIGHT_FAILURE: i32 = -32002;

// ============ Response Types ============

#[derive(Debug, Deserialize)]
struct ResponseContext {
    #[allow(dead_code)]
    slot: u64,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    #[allow(dead_code)]
    context: ResponseContext,
    value: T,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    data: (String, String), // (data, encoding)
    #[allow(dead_code)]
    lamports: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashInfo {
    blockhash: String,
    last_valid_block_height: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionStatus {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<Commitment>,
}

/// Chain RPC over HTTP JSON-RPC
pub struct JsonRpcChainClient {
    client: HttpClient,
    url: String,
}

impl JsonRpcChainClient {
    /// Create a client for the given node URL
    pub fn new(url: &str) -> Result<Self, RpcError> {
        Self::with_timeout(url, Duration::from_secs(30))
    }

    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(url)
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Get the RPC URL
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: ArrayParams,
    ) -> Result<R, RpcError> {
        tracing::trace!("RPC call {} -> {}", method, self.url);
        self.client
            .request(method, params)
            .await
            .map_err(map_client_error)
    }
}

/// Map a jsonrpsee client error into an [`RpcError`]
fn map_client_error(error: ClientError) -> RpcError {
    match error {
        ClientError::Call(obj) => {
            let message = obj.message().to_string();
            if obj.code() == SEND_TRANSACTION_PREFLIGHT_FAILURE
                && !message.contains("Blockhash not found")
            {
                RpcError::PreflightFailure(message)
            } else {
                RpcError::Node {
                    code: obj.code(),
                    message,
                }
            }
        }
        ClientError::ParseError(e) => RpcError::InvalidResponse(e.to_string()),
        other => RpcError::Transport(other.to_string()),
    }
}

#[async_trait]
impl ChainRpc for JsonRpcChainClient {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        let response: WithContext<u64> = self
            .call(
                "getBalance",
                rpc_params![address.to_string(), json!({ "commitment": "confirmed" })],
            )
            .await?;
        Ok(response.value)
    }

    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError> {
        let response: WithContext<Option<AccountInfo>> = self
            .call(
                "getAccountInfo",
                rpc_params![
                    address.to_string(),
                    json!({ "encoding": "base64", "commitment": "confirmed" })
                ],
            )
            .await?;

        response
            .value
            .map(|info| {
                let (data, encoding) = info.data;
                if encoding != "base64" {
                    return Err(RpcError::InvalidResponse(format!(
                        "Unexpected account encoding: {}",
                        encoding
                    )));
                }
                BASE64
                    .decode(data)
                    .map_err(|e| RpcError::InvalidResponse(format!("Invalid base64: {}", e)))
            })
            .transpose()
    }

    async fn get_latest_blockhash(
        &self,
        commitment: Commitment,
    ) -> Result<LatestBlockhash, RpcError> {
        let response: WithContext<BlockhashInfo> = self
            .call(
                "getLatestBlockhash",
                rpc_params![json!({ "commitment": commitment.as_str() })],
            )
            .await?;

        let blockhash = Hash::from_str(&response.value.blockhash)
            .map_err(|e| RpcError::InvalidResponse(format!("Invalid blockhash: {}", e)))?;

        Ok(LatestBlockhash {
            blockhash,
            last_valid_block_height: response.value.last_valid_block_height,
        })
    }

    async fn send_transaction(
        &self,
        transaction: &Transaction,
        options: SendOptions,
    ) -> Result<Signature, RpcError> {
        let bytes = bincode::serialize(transaction)
            .map_err(|e| RpcError::InvalidResponse(format!("Cannot serialize transaction: {}", e)))?;

        let signature: String = self
            .call(
                "sendTransaction",
                rpc_params![
                    BASE64.encode(bytes),
                    json!({
                        "encoding": "base64",
                        "skipPreflight": options.skip_preflight,
                        "preflightCommitment": options.preflight_commitment.as_str(),
                    })
                ],
            )
            .await?;

        Signature::from_str(&signature)
            .map_err(|e| RpcError::InvalidResponse(format!("Invalid signature: {}", e)))
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let response: WithContext<Vec<Option<TransactionStatus>>> = self
            .call(
                "getSignatureStatuses",
                rpc_params![vec![signature.to_string()]],
            )
            .await?;

        Ok(response.value.into_iter().next().flatten().map(|status| {
            SignatureStatus {
                confirmation: status.confirmation_status.unwrap_or(Commitment::Processed),
                err: status.err.map(|err| err.to_string()),
            }
        }))
    }

    async fn get_block_height(&self, commitment: Commitment) -> Result<u64, RpcError> {
        self.call(
            "getBlockHeight",
            rpc_params![json!({ "commitment": commitment.as_str() })],
        )
        .await
    }
}
