//! Relay HTTP payloads for `POST /collect-item`

use serde::{Deserialize, Serialize};

/// Request body sent by the game client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectItemRequest {
    /// Points to add
    pub increment: u64,
    /// Score account PDA (base58)
    pub score_account_address: String,
    /// Player wallet (base58)
    pub player_public_key: String,
}

/// Successful relay response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectItemResponse {
    pub success: bool,
    pub increment: u64,
    /// Transaction signature (base58)
    pub signature: String,
}

/// Error body for 4xx/5xx responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayErrorBody {
    pub error: String,
}
