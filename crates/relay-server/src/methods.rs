//! Relay Methods - request handling for `POST /collect-item`
//!
//! The relay pays for and signs IncrementScore on behalf of players. It
//! trusts nothing from the request: the score account address is re-derived
//! from the player key and the increment must be an item value.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use score_client::{SignerCapability, SubmitError, TransactionSubmitter};
use score_protocol::{
    increment_instruction, verify_score_address, CollectItemRequest, CollectItemResponse,
    ItemKind, ProtocolError, RelayErrorBody,
};
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use std::{str::FromStr, sync::Arc};

/// Relay context shared across handlers
pub struct RelayContext {
    pub submitter: TransactionSubmitter,
    /// Fee payer and signer for every relayed increment
    pub payer: Arc<Keypair>,
    pub program_id: Pubkey,
}

impl RelayContext {
    pub fn new(submitter: TransactionSubmitter, payer: Arc<Keypair>, program_id: Pubkey) -> Self {
        Self {
            submitter,
            payer,
            program_id,
        }
    }
}

/// Handle a collect-item request
pub async fn handle_collect_item(
    ctx: &RelayContext,
    request: CollectItemRequest,
) -> Result<CollectItemResponse, RelayError> {
    let item = ItemKind::from_points(request.increment).ok_or_else(|| {
        RelayError::InvalidParams(format!("Increment {} is not an item value", request.increment))
    })?;

    let player = parse_pubkey("playerPublicKey", &request.player_public_key)?;
    let score_address = parse_pubkey("scoreAccountAddress", &request.score_account_address)?;

    verify_score_address(&player, &score_address, &ctx.program_id).map_err(|e| match e {
        ProtocolError::InvalidAddress { .. } => RelayError::InvalidAddress(e.to_string()),
        other => RelayError::InternalError(other.to_string()),
    })?;

    let instruction =
        increment_instruction(&ctx.program_id, &score_address, &player, item.points());
    let signer = SignerCapability::Local(ctx.payer.clone());

    let signature = ctx
        .submitter
        .submit(&[instruction], &signer, &ctx.payer.pubkey())
        .await
        .map_err(RelayError::from)?;

    tracing::info!(
        "Relayed {} (+{}) for {} ({})",
        item,
        item.points(),
        player,
        signature
    );

    Ok(CollectItemResponse {
        success: true,
        increment: item.points(),
        signature: signature.to_string(),
    })
}

/// Handle health check
pub fn handle_health() -> &'static str {
    "ok"
}

fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey, RelayError> {
    Pubkey::from_str(value)
        .map_err(|_| RelayError::InvalidParams(format!("Invalid {}: {}", field, value)))
}

// ============ Error Types ============

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("{0}")]
    InvalidAddress(String),
    #[error("Submit failed: {0}")]
    SubmitFailed(String),
    #[error("Transaction failed: {0}")]
    Execution(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidParams(_) | RelayError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            RelayError::SubmitFailed(_) => StatusCode::BAD_GATEWAY,
            RelayError::Execution(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RelayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SubmitError> for RelayError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::SubmitFailed { .. } => RelayError::SubmitFailed(e.to_string()),
            SubmitError::ExecutionError(details) => RelayError::Execution(details),
            other => RelayError::InternalError(other.to_string()),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("collect-item failed: {}", self);
        } else {
            tracing::warn!("collect-item rejected: {}", self);
        }

        let body = RelayErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
