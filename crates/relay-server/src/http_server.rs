//! HTTP Relay Server
//!
//! Exposes `POST /collect-item` and `GET /health`.

use crate::methods::{handle_collect_item, handle_health, RelayContext, RelayError};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, Method},
    routing::{get, post},
    Json, Router,
};
use score_protocol::{CollectItemRequest, CollectItemResponse};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// HTTP relay server
pub struct RelayServer {
    context: Arc<RelayContext>,
}

impl RelayServer {
    pub fn new(context: Arc<RelayContext>) -> Self {
        Self { context }
    }

    /// Create the Axum router
    pub fn router(self) -> Router {
        // Browser game client calls from another origin
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

        Router::new()
            .route("/collect-item", post(collect_item))
            .route("/health", get(health))
            .layer(cors)
            .with_state(self.context)
    }

    /// Bind `addr` and serve until the task is dropped
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        tracing::info!("Score relay listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

async fn collect_item(
    State(context): State<Arc<RelayContext>>,
    payload: Result<Json<CollectItemRequest>, JsonRejection>,
) -> Result<Json<CollectItemResponse>, RelayError> {
    let Json(request) = payload.map_err(|e| RelayError::InvalidParams(e.body_text()))?;
    tracing::debug!(
        "collect-item: +{} for {}",
        request.increment,
        request.player_public_key
    );

    let response = handle_collect_item(&context, request).await?;
    Ok(Json(response))
}

async fn health() -> &'static str {
    handle_health()
}
