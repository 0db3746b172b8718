//! Backend relay client for `POST /collect-item`

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::{body::Bytes, header, Method, Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use score_protocol::{CollectItemRequest, CollectItemResponse, RelayErrorBody};
use std::time::Duration;

/// Default bound on one relay round trip
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Relay client errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayClientError {
    #[error("Relay request failed: {0}")]
    Transport(String),
    #[error("Relay rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Invalid relay response: {0}")]
    InvalidResponse(String),
}

/// Submits score increments through the backend relay
#[async_trait]
pub trait ScoreRelay: Send + Sync {
    async fn collect_item(
        &self,
        request: &CollectItemRequest,
    ) -> Result<CollectItemResponse, RelayClientError>;
}

/// HTTP relay client
pub struct HttpRelayClient {
    endpoint: String,
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl HttpRelayClient {
    /// Create a client for a relay base URL such as `http://127.0.0.1:3001`
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, DEFAULT_RELAY_TIMEOUT)
    }

    /// Like [`HttpRelayClient::new`], failing requests that take longer than `timeout`
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        Self {
            endpoint: format!("{}/collect-item", base_url.trim_end_matches('/')),
            client: Client::builder(TokioExecutor::new()).build_http(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ScoreRelay for HttpRelayClient {
    async fn collect_item(
        &self,
        request: &CollectItemRequest,
    ) -> Result<CollectItemResponse, RelayClientError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| RelayClientError::InvalidResponse(e.to_string()))?;

        let http_request = Request::builder()
            .method(Method::POST)
            .uri(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| RelayClientError::Transport(e.to_string()))?;

        let exchange = async {
            let response = self
                .client
                .request(http_request)
                .await
                .map_err(|e| RelayClientError::Transport(e.to_string()))?;

            let status = response.status();
            let bytes = response
                .into_body()
                .collect()
                .await
                .map_err(|e| RelayClientError::Transport(e.to_string()))?
                .to_bytes();
            Ok::<_, RelayClientError>((status, bytes))
        };

        let (status, bytes) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                RelayClientError::Transport(format!("no response within {:?}", self.timeout))
            })??;

        if status == StatusCode::OK {
            return serde_json::from_slice(&bytes)
                .map_err(|e| RelayClientError::InvalidResponse(e.to_string()));
        }

        let message = serde_json::from_slice::<RelayErrorBody>(&bytes)
            .map(|body| body.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());

        Err(RelayClientError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use score_protocol::ItemKind;
    use solana_sdk::pubkey::Pubkey;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_silent_relay_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept connections and never answer
        let server = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                open.push(stream);
            }
        });

        let client =
            HttpRelayClient::with_timeout(&format!("http://{}", addr), Duration::from_millis(50));
        let request = CollectItemRequest {
            increment: ItemKind::Coin.points(),
            score_account_address: Pubkey::new_unique().to_string(),
            player_public_key: Pubkey::new_unique().to_string(),
        };

        let result = tokio::time::timeout(Duration::from_secs(5), client.collect_item(&request))
            .await
            .unwrap();

        assert!(matches!(result, Err(RelayClientError::Transport(_))));
        server.abort();
    }

    #[test]
    fn test_endpoint_path() {
        let client = HttpRelayClient::new("http://127.0.0.1:3001/");
        assert_eq!(client.endpoint(), "http://127.0.0.1:3001/collect-item");
    }
}
