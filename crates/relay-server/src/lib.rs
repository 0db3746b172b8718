//! Relay Server - backend submitter for score increments
//!
//! Lets players score on-chain without signing every pickup:
//! - `POST /collect-item`: verify the score account address, then submit
//!   IncrementScore paid and signed by the relay key
//! - `GET /health`: liveness

pub mod http_server;
pub mod methods;

pub use http_server::RelayServer;
pub use methods::{RelayContext, RelayError};
