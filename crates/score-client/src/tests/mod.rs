//! Scenario tests against the in-memory chain

mod submitter_test;

use crate::{retry::RetryPolicy, submitter::SubmitterConfig};
use std::time::Duration;

/// Plenty of lamports for rent and fees
pub(crate) const FUNDED_LAMPORTS: u64 = 10_000_000_000;

/// Submitter config without waits between polls or attempts
pub(crate) fn fast_submitter_config() -> SubmitterConfig {
    SubmitterConfig {
        confirm_poll_interval: Duration::ZERO,
        retry: RetryPolicy::immediate(3),
        ..Default::default()
    }
}
