//! Shroud engine
//!
//! Builds, submits and confirms confidential transfers against a ledger
//! node reached through [`LedgerClient`].
//!
//! ```text
//! AccountDirectory ──▶ ConfidentialTransferBuilder ──▶ local audit (verify)
//!        │                      ▲                            │
//!        │      ConfidentialAssetBuilder (issuance)          ▼
//!        └──── nonces ───────────────────────────▶ SubmissionOrchestrator
//!                                                     │ submit (chunked)
//!                                                     │ wait_for_finality
//!                                                     ▼
//!                                                 LedgerClient
//! ```

use std::time::Duration;

use shroud_client::{Backoff, RetryPolicy};
use shroud_config::{BackoffKind, PollConfig};

pub mod asset;
pub mod directory;
pub mod error;
pub mod orchestrator;
pub mod scenario;
pub mod transfer;
pub mod verify;

pub use asset::ConfidentialAssetBuilder;
pub use directory::{AccountDirectory, await_account, resolve_nonce};
pub use error::{EngineError, Result};
pub use orchestrator::{
    BatchState, Finality, ItemOutcome, ItemReport, SubmissionOrchestrator, SubmissionResult, TxBatch,
};
pub use scenario::{Balance, ScenarioDriver, TransferReceipt};
pub use transfer::{CandidateTransfer, ConfidentialTransferBuilder};

/// Retry policy for a configured polling loop.
pub fn poll_policy(config: &PollConfig) -> RetryPolicy {
    let backoff = match config.backoff {
        BackoffKind::Fixed => Backoff::Fixed,
        BackoffKind::Exponential => Backoff::Exponential {
            max: Duration::from_millis(config.backoff_cap_ms),
        },
    };
    RetryPolicy {
        max_attempts: config.max_attempts,
        interval: config.interval(),
        backoff,
    }
}
