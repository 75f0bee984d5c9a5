//! Shroud ledger client.
//!
//! [`LedgerClient`] is the only way the engine talks to a ledger node.
//! [`HttpLedgerClient`] speaks the node's JSON-over-HTTP API; the devnet
//! crate provides an in-process implementation for tests.

use std::future::Future;

use shroud_account::{Account, ConfidentialKeyPair};
use shroud_transaction::{ConfidentialToken, SubmitResponse, TxItem};

pub mod error;
pub mod http;
pub mod retry;
pub mod rpc;

pub use error::ClientError;
pub use http::{HttpClientConfig, HttpLedgerClient};
pub use retry::{Attempt, Backoff, Exhausted, RetryPolicy};
pub use rpc::{
    AccountInfo, CreateAssetRequest, CreateTxRequest, CreateTxResult, DecryptRequest, HistoryTx,
    MetadataEntry, TransactionHistory,
};

pub type Result<T> = std::result::Result<T, ClientError>;

/// RPC surface of a ledger node.
///
/// Every call is a single request; no implementation retries internally.
pub trait LedgerClient: Send + Sync {
    fn get_account(&self, address: &str) -> impl Future<Output = Result<AccountInfo>> + Send;

    fn create_account(&self) -> impl Future<Output = Result<Account>> + Send;

    fn create_confidential_key_pair(&self) -> impl Future<Output = Result<ConfidentialKeyPair>> + Send;

    fn create_confidential_asset(
        &self,
        request: &CreateAssetRequest,
    ) -> impl Future<Output = Result<ConfidentialToken>> + Send;

    fn create_confidential_tx(
        &self,
        request: &CreateTxRequest,
    ) -> impl Future<Output = Result<CreateTxResult>> + Send;

    fn submit_transaction(&self, items: &[TxItem]) -> impl Future<Output = Result<SubmitResponse>> + Send;

    /// History of one transaction; `NodeRejected` while it is not yet applied.
    fn get_transaction_history(&self, hash: &str) -> impl Future<Output = Result<TransactionHistory>> + Send;

    /// Raw metadata value stored under `key` on `address`, if any.
    fn get_account_metadata(
        &self,
        address: &str,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    fn decrypt_value(&self, request: &DecryptRequest) -> impl Future<Output = Result<u64>> + Send;
}
