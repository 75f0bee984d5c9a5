use serde::{Deserialize, Serialize};

pub mod codes;
pub mod contract;
pub mod error;
pub mod operation;
pub mod token;

pub use contract::{
    CONFIDENTIAL_CONTRACT_PAYLOAD, ContractCall, IssueParams, RangeproofVerifyParams,
    TallyVerifyParams, TransferParams, kernel_message,
};
pub use error::TransactionError;
pub use operation::{CreateAccount, IssueAsset, Operation, PayCoin, Payment, Privilege};
pub use token::{ConfidentialToken, StoredToken, TokenRef, TokenSet};

/// The body a source account signs: one nonce, one or more operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionJson {
    pub source_address: String,
    pub nonce: u64,
    pub fee_limit: u64,
    pub gas_price: u64,
    pub operations: Vec<Operation>,
}

/// One entry of a `submitTransaction` request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxItem {
    pub transaction_json: TransactionJson,
    pub private_keys: Vec<String>,
}

impl std::fmt::Debug for TxItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxItem")
            .field("transaction_json", &self.transaction_json)
            .field("private_keys", &self.private_keys.len())
            .finish()
    }
}

/// Per-item outcome reported by `submitTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub error_code: i32,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub error_desc: String,
}

impl SubmitResult {
    pub fn is_success(&self) -> bool {
        self.error_code == codes::SUCCESS
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success_count: usize,
    #[serde(default)]
    pub results: Vec<SubmitResult>,
}
