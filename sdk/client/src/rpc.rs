//! Typed request and response bodies of the ledger RPC surface.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shroud_transaction::{TransferParams, TxItem, codes};

use crate::error::ClientError;

/// Envelope of every GET response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcEnvelope<T> {
    pub error_code: i32,
    #[serde(default)]
    pub error_desc: String,
    pub result: Option<T>,
}

impl<T> RpcEnvelope<T> {
    pub fn ok(result: T) -> Self {
        Self {
            error_code: codes::SUCCESS,
            error_desc: String::new(),
            result: Some(result),
        }
    }

    /// Unwrap the result, turning a non-zero `error_code` into `NodeRejected`.
    pub fn open(self, module: &str) -> Result<T, ClientError> {
        if self.error_code != codes::SUCCESS {
            return Err(ClientError::rejected(module, self.error_code, self.error_desc));
        }
        self.result.ok_or_else(|| ClientError::Decode {
            module: module.to_string(),
            message: "missing result".into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub address: String,
    /// Absent until the account has sent its first transaction.
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub balance: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssetRequest {
    pub priv_key: String,
    pub value: u64,
    pub to_pub: String,
    #[serde(default)]
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTxRequest {
    pub spend_key: String,
    pub from: String,
    pub to: String,
    pub to_pub: String,
    pub value: u64,
    pub contract_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTxResult {
    pub verify_tally: bool,
    pub params: TransferParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub items: Vec<TxItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTx {
    pub hash: String,
    pub error_code: i32,
    #[serde(default)]
    pub error_desc: String,
    #[serde(default)]
    pub ledger_seq: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHistory {
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub transactions: Vec<HistoryTx>,
}

impl TransactionHistory {
    pub fn find(&self, hash: &str) -> Option<&HistoryTx> {
        self.transactions.iter().find(|tx| tx.hash == hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub version: u64,
}

/// `getAccountMetaData` result: entries keyed by metadata key.
pub type Metadata = HashMap<String, MetadataEntry>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptRequest {
    pub priv_key: String,
    pub encrypt_value: String,
    pub from: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_open() {
        let env: RpcEnvelope<AccountInfo> =
            serde_json::from_str(r#"{"error_code":0,"result":{"address":"a","balance":5}}"#).unwrap();
        let info = env.open("getAccount").unwrap();
        assert_eq!(info.nonce, None);
        assert_eq!(info.balance, 5);
    }

    #[test]
    fn test_envelope_rejection_is_typed() {
        let env: RpcEnvelope<AccountInfo> =
            serde_json::from_str(r#"{"error_code":4,"error_desc":"account not exist"}"#).unwrap();
        let err = env.open("getAccount").unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_envelope_missing_result() {
        let env: RpcEnvelope<AccountInfo> = serde_json::from_str(r#"{"error_code":0}"#).unwrap();
        assert!(matches!(env.open("getAccount"), Err(ClientError::Decode { .. })));
    }

    fn open_body<T: serde::de::DeserializeOwned>(body: &str, module: &str) -> Result<T, ClientError> {
        let env: RpcEnvelope<T> = serde_json::from_str(body).map_err(|e| ClientError::Decode {
            module: module.to_string(),
            message: e.to_string(),
        })?;
        env.open(module)
    }

    #[test]
    fn test_envelope_opens_for_any_owned_result() {
        // CreateTxResult has no Default impl.
        let body = r#"{"error_code":0,"result":{"verify_tally":true,"params":{"excess_sig":"s","excess_msg":"m","inputs":[],"outputs":[]}}}"#;
        let result: CreateTxResult = open_body(body, "createConfidentialTx").unwrap();
        assert!(result.verify_tally);

        let missing: Result<HistoryTx, _> = open_body(r#"{"error_code":4}"#, "getTransactionHistory");
        assert!(missing.unwrap_err().is_not_found());
    }
}
