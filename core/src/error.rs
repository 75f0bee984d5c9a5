use thiserror::Error;

use shroud_client::ClientError;
use shroud_transaction::TransactionError;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("{module} rejected with error_code {code}: {desc}")]
    NodeRejected {
        module: String,
        code: i32,
        desc: String,
    },

    #[error("account {0} not found on ledger")]
    AccountNotFound(String),

    #[error("confidential asset creation failed: {0}")]
    AssetCreationFailed(String),

    #[error("transfer from {0} does not balance")]
    TallyMismatch(String),

    #[error("range proof of output {index} rejected")]
    RangeProofRejected { index: usize },

    #[error("{what} not settled after {attempts} attempts")]
    Timeout { what: String, attempts: u32 },

    #[error("invalid candidate transfer: {0}")]
    InvalidCandidate(String),

    #[error("nonce gap for {address}: expected {expected}, got {got}")]
    NonceGap {
        address: String,
        expected: u64,
        got: u64,
    },

    #[error("unknown role {0}")]
    UnknownRole(String),

    #[error("account directory is sealed")]
    DirectorySealed,

    #[error("confidential asset contract not deployed")]
    ContractNotDeployed,

    #[error("encoding failed: {0}")]
    Encoding(String),
}

impl From<ClientError> for EngineError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Transport { .. } | ClientError::Timeout { .. } => {
                EngineError::TransportFailure(err.to_string())
            }
            ClientError::NodeRejected { module, code, desc } => {
                EngineError::NodeRejected { module, code, desc }
            }
            ClientError::Decode { .. } => EngineError::Encoding(err.to_string()),
        }
    }
}

impl From<TransactionError> for EngineError {
    fn from(err: TransactionError) -> Self {
        EngineError::Encoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_onto_taxonomy() {
        let err: EngineError = ClientError::transport("getAccount", "connection refused").into();
        assert!(matches!(err, EngineError::TransportFailure(_)));

        let err: EngineError = ClientError::Timeout {
            module: "submitTransaction".into(),
        }
        .into();
        assert!(matches!(err, EngineError::TransportFailure(_)));

        let err: EngineError = ClientError::rejected("submitTransaction", 99, "bad nonce").into();
        assert!(matches!(err, EngineError::NodeRejected { code: 99, .. }));
    }
}
