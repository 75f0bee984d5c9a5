use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("unknown operation type {0}")]
    UnknownOperation(u8),

    #[error("operation type {0} is missing its body")]
    MissingBody(u8),

    #[error("failed to encode contract call: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode contract call: {0}")]
    Decode(#[source] serde_json::Error),
}
