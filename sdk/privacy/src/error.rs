use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrivacyError {
    #[error("invalid hex in {field}: {source}")]
    Hex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },

    #[error("invalid length for {field}: expected {expected} bytes, got {actual}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{0} is not a valid ristretto point")]
    InvalidPoint(&'static str),

    #[error("{0} is not a canonical scalar")]
    InvalidScalar(&'static str),

    #[error("range proof generation failed: {0}")]
    RangeProof(String),

    #[error("value encryption failed")]
    Encryption,

    #[error("value decryption failed")]
    Decryption,
}

pub type Result<T> = std::result::Result<T, PrivacyError>;

/// Decode a hex field into a fixed 32-byte array.
pub(crate) fn decode_32(field: &'static str, s: &str) -> Result<[u8; 32]> {
    let bytes = decode_hex(field, s)?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| PrivacyError::Length {
        field,
        expected: 32,
        actual: bytes.len(),
    })
}

pub(crate) fn decode_hex(field: &'static str, s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|source| PrivacyError::Hex { field, source })
}
