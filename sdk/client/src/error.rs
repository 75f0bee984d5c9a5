use thiserror::Error;

use shroud_transaction::codes;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport failure calling {module}: {message}")]
    Transport { module: String, message: String },

    #[error("{module} timed out")]
    Timeout { module: String },

    #[error("{module} rejected with error_code {code}: {desc}")]
    NodeRejected {
        module: String,
        code: i32,
        desc: String,
    },

    #[error("failed to decode {module} response: {message}")]
    Decode { module: String, message: String },
}

impl ClientError {
    pub fn rejected(module: &str, code: i32, desc: impl Into<String>) -> Self {
        ClientError::NodeRejected {
            module: module.to_string(),
            code,
            desc: desc.into(),
        }
    }

    pub fn transport(module: &str, message: impl Into<String>) -> Self {
        ClientError::Transport {
            module: module.to_string(),
            message: message.into(),
        }
    }

    /// The node answered that the queried object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NodeRejected { code, .. } if *code == codes::NOT_EXIST)
    }

    /// No answer was obtained from the node at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. } | ClientError::Timeout { .. })
    }
}
