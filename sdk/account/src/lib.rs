//! Account records shared by the engine, the ledger client and the devnet.
//!
//! A participant is a ledger account (which signs and pays for
//! transactions) paired with a confidential keypair (which owns tokens held
//! by the confidential-asset contract). The pairing is explicit, keyed by
//! [`Role`], never by position in a list.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A ledger account as returned by `createAccount`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_aes: String,
}

impl Account {
    pub fn new(address: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            private_key: private_key.into(),
            private_key_aes: String::new(),
        }
    }
}

// Keys never reach the logs.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Keypair under which confidential token values are encrypted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidentialKeyPair {
    pub priv_key: String,
    pub pub_key: String,
}

impl fmt::Debug for ConfidentialKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfidentialKeyPair")
            .field("priv_key", &"<redacted>")
            .field("pub_key", &self.pub_key)
            .finish()
    }
}

/// Logical name of a participant in a scenario ("issuer", "alice", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A ledger account bound to the confidential keypair that spends its tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub role: Role,
    pub account: Account,
    pub keys: ConfidentialKeyPair,
}

impl Participant {
    pub fn address(&self) -> &str {
        &self.account.address
    }

    /// The spend key handed to the construction service.
    pub fn spend_key(&self) -> &str {
        &self.keys.priv_key
    }

    pub fn pub_key(&self) -> &str {
        &self.keys.pub_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_keys() {
        let account = Account::new("sh1abc", "privsecret");
        let keys = ConfidentialKeyPair {
            priv_key: "deadbeef".into(),
            pub_key: "cafebabe".into(),
        };

        let rendered = format!("{account:?} {keys:?}");
        assert!(rendered.contains("sh1abc"));
        assert!(rendered.contains("cafebabe"));
        assert!(!rendered.contains("privsecret"));
        assert!(!rendered.contains("deadbeef"));
    }

    #[test]
    fn test_account_parses_node_response() {
        let json = r#"{"address":"sh1abc","private_key":"privx","private_key_aes":"aes"}"#;
        let account: Account = serde_json::from_str(json).unwrap();
        assert_eq!(account.address, "sh1abc");
        assert_eq!(account.private_key_aes, "aes");
    }

    #[test]
    fn test_role_is_transparent() {
        let role = Role::from("alice");
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"alice\"");
        assert_eq!(role.to_string(), "alice");
    }
}
