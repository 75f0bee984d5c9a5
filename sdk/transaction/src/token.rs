use serde::{Deserialize, Serialize};

/// An output token as produced by the construction service.
///
/// `to` is empty for an issuance token and carries the owner's address for
/// transfer outputs (the sender's own address for change).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidentialToken {
    pub commit: String,
    pub range_proof: String,
    pub from_pubkey: String,
    pub encrypt_value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub to: String,
}

impl ConfidentialToken {
    /// Every field the contract requires of a transfer output is non-empty.
    pub fn is_well_formed(&self) -> bool {
        !self.commit.is_empty()
            && !self.range_proof.is_empty()
            && !self.from_pubkey.is_empty()
            && !self.encrypt_value.is_empty()
            && !self.to.is_empty()
    }
}

/// A token as stored by the contract once it is on-ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub id: String,
    #[serde(default)]
    pub hash: String,
    pub commit: String,
    pub from_pubkey: String,
    pub encrypt_value: String,
}

/// Reference to an unspent token by its contract-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRef {
    pub id: String,
}

impl TokenRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Value stored by the contract under each owner's address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(default)]
    pub tokens: Vec<StoredToken>,
}

impl TokenSet {
    pub fn find(&self, id: &str) -> Option<&StoredToken> {
        self.tokens.iter().find(|t| t.id == id)
    }

    /// Remove and return the token with `id`.
    pub fn take(&mut self, id: &str) -> Option<StoredToken> {
        let pos = self.tokens.iter().position(|t| t.id == id)?;
        Some(self.tokens.remove(pos))
    }
}
