//! Confidential-asset contract calls.
//!
//! A call travels as the `input` string of a `pay_coin` operation addressed
//! to the contract account:
//!
//! ```text
//! {"method": "issue" | "transfer" | "tallyVerify" | "rangeproofVerify", "params": {...}}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::TransactionError;
use crate::token::{ConfidentialToken, TokenRef};

const KERNEL_MESSAGE_CONTEXT: &str = "shroud kernel message v1";

/// Metadata key under which the contract records its issuance attributes.
pub const GLOBAL_ATTRIBUTE_KEY: &str = "global_attribute";
/// Metadata key of the contract's token id counter.
pub const MAX_ID_KEY: &str = "max_id";
/// Metadata key holding the last `tallyVerify` result.
pub const TALLY_RESULT_KEY: &str = "pedersenTallyVerify";
/// Metadata key holding the last `rangeproofVerify` result.
pub const RANGEPROOF_RESULT_KEY: &str = "bpRangeproofVerify";

/// Source handed to `create_account` when deploying the contract.
pub const CONFIDENTIAL_CONTRACT_PAYLOAD: &str = "shroud:confidential-asset:v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum ContractCall {
    Issue(IssueParams),
    Transfer(TransferParams),
    TallyVerify(TallyVerifyParams),
    RangeproofVerify(RangeproofVerifyParams),
}

impl ContractCall {
    /// Encode as the `input` string of a `pay_coin` operation.
    pub fn to_input(&self) -> Result<String, TransactionError> {
        serde_json::to_string(self).map_err(TransactionError::Encode)
    }

    pub fn from_input(input: &str) -> Result<Self, TransactionError> {
        serde_json::from_str(input).map_err(TransactionError::Decode)
    }

    pub fn method(&self) -> &'static str {
        match self {
            ContractCall::Issue(_) => "issue",
            ContractCall::Transfer(_) => "transfer",
            ContractCall::TallyVerify(_) => "tallyVerify",
            ContractCall::RangeproofVerify(_) => "rangeproofVerify",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueParams {
    pub name: String,
    pub symbol: String,
    pub token: ConfidentialToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub excess_sig: String,
    pub excess_msg: String,
    pub inputs: Vec<TokenRef>,
    pub outputs: Vec<ConfidentialToken>,
}

impl TransferParams {
    /// Whether `excess_msg` is the kernel message of these inputs and outputs.
    pub fn is_bound(&self) -> bool {
        self.excess_msg == kernel_message(&self.inputs, &self.outputs)
    }
}

/// Fixture form of a tally check: commitments instead of token ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyVerifyParams {
    pub excess_sig: String,
    pub excess_msg: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeproofVerifyParams {
    pub commit: String,
    pub proof: String,
}

/// The message a kernel signature commits to.
///
/// Binds input ids and every output field except the range proof, so an
/// output altered after signing no longer matches its kernel.
pub fn kernel_message(inputs: &[TokenRef], outputs: &[ConfidentialToken]) -> String {
    fn field(hasher: &mut blake3::Hasher, s: &str) {
        hasher.update(&(s.len() as u64).to_le_bytes());
        hasher.update(s.as_bytes());
    }

    let mut hasher = blake3::Hasher::new_derive_key(KERNEL_MESSAGE_CONTEXT);
    hasher.update(&(inputs.len() as u64).to_le_bytes());
    for input in inputs {
        field(&mut hasher, &input.id);
    }
    hasher.update(&(outputs.len() as u64).to_le_bytes());
    for output in outputs {
        field(&mut hasher, &output.commit);
        field(&mut hasher, &output.encrypt_value);
        field(&mut hasher, &output.from_pubkey);
        field(&mut hasher, &output.to);
    }
    hex::encode(hasher.finalize().as_bytes())
}
