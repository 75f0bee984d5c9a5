//! Native execution of the confidential-asset contract.
//!
//! State lives in the contract account's metadata: one `{"tokens": [...]}`
//! entry per owner address, plus the issuance attributes and the token id
//! counter.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shroud_privacy::{verify_range_proof, verify_tally};
use shroud_transaction::contract::{
    GLOBAL_ATTRIBUTE_KEY, MAX_ID_KEY, RANGEPROOF_RESULT_KEY, TALLY_RESULT_KEY,
};
use shroud_transaction::{
    ContractCall, IssueParams, RangeproofVerifyParams, StoredToken, TallyVerifyParams, TokenSet,
    TransferParams,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("Already issued")]
    AlreadyIssued,
    #[error("Failed to check args")]
    InvalidArgs,
    #[error("Invalid token format")]
    InvalidToken,
    #[error("Failed to get source account {0} from metadata")]
    UnknownSource(String),
    #[error("No such token: {0}")]
    NoSuchToken(String),
    #[error("Failed to verify range proof")]
    RangeProof,
    #[error("Excess message does not bind the transfer")]
    Unbound,
    #[error("Failed to verify excess")]
    Tally,
    #[error("Corrupt contract state under {0}")]
    CorruptState(String),
    #[error("Invalid contract input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct GlobalAttribute {
    name: String,
    symbol: String,
    version: String,
}

/// The contract's view of one execution: its storage and the calling context.
pub struct ContractContext<'a> {
    pub storage: &'a mut BTreeMap<String, String>,
    pub sender: &'a str,
    pub tx_hash: &'a str,
}

impl ContractContext<'_> {
    pub fn execute(&mut self, input: &str) -> Result<(), ContractError> {
        let call = ContractCall::from_input(input).map_err(|e| ContractError::InvalidInput(e.to_string()))?;
        debug!("contract call {} from {}", call.method(), self.sender);
        match call {
            ContractCall::Issue(params) => self.issue(params),
            ContractCall::Transfer(params) => self.transfer(params),
            ContractCall::TallyVerify(params) => self.tally_verify(params),
            ContractCall::RangeproofVerify(params) => self.rangeproof_verify(params),
        }
    }

    fn load_tokens(&self, owner: &str) -> Result<Option<TokenSet>, ContractError> {
        self.storage
            .get(owner)
            .map(|json| serde_json::from_str(json).map_err(|_| ContractError::CorruptState(owner.to_string())))
            .transpose()
    }

    fn store_tokens(&mut self, owner: &str, set: &TokenSet) -> Result<(), ContractError> {
        let json = serde_json::to_string(set).map_err(|_| ContractError::CorruptState(owner.to_string()))?;
        self.storage.insert(owner.to_string(), json);
        Ok(())
    }

    fn next_id(&mut self) -> Result<String, ContractError> {
        let current: u64 = match self.storage.get(MAX_ID_KEY) {
            Some(v) => v
                .parse()
                .map_err(|_| ContractError::CorruptState(MAX_ID_KEY.to_string()))?,
            None => 0,
        };
        let next = (current + 1).to_string();
        self.storage.insert(MAX_ID_KEY.to_string(), next.clone());
        Ok(next)
    }

    fn issue(&mut self, params: IssueParams) -> Result<(), ContractError> {
        if self.storage.contains_key(GLOBAL_ATTRIBUTE_KEY) {
            return Err(ContractError::AlreadyIssued);
        }
        let token = &params.token;
        if params.name.is_empty()
            || params.symbol.is_empty()
            || token.commit.is_empty()
            || token.range_proof.is_empty()
            || token.from_pubkey.is_empty()
        {
            return Err(ContractError::InvalidArgs);
        }
        if !verify_range_proof(&token.commit, &token.range_proof) {
            return Err(ContractError::RangeProof);
        }

        let attribute = GlobalAttribute {
            name: params.name.clone(),
            symbol: params.symbol.clone(),
            version: "ETP10".into(),
        };
        let json = serde_json::to_string(&attribute)
            .map_err(|_| ContractError::CorruptState(GLOBAL_ATTRIBUTE_KEY.to_string()))?;
        self.storage.insert(GLOBAL_ATTRIBUTE_KEY.to_string(), json);

        let id = self.next_id()?;
        let mut set = self.load_tokens(self.sender)?.unwrap_or_default();
        set.tokens.push(StoredToken {
            id,
            hash: self.tx_hash.to_string(),
            commit: token.commit.clone(),
            from_pubkey: token.from_pubkey.clone(),
            encrypt_value: token.encrypt_value.clone(),
        });
        let sender = self.sender;
        self.store_tokens(sender, &set)?;

        info!("issued {} ({}) to {}", params.name, params.symbol, sender);
        Ok(())
    }

    fn transfer(&mut self, params: TransferParams) -> Result<(), ContractError> {
        if params.inputs.is_empty()
            || params.outputs.is_empty()
            || params.excess_sig.is_empty()
            || params.excess_msg.is_empty()
        {
            return Err(ContractError::InvalidArgs);
        }

        let sender = self.sender;
        let mut source = self
            .load_tokens(sender)?
            .ok_or_else(|| ContractError::UnknownSource(sender.to_string()))?;

        let mut input_commits = Vec::with_capacity(params.inputs.len());
        for input in &params.inputs {
            let spent = source
                .take(&input.id)
                .ok_or_else(|| ContractError::NoSuchToken(input.id.clone()))?;
            input_commits.push(spent.commit);
        }

        let mut output_commits = Vec::with_capacity(params.outputs.len());
        for output in &params.outputs {
            if !output.is_well_formed() {
                return Err(ContractError::InvalidToken);
            }
            if !verify_range_proof(&output.commit, &output.range_proof) {
                return Err(ContractError::RangeProof);
            }
            output_commits.push(output.commit.clone());
        }

        if !params.is_bound() {
            return Err(ContractError::Unbound);
        }
        if !verify_tally(&params.excess_sig, &params.excess_msg, &input_commits, &output_commits) {
            return Err(ContractError::Tally);
        }

        // Outputs to other owners, grouped so each owner is written once.
        let mut credited: BTreeMap<String, TokenSet> = BTreeMap::new();
        for output in params.outputs {
            let stored = StoredToken {
                id: self.next_id()?,
                hash: self.tx_hash.to_string(),
                commit: output.commit,
                from_pubkey: output.from_pubkey,
                encrypt_value: output.encrypt_value,
            };
            if output.to == sender {
                source.tokens.push(stored);
            } else {
                let mut set = match credited.remove(&output.to) {
                    Some(set) => set,
                    None => self.load_tokens(&output.to)?.unwrap_or_default(),
                };
                set.tokens.push(stored);
                credited.insert(output.to, set);
            }
        }

        for (owner, set) in &credited {
            self.store_tokens(owner, set)?;
        }
        self.store_tokens(sender, &source)?;
        Ok(())
    }

    fn tally_verify(&mut self, params: TallyVerifyParams) -> Result<(), ContractError> {
        let ok = verify_tally(&params.excess_sig, &params.excess_msg, &params.inputs, &params.outputs);
        self.storage.insert(TALLY_RESULT_KEY.to_string(), ok.to_string());
        if ok { Ok(()) } else { Err(ContractError::Tally) }
    }

    fn rangeproof_verify(&mut self, params: RangeproofVerifyParams) -> Result<(), ContractError> {
        let ok = verify_range_proof(&params.commit, &params.proof);
        self.storage.insert(RANGEPROOF_RESULT_KEY.to_string(), ok.to_string());
        if ok { Ok(()) } else { Err(ContractError::RangeProof) }
    }
}
