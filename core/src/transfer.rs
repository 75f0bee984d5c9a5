//! Construction of candidate transfers.
//!
//! ```text
//!  sender ──▶ createConfidentialTx ──▶ { inputs, outputs, kernel, verify_tally }
//!                                               │
//!                      shape check ◀────────────┘
//!                      tally_ok == false ──▶ TallyMismatch
//!                      local audit (optional): binding, tally, range proofs
//!                                               │
//!                                               ▼
//!                                       CandidateTransfer
//! ```
//!
//! The builder never sees amounts beyond the requested value or any
//! blinding factor; those stay inside the construction service.

use log::{debug, info};

use shroud_account::Participant;
use shroud_client::{CreateTxRequest, LedgerClient};
use shroud_transaction::{ConfidentialToken, ContractCall, TokenRef, TokenSet, TransferParams};

use crate::error::{EngineError, Result};
use crate::verify;

/// A balanced transfer ready for submission.
///
/// Consumed by [`CandidateTransfer::into_call`]; a transfer whose
/// submission failed is rebuilt, never resubmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTransfer {
    pub inputs: Vec<TokenRef>,
    /// Commitments of `inputs`, in the same order.
    pub input_commits: Vec<String>,
    pub outputs: Vec<ConfidentialToken>,
    pub excess_sig: String,
    pub excess_msg: String,
    pub tally_ok: bool,
}

impl CandidateTransfer {
    pub fn output_commits(&self) -> Vec<String> {
        self.outputs.iter().map(|o| o.commit.clone()).collect()
    }

    pub fn params(&self) -> TransferParams {
        TransferParams {
            excess_sig: self.excess_sig.clone(),
            excess_msg: self.excess_msg.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }
    }

    pub fn into_call(self) -> ContractCall {
        ContractCall::Transfer(TransferParams {
            excess_sig: self.excess_sig,
            excess_msg: self.excess_msg,
            inputs: self.inputs,
            outputs: self.outputs,
        })
    }
}

pub struct ConfidentialTransferBuilder<'a, C> {
    client: &'a C,
    local_checks: bool,
}

impl<'a, C: LedgerClient> ConfidentialTransferBuilder<'a, C> {
    pub fn new(client: &'a C, local_checks: bool) -> Self {
        Self {
            client,
            local_checks,
        }
    }

    /// Build a transfer of `value` from `sender` to `recipient`.
    pub async fn build(
        &self,
        contract: &str,
        sender: &Participant,
        recipient: &Participant,
        value: u64,
    ) -> Result<CandidateTransfer> {
        if value == 0 {
            return Err(EngineError::InvalidCandidate("transfer value must be positive".into()));
        }

        let request = CreateTxRequest {
            spend_key: sender.spend_key().to_string(),
            from: sender.address().to_string(),
            to: recipient.address().to_string(),
            to_pub: recipient.pub_key().to_string(),
            value,
            contract_addr: contract.to_string(),
        };
        let result = self.client.create_confidential_tx(&request).await?;
        let params = result.params;

        verify::check_shape(&params.inputs, &params.outputs)?;
        if !params.outputs.iter().any(|o| o.to == recipient.address()) {
            return Err(EngineError::InvalidCandidate(format!(
                "no output pays {}",
                recipient.address()
            )));
        }
        if !result.verify_tally {
            return Err(EngineError::TallyMismatch(sender.address().to_string()));
        }

        let owned = self.owned_tokens(contract, sender.address()).await?;
        let input_commits = verify::input_commitments(&params.inputs, &owned)?;

        if self.local_checks {
            verify::audit_transfer(
                sender.address(),
                &params.excess_sig,
                &params.excess_msg,
                &params.inputs,
                &input_commits,
                &params.outputs,
            )?;
            debug!("local audit passed for transfer from {}", sender.address());
        }

        info!(
            "built transfer {} -> {}: {} inputs, {} outputs",
            sender.role,
            recipient.role,
            params.inputs.len(),
            params.outputs.len()
        );
        Ok(CandidateTransfer {
            inputs: params.inputs,
            input_commits,
            outputs: params.outputs,
            excess_sig: params.excess_sig,
            excess_msg: params.excess_msg,
            tally_ok: result.verify_tally,
        })
    }

    async fn owned_tokens(&self, contract: &str, owner: &str) -> Result<TokenSet> {
        match self.client.get_account_metadata(contract, owner).await? {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| EngineError::Encoding(format!("token set of {owner}: {e}"))),
            None => Ok(TokenSet::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_account::{Account, ConfidentialKeyPair, Role};
    use shroud_devnet::{DevnetLedger, FaultPlan};
    use shroud_transaction::codes;

    fn participant(role: &str) -> Participant {
        Participant {
            role: Role::from(role),
            account: Account::new(format!("sh1{role}"), format!("priv{role}")),
            keys: ConfidentialKeyPair {
                priv_key: format!("{role}-priv"),
                pub_key: format!("{role}-pub"),
            },
        }
    }

    fn ledger() -> DevnetLedger {
        DevnetLedger::new(&Account::new("sh1genesis", "privgenesis"), 1_000)
    }

    #[tokio::test]
    async fn test_zero_value_is_rejected_before_any_call() {
        let ledger = ledger().with_faults(FaultPlan {
            unreachable: true,
            ..FaultPlan::default()
        });
        let builder = ConfidentialTransferBuilder::new(&ledger, true);

        let err = builder
            .build("sh1contract", &participant("alice"), &participant("bob"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidCandidate(_)));
    }

    #[tokio::test]
    async fn test_missing_contract_is_node_rejection() {
        let ledger = ledger();
        let builder = ConfidentialTransferBuilder::new(&ledger, true);

        let err = builder
            .build("sh1nowhere", &participant("alice"), &participant("bob"), 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::NodeRejected { code: codes::NOT_EXIST, .. }
        ));
        assert_eq!(ledger.submit_calls(), 0);
    }

    #[test]
    fn test_into_call_keeps_every_field() {
        let candidate = CandidateTransfer {
            inputs: vec![TokenRef::new("t1".to_string())],
            input_commits: vec!["c1".into()],
            outputs: Vec::new(),
            excess_sig: "sig".into(),
            excess_msg: "msg".into(),
            tally_ok: true,
        };
        let params = candidate.params();

        match candidate.into_call() {
            ContractCall::Transfer(call) => assert_eq!(call, params),
            other => panic!("unexpected call {other:?}"),
        }
    }
}
