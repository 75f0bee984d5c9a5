//! Tally and range-proof checks over transfers.
//!
//! Pure functions over already-built data, usable before submission and
//! for auditing a transfer that is already on the ledger.

use std::collections::HashSet;

use shroud_transaction::{ConfidentialToken, TokenRef, TokenSet, kernel_message};

use crate::error::{EngineError, Result};

pub use shroud_privacy::{verify_range_proof, verify_tally};

/// Structural rules every candidate transfer must satisfy.
///
/// At least one input, no input referenced twice, one payment output plus
/// at most one change output, and every output fully populated.
pub fn check_shape(inputs: &[TokenRef], outputs: &[ConfidentialToken]) -> Result<()> {
    if inputs.is_empty() {
        return Err(EngineError::InvalidCandidate("no inputs".into()));
    }
    let mut seen = HashSet::with_capacity(inputs.len());
    for input in inputs {
        if !seen.insert(input.id.as_str()) {
            return Err(EngineError::InvalidCandidate(format!(
                "input {} referenced twice",
                input.id
            )));
        }
    }
    if outputs.is_empty() || outputs.len() > 2 {
        return Err(EngineError::InvalidCandidate(format!(
            "expected 1 or 2 outputs, got {}",
            outputs.len()
        )));
    }
    if let Some(index) = outputs.iter().position(|o| !o.is_well_formed()) {
        return Err(EngineError::InvalidCandidate(format!(
            "output {index} is missing fields"
        )));
    }
    Ok(())
}

/// Map input ids to the commitments held by their owner.
pub fn input_commitments(inputs: &[TokenRef], owned: &TokenSet) -> Result<Vec<String>> {
    inputs
        .iter()
        .map(|input| {
            owned
                .find(&input.id)
                .map(|token| token.commit.clone())
                .ok_or_else(|| {
                    EngineError::InvalidCandidate(format!("input {} is not held by the sender", input.id))
                })
        })
        .collect()
}

/// Full local audit of a transfer against resolved input commitments.
///
/// Checks, in order: the kernel message binds inputs and outputs, the
/// kernel signature proves the commitments balance, and every output
/// carries a valid range proof.
pub fn audit_transfer(
    sender: &str,
    excess_sig: &str,
    excess_msg: &str,
    inputs: &[TokenRef],
    input_commits: &[String],
    outputs: &[ConfidentialToken],
) -> Result<()> {
    if excess_msg != kernel_message(inputs, outputs) {
        return Err(EngineError::InvalidCandidate(
            "excess message does not bind inputs and outputs".into(),
        ));
    }

    let output_commits: Vec<String> = outputs.iter().map(|o| o.commit.clone()).collect();
    if !verify_tally(excess_sig, excess_msg, input_commits, &output_commits) {
        return Err(EngineError::TallyMismatch(sender.to_string()));
    }

    for (index, output) in outputs.iter().enumerate() {
        if !verify_range_proof(&output.commit, &output.range_proof) {
            return Err(EngineError::RangeProofRejected { index });
        }
    }
    Ok(())
}
