//! The node-side construction service behind `createConfidentialAsset` and
//! `createConfidentialTx`.
//!
//! This is where blinding factors exist; only commitments, proofs,
//! ciphertexts and the kernel signature leave it.

use log::{debug, warn};

use shroud_client::{ClientError, CreateAssetRequest, CreateTxRequest, CreateTxResult};
use shroud_privacy::{
    BlindingFactor, Opening, decrypt_value, encrypt_value, prove_range, public_key_of, sign_kernel,
    verify_tally,
};
use shroud_transaction::{
    ConfidentialToken, StoredToken, TokenRef, TokenSet, TransferParams, codes, kernel_message,
};

const ASSET_MODULE: &str = "createConfidentialAsset";
const TX_MODULE: &str = "createConfidentialTx";

fn invalid(module: &str, desc: impl Into<String>) -> ClientError {
    ClientError::rejected(module, codes::INVALID_PARAMETER, desc)
}

fn make_token(
    module: &str,
    value: u64,
    committed_value: u64,
    blinding: &BlindingFactor,
    owner_pub: &str,
    to: &str,
) -> Result<ConfidentialToken, ClientError> {
    let (commit, proof) = prove_range(committed_value, blinding)
        .map_err(|e| ClientError::rejected(module, codes::RANGEPROOF_VERIFY, e.to_string()))?;
    let enc = encrypt_value(value, blinding, owner_pub).map_err(|e| invalid(module, e.to_string()))?;
    Ok(ConfidentialToken {
        commit: commit.to_hex(),
        range_proof: hex::encode(proof),
        from_pubkey: enc.from_pubkey,
        encrypt_value: enc.encrypt_value,
        to: to.to_string(),
    })
}

pub fn create_asset(request: &CreateAssetRequest) -> Result<ConfidentialToken, ClientError> {
    public_key_of(&request.priv_key).map_err(|e| invalid(ASSET_MODULE, format!("spend key: {e}")))?;
    let blinding = BlindingFactor::random();
    make_token(
        ASSET_MODULE,
        request.value,
        request.value,
        &blinding,
        &request.to_pub,
        &request.to,
    )
}

/// Pick inputs covering `target`: the smallest single token that suffices,
/// otherwise the largest tokens first until covered.
///
/// `values` are token values by position; returns positions in spend order.
pub fn select_inputs(values: &[u64], target: u64) -> Option<Vec<usize>> {
    let single = values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v >= target)
        .min_by_key(|(_, v)| **v)
        .map(|(i, _)| i);
    if let Some(i) = single {
        return Some(vec![i]);
    }

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*b].cmp(&values[*a]));

    let mut picked = Vec::new();
    let mut total: u64 = 0;
    for i in order {
        picked.push(i);
        total = total.saturating_add(values[i]);
        if total >= target {
            return Some(picked);
        }
    }
    None
}

/// Build a balanced transfer from the tokens `spend_key` can open.
///
/// With `skew` set, the payment output commits to one unit more than it
/// encrypts, so the result cannot balance.
pub fn create_transfer(
    owned: &TokenSet,
    request: &CreateTxRequest,
    skew: bool,
) -> Result<CreateTxResult, ClientError> {
    if request.value == 0 {
        return Err(invalid(TX_MODULE, "value must be positive"));
    }
    let sender_pub =
        public_key_of(&request.spend_key).map_err(|e| invalid(TX_MODULE, format!("spend key: {e}")))?;

    let openable: Vec<(&StoredToken, Opening)> = owned
        .tokens
        .iter()
        .filter_map(|token| {
            match decrypt_value(&request.spend_key, &token.encrypt_value, &token.from_pubkey) {
                Ok(opening) => Some((token, opening)),
                Err(e) => {
                    warn!("token {} not openable by spend key: {e}", token.id);
                    None
                }
            }
        })
        .collect();

    let values: Vec<u64> = openable.iter().map(|(_, o)| o.value).collect();
    let picked = select_inputs(&values, request.value).ok_or_else(|| {
        invalid(
            TX_MODULE,
            format!("insufficient confidential balance for {}", request.value),
        )
    })?;

    let mut inputs = Vec::with_capacity(picked.len());
    let mut input_commits = Vec::with_capacity(picked.len());
    let mut input_blindings = Vec::with_capacity(picked.len());
    let mut total: u64 = 0;
    for i in picked {
        let (token, opening) = &openable[i];
        inputs.push(TokenRef::new(token.id.clone()));
        input_commits.push(token.commit.clone());
        input_blindings.push(opening.blinding);
        total = total.saturating_add(opening.value);
    }
    let change = total - request.value;

    let mut outputs = Vec::with_capacity(2);
    let mut output_blindings = Vec::with_capacity(2);

    let pay_blinding = BlindingFactor::random();
    let committed = if skew { request.value.saturating_add(1) } else { request.value };
    outputs.push(make_token(
        TX_MODULE,
        request.value,
        committed,
        &pay_blinding,
        &request.to_pub,
        &request.to,
    )?);
    output_blindings.push(pay_blinding);

    if change > 0 {
        let change_blinding = BlindingFactor::random();
        outputs.push(make_token(
            TX_MODULE,
            change,
            change,
            &change_blinding,
            &sender_pub,
            &request.from,
        )?);
        output_blindings.push(change_blinding);
    }

    let excess_msg = kernel_message(&inputs, &outputs);
    let excess_sig = sign_kernel(
        &BlindingFactor::excess(&input_blindings, &output_blindings),
        &excess_msg,
    );

    let output_commits: Vec<String> = outputs.iter().map(|o| o.commit.clone()).collect();
    let tally_ok = verify_tally(&excess_sig, &excess_msg, &input_commits, &output_commits);
    debug!(
        "built transfer {} -> {}: {} inputs, {} outputs, tally {}",
        request.from,
        request.to,
        inputs.len(),
        outputs.len(),
        tally_ok
    );

    Ok(CreateTxResult {
        verify_tally: tally_ok,
        params: TransferParams {
            excess_sig,
            excess_msg,
            inputs,
            outputs,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_smallest_sufficient_single() {
        assert_eq!(select_inputs(&[100, 60, 45], 50), Some(vec![1]));
        assert_eq!(select_inputs(&[50], 50), Some(vec![0]));
    }

    #[test]
    fn test_select_largest_first_when_no_single_suffices() {
        assert_eq!(select_inputs(&[20, 30], 40), Some(vec![1, 0]));
        assert_eq!(select_inputs(&[5, 30, 20, 10], 55), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_select_insufficient() {
        assert_eq!(select_inputs(&[10, 10], 21), None);
        assert_eq!(select_inputs(&[], 1), None);
    }
}
