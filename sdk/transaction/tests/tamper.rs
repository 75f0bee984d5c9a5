use shroud_privacy::{
    BlindingFactor, encrypt_value, generate_keypair, prove_range, sign_kernel, verify_range_proof,
    verify_tally,
};
use shroud_transaction::{ConfidentialToken, TokenRef, TransferParams, kernel_message};

fn output(value: u64, blinding: &BlindingFactor, owner_pub: &str, to: &str) -> ConfidentialToken {
    let (commit, proof) = prove_range(value, blinding).unwrap();
    let enc = encrypt_value(value, blinding, owner_pub).unwrap();
    ConfidentialToken {
        commit: commit.to_hex(),
        range_proof: hex::encode(proof),
        from_pubkey: enc.from_pubkey,
        encrypt_value: enc.encrypt_value,
        to: to.into(),
    }
}

/// A 1-in / 2-out transfer plus the input commitment it spends.
fn signed_transfer() -> (TransferParams, Vec<String>) {
    let sender = generate_keypair();
    let recipient = generate_keypair();

    let r_in = BlindingFactor::random();
    let (input_commit, _) = prove_range(100, &r_in).unwrap();

    let r_pay = BlindingFactor::random();
    let r_change = BlindingFactor::random();
    let outputs = vec![
        output(60, &r_pay, &recipient.pub_key, "sh1bob"),
        output(40, &r_change, &sender.pub_key, "sh1alice"),
    ];
    let inputs = vec![TokenRef::new("1")];

    let excess_msg = kernel_message(&inputs, &outputs);
    let excess_sig = sign_kernel(&BlindingFactor::excess(&[r_in], &[r_pay, r_change]), &excess_msg);

    let params = TransferParams {
        excess_sig,
        excess_msg,
        inputs,
        outputs,
    };
    (params, vec![input_commit.to_hex()])
}

fn output_commits(params: &TransferParams) -> Vec<String> {
    params.outputs.iter().map(|o| o.commit.clone()).collect()
}

#[test]
fn untouched_transfer_verifies() {
    let (params, inputs) = signed_transfer();

    assert!(params.is_bound());
    assert!(verify_tally(
        &params.excess_sig,
        &params.excess_msg,
        &inputs,
        &output_commits(&params)
    ));
    for o in &params.outputs {
        assert!(verify_range_proof(&o.commit, &o.range_proof));
    }
}

#[test]
fn tampered_encrypt_value_breaks_binding() {
    let (mut params, _) = signed_transfer();

    let mut bytes = hex::decode(&params.outputs[0].encrypt_value).unwrap();
    bytes[20] ^= 0x01;
    params.outputs[0].encrypt_value = hex::encode(bytes);

    assert!(!params.is_bound());
}

#[test]
fn recomputed_message_breaks_signature() {
    let (mut params, inputs) = signed_transfer();

    params.outputs[0].to = "sh1eve".into();
    params.excess_msg = kernel_message(&params.inputs, &params.outputs);

    assert!(params.is_bound());
    assert!(!verify_tally(
        &params.excess_sig,
        &params.excess_msg,
        &inputs,
        &output_commits(&params)
    ));
}

#[test]
fn swapped_range_proof_fails() {
    let (mut params, _) = signed_transfer();

    let proof = params.outputs[1].range_proof.clone();
    params.outputs[0].range_proof = proof;

    assert!(!verify_range_proof(
        &params.outputs[0].commit,
        &params.outputs[0].range_proof
    ));
}
