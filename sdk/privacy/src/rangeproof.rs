//! Range Proofs
//!
//! 64-bit single-value Bulletproofs over the Pedersen generators used by
//! [`Commitment`]. A valid proof shows the committed value lies in
//! `[0, 2^64)` without revealing it.

use std::sync::LazyLock;

use bulletproofs::{BulletproofGens, PedersenGens, RangeProof};
use merlin::Transcript;

use crate::commitment::{BlindingFactor, Commitment};
use crate::error::{PrivacyError, Result, decode_hex};

/// Bit width every proof is generated and checked at.
pub const RANGE_BITS: usize = 64;

const TRANSCRIPT_LABEL: &[u8] = b"shroud-rangeproof-v1";

static BP_GENS: LazyLock<BulletproofGens> = LazyLock::new(|| BulletproofGens::new(RANGE_BITS, 1));

/// Prove `value` is in range, returning the commitment and the serialized proof.
pub fn prove_range(value: u64, blinding: &BlindingFactor) -> Result<(Commitment, Vec<u8>)> {
    let pc_gens = PedersenGens::default();
    let mut transcript = Transcript::new(TRANSCRIPT_LABEL);

    let (proof, commit) = RangeProof::prove_single(
        &BP_GENS,
        &pc_gens,
        &mut transcript,
        value,
        blinding.as_scalar(),
        RANGE_BITS,
    )
    .map_err(|e| PrivacyError::RangeProof(format!("{e:?}")))?;

    Ok((Commitment(commit.to_bytes()), proof.to_bytes()))
}

/// Check a hex-encoded proof against a hex-encoded commitment.
///
/// Malformed input of any kind verifies as `false`.
pub fn verify_range_proof(commit_hex: &str, proof_hex: &str) -> bool {
    let Ok(commit) = Commitment::from_hex(commit_hex) else {
        return false;
    };
    let Ok(bytes) = decode_hex("range proof", proof_hex) else {
        return false;
    };
    let Ok(proof) = RangeProof::from_bytes(&bytes) else {
        return false;
    };

    let pc_gens = PedersenGens::default();
    let mut transcript = Transcript::new(TRANSCRIPT_LABEL);
    proof
        .verify_single(
            &BP_GENS,
            &pc_gens,
            &mut transcript,
            &commit.compressed(),
            RANGE_BITS,
        )
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prove_and_verify() {
        let blinding = BlindingFactor::random();
        let (commit, proof) = prove_range(100_000_000, &blinding).unwrap();

        assert_eq!(commit, Commitment::commit(100_000_000, &blinding));
        assert!(verify_range_proof(&commit.to_hex(), &hex::encode(&proof)));
    }

    #[test]
    fn test_single_byte_mutation_fails() {
        let (commit, mut proof) = prove_range(42, &BlindingFactor::random()).unwrap();
        proof[40] ^= 0x01;
        assert!(!verify_range_proof(&commit.to_hex(), &hex::encode(&proof)));
    }

    #[test]
    fn test_proof_bound_to_its_commitment() {
        let (_, proof) = prove_range(42, &BlindingFactor::random()).unwrap();
        let other = Commitment::commit(42, &BlindingFactor::random());
        assert!(!verify_range_proof(&other.to_hex(), &hex::encode(&proof)));
    }

    #[test]
    fn test_garbage_input_is_false() {
        assert!(!verify_range_proof("", ""));
        assert!(!verify_range_proof("nothex", "nothex"));
        let (commit, _) = prove_range(1, &BlindingFactor::random()).unwrap();
        assert!(!verify_range_proof(&commit.to_hex(), "00"));
    }
}
