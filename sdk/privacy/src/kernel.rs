//! Kernel Excess Signatures
//!
//! ```text
//! E = Σ C_out - Σ C_in = (Σ v_out - Σ v_in)·B + x·H     x = Σ r_out - Σ r_in
//!
//! sign:   k random, R = k·H, e = H(R || E || msg), s = k + e·x
//! verify: s·H == R + e·E
//! ```
//!
//! A valid signature under `H` alone proves the `B` component of `E` is
//! zero, i.e. the committed values balance.

use bulletproofs::PedersenGens;
use curve25519_dalek_ng::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
    traits::Identity,
};

use crate::commitment::{BlindingFactor, Commitment};
use crate::error::{PrivacyError, Result, decode_hex};

const CHALLENGE_CONTEXT: &str = "shroud kernel challenge v1";

/// Encoded length of an excess signature: `R (32) || s (32)`.
pub const EXCESS_SIG_LEN: usize = 64;

fn blinding_base() -> RistrettoPoint {
    PedersenGens::default().B_blinding
}

fn challenge(r: &CompressedRistretto, excess: &CompressedRistretto, msg: &[u8]) -> Scalar {
    let mut hasher = blake3::Hasher::new_derive_key(CHALLENGE_CONTEXT);
    hasher.update(r.as_bytes());
    hasher.update(excess.as_bytes());
    hasher.update(msg);

    let mut wide = [0u8; 64];
    hasher.finalize_xof().fill(&mut wide);
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Sign `excess_msg` with the excess blinding `x`, returning hex `R || s`.
pub fn sign_kernel(excess: &BlindingFactor, excess_msg: &str) -> String {
    let h = blinding_base();
    let x = excess.as_scalar();

    let k = Scalar::random(&mut rand::thread_rng());
    let r = (k * h).compress();
    let e_point = (x * h).compress();
    let e = challenge(&r, &e_point, excess_msg.as_bytes());
    let s = k + e * x;

    let mut sig = [0u8; EXCESS_SIG_LEN];
    sig[..32].copy_from_slice(r.as_bytes());
    sig[32..].copy_from_slice(s.as_bytes());
    hex::encode(sig)
}

/// `Σ C_out - Σ C_in` over decoded commitments.
pub fn excess_point(input_commits: &[Commitment], output_commits: &[Commitment]) -> Result<RistrettoPoint> {
    let mut acc = RistrettoPoint::identity();
    for c in output_commits {
        acc += c.point()?;
    }
    for c in input_commits {
        acc -= c.point()?;
    }
    Ok(acc)
}

fn parse_signature(excess_sig: &str) -> Result<(CompressedRistretto, Scalar)> {
    let bytes = decode_hex("excess signature", excess_sig)?;
    if bytes.len() != EXCESS_SIG_LEN {
        return Err(PrivacyError::Length {
            field: "excess signature",
            expected: EXCESS_SIG_LEN,
            actual: bytes.len(),
        });
    }

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);

    let s = Scalar::from_canonical_bytes(s).ok_or(PrivacyError::InvalidScalar("excess signature"))?;
    Ok((CompressedRistretto(r), s))
}

fn try_verify_tally(
    excess_sig: &str,
    excess_msg: &str,
    input_commits: &[String],
    output_commits: &[String],
) -> Result<bool> {
    let (r, s) = parse_signature(excess_sig)?;
    let r_point = r.decompress().ok_or(PrivacyError::InvalidPoint("excess nonce"))?;

    let inputs = input_commits
        .iter()
        .map(|c| Commitment::from_hex(c))
        .collect::<Result<Vec<_>>>()?;
    let outputs = output_commits
        .iter()
        .map(|c| Commitment::from_hex(c))
        .collect::<Result<Vec<_>>>()?;

    let excess = excess_point(&inputs, &outputs)?;
    let e = challenge(&r, &excess.compress(), excess_msg.as_bytes());

    Ok(s * blinding_base() == r_point + e * excess)
}

/// Check that the commitments balance under the kernel signature.
///
/// Pure function; malformed input verifies as `false`.
pub fn verify_tally(
    excess_sig: &str,
    excess_msg: &str,
    input_commits: &[String],
    output_commits: &[String],
) -> bool {
    if output_commits.is_empty() {
        return false;
    }
    try_verify_tally(excess_sig, excess_msg, input_commits, output_commits).unwrap_or(false)
}
