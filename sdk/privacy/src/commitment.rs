//! Pedersen Commitments
//!
//! ```text
//! C = v·B + r·B_blinding
//! ```
//!
//! `B` and `B_blinding` are the Ristretto generators shared with the range
//! prover, so a commitment produced here is exactly the one a Bulletproof
//! for `(v, r)` attests to.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

use bulletproofs::PedersenGens;
use curve25519_dalek_ng::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};

use crate::error::{PrivacyError, Result, decode_32};

/// The blinding factor `r` of a commitment.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BlindingFactor(Scalar);

impl BlindingFactor {
    pub fn random() -> Self {
        Self(Scalar::random(&mut rand::thread_rng()))
    }

    pub fn zero() -> Self {
        Self(Scalar::zero())
    }

    /// Parse a canonical little-endian scalar.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self> {
        Scalar::from_canonical_bytes(bytes)
            .map(Self)
            .ok_or(PrivacyError::InvalidScalar("blinding factor"))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub(crate) fn as_scalar(&self) -> &Scalar {
        &self.0
    }

    /// Kernel excess blinding: `Σ r_out - Σ r_in`.
    pub fn excess(inputs: &[BlindingFactor], outputs: &[BlindingFactor]) -> Self {
        let total_out: BlindingFactor = outputs.iter().copied().sum();
        let total_in: BlindingFactor = inputs.iter().copied().sum();
        total_out - total_in
    }
}

impl Add for BlindingFactor {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for BlindingFactor {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sum for BlindingFactor {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, b| acc + b)
    }
}

impl fmt::Debug for BlindingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlindingFactor(<redacted>)")
    }
}

/// A compressed Pedersen commitment (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    /// Commit to `value` under `blinding`.
    pub fn commit(value: u64, blinding: &BlindingFactor) -> Self {
        let point = PedersenGens::default().commit(Scalar::from(value), blinding.0);
        Self(point.compress().to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        decode_32("commitment", s).map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub(crate) fn compressed(&self) -> CompressedRistretto {
        CompressedRistretto(self.0)
    }

    /// Decompress into a curve point; fails for bytes that are not a valid encoding.
    pub fn point(&self) -> Result<RistrettoPoint> {
        self.compressed()
            .decompress()
            .ok_or(PrivacyError::InvalidPoint("commitment"))
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_is_hiding() {
        let a = Commitment::commit(1000, &BlindingFactor::random());
        let b = Commitment::commit(1000, &BlindingFactor::random());
        assert_ne!(a, b, "different blinding must give different commitments");
    }

    #[test]
    fn test_commitments_are_additive() {
        let r1 = BlindingFactor::random();
        let r2 = BlindingFactor::random();

        let c1 = Commitment::commit(30, &r1).point().unwrap();
        let c2 = Commitment::commit(20, &r2).point().unwrap();
        let c_sum = Commitment::commit(50, &(r1 + r2)).point().unwrap();

        assert_eq!(c1 + c2, c_sum);
    }

    #[test]
    fn test_hex_roundtrip_and_rejects_bad_length() {
        let c = Commitment::commit(7, &BlindingFactor::random());
        assert_eq!(Commitment::from_hex(&c.to_hex()).unwrap(), c);
        assert!(Commitment::from_hex("abcd").is_err());
        assert!(Commitment::from_hex("zz").is_err());
    }

    #[test]
    fn test_blinding_rejects_non_canonical() {
        assert!(BlindingFactor::from_bytes([0xff; 32]).is_err());
        let r = BlindingFactor::random();
        assert_eq!(BlindingFactor::from_bytes(r.to_bytes()).unwrap(), r);
    }

    #[test]
    fn test_excess_of_balanced_split() {
        let r_in = BlindingFactor::random();
        let r_out1 = BlindingFactor::random();
        let r_out2 = r_in - r_out1;

        let excess = BlindingFactor::excess(&[r_in], &[r_out1, r_out2]);
        assert_eq!(excess, BlindingFactor::zero());
    }
}
