//! Value Encryption
//!
//! Encrypts a token's opening `(value, blinding)` for its owner using
//! ECDH + ChaCha20-Poly1305.
//!
//! ```text
//! Flow:
//! 1. Sender generates ephemeral keypair (epk, esk)
//! 2. Shared secret = ECDH(esk, owner_pk)
//! 3. Encryption key = BLAKE3-derive-key(shared_secret || epk, "shroud value v1")
//! 4. Ciphertext = ChaCha20-Poly1305(key, nonce, value || blinding)
//! 5. encrypt_value = hex(nonce || ciphertext), from_pubkey = hex(epk)
//! ```

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::commitment::BlindingFactor;
use crate::error::{PrivacyError, Result, decode_32, decode_hex};

const KEY_CONTEXT: &str = "shroud value v1";
const NONCE_LEN: usize = 12;
const PLAINTEXT_LEN: usize = 8 + 32;

/// Encrypted opening as carried on a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedValue {
    pub encrypt_value: String,
    pub from_pubkey: String,
}

/// The secret opening of a commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opening {
    pub value: u64,
    pub blinding: BlindingFactor,
}

fn derive_value_key(shared_secret: &[u8; 32], ephemeral_pk: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KEY_CONTEXT);
    hasher.update(shared_secret);
    hasher.update(ephemeral_pk);
    *hasher.finalize().as_bytes()
}

/// Encrypt an opening for the owner of `owner_pub` (hex X25519 key).
pub fn encrypt_value(value: u64, blinding: &BlindingFactor, owner_pub: &str) -> Result<EncryptedValue> {
    let owner_pk = PublicKey::from(decode_32("owner public key", owner_pub)?);

    let mut rng = rand::thread_rng();
    let ephemeral_secret = EphemeralSecret::random_from_rng(&mut rng);
    let ephemeral_pk = PublicKey::from(&ephemeral_secret);
    let shared_secret = ephemeral_secret.diffie_hellman(&owner_pk);

    let key = derive_value_key(shared_secret.as_bytes(), ephemeral_pk.as_bytes());

    let mut plaintext = [0u8; PLAINTEXT_LEN];
    plaintext[..8].copy_from_slice(&value.to_le_bytes());
    plaintext[8..].copy_from_slice(&blinding.to_bytes());

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_bytes);

    let cipher = ChaCha20Poly1305::new_from_slice(&key).map_err(|_| PrivacyError::Encryption)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
        .map_err(|_| PrivacyError::Encryption)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);

    Ok(EncryptedValue {
        encrypt_value: hex::encode(out),
        from_pubkey: hex::encode(ephemeral_pk.as_bytes()),
    })
}

/// Decrypt a token's opening with the owner's private key.
pub fn decrypt_value(priv_key: &str, encrypt_value: &str, from_pubkey: &str) -> Result<Opening> {
    let secret = StaticSecret::from(decode_32("private key", priv_key)?);
    let ephemeral_pk = decode_32("from_pubkey", from_pubkey)?;
    let shared_secret = secret.diffie_hellman(&PublicKey::from(ephemeral_pk));

    let key = derive_value_key(shared_secret.as_bytes(), &ephemeral_pk);

    let bytes = decode_hex("encrypt_value", encrypt_value)?;
    if bytes.len() <= NONCE_LEN {
        return Err(PrivacyError::Decryption);
    }
    let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);

    let cipher = ChaCha20Poly1305::new_from_slice(&key).map_err(|_| PrivacyError::Decryption)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| PrivacyError::Decryption)?;

    if plaintext.len() != PLAINTEXT_LEN {
        return Err(PrivacyError::Decryption);
    }
    let mut value = [0u8; 8];
    value.copy_from_slice(&plaintext[..8]);
    let mut blinding = [0u8; 32];
    blinding.copy_from_slice(&plaintext[8..]);

    Ok(Opening {
        value: u64::from_le_bytes(value),
        blinding: BlindingFactor::from_bytes(blinding)?,
    })
}
