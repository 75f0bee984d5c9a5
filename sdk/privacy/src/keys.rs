use shroud_account::ConfidentialKeyPair;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{Result, decode_32};

/// Generate a fresh confidential keypair (hex X25519 keys).
pub fn generate_keypair() -> ConfidentialKeyPair {
    let secret = StaticSecret::random_from_rng(rand::thread_rng());
    let public = PublicKey::from(&secret);
    ConfidentialKeyPair {
        priv_key: hex::encode(secret.as_bytes()),
        pub_key: hex::encode(public.as_bytes()),
    }
}

/// Recover the public half of a confidential private key.
pub fn public_key_of(priv_key: &str) -> Result<String> {
    let secret = StaticSecret::from(decode_32("private key", priv_key)?);
    Ok(hex::encode(PublicKey::from(&secret).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_of_matches_generated() {
        let kp = generate_keypair();
        assert_eq!(public_key_of(&kp.priv_key).unwrap(), kp.pub_key);
        assert_ne!(generate_keypair().pub_key, kp.pub_key);
    }
}
