use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::error::LedgerError;

/// Compact ECDSA signature length.
pub const SIGNATURE_LEN: usize = 64;
/// Compressed secp256k1 public key length.
pub const PUBLIC_KEY_LEN: usize = 33;

/// secp256k1 ECDSA over SHA-256 message digests.
pub struct SignatureManager {
    secp: Secp256k1<secp256k1::All>,
}

impl SignatureManager {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    pub fn digest(message: &[u8]) -> [u8; 32] {
        Sha256::digest(message).into()
    }

    /// Sign `message` and return the 64-byte compact signature.
    pub fn create_signature(
        &self,
        message: &[u8],
        secret_key: &SecretKey,
    ) -> Result<[u8; SIGNATURE_LEN], LedgerError> {
        let message_hash = Message::from_digest_slice(&Self::digest(message))
            .map_err(|e| LedgerError::SigningUnavailable(format!("Invalid message hash: {}", e)))?;

        Ok(self.secp.sign_ecdsa(&message_hash, secret_key).serialize_compact())
    }

    /// Check a compact signature against a compressed public key. Wrong
    /// lengths and unparseable material are a failed verification, never an
    /// error.
    pub fn verify_signature(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        if signature.len() != SIGNATURE_LEN || public_key.len() != PUBLIC_KEY_LEN {
            return false;
        }
        let Ok(public_key) = PublicKey::from_slice(public_key) else {
            return false;
        };
        let Ok(mut signature) = Signature::from_compact(signature) else {
            return false;
        };
        // libsecp256k1 only accepts low-S signatures; external signers may not normalize.
        signature.normalize_s();

        let Ok(message_hash) = Message::from_digest_slice(&Self::digest(message)) else {
            return false;
        };
        self.secp
            .verify_ecdsa(&message_hash, &signature, &public_key)
            .is_ok()
    }

    pub fn public_key_from_secret(&self, secret_key: &SecretKey) -> PublicKey {
        PublicKey::from_secret_key(&self.secp, secret_key)
    }

    pub fn generate_secret_key(&self) -> SecretKey {
        let mut rng = rand::rngs::OsRng;
        SecretKey::new(&mut rng)
    }
}

impl Default for SignatureManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_creation_and_verification() {
        let manager = SignatureManager::new();
        let secret_key = manager.generate_secret_key();
        let public_key = manager.public_key_from_secret(&secret_key).serialize();

        let signature = manager.create_signature(b"test message", &secret_key).unwrap();
        assert!(manager.verify_signature(b"test message", &signature, &public_key));
        assert!(!manager.verify_signature(b"wrong message", &signature, &public_key));
    }

    #[test]
    fn test_wrong_key_fails() {
        let manager = SignatureManager::new();
        let secret_key = manager.generate_secret_key();
        let other = manager.generate_secret_key();
        let other_public = manager.public_key_from_secret(&other).serialize();

        let signature = manager.create_signature(b"message", &secret_key).unwrap();
        assert!(!manager.verify_signature(b"message", &signature, &other_public));
    }

    #[test]
    fn test_malformed_material_is_false() {
        let manager = SignatureManager::new();
        let secret_key = manager.generate_secret_key();
        let public_key = manager.public_key_from_secret(&secret_key).serialize();
        let signature = manager.create_signature(b"message", &secret_key).unwrap();

        assert!(!manager.verify_signature(b"message", &signature[..63], &public_key));
        assert!(!manager.verify_signature(b"message", &signature, &public_key[..32]));
        assert!(!manager.verify_signature(b"message", &[], &[]));
        assert!(!manager.verify_signature(b"message", &signature, &[0u8; PUBLIC_KEY_LEN]));
    }
}
