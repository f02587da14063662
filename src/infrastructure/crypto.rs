//! secp256k1 signing and verification.

use crate::domain::address::{Address, PubKey};
use crate::domain::ports::SignatureVerifier;
use crate::error::{INVALID_SIGNATURE, INVALID_VALUE, Result};
use once_cell::sync::Lazy;
use secp256k1::{
    All, Message, PublicKey, Secp256k1, SecretKey,
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE},
    ecdsa::Signature,
};
use sha2::{Digest, Sha256};

static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

#[derive(Debug, Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut secp256k1::rand::thread_rng());
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| INVALID_VALUE.new_error(format!("invalid secret key: {e}")))?;
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn pubkey(&self) -> PubKey {
        PubKey::new(self.public_key.serialize().to_vec())
    }

    pub fn address(&self) -> Address {
        self.pubkey().address()
    }

    /// Signs the SHA-256 digest of `message`; returns a compact signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let digest: [u8; 32] = Sha256::digest(message).into();
        let message = Message::from_digest(digest);
        SECP256K1_CONTEXT
            .sign_ecdsa(&message, &self.secret_key)
            .serialize_compact()
            .to_vec()
    }
}

/// Verifies a compact ECDSA signature over the SHA-256 digest of `message`.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    if public_key.len() != PUBLIC_KEY_SIZE {
        return Err(INVALID_SIGNATURE.new_error(format!(
            "public key must be exactly {} bytes, got {}",
            PUBLIC_KEY_SIZE,
            public_key.len()
        )));
    }
    if signature.len() != COMPACT_SIGNATURE_SIZE {
        return Err(INVALID_SIGNATURE.new_error(format!(
            "signature must be exactly {} bytes, got {}",
            COMPACT_SIGNATURE_SIZE,
            signature.len()
        )));
    }
    let public_key = PublicKey::from_slice(public_key)
        .map_err(|e| INVALID_SIGNATURE.new_error(format!("invalid public key: {e}")))?;
    let signature = Signature::from_compact(signature)
        .map_err(|e| INVALID_SIGNATURE.new_error(format!("malformed signature: {e}")))?;
    let digest: [u8; 32] = Sha256::digest(message).into();
    SECP256K1_CONTEXT
        .verify_ecdsa(&Message::from_digest(digest), &signature, &public_key)
        .map_err(|_| INVALID_SIGNATURE.new_error("signature verification failed"))
}

/// [`SignatureVerifier`] backed by [`verify_signature`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(&self, pubkey: &PubKey, message: &[u8], signature: &[u8]) -> bool {
        verify_signature(pubkey.as_bytes(), message, signature).is_ok()
    }
}
