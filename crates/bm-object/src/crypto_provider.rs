//! Explicit handle over the external EC primitives (ECDH, ECDSA) used by
//! the v4 crypto envelope and by pubkey signatures (spec.md §9 design note:
//! "the engine is a value constructed ... from explicit ... crypto
//! handles"). `bm-core`'s own SHA-512/RIPEMD-160 hashing stays in
//! `bm_core::hash`; this trait covers only elliptic-curve operations.

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoProviderError {
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("message must be exactly 32 bytes")]
    BadMessageLength,
}

pub type Result<T> = std::result::Result<T, CryptoProviderError>;

/// An uncompressed secp256k1 key pair, 65-byte public key with the leading
/// `0x04` marker (spec.md §4.4: this marker is stripped on the wire and
/// reinserted on parse by the object codec, not by this trait).
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key_uncompressed: [u8; 65],
}

/// Abstraction over the elliptic-curve primitives this crate treats as an
/// external collaborator (spec.md §1).
pub trait CryptoProvider: Send + Sync {
    fn generate_keypair(&self) -> KeyPair;

    /// ECDH shared secret (raw x-coordinate) between `secret_key` and the
    /// 65-byte uncompressed `their_public_key`.
    fn ecdh(&self, secret_key: &SecretKey, their_public_key: &[u8; 65]) -> Result<[u8; 32]>;

    /// ECDSA sign a 32-byte message digest, returning a DER-encoded signature.
    fn sign(&self, secret_key: &SecretKey, message_digest: &[u8]) -> Result<Vec<u8>>;

    /// ECDSA verify a DER-encoded signature over a 32-byte message digest.
    fn verify(
        &self,
        public_key_uncompressed: &[u8; 65],
        message_digest: &[u8],
        signature_der: &[u8],
    ) -> Result<bool>;

    fn secret_key_from_seed(&self, seed: &[u8; 32]) -> Result<SecretKey>;

    /// Derive the 65-byte uncompressed public key for `secret_key`.
    fn public_key_from_secret(&self, secret_key: &SecretKey) -> [u8; 65];
}

/// Default `CryptoProvider` backed by the `secp256k1` crate, the curve the
/// reference network uses for both signing and ECDH.
#[derive(Default)]
pub struct Secp256k1Provider {
    ctx: Secp256k1<secp256k1::All>,
}

impl Secp256k1Provider {
    pub fn new() -> Self {
        Self {
            ctx: Secp256k1::new(),
        }
    }
}

fn uncompressed_bytes(ctx: &Secp256k1<secp256k1::All>, secret_key: &SecretKey) -> [u8; 65] {
    let public_key = PublicKey::from_secret_key(ctx, secret_key);
    public_key.serialize_uncompressed()
}

impl CryptoProvider for Secp256k1Provider {
    fn generate_keypair(&self) -> KeyPair {
        let mut rng = rand::thread_rng();
        let secret_key = SecretKey::new(&mut rng);
        let public_key_uncompressed = uncompressed_bytes(&self.ctx, &secret_key);
        KeyPair {
            secret_key,
            public_key_uncompressed,
        }
    }

    fn ecdh(&self, secret_key: &SecretKey, their_public_key: &[u8; 65]) -> Result<[u8; 32]> {
        let public_key = PublicKey::from_slice(their_public_key)
            .map_err(|e| CryptoProviderError::InvalidPublicKey(e.to_string()))?;
        let shared = secp256k1::ecdh::SharedSecret::new(&public_key, secret_key);
        let mut out = [0u8; 32];
        out.copy_from_slice(shared.as_ref());
        Ok(out)
    }

    fn sign(&self, secret_key: &SecretKey, message_digest: &[u8]) -> Result<Vec<u8>> {
        let message = Message::from_digest_slice(message_digest)
            .map_err(|_| CryptoProviderError::BadMessageLength)?;
        let signature = self.ctx.sign_ecdsa(&message, secret_key);
        Ok(signature.serialize_der().to_vec())
    }

    fn verify(
        &self,
        public_key_uncompressed: &[u8; 65],
        message_digest: &[u8],
        signature_der: &[u8],
    ) -> Result<bool> {
        let public_key = PublicKey::from_slice(public_key_uncompressed)
            .map_err(|e| CryptoProviderError::InvalidPublicKey(e.to_string()))?;
        let message = Message::from_digest_slice(message_digest)
            .map_err(|_| CryptoProviderError::BadMessageLength)?;
        let signature = Signature::from_der(signature_der)
            .map_err(|e| CryptoProviderError::InvalidSignature(e.to_string()))?;
        Ok(self.ctx.verify_ecdsa(&message, &signature, &public_key).is_ok())
    }

    fn secret_key_from_seed(&self, seed: &[u8; 32]) -> Result<SecretKey> {
        SecretKey::from_slice(seed).map_err(|e| CryptoProviderError::InvalidSecretKey(e.to_string()))
    }

    fn public_key_from_secret(&self, secret_key: &SecretKey) -> [u8; 65] {
        uncompressed_bytes(&self.ctx, secret_key)
    }
}
