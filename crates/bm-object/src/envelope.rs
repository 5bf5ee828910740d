//! ECIES-style hybrid encryption used by v4+ pubkey and message objects (spec.md §4.5)
//!
//! `ENVELOPE_ENCRYPTED(plaintext, recipient_pubkey)`: generate an ephemeral
//! EC keypair, derive a shared secret via ECDH, split it into an AES key
//! and an HMAC key, encrypt with AES-256-CBC/PKCS#7, and append an
//! HMAC-SHA256 tag. Wire layout: `iv(16) || ephemeral_pubkey(65) ||
//! ciphertext || hmac(32)`.

use crate::crypto_provider::CryptoProvider;
use bm_core::error::{Error, Result};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

const IV_LEN: usize = 16;
const EPHEMERAL_PUBKEY_LEN: usize = 65;
const MAC_LEN: usize = 32;
const MIN_ENVELOPE_LEN: usize = IV_LEN + EPHEMERAL_PUBKEY_LEN + MAC_LEN;

/// Encrypt `plaintext` to `recipient_public_key` (65-byte uncompressed).
pub fn encrypt(
    provider: &dyn CryptoProvider,
    plaintext: &[u8],
    recipient_public_key: &[u8; 65],
) -> Result<Vec<u8>> {
    let ephemeral = provider.generate_keypair();
    let shared = provider
        .ecdh(&ephemeral.secret_key, recipient_public_key)
        .map_err(|e| Error::KeyMismatch(e.to_string()))?;
    let (aes_key, mac_key) = derive_keys(&shared);

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext =
        Aes256CbcEnc::new(&aes_key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut envelope =
        Vec::with_capacity(IV_LEN + EPHEMERAL_PUBKEY_LEN + ciphertext.len() + MAC_LEN);
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(&ephemeral.public_key_uncompressed);
    envelope.extend_from_slice(&ciphertext);

    let mut mac = HmacSha256::new_from_slice(&mac_key).expect("32-byte HMAC key");
    mac.update(&envelope);
    envelope.extend_from_slice(&mac.finalize().into_bytes());

    Ok(envelope)
}

/// Decrypt an envelope produced by [`encrypt`] using the recipient's secret key.
pub fn decrypt(
    provider: &dyn CryptoProvider,
    envelope: &[u8],
    recipient_secret_key: &secp256k1::SecretKey,
) -> Result<Vec<u8>> {
    if envelope.len() < MIN_ENVELOPE_LEN {
        return Err(Error::Malformed(
            "envelope shorter than iv + ephemeral pubkey + hmac".into(),
        ));
    }

    let (body, tag) = envelope.split_at(envelope.len() - MAC_LEN);
    let (prefix, ciphertext) = body.split_at(IV_LEN + EPHEMERAL_PUBKEY_LEN);
    let iv = &prefix[..IV_LEN];
    let ephemeral_pubkey: [u8; 65] = prefix[IV_LEN..]
        .try_into()
        .map_err(|_| Error::Malformed("ephemeral pubkey length mismatch".into()))?;

    let shared = provider
        .ecdh(recipient_secret_key, &ephemeral_pubkey)
        .map_err(|e| Error::KeyMismatch(e.to_string()))?;
    let (aes_key, mac_key) = derive_keys(&shared);

    let mut mac = HmacSha256::new_from_slice(&mac_key).expect("32-byte HMAC key");
    mac.update(body);
    mac.verify_slice(tag).map_err(|_| Error::DecryptFailed)?;

    let mut buf = ciphertext.to_vec();
    let plaintext = Aes256CbcDec::new(&aes_key.into(), iv.into())
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| Error::DecryptFailed)?;

    Ok(plaintext.to_vec())
}

/// Split `SHA-512(shared_secret)` into an AES-256 key and an HMAC-SHA256 key.
fn derive_keys(shared_secret: &[u8; 32]) -> ([u8; 32], [u8; 32]) {
    let expanded = bm_core::hash::sha512(shared_secret);
    let mut aes_key = [0u8; 32];
    let mut mac_key = [0u8; 32];
    aes_key.copy_from_slice(&expanded[..32]);
    mac_key.copy_from_slice(&expanded[32..]);
    (aes_key, mac_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto_provider::Secp256k1Provider;

    #[test]
    fn round_trip() {
        let provider = Secp256k1Provider::new();
        let recipient = provider.generate_keypair();
        let plaintext = b"the quick brown fox jumps over the lazy dog";

        let envelope = encrypt(&provider, plaintext, &recipient.public_key_uncompressed).unwrap();
        let decrypted = decrypt(&provider, &envelope, &recipient.secret_key).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn bit_flip_in_ciphertext_fails_mac() {
        let provider = Secp256k1Provider::new();
        let recipient = provider.generate_keypair();
        let plaintext = b"tamper with me";

        let mut envelope =
            encrypt(&provider, plaintext, &recipient.public_key_uncompressed).unwrap();
        let flip_at = IV_LEN + EPHEMERAL_PUBKEY_LEN;
        envelope[flip_at] ^= 0x01;

        assert_eq!(
            decrypt(&provider, &envelope, &recipient.secret_key),
            Err(Error::DecryptFailed)
        );
    }

    #[test]
    fn wrong_recipient_key_fails() {
        let provider = Secp256k1Provider::new();
        let recipient = provider.generate_keypair();
        let impostor = provider.generate_keypair();
        let plaintext = b"for your eyes only";

        let envelope = encrypt(&provider, plaintext, &recipient.public_key_uncompressed).unwrap();
        assert_eq!(
            decrypt(&provider, &envelope, &impostor.secret_key),
            Err(Error::DecryptFailed)
        );
    }

    #[test]
    fn truncated_envelope_is_malformed() {
        let provider = Secp256k1Provider::new();
        let recipient = provider.generate_keypair();
        let short = vec![0u8; 10];
        assert!(matches!(
            decrypt(&provider, &short, &recipient.secret_key),
            Err(Error::Malformed(_))
        ));
    }
}
