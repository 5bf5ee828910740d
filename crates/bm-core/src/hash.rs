//! Thin adapter over the external SHA-512 / RIPEMD-160 primitives (spec.md §4.1's "Hasher")

use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

/// SHA-512(data), 64 bytes.
pub fn sha512(data: &[u8]) -> [u8; 64] {
    let digest = Sha512::digest(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

/// SHA-256(data), 32 bytes — used as the ECDSA message digest for pubkey
/// and message signatures (the wire hash chain itself stays SHA-512/double;
/// this is purely the 32-byte digest `CryptoProvider::sign`/`verify` need).
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// SHA-512(SHA-512(data)), 64 bytes — used throughout the wire protocol for
/// the PoW hash chain and for address checksums/tags.
pub fn double_sha512(data: &[u8]) -> [u8; 64] {
    sha512(&sha512(data))
}

/// RIPEMD-160(SHA-512(data)), 20 bytes — the address ripe-hash.
pub fn ripe_hash(signing_key: &[u8], encryption_key: &[u8]) -> [u8; 20] {
    let mut joined = Vec::with_capacity(signing_key.len() + encryption_key.len());
    joined.extend_from_slice(signing_key);
    joined.extend_from_slice(encryption_key);
    let sha = sha512(&joined);
    let digest = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}
