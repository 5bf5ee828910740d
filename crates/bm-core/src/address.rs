//! Address encode/decode, tag/address-key derivation for v4+ addresses (spec.md §4.3)

use crate::error::{Error, Result};
use crate::hash::double_sha512;
use crate::varint;

/// Address versions this client understands (spec.md §3: version 1..4).
pub const MIN_VERSION: u64 = 1;
pub const MAX_VERSION: u64 = 4;
/// This client supports stream 1 only (spec.md §3, §1 Non-goals).
pub const SUPPORTED_STREAM: u64 = 1;

/// A decoded `BM-...` address string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedAddress {
    pub version: u64,
    pub stream: u64,
    pub ripe: [u8; 20],
}

/// Strip leading zero bytes from a 20-byte ripe hash, as the reference wire
/// format does before base58-encoding it.
fn strip_leading_zeros(ripe: &[u8; 20]) -> &[u8] {
    let first_nonzero = ripe.iter().position(|&b| b != 0).unwrap_or(ripe.len());
    &ripe[first_nonzero..]
}

/// Re-pad a stripped ripe hash back out to 20 bytes.
fn pad_to_20(stripped: &[u8]) -> Result<[u8; 20]> {
    if stripped.len() > 20 {
        return Err(Error::InvalidAddress(
            "ripe hash longer than 20 bytes after decoding".into(),
        ));
    }
    let mut out = [0u8; 20];
    out[20 - stripped.len()..].copy_from_slice(stripped);
    Ok(out)
}

/// Build the preimage `version_varint || stream_varint || ripe_stripped`
/// that both the checksum and the v4+ address key are derived from.
fn preimage(version: u64, stream: u64, ripe: &[u8; 20]) -> Vec<u8> {
    let mut out = Vec::new();
    varint::encode(version, &mut out);
    varint::encode(stream, &mut out);
    out.extend_from_slice(strip_leading_zeros(ripe));
    out
}

/// Encode `(version, stream, ripe)` into a `BM-...` address string.
pub fn encode(version: u64, stream: u64, ripe: &[u8; 20]) -> Result<String> {
    if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
        return Err(Error::InvalidAddress(format!(
            "unsupported address version {version}"
        )));
    }
    let body = preimage(version, stream, ripe);
    let checksum = double_sha512(&body);
    let mut payload = body;
    payload.extend_from_slice(&checksum[..4]);
    Ok(format!("BM-{}", bs58::encode(payload).into_string()))
}

/// Decode a `BM-...` address string back into `(version, stream, ripe)`,
/// validating the trailing 4-byte checksum.
pub fn decode(address: &str) -> Result<DecodedAddress> {
    let stripped = address
        .strip_prefix("BM-")
        .ok_or_else(|| Error::InvalidAddress("missing BM- prefix".into()))?;

    let payload = bs58::decode(stripped)
        .into_vec()
        .map_err(|e| Error::InvalidAddress(format!("base58 decode failed: {e}")))?;

    if payload.len() < 4 {
        return Err(Error::InvalidAddress("payload too short for checksum".into()));
    }
    let (body, checksum) = payload.split_at(payload.len() - 4);

    let (version, consumed) = varint::decode(body)
        .map_err(|_| Error::InvalidAddress("malformed version var-int".into()))?;
    if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
        return Err(Error::InvalidAddress(format!(
            "unsupported address version {version}"
        )));
    }
    let (stream, consumed2) = varint::decode(&body[consumed..])
        .map_err(|_| Error::InvalidAddress("malformed stream var-int".into()))?;
    let ripe_stripped = &body[consumed + consumed2..];
    let ripe = pad_to_20(ripe_stripped)?;

    let expected_checksum = double_sha512(body);
    if &expected_checksum[..4] != checksum {
        return Err(Error::InvalidAddress("checksum mismatch".into()));
    }

    Ok(DecodedAddress {
        version,
        stream,
        ripe,
    })
}

/// For v>=4 addresses: `address_key = double_sha512(version || stream || ripe_stripped)`.
/// The first 32 bytes are the gateway lookup *tag*; the second 32 bytes
/// seed the ECDH private key used to decrypt the pubkey envelope.
pub fn derive_address_key(version: u64, stream: u64, ripe: &[u8; 20]) -> [u8; 64] {
    double_sha512(&preimage(version, stream, ripe))
}

pub fn tag(address_key: &[u8; 64]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&address_key[..32]);
    out
}

pub fn private_key_seed(address_key: &[u8; 64]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&address_key[32..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ripe() -> [u8; 20] {
        let mut ripe = [0u8; 20];
        for (i, byte) in ripe.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(7).wrapping_add(3);
        }
        ripe
    }

    #[test]
    fn round_trip_all_versions() {
        let ripe = sample_ripe();
        for version in MIN_VERSION..=MAX_VERSION {
            let addr = encode(version, SUPPORTED_STREAM, &ripe).unwrap();
            assert!(addr.starts_with("BM-"));
            let decoded = decode(&addr).unwrap();
            assert_eq!(decoded.version, version);
            assert_eq!(decoded.stream, SUPPORTED_STREAM);
            assert_eq!(decoded.ripe, ripe);
        }
    }

    #[test]
    fn round_trip_ripe_with_leading_zeros() {
        let mut ripe = sample_ripe();
        ripe[0] = 0;
        ripe[1] = 0;
        let addr = encode(4, SUPPORTED_STREAM, &ripe).unwrap();
        let decoded = decode(&addr).unwrap();
        assert_eq!(decoded.ripe, ripe);
    }

    #[test]
    fn rejects_unknown_version() {
        let ripe = sample_ripe();
        assert!(encode(5, SUPPORTED_STREAM, &ripe).is_err());
    }

    #[test]
    fn checksum_corruption_in_any_byte_is_rejected() {
        let ripe = sample_ripe();
        let addr = encode(4, SUPPORTED_STREAM, &ripe).unwrap();
        let payload_b58 = addr.strip_prefix("BM-").unwrap();
        let mut payload = bs58::decode(payload_b58).into_vec().unwrap();
        let last = payload.len() - 1;
        payload[last] ^= 0xFF;
        let corrupted = format!("BM-{}", bs58::encode(payload).into_string());
        assert!(matches!(decode(&corrupted), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn missing_prefix_is_rejected() {
        assert!(decode("not-an-address").is_err());
    }

    #[test]
    fn tag_and_seed_are_halves_of_address_key() {
        let ripe = sample_ripe();
        let key = derive_address_key(4, SUPPORTED_STREAM, &ripe);
        let t = tag(&key);
        let s = private_key_seed(&key);
        assert_eq!(&key[..32], &t[..]);
        assert_eq!(&key[32..], &s[..]);
    }
}
