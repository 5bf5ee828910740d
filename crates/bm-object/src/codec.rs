//! Wire object codec for `pubkey` and `msg` objects (spec.md §4.4)
//!
//! Framing shared by both object kinds:
//!
//! ```text
//! [8  bytes] pow_nonce          (present iff pow_done)
//! [4|8 bytes] time              (4-vs-8 byte heuristic, see `decode_time`)
//! [varint]  address_version     (1..4)
//! [varint]  stream              (1..1)
//! if version >= 4:
//!     [32 bytes] tag
//!     [..]       ENVELOPE_ENCRYPTED(inner)
//! else:
//!     [..]       inner (verbatim)
//! ```

use bm_core::error::{Error, Result};
use bm_core::varint;

/// Default `nonce_trials_per_byte` for address versions < 3 (spec.md §3,
/// flagged in spec.md §9(c): later protocol revisions set this to zero).
pub const DEFAULT_NONCE_TRIALS_PER_BYTE: u64 = 320;
/// Default `extra_bytes` for address versions < 3 (see above).
pub const DEFAULT_EXTRA_BYTES: u64 = 14_000;

const UNCOMPRESSED_POINT_LEN: usize = 65;
const COMPRESSED_POINT_LEN: usize = 64;
const RIPE_LEN: usize = 20;
const TAG_LEN: usize = 32;

/// Selects how the ambiguous 4-vs-8-byte time field is parsed (spec.md §9(a)).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeFieldPolicy {
    /// The historical heuristic: 4 bytes unless the first 4 bytes are zero,
    /// in which case read a further 4 bytes as the lower dword.
    HeuristicV3,
    /// Always read/write a full 8-byte time field.
    StrictEightByte,
}

/// Encode a time value using the heuristic writer convention: values that
/// fit in 32 bits are written as 4 bytes, everything else as 8.
pub fn encode_time(time: i64, out: &mut Vec<u8>) {
    if (0..=u32::MAX as i64).contains(&time) {
        out.extend_from_slice(&(time as u32).to_be_bytes());
    } else {
        out.extend_from_slice(&(time as u64).to_be_bytes());
    }
}

/// Decode a time field per `policy`. Returns `(time, bytes_consumed)`.
pub fn decode_time(buf: &[u8], policy: TimeFieldPolicy) -> Result<(i64, usize)> {
    let first4 = buf
        .get(0..4)
        .ok_or_else(|| Error::Malformed("time field: fewer than 4 bytes remain".into()))?;
    let first4_value = u32::from_be_bytes(first4.try_into().unwrap());

    let read_eight = match policy {
        TimeFieldPolicy::StrictEightByte => true,
        TimeFieldPolicy::HeuristicV3 => first4_value == 0,
    };

    if read_eight {
        let eight = buf
            .get(0..8)
            .ok_or_else(|| Error::Malformed("time field: fewer than 8 bytes remain".into()))?;
        let value = u64::from_be_bytes(eight.try_into().unwrap());
        if policy == TimeFieldPolicy::HeuristicV3 {
            tracing::warn!(
                "ambiguous time field: upper dword zero, parsed as 8-byte field (value={value}); \
                 a real 8-byte time whose upper dword happens to be zero is indistinguishable from \
                 a 4-byte time here"
            );
        }
        Ok((value as i64, 8))
    } else {
        Ok((first4_value as i64, 4))
    }
}

/// Outer frame shared by pubkey and msg objects, decoded up to (but not
/// including) the inner/encrypted-envelope payload.
pub struct OuterFrame {
    pub pow_nonce: Option<u64>,
    pub time: i64,
    pub address_version: u64,
    pub stream: u64,
    pub consumed: usize,
}

fn encode_outer(pow_nonce: Option<u64>, time: i64, address_version: u64, stream: u64) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(nonce) = pow_nonce {
        out.extend_from_slice(&nonce.to_be_bytes());
    }
    encode_time(time, &mut out);
    varint::encode(address_version, &mut out);
    varint::encode(stream, &mut out);
    out
}

fn decode_outer(buf: &[u8], pow_done: bool, policy: TimeFieldPolicy) -> Result<OuterFrame> {
    let mut offset = 0;
    let pow_nonce = if pow_done {
        let bytes = buf
            .get(0..8)
            .ok_or_else(|| Error::Malformed("truncated PoW nonce prefix".into()))?;
        offset += 8;
        Some(u64::from_be_bytes(bytes.try_into().unwrap()))
    } else {
        None
    };

    let (time, consumed) = decode_time(&buf[offset..], policy)?;
    offset += consumed;

    let (address_version, consumed) =
        varint::decode_ranged(&buf[offset..], 1..=4, "address_version")?;
    offset += consumed;

    let (stream, consumed) = varint::decode_ranged(&buf[offset..], 1..=1, "stream")?;
    offset += consumed;

    Ok(OuterFrame {
        pow_nonce,
        time,
        address_version,
        stream,
        consumed: offset,
    })
}

/// Strip the leading `0x04` uncompressed-point marker for the wire.
fn strip_point_marker(point: &[u8]) -> Result<&[u8]> {
    if point.len() != UNCOMPRESSED_POINT_LEN || point[0] != 0x04 {
        return Err(Error::Malformed("expected a 65-byte uncompressed EC point".into()));
    }
    Ok(&point[1..])
}

/// Reinsert the leading `0x04` marker on parse.
fn reinsert_point_marker(stripped: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(UNCOMPRESSED_POINT_LEN);
    out.push(0x04);
    out.extend_from_slice(stripped);
    out
}

// ============================================================================
// Pubkey object
// ============================================================================

/// Decoded `inner` body of a pubkey object (spec.md §4.4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PubkeyInner {
    pub behaviour_bitfield: u32,
    /// 65-byte uncompressed point.
    pub public_signing_key: Vec<u8>,
    /// 65-byte uncompressed point.
    pub public_encryption_key: Vec<u8>,
    pub nonce_trials_per_byte: u64,
    pub extra_bytes: u64,
    /// Absent for version <= 2.
    pub signature: Option<Vec<u8>>,
}

fn encode_pubkey_inner(inner: &PubkeyInner, address_version: u64, out: &mut Vec<u8>) -> Result<()> {
    out.extend_from_slice(&inner.behaviour_bitfield.to_be_bytes());
    out.extend_from_slice(strip_point_marker(&inner.public_signing_key)?);
    out.extend_from_slice(strip_point_marker(&inner.public_encryption_key)?);

    if address_version >= 3 {
        varint::encode(inner.nonce_trials_per_byte, out);
        varint::encode(inner.extra_bytes, out);
        let signature = inner.signature.as_deref().unwrap_or(&[]);
        varint::encode(signature.len() as u64, out);
        out.extend_from_slice(signature);
    }
    Ok(())
}

/// Bytes a v3+ pubkey's ECDSA signature covers: time, version, stream,
/// behaviour bitfield, both keys, and the ntpb/eb pair — everything that
/// precedes the signature field itself, with no PoW nonce (signing happens
/// before the nonce search) and no signature-length/signature bytes.
pub fn pubkey_signing_payload(
    time: i64,
    address_version: u64,
    stream: u64,
    inner: &PubkeyInner,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_time(time, &mut out);
    varint::encode(address_version, &mut out);
    varint::encode(stream, &mut out);
    out.extend_from_slice(&inner.behaviour_bitfield.to_be_bytes());
    out.extend_from_slice(strip_point_marker(&inner.public_signing_key)?);
    out.extend_from_slice(strip_point_marker(&inner.public_encryption_key)?);
    if address_version >= 3 {
        varint::encode(inner.nonce_trials_per_byte, &mut out);
        varint::encode(inner.extra_bytes, &mut out);
    }
    Ok(out)
}

/// Encode a pubkey `inner` body standalone (no outer frame) — the plaintext
/// a v4+ pubkey's envelope wraps, and the v<4 wire body verbatim.
pub fn pubkey_inner_bytes(inner: &PubkeyInner, address_version: u64) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_pubkey_inner(inner, address_version, &mut out)?;
    Ok(out)
}

pub fn decode_pubkey_inner(buf: &[u8], address_version: u64) -> Result<PubkeyInner> {
    let mut offset = 4 + 2 * COMPRESSED_POINT_LEN;
    if buf.len() < offset {
        return Err(Error::Malformed("pubkey inner shorter than fixed fields".into()));
    }
    let behaviour_bitfield = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    let public_signing_key = reinsert_point_marker(&buf[4..4 + COMPRESSED_POINT_LEN]);
    let public_encryption_key =
        reinsert_point_marker(&buf[4 + COMPRESSED_POINT_LEN..offset]);

    if address_version >= 3 {
        let (nonce_trials_per_byte, consumed) = varint::decode(&buf[offset..])?;
        offset += consumed;
        let (extra_bytes, consumed) = varint::decode(&buf[offset..])?;
        offset += consumed;
        let (sig_len, consumed) = varint::decode(&buf[offset..])?;
        offset += consumed;
        let sig_len = sig_len as usize;
        let remaining = buf.len() - offset;
        if sig_len > remaining {
            return Err(Error::Malformed(format!(
                "signature length {sig_len} exceeds remaining buffer {remaining}"
            )));
        }
        let signature = buf[offset..offset + sig_len].to_vec();
        Ok(PubkeyInner {
            behaviour_bitfield,
            public_signing_key,
            public_encryption_key,
            nonce_trials_per_byte,
            extra_bytes,
            signature: Some(signature),
        })
    } else {
        Ok(PubkeyInner {
            behaviour_bitfield,
            public_signing_key,
            public_encryption_key,
            nonce_trials_per_byte: DEFAULT_NONCE_TRIALS_PER_BYTE,
            extra_bytes: DEFAULT_EXTRA_BYTES,
            signature: None,
        })
    }
}

/// A pubkey object, either plaintext (version < 4) or still carrying its
/// v4 encrypted envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PubkeyObject {
    Plain {
        pow_nonce: Option<u64>,
        time: i64,
        address_version: u64,
        stream: u64,
        inner: PubkeyInner,
    },
    Encrypted {
        pow_nonce: Option<u64>,
        time: i64,
        address_version: u64,
        stream: u64,
        tag: [u8; TAG_LEN],
        ciphertext: Vec<u8>,
    },
}

impl PubkeyObject {
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            PubkeyObject::Plain {
                pow_nonce,
                time,
                address_version,
                stream,
                inner,
            } => {
                let mut out = encode_outer(*pow_nonce, *time, *address_version, *stream);
                encode_pubkey_inner(inner, *address_version, &mut out)?;
                Ok(out)
            }
            PubkeyObject::Encrypted {
                pow_nonce,
                time,
                address_version,
                stream,
                tag,
                ciphertext,
            } => {
                let mut out = encode_outer(*pow_nonce, *time, *address_version, *stream);
                out.extend_from_slice(tag);
                out.extend_from_slice(ciphertext);
                Ok(out)
            }
        }
    }

    pub fn decode(buf: &[u8], pow_done: bool, policy: TimeFieldPolicy) -> Result<Self> {
        let outer = decode_outer(buf, pow_done, policy)?;
        let rest = &buf[outer.consumed..];

        if outer.address_version >= 4 {
            if rest.len() < TAG_LEN {
                return Err(Error::Malformed("truncated tag".into()));
            }
            let mut tag = [0u8; TAG_LEN];
            tag.copy_from_slice(&rest[..TAG_LEN]);
            Ok(PubkeyObject::Encrypted {
                pow_nonce: outer.pow_nonce,
                time: outer.time,
                address_version: outer.address_version,
                stream: outer.stream,
                tag,
                ciphertext: rest[TAG_LEN..].to_vec(),
            })
        } else {
            let inner = decode_pubkey_inner(rest, outer.address_version)?;
            Ok(PubkeyObject::Plain {
                pow_nonce: outer.pow_nonce,
                time: outer.time,
                address_version: outer.address_version,
                stream: outer.stream,
                inner,
            })
        }
    }
}

// ============================================================================
// Msg object
// ============================================================================

/// Decoded inner body of a `msg` object, mirroring the reference v3
/// protocol's message encoding (spec.md §4.4 asks the implementer to
/// mirror it; original_source for this spec carried no kept files, so this
/// mirrors the wire shape used by the rest of the retrieval pack's own
/// Bitmessage-family implementation).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgInner {
    pub sender_address_version: u64,
    pub sender_stream: u64,
    pub behaviour_bitfield: u32,
    /// 65-byte uncompressed point.
    pub sender_signing_key: Vec<u8>,
    /// 65-byte uncompressed point.
    pub sender_encryption_key: Vec<u8>,
    pub sender_nonce_trials_per_byte: u64,
    pub sender_extra_bytes: u64,
    pub destination_ripe: [u8; RIPE_LEN],
    pub encoding: u64,
    pub message: Vec<u8>,
    pub signature: Vec<u8>,
}

fn encode_msg_inner(inner: &MsgInner, out: &mut Vec<u8>) -> Result<()> {
    varint::encode(inner.sender_address_version, out);
    varint::encode(inner.sender_stream, out);
    out.extend_from_slice(&inner.behaviour_bitfield.to_be_bytes());
    out.extend_from_slice(strip_point_marker(&inner.sender_signing_key)?);
    out.extend_from_slice(strip_point_marker(&inner.sender_encryption_key)?);
    if inner.sender_address_version >= 3 {
        varint::encode(inner.sender_nonce_trials_per_byte, out);
        varint::encode(inner.sender_extra_bytes, out);
    }
    out.extend_from_slice(&inner.destination_ripe);
    varint::encode(inner.encoding, out);
    varint::encode(inner.message.len() as u64, out);
    out.extend_from_slice(&inner.message);
    varint::encode(inner.signature.len() as u64, out);
    out.extend_from_slice(&inner.signature);
    Ok(())
}

/// Encode a msg `inner` body standalone (no outer frame).
pub fn msg_inner_bytes(inner: &MsgInner) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_msg_inner(inner, &mut out)?;
    Ok(out)
}

/// Bytes a msg object's ECDSA signature covers: every `inner` field up to
/// (not including) the signature-length/signature bytes themselves.
pub fn msg_signing_payload(inner: &MsgInner) -> Result<Vec<u8>> {
    let mut unsigned = inner.clone();
    unsigned.signature = Vec::new();
    let mut out = Vec::new();
    encode_msg_inner(&unsigned, &mut out)?;
    // Drop the trailing zero-length signature varint (a single 0x00 byte)
    // `encode_msg_inner` appended for the empty `signature` above.
    out.pop();
    Ok(out)
}

fn decode_msg_inner(buf: &[u8]) -> Result<MsgInner> {
    let mut offset = 0;
    let (sender_address_version, consumed) =
        varint::decode_ranged(&buf[offset..], 1..=4, "sender_address_version")?;
    offset += consumed;
    let (sender_stream, consumed) = varint::decode_ranged(&buf[offset..], 1..=1, "sender_stream")?;
    offset += consumed;

    let fixed_end = offset + 4 + 2 * COMPRESSED_POINT_LEN;
    if buf.len() < fixed_end {
        return Err(Error::Malformed("msg inner shorter than fixed fields".into()));
    }
    let behaviour_bitfield =
        u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap());
    offset += 4;
    let sender_signing_key = reinsert_point_marker(&buf[offset..offset + COMPRESSED_POINT_LEN]);
    offset += COMPRESSED_POINT_LEN;
    let sender_encryption_key = reinsert_point_marker(&buf[offset..offset + COMPRESSED_POINT_LEN]);
    offset += COMPRESSED_POINT_LEN;

    let (sender_nonce_trials_per_byte, sender_extra_bytes) = if sender_address_version >= 3 {
        let (ntpb, consumed) = varint::decode(&buf[offset..])?;
        offset += consumed;
        let (eb, consumed) = varint::decode(&buf[offset..])?;
        offset += consumed;
        (ntpb, eb)
    } else {
        (DEFAULT_NONCE_TRIALS_PER_BYTE, DEFAULT_EXTRA_BYTES)
    };

    if buf.len() < offset + RIPE_LEN {
        return Err(Error::Malformed("truncated destination ripe".into()));
    }
    let mut destination_ripe = [0u8; RIPE_LEN];
    destination_ripe.copy_from_slice(&buf[offset..offset + RIPE_LEN]);
    offset += RIPE_LEN;

    let (encoding, consumed) = varint::decode(&buf[offset..])?;
    offset += consumed;

    let (message_len, consumed) = varint::decode(&buf[offset..])?;
    offset += consumed;
    let message_len = message_len as usize;
    if buf.len() < offset + message_len {
        return Err(Error::Malformed("message body exceeds remaining buffer".into()));
    }
    let message = buf[offset..offset + message_len].to_vec();
    offset += message_len;

    let (sig_len, consumed) = varint::decode(&buf[offset..])?;
    offset += consumed;
    let sig_len = sig_len as usize;
    if buf.len() < offset + sig_len {
        return Err(Error::Malformed("signature exceeds remaining buffer".into()));
    }
    let signature = buf[offset..offset + sig_len].to_vec();

    Ok(MsgInner {
        sender_address_version,
        sender_stream,
        behaviour_bitfield,
        sender_signing_key,
        sender_encryption_key,
        sender_nonce_trials_per_byte,
        sender_extra_bytes,
        destination_ripe,
        encoding,
        message,
        signature,
    })
}

/// A `msg` object, either plaintext (version < 4) or still carrying its v4
/// encrypted envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MsgObject {
    Plain {
        pow_nonce: Option<u64>,
        time: i64,
        address_version: u64,
        stream: u64,
        inner: MsgInner,
    },
    Encrypted {
        pow_nonce: Option<u64>,
        time: i64,
        address_version: u64,
        stream: u64,
        tag: [u8; TAG_LEN],
        ciphertext: Vec<u8>,
    },
}

impl MsgObject {
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            MsgObject::Plain {
                pow_nonce,
                time,
                address_version,
                stream,
                inner,
            } => {
                let mut out = encode_outer(*pow_nonce, *time, *address_version, *stream);
                encode_msg_inner(inner, &mut out)?;
                Ok(out)
            }
            MsgObject::Encrypted {
                pow_nonce,
                time,
                address_version,
                stream,
                tag,
                ciphertext,
            } => {
                let mut out = encode_outer(*pow_nonce, *time, *address_version, *stream);
                out.extend_from_slice(tag);
                out.extend_from_slice(ciphertext);
                Ok(out)
            }
        }
    }

    pub fn decode(buf: &[u8], pow_done: bool, policy: TimeFieldPolicy) -> Result<Self> {
        let outer = decode_outer(buf, pow_done, policy)?;
        let rest = &buf[outer.consumed..];

        if outer.address_version >= 4 {
            if rest.len() < TAG_LEN {
                return Err(Error::Malformed("truncated tag".into()));
            }
            let mut tag = [0u8; TAG_LEN];
            tag.copy_from_slice(&rest[..TAG_LEN]);
            Ok(MsgObject::Encrypted {
                pow_nonce: outer.pow_nonce,
                time: outer.time,
                address_version: outer.address_version,
                stream: outer.stream,
                tag,
                ciphertext: rest[TAG_LEN..].to_vec(),
            })
        } else {
            let inner = decode_msg_inner(rest)?;
            Ok(MsgObject::Plain {
                pow_nonce: outer.pow_nonce,
                time: outer.time,
                address_version: outer.address_version,
                stream: outer.stream,
                inner,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_point(fill: u8) -> Vec<u8> {
        let mut point = vec![fill; UNCOMPRESSED_POINT_LEN];
        point[0] = 0x04;
        point
    }

    #[test]
    fn pubkey_v2_round_trip_no_signature() {
        let inner = PubkeyInner {
            behaviour_bitfield: 1,
            public_signing_key: sample_point(1),
            public_encryption_key: sample_point(2),
            nonce_trials_per_byte: DEFAULT_NONCE_TRIALS_PER_BYTE,
            extra_bytes: DEFAULT_EXTRA_BYTES,
            signature: None,
        };
        let object = PubkeyObject::Plain {
            pow_nonce: Some(42),
            time: 1_700_000_000,
            address_version: 2,
            stream: 1,
            inner: inner.clone(),
        };
        let encoded = object.encode().unwrap();
        let decoded = PubkeyObject::decode(&encoded, true, TimeFieldPolicy::HeuristicV3).unwrap();
        match decoded {
            PubkeyObject::Plain {
                pow_nonce,
                time,
                address_version,
                stream,
                inner: decoded_inner,
            } => {
                assert_eq!(pow_nonce, Some(42));
                assert_eq!(time, 1_700_000_000);
                assert_eq!(address_version, 2);
                assert_eq!(stream, 1);
                assert_eq!(decoded_inner, inner);
            }
            _ => panic!("expected plain pubkey"),
        }
    }

    #[test]
    fn pubkey_v3_round_trip_with_signature() {
        let inner = PubkeyInner {
            behaviour_bitfield: 7,
            public_signing_key: sample_point(3),
            public_encryption_key: sample_point(4),
            nonce_trials_per_byte: 1000,
            extra_bytes: 1000,
            signature: Some(vec![9; 71]),
        };
        let object = PubkeyObject::Plain {
            pow_nonce: None,
            time: 1_800_000_000,
            address_version: 3,
            stream: 1,
            inner: inner.clone(),
        };
        let encoded = object.encode().unwrap();
        let decoded = PubkeyObject::decode(&encoded, false, TimeFieldPolicy::HeuristicV3).unwrap();
        match decoded {
            PubkeyObject::Plain {
                inner: decoded_inner,
                ..
            } => assert_eq!(decoded_inner, inner),
            _ => panic!("expected plain pubkey"),
        }
    }

    #[test]
    fn pubkey_v4_round_trip_opaque_ciphertext() {
        let object = PubkeyObject::Encrypted {
            pow_nonce: Some(7),
            time: 1_750_000_000,
            address_version: 4,
            stream: 1,
            tag: [5u8; TAG_LEN],
            ciphertext: vec![1, 2, 3, 4, 5],
        };
        let encoded = object.encode().unwrap();
        let decoded = PubkeyObject::decode(&encoded, true, TimeFieldPolicy::HeuristicV3).unwrap();
        assert_eq!(decoded, object);
    }

    #[test]
    fn rejects_address_version_out_of_range() {
        let mut buf = Vec::new();
        encode_time(1_700_000_000, &mut buf);
        varint::encode(9, &mut buf); // invalid version
        varint::encode(1, &mut buf);
        assert!(PubkeyObject::decode(&buf, false, TimeFieldPolicy::HeuristicV3).is_err());
    }

    #[test]
    fn rejects_signature_length_overrunning_buffer() {
        let mut inner_bytes = Vec::new();
        inner_bytes.extend_from_slice(&7u32.to_be_bytes());
        inner_bytes.extend_from_slice(&[1u8; COMPRESSED_POINT_LEN]);
        inner_bytes.extend_from_slice(&[2u8; COMPRESSED_POINT_LEN]);
        varint::encode(1000, &mut inner_bytes);
        varint::encode(1000, &mut inner_bytes);
        varint::encode(9999, &mut inner_bytes); // claims a signature far longer than remains

        let mut buf = Vec::new();
        encode_time(1_700_000_000, &mut buf);
        varint::encode(3, &mut buf);
        varint::encode(1, &mut buf);
        buf.extend_from_slice(&inner_bytes);

        assert!(matches!(
            PubkeyObject::decode(&buf, false, TimeFieldPolicy::HeuristicV3),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn time_field_quirk_eight_byte_with_zero_upper_dword() {
        // first 4 bytes zero, next 4 encode 0x61A00000 -> parsed as 8-byte time.
        let mut buf = vec![0x00, 0x00, 0x00, 0x00, 0x61, 0xA0, 0x00, 0x00];
        buf.extend_from_slice(&[1, 1]); // version=1, stream=1 var-ints
        let outer = decode_outer(&buf, false, TimeFieldPolicy::HeuristicV3).unwrap();
        assert_eq!(outer.time, 0x61A00000);
        assert_eq!(outer.consumed, 8 + 2);
    }

    #[test]
    fn time_field_quirk_four_byte_nonzero_first_word() {
        let mut buf = vec![0x61, 0xA0, 0x00, 0x00];
        buf.extend_from_slice(&[1, 1]);
        let outer = decode_outer(&buf, false, TimeFieldPolicy::HeuristicV3).unwrap();
        assert_eq!(outer.time, 0x61A00000);
        assert_eq!(outer.consumed, 4 + 2);
    }

    #[test]
    fn strict_policy_always_reads_eight_bytes() {
        let mut buf = vec![0x00, 0x00, 0x00, 0x00, 0x61, 0xA0, 0x00, 0x00];
        buf.extend_from_slice(&[1, 1]);
        let outer = decode_outer(&buf, false, TimeFieldPolicy::StrictEightByte).unwrap();
        assert_eq!(outer.time, 0x61A00000);
        assert_eq!(outer.consumed, 10);
    }

    #[test]
    fn msg_v1_round_trip() {
        let inner = MsgInner {
            sender_address_version: 2,
            sender_stream: 1,
            behaviour_bitfield: 0,
            sender_signing_key: sample_point(11),
            sender_encryption_key: sample_point(12),
            sender_nonce_trials_per_byte: DEFAULT_NONCE_TRIALS_PER_BYTE,
            sender_extra_bytes: DEFAULT_EXTRA_BYTES,
            destination_ripe: [9u8; RIPE_LEN],
            encoding: 2,
            message: b"hello there".to_vec(),
            signature: vec![0xAB; 70],
        };
        let object = MsgObject::Plain {
            pow_nonce: Some(100),
            time: 1_650_000_000,
            address_version: 2,
            stream: 1,
            inner: inner.clone(),
        };
        let encoded = object.encode().unwrap();
        let decoded = MsgObject::decode(&encoded, true, TimeFieldPolicy::HeuristicV3).unwrap();
        match decoded {
            MsgObject::Plain {
                inner: decoded_inner,
                ..
            } => assert_eq!(decoded_inner, inner),
            _ => panic!("expected plain msg"),
        }
    }

    #[test]
    fn signing_payload_excludes_signature_and_nonce() {
        let inner = PubkeyInner {
            behaviour_bitfield: 7,
            public_signing_key: sample_point(3),
            public_encryption_key: sample_point(4),
            nonce_trials_per_byte: 1000,
            extra_bytes: 1000,
            signature: Some(vec![9; 71]),
        };
        let a = pubkey_signing_payload(1_800_000_000, 3, 1, &inner).unwrap();
        let mut unsigned = inner.clone();
        unsigned.signature = None;
        let b = pubkey_signing_payload(1_800_000_000, 3, 1, &unsigned).unwrap();
        assert_eq!(a, b);
        assert!(!a.iter().eq(vec![9u8; 71].iter()));
    }

    #[test]
    fn msg_signing_payload_excludes_signature() {
        let inner = MsgInner {
            sender_address_version: 3,
            sender_stream: 1,
            behaviour_bitfield: 0,
            sender_signing_key: sample_point(11),
            sender_encryption_key: sample_point(12),
            sender_nonce_trials_per_byte: 1000,
            sender_extra_bytes: 1000,
            destination_ripe: [9u8; RIPE_LEN],
            encoding: 2,
            message: b"hello there".to_vec(),
            signature: vec![0xAB; 70],
        };
        let mut other_signature = inner.clone();
        other_signature.signature = vec![0xCD; 5];
        assert_eq!(
            msg_signing_payload(&inner).unwrap(),
            msg_signing_payload(&other_signature).unwrap()
        );
    }

    #[test]
    fn msg_v4_round_trip_opaque_ciphertext() {
        let object = MsgObject::Encrypted {
            pow_nonce: Some(3),
            time: 1_660_000_000,
            address_version: 4,
            stream: 1,
            tag: [8u8; TAG_LEN],
            ciphertext: vec![9, 9, 9],
        };
        let encoded = object.encode().unwrap();
        let decoded = MsgObject::decode(&encoded, true, TimeFieldPolicy::HeuristicV3).unwrap();
        assert_eq!(decoded, object);
    }
}
