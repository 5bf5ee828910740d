//! Var-int and fixed-width integer encode/decode over byte streams (spec.md §4.2)
//!
//! Matches the reference wire format exactly: values below 0xFD encode as a
//! single byte; below 2^16 as a 0xFD marker plus a big-endian u16; below
//! 2^32 as a 0xFE marker plus a big-endian u32; everything else as a 0xFF
//! marker plus a big-endian u64.

use crate::error::{Error, Result};

const MARKER_U16: u8 = 0xFD;
const MARKER_U32: u8 = 0xFE;
const MARKER_U64: u8 = 0xFF;

/// Encode `value` as a var-int and append it to `out`.
pub fn encode(value: u64, out: &mut Vec<u8>) {
    if value < 0xFD {
        out.push(value as u8);
    } else if value <= u16::MAX as u64 {
        out.push(MARKER_U16);
        out.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value <= u32::MAX as u64 {
        out.push(MARKER_U32);
        out.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        out.push(MARKER_U64);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

/// Decode a var-int from the start of `buf`.
///
/// Returns `(value, bytes_consumed)`. Fails with `Malformed` if fewer bytes
/// remain than the marker demands.
pub fn decode(buf: &[u8]) -> Result<(u64, usize)> {
    let marker = *buf
        .first()
        .ok_or_else(|| Error::Malformed("var-int: empty buffer".into()))?;

    match marker {
        MARKER_U16 => {
            let bytes = buf
                .get(1..3)
                .ok_or_else(|| Error::Malformed("var-int: truncated u16".into()))?;
            let value = u16::from_be_bytes(bytes.try_into().unwrap());
            Ok((value as u64, 3))
        }
        MARKER_U32 => {
            let bytes = buf
                .get(1..5)
                .ok_or_else(|| Error::Malformed("var-int: truncated u32".into()))?;
            let value = u32::from_be_bytes(bytes.try_into().unwrap());
            Ok((value as u64, 5))
        }
        MARKER_U64 => {
            let bytes = buf
                .get(1..9)
                .ok_or_else(|| Error::Malformed("var-int: truncated u64".into()))?;
            let value = u64::from_be_bytes(bytes.try_into().unwrap());
            Ok((value, 9))
        }
        small => Ok((small as u64, 1)),
    }
}

/// Decode a var-int and validate it falls within `range`, mapping an
/// out-of-range value to `Malformed` (the spec's "Overflow" case).
pub fn decode_ranged(buf: &[u8], range: std::ops::RangeInclusive<u64>, field: &str) -> Result<(u64, usize)> {
    let (value, consumed) = decode(buf)?;
    if !range.contains(&value) {
        return Err(Error::Malformed(format!(
            "{field}: value {value} outside valid range {:?}",
            range
        )));
    }
    Ok((value, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_boundary() {
        let cases = [0u64, 1, 0xFC, 0xFD, 0xFE, 0xFFFF, 0x10000, u32::MAX as u64, u32::MAX as u64 + 1, u64::MAX];
        for value in cases {
            let mut out = Vec::new();
            encode(value, &mut out);
            let (decoded, consumed) = decode(&out).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, out.len());
        }
    }

    #[test]
    fn single_byte_boundary() {
        let mut out = Vec::new();
        encode(0xFC, &mut out);
        assert_eq!(out, vec![0xFC]);
    }

    #[test]
    fn u16_boundary_uses_marker() {
        let mut out = Vec::new();
        encode(0xFD, &mut out);
        assert_eq!(out[0], MARKER_U16);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn truncated_u16_fails() {
        let buf = [MARKER_U16, 0x00];
        assert!(matches!(decode(&buf), Err(Error::Malformed(_))));
    }

    #[test]
    fn truncated_u64_fails() {
        let buf = [MARKER_U64, 0, 0, 0];
        assert!(matches!(decode(&buf), Err(Error::Malformed(_))));
    }

    #[test]
    fn empty_buffer_fails() {
        assert!(matches!(decode(&[]), Err(Error::Malformed(_))));
    }

    #[test]
    fn ranged_rejects_out_of_range() {
        let mut buf = Vec::new();
        encode(5, &mut buf);
        assert!(decode_ranged(&buf, 1..=4, "stream").is_err());
        assert!(decode_ranged(&buf, 1..=5, "stream").is_ok());
    }

    proptest::proptest! {
        #[test]
        fn prop_round_trip(value: u64) {
            let mut out = Vec::new();
            encode(value, &mut out);
            let (decoded, consumed) = decode(&out).unwrap();
            proptest::prop_assert_eq!(decoded, value);
            proptest::prop_assert_eq!(consumed, out.len());
        }
    }
}
