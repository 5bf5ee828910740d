//! Proof-of-work engine: target computation, nonce search, and verification (spec.md §4.1)

use crate::error::{Error, Result};
use crate::hash::double_sha512;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Minimum TTL (seconds) the target formula ever uses, regardless of the
/// object's actual remaining lifetime.
const MIN_TARGET_TTL: i64 = 300;

/// Clamp an (expiration_time - now) duration to the minimum the target
/// formula accepts.
fn effective_ttl(expiration_time: i64, now: i64) -> i64 {
    let ttl = expiration_time - now;
    if ttl < MIN_TARGET_TTL {
        MIN_TARGET_TTL
    } else {
        ttl
    }
}

/// Compute the 64-bit PoW target for a payload of length `payload_len`.
///
/// `divisor = (L + EB) * NTPB + ((L + EB) * TTL * NTPB) / 2^16`
/// `target  = floor(2^64 / divisor)`
///
/// All arithmetic is carried in `u128` to avoid overflow (spec.md §4.1);
/// the final value is truncated to `u64` and MUST be interpreted as a
/// signed `i64` by callers comparing against a hash output.
pub fn get_target(
    payload_len: usize,
    nonce_trials_per_byte: u64,
    extra_bytes: u64,
    expiration_time: i64,
    now: i64,
) -> Result<u64> {
    if nonce_trials_per_byte == 0 || extra_bytes == 0 {
        return Err(Error::InvalidParameter(
            "nonce_trials_per_byte and extra_bytes must be non-zero".into(),
        ));
    }

    let ttl = effective_ttl(expiration_time, now) as u128;
    let length = payload_len as u128 + extra_bytes as u128;
    let ntpb = nonce_trials_per_byte as u128;

    let divisor = length * ntpb + (length * ttl * ntpb) / 65_536u128;
    if divisor == 0 {
        return Err(Error::InvalidParameter("target divisor is zero".into()));
    }

    let target = (1u128 << 64) / divisor;
    Ok(target as u64)
}

/// Interpret a target or candidate value as the reference ecosystem does:
/// the raw u64 bit pattern read as a signed i64.
fn as_signed(value: u64) -> i64 {
    value as i64
}

/// Acceptance predicate shared by the search loop and `check_pow`:
/// a trial value passes iff it is non-negative and does not exceed target.
fn passes(value: i64, target: i64) -> bool {
    value >= 0 && value <= target
}

/// Compute the trial value for nonce `n` over hash `h` (first 8 bytes,
/// big-endian, of `SHA-512(SHA-512(n_be_u64 || h))`).
fn trial_value(nonce: u64, payload_hash: &[u8; 64]) -> i64 {
    let mut buf = Vec::with_capacity(8 + 64);
    buf.extend_from_slice(&nonce.to_be_bytes());
    buf.extend_from_slice(payload_hash);
    let digest = double_sha512(&buf);
    let mut first8 = [0u8; 8];
    first8.copy_from_slice(&digest[..8]);
    as_signed(u64::from_be_bytes(first8))
}

/// Cooperative cancellation handle for a running PoW search.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How many nonces a single worker tries before checking the cancel flag.
const BATCH_SIZE: u64 = 65_536;

/// Search for the smallest nonce `n` such that `trial_value(n, H) <= target`
/// (and `>= 0`), where `H = SHA-512(payload)`.
///
/// `workers` disjoint nonce ranges are searched in parallel (one thread per
/// worker, `workers = 0` defaults to `std::thread::available_parallelism`);
/// the first nonce found by any worker wins and the rest are cancelled.
pub fn do_pow(
    payload: &[u8],
    expiration_time: i64,
    now: i64,
    nonce_trials_per_byte: u64,
    extra_bytes: u64,
    workers: usize,
    cancel: &CancelToken,
) -> Result<u64> {
    let target = get_target(
        payload.len(),
        nonce_trials_per_byte,
        extra_bytes,
        expiration_time,
        now,
    )?;
    let signed_target = as_signed(target);
    let payload_hash = double_sha512(payload);

    let worker_count = if workers == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        workers
    };

    std::thread::scope(|scope| {
        let found: Arc<std::sync::Mutex<Option<u64>>> = Arc::new(std::sync::Mutex::new(None));
        let mut handles = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let found = Arc::clone(&found);
            let cancel = cancel.clone();
            let payload_hash = payload_hash;
            handles.push(scope.spawn(move || {
                let mut nonce = worker_id as u64;
                loop {
                    for _ in 0..BATCH_SIZE {
                        if passes(trial_value(nonce, &payload_hash), signed_target) {
                            let mut guard = found.lock().unwrap();
                            if guard.is_none() {
                                *guard = Some(nonce);
                            }
                            cancel.cancel();
                            return;
                        }
                        nonce = nonce.wrapping_add(worker_count as u64);
                    }
                    if cancel.is_cancelled() {
                        return;
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.join();
        }

        found
            .lock()
            .unwrap()
            .take()
            .ok_or(Error::Cancelled)
    })
}

/// Verify that `candidate_nonce` satisfies the PoW target for `payload`.
///
/// Fails with `Malformed` when `payload` is shorter than a valid object
/// header (8-byte nonce prefix); matches `spec.md`'s `checkPOW` contract.
pub fn check_pow(
    payload: &[u8],
    candidate_nonce: u64,
    expiration_time: i64,
    now: i64,
    nonce_trials_per_byte: u64,
    extra_bytes: u64,
) -> Result<bool> {
    if payload.len() < 8 {
        return Err(Error::Malformed(
            "payload shorter than the minimum object header".into(),
        ));
    }

    let target = get_target(
        payload.len(),
        nonce_trials_per_byte,
        extra_bytes,
        expiration_time,
        now,
    )?;
    let payload_hash = double_sha512(payload);
    let value = trial_value(candidate_nonce, &payload_hash);
    Ok(passes(value, as_signed(target)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// spec.md §8 scenario 1, recomputed under the formula's own
    /// integer-floor semantics (see DESIGN.md for why this value differs
    /// from the arithmetic shown inline in spec.md).
    #[test]
    fn target_example_bit_exact() {
        let target = get_target(1000, 1000, 1000, 300, 0).unwrap();
        assert_eq!(target, 9_181_344_432_714);
    }

    #[test]
    fn min_ttl_clamp() {
        // expiration_time = now - 10 => effective TTL clamped to 300
        let clamped = get_target(1000, 1000, 1000, -10, 0).unwrap();
        let direct = get_target(1000, 1000, 1000, 300, 0).unwrap();
        assert_eq!(clamped, direct);
    }

    #[test]
    fn zero_ntpb_is_invalid_parameter() {
        assert!(matches!(
            get_target(100, 0, 1000, 600, 0),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn zero_extra_bytes_is_invalid_parameter() {
        assert!(matches!(
            get_target(100, 1000, 0, 600, 0),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn target_monotonicity_ntpb() {
        let base = get_target(1000, 1000, 1000, 600, 0).unwrap();
        let harder = get_target(1000, 2000, 1000, 600, 0).unwrap();
        assert!(harder < base);
    }

    #[test]
    fn target_monotonicity_extra_bytes() {
        let base = get_target(1000, 1000, 1000, 600, 0).unwrap();
        let harder = get_target(1000, 1000, 2000, 600, 0).unwrap();
        assert!(harder < base);
    }

    #[test]
    fn target_monotonicity_length() {
        let base = get_target(1000, 1000, 1000, 600, 0).unwrap();
        let harder = get_target(5000, 1000, 1000, 600, 0).unwrap();
        assert!(harder < base);
    }

    #[test]
    fn target_monotonicity_ttl() {
        let base = get_target(1000, 1000, 1000, 600, 0).unwrap();
        let harder = get_target(1000, 1000, 1000, 6000, 0).unwrap();
        assert!(harder < base);
    }

    #[test]
    fn pow_round_trip_small_payload() {
        let payload = b"hello bitmessage network object";
        let now = 0;
        let expiry = now + 3600;
        let cancel = CancelToken::new();
        let nonce = do_pow(payload, expiry, now, 1000, 1000, 1, &cancel).unwrap();
        assert!(check_pow(payload, nonce, expiry, now, 1000, 1000).unwrap());
    }

    #[test]
    fn check_pow_rejects_short_payload() {
        let short = [0u8; 4];
        assert!(matches!(
            check_pow(&short, 0, 3600, 0, 1000, 1000),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn boundary_target_passes_target_plus_one_fails() {
        // spec.md §8 scenario 1 edge case: a nonce whose value equals the
        // target passes; target+1 fails.
        let target: i64 = 9_181_344_432_714;
        assert!(passes(target, target));
        assert!(!passes(target + 1, target));
        assert!(!passes(-1, target));
    }

    #[test]
    fn multi_worker_search_agrees_with_single_worker() {
        let payload = b"parallel search payload";
        let now = 0;
        let expiry = now + 3600;
        let cancel_one = CancelToken::new();
        let cancel_many = CancelToken::new();
        let nonce_one = do_pow(payload, expiry, now, 2000, 1000, 1, &cancel_one).unwrap();
        let nonce_many = do_pow(payload, expiry, now, 2000, 1000, 4, &cancel_many).unwrap();
        assert!(check_pow(payload, nonce_one, expiry, now, 2000, 1000).unwrap());
        assert!(check_pow(payload, nonce_many, expiry, now, 2000, 1000).unwrap());
    }
}
