//! Crate-wide error type for the object lifecycle engine

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Object lifecycle engine error kinds (spec.md §7)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Wire parse failure: truncated field, var-int overrun, field out of range
    #[error("malformed object: {0}")]
    Malformed(String),

    /// Bad proof-of-work input (zero nonce_trials_per_byte or extra_bytes)
    #[error("invalid PoW parameter: {0}")]
    InvalidParameter(String),

    /// Address string failed checksum or carries an unknown version
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Pubkey failed the ripe-hash or signature validation invariant
    #[error("invalid pubkey: {0}")]
    InvalidPubkey(String),

    /// ECIES envelope MAC did not verify
    #[error("decryption failed: MAC mismatch")]
    DecryptFailed,

    /// Ephemeral key did not reconstruct on the configured curve
    #[error("key mismatch: {0}")]
    KeyMismatch(String),

    /// Gateway request failed or timed out
    #[error("network error: {0}")]
    NetworkError(String),

    /// Gateway returned no object for the request
    #[error("not found")]
    NotFound,

    /// PoW search was cancelled before a nonce was found
    #[error("cancelled")]
    Cancelled,

    /// Local store operation failed
    #[error("store error: {0}")]
    StoreError(String),

    /// Candidate nonce did not satisfy the PoW target
    #[error("proof of work insufficient")]
    PoWInsufficient,
}
