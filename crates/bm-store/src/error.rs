//! Storage error type (spec.md §7: a leaf error that converts into
//! `bm_core::Error` at the orchestrator boundary).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] postcard::Error),
    #[error("address not found: {0}")]
    AddressNotFound(u64),
    #[error("pubkey not found for ripe")]
    PubkeyNotFound,
    #[error("payload not found: {0}")]
    PayloadNotFound(u64),
    #[error("message not found: {0}")]
    MessageNotFound(u64),
}

impl From<StorageError> for bm_core::Error {
    fn from(value: StorageError) -> Self {
        bm_core::Error::StoreError(value.to_string())
    }
}
