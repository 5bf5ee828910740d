//! Core types, wire codec primitives, proof-of-work, and address algebra
//! for the bitmessage-rs object lifecycle engine.
//!
//! # Modules
//!
//! - [`varint`]: var-int / fixed-width integer wire codec
//! - [`hash`]: SHA-512 / RIPEMD-160 hashing adapter
//! - [`pow`]: proof-of-work target computation, search, and verification
//! - [`address`]: address string encode/decode and v4+ tag/key derivation
//! - [`types`]: Address, Pubkey, Payload, Message, QueueRecord
//! - [`error`]: crate-wide error type

pub mod address;
pub mod error;
pub mod hash;
pub mod pow;
pub mod types;
pub mod varint;

pub use error::{Error, Result};
pub use types::*;
