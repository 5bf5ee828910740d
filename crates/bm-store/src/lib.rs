//! Persistent storage for addresses, pubkeys, payloads, messages, and the work queue.

pub mod error;
pub mod sled_store;
pub mod store;

pub use error::StorageError;
pub use sled_store::SledStore;
pub use store::Store;
