//! Persistence contract over the shared data model (spec.md §6).

use crate::error::StorageError;
use bm_core::{Address, Id, IdentityKeyMaterial, Message, Payload, Pubkey, QueueRecord, TaskKind};

pub type Result<T> = std::result::Result<T, StorageError>;

/// Narrow persistence contract the engine depends on (spec.md §1: "does not
/// specify record store internals beyond a narrow trait contract").
pub trait Store: Send + Sync {
    fn get_address(&self, id: Id) -> Result<Option<Address>>;
    fn put_address(&self, address: &Address) -> Result<()>;

    /// EC key material for a local "mine" address (spec.md §9: the engine
    /// is a value constructed from explicit store/crypto handles, never a
    /// hidden global; the keys live in the store like everything else).
    fn get_identity_keys(&self, address_id: Id) -> Result<Option<IdentityKeyMaterial>>;
    fn put_identity_keys(&self, keys: &IdentityKeyMaterial) -> Result<()>;

    /// Returns an arbitrary matching pubkey (spec.md §4.6 step 1: "if ≥1
    /// hit, return the first"). Use [`Store::list_pubkeys_by_ripe`] when the
    /// caller must see every pubkey sharing a ripe-hash, e.g. to enforce the
    /// at-most-one-per-ripe invariant.
    fn get_pubkey_by_ripe(&self, ripe: &[u8; 20]) -> Result<Option<Pubkey>>;
    /// Every pubkey currently stored under `ripe`, in arbitrary order.
    fn list_pubkeys_by_ripe(&self, ripe: &[u8; 20]) -> Result<Vec<Pubkey>>;
    fn put_pubkey(&self, pubkey: &Pubkey) -> Result<()>;
    fn delete_pubkey(&self, id: Id) -> Result<()>;
    /// Every pubkey in the store, for periodic maintenance scans (resend
    /// check, duplicate collapse).
    fn list_pubkeys(&self) -> Result<Vec<Pubkey>>;

    fn get_payload(&self, id: Id) -> Result<Option<Payload>>;
    fn put_payload(&self, payload: &Payload) -> Result<()>;
    fn delete_payload(&self, id: Id) -> Result<()>;
    /// Every payload in the store, for the periodic pubkey-resend scan.
    fn list_payloads(&self) -> Result<Vec<Payload>>;

    fn get_message(&self, id: Id) -> Result<Option<Message>>;
    fn put_message(&self, message: &Message) -> Result<()>;
    /// Every message in the store, for the inbound-ack matching scan.
    fn list_messages(&self) -> Result<Vec<Message>>;

    /// Every address with a non-empty label ("mine"), for periodic
    /// maintenance scans.
    fn list_addresses(&self) -> Result<Vec<Address>>;

    fn get_queue_records_due(&self, now: i64) -> Result<Vec<QueueRecord>>;
    fn put_queue_record(&self, record: &QueueRecord) -> Result<()>;
    fn delete_queue_record(&self, id: Id) -> Result<()>;
    fn queue_records_for(&self, task: TaskKind, object0: Option<Id>) -> Result<Vec<QueueRecord>>;
    /// Every live queue record, for the deduplication scan (spec.md §4.7).
    fn list_queue_records(&self) -> Result<Vec<QueueRecord>>;
}
