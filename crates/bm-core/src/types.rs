//! Shared data model: Address, Pubkey, Payload, Message, QueueRecord (spec.md §3)

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Local store primary key. The engine holds these by value, never by
/// ownership pointer (spec.md §9: "resolved with integer ids").
pub type Id = u64;

/// A local identity or a resolved peer address.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub id: Id,
    pub version: u64,
    pub stream: u64,
    pub ripe: [u8; 20],
    pub address_string: String,
    /// v4+ gateway lookup tag, `None` for version < 4.
    pub tag: Option<[u8; 32]>,
    /// v4+ ECDH private-key seed, `None` for version < 4.
    pub private_key_seed: Option<[u8; 32]>,
    /// User-facing label; empty for addresses that aren't "mine".
    pub label: String,
}

/// Raw EC key material backing a local "mine" `Address` (spec.md §1 treats
/// the curve primitives themselves as an external collaborator; this is
/// just the at-rest shape the engine asks the local store to hold on its
/// behalf, keyed by `Address::id`, so `create-identity` and
/// `process-outgoing-message` have something to sign and decrypt with).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityKeyMaterial {
    pub address_id: Id,
    pub signing_secret: [u8; 32],
    /// 65-byte uncompressed point.
    pub signing_public: Vec<u8>,
    pub encryption_secret: [u8; 32],
    /// 65-byte uncompressed point.
    pub encryption_public: Vec<u8>,
}

/// A peer's (or our own) public signing/encryption keys and PoW proof.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pubkey {
    pub id: Id,
    pub address_version: u64,
    pub stream: u64,
    pub behaviour_bitfield: u32,
    /// 65-byte uncompressed public signing key.
    pub public_signing_key: Vec<u8>,
    /// 65-byte uncompressed public encryption key.
    pub public_encryption_key: Vec<u8>,
    pub nonce_trials_per_byte: u64,
    pub extra_bytes: u64,
    /// Absent for version <= 2.
    pub signature: Option<Vec<u8>>,
    pub pow_nonce: u64,
    pub time: i64,
    pub ripe: [u8; 20],
    /// Set when this pubkey belongs to a local `Address` (the "mine" flag).
    pub address_id: Option<Id>,
}

/// Object type tag carried by a `Payload`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Pubkey,
    Msg,
    Ack,
    GetPubkey,
}

/// An opaque, fully encoded wire object plus its lifecycle bookkeeping.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payload {
    pub id: Id,
    pub object_type: ObjectType,
    pub bytes: Vec<u8>,
    pub expiration_time: i64,
    /// Originating local `Address`, if any.
    pub address_id: Option<Id>,
    pub pow_done: bool,
}

impl Payload {
    pub fn remaining_ttl(&self, now: i64) -> i64 {
        self.expiration_time - now
    }
}

/// Delivery status of an outgoing `Message`, mirrored to the UI.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageStatus {
    Draft,
    Queued,
    Sending,
    WaitingForAck,
    Failed,
    Delivered,
}

/// A plaintext message the orchestrator drives to delivery (or failure).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: Id,
    pub subject: String,
    pub body: String,
    pub sender_address_id: Id,
    pub recipient_address: String,
    pub status: MessageStatus,
    /// Acknowledgement identifier expected back from the recipient.
    pub ack_id: Option<[u8; 32]>,
}

/// Work-queue task kinds (spec.md §4.7's table).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskKind {
    CreateIdentity,
    DisseminatePubkey,
    SendMessage,
    ProcessOutgoingMessage,
    DisseminateMessage,
}

/// Whether a `QueueRecord` is the first attempt at its task or a retry;
/// drives which TTL constant applies (spec.md §4.7's TTL strategy).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Generation {
    First,
    Subsequent,
}

impl Generation {
    pub fn from_attempts(attempts: u32) -> Self {
        if attempts == 0 {
            Generation::First
        } else {
            Generation::Subsequent
        }
    }
}

/// A durable unit of outbound work. Invariant (spec.md §3): for a given
/// `(task, object0)` pair at most two live records exist, at most one per
/// generation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueRecord {
    pub id: Id,
    pub task: TaskKind,
    pub trigger_time: i64,
    pub attempts: u32,
    pub generation: Generation,
    pub object0: Option<Id>,
    pub object1: Option<Id>,
    pub object2: Option<Id>,
}

impl QueueRecord {
    pub fn is_due(&self, now: i64) -> bool {
        self.trigger_time <= now
    }
}

impl PartialOrd for QueueRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueRecord {
    /// QueueRecords compare by trigger-time ascending (spec.md §3).
    fn cmp(&self, other: &Self) -> Ordering {
        self.trigger_time.cmp(&other.trigger_time)
    }
}
