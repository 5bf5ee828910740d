//! `sled`-backed implementation of the [`Store`] trait.

use crate::error::StorageError;
use crate::store::{Result, Store};
use bm_core::{Address, Id, IdentityKeyMaterial, Message, Payload, Pubkey, QueueRecord, TaskKind};
use sled::Db;
use std::path::Path;

pub struct SledStore {
    db: Db,
    addresses: sled::Tree,
    identity_keys: sled::Tree,
    pubkeys: sled::Tree,
    /// Secondary index: ripe(20 bytes) -> pubkey id.
    pubkeys_by_ripe: sled::Tree,
    payloads: sled::Tree,
    messages: sled::Tree,
    queue: sled::Tree,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            addresses: db.open_tree("addresses")?,
            identity_keys: db.open_tree("identity_keys")?,
            pubkeys: db.open_tree("pubkeys")?,
            pubkeys_by_ripe: db.open_tree("pubkeys_by_ripe")?,
            payloads: db.open_tree("payloads")?,
            messages: db.open_tree("messages")?,
            queue: db.open_tree("queue")?,
            db,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Monotonic id allocator for every entity this store holds; `sled`
    /// already persists a counter for exactly this purpose, so the engine's
    /// "mints ids for a queue record the driver itself enqueues" need has no
    /// bookkeeping of its own to get wrong.
    pub fn next_id(&self) -> Result<Id> {
        Ok(self.db.generate_id()?)
    }
}

fn key(id: Id) -> [u8; 8] {
    id.to_be_bytes()
}

fn get_typed<T: serde::de::DeserializeOwned>(
    tree: &sled::Tree,
    id: Id,
) -> Result<Option<T>> {
    match tree.get(key(id))? {
        Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
        None => Ok(None),
    }
}

fn put_typed<T: serde::Serialize>(tree: &sled::Tree, id: Id, value: &T) -> Result<()> {
    let bytes = postcard::to_allocvec(value)?;
    tree.insert(key(id), bytes)?;
    Ok(())
}

impl Store for SledStore {
    fn get_address(&self, id: Id) -> Result<Option<Address>> {
        get_typed(&self.addresses, id)
    }

    fn put_address(&self, address: &Address) -> Result<()> {
        put_typed(&self.addresses, address.id, address)
    }

    fn get_identity_keys(&self, address_id: Id) -> Result<Option<IdentityKeyMaterial>> {
        get_typed(&self.identity_keys, address_id)
    }

    fn put_identity_keys(&self, keys: &IdentityKeyMaterial) -> Result<()> {
        put_typed(&self.identity_keys, keys.address_id, keys)
    }

    fn get_pubkey_by_ripe(&self, ripe: &[u8; 20]) -> Result<Option<Pubkey>> {
        Ok(self.list_pubkeys_by_ripe(ripe)?.into_iter().next())
    }

    fn list_pubkeys_by_ripe(&self, ripe: &[u8; 20]) -> Result<Vec<Pubkey>> {
        let mut matches = Vec::new();
        for entry in self.pubkeys_by_ripe.scan_prefix(ripe) {
            let (composite_key, _) = entry?;
            let id_bytes = &composite_key[20..];
            let id = u64::from_be_bytes(id_bytes.try_into().map_err(|_| StorageError::PubkeyNotFound)?);
            if let Some(pubkey) = get_typed::<Pubkey>(&self.pubkeys, id)? {
                matches.push(pubkey);
            }
        }
        Ok(matches)
    }

    fn put_pubkey(&self, pubkey: &Pubkey) -> Result<()> {
        put_typed(&self.pubkeys, pubkey.id, pubkey)?;
        let mut composite_key = pubkey.ripe.to_vec();
        composite_key.extend_from_slice(&key(pubkey.id));
        self.pubkeys_by_ripe.insert(composite_key, &[])?;
        Ok(())
    }

    fn delete_pubkey(&self, id: Id) -> Result<()> {
        if let Some(pubkey) = get_typed::<Pubkey>(&self.pubkeys, id)? {
            let mut composite_key = pubkey.ripe.to_vec();
            composite_key.extend_from_slice(&key(id));
            self.pubkeys_by_ripe.remove(composite_key)?;
        }
        self.pubkeys.remove(key(id))?;
        Ok(())
    }

    fn list_pubkeys(&self) -> Result<Vec<Pubkey>> {
        let mut all = Vec::new();
        for entry in self.pubkeys.iter() {
            let (_, bytes) = entry?;
            all.push(postcard::from_bytes(&bytes)?);
        }
        Ok(all)
    }

    fn list_addresses(&self) -> Result<Vec<Address>> {
        let mut all = Vec::new();
        for entry in self.addresses.iter() {
            let (_, bytes) = entry?;
            let address: Address = postcard::from_bytes(&bytes)?;
            if !address.label.is_empty() {
                all.push(address);
            }
        }
        Ok(all)
    }

    fn get_payload(&self, id: Id) -> Result<Option<Payload>> {
        get_typed(&self.payloads, id)
    }

    fn put_payload(&self, payload: &Payload) -> Result<()> {
        put_typed(&self.payloads, payload.id, payload)
    }

    fn delete_payload(&self, id: Id) -> Result<()> {
        self.payloads.remove(key(id))?;
        Ok(())
    }

    fn list_payloads(&self) -> Result<Vec<Payload>> {
        let mut all = Vec::new();
        for entry in self.payloads.iter() {
            let (_, bytes) = entry?;
            all.push(postcard::from_bytes(&bytes)?);
        }
        Ok(all)
    }

    fn get_message(&self, id: Id) -> Result<Option<Message>> {
        get_typed(&self.messages, id)
    }

    fn put_message(&self, message: &Message) -> Result<()> {
        put_typed(&self.messages, message.id, message)
    }

    fn list_messages(&self) -> Result<Vec<Message>> {
        let mut all = Vec::new();
        for entry in self.messages.iter() {
            let (_, bytes) = entry?;
            all.push(postcard::from_bytes(&bytes)?);
        }
        Ok(all)
    }

    fn get_queue_records_due(&self, now: i64) -> Result<Vec<QueueRecord>> {
        let mut due = Vec::new();
        for entry in self.queue.iter() {
            let (_, bytes) = entry?;
            let record: QueueRecord = postcard::from_bytes(&bytes)?;
            if record.is_due(now) {
                due.push(record);
            }
        }
        due.sort();
        Ok(due)
    }

    fn put_queue_record(&self, record: &QueueRecord) -> Result<()> {
        put_typed(&self.queue, record.id, record)
    }

    fn delete_queue_record(&self, id: Id) -> Result<()> {
        self.queue.remove(key(id))?;
        Ok(())
    }

    fn queue_records_for(&self, task: TaskKind, object0: Option<Id>) -> Result<Vec<QueueRecord>> {
        let mut matching = Vec::new();
        for entry in self.queue.iter() {
            let (_, bytes) = entry?;
            let record: QueueRecord = postcard::from_bytes(&bytes)?;
            if record.task == task && record.object0 == object0 {
                matching.push(record);
            }
        }
        Ok(matching)
    }

    fn list_queue_records(&self) -> Result<Vec<QueueRecord>> {
        let mut all = Vec::new();
        for entry in self.queue.iter() {
            let (_, bytes) = entry?;
            all.push(postcard::from_bytes(&bytes)?);
        }
        Ok(all)
    }
}
