//! Periodic Driver (spec.md §4.8): the single wall-clock-triggered entry
//! point. Drains due queue records, pulls inbound objects and applies acks,
//! triggers the external database-cleaning collaborator on its own cadence,
//! keeps locally-owned pubkeys from going stale on the network, and
//! collapses any stored pubkeys that share a ripe-hash (spec.md §8
//! scenario 6).
//!
//! The at-rest encryption key wrapper and the database cleaner are external
//! collaborators (spec.md §1); the driver decides *when* to call them and
//! takes a closure for each rather than owning them.

use crate::claim::ClaimSet;
use crate::config::EngineConfig;
use crate::gateway::Gateway;
use crate::orchestrator::{self, TickReport};
use crate::queue;
use bm_core::{Error, Generation, Id, ObjectType, QueueRecord, Result, TaskKind};
use bm_object::CryptoProvider;
use bm_store::Store;

/// Outcome of one [`Driver::tick`], surfaced for logging; spec.md names the
/// steps, not a return type, so this is purely observability.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriverEvent {
    pub tick: TickReport,
    pub aborted_for_at_rest_key: bool,
    pub messages_polled: usize,
    pub acks_applied: usize,
    pub database_cleaned: bool,
    pub pubkeys_resent: usize,
    pub pubkeys_deduped: usize,
}

/// Drives the engine forward on each external wakeup.
///
/// Holds only the scheduling state named in spec.md §4.8 (when maintenance
/// last ran); every durable fact lives in the store, as everywhere else in
/// this engine.
pub struct Driver {
    last_message_poll: i64,
    last_database_clean: i64,
    claims: ClaimSet,
}

impl Driver {
    pub fn new() -> Self {
        Self {
            last_message_poll: 0,
            last_database_clean: 0,
            claims: ClaimSet::new(),
        }
    }

    /// Runs one maintenance cycle: spec.md §4.8's five steps, plus the
    /// periodic pubkey-dedup sweep spec.md §8 scenario 6 requires.
    ///
    /// `data_at_rest_key_available` and `clean_database` are the external
    /// collaborators named in spec.md §1; `next_id` mints ids for any queue
    /// record the driver itself enqueues (pubkey resend).
    pub async fn tick<S, G>(
        &mut self,
        store: &S,
        gateway: &G,
        crypto: &dyn CryptoProvider,
        config: &EngineConfig,
        now: i64,
        next_id: &(dyn Fn() -> Id + Sync),
        data_at_rest_key_available: impl FnOnce() -> bool,
        clean_database: impl FnOnce(),
    ) -> Result<DriverEvent>
    where
        S: Store,
        G: Gateway,
    {
        if !data_at_rest_key_available() {
            tracing::warn!("data-at-rest key unavailable, rescheduling tick");
            return Ok(DriverEvent {
                aborted_for_at_rest_key: true,
                ..DriverEvent::default()
            });
        }

        let tick =
            orchestrator::run_tick(store, gateway, crypto, config, now, next_id, &self.claims)
                .await?;

        let (messages_polled, acks_applied) = if now - self.last_message_poll
            >= config.minimum_time_behind_network
        {
            let counts = self.poll_inbound(store, gateway).await?;
            self.last_message_poll = now;
            counts
        } else {
            (0, 0)
        };

        let database_cleaned = if now - self.last_database_clean
            >= config.time_between_database_cleaning
        {
            clean_database();
            self.last_database_clean = now;
            true
        } else {
            false
        };

        let pubkeys_resent = self.resend_stale_pubkeys(store, config, now, next_id)?;
        let pubkeys_deduped = queue::dedup_stored_pubkeys(store)?;

        Ok(DriverEvent {
            tick,
            aborted_for_at_rest_key: false,
            messages_polled,
            acks_applied,
            database_cleaned,
            pubkeys_resent,
            pubkeys_deduped,
        })
    }

    /// Step 3: poll every local address' inbound queue until the gateway
    /// returns nothing new. An inbound blob is either a 32-byte acknowledgement
    /// id (spec.md §4.7 "Ack handling") or an encoded object; full inbound
    /// message reception (decrypt, store, reply with an ack) belongs to a
    /// received-message model this engine does not carry (see DESIGN.md), so
    /// anything else is logged and dropped.
    async fn poll_inbound<S, G>(&self, store: &S, gateway: &G) -> Result<(usize, usize)>
    where
        S: Store,
        G: Gateway,
    {
        let mut polled = 0;
        let mut acked = 0;
        for address in store
            .list_addresses()
            .map_err(|e| Error::StoreError(e.to_string()))?
        {
            loop {
                let batch = gateway
                    .get_messages_since(&address.address_string, self.last_message_poll)
                    .await
                    .map_err(|e| Error::NetworkError(e.to_string()))?;
                if batch.is_empty() {
                    break;
                }
                for blob in &batch {
                    polled += 1;
                    match <[u8; 32]>::try_from(blob.as_slice()) {
                        Ok(ack_id) => match ack_id_to_message_id(store, &ack_id) {
                            Ok(message_id) => {
                                queue::handle_ack(store, message_id)?;
                                acked += 1;
                            }
                            Err(Error::NotFound) => tracing::warn!(
                                address = %address.address_string,
                                "ack did not match any pending message"
                            ),
                            Err(e) => return Err(e),
                        },
                        Err(_) => tracing::warn!(
                            address = %address.address_string,
                            len = blob.len(),
                            "dropped inbound object with no received-message handler"
                        ),
                    }
                }
            }
        }
        Ok((polled, acked))
    }

    /// Step 5: a local address is stale if it was never disseminated, or
    /// last was ≥`pubkey_resend_interval` ago; re-run create-identity for it,
    /// which produces a fresh object (and PoW) and re-enqueues dissemination.
    /// A pubkey payload's own wire TTL (≤`subsequent_attempts_ttl`, at most a
    /// day) is always far shorter than the resend interval (28 days), so a
    /// payload old enough to need resending is always already past its own
    /// network validity — there is never a "re-disseminate this exact
    /// payload" case here, only "mint a new one".
    fn resend_stale_pubkeys<S: Store>(
        &self,
        store: &S,
        config: &EngineConfig,
        now: i64,
        next_id: &(dyn Fn() -> Id + Sync),
    ) -> Result<usize> {
        let mut resent = 0;
        for address in store
            .list_addresses()
            .map_err(|e| Error::StoreError(e.to_string()))?
        {
            let newest = store
                .list_payloads()
                .map_err(|e| Error::StoreError(e.to_string()))?
                .into_iter()
                .filter(|p| p.object_type == ObjectType::Pubkey && p.address_id == Some(address.id))
                .max_by_key(|p| p.expiration_time);

            // Creation time is always derived with the first-attempt TTL:
            // create-identity always runs with attempts == 0, whether it is
            // the initial creation or a later regeneration.
            let disseminated_at = newest.map(|p| p.expiration_time - config.first_attempt_ttl);
            let stale = match disseminated_at {
                Some(at) => now - at >= config.pubkey_resend_interval,
                None => true,
            };
            if !stale {
                continue;
            }

            enqueue_create_identity(store, address.id, now, next_id)?;
            resent += 1;
        }
        Ok(resent)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

fn enqueue_create_identity<S: Store>(
    store: &S,
    address_id: Id,
    now: i64,
    next_id: &(dyn Fn() -> Id + Sync),
) -> Result<()> {
    let record = QueueRecord {
        id: next_id(),
        task: TaskKind::CreateIdentity,
        trigger_time: now,
        attempts: 0,
        generation: Generation::First,
        object0: Some(address_id),
        object1: None,
        object2: None,
    };
    store
        .put_queue_record(&record)
        .map_err(|e| Error::StoreError(e.to_string()))
}

/// `handle_ack` keys off the `Message` id, so an inbound ack blob (the raw
/// `ack_id` bytes) must first be matched against pending messages'
/// `ack_id` field; `Store` has no secondary index for this, so it scans.
fn ack_id_to_message_id<S: Store>(store: &S, ack_id: &[u8; 32]) -> Result<Id> {
    store
        .list_messages()
        .map_err(|e| Error::StoreError(e.to_string()))?
        .into_iter()
        .find(|message| message.ack_id.as_ref() == Some(ack_id))
        .map(|message| message.id)
        .ok_or(Error::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use bm_core::{Address, IdentityKeyMaterial, Message, MessageStatus, ObjectType, Payload};
    use bm_object::Secp256k1Provider;
    use bm_store::SledStore;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    struct StubGateway {
        messages: Mutex<Vec<Vec<u8>>>,
    }

    impl Gateway for StubGateway {
        async fn get_pubkey_by_tag(&self, _tag: &[u8; 32]) -> Result<Option<Vec<u8>>, GatewayError> {
            Ok(None)
        }

        async fn get_pubkey_by_ripe(
            &self,
            _ripe: &[u8; 20],
        ) -> Result<Option<Vec<u8>>, GatewayError> {
            Ok(None)
        }

        async fn post_object(&self, _object_bytes: &[u8]) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn get_messages_since(
            &self,
            _address: &str,
            _since: i64,
        ) -> Result<Vec<Vec<u8>>, GatewayError> {
            Ok(self.messages.lock().unwrap().drain(..).collect())
        }
    }

    fn id_counter() -> impl Fn() -> Id {
        let counter = AtomicU64::new(1);
        move || counter.fetch_add(1, Ordering::Relaxed)
    }

    fn make_address<S: Store>(store: &S, id: Id, label: &str) -> Address {
        let crypto = Secp256k1Provider::new();
        let signing = crypto.generate_keypair();
        let encryption = crypto.generate_keypair();
        let signing_public = signing.public_key_uncompressed.to_vec();
        let encryption_public = encryption.public_key_uncompressed.to_vec();
        let address = Address {
            id,
            version: 3,
            stream: 1,
            ripe: bm_core::hash::ripe_hash(&signing_public, &encryption_public),
            address_string: format!("BM-test-{id}"),
            tag: None,
            private_key_seed: None,
            label: label.into(),
        };
        store.put_address(&address).unwrap();
        store
            .put_identity_keys(&IdentityKeyMaterial {
                address_id: id,
                signing_secret: signing.secret_key.secret_bytes(),
                signing_public,
                encryption_secret: encryption.secret_key.secret_bytes(),
                encryption_public,
            })
            .unwrap();
        address
    }

    #[tokio::test]
    async fn at_rest_key_gate_aborts_without_touching_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        let crypto = Secp256k1Provider::new();
        let config = EngineConfig::default();
        let gateway = StubGateway {
            messages: Mutex::new(vec![]),
        };
        let address = make_address(&store, 1, "mine");
        enqueue_create_identity(&store, address.id, 1_700_000_000, &id_counter()).unwrap();

        let mut driver = Driver::new();
        let event = driver
            .tick(
                &store,
                &gateway,
                &crypto,
                &config,
                1_700_000_000,
                &id_counter(),
                || false,
                || panic!("database cleaner must not run"),
            )
            .await
            .unwrap();

        assert!(event.aborted_for_at_rest_key);
        assert_eq!(store.list_queue_records().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tick_drains_due_records_and_creates_identity_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        let crypto = Secp256k1Provider::new();
        let mut config = EngineConfig::default();
        config.do_pow = false;
        let gateway = StubGateway {
            messages: Mutex::new(vec![]),
        };
        let address = make_address(&store, 1, "mine");
        enqueue_create_identity(&store, address.id, 1_700_000_000, &id_counter()).unwrap();

        let mut driver = Driver::new();
        let event = driver
            .tick(
                &store,
                &gateway,
                &crypto,
                &config,
                1_700_000_000,
                &id_counter(),
                || true,
                || {},
            )
            .await
            .unwrap();

        assert!(!event.aborted_for_at_rest_key);
        assert_eq!(event.tick.records_processed, 1);
        let records = store.list_queue_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].task, TaskKind::DisseminatePubkey);
    }

    #[tokio::test]
    async fn database_cleaner_runs_only_after_its_interval() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        let crypto = Secp256k1Provider::new();
        let config = EngineConfig::default();
        let gateway = StubGateway {
            messages: Mutex::new(vec![]),
        };

        let mut driver = Driver::new();
        let cleaned_first = std::cell::Cell::new(false);
        let event = driver
            .tick(
                &store,
                &gateway,
                &crypto,
                &config,
                1_000,
                &id_counter(),
                || true,
                || cleaned_first.set(true),
            )
            .await
            .unwrap();
        assert!(event.database_cleaned);
        assert!(cleaned_first.get());

        let event = driver
            .tick(
                &store,
                &gateway,
                &crypto,
                &config,
                1_500,
                &id_counter(),
                || true,
                || panic!("must not clean again before the interval elapses"),
            )
            .await
            .unwrap();
        assert!(!event.database_cleaned);

        let event = driver
            .tick(
                &store,
                &gateway,
                &crypto,
                &config,
                1_000 + config.time_between_database_cleaning,
                &id_counter(),
                || true,
                || {},
            )
            .await
            .unwrap();
        assert!(event.database_cleaned);
    }

    #[tokio::test]
    async fn ack_blob_marks_message_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        let crypto = Secp256k1Provider::new();
        let config = EngineConfig::default();
        let address = make_address(&store, 1, "mine");
        let ack_id = [7u8; 32];
        store
            .put_message(&Message {
                id: address.id,
                subject: "s".into(),
                body: "b".into(),
                sender_address_id: address.id,
                recipient_address: "BM-peer".into(),
                status: MessageStatus::WaitingForAck,
                ack_id: Some(ack_id),
            })
            .unwrap();
        let gateway = StubGateway {
            messages: Mutex::new(vec![ack_id.to_vec()]),
        };

        let mut driver = Driver::new();
        let event = driver
            .tick(
                &store,
                &gateway,
                &crypto,
                &config,
                config.minimum_time_behind_network,
                &id_counter(),
                || true,
                || {},
            )
            .await
            .unwrap();

        assert_eq!(event.messages_polled, 1);
        assert_eq!(event.acks_applied, 1);
        assert_eq!(
            store.get_message(address.id).unwrap().unwrap().status,
            MessageStatus::Delivered
        );
    }

    #[tokio::test]
    async fn stale_pubkey_is_resent_after_the_configured_interval() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        let crypto = Secp256k1Provider::new();
        let config = EngineConfig::default();
        let address = make_address(&store, 1, "mine");
        let gateway = StubGateway {
            messages: Mutex::new(vec![]),
        };

        let created_at = 1_000_000;
        store
            .put_payload(&Payload {
                id: 99,
                object_type: ObjectType::Pubkey,
                bytes: vec![1, 2, 3],
                expiration_time: created_at + config.first_attempt_ttl,
                address_id: Some(address.id),
                pow_done: true,
            })
            .unwrap();

        let mut driver = Driver::new();
        let still_fresh = created_at + config.pubkey_resend_interval - 10;
        let event = driver
            .tick(
                &store,
                &gateway,
                &crypto,
                &config,
                still_fresh,
                &id_counter(),
                || true,
                || {},
            )
            .await
            .unwrap();
        assert_eq!(event.pubkeys_resent, 0);

        let now_stale = created_at + config.pubkey_resend_interval + 10;
        let event = driver
            .tick(
                &store,
                &gateway,
                &crypto,
                &config,
                now_stale,
                &id_counter(),
                || true,
                || {},
            )
            .await
            .unwrap();
        assert_eq!(event.pubkeys_resent, 1);
        let records = store.list_queue_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].task, TaskKind::CreateIdentity);
        assert_eq!(records[0].object0, Some(address.id));
    }

    #[tokio::test]
    async fn periodic_tick_collapses_duplicate_pubkeys_to_the_newest() {
        use bm_core::Pubkey;

        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        let crypto = Secp256k1Provider::new();
        let config = EngineConfig::default();
        let gateway = StubGateway {
            messages: Mutex::new(vec![]),
        };
        let ripe = [7u8; 20];

        let older = Pubkey {
            id: 1,
            address_version: 2,
            stream: 1,
            behaviour_bitfield: 0,
            public_signing_key: vec![1; 64],
            public_encryption_key: vec![2; 64],
            nonce_trials_per_byte: 320,
            extra_bytes: 14_000,
            signature: None,
            pow_nonce: 0,
            time: 1000,
            ripe,
            address_id: None,
        };
        let mut newer = older.clone();
        newer.id = 2;
        newer.time = 2000;
        store.put_pubkey(&older).unwrap();
        store.put_pubkey(&newer).unwrap();

        let mut driver = Driver::new();
        let event = driver
            .tick(
                &store,
                &gateway,
                &crypto,
                &config,
                0,
                &id_counter(),
                || true,
                || {},
            )
            .await
            .unwrap();

        assert_eq!(event.pubkeys_deduped, 1);
        let remaining = store.list_pubkeys_by_ripe(&ripe).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, 2);
    }
}
