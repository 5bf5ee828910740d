//! Queue & Orchestrator (spec.md §4.7): drives each of the five task kinds
//! through its state machine, calling the Object Codec, PoW Engine, and
//! Crypto Envelope, then the `Gateway`/`Store` collaborators.
//!
//! One tick = drain every due `QueueRecord` in trigger-time order, dispatch
//! each to its task handler, and run the deduplication pass (spec.md §4.7's
//! "Deduplication") once at the end. A handler either commits its own
//! success-path state transition (and deletes its own record) or returns an
//! `Err`, in which case the tick applies the generic failure policy:
//! increment attempts, push the trigger-time out by the appropriate TTL,
//! and drop the record (marking its `Message` failed) past the attempt cap
//! (spec.md §5, §8 "Attempt cap").

use crate::claim::ClaimSet;
use crate::config::EngineConfig;
use crate::gateway::Gateway;
use crate::queue;
use crate::resolver;
use bm_core::{
    address, hash, Address, Error, Generation, Id, MessageStatus, ObjectType, Payload, Pubkey,
    QueueRecord, Result, TaskKind,
};
use bm_object::codec::{self, MsgInner, MsgObject, PubkeyInner, PubkeyObject};
use bm_object::{envelope, CryptoProvider};
use bm_store::Store;

/// Plaintext wire encoding used for a message body (subject + body, the
/// "simple" encoding the reference network calls encoding type 2).
const ENCODING_SIMPLE: u64 = 2;

/// Summary of one orchestrator tick, surfaced to the Periodic Driver for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub records_processed: usize,
}

/// Drain every due queue record and advance its state machine (spec.md §4.7).
pub async fn run_tick<S, G>(
    store: &S,
    gateway: &G,
    crypto: &dyn CryptoProvider,
    config: &EngineConfig,
    now: i64,
    next_id: &(dyn Fn() -> Id + Sync),
    claims: &ClaimSet,
) -> Result<TickReport>
where
    S: Store,
    G: Gateway,
{
    let due = store
        .get_queue_records_due(now)
        .map_err(|e| Error::StoreError(e.to_string()))?;

    let mut records_processed = 0;
    for record in due {
        let Some(_guard) = claims.try_claim(record.id) else {
            tracing::debug!(record_id = record.id, "record already claimed, skipping");
            continue;
        };
        if queue::enforce_attempt_cap(store, &record, config)? {
            continue;
        }
        process_record(store, gateway, crypto, config, record, now, next_id).await?;
        records_processed += 1;
    }

    queue::enforce_uniqueness(store, config)?;
    Ok(TickReport { records_processed })
}

async fn process_record<S, G>(
    store: &S,
    gateway: &G,
    crypto: &dyn CryptoProvider,
    config: &EngineConfig,
    record: QueueRecord,
    now: i64,
    next_id: &(dyn Fn() -> Id + Sync),
) -> Result<()>
where
    S: Store,
    G: Gateway,
{
    let outcome = match record.task {
        TaskKind::CreateIdentity => {
            handle_create_identity(store, crypto, config, &record, now, next_id).await
        }
        TaskKind::DisseminatePubkey => {
            handle_disseminate_pubkey(store, gateway, config, &record, now, next_id).await
        }
        TaskKind::SendMessage => {
            handle_send_message(store, gateway, crypto, config, &record, now, next_id).await
        }
        TaskKind::ProcessOutgoingMessage => {
            handle_process_outgoing_message(store, crypto, config, &record, now, next_id).await
        }
        TaskKind::DisseminateMessage => {
            handle_disseminate_message(store, gateway, config, &record, now, next_id).await
        }
    };

    match outcome {
        // The handler already committed its own state transition (including
        // deleting or replacing `record`).
        Ok(HandlerOutcome::Handled) => Ok(()),
        Err(error) => {
            // spec.md §7: parse/crypto errors are local and never kill the
            // engine; network/store errors bump the attempt count.
            tracing::warn!(
                record_id = record.id,
                task = ?record.task,
                %error,
                "queue record attempt failed, scheduling retry"
            );
            let mut retry = record;
            queue::schedule_retry(&mut retry, now, config);
            if !queue::enforce_attempt_cap(store, &retry, config)? {
                store
                    .put_queue_record(&retry)
                    .map_err(|e| Error::StoreError(e.to_string()))?;
            }
            Ok(())
        }
    }
}

/// Marker returned by every handler that fully committed its own success or
/// expiry-driven transition, so `process_record` knows not to reapply the
/// generic retry policy on top.
enum HandlerOutcome {
    Handled,
}

fn missing_referent(store_error_context: &str, record: &QueueRecord) -> HandlerOutcome {
    tracing::warn!(
        record_id = record.id,
        task = ?record.task,
        "{} missing, dropping orphaned queue record",
        store_error_context
    );
    HandlerOutcome::Handled
}

// ============================================================================
// create-identity
// ============================================================================

async fn handle_create_identity<S: Store>(
    store: &S,
    crypto: &dyn CryptoProvider,
    config: &EngineConfig,
    record: &QueueRecord,
    now: i64,
    next_id: &(dyn Fn() -> Id + Sync),
) -> Result<HandlerOutcome> {
    let address_id = record.object0.ok_or_else(|| {
        Error::StoreError("create-identity record missing object0 (Address)".into())
    })?;
    let Some(address) = store
        .get_address(address_id)
        .map_err(|e| Error::StoreError(e.to_string()))?
    else {
        store
            .delete_queue_record(record.id)
            .map_err(|e| Error::StoreError(e.to_string()))?;
        return Ok(missing_referent("address", record));
    };
    let Some(keys) = store
        .get_identity_keys(address_id)
        .map_err(|e| Error::StoreError(e.to_string()))?
    else {
        return Err(Error::StoreError(format!(
            "no identity key material for address {address_id}"
        )));
    };

    let (nonce_trials_per_byte, extra_bytes) = if address.version < 3 {
        (
            codec::DEFAULT_NONCE_TRIALS_PER_BYTE,
            codec::DEFAULT_EXTRA_BYTES,
        )
    } else {
        (
            config.network_nonce_trials_per_byte,
            config.network_extra_bytes,
        )
    };

    let mut inner = PubkeyInner {
        behaviour_bitfield: 0,
        public_signing_key: keys.signing_public.clone(),
        public_encryption_key: keys.encryption_public.clone(),
        nonce_trials_per_byte,
        extra_bytes,
        signature: None,
    };

    if address.version >= 3 {
        let signing_secret = crypto
            .secret_key_from_seed(&keys.signing_secret)
            .map_err(|e| Error::KeyMismatch(e.to_string()))?;
        let signed_bytes =
            codec::pubkey_signing_payload(now, address.version, address.stream, &inner)?;
        let digest = hash::sha256(&signed_bytes);
        let signature = crypto
            .sign(&signing_secret, &digest)
            .map_err(|e| Error::KeyMismatch(e.to_string()))?;
        inner.signature = Some(signature);
    }

    let object = if address.version >= 4 {
        let tag = address
            .tag
            .ok_or_else(|| Error::InvalidAddress("v4+ address missing tag".into()))?;
        let seed = address
            .private_key_seed
            .ok_or_else(|| Error::InvalidAddress("v4+ address missing key seed".into()))?;
        let recipient_secret = crypto
            .secret_key_from_seed(&seed)
            .map_err(|e| Error::KeyMismatch(e.to_string()))?;
        let recipient_public = crypto.public_key_from_secret(&recipient_secret);
        let plaintext = codec::pubkey_inner_bytes(&inner, address.version)?;
        let ciphertext = envelope::encrypt(crypto, &plaintext, &recipient_public)?;
        PubkeyObject::Encrypted {
            pow_nonce: None,
            time: now,
            address_version: address.version,
            stream: address.stream,
            tag,
            ciphertext,
        }
    } else {
        PubkeyObject::Plain {
            pow_nonce: None,
            time: now,
            address_version: address.version,
            stream: address.stream,
            inner,
        }
    };

    let generation = Generation::from_attempts(record.attempts);
    let expiration_time = now + queue::ttl_for(generation, config);
    let unsigned_wire = object.encode()?;
    let nonce = compute_pow(
        config,
        &unsigned_wire,
        expiration_time,
        now,
        nonce_trials_per_byte,
        extra_bytes,
    )?;
    let final_bytes = with_pow_nonce(object, nonce)?;

    let payload = Payload {
        id: next_id(),
        object_type: ObjectType::Pubkey,
        bytes: final_bytes,
        expiration_time,
        address_id: Some(address.id),
        pow_done: true,
    };
    store
        .put_payload(&payload)
        .map_err(|e| Error::StoreError(e.to_string()))?;

    let dissemination = QueueRecord {
        id: next_id(),
        task: TaskKind::DisseminatePubkey,
        trigger_time: now,
        attempts: 0,
        generation: Generation::First,
        object0: Some(payload.id),
        object1: None,
        object2: None,
    };
    store
        .put_queue_record(&dissemination)
        .map_err(|e| Error::StoreError(e.to_string()))?;
    store
        .delete_queue_record(record.id)
        .map_err(|e| Error::StoreError(e.to_string()))?;

    tracing::info!(address = %address.address_string, payload_id = payload.id, "identity pubkey created");
    Ok(HandlerOutcome::Handled)
}

// ============================================================================
// disseminate-pubkey
// ============================================================================

async fn handle_disseminate_pubkey<S: Store, G: Gateway>(
    store: &S,
    gateway: &G,
    config: &EngineConfig,
    record: &QueueRecord,
    now: i64,
    next_id: &(dyn Fn() -> Id + Sync),
) -> Result<HandlerOutcome> {
    let payload_id = record.object0.ok_or_else(|| {
        Error::StoreError("disseminate-pubkey record missing object0 (Payload)".into())
    })?;
    let Some(payload) = store
        .get_payload(payload_id)
        .map_err(|e| Error::StoreError(e.to_string()))?
    else {
        store
            .delete_queue_record(record.id)
            .map_err(|e| Error::StoreError(e.to_string()))?;
        return Ok(missing_referent("payload", record));
    };

    if payload.remaining_ttl(now) < config.minimum_time_to_live {
        store
            .delete_payload(payload.id)
            .map_err(|e| Error::StoreError(e.to_string()))?;
        store
            .delete_queue_record(record.id)
            .map_err(|e| Error::StoreError(e.to_string()))?;
        if let Some(address_id) = payload.address_id {
            let regenerate = QueueRecord {
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
                .put_queue_record(&regenerate)
                .map_err(|e| Error::StoreError(e.to_string()))?;
        }
        tracing::info!(payload_id = payload.id, "pubkey payload expired, regenerating");
        return Ok(HandlerOutcome::Handled);
    }

    gateway
        .post_object(&payload.bytes)
        .await
        .map_err(|e| Error::NetworkError(e.to_string()))?;

    store
        .delete_queue_record(record.id)
        .map_err(|e| Error::StoreError(e.to_string()))?;
    tracing::info!(payload_id = payload.id, "pubkey disseminated");
    Ok(HandlerOutcome::Handled)
}

// ============================================================================
// send-message
// ============================================================================

async fn handle_send_message<S: Store, G: Gateway>(
    store: &S,
    gateway: &G,
    crypto: &dyn CryptoProvider,
    config: &EngineConfig,
    record: &QueueRecord,
    now: i64,
    next_id: &(dyn Fn() -> Id + Sync),
) -> Result<HandlerOutcome> {
    let message_id = record.object0.ok_or_else(|| {
        Error::StoreError("send-message record missing object0 (Message)".into())
    })?;
    let Some(message) = store
        .get_message(message_id)
        .map_err(|e| Error::StoreError(e.to_string()))?
    else {
        store
            .delete_queue_record(record.id)
            .map_err(|e| Error::StoreError(e.to_string()))?;
        return Ok(missing_referent("message", record));
    };
    if matches!(
        message.status,
        MessageStatus::Delivered | MessageStatus::Failed
    ) {
        store
            .delete_queue_record(record.id)
            .map_err(|e| Error::StoreError(e.to_string()))?;
        return Ok(HandlerOutcome::Handled);
    }

    let decoded = address::decode(&message.recipient_address)?;
    let recipient = recipient_address_from_decoded(decoded);

    let pubkey = resolver::resolve(store, gateway, crypto, &recipient, next_id).await?;

    let next = QueueRecord {
        id: next_id(),
        task: TaskKind::ProcessOutgoingMessage,
        trigger_time: now,
        attempts: 0,
        generation: Generation::First,
        object0: Some(message.id),
        object1: Some(pubkey.id),
        object2: None,
    };
    store
        .put_queue_record(&next)
        .map_err(|e| Error::StoreError(e.to_string()))?;
    store
        .delete_queue_record(record.id)
        .map_err(|e| Error::StoreError(e.to_string()))?;
    tracing::info!(message_id = message.id, "recipient pubkey resolved");
    Ok(HandlerOutcome::Handled)
}

fn recipient_address_from_decoded(decoded: address::DecodedAddress) -> Address {
    let (tag, private_key_seed) = if decoded.version >= 4 {
        let key = address::derive_address_key(decoded.version, decoded.stream, &decoded.ripe);
        (
            Some(address::tag(&key)),
            Some(address::private_key_seed(&key)),
        )
    } else {
        (None, None)
    };
    Address {
        id: 0,
        version: decoded.version,
        stream: decoded.stream,
        ripe: decoded.ripe,
        address_string: String::new(),
        tag,
        private_key_seed,
        label: String::new(),
    }
}

// ============================================================================
// process-outgoing-message
// ============================================================================

async fn handle_process_outgoing_message<S: Store>(
    store: &S,
    crypto: &dyn CryptoProvider,
    config: &EngineConfig,
    record: &QueueRecord,
    now: i64,
    next_id: &(dyn Fn() -> Id + Sync),
) -> Result<HandlerOutcome> {
    let message_id = record.object0.ok_or_else(|| {
        Error::StoreError("process-outgoing-message record missing object0 (Message)".into())
    })?;
    let pubkey_id = record.object1.ok_or_else(|| {
        Error::StoreError("process-outgoing-message record missing object1 (Pubkey)".into())
    })?;
    let Some(message) = store
        .get_message(message_id)
        .map_err(|e| Error::StoreError(e.to_string()))?
    else {
        store
            .delete_queue_record(record.id)
            .map_err(|e| Error::StoreError(e.to_string()))?;
        return Ok(missing_referent("message", record));
    };
    let Some(pubkey) = get_pubkey(store, pubkey_id)? else {
        store
            .delete_queue_record(record.id)
            .map_err(|e| Error::StoreError(e.to_string()))?;
        return Ok(missing_referent("recipient pubkey", record));
    };
    let Some(sender_address) = store
        .get_address(message.sender_address_id)
        .map_err(|e| Error::StoreError(e.to_string()))?
    else {
        return Err(Error::StoreError(format!(
            "sender address {} missing",
            message.sender_address_id
        )));
    };
    let Some(sender_keys) = store
        .get_identity_keys(message.sender_address_id)
        .map_err(|e| Error::StoreError(e.to_string()))?
    else {
        return Err(Error::StoreError(format!(
            "no identity key material for sender address {}",
            message.sender_address_id
        )));
    };

    let (sender_ntpb, sender_eb) = if sender_address.version < 3 {
        (
            codec::DEFAULT_NONCE_TRIALS_PER_BYTE,
            codec::DEFAULT_EXTRA_BYTES,
        )
    } else {
        (
            config.network_nonce_trials_per_byte,
            config.network_extra_bytes,
        )
    };

    let plaintext_body = format!("Subject:{}\nBody:{}", message.subject, message.body);
    let mut inner = MsgInner {
        sender_address_version: sender_address.version,
        sender_stream: sender_address.stream,
        behaviour_bitfield: 0,
        sender_signing_key: sender_keys.signing_public.clone(),
        sender_encryption_key: sender_keys.encryption_public.clone(),
        sender_nonce_trials_per_byte: sender_ntpb,
        sender_extra_bytes: sender_eb,
        destination_ripe: pubkey.ripe,
        encoding: ENCODING_SIMPLE,
        message: plaintext_body.into_bytes(),
        signature: Vec::new(),
    };
    let signing_secret = crypto
        .secret_key_from_seed(&sender_keys.signing_secret)
        .map_err(|e| Error::KeyMismatch(e.to_string()))?;
    let signed_bytes = codec::msg_signing_payload(&inner)?;
    let digest = hash::sha256(&signed_bytes);
    inner.signature = crypto
        .sign(&signing_secret, &digest)
        .map_err(|e| Error::KeyMismatch(e.to_string()))?;

    let object = if pubkey.address_version >= 4 {
        let key = address::derive_address_key(pubkey.address_version, pubkey.stream, &pubkey.ripe);
        let tag = address::tag(&key);
        let recipient_public: [u8; 65] = pubkey
            .public_encryption_key
            .as_slice()
            .try_into()
            .map_err(|_| Error::InvalidPubkey("encryption key is not 65 bytes".into()))?;
        let plaintext = codec::msg_inner_bytes(&inner)?;
        let ciphertext = envelope::encrypt(crypto, &plaintext, &recipient_public)?;
        MsgObject::Encrypted {
            pow_nonce: None,
            time: now,
            address_version: pubkey.address_version,
            stream: pubkey.stream,
            tag,
            ciphertext,
        }
    } else {
        MsgObject::Plain {
            pow_nonce: None,
            time: now,
            address_version: pubkey.address_version,
            stream: pubkey.stream,
            inner,
        }
    };

    let generation = Generation::from_attempts(record.attempts);
    let expiration_time = now + queue::ttl_for(generation, config);
    let unsigned_wire = object.encode()?;
    let nonce = compute_pow(
        config,
        &unsigned_wire,
        expiration_time,
        now,
        pubkey.nonce_trials_per_byte,
        pubkey.extra_bytes,
    )?;
    let final_bytes = with_pow_nonce(object, nonce)?;

    let payload = Payload {
        id: next_id(),
        object_type: ObjectType::Msg,
        bytes: final_bytes,
        expiration_time,
        address_id: Some(message.sender_address_id),
        pow_done: true,
    };
    store
        .put_payload(&payload)
        .map_err(|e| Error::StoreError(e.to_string()))?;

    let mut message = message;
    message.status = MessageStatus::Sending;
    store
        .put_message(&message)
        .map_err(|e| Error::StoreError(e.to_string()))?;

    let next = QueueRecord {
        id: next_id(),
        task: TaskKind::DisseminateMessage,
        trigger_time: now,
        attempts: 0,
        generation: Generation::First,
        object0: Some(message.id),
        object1: Some(payload.id),
        object2: Some(pubkey.id),
    };
    store
        .put_queue_record(&next)
        .map_err(|e| Error::StoreError(e.to_string()))?;
    store
        .delete_queue_record(record.id)
        .map_err(|e| Error::StoreError(e.to_string()))?;
    tracing::info!(message_id = message.id, payload_id = payload.id, "message encrypted and PoW computed");
    Ok(HandlerOutcome::Handled)
}

// ============================================================================
// disseminate-message
// ============================================================================

async fn handle_disseminate_message<S: Store, G: Gateway>(
    store: &S,
    gateway: &G,
    config: &EngineConfig,
    record: &QueueRecord,
    now: i64,
    next_id: &(dyn Fn() -> Id + Sync),
) -> Result<HandlerOutcome> {
    let message_id = record.object0.ok_or_else(|| {
        Error::StoreError("disseminate-message record missing object0 (Message)".into())
    })?;
    let payload_id = record.object1.ok_or_else(|| {
        Error::StoreError("disseminate-message record missing object1 (Payload)".into())
    })?;
    let Some(message) = store
        .get_message(message_id)
        .map_err(|e| Error::StoreError(e.to_string()))?
    else {
        store
            .delete_queue_record(record.id)
            .map_err(|e| Error::StoreError(e.to_string()))?;
        return Ok(missing_referent("message", record));
    };
    let Some(payload) = store
        .get_payload(payload_id)
        .map_err(|e| Error::StoreError(e.to_string()))?
    else {
        store
            .delete_queue_record(record.id)
            .map_err(|e| Error::StoreError(e.to_string()))?;
        return Ok(missing_referent("payload", record));
    };

    if payload.remaining_ttl(now) < config.minimum_time_to_live {
        store
            .delete_payload(payload.id)
            .map_err(|e| Error::StoreError(e.to_string()))?;
        store
            .delete_queue_record(record.id)
            .map_err(|e| Error::StoreError(e.to_string()))?;
        let regenerate = QueueRecord {
            id: next_id(),
            task: TaskKind::ProcessOutgoingMessage,
            trigger_time: now,
            // spec.md §4.7: "enqueue process-outgoing-message with fresh TTL"
            // means the *next* attempt uses SUBSEQUENT_ATTEMPTS_TTL.
            attempts: 1,
            generation: Generation::Subsequent,
            object0: Some(message.id),
            object1: record.object2,
            object2: None,
        };
        store
            .put_queue_record(&regenerate)
            .map_err(|e| Error::StoreError(e.to_string()))?;
        tracing::info!(message_id = message.id, "message payload expired, regenerating");
        return Ok(HandlerOutcome::Handled);
    }

    gateway
        .post_object(&payload.bytes)
        .await
        .map_err(|e| Error::NetworkError(e.to_string()))?;

    let mut message = message;
    message.status = MessageStatus::WaitingForAck;
    store
        .put_message(&message)
        .map_err(|e| Error::StoreError(e.to_string()))?;
    store
        .delete_queue_record(record.id)
        .map_err(|e| Error::StoreError(e.to_string()))?;
    tracing::info!(message_id = message.id, "message disseminated, awaiting ack");
    Ok(HandlerOutcome::Handled)
}

// ============================================================================
// Shared helpers
// ============================================================================

fn get_pubkey<S: Store>(store: &S, id: Id) -> Result<Option<Pubkey>> {
    // The `Store` trait indexes pubkeys by ripe-hash, not by id (spec.md §4.6
    // only ever looks them up that way); the orchestrator holds pubkeys by
    // id internally, so it scans the small cached set. Real deployments
    // would add a by-id index; this keeps the trait narrow per spec.md §6.
    for pubkey in store
        .list_pubkeys()
        .map_err(|e| Error::StoreError(e.to_string()))?
    {
        if pubkey.id == id {
            return Ok(Some(pubkey));
        }
    }
    Ok(None)
}

fn compute_pow(
    config: &EngineConfig,
    unsigned_wire: &[u8],
    expiration_time: i64,
    now: i64,
    nonce_trials_per_byte: u64,
    extra_bytes: u64,
) -> Result<u64> {
    if !config.do_pow {
        return Ok(0);
    }
    // Blocking by design (spec.md §5: the PoW engine is the only CPU-bound
    // region; it fans out internally and the tick suspends here, not while
    // holding any queue-record lock).
    let cancel = bm_core::pow::CancelToken::new();
    bm_core::pow::do_pow(
        unsigned_wire,
        expiration_time,
        now,
        nonce_trials_per_byte,
        extra_bytes,
        config.pow_workers,
        &cancel,
    )
}

fn with_pow_nonce(object: impl WirePowNonce, nonce: u64) -> Result<Vec<u8>> {
    object.encode_with_nonce(nonce)
}

/// Re-encode a pubkey/msg object with its PoW nonce prefix filled in, without
/// redoing the (expensive) body serialization logic per call site.
trait WirePowNonce {
    fn encode_with_nonce(self, nonce: u64) -> Result<Vec<u8>>;
}

impl WirePowNonce for PubkeyObject {
    fn encode_with_nonce(self, nonce: u64) -> Result<Vec<u8>> {
        let with_nonce = match self {
            PubkeyObject::Plain {
                time,
                address_version,
                stream,
                inner,
                ..
            } => PubkeyObject::Plain {
                pow_nonce: Some(nonce),
                time,
                address_version,
                stream,
                inner,
            },
            PubkeyObject::Encrypted {
                time,
                address_version,
                stream,
                tag,
                ciphertext,
                ..
            } => PubkeyObject::Encrypted {
                pow_nonce: Some(nonce),
                time,
                address_version,
                stream,
                tag,
                ciphertext,
            },
        };
        with_nonce.encode()
    }
}

impl WirePowNonce for MsgObject {
    fn encode_with_nonce(self, nonce: u64) -> Result<Vec<u8>> {
        let with_nonce = match self {
            MsgObject::Plain {
                time,
                address_version,
                stream,
                inner,
                ..
            } => MsgObject::Plain {
                pow_nonce: Some(nonce),
                time,
                address_version,
                stream,
                inner,
            },
            MsgObject::Encrypted {
                time,
                address_version,
                stream,
                tag,
                ciphertext,
                ..
            } => MsgObject::Encrypted {
                pow_nonce: Some(nonce),
                time,
                address_version,
                stream,
                tag,
                ciphertext,
            },
        };
        with_nonce.encode()
    }
}
