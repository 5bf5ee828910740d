//! One-shot CLI intents: the stand-in for spec.md §2's "external UI handler"
//! that inserts queue records for the Periodic Driver/Orchestrator to pick up.

use crate::config::{CreateIdentityArgs, SendArgs};
use anyhow::{bail, Context, Result};
use bm_core::{address, hash, Address, Generation, IdentityKeyMaterial, Message, MessageStatus, QueueRecord, TaskKind};
use bm_object::{CryptoProvider, Secp256k1Provider};
use bm_store::{SledStore, Store};

pub fn create_identity(store: &SledStore, args: CreateIdentityArgs) -> Result<()> {
    if !(1..=4).contains(&args.version) {
        bail!("address version must be 1..4, got {}", args.version);
    }

    let crypto = Secp256k1Provider::new();
    let signing = crypto.generate_keypair();
    let encryption = crypto.generate_keypair();
    let signing_public = signing.public_key_uncompressed.to_vec();
    let encryption_public = encryption.public_key_uncompressed.to_vec();
    let ripe = hash::ripe_hash(&signing_public, &encryption_public);
    let address_string = address::encode(args.version, address::SUPPORTED_STREAM, &ripe)
        .context("encoding address string")?;

    let (tag, private_key_seed) = if args.version >= 4 {
        let key = address::derive_address_key(args.version, address::SUPPORTED_STREAM, &ripe);
        (
            Some(address::tag(&key)),
            Some(address::private_key_seed(&key)),
        )
    } else {
        (None, None)
    };

    let address_id = store.next_id()?;
    let address = Address {
        id: address_id,
        version: args.version,
        stream: address::SUPPORTED_STREAM,
        ripe,
        address_string: address_string.clone(),
        tag,
        private_key_seed,
        label: args.label,
    };
    store.put_address(&address)?;
    store.put_identity_keys(&IdentityKeyMaterial {
        address_id,
        signing_secret: signing.secret_key.secret_bytes(),
        signing_public,
        encryption_secret: encryption.secret_key.secret_bytes(),
        encryption_public,
    })?;

    let record = QueueRecord {
        id: store.next_id()?,
        task: TaskKind::CreateIdentity,
        trigger_time: now(),
        attempts: 0,
        generation: Generation::First,
        object0: Some(address_id),
        object1: None,
        object2: None,
    };
    store.put_queue_record(&record)?;

    tracing::info!(address = %address_string, id = address_id, "identity created and queued for dissemination");
    println!("{address_string}");
    Ok(())
}

pub fn send(store: &SledStore, args: SendArgs) -> Result<()> {
    let sender = store
        .get_address(args.from)?
        .with_context(|| format!("no address with id {}", args.from))?;
    if store.get_identity_keys(sender.id)?.is_none() {
        bail!("address {} has no local key material to sign from", sender.id);
    }
    address::decode(&args.to).context("recipient address is not a valid BM- address")?;

    let message_id = store.next_id()?;
    let message = Message {
        id: message_id,
        subject: args.subject,
        body: args.body,
        sender_address_id: sender.id,
        recipient_address: args.to,
        status: MessageStatus::Queued,
        ack_id: None,
    };
    store.put_message(&message)?;

    let record = QueueRecord {
        id: store.next_id()?,
        task: TaskKind::SendMessage,
        trigger_time: now(),
        attempts: 0,
        generation: Generation::First,
        object0: Some(message_id),
        object1: None,
        object2: None,
    };
    store.put_queue_record(&record)?;

    tracing::info!(message_id, recipient = %message.recipient_address, "message queued for sending");
    Ok(())
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as i64
}
