//! Pubkey Resolver (spec.md §4.6): obtain, validate, and deduplicate a
//! peer's pubkey.

use crate::gateway::Gateway;
use bm_core::{hash, Address, Error, Id, Pubkey, Result};
use bm_object::codec::{PubkeyInner, PubkeyObject, TimeFieldPolicy};
use bm_object::{envelope, CryptoProvider};
use bm_store::Store;

/// Resolve `address`'s pubkey: local store first, then the gateway; persist
/// and validate before returning.
pub async fn resolve<S: Store, G: Gateway>(
    store: &S,
    gateway: &G,
    crypto: &dyn CryptoProvider,
    address: &Address,
    next_id: impl Fn() -> Id,
) -> Result<Pubkey> {
    let mut cached = store
        .list_pubkeys_by_ripe(&address.ripe)
        .map_err(|e| Error::StoreError(e.to_string()))?;
    if !cached.is_empty() {
        // spec.md §8 scenario 6: when more than one pubkey shares a
        // ripe-hash, the one with the later `time` wins; it is always the
        // more recently disseminated (hence more likely still valid) copy.
        cached.sort_by_key(|p| p.time);
        let newest = cached.pop().expect("non-empty checked above");
        for duplicate in cached {
            store
                .delete_pubkey(duplicate.id)
                .map_err(|e| Error::StoreError(e.to_string()))?;
            tracing::warn!(pubkey_id = duplicate.id, "dropped duplicate cached pubkey");
        }
        return Ok(newest);
    }

    let object_bytes = if address.version >= 4 {
        let tag = address
            .tag
            .ok_or_else(|| Error::InvalidAddress("v4+ address missing tag".into()))?;
        gateway
            .get_pubkey_by_tag(&tag)
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))?
    } else {
        gateway
            .get_pubkey_by_ripe(&address.ripe)
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))?
    }
    .ok_or(Error::NotFound)?;

    let parsed = PubkeyObject::decode(&object_bytes, true, TimeFieldPolicy::HeuristicV3)?;

    let pubkey = match parsed {
        PubkeyObject::Plain {
            pow_nonce,
            time,
            address_version,
            stream,
            inner,
        } => build_pubkey(next_id(), pow_nonce, time, address_version, stream, inner),
        PubkeyObject::Encrypted {
            pow_nonce,
            time,
            address_version,
            stream,
            ciphertext,
            ..
        } => {
            let seed = address
                .private_key_seed
                .ok_or_else(|| Error::InvalidAddress("v4+ address missing key seed".into()))?;
            let secret_key = crypto
                .secret_key_from_seed(&seed)
                .map_err(|e| Error::KeyMismatch(e.to_string()))?;
            let plaintext = envelope::decrypt(crypto, &ciphertext, &secret_key)?;
            let inner = bm_object::codec::decode_pubkey_inner(&plaintext, address_version)?;
            build_pubkey(next_id(), pow_nonce, time, address_version, stream, inner)
        }
    };

    validate(crypto, &pubkey)?;

    store
        .put_pubkey(&pubkey)
        .map_err(|e| Error::StoreError(e.to_string()))?;

    Ok(pubkey)
}

fn build_pubkey(
    id: Id,
    pow_nonce: Option<u64>,
    time: i64,
    address_version: u64,
    stream: u64,
    inner: PubkeyInner,
) -> Pubkey {
    let ripe = hash::ripe_hash(&inner.public_signing_key, &inner.public_encryption_key);
    Pubkey {
        id,
        address_version,
        stream,
        behaviour_bitfield: inner.behaviour_bitfield,
        public_signing_key: inner.public_signing_key,
        public_encryption_key: inner.public_encryption_key,
        nonce_trials_per_byte: inner.nonce_trials_per_byte,
        extra_bytes: inner.extra_bytes,
        signature: inner.signature,
        pow_nonce: pow_nonce.unwrap_or(0),
        time,
        ripe,
        address_id: None,
    }
}

/// spec.md §3 invariant: recomputing the ripe-hash from the embedded keys
/// must reproduce the address string's ripe, and (v>2) the signature must
/// verify over the pubkey's canonical (pre-signature, pre-nonce) bytes.
fn validate(crypto: &dyn CryptoProvider, pubkey: &Pubkey) -> Result<()> {
    let recomputed = hash::ripe_hash(&pubkey.public_signing_key, &pubkey.public_encryption_key);
    if recomputed != pubkey.ripe {
        return Err(Error::InvalidPubkey(
            "ripe-hash does not match public keys".into(),
        ));
    }
    if pubkey.address_version > 2 {
        let signature = pubkey
            .signature
            .as_ref()
            .ok_or_else(|| Error::InvalidPubkey("version > 2 pubkey missing signature".into()))?;
        let signing_public: [u8; 65] = pubkey
            .public_signing_key
            .as_slice()
            .try_into()
            .map_err(|_| Error::InvalidPubkey("signing key is not 65 bytes".into()))?;
        let inner = PubkeyInner {
            behaviour_bitfield: pubkey.behaviour_bitfield,
            public_signing_key: pubkey.public_signing_key.clone(),
            public_encryption_key: pubkey.public_encryption_key.clone(),
            nonce_trials_per_byte: pubkey.nonce_trials_per_byte,
            extra_bytes: pubkey.extra_bytes,
            signature: None,
        };
        let signed_bytes = bm_object::codec::pubkey_signing_payload(
            pubkey.time,
            pubkey.address_version,
            pubkey.stream,
            &inner,
        )?;
        let digest = hash::sha256(&signed_bytes);
        let verified = crypto
            .verify(&signing_public, &digest, signature)
            .map_err(|e| Error::InvalidPubkey(e.to_string()))?;
        if !verified {
            return Err(Error::InvalidPubkey("signature does not verify".into()));
        }
    }
    Ok(())
}
