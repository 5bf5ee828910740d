//! Object codec and crypto envelope for pubkey/msg network objects.

pub mod codec;
pub mod crypto_provider;
pub mod envelope;

pub use codec::{
    msg_inner_bytes, msg_signing_payload, pubkey_inner_bytes, pubkey_signing_payload, MsgInner,
    MsgObject, PubkeyInner, PubkeyObject, TimeFieldPolicy,
};
pub use crypto_provider::{CryptoProvider, CryptoProviderError, KeyPair, Secp256k1Provider};
