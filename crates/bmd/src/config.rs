//! CLI configuration, mirroring `gossipd::config::Config`'s `clap::Parser`
//! style and folding the engine's own tunables in via `#[command(flatten)]`.

use bm_engine::EngineConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// bmd - object lifecycle daemon for a Bitmessage-style P2P messaging client
#[derive(Parser, Debug)]
#[command(name = "bmd")]
#[command(about = "Drives identity, pubkey, and message dissemination against a gateway")]
pub struct Cli {
    /// Data directory for the local sled store
    #[arg(long, env = "BMD_DATA_DIR", default_value = "./data/bmd")]
    pub data_dir: PathBuf,

    /// Base URL of the gateway this node pushes/pulls objects through
    #[arg(long, env = "BMD_GATEWAY_URL", default_value = "http://127.0.0.1:8444")]
    pub gateway_url: String,

    #[command(flatten)]
    pub engine: EngineConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the periodic driver loop until interrupted (spec.md §4.8).
    Run {
        /// Seconds between driver ticks; the external wake-up scheduler
        /// this binary stands in for.
        #[arg(long, env = "BMD_TICK_INTERVAL_SECS", default_value_t = 10)]
        tick_interval_secs: u64,
    },
    /// Create a new local identity and enqueue it for dissemination.
    CreateIdentity(CreateIdentityArgs),
    /// Queue a message to a peer address.
    Send(SendArgs),
}

#[derive(Args, Debug)]
pub struct CreateIdentityArgs {
    /// User-facing label; addresses with a label are "mine" (spec.md §3).
    #[arg(long)]
    pub label: String,

    /// Address version (1..4); v4 adds the tag/envelope scheme.
    #[arg(long, default_value_t = 4)]
    pub version: u64,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Local "mine" address id to send from.
    #[arg(long)]
    pub from: u64,

    /// Recipient `BM-...` address string.
    #[arg(long)]
    pub to: String,

    #[arg(long, default_value = "")]
    pub subject: String,

    #[arg(long)]
    pub body: String,
}
