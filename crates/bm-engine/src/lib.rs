//! Object lifecycle engine: gateway client, pubkey resolver, work-queue
//! orchestrator, and periodic driver (spec.md §4.6-§4.8).
//!
//! # Modules
//!
//! - [`config`]: tunables named in spec.md §6
//! - [`error`]: gateway-facing error type
//! - [`gateway`]: HTTP(S) push/pull surface
//! - [`queue`]: TTL strategy, deduplication, attempt cap, ack handling
//! - [`resolver`]: pubkey fetch/validate/cache
//! - [`orchestrator`]: the five task handlers and the per-tick dispatcher
//! - [`driver`]: the periodic loop tying the above together
//! - [`claim`]: in-process compare-and-swap guard against double-processing

pub mod claim;
pub mod config;
pub mod driver;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod queue;
pub mod resolver;

pub use claim::ClaimSet;
pub use config::EngineConfig;
pub use driver::{Driver, DriverEvent};
pub use error::GatewayError;
pub use gateway::{Gateway, HttpGateway};
pub use orchestrator::TickReport;
