//! Gateway-facing error type (spec.md §7: converts into `bm_core::Error` at
//! the orchestrator boundary).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway returned no object")]
    NotFound,
    #[error("gateway rejected object: {0}")]
    Rejected(String),
}

impl From<GatewayError> for bm_core::Error {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::NotFound => bm_core::Error::NotFound,
            other => bm_core::Error::NetworkError(other.to_string()),
        }
    }
}
