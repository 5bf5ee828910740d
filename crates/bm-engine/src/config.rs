//! Tunables named in spec.md §6, with defaults matching the spec's literal
//! values (mirrors `gossipd::config::Config`'s `#[arg(long, env = "...")]`
//! style so `bmd` can flatten this into its own CLI).

use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct EngineConfig {
    /// Whether outbound objects require proof-of-work before dissemination.
    #[arg(long, env = "BM_DO_POW", default_value_t = true)]
    pub do_pow: bool,

    /// TTL, in seconds, used for a task's first attempt.
    #[arg(long, env = "BM_FIRST_ATTEMPT_TTL", default_value_t = 3600)]
    pub first_attempt_ttl: i64,

    /// TTL, in seconds, used for every attempt after the first.
    #[arg(long, env = "BM_SUBSEQUENT_ATTEMPTS_TTL", default_value_t = 86_400)]
    pub subsequent_attempts_ttl: i64,

    /// A payload with less remaining lifetime than this is discarded and regenerated.
    #[arg(long, env = "BM_MINIMUM_TIME_TO_LIVE", default_value_t = 120)]
    pub minimum_time_to_live: i64,

    /// A queue record past this many attempts is dropped and its message marked failed.
    #[arg(long, env = "BM_MAXIMUM_ATTEMPTS", default_value_t = 500)]
    pub maximum_attempts: u32,

    /// Minimum interval, in seconds, between database-cleaning runs.
    #[arg(long, env = "BM_TIME_BETWEEN_DATABASE_CLEANING", default_value_t = 3600)]
    pub time_between_database_cleaning: i64,

    /// Default `nonce_trials_per_byte` used for outbound objects.
    #[arg(long, env = "BM_NETWORK_NONCE_TRIALS_PER_BYTE", default_value_t = 1000)]
    pub network_nonce_trials_per_byte: u64,

    /// Default `extra_bytes` used for outbound objects.
    #[arg(long, env = "BM_NETWORK_EXTRA_BYTES", default_value_t = 1000)]
    pub network_extra_bytes: u64,

    /// Minimum interval, in seconds, between inbound-message polls.
    #[arg(long, env = "BM_MINIMUM_TIME_BEHIND_NETWORK", default_value_t = 30)]
    pub minimum_time_behind_network: i64,

    /// Interval, in seconds, after which a local pubkey is re-disseminated (spec.md §4.8: 28 days).
    #[arg(long, env = "BM_PUBKEY_RESEND_INTERVAL", default_value_t = 28 * 86_400)]
    pub pubkey_resend_interval: i64,

    /// Gateway HTTP request timeout, in seconds (spec.md §5 default).
    #[arg(long, env = "BM_GATEWAY_TIMEOUT_SECS", default_value_t = 30)]
    pub gateway_timeout_secs: u64,

    /// PoW worker thread count; 0 means available parallelism.
    #[arg(long, env = "BM_POW_WORKERS", default_value_t = 0)]
    pub pow_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            do_pow: true,
            first_attempt_ttl: 3600,
            subsequent_attempts_ttl: 86_400,
            minimum_time_to_live: 120,
            maximum_attempts: 500,
            time_between_database_cleaning: 3600,
            network_nonce_trials_per_byte: 1000,
            network_extra_bytes: 1000,
            minimum_time_behind_network: 30,
            pubkey_resend_interval: 28 * 86_400,
            gateway_timeout_secs: 30,
            pow_workers: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_literal_values() {
        let config = EngineConfig::default();
        assert_eq!(config.first_attempt_ttl, 3600);
        assert_eq!(config.subsequent_attempts_ttl, 86_400);
        assert_eq!(config.minimum_time_to_live, 120);
        assert_eq!(config.maximum_attempts, 500);
        assert_eq!(config.network_nonce_trials_per_byte, 1000);
        assert_eq!(config.network_extra_bytes, 1000);
        assert_eq!(config.minimum_time_behind_network, 30);
    }
}
