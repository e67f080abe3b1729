// config.rs - operational parameters
// Copyright (C) 2026  The pcnrelay developers.

//! Operational constants kept out of the protocol code. The defaults are
//! the values the network has run with; none of them is a wire-format
//! constant.

use std::time::Duration;

/// Parameters of one relay engine.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Initial liquidity of a lazily-created channel.
    pub channel_capacity: i64,
    /// Per-channel ceiling on in-flight payments; forwards beyond it are
    /// declined. Deliberate backpressure against pending-payment floods.
    pub max_pending_payments: usize,
    /// Skip cryptographic validation when resolving. Escape hatch for
    /// decryption-free benchmark runs together with
    /// [`crate::enclave::PassthroughEnclave`]; never enable in production.
    pub skip_crypto_validation: bool,
    /// Capacity of the bounded pair-key cache.
    pub onion_key_cache: usize,
}

impl Default for RelayConfig {
    fn default() -> RelayConfig {
        RelayConfig {
            channel_capacity: 100_000,
            max_pending_payments: 3_000,
            skip_crypto_validation: false,
            onion_key_cache: 50,
        }
    }
}

/// Parameters of the HTTP oracle bridge.
#[derive(Clone, Debug)]
pub struct EnclaveConfig {
    /// The oracle endpoint.
    pub url: String,
    /// Attempts per request before giving up on the hop.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_backoff: Duration,
    /// Attempt count at which the recovery command runs.
    pub recovery_threshold: u32,
    /// External recovery action for a wedged oracle, e.g.
    /// `"sudo systemctl restart pcn-enclave"`.
    pub recovery_command: Option<String>,
    /// Grace period after the recovery command.
    pub recovery_settle: Duration,
}

impl Default for EnclaveConfig {
    fn default() -> EnclaveConfig {
        EnclaveConfig {
            url: "http://127.0.0.1:9080/".to_string(),
            max_retries: 5,
            retry_backoff: Duration::ZERO,
            recovery_threshold: 2,
            recovery_command: None,
            recovery_settle: Duration::from_secs(1),
        }
    }
}
