// enclave.rs - bridge to the external liquidity-validation oracle
// Copyright (C) 2026  The pcnrelay developers.

//! Every relayed hop is authorized by an enclave: an external, possibly
//! hardware-isolated oracle that validates the encrypted amount against
//! the channel's liquidity and issues fresh per-hop key material plus an
//! opaque checkpoint. The oracle is a scarce, stateful resource, so the
//! HTTP bridge serializes itself to one in-flight request process-wide.
//!
//! Two in-process implementations exist besides the HTTP bridge: a
//! [`SimulatedEnclave`] that performs the real cryptography without an
//! external process, and a [`PassthroughEnclave`] escape hatch that skips
//! the oracle entirely for decryption-free benchmark runs.

use std::process::Command;
use std::sync::Mutex;
use std::thread;

use log::{debug, error};
use p256::NonZeroScalar;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::channel::ChannelState;
use crate::config::EnclaveConfig;
use crate::constants::{
    PaymentId, AMOUNT_SIZE, ENCLAVE_SECRET, PUBLIC_KEY_SIZE, STATE_SIZE, TRANSACTION_SIZE,
};
use crate::ecdh;
use crate::error::EnclaveError;
use crate::stream::xor_assign;

use byteorder::{ByteOrder, LittleEndian};

/// What the oracle hands back for one authorized hop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnclaveOutput {
    /// The amount, re-encrypted for this hop.
    pub encrypted_out_amount: [u8; TRANSACTION_SIZE],
    /// The amount key, wrapped for the next hop's enclave.
    pub key_for_next: [u8; TRANSACTION_SIZE],
    /// The oracle's Diffie-Hellman public key; resolving this hop derives
    /// the amount key from it and the payment secret.
    pub key_for_secret: [u8; PUBLIC_KEY_SIZE],
    /// The fresh opaque checkpoint.
    pub state: [u8; STATE_SIZE],
}

/// The narrow contract the relay engine holds against the oracle.
pub trait Enclave: Send + Sync {
    /// Authorize one hop of a payment against a channel. Reads the
    /// channel's liquidity, checkpoint and resolution log; never mutates
    /// it.
    fn trigger(
        &self,
        secret_pubkey: &PaymentId,
        encrypted_given_amount: &[u8; TRANSACTION_SIZE],
        encrypted_key: &[u8; TRANSACTION_SIZE],
        channel: &ChannelState,
    ) -> Result<EnclaveOutput, EnclaveError>;
}

/// The production bridge to the oracle's HTTP endpoint.
pub struct HttpEnclave {
    config: EnclaveConfig,
    http: reqwest::blocking::Client,
    serial: Mutex<()>,
}

impl HttpEnclave {
    pub fn new(config: EnclaveConfig) -> HttpEnclave {
        HttpEnclave {
            config,
            http: reqwest::blocking::Client::new(),
            serial: Mutex::new(()),
        }
    }

    /// One request attempt. The resolution log travels as the request
    /// body; an empty log degenerates to a plain GET.
    fn request(&self, params: &[(&str, String)], resolved_log: &str) -> Result<String, EnclaveError> {
        let builder = if resolved_log.is_empty() {
            self.http.get(&self.config.url).query(params)
        } else {
            self.http
                .post(&self.config.url)
                .query(params)
                .body(resolved_log.to_string())
        };
        let response = builder
            .send()
            .map_err(|err| EnclaveError::Connection(err.to_string()))?;
        if !response.status().is_success() {
            return Err(EnclaveError::Status(response.status().as_u16()));
        }
        response
            .text()
            .map_err(|err| EnclaveError::Connection(err.to_string()))
    }

    /// Signal the external recovery action (a service restart) and give
    /// the oracle time to come back.
    fn recover(&self) {
        if let Some(command) = &self.config.recovery_command {
            if let Err(err) = Command::new("sh").arg("-c").arg(command).status() {
                error!("enclave recovery command failed: {}", err);
            }
        }
        thread::sleep(self.config.recovery_settle);
    }
}

impl Enclave for HttpEnclave {
    fn trigger(
        &self,
        secret_pubkey: &PaymentId,
        encrypted_given_amount: &[u8; TRANSACTION_SIZE],
        encrypted_key: &[u8; TRANSACTION_SIZE],
        channel: &ChannelState,
    ) -> Result<EnclaveOutput, EnclaveError> {
        let mut params = vec![
            ("bob_dh_pub", hex::encode(&secret_pubkey[..])),
            // the oracle's historical parameter spelling
            ("encrypted_given_ammount", hex::encode(encrypted_given_amount)),
            ("encrypted_key", hex::encode(encrypted_key)),
            ("prev_liquidity", channel.liquidity.to_string()),
        ];
        if let Some(state) = &channel.current_state {
            params.push(("prev_state", hex::encode(state)));
        }
        let resolved_log = channel.resolved_log();

        // one in-flight oracle call process-wide
        let _serial = self.serial.lock().unwrap_or_else(|poison| poison.into_inner());
        let mut attempt = 0;
        while attempt < self.config.max_retries {
            attempt += 1;
            match self.request(&params, &resolved_log) {
                Ok(body) => return parse_response(&body),
                Err(EnclaveError::Connection(err)) => {
                    error!("enclave connection failure: {}, retrying ({})", err, attempt);
                    if attempt >= self.config.recovery_threshold {
                        self.recover();
                    }
                }
                Err(EnclaveError::Status(code)) => {
                    error!("enclave answered HTTP {}, retrying ({})", code, attempt);
                }
                Err(err) => return Err(err),
            }
            if !self.config.retry_backoff.is_zero() {
                thread::sleep(self.config.retry_backoff);
            }
        }
        Err(EnclaveError::MaxRetriesReached)
    }
}

/// Decode the oracle's response: four labeled hex lines and a trailing
/// blank. Any deviation in line count, labels or field widths aborts the
/// request without retry; an all-zero output field means the oracle
/// refused the input.
pub fn parse_response(text: &str) -> Result<EnclaveOutput, EnclaveError> {
    if text.matches('\n').count() < 6 {
        error!("bad output from enclave: {}", text);
        return Err(EnclaveError::MalformedResponse(format!(
            "{} lines",
            text.matches('\n').count() + 1
        )));
    }
    let segments: Vec<&str> = text.split('\n').collect();
    if segments.len() != 9
        || segments[0] != "output:"
        || segments[2] != "key_encrypted_for_next:"
        || segments[4] != "my_dh_pub:"
        || segments[6] != "state:"
        || !segments[8].is_empty()
    {
        error!("malformed labels from enclave: {}", text);
        return Err(EnclaveError::MalformedResponse("bad labels".to_string()));
    }
    let encrypted_out_amount: [u8; TRANSACTION_SIZE] = decode_field(segments[1])?;
    let key_for_next: [u8; TRANSACTION_SIZE] = decode_field(segments[3])?;
    let key_for_secret: [u8; PUBLIC_KEY_SIZE] = decode_field(segments[5])?;
    let state: [u8; STATE_SIZE] = decode_field(segments[7])?;
    if encrypted_out_amount == [0u8; TRANSACTION_SIZE] {
        error!("invalid input to enclave");
        return Err(EnclaveError::Rejected);
    }
    Ok(EnclaveOutput {
        encrypted_out_amount,
        key_for_next,
        key_for_secret,
        state,
    })
}

fn decode_field<const N: usize>(line: &str) -> Result<[u8; N], EnclaveError> {
    let bytes = hex::decode(line)
        .map_err(|err| EnclaveError::MalformedResponse(format!("bad hex: {}", err)))?;
    if bytes.len() != N {
        return Err(EnclaveError::MalformedResponse(format!(
            "field width {}, expected {}",
            bytes.len(),
            N
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// An in-process oracle performing the real per-hop cryptography: unwrap
/// the amount key with the channel-initialization secret, validate the
/// amount against liquidity, then re-encrypt under a fresh ephemeral
/// Diffie-Hellman exchange with the payment's public key. Lets a network
/// of relays run end to end without the external process.
pub struct SimulatedEnclave {
    channel_secret: [u8; TRANSACTION_SIZE],
}

impl SimulatedEnclave {
    pub fn new() -> SimulatedEnclave {
        SimulatedEnclave {
            channel_secret: ENCLAVE_SECRET,
        }
    }
}

impl Default for SimulatedEnclave {
    fn default() -> SimulatedEnclave {
        SimulatedEnclave::new()
    }
}

impl Enclave for SimulatedEnclave {
    fn trigger(
        &self,
        secret_pubkey: &PaymentId,
        encrypted_given_amount: &[u8; TRANSACTION_SIZE],
        encrypted_key: &[u8; TRANSACTION_SIZE],
        channel: &ChannelState,
    ) -> Result<EnclaveOutput, EnclaveError> {
        let mut key = *encrypted_key;
        xor_assign(&mut key, &self.channel_secret);
        let mut plain = *encrypted_given_amount;
        xor_assign(&mut plain, &key);
        if plain[AMOUNT_SIZE..].iter().any(|byte| *byte != 0) {
            error!("simulated enclave: invalid amount plaintext");
            return Err(EnclaveError::Rejected);
        }
        let amount = LittleEndian::read_u32(&plain[..AMOUNT_SIZE]);
        if i64::from(amount) > channel.liquidity {
            error!("simulated enclave: amount exceeds channel liquidity");
            return Err(EnclaveError::Rejected);
        }

        let ephemeral = NonZeroScalar::random(&mut OsRng);
        let key_for_secret =
            ecdh::secret_to_pubkey(ephemeral.as_ref()).map_err(|_| EnclaveError::Rejected)?;
        let shared = ecdh::find_shared_secret(ephemeral.as_ref(), secret_pubkey)
            .map_err(|_| EnclaveError::Rejected)?;
        let mut hop_key = [0u8; TRANSACTION_SIZE];
        hop_key.copy_from_slice(&shared[..TRANSACTION_SIZE]);

        let mut encrypted_out_amount = plain;
        xor_assign(&mut encrypted_out_amount, &hop_key);
        let mut key_for_next = hop_key;
        xor_assign(&mut key_for_next, &self.channel_secret);
        let mut state = [0u8; STATE_SIZE];
        OsRng.fill_bytes(&mut state);
        Ok(EnclaveOutput {
            encrypted_out_amount,
            key_for_next,
            key_for_secret,
            state,
        })
    }
}

/// The skip-enclave escape hatch: no oracle call, deterministic
/// pass-through of the inbound fields. Pair it with the relay's
/// `skip_crypto_validation` flag for decryption-free benchmark runs; it
/// must never be the production oracle.
pub struct PassthroughEnclave;

impl Enclave for PassthroughEnclave {
    fn trigger(
        &self,
        secret_pubkey: &PaymentId,
        encrypted_given_amount: &[u8; TRANSACTION_SIZE],
        encrypted_key: &[u8; TRANSACTION_SIZE],
        _channel: &ChannelState,
    ) -> Result<EnclaveOutput, EnclaveError> {
        debug!("skipping enclave");
        Ok(EnclaveOutput {
            encrypted_out_amount: *encrypted_given_amount,
            key_for_next: *encrypted_key,
            key_for_secret: *secret_pubkey,
            state: [0u8; STATE_SIZE],
        })
    }
}
