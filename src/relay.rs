// relay.rs - the per-node protocol engine
// Copyright (C) 2026  The pcnrelay developers.

//! The relay engine owns a node's identity, one [`ChannelState`] per
//! adjacent peer and the forward/backward message state machine. Every
//! node implements all the roles: intermediate relay, payment originator
//! ("Alice") and payment recipient ("Bob").
//!
//! Two independent keys protect a forward message. The payload travels
//! under the pair key of the two adjacent nodes: the sorted pair of their
//! names joined by `|`, so either side derives the identical key without a
//! handshake. The route tail travels under the receiving node's own name
//! only; every relay re-keys that layer as it peels one slot and appends
//! fresh padding.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use byteorder::{ByteOrder, LittleEndian};
use log::error;
use lru::LruCache;
use p256::{NonZeroScalar, Scalar};
use rand::rngs::OsRng;

use crate::channel::ChannelState;
use crate::config::RelayConfig;
use crate::constants::{
    Name, PaymentId, Secret, AMOUNT_SIZE, ENCLAVE_SECRET, FORWARD_PAYLOAD_SIZE, FORWARD_WIRE_SIZE,
    NAME_SIZE, ONION_ROUTE_SIZE, SIMULATED_ENCLAVE_PRIVATE, TRANSACTION_SIZE,
};
use crate::ecdh;
use crate::enclave::Enclave;
use crate::error::{RelayError, WireError};
use crate::route;
use crate::stream::{self, xor_assign, STREAM_KEY_SIZE};
use crate::wire::{BackwardMessage, ForwardMessage};

/// What processing one forward message produced.
#[derive(Debug)]
pub enum ForwardOutcome {
    /// Intermediate hop: transmit `message` to `next_hop`.
    Relay { next_hop: Name, message: Vec<u8> },
    /// This node is the terminal hop; `message` is the backward reply for
    /// `previous_hop`.
    Terminal { previous_hop: Name, message: Vec<u8> },
    /// Channel backpressure; nothing propagates further.
    Declined,
}

/// What processing one backward message produced.
#[derive(Debug)]
pub enum BackwardOutcome {
    /// A pending payment resolved here; pass the message on to `next_hop`.
    Relay { next_hop: Name, message: Vec<u8> },
    /// This node originated the payment; propagation ends.
    Completed,
}

/// Start and completion times of a payment this node originated.
#[derive(Clone, Copy, Debug)]
pub struct PaymentTiming {
    pub started: Instant,
    pub completed: Option<Instant>,
}

impl PaymentTiming {
    pub fn elapsed(&self) -> Option<Duration> {
        self.completed
            .map(|completed| completed.duration_since(self.started))
    }
}

/// A long-lived relay node.
pub struct Relay {
    name: Name,
    config: RelayConfig,
    enclave: Arc<dyn Enclave>,
    channel_states: HashMap<Name, ChannelState>,
    /// Secrets generated by `ask_for_payment`, keyed by their public
    /// identifier, waiting for a matching terminal forward message.
    pub_to_secret: HashMap<PaymentId, Secret>,
    /// Timing of payments this node originated.
    payment_times: HashMap<PaymentId, PaymentTiming>,
    /// Forward messages accepted while acting as the terminal hop.
    input_messages: Vec<(SystemTime, ForwardMessage)>,
    onion_keys: LruCache<Name, [u8; STREAM_KEY_SIZE]>,
    route_key: [u8; STREAM_KEY_SIZE],
}

impl Relay {
    pub fn new(name: Name, config: RelayConfig, enclave: Arc<dyn Enclave>) -> Relay {
        let cache = NonZeroUsize::new(config.onion_key_cache).unwrap_or(NonZeroUsize::MIN);
        Relay {
            route_key: stream::name_key(&name),
            name,
            config,
            enclave,
            channel_states: HashMap::new(),
            pub_to_secret: HashMap::new(),
            payment_times: HashMap::new(),
            input_messages: Vec::new(),
            onion_keys: LruCache::new(cache),
        }
    }

    pub fn name(&self) -> Name {
        self.name
    }

    /// The payload key shared with `peer`, derived from the sorted name
    /// pair and served from a bounded cache. This key is established in
    /// the channel's initialization phase.
    pub fn onion_key(&mut self, peer: &Name) -> [u8; STREAM_KEY_SIZE] {
        if let Some(key) = self.onion_keys.get(peer) {
            return *key;
        }
        let (low, high) = if self.name <= *peer {
            (self.name, *peer)
        } else {
            (*peer, self.name)
        };
        let mut material = [0u8; 2 * NAME_SIZE + 1];
        material[..NAME_SIZE].copy_from_slice(&low);
        material[NAME_SIZE] = b'|';
        material[NAME_SIZE + 1..].copy_from_slice(&high);
        let key = stream::cyclic_key(&material);
        self.onion_keys.put(*peer, key);
        key
    }

    /// Decrypt an inbound forward message: cleartext source prefix, then
    /// the payload under the pair key and the route tail under this
    /// node's own key.
    pub fn load_forward_message(&mut self, raw: &[u8]) -> Result<ForwardMessage, RelayError> {
        if raw.len() != FORWARD_WIRE_SIZE {
            error!("could not parse forward message of {} bytes", raw.len());
            return Err(WireError::ForwardSizeMismatch.into());
        }
        let source_name = *array_ref![raw, 0, NAME_SIZE];
        let key = self.onion_key(&source_name);
        let payload = stream::xor_with(&raw[NAME_SIZE..NAME_SIZE + FORWARD_PAYLOAD_SIZE], &key);
        let route_plain = stream::xor_with(&raw[NAME_SIZE + FORWARD_PAYLOAD_SIZE..], &self.route_key);
        let mut rest_onion_route = [0u8; ONION_ROUTE_SIZE];
        rest_onion_route.copy_from_slice(&route_plain);
        Ok(ForwardMessage::from_bytes(&payload, rest_onion_route, source_name)?)
    }

    /// Encrypt a forward message for `target`: own name in clear, payload
    /// under the pair key, route tail appended as-is (it is already
    /// encrypted for `target`).
    pub fn seal_forward_message(&mut self, target: &Name, message: &ForwardMessage) -> Vec<u8> {
        let key = self.onion_key(target);
        let mut wire = Vec::with_capacity(FORWARD_WIRE_SIZE);
        wire.extend_from_slice(&self.name);
        wire.extend_from_slice(&stream::xor_with(&message.to_bytes(), &key));
        wire.extend_from_slice(&message.rest_onion_route);
        wire
    }

    /// Process one inbound forward message. Terminal detection, channel
    /// backpressure and the enclave call all happen here; every failure
    /// is contained to this message.
    pub fn process_forward_message(&mut self, raw: &[u8]) -> Result<ForwardOutcome, RelayError> {
        let message = self.load_forward_message(raw)?;
        let next_hop = route::next_hop(&message.rest_onion_route);
        if route::is_terminal(&next_hop) {
            let (previous_hop, reply) = self.be_bob(message)?;
            return Ok(ForwardOutcome::Terminal {
                previous_hop,
                message: reply,
            });
        }
        let output = match self.next_forward_message(&message) {
            Ok(output) => output,
            Err(RelayError::PaymentDeclined) => {
                error!("message declined due to high concurrent payments");
                return Ok(ForwardOutcome::Declined);
            }
            Err(err) => return Err(err),
        };
        let wire = self.seal_forward_message(&next_hop, &output);
        Ok(ForwardOutcome::Relay {
            next_hop,
            message: wire,
        })
    }

    /// Authorize the hop with the enclave, record the pending payment and
    /// build the message for the next hop.
    fn next_forward_message(&mut self, message: &ForwardMessage) -> Result<ForwardMessage, RelayError> {
        let next_route = route::advance(&message.rest_onion_route, &mut OsRng);
        let enclave = Arc::clone(&self.enclave);
        let capacity = self.config.channel_capacity;
        let channel = self
            .channel_states
            .entry(message.source_name)
            .or_insert_with(|| ChannelState::new(capacity));
        if channel.pending_payments.len() > self.config.max_pending_payments {
            return Err(RelayError::PaymentDeclined);
        }
        let output = enclave.trigger(
            &message.secret_pubkey,
            &message.previous_enclave_output,
            &message.previous_enclave_encrypted_key,
            channel,
        )?;
        channel.add_pending_payment(message.secret_pubkey, message.source_name, &output);
        Ok(ForwardMessage {
            previous_enclave_output: output.encrypted_out_amount,
            previous_enclave_encrypted_key: output.key_for_next,
            secret_pubkey: message.secret_pubkey,
            rest_onion_route: next_route,
            source_name: self.name,
        })
    }

    /// Process one inbound backward message: resolve the matching pending
    /// payment on whichever channel holds it and pass the same bytes
    /// toward the payment's source, or recognize the payment as our own.
    pub fn process_backward_message(&mut self, raw: &[u8]) -> Result<BackwardOutcome, RelayError> {
        let message = BackwardMessage::from_bytes(raw)?;
        let skip = self.config.skip_crypto_validation;
        for channel in self.channel_states.values_mut() {
            if let Some(source) = channel.resolve(&message.secret_pubkey, &message.secret, skip) {
                return Ok(BackwardOutcome::Relay {
                    next_hop: source,
                    message: message.to_bytes().to_vec(),
                });
            }
        }
        // no channel pends on this payment, so we must be the originator
        match self.payment_times.get_mut(&message.secret_pubkey) {
            Some(timing) => {
                timing.completed = Some(Instant::now());
                Ok(BackwardOutcome::Completed)
            }
            None => {
                error!("backward message reached the wrong originator");
                Err(RelayError::UnknownPayment)
            }
        }
    }

    /// Originate a payment: build the layered route, derive key material
    /// the first hop's enclave can unwrap, and seal the first forward
    /// message. Returns the first hop and the wire bytes to transmit.
    pub fn be_alice(
        &mut self,
        route_hops: &[Name],
        secret_pubkey: &PaymentId,
        amount: u32,
    ) -> Result<(Name, Vec<u8>), RelayError> {
        let rest_onion_route = route::build_onion_route(route_hops)?;

        // stand in for the channel-initialization exchange with the first
        // enclave: the digest is reversed and truncated to the key width
        let sim_scalar = Scalar::from(SIMULATED_ENCLAVE_PRIVATE);
        let digest = ecdh::find_shared_secret(&sim_scalar, secret_pubkey)?;
        let mut shared = [0u8; TRANSACTION_SIZE];
        for (i, byte) in shared.iter_mut().enumerate() {
            *byte = digest[digest.len() - 1 - i];
        }
        let mut previous_enclave_encrypted_key = shared;
        xor_assign(&mut previous_enclave_encrypted_key, &ENCLAVE_SECRET);
        let mut previous_enclave_output = [0u8; TRANSACTION_SIZE];
        LittleEndian::write_u32(&mut previous_enclave_output[..AMOUNT_SIZE], amount);
        xor_assign(&mut previous_enclave_output, &shared);

        let message = ForwardMessage {
            previous_enclave_output,
            previous_enclave_encrypted_key,
            secret_pubkey: *secret_pubkey,
            rest_onion_route,
            source_name: self.name,
        };
        self.payment_times.insert(
            *secret_pubkey,
            PaymentTiming {
                started: Instant::now(),
                completed: None,
            },
        );
        let first_hop = route_hops[0];
        Ok((first_hop, self.seal_forward_message(&first_hop, &message)))
    }

    /// The terminal-hop role: record the accepted message and answer with
    /// the secret generated when this payment was asked for.
    fn be_bob(&mut self, message: ForwardMessage) -> Result<(Name, Vec<u8>), RelayError> {
        let secret = match self.pub_to_secret.get(&message.secret_pubkey) {
            Some(secret) => *secret,
            None => {
                error!(
                    "terminal forward message for unknown payment {}",
                    hex::encode(&message.secret_pubkey[..8])
                );
                return Err(RelayError::UnknownPayment);
            }
        };
        let reply = BackwardMessage {
            secret_pubkey: message.secret_pubkey,
            secret,
        };
        let previous_hop = message.source_name;
        self.input_messages.push((SystemTime::now(), message));
        Ok((previous_hop, reply.to_bytes().to_vec()))
    }

    /// Generate a fresh payment keypair. The public key identifies the
    /// payment along the whole route; the secret stays here until a
    /// matching forward message terminates at this node.
    pub fn ask_for_payment(&mut self) -> Result<PaymentId, RelayError> {
        let secret = NonZeroScalar::random(&mut OsRng);
        let public = ecdh::secret_to_pubkey(secret.as_ref())?;
        self.pub_to_secret
            .insert(public, ecdh::scalar_to_le_bytes(secret.as_ref()));
        Ok(public)
    }

    /// The channel with `peer`, if any payment ever arrived through it.
    pub fn channel(&self, peer: &Name) -> Option<&ChannelState> {
        self.channel_states.get(peer)
    }

    /// In-flight payments across all channels.
    pub fn total_pending(&self) -> usize {
        self.channel_states
            .values()
            .map(|channel| channel.pending_payments.len())
            .sum()
    }

    /// Timing of a payment this node originated.
    pub fn payment_timing(&self, payment_id: &PaymentId) -> Option<PaymentTiming> {
        self.payment_times.get(payment_id).copied()
    }

    /// Forward messages accepted while acting as the terminal hop.
    pub fn input_messages(&self) -> &[(SystemTime, ForwardMessage)] {
        &self.input_messages
    }
}
