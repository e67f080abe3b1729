// wire.rs - fixed-width forward and backward wire messages
// Copyright (C) 2026  The pcnrelay developers.

//! The two message shapes relays exchange. A forward message travels as a
//! cleartext source-name prefix (so the receiver knows which pair key to
//! derive), the encrypted three-field payload, and the separately-encrypted
//! route tail; only the payload passes through [`ForwardMessage::to_bytes`].
//! A backward message is unencrypted. Field widths are protocol constants
//! and any length mismatch is a hard decode failure.

use crate::constants::{
    Name, PaymentId, Secret, BACKWARD_MESSAGE_SIZE, FORWARD_PAYLOAD_SIZE, ONION_ROUTE_SIZE,
    PUBLIC_KEY_SIZE, SECRET_KEY_SIZE, TRANSACTION_SIZE,
};
use crate::error::WireError;

/// One hop's view of an in-flight payment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardMessage {
    /// The previous hop's enclave output: the encrypted amount.
    pub previous_enclave_output: [u8; TRANSACTION_SIZE],
    /// The amount key, wrapped for the next enclave.
    pub previous_enclave_encrypted_key: [u8; TRANSACTION_SIZE],
    /// The payment identifier, constant along the route.
    pub secret_pubkey: PaymentId,
    /// The remaining onion route, decrypted one layer at this hop.
    pub rest_onion_route: [u8; ONION_ROUTE_SIZE],
    /// The cleartext name of the hop this message came from.
    pub source_name: Name,
}

impl ForwardMessage {
    /// Decode the encrypted-payload fields. The route and source name
    /// travel out of band and are attached to the parsed message.
    pub fn from_bytes(
        payload: &[u8],
        rest_onion_route: [u8; ONION_ROUTE_SIZE],
        source_name: Name,
    ) -> Result<ForwardMessage, WireError> {
        if payload.len() != FORWARD_PAYLOAD_SIZE {
            return Err(WireError::ForwardSizeMismatch);
        }
        let fields = array_ref![payload, 0, FORWARD_PAYLOAD_SIZE];
        let (output, key, pubkey) =
            array_refs![fields, TRANSACTION_SIZE, TRANSACTION_SIZE, PUBLIC_KEY_SIZE];
        Ok(ForwardMessage {
            previous_enclave_output: *output,
            previous_enclave_encrypted_key: *key,
            secret_pubkey: *pubkey,
            rest_onion_route,
            source_name,
        })
    }

    /// Serialize exactly the three payload fields.
    pub fn to_bytes(&self) -> [u8; FORWARD_PAYLOAD_SIZE] {
        let mut out = [0u8; FORWARD_PAYLOAD_SIZE];
        out[..TRANSACTION_SIZE].copy_from_slice(&self.previous_enclave_output);
        out[TRANSACTION_SIZE..2 * TRANSACTION_SIZE]
            .copy_from_slice(&self.previous_enclave_encrypted_key);
        out[2 * TRANSACTION_SIZE..].copy_from_slice(&self.secret_pubkey);
        out
    }
}

/// The reply that resolves a pending payment, travelling hop by hop back
/// toward the originator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackwardMessage {
    /// The payment identifier being resolved.
    pub secret_pubkey: PaymentId,
    /// The revealed payment secret.
    pub secret: Secret,
}

impl BackwardMessage {
    pub fn from_bytes(data: &[u8]) -> Result<BackwardMessage, WireError> {
        if data.len() != BACKWARD_MESSAGE_SIZE {
            return Err(WireError::BackwardSizeMismatch);
        }
        let fields = array_ref![data, 0, BACKWARD_MESSAGE_SIZE];
        let (pubkey, secret) = array_refs![fields, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE];
        Ok(BackwardMessage {
            secret_pubkey: *pubkey,
            secret: *secret,
        })
    }

    pub fn to_bytes(&self) -> [u8; BACKWARD_MESSAGE_SIZE] {
        let mut out = [0u8; BACKWARD_MESSAGE_SIZE];
        out[..PUBLIC_KEY_SIZE].copy_from_slice(&self.secret_pubkey);
        out[PUBLIC_KEY_SIZE..].copy_from_slice(&self.secret);
        out
    }
}
