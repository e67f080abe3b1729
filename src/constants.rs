// constants.rs - relay protocol constants
// Copyright (C) 2026  The pcnrelay developers.

/// The node name width in bytes. Names are globally unique and double as
/// routing addresses and symmetric key material.
pub const NAME_SIZE: usize = 5;

/// A node name.
pub type Name = [u8; NAME_SIZE];

/// The route slot holding this pattern marks the terminal hop.
pub const EMPTY_NAME: Name = [b'.'; NAME_SIZE];

/// Unused trailing route slots are filled with this byte.
pub const ROUTE_FILLER: u8 = b'.';

/// The width of an encrypted transaction field: a little-endian amount
/// followed by reserved bytes that must decrypt to zero.
pub const TRANSACTION_SIZE: usize = 20;

/// The amount prefix of a transaction field.
pub const AMOUNT_SIZE: usize = 4;

/// The width of a curve scalar on the wire (little-endian).
pub const SECRET_KEY_SIZE: usize = 32;

/// The width of a curve point on the wire: x then y, both little-endian.
pub const PUBLIC_KEY_SIZE: usize = 2 * SECRET_KEY_SIZE;

/// A payment's public identifier, carried unchanged along the whole route.
pub type PaymentId = [u8; PUBLIC_KEY_SIZE];

/// A payment secret as it travels in a backward message.
pub type Secret = [u8; SECRET_KEY_SIZE];

/// The width of the opaque enclave checkpoint.
pub const STATE_SIZE: usize = 16;

/// The onion route buffer width. The buffer always holds exactly this many
/// bytes; relays peel one slot and append one slot of fresh padding.
pub const ONION_ROUTE_SIZE: usize = 20 * NAME_SIZE;

/// The maximum number of hops a route can carry. A full route keeps one
/// sentinel slot so the terminal hop can still be detected.
pub const MAX_ROUTE_HOPS: usize = ONION_ROUTE_SIZE / NAME_SIZE;

/// The width of the encrypted forward payload: two transaction fields and
/// the payment identifier.
pub const FORWARD_PAYLOAD_SIZE: usize = 2 * TRANSACTION_SIZE + PUBLIC_KEY_SIZE;

/// The width of a forward message on the wire: cleartext source name,
/// encrypted payload, route tail.
pub const FORWARD_WIRE_SIZE: usize = NAME_SIZE + FORWARD_PAYLOAD_SIZE + ONION_ROUTE_SIZE;

/// The width of a backward message on the wire.
pub const BACKWARD_MESSAGE_SIZE: usize = PUBLIC_KEY_SIZE + SECRET_KEY_SIZE;

/// This key is generated in the channel's initialization phase and shared
/// with the enclave; per-payment keys travel XORed with it.
pub const ENCLAVE_SECRET: [u8; TRANSACTION_SIZE] = [
    21, 82, 15, 151, 146, 163, 170, 236, 229, 18, 142, 72, 94, 107, 248, 22, 241, 230, 254, 84,
];

/// The channel-initialization scalar the originator uses to derive key
/// material the first hop's enclave can unwrap.
pub const SIMULATED_ENCLAVE_PRIVATE: u64 = 123;
