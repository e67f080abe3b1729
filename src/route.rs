// route.rs - layered onion route construction and peeling
// Copyright (C) 2026  The pcnrelay developers.

//! The onion route is a fixed 100-byte buffer of 5-byte name slots. The
//! originator encrypts it layer by layer, innermost hop first, each layer
//! keyed by that hop's own name. A relay decrypts the buffer with its own
//! name key, reads the leading slot to learn the next hop, then shifts the
//! buffer left one slot and appends fresh random padding so the length
//! never reveals the relay's position on the route.

use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::constants::{Name, EMPTY_NAME, MAX_ROUTE_HOPS, NAME_SIZE, ONION_ROUTE_SIZE, ROUTE_FILLER};
use crate::error::RouteError;
use crate::stream::{name_key, xor_with};

/// Build the layered route buffer for an ordered list of hops, the
/// terminal hop last. The buffer comes out encrypted for the first hop;
/// unused slots hold the filler pattern that marks the terminal position.
pub fn build_onion_route(hops: &[Name]) -> Result<[u8; ONION_ROUTE_SIZE], RouteError> {
    if hops.is_empty() {
        return Err(RouteError::EmptyRoute);
    }
    if hops.len() > MAX_ROUTE_HOPS {
        return Err(RouteError::TooManyHops);
    }
    let mut route = vec![ROUTE_FILLER; ONION_ROUTE_SIZE - (hops.len() - 1) * NAME_SIZE];
    for hop in hops[1..].iter().rev() {
        let mut layer = Vec::with_capacity(route.len() + NAME_SIZE);
        layer.extend_from_slice(hop);
        layer.extend_from_slice(&xor_with(&route, &name_key(hop)));
        route = layer;
    }
    let sealed = xor_with(&route, &name_key(&hops[0]));
    let mut out = [0u8; ONION_ROUTE_SIZE];
    out.copy_from_slice(&sealed);
    Ok(out)
}

/// The leading slot of a decrypted route buffer.
pub fn next_hop(route: &[u8; ONION_ROUTE_SIZE]) -> Name {
    *array_ref![route, 0, NAME_SIZE]
}

/// Whether a route slot is the terminal sentinel, compared in constant
/// time.
pub fn is_terminal(name: &Name) -> bool {
    name[..].ct_eq(&EMPTY_NAME[..]).unwrap_u8() == 1
}

/// Drop the leading slot of a decrypted route buffer and append one slot
/// of fresh random padding, preserving the buffer width.
pub fn advance<R: RngCore>(route: &[u8; ONION_ROUTE_SIZE], rng: &mut R) -> [u8; ONION_ROUTE_SIZE] {
    let mut next = [0u8; ONION_ROUTE_SIZE];
    next[..ONION_ROUTE_SIZE - NAME_SIZE].copy_from_slice(&route[NAME_SIZE..]);
    rng.fill_bytes(&mut next[ONION_ROUTE_SIZE - NAME_SIZE..]);
    next
}
