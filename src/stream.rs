// stream.rs - keystream cipher for onion layers and payloads
// Copyright (C) 2026  The pcnrelay developers.

//! The symmetric cipher every onion layer and payload uses: ChaCha20 with
//! an all-zero 64-bit nonce and the stream position reset on every call.
//! Encryption and decryption are the same XOR operation. Keys shorter than
//! the cipher width repeat cyclically, which is what lets 5-byte node names
//! act as key material; the output is bit-identical to the cipher the
//! enclave process and the other relay implementations run.

use chacha::ChaCha;
use keystream::KeyStream;

use crate::constants::Name;
use crate::error::CipherError;

/// The cipher key width in bytes.
pub const STREAM_KEY_SIZE: usize = 32;

/// The cipher nonce width in bytes.
pub const STREAM_NONCE_SIZE: usize = 8;

/// Encrypt (or decrypt) `data` under a variable-length key. Keys repeat
/// cyclically up to [`STREAM_KEY_SIZE`]; an empty key or a key longer than
/// the cipher width is an error.
pub fn stream_xor(data: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
    if key.is_empty() {
        return Err(CipherError::EmptyKey);
    }
    if key.len() > STREAM_KEY_SIZE {
        return Err(CipherError::KeyTooLong);
    }
    Ok(xor_with(data, &cyclic_key(key)))
}

/// Encrypt (or decrypt) `data` under a full-width key.
pub fn xor_with(data: &[u8], key: &[u8; STREAM_KEY_SIZE]) -> Vec<u8> {
    let mut cipher = ChaCha::new_chacha20(key, &[0u8; STREAM_NONCE_SIZE]);
    let mut out = data.to_vec();
    if cipher.xor_read(&mut out).is_err() {
        // the 64-bit block counter cannot run out on fixed-size messages
        unreachable!();
    }
    out
}

/// Repeat key material cyclically up to the cipher key width.
pub fn cyclic_key(material: &[u8]) -> [u8; STREAM_KEY_SIZE] {
    debug_assert!(!material.is_empty() && material.len() <= STREAM_KEY_SIZE);
    let mut key = [0u8; STREAM_KEY_SIZE];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = material[i % material.len()];
    }
    key
}

/// The full-width key a node name stands for.
pub fn name_key(name: &Name) -> [u8; STREAM_KEY_SIZE] {
    cyclic_key(name)
}

/// XOR `b` into `a` in place.
pub fn xor_assign(a: &mut [u8], b: &[u8]) {
    assert!(a.len() <= b.len());
    for (a_i, &b_i) in a.iter_mut().zip(b.iter()) {
        *a_i ^= b_i;
    }
}
