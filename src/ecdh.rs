// ecdh.rs - secp256r1 key material and shared-secret derivation
// Copyright (C) 2026  The pcnrelay developers.

//! Curve operations behind the payment identifiers and amount encryption.
//! Points travel on the wire as 64 bytes (x then y, both little-endian)
//! and scalars as 32 bytes little-endian. A shared secret is the
//! Keccak-256 digest of the little-endian x-coordinate of the
//! Diffie-Hellman point; both conventions must be preserved exactly for
//! interoperability with the enclave.

use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::elliptic_curve::PrimeField;
use p256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};
use tiny_keccak::{Hasher, Keccak};

use crate::constants::{PaymentId, Secret, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE};
use crate::error::EcdhError;

/// The shared-secret digest width in bytes.
pub const SHARED_SECRET_SIZE: usize = 32;

/// Decode a wire scalar (little-endian).
pub fn scalar_from_le_bytes(secret: &Secret) -> Result<Scalar, EcdhError> {
    let mut repr = *secret;
    repr.reverse();
    Option::from(Scalar::from_repr(FieldBytes::from(repr))).ok_or(EcdhError::InvalidScalar)
}

/// Encode a scalar for the wire (little-endian).
pub fn scalar_to_le_bytes(secret: &Scalar) -> Secret {
    let mut out: Secret = secret.to_repr().into();
    out.reverse();
    out
}

/// The public point of a scalar, in wire encoding. The identity (zero
/// scalar) has no affine encoding and is an error.
pub fn secret_to_pubkey(secret: &Scalar) -> Result<PaymentId, EcdhError> {
    point_to_bytes(&(ProjectivePoint::GENERATOR * secret).to_affine())
}

/// Decode a wire point.
pub fn bytes_to_point(public: &PaymentId) -> Result<AffinePoint, EcdhError> {
    let mut x = [0u8; SECRET_KEY_SIZE];
    x.copy_from_slice(&public[..SECRET_KEY_SIZE]);
    x.reverse();
    let mut y = [0u8; SECRET_KEY_SIZE];
    y.copy_from_slice(&public[SECRET_KEY_SIZE..]);
    y.reverse();
    let encoded =
        EncodedPoint::from_affine_coordinates(&FieldBytes::from(x), &FieldBytes::from(y), false);
    Option::from(AffinePoint::from_encoded_point(&encoded)).ok_or(EcdhError::InvalidPoint)
}

fn point_to_bytes(point: &AffinePoint) -> Result<PaymentId, EcdhError> {
    let encoded = point.to_encoded_point(false);
    let x = encoded.x().ok_or(EcdhError::InvalidPoint)?;
    let y = encoded.y().ok_or(EcdhError::InvalidPoint)?;
    let mut out = [0u8; PUBLIC_KEY_SIZE];
    for (i, byte) in x.iter().enumerate() {
        out[SECRET_KEY_SIZE - 1 - i] = *byte;
    }
    for (i, byte) in y.iter().enumerate() {
        out[PUBLIC_KEY_SIZE - 1 - i] = *byte;
    }
    Ok(out)
}

/// Derive the shared secret between a scalar and a wire-encoded point:
/// Keccak-256 over the little-endian x-coordinate of `secret * public`.
pub fn find_shared_secret(
    secret: &Scalar,
    public: &PaymentId,
) -> Result<[u8; SHARED_SECRET_SIZE], EcdhError> {
    let point = bytes_to_point(public)?;
    let shared = (ProjectivePoint::from(point) * secret).to_affine();
    let encoded = shared.to_encoded_point(false);
    let x = encoded.x().ok_or(EcdhError::InvalidPoint)?;
    let mut x_le = [0u8; SECRET_KEY_SIZE];
    x_le.copy_from_slice(x);
    x_le.reverse();
    let mut digest = [0u8; SHARED_SECRET_SIZE];
    let mut keccak = Keccak::v256();
    keccak.update(&x_le);
    keccak.finalize(&mut digest);
    Ok(digest)
}

/// XOR `data` with the shared-secret digest prefix.
pub fn xor_by_ecdh(
    data: &[u8],
    secret: &Scalar,
    public: &PaymentId,
) -> Result<Vec<u8>, EcdhError> {
    let shared = find_shared_secret(secret, public)?;
    Ok(data
        .iter()
        .zip(shared.iter())
        .map(|(a, b)| a ^ b)
        .collect())
}
