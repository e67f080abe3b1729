// error.rs - relay protocol error types
// Copyright (C) 2026  The pcnrelay developers.

use std::error::Error;
use std::fmt;

/// Errors produced by the keystream cipher.
#[derive(Debug, PartialEq, Eq)]
pub enum CipherError {
    EmptyKey,
    KeyTooLong,
}

impl fmt::Display for CipherError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::CipherError::*;
        match *self {
            EmptyKey => write!(f, "Key is empty."),
            KeyTooLong => write!(f, "Key exceeds the cipher key width."),
        }
    }
}

impl Error for CipherError {}

/// Errors produced by curve operations.
#[derive(Debug, PartialEq, Eq)]
pub enum EcdhError {
    InvalidPoint,
    InvalidScalar,
}

impl fmt::Display for EcdhError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::EcdhError::*;
        match *self {
            InvalidPoint => write!(f, "Encoded bytes are not a curve point."),
            InvalidScalar => write!(f, "Encoded bytes are not a curve scalar."),
        }
    }
}

impl Error for EcdhError {}

/// Errors produced while decoding fixed-width wire messages.
#[derive(Debug, PartialEq, Eq)]
pub enum WireError {
    ForwardSizeMismatch,
    BackwardSizeMismatch,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::WireError::*;
        match *self {
            ForwardSizeMismatch => write!(f, "Forward message has the wrong byte length."),
            BackwardSizeMismatch => write!(f, "Backward message has the wrong byte length."),
        }
    }
}

impl Error for WireError {}

/// Errors produced while building an onion route.
#[derive(Debug, PartialEq, Eq)]
pub enum RouteError {
    EmptyRoute,
    TooManyHops,
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::RouteError::*;
        match *self {
            EmptyRoute => write!(f, "Route must name at least one hop."),
            TooManyHops => write!(f, "Route length must not exceed MAX_ROUTE_HOPS."),
        }
    }
}

impl Error for RouteError {}

/// Errors produced by the enclave oracle bridge.
#[derive(Debug)]
pub enum EnclaveError {
    /// Transport-level failure; retried up to the configured bound.
    Connection(String),
    /// The oracle endpoint answered with a non-success HTTP status.
    Status(u16),
    /// The oracle answered, but not in the expected six-line shape.
    MalformedResponse(String),
    /// Structurally valid response with the all-zero output sentinel:
    /// the oracle refused the liquidity change.
    Rejected,
    /// The retry bound for one request is exhausted.
    MaxRetriesReached,
}

impl fmt::Display for EnclaveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::EnclaveError::*;
        match *self {
            Connection(ref err) => write!(f, "Enclave connection failure: {}", err),
            Status(code) => write!(f, "Enclave answered with HTTP status {}.", code),
            MalformedResponse(ref detail) => write!(f, "Malformed enclave response: {}", detail),
            Rejected => write!(f, "Enclave rejected the liquidity change."),
            MaxRetriesReached => write!(f, "Max enclave retries reached."),
        }
    }
}

impl Error for EnclaveError {}

/// Per-message failure of the relay engine. Errors are contained at the
/// message-processing boundary: one failed message never affects another
/// in-flight message or the channel states.
#[derive(Debug)]
pub enum RelayError {
    Cipher(CipherError),
    Ecdh(EcdhError),
    Wire(WireError),
    Route(RouteError),
    Enclave(EnclaveError),
    /// Channel backpressure: the pending-payment ceiling was hit.
    PaymentDeclined,
    /// The message names a payment this node never saw.
    UnknownPayment,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::RelayError::*;
        match *self {
            Cipher(ref err) => err.fmt(f),
            Ecdh(ref err) => err.fmt(f),
            Wire(ref err) => err.fmt(f),
            Route(ref err) => err.fmt(f),
            Enclave(ref err) => err.fmt(f),
            PaymentDeclined => write!(f, "Payment declined due to high concurrent payments."),
            UnknownPayment => write!(f, "Message references an unknown payment."),
        }
    }
}

impl Error for RelayError {}

impl From<CipherError> for RelayError {
    fn from(err: CipherError) -> RelayError {
        RelayError::Cipher(err)
    }
}

impl From<EcdhError> for RelayError {
    fn from(err: EcdhError) -> RelayError {
        RelayError::Ecdh(err)
    }
}

impl From<WireError> for RelayError {
    fn from(err: WireError) -> RelayError {
        RelayError::Wire(err)
    }
}

impl From<RouteError> for RelayError {
    fn from(err: RouteError) -> RelayError {
        RelayError::Route(err)
    }
}

impl From<EnclaveError> for RelayError {
    fn from(err: EnclaveError) -> RelayError {
        RelayError::Enclave(err)
    }
}
