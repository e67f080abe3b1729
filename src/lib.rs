// lib.rs - onion-routed payment channel relay library
// Copyright (C) 2026  The pcnrelay developers.

//! An implementation of the relay protocol core for an onion-routed,
//! privacy-preserving payment channel network.
//!
//! Payments travel from a payer ("Alice") through a chain of relays to a
//! payee ("Bob") and back, without any single relay learning the full route
//! or the payment's endpoints. Every hop peels one layer of the onion
//! route, has an external enclave oracle authorize the liquidity change,
//! records the payment as pending on the inbound channel and forwards a
//! re-encrypted message. The terminal hop answers with a backward message
//! carrying its payment secret, which resolves the pending payments hop by
//! hop on the way back to the originator.
//!
//! The crate defines the wire byte formats and the per-node state machine.
//! Transport, process orchestration and blockchain settlement are external
//! collaborators.
//!
//! # Concurrency contract
//!
//! A [`relay::Relay`] mutates its channel states through `&mut self`;
//! callers that process messages concurrently must serialize access per
//! relay (a lock or a single-writer actor). The enclave client serializes
//! itself: one in-flight oracle call process-wide, however many relays
//! share it.

#[macro_use]
extern crate arrayref;

pub mod channel;
pub mod config;
pub mod constants;
pub mod ecdh;
pub mod enclave;
pub mod error;
pub mod relay;
pub mod route;
pub mod stream;
pub mod wire;
