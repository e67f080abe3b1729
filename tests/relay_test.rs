// relay_test.rs - end-to-end payment route scenarios
// Copyright (C) 2026  The pcnrelay developers.

use std::sync::Arc;

use pcnrelay::channel::ChannelState;
use pcnrelay::config::RelayConfig;
use pcnrelay::constants::{Name, PaymentId, TRANSACTION_SIZE};
use pcnrelay::enclave::{Enclave, EnclaveOutput, PassthroughEnclave, SimulatedEnclave};
use pcnrelay::error::{EnclaveError, RelayError};
use pcnrelay::relay::{BackwardOutcome, ForwardOutcome, Relay};

const ALICE: Name = *b"alice";
const RELAY1: Name = *b"..rl1";
const RELAY2: Name = *b"..rl2";
const BOB: Name = *b"..bob";

fn new_network(enclave: Arc<dyn Enclave>, config: RelayConfig) -> Vec<Relay> {
    [ALICE, RELAY1, RELAY2, BOB]
        .iter()
        .map(|name| Relay::new(*name, config.clone(), Arc::clone(&enclave)))
        .collect()
}

fn expect_relay(outcome: ForwardOutcome) -> (Name, Vec<u8>) {
    match outcome {
        ForwardOutcome::Relay { next_hop, message } => (next_hop, message),
        other => panic!("expected an intermediate hop, got {:?}", other),
    }
}

fn expect_backward_relay(outcome: BackwardOutcome) -> (Name, Vec<u8>) {
    match outcome {
        BackwardOutcome::Relay { next_hop, message } => (next_hop, message),
        other => panic!("expected a backward relay, got {:?}", other),
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn four_node_route_test() {
    init_logging();
    let enclave: Arc<dyn Enclave> = Arc::new(SimulatedEnclave::new());
    let mut nodes = new_network(enclave, RelayConfig::default());
    let mut bob = nodes.pop().unwrap();
    let mut relay2 = nodes.pop().unwrap();
    let mut relay1 = nodes.pop().unwrap();
    let mut alice = nodes.pop().unwrap();

    let payment = bob.ask_for_payment().unwrap();
    let (first_hop, wire) = alice.be_alice(&[RELAY1, RELAY2, BOB], &payment, 10).unwrap();
    assert_eq!(first_hop, RELAY1);

    // forward leg
    let (next, wire) = expect_relay(relay1.process_forward_message(&wire).unwrap());
    assert_eq!(next, RELAY2);
    assert_eq!(relay1.channel(&ALICE).unwrap().pending_payments.len(), 1);

    let (next, wire) = expect_relay(relay2.process_forward_message(&wire).unwrap());
    assert_eq!(next, BOB);
    assert_eq!(relay2.channel(&RELAY1).unwrap().pending_payments.len(), 1);

    let (previous_hop, wire) = match bob.process_forward_message(&wire).unwrap() {
        ForwardOutcome::Terminal { previous_hop, message } => (previous_hop, message),
        other => panic!("expected the terminal hop, got {:?}", other),
    };
    assert_eq!(previous_hop, RELAY2);
    assert_eq!(bob.total_pending(), 0);
    assert_eq!(bob.input_messages().len(), 1);

    // backward leg resolves each hop and credits the decoded amount
    let (next, wire) = expect_backward_relay(relay2.process_backward_message(&wire).unwrap());
    assert_eq!(next, RELAY1);
    assert_eq!(relay2.total_pending(), 0);
    assert_eq!(relay2.channel(&RELAY1).unwrap().liquidity, 100_010);

    let (next, wire) = expect_backward_relay(relay1.process_backward_message(&wire).unwrap());
    assert_eq!(next, ALICE);
    assert_eq!(relay1.total_pending(), 0);
    assert_eq!(relay1.channel(&ALICE).unwrap().liquidity, 100_010);

    match alice.process_backward_message(&wire).unwrap() {
        BackwardOutcome::Completed => {}
        other => panic!("expected completion at the originator, got {:?}", other),
    }
    assert!(alice.payment_timing(&payment).unwrap().elapsed().is_some());
    assert!(alice.input_messages().is_empty());
    assert!(relay1.input_messages().is_empty());
    assert!(relay2.input_messages().is_empty());
}

#[test]
fn skip_enclave_route_test() {
    init_logging();
    let enclave: Arc<dyn Enclave> = Arc::new(PassthroughEnclave);
    let config = RelayConfig {
        skip_crypto_validation: true,
        ..RelayConfig::default()
    };
    let mut alice = Relay::new(ALICE, config.clone(), Arc::clone(&enclave));
    let mut relay1 = Relay::new(RELAY1, config.clone(), Arc::clone(&enclave));
    let mut bob = Relay::new(BOB, config, Arc::clone(&enclave));

    let payment = bob.ask_for_payment().unwrap();
    let (_, wire) = alice.be_alice(&[RELAY1, BOB], &payment, 10).unwrap();

    let (next, wire) = expect_relay(relay1.process_forward_message(&wire).unwrap());
    assert_eq!(next, BOB);
    let (_, wire) = match bob.process_forward_message(&wire).unwrap() {
        ForwardOutcome::Terminal { previous_hop, message } => (previous_hop, message),
        other => panic!("expected the terminal hop, got {:?}", other),
    };

    let (next, wire) = expect_backward_relay(relay1.process_backward_message(&wire).unwrap());
    assert_eq!(next, ALICE);
    assert_eq!(relay1.total_pending(), 0);
    // the escape hatch resolves without touching liquidity
    assert_eq!(relay1.channel(&ALICE).unwrap().liquidity, 100_000);

    match alice.process_backward_message(&wire).unwrap() {
        BackwardOutcome::Completed => {}
        other => panic!("expected completion at the originator, got {:?}", other),
    }
}

#[test]
fn capacity_ceiling_test() {
    let enclave: Arc<dyn Enclave> = Arc::new(SimulatedEnclave::new());
    let config = RelayConfig {
        max_pending_payments: 1,
        ..RelayConfig::default()
    };
    let mut alice = Relay::new(ALICE, config.clone(), Arc::clone(&enclave));
    let mut relay1 = Relay::new(RELAY1, config.clone(), Arc::clone(&enclave));
    let mut bob = Relay::new(BOB, config, Arc::clone(&enclave));

    // the ceiling declines the first forward that finds more than
    // max_pending_payments entries already in flight
    for expected_pending in [1usize, 2] {
        let payment = bob.ask_for_payment().unwrap();
        let (_, wire) = alice.be_alice(&[RELAY1, BOB], &payment, 10).unwrap();
        expect_relay(relay1.process_forward_message(&wire).unwrap());
        assert_eq!(relay1.total_pending(), expected_pending);
    }

    let payment = bob.ask_for_payment().unwrap();
    let (_, wire) = alice.be_alice(&[RELAY1, BOB], &payment, 10).unwrap();
    match relay1.process_forward_message(&wire).unwrap() {
        ForwardOutcome::Declined => {}
        other => panic!("expected a declined payment, got {:?}", other),
    }
    assert_eq!(relay1.total_pending(), 2);
}

/// An oracle that always fails, for containment checks.
struct UnreachableEnclave;

impl Enclave for UnreachableEnclave {
    fn trigger(
        &self,
        _secret_pubkey: &PaymentId,
        _encrypted_given_amount: &[u8; TRANSACTION_SIZE],
        _encrypted_key: &[u8; TRANSACTION_SIZE],
        _channel: &ChannelState,
    ) -> Result<EnclaveOutput, EnclaveError> {
        Err(EnclaveError::MaxRetriesReached)
    }
}

#[test]
fn enclave_failure_containment_test() {
    let mut alice = Relay::new(
        ALICE,
        RelayConfig::default(),
        Arc::new(SimulatedEnclave::new()),
    );
    let mut bob = Relay::new(
        BOB,
        RelayConfig::default(),
        Arc::new(SimulatedEnclave::new()),
    );
    let mut relay1 = Relay::new(RELAY1, RelayConfig::default(), Arc::new(UnreachableEnclave));

    let payment = bob.ask_for_payment().unwrap();
    let (_, wire) = alice.be_alice(&[RELAY1, BOB], &payment, 10).unwrap();

    // the failed hop surfaces an error for this message only and records
    // no pending payment
    match relay1.process_forward_message(&wire) {
        Err(RelayError::Enclave(EnclaveError::MaxRetriesReached)) => {}
        other => panic!("expected an enclave failure, got {:?}", other),
    }
    assert_eq!(relay1.total_pending(), 0);
    assert_eq!(relay1.channel(&ALICE).unwrap().liquidity, 100_000);
}

#[test]
fn terminal_without_secret_test() {
    let enclave: Arc<dyn Enclave> = Arc::new(SimulatedEnclave::new());
    let mut alice = Relay::new(ALICE, RelayConfig::default(), Arc::clone(&enclave));
    let mut bob = Relay::new(BOB, RelayConfig::default(), Arc::clone(&enclave));
    let mut stranger = Relay::new(RELAY2, RelayConfig::default(), Arc::clone(&enclave));

    let payment = bob.ask_for_payment().unwrap();
    // the route terminates at a node that never asked for this payment
    let (_, wire) = alice.be_alice(&[RELAY2], &payment, 10).unwrap();
    match stranger.process_forward_message(&wire) {
        Err(RelayError::UnknownPayment) => {}
        other => panic!("expected UnknownPayment, got {:?}", other),
    }
}
