//! Relay end-to-end tests: idempotent replay and breaker convergence

use giro_e2e::harness::{HubHarness, MockSource, SoloBlockHub, VerifyingDestination};
use giro_primitives::{Address, H256, U256};
use giro_relay::{
    BreakerConfig, BreakerState, CircuitBreaker, DestinationChain, MemoryCheckpoints, RelayConfig,
    RelayService, TransferInitiated,
};
use giro_types::{AuditKind, CommandStatus};
use std::sync::Arc;
use std::time::Duration;

fn initiated(tx: u8, block: u64) -> TransferInitiated {
    TransferInitiated {
        tx_hash: H256::from_bytes([tx; 32]),
        sender: "alice".into(),
        recipient: Address::from_bytes([0xb0; 20]),
        amount: U256::from(100u64),
        dest_chain: "chain-b".into(),
        nonce: 1,
        block_height: block,
        timestamp: 1_700_000_000,
    }
}

/// Property 9 — relay idempotence: replaying the same source event any
/// number of times produces at most one confirmed transfer, one credit
/// issuance, and one executed mint.
#[tokio::test]
async fn relay_replay_is_idempotent() {
    // One validator, threshold 1: the relay's own vote confirms.
    let harness = HubHarness::new(1);
    let key = harness.validators[0].key.clone();
    let validator_addresses: Vec<Address> = harness.validators.iter().map(|v| v.address).collect();
    let hub = Arc::new(SoloBlockHub::new(harness));

    let source = Arc::new(MockSource::new("chain-a"));
    // The same burn event redelivered in three different source blocks
    source.emit(initiated(0x01, 1));
    source.emit(initiated(0x01, 2));
    source.emit(initiated(0x01, 3));

    let dest = Arc::new(VerifyingDestination::new("chain-b", validator_addresses, 1));
    let destinations: Vec<Arc<dyn DestinationChain>> = vec![dest.clone()];

    let handle = RelayService::start(
        RelayConfig {
            poll_interval_ms: 10,
            ..RelayConfig::default()
        },
        vec![source],
        destinations,
        hub.clone(),
        Arc::new(MemoryCheckpoints::new()),
        key,
    );

    // Wait for the pipeline to settle: vote, sign, execute, report
    let mut executed = false;
    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let harness = hub.harness().await;
        let commands = harness
            .hub
            .state()
            .commands_in_status(CommandStatus::Executed)
            .unwrap();
        if !commands.is_empty() {
            executed = true;
            break;
        }
    }
    handle.shutdown().await;
    assert!(executed, "mint command never reached Executed");

    let harness = hub.harness().await;

    // One confirmation, one issuance
    assert_eq!(
        harness
            .hub
            .audit_by_kind(AuditKind::TransferConfirmed)
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        harness.hub.audit_by_kind(AuditKind::CreditIssued).unwrap().len(),
        1
    );
    assert_eq!(
        harness
            .hub
            .balance("chain-b", &giro_types::CreditDenom::for_issuer("chain-a"))
            .unwrap(),
        U256::from(100u64)
    );

    // One mint at the destination
    assert_eq!(dest.minted().len(), 1);
    assert_eq!(
        dest.minted()[0],
        (Address::from_bytes([0xb0; 20]), U256::from(100u64))
    );
}

/// Property 10 — circuit-breaker convergence: any run of N ≥ threshold
/// consecutive failures forces Open; after the cooldown a single
/// successful probe returns the breaker to Closed.
#[test]
fn breaker_converges_for_any_failure_run() {
    for failures in 5u32..12 {
        let mut breaker = CircuitBreaker::new(
            "dest",
            BreakerConfig {
                threshold: 5,
                cooldown_ms: 20,
            },
        );

        for _ in 0..failures {
            if breaker.allow() {
                breaker.record_failure();
            }
        }
        assert_eq!(breaker.state(), BreakerState::Open, "N = {failures}");
        assert!(!breaker.allow());

        std::thread::sleep(Duration::from_millis(25));
        assert!(breaker.allow(), "probe after cooldown, N = {failures}");
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed, "N = {failures}");
    }
}
