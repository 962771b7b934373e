//! End-to-end scenarios

#![cfg(test)]

use crate::harness::{transfer_event, HubHarness, TestValidator, VerifyingDestination, TEST_ADMIN};
use giro_crypto::keccak256;
use giro_primitives::{Address, H256, U256};
use giro_relay::DestinationChain;
use giro_types::codec::{mint_preimage, ETH_SIGNED_MESSAGE_PREFIX};
use giro_types::{AuditKind, CommandStatus, CreditDenom, HubEvent, HubTx};

fn denom(issuer: &str) -> CreditDenom {
    CreditDenom::for_issuer(issuer)
}

/// S1 — happy path: confirm, issue, sign, execute.
#[tokio::test]
async fn s1_happy_path() {
    let mut h = HubHarness::new(3);
    let event = transfer_event(0x01, 100, 1);

    // V1 and V2 vote; threshold for three validators is 2
    let events = h.confirm_with(&event, 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, HubEvent::TransferConfirmed { tx_hash, vote_count: 2, threshold: 2 }
            if *tx_hash == event.tx_hash)));

    assert_eq!(
        h.hub.balance("chain-b", &denom("chain-a")).unwrap(),
        U256::from(100u64)
    );

    let command_id = HubHarness::command_id_for(&event);
    let command = h.hub.command(&command_id).unwrap().unwrap();

    // The pre-image is exactly the prefixed keccak of the canonical
    // message; rebuild it from first principles and compare bytes.
    let mut inner = Vec::new();
    inner.extend_from_slice(command_id.as_bytes());
    inner.extend_from_slice(event.recipient.as_bytes());
    let mut amount_be = [0u8; 32];
    event.amount.to_big_endian(&mut amount_be);
    inner.extend_from_slice(&amount_be);
    inner.extend_from_slice(&(event.dest_chain.len() as u32).to_be_bytes());
    inner.extend_from_slice(event.dest_chain.as_bytes());

    let mut expected = Vec::new();
    expected.extend_from_slice(b"\x19Ethereum Signed Message:\n32");
    expected.extend_from_slice(keccak256(&inner).as_bytes());

    let preimage = mint_preimage(&command_id, &event.recipient, &event.amount, &event.dest_chain);
    assert_eq!(preimage, expected);
    assert_eq!(&preimage[..28], ETH_SIGNED_MESSAGE_PREFIX);

    // Two signatures reach the threshold
    let events = h.sign_with(&command, 2);
    let signatures = events
        .iter()
        .find_map(|e| match e {
            HubEvent::MintCommandReady { signatures, .. } => Some(signatures.clone()),
            _ => None,
        })
        .expect("command ready");

    // The destination verifies recovery against the validator set and mints
    let dest = VerifyingDestination::new(
        "chain-b",
        h.validators.iter().map(|v| v.address).collect(),
        2,
    );
    dest.execute_mint(command_id, event.recipient, event.amount, signatures)
        .await
        .unwrap();
    assert_eq!(dest.minted(), vec![(event.recipient, U256::from(100u64))]);
}

/// S2 — threshold not met: the status expires without side effects.
#[test]
fn s2_threshold_not_met() {
    let mut h = HubHarness::new(3);
    let event = transfer_event(0x01, 100, 1);

    h.open_block();
    let v0 = h.validators[0].clone();
    h.deliver(v0.address, v0.vote(&event, 1_700_000_000)).unwrap();
    h.seal_block();

    assert!(h.hub.vote_status(&event.tx_hash).unwrap().is_some());

    // voting_timeout = 100 blocks after the status opened at height 1
    let events = h.run_to_height(101);
    assert!(events
        .iter()
        .any(|e| matches!(e, HubEvent::ConsensusTimeout { tx_hash } if *tx_hash == event.tx_hash)));

    assert!(h.hub.vote_status(&event.tx_hash).unwrap().is_none());
    assert!(h
        .hub
        .balance("chain-b", &denom("chain-a"))
        .unwrap()
        .is_zero());
    assert!(h
        .hub
        .command(&HubHarness::command_id_for(&event))
        .unwrap()
        .is_none());
}

/// S3 — conflicting event bodies tally into separate buckets; the
/// majority bucket confirms with its own amount.
#[test]
fn s3_conflicting_event() {
    let mut h = HubHarness::new(3);
    let event_100 = transfer_event(0x01, 100, 1);
    let event_200 = transfer_event(0x01, 200, 1);

    h.open_block();
    let (v0, v1, v2) = (
        h.validators[0].clone(),
        h.validators[1].clone(),
        h.validators[2].clone(),
    );
    h.deliver(v0.address, v0.vote(&event_100, 1)).unwrap();
    h.deliver(v1.address, v1.vote(&event_200, 2)).unwrap();
    let events = h.seal_block();
    assert!(events
        .iter()
        .all(|e| !matches!(e, HubEvent::TransferConfirmed { .. })));

    h.open_block();
    h.deliver(v2.address, v2.vote(&event_100, 3)).unwrap();
    h.seal_block();

    let status = h.hub.vote_status(&event_100.tx_hash).unwrap().unwrap();
    assert!(status.confirmed);
    assert_eq!(status.buckets.len(), 2);
    assert_eq!(
        status.confirmed_event().unwrap().amount,
        U256::from(100u64)
    );

    // Credit was issued for the confirmed amount, not the minority one
    assert_eq!(
        h.hub.balance("chain-b", &denom("chain-a")).unwrap(),
        U256::from(100u64)
    );
}

/// S4 — bilateral netting at the interval block.
#[test]
fn s4_bilateral_netting() {
    let mut h = HubHarness::new(3);

    h.open_block();
    h.deliver(
        TEST_ADMIN,
        HubTx::IssueCredit {
            issuer: "chain-a".into(),
            holder: "chain-b".into(),
            amount: U256::from(100u64),
            origin_tx: H256::from_bytes([0x0a; 32]),
        },
    )
    .unwrap();
    h.deliver(
        TEST_ADMIN,
        HubTx::IssueCredit {
            issuer: "chain-b".into(),
            holder: "chain-a".into(),
            amount: U256::from(30u64),
            origin_tx: H256::from_bytes([0x0b; 32]),
        },
    )
    .unwrap();
    h.seal_block();

    // The cycle fires at block_height = 10
    let events = h.run_to_height(10);
    let (cycle_id, pairs) = events
        .iter()
        .find_map(|e| match e {
            HubEvent::NettingCompleted { cycle_id, pairs, .. } => Some((*cycle_id, pairs.clone())),
            _ => None,
        })
        .expect("netting completed");

    assert_eq!(cycle_id, 1);
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].bank_a, "chain-a");
    assert_eq!(pairs[0].bank_b, "chain-b");
    assert_eq!(pairs[0].amount_a, U256::from(30u64));
    assert_eq!(pairs[0].amount_b, U256::from(100u64));
    assert_eq!(pairs[0].net_amount, U256::from(70u64));
    assert_eq!(pairs[0].net_debtor, "chain-a");

    assert_eq!(
        h.hub.balance("chain-b", &denom("chain-a")).unwrap(),
        U256::from(70u64)
    );
    assert!(h
        .hub
        .balance("chain-a", &denom("chain-b"))
        .unwrap()
        .is_zero());
}

/// S5 — duplicate replay: a re-delivered event is rejected by vote
/// dedupe, and the destination refuses the replayed command id.
#[tokio::test]
async fn s5_duplicate_replay() {
    let mut h = HubHarness::new(3);
    let event = transfer_event(0x01, 100, 1);

    h.confirm_with(&event, 2);
    let command_id = HubHarness::command_id_for(&event);
    let command = h.hub.command(&command_id).unwrap().unwrap();
    let events = h.sign_with(&command, 2);
    let signatures = events
        .iter()
        .find_map(|e| match e {
            HubEvent::MintCommandReady { signatures, .. } => Some(signatures.clone()),
            _ => None,
        })
        .unwrap();

    // Relay re-delivers the same TransferInitiated: every vote rejects
    h.open_block();
    for validator in h.validators[..2].to_vec() {
        let err = h
            .deliver(validator.address, validator.vote(&event, 9))
            .unwrap_err();
        assert_eq!(err.code(), "duplicate_vote");
    }
    h.seal_block();

    // Exactly one credit issuance happened
    assert_eq!(
        h.hub.balance("chain-b", &denom("chain-a")).unwrap(),
        U256::from(100u64)
    );
    assert_eq!(h.hub.audit_by_kind(AuditKind::CreditIssued).unwrap().len(), 1);

    // The destination executes once, then reverts the replay
    let dest = VerifyingDestination::new(
        "chain-b",
        h.validators.iter().map(|v| v.address).collect(),
        2,
    );
    dest.execute_mint(command_id, event.recipient, event.amount, signatures.clone())
        .await
        .unwrap();
    assert!(dest.is_processed(&command_id));

    let err = dest
        .execute_mint(command_id, event.recipient, event.amount, signatures)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already processed"));
    assert_eq!(dest.minted().len(), 1);
}

/// S6 — validator rotation mid-flight: a command pinned to the old set
/// version still collects and validates signatures.
#[test]
fn s6_rotation_mid_flight() {
    let mut h = HubHarness::new(3);
    let event = transfer_event(0x01, 100, 1);

    h.confirm_with(&event, 2);
    let command_id = HubHarness::command_id_for(&event);
    let command = h.hub.command(&command_id).unwrap().unwrap();
    let pinned_version = command.validator_set_version;

    // V3 is removed before signatures arrive
    h.open_block();
    let removed = h.validators[2].address;
    h.deliver(TEST_ADMIN, HubTx::RemoveValidator { address: removed })
        .unwrap();
    h.seal_block();
    let live = h.hub.validator_set().unwrap().unwrap();
    assert_eq!(live.version, pinned_version + 1);

    // The remaining two sign; the command validates against the pinned set
    let events = h.sign_with(&command, 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, HubEvent::MintCommandReady { validator_set_version, .. }
            if *validator_set_version == pinned_version)));
    assert_eq!(
        h.hub.command(&command_id).unwrap().unwrap().status,
        CommandStatus::Signed
    );
}

/// Signing timeout: a pending command that never reaches threshold is
/// failed by the end-block sweep.
#[test]
fn signing_timeout_fails_command() {
    let mut h = HubHarness::new(3);
    let event = transfer_event(0x01, 100, 1);

    h.confirm_with(&event, 2);
    let command_id = HubHarness::command_id_for(&event);

    // signing_timeout = 50 blocks from creation at height 1
    h.run_to_height(51);
    assert_eq!(
        h.hub.command(&command_id).unwrap().unwrap().status,
        CommandStatus::Failed
    );
    assert!(!h
        .hub
        .audit_by_kind(AuditKind::CommandFailed)
        .unwrap()
        .is_empty());
}

/// A destination with a stale validator set refuses signatures after its
/// trusted set rotates away from the signers.
#[tokio::test]
async fn destination_rejects_untrusted_signers() {
    let mut h = HubHarness::new(3);
    let event = transfer_event(0x01, 100, 1);

    h.confirm_with(&event, 2);
    let command_id = HubHarness::command_id_for(&event);
    let command = h.hub.command(&command_id).unwrap().unwrap();
    let events = h.sign_with(&command, 2);
    let signatures = events
        .iter()
        .find_map(|e| match e {
            HubEvent::MintCommandReady { signatures, .. } => Some(signatures.clone()),
            _ => None,
        })
        .unwrap();

    // Destination trusts a disjoint set of validators
    let strangers: Vec<Address> = (0..3).map(|_| TestValidator::random().address).collect();
    let dest = VerifyingDestination::new("chain-b", strangers, 2);
    let err = dest
        .execute_mint(command_id, event.recipient, event.amount, signatures)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid signature"));
    assert!(dest.minted().is_empty());
}
