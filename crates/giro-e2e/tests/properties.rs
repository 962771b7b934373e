//! Property tests for the hub's universal invariants

use giro_crypto::encode_pubkey;
use giro_e2e::harness::{transfer_event, HubHarness, TestValidator};
use giro_ledger::{CreditLedger, NettingEngine};
use giro_multisig::{CommandBuilder, MultisigError, SignatureOutcome};
use giro_oracle::{BlockContext, VotingEngine};
use giro_primitives::{H256, U256};
use giro_store::HubState;
use giro_types::codec::{event_hash, mint_preimage};
use giro_types::{CreditDenom, HubParams, Validator, ValidatorSet, Vote};
use proptest::prelude::*;

const CTX: BlockContext = BlockContext {
    height: 10,
    time: 1_700_000_000,
};

fn oracle_state(validators: &[TestValidator]) -> HubState {
    let set = ValidatorSet::from_validators(
        validators
            .iter()
            .map(|v| Validator::new(v.address, encode_pubkey(v.key.verifying_key()), 1, 0))
            .collect(),
        0,
        1,
    );
    let mut state = HubState::new();
    state.put_validator_set(set);
    state
}

fn signed_vote(validator: &TestValidator, event: &giro_types::TransferEvent) -> Vote {
    let digest = event_hash(event);
    Vote {
        validator: validator.address,
        event: event.clone(),
        signature: giro_crypto::sign(&digest, &validator.key).unwrap(),
        vote_time: 1_700_000_000,
    }
}

fn ceil_two_thirds(n: usize) -> u32 {
    ((2 * n + 2) / 3) as u32
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1+2 — consensus safety and vote dedupe: a transfer
    /// confirms iff some event-body bucket collects `ceil(2n/3)` votes
    /// from distinct active validators, and no validator is ever counted
    /// twice regardless of replays.
    #[test]
    fn consensus_safety_and_dedupe(
        n in 1usize..6,
        choices in prop::collection::vec(0u8..3, 1..12),
        replays in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
    ) {
        let validators: Vec<TestValidator> = (0..n).map(|_| TestValidator::random()).collect();
        let mut state = oracle_state(&validators);
        let engine = VotingEngine::new(100);

        let event_a = transfer_event(0x01, 100, 1);
        let event_b = transfer_event(0x01, 200, 1);

        // Each validator votes at most once, for body A or body B
        let mut intended_a = 0u32;
        let mut intended_b = 0u32;
        let mut submitted = Vec::new();
        for (i, validator) in validators.iter().enumerate() {
            match choices.get(i).copied().unwrap_or(0) {
                1 => {
                    intended_a += 1;
                    submitted.push(signed_vote(validator, &event_a));
                }
                2 => {
                    intended_b += 1;
                    submitted.push(signed_vote(validator, &event_b));
                }
                _ => {}
            }
        }
        // Replay some votes verbatim
        for index in &replays {
            if !submitted.is_empty() {
                submitted.push(index.get(&submitted).clone());
            }
        }

        for vote in submitted {
            let _ = engine.submit_vote(&mut state, vote, &CTX);
        }

        let threshold = ceil_two_thirds(n);
        let should_confirm = intended_a >= threshold || intended_b >= threshold;
        let status = state.vote_status(&event_a.tx_hash).unwrap();

        match status {
            Some(status) => {
                prop_assert_eq!(status.confirmed, should_confirm);
                // Dedupe: every voter appears exactly once across buckets
                let mut seen = std::collections::HashSet::new();
                for bucket in status.buckets.values() {
                    for (voter, _, _) in &bucket.votes {
                        prop_assert!(seen.insert(*voter), "validator counted twice");
                    }
                }
                if let Some(winner) = status.confirmed_event_hash {
                    let winning = &status.buckets[&winner];
                    prop_assert!(winning.vote_count() >= status.threshold);
                }
            }
            None => prop_assert!(!should_confirm),
        }
    }
}

proptest! {
    /// Property 3+4 — burn–mint conservation and the self-credit ban
    /// under arbitrary issue/burn/netting interleavings.
    #[test]
    fn conservation_and_self_credit(
        ops in prop::collection::vec((0u8..3, 0usize..4, 0usize..4, 1u64..500), 1..40),
    ) {
        let banks = ["bank-a", "bank-b", "bank-c", "bank-d"];
        let mut state = HubState::new();
        let ledger = CreditLedger::new();
        let netting = NettingEngine::new(1, 100);
        let mut height = 0u64;

        for (op, i, h, amount) in ops {
            let issuer = banks[i];
            let holder = banks[h];
            match op {
                0 => {
                    // Self-issuance must always be rejected
                    let result = ledger.issue(&mut state, issuer, holder, U256::from(amount));
                    if issuer == holder {
                        prop_assert!(result.is_err());
                    }
                }
                1 => {
                    let denom = CreditDenom::for_issuer(issuer);
                    let balance = state.balance(holder, &denom).unwrap();
                    if !balance.is_zero() {
                        let burn = U256::from(amount).min(balance);
                        ledger.burn(&mut state, holder, &denom, burn).unwrap();
                    }
                }
                _ => {
                    height += 1;
                    netting.run_cycle(&mut state, height, height).unwrap();
                }
            }
        }

        // Conservation: outstanding equals the holder-balance sum per denom
        ledger.check_invariants(&state).unwrap();
        // Self-credit: nobody holds their own paper
        for bank in banks {
            let own = CreditDenom::for_issuer(bank);
            prop_assert!(state.balance(bank, &own).unwrap().is_zero());
        }
    }

    /// Property 5+6 — bilateral offset and netting non-expansion over a
    /// random obligation matrix.
    #[test]
    fn netting_offsets_and_never_expands(
        positions in prop::collection::vec((0usize..4, 0usize..4, 1u64..1000), 0..12),
    ) {
        let banks = ["bank-a", "bank-b", "bank-c", "bank-d"];
        let mut state = HubState::new();
        let ledger = CreditLedger::new();
        for (i, h, amount) in positions {
            if i != h {
                ledger
                    .issue(&mut state, banks[i], banks[h], U256::from(amount))
                    .unwrap();
            }
        }

        let total = |state: &HubState| -> U256 {
            state
                .all_outstanding()
                .unwrap()
                .values()
                .fold(U256::zero(), |acc, v| acc + *v)
        };

        let netting = NettingEngine::new(1, 100);
        let had_mutual = !netting.eligible_pairs(&state).unwrap().is_empty();
        let before = total(&state);
        let cycle = netting.run_cycle(&mut state, 10, 1000).unwrap();
        let after = total(&state);

        // Non-expansion, strict decrease iff some pair was mutual
        prop_assert!(after <= before);
        prop_assert_eq!(after < before, had_mutual);
        prop_assert_eq!(!cycle.pairs.is_empty(), had_mutual);

        // Offset: afterwards no pair owes in both directions
        for a in banks {
            for b in banks {
                if a < b {
                    let pos = ledger.debt_position(&state, a, b).unwrap();
                    prop_assert!(pos.owe_ab.is_zero() || pos.owe_ba.is_zero());
                }
            }
        }
        ledger.check_invariants(&state).unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 7 — command determinism: two hubs fed the same confirmed
    /// event produce bitwise-equal command ids and pre-images.
    #[test]
    fn command_determinism(
        tx in 1u8..255,
        amount in 1u64..u64::MAX,
        nonce in 0u64..u64::MAX,
    ) {
        let validators: Vec<TestValidator> = (0..3).map(|_| TestValidator::random()).collect();
        let mut hub_one = HubHarness::with_validators(validators.clone(), HubParams::default());
        let mut hub_two = HubHarness::with_validators(validators, HubParams::default());

        let event = transfer_event(tx, 1, nonce);
        let mut event = event;
        event.amount = U256::from(amount);

        hub_one.confirm_with(&event, 2);
        hub_two.confirm_with(&event, 2);

        let id = HubHarness::command_id_for(&event);
        let one = hub_one.hub.command(&id).unwrap().unwrap();
        let two = hub_two.hub.command(&id).unwrap().unwrap();

        prop_assert_eq!(one.command_id, two.command_id);
        prop_assert_eq!(
            mint_preimage(&one.command_id, &one.recipient, &one.amount, &one.target_chain),
            mint_preimage(&two.command_id, &two.recipient, &two.amount, &two.target_chain)
        );
    }

    /// Property 8 — signature admission: the builder accepts exactly the
    /// distinct candidates whose recovery lands in the pinned set, up to
    /// the threshold that flips the command to Signed.
    #[test]
    fn signature_admission_counts(
        n in 3usize..6,
        valid in 0usize..6,
        outsiders in 0usize..3,
    ) {
        let validators: Vec<TestValidator> = (0..n).map(|_| TestValidator::random()).collect();
        let mut state = oracle_state(&validators);
        let builder = CommandBuilder::new(50, 1);
        let event = transfer_event(0x01, 100, 1);
        let command = builder.build_command(&mut state, &event, 10).unwrap();

        let valid = valid.min(n);
        let threshold = ceil_two_thirds(n) as usize;
        let mut accepted = 0usize;

        for validator in &validators[..valid] {
            let digest = giro_types::codec::mint_digest(
                &command.command_id,
                &command.recipient,
                &command.amount,
                &command.target_chain,
            );
            let signature = giro_crypto::sign(&digest, &validator.key).unwrap();
            match builder.submit_signature(&mut state, &command.command_id, validator.address, signature) {
                Ok(SignatureOutcome::Added { .. }) | Ok(SignatureOutcome::Signed { .. }) => {
                    accepted += 1
                }
                Err(MultisigError::CommandNotPending { .. }) => {}
                Err(other) => return Err(TestCaseError::fail(format!("unexpected: {other}"))),
            }
        }
        for _ in 0..outsiders {
            let stranger = TestValidator::random();
            let digest = giro_types::codec::mint_digest(
                &command.command_id,
                &command.recipient,
                &command.amount,
                &command.target_chain,
            );
            let signature = giro_crypto::sign(&digest, &stranger.key).unwrap();
            let result = builder.submit_signature(
                &mut state,
                &command.command_id,
                stranger.address,
                signature,
            );
            prop_assert!(result.is_err());
        }

        // Accepted count is the valid distinct signers, capped at the
        // threshold that sealed the command
        prop_assert_eq!(accepted, valid.min(threshold));
        let stored = state.command(&command.command_id).unwrap().unwrap();
        prop_assert_eq!(stored.signature_count() as usize, accepted);
    }
}

/// The tx-hash bucket key is the canonical event hash: equal bodies land
/// in one bucket, different bodies never collide.
#[test]
fn event_hash_buckets_are_injective_on_samples() {
    let base = transfer_event(0x01, 100, 1);
    let mut other = base.clone();
    other.amount = U256::from(101u64);
    assert_ne!(event_hash(&base), event_hash(&other));
    assert_eq!(event_hash(&base), event_hash(&base.clone()));
    assert_ne!(
        H256::from(*event_hash(&base).as_bytes()),
        H256::from(*event_hash(&other).as_bytes())
    );
}
