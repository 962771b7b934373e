//! Vote admission, tally buckets, and threshold confirmation

use crate::error::{OracleError, OracleResult};
use giro_crypto::recover_signer;
use giro_primitives::H256;
use giro_store::HubState;
use giro_types::codec::event_hash;
use giro_types::{TallyBucket, TransferEvent, Vote, VoteStatus};
use tracing::{debug, info};

/// Block coordinates every state-mutating operation runs under
#[derive(Debug, Clone, Copy)]
pub struct BlockContext {
    /// Current hub block height
    pub height: u64,
    /// Current hub block timestamp
    pub time: u64,
}

/// What a submitted vote did to the tally
#[derive(Debug, Clone)]
pub enum VoteOutcome {
    /// The vote was tallied; the transfer is still open
    Accepted {
        /// Votes in the bucket this vote joined
        bucket_votes: u32,
        /// Frozen threshold
        threshold: u32,
    },
    /// The vote was tallied and its bucket reached the threshold
    Confirmed {
        /// The event data of the winning bucket (first-seen body)
        event: TransferEvent,
        /// Votes in the winning bucket
        vote_count: u32,
        /// Frozen threshold
        threshold: u32,
    },
}

/// The voting engine.
///
/// Stateless over [`HubState`]: every call reads and writes the store so
/// that the hosting block transaction controls atomicity.
#[derive(Debug, Clone)]
pub struct VotingEngine {
    /// Open statuses expire this many blocks after creation
    voting_timeout: u64,
}

impl VotingEngine {
    /// Create an engine with the given voting timeout (in blocks)
    pub fn new(voting_timeout: u64) -> Self {
        Self { voting_timeout }
    }

    /// Admit and tally one vote.
    ///
    /// Rejection order: unknown/inactive validator, malformed event,
    /// terminal status, duplicate `(tx_hash, validator)`, bad signature.
    /// None of the rejections mutate state.
    pub fn submit_vote(
        &self,
        state: &mut HubState,
        vote: Vote,
        ctx: &BlockContext,
    ) -> OracleResult<VoteOutcome> {
        let validators = state.validator_set()?.ok_or(OracleError::NoValidatorSet)?;
        if !validators.is_active(&vote.validator) {
            return Err(OracleError::NotValidator(vote.validator));
        }

        vote.event.validate()?;
        let tx_hash = vote.tx_hash();
        let bucket_key = event_hash(&vote.event);

        let mut status = match state.vote_status(&tx_hash)? {
            Some(status) => {
                if status.confirmed {
                    // Terminal: replayed confirmations must not re-tally.
                    if status.has_voted(&vote.validator) {
                        return Err(OracleError::DuplicateVote {
                            tx_hash,
                            validator: vote.validator,
                        });
                    }
                    return Err(OracleError::AlreadyConfirmed(tx_hash));
                }
                if status.has_voted(&vote.validator) {
                    return Err(OracleError::DuplicateVote {
                        tx_hash,
                        validator: vote.validator,
                    });
                }
                status
            }
            None => {
                // First vote opens the status with a threshold snapshot.
                let mut status = VoteStatus::open(
                    vote.event.clone(),
                    bucket_key,
                    validators.threshold,
                    ctx.height,
                    ctx.height + self.voting_timeout,
                );
                status.tx_hash = tx_hash;
                status
            }
        };

        // The signature covers the canonical bytes of the event exactly as
        // this validator observed them.
        let recovered = recover_signer(&bucket_key, &vote.signature)
            .map_err(|e| OracleError::InvalidSignature(e.to_string()))?;
        if recovered != vote.validator {
            return Err(OracleError::InvalidSignature(format!(
                "recovered {recovered}, vote claims {}",
                vote.validator
            )));
        }

        // Tally into the bucket for this event body; first-seen body wins
        // for the bucket's stored event.
        let bucket = status.buckets.entry(bucket_key).or_insert_with(|| TallyBucket {
            event: vote.event.clone(),
            votes: Vec::new(),
        });
        bucket.votes.push((vote.validator, vote.signature, vote.vote_time));
        let bucket_votes = bucket.vote_count();
        let threshold = status.threshold;

        debug!(
            %tx_hash,
            validator = %vote.validator,
            bucket_votes,
            threshold,
            "vote tallied"
        );

        if bucket_votes >= threshold {
            status.confirmed = true;
            status.confirmed_event_hash = Some(bucket_key);
            status.confirmed_at = Some(ctx.height);
            let event = bucket.event.clone();
            state.put_vote_status(status);

            info!(%tx_hash, vote_count = bucket_votes, threshold, "transfer confirmed");
            return Ok(VoteOutcome::Confirmed {
                event,
                vote_count: bucket_votes,
                threshold,
            });
        }

        state.put_vote_status(status);
        Ok(VoteOutcome::Accepted {
            bucket_votes,
            threshold,
        })
    }

    /// Read a vote status
    pub fn vote_status(
        &self,
        state: &HubState,
        tx_hash: &H256,
    ) -> OracleResult<Option<VoteStatus>> {
        Ok(state.vote_status(tx_hash)?)
    }

    /// Expire open statuses past their deadline.
    ///
    /// Returns the expired transfer hashes; confirmed statuses are never
    /// touched.
    pub fn expire(&self, state: &mut HubState, ctx: &BlockContext) -> OracleResult<Vec<H256>> {
        let mut expired = Vec::new();
        for status in state.all_vote_statuses()? {
            if status.is_open() && ctx.height >= status.expires_at {
                expired.push(status.tx_hash);
            }
        }
        for tx_hash in &expired {
            state.remove_vote_status(tx_hash);
            info!(%tx_hash, "vote status expired without reaching threshold");
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use giro_crypto::{public_key_to_address, sign, PrivateKey};
    use giro_primitives::{Address, U256};
    use giro_types::{Validator, ValidatorSet};
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    struct TestValidator {
        key: PrivateKey,
        address: Address,
    }

    impl TestValidator {
        fn random() -> Self {
            let key = SigningKey::random(&mut OsRng);
            let address = public_key_to_address(key.verifying_key());
            Self { key, address }
        }

        fn vote(&self, event: &TransferEvent, vote_time: u64) -> Vote {
            let digest = event_hash(event);
            Vote {
                validator: self.address,
                event: event.clone(),
                signature: sign(&digest, &self.key).unwrap(),
                vote_time,
            }
        }
    }

    fn setup(n: usize) -> (HubState, Vec<TestValidator>) {
        let validators: Vec<TestValidator> = (0..n).map(|_| TestValidator::random()).collect();
        let set = ValidatorSet::from_validators(
            validators
                .iter()
                .map(|v| {
                    Validator::new(
                        v.address,
                        giro_crypto::encode_pubkey(v.key.verifying_key()),
                        1,
                        0,
                    )
                })
                .collect(),
            0,
            1,
        );
        let mut state = HubState::new();
        state.put_validator_set(set);
        (state, validators)
    }

    fn sample_event(amount: u64) -> TransferEvent {
        TransferEvent {
            tx_hash: H256::from_bytes([0x01; 32]),
            source_chain: "chain-a".into(),
            dest_chain: "chain-b".into(),
            sender: "alice".into(),
            recipient: Address::from_bytes([0x22; 20]),
            amount: U256::from(amount),
            nonce: 1,
            block_height: 5,
            timestamp: 1000,
        }
    }

    const CTX: BlockContext = BlockContext { height: 10, time: 1000 };

    #[test]
    fn test_confirmation_at_threshold() {
        let (mut state, validators) = setup(3);
        let engine = VotingEngine::new(100);
        let event = sample_event(100);

        // threshold for 3 validators is 2
        let outcome = engine
            .submit_vote(&mut state, validators[0].vote(&event, 1000), &CTX)
            .unwrap();
        assert!(matches!(
            outcome,
            VoteOutcome::Accepted { bucket_votes: 1, threshold: 2 }
        ));

        let outcome = engine
            .submit_vote(&mut state, validators[1].vote(&event, 1001), &CTX)
            .unwrap();
        match outcome {
            VoteOutcome::Confirmed { vote_count, threshold, event: confirmed } => {
                assert_eq!(vote_count, 2);
                assert_eq!(threshold, 2);
                assert_eq!(confirmed.amount, U256::from(100u64));
            }
            other => panic!("expected confirmation, got {other:?}"),
        }

        let status = state.vote_status(&event.tx_hash).unwrap().unwrap();
        assert!(status.confirmed);
        assert_eq!(status.confirmed_at, Some(10));
    }

    #[test]
    fn test_duplicate_vote_rejected() {
        let (mut state, validators) = setup(3);
        let engine = VotingEngine::new(100);
        let event = sample_event(100);

        engine
            .submit_vote(&mut state, validators[0].vote(&event, 1000), &CTX)
            .unwrap();
        let err = engine
            .submit_vote(&mut state, validators[0].vote(&event, 1001), &CTX)
            .unwrap_err();
        assert!(matches!(err, OracleError::DuplicateVote { .. }));

        // The tally is unchanged
        let status = state.vote_status(&event.tx_hash).unwrap().unwrap();
        assert_eq!(status.vote_count(), 1);
    }

    #[test]
    fn test_unknown_validator_rejected() {
        let (mut state, _) = setup(3);
        let engine = VotingEngine::new(100);
        let outsider = TestValidator::random();

        let err = engine
            .submit_vote(&mut state, outsider.vote(&sample_event(100), 1000), &CTX)
            .unwrap_err();
        assert!(matches!(err, OracleError::NotValidator(_)));
        assert!(state.vote_status(&sample_event(100).tx_hash).unwrap().is_none());
    }

    #[test]
    fn test_inactive_validator_rejected() {
        let (mut state, validators) = setup(3);
        let engine = VotingEngine::new(100);

        let mut set = state.validator_set().unwrap().unwrap();
        set.get_mut(&validators[0].address).unwrap().active = false;
        set.recompute_threshold();
        set.version = 2;
        state.put_validator_set(set);

        let err = engine
            .submit_vote(&mut state, validators[0].vote(&sample_event(100), 1000), &CTX)
            .unwrap_err();
        assert!(matches!(err, OracleError::NotValidator(_)));
    }

    #[test]
    fn test_forged_signature_rejected() {
        let (mut state, validators) = setup(3);
        let engine = VotingEngine::new(100);
        let event = sample_event(100);

        // Signed by validator 1 but claiming to be validator 0
        let mut vote = validators[1].vote(&event, 1000);
        vote.validator = validators[0].address;

        let err = engine.submit_vote(&mut state, vote, &CTX).unwrap_err();
        assert!(matches!(err, OracleError::InvalidSignature(_)));
    }

    #[test]
    fn test_malformed_event_rejected() {
        let (mut state, validators) = setup(3);
        let engine = VotingEngine::new(100);

        let mut event = sample_event(100);
        event.amount = U256::zero();
        let err = engine
            .submit_vote(&mut state, validators[0].vote(&event, 1000), &CTX)
            .unwrap_err();
        assert!(matches!(err, OracleError::InvalidEvent(_)));
    }

    #[test]
    fn test_conflicting_buckets() {
        // S3: V1 votes amount=100, V2 amount=200, V3 amount=100.
        // The amount=100 bucket reaches 2/3 and confirms with amount=100.
        let (mut state, validators) = setup(3);
        let engine = VotingEngine::new(100);
        let event_100 = sample_event(100);
        let event_200 = sample_event(200);

        engine
            .submit_vote(&mut state, validators[0].vote(&event_100, 1000), &CTX)
            .unwrap();
        let outcome = engine
            .submit_vote(&mut state, validators[1].vote(&event_200, 1001), &CTX)
            .unwrap();
        assert!(matches!(
            outcome,
            VoteOutcome::Accepted { bucket_votes: 1, .. }
        ));

        let outcome = engine
            .submit_vote(&mut state, validators[2].vote(&event_100, 1002), &CTX)
            .unwrap();
        match outcome {
            VoteOutcome::Confirmed { event, vote_count, .. } => {
                assert_eq!(event.amount, U256::from(100u64));
                assert_eq!(vote_count, 2);
            }
            other => panic!("expected confirmation, got {other:?}"),
        }

        let status = state.vote_status(&event_100.tx_hash).unwrap().unwrap();
        assert_eq!(status.buckets.len(), 2);
        assert_eq!(status.vote_count(), 3);
    }

    #[test]
    fn test_vote_after_confirmation_rejected() {
        let (mut state, validators) = setup(3);
        let engine = VotingEngine::new(100);
        let event = sample_event(100);

        engine
            .submit_vote(&mut state, validators[0].vote(&event, 1000), &CTX)
            .unwrap();
        engine
            .submit_vote(&mut state, validators[1].vote(&event, 1001), &CTX)
            .unwrap();

        // A replayed vote from a prior voter is a duplicate
        let err = engine
            .submit_vote(&mut state, validators[0].vote(&event, 1002), &CTX)
            .unwrap_err();
        assert!(matches!(err, OracleError::DuplicateVote { .. }));

        // A fresh voter is rejected because the status is terminal
        let err = engine
            .submit_vote(&mut state, validators[2].vote(&event, 1003), &CTX)
            .unwrap_err();
        assert!(matches!(err, OracleError::AlreadyConfirmed(_)));
    }

    #[test]
    fn test_threshold_frozen_at_open() {
        let (mut state, validators) = setup(3);
        let engine = VotingEngine::new(100);
        let event = sample_event(100);

        engine
            .submit_vote(&mut state, validators[0].vote(&event, 1000), &CTX)
            .unwrap();

        // Grow the active set; the open status keeps threshold 2
        let outsider = TestValidator::random();
        let mut set = state.validator_set().unwrap().unwrap();
        set.validators.push(Validator::new(
            outsider.address,
            giro_crypto::encode_pubkey(outsider.key.verifying_key()),
            1,
            10,
        ));
        set.validators.push(Validator::new(
            TestValidator::random().address,
            [2u8; 33],
            1,
            10,
        ));
        set.recompute_threshold();
        set.version = 2;
        state.put_validator_set(set);

        let outcome = engine
            .submit_vote(&mut state, validators[1].vote(&event, 1001), &CTX)
            .unwrap();
        assert!(matches!(outcome, VoteOutcome::Confirmed { threshold: 2, .. }));
    }

    #[test]
    fn test_expiry_skips_confirmed() {
        let (mut state, validators) = setup(3);
        let engine = VotingEngine::new(100);

        // Confirm one transfer
        let confirmed_event = sample_event(100);
        engine
            .submit_vote(&mut state, validators[0].vote(&confirmed_event, 1000), &CTX)
            .unwrap();
        engine
            .submit_vote(&mut state, validators[1].vote(&confirmed_event, 1001), &CTX)
            .unwrap();

        // Leave another open
        let mut open_event = sample_event(50);
        open_event.tx_hash = H256::from_bytes([0x02; 32]);
        engine
            .submit_vote(&mut state, validators[0].vote(&open_event, 1002), &CTX)
            .unwrap();

        // Not yet expired
        let expired = engine
            .expire(&mut state, &BlockContext { height: 109, time: 2000 })
            .unwrap();
        assert!(expired.is_empty());

        // At created_at + timeout the open one goes
        let expired = engine
            .expire(&mut state, &BlockContext { height: 110, time: 2001 })
            .unwrap();
        assert_eq!(expired, vec![open_event.tx_hash]);
        assert!(state.vote_status(&open_event.tx_hash).unwrap().is_none());
        assert!(state.vote_status(&confirmed_event.tx_hash).unwrap().is_some());
    }
}
