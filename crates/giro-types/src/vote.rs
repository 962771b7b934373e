//! Validator votes and per-transfer tally state

use crate::TransferEvent;
use giro_crypto::Signature;
use giro_primitives::{Address, H256};
use std::collections::BTreeMap;

/// A validator's attestation that a transfer event occurred.
///
/// Uniquely keyed by `(event.tx_hash, validator)`; the signature covers the
/// canonical encoding of `event`.
#[derive(Clone, Debug)]
pub struct Vote {
    /// Voting validator
    pub validator: Address,
    /// The event exactly as the validator observed it
    pub event: TransferEvent,
    /// Signature over `keccak256(canonical(event))`
    pub signature: Signature,
    /// Submission timestamp (hub block time)
    pub vote_time: u64,
}

impl Vote {
    /// The transfer this vote refers to
    pub fn tx_hash(&self) -> H256 {
        self.event.tx_hash
    }
}

/// Votes collected for one event-data hash.
///
/// Validators may disagree about the facts of a transfer; each distinct
/// event encoding tallies into its own bucket and only a bucket that
/// reaches the frozen threshold confirms. The stored `event` is the
/// first-seen body for this hash.
#[derive(Clone, Debug)]
pub struct TallyBucket {
    /// First-seen event data for this bucket
    pub event: TransferEvent,
    /// Voters in arrival order, with their signatures and vote times
    pub votes: Vec<(Address, Signature, u64)>,
}

impl TallyBucket {
    /// Number of votes in this bucket
    pub fn vote_count(&self) -> u32 {
        self.votes.len() as u32
    }
}

/// Per-transfer voting state.
///
/// Lifecycle: open → confirmed (terminal) or open → expired (terminal,
/// removal). The threshold is frozen when the status is opened so a later
/// validator-set change cannot invalidate an in-flight confirmation.
#[derive(Clone, Debug)]
pub struct VoteStatus {
    /// Transfer under vote
    pub tx_hash: H256,
    /// Tally buckets keyed by event-data hash (deterministic order)
    pub buckets: BTreeMap<H256, TallyBucket>,
    /// Event-data hash of the first vote, used as the headline observation
    pub first_seen: H256,
    /// Threshold snapshot taken when the status was opened
    pub threshold: u32,
    /// Whether some bucket reached the threshold
    pub confirmed: bool,
    /// The bucket that confirmed
    pub confirmed_event_hash: Option<H256>,
    /// Hub block height the status was opened at
    pub created_at: u64,
    /// Hub block height of confirmation
    pub confirmed_at: Option<u64>,
    /// Hub block height after which an open status expires
    pub expires_at: u64,
}

impl VoteStatus {
    /// Open a new status from the first vote's event data
    pub fn open(
        event: TransferEvent,
        event_hash: H256,
        threshold: u32,
        created_at: u64,
        expires_at: u64,
    ) -> Self {
        let mut buckets = BTreeMap::new();
        buckets.insert(
            event_hash,
            TallyBucket {
                event,
                votes: Vec::new(),
            },
        );
        VoteStatus {
            tx_hash: H256::ZERO, // set by caller from the event
            buckets,
            first_seen: event_hash,
            threshold,
            confirmed: false,
            confirmed_event_hash: None,
            created_at,
            confirmed_at: None,
            expires_at,
        }
    }

    /// Whether the status is still open
    pub fn is_open(&self) -> bool {
        !self.confirmed
    }

    /// Total number of votes across all buckets
    pub fn vote_count(&self) -> u32 {
        self.buckets.values().map(|b| b.vote_count()).sum()
    }

    /// Whether the given validator has voted in any bucket
    pub fn has_voted(&self, validator: &Address) -> bool {
        self.buckets
            .values()
            .any(|b| b.votes.iter().any(|(addr, _, _)| addr == validator))
    }

    /// The event data of the confirmed bucket, if confirmed
    pub fn confirmed_event(&self) -> Option<&TransferEvent> {
        let hash = self.confirmed_event_hash?;
        self.buckets.get(&hash).map(|b| &b.event)
    }

    /// The headline (first-seen) event data
    pub fn observed_event(&self) -> Option<&TransferEvent> {
        self.buckets.get(&self.first_seen).map(|b| &b.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use giro_primitives::U256;

    fn sample_event(amount: u64) -> TransferEvent {
        TransferEvent {
            tx_hash: H256::from_bytes([0x01; 32]),
            source_chain: "chain-a".into(),
            dest_chain: "chain-b".into(),
            sender: "alice".into(),
            recipient: Address::from_bytes([0x02; 20]),
            amount: U256::from(amount),
            nonce: 1,
            block_height: 5,
            timestamp: 1000,
        }
    }

    fn dummy_sig() -> Signature {
        Signature::new([0u8; 32], [0u8; 32], 27)
    }

    #[test]
    fn test_open_status() {
        let event = sample_event(100);
        let hash = H256::from_bytes([0xaa; 32]);
        let mut status = VoteStatus::open(event.clone(), hash, 2, 10, 110);
        status.tx_hash = event.tx_hash;

        assert!(status.is_open());
        assert_eq!(status.vote_count(), 0);
        assert_eq!(status.threshold, 2);
        assert_eq!(status.observed_event().unwrap().amount, U256::from(100u64));
    }

    #[test]
    fn test_has_voted_across_buckets() {
        let hash_a = H256::from_bytes([0xaa; 32]);
        let hash_b = H256::from_bytes([0xbb; 32]);
        let v1 = Address::from_bytes([0x01; 20]);

        let mut status = VoteStatus::open(sample_event(100), hash_a, 2, 10, 110);
        status
            .buckets
            .get_mut(&hash_a)
            .unwrap()
            .votes
            .push((v1, dummy_sig(), 1000));
        status.buckets.insert(
            hash_b,
            TallyBucket {
                event: sample_event(200),
                votes: Vec::new(),
            },
        );

        assert!(status.has_voted(&v1));
        assert!(!status.has_voted(&Address::from_bytes([0x02; 20])));
        assert_eq!(status.vote_count(), 1);
    }

    #[test]
    fn test_confirmed_event_selection() {
        let hash_a = H256::from_bytes([0xaa; 32]);
        let hash_b = H256::from_bytes([0xbb; 32]);

        let mut status = VoteStatus::open(sample_event(100), hash_a, 2, 10, 110);
        status.buckets.insert(
            hash_b,
            TallyBucket {
                event: sample_event(200),
                votes: Vec::new(),
            },
        );
        status.confirmed = true;
        status.confirmed_event_hash = Some(hash_b);

        assert_eq!(
            status.confirmed_event().unwrap().amount,
            U256::from(200u64)
        );
        // Headline observation is still the first-seen bucket
        assert_eq!(status.observed_event().unwrap().amount, U256::from(100u64));
    }
}
