//! Bilateral netting engine

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::CreditLedger;
use giro_primitives::U256;
use giro_store::HubState;
use giro_types::{CreditDenom, CycleStatus, NettingCycle, NettingPair};
use tracing::{info, warn};

/// Meta flag guarding cycle serialization
const NETTING_IN_PROGRESS: &str = "netting_in_progress";

/// The bilateral netting engine.
///
/// Enumerates every unordered pair of banks with claims against each other,
/// in lexicographic order so all replicas select the same pairs, burns the
/// overlap from both sides, and records the cycle. A cycle is
/// all-or-nothing: any failure rolls back every burn.
#[derive(Debug, Clone)]
pub struct NettingEngine {
    ledger: CreditLedger,
    /// Pairs with an overlap below this are skipped
    min_netting_amount: U256,
    /// Pairs per cycle; the rest wait for the next cycle
    max_netting_pairs: usize,
}

impl NettingEngine {
    /// Create an engine with the given policy knobs
    pub fn new(min_netting_amount: u64, max_netting_pairs: usize) -> Self {
        Self {
            ledger: CreditLedger::new(),
            min_netting_amount: U256::from(min_netting_amount),
            max_netting_pairs,
        }
    }

    /// Whether a cycle should run at this height
    pub fn is_due(&self, height: u64, netting_interval: u64) -> bool {
        netting_interval > 0 && height % netting_interval == 0
    }

    /// Enumerate mutually indebted pairs `(a, b)` with `a < b`, in order.
    ///
    /// The queue is ordered by pair key; a capped cycle consumes the head
    /// and leaves the tail for the next cycle.
    pub fn eligible_pairs(&self, state: &HubState) -> LedgerResult<Vec<(String, String)>> {
        let balances = state.positive_balances()?;
        let mut pairs = Vec::new();
        for ((holder, denom), _) in &balances {
            let issuer = denom.issuer().to_string();
            // Keep each unordered pair once: from the side where the holder
            // sorts first.
            if *holder >= issuer {
                continue;
            }
            let reverse = (issuer.clone(), CreditDenom::for_issuer(holder));
            if balances.contains_key(&reverse) {
                pairs.push((holder.clone(), issuer));
            }
        }
        Ok(pairs)
    }

    /// Run one netting cycle.
    ///
    /// Returns the persisted cycle record: `Completed` with the offset
    /// pairs, or `Failed` after a full rollback. `NettingInProgress` is
    /// returned if a cycle is already running.
    pub fn run_cycle(
        &self,
        state: &mut HubState,
        block_height: u64,
        block_time: u64,
    ) -> LedgerResult<NettingCycle> {
        if state.get_meta(NETTING_IN_PROGRESS)?.unwrap_or(0) != 0 {
            return Err(LedgerError::NettingInProgress);
        }
        state.set_meta(NETTING_IN_PROGRESS, 1);

        let cycle_id = state.next_cycle_id()?;
        let mut selected = self.eligible_pairs(state)?;
        let deferred = selected.len().saturating_sub(self.max_netting_pairs);
        selected.truncate(self.max_netting_pairs);
        if deferred > 0 {
            info!(cycle_id, deferred, "netting queue capped, tail rolls over");
        }

        state.snapshot();
        let result = self.offset_pairs(state, &selected);
        let cycle = match result {
            Ok(pairs) => {
                state.commit_snapshot()?;
                state.set_last_netting_block(block_height);
                state.set_meta(NETTING_IN_PROGRESS, 0);
                let cycle = NettingCycle {
                    cycle_id,
                    block_height,
                    pairs,
                    start_time: block_time,
                    end_time: block_time,
                    status: CycleStatus::Completed,
                };
                state.put_cycle(cycle.clone());
                info!(cycle_id, pair_count = cycle.pairs.len(), "netting cycle completed");
                cycle
            }
            Err(err) => {
                // Roll back every burn of the cycle, then record the failure.
                state.revert_snapshot()?;
                state.set_meta(NETTING_IN_PROGRESS, 0);
                let cycle = NettingCycle {
                    cycle_id,
                    block_height,
                    pairs: Vec::new(),
                    start_time: block_time,
                    end_time: block_time,
                    status: CycleStatus::Failed,
                };
                state.put_cycle(cycle.clone());
                warn!(cycle_id, error = %err, "netting cycle rolled back");
                cycle
            }
        };
        Ok(cycle)
    }

    /// Burn the overlap for each selected pair, collecting pair records
    fn offset_pairs(
        &self,
        state: &mut HubState,
        selected: &[(String, String)],
    ) -> LedgerResult<Vec<NettingPair>> {
        let mut pairs = Vec::new();
        for (bank_a, bank_b) in selected {
            let cred_a = CreditDenom::for_issuer(bank_a);
            let cred_b = CreditDenom::for_issuer(bank_b);

            // amount_a: A's claim against B; amount_b: B's claim against A
            let amount_a = state.balance(bank_a, &cred_b)?;
            let amount_b = state.balance(bank_b, &cred_a)?;
            let overlap = amount_a.min(amount_b);
            if overlap < self.min_netting_amount {
                continue;
            }

            self.ledger.burn(state, bank_a, &cred_b, overlap)?;
            self.ledger.burn(state, bank_b, &cred_a, overlap)?;

            let (net_amount, net_debtor) = if amount_a > amount_b {
                (amount_a - amount_b, bank_b.clone())
            } else if amount_b > amount_a {
                (amount_b - amount_a, bank_a.clone())
            } else {
                (U256::zero(), String::new())
            };

            pairs.push(NettingPair {
                bank_a: bank_a.clone(),
                bank_b: bank_b.clone(),
                amount_a,
                amount_b,
                net_amount,
                net_debtor,
            });
        }
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(positions: &[(&str, &str, u64)]) -> HubState {
        let mut state = HubState::new();
        let ledger = CreditLedger::new();
        for (issuer, holder, amount) in positions {
            ledger
                .issue(&mut state, issuer, holder, U256::from(*amount))
                .unwrap();
        }
        state
    }

    fn denom(issuer: &str) -> CreditDenom {
        CreditDenom::for_issuer(issuer)
    }

    #[test]
    fn test_bilateral_offset() {
        // S4: balance[B, cred-A] = 100, balance[A, cred-B] = 30
        let mut state = setup(&[("chain-a", "chain-b", 100), ("chain-b", "chain-a", 30)]);
        let engine = NettingEngine::new(1, 100);

        let cycle = engine.run_cycle(&mut state, 10, 1000).unwrap();
        assert_eq!(cycle.status, CycleStatus::Completed);
        assert_eq!(cycle.cycle_id, 1);
        assert_eq!(
            cycle.pairs,
            vec![NettingPair {
                bank_a: "chain-a".into(),
                bank_b: "chain-b".into(),
                amount_a: U256::from(30u64),
                amount_b: U256::from(100u64),
                net_amount: U256::from(70u64),
                net_debtor: "chain-a".into(),
            }]
        );

        assert_eq!(
            state.balance("chain-b", &denom("chain-a")).unwrap(),
            U256::from(70u64)
        );
        assert!(state.balance("chain-a", &denom("chain-b")).unwrap().is_zero());
        assert_eq!(state.last_netting_block().unwrap(), 10);

        CreditLedger::new().check_invariants(&state).unwrap();
    }

    #[test]
    fn test_equal_positions_cancel() {
        let mut state = setup(&[("chain-a", "chain-b", 50), ("chain-b", "chain-a", 50)]);
        let engine = NettingEngine::new(1, 100);

        let cycle = engine.run_cycle(&mut state, 10, 1000).unwrap();
        assert_eq!(cycle.pairs.len(), 1);
        assert!(cycle.pairs[0].net_amount.is_zero());
        assert!(cycle.pairs[0].net_debtor.is_empty());
        assert!(state.positive_balances().unwrap().is_empty());
    }

    #[test]
    fn test_one_sided_position_untouched() {
        let mut state = setup(&[("chain-a", "chain-b", 100)]);
        let engine = NettingEngine::new(1, 100);

        let cycle = engine.run_cycle(&mut state, 10, 1000).unwrap();
        assert!(cycle.pairs.is_empty());
        assert_eq!(
            state.balance("chain-b", &denom("chain-a")).unwrap(),
            U256::from(100u64)
        );
    }

    #[test]
    fn test_min_amount_skips_dust() {
        let mut state = setup(&[("chain-a", "chain-b", 100), ("chain-b", "chain-a", 3)]);
        let engine = NettingEngine::new(5, 100);

        let cycle = engine.run_cycle(&mut state, 10, 1000).unwrap();
        assert!(cycle.pairs.is_empty());
        assert_eq!(
            state.balance("chain-b", &denom("chain-a")).unwrap(),
            U256::from(100u64)
        );
        assert_eq!(
            state.balance("chain-a", &denom("chain-b")).unwrap(),
            U256::from(3u64)
        );
    }

    #[test]
    fn test_pair_cap_rolls_over() {
        // Three mutually indebted pairs, cap at 2: the lexicographically
        // last pair waits for the next cycle.
        let mut state = setup(&[
            ("bank-a", "bank-b", 10),
            ("bank-b", "bank-a", 10),
            ("bank-c", "bank-d", 10),
            ("bank-d", "bank-c", 10),
            ("bank-e", "bank-f", 10),
            ("bank-f", "bank-e", 10),
        ]);
        let engine = NettingEngine::new(1, 2);

        let cycle = engine.run_cycle(&mut state, 10, 1000).unwrap();
        assert_eq!(cycle.pairs.len(), 2);
        assert_eq!(cycle.pairs[0].bank_a, "bank-a");
        assert_eq!(cycle.pairs[1].bank_a, "bank-c");

        // e/f survived this cycle and goes in the next one
        assert_eq!(
            state.balance("bank-f", &denom("bank-e")).unwrap(),
            U256::from(10u64)
        );
        let cycle = engine.run_cycle(&mut state, 20, 2000).unwrap();
        assert_eq!(cycle.pairs.len(), 1);
        assert_eq!(cycle.pairs[0].bank_a, "bank-e");
        assert_eq!(cycle.cycle_id, 2);
    }

    #[test]
    fn test_enumeration_is_deterministic() {
        let build = || {
            setup(&[
                ("bank-b", "bank-c", 7),
                ("bank-c", "bank-b", 9),
                ("bank-a", "bank-b", 10),
                ("bank-b", "bank-a", 10),
            ])
        };
        let engine = NettingEngine::new(1, 100);

        let pairs_1 = engine.eligible_pairs(&build()).unwrap();
        let pairs_2 = engine.eligible_pairs(&build()).unwrap();
        assert_eq!(pairs_1, pairs_2);
        assert_eq!(
            pairs_1,
            vec![
                ("bank-a".to_string(), "bank-b".to_string()),
                ("bank-b".to_string(), "bank-c".to_string()),
            ]
        );
    }

    #[test]
    fn test_is_due() {
        let engine = NettingEngine::new(1, 100);
        assert!(engine.is_due(10, 10));
        assert!(engine.is_due(20, 10));
        assert!(!engine.is_due(11, 10));
        assert!(!engine.is_due(5, 10));
        // A zero interval disables the block-driven trigger
        assert!(!engine.is_due(10, 0));
    }

    #[test]
    fn test_in_progress_guard() {
        let mut state = setup(&[("chain-a", "chain-b", 100), ("chain-b", "chain-a", 30)]);
        state.set_meta(NETTING_IN_PROGRESS, 1);
        let engine = NettingEngine::new(1, 100);

        assert!(matches!(
            engine.run_cycle(&mut state, 10, 1000),
            Err(LedgerError::NettingInProgress)
        ));

        // Once the guard clears, the cycle runs
        state.set_meta(NETTING_IN_PROGRESS, 0);
        let cycle = engine.run_cycle(&mut state, 10, 1000).unwrap();
        assert_eq!(cycle.status, CycleStatus::Completed);
    }

    #[test]
    fn test_netting_non_expansion() {
        let mut state = setup(&[
            ("chain-a", "chain-b", 100),
            ("chain-b", "chain-a", 30),
            ("chain-a", "chain-c", 40),
        ]);
        let engine = NettingEngine::new(1, 100);

        let before: U256 = state
            .all_outstanding()
            .unwrap()
            .values()
            .fold(U256::zero(), |acc, v| acc + *v);
        engine.run_cycle(&mut state, 10, 1000).unwrap();
        let after: U256 = state
            .all_outstanding()
            .unwrap()
            .values()
            .fold(U256::zero(), |acc, v| acc + *v);

        // One mutual pair with overlap 30, burned from both sides
        assert_eq!(before - after, U256::from(60u64));
    }
}
