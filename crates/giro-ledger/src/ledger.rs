//! Credit ledger operations

use crate::error::{LedgerError, LedgerResult};
use giro_primitives::U256;
use giro_store::HubState;
use giro_types::CreditDenom;
use std::collections::BTreeMap;
use tracing::debug;

/// The mutual obligations of an unordered bank pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebtPosition {
    /// What `a` owes `b`: `balance[b, cred-a]`
    pub owe_ab: U256,
    /// What `b` owes `a`: `balance[a, cred-b]`
    pub owe_ba: U256,
}

/// The issuer-tagged credit ledger.
///
/// Stateless over [`HubState`]; the hosting block transaction controls
/// atomicity. `outstanding[denom]` is maintained by issue and burn alone,
/// which is what makes the conservation invariant checkable.
#[derive(Debug, Clone, Default)]
pub struct CreditLedger;

impl CreditLedger {
    /// Create a ledger handle
    pub fn new() -> Self {
        Self
    }

    /// Issue `amount` of `cred-{issuer}` to `holder`.
    ///
    /// Only the confirmation path and genesis call this. Issuance to the
    /// issuer itself is rejected: `balance[X, cred-X]` must stay zero.
    pub fn issue(
        &self,
        state: &mut HubState,
        issuer: &str,
        holder: &str,
        amount: U256,
    ) -> LedgerResult<CreditDenom> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount("issue of zero".into()));
        }
        if issuer.is_empty() || holder.is_empty() {
            return Err(LedgerError::InvalidCreditToken("empty bank identifier".into()));
        }
        if issuer == holder {
            return Err(LedgerError::InvalidCreditToken(format!(
                "{holder} cannot hold credit against itself"
            )));
        }

        let denom = CreditDenom::for_issuer(issuer);
        let balance = state.balance(holder, &denom)?;
        let outstanding = state.outstanding(&denom)?;

        let new_balance = balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".into()))?;
        let new_outstanding = outstanding
            .checked_add(amount)
            .ok_or_else(|| LedgerError::InvalidAmount("outstanding overflow".into()))?;

        state.set_balance(holder, &denom, new_balance);
        state.set_outstanding(&denom, new_outstanding);

        debug!(%denom, holder, %amount, "credit issued");
        Ok(denom)
    }

    /// Burn `amount` of `denom` from `holder`.
    ///
    /// Fails atomically on underflow; nothing is written unless both the
    /// balance and the outstanding total can absorb the burn.
    pub fn burn(
        &self,
        state: &mut HubState,
        holder: &str,
        denom: &CreditDenom,
        amount: U256,
    ) -> LedgerResult<()> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount("burn of zero".into()));
        }

        let balance = state.balance(holder, denom)?;
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                holder: holder.to_string(),
                denom: denom.as_str().to_string(),
                have: balance,
                need: amount,
            });
        }

        let outstanding = state.outstanding(denom)?;
        let new_outstanding = outstanding.checked_sub(amount).ok_or_else(|| {
            LedgerError::InvariantViolated(format!(
                "outstanding {outstanding} below burn {amount} for {denom}"
            ))
        })?;

        state.set_balance(holder, denom, balance - amount);
        state.set_outstanding(denom, new_outstanding);

        debug!(%denom, holder, %amount, "credit burned");
        Ok(())
    }

    /// Credit tokens are not transferable between holders.
    ///
    /// The operation exists so callers get a stable error instead of a
    /// missing method; the only ways a credit balance moves are issue,
    /// burn, and the netting engine's paired burns.
    pub fn transfer(
        &self,
        _state: &mut HubState,
        denom: &CreditDenom,
        from: &str,
        to: &str,
        _amount: U256,
    ) -> LedgerResult<()> {
        Err(LedgerError::NotTransferable(format!(
            "{denom} from {from} to {to}"
        )))
    }

    /// Balance of `holder` in `denom`
    pub fn balance(
        &self,
        state: &HubState,
        holder: &str,
        denom: &CreditDenom,
    ) -> LedgerResult<U256> {
        Ok(state.balance(holder, denom)?)
    }

    /// Every positive balance held by `holder`, in denom order
    pub fn all_balances(
        &self,
        state: &HubState,
        holder: &str,
    ) -> LedgerResult<BTreeMap<CreditDenom, U256>> {
        let mut out = BTreeMap::new();
        for ((h, denom), amount) in state.positive_balances()? {
            if h == holder {
                out.insert(denom, amount);
            }
        }
        Ok(out)
    }

    /// Mutual obligations of banks `a` and `b`
    pub fn debt_position(&self, state: &HubState, a: &str, b: &str) -> LedgerResult<DebtPosition> {
        let cred_a = CreditDenom::for_issuer(a);
        let cred_b = CreditDenom::for_issuer(b);
        Ok(DebtPosition {
            owe_ab: state.balance(b, &cred_a)?,
            owe_ba: state.balance(a, &cred_b)?,
        })
    }

    /// Check the per-block ledger invariants.
    ///
    /// - For every denom, the sum of holder balances equals the outstanding
    ///   total.
    /// - No bank holds credit against itself.
    pub fn check_invariants(&self, state: &HubState) -> LedgerResult<()> {
        let mut sums: BTreeMap<CreditDenom, U256> = BTreeMap::new();
        for ((holder, denom), amount) in state.positive_balances()? {
            if holder == denom.issuer() {
                return Err(LedgerError::InvariantViolated(format!(
                    "{holder} holds {amount} of its own credit {denom}"
                )));
            }
            let entry = sums.entry(denom).or_default();
            *entry = entry.checked_add(amount).ok_or_else(|| {
                LedgerError::InvariantViolated("balance sum overflow".into())
            })?;
        }

        let outstanding = state.all_outstanding()?;
        for (denom, total) in &outstanding {
            let sum = sums.get(denom).copied().unwrap_or_default();
            if sum != *total {
                return Err(LedgerError::InvariantViolated(format!(
                    "{denom}: holder balances sum to {sum}, outstanding is {total}"
                )));
            }
        }
        for denom in sums.keys() {
            if !outstanding.contains_key(denom) {
                return Err(LedgerError::InvariantViolated(format!(
                    "{denom}: balances exist without an outstanding total"
                )));
            }
        }
        Ok(())
    }
}
