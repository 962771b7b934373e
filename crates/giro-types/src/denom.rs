//! Issuer-tagged credit denomination

use crate::TypesError;
use std::fmt;

/// Prefix shared by all credit denominations
const CREDIT_PREFIX: &str = "cred-";

/// An issuer-tagged credit denomination of the form `cred-{issuer}`.
///
/// A balance of `cred-X` held by bank Y means Y has a claim for that amount
/// against issuer bank X. The holder and the issuer together encode a
/// directed bilateral obligation, which is what the netting engine offsets.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CreditDenom(String);

impl CreditDenom {
    /// Build the denomination for an issuer bank
    pub fn for_issuer(issuer: &str) -> Self {
        CreditDenom(format!("{CREDIT_PREFIX}{issuer}"))
    }

    /// Parse a full denomination string, requiring the `cred-` prefix and a
    /// non-empty issuer
    pub fn parse(s: &str) -> Result<Self, TypesError> {
        match s.strip_prefix(CREDIT_PREFIX) {
            Some(issuer) if !issuer.is_empty() => Ok(CreditDenom(s.to_string())),
            _ => Err(TypesError::InvalidDenom(s.to_string())),
        }
    }

    /// The issuer bank this denomination is a claim against
    pub fn issuer(&self) -> &str {
        &self.0[CREDIT_PREFIX.len()..]
    }

    /// The full denomination string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CreditDenom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CreditDenom({})", self.0)
    }
}

impl fmt::Display for CreditDenom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_issuer() {
        let denom = CreditDenom::for_issuer("bank-a");
        assert_eq!(denom.as_str(), "cred-bank-a");
        assert_eq!(denom.issuer(), "bank-a");
    }

    #[test]
    fn test_parse_valid() {
        let denom = CreditDenom::parse("cred-chain-b").unwrap();
        assert_eq!(denom.issuer(), "chain-b");
    }

    #[test]
    fn test_parse_rejects_missing_prefix() {
        assert!(CreditDenom::parse("usd").is_err());
        assert!(CreditDenom::parse("credit-x").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_issuer() {
        assert!(CreditDenom::parse("cred-").is_err());
    }

    #[test]
    fn test_ordering() {
        // Deterministic netting enumeration depends on a total order
        let a = CreditDenom::for_issuer("a");
        let b = CreditDenom::for_issuer("b");
        assert!(a < b);
    }
}
