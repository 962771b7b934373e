//! Append-only audit log entries

/// Classification of an audit entry.
///
/// Every rejected vote, expired status, and failed cycle produces an entry;
/// the kind strings are stable because the secondary index keys embed them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuditKind {
    /// A vote was accepted and tallied
    VoteAccepted,
    /// A vote was rejected (duplicate, bad signature, unknown validator, ...)
    VoteRejected,
    /// A transfer reached threshold
    TransferConfirmed,
    /// An open vote status expired
    ConsensusTimeout,
    /// Credit issued to a holder
    CreditIssued,
    /// Credit burned from a holder
    CreditBurned,
    /// A netting cycle completed
    NettingCompleted,
    /// A netting cycle was rolled back
    NettingRollback,
    /// A mint command was created
    CommandCreated,
    /// A candidate signature was rejected
    SignatureRejected,
    /// A command collected threshold signatures
    CommandSigned,
    /// A command was executed at the destination
    CommandExecuted,
    /// A command permanently failed
    CommandFailed,
    /// The validator set changed
    ValidatorSetUpdated,
}

impl AuditKind {
    /// Stable string form, used as the secondary index key component
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::VoteAccepted => "vote_accepted",
            AuditKind::VoteRejected => "vote_rejected",
            AuditKind::TransferConfirmed => "transfer_confirmed",
            AuditKind::ConsensusTimeout => "consensus_timeout",
            AuditKind::CreditIssued => "credit_issued",
            AuditKind::CreditBurned => "credit_burned",
            AuditKind::NettingCompleted => "netting_completed",
            AuditKind::NettingRollback => "netting_rollback",
            AuditKind::CommandCreated => "command_created",
            AuditKind::SignatureRejected => "signature_rejected",
            AuditKind::CommandSigned => "command_signed",
            AuditKind::CommandExecuted => "command_executed",
            AuditKind::CommandFailed => "command_failed",
            AuditKind::ValidatorSetUpdated => "validator_set_updated",
        }
    }

    /// Parse the stable string form back
    pub fn from_str_stable(s: &str) -> Option<Self> {
        Some(match s {
            "vote_accepted" => AuditKind::VoteAccepted,
            "vote_rejected" => AuditKind::VoteRejected,
            "transfer_confirmed" => AuditKind::TransferConfirmed,
            "consensus_timeout" => AuditKind::ConsensusTimeout,
            "credit_issued" => AuditKind::CreditIssued,
            "credit_burned" => AuditKind::CreditBurned,
            "netting_completed" => AuditKind::NettingCompleted,
            "netting_rollback" => AuditKind::NettingRollback,
            "command_created" => AuditKind::CommandCreated,
            "signature_rejected" => AuditKind::SignatureRejected,
            "command_signed" => AuditKind::CommandSigned,
            "command_executed" => AuditKind::CommandExecuted,
            "command_failed" => AuditKind::CommandFailed,
            "validator_set_updated" => AuditKind::ValidatorSetUpdated,
            _ => return None,
        })
    }
}

/// One append-only audit record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    /// Monotonic id assigned at append time
    pub id: u64,
    /// Entry classification
    pub kind: AuditKind,
    /// The tx hash or command id the entry refers to
    pub reference: String,
    /// Human-readable detail
    pub details: String,
    /// Hub block timestamp
    pub timestamp: u64,
    /// Hub block height
    pub block_height: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_string_roundtrip() {
        for kind in [
            AuditKind::VoteAccepted,
            AuditKind::VoteRejected,
            AuditKind::TransferConfirmed,
            AuditKind::ConsensusTimeout,
            AuditKind::CreditIssued,
            AuditKind::CreditBurned,
            AuditKind::NettingCompleted,
            AuditKind::NettingRollback,
            AuditKind::CommandCreated,
            AuditKind::SignatureRejected,
            AuditKind::CommandSigned,
            AuditKind::CommandExecuted,
            AuditKind::CommandFailed,
            AuditKind::ValidatorSetUpdated,
        ] {
            assert_eq!(AuditKind::from_str_stable(kind.as_str()), Some(kind));
        }
        assert_eq!(AuditKind::from_str_stable("unknown"), None);
    }
}
