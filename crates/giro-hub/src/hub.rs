//! The hub: block lifecycle, ingress dispatch, audit, event emission

use crate::error::{HubError, HubResult};
use crate::genesis::GenesisState;
use giro_crypto::{decode_pubkey, public_key_to_address};
use giro_ledger::{CreditLedger, DebtPosition, NettingEngine};
use giro_multisig::{CommandBuilder, SignatureOutcome};
use giro_oracle::{BlockContext, VoteOutcome, VotingEngine};
use giro_primitives::{Address, H256, U256};
use giro_store::HubState;
use giro_types::{
    AuditEntry, AuditKind, CreditDenom, CycleStatus, HubEvent, HubParams, HubTx, MintCommand,
    TransferEvent, Validator, ValidatorSet, VoteStatus,
};
use tracing::{info, instrument, warn};

/// Static hub configuration
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Tunable parameters
    pub params: HubParams,
    /// Address allowed to submit admin transactions
    pub admin: Address,
}

/// The clearing hub.
///
/// Single-threaded per block: the hosting process drives
/// `begin_block` → `deliver`* → `end_block` → `commit`, and nothing else
/// touches the state in between. Each `deliver` is atomic via a state
/// snapshot; `commit` makes the whole block durable at once.
pub struct Hub {
    config: HubConfig,
    state: HubState,
    oracle: VotingEngine,
    ledger: CreditLedger,
    netting: NettingEngine,
    builder: CommandBuilder,
    height: u64,
    block_time: u64,
    in_block: bool,
    pending_events: Vec<HubEvent>,
}

impl Hub {
    /// Create a hub over existing state
    pub fn new(config: HubConfig, state: HubState) -> Self {
        let params = &config.params;
        let oracle = VotingEngine::new(params.voting_timeout);
        let netting = NettingEngine::new(params.min_netting_amount, params.max_netting_pairs);
        let builder = CommandBuilder::new(params.signing_timeout, params.min_validator_count);
        Self {
            config,
            state,
            oracle,
            ledger: CreditLedger::new(),
            netting,
            builder,
            height: 0,
            block_time: 0,
            in_block: false,
            pending_events: Vec::new(),
        }
    }

    /// Create a hub and apply genesis if the state is fresh
    pub fn from_genesis(genesis: GenesisState, mut state: HubState) -> HubResult<Self> {
        let config = HubConfig {
            params: genesis.params.clone(),
            admin: genesis.admin,
        };
        let fresh = state.validator_set()?.is_none();
        let mut hub = Hub::new(config, state);
        if fresh {
            hub.apply_genesis(&genesis)?;
        }
        hub.height = hub.state.last_height()?;
        Ok(hub)
    }

    fn apply_genesis(&mut self, genesis: &GenesisState) -> HubResult<()> {
        let mut validators = Vec::with_capacity(genesis.validators.len());
        for gv in &genesis.validators {
            let key = decode_pubkey(&gv.pubkey).map_err(|e| {
                HubError::Multisig(giro_multisig::MultisigError::InvalidPublicKey(e.to_string()))
            })?;
            validators.push(Validator::new(
                public_key_to_address(&key),
                gv.pubkey,
                gv.power,
                0,
            ));
        }
        let set = ValidatorSet::from_validators(validators, 0, 1);
        info!(
            validators = set.len(),
            threshold = set.threshold,
            "genesis validator set installed"
        );
        self.state.put_validator_set(set);

        for credit in &genesis.credits {
            self.ledger
                .issue(&mut self.state, &credit.issuer, &credit.holder, credit.amount)?;
        }
        self.state.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Block lifecycle
    // ------------------------------------------------------------------

    /// Start block `height`
    pub fn begin_block(&mut self, height: u64, time: u64) {
        self.height = height;
        self.block_time = time;
        self.in_block = true;
    }

    /// Current block height
    pub fn height(&self) -> u64 {
        self.height
    }

    fn ctx(&self) -> BlockContext {
        BlockContext {
            height: self.height,
            time: self.block_time,
        }
    }

    /// Deliver one submitted transaction.
    ///
    /// All-or-nothing: on any failure every mutation is rolled back, an
    /// audit entry is written for rejected votes and signatures, and the
    /// error surfaces to the submitter with its stable code.
    #[instrument(skip(self, tx), fields(height = self.height))]
    pub fn deliver(&mut self, sender: Address, tx: HubTx) -> HubResult<()> {
        if !self.in_block {
            return Err(HubError::NotInBlock);
        }
        let events_mark = self.pending_events.len();
        self.state.snapshot();
        match self.dispatch(sender, &tx) {
            Ok(()) => {
                self.state.commit_snapshot()?;
                Ok(())
            }
            Err(err) => {
                self.state.revert_snapshot()?;
                self.pending_events.truncate(events_mark);
                self.audit_rejection(&tx, &err)?;
                Err(err)
            }
        }
    }

    fn dispatch(&mut self, sender: Address, tx: &HubTx) -> HubResult<()> {
        match tx {
            HubTx::Vote(vote) => self.handle_vote(vote.clone()),
            HubTx::SubmitSignature {
                command_id,
                signer,
                signature,
            } => self.handle_signature(command_id, *signer, *signature),
            HubTx::IssueCredit {
                issuer,
                holder,
                amount,
                origin_tx,
            } => {
                self.require_admin(sender)?;
                self.issue_credit(issuer, holder, *amount, *origin_tx)
            }
            HubTx::BurnCredit {
                holder,
                denom,
                amount,
                reason,
            } => {
                self.require_admin(sender)?;
                self.burn_credit(holder, denom, *amount, reason)
            }
            HubTx::TriggerNetting => {
                self.require_admin(sender)?;
                self.run_netting()
            }
            HubTx::AddValidator { pubkey, power } => {
                self.require_admin(sender)?;
                let set = self
                    .builder
                    .add_validator(&mut self.state, *pubkey, *power, self.height)?;
                self.emit_set_updated(set)
            }
            HubTx::RemoveValidator { address } => {
                self.require_admin(sender)?;
                let set = self
                    .builder
                    .remove_validator(&mut self.state, *address, self.height)?;
                self.emit_set_updated(set)
            }
            HubTx::SetValidatorActive { address, active } => {
                self.require_admin(sender)?;
                let before = self.state.validator_set()?.map(|s| s.version);
                let set = self.builder.set_validator_active(
                    &mut self.state,
                    *address,
                    *active,
                    self.height,
                )?;
                if before != Some(set.version) {
                    self.emit_set_updated(set)?;
                }
                Ok(())
            }
        }
    }

    /// Post-processing hook: expirations, the periodic netting trigger,
    /// and the ledger invariant check.
    pub fn end_block(&mut self) -> HubResult<()> {
        if !self.in_block {
            return Err(HubError::NotInBlock);
        }

        let ctx = self.ctx();
        for tx_hash in self.oracle.expire(&mut self.state, &ctx)? {
            self.pending_events.push(HubEvent::ConsensusTimeout { tx_hash });
            self.audit(
                AuditKind::ConsensusTimeout,
                tx_hash.to_hex(),
                "open vote status expired".into(),
            )?;
        }

        for command_id in self.builder.expire(&mut self.state, self.height)? {
            self.audit(
                AuditKind::CommandFailed,
                command_id.to_hex(),
                "signing timeout".into(),
            )?;
        }

        if self
            .netting
            .is_due(self.height, self.config.params.netting_interval)
        {
            self.run_netting()?;
        }

        self.ledger.check_invariants(&self.state)?;
        Ok(())
    }

    /// Commit the block, making it durable in one batch
    pub fn commit(&mut self) -> HubResult<u64> {
        let height = self.height;
        self.state.set_last_height(height);
        self.state.commit()?;
        self.in_block = false;
        Ok(height)
    }

    /// Drain events emitted since the last call
    pub fn take_events(&mut self) -> Vec<HubEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // ------------------------------------------------------------------
    // Ingress handlers
    // ------------------------------------------------------------------

    fn require_admin(&self, sender: Address) -> HubResult<()> {
        if sender != self.config.admin {
            return Err(HubError::Unauthorized(sender));
        }
        Ok(())
    }

    fn handle_vote(&mut self, vote: giro_types::Vote) -> HubResult<()> {
        let tx_hash = vote.tx_hash();
        let validator = vote.validator;
        let ctx = self.ctx();
        let outcome = self.oracle.submit_vote(&mut self.state, vote, &ctx)?;

        self.audit(
            AuditKind::VoteAccepted,
            tx_hash.to_hex(),
            format!("validator {validator}"),
        )?;

        if let VoteOutcome::Confirmed {
            event,
            vote_count,
            threshold,
        } = outcome
        {
            self.on_transfer_confirmed(&event, vote_count, threshold)?;
        }
        Ok(())
    }

    /// Confirmation side effects, atomic with the confirming vote:
    /// credit issuance and mint command creation.
    fn on_transfer_confirmed(
        &mut self,
        event: &TransferEvent,
        vote_count: u32,
        threshold: u32,
    ) -> HubResult<()> {
        self.pending_events.push(HubEvent::TransferConfirmed {
            tx_hash: event.tx_hash,
            vote_count,
            threshold,
        });
        self.audit(
            AuditKind::TransferConfirmed,
            event.tx_hash.to_hex(),
            format!("{vote_count}/{threshold} votes"),
        )?;

        // The destination bank now holds a claim against the source bank.
        let denom = self.ledger.issue(
            &mut self.state,
            &event.source_chain,
            &event.dest_chain,
            event.amount,
        )?;
        self.pending_events.push(HubEvent::CreditIssued {
            denom: denom.clone(),
            issuer: event.source_chain.clone(),
            holder: event.dest_chain.clone(),
            amount: event.amount,
            origin_tx: event.tx_hash,
        });
        self.audit(
            AuditKind::CreditIssued,
            event.tx_hash.to_hex(),
            format!("{} {} to {}", event.amount, denom, event.dest_chain),
        )?;

        let command = self
            .builder
            .build_command(&mut self.state, event, self.height)?;
        self.audit(
            AuditKind::CommandCreated,
            command.command_id.to_hex(),
            format!("target {}", command.target_chain),
        )?;
        Ok(())
    }

    fn handle_signature(
        &mut self,
        command_id: &H256,
        signer: Address,
        signature: giro_crypto::Signature,
    ) -> HubResult<()> {
        let outcome =
            self.builder
                .submit_signature(&mut self.state, command_id, signer, signature)?;
        if let SignatureOutcome::Signed { command } = outcome {
            self.audit(
                AuditKind::CommandSigned,
                command_id.to_hex(),
                format!("{} signatures", command.signature_count()),
            )?;
            self.pending_events.push(HubEvent::MintCommandReady {
                command_id: command.command_id,
                target_chain: command.target_chain.clone(),
                recipient: command.recipient,
                amount: command.amount,
                validator_set_version: command.validator_set_version,
                signatures: command.signature_bytes(),
            });
        }
        Ok(())
    }

    fn issue_credit(
        &mut self,
        issuer: &str,
        holder: &str,
        amount: U256,
        origin_tx: H256,
    ) -> HubResult<()> {
        let denom = self.ledger.issue(&mut self.state, issuer, holder, amount)?;
        self.pending_events.push(HubEvent::CreditIssued {
            denom,
            issuer: issuer.to_string(),
            holder: holder.to_string(),
            amount,
            origin_tx,
        });
        self.audit(
            AuditKind::CreditIssued,
            origin_tx.to_hex(),
            format!("admin issue {amount} cred-{issuer} to {holder}"),
        )?;
        Ok(())
    }

    fn burn_credit(
        &mut self,
        holder: &str,
        denom: &CreditDenom,
        amount: U256,
        reason: &str,
    ) -> HubResult<()> {
        self.ledger.burn(&mut self.state, holder, denom, amount)?;
        self.pending_events.push(HubEvent::CreditBurned {
            denom: denom.clone(),
            holder: holder.to_string(),
            amount,
            reason: reason.to_string(),
        });
        self.audit(
            AuditKind::CreditBurned,
            denom.as_str().to_string(),
            format!("admin burn {amount} from {holder}: {reason}"),
        )?;
        Ok(())
    }

    fn emit_set_updated(&mut self, set: ValidatorSet) -> HubResult<()> {
        self.audit(
            AuditKind::ValidatorSetUpdated,
            set.version.to_string(),
            format!("threshold {}, active {}", set.threshold, set.active_count()),
        )?;
        self.pending_events.push(HubEvent::ValidatorSetUpdated {
            version: set.version,
            threshold: set.threshold,
            validators: set.active_addresses(),
        });
        Ok(())
    }

    fn run_netting(&mut self) -> HubResult<()> {
        let cycle = self
            .netting
            .run_cycle(&mut self.state, self.height, self.block_time)?;
        match cycle.status {
            CycleStatus::Completed => {
                for pair in &cycle.pairs {
                    let offset = pair.offset_amount();
                    self.pending_events.push(HubEvent::CreditBurned {
                        denom: CreditDenom::for_issuer(&pair.bank_b),
                        holder: pair.bank_a.clone(),
                        amount: offset,
                        reason: "netting".into(),
                    });
                    self.pending_events.push(HubEvent::CreditBurned {
                        denom: CreditDenom::for_issuer(&pair.bank_a),
                        holder: pair.bank_b.clone(),
                        amount: offset,
                        reason: "netting".into(),
                    });
                }
                self.pending_events.push(HubEvent::NettingCompleted {
                    cycle_id: cycle.cycle_id,
                    block_height: cycle.block_height,
                    pair_count: cycle.pairs.len() as u32,
                    pairs: cycle.pairs.clone(),
                });
                self.audit(
                    AuditKind::NettingCompleted,
                    cycle.cycle_id.to_string(),
                    format!("{} pairs offset", cycle.pairs.len()),
                )?;
            }
            _ => {
                self.audit(
                    AuditKind::NettingRollback,
                    cycle.cycle_id.to_string(),
                    "cycle rolled back".into(),
                )?;
                warn!(cycle_id = cycle.cycle_id, "netting cycle failed and rolled back");
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Relay reporting
    // ------------------------------------------------------------------

    /// Record a successful destination execution
    pub fn mark_command_executed(&mut self, command_id: &H256) -> HubResult<()> {
        if !self.in_block {
            return Err(HubError::NotInBlock);
        }
        self.builder.mark_executed(&mut self.state, command_id)?;
        self.audit(
            AuditKind::CommandExecuted,
            command_id.to_hex(),
            "destination receipt".into(),
        )?;
        Ok(())
    }

    /// Record a permanent destination failure
    pub fn mark_command_failed(&mut self, command_id: &H256, reason: &str) -> HubResult<()> {
        if !self.in_block {
            return Err(HubError::NotInBlock);
        }
        self.builder.mark_failed(&mut self.state, command_id, reason)?;
        self.audit(
            AuditKind::CommandFailed,
            command_id.to_hex(),
            reason.to_string(),
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read-only surface
    // ------------------------------------------------------------------

    /// Vote status for a transfer
    pub fn vote_status(&self, tx_hash: &H256) -> HubResult<Option<VoteStatus>> {
        Ok(self.state.vote_status(tx_hash)?)
    }

    /// Mint command by id
    pub fn command(&self, command_id: &H256) -> HubResult<Option<MintCommand>> {
        Ok(self.state.command(command_id)?)
    }

    /// Commands ready for relay
    pub fn signed_commands(&self) -> HubResult<Vec<MintCommand>> {
        Ok(self
            .state
            .commands_in_status(giro_types::CommandStatus::Signed)?)
    }

    /// Credit balance
    pub fn balance(&self, holder: &str, denom: &CreditDenom) -> HubResult<U256> {
        Ok(self.ledger.balance(&self.state, holder, denom)?)
    }

    /// Mutual obligations of a bank pair
    pub fn debt_position(&self, a: &str, b: &str) -> HubResult<DebtPosition> {
        Ok(self.ledger.debt_position(&self.state, a, b)?)
    }

    /// Current validator set
    pub fn validator_set(&self) -> HubResult<Option<ValidatorSet>> {
        Ok(self.state.validator_set()?)
    }

    /// Audit entries of one kind
    pub fn audit_by_kind(&self, kind: AuditKind) -> HubResult<Vec<AuditEntry>> {
        Ok(self.state.audit_by_kind(kind.as_str())?)
    }

    /// Audit entries in a half-open timestamp range
    pub fn audit_by_time(&self, from_ts: u64, to_ts: u64) -> HubResult<Vec<AuditEntry>> {
        Ok(self.state.audit_by_time(from_ts, to_ts)?)
    }

    /// Direct state access for tests and tooling
    pub fn state(&self) -> &HubState {
        &self.state
    }

    // ------------------------------------------------------------------
    // Audit plumbing
    // ------------------------------------------------------------------

    fn audit(&mut self, kind: AuditKind, reference: String, details: String) -> HubResult<()> {
        let id = self.state.next_audit_id()?;
        self.state.append_audit(AuditEntry {
            id,
            kind,
            reference,
            details,
            timestamp: self.block_time,
            block_height: self.height,
        });
        Ok(())
    }

    /// Audit a rejected vote or signature after its rollback
    fn audit_rejection(&mut self, tx: &HubTx, err: &HubError) -> HubResult<()> {
        match tx {
            HubTx::Vote(vote) => self.audit(
                AuditKind::VoteRejected,
                vote.tx_hash().to_hex(),
                format!("{} ({})", err, err.code()),
            ),
            HubTx::SubmitSignature { command_id, .. } => self.audit(
                AuditKind::SignatureRejected,
                command_id.to_hex(),
                format!("{} ({})", err, err.code()),
            ),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::{GenesisCredit, GenesisValidator};
    use giro_crypto::{encode_pubkey, sign, PrivateKey};
    use giro_types::codec::{event_hash, mint_digest};
    use giro_types::Vote;
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    const ADMIN: Address = Address::from_bytes([0xad; 20]);

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

        fn vote(&self, event: &TransferEvent, vote_time: u64) -> HubTx {
            let digest = event_hash(event);
            HubTx::Vote(Vote {
                validator: self.address,
                event: event.clone(),
                signature: sign(&digest, &self.key).unwrap(),
                vote_time,
            })
        }

        fn signature(&self, command: &MintCommand) -> HubTx {
            let digest = mint_digest(
                &command.command_id,
                &command.recipient,
                &command.amount,
                &command.target_chain,
            );
            HubTx::SubmitSignature {
                command_id: command.command_id,
                signer: self.address,
                signature: sign(&digest, &self.key).unwrap(),
            }
        }
    }

    fn setup(n: usize) -> (Hub, Vec<TestValidator>) {
        let validators: Vec<TestValidator> = (0..n).map(|_| TestValidator::random()).collect();
        let genesis = GenesisState::with_validators(
            validators
                .iter()
                .map(|v| GenesisValidator {
                    pubkey: encode_pubkey(v.key.verifying_key()),
                    power: 1,
                })
                .collect(),
            ADMIN,
        );
        let hub = Hub::from_genesis(genesis, HubState::new()).unwrap();
        (hub, validators)
    }

    fn sample_event() -> TransferEvent {
        TransferEvent {
            tx_hash: H256::from_bytes([0x01; 32]),
            source_chain: "chain-a".into(),
            dest_chain: "chain-b".into(),
            sender: "alice".into(),
            recipient: Address::from_bytes([0x22; 20]),
            amount: U256::from(100u64),
            nonce: 1,
            block_height: 5,
            timestamp: 1000,
        }
    }

    #[test]
    fn test_confirmation_issues_credit_and_builds_command() {
        let (mut hub, validators) = setup(3);
        let event = sample_event();

        hub.begin_block(1, 1000);
        hub.deliver(validators[0].address, validators[0].vote(&event, 1000))
            .unwrap();
        hub.deliver(validators[1].address, validators[1].vote(&event, 1001))
            .unwrap();
        hub.end_block().unwrap();
        hub.commit().unwrap();

        let events = hub.take_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, HubEvent::TransferConfirmed { vote_count: 2, threshold: 2, .. })));
        assert!(events.iter().any(|e| matches!(e, HubEvent::CreditIssued { .. })));

        assert_eq!(
            hub.balance("chain-b", &CreditDenom::for_issuer("chain-a"))
                .unwrap(),
            U256::from(100u64)
        );

        // A pending command exists with the deterministic id
        let expected_id = giro_types::codec::command_id(
            &event.tx_hash,
            &event.dest_chain,
            &event.recipient,
            &event.amount,
            event.nonce,
        );
        let command = hub.command(&expected_id).unwrap().unwrap();
        assert_eq!(command.status, giro_types::CommandStatus::Pending);
        assert_eq!(command.validator_set_version, 1);
    }

    #[test]
    fn test_rejected_vote_rolls_back_and_audits() {
        let (mut hub, validators) = setup(3);
        let event = sample_event();

        hub.begin_block(1, 1000);
        hub.deliver(validators[0].address, validators[0].vote(&event, 1000))
            .unwrap();
        let err = hub
            .deliver(validators[0].address, validators[0].vote(&event, 1001))
            .unwrap_err();
        assert_eq!(err.code(), "duplicate_vote");

        // Rejection is audited even though the submission rolled back
        let rejected = hub.audit_by_kind(AuditKind::VoteRejected).unwrap();
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].details.contains("duplicate_vote"));

        // The original vote is still tallied
        let status = hub.vote_status(&event.tx_hash).unwrap().unwrap();
        assert_eq!(status.vote_count(), 1);
    }

    #[test]
    fn test_signature_flow_emits_ready() {
        let (mut hub, validators) = setup(3);
        let event = sample_event();

        hub.begin_block(1, 1000);
        hub.deliver(validators[0].address, validators[0].vote(&event, 1000))
            .unwrap();
        hub.deliver(validators[1].address, validators[1].vote(&event, 1001))
            .unwrap();
        hub.end_block().unwrap();
        hub.commit().unwrap();
        hub.take_events();

        let command_id = giro_types::codec::command_id(
            &event.tx_hash,
            &event.dest_chain,
            &event.recipient,
            &event.amount,
            event.nonce,
        );
        let command = hub.command(&command_id).unwrap().unwrap();

        hub.begin_block(2, 1001);
        hub.deliver(validators[0].address, validators[0].signature(&command))
            .unwrap();
        hub.deliver(validators[1].address, validators[1].signature(&command))
            .unwrap();
        hub.end_block().unwrap();
        hub.commit().unwrap();

        let events = hub.take_events();
        let ready = events
            .iter()
            .find_map(|e| match e {
                HubEvent::MintCommandReady {
                    command_id: id,
                    signatures,
                    ..
                } => Some((id, signatures.len())),
                _ => None,
            })
            .expect("MintCommandReady emitted");
        assert_eq!(*ready.0, command_id);
        assert_eq!(ready.1, 2);

        assert_eq!(hub.signed_commands().unwrap().len(), 1);
    }

    #[test]
    fn test_admin_gating() {
        let (mut hub, _) = setup(3);
        hub.begin_block(1, 1000);

        let intruder = Address::from_bytes([0x66; 20]);
        let err = hub
            .deliver(
                intruder,
                HubTx::IssueCredit {
                    issuer: "chain-a".into(),
                    holder: "chain-b".into(),
                    amount: U256::from(5u64),
                    origin_tx: H256::from_bytes([0x0f; 32]),
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), "unauthorized");

        hub.deliver(
            ADMIN,
            HubTx::IssueCredit {
                issuer: "chain-a".into(),
                holder: "chain-b".into(),
                amount: U256::from(5u64),
                origin_tx: H256::from_bytes([0x0f; 32]),
            },
        )
        .unwrap();
        assert_eq!(
            hub.balance("chain-b", &CreditDenom::for_issuer("chain-a"))
                .unwrap(),
            U256::from(5u64)
        );
    }

    #[test]
    fn test_endblock_netting_trigger() {
        let (mut hub, _) = setup(3);

        // Seed mutual positions via admin issues
        hub.begin_block(1, 1000);
        hub.deliver(
            ADMIN,
            HubTx::IssueCredit {
                issuer: "chain-a".into(),
                holder: "chain-b".into(),
                amount: U256::from(100u64),
                origin_tx: H256::from_bytes([0x0f; 32]),
            },
        )
        .unwrap();
        hub.deliver(
            ADMIN,
            HubTx::IssueCredit {
                issuer: "chain-b".into(),
                holder: "chain-a".into(),
                amount: U256::from(30u64),
                origin_tx: H256::from_bytes([0x0e; 32]),
            },
        )
        .unwrap();
        hub.end_block().unwrap();
        hub.commit().unwrap();
        hub.take_events();

        // Height 5: interval 10 not due, nothing happens
        hub.begin_block(5, 1005);
        hub.end_block().unwrap();
        hub.commit().unwrap();
        assert!(hub
            .take_events()
            .iter()
            .all(|e| !matches!(e, HubEvent::NettingCompleted { .. })));

        // Height 10: the cycle runs
        hub.begin_block(10, 1010);
        hub.end_block().unwrap();
        hub.commit().unwrap();

        let events = hub.take_events();
        let completed = events
            .iter()
            .find_map(|e| match e {
                HubEvent::NettingCompleted {
                    cycle_id, pairs, ..
                } => Some((cycle_id, pairs.clone())),
                _ => None,
            })
            .expect("NettingCompleted emitted");
        assert_eq!(*completed.0, 1);
        assert_eq!(completed.1.len(), 1);
        assert_eq!(completed.1[0].net_amount, U256::from(70u64));
        assert_eq!(completed.1[0].net_debtor, "chain-a");

        // Both netting burns were emitted
        let burns = events
            .iter()
            .filter(|e| matches!(e, HubEvent::CreditBurned { reason, .. } if reason == "netting"))
            .count();
        assert_eq!(burns, 2);

        assert_eq!(
            hub.balance("chain-b", &CreditDenom::for_issuer("chain-a"))
                .unwrap(),
            U256::from(70u64)
        );
        assert!(hub
            .balance("chain-a", &CreditDenom::for_issuer("chain-b"))
            .unwrap()
            .is_zero());
    }

    #[test]
    fn test_vote_timeout_expiry() {
        let (mut hub, validators) = setup(3);
        let event = sample_event();

        hub.begin_block(1, 1000);
        hub.deliver(validators[0].address, validators[0].vote(&event, 1000))
            .unwrap();
        hub.end_block().unwrap();
        hub.commit().unwrap();
        hub.take_events();

        // S2: after voting_timeout blocks the status expires
        hub.begin_block(101, 2000);
        hub.end_block().unwrap();
        hub.commit().unwrap();

        let events = hub.take_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, HubEvent::ConsensusTimeout { tx_hash } if *tx_hash == event.tx_hash)));
        assert!(hub.vote_status(&event.tx_hash).unwrap().is_none());

        // No credit, no command
        assert!(hub
            .balance("chain-b", &CreditDenom::for_issuer("chain-a"))
            .unwrap()
            .is_zero());
        let timeout_audits = hub.audit_by_kind(AuditKind::ConsensusTimeout).unwrap();
        assert_eq!(timeout_audits.len(), 1);
    }

    #[test]
    fn test_validator_rotation_tx() {
        let (mut hub, validators) = setup(3);

        hub.begin_block(1, 1000);
        hub.deliver(
            ADMIN,
            HubTx::RemoveValidator {
                address: validators[2].address,
            },
        )
        .unwrap();
        hub.end_block().unwrap();
        hub.commit().unwrap();

        let events = hub.take_events();
        assert!(events.iter().any(|e| matches!(
            e,
            HubEvent::ValidatorSetUpdated { version: 2, threshold: 2, .. }
        )));
        assert_eq!(hub.validator_set().unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_deliver_outside_block_rejected() {
        let (mut hub, _) = setup(1);
        let err = hub.deliver(ADMIN, HubTx::TriggerNetting).unwrap_err();
        assert!(matches!(err, HubError::NotInBlock));
    }

    #[test]
    fn test_relay_reporting() {
        let (mut hub, validators) = setup(3);
        let event = sample_event();

        hub.begin_block(1, 1000);
        hub.deliver(validators[0].address, validators[0].vote(&event, 1000))
            .unwrap();
        hub.deliver(validators[1].address, validators[1].vote(&event, 1001))
            .unwrap();
        let command_id = giro_types::codec::command_id(
            &event.tx_hash,
            &event.dest_chain,
            &event.recipient,
            &event.amount,
            event.nonce,
        );
        let command = hub.command(&command_id).unwrap().unwrap();
        hub.deliver(validators[0].address, validators[0].signature(&command))
            .unwrap();
        hub.deliver(validators[1].address, validators[1].signature(&command))
            .unwrap();
        hub.end_block().unwrap();
        hub.commit().unwrap();

        hub.begin_block(2, 1001);
        hub.mark_command_executed(&command_id).unwrap();
        hub.end_block().unwrap();
        hub.commit().unwrap();

        assert_eq!(
            hub.command(&command_id).unwrap().unwrap().status,
            giro_types::CommandStatus::Executed
        );
        assert_eq!(hub.audit_by_kind(AuditKind::CommandExecuted).unwrap().len(), 1);
    }
}
