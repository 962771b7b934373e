//! Command construction, signature aggregation, validator-set updates

use crate::error::{MultisigError, MultisigResult};
use giro_crypto::{decode_pubkey, public_key_to_address, recover_signer, Signature};
use giro_primitives::{Address, H256};
use giro_store::HubState;
use giro_types::codec::{command_id, mint_digest};
use giro_types::{CommandStatus, MintCommand, TransferEvent, Validator, ValidatorSet};
use tracing::{debug, info, warn};

/// What a submitted signature did to its command
#[derive(Debug, Clone)]
pub enum SignatureOutcome {
    /// Signature accepted; still below threshold
    Added {
        /// Signatures collected so far
        count: u32,
        /// Pinned threshold
        threshold: u32,
    },
    /// Threshold reached; the command is now `Signed`
    Signed {
        /// The fully signed command
        command: MintCommand,
    },
}

/// The mint command builder.
///
/// Stateless over [`HubState`]; command construction is deterministic so
/// two hubs fed the same confirmations produce bitwise-equal ids and
/// pre-images.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    /// Pending commands fail after this many blocks without threshold
    signing_timeout: u64,
    /// The active set may not shrink below this
    min_validator_count: usize,
}

impl CommandBuilder {
    /// Create a builder with the given signing timeout (blocks)
    pub fn new(signing_timeout: u64, min_validator_count: usize) -> Self {
        Self {
            signing_timeout,
            min_validator_count,
        }
    }

    // ------------------------------------------------------------------
    // Command lifecycle
    // ------------------------------------------------------------------

    /// Build (or return the existing) mint command for a confirmed event.
    ///
    /// Idempotent by construction: a replayed confirmation derives the
    /// same command id and finds the stored command.
    pub fn build_command(
        &self,
        state: &mut HubState,
        event: &TransferEvent,
        height: u64,
    ) -> MultisigResult<MintCommand> {
        let id = command_id(
            &event.tx_hash,
            &event.dest_chain,
            &event.recipient,
            &event.amount,
            event.nonce,
        );
        if let Some(existing) = state.command(&id)? {
            debug!(command_id = %id, "command already exists, replay ignored");
            return Ok(existing);
        }

        let set = state.validator_set()?.ok_or(MultisigError::NoValidatorSet)?;
        let command = MintCommand {
            command_id: id,
            source_tx: event.tx_hash,
            target_chain: event.dest_chain.clone(),
            recipient: event.recipient,
            amount: event.amount,
            nonce: event.nonce,
            validator_set_version: set.version,
            signatures: Vec::new(),
            created_at: height,
            status: CommandStatus::Pending,
        };
        state.put_command(command.clone());
        info!(
            command_id = %id,
            target_chain = %command.target_chain,
            set_version = set.version,
            "mint command created"
        );
        Ok(command)
    }

    /// Verify and add one validator signature.
    ///
    /// A signature that fails recovery or comes from outside the pinned
    /// set rejects alone; the command keeps collecting.
    pub fn submit_signature(
        &self,
        state: &mut HubState,
        id: &H256,
        claimed_signer: Address,
        signature: Signature,
    ) -> MultisigResult<SignatureOutcome> {
        let mut command = state
            .command(id)?
            .ok_or(MultisigError::UnknownCommand(*id))?;
        if command.status != CommandStatus::Pending {
            return Err(MultisigError::CommandNotPending {
                command_id: *id,
                status: command.status.as_str(),
            });
        }

        let digest = mint_digest(
            &command.command_id,
            &command.recipient,
            &command.amount,
            &command.target_chain,
        );
        let recovered = recover_signer(&digest, &signature)
            .map_err(|e| MultisigError::InvalidSignature(e.to_string()))?;
        if recovered != claimed_signer {
            return Err(MultisigError::InvalidSignature(format!(
                "recovered {recovered}, submission claims {claimed_signer}"
            )));
        }

        // Validate against the pinned set, not the live one.
        let pinned = state
            .validator_set_at(command.validator_set_version)?
            .ok_or(MultisigError::ValidatorSetVersionMismatch(
                command.validator_set_version,
            ))?;
        if !pinned.is_active(&recovered) {
            return Err(MultisigError::SignerNotInValidatorSet {
                signer: recovered,
                version: command.validator_set_version,
            });
        }
        if command.has_signed(&recovered) {
            return Err(MultisigError::DuplicateSignature(recovered));
        }

        command.signatures.push((recovered, signature));
        let count = command.signature_count();
        let threshold = pinned.threshold;

        if count >= threshold {
            command.status = CommandStatus::Signed;
            state.put_command(command.clone());
            info!(command_id = %id, count, threshold, "mint command fully signed");
            return Ok(SignatureOutcome::Signed { command });
        }

        state.put_command(command);
        debug!(command_id = %id, count, threshold, "signature added");
        Ok(SignatureOutcome::Added { count, threshold })
    }

    /// Mark a signed command as executed at the destination
    pub fn mark_executed(&self, state: &mut HubState, id: &H256) -> MultisigResult<MintCommand> {
        let mut command = state
            .command(id)?
            .ok_or(MultisigError::UnknownCommand(*id))?;
        if command.status != CommandStatus::Signed {
            return Err(MultisigError::CommandNotPending {
                command_id: *id,
                status: command.status.as_str(),
            });
        }
        command.status = CommandStatus::Executed;
        state.put_command(command.clone());
        info!(command_id = %id, "mint command executed");
        Ok(command)
    }

    /// Mark a command as permanently failed
    pub fn mark_failed(
        &self,
        state: &mut HubState,
        id: &H256,
        reason: &str,
    ) -> MultisigResult<MintCommand> {
        let mut command = state
            .command(id)?
            .ok_or(MultisigError::UnknownCommand(*id))?;
        if matches!(command.status, CommandStatus::Executed | CommandStatus::Failed) {
            return Err(MultisigError::CommandNotPending {
                command_id: *id,
                status: command.status.as_str(),
            });
        }
        command.status = CommandStatus::Failed;
        state.put_command(command.clone());
        warn!(command_id = %id, reason, "mint command failed");
        Ok(command)
    }

    /// Fail pending commands that outlived the signing timeout.
    ///
    /// Returns the ids that were failed.
    pub fn expire(&self, state: &mut HubState, height: u64) -> MultisigResult<Vec<H256>> {
        let mut expired = Vec::new();
        for command in state.commands_in_status(CommandStatus::Pending)? {
            if height >= command.created_at + self.signing_timeout {
                expired.push(command.command_id);
            }
        }
        for id in &expired {
            self.mark_failed(state, id, "signing timeout")?;
        }
        Ok(expired)
    }

    // ------------------------------------------------------------------
    // Validator-set updates
    // ------------------------------------------------------------------

    /// Register a new validator from its compressed public key.
    ///
    /// Returns the new set; the version bump and threshold recompute are
    /// applied and the previous version stays retained for pinned lookups.
    pub fn add_validator(
        &self,
        state: &mut HubState,
        pubkey: [u8; 33],
        power: u64,
        height: u64,
    ) -> MultisigResult<ValidatorSet> {
        let key = decode_pubkey(&pubkey)
            .map_err(|e| MultisigError::InvalidPublicKey(e.to_string()))?;
        let address = public_key_to_address(&key);

        let mut set = state.validator_set()?.ok_or(MultisigError::NoValidatorSet)?;
        if set.get(&address).is_some() {
            return Err(MultisigError::ValidatorExists(address));
        }
        set.validators.push(Validator::new(address, pubkey, power, height));
        self.install(state, set, height)
    }

    /// Remove a validator entirely
    pub fn remove_validator(
        &self,
        state: &mut HubState,
        address: Address,
        height: u64,
    ) -> MultisigResult<ValidatorSet> {
        let mut set = state.validator_set()?.ok_or(MultisigError::NoValidatorSet)?;
        let was_active = set
            .get(&address)
            .ok_or(MultisigError::UnknownValidator(address))?
            .active;
        if was_active && set.active_count() <= self.min_validator_count {
            return Err(MultisigError::TooFewValidators {
                min: self.min_validator_count,
            });
        }
        set.validators.retain(|v| v.address != address);
        self.install(state, set, height)
    }

    /// Flip a validator's active flag
    pub fn set_validator_active(
        &self,
        state: &mut HubState,
        address: Address,
        active: bool,
        height: u64,
    ) -> MultisigResult<ValidatorSet> {
        let mut set = state.validator_set()?.ok_or(MultisigError::NoValidatorSet)?;
        let validator = set
            .get(&address)
            .ok_or(MultisigError::UnknownValidator(address))?;
        if validator.active == active {
            // No-op changes do not bump the version
            return Ok(set);
        }
        if !active && set.active_count() <= self.min_validator_count {
            return Err(MultisigError::TooFewValidators {
                min: self.min_validator_count,
            });
        }
        set.get_mut(&address)
            .ok_or(MultisigError::UnknownValidator(address))?
            .active = active;
        self.install(state, set, height)
    }

    fn install(
        &self,
        state: &mut HubState,
        mut set: ValidatorSet,
        height: u64,
    ) -> MultisigResult<ValidatorSet> {
        set.version += 1;
        set.update_height = height;
        set.recompute_threshold();
        state.put_validator_set(set.clone());
        info!(
            version = set.version,
            threshold = set.threshold,
            active = set.active_count(),
            "validator set updated"
        );
        Ok(set)
    }
}
