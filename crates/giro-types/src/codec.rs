//! Canonical byte encoding.
//!
//! Two implementations on different platforms must produce identical bytes:
//! field order is fixed by schema, integers are big-endian fixed-width
//! (amounts 256-bit, nonces and heights 64-bit), strings are u32-BE
//! length-prefixed UTF-8, and only ordered sequences are encoded — never
//! maps. The mint message pre-image in here is the contract surface with
//! destination ledgers; treat it as a frozen binary format.

use crate::{
    AuditEntry, AuditKind, CommandStatus, CycleStatus, MintCommand, NettingCycle, NettingPair,
    TallyBucket, TransferEvent, TypesError, Validator, ValidatorSet, VoteStatus,
};
use giro_crypto::{keccak256, Signature};
use giro_primitives::{Address, H256, U256};
use std::collections::BTreeMap;

/// Prefix destination contracts prepend before recovering signers
pub const ETH_SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

// ============================================================================
// Encoding primitives
// ============================================================================

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_u256(buf: &mut Vec<u8>, v: &U256) {
    let mut bytes = [0u8; 32];
    v.to_big_endian(&mut bytes);
    buf.extend_from_slice(&bytes);
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

/// Decoding cursor over a byte slice
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TypesError> {
        if self.pos + n > self.bytes.len() {
            return Err(TypesError::Decode(format!(
                "unexpected end of input at offset {} (need {} bytes)",
                self.pos, n
            )));
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, TypesError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, TypesError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, TypesError> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn u256(&mut self) -> Result<U256, TypesError> {
        Ok(U256::from_big_endian(self.take(32)?))
    }

    fn hash(&mut self) -> Result<H256, TypesError> {
        H256::from_slice(self.take(32)?).map_err(|e| TypesError::Decode(e.to_string()))
    }

    fn address(&mut self) -> Result<Address, TypesError> {
        Address::from_slice(self.take(20)?).map_err(|e| TypesError::Decode(e.to_string()))
    }

    fn string(&mut self) -> Result<String, TypesError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| TypesError::Decode(e.to_string()))
    }

    fn signature(&mut self) -> Result<Signature, TypesError> {
        let bytes: &[u8; 65] = self
            .take(65)?
            .try_into()
            .map_err(|_| TypesError::Decode("signature length".into()))?;
        Ok(Signature::from_bytes(bytes))
    }

    fn finish(&self) -> Result<(), TypesError> {
        if self.pos != self.bytes.len() {
            return Err(TypesError::Decode(format!(
                "{} trailing bytes after record",
                self.bytes.len() - self.pos
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Canonical event encoding (C1, frozen — votes sign these bytes)
// ============================================================================

/// Canonical bytes of a transfer event.
///
/// Field order: tx_hash, source_chain, dest_chain, sender, recipient,
/// amount, nonce, block_height, timestamp.
pub fn encode_event(event: &TransferEvent) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    buf.extend_from_slice(event.tx_hash.as_bytes()); // 32
    put_str(&mut buf, &event.source_chain);
    put_str(&mut buf, &event.dest_chain);
    put_str(&mut buf, &event.sender);
    buf.extend_from_slice(event.recipient.as_bytes()); // 20
    put_u256(&mut buf, &event.amount); // 32
    put_u64(&mut buf, event.nonce); // 8
    put_u64(&mut buf, event.block_height); // 8
    put_u64(&mut buf, event.timestamp); // 8
    buf
}

/// Decode a transfer event from its canonical bytes
pub fn decode_event(bytes: &[u8]) -> Result<TransferEvent, TypesError> {
    let mut r = Reader::new(bytes);
    let event = read_event(&mut r)?;
    r.finish()?;
    Ok(event)
}

fn read_event(r: &mut Reader<'_>) -> Result<TransferEvent, TypesError> {
    Ok(TransferEvent {
        tx_hash: r.hash()?,
        source_chain: r.string()?,
        dest_chain: r.string()?,
        sender: r.string()?,
        recipient: r.address()?,
        amount: r.u256()?,
        nonce: r.u64()?,
        block_height: r.u64()?,
        timestamp: r.u64()?,
    })
}

/// The tally-bucket key: keccak256 of the canonical event bytes
pub fn event_hash(event: &TransferEvent) -> H256 {
    keccak256(&encode_event(event))
}

// ============================================================================
// Mint command identity and pre-image (C1, frozen)
// ============================================================================

/// Deterministic command id:
/// `keccak256(tx_hash ‖ target_chain ‖ recipient ‖ amount ‖ nonce)`
pub fn command_id(
    tx_hash: &H256,
    target_chain: &str,
    recipient: &Address,
    amount: &U256,
    nonce: u64,
) -> H256 {
    let mut buf = Vec::with_capacity(32 + 4 + target_chain.len() + 20 + 32 + 8);
    buf.extend_from_slice(tx_hash.as_bytes());
    put_str(&mut buf, target_chain);
    buf.extend_from_slice(recipient.as_bytes());
    put_u256(&mut buf, amount);
    put_u64(&mut buf, nonce);
    keccak256(&buf)
}

/// Inner hash of the mint message:
/// `keccak256(command_id ‖ recipient ‖ amount ‖ target_chain_id)`
pub fn mint_message_hash(
    command_id: &H256,
    recipient: &Address,
    amount: &U256,
    target_chain: &str,
) -> H256 {
    let mut buf = Vec::with_capacity(32 + 20 + 32 + 4 + target_chain.len());
    buf.extend_from_slice(command_id.as_bytes());
    buf.extend_from_slice(recipient.as_bytes());
    put_u256(&mut buf, amount);
    put_str(&mut buf, target_chain);
    keccak256(&buf)
}

/// The exact pre-image destination contracts verify:
/// `"\x19Ethereum Signed Message:\n32" ‖ mint_message_hash`
pub fn mint_preimage(
    command_id: &H256,
    recipient: &Address,
    amount: &U256,
    target_chain: &str,
) -> Vec<u8> {
    let inner = mint_message_hash(command_id, recipient, amount, target_chain);
    let mut buf = Vec::with_capacity(ETH_SIGNED_MESSAGE_PREFIX.len() + 32);
    buf.extend_from_slice(ETH_SIGNED_MESSAGE_PREFIX);
    buf.extend_from_slice(inner.as_bytes());
    buf
}

/// The digest validators actually sign: `keccak256(mint_preimage)`
pub fn mint_digest(
    command_id: &H256,
    recipient: &Address,
    amount: &U256,
    target_chain: &str,
) -> H256 {
    keccak256(&mint_preimage(command_id, recipient, amount, target_chain))
}

// ============================================================================
// Storage codecs (hub-internal, versioned with the store)
// ============================================================================

/// Encode a balance/outstanding amount
pub fn encode_amount(amount: &U256) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32);
    put_u256(&mut buf, amount);
    buf
}

/// Decode a balance/outstanding amount
pub fn decode_amount(bytes: &[u8]) -> Result<U256, TypesError> {
    let mut r = Reader::new(bytes);
    let v = r.u256()?;
    r.finish()?;
    Ok(v)
}

/// Encode a vote status with all tally buckets and signatures
pub fn encode_vote_status(status: &VoteStatus) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(status.tx_hash.as_bytes());
    buf.extend_from_slice(status.first_seen.as_bytes());
    put_u32(&mut buf, status.threshold);
    buf.push(status.confirmed as u8);
    match status.confirmed_event_hash {
        Some(h) => {
            buf.push(1);
            buf.extend_from_slice(h.as_bytes());
        }
        None => buf.push(0),
    }
    put_u64(&mut buf, status.created_at);
    match status.confirmed_at {
        Some(h) => {
            buf.push(1);
            put_u64(&mut buf, h);
        }
        None => buf.push(0),
    }
    put_u64(&mut buf, status.expires_at);

    put_u32(&mut buf, status.buckets.len() as u32);
    for (hash, bucket) in &status.buckets {
        buf.extend_from_slice(hash.as_bytes());
        let event_bytes = encode_event(&bucket.event);
        put_u32(&mut buf, event_bytes.len() as u32);
        buf.extend_from_slice(&event_bytes);
        put_u32(&mut buf, bucket.votes.len() as u32);
        for (voter, sig, time) in &bucket.votes {
            buf.extend_from_slice(voter.as_bytes());
            buf.extend_from_slice(&sig.to_bytes());
            put_u64(&mut buf, *time);
        }
    }
    buf
}

/// Decode a vote status
pub fn decode_vote_status(bytes: &[u8]) -> Result<VoteStatus, TypesError> {
    let mut r = Reader::new(bytes);
    let tx_hash = r.hash()?;
    let first_seen = r.hash()?;
    let threshold = r.u32()?;
    let confirmed = r.u8()? != 0;
    let confirmed_event_hash = if r.u8()? != 0 { Some(r.hash()?) } else { None };
    let created_at = r.u64()?;
    let confirmed_at = if r.u8()? != 0 { Some(r.u64()?) } else { None };
    let expires_at = r.u64()?;

    let bucket_count = r.u32()? as usize;
    let mut buckets = BTreeMap::new();
    for _ in 0..bucket_count {
        let hash = r.hash()?;
        let event_len = r.u32()? as usize;
        let event = decode_event(r.take(event_len)?)?;
        let vote_count = r.u32()? as usize;
        let mut votes = Vec::with_capacity(vote_count);
        for _ in 0..vote_count {
            let voter = r.address()?;
            let sig = r.signature()?;
            let time = r.u64()?;
            votes.push((voter, sig, time));
        }
        buckets.insert(hash, TallyBucket { event, votes });
    }
    r.finish()?;

    Ok(VoteStatus {
        tx_hash,
        buckets,
        first_seen,
        threshold,
        confirmed,
        confirmed_event_hash,
        created_at,
        confirmed_at,
        expires_at,
    })
}

/// Encode a validator set
pub fn encode_validator_set(set: &ValidatorSet) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + set.validators.len() * 70);
    put_u32(&mut buf, set.threshold);
    put_u64(&mut buf, set.update_height);
    put_u64(&mut buf, set.version);
    put_u32(&mut buf, set.validators.len() as u32);
    for v in &set.validators {
        buf.extend_from_slice(v.address.as_bytes());
        buf.extend_from_slice(&v.pubkey);
        put_u64(&mut buf, v.power);
        buf.push(v.active as u8);
        put_u64(&mut buf, v.joined_at);
    }
    buf
}

/// Decode a validator set
pub fn decode_validator_set(bytes: &[u8]) -> Result<ValidatorSet, TypesError> {
    let mut r = Reader::new(bytes);
    let threshold = r.u32()?;
    let update_height = r.u64()?;
    let version = r.u64()?;
    let count = r.u32()? as usize;
    let mut validators = Vec::with_capacity(count);
    for _ in 0..count {
        let address = r.address()?;
        let pubkey: [u8; 33] = r
            .take(33)?
            .try_into()
            .map_err(|_| TypesError::Decode("pubkey length".into()))?;
        let power = r.u64()?;
        let active = r.u8()? != 0;
        let joined_at = r.u64()?;
        validators.push(Validator {
            address,
            pubkey,
            power,
            active,
            joined_at,
        });
    }
    r.finish()?;
    Ok(ValidatorSet {
        validators,
        threshold,
        update_height,
        version,
    })
}

fn command_status_byte(status: CommandStatus) -> u8 {
    match status {
        CommandStatus::Pending => 0,
        CommandStatus::Signed => 1,
        CommandStatus::Executed => 2,
        CommandStatus::Failed => 3,
    }
}

fn command_status_from_byte(b: u8) -> Result<CommandStatus, TypesError> {
    Ok(match b {
        0 => CommandStatus::Pending,
        1 => CommandStatus::Signed,
        2 => CommandStatus::Executed,
        3 => CommandStatus::Failed,
        other => return Err(TypesError::Decode(format!("command status byte {other}"))),
    })
}

/// Encode a mint command
pub fn encode_command(cmd: &MintCommand) -> Vec<u8> {
    let mut buf = Vec::with_capacity(160 + cmd.signatures.len() * 85);
    buf.extend_from_slice(cmd.command_id.as_bytes());
    buf.extend_from_slice(cmd.source_tx.as_bytes());
    put_str(&mut buf, &cmd.target_chain);
    buf.extend_from_slice(cmd.recipient.as_bytes());
    put_u256(&mut buf, &cmd.amount);
    put_u64(&mut buf, cmd.nonce);
    put_u64(&mut buf, cmd.validator_set_version);
    put_u64(&mut buf, cmd.created_at);
    buf.push(command_status_byte(cmd.status));
    put_u32(&mut buf, cmd.signatures.len() as u32);
    for (signer, sig) in &cmd.signatures {
        buf.extend_from_slice(signer.as_bytes());
        buf.extend_from_slice(&sig.to_bytes());
    }
    buf
}

/// Decode a mint command
pub fn decode_command(bytes: &[u8]) -> Result<MintCommand, TypesError> {
    let mut r = Reader::new(bytes);
    let command_id = r.hash()?;
    let source_tx = r.hash()?;
    let target_chain = r.string()?;
    let recipient = r.address()?;
    let amount = r.u256()?;
    let nonce = r.u64()?;
    let validator_set_version = r.u64()?;
    let created_at = r.u64()?;
    let status = command_status_from_byte(r.u8()?)?;
    let sig_count = r.u32()? as usize;
    let mut signatures = Vec::with_capacity(sig_count);
    for _ in 0..sig_count {
        let signer = r.address()?;
        let sig = r.signature()?;
        signatures.push((signer, sig));
    }
    r.finish()?;
    Ok(MintCommand {
        command_id,
        source_tx,
        target_chain,
        recipient,
        amount,
        nonce,
        validator_set_version,
        signatures,
        created_at,
        status,
    })
}

fn cycle_status_byte(status: CycleStatus) -> u8 {
    match status {
        CycleStatus::Pending => 0,
        CycleStatus::InProgress => 1,
        CycleStatus::Completed => 2,
        CycleStatus::Failed => 3,
    }
}

fn cycle_status_from_byte(b: u8) -> Result<CycleStatus, TypesError> {
    Ok(match b {
        0 => CycleStatus::Pending,
        1 => CycleStatus::InProgress,
        2 => CycleStatus::Completed,
        3 => CycleStatus::Failed,
        other => return Err(TypesError::Decode(format!("cycle status byte {other}"))),
    })
}

/// Encode a netting cycle
pub fn encode_cycle(cycle: &NettingCycle) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + cycle.pairs.len() * 128);
    put_u64(&mut buf, cycle.cycle_id);
    put_u64(&mut buf, cycle.block_height);
    put_u64(&mut buf, cycle.start_time);
    put_u64(&mut buf, cycle.end_time);
    buf.push(cycle_status_byte(cycle.status));
    put_u32(&mut buf, cycle.pairs.len() as u32);
    for pair in &cycle.pairs {
        put_str(&mut buf, &pair.bank_a);
        put_str(&mut buf, &pair.bank_b);
        put_u256(&mut buf, &pair.amount_a);
        put_u256(&mut buf, &pair.amount_b);
        put_u256(&mut buf, &pair.net_amount);
        put_str(&mut buf, &pair.net_debtor);
    }
    buf
}

/// Decode a netting cycle
pub fn decode_cycle(bytes: &[u8]) -> Result<NettingCycle, TypesError> {
    let mut r = Reader::new(bytes);
    let cycle_id = r.u64()?;
    let block_height = r.u64()?;
    let start_time = r.u64()?;
    let end_time = r.u64()?;
    let status = cycle_status_from_byte(r.u8()?)?;
    let pair_count = r.u32()? as usize;
    let mut pairs = Vec::with_capacity(pair_count);
    for _ in 0..pair_count {
        pairs.push(NettingPair {
            bank_a: r.string()?,
            bank_b: r.string()?,
            amount_a: r.u256()?,
            amount_b: r.u256()?,
            net_amount: r.u256()?,
            net_debtor: r.string()?,
        });
    }
    r.finish()?;
    Ok(NettingCycle {
        cycle_id,
        block_height,
        pairs,
        start_time,
        end_time,
        status,
    })
}

/// Encode an audit entry
pub fn encode_audit_entry(entry: &AuditEntry) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + entry.details.len());
    put_u64(&mut buf, entry.id);
    put_str(&mut buf, entry.kind.as_str());
    put_str(&mut buf, &entry.reference);
    put_str(&mut buf, &entry.details);
    put_u64(&mut buf, entry.timestamp);
    put_u64(&mut buf, entry.block_height);
    buf
}

/// Decode an audit entry
pub fn decode_audit_entry(bytes: &[u8]) -> Result<AuditEntry, TypesError> {
    let mut r = Reader::new(bytes);
    let id = r.u64()?;
    let kind_str = r.string()?;
    let kind = AuditKind::from_str_stable(&kind_str)
        .ok_or_else(|| TypesError::Decode(format!("unknown audit kind {kind_str}")))?;
    let reference = r.string()?;
    let details = r.string()?;
    let timestamp = r.u64()?;
    let block_height = r.u64()?;
    r.finish()?;
    Ok(AuditEntry {
        id,
        kind,
        reference,
        details,
        timestamp,
        block_height,
    })
}
