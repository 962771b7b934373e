//! Typed hub state with overlay and snapshot support

use crate::db::{cf, Database};
use crate::error::{StorageError, StorageResult};
use giro_primitives::{H256, U256};
use giro_types::codec;
use giro_types::{AuditEntry, CommandStatus, CreditDenom, MintCommand, NettingCycle, ValidatorSet, VoteStatus};
use std::collections::{BTreeMap, HashMap};

/// Meta keys
mod meta {
    /// Next audit entry id
    pub const AUDIT_SEQ: &str = "audit_seq";
    /// Next netting cycle id
    pub const NEXT_CYCLE_ID: &str = "next_cycle_id";
    /// Height of the last completed netting cycle
    pub const LAST_NETTING_BLOCK: &str = "last_netting_block";
    /// Last committed block height
    pub const LAST_HEIGHT: &str = "last_height";
}

/// `holder \x00 denom`
fn balance_key(holder: &str, denom: &CreditDenom) -> Vec<u8> {
    let mut key = Vec::with_capacity(holder.len() + 1 + denom.as_str().len());
    key.extend_from_slice(holder.as_bytes());
    key.push(0);
    key.extend_from_slice(denom.as_str().as_bytes());
    key
}

fn parse_balance_key(key: &[u8]) -> StorageResult<(String, CreditDenom)> {
    let sep = key
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| corrupt(cf::BALANCES, "missing separator in balance key"))?;
    let holder = String::from_utf8(key[..sep].to_vec())
        .map_err(|e| corrupt(cf::BALANCES, &e.to_string()))?;
    let denom_str = String::from_utf8(key[sep + 1..].to_vec())
        .map_err(|e| corrupt(cf::BALANCES, &e.to_string()))?;
    let denom =
        CreditDenom::parse(&denom_str).map_err(|e| corrupt(cf::BALANCES, &e.to_string()))?;
    Ok((holder, denom))
}

fn corrupt(cf: &'static str, reason: &str) -> StorageError {
    StorageError::Corrupt {
        cf,
        reason: reason.to_string(),
    }
}

/// In-memory overlay of uncommitted changes.
///
/// `None` values mark deletions so a commit can remove keys written in
/// earlier blocks.
#[derive(Clone, Default)]
pub struct StateCache {
    balances: HashMap<(String, CreditDenom), Option<U256>>,
    outstanding: HashMap<CreditDenom, U256>,
    votes: HashMap<H256, Option<VoteStatus>>,
    commands: HashMap<H256, MintCommand>,
    validator_sets: HashMap<u64, ValidatorSet>,
    current_set: Option<ValidatorSet>,
    cycles: HashMap<u64, NettingCycle>,
    audit: Vec<AuditEntry>,
    meta: HashMap<&'static str, u64>,
}

impl StateCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all uncommitted changes
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether the cache holds no changes
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
            && self.outstanding.is_empty()
            && self.votes.is_empty()
            && self.commands.is_empty()
            && self.validator_sets.is_empty()
            && self.current_set.is_none()
            && self.cycles.is_empty()
            && self.audit.is_empty()
            && self.meta.is_empty()
    }
}

/// Typed RocksDB access for hub records
pub struct StateDb {
    db: Database,
}

impl StateDb {
    /// Wrap an open database
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The underlying database
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Read a balance
    pub fn get_balance(&self, holder: &str, denom: &CreditDenom) -> StorageResult<Option<U256>> {
        let bytes = self.db.get(cf::BALANCES, &balance_key(holder, denom))?;
        bytes
            .map(|b| codec::decode_amount(&b).map_err(|e| corrupt(cf::BALANCES, &e.to_string())))
            .transpose()
    }

    /// All persisted balances in key order
    pub fn iter_balances(&self) -> StorageResult<Vec<((String, CreditDenom), U256)>> {
        let mut out = Vec::new();
        for (key, value) in self.db.scan(cf::BALANCES)? {
            let parsed = parse_balance_key(&key)?;
            let amount = codec::decode_amount(&value)
                .map_err(|e| corrupt(cf::BALANCES, &e.to_string()))?;
            out.push((parsed, amount));
        }
        Ok(out)
    }

    /// Read an outstanding total
    pub fn get_outstanding(&self, denom: &CreditDenom) -> StorageResult<Option<U256>> {
        let bytes = self.db.get(cf::OUTSTANDING, denom.as_str().as_bytes())?;
        bytes
            .map(|b| codec::decode_amount(&b).map_err(|e| corrupt(cf::OUTSTANDING, &e.to_string())))
            .transpose()
    }

    /// All outstanding totals
    pub fn iter_outstanding(&self) -> StorageResult<Vec<(CreditDenom, U256)>> {
        let mut out = Vec::new();
        for (key, value) in self.db.scan(cf::OUTSTANDING)? {
            let denom_str = String::from_utf8(key)
                .map_err(|e| corrupt(cf::OUTSTANDING, &e.to_string()))?;
            let denom = CreditDenom::parse(&denom_str)
                .map_err(|e| corrupt(cf::OUTSTANDING, &e.to_string()))?;
            let amount = codec::decode_amount(&value)
                .map_err(|e| corrupt(cf::OUTSTANDING, &e.to_string()))?;
            out.push((denom, amount));
        }
        Ok(out)
    }

    /// Read a vote status
    pub fn get_vote_status(&self, tx_hash: &H256) -> StorageResult<Option<VoteStatus>> {
        let bytes = self.db.get(cf::VOTES, tx_hash.as_bytes())?;
        bytes
            .map(|b| codec::decode_vote_status(&b).map_err(|e| corrupt(cf::VOTES, &e.to_string())))
            .transpose()
    }

    /// All persisted vote statuses
    pub fn iter_vote_statuses(&self) -> StorageResult<Vec<VoteStatus>> {
        self.db
            .scan(cf::VOTES)?
            .into_iter()
            .map(|(_, v)| {
                codec::decode_vote_status(&v).map_err(|e| corrupt(cf::VOTES, &e.to_string()))
            })
            .collect()
    }

    /// Read a mint command
    pub fn get_command(&self, command_id: &H256) -> StorageResult<Option<MintCommand>> {
        let bytes = self.db.get(cf::COMMANDS, command_id.as_bytes())?;
        bytes
            .map(|b| codec::decode_command(&b).map_err(|e| corrupt(cf::COMMANDS, &e.to_string())))
            .transpose()
    }

    /// All persisted commands
    pub fn iter_commands(&self) -> StorageResult<Vec<MintCommand>> {
        self.db
            .scan(cf::COMMANDS)?
            .into_iter()
            .map(|(_, v)| codec::decode_command(&v).map_err(|e| corrupt(cf::COMMANDS, &e.to_string())))
            .collect()
    }

    /// Current validator set
    pub fn current_validator_set(&self) -> StorageResult<Option<ValidatorSet>> {
        let bytes = self.db.get(cf::VALIDATORS, b"current")?;
        bytes
            .map(|b| {
                codec::decode_validator_set(&b).map_err(|e| corrupt(cf::VALIDATORS, &e.to_string()))
            })
            .transpose()
    }

    /// Historical validator set by version
    pub fn validator_set_at(&self, version: u64) -> StorageResult<Option<ValidatorSet>> {
        let mut key = Vec::with_capacity(9);
        key.push(b'v');
        key.extend_from_slice(&version.to_be_bytes());
        let bytes = self.db.get(cf::VALIDATORS, &key)?;
        bytes
            .map(|b| {
                codec::decode_validator_set(&b).map_err(|e| corrupt(cf::VALIDATORS, &e.to_string()))
            })
            .transpose()
    }

    /// Read a netting cycle
    pub fn get_cycle(&self, cycle_id: u64) -> StorageResult<Option<NettingCycle>> {
        let bytes = self.db.get(cf::CYCLES, &cycle_id.to_be_bytes())?;
        bytes
            .map(|b| codec::decode_cycle(&b).map_err(|e| corrupt(cf::CYCLES, &e.to_string())))
            .transpose()
    }

    /// Read an audit entry by id
    pub fn get_audit(&self, id: u64) -> StorageResult<Option<AuditEntry>> {
        let bytes = self.db.get(cf::AUDIT, &id.to_be_bytes())?;
        bytes
            .map(|b| codec::decode_audit_entry(&b).map_err(|e| corrupt(cf::AUDIT, &e.to_string())))
            .transpose()
    }

    /// Audit ids with `from_ts <= timestamp < to_ts`, in time order
    pub fn audit_ids_by_time(&self, from_ts: u64, to_ts: u64) -> StorageResult<Vec<u64>> {
        let mut ids = Vec::new();
        for (key, _) in self.db.scan(cf::AUDIT_BY_TIME)? {
            let (ts_bytes, id_bytes) = match (key.get(..8), key.get(8..16)) {
                (Some(ts), Some(id)) if key.len() == 16 => (ts, id),
                _ => return Err(corrupt(cf::AUDIT_BY_TIME, "malformed index key")),
            };
            let ts = u64::from_be_bytes(ts_bytes.try_into().map_err(|_| {
                corrupt(cf::AUDIT_BY_TIME, "malformed timestamp")
            })?);
            if ts < from_ts {
                continue;
            }
            if ts >= to_ts {
                break;
            }
            ids.push(u64::from_be_bytes(id_bytes.try_into().map_err(|_| {
                corrupt(cf::AUDIT_BY_TIME, "malformed id")
            })?));
        }
        Ok(ids)
    }

    /// Audit ids recorded under a kind, in id order
    pub fn audit_ids_by_kind(&self, kind: &str) -> StorageResult<Vec<u64>> {
        let mut prefix = kind.as_bytes().to_vec();
        prefix.push(0);
        let mut ids = Vec::new();
        for (key, _) in self.db.scan_prefix(cf::AUDIT_BY_KIND, &prefix)? {
            let tail: [u8; 8] = key[prefix.len()..]
                .try_into()
                .map_err(|_| corrupt(cf::AUDIT_BY_KIND, "short index key"))?;
            ids.push(u64::from_be_bytes(tail));
        }
        Ok(ids)
    }

    /// Read a meta scalar
    pub fn get_meta(&self, key: &str) -> StorageResult<Option<u64>> {
        let bytes = self.db.get(cf::META, key.as_bytes())?;
        bytes
            .map(|b| {
                let arr: [u8; 8] = b
                    .as_slice()
                    .try_into()
                    .map_err(|_| corrupt(cf::META, "meta value width"))?;
                Ok(u64::from_be_bytes(arr))
            })
            .transpose()
    }

    /// Atomically persist every change in the cache
    pub fn commit(&self, cache: &StateCache) -> StorageResult<()> {
        let mut batch = self.db.batch();

        for ((holder, denom), amount) in &cache.balances {
            let key = balance_key(holder, denom);
            match amount {
                Some(v) => self.db.batch_put(&mut batch, cf::BALANCES, &key, &codec::encode_amount(v))?,
                None => self.db.batch_delete(&mut batch, cf::BALANCES, &key)?,
            }
        }

        for (denom, amount) in &cache.outstanding {
            self.db.batch_put(
                &mut batch,
                cf::OUTSTANDING,
                denom.as_str().as_bytes(),
                &codec::encode_amount(amount),
            )?;
        }

        for (tx_hash, status) in &cache.votes {
            match status {
                Some(s) => self.db.batch_put(
                    &mut batch,
                    cf::VOTES,
                    tx_hash.as_bytes(),
                    &codec::encode_vote_status(s),
                )?,
                None => self.db.batch_delete(&mut batch, cf::VOTES, tx_hash.as_bytes())?,
            }
        }

        for (command_id, command) in &cache.commands {
            self.db.batch_put(
                &mut batch,
                cf::COMMANDS,
                command_id.as_bytes(),
                &codec::encode_command(command),
            )?;
        }

        for (version, set) in &cache.validator_sets {
            let mut key = Vec::with_capacity(9);
            key.push(b'v');
            key.extend_from_slice(&version.to_be_bytes());
            self.db.batch_put(
                &mut batch,
                cf::VALIDATORS,
                &key,
                &codec::encode_validator_set(set),
            )?;
        }
        if let Some(set) = &cache.current_set {
            self.db.batch_put(
                &mut batch,
                cf::VALIDATORS,
                b"current",
                &codec::encode_validator_set(set),
            )?;
        }

        for (cycle_id, cycle) in &cache.cycles {
            self.db.batch_put(
                &mut batch,
                cf::CYCLES,
                &cycle_id.to_be_bytes(),
                &codec::encode_cycle(cycle),
            )?;
        }

        for entry in &cache.audit {
            let id_key = entry.id.to_be_bytes();
            self.db
                .batch_put(&mut batch, cf::AUDIT, &id_key, &codec::encode_audit_entry(entry))?;

            let mut time_key = Vec::with_capacity(16);
            time_key.extend_from_slice(&entry.timestamp.to_be_bytes());
            time_key.extend_from_slice(&id_key);
            self.db.batch_put(&mut batch, cf::AUDIT_BY_TIME, &time_key, &[])?;

            let mut kind_key = entry.kind.as_str().as_bytes().to_vec();
            kind_key.push(0);
            kind_key.extend_from_slice(&id_key);
            self.db.batch_put(&mut batch, cf::AUDIT_BY_KIND, &kind_key, &[])?;
        }

        for (key, value) in &cache.meta {
            self.db
                .batch_put(&mut batch, cf::META, key.as_bytes(), &value.to_be_bytes())?;
        }

        self.db.write_batch(batch)
    }
}

/// Hub state: overlay cache, optional backing database, snapshot stack.
///
/// Reads check the cache first and fall through to the database. Writes go
/// only to the cache. `snapshot`/`revert_snapshot` bracket any mutation
/// that must be all-or-nothing (one submitted transaction, one netting
/// cycle). `commit` flushes the cache in a single write batch.
pub struct HubState {
    cache: StateCache,
    db: Option<StateDb>,
    snapshots: Vec<StateCache>,
}

impl Default for HubState {
    fn default() -> Self {
        Self::new()
    }
}

impl HubState {
    /// Pure in-memory state (tests and simulations)
    pub fn new() -> Self {
        Self {
            cache: StateCache::new(),
            db: None,
            snapshots: Vec::new(),
        }
    }

    /// State backed by a database; cache misses read through
    pub fn with_db(db: StateDb) -> Self {
        Self {
            cache: StateCache::new(),
            db: Some(db),
            snapshots: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Push a snapshot of the current overlay
    pub fn snapshot(&mut self) {
        self.snapshots.push(self.cache.clone());
    }

    /// Discard the most recent snapshot, keeping changes
    pub fn commit_snapshot(&mut self) -> StorageResult<()> {
        self.snapshots.pop().ok_or(StorageError::NoSnapshot)?;
        Ok(())
    }

    /// Restore the most recent snapshot, dropping changes made since
    pub fn revert_snapshot(&mut self) -> StorageResult<()> {
        self.cache = self.snapshots.pop().ok_or(StorageError::NoSnapshot)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Balances and outstanding totals
    // ------------------------------------------------------------------

    /// Credit balance of `holder` in `denom` (zero when absent)
    pub fn balance(&self, holder: &str, denom: &CreditDenom) -> StorageResult<U256> {
        if let Some(entry) = self.cache.balances.get(&(holder.to_string(), denom.clone())) {
            return Ok(entry.unwrap_or_default());
        }
        if let Some(db) = &self.db {
            return Ok(db.get_balance(holder, denom)?.unwrap_or_default());
        }
        Ok(U256::zero())
    }

    /// Write a balance; zero deletes the key
    pub fn set_balance(&mut self, holder: &str, denom: &CreditDenom, amount: U256) {
        let key = (holder.to_string(), denom.clone());
        if amount.is_zero() {
            self.cache.balances.insert(key, None);
        } else {
            self.cache.balances.insert(key, Some(amount));
        }
    }

    /// Outstanding total for a denom (zero when absent)
    pub fn outstanding(&self, denom: &CreditDenom) -> StorageResult<U256> {
        if let Some(v) = self.cache.outstanding.get(denom) {
            return Ok(*v);
        }
        if let Some(db) = &self.db {
            return Ok(db.get_outstanding(denom)?.unwrap_or_default());
        }
        Ok(U256::zero())
    }

    /// Write an outstanding total
    pub fn set_outstanding(&mut self, denom: &CreditDenom, amount: U256) {
        self.cache.outstanding.insert(denom.clone(), amount);
    }

    /// Every positive balance, in deterministic `(holder, denom)` order
    pub fn positive_balances(&self) -> StorageResult<BTreeMap<(String, CreditDenom), U256>> {
        let mut merged: BTreeMap<(String, CreditDenom), U256> = BTreeMap::new();
        if let Some(db) = &self.db {
            for (key, amount) in db.iter_balances()? {
                merged.insert(key, amount);
            }
        }
        for (key, entry) in &self.cache.balances {
            match entry {
                Some(v) => {
                    merged.insert(key.clone(), *v);
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged.retain(|_, v| !v.is_zero());
        Ok(merged)
    }

    /// Every outstanding total, holders of the denom included or not
    pub fn all_outstanding(&self) -> StorageResult<BTreeMap<CreditDenom, U256>> {
        let mut merged: BTreeMap<CreditDenom, U256> = BTreeMap::new();
        if let Some(db) = &self.db {
            for (denom, amount) in db.iter_outstanding()? {
                merged.insert(denom, amount);
            }
        }
        for (denom, amount) in &self.cache.outstanding {
            merged.insert(denom.clone(), *amount);
        }
        Ok(merged)
    }

    // ------------------------------------------------------------------
    // Vote statuses
    // ------------------------------------------------------------------

    /// Read a vote status
    pub fn vote_status(&self, tx_hash: &H256) -> StorageResult<Option<VoteStatus>> {
        if let Some(entry) = self.cache.votes.get(tx_hash) {
            return Ok(entry.clone());
        }
        if let Some(db) = &self.db {
            return db.get_vote_status(tx_hash);
        }
        Ok(None)
    }

    /// Write a vote status
    pub fn put_vote_status(&mut self, status: VoteStatus) {
        self.cache.votes.insert(status.tx_hash, Some(status));
    }

    /// Remove a vote status (expiry)
    pub fn remove_vote_status(&mut self, tx_hash: &H256) {
        self.cache.votes.insert(*tx_hash, None);
    }

    /// All vote statuses, overlay applied, in tx-hash order
    pub fn all_vote_statuses(&self) -> StorageResult<Vec<VoteStatus>> {
        let mut merged: BTreeMap<H256, VoteStatus> = BTreeMap::new();
        if let Some(db) = &self.db {
            for status in db.iter_vote_statuses()? {
                merged.insert(status.tx_hash, status);
            }
        }
        for (tx_hash, entry) in &self.cache.votes {
            match entry {
                Some(s) => {
                    merged.insert(*tx_hash, s.clone());
                }
                None => {
                    merged.remove(tx_hash);
                }
            }
        }
        Ok(merged.into_values().collect())
    }

    // ------------------------------------------------------------------
    // Mint commands
    // ------------------------------------------------------------------

    /// Read a mint command
    pub fn command(&self, command_id: &H256) -> StorageResult<Option<MintCommand>> {
        if let Some(cmd) = self.cache.commands.get(command_id) {
            return Ok(Some(cmd.clone()));
        }
        if let Some(db) = &self.db {
            return db.get_command(command_id);
        }
        Ok(None)
    }

    /// Write a mint command
    pub fn put_command(&mut self, command: MintCommand) {
        self.cache.commands.insert(command.command_id, command);
    }

    /// All commands in the given status, in command-id order
    pub fn commands_in_status(&self, status: CommandStatus) -> StorageResult<Vec<MintCommand>> {
        let mut merged: BTreeMap<H256, MintCommand> = BTreeMap::new();
        if let Some(db) = &self.db {
            for cmd in db.iter_commands()? {
                merged.insert(cmd.command_id, cmd);
            }
        }
        for (id, cmd) in &self.cache.commands {
            merged.insert(*id, cmd.clone());
        }
        Ok(merged
            .into_values()
            .filter(|c| c.status == status)
            .collect())
    }

    // ------------------------------------------------------------------
    // Validator sets
    // ------------------------------------------------------------------

    /// Current validator set, if genesis has been applied
    pub fn validator_set(&self) -> StorageResult<Option<ValidatorSet>> {
        if let Some(set) = &self.cache.current_set {
            return Ok(Some(set.clone()));
        }
        if let Some(db) = &self.db {
            return db.current_validator_set();
        }
        Ok(None)
    }

    /// A historical validator set by version
    pub fn validator_set_at(&self, version: u64) -> StorageResult<Option<ValidatorSet>> {
        if let Some(set) = self.cache.validator_sets.get(&version) {
            return Ok(Some(set.clone()));
        }
        if let Some(db) = &self.db {
            return db.validator_set_at(version);
        }
        Ok(None)
    }

    /// Install a new current set, retaining it under its version
    pub fn put_validator_set(&mut self, set: ValidatorSet) {
        self.cache.validator_sets.insert(set.version, set.clone());
        self.cache.current_set = Some(set);
    }

    // ------------------------------------------------------------------
    // Netting cycles
    // ------------------------------------------------------------------

    /// Read a netting cycle
    pub fn cycle(&self, cycle_id: u64) -> StorageResult<Option<NettingCycle>> {
        if let Some(cycle) = self.cache.cycles.get(&cycle_id) {
            return Ok(Some(cycle.clone()));
        }
        if let Some(db) = &self.db {
            return db.get_cycle(cycle_id);
        }
        Ok(None)
    }

    /// Write a netting cycle
    pub fn put_cycle(&mut self, cycle: NettingCycle) {
        self.cache.cycles.insert(cycle.cycle_id, cycle);
    }

    // ------------------------------------------------------------------
    // Audit log
    // ------------------------------------------------------------------

    /// Allocate the next audit id
    pub fn next_audit_id(&mut self) -> StorageResult<u64> {
        let next = self.get_meta(meta::AUDIT_SEQ)?.unwrap_or(0);
        self.set_meta(meta::AUDIT_SEQ, next + 1);
        Ok(next)
    }

    /// Append an audit entry (id must come from `next_audit_id`)
    pub fn append_audit(&mut self, entry: AuditEntry) {
        self.cache.audit.push(entry);
    }

    /// Uncommitted audit entries (test observability)
    pub fn pending_audit(&self) -> &[AuditEntry] {
        &self.cache.audit
    }

    /// Audit entries with `from_ts <= timestamp < to_ts`: committed ids
    /// via the time index, plus overlay
    pub fn audit_by_time(&self, from_ts: u64, to_ts: u64) -> StorageResult<Vec<AuditEntry>> {
        let mut entries = Vec::new();
        if let Some(db) = &self.db {
            for id in db.audit_ids_by_time(from_ts, to_ts)? {
                if let Some(entry) = db.get_audit(id)? {
                    entries.push(entry);
                }
            }
        }
        entries.extend(
            self.cache
                .audit
                .iter()
                .filter(|e| e.timestamp >= from_ts && e.timestamp < to_ts)
                .cloned(),
        );
        entries.sort_by_key(|e| (e.timestamp, e.id));
        Ok(entries)
    }

    /// Audit entries of a kind: committed ids via the index, plus overlay
    pub fn audit_by_kind(&self, kind: &str) -> StorageResult<Vec<AuditEntry>> {
        let mut entries = Vec::new();
        if let Some(db) = &self.db {
            for id in db.audit_ids_by_kind(kind)? {
                if let Some(entry) = db.get_audit(id)? {
                    entries.push(entry);
                }
            }
        }
        entries.extend(
            self.cache
                .audit
                .iter()
                .filter(|e| e.kind.as_str() == kind)
                .cloned(),
        );
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    // ------------------------------------------------------------------
    // Meta scalars
    // ------------------------------------------------------------------

    /// Read a meta scalar
    pub fn get_meta(&self, key: &'static str) -> StorageResult<Option<u64>> {
        if let Some(v) = self.cache.meta.get(key) {
            return Ok(Some(*v));
        }
        if let Some(db) = &self.db {
            return db.get_meta(key);
        }
        Ok(None)
    }

    /// Write a meta scalar
    pub fn set_meta(&mut self, key: &'static str, value: u64) {
        self.cache.meta.insert(key, value);
    }

    /// Height of the last completed netting cycle
    pub fn last_netting_block(&self) -> StorageResult<u64> {
        Ok(self.get_meta(meta::LAST_NETTING_BLOCK)?.unwrap_or(0))
    }

    /// Record the last netting height
    pub fn set_last_netting_block(&mut self, height: u64) {
        self.set_meta(meta::LAST_NETTING_BLOCK, height);
    }

    /// Allocate the next cycle id (starting at 1)
    pub fn next_cycle_id(&mut self) -> StorageResult<u64> {
        let next = self.get_meta(meta::NEXT_CYCLE_ID)?.unwrap_or(1);
        self.set_meta(meta::NEXT_CYCLE_ID, next + 1);
        Ok(next)
    }

    /// Last committed block height
    pub fn last_height(&self) -> StorageResult<u64> {
        Ok(self.get_meta(meta::LAST_HEIGHT)?.unwrap_or(0))
    }

    /// Record the committed block height
    pub fn set_last_height(&mut self, height: u64) {
        self.set_meta(meta::LAST_HEIGHT, height);
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    /// Flush the overlay.
    ///
    /// With a backing database this writes one atomic batch and empties the
    /// cache; without one the cache *is* the state and is left in place.
    /// Open snapshots indicate a logic error and are cleared either way.
    pub fn commit(&mut self) -> StorageResult<()> {
        self.snapshots.clear();
        if let Some(db) = &self.db {
            db.commit(&self.cache)?;
            self.cache.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use giro_primitives::Address;
    use giro_types::TransferEvent;
    use tempfile::TempDir;

    fn denom(issuer: &str) -> CreditDenom {
        CreditDenom::for_issuer(issuer)
    }

    fn sample_status(tx: u8) -> VoteStatus {
        let event = TransferEvent {
            tx_hash: H256::from_bytes([tx; 32]),
            source_chain: "chain-a".into(),
            dest_chain: "chain-b".into(),
            sender: "alice".into(),
            recipient: Address::from_bytes([0x22; 20]),
            amount: U256::from(100u64),
            nonce: 1,
            block_height: 1,
            timestamp: 1000,
        };
        let hash = codec::event_hash(&event);
        let mut status = VoteStatus::open(event, hash, 2, 1, 101);
        status.tx_hash = H256::from_bytes([tx; 32]);
        status
    }

    #[test]
    fn test_memory_balance_roundtrip() {
        let mut state = HubState::new();
        let d = denom("chain-a");

        assert!(state.balance("chain-b", &d).unwrap().is_zero());
        state.set_balance("chain-b", &d, U256::from(100u64));
        assert_eq!(state.balance("chain-b", &d).unwrap(), U256::from(100u64));

        state.set_balance("chain-b", &d, U256::zero());
        assert!(state.balance("chain-b", &d).unwrap().is_zero());
        assert!(state.positive_balances().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_revert() {
        let mut state = HubState::new();
        let d = denom("chain-a");
        state.set_balance("chain-b", &d, U256::from(100u64));

        state.snapshot();
        state.set_balance("chain-b", &d, U256::from(1u64));
        state.set_outstanding(&d, U256::from(1u64));
        state.revert_snapshot().unwrap();

        assert_eq!(state.balance("chain-b", &d).unwrap(), U256::from(100u64));
        assert!(state.outstanding(&d).unwrap().is_zero());
    }

    #[test]
    fn test_snapshot_commit_keeps_changes() {
        let mut state = HubState::new();
        let d = denom("chain-a");

        state.snapshot();
        state.set_balance("chain-b", &d, U256::from(5u64));
        state.commit_snapshot().unwrap();

        assert_eq!(state.balance("chain-b", &d).unwrap(), U256::from(5u64));
    }

    #[test]
    fn test_revert_without_snapshot_errors() {
        let mut state = HubState::new();
        assert!(matches!(
            state.revert_snapshot(),
            Err(StorageError::NoSnapshot)
        ));
    }

    #[test]
    fn test_db_commit_and_read_through() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let mut state = HubState::with_db(StateDb::new(db.clone()));
        let d = denom("chain-a");

        state.set_balance("chain-b", &d, U256::from(100u64));
        state.set_outstanding(&d, U256::from(100u64));
        state.put_vote_status(sample_status(0x07));
        state.commit().unwrap();

        // Cache is empty now; reads fall through to the database
        let mut reopened = HubState::with_db(StateDb::new(db));
        assert_eq!(reopened.balance("chain-b", &d).unwrap(), U256::from(100u64));
        assert_eq!(reopened.outstanding(&d).unwrap(), U256::from(100u64));
        assert!(reopened
            .vote_status(&H256::from_bytes([0x07; 32]))
            .unwrap()
            .is_some());

        // Deleting through the overlay shadows the committed value
        reopened.set_balance("chain-b", &d, U256::zero());
        assert!(reopened.balance("chain-b", &d).unwrap().is_zero());
        assert!(reopened.positive_balances().unwrap().is_empty());
    }

    #[test]
    fn test_vote_status_removal_shadows_db() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let mut state = HubState::with_db(StateDb::new(db));

        state.put_vote_status(sample_status(0x07));
        state.commit().unwrap();

        state.remove_vote_status(&H256::from_bytes([0x07; 32]));
        assert!(state
            .vote_status(&H256::from_bytes([0x07; 32]))
            .unwrap()
            .is_none());
        assert!(state.all_vote_statuses().unwrap().is_empty());

        state.commit().unwrap();
        assert!(state
            .vote_status(&H256::from_bytes([0x07; 32]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_audit_sequence_and_index() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let mut state = HubState::with_db(StateDb::new(db));

        for i in 0..3u64 {
            let id = state.next_audit_id().unwrap();
            assert_eq!(id, i);
            state.append_audit(AuditEntry {
                id,
                kind: if i == 1 {
                    giro_types::AuditKind::VoteRejected
                } else {
                    giro_types::AuditKind::VoteAccepted
                },
                reference: format!("ref-{i}"),
                details: String::new(),
                timestamp: 1000 + i,
                block_height: 1,
            });
        }
        state.commit().unwrap();

        let accepted = state.audit_by_kind("vote_accepted").unwrap();
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].id, 0);
        assert_eq!(accepted[1].id, 2);

        // Sequence continues after commit
        assert_eq!(state.next_audit_id().unwrap(), 3);

        // Time index: half-open range over the committed timestamps
        let window = state.audit_by_time(1000, 1002).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].timestamp, 1000);
        assert_eq!(window[1].timestamp, 1001);
    }

    #[test]
    fn test_positive_balances_merges_overlay() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let mut state = HubState::with_db(StateDb::new(db));

        state.set_balance("chain-b", &denom("chain-a"), U256::from(100u64));
        state.commit().unwrap();

        state.set_balance("chain-a", &denom("chain-b"), U256::from(30u64));
        let all = state.positive_balances().unwrap();
        assert_eq!(all.len(), 2);
        // BTreeMap ordering: chain-a before chain-b
        let keys: Vec<_> = all.keys().map(|(h, _)| h.clone()).collect();
        assert_eq!(keys, vec!["chain-a".to_string(), "chain-b".to_string()]);
    }

    #[test]
    fn test_validator_set_versions() {
        let mut state = HubState::new();
        let set_v1 = ValidatorSet::from_validators(vec![], 0, 1);
        let mut set_v2 = set_v1.clone();
        set_v2.version = 2;

        state.put_validator_set(set_v1);
        state.put_validator_set(set_v2);

        assert_eq!(state.validator_set().unwrap().unwrap().version, 2);
        assert_eq!(state.validator_set_at(1).unwrap().unwrap().version, 1);
        assert_eq!(state.validator_set_at(2).unwrap().unwrap().version, 2);
        assert!(state.validator_set_at(3).unwrap().is_none());
    }

    #[test]
    fn test_cycle_and_meta() {
        let mut state = HubState::new();
        assert_eq!(state.next_cycle_id().unwrap(), 1);
        assert_eq!(state.next_cycle_id().unwrap(), 2);
        assert_eq!(state.last_netting_block().unwrap(), 0);
        state.set_last_netting_block(10);
        assert_eq!(state.last_netting_block().unwrap(), 10);
    }
}
