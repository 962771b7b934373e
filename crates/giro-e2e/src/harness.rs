//! Test harness: validator fixtures, block stepping, mock chains

use async_trait::async_trait;
use giro_crypto::{
    encode_pubkey, keccak256, public_key_to_address, recover_signer, sign, PrivateKey, Signature,
};
use giro_hub::{GenesisState, GenesisValidator, Hub, HubResult};
use giro_primitives::{Address, H256, U256};
use giro_relay::{
    DestinationChain, ExecutionReceipt, HubClient, RelayError, RelayResult, SourceChain,
    TransferInitiated, VoteAck,
};
use giro_store::HubState;
use giro_types::codec::{event_hash, mint_digest};
use giro_types::{HubEvent, HubTx, MintCommand, TransferEvent, Vote};
use k256::ecdsa::SigningKey;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Admin address used by every harness hub
pub const TEST_ADMIN: Address = Address::from_bytes([0xad; 20]);

/// A validator with a real signing key
#[derive(Clone)]
pub struct TestValidator {
    /// secp256k1 signing key
    pub key: PrivateKey,
    /// Address derived from the key
    pub address: Address,
}

impl TestValidator {
    /// Create a validator with a random key
    pub fn random() -> Self {
        let key = SigningKey::random(&mut rand::thread_rng());
        let address = public_key_to_address(key.verifying_key());
        Self { key, address }
    }

    /// Compressed public key for genesis registration
    pub fn pubkey(&self) -> [u8; 33] {
        encode_pubkey(self.key.verifying_key())
    }

    /// A signed vote transaction for the event
    pub fn vote(&self, event: &TransferEvent, vote_time: u64) -> HubTx {
        let digest = event_hash(event);
        HubTx::Vote(Vote {
            validator: self.address,
            event: event.clone(),
            signature: sign(&digest, &self.key).expect("signing"),
            vote_time,
        })
    }

    /// A signature transaction over the command's mint pre-image
    pub fn command_signature(&self, command: &MintCommand) -> HubTx {
        HubTx::SubmitSignature {
            command_id: command.command_id,
            signer: self.address,
            signature: self.sign_preimage(command),
        }
    }

    /// Raw signature over the command's mint pre-image digest
    pub fn sign_preimage(&self, command: &MintCommand) -> Signature {
        let digest = mint_digest(
            &command.command_id,
            &command.recipient,
            &command.amount,
            &command.target_chain,
        );
        sign(&digest, &self.key).expect("signing")
    }
}

/// A hub with validators and manual block stepping
pub struct HubHarness {
    /// The hub under test
    pub hub: Hub,
    /// Genesis validators, index-addressable
    pub validators: Vec<TestValidator>,
    height: u64,
    block_open: bool,
}

impl HubHarness {
    /// Genesis a fresh in-memory hub with `n` validators
    pub fn new(n: usize) -> Self {
        Self::with_params(n, giro_types::HubParams::default())
    }

    /// Genesis with explicit parameters
    pub fn with_params(n: usize, params: giro_types::HubParams) -> Self {
        let validators: Vec<TestValidator> = (0..n).map(|_| TestValidator::random()).collect();
        Self::with_validators(validators, params)
    }

    /// Genesis with a caller-supplied validator set (for replica tests)
    pub fn with_validators(validators: Vec<TestValidator>, params: giro_types::HubParams) -> Self {
        let genesis = GenesisState {
            validators: validators
                .iter()
                .map(|v| GenesisValidator {
                    pubkey: v.pubkey(),
                    power: 1,
                })
                .collect(),
            credits: Vec::new(),
            params,
            admin: TEST_ADMIN,
        };
        let hub = Hub::from_genesis(genesis, HubState::new()).expect("genesis");
        Self {
            hub,
            validators,
            height: 0,
            block_open: false,
        }
    }

    /// Current height
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Open the next block
    pub fn open_block(&mut self) {
        assert!(!self.block_open, "block already open");
        self.height += 1;
        self.hub.begin_block(self.height, 1_700_000_000 + self.height);
        self.block_open = true;
    }

    /// Deliver into the open block
    pub fn deliver(&mut self, sender: Address, tx: HubTx) -> HubResult<()> {
        assert!(self.block_open, "no open block");
        self.hub.deliver(sender, tx)
    }

    /// Run the end-block hook, commit, and drain events
    pub fn seal_block(&mut self) -> Vec<HubEvent> {
        assert!(self.block_open, "no open block");
        self.hub.end_block().expect("end_block");
        self.hub.commit().expect("commit");
        self.block_open = false;
        self.hub.take_events()
    }

    /// Seal empty blocks until (and including) `height`
    pub fn run_to_height(&mut self, height: u64) -> Vec<HubEvent> {
        let mut events = Vec::new();
        while self.height < height {
            self.open_block();
            events.extend(self.seal_block());
        }
        events
    }

    /// The deterministic command id for an event
    pub fn command_id_for(event: &TransferEvent) -> H256 {
        giro_types::codec::command_id(
            &event.tx_hash,
            &event.dest_chain,
            &event.recipient,
            &event.amount,
            event.nonce,
        )
    }

    /// Drive a transfer to `Confirmed` with the first `k` validators
    pub fn confirm_with(&mut self, event: &TransferEvent, k: usize) -> Vec<HubEvent> {
        self.open_block();
        for validator in self.validators[..k].to_vec() {
            self.deliver(validator.address, validator.vote(event, 1_700_000_000))
                .expect("vote accepted");
        }
        self.seal_block()
    }

    /// Drive a pending command to `Signed` with the first `k` validators
    pub fn sign_with(&mut self, command: &MintCommand, k: usize) -> Vec<HubEvent> {
        self.open_block();
        for validator in self.validators[..k].to_vec() {
            self.deliver(validator.address, validator.command_signature(command))
                .expect("signature accepted");
        }
        self.seal_block()
    }
}

/// A standard S1-style transfer event fixture
pub fn transfer_event(tx: u8, amount: u64, nonce: u64) -> TransferEvent {
    TransferEvent {
        tx_hash: H256::from_bytes([tx; 32]),
        source_chain: "chain-a".into(),
        dest_chain: "chain-b".into(),
        sender: "alice".into(),
        recipient: Address::from_bytes([0xb0; 20]),
        amount: U256::from(amount),
        nonce,
        block_height: 1,
        timestamp: 1_700_000_000,
    }
}

// ============================================================================
// Relay-facing mocks
// ============================================================================

/// A hub that processes each submission in its own block.
///
/// Gives the relay the same serialized, transactional semantics as the
/// node's block driver, without timing.
pub struct SoloBlockHub {
    inner: AsyncMutex<HubHarness>,
}

impl SoloBlockHub {
    /// Wrap a harness
    pub fn new(harness: HubHarness) -> Self {
        Self {
            inner: AsyncMutex::new(harness),
        }
    }

    /// Access the harness (for assertions between relay phases)
    pub async fn harness(&self) -> tokio::sync::MutexGuard<'_, HubHarness> {
        self.inner.lock().await
    }

    async fn one_block_tx(&self, sender: Address, tx: HubTx) -> Result<(), String> {
        let mut harness = self.inner.lock().await;
        harness.open_block();
        let result = harness.deliver(sender, tx).map_err(|e| e.code().to_string());
        harness.seal_block();
        result
    }
}

#[async_trait]
impl HubClient for SoloBlockHub {
    async fn submit_vote(&self, vote: Vote) -> RelayResult<VoteAck> {
        let sender = vote.validator;
        match self.one_block_tx(sender, HubTx::Vote(vote)).await {
            Ok(()) => Ok(VoteAck::Accepted),
            Err(code) if code == "duplicate_vote" => Ok(VoteAck::Duplicate),
            Err(code) => Err(RelayError::Permanent(code)),
        }
    }

    async fn pending_commands(&self) -> RelayResult<Vec<MintCommand>> {
        let harness = self.inner.lock().await;
        harness
            .hub
            .state()
            .commands_in_status(giro_types::CommandStatus::Pending)
            .map_err(|e| RelayError::Transient(e.to_string()))
    }

    async fn signed_commands(&self) -> RelayResult<Vec<MintCommand>> {
        let harness = self.inner.lock().await;
        harness
            .hub
            .signed_commands()
            .map_err(|e| RelayError::Transient(e.to_string()))
    }

    async fn submit_signature(
        &self,
        command_id: H256,
        signer: Address,
        signature: Signature,
    ) -> RelayResult<()> {
        self.one_block_tx(
            signer,
            HubTx::SubmitSignature {
                command_id,
                signer,
                signature,
            },
        )
        .await
        .map_err(RelayError::Permanent)
    }

    async fn mark_executed(&self, command_id: H256) -> RelayResult<()> {
        let mut harness = self.inner.lock().await;
        harness.open_block();
        let result = harness
            .hub
            .mark_command_executed(&command_id)
            .map_err(|e| RelayError::Permanent(e.code().to_string()));
        harness.seal_block();
        result
    }

    async fn mark_failed(&self, command_id: H256, reason: String) -> RelayResult<()> {
        let mut harness = self.inner.lock().await;
        harness.open_block();
        let result = harness
            .hub
            .mark_command_failed(&command_id, &reason)
            .map_err(|e| RelayError::Permanent(e.code().to_string()));
        harness.seal_block();
        result
    }
}

/// A scripted source chain
pub struct MockSource {
    chain: String,
    latest: Mutex<u64>,
    events: Mutex<Vec<TransferInitiated>>,
}

impl MockSource {
    /// Create an empty source
    pub fn new(chain: &str) -> Self {
        Self {
            chain: chain.to_string(),
            latest: Mutex::new(0),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Emit an event at its block height
    pub fn emit(&self, event: TransferInitiated) {
        let mut latest = self.latest.lock();
        *latest = (*latest).max(event.block_height);
        self.events.lock().push(event);
    }
}

#[async_trait]
impl SourceChain for MockSource {
    fn chain_id(&self) -> &str {
        &self.chain
    }

    async fn latest_block(&self) -> RelayResult<u64> {
        Ok(*self.latest.lock())
    }

    async fn fetch_events(&self, from: u64, to: u64) -> RelayResult<Vec<TransferInitiated>> {
        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| e.block_height >= from && e.block_height <= to)
            .cloned()
            .collect())
    }
}

/// A destination ledger that verifies like the real contract.
///
/// Checks the canonical pre-image signature recovery against the pinned
/// validator addresses, requires threshold-many distinct valid signers,
/// and refuses replayed command ids.
pub struct VerifyingDestination {
    chain: String,
    validators: Mutex<Vec<Address>>,
    threshold: usize,
    processed: Mutex<HashSet<H256>>,
    minted: Mutex<Vec<(Address, U256)>>,
}

impl VerifyingDestination {
    /// Create a destination trusting the given validator addresses
    pub fn new(chain: &str, validators: Vec<Address>, threshold: usize) -> Self {
        Self {
            chain: chain.to_string(),
            validators: Mutex::new(validators),
            threshold,
            processed: Mutex::new(HashSet::new()),
            minted: Mutex::new(Vec::new()),
        }
    }

    /// Mints executed so far, in order
    pub fn minted(&self) -> Vec<(Address, U256)> {
        self.minted.lock().clone()
    }

    /// Whether a command id has been processed
    pub fn is_processed(&self, command_id: &H256) -> bool {
        self.processed.lock().contains(command_id)
    }

    /// Replace the trusted validator set (gossiped set update)
    pub fn update_validators(&self, validators: Vec<Address>) {
        *self.validators.lock() = validators;
    }
}

#[async_trait]
impl DestinationChain for VerifyingDestination {
    fn chain_id(&self) -> &str {
        &self.chain
    }

    async fn execute_mint(
        &self,
        command_id: H256,
        recipient: Address,
        amount: U256,
        signatures: Vec<[u8; 65]>,
    ) -> RelayResult<ExecutionReceipt> {
        if self.processed.lock().contains(&command_id) {
            return Err(RelayError::Permanent("command already processed".into()));
        }

        // Verify against the §4.1 pre-image, exactly as the contract does.
        let digest = mint_digest(&command_id, &recipient, &amount, &self.chain);
        let trusted = self.validators.lock().clone();
        let mut recovered = HashSet::new();
        for bytes in &signatures {
            let signature = Signature::from_bytes(bytes);
            if bytes[64] != 27 && bytes[64] != 28 {
                continue;
            }
            if let Ok(signer) = recover_signer(&digest, &signature) {
                if trusted.contains(&signer) {
                    recovered.insert(signer);
                }
            }
        }
        if recovered.len() < self.threshold {
            return Err(RelayError::Permanent(format!(
                "invalid signature set: {} of {} required",
                recovered.len(),
                self.threshold
            )));
        }

        self.processed.lock().insert(command_id);
        self.minted.lock().push((recipient, amount));
        Ok(ExecutionReceipt {
            tx_hash: keccak256(command_id.as_bytes()),
            block_height: self.processed.lock().len() as u64,
        })
    }
}
