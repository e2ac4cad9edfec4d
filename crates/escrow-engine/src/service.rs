//! # Escrow Service
//!
//! Runs the six escrow operations against an asset ledger.
//!
//! ## Transaction Model
//!
//! Every operation follows the same shape while holding the records lock:
//!
//! 1. Validate preconditions against the current records
//! 2. Compute the next records purely (checked arithmetic, no mutation)
//! 3. Perform at most one `AssetLedger` transfer
//! 4. Commit the next records only if the transfer succeeded
//!
//! A failure at any step returns before step 4, so nothing is observable.
//!
//! ## Security
//!
//! - `EscrowApi` trusts the `caller` it is given; hosts authenticate first
//! - `InstructionExecutor::submit` verifies the signature, rejects expired
//!   instructions, then burns the nonce

use crate::adapters::{Ed25519Verifier, InMemoryLedger, KeccakAddressSpace};
use crate::config::EngineConfig;
use crate::domain::conflicts::{detect_conflicts, AccessPattern, ConflictInfo};
use crate::domain::entities::{
    EscrowRecords, EscrowState, OperationKind, ParticipantState, PoolParams,
};
use crate::domain::invariants::{check_all_invariants, InvariantCheckResult};
use crate::domain::value_objects::{Address, Amount, Identity};
use crate::errors::{ConfigError, ErrorKind, EscrowError};
use crate::events::EscrowEvent;
use crate::ports::inbound::{
    signing_message, EscrowApi, Instruction, InstructionExecutor, Receipt, SignedInstruction,
};
use crate::ports::outbound::{AddressSpace, AssetLedger, SignatureVerifier};
use crate::replay::{unix_timestamp, NonceCache, NonceStatus};

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Statistics for the escrow service.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceStats {
    /// Operations committed.
    pub committed: u64,
    /// Operations rejected (any error).
    pub rejected: u64,
    /// Rejections per error category.
    pub rejections_by_kind: BTreeMap<ErrorKind, u64>,
    /// Sum of all stakes ever committed.
    pub total_staked: Amount,
    /// Sum of all payouts ever committed.
    pub total_withdrawn: Amount,
}

impl ServiceStats {
    /// Rejections recorded for `kind`.
    #[must_use]
    pub fn rejections(&self, kind: ErrorKind) -> u64 {
        self.rejections_by_kind.get(&kind).copied().unwrap_or(0)
    }
}

/// The escrow engine service.
///
/// This service:
/// 1. Owns the escrow and participant records
/// 2. Executes operations atomically against the asset ledger
/// 3. Authenticates and de-duplicates signed instructions
/// 4. Keeps an audit log of receipts and running statistics
pub struct EscrowService<L: AssetLedger, A: AddressSpace, V: SignatureVerifier> {
    /// Service configuration.
    config: EngineConfig,
    /// Asset ledger adapter.
    ledger: Arc<L>,
    /// Record address derivation.
    addresses: A,
    /// Signer authentication.
    verifier: V,
    /// Persisted records; the lock serializes operations.
    records: Mutex<EscrowRecords>,
    /// Consumed nonces.
    nonces: NonceCache,
    /// Bounded receipt log, oldest first.
    audit_log: RwLock<VecDeque<Receipt>>,
    /// Service statistics.
    stats: RwLock<ServiceStats>,
}

impl<L: AssetLedger, A: AddressSpace, V: SignatureVerifier> EscrowService<L, A, V> {
    /// Create a new escrow service over an empty record set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` fails validation.
    pub fn new(
        ledger: Arc<L>,
        addresses: A,
        verifier: V,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(ledger, addresses, verifier, config))
    }

    fn build(ledger: Arc<L>, addresses: A, verifier: V, config: EngineConfig) -> Self {
        Self {
            nonces: NonceCache::new(config.replay_cache_capacity),
            audit_log: RwLock::new(VecDeque::new()),
            records: Mutex::new(EscrowRecords::default()),
            stats: RwLock::new(ServiceStats::default()),
            config,
            ledger,
            addresses,
            verifier,
        }
    }

    /// Service configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Asset ledger this service settles against.
    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Get current service statistics.
    pub fn stats(&self) -> ServiceStats {
        self.stats.read().clone()
    }

    /// Receipts in the audit log, oldest first.
    pub fn events(&self) -> Vec<Receipt> {
        self.audit_log.read().iter().cloned().collect()
    }

    /// Address of the escrow record.
    pub fn escrow_address(&self) -> Address {
        self.addresses.escrow_address()
    }

    /// Address of `identity`'s participant record.
    pub fn participant_address(&self, identity: &Identity) -> Address {
        self.addresses.participant_address(identity)
    }

    /// `identity`'s participant record, if registered.
    pub async fn participant_state_of(&self, identity: &Identity) -> Option<ParticipantState> {
        let address = self.participant_address(identity);
        self.records.lock().await.participant(&address).cloned()
    }

    /// Snapshot of all records.
    pub async fn records(&self) -> EscrowRecords {
        self.records.lock().await.clone()
    }

    /// Audit the live records against the fund invariants.
    pub async fn verify_invariants(&self) -> InvariantCheckResult {
        let records = self.records.lock().await;
        let stats = self.stats.read();
        check_all_invariants(&records, stats.total_staked, stats.total_withdrawn)
    }

    /// Pairwise record conflicts within `batch`, for host-side scheduling.
    pub fn batch_conflicts(&self, batch: &[SignedInstruction]) -> Vec<ConflictInfo> {
        let patterns: Vec<AccessPattern> = batch
            .iter()
            .map(|signed| {
                signed.instruction.access_pattern(
                    &signed.signer,
                    &self.addresses,
                    self.config.enforce_allocation_cap,
                )
            })
            .collect();
        detect_conflicts(&patterns)
    }

    // =========================================================================
    // OPERATION BODIES
    // =========================================================================

    async fn apply_initialize_pool(
        &self,
        records: &mut EscrowRecords,
        caller: Identity,
        params: PoolParams,
    ) -> Result<EscrowEvent, EscrowError> {
        let escrow = records.escrow.initialize(caller, params)?;

        // Custody must be addressable in the ledger before it can receive stakes.
        self.ledger
            .balance_of(&params.asset_type, &params.custody_address)
            .await?;

        records.escrow = escrow;
        Ok(EscrowEvent::PoolInitialized {
            authority: caller,
            asset_type: params.asset_type,
            custody_address: params.custody_address,
            min_stake: params.min_stake,
            decimals: params.decimals,
        })
    }

    fn apply_register_participant(
        &self,
        records: &mut EscrowRecords,
        caller: Identity,
    ) -> Result<EscrowEvent, EscrowError> {
        let participant = self.participant_address(&caller);
        if records.participant(&participant).is_some() {
            return Err(EscrowError::AlreadyRegistered(participant));
        }

        records
            .participants
            .insert(participant, ParticipantState::register(caller));
        Ok(EscrowEvent::ParticipantRegistered {
            owner: caller,
            participant,
        })
    }

    async fn apply_place_stake(
        &self,
        records: &mut EscrowRecords,
        caller: Identity,
    ) -> Result<EscrowEvent, EscrowError> {
        records.escrow.ensure_initialized()?;
        let participant = self.participant_address(&caller);
        records.require_participant(&participant)?;

        let escrow = records.escrow.with_stake()?;
        self.ledger
            .transfer(
                &escrow.asset_type,
                &caller.wallet_address(),
                &escrow.custody_address,
                escrow.min_stake,
            )
            .await?;

        let event = EscrowEvent::StakePlaced {
            owner: caller,
            amount: escrow.min_stake,
            pot: escrow.pot,
            custodied_balance: escrow.custodied_balance,
        };
        records.escrow = escrow;
        Ok(event)
    }

    fn apply_mark_eligible(
        &self,
        records: &mut EscrowRecords,
        caller: Identity,
        participant: Address,
        amount: Amount,
    ) -> Result<EscrowEvent, EscrowError> {
        records.escrow.ensure_authority(&caller)?;
        let current = records.require_participant(&participant)?;

        if self.config.enforce_allocation_cap {
            let available = records.escrow.payout_capacity();
            let requested = records
                .outstanding_payouts(Some(&participant))?
                .checked_add(amount)
                .ok_or(EscrowError::OverAllocation {
                    requested: Amount::MAX,
                    available,
                })?;
            if requested > available {
                return Err(EscrowError::OverAllocation {
                    requested,
                    available,
                });
            }
        }

        let previous_amount = current.payout_amount;
        let next = current.with_eligibility(amount);
        records.participants.insert(participant, next);
        Ok(EscrowEvent::EligibilityMarked {
            participant,
            previous_amount,
            amount,
        })
    }

    fn apply_reset_round(
        &self,
        records: &mut EscrowRecords,
        caller: Identity,
    ) -> Result<EscrowEvent, EscrowError> {
        records.escrow.ensure_authority(&caller)?;

        let previous_pot = records.escrow.pot;
        records.escrow = records.escrow.with_round_reset();
        Ok(EscrowEvent::RoundReset { previous_pot })
    }

    async fn apply_withdraw(
        &self,
        records: &mut EscrowRecords,
        caller: Identity,
    ) -> Result<EscrowEvent, EscrowError> {
        records.escrow.ensure_initialized()?;
        let address = self.participant_address(&caller);
        let current = records.require_participant(&address)?;
        if !current.is_owned_by(&caller) {
            return Err(EscrowError::Unauthorized { caller });
        }

        let (participant, amount) = current.with_payout_taken()?;
        let escrow = records.escrow.with_withdrawal(amount)?;
        self.ledger
            .transfer(
                &escrow.asset_type,
                &escrow.custody_address,
                &caller.wallet_address(),
                amount,
            )
            .await?;

        let event = EscrowEvent::Withdrawn {
            owner: caller,
            amount,
            custodied_balance: escrow.custodied_balance,
        };
        records.escrow = escrow;
        records.participants.insert(address, participant);
        Ok(event)
    }

    // =========================================================================
    // BOOKKEEPING
    // =========================================================================

    /// Turn an operation outcome into a receipt, updating stats and the log.
    fn finish(
        &self,
        records: &EscrowRecords,
        operation: OperationKind,
        caller: Identity,
        outcome: Result<EscrowEvent, EscrowError>,
    ) -> Result<Receipt, EscrowError> {
        let event = outcome.map_err(|err| self.reject(operation, err))?;

        info!(
            operation = %operation,
            signer = %caller,
            pot = records.escrow.pot,
            custodied_balance = records.escrow.custodied_balance,
            "operation committed"
        );

        let receipt = Receipt {
            id: Uuid::new_v4(),
            operation,
            signer: caller,
            event,
        };

        {
            let mut stats = self.stats.write();
            stats.committed += 1;
            stats.total_staked = stats.total_staked.saturating_add(receipt.event.deposited());
            stats.total_withdrawn = stats
                .total_withdrawn
                .saturating_add(receipt.event.withdrawn());
        }

        {
            let mut log = self.audit_log.write();
            while log.len() >= self.config.event_log_capacity {
                log.pop_front();
            }
            log.push_back(receipt.clone());
        }

        Ok(receipt)
    }

    /// Count and log a rejection, handing the error back.
    fn reject(&self, operation: OperationKind, err: EscrowError) -> EscrowError {
        warn!(operation = %operation, error = %err, "operation rejected");

        let mut stats = self.stats.write();
        stats.rejected += 1;
        *stats.rejections_by_kind.entry(err.kind()).or_insert(0) += 1;
        err
    }

    /// Verify the signature and validity window, then burn the nonce.
    fn authenticate(&self, signed: &SignedInstruction) -> Result<(), EscrowError> {
        let message = signing_message(
            &self.config.program_id,
            &signed.signer,
            &signed.nonce,
            signed.valid_until,
            &signed.instruction,
        )?;

        if !self
            .verifier
            .verify(&signed.signer, &message, &signed.signature)
        {
            warn!(signer = %signed.signer, "signature verification failed");
            return Err(EscrowError::InvalidSignature {
                signer: signed.signer,
            });
        }

        let now = unix_timestamp();
        if now > signed.valid_until {
            warn!(signer = %signed.signer, valid_until = signed.valid_until, now, "expired instruction");
            return Err(EscrowError::Expired {
                valid_until: signed.valid_until,
                now,
            });
        }
        // Nonces are only forgotten after expiry, so the window must be bounded.
        if signed.valid_until - now > self.config.instruction_ttl_secs {
            return Err(EscrowError::InvalidParameters(format!(
                "valid_until {} is more than {}s ahead",
                signed.valid_until, self.config.instruction_ttl_secs
            )));
        }

        match self
            .nonces
            .check_and_insert(signed.nonce, signed.valid_until, now)
        {
            NonceStatus::Fresh => Ok(()),
            NonceStatus::Replay => {
                warn!(signer = %signed.signer, nonce = %signed.nonce, "replayed nonce");
                Err(EscrowError::ReplayDetected {
                    nonce: signed.nonce,
                })
            }
            NonceStatus::Saturated => {
                warn!(capacity = self.config.replay_cache_capacity, "replay cache saturated");
                Err(EscrowError::ReplayCacheFull)
            }
        }
    }

    async fn dispatch(
        &self,
        caller: Identity,
        instruction: Instruction,
    ) -> Result<Receipt, EscrowError> {
        match instruction {
            Instruction::InitializePool(params) => self.initialize_pool(caller, params).await,
            Instruction::RegisterParticipant => self.register_participant(caller).await,
            Instruction::PlaceStake => self.place_stake(caller).await,
            Instruction::MarkEligible {
                participant,
                amount,
            } => self.mark_eligible(caller, participant, amount).await,
            Instruction::ResetRound => self.reset_round(caller).await,
            Instruction::Withdraw => self.withdraw(caller).await,
        }
    }
}

/// Create a service over in-memory adapters with default configuration.
///
/// Fund participants through `service.ledger()`.
pub fn create_test_service() -> EscrowService<InMemoryLedger, KeccakAddressSpace, Ed25519Verifier>
{
    let config = EngineConfig::default();
    EscrowService::build(
        Arc::new(InMemoryLedger::new()),
        KeccakAddressSpace::new(config.program_id),
        Ed25519Verifier::new(),
        config,
    )
}

// =============================================================================
// EscrowApi Implementation
// =============================================================================

#[async_trait]
impl<L: AssetLedger, A: AddressSpace, V: SignatureVerifier> EscrowApi for EscrowService<L, A, V> {
    #[instrument(skip_all, fields(signer = %caller, operation = "initialize_pool"))]
    async fn initialize_pool(
        &self,
        caller: Identity,
        params: PoolParams,
    ) -> Result<Receipt, EscrowError> {
        let mut records = self.records.lock().await;
        let outcome = self
            .apply_initialize_pool(&mut records, caller, params)
            .await;
        self.finish(&records, OperationKind::InitializePool, caller, outcome)
    }

    #[instrument(skip_all, fields(signer = %caller, operation = "register_participant"))]
    async fn register_participant(&self, caller: Identity) -> Result<Receipt, EscrowError> {
        let mut records = self.records.lock().await;
        let outcome = self.apply_register_participant(&mut records, caller);
        self.finish(&records, OperationKind::RegisterParticipant, caller, outcome)
    }

    #[instrument(skip_all, fields(signer = %caller, operation = "place_stake"))]
    async fn place_stake(&self, caller: Identity) -> Result<Receipt, EscrowError> {
        let mut records = self.records.lock().await;
        let outcome = self.apply_place_stake(&mut records, caller).await;
        self.finish(&records, OperationKind::PlaceStake, caller, outcome)
    }

    #[instrument(skip_all, fields(signer = %caller, operation = "mark_eligible", %participant, amount))]
    async fn mark_eligible(
        &self,
        caller: Identity,
        participant: Address,
        amount: Amount,
    ) -> Result<Receipt, EscrowError> {
        let mut records = self.records.lock().await;
        let outcome = self.apply_mark_eligible(&mut records, caller, participant, amount);
        self.finish(&records, OperationKind::MarkEligible, caller, outcome)
    }

    #[instrument(skip_all, fields(signer = %caller, operation = "reset_round"))]
    async fn reset_round(&self, caller: Identity) -> Result<Receipt, EscrowError> {
        let mut records = self.records.lock().await;
        let outcome = self.apply_reset_round(&mut records, caller);
        self.finish(&records, OperationKind::ResetRound, caller, outcome)
    }

    #[instrument(skip_all, fields(signer = %caller, operation = "withdraw"))]
    async fn withdraw(&self, caller: Identity) -> Result<Receipt, EscrowError> {
        let mut records = self.records.lock().await;
        let outcome = self.apply_withdraw(&mut records, caller).await;
        self.finish(&records, OperationKind::Withdraw, caller, outcome)
    }

    async fn escrow_state(&self) -> EscrowState {
        self.records.lock().await.escrow.clone()
    }

    async fn participant_state(&self, address: &Address) -> Option<ParticipantState> {
        self.records.lock().await.participant(address).cloned()
    }
}

// =============================================================================
// InstructionExecutor Implementation
// =============================================================================

#[async_trait]
impl<L: AssetLedger, A: AddressSpace, V: SignatureVerifier> InstructionExecutor
    for EscrowService<L, A, V>
{
    #[instrument(skip_all, fields(signer = %signed.signer, nonce = %signed.nonce))]
    async fn submit(&self, signed: SignedInstruction) -> Result<Receipt, EscrowError> {
        let operation = signed.instruction.kind();
        if let Err(err) = self.authenticate(&signed) {
            return Err(self.reject(operation, err));
        }
        self.dispatch(signed.signer, signed.instruction).await
    }

    #[instrument(skip_all, fields(size = batch.len()))]
    async fn execute_batch(
        &self,
        batch: Vec<SignedInstruction>,
    ) -> Result<Vec<Result<Receipt, EscrowError>>, EscrowError> {
        if batch.len() > self.config.max_batch_size {
            return Err(EscrowError::InvalidParameters(format!(
                "batch of {} exceeds max_batch_size {}",
                batch.len(),
                self.config.max_batch_size
            )));
        }

        let mut admitted: Vec<AccessPattern> = Vec::with_capacity(batch.len());
        let mut results = Vec::with_capacity(batch.len());

        for signed in batch {
            let operation = signed.instruction.kind();
            let pattern = signed.instruction.access_pattern(
                &signed.signer,
                &self.addresses,
                self.config.enforce_allocation_cap,
            );

            if let Some((conflict_type, address)) =
                admitted.iter().find_map(|earlier| earlier.conflict_with(&pattern))
            {
                debug!(?conflict_type, %address, operation = %operation, "batch conflict");
                results.push(Err(self.reject(operation, EscrowError::Conflict { address })));
                continue;
            }

            if let Err(err) = self.authenticate(&signed) {
                results.push(Err(self.reject(operation, err)));
                continue;
            }

            admitted.push(pattern);
            results.push(self.dispatch(signed.signer, signed.instruction).await);
        }

        Ok(results)
    }
}

// =============================================================================
// TESTS
// =============================================================================
