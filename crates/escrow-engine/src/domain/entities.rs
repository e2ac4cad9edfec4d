//! # Core Domain Entities
//!
//! The persisted records of the escrow and the pure transitions between them.
//!
//! Every transition takes the current record by reference and returns the
//! next record (or an error). Nothing is mutated in place, so an operation
//! that fails half way has nothing to roll back.

use crate::domain::value_objects::{Address, Amount, AssetId, Identity};
use crate::errors::{EscrowError, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// POOL PARAMETERS
// =============================================================================

/// Immutable parameters fixed at pool initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
    /// Asset accepted for stakes and payouts.
    pub asset_type: AssetId,
    /// Ledger address holding custodied funds.
    pub custody_address: Address,
    /// Fixed amount of every stake.
    pub min_stake: Amount,
    /// Decimal places of the asset, informational.
    pub decimals: u8,
}

// =============================================================================
// ESCROW STATE
// =============================================================================

/// The singleton pool record.
///
/// `Default` is the uninitialized record that exists before bootstrap.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowState {
    /// False until pool creation succeeds; never reverts.
    pub initialized: bool,
    /// Identity permitted to settle rounds.
    pub authority: Identity,
    /// Asset accepted for stakes and payouts.
    pub asset_type: AssetId,
    /// Ledger address holding custodied funds.
    pub custody_address: Address,
    /// Fixed amount of every stake.
    pub min_stake: Amount,
    /// Decimal places of the asset.
    pub decimals: u8,
    /// Stakes collected since the last round reset.
    pub pot: Amount,
    /// Total units held in custody.
    pub custodied_balance: Amount,
}

impl EscrowState {
    /// Returns true once the pool has been bootstrapped.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns true if `caller` is the stored authority.
    #[must_use]
    pub fn is_authority(&self, caller: &Identity) -> bool {
        self.initialized && self.authority == *caller
    }

    /// Pool parameters, if initialized.
    #[must_use]
    pub fn params(&self) -> Option<PoolParams> {
        self.initialized.then_some(PoolParams {
            asset_type: self.asset_type,
            custody_address: self.custody_address,
            min_stake: self.min_stake,
            decimals: self.decimals,
        })
    }

    /// One-shot bootstrap. Fails for every caller once initialized.
    pub fn initialize(&self, authority: Identity, params: PoolParams) -> Result<Self, EscrowError> {
        if self.initialized {
            return Err(EscrowError::AlreadyInitialized);
        }
        if params.min_stake == 0 {
            return Err(EscrowError::InvalidParameters(
                "min_stake must be greater than zero".into(),
            ));
        }

        Ok(Self {
            initialized: true,
            authority,
            asset_type: params.asset_type,
            custody_address: params.custody_address,
            min_stake: params.min_stake,
            decimals: params.decimals,
            pot: 0,
            custodied_balance: 0,
        })
    }

    /// Fails with `Uninitialized` before bootstrap.
    pub fn ensure_initialized(&self) -> Result<(), EscrowError> {
        if self.initialized {
            Ok(())
        } else {
            Err(EscrowError::Uninitialized(Record::Escrow))
        }
    }

    /// Fails unless the pool is initialized and `caller` is its authority.
    pub fn ensure_authority(&self, caller: &Identity) -> Result<(), EscrowError> {
        self.ensure_initialized()?;
        if self.is_authority(caller) {
            Ok(())
        } else {
            Err(EscrowError::Unauthorized { caller: *caller })
        }
    }

    /// Record after one stake of `min_stake` has been deposited.
    pub fn with_stake(&self) -> Result<Self, EscrowError> {
        self.ensure_initialized()?;
        let pot = self
            .pot
            .checked_add(self.min_stake)
            .ok_or(EscrowError::ArithmeticOverflow)?;
        let custodied_balance = self
            .custodied_balance
            .checked_add(self.min_stake)
            .ok_or(EscrowError::ArithmeticOverflow)?;

        Ok(Self {
            pot,
            custodied_balance,
            ..self.clone()
        })
    }

    /// Record after `amount` has left custody.
    pub fn with_withdrawal(&self, amount: Amount) -> Result<Self, EscrowError> {
        self.ensure_initialized()?;
        let custodied_balance =
            self.custodied_balance
                .checked_sub(amount)
                .ok_or(EscrowError::Underflow {
                    balance: self.custodied_balance,
                    payout: amount,
                })?;

        Ok(Self {
            custodied_balance,
            ..self.clone()
        })
    }

    /// Record with the pot cleared. Custody is untouched.
    #[must_use]
    pub fn with_round_reset(&self) -> Self {
        Self {
            pot: 0,
            ..self.clone()
        }
    }

    /// Custody not committed to the current round's pot.
    #[must_use]
    pub fn payout_capacity(&self) -> Amount {
        self.custodied_balance.saturating_sub(self.pot)
    }
}

// =============================================================================
// PARTICIPANT STATE
// =============================================================================

/// One participant's record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantState {
    /// Set on registration; never reverts.
    pub initialized: bool,
    /// Identity this record belongs to.
    pub owner: Identity,
    /// Armed by the authority, cleared by withdrawal.
    pub is_eligible: bool,
    /// Amount owed on the next withdrawal.
    pub payout_amount: Amount,
}

impl ParticipantState {
    /// Fresh registration for `owner`.
    #[must_use]
    pub fn register(owner: Identity) -> Self {
        Self {
            initialized: true,
            owner,
            is_eligible: false,
            payout_amount: 0,
        }
    }

    /// Returns true if this record belongs to `identity`.
    #[must_use]
    pub fn is_owned_by(&self, identity: &Identity) -> bool {
        self.initialized && self.owner == *identity
    }

    /// Payout this record currently claims against custody.
    #[must_use]
    pub fn outstanding(&self) -> Amount {
        if self.is_eligible {
            self.payout_amount
        } else {
            0
        }
    }

    /// Record armed with `amount`. Overwrites any previous payout.
    #[must_use]
    pub fn with_eligibility(&self, amount: Amount) -> Self {
        Self {
            is_eligible: true,
            payout_amount: amount,
            ..self.clone()
        }
    }

    /// Record after the payout is taken, plus the amount taken.
    pub fn with_payout_taken(&self) -> Result<(Self, Amount), EscrowError> {
        if !self.is_eligible || self.payout_amount == 0 {
            return Err(EscrowError::NotEligible);
        }
        let next = Self {
            is_eligible: false,
            payout_amount: 0,
            ..self.clone()
        };
        Ok((next, self.payout_amount))
    }
}

// =============================================================================
// RECORD SET
// =============================================================================

/// All persisted escrow records, keyed by derived address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecords {
    /// The singleton pool record.
    pub escrow: EscrowState,
    /// Participant records by derived address.
    pub participants: BTreeMap<Address, ParticipantState>,
}

impl EscrowRecords {
    /// Participant record at `address`, if registered.
    #[must_use]
    pub fn participant(&self, address: &Address) -> Option<&ParticipantState> {
        self.participants.get(address).filter(|p| p.initialized)
    }

    /// Like [`Self::participant`] but fails with `Uninitialized`.
    pub fn require_participant(&self, address: &Address) -> Result<&ParticipantState, EscrowError> {
        self.participant(address)
            .ok_or(EscrowError::Uninitialized(Record::Participant(*address)))
    }

    /// Sum of outstanding payouts, skipping the record at `excluding`.
    pub fn outstanding_payouts(&self, excluding: Option<&Address>) -> Result<Amount, EscrowError> {
        self.participants
            .iter()
            .filter(|(address, _)| Some(*address) != excluding)
            .try_fold(0, |acc: Amount, (_, p)| {
                acc.checked_add(p.outstanding())
                    .ok_or(EscrowError::ArithmeticOverflow)
            })
    }

    /// Number of registered participants.
    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.participants.values().filter(|p| p.initialized).count()
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// The six escrow operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Bootstrap the pool.
    InitializePool,
    /// Create a participant record.
    RegisterParticipant,
    /// Deposit one fixed stake.
    PlaceStake,
    /// Assign a payout (authority only).
    MarkEligible,
    /// Clear the pot (authority only).
    ResetRound,
    /// Collect an assigned payout.
    Withdraw,
}

impl OperationKind {
    /// Operation name as used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitializePool => "initialize_pool",
            Self::RegisterParticipant => "register_participant",
            Self::PlaceStake => "place_stake",
            Self::MarkEligible => "mark_eligible",
            Self::ResetRound => "reset_round",
            Self::Withdraw => "withdraw",
        }
    }

    /// Returns true for operations gated on the pool authority.
    #[must_use]
    pub fn requires_authority(&self) -> bool {
        matches!(self, Self::MarkEligible | Self::ResetRound)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// TESTS
// =============================================================================
