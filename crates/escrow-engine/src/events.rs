//! # Event Schema
//!
//! Typed record of every committed escrow operation.
//!
//! One event is emitted per successful operation and carried in its
//! [`Receipt`](crate::ports::inbound::Receipt). Failed operations emit nothing.
//!
//! ## Topics
//!
//! | Event | Topic |
//! |-------|-------|
//! | `PoolInitialized` | `escrow.pool.initialized` |
//! | `ParticipantRegistered` | `escrow.participant.registered` |
//! | `StakePlaced` | `escrow.stake.placed` |
//! | `EligibilityMarked` | `escrow.round.eligibility_marked` |
//! | `RoundReset` | `escrow.round.reset` |
//! | `Withdrawn` | `escrow.payout.withdrawn` |

use crate::domain::value_objects::{Address, Amount, AssetId, Identity};
use serde::{Deserialize, Serialize};

// =============================================================================
// EVENTS
// =============================================================================

/// State change committed by one operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowEvent {
    /// The pool was bootstrapped.
    PoolInitialized {
        /// Settlement authority.
        authority: Identity,
        /// Accepted asset.
        asset_type: AssetId,
        /// Ledger address holding custodied funds.
        custody_address: Address,
        /// Fixed stake amount.
        min_stake: Amount,
        /// Asset decimals.
        decimals: u8,
    },

    /// A participant record was created.
    ParticipantRegistered {
        /// Owner of the record.
        owner: Identity,
        /// Derived record address.
        participant: Address,
    },

    /// One stake moved into custody.
    StakePlaced {
        /// Staking participant.
        owner: Identity,
        /// Stake amount.
        amount: Amount,
        /// Pot after the stake.
        pot: Amount,
        /// Custody after the stake.
        custodied_balance: Amount,
    },

    /// A payout was assigned to a participant.
    EligibilityMarked {
        /// Derived record address of the winner.
        participant: Address,
        /// Payout replaced by this assignment.
        previous_amount: Amount,
        /// Newly assigned payout.
        amount: Amount,
    },

    /// The pot was cleared.
    RoundReset {
        /// Pot before the reset.
        previous_pot: Amount,
    },

    /// A payout left custody.
    Withdrawn {
        /// Withdrawing participant.
        owner: Identity,
        /// Amount paid out.
        amount: Amount,
        /// Custody after the withdrawal.
        custodied_balance: Amount,
    },
}

impl EscrowEvent {
    /// Topic string for event routing.
    #[must_use]
    pub fn topic(&self) -> &'static str {
        match self {
            Self::PoolInitialized { .. } => topics::POOL_INITIALIZED,
            Self::ParticipantRegistered { .. } => topics::PARTICIPANT_REGISTERED,
            Self::StakePlaced { .. } => topics::STAKE_PLACED,
            Self::EligibilityMarked { .. } => topics::ELIGIBILITY_MARKED,
            Self::RoundReset { .. } => topics::ROUND_RESET,
            Self::Withdrawn { .. } => topics::WITHDRAWN,
        }
    }

    /// Units that entered custody with this event.
    #[must_use]
    pub fn deposited(&self) -> Amount {
        match self {
            Self::StakePlaced { amount, .. } => *amount,
            _ => 0,
        }
    }

    /// Units that left custody with this event.
    #[must_use]
    pub fn withdrawn(&self) -> Amount {
        match self {
            Self::Withdrawn { amount, .. } => *amount,
            _ => 0,
        }
    }
}

/// Event topics.
pub mod topics {
    /// Pool bootstrap.
    pub const POOL_INITIALIZED: &str = "escrow.pool.initialized";
    /// Participant registration.
    pub const PARTICIPANT_REGISTERED: &str = "escrow.participant.registered";
    /// Stake deposit.
    pub const STAKE_PLACED: &str = "escrow.stake.placed";
    /// Payout assignment.
    pub const ELIGIBILITY_MARKED: &str = "escrow.round.eligibility_marked";
    /// Pot cleared.
    pub const ROUND_RESET: &str = "escrow.round.reset";
    /// Payout withdrawal.
    pub const WITHDRAWN: &str = "escrow.payout.withdrawn";
}

// =============================================================================
// TESTS
// =============================================================================
