//! # Error Types
//!
//! All error types for escrow operations.
//!
//! Every [`EscrowError`] aborts the enclosing operation with zero state
//! mutation; there is no partial-success path.

use crate::domain::value_objects::{Address, Amount, AssetId, Identity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// ESCROW ERRORS
// =============================================================================

/// Errors returned by the six escrow operations and the dispatch layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EscrowError {
    /// The pool has already been initialized.
    #[error("escrow already initialized")]
    AlreadyInitialized,

    /// A participant record already exists for this identity.
    #[error("participant already registered at {0}")]
    AlreadyRegistered(Address),

    /// Signer is not the pool authority.
    #[error("signer {caller} is not authorized")]
    Unauthorized {
        /// Identity that attempted the operation.
        caller: Identity,
    },

    /// Pool or participant record missing.
    #[error("{0} not initialized")]
    Uninitialized(Record),

    /// Withdrawal attempted without a positive payout.
    #[error("participant is not eligible to withdraw")]
    NotEligible,

    /// The asset ledger could not move the requested amount.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount the transfer needed.
        required: Amount,
        /// Amount the source held.
        available: Amount,
    },

    /// Custodied balance would go negative.
    #[error("custodied balance underflow: balance {balance}, payout {payout}")]
    Underflow {
        /// Custodied balance before the withdrawal.
        balance: Amount,
        /// Payout that was requested.
        payout: Amount,
    },

    /// Pot or custodied balance would exceed the amount range.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// Payouts would exceed the custody not committed to the current pot.
    #[error("over-allocation: requested {requested}, available {available}")]
    OverAllocation {
        /// Total allocation that the operation would produce.
        requested: Amount,
        /// Custody available for payouts.
        available: Amount,
    },

    /// Instruction parameters are out of range.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Signed instruction failed signature verification.
    #[error("invalid signature from {signer}")]
    InvalidSignature {
        /// Claimed signer.
        signer: Identity,
    },

    /// Signed instruction nonce already consumed.
    #[error("replay detected: nonce {nonce} already used")]
    ReplayDetected {
        /// The replayed nonce.
        nonce: uuid::Uuid,
    },

    /// Signed instruction is past its `valid_until`.
    #[error("instruction expired at {valid_until} (now {now})")]
    Expired {
        /// Unix second the instruction was signed to expire at.
        valid_until: u64,
        /// Unix second at which it was presented.
        now: u64,
    },

    /// Replay cache is full of unexpired nonces.
    #[error("replay cache full; retry once pending instructions expire")]
    ReplayCacheFull,

    /// Rejected because it touches a record written earlier in the same batch.
    #[error("conflicting access to {address} in batch; retry")]
    Conflict {
        /// Contended record.
        address: Address,
    },

    /// Any other asset ledger failure.
    #[error("ledger error: {0}")]
    Ledger(LedgerError),
}

impl EscrowError {
    /// Stable category tag of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyInitialized => ErrorKind::AlreadyInitialized,
            Self::AlreadyRegistered(_) => ErrorKind::AlreadyRegistered,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Uninitialized(_) => ErrorKind::Uninitialized,
            Self::NotEligible => ErrorKind::NotEligible,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::Underflow { .. } => ErrorKind::Underflow,
            Self::ArithmeticOverflow => ErrorKind::ArithmeticOverflow,
            Self::OverAllocation { .. } => ErrorKind::OverAllocation,
            Self::InvalidParameters(_) => ErrorKind::InvalidParameters,
            Self::InvalidSignature { .. } => ErrorKind::InvalidSignature,
            Self::ReplayDetected { .. } => ErrorKind::ReplayDetected,
            Self::Expired { .. } => ErrorKind::Expired,
            Self::ReplayCacheFull => ErrorKind::ReplayCacheFull,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Ledger(_) => ErrorKind::Ledger,
        }
    }

    /// Returns true if resubmitting the same instruction unchanged may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. }
                | Self::ReplayCacheFull
                | Self::Ledger(LedgerError::Unavailable(_))
        )
    }
}

impl From<LedgerError> for EscrowError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                required,
                available,
                ..
            } => Self::InsufficientFunds {
                required,
                available,
            },
            other => Self::Ledger(other),
        }
    }
}

/// Which record an `Uninitialized` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    /// The singleton escrow pool.
    Escrow,
    /// A participant record at the given address.
    Participant(Address),
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Escrow => write!(f, "escrow"),
            Self::Participant(address) => write!(f, "participant {address}"),
        }
    }
}

/// Category of an [`EscrowError`], for statistics and caller branching.
///
/// One variant per `EscrowError` variant, same names.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    AlreadyInitialized,
    AlreadyRegistered,
    Unauthorized,
    Uninitialized,
    NotEligible,
    InsufficientFunds,
    Underflow,
    ArithmeticOverflow,
    OverAllocation,
    InvalidParameters,
    InvalidSignature,
    ReplayDetected,
    Expired,
    ReplayCacheFull,
    Conflict,
    Ledger,
}

// =============================================================================
// LEDGER ERRORS
// =============================================================================

/// Errors from the asset ledger port.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Source address does not hold enough units.
    #[error("insufficient funds at {address}: required {required}, available {available}")]
    InsufficientFunds {
        /// Source address of the transfer.
        address: Address,
        /// Amount the transfer needed.
        required: Amount,
        /// Amount held at the source.
        available: Amount,
    },

    /// Asset type is not known to the ledger.
    #[error("unknown asset: {0}")]
    UnknownAsset(AssetId),

    /// Destination balance would overflow.
    #[error("balance overflow at {0}")]
    BalanceOverflow(Address),

    /// Ledger backend is unreachable.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

// =============================================================================
// CONFIG ERRORS
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A size, capacity or duration setting is zero.
    #[error("{field} must be greater than zero")]
    ZeroCapacity {
        /// Name of the offending setting.
        field: &'static str,
    },
}

// =============================================================================
// TESTS
// =============================================================================
