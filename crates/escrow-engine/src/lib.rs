//! # Escrow Engine - Pooled Wagering Custody
//!
//! Holds participant stakes for a wagering pool, lets a single authority
//! assign payouts after each round, and lets winners withdraw exactly what
//! they were assigned.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Single bootstrap | `domain/entities.rs` - `EscrowState::initialize()` |
//! | Custody covers pot | `domain/invariants.rs` - `check_pot_covered()` |
//! | Custody covers payouts | `service.rs` - allocation cap in `mark_eligible` |
//! | Conservation | `domain/invariants.rs` - `check_conservation()` |
//! | Exactly-once withdrawal | `domain/entities.rs` - `ParticipantState::with_payout_taken()` |
//!
//! ## Operations
//!
//! | Operation | Required signer | Ledger transfer |
//! |-----------|-----------------|-----------------|
//! | `initialize_pool` | prospective authority | none |
//! | `register_participant` | participant | none |
//! | `place_stake` | participant | wallet → custody (`min_stake`) |
//! | `mark_eligible` | authority | none |
//! | `reset_round` | authority | none |
//! | `withdraw` | participant | custody → wallet (payout) |
//!
//! ## Outbound Dependencies
//!
//! | Trait | Purpose | Reference Adapter |
//! |-------|---------|-------------------|
//! | `AssetLedger` | Move custodied funds | `InMemoryLedger` |
//! | `AddressSpace` | Derive record addresses | `KeccakAddressSpace` |
//! | `SignatureVerifier` | Authenticate signers | `Ed25519Verifier` |
//!
//! ## Usage Example
//!
//! ```ignore
//! use escrow_engine::prelude::*;
//!
//! let service = create_test_service();
//! service.initialize_pool(authority, params).await?;
//! service.register_participant(alice).await?;
//! service.place_stake(alice).await?;
//!
//! service.reset_round(authority).await?;
//! service.mark_eligible(authority, service.participant_address(&alice), payout).await?;
//! service.withdraw(alice).await?;
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod ports;
pub mod replay;
pub mod service;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        EscrowRecords, EscrowState, OperationKind, ParticipantState, PoolParams,
    };

    // Value objects
    pub use crate::domain::value_objects::{seeds, Address, Amount, AssetId, Identity, Signature};

    // Domain services
    pub use crate::domain::services::{
        default_program_id, derive_address, keccak256, payout_for_percent, split_pot,
    };

    // Invariants
    pub use crate::domain::invariants::{
        check_all_invariants, InvariantCheckResult, InvariantViolation,
    };

    // Conflicts
    pub use crate::domain::conflicts::{
        detect_conflicts, AccessPattern, ConflictInfo, ConflictType,
    };

    // Ports
    pub use crate::ports::inbound::{
        signing_message, EscrowApi, Instruction, InstructionExecutor, Receipt,
        SignedInstruction,
    };
    pub use crate::ports::outbound::{AddressSpace, AssetLedger, SignatureVerifier};

    // Events
    pub use crate::events::{topics, EscrowEvent};

    // Errors
    pub use crate::errors::{ConfigError, ErrorKind, EscrowError, LedgerError, Record};

    // Config
    pub use crate::config::EngineConfig;

    // Replay protection
    pub use crate::replay::{unix_timestamp, NonceCache, NonceStatus};

    // Adapters
    pub use crate::adapters::{
        Ed25519Signer, Ed25519Verifier, InMemoryLedger, KeccakAddressSpace,
    };

    // Service
    pub use crate::service::{create_test_service, EscrowService, ServiceStats};
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// TESTS
// =============================================================================
