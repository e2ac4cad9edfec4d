//! # Driving Ports (API - Inbound)
//!
//! These are the interfaces exposed by the escrow engine.
//!
//! - `EscrowApi`: the six operations, for hosts that authenticate callers
//!   themselves and pass the signer identity in.
//! - `InstructionExecutor`: signed-instruction entry points for hosts that
//!   hand the engine raw signed instructions.

use crate::domain::conflicts::AccessPattern;
use crate::domain::entities::{EscrowState, OperationKind, ParticipantState, PoolParams};
use crate::domain::value_objects::{Address, Amount, Identity, Signature};
use crate::errors::EscrowError;
use crate::events::EscrowEvent;
use crate::ports::outbound::AddressSpace;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain tag prepended to every signed message.
pub const SIGNING_DOMAIN: &[u8] = b"wager-escrow/instruction/v1";

// =============================================================================
// INSTRUCTIONS
// =============================================================================

/// One escrow operation with its inputs.
///
/// The signer is not part of the instruction; it comes from the envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Bootstrap the pool; the signer becomes the authority.
    InitializePool(PoolParams),
    /// Create the signer's participant record.
    RegisterParticipant,
    /// Deposit one fixed stake from the signer's wallet.
    PlaceStake,
    /// Assign `amount` to the participant record at `participant`.
    MarkEligible {
        /// Derived participant record address.
        participant: Address,
        /// Payout to assign.
        amount: Amount,
    },
    /// Clear the pot.
    ResetRound,
    /// Collect the signer's payout.
    Withdraw,
}

impl Instruction {
    /// The operation this instruction invokes.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::InitializePool(_) => OperationKind::InitializePool,
            Self::RegisterParticipant => OperationKind::RegisterParticipant,
            Self::PlaceStake => OperationKind::PlaceStake,
            Self::MarkEligible { .. } => OperationKind::MarkEligible,
            Self::ResetRound => OperationKind::ResetRound,
            Self::Withdraw => OperationKind::Withdraw,
        }
    }

    /// Records this instruction reads and writes when signed by `signer`.
    ///
    /// With `allocation_cap` on, a mark reads every other participant's
    /// outstanding payout. Those records are not enumerable here, so the mark
    /// takes the escrow record for writing instead: marks serialize against
    /// each other and against stakes, resets and withdrawals.
    #[must_use]
    pub fn access_pattern(
        &self,
        signer: &Identity,
        space: &dyn AddressSpace,
        allocation_cap: bool,
    ) -> AccessPattern {
        let escrow = space.escrow_address();
        match self {
            Self::InitializePool(_) | Self::ResetRound => {
                AccessPattern::new().with_writes(vec![escrow])
            }
            Self::RegisterParticipant => {
                AccessPattern::new().with_writes(vec![space.participant_address(signer)])
            }
            Self::PlaceStake => AccessPattern::new()
                .with_reads(vec![space.participant_address(signer)])
                .with_writes(vec![escrow]),
            Self::MarkEligible { participant, .. } if allocation_cap => {
                AccessPattern::new().with_writes(vec![*participant, escrow])
            }
            Self::MarkEligible { participant, .. } => AccessPattern::new()
                .with_reads(vec![escrow])
                .with_writes(vec![*participant]),
            Self::Withdraw => {
                AccessPattern::new().with_writes(vec![escrow, space.participant_address(signer)])
            }
        }
    }
}

/// Bytes a signer signs for `instruction`.
///
/// `SIGNING_DOMAIN ++ program_id ++ signer ++ nonce ++ valid_until (LE u64) ++ bincode(instruction)`
pub fn signing_message(
    program_id: &[u8; 32],
    signer: &Identity,
    nonce: &Uuid,
    valid_until: u64,
    instruction: &Instruction,
) -> Result<Vec<u8>, EscrowError> {
    let body = bincode::serialize(instruction)
        .map_err(|e| EscrowError::InvalidParameters(format!("unencodable instruction: {e}")))?;

    let mut message = Vec::with_capacity(SIGNING_DOMAIN.len() + 32 + 32 + 16 + 8 + body.len());
    message.extend_from_slice(SIGNING_DOMAIN);
    message.extend_from_slice(program_id);
    message.extend_from_slice(signer.as_bytes());
    message.extend_from_slice(nonce.as_bytes());
    message.extend_from_slice(&valid_until.to_le_bytes());
    message.extend_from_slice(&body);
    Ok(message)
}

/// An instruction authenticated by its signer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedInstruction {
    /// Identity that signed; becomes the operation's caller.
    pub signer: Identity,
    /// Single-use nonce for replay protection.
    pub nonce: Uuid,
    /// Unix second after which the instruction is rejected as expired.
    pub valid_until: u64,
    /// The operation to perform.
    pub instruction: Instruction,
    /// Signature over [`signing_message`].
    pub signature: Signature,
}

// =============================================================================
// RECEIPTS
// =============================================================================

/// Proof of one committed operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Unique receipt id.
    pub id: Uuid,
    /// Operation that committed.
    pub operation: OperationKind,
    /// Caller of the operation.
    pub signer: Identity,
    /// State change that was committed.
    pub event: EscrowEvent,
}

// =============================================================================
// ESCROW API (Primary Driving Port)
// =============================================================================

/// The six escrow operations plus read access to the records.
///
/// Each operation is one atomic transaction: it either commits every record
/// change together with its single ledger transfer, or returns an error and
/// changes nothing.
#[async_trait]
pub trait EscrowApi: Send + Sync {
    /// Bootstrap the pool with `caller` as authority.
    async fn initialize_pool(
        &self,
        caller: Identity,
        params: PoolParams,
    ) -> Result<Receipt, EscrowError>;

    /// Create `caller`'s participant record.
    async fn register_participant(&self, caller: Identity) -> Result<Receipt, EscrowError>;

    /// Move `min_stake` from `caller`'s wallet into custody.
    async fn place_stake(&self, caller: Identity) -> Result<Receipt, EscrowError>;

    /// Assign `amount` to the record at `participant` (authority only).
    async fn mark_eligible(
        &self,
        caller: Identity,
        participant: Address,
        amount: Amount,
    ) -> Result<Receipt, EscrowError>;

    /// Clear the pot (authority only).
    async fn reset_round(&self, caller: Identity) -> Result<Receipt, EscrowError>;

    /// Pay `caller`'s assigned payout out of custody.
    async fn withdraw(&self, caller: Identity) -> Result<Receipt, EscrowError>;

    /// Current pool record (uninitialized default before bootstrap).
    async fn escrow_state(&self) -> EscrowState;

    /// Participant record at `address`, if registered.
    async fn participant_state(&self, address: &Address) -> Option<ParticipantState>;
}

// =============================================================================
// INSTRUCTION EXECUTOR
// =============================================================================

/// Signed-instruction entry points.
#[async_trait]
pub trait InstructionExecutor: Send + Sync {
    /// Verify, de-duplicate and execute one signed instruction.
    async fn submit(&self, signed: SignedInstruction) -> Result<Receipt, EscrowError>;

    /// Execute a batch as one host slot.
    ///
    /// An instruction that contends with an earlier admitted instruction in
    /// the same batch is rejected with `EscrowError::Conflict`. Results are
    /// returned in input order.
    async fn execute_batch(
        &self,
        batch: Vec<SignedInstruction>,
    ) -> Result<Vec<Result<Receipt, EscrowError>>, EscrowError>;
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::AssetId;

    struct TagSpace;

    impl AddressSpace for TagSpace {
        fn derive(&self, seeds: &[&[u8]]) -> Address {
            let mut bytes = [0u8; 32];
            bytes[0] = seeds[0][0];
            if let Some(key) = seeds.get(1) {
                bytes[1] = key[0];
            }
            Address::new(bytes)
        }
    }

    fn params() -> PoolParams {
        PoolParams {
            asset_type: AssetId::new([1u8; 32]),
            custody_address: Address::new([2u8; 32]),
            min_stake: 10,
            decimals: 6,
        }
    }

    #[test]
    fn test_instruction_kind() {
        assert_eq!(
            Instruction::InitializePool(params()).kind(),
            OperationKind::InitializePool
        );
        assert_eq!(Instruction::Withdraw.kind(), OperationKind::Withdraw);
        assert!(Instruction::ResetRound.kind().requires_authority());
        assert!(!Instruction::PlaceStake.kind().requires_authority());
    }

    #[test]
    fn test_access_patterns() {
        let space = TagSpace;
        let signer = Identity::new([9u8; 32]);
        let escrow = space.escrow_address();
        let own = space.participant_address(&signer);

        let stake = Instruction::PlaceStake.access_pattern(&signer, &space, true);
        assert_eq!(stake.reads, vec![own]);
        assert_eq!(stake.writes, vec![escrow]);

        let withdraw = Instruction::Withdraw.access_pattern(&signer, &space, true);
        assert_eq!(withdraw.writes, vec![escrow, own]);

        let target = Address::new([5u8; 32]);
        let mark = Instruction::MarkEligible {
            participant: target,
            amount: 1,
        };
        let uncapped = mark.access_pattern(&signer, &space, false);
        assert_eq!(uncapped.reads, vec![escrow]);
        assert_eq!(uncapped.writes, vec![target]);

        let capped = mark.access_pattern(&signer, &space, true);
        assert!(capped.reads.is_empty());
        assert_eq!(capped.writes, vec![target, escrow]);
    }

    #[test]
    fn test_capped_marks_contend() {
        let space = TagSpace;
        let signer = Identity::new([9u8; 32]);
        let mark = |byte: u8| Instruction::MarkEligible {
            participant: Address::new([byte; 32]),
            amount: 1,
        };

        let first = mark(5).access_pattern(&signer, &space, true);
        let second = mark(6).access_pattern(&signer, &space, true);
        assert!(first.conflict_with(&second).is_some());

        let first = mark(5).access_pattern(&signer, &space, false);
        let second = mark(6).access_pattern(&signer, &space, false);
        assert!(first.conflict_with(&second).is_none());
    }

    #[test]
    fn test_signing_message_binds_every_field() {
        let program = [3u8; 32];
        let signer = Identity::new([4u8; 32]);
        let nonce = Uuid::from_u128(42);
        let until = 1_700_000_060;
        let stake = Instruction::PlaceStake;
        let base = signing_message(&program, &signer, &nonce, until, &stake).unwrap();

        assert!(base.starts_with(SIGNING_DOMAIN));
        assert_ne!(
            base,
            signing_message(&[0u8; 32], &signer, &nonce, until, &stake).unwrap()
        );
        assert_ne!(
            base,
            signing_message(&program, &Identity::new([5u8; 32]), &nonce, until, &stake).unwrap()
        );
        assert_ne!(
            base,
            signing_message(&program, &signer, &Uuid::from_u128(43), until, &stake).unwrap()
        );
        assert_ne!(
            base,
            signing_message(&program, &signer, &nonce, until + 1, &stake).unwrap()
        );
        assert_ne!(
            base,
            signing_message(&program, &signer, &nonce, until, &Instruction::Withdraw).unwrap()
        );
    }
}
