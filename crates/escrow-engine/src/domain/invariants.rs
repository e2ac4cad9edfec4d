//! # Domain Invariants
//!
//! Fund invariants that MUST hold between operations.
//!
//! - Custody covers the pot: `custodied_balance >= pot`
//! - Custody covers allocations: `custodied_balance >= Σ outstanding payouts`
//! - Conservation: `custodied_balance == Σ stakes − Σ withdrawals`

use crate::domain::entities::{EscrowRecords, EscrowState};
use crate::domain::value_objects::Amount;

// =============================================================================
// INVARIANT CHECKS
// =============================================================================

/// Custody covers the current round's pot.
#[must_use]
pub fn check_pot_covered(escrow: &EscrowState) -> bool {
    escrow.custodied_balance >= escrow.pot
}

/// Custody covers every outstanding payout.
#[must_use]
pub fn check_allocations_covered(records: &EscrowRecords) -> bool {
    match records.outstanding_payouts(None) {
        Ok(allocated) => allocated <= records.escrow.custodied_balance,
        Err(_) => false,
    }
}

/// Custodied balance equals everything staked minus everything withdrawn.
#[must_use]
pub fn check_conservation(
    escrow: &EscrowState,
    total_staked: Amount,
    total_withdrawn: Amount,
) -> bool {
    total_staked.checked_sub(total_withdrawn) == Some(escrow.custodied_balance)
}

/// Check all invariants at once.
#[must_use]
pub fn check_all_invariants(
    records: &EscrowRecords,
    total_staked: Amount,
    total_withdrawn: Amount,
) -> InvariantCheckResult {
    let escrow = &records.escrow;
    let mut violations = Vec::new();

    if !check_pot_covered(escrow) {
        violations.push(InvariantViolation::PotExceedsCustody {
            pot: escrow.pot,
            custodied: escrow.custodied_balance,
        });
    }

    if !check_allocations_covered(records) {
        violations.push(InvariantViolation::AllocationsExceedCustody {
            allocated: records.outstanding_payouts(None).unwrap_or(Amount::MAX),
            custodied: escrow.custodied_balance,
        });
    }

    if !check_conservation(escrow, total_staked, total_withdrawn) {
        violations.push(InvariantViolation::ConservationBroken {
            custodied: escrow.custodied_balance,
            staked: total_staked,
            withdrawn: total_withdrawn,
        });
    }

    if violations.is_empty() {
        InvariantCheckResult::Valid
    } else {
        InvariantCheckResult::Invalid(violations)
    }
}

// =============================================================================
// INVARIANT TYPES
// =============================================================================

/// Result of checking all invariants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantCheckResult {
    /// All invariants hold.
    Valid,
    /// One or more invariants violated.
    Invalid(Vec<InvariantViolation>),
}

impl InvariantCheckResult {
    /// Returns true if all invariants hold.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Specific invariant violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Pot larger than custody.
    PotExceedsCustody { pot: Amount, custodied: Amount },
    /// Outstanding payouts larger than custody.
    AllocationsExceedCustody { allocated: Amount, custodied: Amount },
    /// Custody does not match the stake/withdrawal history.
    ConservationBroken {
        custodied: Amount,
        staked: Amount,
        withdrawn: Amount,
    },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PotExceedsCustody { pot, custodied } => {
                write!(f, "pot {pot} exceeds custodied balance {custodied}")
            }
            Self::AllocationsExceedCustody {
                allocated,
                custodied,
            } => {
                write!(
                    f,
                    "outstanding payouts {allocated} exceed custodied balance {custodied}"
                )
            }
            Self::ConservationBroken {
                custodied,
                staked,
                withdrawn,
            } => {
                write!(
                    f,
                    "custodied balance {custodied} != staked {staked} - withdrawn {withdrawn}"
                )
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ParticipantState;
    use crate::domain::value_objects::{Address, Identity};

    fn records(pot: Amount, custodied: Amount) -> EscrowRecords {
        let mut records = EscrowRecords::default();
        records.escrow.initialized = true;
        records.escrow.pot = pot;
        records.escrow.custodied_balance = custodied;
        records
    }

    fn with_payout(mut records: EscrowRecords, seed: u8, amount: Amount) -> EscrowRecords {
        records.participants.insert(
            Address::new([seed; 32]),
            ParticipantState::register(Identity::new([seed; 32])).with_eligibility(amount),
        );
        records
    }

    #[test]
    fn test_all_invariants_valid() {
        let r = with_payout(records(1_000, 3_000), 1, 2_000);
        assert!(check_all_invariants(&r, 3_000, 0).is_valid());
    }

    #[test]
    fn test_pot_exceeds_custody() {
        let r = records(5, 4);
        assert!(!check_pot_covered(&r.escrow));
        match check_all_invariants(&r, 4, 0) {
            InvariantCheckResult::Invalid(v) => {
                assert_eq!(
                    v,
                    vec![InvariantViolation::PotExceedsCustody {
                        pot: 5,
                        custodied: 4
                    }]
                );
            }
            InvariantCheckResult::Valid => panic!("Expected violation"),
        }
    }

    #[test]
    fn test_allocations_exceed_custody() {
        let r = with_payout(with_payout(records(0, 10), 1, 6), 2, 5);
        assert!(!check_allocations_covered(&r));
    }

    #[test]
    fn test_ineligible_payouts_are_not_counted() {
        let mut r = with_payout(records(0, 10), 1, 6);
        r.participants
            .insert(Address::new([2u8; 32]), ParticipantState::register(Identity::new([2u8; 32])));
        assert!(check_allocations_covered(&r));
    }

    #[test]
    fn test_conservation() {
        let r = records(0, 2_300_000);
        assert!(check_conservation(&r.escrow, 3_000_000, 700_000));
        assert!(!check_conservation(&r.escrow, 3_000_000, 0));
        assert!(!check_conservation(&r.escrow, 0, 1));
    }

    #[test]
    fn test_multiple_violations_reported() {
        let r = with_payout(records(20, 10), 1, 50);
        match check_all_invariants(&r, 0, 0) {
            InvariantCheckResult::Invalid(v) => assert_eq!(v.len(), 3),
            InvariantCheckResult::Valid => panic!("Expected violations"),
        }
    }

    #[test]
    fn test_violation_display() {
        let v = InvariantViolation::PotExceedsCustody {
            pot: 2,
            custodied: 1,
        };
        assert_eq!(v.to_string(), "pot 2 exceeds custodied balance 1");
    }
}
