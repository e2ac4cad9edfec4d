//! # Domain Services
//!
//! Pure business logic functions for the escrow.
//! These functions are deterministic and have no side effects.
//!
//! - NO I/O operations
//! - NO async code
//! - Pure functions only

use crate::domain::value_objects::{Address, Amount};
use sha3::{Digest, Keccak256};

// =============================================================================
// ADDRESS DERIVATION
// =============================================================================

/// Name hashed into the default program id.
pub const DEFAULT_PROGRAM_NAME: &[u8] = b"wager-escrow";

/// Computes keccak256 hash of data.
#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Program id used when none is configured.
#[must_use]
pub fn default_program_id() -> [u8; 32] {
    keccak256(DEFAULT_PROGRAM_NAME)
}

/// Derives a record address from a program namespace and a list of seeds.
///
/// Address = keccak256(program_id ++ (len(seed) ++ seed)*)
///
/// Each seed is prefixed with its length as a big-endian `u32`, so
/// `["ab", "c"]` and `["a", "bc"]` never hash the same input.
#[must_use]
pub fn derive_address(program_id: &[u8; 32], seeds: &[&[u8]]) -> Address {
    let mut hasher = Keccak256::new();
    hasher.update(program_id);
    for seed in seeds {
        // Seeds are short namespace tags and 32-byte keys.
        let len = u32::try_from(seed.len()).unwrap_or(u32::MAX);
        hasher.update(len.to_be_bytes());
        hasher.update(seed);
    }
    Address::new(hasher.finalize().into())
}

// =============================================================================
// SETTLEMENT ARITHMETIC (authority side)
// =============================================================================

/// Payout worth `percent` of `pot`, rounded down the way settlement tooling
/// computes it: `pot / 100 * percent`.
///
/// Returns None for `percent > 100`. The engine never calls this; it is the
/// authority's off-chain helper for building `mark_eligible` amounts.
#[must_use]
pub fn payout_for_percent(pot: Amount, percent: u8) -> Option<Amount> {
    if percent > 100 {
        return None;
    }
    (pot / 100).checked_mul(Amount::from(percent))
}

/// Splits `pot` across winners by percentage.
///
/// Returns None if any percentage exceeds 100 or the total exceeds 100.
#[must_use]
pub fn split_pot(pot: Amount, percents: &[u8]) -> Option<Vec<Amount>> {
    let total: u32 = percents.iter().map(|&p| u32::from(p)).sum();
    if total > 100 {
        return None;
    }
    percents
        .iter()
        .map(|&percent| payout_for_percent(pot, percent))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
