//! # Driven Ports (SPI - Outbound)
//!
//! These are the capabilities the escrow engine consumes from its host:
//! - Asset custody and transfers (`AssetLedger`)
//! - Deterministic record addresses (`AddressSpace`)
//! - Signer authentication (`SignatureVerifier`)
//!
//! The engine never depends on how a host implements them.

use crate::domain::value_objects::{seeds, Address, Amount, AssetId, Identity, Signature};
use crate::errors::LedgerError;
use async_trait::async_trait;

// =============================================================================
// ASSET LEDGER
// =============================================================================

/// Interface to the fungible-asset ledger.
///
/// ## Implementation Notes
///
/// `transfer` must be atomic: it either moves exactly `amount` from `from`
/// to `to`, or changes nothing and returns an error. The engine relies on
/// this to commit its own records only after a successful transfer.
#[async_trait]
pub trait AssetLedger: Send + Sync {
    /// Balance of `asset` held at `address` (zero if never funded).
    async fn balance_of(&self, asset: &AssetId, address: &Address) -> Result<Amount, LedgerError>;

    /// Move `amount` units of `asset` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientFunds` - `from` holds less than `amount`
    /// * `LedgerError::UnknownAsset` - `asset` is not tracked by this ledger
    async fn transfer(
        &self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;
}

// =============================================================================
// ADDRESS SPACE
// =============================================================================

/// Deterministic derivation of record addresses from seeds.
///
/// Derivation must be collision-free per distinct seed list.
pub trait AddressSpace: Send + Sync {
    /// Derive the address for `seeds`.
    fn derive(&self, seeds: &[&[u8]]) -> Address;

    /// Address of the singleton escrow record.
    fn escrow_address(&self) -> Address {
        self.derive(&[seeds::ESCROW])
    }

    /// Address of `identity`'s participant record.
    fn participant_address(&self, identity: &Identity) -> Address {
        self.derive(&[seeds::PARTICIPANT, identity.as_bytes().as_slice()])
    }
}

// =============================================================================
// SIGNATURE VERIFIER
// =============================================================================

/// Interface for authenticating instruction signers.
pub trait SignatureVerifier: Send + Sync {
    /// Returns true if `signature` is `identity`'s signature over `message`.
    fn verify(&self, identity: &Identity, message: &[u8], signature: &Signature) -> bool;
}

// =============================================================================
// TESTS
// =============================================================================
