//! # Ledger Adapter
//!
//! In-memory fungible-asset ledger for tests and embedding.
//! A production host would implement `AssetLedger` over its token program.

use crate::domain::value_objects::{Address, Amount, AssetId};
use crate::errors::LedgerError;
use crate::ports::outbound::AssetLedger;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// In-memory asset ledger.
///
/// Balances are keyed by `(asset, address)`. Transfers of unregistered
/// assets fail with `UnknownAsset`.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    /// Registered asset types.
    assets: RwLock<HashSet<AssetId>>,
    /// Balances.
    balances: RwLock<HashMap<(AssetId, Address), Amount>>,
}

impl InMemoryLedger {
    /// Create a new empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger that already tracks `asset`.
    #[must_use]
    pub fn with_asset(asset: AssetId) -> Self {
        let ledger = Self::new();
        ledger.register_asset(asset);
        ledger
    }

    /// Start tracking `asset`.
    pub fn register_asset(&self, asset: AssetId) {
        self.assets.write().insert(asset);
    }

    /// Credit `amount` of `asset` to `address` out of thin air.
    pub fn mint(&self, asset: AssetId, address: Address, amount: Amount) -> Result<(), LedgerError> {
        if !self.assets.read().contains(&asset) {
            return Err(LedgerError::UnknownAsset(asset));
        }
        let mut balances = self.balances.write();
        let balance = balances.entry((asset, address)).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow(address))?;
        Ok(())
    }

    /// Current balance without going through the port.
    #[must_use]
    pub fn balance(&self, asset: &AssetId, address: &Address) -> Amount {
        self.balances
            .read()
            .get(&(*asset, *address))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of all balances of `asset`.
    #[must_use]
    pub fn total_supply(&self, asset: &AssetId) -> u128 {
        self.balances
            .read()
            .iter()
            .filter(|((a, _), _)| a == asset)
            .map(|(_, amount)| u128::from(*amount))
            .sum()
    }
}

#[async_trait]
impl AssetLedger for InMemoryLedger {
    async fn balance_of(&self, asset: &AssetId, address: &Address) -> Result<Amount, LedgerError> {
        if !self.assets.read().contains(asset) {
            return Err(LedgerError::UnknownAsset(*asset));
        }
        Ok(self.balance(asset, address))
    }

    async fn transfer(
        &self,
        asset: &AssetId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if !self.assets.read().contains(asset) {
            return Err(LedgerError::UnknownAsset(*asset));
        }

        // Single write guard: both legs land or neither does.
        let mut balances = self.balances.write();
        let available = balances.get(&(*asset, *from)).copied().unwrap_or(0);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                address: *from,
                required: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }

        let credited = balances
            .get(&(*asset, *to))
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow(*to))?;

        balances.insert((*asset, *from), available - amount);
        balances.insert((*asset, *to), credited);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
