//! # Tranche Ledger
//!
//! Per-owner, per-tranche share accounting. Each portal deposit is recorded
//! under a [`TrancheId`] captured from the vault state *before* the deposit
//! mints: `(height, total_assets, total_supply)`.
//!
//! The ledger keeps two views in lock-step:
//!
//! - `tranches[owner][id]`: shares held in one tranche
//! - `totals[owner]`: the sum of that owner's tranche balances
//!
//! Every mutation validates both views first and then writes both, so a
//! failed call leaves the ledger untouched.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use portal_protocol::identity::Address;

// ---------------------------------------------------------------------------
// TrancheId
// ---------------------------------------------------------------------------

/// Key of a tranche: the vault state a deposit was priced against.
///
/// Ordered lexicographically by height, then total assets, then total
/// supply. Rendered as `height:assets:supply`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrancheId {
    height: u64,
    total_assets: u64,
    total_supply: u64,
}

impl TrancheId {
    /// Builds an id from its components.
    pub fn new(height: u64, total_assets: u64, total_supply: u64) -> Self {
        Self {
            height,
            total_assets,
            total_supply,
        }
    }

    /// Height the deposit executed at.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Vault `total_assets` before the deposit.
    pub fn total_assets(&self) -> u64 {
        self.total_assets
    }

    /// Vault `total_supply` before the deposit.
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }
}

impl fmt::Display for TrancheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.height, self.total_assets, self.total_supply
        )
    }
}

/// Failure to parse a [`TrancheId`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid tranche id {0:?}: expected height:assets:supply")]
pub struct ParseTrancheIdError(String);

impl FromStr for TrancheId {
    type Err = ParseTrancheIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseTrancheIdError(s.to_string());
        let mut parts = s.split(':');
        let mut field = || -> Result<u64, ParseTrancheIdError> {
            parts
                .next()
                .ok_or_else(invalid)?
                .trim()
                .parse()
                .map_err(|_| invalid())
        };
        let id = TrancheId::new(field()?, field()?, field()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(id)
    }
}

impl Serialize for TrancheId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TrancheId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from tranche accounting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The tranche balance is too small.
    #[error("insufficient tranche balance: {owner} holds {available} in {id}, needs {requested}")]
    InsufficientBalance {
        /// Owner being debited.
        owner: Address,
        /// Tranche.
        id: TrancheId,
        /// Current balance.
        available: u64,
        /// Amount requested.
        requested: u64,
    },

    /// A credit would overflow the tranche or owner total.
    #[error("tranche balance overflow for {owner} in {id}")]
    Overflow {
        /// Owner being credited.
        owner: Address,
        /// Tranche.
        id: TrancheId,
    },
}

// ---------------------------------------------------------------------------
// TrancheLedger
// ---------------------------------------------------------------------------

/// Share balances per `(owner, tranche)` plus per-owner totals.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrancheLedger {
    tranches: BTreeMap<Address, BTreeMap<TrancheId, u64>>,
    totals: BTreeMap<Address, u64>,
    minted: BTreeSet<TrancheId>,
}

impl TrancheLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shares `owner` holds in tranche `id`.
    pub fn balance_of(&self, owner: &Address, id: &TrancheId) -> u64 {
        self.tranches
            .get(owner)
            .and_then(|t| t.get(id))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of `owner`'s tranche balances.
    pub fn total_balance(&self, owner: &Address) -> u64 {
        self.totals.get(owner).copied().unwrap_or(0)
    }

    /// Every tranche `owner` has held, zero balances included.
    pub fn tranches_of(&self, owner: &Address) -> Vec<(TrancheId, u64)> {
        self.tranches
            .get(owner)
            .map(|t| t.iter().map(|(id, shares)| (*id, *shares)).collect())
            .unwrap_or_default()
    }

    /// Every owner that has held a tranche.
    pub fn owners(&self) -> impl Iterator<Item = &Address> {
        self.totals.keys()
    }

    /// Whether a deposit has ever been keyed by `id`.
    pub fn is_minted(&self, id: &TrancheId) -> bool {
        self.minted.contains(id)
    }

    /// Sum of every owner's total.
    pub fn total_shares(&self) -> u64 {
        self.totals.values().sum()
    }

    /// Checks that `credit(owner, id, shares)` would succeed.
    pub fn ensure_credit(
        &self,
        owner: &Address,
        id: &TrancheId,
        shares: u64,
    ) -> Result<(), LedgerError> {
        self.credited(owner, id, shares).map(|_| ())
    }

    /// Checks that `debit(owner, id, shares)` would succeed.
    pub fn ensure_debit(
        &self,
        owner: &Address,
        id: &TrancheId,
        shares: u64,
    ) -> Result<(), LedgerError> {
        self.debited(owner, id, shares).map(|_| ())
    }

    /// Adds `shares` to `owner`'s tranche `id` and marks the id minted.
    pub fn credit(
        &mut self,
        owner: Address,
        id: TrancheId,
        shares: u64,
    ) -> Result<(), LedgerError> {
        let (entry, total) = self.credited(&owner, &id, shares)?;
        self.write(owner, id, entry, total);
        self.minted.insert(id);
        Ok(())
    }

    /// Removes `shares` from `owner`'s tranche `id`.
    pub fn debit(&mut self, owner: Address, id: TrancheId, shares: u64) -> Result<(), LedgerError> {
        let (entry, total) = self.debited(&owner, &id, shares)?;
        self.write(owner, id, entry, total);
        Ok(())
    }

    /// Moves `shares` of tranche `id` from `from` to `to`.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        id: TrancheId,
        shares: u64,
    ) -> Result<(), LedgerError> {
        let (from_entry, from_total) = self.debited(&from, &id, shares)?;
        if from == to {
            return Ok(());
        }
        let (to_entry, to_total) = self.credited(&to, &id, shares)?;

        self.write(from, id, from_entry, from_total);
        self.write(to, id, to_entry, to_total);
        Ok(())
    }

    fn credited(
        &self,
        owner: &Address,
        id: &TrancheId,
        shares: u64,
    ) -> Result<(u64, u64), LedgerError> {
        let overflow = || LedgerError::Overflow {
            owner: *owner,
            id: *id,
        };
        let entry = self
            .balance_of(owner, id)
            .checked_add(shares)
            .ok_or_else(overflow)?;
        let total = self
            .total_balance(owner)
            .checked_add(shares)
            .ok_or_else(overflow)?;
        Ok((entry, total))
    }

    fn debited(
        &self,
        owner: &Address,
        id: &TrancheId,
        shares: u64,
    ) -> Result<(u64, u64), LedgerError> {
        let available = self.balance_of(owner, id);
        if available < shares {
            return Err(LedgerError::InsufficientBalance {
                owner: *owner,
                id: *id,
                available,
                requested: shares,
            });
        }
        // The owner total is the sum of its entries, so it covers `shares` too.
        Ok((available - shares, self.total_balance(owner) - shares))
    }

    fn write(&mut self, owner: Address, id: TrancheId, entry: u64, total: u64) {
        self.tranches.entry(owner).or_default().insert(id, entry);
        self.totals.insert(owner, total);
    }
}
