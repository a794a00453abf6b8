//! Per-tranche spending allowances: `(owner, spender, id) → shares`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use portal_protocol::config::UNLIMITED_ALLOWANCE;
use portal_protocol::identity::Address;

use crate::tranche::TrancheId;

/// The spender may not move that many shares.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "insufficient allowance: {spender} may move {available} of {owner}'s shares in {id}, needs {requested}"
)]
pub struct AllowanceError {
    /// Share owner.
    pub owner: Address,
    /// Spender.
    pub spender: Address,
    /// Tranche.
    pub id: TrancheId,
    /// Remaining allowance.
    pub available: u64,
    /// Amount requested.
    pub requested: u64,
}

/// Allowance table. Approvals overwrite; [`UNLIMITED_ALLOWANCE`] is never
/// decremented.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AllowanceStore {
    allowances: BTreeMap<Address, BTreeMap<Address, BTreeMap<TrancheId, u64>>>,
}

impl AllowanceStore {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining allowance.
    pub fn allowance(&self, owner: &Address, spender: &Address, id: &TrancheId) -> u64 {
        self.allowances
            .get(owner)
            .and_then(|s| s.get(spender))
            .and_then(|t| t.get(id))
            .copied()
            .unwrap_or(0)
    }

    /// Sets the allowance to exactly `shares`.
    pub fn approve(&mut self, owner: Address, spender: Address, id: TrancheId, shares: u64) {
        self.allowances
            .entry(owner)
            .or_default()
            .entry(spender)
            .or_default()
            .insert(id, shares);
    }

    /// Checks that `spender` may move `shares`.
    pub fn ensure(
        &self,
        owner: &Address,
        spender: &Address,
        id: &TrancheId,
        shares: u64,
    ) -> Result<(), AllowanceError> {
        let available = self.allowance(owner, spender, id);
        if available < shares {
            return Err(AllowanceError {
                owner: *owner,
                spender: *spender,
                id: *id,
                available,
                requested: shares,
            });
        }
        Ok(())
    }

    /// Checks and decrements.
    pub fn consume(
        &mut self,
        owner: Address,
        spender: Address,
        id: TrancheId,
        shares: u64,
    ) -> Result<(), AllowanceError> {
        self.ensure(&owner, &spender, &id, shares)?;
        let available = self.allowance(&owner, &spender, &id);
        if available != UNLIMITED_ALLOWANCE {
            self.approve(owner, spender, id, available - shares);
        }
        Ok(())
    }
}
