//! # Trustee Registry
//!
//! Each tranche owner may delegate the voting weight of its backing vault
//! shares. Delegation relocates those shares from the portal's shared pool
//! into a per-owner *trustee* account whose vault votes the owner directs.
//! Economic ownership stays in the tranche ledger; the trustee only
//! custodies.
//!
//! Trustees are registry entries at derived addresses, created lazily on
//! the first delegation. The registry tracks how many vault shares each
//! trustee holds, which must always equal the trustee address's vault
//! balance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use portal_protocol::config::PORTAL_TRUSTEE_DOMAIN;
use portal_protocol::identity::Address;

/// Errors from trustee custody bookkeeping.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrusteeError {
    /// Releasing more than the trustee holds.
    #[error("trustee of {owner} custodies {available} shares, cannot release {requested}")]
    InsufficientCustody {
        /// Owner whose trustee is debited.
        owner: Address,
        /// Custodied shares.
        available: u64,
        /// Amount requested.
        requested: u64,
    },

    /// Custody would overflow.
    #[error("trustee custody overflow for {owner}")]
    Overflow {
        /// Owner whose trustee is credited.
        owner: Address,
    },
}

/// One owner's custody partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trustee {
    /// Vault-share account of the trustee.
    pub address: Address,
    /// Vault shares in custody.
    pub balance: u64,
    /// Current vote target.
    pub delegatee: Address,
}

/// Trustee bookkeeping for one portal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrusteeRegistry {
    portal: Address,
    trustees: BTreeMap<Address, Trustee>,
}

impl TrusteeRegistry {
    /// Empty registry for the portal at `portal`.
    pub fn new(portal: Address) -> Self {
        Self {
            portal,
            trustees: BTreeMap::new(),
        }
    }

    /// Deterministic trustee address of `owner`, whether or not it exists yet.
    pub fn address_for(&self, owner: &Address) -> Address {
        Address::derive(PORTAL_TRUSTEE_DOMAIN, &[&self.portal, owner])
    }

    /// Whether `account` is the pool or a trustee that already exists.
    pub fn is_custody_account(&self, account: &Address) -> bool {
        *account == self.portal || self.trustees.values().any(|t| t.address == *account)
    }

    /// `owner`'s trustee, if it ever delegated.
    pub fn trustee_of(&self, owner: &Address) -> Option<&Trustee> {
        self.trustees.get(owner)
    }

    /// Shares custodied for `owner`.
    pub fn balance_of(&self, owner: &Address) -> u64 {
        self.trustees.get(owner).map_or(0, |t| t.balance)
    }

    /// `owner`'s vote target.
    pub fn delegatee_of(&self, owner: &Address) -> Option<Address> {
        self.trustees.get(owner).map(|t| t.delegatee)
    }

    /// All trustees keyed by owner.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Trustee)> {
        self.trustees.iter()
    }

    /// Sum of every trustee's custody.
    pub fn total_custodied(&self) -> u64 {
        self.trustees.values().map(|t| t.balance).sum()
    }

    /// Splits an outflow of `shares` into `(from_trustee, from_pool)`,
    /// draining the trustee first.
    pub fn custody_split(&self, owner: &Address, shares: u64) -> (u64, u64) {
        let from_trustee = self.balance_of(owner).min(shares);
        (from_trustee, shares - from_trustee)
    }

    /// Checks that `record_delegation(owner, _, added)` would succeed.
    pub fn ensure_record(&self, owner: &Address, added: u64) -> Result<(), TrusteeError> {
        self.balance_of(owner)
            .checked_add(added)
            .map(|_| ())
            .ok_or(TrusteeError::Overflow { owner: *owner })
    }

    /// Checks that `release(owner, shares)` would succeed.
    pub fn ensure_release(&self, owner: &Address, shares: u64) -> Result<(), TrusteeError> {
        let available = self.balance_of(owner);
        if available < shares {
            return Err(TrusteeError::InsufficientCustody {
                owner: *owner,
                available,
                requested: shares,
            });
        }
        Ok(())
    }

    /// Records `added` shares moved into `owner`'s trustee and its new
    /// target, creating the trustee if needed. Returns the trustee address.
    pub fn record_delegation(
        &mut self,
        owner: Address,
        delegatee: Address,
        added: u64,
    ) -> Result<Address, TrusteeError> {
        self.ensure_record(&owner, added)?;
        let address = self.address_for(&owner);
        let trustee = self.trustees.entry(owner).or_insert(Trustee {
            address,
            balance: 0,
            delegatee,
        });
        trustee.balance += added;
        trustee.delegatee = delegatee;
        Ok(address)
    }

    /// Records `shares` leaving `owner`'s trustee.
    pub fn release(&mut self, owner: Address, shares: u64) -> Result<(), TrusteeError> {
        self.ensure_release(&owner, shares)?;
        if let Some(trustee) = self.trustees.get_mut(&owner) {
            trustee.balance -= shares;
        }
        Ok(())
    }
}
