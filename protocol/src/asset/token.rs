//! # In-Memory Voting Token
//!
//! A minimal [`BaseAsset`] implementation: balances, overwrite-style
//! allowances, and delegation with on-read vote tallies. It is what the
//! tests, the demo and the scenario runner use as the vault's underlying
//! asset.
//!
//! Allowances of [`UNLIMITED_ALLOWANCE`] are never decremented, and an
//! account spending its own tokens through `transfer_from` needs no
//! allowance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AssetError, BaseAsset};
use crate::config::UNLIMITED_ALLOWANCE;
use crate::identity::Address;

/// A fungible token with vote delegation, held entirely in memory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VotingToken {
    address: Address,
    name: String,
    symbol: String,
    decimals: u8,
    total_supply: u64,
    balances: BTreeMap<Address, u64>,
    allowances: BTreeMap<Address, BTreeMap<Address, u64>>,
    delegates: BTreeMap<Address, Address>,
}

impl VotingToken {
    /// Creates an empty token at the address derived from its symbol.
    pub fn new(name: &str, symbol: &str, decimals: u8) -> Self {
        Self::with_address(Address::from_label(symbol), name, symbol, decimals)
    }

    /// Creates an empty token at an explicit address.
    pub fn with_address(address: Address, name: &str, symbol: &str, decimals: u8) -> Self {
        Self {
            address,
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            delegates: BTreeMap::new(),
        }
    }

    /// Mints `amount` new tokens to `to`.
    pub fn mint(&mut self, to: Address, amount: u64) -> Result<(), AssetError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(AssetError::SupplyOverflow {
                supply: self.total_supply,
                amount,
            })?;
        self.total_supply = supply;
        // Individual balances are bounded by the supply, so this cannot overflow.
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }

    /// Sum of balances of every account delegating to `delegatee`.
    pub fn votes(&self, delegatee: &Address) -> u64 {
        self.delegates
            .iter()
            .filter(|(_, d)| *d == delegatee)
            .map(|(account, _)| self.balance_of(account))
            .sum()
    }

    /// All non-zero balances.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &u64)> {
        self.balances.iter().filter(|(_, b)| **b > 0)
    }

    fn move_balance(&mut self, from: Address, to: Address, amount: u64) -> Result<(), AssetError> {
        let available = self.balance_of(&from);
        if available < amount {
            return Err(AssetError::InsufficientBalance {
                account: from,
                available,
                requested: amount,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        self.balances.insert(from, available - amount);
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }
}

impl BaseAsset for VotingToken {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn total_supply(&self) -> u64 {
        self.total_supply
    }

    fn balance_of(&self, account: &Address) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(&mut self, from: Address, to: Address, amount: u64) -> Result<(), AssetError> {
        self.move_balance(from, to, amount)
    }

    fn approve(&mut self, owner: Address, spender: Address, amount: u64) {
        self.allowances
            .entry(owner)
            .or_default()
            .insert(spender, amount);
    }

    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: u64,
    ) -> Result<(), AssetError> {
        if spender == from {
            return self.move_balance(from, to, amount);
        }

        let allowed = self.allowance(&from, &spender);
        if allowed < amount {
            return Err(AssetError::InsufficientAllowance {
                owner: from,
                spender,
                available: allowed,
                requested: amount,
            });
        }

        self.move_balance(from, to, amount)?;
        if allowed != UNLIMITED_ALLOWANCE {
            self.approve(from, spender, allowed - amount);
        }
        Ok(())
    }

    fn delegate(&mut self, account: Address, delegatee: Address) {
        tracing::debug!(%account, %delegatee, token = %self.symbol, "asset votes delegated");
        self.delegates.insert(account, delegatee);
    }

    fn delegates(&self, account: &Address) -> Option<Address> {
        self.delegates.get(account).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded() -> (VotingToken, Address, Address) {
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let mut token = VotingToken::new("Nofee", "NOFEE", 18);
        token.mint(alice, 1_000).unwrap();
        (token, alice, bob)
    }

    #[test]
    fn mint_tracks_supply() {
        let (token, alice, _) = funded();
        assert_eq!(token.total_supply(), 1_000);
        assert_eq!(token.balance_of(&alice), 1_000);
    }

    #[test]
    fn mint_overflow_rejected() {
        let (mut token, alice, _) = funded();
        assert!(matches!(
            token.mint(alice, u64::MAX),
            Err(AssetError::SupplyOverflow { .. })
        ));
        assert_eq!(token.total_supply(), 1_000);
    }

    #[test]
    fn transfer_moves_balance() {
        let (mut token, alice, bob) = funded();
        token.transfer(alice, bob, 400).unwrap();
        assert_eq!(token.balance_of(&alice), 600);
        assert_eq!(token.balance_of(&bob), 400);
    }

    #[test]
    fn transfer_insufficient_leaves_state() {
        let (mut token, alice, bob) = funded();
        let err = token.transfer(bob, alice, 1).unwrap_err();
        assert_eq!(
            err,
            AssetError::InsufficientBalance {
                account: bob,
                available: 0,
                requested: 1
            }
        );
        assert_eq!(token.balance_of(&alice), 1_000);
    }

    #[test]
    fn transfer_from_consumes_allowance() {
        let (mut token, alice, bob) = funded();
        let spender = Address::from_label("spender");
        token.approve(alice, spender, 300);

        token.transfer_from(spender, alice, bob, 200).unwrap();
        assert_eq!(token.allowance(&alice, &spender), 100);
        assert_eq!(token.balance_of(&bob), 200);

        assert!(matches!(
            token.transfer_from(spender, alice, bob, 101),
            Err(AssetError::InsufficientAllowance { available: 100, .. })
        ));
    }

    #[test]
    fn unlimited_allowance_not_decremented() {
        let (mut token, alice, bob) = funded();
        let spender = Address::from_label("spender");
        token.approve(alice, spender, UNLIMITED_ALLOWANCE);
        token.transfer_from(spender, alice, bob, 500).unwrap();
        assert_eq!(token.allowance(&alice, &spender), UNLIMITED_ALLOWANCE);
    }

    #[test]
    fn self_spend_needs_no_allowance() {
        let (mut token, alice, bob) = funded();
        token.transfer_from(alice, alice, bob, 10).unwrap();
        assert_eq!(token.balance_of(&bob), 10);
    }

    #[test]
    fn votes_follow_delegation_and_balance() {
        let (mut token, alice, bob) = funded();
        let rep = Address::from_label("rep");
        token.delegate(alice, rep);
        assert_eq!(token.delegates(&alice), Some(rep));
        assert_eq!(token.votes(&rep), 1_000);

        token.transfer(alice, bob, 250).unwrap();
        assert_eq!(token.votes(&rep), 750);
        assert_eq!(token.delegates(&bob), None);
    }
}
