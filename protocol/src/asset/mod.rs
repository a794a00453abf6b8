//! # Base Asset Interface
//!
//! The vault wraps an external fungible token with vote delegation. The
//! ledger only needs the handful of operations below; who implements them
//! (an on-chain token, a test double, the in-memory [`VotingToken`]) is the
//! environment's business.
//!
//! Caller identity is explicit: `transfer(from, ..)` is a transfer *by*
//! `from`. The environment is responsible for only invoking it with an
//! identity the caller actually controls, exactly as a VM would bind
//! `msg.sender`.

pub mod token;

use thiserror::Error;

use crate::identity::Address;

pub use token::VotingToken;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by a base asset.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetError {
    /// The sender does not hold enough tokens.
    #[error("insufficient asset balance: {account} has {available}, needs {requested}")]
    InsufficientBalance {
        /// Account being debited.
        account: Address,
        /// Its balance.
        available: u64,
        /// Amount requested.
        requested: u64,
    },

    /// The spender's allowance is too small.
    #[error(
        "insufficient asset allowance: {spender} may move {available} of {owner}'s tokens, needs {requested}"
    )]
    InsufficientAllowance {
        /// Token owner.
        owner: Address,
        /// Spender.
        spender: Address,
        /// Remaining allowance.
        available: u64,
        /// Amount requested.
        requested: u64,
    },

    /// Minting would overflow the total supply.
    #[error("asset supply overflow: minting {amount} on top of {supply}")]
    SupplyOverflow {
        /// Current supply.
        supply: u64,
        /// Amount requested.
        amount: u64,
    },
}

// ---------------------------------------------------------------------------
// BaseAsset
// ---------------------------------------------------------------------------

/// A fungible token with allowances and vote delegation.
pub trait BaseAsset {
    /// Address of the token itself.
    fn address(&self) -> Address;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Ticker symbol.
    fn symbol(&self) -> &str;

    /// Display decimals.
    fn decimals(&self) -> u8;

    /// Total supply.
    fn total_supply(&self) -> u64;

    /// Balance of `account`.
    fn balance_of(&self, account: &Address) -> u64;

    /// How much `spender` may move on behalf of `owner`.
    fn allowance(&self, owner: &Address, spender: &Address) -> u64;

    /// Moves `amount` from `from` to `to`, authorised by `from`.
    fn transfer(&mut self, from: Address, to: Address, amount: u64) -> Result<(), AssetError>;

    /// Sets `spender`'s allowance over `owner`'s tokens (overwrite).
    fn approve(&mut self, owner: Address, spender: Address, amount: u64);

    /// Moves `amount` from `from` to `to` using `spender`'s allowance.
    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: u64,
    ) -> Result<(), AssetError>;

    /// Delegates the voting weight of `account`'s balance to `delegatee`.
    fn delegate(&mut self, account: Address, delegatee: Address);

    /// Current delegatee of `account`, if any.
    fn delegates(&self, account: &Address) -> Option<Address>;
}
