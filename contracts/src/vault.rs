//! # Exchange Vault
//!
//! A tokenized vault over a [`BaseAsset`]: depositors hand in assets and
//! receive shares at the current exchange rate, redeemers burn shares and
//! receive assets. The rate is `(total_supply + offset) / (total_assets + 1)`
//! and moves only when assets arrive or leave without a matching mint or
//! burn. That happens through donations ([`ExchangeVault::contribute`]) and
//! through the rounding of the operations themselves, which always favours
//! the vault.
//!
//! ## Trusted assets
//!
//! A share holder may [`delegate`](ExchangeVault::delegate) the base asset
//! voting weight of its position. The vault then moves the floor asset
//! value of the holder's shares into a per-holder *vault trustee* account
//! that delegates to the chosen target. Those assets still belong to the
//! vault and are counted in `total_assets`:
//!
//! ```text
//! total_assets = asset.balance_of(vault) + total_trusted
//! ```
//!
//! so the rate is unaffected by where the assets physically sit. Whenever a
//! delegating holder's share balance changes, its trusted amount is
//! re-synchronised to the new floor value.
//!
//! ## Atomicity
//!
//! Every state-changing call builds a [`Settlement`] (post-call balances,
//! totals, the asset pull or payout) and validates it completely, liquidity
//! included, before writing anything. The first write is the base-asset
//! pull, which fails without side effects.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

use portal_protocol::asset::{AssetError, BaseAsset};
use portal_protocol::config::{
    self, ConfigError, UNLIMITED_ALLOWANCE, VAULT_DOMAIN, VAULT_NAME_PREFIX, VAULT_TRUSTEE_DOMAIN,
};
use portal_protocol::identity::Address;

use crate::math::{self, MathError, Rounding};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Conversion overflowed or divided by zero.
    #[error("vault arithmetic: {0}")]
    Math(#[from] MathError),

    /// The base asset refused a transfer.
    #[error("base asset: {0}")]
    Asset(#[from] AssetError),

    /// Invalid construction parameters.
    #[error("vault config: {0}")]
    Config(#[from] ConfigError),

    /// A holder tried to move or burn more shares than it has.
    #[error("insufficient shares: {holder} has {available}, needs {requested}")]
    InsufficientShares {
        /// Holder being debited.
        holder: Address,
        /// Its balance.
        available: u64,
        /// Amount requested.
        requested: u64,
    },

    /// A spender's share allowance is too small.
    #[error(
        "insufficient share allowance: {spender} may move {available} of {owner}'s shares, needs {requested}"
    )]
    InsufficientAllowance {
        /// Share owner.
        owner: Address,
        /// Spender.
        spender: Address,
        /// Remaining allowance.
        available: u64,
        /// Amount requested.
        requested: u64,
    },

    /// Not enough untrusted assets to settle the call.
    #[error("insufficient liquidity: {available} spendable assets, needs {requested}")]
    InsufficientLiquidity {
        /// Assets available to the settlement.
        available: u64,
        /// Assets the settlement must pay out or move into trust.
        requested: u64,
    },

    /// A non-zero deposit would mint no shares.
    #[error("deposit of {assets} assets rounds to zero shares")]
    ZeroSharesMinted {
        /// Assets offered.
        assets: u64,
    },

    /// A non-zero redemption would pay no assets.
    #[error("redemption of {shares} shares rounds to zero assets")]
    ZeroAssetsRedeemed {
        /// Shares offered.
        shares: u64,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A holder's asset-custody partition used for vote delegation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultTrustee {
    /// Asset account holding the trusted assets.
    pub address: Address,
    /// Who receives the voting weight.
    pub delegatee: Address,
    /// Assets currently held in trust.
    pub trusted: u64,
}

/// Assets pulled into the vault by a settlement.
#[derive(Clone, Copy, Debug)]
struct Pull {
    spender: Address,
    payer: Address,
    amount: u64,
}

/// The complete effect of one vault call, staged before commit.
#[derive(Debug)]
struct Settlement {
    /// Post-call share balances of every touched holder.
    balances: BTreeMap<Address, u64>,
    total_assets: u64,
    total_supply: u64,
    pull: Option<Pull>,
    payout: Option<(Address, u64)>,
    /// Holder whose vault trustee is created or re-targeted.
    enroll: Option<(Address, Address)>,
}

impl Settlement {
    fn new(total_assets: u64, total_supply: u64) -> Self {
        Self {
            balances: BTreeMap::new(),
            total_assets,
            total_supply,
            pull: None,
            payout: None,
            enroll: None,
        }
    }
}

/// A tokenized exchange-rate vault over the base asset `A`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExchangeVault<A> {
    address: Address,
    name: String,
    symbol: String,
    decimals_offset: u8,
    offset_unit: u64,
    total_supply: u64,
    total_trusted: u64,
    balances: BTreeMap<Address, u64>,
    allowances: BTreeMap<Address, BTreeMap<Address, u64>>,
    trustees: BTreeMap<Address, VaultTrustee>,
    asset: A,
}

impl<A: BaseAsset> ExchangeVault<A> {
    /// Wraps `asset` with the given decimal offset.
    ///
    /// The vault address is derived from the asset address, and the share
    /// token is named after the asset with an `X` prefix.
    pub fn new(asset: A, decimals_offset: u8) -> Result<Self, VaultError> {
        let offset_unit = config::offset_unit(decimals_offset)?;
        let asset_address = asset.address();
        let name = format!("{}{}", VAULT_NAME_PREFIX, asset.name());
        let symbol = format!("{}{}", VAULT_NAME_PREFIX, asset.symbol()).to_uppercase();

        Ok(Self {
            address: Address::derive(VAULT_DOMAIN, &[&asset_address]),
            name,
            symbol,
            decimals_offset,
            offset_unit,
            total_supply: 0,
            total_trusted: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            trustees: BTreeMap::new(),
            asset,
        })
    }

    // -- accessors ----------------------------------------------------------

    /// The vault's own address (its base-asset account).
    pub fn address(&self) -> Address {
        self.address
    }

    /// Share token name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Share token symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Share decimals: the asset's decimals plus the offset.
    pub fn decimals(&self) -> u8 {
        self.asset.decimals().saturating_add(self.decimals_offset)
    }

    /// Decimal offset between asset and shares.
    pub fn decimals_offset(&self) -> u8 {
        self.decimals_offset
    }

    /// `10^decimals_offset`.
    pub fn offset_unit(&self) -> u64 {
        self.offset_unit
    }

    /// The wrapped asset.
    pub fn asset(&self) -> &A {
        &self.asset
    }

    /// Mutable access to the wrapped asset, for transfers that do not go
    /// through the vault.
    pub fn asset_mut(&mut self) -> &mut A {
        &mut self.asset
    }

    /// Address of the wrapped asset.
    pub fn asset_address(&self) -> Address {
        self.asset.address()
    }

    /// Assets under management, held or in trust.
    pub fn total_assets(&self) -> u64 {
        self.asset
            .balance_of(&self.address)
            .saturating_add(self.total_trusted)
    }

    /// Shares in existence.
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// Assets parked in vault trustees.
    pub fn total_trusted(&self) -> u64 {
        self.total_trusted
    }

    /// Share balance of `holder`.
    pub fn balance_of(&self, holder: &Address) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    /// All non-zero share balances.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &u64)> {
        self.balances.iter()
    }

    /// Share allowance of `spender` over `owner`'s shares.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// The vault trustee of `holder`, if it ever delegated.
    pub fn trustee_of(&self, holder: &Address) -> Option<&VaultTrustee> {
        self.trustees.get(holder)
    }

    /// Every vault trustee, keyed by holder.
    pub fn trustees(&self) -> impl Iterator<Item = (&Address, &VaultTrustee)> {
        self.trustees.iter()
    }

    // -- conversions --------------------------------------------------------

    fn to_shares(&self, assets: u64, rounding: Rounding) -> Result<u64, VaultError> {
        Ok(math::convert_to_shares(
            assets,
            self.total_assets(),
            self.total_supply,
            self.offset_unit,
            rounding,
        )?)
    }

    fn to_assets(&self, shares: u64, rounding: Rounding) -> Result<u64, VaultError> {
        Ok(math::convert_to_assets(
            shares,
            self.total_assets(),
            self.total_supply,
            self.offset_unit,
            rounding,
        )?)
    }

    /// Shares worth `assets`, rounded down.
    pub fn convert_to_shares(&self, assets: u64) -> Result<u64, VaultError> {
        self.to_shares(assets, Rounding::Floor)
    }

    /// Assets worth `shares`, rounded down.
    pub fn convert_to_assets(&self, shares: u64) -> Result<u64, VaultError> {
        self.to_assets(shares, Rounding::Floor)
    }

    /// Shares a deposit of `assets` would mint.
    pub fn preview_deposit(&self, assets: u64) -> Result<u64, VaultError> {
        self.to_shares(assets, Rounding::Floor)
    }

    /// Assets needed to mint exactly `shares`.
    pub fn preview_mint(&self, shares: u64) -> Result<u64, VaultError> {
        self.to_assets(shares, Rounding::Ceiling)
    }

    /// Shares burned to withdraw exactly `assets`.
    pub fn preview_withdraw(&self, assets: u64) -> Result<u64, VaultError> {
        self.to_shares(assets, Rounding::Ceiling)
    }

    /// Assets paid for redeeming `shares`.
    pub fn preview_redeem(&self, shares: u64) -> Result<u64, VaultError> {
        self.to_assets(shares, Rounding::Floor)
    }

    /// Largest withdrawal `owner` can make.
    pub fn max_withdraw(&self, owner: &Address) -> Result<u64, VaultError> {
        self.preview_redeem(self.balance_of(owner))
    }

    /// Largest redemption `owner` can make.
    pub fn max_redeem(&self, owner: &Address) -> u64 {
        self.balance_of(owner)
    }

    // -- holder operations --------------------------------------------------

    /// Deposits `assets` from `caller`, minting shares to `receiver`.
    ///
    /// `caller` must have approved the vault on the base asset.
    pub fn deposit(
        &mut self,
        caller: Address,
        assets: u64,
        receiver: Address,
    ) -> Result<u64, VaultError> {
        self.deposit_via(self.address, caller, assets, receiver)
    }

    /// Mints exactly `shares` to `receiver`, pulling the required assets
    /// (rounded up) from `caller`.
    pub fn mint(
        &mut self,
        caller: Address,
        shares: u64,
        receiver: Address,
    ) -> Result<u64, VaultError> {
        let assets = self.preview_mint(shares)?;
        self.settle_mint(self.address, caller, assets, shares, receiver)?;
        info!(%caller, %receiver, assets, shares, "vault mint");
        Ok(assets)
    }

    /// Burns shares from `owner` to pay exactly `assets` to `receiver`.
    pub fn withdraw(
        &mut self,
        caller: Address,
        assets: u64,
        receiver: Address,
        owner: Address,
    ) -> Result<u64, VaultError> {
        let shares = self.preview_withdraw(assets)?;
        self.ensure_spend(&owner, &caller, shares)?;
        self.exit_custody(&[(owner, shares)], receiver, assets)?;
        self.consume_spend(owner, caller, shares);
        info!(%caller, %owner, %receiver, assets, shares, "vault withdraw");
        Ok(shares)
    }

    /// Burns exactly `shares` from `owner`, paying the assets to `receiver`.
    pub fn redeem(
        &mut self,
        caller: Address,
        shares: u64,
        receiver: Address,
        owner: Address,
    ) -> Result<u64, VaultError> {
        let assets = self.preview_redeem(shares)?;
        if shares > 0 && assets == 0 {
            return Err(VaultError::ZeroAssetsRedeemed { shares });
        }
        self.ensure_spend(&owner, &caller, shares)?;
        self.exit_custody(&[(owner, shares)], receiver, assets)?;
        self.consume_spend(owner, caller, shares);
        info!(%caller, %owner, %receiver, assets, shares, "vault redeem");
        Ok(assets)
    }

    /// Moves `shares` from `caller` to `to`.
    pub fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        shares: u64,
    ) -> Result<(), VaultError> {
        self.move_custody(&[(caller, shares)], to)
    }

    /// Sets `spender`'s share allowance over `owner`'s shares.
    pub fn approve(&mut self, owner: Address, spender: Address, shares: u64) {
        self.allowances
            .entry(owner)
            .or_default()
            .insert(spender, shares);
    }

    /// Moves `shares` from `from` to `to` using `spender`'s allowance.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        shares: u64,
    ) -> Result<(), VaultError> {
        self.ensure_spend(&from, &spender, shares)?;
        self.move_custody(&[(from, shares)], to)?;
        self.consume_spend(from, spender, shares);
        Ok(())
    }

    /// Donates `assets` from `from` to the vault without minting shares,
    /// raising the exchange rate for every holder.
    pub fn contribute(&mut self, from: Address, assets: u64) -> Result<(), VaultError> {
        self.asset.transfer(from, self.address, assets)?;
        info!(%from, assets, total_assets = self.total_assets(), "contribution received");
        Ok(())
    }

    /// Routes the base-asset voting weight of `holder`'s shares to
    /// `delegatee` through the holder's vault trustee.
    pub fn delegate(&mut self, holder: Address, delegatee: Address) -> Result<(), VaultError> {
        let mut settlement = Settlement::new(self.total_assets(), self.total_supply);
        settlement.balances.insert(holder, self.balance_of(&holder));
        settlement.enroll = Some((holder, delegatee));
        self.settle(settlement)?;

        info!(%holder, %delegatee, trusted = self.trusted_of(&holder), "vault votes delegated");
        Ok(())
    }

    /// Assets held in trust for `holder`.
    pub fn trusted_of(&self, holder: &Address) -> u64 {
        self.trustees.get(holder).map_or(0, |t| t.trusted)
    }

    /// Address of `holder`'s vault trustee, whether or not it exists yet.
    pub fn trustee_address(&self, holder: &Address) -> Address {
        Address::derive(VAULT_TRUSTEE_DOMAIN, &[&self.address, holder])
    }

    // -- custody primitives -------------------------------------------------

    /// Deposits `assets` from `payer`, pulled with `spender`'s base-asset
    /// allowance, minting the shares to `receiver`.
    pub(crate) fn deposit_via(
        &mut self,
        spender: Address,
        payer: Address,
        assets: u64,
        receiver: Address,
    ) -> Result<u64, VaultError> {
        let shares = self.preview_deposit(assets)?;
        if assets > 0 && shares == 0 {
            return Err(VaultError::ZeroSharesMinted { assets });
        }
        self.settle_mint(spender, payer, assets, shares, receiver)?;
        info!(%payer, %receiver, assets, shares, "vault deposit");
        Ok(shares)
    }

    /// Burns shares from several custody sources at once and pays `assets`
    /// to `receiver`. Returns the number of shares burned.
    pub(crate) fn exit_custody(
        &mut self,
        sources: &[(Address, u64)],
        receiver: Address,
        assets: u64,
    ) -> Result<u64, VaultError> {
        let total_assets = self.total_assets();
        let remaining_assets =
            total_assets
                .checked_sub(assets)
                .ok_or(VaultError::InsufficientLiquidity {
                    available: total_assets,
                    requested: assets,
                })?;

        let mut settlement = Settlement::new(remaining_assets, self.total_supply);
        let mut burned = 0u64;
        for (holder, shares) in sources {
            self.stage_debit(&mut settlement, *holder, *shares)?;
            burned = burned.checked_add(*shares).ok_or(MathError::Overflow)?;
        }
        settlement.total_supply = self
            .total_supply
            .checked_sub(burned)
            .ok_or(MathError::Overflow)?;
        settlement.payout = Some((receiver, assets));

        self.settle(settlement)?;
        Ok(burned)
    }

    /// Moves shares from several custody sources into `to`.
    pub(crate) fn move_custody(
        &mut self,
        sources: &[(Address, u64)],
        to: Address,
    ) -> Result<(), VaultError> {
        let mut settlement = Settlement::new(self.total_assets(), self.total_supply);
        let mut moved = 0u64;
        for (holder, shares) in sources {
            self.stage_debit(&mut settlement, *holder, *shares)?;
            moved = moved.checked_add(*shares).ok_or(MathError::Overflow)?;
        }
        self.stage_credit(&mut settlement, to, moved)?;

        self.settle(settlement)?;
        debug!(%to, moved, sources = sources.len(), "vault shares moved");
        Ok(())
    }

    /// Moves shares from `sources` into `to` and delegates `to`'s vault
    /// votes to `delegatee`, as one settlement.
    pub(crate) fn delegate_custody(
        &mut self,
        sources: &[(Address, u64)],
        to: Address,
        delegatee: Address,
    ) -> Result<(), VaultError> {
        let mut settlement = Settlement::new(self.total_assets(), self.total_supply);
        let mut moved = 0u64;
        for (holder, shares) in sources {
            self.stage_debit(&mut settlement, *holder, *shares)?;
            moved = moved.checked_add(*shares).ok_or(MathError::Overflow)?;
        }
        self.stage_credit(&mut settlement, to, moved)?;
        settlement.enroll = Some((to, delegatee));

        self.settle(settlement)?;
        debug!(%to, %delegatee, moved, trusted = self.trusted_of(&to), "custody delegated");
        Ok(())
    }

    // -- internals ----------------------------------------------------------

    fn settle_mint(
        &mut self,
        spender: Address,
        payer: Address,
        assets: u64,
        shares: u64,
        receiver: Address,
    ) -> Result<(), VaultError> {
        let total_assets = self
            .total_assets()
            .checked_add(assets)
            .ok_or(MathError::Overflow)?;
        let total_supply = self
            .total_supply
            .checked_add(shares)
            .ok_or(MathError::Overflow)?;

        let mut settlement = Settlement::new(total_assets, total_supply);
        self.stage_credit(&mut settlement, receiver, shares)?;
        settlement.pull = Some(Pull {
            spender,
            payer,
            amount: assets,
        });
        self.settle(settlement)
    }

    fn staged_balance(&self, settlement: &Settlement, holder: &Address) -> u64 {
        settlement
            .balances
            .get(holder)
            .copied()
            .unwrap_or_else(|| self.balance_of(holder))
    }

    fn stage_debit(
        &self,
        settlement: &mut Settlement,
        holder: Address,
        shares: u64,
    ) -> Result<(), VaultError> {
        let available = self.staged_balance(settlement, &holder);
        let remaining = available
            .checked_sub(shares)
            .ok_or(VaultError::InsufficientShares {
                holder,
                available,
                requested: shares,
            })?;
        settlement.balances.insert(holder, remaining);
        Ok(())
    }

    fn stage_credit(
        &self,
        settlement: &mut Settlement,
        holder: Address,
        shares: u64,
    ) -> Result<(), VaultError> {
        let balance = self
            .staged_balance(settlement, &holder)
            .checked_add(shares)
            .ok_or(MathError::Overflow)?;
        settlement.balances.insert(holder, balance);
        Ok(())
    }

    /// Validates and commits a staged settlement.
    fn settle(&mut self, settlement: Settlement) -> Result<(), VaultError> {
        // Trust targets are the floor value of each delegating holder's
        // post-call balance at the post-call rate.
        let mut releases = Vec::new();
        let mut funds = Vec::new();
        let enrolled = settlement.enroll.map(|(holder, _)| holder);
        for (holder, balance) in &settlement.balances {
            let trusted = match self.trustees.get(holder) {
                Some(trustee) => trustee.trusted,
                None if enrolled == Some(*holder) => 0,
                None => continue,
            };
            let target = math::convert_to_assets(
                *balance,
                settlement.total_assets,
                settlement.total_supply,
                self.offset_unit,
                Rounding::Floor,
            )?;
            if target < trusted {
                releases.push((*holder, target, trusted - target));
            } else if target > trusted {
                funds.push((*holder, target, target - trusted));
            }
        }

        let held = self.asset.balance_of(&self.address) as u128;
        let pulled = settlement.pull.map_or(0, |p| p.amount) as u128;
        let released: u128 = releases.iter().map(|r| r.2 as u128).sum();
        let paid = settlement.payout.map_or(0, |p| p.1) as u128;
        let funded: u128 = funds.iter().map(|f| f.2 as u128).sum();
        let available = held + pulled + released;
        let requested = paid + funded;
        if requested > available {
            return Err(VaultError::InsufficientLiquidity {
                available: u64::try_from(available).unwrap_or(u64::MAX),
                requested: u64::try_from(requested).unwrap_or(u64::MAX),
            });
        }

        if let Some(pull) = settlement.pull {
            self.asset
                .transfer_from(pull.spender, pull.payer, self.address, pull.amount)?;
        }

        for (holder, balance) in settlement.balances {
            if balance == 0 {
                self.balances.remove(&holder);
            } else {
                self.balances.insert(holder, balance);
            }
        }
        self.total_supply = settlement.total_supply;

        if let Some((holder, delegatee)) = settlement.enroll {
            let address = self.trustee_address(&holder);
            let trustee = self.trustees.entry(holder).or_insert(VaultTrustee {
                address,
                delegatee,
                trusted: 0,
            });
            trustee.delegatee = delegatee;
            self.asset.delegate(address, delegatee);
        }

        // Releases land before the payout so a delegating holder's own
        // trusted assets are spendable by its exit.
        for (holder, target, _) in releases {
            self.rebalance(holder, target)?;
        }
        if let Some((receiver, assets)) = settlement.payout {
            self.asset.transfer(self.address, receiver, assets)?;
        }
        for (holder, target, _) in funds {
            self.rebalance(holder, target)?;
        }
        Ok(())
    }

    /// Moves assets between the vault and `holder`'s trustee until the
    /// trustee holds exactly `target`.
    fn rebalance(&mut self, holder: Address, target: u64) -> Result<(), VaultError> {
        let Some(trustee) = self.trustees.get(&holder) else {
            return Ok(());
        };
        let (trustee_address, trusted) = (trustee.address, trustee.trusted);

        if target > trusted {
            self.mark_trusted(trustee_address, target - trusted)?;
        } else if target < trusted {
            self.release_trusted(trustee_address, trusted - target)?;
        } else {
            return Ok(());
        }

        if let Some(trustee) = self.trustees.get_mut(&holder) {
            trustee.trusted = target;
        }
        debug!(
            %holder,
            trusted = target,
            total_trusted = self.total_trusted,
            "trust re-synchronised"
        );
        Ok(())
    }

    fn mark_trusted(&mut self, trustee: Address, assets: u64) -> Result<(), VaultError> {
        self.asset.transfer(self.address, trustee, assets)?;
        // Trusted assets come out of the vault's own balance, so the sum
        // stays below the asset supply.
        self.total_trusted += assets;
        Ok(())
    }

    fn release_trusted(&mut self, trustee: Address, assets: u64) -> Result<(), VaultError> {
        self.asset.transfer(trustee, self.address, assets)?;
        self.total_trusted -= assets;
        Ok(())
    }

    fn ensure_spend(
        &self,
        owner: &Address,
        spender: &Address,
        shares: u64,
    ) -> Result<(), VaultError> {
        if owner == spender {
            return Ok(());
        }
        let available = self.allowance(owner, spender);
        if available < shares {
            return Err(VaultError::InsufficientAllowance {
                owner: *owner,
                spender: *spender,
                available,
                requested: shares,
            });
        }
        Ok(())
    }

    fn consume_spend(&mut self, owner: Address, spender: Address, shares: u64) {
        if owner == spender {
            return;
        }
        let available = self.allowance(&owner, &spender);
        if available != UNLIMITED_ALLOWANCE {
            self.approve(owner, spender, available.saturating_sub(shares));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
