//! # Tranche Portal
//!
//! The process-wide ledger object. It owns one [`ExchangeVault`] and wraps
//! every deposit into it as a tranche:
//!
//! ```text
//!                         ┌──────────────────────────────┐
//!   deposit ─────────────►│ TrancheLedger  owner/id → n  │
//!                         └──────────────┬───────────────┘
//!                                        │ backing vault shares
//!                      ┌─────────────────┴────────────────┐
//!                      ▼                                  ▼
//!              portal pool (shared)            trustee(owner) (delegated)
//! ```
//!
//! Before the cliff a tranche can be withdrawn or redeemed against the
//! vault. From the cliff onwards it can only be transformed into freely
//! held vault shares. Custody is pooled: the ledger tracks who owns what,
//! the pool and trustees hold the actual vault shares, and
//!
//! ```text
//! Σ total_balance(o) == vault.balance_of(pool) + Σ vault.balance_of(trustee(o))
//! ```
//!
//! holds after every operation.
//!
//! Every entry point validates fully before its first write and then
//! performs exactly one vault settlement, so a failed call leaves the whole
//! ledger (vault and base asset included) unchanged.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use portal_protocol::asset::{AssetError, BaseAsset};
use portal_protocol::chain::{BlockClock, ClockError};
use portal_protocol::config::{ConfigError, PortalConfig, PORTAL_DOMAIN};
use portal_protocol::identity::Address;

use crate::allowance::{AllowanceError, AllowanceStore};
use crate::maturity::{Maturity, MaturityError, MaturityGate};
use crate::tranche::{LedgerError, TrancheId, TrancheLedger};
use crate::trustee::{Trustee, TrusteeError, TrusteeRegistry};
use crate::vault::{ExchangeVault, VaultError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Coarse classification of a [`PortalError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Operation not allowed in the current maturity state.
    Maturity,
    /// Caller is neither the owner nor holds enough allowance.
    Authorization,
    /// A ledger entry, custody balance or vault balance is too small.
    InsufficientBalance,
    /// Overflow, division by zero or a conversion rounding to zero.
    Arithmetic,
    /// Invalid configuration or clock movement.
    Configuration,
    /// The base asset refused a transfer for another reason.
    Asset,
}

impl ErrorKind {
    /// Stable snake_case label, used for metrics and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Maturity => "maturity",
            ErrorKind::Authorization => "authorization",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::Arithmetic => "arithmetic",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Asset => "asset",
        }
    }
}

/// Errors from portal operations.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Maturity gate refused the operation.
    #[error(transparent)]
    Maturity(#[from] MaturityError),

    /// Tranche accounting error.
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    /// Tranche allowance too small.
    #[error("allowance: {0}")]
    Allowance(#[from] AllowanceError),

    /// Trustee custody error.
    #[error("trustee: {0}")]
    Trustee(#[from] TrusteeError),

    /// Vault error.
    #[error("vault: {0}")]
    Vault(#[from] VaultError),

    /// Configuration error.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// Clock error.
    #[error("clock: {0}")]
    Clock(#[from] ClockError),

    /// A deposit carried no assets.
    #[error("deposit of zero assets")]
    EmptyDeposit,

    /// Vault shares may not be sent into the portal's own custody.
    #[error("{account} is a portal custody account")]
    CustodyAccount {
        /// The refused account.
        account: Address,
    },
}

impl PortalError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PortalError::Maturity(_) => ErrorKind::Maturity,
            PortalError::Ledger(LedgerError::InsufficientBalance { .. }) => {
                ErrorKind::InsufficientBalance
            }
            PortalError::Ledger(LedgerError::Overflow { .. }) => ErrorKind::Arithmetic,
            PortalError::Allowance(_) => ErrorKind::Authorization,
            PortalError::Trustee(TrusteeError::InsufficientCustody { .. }) => {
                ErrorKind::InsufficientBalance
            }
            PortalError::Trustee(TrusteeError::Overflow { .. }) => ErrorKind::Arithmetic,
            PortalError::Vault(err) => match err {
                VaultError::Math(_)
                | VaultError::ZeroSharesMinted { .. }
                | VaultError::ZeroAssetsRedeemed { .. } => ErrorKind::Arithmetic,
                VaultError::InsufficientShares { .. }
                | VaultError::InsufficientLiquidity { .. } => ErrorKind::InsufficientBalance,
                VaultError::InsufficientAllowance { .. } => ErrorKind::Authorization,
                VaultError::Asset(AssetError::InsufficientAllowance { .. }) => {
                    ErrorKind::Authorization
                }
                VaultError::Asset(AssetError::InsufficientBalance { .. }) => {
                    ErrorKind::InsufficientBalance
                }
                VaultError::Asset(_) => ErrorKind::Asset,
                VaultError::Config(_) => ErrorKind::Configuration,
            },
            PortalError::Config(_) => ErrorKind::Configuration,
            PortalError::Clock(ClockError::Overflow { .. }) => ErrorKind::Arithmetic,
            PortalError::Clock(ClockError::Regression { .. }) => ErrorKind::Configuration,
            PortalError::EmptyDeposit => ErrorKind::Arithmetic,
            PortalError::CustodyAccount { .. } => ErrorKind::Authorization,
        }
    }

    /// The tranche a maturity error refers to.
    pub fn tranche(&self) -> Option<TrancheId> {
        match self {
            PortalError::Maturity(err) => Some(err.tranche()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Portal
// ---------------------------------------------------------------------------

/// Tranche ledger over an exchange vault of `A`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Portal<A> {
    address: Address,
    config: PortalConfig,
    gate: MaturityGate,
    clock: BlockClock,
    vault: ExchangeVault<A>,
    ledger: TrancheLedger,
    allowances: AllowanceStore,
    trustees: TrusteeRegistry,
}

impl<A: BaseAsset> Portal<A> {
    /// Builds the ledger from a validated configuration and the base asset
    /// it names.
    pub fn new(config: PortalConfig, asset: A) -> Result<Self, PortalError> {
        config.validate()?;
        if asset.address() != config.asset {
            return Err(ConfigError::AssetMismatch {
                configured: config.asset,
                supplied: asset.address(),
            }
            .into());
        }

        let vault = ExchangeVault::new(asset, config.decimals_offset)?;
        let address = Address::derive(PORTAL_DOMAIN, &[&vault.address()]);

        info!(
            portal = %address,
            vault = %vault.address(),
            asset = %config.asset,
            cliff = config.cliff,
            decimals_offset = config.decimals_offset,
            "portal created"
        );

        Ok(Self {
            address,
            gate: MaturityGate::new(config.cliff),
            clock: BlockClock::new(config.start_height),
            config,
            vault,
            ledger: TrancheLedger::new(),
            allowances: AllowanceStore::new(),
            trustees: TrusteeRegistry::new(address),
        })
    }

    // -- configuration ------------------------------------------------------

    /// The portal's own address, which is also the shared custody pool.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Base asset address.
    pub fn asset_address(&self) -> Address {
        self.config.asset
    }

    /// Vault address.
    pub fn vault_address(&self) -> Address {
        self.vault.address()
    }

    /// Decimal offset of the vault.
    pub fn decimals_offset(&self) -> u8 {
        self.vault.decimals_offset()
    }

    /// `10^decimals_offset`.
    pub fn offset_unit(&self) -> u64 {
        self.vault.offset_unit()
    }

    /// Maturity height.
    pub fn cliff(&self) -> u64 {
        self.gate.cliff()
    }

    /// The configuration the portal was built from.
    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// The vault, for read access.
    pub fn vault(&self) -> &ExchangeVault<A> {
        &self.vault
    }

    /// The vault, for free-share holders and donations.
    pub fn vault_mut(&mut self) -> &mut ExchangeVault<A> {
        &mut self.vault
    }

    /// The tranche ledger.
    pub fn ledger(&self) -> &TrancheLedger {
        &self.ledger
    }

    // -- clock --------------------------------------------------------------

    /// Current height.
    pub fn height(&self) -> u64 {
        self.clock.height()
    }

    /// Current maturity state.
    pub fn maturity(&self) -> Maturity {
        self.gate.state_at(self.clock.height())
    }

    /// Mines `blocks` blocks.
    pub fn mine(&mut self, blocks: u64) -> Result<u64, PortalError> {
        let before = self.maturity();
        let height = self.clock.advance(blocks)?;
        self.log_transition(before);
        Ok(height)
    }

    /// Moves the clock to `height`; going backwards is refused.
    pub fn advance_to(&mut self, height: u64) -> Result<u64, PortalError> {
        let before = self.maturity();
        let height = self.clock.advance_to(height)?;
        self.log_transition(before);
        Ok(height)
    }

    fn log_transition(&self, before: Maturity) {
        if before != self.maturity() {
            info!(height = self.height(), cliff = self.cliff(), "tranches matured");
        }
    }

    // -- queries ------------------------------------------------------------

    /// Shares `owner` holds in tranche `id`.
    pub fn balance_of(&self, owner: &Address, id: &TrancheId) -> u64 {
        self.ledger.balance_of(owner, id)
    }

    /// Sum of `owner`'s tranche balances.
    pub fn total_balance(&self, owner: &Address) -> u64 {
        self.ledger.total_balance(owner)
    }

    /// Every tranche `owner` has held.
    pub fn tranches_of(&self, owner: &Address) -> Vec<(TrancheId, u64)> {
        self.ledger.tranches_of(owner)
    }

    /// Vault shares custodied by `owner`'s trustee.
    pub fn trustee_balance(&self, owner: &Address) -> u64 {
        self.trustees.balance_of(owner)
    }

    /// `owner`'s trustee, if it ever delegated.
    pub fn trustee_of(&self, owner: &Address) -> Option<&Trustee> {
        self.trustees.trustee_of(owner)
    }

    /// The trustee registry.
    pub fn trustees(&self) -> &TrusteeRegistry {
        &self.trustees
    }

    /// Remaining allowance of `spender` over `owner`'s tranche `id`.
    pub fn allowance(&self, owner: &Address, spender: &Address, id: &TrancheId) -> u64 {
        self.allowances.allowance(owner, spender, id)
    }

    /// Shares a deposit of `assets` would be credited.
    pub fn preview_deposit(&self, assets: u64) -> Result<u64, PortalError> {
        Ok(self.vault.preview_deposit(assets)?)
    }

    /// Tranche shares debited to withdraw `assets` from `id` at the current
    /// rate. Ignores maturity.
    pub fn preview_withdraw(&self, id: &TrancheId, assets: u64) -> Result<u64, PortalError> {
        tracing::trace!(%id, assets, "preview withdraw");
        Ok(self.vault.preview_withdraw(assets)?)
    }

    /// Assets paid for redeeming `shares` of `id` at the current rate.
    /// Ignores maturity.
    pub fn preview_redeem(&self, id: &TrancheId, shares: u64) -> Result<u64, PortalError> {
        tracing::trace!(%id, shares, "preview redeem");
        Ok(self.vault.preview_redeem(shares)?)
    }

    /// Largest withdrawal `owner` can make from `id` right now.
    pub fn max_withdraw(&self, owner: &Address, id: &TrancheId) -> Result<u64, PortalError> {
        match self.maturity() {
            Maturity::Matured => Ok(0),
            Maturity::Immature => Ok(self.vault.preview_redeem(self.balance_of(owner, id))?),
        }
    }

    /// Largest redemption `owner` can make from `id` right now.
    pub fn max_redeem(&self, owner: &Address, id: &TrancheId) -> u64 {
        match self.maturity() {
            Maturity::Matured => 0,
            Maturity::Immature => self.balance_of(owner, id),
        }
    }

    // -- entry points -------------------------------------------------------

    /// Deposits `assets` from `caller` into a new tranche owned by
    /// `receiver`. `caller` must have approved the portal on the base asset.
    ///
    /// The id and share count are both taken from the vault state before
    /// the mint. Zero deposits are refused since they leave that state, and
    /// so the next id, unchanged.
    pub fn deposit(
        &mut self,
        caller: Address,
        assets: u64,
        receiver: Address,
    ) -> Result<(TrancheId, u64), PortalError> {
        if assets == 0 {
            return Err(PortalError::EmptyDeposit);
        }
        let id = TrancheId::new(
            self.height(),
            self.vault.total_assets(),
            self.vault.total_supply(),
        );
        let shares = self.vault.preview_deposit(assets)?;
        self.ledger.ensure_credit(&receiver, &id, shares)?;
        let reused = self.ledger.is_minted(&id);

        let minted = self
            .vault
            .deposit_via(self.address, caller, assets, self.address)?;
        self.ledger.credit(receiver, id, minted)?;

        if reused {
            warn!(%id, %receiver, "tranche id reused; deposit merged into existing key");
        }
        info!(%id, %caller, %receiver, assets, shares = minted, "tranche deposited");
        Ok((id, minted))
    }

    /// Withdraws exactly `assets` from tranche `id` of `owner` to
    /// `receiver`, before the cliff only. Returns the shares debited.
    pub fn withdraw(
        &mut self,
        caller: Address,
        id: TrancheId,
        assets: u64,
        receiver: Address,
        owner: Address,
    ) -> Result<u64, PortalError> {
        self.gate.require_immature(self.height(), id)?;
        let shares = self.vault.preview_withdraw(assets)?;
        self.exit(caller, id, shares, assets, receiver, owner)?;

        info!(%id, %caller, %owner, %receiver, assets, shares, "tranche withdrawn");
        Ok(shares)
    }

    /// Redeems `shares` of tranche `id` of `owner`, paying `receiver`,
    /// before the cliff only. Returns the assets paid.
    pub fn redeem(
        &mut self,
        caller: Address,
        id: TrancheId,
        shares: u64,
        receiver: Address,
        owner: Address,
    ) -> Result<u64, PortalError> {
        self.gate.require_immature(self.height(), id)?;
        let assets = self.vault.preview_redeem(shares)?;
        if shares > 0 && assets == 0 {
            return Err(VaultError::ZeroAssetsRedeemed { shares }.into());
        }
        self.exit(caller, id, shares, assets, receiver, owner)?;

        info!(%id, %caller, %owner, %receiver, assets, shares, "tranche redeemed");
        Ok(assets)
    }

    /// Converts `shares` of matured tranche `id` of `owner` into free vault
    /// shares held by `receiver`, which must not be the pool or a trustee.
    pub fn transform(
        &mut self,
        caller: Address,
        id: TrancheId,
        shares: u64,
        receiver: Address,
        owner: Address,
    ) -> Result<(), PortalError> {
        self.gate.require_matured(self.height(), id)?;
        self.ensure_free_receiver(&receiver, &[&caller, &owner])?;
        self.ensure_authorised(&caller, &owner, &id, shares)?;
        self.ledger.ensure_debit(&owner, &id, shares)?;

        let (from_trustee, sources) = self.custody_sources(&owner, shares);
        self.vault.move_custody(&sources, receiver)?;

        self.ledger.debit(owner, id, shares)?;
        self.trustees.release(owner, from_trustee)?;
        self.consume_authorisation(caller, owner, id, shares)?;

        info!(%id, %caller, %owner, %receiver, shares, from_trustee, "tranche transformed");
        Ok(())
    }

    /// Reassigns `shares` of tranche `id` from `caller` to `to`.
    pub fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        id: TrancheId,
        shares: u64,
    ) -> Result<(), PortalError> {
        self.reassign(caller, caller, to, id, shares)
    }

    /// Reassigns `shares` of tranche `id` from `from` to `to` using
    /// `caller`'s allowance.
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        id: TrancheId,
        shares: u64,
    ) -> Result<(), PortalError> {
        self.reassign(caller, from, to, id, shares)
    }

    /// Sets `spender`'s allowance over `caller`'s tranche `id`.
    pub fn approve(&mut self, caller: Address, spender: Address, id: TrancheId, shares: u64) {
        self.allowances.approve(caller, spender, id, shares);
        info!(%id, owner = %caller, %spender, shares, "tranche allowance set");
    }

    /// Moves every share of `caller`'s not yet in its trustee into it and
    /// points the trustee's votes at `target`.
    pub fn delegate(&mut self, caller: Address, target: Address) -> Result<(), PortalError> {
        let total = self.ledger.total_balance(&caller);
        let held = self.trustees.balance_of(&caller);
        let delta = total.saturating_sub(held);
        self.trustees.ensure_record(&caller, delta)?;

        // A trustee starts out empty; shares parked at its address beforehand
        // would have no ledger entry behind them.
        let trustee = self.trustees.address_for(&caller);
        if self.trustees.trustee_of(&caller).is_none() && self.vault.balance_of(&trustee) > 0 {
            return Err(PortalError::CustodyAccount { account: trustee });
        }
        self.vault
            .delegate_custody(&[(self.address, delta)], trustee, target)?;
        self.trustees.record_delegation(caller, target, delta)?;

        info!(
            owner = %caller,
            %target,
            %trustee,
            moved = delta,
            custodied = held + delta,
            "tranche votes delegated"
        );
        Ok(())
    }

    // -- internals ----------------------------------------------------------

    /// Splits an outflow of `owner`'s shares into vault custody sources,
    /// trustee first. Returns the trustee's part and the sources.
    fn custody_sources(&self, owner: &Address, shares: u64) -> (u64, Vec<(Address, u64)>) {
        let (from_trustee, from_pool) = self.trustees.custody_split(owner, shares);
        let mut sources = Vec::with_capacity(2);
        if from_trustee > 0 {
            sources.push((self.trustees.address_for(owner), from_trustee));
        }
        if from_pool > 0 {
            sources.push((self.address, from_pool));
        }
        (from_trustee, sources)
    }

    fn exit(
        &mut self,
        caller: Address,
        id: TrancheId,
        shares: u64,
        assets: u64,
        receiver: Address,
        owner: Address,
    ) -> Result<(), PortalError> {
        self.ensure_authorised(&caller, &owner, &id, shares)?;
        self.ledger.ensure_debit(&owner, &id, shares)?;

        let (from_trustee, sources) = self.custody_sources(&owner, shares);
        self.vault.exit_custody(&sources, receiver, assets)?;

        self.ledger.debit(owner, id, shares)?;
        self.trustees.release(owner, from_trustee)?;
        self.consume_authorisation(caller, owner, id, shares)
    }

    fn reassign(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        id: TrancheId,
        shares: u64,
    ) -> Result<(), PortalError> {
        self.ensure_authorised(&caller, &from, &id, shares)?;
        self.ledger.ensure_debit(&from, &id, shares)?;
        if from != to {
            self.ledger.ensure_credit(&to, &id, shares)?;
        }

        // The sender's trustee may not custody more than the sender still
        // owns; the excess returns to the pool.
        let remaining = if from == to {
            self.ledger.total_balance(&from)
        } else {
            self.ledger.total_balance(&from) - shares
        };
        let excess = self.trustees.balance_of(&from).saturating_sub(remaining);
        if excess > 0 {
            let trustee = self.trustees.address_for(&from);
            self.vault.move_custody(&[(trustee, excess)], self.address)?;
        }

        self.ledger.transfer(from, to, id, shares)?;
        self.trustees.release(from, excess)?;
        self.consume_authorisation(caller, from, id, shares)?;

        info!(%id, %caller, %from, %to, shares, returned_to_pool = excess, "tranche transferred");
        Ok(())
    }

    /// Refuses the pool, any existing trustee, and the trustee addresses of
    /// `owners` as a destination for freed vault shares.
    fn ensure_free_receiver(
        &self,
        receiver: &Address,
        owners: &[&Address],
    ) -> Result<(), PortalError> {
        let derived = owners
            .iter()
            .any(|owner| self.trustees.address_for(owner) == *receiver);
        if derived || self.trustees.is_custody_account(receiver) {
            return Err(PortalError::CustodyAccount { account: *receiver });
        }
        Ok(())
    }

    fn ensure_authorised(
        &self,
        caller: &Address,
        owner: &Address,
        id: &TrancheId,
        shares: u64,
    ) -> Result<(), PortalError> {
        if caller != owner {
            self.allowances.ensure(owner, caller, id, shares)?;
        }
        Ok(())
    }

    fn consume_authorisation(
        &mut self,
        caller: Address,
        owner: Address,
        id: TrancheId,
        shares: u64,
    ) -> Result<(), PortalError> {
        if caller != owner {
            self.allowances.consume(owner, caller, id, shares)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
