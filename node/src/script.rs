//! # Scenario Scripts
//!
//! A script describes a base asset, the portal settings, and an ordered
//! list of steps. The [`Runner`] builds a fresh [`Portal`] over an
//! in-memory [`VotingToken`], applies every step in order, and keeps going
//! when a step fails so that expected failures (maturity gates, missing
//! allowances) can be part of a scenario.
//!
//! ## Accounts
//!
//! Accounts are named by label. `0x`-prefixed strings are parsed as hex
//! and any other label is hashed into an address with
//! [`Address::from_label`]. `portal` (alias `pool`) and `vault` name the
//! deployment's own addresses and are only accepted where an account is
//! authorised or voted for: `spender`, `target` and `delegatee`. Every
//! field that holds or moves value refuses them, along with any trustee
//! address, however they are spelled.
//!
//! ## Tranches
//!
//! A deposit can store its tranche id under a slot name with `"as"`; the
//! most recent deposit is always available as `last`. Steps that take a
//! tranche accept either a slot name or a literal `height:assets:supply`
//! id.
//!
//! ```json
//! {
//!   "portal": { "cliff": 100 },
//!   "asset": { "balances": { "alice": 1000000 } },
//!   "steps": [
//!     { "op": "approve", "owner": "alice", "amount": "all" },
//!     { "op": "deposit", "caller": "alice", "amount": 10000, "as": "first" },
//!     { "op": "advance_to", "height": 100 },
//!     { "op": "transform", "caller": "alice", "tranche": "first", "shares": "all" }
//!   ]
//! }
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use portal_contracts::{Maturity, Portal, PortalError, TrancheId, VaultError};
use portal_protocol::asset::{AssetError, BaseAsset, VotingToken};
use portal_protocol::config::{PortalConfig, DEFAULT_DECIMALS_OFFSET, PROTOCOL_VERSION};
use portal_protocol::identity::Address;

use crate::metrics::{gauge_value, RunMetrics};

/// Slot that always holds the id of the most recent successful deposit.
pub const LAST_SLOT: &str = "last";

/// Error kind reported for failures in the script itself rather than the
/// ledger (unknown slots, malformed addresses).
pub const SCRIPT_ERROR_KIND: &str = "script";

// ---------------------------------------------------------------------------
// Script document
// ---------------------------------------------------------------------------

/// A complete scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    /// Portal settings, used unless a configuration file overrides them.
    #[serde(default)]
    pub portal: PortalSettings,
    /// The base asset and its initial holders.
    #[serde(default)]
    pub asset: AssetSpec,
    /// Steps, applied in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    /// Parses a script document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("malformed scenario script")
    }
}

/// Portal settings embedded in a script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSettings {
    pub cliff: u64,
    pub decimals_offset: u8,
    pub start_height: u64,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            cliff: 100,
            decimals_offset: DEFAULT_DECIMALS_OFFSET,
            start_height: 0,
        }
    }
}

impl PortalSettings {
    /// Configuration for a portal over the asset at `asset`.
    pub fn to_config(&self, asset: Address) -> PortalConfig {
        PortalConfig::new(self.cliff, asset)
            .with_decimals_offset(self.decimals_offset)
            .with_start_height(self.start_height)
    }
}

/// The base asset of a scenario. Its address is derived from the symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSpec {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Initial balances, minted before the first step.
    pub balances: BTreeMap<String, u64>,
}

impl Default for AssetSpec {
    fn default() -> Self {
        Self {
            name: "Nofee".to_string(),
            symbol: "NOFEE".to_string(),
            decimals: 18,
            balances: BTreeMap::new(),
        }
    }
}

/// An amount in a step: an exact number or `"all"`.
///
/// `"all"` means the largest sensible value for the step: the caller's
/// whole balance for spends, an unlimited allowance for approvals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Exact(u64),
    Keyword(AmountKeyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountKeyword {
    All,
}

impl Amount {
    /// Resolves the amount, substituting `all` for the keyword.
    pub fn resolve(self, all: u64) -> u64 {
        match self {
            Amount::Exact(n) => n,
            Amount::Keyword(AmountKeyword::All) => all,
        }
    }
}

fn default_spender() -> String {
    "portal".to_string()
}

fn one_block() -> u64 {
    1
}

/// One scenario step.
///
/// Optional `receiver` and `owner` fields default to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Mints base-asset tokens to `to`.
    Mint { to: String, amount: u64 },
    /// Moves base-asset tokens.
    Transfer { from: String, to: String, amount: u64 },
    /// Sets a base-asset allowance. The spender defaults to the portal.
    Approve {
        owner: String,
        #[serde(default = "default_spender")]
        spender: String,
        amount: Amount,
    },
    /// Donates base-asset tokens to the vault.
    Contribute { from: String, amount: u64 },
    /// Advances the clock by `blocks`.
    Mine {
        #[serde(default = "one_block")]
        blocks: u64,
    },
    /// Moves the clock to an absolute height.
    AdvanceTo { height: u64 },
    /// Deposits into a new tranche.
    Deposit {
        caller: String,
        amount: Amount,
        receiver: Option<String>,
        #[serde(rename = "as")]
        slot: Option<String>,
    },
    /// Withdraws an exact asset amount from an immature tranche.
    Withdraw {
        caller: String,
        tranche: String,
        amount: Amount,
        receiver: Option<String>,
        owner: Option<String>,
    },
    /// Redeems tranche shares before the cliff.
    Redeem {
        caller: String,
        tranche: String,
        shares: Amount,
        receiver: Option<String>,
        owner: Option<String>,
    },
    /// Converts matured tranche shares into vault shares.
    Transform {
        caller: String,
        tranche: String,
        shares: Amount,
        receiver: Option<String>,
        owner: Option<String>,
    },
    /// Moves tranche shares from the caller.
    TransferTranche {
        caller: String,
        to: String,
        tranche: String,
        shares: Amount,
    },
    /// Moves tranche shares on behalf of `from`.
    TransferFrom {
        caller: String,
        from: String,
        to: String,
        tranche: String,
        shares: Amount,
    },
    /// Sets a per-tranche allowance.
    ApproveTranche {
        owner: String,
        spender: String,
        tranche: String,
        shares: Amount,
    },
    /// Moves the caller's pooled shares into its trustee and delegates.
    Delegate { caller: String, target: String },
    /// Redeems free vault shares.
    VaultRedeem {
        caller: String,
        shares: Amount,
        receiver: Option<String>,
        owner: Option<String>,
    },
    /// Delegates the base-asset votes behind a holder's vault shares.
    VaultDelegate { holder: String, delegatee: String },
}

impl Step {
    /// The `op` tag of the step.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Mint { .. } => "mint",
            Step::Transfer { .. } => "transfer",
            Step::Approve { .. } => "approve",
            Step::Contribute { .. } => "contribute",
            Step::Mine { .. } => "mine",
            Step::AdvanceTo { .. } => "advance_to",
            Step::Deposit { .. } => "deposit",
            Step::Withdraw { .. } => "withdraw",
            Step::Redeem { .. } => "redeem",
            Step::Transform { .. } => "transform",
            Step::TransferTranche { .. } => "transfer_tranche",
            Step::TransferFrom { .. } => "transfer_from",
            Step::ApproveTranche { .. } => "approve_tranche",
            Step::Delegate { .. } => "delegate",
            Step::VaultRedeem { .. } => "vault_redeem",
            Step::VaultDelegate { .. } => "vault_delegate",
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Outcome of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    /// Tranche named by a maturity failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tranche: Option<TrancheId>,
}

/// Balances of one labelled account at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub address: Address,
    pub asset_balance: u64,
    pub votes: u64,
    pub vault_shares: u64,
    pub tranche_shares: u64,
    pub trustee_shares: u64,
    pub tranches: BTreeMap<String, u64>,
}

/// A named ledger property and whether it held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvariantCheck {
    pub name: &'static str,
    pub holds: bool,
}

/// Ledger state at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub height: u64,
    pub maturity: Maturity,
    pub total_assets: u64,
    pub total_supply: u64,
    pub total_trusted: u64,
    pub held_assets: u64,
    pub pool_shares: u64,
    pub custodied_shares: u64,
    pub ledger_shares: u64,
    pub accounts: BTreeMap<String, AccountSummary>,
    pub checks: Vec<InvariantCheck>,
}

impl Summary {
    /// True if every invariant check held.
    pub fn all_hold(&self) -> bool {
        self.checks.iter().all(|c| c.holds)
    }
}

/// Full report of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub version: &'static str,
    pub portal: Address,
    pub vault: Address,
    pub asset: Address,
    pub cliff: u64,
    pub failed: usize,
    pub steps: Vec<StepReport>,
    pub summary: Summary,
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Applies script steps to a portal.
pub struct Runner {
    portal: Portal<VotingToken>,
    accounts: BTreeMap<String, Address>,
    slots: BTreeMap<String, TrancheId>,
}

impl Runner {
    /// Builds the token and portal and mints the initial balances.
    ///
    /// `config` replaces the script's portal settings; its asset must be the
    /// script's token.
    pub fn new(script: &Script, config: Option<PortalConfig>) -> Result<Self> {
        let spec = &script.asset;
        let token = VotingToken::new(&spec.name, &spec.symbol, spec.decimals);
        let config = config.unwrap_or_else(|| script.portal.to_config(token.address()));
        let portal = Portal::new(config, token).context("failed to create portal")?;

        let mut runner = Self {
            portal,
            accounts: BTreeMap::new(),
            slots: BTreeMap::new(),
        };
        for (label, amount) in &spec.balances {
            let account = runner.holder(label)?;
            runner
                .asset_mut()
                .mint(account, *amount)
                .with_context(|| format!("failed to fund `{label}`"))?;
        }

        info!(
            portal = %runner.portal.address(),
            accounts = spec.balances.len(),
            "scenario initialized"
        );
        Ok(runner)
    }

    /// The portal under test.
    pub fn portal(&self) -> &Portal<VotingToken> {
        &self.portal
    }

    /// Tranche id stored under `slot`.
    pub fn slot(&self, slot: &str) -> Option<TrancheId> {
        self.slots.get(slot).copied()
    }

    /// Applies every step, recording each outcome.
    pub fn run(&mut self, steps: &[Step], metrics: &RunMetrics) -> Vec<StepReport> {
        let reports: Vec<StepReport> = steps
            .iter()
            .enumerate()
            .map(|(index, step)| self.run_step(index, step, metrics))
            .collect();
        self.observe(metrics);
        reports
    }

    /// Applies one step. Failures are reported, never propagated.
    pub fn run_step(&mut self, index: usize, step: &Step, metrics: &RunMetrics) -> StepReport {
        let op = step.name();
        let report = match self.apply(step) {
            Ok(result) => {
                debug!(index, op, %result, "step applied");
                StepReport {
                    index,
                    op,
                    ok: true,
                    result: Some(result),
                    error: None,
                    kind: None,
                    tranche: None,
                }
            }
            Err(err) => {
                let ledger_err = err.downcast_ref::<PortalError>();
                let kind = ledger_err.map_or(SCRIPT_ERROR_KIND, |e| e.kind().as_str());
                let tranche = ledger_err.and_then(PortalError::tranche);
                let error = format!("{err:#}");
                warn!(index, op, kind, error = %error, "step failed");
                StepReport {
                    index,
                    op,
                    ok: false,
                    result: None,
                    error: Some(error),
                    kind: Some(kind),
                    tranche,
                }
            }
        };
        metrics.record_step(op, report.kind);
        report
    }

    /// Sets the ledger gauges from the current state.
    pub fn observe(&self, metrics: &RunMetrics) {
        let vault = self.portal.vault();
        metrics.block_height.set(gauge_value(self.portal.height()));
        metrics
            .vault_total_assets
            .set(gauge_value(vault.total_assets()));
        metrics
            .vault_total_supply
            .set(gauge_value(vault.total_supply()));
        metrics
            .vault_total_trusted
            .set(gauge_value(vault.total_trusted()));
    }

    /// Assembles the report for the given step outcomes.
    pub fn report(&self, steps: Vec<StepReport>) -> Result<RunReport> {
        Ok(RunReport {
            version: PROTOCOL_VERSION,
            portal: self.portal.address(),
            vault: self.portal.vault_address(),
            asset: self.portal.asset_address(),
            cliff: self.portal.cliff(),
            failed: steps.iter().filter(|s| !s.ok).count(),
            steps,
            summary: self.summary()?,
        })
    }

    /// Pretty JSON snapshot of the whole ledger.
    pub fn snapshot(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.portal).context("failed to serialize ledger")
    }

    /// Final balances and invariant checks.
    pub fn summary(&self) -> Result<Summary> {
        let portal = &self.portal;
        let vault = portal.vault();
        let asset = vault.asset();

        let mut accounts = BTreeMap::new();
        for (label, address) in &self.accounts {
            let tranches = portal
                .tranches_of(address)
                .into_iter()
                .map(|(id, shares)| (id.to_string(), shares))
                .collect();
            accounts.insert(
                label.clone(),
                AccountSummary {
                    address: *address,
                    asset_balance: asset.balance_of(address),
                    votes: asset.votes(address),
                    vault_shares: vault.balance_of(address),
                    tranche_shares: portal.total_balance(address),
                    trustee_shares: portal.trustee_balance(address),
                    tranches,
                },
            );
        }

        let custodied_shares: u64 = portal
            .trustees()
            .iter()
            .map(|(_, t)| vault.balance_of(&t.address))
            .sum();
        let ledger_shares = portal
            .ledger()
            .owners()
            .map(|o| portal.total_balance(o))
            .sum();

        Ok(Summary {
            height: portal.height(),
            maturity: portal.maturity(),
            total_assets: vault.total_assets(),
            total_supply: vault.total_supply(),
            total_trusted: vault.total_trusted(),
            held_assets: asset.balance_of(&vault.address()),
            pool_shares: vault.balance_of(&portal.address()),
            custodied_shares,
            ledger_shares,
            accounts,
            checks: self.checks()?,
        })
    }

    fn checks(&self) -> Result<Vec<InvariantCheck>> {
        let portal = &self.portal;
        let vault = portal.vault();
        let asset = vault.asset();

        let partition = portal.ledger().owners().all(|o| {
            let per_tranche: u64 = portal.tranches_of(o).iter().map(|(_, s)| s).sum();
            per_tranche == portal.total_balance(o)
        });

        let trustee_bounded = portal
            .trustees()
            .iter()
            .all(|(owner, t)| t.balance <= portal.total_balance(owner));

        let solvency = vault
            .total_assets()
            .checked_sub(vault.total_trusted())
            .is_some_and(|held| held == asset.balance_of(&vault.address()));

        let ledger_shares: u128 = portal
            .ledger()
            .owners()
            .map(|o| portal.total_balance(o) as u128)
            .sum();
        let custody: u128 = vault.balance_of(&portal.address()) as u128
            + portal
                .trustees()
                .iter()
                .map(|(_, t)| vault.balance_of(&t.address) as u128)
                .sum::<u128>();
        let custody_conserved = ledger_shares == custody
            && portal
                .trustees()
                .iter()
                .all(|(_, t)| vault.balance_of(&t.address) == t.balance);

        let mut trust_bounded = true;
        for (holder, trustee) in vault.trustees() {
            let value = vault
                .convert_to_assets(vault.balance_of(holder))
                .map_err(PortalError::from)?;
            trust_bounded &=
                trustee.trusted <= value && asset.balance_of(&trustee.address) == trustee.trusted;
        }

        Ok(vec![
            InvariantCheck {
                name: "tranche_partition",
                holds: partition,
            },
            InvariantCheck {
                name: "trustee_bounded",
                holds: trustee_bounded,
            },
            InvariantCheck {
                name: "vault_solvency",
                holds: solvency,
            },
            InvariantCheck {
                name: "custody_conserved",
                holds: custody_conserved,
            },
            InvariantCheck {
                name: "trust_bounded",
                holds: trust_bounded,
            },
        ])
    }

    // -- step application -----------------------------------------------------

    fn apply(&mut self, step: &Step) -> Result<Value> {
        match step {
            Step::Mint { to, amount } => {
                let to = self.holder(to)?;
                self.asset_mut().mint(to, *amount).map_err(asset_error)?;
                Ok(json!({ "balance": self.asset().balance_of(&to) }))
            }
            Step::Transfer { from, to, amount } => {
                let from = self.holder(from)?;
                let to = self.holder(to)?;
                self.asset_mut()
                    .transfer(from, to, *amount)
                    .map_err(asset_error)?;
                Ok(json!({ "balance": self.asset().balance_of(&from) }))
            }
            Step::Approve {
                owner,
                spender,
                amount,
            } => {
                let owner = self.holder(owner)?;
                let spender = self.account(spender)?;
                let amount = amount.resolve(u64::MAX);
                self.asset_mut().approve(owner, spender, amount);
                Ok(json!({ "allowance": self.asset().allowance(&owner, &spender) }))
            }
            Step::Contribute { from, amount } => {
                let from = self.holder(from)?;
                self.portal
                    .vault_mut()
                    .contribute(from, *amount)
                    .map_err(PortalError::from)?;
                Ok(json!({ "total_assets": self.portal.vault().total_assets() }))
            }
            Step::Mine { blocks } => {
                let height = self.portal.mine(*blocks)?;
                Ok(json!({ "height": height }))
            }
            Step::AdvanceTo { height } => {
                let height = self.portal.advance_to(*height)?;
                Ok(json!({ "height": height, "maturity": self.portal.maturity() }))
            }
            Step::Deposit {
                caller,
                amount,
                receiver,
                slot,
            } => {
                let caller = self.holder(caller)?;
                let receiver = self.holder_or(receiver.as_deref(), caller)?;
                let assets = amount.resolve(self.asset().balance_of(&caller));
                let (id, shares) = self.portal.deposit(caller, assets, receiver)?;
                self.slots.insert(LAST_SLOT.to_string(), id);
                if let Some(slot) = slot {
                    self.slots.insert(slot.clone(), id);
                }
                Ok(json!({ "tranche": id, "assets": assets, "shares": shares }))
            }
            Step::Withdraw {
                caller,
                tranche,
                amount,
                receiver,
                owner,
            } => {
                let id = self.tranche(tranche)?;
                let caller = self.holder(caller)?;
                let receiver = self.holder_or(receiver.as_deref(), caller)?;
                let owner = self.holder_or(owner.as_deref(), caller)?;
                let all = self
                    .portal
                    .preview_redeem(&id, self.portal.balance_of(&owner, &id))?;
                let assets = amount.resolve(all);
                let shares = self.portal.withdraw(caller, id, assets, receiver, owner)?;
                Ok(json!({ "assets": assets, "shares": shares }))
            }
            Step::Redeem {
                caller,
                tranche,
                shares,
                receiver,
                owner,
            } => {
                let id = self.tranche(tranche)?;
                let caller = self.holder(caller)?;
                let receiver = self.holder_or(receiver.as_deref(), caller)?;
                let owner = self.holder_or(owner.as_deref(), caller)?;
                let shares = shares.resolve(self.portal.balance_of(&owner, &id));
                let assets = self.portal.redeem(caller, id, shares, receiver, owner)?;
                Ok(json!({ "assets": assets, "shares": shares }))
            }
            Step::Transform {
                caller,
                tranche,
                shares,
                receiver,
                owner,
            } => {
                let id = self.tranche(tranche)?;
                let caller = self.holder(caller)?;
                let receiver = self.holder_or(receiver.as_deref(), caller)?;
                let owner = self.holder_or(owner.as_deref(), caller)?;
                let shares = shares.resolve(self.portal.balance_of(&owner, &id));
                self.portal.transform(caller, id, shares, receiver, owner)?;
                Ok(json!({
                    "shares": shares,
                    "vault_shares": self.portal.vault().balance_of(&receiver),
                }))
            }
            Step::TransferTranche {
                caller,
                to,
                tranche,
                shares,
            } => {
                let id = self.tranche(tranche)?;
                let caller = self.holder(caller)?;
                let to = self.holder(to)?;
                let shares = shares.resolve(self.portal.balance_of(&caller, &id));
                self.portal.transfer(caller, to, id, shares)?;
                Ok(json!({ "shares": shares }))
            }
            Step::TransferFrom {
                caller,
                from,
                to,
                tranche,
                shares,
            } => {
                let id = self.tranche(tranche)?;
                let caller = self.holder(caller)?;
                let from = self.holder(from)?;
                let to = self.holder(to)?;
                let shares = shares.resolve(self.portal.balance_of(&from, &id));
                self.portal.transfer_from(caller, from, to, id, shares)?;
                Ok(json!({
                    "shares": shares,
                    "allowance": self.portal.allowance(&from, &caller, &id),
                }))
            }
            Step::ApproveTranche {
                owner,
                spender,
                tranche,
                shares,
            } => {
                let id = self.tranche(tranche)?;
                let owner = self.holder(owner)?;
                let spender = self.account(spender)?;
                self.portal
                    .approve(owner, spender, id, shares.resolve(u64::MAX));
                Ok(json!({ "allowance": self.portal.allowance(&owner, &spender, &id) }))
            }
            Step::Delegate { caller, target } => {
                let caller = self.holder(caller)?;
                let target = self.account(target)?;
                self.portal.delegate(caller, target)?;
                Ok(json!({
                    "trustee": self.portal.trustees().address_for(&caller),
                    "custodied": self.portal.trustee_balance(&caller),
                }))
            }
            Step::VaultRedeem {
                caller,
                shares,
                receiver,
                owner,
            } => {
                let caller = self.holder(caller)?;
                let receiver = self.holder_or(receiver.as_deref(), caller)?;
                let owner = self.holder_or(owner.as_deref(), caller)?;
                let shares = shares.resolve(self.portal.vault().balance_of(&owner));
                let assets = self
                    .portal
                    .vault_mut()
                    .redeem(caller, shares, receiver, owner)
                    .map_err(PortalError::from)?;
                Ok(json!({ "assets": assets, "shares": shares }))
            }
            Step::VaultDelegate { holder, delegatee } => {
                let holder = self.holder(holder)?;
                let delegatee = self.account(delegatee)?;
                self.portal
                    .vault_mut()
                    .delegate(holder, delegatee)
                    .map_err(PortalError::from)?;
                Ok(json!({ "trusted": self.portal.vault().trusted_of(&holder) }))
            }
        }
    }

    fn resolve(&self, label: &str) -> Result<Address> {
        Ok(match label {
            "portal" | "pool" => self.portal.address(),
            "vault" => self.portal.vault_address(),
            hex if hex.starts_with("0x") => Address::from_hex(hex)
                .with_context(|| format!("invalid account address `{hex}`"))?,
            other => Address::from_label(other),
        })
    }

    /// Resolves a label and remembers it for the summary.
    fn account(&mut self, label: &str) -> Result<Address> {
        let address = self.resolve(label)?;
        self.accounts.entry(label.to_string()).or_insert(address);
        Ok(address)
    }

    /// Like [`Runner::account`], for fields that hold or move value.
    fn holder(&mut self, label: &str) -> Result<Address> {
        let address = self.resolve(label)?;
        if self.is_deployment_account(&address) {
            bail!("`{label}` is a deployment account and cannot hold or move value");
        }
        self.account(label)
    }

    fn holder_or(&mut self, label: Option<&str>, fallback: Address) -> Result<Address> {
        match label {
            Some(label) => self.holder(label),
            None => Ok(fallback),
        }
    }

    /// The pool, the vault, and every portal or vault trustee.
    fn is_deployment_account(&self, address: &Address) -> bool {
        let vault = self.portal.vault();
        *address == vault.address()
            || self.portal.trustees().is_custody_account(address)
            || vault.trustees().any(|(_, t)| t.address == *address)
    }

    fn tranche(&self, reference: &str) -> Result<TrancheId> {
        if let Some(id) = self.slots.get(reference) {
            return Ok(*id);
        }
        reference
            .parse::<TrancheId>()
            .with_context(|| format!("unknown tranche `{reference}`"))
    }

    fn asset(&self) -> &VotingToken {
        self.portal.vault().asset()
    }

    fn asset_mut(&mut self) -> &mut VotingToken {
        self.portal.vault_mut().asset_mut()
    }
}

fn asset_error(err: AssetError) -> PortalError {
    PortalError::Vault(VaultError::Asset(err))
}
