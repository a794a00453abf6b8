//! # Tranche Portal Contracts
//!
//! The ledger itself. A rebasing exchange-rate vault holds the base asset;
//! a portal on top wraps each deposit as an individually tracked tranche,
//! locks tranches until a global cliff height and then lets them unlock
//! into free vault shares. Owners can route the voting weight of their
//! custodied shares to a third party without giving up ownership.
//!
//! - **math**: rounding-explicit share/asset conversion with a virtual
//!   offset.
//! - **vault**: the exchange vault, including vault-level trustees that
//!   delegate base-asset votes.
//! - **maturity**: the cliff gate.
//! - **tranche**: tranche ids and the `(owner, id) → shares` ledger.
//! - **allowance**: per-tranche spending allowances.
//! - **trustee**: per-owner custody partitions for delegation.
//! - **portal**: the entry points tying it all together.
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow. Products go through a
//!    `u128` intermediate and every rounding direction is explicit.
//! 2. Validate first, then commit. A failed call leaves every balance, the
//!    base asset's included, exactly as it was.
//! 3. State transitions are explicit: enum variants, not boolean flags.
//! 4. Every public type is serializable (serde), so a whole ledger can be
//!    snapshotted.

pub mod allowance;
pub mod math;
pub mod maturity;
pub mod portal;
pub mod tranche;
pub mod trustee;
pub mod vault;

pub use allowance::{AllowanceError, AllowanceStore};
pub use math::{MathError, Rounding};
pub use maturity::{Maturity, MaturityError, MaturityGate};
pub use portal::{ErrorKind, Portal, PortalError};
pub use tranche::{LedgerError, ParseTrancheIdError, TrancheId, TrancheLedger};
pub use trustee::{Trustee, TrusteeError, TrusteeRegistry};
pub use vault::{ExchangeVault, VaultError, VaultTrustee};
