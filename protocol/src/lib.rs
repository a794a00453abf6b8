// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Portal Protocol: Shared Primitives
//!
//! Everything the tranche portal needs that is not the ledger itself:
//! account handles, the block clock that drives maturity, configuration,
//! and the interface to the base asset that the vault wraps.
//!
//! ## Architecture
//!
//! - **identity**: 20-byte account handles and deterministic derivation of
//!   custody addresses (vault, portal, trustees).
//! - **chain**: the forward-only block clock. Maturity is a function of
//!   height, so the clock is the one thing that must never go backwards.
//! - **config**: constants and the deployment configuration.
//! - **asset**: the `BaseAsset` trait and an in-memory voting token that
//!   implements it for tests, demos and the scenario runner.
//!
//! ## Design Philosophy
//!
//! 1. All amounts are `u64` smallest units. No floats, anywhere.
//! 2. Every fallible operation returns a typed error; nothing panics on
//!    user input.
//! 3. Every piece of state is serde-serializable so a whole ledger can be
//!    snapshotted to JSON.

pub mod asset;
pub mod chain;
pub mod config;
pub mod identity;

pub use asset::{AssetError, BaseAsset, VotingToken};
pub use chain::{BlockClock, ClockError};
pub use config::{ConfigError, PortalConfig};
pub use identity::{Address, AddressError};
