//! # Portal Configuration & Constants
//!
//! Every magic number in the portal lives here. The deployment-time knobs
//! (cliff height, base asset, decimal offset) are collected in
//! [`PortalConfig`], which is validated once when the ledger is built and
//! never changes afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Address;

/// Version of the ledger semantics, bumped on any change to rounding or
/// custody rules.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Exchange-rate parameters
// ---------------------------------------------------------------------------

/// Default decimal offset between the base asset and vault shares.
///
/// The virtual share offset is `10^offset`; with 6 an empty vault mints
/// one million shares per unit of asset, which keeps donation attacks on a
/// near-empty vault unprofitable.
pub const DEFAULT_DECIMALS_OFFSET: u8 = 6;

/// Largest accepted decimal offset. `10^12` virtual shares on top of any
/// realistic supply still fits comfortably in `u64`.
pub const MAX_DECIMALS_OFFSET: u8 = 12;

/// Virtual assets added to `total_assets` in every rate computation.
pub const VIRTUAL_ASSETS: u64 = 1;

/// Prefix prepended to the base asset's name and symbol to name the vault
/// share token (`Nofee` becomes `XNofee` / `XNOFEE`).
pub const VAULT_NAME_PREFIX: &str = "X";

/// Allowance value treated as unlimited; never decremented on use.
pub const UNLIMITED_ALLOWANCE: u64 = u64::MAX;

// ---------------------------------------------------------------------------
// Address derivation domains
// ---------------------------------------------------------------------------

/// Domain for addresses derived from human-readable labels.
pub const LABEL_DOMAIN: &str = "tranche-portal/label";

/// Domain for the vault address (parent: base asset).
pub const VAULT_DOMAIN: &str = "tranche-portal/vault";

/// Domain for the portal address, which is also the shared custody pool
/// (parent: vault).
pub const PORTAL_DOMAIN: &str = "tranche-portal/portal";

/// Domain for per-owner portal trustees (parents: portal, owner).
pub const PORTAL_TRUSTEE_DOMAIN: &str = "tranche-portal/portal-trustee";

/// Domain for per-holder vault trustees (parents: vault, holder).
pub const VAULT_TRUSTEE_DOMAIN: &str = "tranche-portal/vault-trustee";

// ---------------------------------------------------------------------------
// PortalConfig
// ---------------------------------------------------------------------------

/// Errors from validating or loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The decimal offset is above [`MAX_DECIMALS_OFFSET`].
    #[error("decimals offset {got} exceeds maximum {max}")]
    OffsetTooLarge {
        /// Offset supplied.
        got: u8,
        /// Maximum accepted.
        max: u8,
    },

    /// The base asset address is the zero address.
    #[error("base asset address must not be zero")]
    ZeroAsset,

    /// The cliff is not after the starting height, so every tranche would
    /// be born matured.
    #[error("cliff {cliff} must be above the start height {start_height}")]
    CliffNotInFuture {
        /// Configured cliff.
        cliff: u64,
        /// Configured start height.
        start_height: u64,
    },

    /// The asset handed to the ledger does not match the configured one.
    #[error("asset mismatch: configured {configured}, supplied {supplied}")]
    AssetMismatch {
        /// Address in the configuration.
        configured: Address,
        /// Address of the asset implementation.
        supplied: Address,
    },

    /// The configuration document could not be parsed.
    #[error("malformed config: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Deployment configuration of a portal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Height at which every tranche matures.
    pub cliff: u64,
    /// Address of the base asset.
    pub asset: Address,
    /// Decimal offset between asset and shares.
    #[serde(default = "default_decimals_offset")]
    pub decimals_offset: u8,
    /// Height of the clock when the ledger is created.
    #[serde(default)]
    pub start_height: u64,
}

fn default_decimals_offset() -> u8 {
    DEFAULT_DECIMALS_OFFSET
}

impl PortalConfig {
    /// Config with the default offset and a clock starting at zero.
    pub fn new(cliff: u64, asset: Address) -> Self {
        Self {
            cliff,
            asset,
            decimals_offset: DEFAULT_DECIMALS_OFFSET,
            start_height: 0,
        }
    }

    /// Overrides the decimal offset.
    pub fn with_decimals_offset(mut self, decimals_offset: u8) -> Self {
        self.decimals_offset = decimals_offset;
        self
    }

    /// Overrides the starting height.
    pub fn with_start_height(mut self, start_height: u64) -> Self {
        self.start_height = start_height;
        self
    }

    /// Checks the configuration for values the ledger cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decimals_offset > MAX_DECIMALS_OFFSET {
            return Err(ConfigError::OffsetTooLarge {
                got: self.decimals_offset,
                max: MAX_DECIMALS_OFFSET,
            });
        }
        if self.asset.is_zero() {
            return Err(ConfigError::ZeroAsset);
        }
        if self.cliff <= self.start_height {
            return Err(ConfigError::CliffNotInFuture {
                cliff: self.cliff,
                start_height: self.start_height,
            });
        }
        Ok(())
    }

    /// The virtual share offset, `10^decimals_offset`.
    pub fn offset_unit(&self) -> Result<u64, ConfigError> {
        offset_unit(self.decimals_offset)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: PortalConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// `10^decimals_offset`, rejecting offsets above [`MAX_DECIMALS_OFFSET`].
pub fn offset_unit(decimals_offset: u8) -> Result<u64, ConfigError> {
    if decimals_offset > MAX_DECIMALS_OFFSET {
        return Err(ConfigError::OffsetTooLarge {
            got: decimals_offset,
            max: MAX_DECIMALS_OFFSET,
        });
    }
    Ok(10u64.pow(decimals_offset as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> Address {
        Address::from_label("nofee")
    }

    #[test]
    fn default_config_is_valid() {
        let config = PortalConfig::new(100, asset());
        assert!(config.validate().is_ok());
        assert_eq!(config.offset_unit().unwrap(), 1_000_000);
    }

    #[test]
    fn offset_bounds() {
        assert_eq!(offset_unit(0).unwrap(), 1);
        assert_eq!(offset_unit(MAX_DECIMALS_OFFSET).unwrap(), 1_000_000_000_000);
        assert!(matches!(
            offset_unit(MAX_DECIMALS_OFFSET + 1).unwrap_err(),
            ConfigError::OffsetTooLarge { .. }
        ));
    }

    #[test]
    fn zero_asset_rejected() {
        let config = PortalConfig::new(100, Address::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroAsset)));
    }

    #[test]
    fn cliff_must_be_in_future() {
        let config = PortalConfig::new(100, asset()).with_start_height(100);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CliffNotInFuture {
                cliff: 100,
                start_height: 100
            })
        ));
    }

    #[test]
    fn json_defaults_fill_in_offset_and_start() {
        let json = format!("{{\"cliff\": 50, \"asset\": \"{}\"}}", asset());
        let config = PortalConfig::from_json_str(&json).unwrap();
        assert_eq!(config.decimals_offset, DEFAULT_DECIMALS_OFFSET);
        assert_eq!(config.start_height, 0);
        assert_eq!(config.cliff, 50);
    }

    #[test]
    fn json_roundtrip_preserves_fields() {
        let config = PortalConfig::new(500, asset())
            .with_decimals_offset(3)
            .with_start_height(7);
        let json = config.to_json_pretty().unwrap();
        assert_eq!(PortalConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(
            PortalConfig::from_json_str("{not json"),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn derivation_domains_are_distinct() {
        let domains = [
            LABEL_DOMAIN,
            VAULT_DOMAIN,
            PORTAL_DOMAIN,
            PORTAL_TRUSTEE_DOMAIN,
            VAULT_TRUSTEE_DOMAIN,
        ];
        for (i, a) in domains.iter().enumerate() {
            for b in &domains[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
