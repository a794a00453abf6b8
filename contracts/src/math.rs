//! # Exchange-Rate Math
//!
//! Share/asset conversion with a virtual offset:
//!
//! ```text
//! shares = assets × (total_supply + offset) / (total_assets + 1)
//! assets = shares × (total_assets + 1) / (total_supply + offset)
//! ```
//!
//! The `+ offset` / `+ 1` terms give an empty vault a virtual supply, so
//! there is no division by zero and a donation into a near-empty vault
//! cannot round later depositors down to nothing. Every product is taken in
//! `u128`; the rounding direction is always chosen by the caller and always
//! in the vault's favour.

use thiserror::Error;

use portal_protocol::config::VIRTUAL_ASSETS;

/// Arithmetic failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    /// A result or intermediate does not fit.
    #[error("arithmetic overflow")]
    Overflow,

    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,
}

/// Rounding direction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Rounding {
    /// Towards zero.
    Floor,
    /// Away from zero.
    Ceiling,
}

/// Computes `value × numerator / denominator` with a `u128` intermediate.
pub fn mul_div(
    value: u64,
    numerator: u64,
    denominator: u64,
    rounding: Rounding,
) -> Result<u64, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }

    let product = (value as u128) * (numerator as u128);
    let denom = denominator as u128;

    let result = match rounding {
        Rounding::Floor => product / denom,
        Rounding::Ceiling => {
            let q = product / denom;
            if product % denom == 0 {
                q
            } else {
                q + 1
            }
        }
    };

    u64::try_from(result).map_err(|_| MathError::Overflow)
}

/// Assets to shares at the rate implied by `total_assets` and `total_supply`.
pub fn convert_to_shares(
    assets: u64,
    total_assets: u64,
    total_supply: u64,
    offset_unit: u64,
    rounding: Rounding,
) -> Result<u64, MathError> {
    let virtual_shares = total_supply
        .checked_add(offset_unit)
        .ok_or(MathError::Overflow)?;
    let virtual_assets = total_assets
        .checked_add(VIRTUAL_ASSETS)
        .ok_or(MathError::Overflow)?;

    mul_div(assets, virtual_shares, virtual_assets, rounding)
}

/// Shares to assets at the rate implied by `total_assets` and `total_supply`.
pub fn convert_to_assets(
    shares: u64,
    total_assets: u64,
    total_supply: u64,
    offset_unit: u64,
    rounding: Rounding,
) -> Result<u64, MathError> {
    let virtual_shares = total_supply
        .checked_add(offset_unit)
        .ok_or(MathError::Overflow)?;
    let virtual_assets = total_assets
        .checked_add(VIRTUAL_ASSETS)
        .ok_or(MathError::Overflow)?;

    mul_div(shares, virtual_assets, virtual_shares, rounding)
}
