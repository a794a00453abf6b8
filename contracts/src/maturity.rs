//! # Maturity Gate
//!
//! One global cliff height splits the portal's life in two. Before the
//! cliff tranches may be withdrawn or redeemed against the vault; from the
//! cliff onwards they may only be transformed into free vault shares.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tranche::TrancheId;

/// Maturity state of every tranche.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Maturity {
    /// Height is below the cliff.
    Immature,
    /// Height has reached the cliff.
    Matured,
}

impl std::fmt::Display for Maturity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Maturity::Immature => write!(f, "immature"),
            Maturity::Matured => write!(f, "matured"),
        }
    }
}

/// The operation is not allowed in the current maturity state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MaturityError {
    /// Transform attempted before the cliff.
    #[error("NotMatured: {0}")]
    NotMatured(TrancheId),

    /// Withdraw or redeem attempted at or after the cliff.
    #[error("Matured: {0}")]
    Matured(TrancheId),
}

impl MaturityError {
    /// The tranche the failed operation targeted.
    pub fn tranche(&self) -> TrancheId {
        match self {
            MaturityError::NotMatured(id) | MaturityError::Matured(id) => *id,
        }
    }
}

/// Decides maturity from a block height.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaturityGate {
    cliff: u64,
}

impl MaturityGate {
    /// A gate that opens at `cliff`.
    pub fn new(cliff: u64) -> Self {
        Self { cliff }
    }

    /// The cliff height.
    pub fn cliff(&self) -> u64 {
        self.cliff
    }

    /// State at `height`.
    pub fn state_at(&self, height: u64) -> Maturity {
        if height >= self.cliff {
            Maturity::Matured
        } else {
            Maturity::Immature
        }
    }

    /// Fails with [`MaturityError::Matured`] once the cliff is reached.
    pub fn require_immature(&self, height: u64, id: TrancheId) -> Result<(), MaturityError> {
        match self.state_at(height) {
            Maturity::Immature => Ok(()),
            Maturity::Matured => Err(MaturityError::Matured(id)),
        }
    }

    /// Fails with [`MaturityError::NotMatured`] before the cliff.
    pub fn require_matured(&self, height: u64, id: TrancheId) -> Result<(), MaturityError> {
        match self.state_at(height) {
            Maturity::Matured => Ok(()),
            Maturity::Immature => Err(MaturityError::NotMatured(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cliff_height_is_matured() {
        let gate = MaturityGate::new(100);
        assert_eq!(gate.state_at(0), Maturity::Immature);
        assert_eq!(gate.state_at(99), Maturity::Immature);
        assert_eq!(gate.state_at(100), Maturity::Matured);
        assert_eq!(gate.state_at(u64::MAX), Maturity::Matured);
    }

    #[test]
    fn errors_carry_tranche() {
        let gate = MaturityGate::new(10);
        let id = TrancheId::new(3, 0, 0);

        let err = gate.require_matured(9, id).unwrap_err();
        assert_eq!(err, MaturityError::NotMatured(id));
        assert_eq!(err.to_string(), "NotMatured: 3:0:0");
        assert_eq!(err.tranche(), id);

        let err = gate.require_immature(10, id).unwrap_err();
        assert_eq!(err.to_string(), "Matured: 3:0:0");

        assert!(gate.require_immature(9, id).is_ok());
        assert!(gate.require_matured(10, id).is_ok());
    }
}
