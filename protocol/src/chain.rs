//! # Block Clock
//!
//! The portal's notion of "now" is a block height supplied by the
//! surrounding environment. Maturity is defined purely in terms of that
//! height, so the clock only ever moves forwards: `advance_to` rejects a
//! regression instead of silently un-maturing every tranche.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from moving the clock.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClockError {
    /// The requested height is below the current one.
    #[error("height regression: clock is at {current}, requested {requested}")]
    Regression {
        /// Current height.
        current: u64,
        /// Height that was requested.
        requested: u64,
    },

    /// Advancing would overflow `u64`.
    #[error("height overflow: {current} + {blocks}")]
    Overflow {
        /// Current height.
        current: u64,
        /// Number of blocks requested.
        blocks: u64,
    },
}

/// A monotonically non-decreasing block height.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockClock {
    height: u64,
}

impl BlockClock {
    /// Starts the clock at `height`.
    pub fn new(height: u64) -> Self {
        Self { height }
    }

    /// Current height.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Mines `blocks` blocks and returns the new height.
    pub fn advance(&mut self, blocks: u64) -> Result<u64, ClockError> {
        self.height = self
            .height
            .checked_add(blocks)
            .ok_or(ClockError::Overflow {
                current: self.height,
                blocks,
            })?;
        Ok(self.height)
    }

    /// Jumps to `height`. Staying at the current height is allowed.
    pub fn advance_to(&mut self, height: u64) -> Result<u64, ClockError> {
        if height < self.height {
            return Err(ClockError::Regression {
                current: self.height,
                requested: height,
            });
        }
        self.height = height;
        Ok(self.height)
    }
}
