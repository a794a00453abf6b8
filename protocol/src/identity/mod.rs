//! # Identity Module: Account Handles
//!
//! Every participant in the portal (users, the vault, the portal's shared
//! custody pool, every trustee partition) is addressed by a 20-byte
//! [`Address`]. User addresses are whatever the environment hands us;
//! system addresses are derived deterministically with BLAKE3 so that the
//! same deployment always produces the same custody handles.

pub mod address;

pub use address::{Address, AddressError, ADDRESS_LENGTH};
