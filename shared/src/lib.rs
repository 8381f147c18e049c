// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod address;
pub mod params;
pub mod transaction;

pub use address::Address;

/// Ledger value in the chain's smallest unit.
pub type Amount = u64;

/// Gas units.
pub type Gas = u64;

/// Memory accounting units (bytes of tracked allocation).
pub type MemoryUnits = u64;

/// Current version of the on-chain call-data format.
pub const CALLDATA_VERSION: u32 = 1;
