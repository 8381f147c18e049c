// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length, in bytes, of an account identifier.
pub const ADDRESS_LENGTH: usize = 20;

/// A 160-bit account identifier. May refer to a contract or an external
/// party; the ledger does not distinguish until code is looked up.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_LENGTH]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid address length {0}, expected {ADDRESS_LENGTH}")]
    InvalidLength(usize),
    #[error("invalid address encoding")]
    InvalidEncoding,
}

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Address(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let arr: [u8; ADDRESS_LENGTH] = bytes
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
        Ok(Address(arr))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Derives the identifier of a newly created contract from the creator's
    /// identifier and the creation nonce. The nonce is monotonic per lineage,
    /// so derived addresses are never reused, even across aborted branches.
    pub fn derive_contract(creator: &Address, nonce: u64) -> Address {
        let mut hasher = blake2b_simd::Params::new().hash_length(32).to_state();
        hasher.update(creator.as_bytes());
        hasher.update(&nonce.to_le_bytes());
        let digest = hasher.finalize();
        let mut out = [0u8; ADDRESS_LENGTH];
        out.copy_from_slice(&digest.as_bytes()[..ADDRESS_LENGTH]);
        Address(out)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| AddressError::InvalidEncoding)?;
        Address::from_slice(&bytes)
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Address {
    fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Address(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trip() {
        let addr = Address::new([0xab; ADDRESS_LENGTH]);
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn from_slice_rejects_bad_length() {
        assert_eq!(
            Address::from_slice(&[0u8; 19]),
            Err(AddressError::InvalidLength(19))
        );
    }

    #[test]
    fn derivation_is_deterministic_and_nonce_sensitive() {
        let creator = Address::new([1; ADDRESS_LENGTH]);
        let a = Address::derive_contract(&creator, 0);
        let b = Address::derive_contract(&creator, 0);
        let c = Address::derive_contract(&creator, 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
