// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Minimal unspent-output ledger primitives, as consumed and produced by the
//! contract engine. Full transaction validation lives in the surrounding
//! ledger layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Address, Amount};

/// Length of a transaction hash in bytes.
pub const TX_HASH_LENGTH: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash([u8; TX_HASH_LENGTH]);

impl TxHash {
    pub const fn new(bytes: [u8; TX_HASH_LENGTH]) -> Self {
        TxHash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TX_HASH_LENGTH] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Reference to a specific output of a prior transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_hash: TxHash,
    pub index: u32,
}

impl OutPoint {
    pub const fn new(tx_hash: TxHash, index: u32) -> Self {
        OutPoint { tx_hash, index }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub outpoint: OutPoint,
}

/// Destination of an output built by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputScript {
    /// Plain payment to an account.
    Address(Address),
    /// The contract's own reconciliation script; carries the remainder the
    /// contract keeps after a condensing transaction.
    Contract(Address),
}

impl OutputScript {
    pub fn address(&self) -> &Address {
        match self {
            OutputScript::Address(a) | OutputScript::Contract(a) => a,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: Amount,
    pub script: OutputScript,
}

/// A ledger transaction assembled by the engine (condensing or refund).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Hash over the canonical byte rendering of inputs and outputs.
    pub fn hash(&self) -> TxHash {
        let mut hasher = blake2b_simd::Params::new().hash_length(32).to_state();
        hasher.update(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            hasher.update(input.outpoint.tx_hash.as_bytes());
            hasher.update(&input.outpoint.index.to_le_bytes());
        }
        hasher.update(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            hasher.update(&output.value.to_le_bytes());
            let (tag, addr): (u8, &Address) = match &output.script {
                OutputScript::Address(a) => (0, a),
                OutputScript::Contract(a) => (1, a),
            };
            hasher.update(&[tag]);
            hasher.update(addr.as_bytes());
        }
        let digest = hasher.finalize();
        let mut out = [0u8; TX_HASH_LENGTH];
        out.copy_from_slice(digest.as_bytes());
        TxHash::new(out)
    }

    pub fn total_output_value(&self) -> Amount {
        self.outputs.iter().map(|o| o.value).sum()
    }
}

/// The contract's recorded unspent output: the single ledger entry carrying
/// its whole balance between invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractUnspentOutput {
    pub tx_hash: TxHash,
    pub index: u32,
    pub value: Amount,
}

impl ContractUnspentOutput {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.tx_hash, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ADDRESS_LENGTH;

    #[test]
    fn hash_depends_on_outputs() {
        let to = Address::new([9; ADDRESS_LENGTH]);
        let a = Transaction {
            inputs: vec![],
            outputs: vec![TxOutput {
                value: 5,
                script: OutputScript::Address(to),
            }],
        };
        let mut b = a.clone();
        b.outputs[0].value = 6;
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), a.clone().hash());
    }

    #[test]
    fn script_kind_affects_hash() {
        let addr = Address::new([3; ADDRESS_LENGTH]);
        let pay = Transaction {
            inputs: vec![],
            outputs: vec![TxOutput {
                value: 1,
                script: OutputScript::Address(addr),
            }],
        };
        let mut keep = pay.clone();
        keep.outputs[0].script = OutputScript::Contract(addr);
        assert_ne!(pay.hash(), keep.hash());
    }
}
