// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use scvm_shared::params::MethodParameter;
use scvm_shared::transaction::TxHash;
use scvm_shared::{Address, Amount};

/// Chain context the block/context provider collaborator exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub height: u64,
    pub coinbase: Address,
}

/// Everything the engine learns from the outer ledger transaction carrying
/// the call.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    pub tx_hash: TxHash,
    pub sender: Address,
    /// Value attached to the output carrying the call data.
    pub value: Amount,
    /// Index of that output within the carrying transaction.
    pub vout_index: u32,
    /// Fee observed for this transaction in the mempool.
    pub mempool_fee: Amount,
    pub block: BlockContext,
    /// Raw encoded [`ContractTxData`](crate::calldata::ContractTxData).
    pub call_data: Vec<u8>,
}

/// Per-invocation context visible to running contract code.
#[derive(Debug, Clone, Copy)]
pub struct InvocationContext {
    /// The executing contract.
    pub contract: Address,
    pub caller: Address,
    /// Value received with this invocation.
    pub value: Amount,
    pub block: BlockContext,
}

/// A resolved method invocation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: String,
    pub parameters: Vec<MethodParameter>,
}

impl MethodCall {
    /// Name of the value-receipt handler invoked when plain value arrives
    /// at a contract without an explicit method call.
    pub const RECEIVE: &'static str = "Receive";

    pub fn new(method: impl Into<String>, parameters: Vec<MethodParameter>) -> Self {
        MethodCall {
            method: method.into(),
            parameters,
        }
    }

    pub fn receive() -> Self {
        MethodCall::new(Self::RECEIVE, Vec::new())
    }
}
