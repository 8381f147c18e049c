// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Fee and refund computation. The sender pre-paid for the full gas limit
//! through the transaction fee; unused gas is returned as an output, except
//! after out-of-gas executions, which forfeit everything.

use scvm_shared::transaction::{OutputScript, TxOutput};
use scvm_shared::{Address, Amount, Gas};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundOutcome {
    /// The fee actually kept: the observed mempool fee minus the refund.
    pub fee: Amount,
    /// Output returning unused gas value to the sender, when any.
    pub refund: Option<TxOutput>,
}

pub struct RefundProcessor;

impl RefundProcessor {
    pub fn process(
        sender: Address,
        gas_price: u64,
        gas_limit: Gas,
        gas_consumed: Gas,
        mempool_fee: Amount,
        out_of_gas: bool,
    ) -> RefundOutcome {
        let refund_amount = if out_of_gas || gas_consumed >= gas_limit {
            0
        } else {
            (gas_limit - gas_consumed) * gas_price
        };
        let fee = mempool_fee.saturating_sub(refund_amount);
        let refund = (refund_amount > 0).then(|| TxOutput {
            value: refund_amount,
            script: OutputScript::Address(sender),
        });
        RefundOutcome { fee, refund }
    }
}
