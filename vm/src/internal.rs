// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! The callback surface exposed into running contract code. Every nested
//! operation pre-checks the outer meter's available gas, runs against a
//! fresh snapshot, and either commits the snapshot and bills the consumed
//! gas, or discards it and bills only what the attempt actually burned.
//! Insufficient available gas fails before anything happens at all, so the
//! calling contract can recover instead of aborting.

use scvm_shared::params::MethodParameter;
use scvm_shared::{Address, Amount, Gas};

use crate::context::MethodCall;
use crate::gas::PRICES;
use crate::interpreter::ExecutionEnv;
use crate::processor::Message;

/// Fixed gas budget for a plain transfer; covers the receive handler when
/// the target turns out to be a contract.
pub fn default_transfer_gas_limit() -> Gas {
    PRICES.base_call + PRICES.transfer_cost
}

pub(crate) fn create(
    env: &mut ExecutionEnv<'_>,
    type_name: &str,
    parameters: Vec<MethodParameter>,
    amount: Amount,
    gas_limit: Gas,
) -> bool {
    let message = Message::InternalCreate {
        from: env.ctx.contract,
        amount,
        gas_limit,
        parameters,
        type_name: type_name.to_string(),
    };
    dispatch(env, message, gas_limit)
}

pub(crate) fn call(
    env: &mut ExecutionEnv<'_>,
    to: Address,
    method: &str,
    parameters: Vec<MethodParameter>,
    amount: Amount,
    gas_limit: Gas,
) -> bool {
    let message = Message::InternalCall {
        from: env.ctx.contract,
        to,
        amount,
        gas_limit,
        method_call: MethodCall::new(method, parameters),
    };
    dispatch(env, message, gas_limit)
}

pub(crate) fn transfer(env: &mut ExecutionEnv<'_>, to: Address, amount: Amount) -> bool {
    let gas_limit = default_transfer_gas_limit();
    let message = Message::ContractTransfer {
        from: env.ctx.contract,
        to,
        amount,
        gas_limit,
    };
    dispatch(env, message, gas_limit)
}

fn dispatch(env: &mut ExecutionEnv<'_>, message: Message, gas_limit: Gas) -> bool {
    if env.observer.gas.available() < gas_limit {
        log::trace!(
            "nested operation refused: {} gas requested, {} available",
            gas_limit,
            env.observer.gas.available()
        );
        return false;
    }

    let mut child = env.state.snapshot();
    let block = env.ctx.block;
    match env.processor.apply(&mut child, &message, &block) {
        Ok(success) => {
            env.state
                .transition_to(child)
                .expect("snapshot is a direct child");
            env.observer
                .gas
                .spend(success.gas_consumed)
                .expect("nested gas within pre-checked budget");
            true
        }
        Err(fail) => {
            // The snapshot is discarded, but the gas the attempt burned is
            // real cost and stays billed.
            drop(child);
            env.observer
                .gas
                .spend(fail.gas_consumed)
                .expect("nested gas within pre-checked budget");
            false
        }
    }
}
