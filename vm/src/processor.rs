// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! The message state machine. `apply` drives the VM against a state layer
//! for exactly one message; the caller owns the snapshot discipline, so
//! `apply` never commits or discards anything itself.

use std::sync::Arc;

use scvm_shared::params::MethodParameter;
use scvm_shared::{Address, Amount, Gas};

use crate::context::{BlockContext, InvocationContext, MethodCall};
use crate::engine::Engine;
use crate::gas::{GasMeter, MemoryMeter, Observer, PRICES};
use crate::interpreter::Value;
use crate::state::{State, TransferInfo};
use crate::vm::{ContractVm, VmError};

/// One unit of work for the processor. External variants originate from a
/// ledger transaction; internal variants originate from code already
/// running inside the VM.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    ExternalCreate {
        from: Address,
        amount: Amount,
        gas_limit: Gas,
        code: Vec<u8>,
        parameters: Vec<MethodParameter>,
    },
    ExternalCall {
        from: Address,
        to: Address,
        amount: Amount,
        gas_limit: Gas,
        method_call: MethodCall,
    },
    InternalCreate {
        from: Address,
        amount: Amount,
        gas_limit: Gas,
        parameters: Vec<MethodParameter>,
        type_name: String,
    },
    InternalCall {
        from: Address,
        to: Address,
        amount: Amount,
        gas_limit: Gas,
        method_call: MethodCall,
    },
    ContractTransfer {
        from: Address,
        to: Address,
        amount: Amount,
        gas_limit: Gas,
    },
}

/// Closed set of state-transition failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InsufficientBalance,
    NoCode,
    VmError,
    OutOfGas,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateTransitionSuccess {
    pub contract_address: Address,
    pub result: Option<Value>,
    pub gas_consumed: Gas,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateTransitionFailure {
    pub kind: FailureKind,
    pub vm_error: Option<VmError>,
    pub gas_consumed: Gas,
}

pub type StateTransitionResult = Result<StateTransitionSuccess, StateTransitionFailure>;

fn failure(kind: FailureKind, vm_error: Option<VmError>, gas_consumed: Gas) -> StateTransitionResult {
    Err(StateTransitionFailure {
        kind,
        vm_error,
        gas_consumed,
    })
}

/// Drives messages through the VM. Holds the shared engine so module
/// loading stays cached across the whole call tree.
pub struct StateProcessor {
    engine: Arc<Engine>,
}

impl StateProcessor {
    pub fn new(engine: Arc<Engine>) -> Self {
        StateProcessor { engine }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Applies one message to `state`. Mutations are confined to the given
    /// layer; committing or discarding them is the caller's job.
    pub fn apply(
        &self,
        state: &mut State,
        message: &Message,
        block: &BlockContext,
    ) -> StateTransitionResult {
        match message {
            Message::ExternalCreate {
                from,
                amount,
                gas_limit,
                code,
                parameters,
            } => self.apply_create(
                state,
                block,
                *from,
                *amount,
                *gas_limit,
                code.clone(),
                parameters,
                None,
                false,
            ),
            Message::ExternalCall {
                from,
                to,
                amount,
                gas_limit,
                method_call,
            } => self.apply_call(state, block, *from, *to, *amount, *gas_limit, method_call, false),
            Message::InternalCreate {
                from,
                amount,
                gas_limit,
                parameters,
                type_name,
            } => {
                if state.get_balance(from) < *amount {
                    return failure(FailureKind::InsufficientBalance, None, 0);
                }
                // An internal create instantiates a sibling type from the
                // creating contract's own module.
                let Some(code) = state.repository().code(from) else {
                    return failure(FailureKind::NoCode, None, 0);
                };
                self.apply_create(
                    state,
                    block,
                    *from,
                    *amount,
                    *gas_limit,
                    code,
                    parameters,
                    Some(type_name.as_str()),
                    true,
                )
            }
            Message::InternalCall {
                from,
                to,
                amount,
                gas_limit,
                method_call,
            } => {
                if state.get_balance(from) < *amount {
                    return failure(FailureKind::InsufficientBalance, None, 0);
                }
                self.apply_call(state, block, *from, *to, *amount, *gas_limit, method_call, true)
            }
            Message::ContractTransfer {
                from,
                to,
                amount,
                gas_limit,
            } => {
                if state.get_balance(from) < *amount {
                    return failure(FailureKind::InsufficientBalance, None, 0);
                }
                if state.repository().code(to).is_some() {
                    // Value arriving at a contract runs its receive handler.
                    self.apply_call(
                        state,
                        block,
                        *from,
                        *to,
                        *amount,
                        *gas_limit,
                        &MethodCall::receive(),
                        true,
                    )
                } else {
                    // Plain movement to a code-less account: no VM work.
                    let mut meter = GasMeter::new(*gas_limit);
                    if meter.spend(PRICES.transfer_cost).is_err() {
                        return failure(FailureKind::OutOfGas, None, *gas_limit);
                    }
                    state.add_transfer(TransferInfo {
                        from: *from,
                        to: *to,
                        value: *amount,
                    });
                    Ok(StateTransitionSuccess {
                        contract_address: *to,
                        result: None,
                        gas_consumed: meter.consumed(),
                    })
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_create(
        &self,
        state: &mut State,
        block: &BlockContext,
        from: Address,
        amount: Amount,
        gas_limit: Gas,
        code: Vec<u8>,
        parameters: &[MethodParameter],
        type_name: Option<&str>,
        internal: bool,
    ) -> StateTransitionResult {
        let mut meter = GasMeter::new(gas_limit);
        if meter.spend(PRICES.base_create).is_err() {
            return failure(FailureKind::OutOfGas, None, gas_limit);
        }
        // Failed external creates bill the fixed overhead only; failed
        // internal creates bill everything the attempt consumed.
        let overhead = meter.consumed();

        let address = Address::derive_contract(&from, state.next_nonce());
        if internal {
            state.add_transfer(TransferInfo {
                from,
                to: address,
                value: amount,
            });
        } else {
            state.set_initial_transfer(address, amount);
        }
        state.repository_mut().create_account(address);
        state.repository_mut().set_code(address, code.clone());

        let loaded = match self.engine.load(&code) {
            Ok(loaded) => loaded,
            Err(e) => {
                log::debug!("create at {address} rejected: {e}");
                return failure(FailureKind::VmError, None, overhead);
            }
        };
        let resolved_type = type_name
            .map(str::to_string)
            .or_else(|| loaded.module.default_contract_type().map(|t| t.name.clone()));
        if let Some(name) = &resolved_type {
            state.repository_mut().set_contract_type(address, name.clone());
        }

        let mut observer = Observer::new(meter, MemoryMeter::new(PRICES.memory_limit));
        let ctx = InvocationContext {
            contract: address,
            caller: from,
            value: amount,
            block: *block,
        };
        let result = ContractVm::create(
            &loaded,
            &code,
            state,
            &mut observer,
            self,
            ctx,
            parameters,
            type_name,
        );

        match result {
            Ok(value) => Ok(StateTransitionSuccess {
                contract_address: address,
                result: value,
                gas_consumed: observer.gas.consumed(),
            }),
            Err(VmError::OutOfGas) => failure(
                FailureKind::OutOfGas,
                Some(VmError::OutOfGas),
                if internal { gas_limit } else { overhead },
            ),
            Err(e) => failure(
                FailureKind::VmError,
                Some(e),
                if internal { observer.gas.consumed() } else { overhead },
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_call(
        &self,
        state: &mut State,
        block: &BlockContext,
        from: Address,
        to: Address,
        amount: Amount,
        gas_limit: Gas,
        method_call: &MethodCall,
        internal: bool,
    ) -> StateTransitionResult {
        let mut meter = GasMeter::new(gas_limit);
        if meter.spend(PRICES.base_call).is_err() {
            return failure(FailureKind::OutOfGas, None, gas_limit);
        }

        let Some(code) = state.repository().code(&to) else {
            return failure(FailureKind::NoCode, None, meter.consumed());
        };

        if internal {
            state.add_transfer(TransferInfo {
                from,
                to,
                value: amount,
            });
        } else {
            state.set_initial_transfer(to, amount);
        }

        let loaded = match self.engine.load(&code) {
            Ok(loaded) => loaded,
            Err(e) => {
                log::debug!("call to {to} rejected: {e}");
                return failure(FailureKind::VmError, None, meter.consumed());
            }
        };
        let type_name = state.repository().contract_type(&to);

        let mut observer = Observer::new(meter, MemoryMeter::new(PRICES.memory_limit));
        let ctx = InvocationContext {
            contract: to,
            caller: from,
            value: amount,
            block: *block,
        };
        let result = ContractVm::execute_method(
            &loaded,
            &code,
            state,
            &mut observer,
            self,
            ctx,
            method_call,
            type_name.as_deref(),
        );

        match result {
            Ok(value) => Ok(StateTransitionSuccess {
                contract_address: to,
                result: value,
                gas_consumed: observer.gas.consumed(),
            }),
            Err(VmError::OutOfGas) => {
                failure(FailureKind::OutOfGas, Some(VmError::OutOfGas), gas_limit)
            }
            Err(e) => failure(FailureKind::VmError, Some(e), observer.gas.consumed()),
        }
    }
}
