// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Root orchestration: codec -> state -> processor -> reconciliation ->
//! result assembly. One call in, one reproducible result out.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use scvm_shared::transaction::{Transaction, TxOutput};
use scvm_shared::{Address, Amount, Gas};
use thiserror::Error;

use crate::calldata::{CallDataError, CallPayload, ContractTxData};
use crate::context::TransactionContext;
use crate::engine::Engine;
use crate::gas::PRICES;
use crate::interpreter::Value;
use crate::processor::{FailureKind, Message, StateProcessor};
use crate::refund::RefundProcessor;
use crate::state::{LogEntry, Repository, State};
use crate::transfer::TransferProcessor;
use crate::vm::VmError;

/// Why an execution produced no (or a reverted) state change.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("invalid call data: {0}")]
    CallData(#[from] CallDataError),
    #[error("state transition failed: {kind:?}")]
    Transition {
        kind: FailureKind,
        vm_error: Option<VmError>,
    },
}

/// The assembled outcome of one execution, ready for the surrounding ledger
/// layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// Address of the contract created by this execution, if any.
    pub new_contract_address: Option<Address>,
    /// Call target, for method invocations.
    pub to: Option<Address>,
    pub revert: bool,
    pub gas_consumed: Gas,
    pub return_value: Option<Value>,
    pub error: Option<ExecutionError>,
    /// The condensing or refund transaction, when one was built.
    pub internal_transaction: Option<Transaction>,
    pub fee: Amount,
    pub refund: Option<TxOutput>,
    pub logs: Vec<LogEntry>,
}

pub struct ContractExecutor {
    processor: StateProcessor,
}

impl ContractExecutor {
    pub fn new(engine: Arc<Engine>) -> Self {
        ContractExecutor {
            processor: StateProcessor::new(engine),
        }
    }

    /// Executes the call carried by `tx_ctx` against `backing`.
    ///
    /// Returns `Err` only for internal invariant breaches (a ledger/engine
    /// bug); every user-caused failure comes back as a reverted
    /// [`ExecutionResult`].
    pub fn execute(
        &self,
        backing: Rc<RefCell<dyn Repository>>,
        tx_ctx: &TransactionContext,
    ) -> anyhow::Result<ExecutionResult> {
        let tx_data = match ContractTxData::decode(&tx_ctx.call_data) {
            Ok(data) => data,
            Err(e) => {
                log::debug!("rejecting malformed call data: {e}");
                // Nothing was executed and nothing can be refunded without a
                // trustworthy gas schedule in the envelope.
                return Ok(ExecutionResult {
                    new_contract_address: None,
                    to: None,
                    revert: true,
                    gas_consumed: 0,
                    return_value: None,
                    error: Some(ExecutionError::CallData(e)),
                    internal_transaction: None,
                    fee: tx_ctx.mempool_fee,
                    refund: None,
                    logs: Vec::new(),
                });
            }
        };

        let is_create = tx_data.is_create();
        let call_target = match &tx_data.payload {
            CallPayload::Call { to, .. } => Some(*to),
            CallPayload::Create { .. } => None,
        };

        let message = build_message(&tx_data, tx_ctx);
        let mut root = State::new(backing);
        let mut snapshot = root.snapshot();

        let result = self.processor.apply(&mut snapshot, &message, &tx_ctx.block);

        match result {
            Ok(success) => {
                root.transition_to(snapshot)
                    .expect("snapshot is a direct child of the root");
                let transfers = root.transfers().to_vec();
                let internal_transaction = TransferProcessor::process(
                    root.repository_mut(),
                    Some(success.contract_address),
                    tx_ctx,
                    &transfers,
                    false,
                )?;
                let outcome = RefundProcessor::process(
                    tx_ctx.sender,
                    tx_data.gas_price,
                    tx_data.gas_limit,
                    success.gas_consumed,
                    tx_ctx.mempool_fee,
                    false,
                );
                let logs = root.logs().entries().to_vec();
                root.commit();

                Ok(ExecutionResult {
                    new_contract_address: is_create.then_some(success.contract_address),
                    to: call_target,
                    revert: false,
                    gas_consumed: success.gas_consumed,
                    return_value: success.result,
                    error: None,
                    internal_transaction,
                    fee: outcome.fee,
                    refund: outcome.refund,
                    logs,
                })
            }
            Err(fail) => {
                // No transition: the snapshot's side effects die with it.
                let out_of_gas = fail.kind == FailureKind::OutOfGas;
                let internal_transaction = TransferProcessor::process(
                    snapshot.repository_mut(),
                    None,
                    tx_ctx,
                    &[],
                    true,
                )?;
                let outcome = RefundProcessor::process(
                    tx_ctx.sender,
                    tx_data.gas_price,
                    tx_data.gas_limit,
                    fail.gas_consumed,
                    tx_ctx.mempool_fee,
                    out_of_gas,
                );
                log::debug!(
                    "execution reverted ({:?}), {} gas consumed",
                    fail.kind,
                    fail.gas_consumed
                );

                Ok(ExecutionResult {
                    new_contract_address: None,
                    to: call_target,
                    revert: true,
                    gas_consumed: fail.gas_consumed,
                    return_value: None,
                    error: Some(ExecutionError::Transition {
                        kind: fail.kind,
                        vm_error: fail.vm_error,
                    }),
                    internal_transaction,
                    fee: outcome.fee,
                    refund: outcome.refund,
                    logs: Vec::new(),
                })
            }
        }
    }

    /// Smallest gas limit any envelope can carry and still cover the fixed
    /// overhead of its operation kind.
    pub fn minimum_gas_limit(is_create: bool) -> Gas {
        if is_create {
            PRICES.base_create
        } else {
            PRICES.base_call
        }
    }
}

fn build_message(tx_data: &ContractTxData, tx_ctx: &TransactionContext) -> Message {
    match &tx_data.payload {
        CallPayload::Create { code, parameters } => Message::ExternalCreate {
            from: tx_ctx.sender,
            amount: tx_ctx.value,
            gas_limit: tx_data.gas_limit,
            code: code.clone(),
            parameters: parameters.clone(),
        },
        CallPayload::Call {
            to,
            method,
            parameters,
        } => Message::ExternalCall {
            from: tx_ctx.sender,
            to: *to,
            amount: tx_ctx.value,
            gas_limit: tx_data.gas_limit,
            method_call: crate::context::MethodCall::new(method.clone(), parameters.clone()),
        },
    }
}
