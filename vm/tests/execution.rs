// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use common::{addr, single_token_module, tx_ctx};
use scvm::calldata::{CallDataError, ContractTxData};
use scvm::executor::ExecutionError;
use scvm::gas::PRICES;
use scvm::processor::FailureKind;
use scvm::state::{MemoryRepository, Repository};
use scvm::vm::{InvocationError, VmError};
use scvm::{ContractExecutor, Engine, Value};
use scvm_shared::params::MethodParameter;
use scvm_shared::transaction::{ContractUnspentOutput, OutputScript, TxHash};
use scvm_shared::Address;

fn executor() -> ContractExecutor {
    ContractExecutor::new(Arc::new(Engine::new()))
}

fn fresh_repo() -> Rc<RefCell<MemoryRepository>> {
    Rc::new(RefCell::new(MemoryRepository::new()))
}

/// Seeds a deployed token contract and returns its address.
fn seed_contract(repo: &Rc<RefCell<MemoryRepository>>) -> Address {
    let contract = addr(0x20);
    let code = single_token_module().encode();
    let mut backing = repo.borrow_mut();
    backing.create_account(contract);
    backing.set_code(contract, code);
    backing.set_contract_type(contract, "Token".into());
    contract
}

#[test]
fn external_create_deploys_and_runs_constructor() {
    let repo = fresh_repo();
    let sender = addr(0x01);
    let code = single_token_module().encode();
    let call_data = ContractTxData::create(1, 100_000, code.clone(), vec![]).encode();

    let result = executor()
        .execute(repo.clone(), &tx_ctx(sender, 0, call_data))
        .unwrap();

    assert!(!result.revert, "create should succeed: {:?}", result.error);
    let contract = result.new_contract_address.unwrap();
    assert_eq!(contract, Address::derive_contract(&sender, 0));
    assert_eq!(repo.borrow().code(&contract), Some(code));
    assert_eq!(
        repo.borrow().storage_value(&contract, b"genesis"),
        Some(b"done".to_vec())
    );
    assert!(result.gas_consumed > PRICES.base_create);
    // Unused gas comes back to the sender.
    let refund = result.refund.unwrap();
    assert_eq!(refund.value, 100_000 - result.gas_consumed);
    assert_eq!(refund.script, OutputScript::Address(sender));
}

#[test]
fn create_with_value_records_the_contract_output() {
    let repo = fresh_repo();
    let sender = addr(0x01);
    let call_data =
        ContractTxData::create(1, 100_000, single_token_module().encode(), vec![]).encode();

    let ctx = tx_ctx(sender, 5_000, call_data);
    let result = executor().execute(repo.clone(), &ctx).unwrap();

    assert!(!result.revert);
    let contract = result.new_contract_address.unwrap();
    // Value retained with no transfers: a state write, no transaction.
    assert_eq!(result.internal_transaction, None);
    let unspent = repo.borrow().unspent_output(&contract).unwrap();
    assert_eq!(unspent.value, 5_000);
    assert_eq!(unspent.tx_hash, ctx.tx_hash);
}

#[test]
fn call_round_trips_storage_and_returns_value() {
    let repo = fresh_repo();
    let contract = seed_contract(&repo);
    let sender = addr(0x02);
    let exec = executor();

    let stash = ContractTxData::call(
        1,
        100_000,
        contract,
        "Stash",
        vec![MethodParameter::ByteArray(b"hello".to_vec())],
    )
    .encode();
    let result = exec.execute(repo.clone(), &tx_ctx(sender, 0, stash)).unwrap();
    assert!(!result.revert, "{:?}", result.error);
    assert_eq!(result.to, Some(contract));

    let read = ContractTxData::call(1, 100_000, contract, "Read", vec![]).encode();
    let result = exec.execute(repo.clone(), &tx_ctx(sender, 0, read)).unwrap();
    assert_eq!(result.return_value, Some(Value::Bytes(b"hello".to_vec())));
}

#[test]
fn stored_structs_round_trip_through_the_primitive_serializer() {
    let repo = fresh_repo();
    let contract = seed_contract(&repo);
    let call = ContractTxData::call(1, 100_000, contract, "Pack", vec![]).encode();

    let result = executor()
        .execute(repo.clone(), &tx_ctx(addr(0x02), 0, call))
        .unwrap();

    assert!(!result.revert, "{:?}", result.error);
    let stored = repo.borrow().storage_value(&contract, b"entry").unwrap();
    let decoded = scvm_shared::params::decode_struct(&stored).unwrap();
    assert_eq!(decoded.type_name, "Entry");
    assert!(decoded
        .fields
        .iter()
        .any(|(name, value)| name == "count" && *value == MethodParameter::UInt64(7)));
}

#[test]
fn call_emits_logs() {
    let repo = fresh_repo();
    let contract = seed_contract(&repo);
    let call = ContractTxData::call(1, 100_000, contract, "Emit", vec![]).encode();

    let result = executor()
        .execute(repo, &tx_ctx(addr(0x02), 0, call))
        .unwrap();

    assert!(!result.revert);
    assert_eq!(result.logs.len(), 1);
    assert_eq!(result.logs[0].address, contract);
    assert_eq!(result.logs[0].topics, vec![b"Minted".to_vec()]);
    assert_eq!(result.logs[0].data, b"payload".to_vec());
}

#[test]
fn payout_condenses_prior_balance_incoming_value_and_transfer() {
    let repo = fresh_repo();
    let contract = seed_contract(&repo);
    let recipient = addr(0x30);
    repo.borrow_mut().set_unspent_output(
        contract,
        Some(ContractUnspentOutput {
            tx_hash: TxHash::new([0xaa; 32]),
            index: 1,
            value: 100,
        }),
    );

    let call = ContractTxData::call(
        1,
        200_000,
        contract,
        "Payout",
        vec![
            MethodParameter::Address(recipient),
            MethodParameter::UInt64(75),
        ],
    )
    .encode();
    let result = executor()
        .execute(repo.clone(), &tx_ctx(addr(0x02), 100, call))
        .unwrap();

    assert!(!result.revert, "{:?}", result.error);
    let tx = result.internal_transaction.unwrap();
    assert_eq!(tx.inputs.len(), 2);
    assert_eq!(tx.outputs.len(), 2);
    let to_recipient = tx
        .outputs
        .iter()
        .find(|o| o.script == OutputScript::Address(recipient))
        .unwrap();
    assert_eq!(to_recipient.value, 75);
    let back_to_contract = tx
        .outputs
        .iter()
        .find(|o| o.script == OutputScript::Contract(contract))
        .unwrap();
    assert_eq!(back_to_contract.value, 125);
    assert_eq!(repo.borrow().unspent_output(&contract).unwrap().value, 125);
}

#[test]
fn malformed_call_data_is_a_typed_failure() {
    let repo = fresh_repo();
    let result = executor()
        .execute(repo, &tx_ctx(addr(0x02), 0, vec![0xde, 0xad]))
        .unwrap();

    assert!(result.revert);
    assert_eq!(result.gas_consumed, 0);
    assert_eq!(
        result.error,
        Some(ExecutionError::CallData(CallDataError::UnexpectedEof))
    );
    assert_eq!(result.fee, 10_500);
    assert_eq!(result.refund, None);
}

#[test]
fn call_to_codeless_account_fails_with_no_code_at_base_cost() {
    let repo = fresh_repo();
    let call = ContractTxData::call(1, 100_000, addr(0x77), "Read", vec![]).encode();

    let result = executor()
        .execute(repo.clone(), &tx_ctx(addr(0x02), 0, call))
        .unwrap();

    assert!(result.revert);
    assert_eq!(result.gas_consumed, PRICES.base_call);
    assert!(matches!(
        result.error,
        Some(ExecutionError::Transition {
            kind: FailureKind::NoCode,
            ..
        })
    ));
    // Nothing was written anywhere.
    assert_eq!(repo.borrow().storage_value(&addr(0x77), b"data"), None);
}

#[test]
fn infinite_loop_is_bounded_by_gas_and_forfeits_refund() {
    let repo = fresh_repo();
    let contract = seed_contract(&repo);
    let call = ContractTxData::call(1, 20_000, contract, "Spin", vec![]).encode();

    let result = executor()
        .execute(repo, &tx_ctx(addr(0x02), 0, call))
        .unwrap();

    assert!(result.revert);
    assert!(matches!(
        result.error,
        Some(ExecutionError::Transition {
            kind: FailureKind::OutOfGas,
            ..
        })
    ));
    assert_eq!(result.gas_consumed, 20_000);
    assert_eq!(result.refund, None);
    assert_eq!(result.fee, 10_500);
}

#[test]
fn over_allocation_fails_with_memory_limit_while_gas_remains() {
    let repo = fresh_repo();
    let contract = seed_contract(&repo);
    let call = ContractTxData::call(
        1,
        200_000,
        contract,
        "Alloc",
        vec![MethodParameter::UInt64(PRICES.memory_limit + 1)],
    )
    .encode();

    let result = executor()
        .execute(repo, &tx_ctx(addr(0x02), 0, call))
        .unwrap();

    assert!(result.revert);
    let Some(ExecutionError::Transition {
        kind: FailureKind::VmError,
        vm_error:
            Some(VmError::InvocationFailed(InvocationError::OverMemoryLimit)),
    }) = result.error
    else {
        panic!("expected memory-limit failure, got {:?}", result.error);
    };
    // Distinct from out-of-gas: plenty of budget was left.
    assert!(result.gas_consumed < 200_000);
    assert!(result.refund.is_some());
}

#[test]
fn contract_exception_is_caught_and_typed() {
    let repo = fresh_repo();
    let contract = seed_contract(&repo);
    let call = ContractTxData::call(1, 100_000, contract, "Boom", vec![]).encode();

    let result = executor()
        .execute(repo, &tx_ctx(addr(0x02), 0, call))
        .unwrap();

    assert!(result.revert);
    let Some(ExecutionError::Transition {
        kind: FailureKind::VmError,
        vm_error:
            Some(VmError::InvocationFailed(InvocationError::MethodThrewException(msg))),
    }) = result.error
    else {
        panic!("expected exception failure, got {:?}", result.error);
    };
    assert_eq!(msg, "boom");
}

#[test]
fn mismatched_parameters_are_rejected() {
    let repo = fresh_repo();
    let contract = seed_contract(&repo);
    let call = ContractTxData::call(
        1,
        100_000,
        contract,
        "Stash",
        vec![MethodParameter::UInt64(5)],
    )
    .encode();

    let result = executor()
        .execute(repo, &tx_ctx(addr(0x02), 0, call))
        .unwrap();

    assert!(result.revert);
    assert!(matches!(
        result.error,
        Some(ExecutionError::Transition {
            kind: FailureKind::VmError,
            vm_error: Some(VmError::InvocationFailed(
                InvocationError::ParameterTypesDontMatch
            )),
        })
    ));
}

#[test]
fn unknown_method_is_rejected() {
    let repo = fresh_repo();
    let contract = seed_contract(&repo);
    let call = ContractTxData::call(1, 100_000, contract, "NoSuchMethod", vec![]).encode();

    let result = executor()
        .execute(repo, &tx_ctx(addr(0x02), 0, call))
        .unwrap();

    assert!(result.revert);
    assert!(matches!(
        result.error,
        Some(ExecutionError::Transition {
            kind: FailureKind::VmError,
            vm_error: Some(VmError::InvocationFailed(
                InvocationError::MethodDoesNotExist
            )),
        })
    ));
}

#[test]
fn failed_call_with_value_refunds_the_sender_in_full() {
    let repo = fresh_repo();
    let contract = seed_contract(&repo);
    let sender = addr(0x02);
    let call = ContractTxData::call(1, 100_000, contract, "Boom", vec![]).encode();

    let ctx = tx_ctx(sender, 900, call);
    let result = executor().execute(repo.clone(), &ctx).unwrap();

    assert!(result.revert);
    let tx = result.internal_transaction.unwrap();
    assert_eq!(tx.inputs.len(), 1);
    assert_eq!(tx.outputs.len(), 1);
    assert_eq!(tx.outputs[0].value, 900);
    assert_eq!(tx.outputs[0].script, OutputScript::Address(sender));
    // The reverted execution left no trace of the value.
    assert_eq!(repo.borrow().unspent_output(&contract), None);
}
