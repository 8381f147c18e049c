// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

mod common;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use common::{addr, single_token_module, token_module, tx_ctx};
use scvm::calldata::ContractTxData;
use scvm::context::{BlockContext, MethodCall};
use scvm::processor::{FailureKind, Message, StateProcessor};
use scvm::state::{MemoryRepository, Repository, State};
use scvm::{ContractExecutor, Engine, Value};
use scvm_shared::Address;

fn block() -> BlockContext {
    BlockContext {
        height: 1200,
        coinbase: addr(0x99),
    }
}

/// Repository with a deployed contract (full two-type module) at `contract`.
fn seeded_repo(contract: Address) -> Rc<RefCell<MemoryRepository>> {
    let mut backing = MemoryRepository::new();
    backing.create_account(contract);
    backing.set_code(contract, token_module().encode());
    backing.set_contract_type(contract, "Token".into());
    Rc::new(RefCell::new(backing))
}

#[test]
fn nested_failure_rolls_back_only_the_nested_writes() {
    let contract = addr(0x20);
    let repo = seeded_repo(contract);
    let call = ContractTxData::call(1, 200_000, contract, "Outer", vec![]).encode();

    let result = ContractExecutor::new(Arc::new(Engine::new()))
        .execute(repo.clone(), &tx_ctx(addr(0x02), 0, call))
        .unwrap();

    // The outer invocation survives; the contract observed the nested
    // failure as a false success flag.
    assert!(!result.revert, "{:?}", result.error);
    assert_eq!(result.return_value, Some(Value::Bool(false)));
    assert_eq!(
        repo.borrow().storage_value(&contract, b"outer"),
        Some(b"kept".to_vec())
    );
    assert_eq!(repo.borrow().storage_value(&contract, b"inner"), None);
}

#[test]
fn nested_create_deploys_a_child_contract() {
    let contract = addr(0x20);
    let repo = seeded_repo(contract);
    let call = ContractTxData::call(1, 200_000, contract, "Spawn", vec![]).encode();

    let result = ContractExecutor::new(Arc::new(Engine::new()))
        .execute(repo.clone(), &tx_ctx(addr(0x02), 0, call))
        .unwrap();

    assert!(!result.revert, "{:?}", result.error);
    assert_eq!(result.return_value, Some(Value::Bool(true)));
    let child = Address::derive_contract(&contract, 0);
    assert!(repo.borrow().code(&child).is_some());
    assert_eq!(
        repo.borrow().storage_value(&child, b"genesis"),
        Some(b"done".to_vec())
    );
}

#[test]
fn addresses_stay_unique_across_discarded_branches() {
    let creator = addr(0x20);
    let repo = seeded_repo(creator);
    let processor = StateProcessor::new(Arc::new(Engine::new()));
    let state = State::new(repo);

    let create = |type_name: &str| Message::InternalCreate {
        from: creator,
        amount: 0,
        gas_limit: 60_000,
        parameters: vec![],
        type_name: type_name.into(),
    };

    // A branch that consumes a nonce and is then thrown away.
    {
        let mut branch = state.snapshot();
        let success = processor
            .apply(&mut branch, &create("Vault"), &block())
            .unwrap();
        assert_eq!(success.contract_address, Address::derive_contract(&creator, 0));
        // Dropped without transition.
    }

    let mut a = state.snapshot();
    let first = processor.apply(&mut a, &create("Vault"), &block()).unwrap();
    let second = processor.apply(&mut a, &create("Vault"), &block()).unwrap();

    // The discarded branch's nonce is never reused.
    assert_eq!(first.contract_address, Address::derive_contract(&creator, 1));
    assert_eq!(second.contract_address, Address::derive_contract(&creator, 2));
    assert_ne!(first.contract_address, second.contract_address);
}

#[test]
fn insufficient_balance_is_zero_cost_and_writes_nothing() {
    let contract = addr(0x20);
    let repo = seeded_repo(contract);
    let processor = StateProcessor::new(Arc::new(Engine::new()));
    let state = State::new(repo);
    let mut child = state.snapshot();

    let message = Message::InternalCall {
        from: contract,
        to: addr(0x30),
        amount: 1_000_000,
        gas_limit: 60_000,
        method_call: MethodCall::new("Receive", vec![]),
    };
    let failure = processor.apply(&mut child, &message, &block()).unwrap_err();

    assert_eq!(failure.kind, FailureKind::InsufficientBalance);
    assert_eq!(failure.gas_consumed, 0);
    assert_eq!(child.repository().write_count(), 0);
    assert!(child.transfers().is_empty());
}

#[test]
fn insufficient_balance_transfer_is_zero_cost() {
    let contract = addr(0x20);
    let repo = seeded_repo(contract);
    let processor = StateProcessor::new(Arc::new(Engine::new()));
    let state = State::new(repo);
    let mut child = state.snapshot();

    let message = Message::ContractTransfer {
        from: contract,
        to: addr(0x31),
        amount: 50,
        gas_limit: 60_000,
    };
    let failure = processor.apply(&mut child, &message, &block()).unwrap_err();

    assert_eq!(failure.kind, FailureKind::InsufficientBalance);
    assert_eq!(failure.gas_consumed, 0);
    assert_eq!(child.repository().write_count(), 0);
}

#[test]
fn transfer_to_contract_runs_its_receive_handler() {
    let sender_contract = addr(0x20);
    let receiver_contract = addr(0x21);
    let repo = seeded_repo(sender_contract);
    {
        let mut backing = repo.borrow_mut();
        backing.create_account(receiver_contract);
        backing.set_code(receiver_contract, single_token_module().encode());
        backing.set_contract_type(receiver_contract, "Token".into());
        backing.set_unspent_output(
            sender_contract,
            Some(scvm_shared::transaction::ContractUnspentOutput {
                tx_hash: scvm_shared::transaction::TxHash::new([0xaa; 32]),
                index: 0,
                value: 500,
            }),
        );
    }
    let processor = StateProcessor::new(Arc::new(Engine::new()));
    let state = State::new(repo);
    let mut child = state.snapshot();

    let message = Message::ContractTransfer {
        from: sender_contract,
        to: receiver_contract,
        amount: 50,
        gas_limit: 60_000,
    };
    let success = processor.apply(&mut child, &message, &block()).unwrap();

    assert_eq!(success.contract_address, receiver_contract);
    // The receive handler ran through the VM, so more than the plain
    // transfer cost was metered.
    assert!(success.gas_consumed > scvm::gas::PRICES.transfer_cost);
    assert_eq!(child.transfers().len(), 1);
    assert_eq!(child.transfers()[0].value, 50);
}

#[test]
fn transfer_to_plain_account_skips_the_vm() {
    let contract = addr(0x20);
    let repo = seeded_repo(contract);
    repo.borrow_mut().set_unspent_output(
        contract,
        Some(scvm_shared::transaction::ContractUnspentOutput {
            tx_hash: scvm_shared::transaction::TxHash::new([0xaa; 32]),
            index: 0,
            value: 500,
        }),
    );
    let processor = StateProcessor::new(Arc::new(Engine::new()));
    let state = State::new(repo);
    let mut child = state.snapshot();

    let message = Message::ContractTransfer {
        from: contract,
        to: addr(0x40),
        amount: 50,
        gas_limit: 60_000,
    };
    let success = processor.apply(&mut child, &message, &block()).unwrap();

    assert_eq!(success.result, None);
    assert_eq!(success.gas_consumed, scvm::gas::PRICES.transfer_cost);
    assert_eq!(child.transfers().len(), 1);
}
