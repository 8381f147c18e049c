// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Shared fixtures: a small token-like contract module exercising storage,
//! logs, nested operations, and the failure paths.
#![allow(dead_code)]

use scvm::bytecode::{
    ContractModule, Instruction, MethodDef, ParamType, PrimitiveType, TypeDef, TypeKind,
    Visibility,
};
use scvm::context::{BlockContext, TransactionContext};
use scvm_shared::address::ADDRESS_LENGTH;
use scvm_shared::transaction::TxHash;
use scvm_shared::{Address, Amount};

pub fn addr(b: u8) -> Address {
    Address::new([b; ADDRESS_LENGTH])
}

pub fn method(name: &str, params: Vec<ParamType>, body: Vec<Instruction>) -> MethodDef {
    MethodDef {
        name: name.into(),
        visibility: Visibility::Public,
        is_constructor: false,
        is_generic: false,
        params,
        locals: 0,
        body,
    }
}

pub fn constructor(body: Vec<Instruction>) -> MethodDef {
    MethodDef {
        name: ".ctor".into(),
        visibility: Visibility::Public,
        is_constructor: true,
        is_generic: false,
        params: vec![ParamType::Context],
        locals: 0,
        body,
    }
}

/// A contract with one of everything the engine meters.
pub fn token_module() -> ContractModule {
    use Instruction::*;
    ContractModule {
        assembly_refs: vec!["core".into()],
        types: vec![
            TypeDef {
                name: "Token".into(),
                kind: TypeKind::Contract,
                generic_params: 0,
                fields: vec![],
                methods: vec![
                    constructor(vec![
                        PushBytes(b"genesis".to_vec()),
                        PushBytes(b"done".to_vec()),
                        StorageStore,
                        Return,
                    ]),
                    method(
                        "Stash",
                        vec![ParamType::Primitive(PrimitiveType::ByteArray)],
                        vec![
                            PushBytes(b"data".to_vec()),
                            LoadArg(0),
                            StorageStore,
                            Return,
                        ],
                    ),
                    method(
                        "Read",
                        vec![],
                        vec![PushBytes(b"data".to_vec()), StorageLoad, Return],
                    ),
                    method(
                        "Emit",
                        vec![],
                        vec![
                            PushBytes(b"Minted".to_vec()),
                            PushBytes(b"payload".to_vec()),
                            Log(1),
                            Return,
                        ],
                    ),
                    method(
                        "Payout",
                        vec![
                            ParamType::Primitive(PrimitiveType::Address),
                            ParamType::Primitive(PrimitiveType::UInt64),
                        ],
                        vec![LoadArg(0), LoadArg(1), InternalTransfer, Return],
                    ),
                    method(
                        "Receive",
                        vec![],
                        vec![Return],
                    ),
                    method("Spin", vec![], vec![Branch(0)]),
                    method(
                        "Boom",
                        vec![],
                        vec![PushBool(false), Assert("boom".into()), Return],
                    ),
                    method(
                        "Alloc",
                        vec![ParamType::Primitive(PrimitiveType::UInt64)],
                        vec![LoadArg(0), NewArray, Pop, Return],
                    ),
                    method(
                        "Outer",
                        vec![],
                        vec![
                            PushBytes(b"outer".to_vec()),
                            PushBytes(b"kept".to_vec()),
                            StorageStore,
                            SelfAddress,
                            PushU64(0),
                            PushU64(60_000),
                            InternalCall {
                                method: "Sabotage".into(),
                                param_count: 0,
                            },
                            Return,
                        ],
                    ),
                    method(
                        "Sabotage",
                        vec![],
                        vec![
                            PushBytes(b"inner".to_vec()),
                            PushBytes(b"discarded".to_vec()),
                            StorageStore,
                            PushBool(false),
                            Assert("sabotage".into()),
                            Return,
                        ],
                    ),
                    method(
                        "Spawn",
                        vec![],
                        vec![
                            PushU64(0),
                            PushU64(60_000),
                            InternalCreate {
                                type_name: "Token".into(),
                                param_count: 0,
                            },
                            Return,
                        ],
                    ),
                    method(
                        "Pack",
                        vec![],
                        vec![
                            PushBytes(b"entry".to_vec()),
                            NewObject("Entry".into()),
                            PushU64(7),
                            StoreField("count".into()),
                            StorageStore,
                            Return,
                        ],
                    ),
                ],
            },
            TypeDef {
                name: "Entry".into(),
                kind: TypeKind::ValueStruct,
                generic_params: 0,
                fields: vec![
                    scvm::bytecode::FieldDef {
                        name: "count".into(),
                        ty: PrimitiveType::UInt64,
                        is_static: false,
                        is_mutable: true,
                    },
                    scvm::bytecode::FieldDef {
                        name: "flag".into(),
                        ty: PrimitiveType::Bool,
                        is_static: false,
                        is_mutable: true,
                    },
                ],
                methods: vec![],
            },
            TypeDef {
                name: "Vault".into(),
                kind: TypeKind::Contract,
                generic_params: 0,
                fields: vec![],
                methods: vec![constructor(vec![Return])],
            },
        ],
    }
}

/// Module with the `Token` contract type only (plus its value struct);
/// creates through the executor need an unambiguous default type.
pub fn single_token_module() -> ContractModule {
    let mut module = token_module();
    module.types.retain(|t| t.name != "Vault");
    module
}

pub fn tx_ctx(sender: Address, value: Amount, call_data: Vec<u8>) -> TransactionContext {
    TransactionContext {
        tx_hash: TxHash::new([0xcc; 32]),
        sender,
        value,
        vout_index: 0,
        mempool_fee: 10_500,
        block: BlockContext {
            height: 1200,
            coinbase: addr(0x99),
        },
        call_data,
    }
}
