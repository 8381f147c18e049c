// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use serde::{Deserialize, Serialize};

/// Floating-point operations are representable so the determinism validator
/// has something concrete to reject; no instrumented module ever contains
/// one, and the interpreter refuses them outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FloatOp {
    Const,
    Add,
    Sub,
    Mul,
    Div,
    Decimal,
}

/// One stack-machine instruction. Branch targets are absolute indices into
/// the owning method body; the instrumentation pass remaps them when it
/// inserts metering charges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    Nop,
    /// Inserted by the instrumentation pass only. Input modules containing
    /// it fail format validation.
    ChargeGas(u64),

    // Constants.
    PushBool(bool),
    PushByte(u8),
    PushU32(u32),
    PushU64(u64),
    PushI32(i32),
    PushI64(i64),
    PushChar(char),
    PushString(String),
    PushBytes(Vec<u8>),
    PushAddressZero,

    // Stack and slots.
    Dup,
    Pop,
    LoadLocal(u16),
    StoreLocal(u16),
    LoadArg(u16),

    // Checked integer arithmetic; overflow and division by zero fault the
    // invocation.
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Eq,
    Lt,
    Gt,
    Not,
    And,
    Or,

    Float(FloatOp),

    // Control flow.
    Branch(u32),
    BranchIfFalse(u32),
    Return,
    /// Pops a bool; a false value faults the invocation with the contract's
    /// message. Part of the allowed exception set.
    Assert(String),

    // Calls. `CallMethod` resolves within the module (optionally
    // `Type::method` qualified); `CallExtern` names a foreign API by dotted
    // path and is subject to the determinism namespace allow-list.
    CallMethod(String),
    CallExtern(String),

    // Objects and fields.
    NewObject(String),
    LoadField(String),
    StoreField(String),
    LoadStaticField(String),
    StoreStaticField(String),

    // Arrays.
    NewArray,
    ArrayLen,
    ArrayGet,
    ArraySet,
    ArrayClone,
    NewMultiArray(u8),

    // Structured exception handling markers; always rejected by the
    // determinism validator.
    TryBegin(u32),
    TryEnd,

    // Persistent storage; key and value are byte buffers on the stack.
    StorageLoad,
    StorageStore,

    /// Pops `topics` byte buffers and one data buffer, emits a log entry.
    Log(u8),

    // Execution-context queries.
    MsgSender,
    MsgValue,
    SelfAddress,
    BlockHeight,
    BlockCoinbase,
    /// Pops an address, pushes its current balance.
    Balance,

    // Nested operations surfaced to running contract code. Gas limits and
    // amounts come from the stack.
    InternalCreate { type_name: String, param_count: u8 },
    InternalCall { method: String, param_count: u8 },
    InternalTransfer,
}

impl Instruction {
    /// Immediate operand size in bytes, used to scale the static metering
    /// cost of the instruction.
    pub fn operand_bytes(&self) -> usize {
        use Instruction::*;
        match self {
            PushBool(_) | PushByte(_) => 1,
            PushChar(_) | PushU32(_) | PushI32(_) => 4,
            PushU64(_) | PushI64(_) | ChargeGas(_) => 8,
            PushString(s) => s.len(),
            PushBytes(b) => b.len(),
            LoadLocal(_) | StoreLocal(_) | LoadArg(_) => 2,
            Branch(_) | BranchIfFalse(_) | TryBegin(_) => 4,
            Assert(m) => m.len(),
            CallMethod(n) | CallExtern(n) | NewObject(n) => n.len(),
            LoadField(n) | StoreField(n) | LoadStaticField(n) | StoreStaticField(n) => n.len(),
            InternalCreate { type_name, .. } => type_name.len() + 1,
            InternalCall { method, .. } => method.len() + 1,
            NewMultiArray(_) | Log(_) => 1,
            _ => 0,
        }
    }

    /// Target of a direct branch, if this instruction is one.
    pub fn branch_target(&self) -> Option<u32> {
        match self {
            Instruction::Branch(t)
            | Instruction::BranchIfFalse(t)
            | Instruction::TryBegin(t) => Some(*t),
            _ => None,
        }
    }

    pub fn set_branch_target(&mut self, target: u32) {
        match self {
            Instruction::Branch(t)
            | Instruction::BranchIfFalse(t)
            | Instruction::TryBegin(t) => *t = target,
            _ => {}
        }
    }

    /// True for instructions after which control does not simply fall
    /// through to the next instruction.
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            Instruction::Branch(_) | Instruction::BranchIfFalse(_) | Instruction::Return
        )
    }
}
