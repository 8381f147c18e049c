// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Stack interpreter over instrumented method bodies. The observer is an
//! explicit argument — never ambient state — so concurrent invocations of
//! one shared loaded module cannot interfere with each other's counters.

use scvm_shared::params::{encode_struct, MethodParameter, StructValue};
use scvm_shared::{Address, Amount};
use std::collections::BTreeMap;

use crate::bytecode::{ContractModule, Instruction, MethodDef, PrimitiveType, TypeDef};
use crate::context::InvocationContext;
use crate::gas::{Observer, OutOfGas, OutOfMemory, PRICES};
use crate::internal;
use crate::processor::StateProcessor;
use crate::state::{LogEntry, State};

/// Nested invocations deeper than this fault the calling contract.
pub const MAX_CALL_DEPTH: u32 = 32;

/// A runtime value on the interpreter stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Byte(u8),
    Bytes(Vec<u8>),
    Char(char),
    String(String),
    UInt32(u32),
    UInt64(u64),
    Int32(i32),
    Int64(i64),
    Address(Address),
    Array(Vec<Value>),
    Struct {
        type_name: String,
        fields: BTreeMap<String, Value>,
    },
}

impl Value {
    pub fn default_of(ty: PrimitiveType) -> Value {
        match ty {
            PrimitiveType::Bool => Value::Bool(false),
            PrimitiveType::Byte => Value::Byte(0),
            PrimitiveType::ByteArray => Value::Bytes(Vec::new()),
            PrimitiveType::Char => Value::Char('\0'),
            PrimitiveType::String => Value::String(String::new()),
            PrimitiveType::UInt32 => Value::UInt32(0),
            PrimitiveType::UInt64 => Value::UInt64(0),
            PrimitiveType::Int32 => Value::Int32(0),
            PrimitiveType::Int64 => Value::Int64(0),
            PrimitiveType::Address => Value::Address(Address::new([0; 20])),
        }
    }
}

impl From<MethodParameter> for Value {
    fn from(p: MethodParameter) -> Value {
        match p {
            MethodParameter::Bool(v) => Value::Bool(v),
            MethodParameter::Byte(v) => Value::Byte(v),
            MethodParameter::ByteArray(v) => Value::Bytes(v),
            MethodParameter::Char(v) => Value::Char(v),
            MethodParameter::String(v) => Value::String(v),
            MethodParameter::UInt32(v) => Value::UInt32(v),
            MethodParameter::UInt64(v) => Value::UInt64(v),
            MethodParameter::Int32(v) => Value::Int32(v),
            MethodParameter::Int64(v) => Value::Int64(v),
            MethodParameter::Address(v) => Value::Address(v),
        }
    }
}

impl TryFrom<&Value> for MethodParameter {
    type Error = ();

    fn try_from(v: &Value) -> Result<MethodParameter, ()> {
        Ok(match v {
            Value::Bool(v) => MethodParameter::Bool(*v),
            Value::Byte(v) => MethodParameter::Byte(*v),
            Value::Bytes(v) => MethodParameter::ByteArray(v.clone()),
            Value::Char(v) => MethodParameter::Char(*v),
            Value::String(v) => MethodParameter::String(v.clone()),
            Value::UInt32(v) => MethodParameter::UInt32(*v),
            Value::UInt64(v) => MethodParameter::UInt64(*v),
            Value::Int32(v) => MethodParameter::Int32(*v),
            Value::Int64(v) => MethodParameter::Int64(*v),
            Value::Address(v) => MethodParameter::Address(*v),
            _ => return Err(()),
        })
    }
}

/// Interpreter-level failure. Translated to the public VM error taxonomy at
/// the VM boundary; never escapes as a panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fault {
    OutOfGas,
    OverMemoryLimit,
    Exception(String),
}

impl From<OutOfGas> for Fault {
    fn from(_: OutOfGas) -> Fault {
        Fault::OutOfGas
    }
}

impl From<OutOfMemory> for Fault {
    fn from(_: OutOfMemory) -> Fault {
        Fault::OverMemoryLimit
    }
}

fn exception(msg: impl Into<String>) -> Fault {
    Fault::Exception(msg.into())
}

/// Everything one invocation executes against. The observer and state are
/// exclusive borrows: one invocation, one counter pair, one state layer.
pub(crate) struct ExecutionEnv<'a> {
    pub module: &'a ContractModule,
    /// Raw blob the module was loaded from; nested creates of sibling types
    /// reuse it.
    pub code: &'a [u8],
    pub state: &'a mut State,
    pub observer: &'a mut Observer,
    pub processor: &'a StateProcessor,
    pub ctx: InvocationContext,
    pub depth: u32,
}

pub(crate) fn invoke(
    env: &mut ExecutionEnv<'_>,
    ty: &TypeDef,
    method: &MethodDef,
    args: Vec<Value>,
) -> Result<Option<Value>, Fault> {
    if env.depth >= MAX_CALL_DEPTH {
        return Err(exception("call depth exceeded"));
    }
    env.depth += 1;
    let result = run_body(env, ty, method, args);
    env.depth -= 1;
    result
}

fn run_body(
    env: &mut ExecutionEnv<'_>,
    ty: &TypeDef,
    method: &MethodDef,
    args: Vec<Value>,
) -> Result<Option<Value>, Fault> {
    let body = &method.body;
    let mut stack: Vec<Value> = Vec::new();
    let mut locals = vec![Value::Unit; method.locals as usize];
    let mut pc: usize = 0;

    macro_rules! pop {
        () => {
            stack.pop().ok_or_else(|| exception("stack underflow"))?
        };
    }

    while pc < body.len() {
        let instruction = &body[pc];
        pc += 1;
        match instruction {
            Instruction::Nop => {}
            Instruction::ChargeGas(cost) => env.observer.gas.spend(*cost)?,

            Instruction::PushBool(v) => stack.push(Value::Bool(*v)),
            Instruction::PushByte(v) => stack.push(Value::Byte(*v)),
            Instruction::PushU32(v) => stack.push(Value::UInt32(*v)),
            Instruction::PushU64(v) => stack.push(Value::UInt64(*v)),
            Instruction::PushI32(v) => stack.push(Value::Int32(*v)),
            Instruction::PushI64(v) => stack.push(Value::Int64(*v)),
            Instruction::PushChar(v) => stack.push(Value::Char(*v)),
            Instruction::PushString(v) => {
                env.observer.memory.reserve(PRICES.memory_for_buffer(v.len()))?;
                stack.push(Value::String(v.clone()));
            }
            Instruction::PushBytes(v) => {
                env.observer.memory.reserve(PRICES.memory_for_buffer(v.len()))?;
                stack.push(Value::Bytes(v.clone()));
            }
            Instruction::PushAddressZero => stack.push(Value::Address(Address::new([0; 20]))),

            Instruction::Dup => {
                let top = stack
                    .last()
                    .cloned()
                    .ok_or_else(|| exception("stack underflow"))?;
                stack.push(top);
            }
            Instruction::Pop => {
                pop!();
            }
            Instruction::LoadLocal(i) => {
                let v = locals
                    .get(*i as usize)
                    .ok_or_else(|| exception("local index out of range"))?;
                stack.push(v.clone());
            }
            Instruction::StoreLocal(i) => {
                let v = pop!();
                let slot = locals
                    .get_mut(*i as usize)
                    .ok_or_else(|| exception("local index out of range"))?;
                *slot = v;
            }
            Instruction::LoadArg(i) => {
                let v = args
                    .get(*i as usize)
                    .ok_or_else(|| exception("argument index out of range"))?;
                stack.push(v.clone());
            }

            Instruction::Add => binary_int(&mut stack, "add", |a, b| a.checked_add(b))?,
            Instruction::Sub => binary_int(&mut stack, "subtract", |a, b| a.checked_sub(b))?,
            Instruction::Mul => binary_int(&mut stack, "multiply", |a, b| a.checked_mul(b))?,
            Instruction::Div => binary_int(&mut stack, "divide", |a, b| a.checked_div(b))?,
            Instruction::Mod => binary_int(&mut stack, "modulo", |a, b| a.checked_rem(b))?,

            Instruction::Eq => {
                let b = pop!();
                let a = pop!();
                stack.push(Value::Bool(a == b));
            }
            Instruction::Lt => compare(&mut stack, |o| o == std::cmp::Ordering::Less)?,
            Instruction::Gt => compare(&mut stack, |o| o == std::cmp::Ordering::Greater)?,
            Instruction::Not => {
                let Value::Bool(v) = pop!() else {
                    return Err(exception("not: expected bool"));
                };
                stack.push(Value::Bool(!v));
            }
            Instruction::And => binary_bool(&mut stack, |a, b| a && b)?,
            Instruction::Or => binary_bool(&mut stack, |a, b| a || b)?,

            Instruction::Float(op) => {
                return Err(exception(format!(
                    "floating-point operation {op:?} is not executable"
                )));
            }

            Instruction::Branch(target) => pc = *target as usize,
            Instruction::BranchIfFalse(target) => {
                let Value::Bool(cond) = pop!() else {
                    return Err(exception("branch: expected bool condition"));
                };
                if !cond {
                    pc = *target as usize;
                }
            }
            Instruction::Return => return Ok(stack.pop()),
            Instruction::Assert(msg) => {
                let Value::Bool(cond) = pop!() else {
                    return Err(exception("assert: expected bool"));
                };
                if !cond {
                    return Err(exception(msg.clone()));
                }
            }

            Instruction::CallMethod(target) => {
                env.observer.gas.spend(PRICES.on_method_call())?;
                let (callee_ty, callee) = resolve_method(env.module, ty, target)?;
                let mut callee_args = Vec::with_capacity(callee.params.len());
                for _ in 0..callee.params.len() {
                    callee_args.push(pop!());
                }
                callee_args.reverse();
                let ret = invoke(env, callee_ty, callee, callee_args)?;
                if let Some(v) = ret {
                    stack.push(v);
                }
            }
            Instruction::CallExtern(name) => {
                env.observer.gas.spend(PRICES.on_method_call())?;
                let result = call_extern(env, name, &mut stack)?;
                stack.push(result);
            }

            Instruction::NewObject(type_name) => {
                let target = env
                    .module
                    .type_def(type_name)
                    .ok_or_else(|| exception(format!("unknown type `{type_name}`")))?;
                env.observer
                    .memory
                    .reserve(PRICES.memory_for_array(target.fields.len().max(1)))?;
                let fields = target
                    .fields
                    .iter()
                    .filter(|f| !f.is_static)
                    .map(|f| (f.name.clone(), Value::default_of(f.ty)))
                    .collect();
                stack.push(Value::Struct {
                    type_name: type_name.clone(),
                    fields,
                });
            }
            Instruction::LoadField(name) => {
                let Value::Struct { fields, type_name } = pop!() else {
                    return Err(exception("load field: expected struct"));
                };
                let v = fields
                    .get(name)
                    .ok_or_else(|| exception(format!("no field `{name}` on `{type_name}`")))?;
                stack.push(v.clone());
            }
            Instruction::StoreField(name) => {
                let value = pop!();
                let Value::Struct {
                    mut fields,
                    type_name,
                } = pop!()
                else {
                    return Err(exception("store field: expected struct"));
                };
                if !fields.contains_key(name) {
                    return Err(exception(format!("no field `{name}` on `{type_name}`")));
                }
                fields.insert(name.clone(), value);
                stack.push(Value::Struct { type_name, fields });
            }
            Instruction::LoadStaticField(name) => {
                let field = ty
                    .field(name)
                    .filter(|f| f.is_static)
                    .ok_or_else(|| exception(format!("no static field `{name}`")))?;
                stack.push(Value::default_of(field.ty));
            }
            Instruction::StoreStaticField(name) => {
                return Err(exception(format!(
                    "write to static field `{name}` is not executable"
                )));
            }

            Instruction::NewArray => {
                let len = pop_u64(&mut stack)? as usize;
                env.observer.memory.reserve(PRICES.memory_for_array(len))?;
                stack.push(Value::Array(vec![Value::Unit; len]));
            }
            Instruction::ArrayLen => {
                let Value::Array(items) = pop!() else {
                    return Err(exception("array length: expected array"));
                };
                stack.push(Value::UInt32(items.len() as u32));
            }
            Instruction::ArrayGet => {
                let index = pop_u64(&mut stack)? as usize;
                let Value::Array(items) = pop!() else {
                    return Err(exception("array get: expected array"));
                };
                let v = items
                    .get(index)
                    .ok_or_else(|| exception("array index out of range"))?;
                stack.push(v.clone());
            }
            Instruction::ArraySet => {
                let value = pop!();
                let index = pop_u64(&mut stack)? as usize;
                let Value::Array(mut items) = pop!() else {
                    return Err(exception("array set: expected array"));
                };
                let slot = items
                    .get_mut(index)
                    .ok_or_else(|| exception("array index out of range"))?;
                *slot = value;
                stack.push(Value::Array(items));
            }
            Instruction::ArrayClone | Instruction::NewMultiArray(_) => {
                return Err(exception("non-deterministic array operation is not executable"));
            }
            Instruction::TryBegin(_) | Instruction::TryEnd => {
                return Err(exception("structured exception handling is not executable"));
            }

            Instruction::StorageLoad => {
                let Value::Bytes(key) = pop!() else {
                    return Err(exception("storage load: expected byte key"));
                };
                let value = env
                    .state
                    .repository()
                    .storage_value(&env.ctx.contract, &key)
                    .unwrap_or_default();
                env.observer.gas.spend(PRICES.on_storage_read(value.len()))?;
                env.observer
                    .memory
                    .reserve(PRICES.memory_for_buffer(value.len()))?;
                stack.push(Value::Bytes(value));
            }
            Instruction::StorageStore => {
                let value = pop!();
                let Value::Bytes(key) = pop!() else {
                    return Err(exception("storage store: expected byte key"));
                };
                let bytes = storage_bytes(&value)?;
                env.observer
                    .gas
                    .spend(PRICES.on_storage_write(key.len(), bytes.len()))?;
                env.state
                    .repository_mut()
                    .set_storage_value(env.ctx.contract, key, bytes);
            }

            Instruction::Log(topic_count) => {
                let Value::Bytes(data) = pop!() else {
                    return Err(exception("log: expected byte data"));
                };
                let mut topics = Vec::with_capacity(*topic_count as usize);
                for _ in 0..*topic_count {
                    let Value::Bytes(topic) = pop!() else {
                        return Err(exception("log: expected byte topic"));
                    };
                    topics.push(topic);
                }
                topics.reverse();
                let topic_bytes: usize = topics.iter().map(Vec::len).sum();
                env.observer
                    .gas
                    .spend(PRICES.on_log(topic_bytes, data.len()))?;
                env.state.add_log(LogEntry {
                    address: env.ctx.contract,
                    topics,
                    data,
                });
            }

            Instruction::MsgSender => stack.push(Value::Address(env.ctx.caller)),
            Instruction::MsgValue => stack.push(Value::UInt64(env.ctx.value)),
            Instruction::SelfAddress => stack.push(Value::Address(env.ctx.contract)),
            Instruction::BlockHeight => stack.push(Value::UInt64(env.ctx.block.height)),
            Instruction::BlockCoinbase => stack.push(Value::Address(env.ctx.block.coinbase)),
            Instruction::Balance => {
                let Value::Address(addr) = pop!() else {
                    return Err(exception("balance: expected address"));
                };
                stack.push(Value::UInt64(env.state.get_balance(&addr)));
            }

            Instruction::InternalCreate {
                type_name,
                param_count,
            } => {
                let (params, amount, gas_limit) = pop_internal_args(&mut stack, *param_count)?;
                let ok = internal::create(env, type_name, params, amount, gas_limit);
                stack.push(Value::Bool(ok));
            }
            Instruction::InternalCall {
                method,
                param_count,
            } => {
                let (params, amount, gas_limit) = pop_internal_args(&mut stack, *param_count)?;
                let Value::Address(to) = pop_value(&mut stack)? else {
                    return Err(exception("call: expected target address"));
                };
                let ok = internal::call(env, to, method, params, amount, gas_limit);
                stack.push(Value::Bool(ok));
            }
            Instruction::InternalTransfer => {
                let amount = pop_u64(&mut stack)?;
                let Value::Address(to) = pop_value(&mut stack)? else {
                    return Err(exception("transfer: expected target address"));
                };
                let ok = internal::transfer(env, to, amount);
                stack.push(Value::Bool(ok));
            }
        }
    }

    Ok(None)
}

/// Pops `(gas_limit, amount, params...)` for a nested operation: parameters
/// are pushed last, under them the gas limit, under that the amount.
fn pop_internal_args(
    stack: &mut Vec<Value>,
    param_count: u8,
) -> Result<(Vec<MethodParameter>, Amount, u64), Fault> {
    let mut params = Vec::with_capacity(param_count as usize);
    for _ in 0..param_count {
        let v = pop_value(stack)?;
        params.push(
            MethodParameter::try_from(&v)
                .map_err(|_| exception("nested call parameter is not a primitive"))?,
        );
    }
    params.reverse();
    let gas_limit = pop_u64(stack)?;
    let amount = pop_u64(stack)?;
    Ok((params, amount, gas_limit))
}

fn pop_value(stack: &mut Vec<Value>) -> Result<Value, Fault> {
    stack.pop().ok_or_else(|| exception("stack underflow"))
}

/// Canonical storage form of a value: byte buffers are stored raw, structs
/// and other primitives go through the primitive serializer.
fn storage_bytes(value: &Value) -> Result<Vec<u8>, Fault> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        Value::Struct { type_name, fields } => {
            let fields = fields
                .iter()
                .map(|(name, v)| MethodParameter::try_from(v).map(|p| (name.clone(), p)))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| exception("struct field is not storable"))?;
            Ok(encode_struct(&StructValue {
                type_name: type_name.clone(),
                fields,
            }))
        }
        other => {
            let param = MethodParameter::try_from(other)
                .map_err(|_| exception("unsupported storage value"))?;
            let mut out = Vec::new();
            param.encode_into(&mut out);
            Ok(out)
        }
    }
}

fn pop_u64(stack: &mut Vec<Value>) -> Result<u64, Fault> {
    match pop_value(stack)? {
        Value::UInt64(v) => Ok(v),
        Value::UInt32(v) => Ok(v as u64),
        Value::Byte(v) => Ok(v as u64),
        other => Err(exception(format!("expected unsigned integer, got {other:?}"))),
    }
}

fn resolve_method<'m>(
    module: &'m ContractModule,
    current: &'m TypeDef,
    target: &str,
) -> Result<(&'m TypeDef, &'m MethodDef), Fault> {
    let (ty, method_name) = match target.split_once("::") {
        Some((type_name, method_name)) => {
            let ty = module
                .type_def(type_name)
                .ok_or_else(|| exception(format!("unknown type `{type_name}`")))?;
            (ty, method_name)
        }
        None => (current, target),
    };
    let method = ty
        .method(method_name)
        .ok_or_else(|| exception(format!("unknown method `{target}`")))?;
    Ok((ty, method))
}

fn call_extern(
    env: &mut ExecutionEnv<'_>,
    name: &str,
    stack: &mut Vec<Value>,
) -> Result<Value, Fault> {
    match name {
        "Contract.Hash256" => {
            let Value::Bytes(data) = pop_value(stack)? else {
                return Err(exception("hash: expected byte input"));
            };
            env.observer.memory.reserve(PRICES.memory_for_buffer(32))?;
            let digest = blake2b_simd::Params::new().hash_length(32).hash(&data);
            Ok(Value::Bytes(digest.as_bytes().to_vec()))
        }
        other => Err(exception(format!("unlinked extern `{other}`"))),
    }
}

fn binary_int(
    stack: &mut Vec<Value>,
    op: &str,
    f: impl Fn(i128, i128) -> Option<i128>,
) -> Result<(), Fault> {
    let b = pop_value(stack)?;
    let a = pop_value(stack)?;
    let result = match (&a, &b) {
        (Value::Byte(x), Value::Byte(y)) => {
            checked(op, f(*x as i128, *y as i128))?.try_into().ok().map(Value::Byte)
        }
        (Value::UInt32(x), Value::UInt32(y)) => {
            checked(op, f(*x as i128, *y as i128))?.try_into().ok().map(Value::UInt32)
        }
        (Value::UInt64(x), Value::UInt64(y)) => {
            checked(op, f(*x as i128, *y as i128))?.try_into().ok().map(Value::UInt64)
        }
        (Value::Int32(x), Value::Int32(y)) => {
            checked(op, f(*x as i128, *y as i128))?.try_into().ok().map(Value::Int32)
        }
        (Value::Int64(x), Value::Int64(y)) => {
            checked(op, f(*x as i128, *y as i128))?.try_into().ok().map(Value::Int64)
        }
        _ => return Err(exception(format!("{op}: operand types do not match"))),
    };
    let value = result.ok_or_else(|| exception(format!("{op}: arithmetic overflow")))?;
    stack.push(value);
    Ok(())
}

fn checked(op: &str, v: Option<i128>) -> Result<i128, Fault> {
    v.ok_or_else(|| exception(format!("{op}: arithmetic fault")))
}

fn compare(
    stack: &mut Vec<Value>,
    f: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<(), Fault> {
    let b = pop_value(stack)?;
    let a = pop_value(stack)?;
    let ordering = match (&a, &b) {
        (Value::Byte(x), Value::Byte(y)) => x.cmp(y),
        (Value::UInt32(x), Value::UInt32(y)) => x.cmp(y),
        (Value::UInt64(x), Value::UInt64(y)) => x.cmp(y),
        (Value::Int32(x), Value::Int32(y)) => x.cmp(y),
        (Value::Int64(x), Value::Int64(y)) => x.cmp(y),
        _ => return Err(exception("compare: operand types do not match")),
    };
    stack.push(Value::Bool(f(ordering)));
    Ok(())
}

fn binary_bool(stack: &mut Vec<Value>, f: impl Fn(bool, bool) -> bool) -> Result<(), Fault> {
    let (Value::Bool(b), Value::Bool(a)) = (pop_value(stack)?, pop_value(stack)?) else {
        return Err(exception("boolean operation: expected bools"));
    };
    stack.push(Value::Bool(f(a, b)));
    Ok(())
}
