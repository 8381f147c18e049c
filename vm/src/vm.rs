// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! The invocation boundary. Everything user code can do wrong is caught
//! here and translated into a closed error taxonomy; no contract fault ever
//! propagates into the state-transition processor as anything but a typed
//! result.

use scvm_shared::params::MethodParameter;
use thiserror::Error;

use crate::bytecode::{MethodDef, ParamType, PrimitiveType, TypeDef, TypeKind, Visibility};
use crate::context::{InvocationContext, MethodCall};
use crate::engine::LoadedModule;
use crate::gas::Observer;
use crate::interpreter::{self, ExecutionEnv, Fault, Value};
use crate::processor::StateProcessor;
use crate::state::State;

/// Why an invocation failed inside the VM.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("method does not exist")]
    MethodDoesNotExist,
    #[error("parameter types do not match")]
    ParameterTypesDontMatch,
    #[error("method threw an exception: {0}")]
    MethodThrewException(String),
    #[error("memory limit exceeded")]
    OverMemoryLimit,
}

/// VM-level failure, as surfaced to the state-transition processor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("out of gas")]
    OutOfGas,
    #[error("invocation failed: {0}")]
    InvocationFailed(InvocationError),
}

/// Success carries the value the constructor/method returned, if any.
pub type VmExecutionResult = Result<Option<Value>, VmError>;

fn from_fault(fault: Fault) -> VmError {
    match fault {
        Fault::OutOfGas => VmError::OutOfGas,
        Fault::OverMemoryLimit => VmError::InvocationFailed(InvocationError::OverMemoryLimit),
        Fault::Exception(msg) => {
            VmError::InvocationFailed(InvocationError::MethodThrewException(msg))
        }
    }
}

pub struct ContractVm;

impl ContractVm {
    /// Runs a contract type's constructor against a fresh account.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        loaded: &LoadedModule,
        code: &[u8],
        state: &mut State,
        observer: &mut Observer,
        processor: &StateProcessor,
        ctx: InvocationContext,
        parameters: &[MethodParameter],
        type_name: Option<&str>,
    ) -> VmExecutionResult {
        let ty = resolve_type(loaded, type_name)?;
        let ctor = ty
            .constructor()
            .ok_or(VmError::InvocationFailed(InvocationError::MethodDoesNotExist))?;

        // The leading context parameter is injected by the runtime, not
        // supplied by the caller.
        check_parameters(ctor.params.get(1..).unwrap_or(&[]), parameters)?;
        let mut args = Vec::with_capacity(parameters.len() + 1);
        args.push(Value::Unit);
        args.extend(parameters.iter().cloned().map(Value::from));

        log::debug!("create {} at {}", ty.name, ctx.contract);
        run(loaded, code, state, observer, processor, ctx, ty, ctor, args)
    }

    /// Invokes a public method on an existing contract.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_method(
        loaded: &LoadedModule,
        code: &[u8],
        state: &mut State,
        observer: &mut Observer,
        processor: &StateProcessor,
        ctx: InvocationContext,
        method_call: &MethodCall,
        type_name: Option<&str>,
    ) -> VmExecutionResult {
        let ty = resolve_type(loaded, type_name)?;
        let method = ty
            .method(&method_call.method)
            .filter(|m| !m.is_constructor && m.visibility == Visibility::Public)
            .ok_or(VmError::InvocationFailed(InvocationError::MethodDoesNotExist))?;

        check_parameters(&method.params, &method_call.parameters)?;
        let args = method_call
            .parameters
            .iter()
            .cloned()
            .map(Value::from)
            .collect();

        log::debug!("call {}.{} at {}", ty.name, method.name, ctx.contract);
        run(
            loaded, code, state, observer, processor, ctx, ty, method, args,
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    loaded: &LoadedModule,
    code: &[u8],
    state: &mut State,
    observer: &mut Observer,
    processor: &StateProcessor,
    ctx: InvocationContext,
    ty: &TypeDef,
    method: &MethodDef,
    args: Vec<Value>,
) -> VmExecutionResult {
    let mut env = ExecutionEnv {
        module: &loaded.module,
        code,
        state,
        observer,
        processor,
        ctx,
        depth: 0,
    };
    interpreter::invoke(&mut env, ty, method, args).map_err(from_fault)
}

fn resolve_type<'m>(
    loaded: &'m LoadedModule,
    type_name: Option<&str>,
) -> Result<&'m TypeDef, VmError> {
    let ty = match type_name {
        Some(name) => loaded
            .module
            .type_def(name)
            .filter(|t| t.kind == TypeKind::Contract),
        None => loaded.module.default_contract_type(),
    };
    ty.ok_or(VmError::InvocationFailed(InvocationError::MethodDoesNotExist))
}

fn check_parameters(
    declared: &[ParamType],
    supplied: &[MethodParameter],
) -> Result<(), VmError> {
    let mismatch = || VmError::InvocationFailed(InvocationError::ParameterTypesDontMatch);
    if declared.len() != supplied.len() {
        return Err(mismatch());
    }
    for (decl, value) in declared.iter().zip(supplied) {
        let ParamType::Primitive(expected) = decl else {
            // Context never appears here; array parameters cannot be
            // supplied through call data.
            return Err(mismatch());
        };
        if primitive_of(value) != *expected {
            return Err(mismatch());
        }
    }
    Ok(())
}

fn primitive_of(p: &MethodParameter) -> PrimitiveType {
    match p {
        MethodParameter::Bool(_) => PrimitiveType::Bool,
        MethodParameter::Byte(_) => PrimitiveType::Byte,
        MethodParameter::ByteArray(_) => PrimitiveType::ByteArray,
        MethodParameter::Char(_) => PrimitiveType::Char,
        MethodParameter::String(_) => PrimitiveType::String,
        MethodParameter::UInt32(_) => PrimitiveType::UInt32,
        MethodParameter::UInt64(_) => PrimitiveType::UInt64,
        MethodParameter::Int32(_) => PrimitiveType::Int32,
        MethodParameter::Int64(_) => PrimitiveType::Int64,
        MethodParameter::Address(_) => PrimitiveType::Address,
    }
}
