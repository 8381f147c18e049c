// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Module loading. Decoding, validation, and instrumentation are expensive
//! static analysis, so loaded modules are cached by content hash and shared
//! across invocations — including concurrent invocations on different
//! threads. A loaded module is immutable; each invocation binds its own
//! [`Observer`](crate::gas::Observer), so shared modules never leak
//! counters between executions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::bytecode::{CodeHash, ContractModule, ModuleDecodeError};
use crate::instrument::instrument_module;
use crate::validation::{validate_module, ValidationError};

/// A validated, instrumented module ready for invocation.
#[derive(Debug)]
pub struct LoadedModule {
    pub code_hash: CodeHash,
    pub module: ContractModule,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Decode(#[from] ModuleDecodeError),
    #[error("module failed validation with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),
}

/// Content-addressed cache of loaded modules.
#[derive(Default)]
pub struct Engine {
    cache: Mutex<HashMap<CodeHash, Arc<LoadedModule>>>,
}

impl Engine {
    pub fn new() -> Self {
        Engine::default()
    }

    /// Loads (or fetches from cache) the instrumented form of `code`.
    /// Validation failures are surfaced with every individual error; a
    /// module that fails validation is never cached and never executed.
    pub fn load(&self, code: &[u8]) -> Result<Arc<LoadedModule>, LoadError> {
        let code_hash = CodeHash::of(code);

        {
            let cache = self.cache.lock().expect("engine cache poisoned");
            if let Some(loaded) = cache.get(&code_hash) {
                log::debug!("module cache hit: {code_hash}");
                return Ok(loaded.clone());
            }
        }

        log::debug!("module cache miss: {code_hash}");
        let module = ContractModule::decode(code)?;
        let validation = validate_module(&module);
        if !validation.is_valid() {
            return Err(LoadError::Validation(validation.errors));
        }
        let loaded = Arc::new(LoadedModule {
            code_hash,
            module: instrument_module(&module),
        });

        let mut cache = self.cache.lock().expect("engine cache poisoned");
        Ok(cache.entry(code_hash).or_insert(loaded).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Instruction, MethodDef, ParamType, TypeDef, TypeKind, Visibility};

    fn minimal_module() -> ContractModule {
        ContractModule {
            assembly_refs: vec![],
            types: vec![TypeDef {
                name: "C".into(),
                kind: TypeKind::Contract,
                generic_params: 0,
                fields: vec![],
                methods: vec![MethodDef {
                    name: ".ctor".into(),
                    visibility: Visibility::Public,
                    is_constructor: true,
                    is_generic: false,
                    params: vec![ParamType::Context],
                    locals: 0,
                    body: vec![Instruction::Return],
                }],
            }],
        }
    }

    #[test]
    fn load_is_cached_by_content() {
        let engine = Engine::new();
        let code = minimal_module().encode();
        let a = engine.load(&code).unwrap();
        let b = engine.load(&code).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn invalid_module_is_not_loadable() {
        let engine = Engine::new();
        let mut module = minimal_module();
        module.types[0].methods[0].is_constructor = false;
        let err = engine.load(&module.encode()).unwrap_err();
        match err {
            LoadError::Validation(errors) => assert!(!errors.is_empty()),
            other => panic!("expected validation failure, got {other}"),
        }
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let engine = Engine::new();
        assert!(matches!(
            engine.load(&[1, 2, 3]),
            Err(LoadError::Decode(_))
        ));
    }

    #[test]
    fn loaded_module_is_instrumented() {
        let engine = Engine::new();
        let loaded = engine.load(&minimal_module().encode()).unwrap();
        let body = &loaded.module.types[0].methods[0].body;
        assert!(matches!(body[0], Instruction::ChargeGas(_)));
    }
}
