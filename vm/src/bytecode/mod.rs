// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! The contract module object model. Modules arrive as an opaque byte blob
//! produced by an out-of-scope compiler front-end; this crate only decodes,
//! validates, instruments, and executes them.

pub use self::instruction::{FloatOp, Instruction};

mod instruction;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a module content hash in bytes.
pub const CODE_HASH_LENGTH: usize = 32;

/// Blake2b-256 over the raw module blob; the engine's cache key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeHash([u8; CODE_HASH_LENGTH]);

impl CodeHash {
    pub fn of(code: &[u8]) -> CodeHash {
        let digest = blake2b_simd::Params::new()
            .hash_length(CODE_HASH_LENGTH)
            .hash(code);
        let mut out = [0u8; CODE_HASH_LENGTH];
        out.copy_from_slice(digest.as_bytes());
        CodeHash(out)
    }

    pub fn as_bytes(&self) -> &[u8; CODE_HASH_LENGTH] {
        &self.0
    }
}

impl fmt::Display for CodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for CodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The primitive value types a contract can take as parameters or keep in
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveType {
    Bool,
    Byte,
    ByteArray,
    Char,
    String,
    UInt32,
    UInt64,
    Int32,
    Int64,
    Address,
}

/// A declared method parameter type. `Context` is the designated
/// context-injection type a constructor must lead with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    Context,
    Primitive(PrimitiveType),
    /// Single-dimensional array of a primitive element type.
    Array(PrimitiveType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Contract,
    ValueStruct,
    RefClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Internal,
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: PrimitiveType,
    pub is_static: bool,
    pub is_mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub visibility: Visibility,
    pub is_constructor: bool,
    pub is_generic: bool,
    pub params: Vec<ParamType>,
    pub locals: u16,
    pub body: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    /// Number of generic type parameters; anything non-zero is rejected by
    /// the determinism validator.
    pub generic_params: u8,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
}

impl TypeDef {
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn constructor(&self) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.is_constructor)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A parsed contract module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContractModule {
    pub assembly_refs: Vec<String>,
    pub types: Vec<TypeDef>,
}

#[derive(Debug, Error)]
pub enum ModuleDecodeError {
    #[error("malformed module blob: {0}")]
    Malformed(String),
    #[error("module blob is empty")]
    Empty,
}

impl ContractModule {
    pub fn decode(bytes: &[u8]) -> Result<ContractModule, ModuleDecodeError> {
        if bytes.is_empty() {
            return Err(ModuleDecodeError::Empty);
        }
        serde_cbor::from_slice(bytes).map_err(|e| ModuleDecodeError::Malformed(e.to_string()))
    }

    /// Canonical blob form; what `decode` accepts and what gets hashed for
    /// the engine cache.
    pub fn encode(&self) -> Vec<u8> {
        // A plain object graph with no map keys beyond struct fields cannot
        // fail CBOR serialization.
        serde_cbor::to_vec(self).expect("module serialization cannot fail")
    }

    pub fn contract_types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.iter().filter(|t| t.kind == TypeKind::Contract)
    }

    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.name == name)
    }

    /// The module's single contract type, when unambiguous.
    pub fn default_contract_type(&self) -> Option<&TypeDef> {
        let mut it = self.contract_types();
        let first = it.next()?;
        if it.next().is_some() {
            return None;
        }
        Some(first)
    }
}
