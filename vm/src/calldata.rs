// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! The on-chain invocation envelope. Carried inside an output script of the
//! outer ledger transaction; decoding is strict — short, unknown, or
//! trailing bytes fail explicitly, never silently default.

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use scvm_shared::address::ADDRESS_LENGTH;
use scvm_shared::params::{decode_params, encode_params, MethodParameter, ParamCodecError};
use scvm_shared::{Address, Gas, CALLDATA_VERSION};
use thiserror::Error;

/// Opcode tag for contract creation.
pub const OP_CREATE: u8 = 0xc0;
/// Opcode tag for a method invocation on an existing contract.
pub const OP_CALL: u8 = 0xc1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallPayload {
    Create {
        code: Vec<u8>,
        parameters: Vec<MethodParameter>,
    },
    Call {
        to: Address,
        method: String,
        parameters: Vec<MethodParameter>,
    },
}

/// Immutable envelope of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractTxData {
    pub version: u32,
    pub gas_price: u64,
    pub gas_limit: Gas,
    pub payload: CallPayload,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallDataError {
    #[error("call data ends prematurely")]
    UnexpectedEof,
    #[error("unsupported call-data version {0}")]
    UnsupportedVersion(u32),
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("zero gas limit")]
    ZeroGasLimit,
    #[error("method name is not valid utf-8")]
    BadMethodName,
    #[error("bad parameter encoding: {0}")]
    Params(#[from] ParamCodecError),
    #[error("{0} trailing bytes after call data")]
    TrailingBytes(usize),
}

impl ContractTxData {
    pub fn create(gas_price: u64, gas_limit: Gas, code: Vec<u8>, parameters: Vec<MethodParameter>) -> Self {
        ContractTxData {
            version: CALLDATA_VERSION,
            gas_price,
            gas_limit,
            payload: CallPayload::Create { code, parameters },
        }
    }

    pub fn call(
        gas_price: u64,
        gas_limit: Gas,
        to: Address,
        method: impl Into<String>,
        parameters: Vec<MethodParameter>,
    ) -> Self {
        ContractTxData {
            version: CALLDATA_VERSION,
            gas_price,
            gas_limit,
            payload: CallPayload::Call {
                to,
                method: method.into(),
                parameters,
            },
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self.payload, CallPayload::Create { .. })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<BigEndian>(self.version).expect("vec write");
        let opcode = if self.is_create() { OP_CREATE } else { OP_CALL };
        out.push(opcode);
        out.write_u64::<BigEndian>(self.gas_price).expect("vec write");
        out.write_u64::<BigEndian>(self.gas_limit).expect("vec write");
        match &self.payload {
            CallPayload::Create { code, parameters } => {
                out.write_u32::<BigEndian>(code.len() as u32).expect("vec write");
                out.extend_from_slice(code);
                out.extend_from_slice(&encode_params(parameters));
            }
            CallPayload::Call {
                to,
                method,
                parameters,
            } => {
                out.extend_from_slice(to.as_bytes());
                out.write_u16::<BigEndian>(method.len() as u16).expect("vec write");
                out.extend_from_slice(method.as_bytes());
                out.extend_from_slice(&encode_params(parameters));
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<ContractTxData, CallDataError> {
        let mut cursor = Cursor::new(bytes);

        let version = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| CallDataError::UnexpectedEof)?;
        if version != CALLDATA_VERSION {
            return Err(CallDataError::UnsupportedVersion(version));
        }
        let opcode = cursor.read_u8().map_err(|_| CallDataError::UnexpectedEof)?;
        let gas_price = cursor
            .read_u64::<BigEndian>()
            .map_err(|_| CallDataError::UnexpectedEof)?;
        let gas_limit = cursor
            .read_u64::<BigEndian>()
            .map_err(|_| CallDataError::UnexpectedEof)?;
        if gas_limit == 0 {
            return Err(CallDataError::ZeroGasLimit);
        }

        let payload = match opcode {
            OP_CREATE => {
                let code_len = cursor
                    .read_u32::<BigEndian>()
                    .map_err(|_| CallDataError::UnexpectedEof)? as usize;
                let code = read_exact(&mut cursor, code_len)?;
                let parameters = decode_params(remaining(&cursor))?;
                CallPayload::Create { code, parameters }
            }
            OP_CALL => {
                let to = Address::from_slice(&read_exact(&mut cursor, ADDRESS_LENGTH)?)
                    .map_err(|_| CallDataError::UnexpectedEof)?;
                let method_len = cursor
                    .read_u16::<BigEndian>()
                    .map_err(|_| CallDataError::UnexpectedEof)? as usize;
                let method = String::from_utf8(read_exact(&mut cursor, method_len)?)
                    .map_err(|_| CallDataError::BadMethodName)?;
                let parameters = decode_params(remaining(&cursor))?;
                CallPayload::Call {
                    to,
                    method,
                    parameters,
                }
            }
            other => return Err(CallDataError::UnknownOpcode(other)),
        };

        Ok(ContractTxData {
            version,
            gas_price,
            gas_limit,
            payload,
        })
    }
}

fn read_exact(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<u8>, CallDataError> {
    let mut buf = vec![0u8; len];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| CallDataError::UnexpectedEof)?;
    Ok(buf)
}

/// The parameter list always sits last; hand the rest of the buffer to the
/// parameter codec, which itself rejects trailing bytes.
fn remaining<'a>(cursor: &Cursor<&'a [u8]>) -> &'a [u8] {
    &cursor.get_ref()[cursor.position() as usize..]
}
