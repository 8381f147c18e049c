// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Canonical byte encoding for method parameters.
//!
//! Every value is encoded as a one-byte type tag followed by a payload.
//! Integers and length prefixes use unsigned varints (signed values are
//! zigzag-mapped first), so the binary form of a parameter list is never
//! larger than the equivalent textual `tag#value` rendering.

use std::fmt;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use thiserror::Error;
use unsigned_varint::{decode as varint_decode, encode as varint_encode};

use crate::Address;
use crate::address::ADDRESS_LENGTH;

/// Wire tags for the closed parameter type set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum ParamTag {
    Bool = 1,
    Byte = 2,
    ByteArray = 3,
    Char = 4,
    String = 5,
    UInt32 = 6,
    UInt64 = 7,
    Int32 = 8,
    Int64 = 9,
    Address = 10,
}

/// A single typed method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodParameter {
    Bool(bool),
    Byte(u8),
    ByteArray(Vec<u8>),
    Char(char),
    String(String),
    UInt32(u32),
    UInt64(u64),
    Int32(i32),
    Int64(i64),
    Address(Address),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParamCodecError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unknown parameter type tag {0}")]
    UnknownTag(u8),
    #[error("invalid varint")]
    InvalidVarint,
    #[error("value out of range for declared type")]
    OutOfRange,
    #[error("invalid utf-8 payload")]
    InvalidUtf8,
    #[error("{0} trailing bytes after last parameter")]
    TrailingBytes(usize),
}

fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

fn unzigzag(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

fn put_uvarint(out: &mut Vec<u8>, v: u64) {
    let mut buf = varint_encode::u64_buffer();
    out.extend_from_slice(varint_encode::u64(v, &mut buf));
}

fn take_uvarint(input: &mut &[u8]) -> Result<u64, ParamCodecError> {
    let (v, rest) = varint_decode::u64(input).map_err(|_| ParamCodecError::InvalidVarint)?;
    *input = rest;
    Ok(v)
}

fn take_bytes<'a>(input: &mut &'a [u8], len: usize) -> Result<&'a [u8], ParamCodecError> {
    if input.len() < len {
        return Err(ParamCodecError::UnexpectedEof);
    }
    let (head, rest) = input.split_at(len);
    *input = rest;
    Ok(head)
}

impl MethodParameter {
    pub fn tag(&self) -> ParamTag {
        match self {
            MethodParameter::Bool(_) => ParamTag::Bool,
            MethodParameter::Byte(_) => ParamTag::Byte,
            MethodParameter::ByteArray(_) => ParamTag::ByteArray,
            MethodParameter::Char(_) => ParamTag::Char,
            MethodParameter::String(_) => ParamTag::String,
            MethodParameter::UInt32(_) => ParamTag::UInt32,
            MethodParameter::UInt64(_) => ParamTag::UInt64,
            MethodParameter::Int32(_) => ParamTag::Int32,
            MethodParameter::Int64(_) => ParamTag::Int64,
            MethodParameter::Address(_) => ParamTag::Address,
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.tag() as u8);
        match self {
            MethodParameter::Bool(v) => out.push(*v as u8),
            MethodParameter::Byte(v) => out.push(*v),
            MethodParameter::ByteArray(v) => {
                put_uvarint(out, v.len() as u64);
                out.extend_from_slice(v);
            }
            MethodParameter::Char(v) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(v.encode_utf8(&mut buf).as_bytes());
            }
            MethodParameter::String(v) => {
                put_uvarint(out, v.len() as u64);
                out.extend_from_slice(v.as_bytes());
            }
            MethodParameter::UInt32(v) => put_uvarint(out, *v as u64),
            MethodParameter::UInt64(v) => put_uvarint(out, *v),
            MethodParameter::Int32(v) => put_uvarint(out, zigzag(*v as i64)),
            MethodParameter::Int64(v) => put_uvarint(out, zigzag(*v)),
            MethodParameter::Address(v) => out.extend_from_slice(v.as_bytes()),
        }
    }

    fn decode_one(input: &mut &[u8]) -> Result<MethodParameter, ParamCodecError> {
        let tag_byte = *input.first().ok_or(ParamCodecError::UnexpectedEof)?;
        *input = &input[1..];
        let tag = ParamTag::from_u8(tag_byte).ok_or(ParamCodecError::UnknownTag(tag_byte))?;
        let value = match tag {
            ParamTag::Bool => {
                let b = take_bytes(input, 1)?[0];
                match b {
                    0 => MethodParameter::Bool(false),
                    1 => MethodParameter::Bool(true),
                    _ => return Err(ParamCodecError::OutOfRange),
                }
            }
            ParamTag::Byte => MethodParameter::Byte(take_bytes(input, 1)?[0]),
            ParamTag::ByteArray => {
                let len = take_uvarint(input)? as usize;
                MethodParameter::ByteArray(take_bytes(input, len)?.to_vec())
            }
            ParamTag::Char => {
                let first = *input.first().ok_or(ParamCodecError::UnexpectedEof)?;
                let width = utf8_width(first).ok_or(ParamCodecError::InvalidUtf8)?;
                let raw = take_bytes(input, width)?;
                let s = std::str::from_utf8(raw).map_err(|_| ParamCodecError::InvalidUtf8)?;
                MethodParameter::Char(s.chars().next().ok_or(ParamCodecError::InvalidUtf8)?)
            }
            ParamTag::String => {
                let len = take_uvarint(input)? as usize;
                let raw = take_bytes(input, len)?;
                MethodParameter::String(
                    String::from_utf8(raw.to_vec()).map_err(|_| ParamCodecError::InvalidUtf8)?,
                )
            }
            ParamTag::UInt32 => {
                let v = take_uvarint(input)?;
                MethodParameter::UInt32(u32::try_from(v).map_err(|_| ParamCodecError::OutOfRange)?)
            }
            ParamTag::UInt64 => MethodParameter::UInt64(take_uvarint(input)?),
            ParamTag::Int32 => {
                let v = unzigzag(take_uvarint(input)?);
                MethodParameter::Int32(i32::try_from(v).map_err(|_| ParamCodecError::OutOfRange)?)
            }
            ParamTag::Int64 => MethodParameter::Int64(unzigzag(take_uvarint(input)?)),
            ParamTag::Address => {
                let raw = take_bytes(input, ADDRESS_LENGTH)?;
                // Length is exact, from_slice cannot fail here.
                MethodParameter::Address(
                    Address::from_slice(raw).map_err(|_| ParamCodecError::UnexpectedEof)?,
                )
            }
        };
        Ok(value)
    }

    /// The textual `tag#value` rendering the binary codec is measured
    /// against.
    pub fn to_text(&self) -> String {
        format!("{}#{}", self.tag() as u8, self)
    }
}

impl fmt::Display for MethodParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodParameter::Bool(v) => write!(f, "{v}"),
            MethodParameter::Byte(v) => write!(f, "{v}"),
            MethodParameter::ByteArray(v) => write!(f, "{}", hex::encode(v)),
            MethodParameter::Char(v) => write!(f, "'{v}'"),
            MethodParameter::String(v) => write!(f, "\"{v}\""),
            MethodParameter::UInt32(v) => write!(f, "{v}"),
            MethodParameter::UInt64(v) => write!(f, "{v}"),
            MethodParameter::Int32(v) => write!(f, "{v}"),
            MethodParameter::Int64(v) => write!(f, "{v}"),
            MethodParameter::Address(v) => write!(f, "{v}"),
        }
    }
}

/// Encodes an ordered parameter list: varint count, then each value.
pub fn encode_params(params: &[MethodParameter]) -> Vec<u8> {
    let mut out = Vec::new();
    put_uvarint(&mut out, params.len() as u64);
    for p in params {
        p.encode_into(&mut out);
    }
    out
}

/// Decodes a parameter list. The input must be consumed exactly; trailing
/// bytes are an error, never ignored.
pub fn decode_params(bytes: &[u8]) -> Result<Vec<MethodParameter>, ParamCodecError> {
    let mut input = bytes;
    let count = take_uvarint(&mut input)? as usize;
    let mut params = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        params.push(MethodParameter::decode_one(&mut input)?);
    }
    if !input.is_empty() {
        return Err(ParamCodecError::TrailingBytes(input.len()));
    }
    Ok(params)
}

/// A value-struct composed of supported primitive fields, in its canonical
/// storage form. Field order is part of the encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructValue {
    pub type_name: String,
    pub fields: Vec<(String, MethodParameter)>,
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    put_uvarint(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

fn take_str(input: &mut &[u8]) -> Result<String, ParamCodecError> {
    let len = take_uvarint(input)? as usize;
    let raw = take_bytes(input, len)?;
    String::from_utf8(raw.to_vec()).map_err(|_| ParamCodecError::InvalidUtf8)
}

/// Encodes a value-struct: type name, field count, then `(name, value)`
/// pairs in declaration order.
pub fn encode_struct(value: &StructValue) -> Vec<u8> {
    let mut out = Vec::new();
    put_str(&mut out, &value.type_name);
    put_uvarint(&mut out, value.fields.len() as u64);
    for (name, field) in &value.fields {
        put_str(&mut out, name);
        field.encode_into(&mut out);
    }
    out
}

/// Decodes a value-struct, consuming the input exactly.
pub fn decode_struct(bytes: &[u8]) -> Result<StructValue, ParamCodecError> {
    let mut input = bytes;
    let type_name = take_str(&mut input)?;
    let count = take_uvarint(&mut input)? as usize;
    let mut fields = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let name = take_str(&mut input)?;
        fields.push((name, MethodParameter::decode_one(&mut input)?));
    }
    if !input.is_empty() {
        return Err(ParamCodecError::TrailingBytes(input.len()));
    }
    Ok(StructValue { type_name, fields })
}

fn utf8_width(first: u8) -> Option<usize> {
    match first {
        0x00..=0x7f => Some(1),
        0xc0..=0xdf => Some(2),
        0xe0..=0xef => Some(3),
        0xf0..=0xf7 => Some(4),
        _ => None,
    }
}
