// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use lazy_static::lazy_static;
use scvm_shared::{Gas, MemoryUnits};

lazy_static! {
    /// The consensus cost schedule. One schedule per network; all nodes must
    /// agree on it, so it is never configurable at run time.
    pub static ref PRICES: PriceList = PriceList {
        base_call: 10_000,
        base_create: 12_000,
        transfer_cost: 1_000,

        instruction: 1,
        instruction_per_operand_byte: 1,
        method_call: 5,

        storage_read_base: 25,
        storage_read_per_byte: 1,
        storage_write_base: 50,
        storage_write_per_byte: 20,

        log_base: 100,
        log_per_topic_byte: 2,
        log_per_data_byte: 1,

        memory_limit: 10_000,
    };
}

/// Provides prices for operations performed by and around the VM.
#[derive(Debug, Clone)]
pub struct PriceList {
    /// Fixed overhead charged for any method invocation arriving in a ledger
    /// transaction.
    pub base_call: Gas,
    /// Fixed overhead charged for contract creation arriving in a ledger
    /// transaction.
    pub base_create: Gas,
    /// Cost of a plain value movement into an account without code.
    pub transfer_cost: Gas,

    /// Base cost of executing a single instruction.
    pub instruction: Gas,
    /// Additional cost per byte of immediate operand.
    pub instruction_per_operand_byte: Gas,
    /// Cost of dispatching a same-module method call.
    pub method_call: Gas,

    pub storage_read_base: Gas,
    pub storage_read_per_byte: Gas,
    pub storage_write_base: Gas,
    pub storage_write_per_byte: Gas,

    pub log_base: Gas,
    pub log_per_topic_byte: Gas,
    pub log_per_data_byte: Gas,

    /// Hard ceiling on cumulative tracked allocation per invocation,
    /// independent of the gas limit.
    pub memory_limit: MemoryUnits,
}

impl PriceList {
    pub fn on_instruction(&self, operand_bytes: usize) -> Gas {
        self.instruction + self.instruction_per_operand_byte * operand_bytes as Gas
    }

    pub fn on_method_call(&self) -> Gas {
        self.method_call
    }

    pub fn on_storage_read(&self, value_bytes: usize) -> Gas {
        self.storage_read_base + self.storage_read_per_byte * value_bytes as Gas
    }

    pub fn on_storage_write(&self, key_bytes: usize, value_bytes: usize) -> Gas {
        self.storage_write_base + self.storage_write_per_byte * (key_bytes + value_bytes) as Gas
    }

    pub fn on_log(&self, topic_bytes: usize, data_bytes: usize) -> Gas {
        self.log_base
            + self.log_per_topic_byte * topic_bytes as Gas
            + self.log_per_data_byte * data_bytes as Gas
    }

    /// Memory units reserved for an array of `len` elements.
    pub fn memory_for_array(&self, len: usize) -> MemoryUnits {
        len as MemoryUnits
    }

    /// Memory units reserved for a string or byte buffer of `bytes` bytes.
    pub fn memory_for_buffer(&self, bytes: usize) -> MemoryUnits {
        bytes as MemoryUnits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_size_scales_instruction_cost() {
        assert!(PRICES.on_instruction(32) > PRICES.on_instruction(0));
    }

    #[test]
    fn storage_write_charges_key_and_value() {
        let small = PRICES.on_storage_write(4, 4);
        let large = PRICES.on_storage_write(4, 400);
        assert_eq!(large - small, PRICES.storage_write_per_byte * 396);
    }
}
