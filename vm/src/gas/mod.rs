// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

pub use self::price_list::{PriceList, PRICES};

mod price_list;

use scvm_shared::{Gas, MemoryUnits};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[error("gas limit exceeded")]
pub struct OutOfGas;

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[error("memory limit exceeded")]
pub struct OutOfMemory;

/// Counts gas spent against a fixed limit. A failed spend is all-or-nothing:
/// the counters are left exactly as they were.
#[derive(Debug, Clone)]
pub struct GasMeter {
    limit: Gas,
    consumed: Gas,
}

impl GasMeter {
    pub fn new(limit: Gas) -> Self {
        GasMeter { limit, consumed: 0 }
    }

    pub fn limit(&self) -> Gas {
        self.limit
    }

    pub fn consumed(&self) -> Gas {
        self.consumed
    }

    pub fn available(&self) -> Gas {
        self.limit - self.consumed
    }

    pub fn spend(&mut self, amount: Gas) -> Result<(), OutOfGas> {
        if amount > self.available() {
            log::trace!("out of gas: spend {} > available {}", amount, self.available());
            return Err(OutOfGas);
        }
        self.consumed += amount;
        log::trace!("spent {} gas, {} available", amount, self.available());
        Ok(())
    }
}

/// Counts tracked allocation units against a hard ceiling, independent of
/// gas. Symmetric to [`GasMeter`].
#[derive(Debug, Clone)]
pub struct MemoryMeter {
    limit: MemoryUnits,
    consumed: MemoryUnits,
}

impl MemoryMeter {
    pub fn new(limit: MemoryUnits) -> Self {
        MemoryMeter { limit, consumed: 0 }
    }

    pub fn limit(&self) -> MemoryUnits {
        self.limit
    }

    pub fn consumed(&self) -> MemoryUnits {
        self.consumed
    }

    pub fn available(&self) -> MemoryUnits {
        self.limit - self.consumed
    }

    pub fn reserve(&mut self, units: MemoryUnits) -> Result<(), OutOfMemory> {
        if units > self.available() {
            log::trace!(
                "over memory limit: reserve {} > available {}",
                units,
                self.available()
            );
            return Err(OutOfMemory);
        }
        self.consumed += units;
        Ok(())
    }
}

/// The paired counters bound to one invocation. Threaded explicitly through
/// the interpreter; concurrent invocations of a shared loaded module each
/// carry their own observer.
#[derive(Debug)]
pub struct Observer {
    pub gas: GasMeter,
    pub memory: MemoryMeter,
}

impl Observer {
    pub fn new(gas: GasMeter, memory: MemoryMeter) -> Self {
        Observer { gas, memory }
    }

    /// Observer with the default memory ceiling from the price list.
    pub fn with_gas_limit(gas_limit: Gas) -> Self {
        Observer {
            gas: GasMeter::new(gas_limit),
            memory: MemoryMeter::new(PRICES.memory_limit),
        }
    }
}
