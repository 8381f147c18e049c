// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use scvm_shared::transaction::ContractUnspentOutput;
use scvm_shared::Address;

/// The account/storage repository contract the surrounding ledger layer
/// provides. The engine never writes through it mid-execution; all writes
/// accumulate in a tracked view and are committed once, at the end of a
/// successful invocation.
pub trait Repository {
    fn code(&self, addr: &Address) -> Option<Vec<u8>>;
    fn set_code(&mut self, addr: Address, code: Vec<u8>);

    fn contract_type(&self, addr: &Address) -> Option<String>;
    fn set_contract_type(&mut self, addr: Address, type_name: String);

    fn storage_value(&self, addr: &Address, key: &[u8]) -> Option<Vec<u8>>;
    fn set_storage_value(&mut self, addr: Address, key: Vec<u8>, value: Vec<u8>);

    fn account_exists(&self, addr: &Address) -> bool;
    fn create_account(&mut self, addr: Address);

    fn unspent_output(&self, addr: &Address) -> Option<ContractUnspentOutput>;
    fn set_unspent_output(&mut self, addr: Address, output: Option<ContractUnspentOutput>);
}

/// In-memory [`Repository`]. The reference implementation and the test
/// double; production embedders supply their own persistence-backed one.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    code: HashMap<Address, Vec<u8>>,
    contract_type: HashMap<Address, String>,
    storage: HashMap<(Address, Vec<u8>), Vec<u8>>,
    accounts: HashSet<Address>,
    unspent: HashMap<Address, ContractUnspentOutput>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepository {
    fn code(&self, addr: &Address) -> Option<Vec<u8>> {
        self.code.get(addr).cloned()
    }

    fn set_code(&mut self, addr: Address, code: Vec<u8>) {
        self.code.insert(addr, code);
    }

    fn contract_type(&self, addr: &Address) -> Option<String> {
        self.contract_type.get(addr).cloned()
    }

    fn set_contract_type(&mut self, addr: Address, type_name: String) {
        self.contract_type.insert(addr, type_name);
    }

    fn storage_value(&self, addr: &Address, key: &[u8]) -> Option<Vec<u8>> {
        self.storage.get(&(*addr, key.to_vec())).cloned()
    }

    fn set_storage_value(&mut self, addr: Address, key: Vec<u8>, value: Vec<u8>) {
        self.storage.insert((addr, key), value);
    }

    fn account_exists(&self, addr: &Address) -> bool {
        self.accounts.contains(addr) || self.code.contains_key(addr)
    }

    fn create_account(&mut self, addr: Address) {
        self.accounts.insert(addr);
    }

    fn unspent_output(&self, addr: &Address) -> Option<ContractUnspentOutput> {
        self.unspent.get(addr).copied()
    }

    fn set_unspent_output(&mut self, addr: Address, output: Option<ContractUnspentOutput>) {
        match output {
            Some(o) => self.unspent.insert(addr, o),
            None => self.unspent.remove(&addr),
        };
    }
}

/// Accumulated writes of one tracked view. `None` in `unspent` records an
/// explicit clear, distinct from "not written".
#[derive(Debug, Clone, Default)]
pub(crate) struct WriteSet {
    code: HashMap<Address, Vec<u8>>,
    contract_type: HashMap<Address, String>,
    storage: HashMap<(Address, Vec<u8>), Vec<u8>>,
    accounts: HashSet<Address>,
    unspent: HashMap<Address, Option<ContractUnspentOutput>>,
}

/// A copy-on-write view over a shared backing repository. Reads fall
/// through to the backing store; writes stay local until `commit`. Forking
/// clones the pending write set, so a discarded fork never touches its
/// ancestors.
pub struct TrackedRepository {
    backing: Rc<RefCell<dyn Repository>>,
    writes: WriteSet,
}

impl TrackedRepository {
    pub fn new(backing: Rc<RefCell<dyn Repository>>) -> Self {
        TrackedRepository {
            backing,
            writes: WriteSet::default(),
        }
    }

    pub fn fork(&self) -> TrackedRepository {
        TrackedRepository {
            backing: self.backing.clone(),
            writes: self.writes.clone(),
        }
    }

    /// Adopts a child fork's writes wholesale. The child's view already
    /// contains this view's writes (it was forked from them), so adoption
    /// is replacement, not merging.
    pub(crate) fn adopt(&mut self, child: TrackedRepository) {
        self.writes = child.writes;
    }

    /// Flushes every tracked write into the backing repository.
    pub fn commit(self) {
        let mut backing = self.backing.borrow_mut();
        for addr in self.writes.accounts {
            backing.create_account(addr);
        }
        for (addr, code) in self.writes.code {
            backing.set_code(addr, code);
        }
        for (addr, type_name) in self.writes.contract_type {
            backing.set_contract_type(addr, type_name);
        }
        for ((addr, key), value) in self.writes.storage {
            backing.set_storage_value(addr, key, value);
        }
        for (addr, output) in self.writes.unspent {
            backing.set_unspent_output(addr, output);
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.code.len()
            + self.writes.contract_type.len()
            + self.writes.storage.len()
            + self.writes.accounts.len()
            + self.writes.unspent.len()
    }

    pub fn code(&self, addr: &Address) -> Option<Vec<u8>> {
        self.writes
            .code
            .get(addr)
            .cloned()
            .or_else(|| self.backing.borrow().code(addr))
    }

    pub fn set_code(&mut self, addr: Address, code: Vec<u8>) {
        self.writes.code.insert(addr, code);
    }

    pub fn contract_type(&self, addr: &Address) -> Option<String> {
        self.writes
            .contract_type
            .get(addr)
            .cloned()
            .or_else(|| self.backing.borrow().contract_type(addr))
    }

    pub fn set_contract_type(&mut self, addr: Address, type_name: String) {
        self.writes.contract_type.insert(addr, type_name);
    }

    pub fn storage_value(&self, addr: &Address, key: &[u8]) -> Option<Vec<u8>> {
        self.writes
            .storage
            .get(&(*addr, key.to_vec()))
            .cloned()
            .or_else(|| self.backing.borrow().storage_value(addr, key))
    }

    pub fn set_storage_value(&mut self, addr: Address, key: Vec<u8>, value: Vec<u8>) {
        self.writes.storage.insert((addr, key), value);
    }

    pub fn account_exists(&self, addr: &Address) -> bool {
        self.writes.accounts.contains(addr)
            || self.writes.code.contains_key(addr)
            || self.backing.borrow().account_exists(addr)
    }

    pub fn create_account(&mut self, addr: Address) {
        self.writes.accounts.insert(addr);
    }

    pub fn unspent_output(&self, addr: &Address) -> Option<ContractUnspentOutput> {
        match self.writes.unspent.get(addr) {
            Some(written) => *written,
            None => self.backing.borrow().unspent_output(addr),
        }
    }

    pub fn set_unspent_output(&mut self, addr: Address, output: Option<ContractUnspentOutput>) {
        self.writes.unspent.insert(addr, output);
    }
}
