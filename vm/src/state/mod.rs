// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! The layered execution state. A `State` owns a tracked repository view,
//! the pending internal transfers, the log holder, and the balance record
//! for one layer of execution. `snapshot` forks a child layer; committing
//! is only legal from a parent into its own direct child, which keeps
//! skip-level commits structurally impossible.

mod repository;

pub use repository::{MemoryRepository, Repository, TrackedRepository};

use std::cell::RefCell;
use std::rc::Rc;

use scvm_shared::{Address, Amount};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<Vec<u8>>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogHolder {
    entries: Vec<LogEntry>,
}

impl LogHolder {
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }
}

/// One accumulated internal value movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferInfo {
    pub from: Address,
    pub to: Address,
    pub value: Amount,
}

/// Records the single value movement arriving with the outer transaction,
/// kept distinct from internal transfers until reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceState {
    initial: Option<(Address, Amount)>,
}

impl BalanceState {
    pub fn set_initial_transfer(&mut self, to: Address, amount: Amount) {
        self.initial = Some((to, amount));
    }

    pub fn initial_transfer(&self) -> Option<(Address, Amount)> {
        self.initial
    }

    fn credit_for(&self, addr: &Address) -> Amount {
        match self.initial {
            Some((to, amount)) if to == *addr => amount,
            _ => 0,
        }
    }
}

/// Counters shared by reference across a whole snapshot lineage. The
/// creation nonce is monotonic and never rolled back, so contract
/// addresses are unique even across aborted branches.
#[derive(Debug, Default)]
struct Lineage {
    next_nonce: u64,
    next_state_id: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("state {child} is not a direct child of state {parent}")]
    NotAChild { parent: u64, child: u64 },
}

pub struct State {
    id: u64,
    parent_id: Option<u64>,
    repository: TrackedRepository,
    transfers: Vec<TransferInfo>,
    logs: LogHolder,
    balance: BalanceState,
    lineage: Rc<RefCell<Lineage>>,
}

impl State {
    /// Root layer over a persistent repository.
    pub fn new(backing: Rc<RefCell<dyn Repository>>) -> State {
        State {
            id: 0,
            parent_id: None,
            repository: TrackedRepository::new(backing),
            transfers: Vec::new(),
            logs: LogHolder::default(),
            balance: BalanceState::default(),
            lineage: Rc::new(RefCell::new(Lineage {
                next_nonce: 0,
                next_state_id: 1,
            })),
        }
    }

    /// Forks a child layer. The child sees everything this layer sees and
    /// accumulates its own writes, transfers, and logs until committed.
    pub fn snapshot(&self) -> State {
        let id = {
            let mut lineage = self.lineage.borrow_mut();
            let id = lineage.next_state_id;
            lineage.next_state_id += 1;
            id
        };
        State {
            id,
            parent_id: Some(self.id),
            repository: self.repository.fork(),
            transfers: self.transfers.clone(),
            logs: self.logs.clone(),
            balance: self.balance,
            lineage: self.lineage.clone(),
        }
    }

    /// Commits a direct child into this layer: repository writes, logs, and
    /// the pending-transfer list are adopted atomically. Transitioning into
    /// anything but a direct child (a grandchild, a sibling) fails without
    /// touching this layer.
    pub fn transition_to(&mut self, child: State) -> Result<(), StateError> {
        if child.parent_id != Some(self.id) {
            return Err(StateError::NotAChild {
                parent: self.id,
                child: child.id,
            });
        }
        self.repository.adopt(child.repository);
        self.logs = child.logs;
        self.transfers = child.transfers;
        self.balance = child.balance;
        Ok(())
    }

    /// Next creation nonce. Shared across the lineage and never reset, even
    /// when the branch that consumed it is later discarded.
    pub fn next_nonce(&self) -> u64 {
        let mut lineage = self.lineage.borrow_mut();
        let nonce = lineage.next_nonce;
        lineage.next_nonce += 1;
        nonce
    }

    /// The account's balance as seen by executing code: recorded unspent
    /// output, plus the outer transaction's incoming value, plus the net of
    /// pending internal transfers.
    pub fn get_balance(&self, addr: &Address) -> Amount {
        let base = self
            .repository
            .unspent_output(addr)
            .map(|o| o.value)
            .unwrap_or(0);
        let mut balance = base as i128 + self.balance.credit_for(addr) as i128;
        for t in &self.transfers {
            if t.to == *addr {
                balance += t.value as i128;
            }
            if t.from == *addr {
                balance -= t.value as i128;
            }
        }
        balance.max(0) as Amount
    }

    pub fn set_initial_transfer(&mut self, to: Address, amount: Amount) {
        self.balance.set_initial_transfer(to, amount);
    }

    pub fn initial_transfer(&self) -> Option<(Address, Amount)> {
        self.balance.initial_transfer()
    }

    pub fn add_transfer(&mut self, transfer: TransferInfo) {
        self.transfers.push(transfer);
    }

    pub fn transfers(&self) -> &[TransferInfo] {
        &self.transfers
    }

    pub fn add_log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
    }

    pub fn logs(&self) -> &LogHolder {
        &self.logs
    }

    pub fn repository(&self) -> &TrackedRepository {
        &self.repository
    }

    pub fn repository_mut(&mut self) -> &mut TrackedRepository {
        &mut self.repository
    }

    /// Consumes the root layer and flushes its tracked writes into the
    /// backing repository.
    pub fn commit(self) {
        self.repository.commit();
    }
}
