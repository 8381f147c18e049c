// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Reconciles account-style internal transfers with the unspent-output
//! ledger. At most one "condensing" transaction is built per execution: it
//! consumes the participating contracts' recorded outputs plus the current
//! transaction's own output, and emits one output per distinct recipient,
//! summed, with any remainder returned to the contract's reconciliation
//! script.

use std::collections::{BTreeMap, BTreeSet};

use scvm_shared::transaction::{
    ContractUnspentOutput, OutPoint, OutputScript, Transaction, TxInput, TxOutput,
};
use scvm_shared::{Address, Amount};
use thiserror::Error;

use crate::context::TransactionContext;
use crate::state::{TrackedRepository, TransferInfo};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransferError {
    /// A contract moved more value than it holds. Balance checks make this
    /// unreachable; hitting it means the engine itself is broken.
    #[error("account {0} spent more than its recorded balance")]
    Overspend(Address),
}

pub struct TransferProcessor;

impl TransferProcessor {
    /// Builds the reconciliation transaction (if one is needed) and updates
    /// the contracts' recorded unspent outputs in the tracked view.
    ///
    /// With `revert` set, attempted transfers are discarded; the only
    /// possible transaction is a full refund of the incoming value to the
    /// original sender, and no state is written.
    pub fn process(
        repository: &mut TrackedRepository,
        contract_address: Option<Address>,
        tx_ctx: &TransactionContext,
        transfers: &[TransferInfo],
        revert: bool,
    ) -> Result<Option<Transaction>, TransferError> {
        if revert {
            if tx_ctx.value == 0 {
                return Ok(None);
            }
            return Ok(Some(refund_transaction(tx_ctx)));
        }

        let Some(contract) = contract_address else {
            return Ok(None);
        };

        let mut deltas: BTreeMap<Address, i128> = BTreeMap::new();
        for t in transfers {
            *deltas.entry(t.to).or_default() += t.value as i128;
            *deltas.entry(t.from).or_default() -= t.value as i128;
        }
        deltas.retain(|_, v| *v != 0);

        let prior = repository.unspent_output(&contract);
        let incoming = tx_ctx.value;

        if deltas.is_empty() {
            if incoming == 0 {
                return Ok(None);
            }
            if prior.is_none() {
                // Value retained without movement: record it, no
                // transaction needed.
                repository.set_unspent_output(
                    contract,
                    Some(ContractUnspentOutput {
                        tx_hash: tx_ctx.tx_hash,
                        index: tx_ctx.vout_index,
                        value: incoming,
                    }),
                );
                return Ok(None);
            }
            // Prior balance plus fresh value: condense the two outputs into
            // one.
        }

        Ok(Some(condense(
            repository, contract, tx_ctx, incoming, &deltas,
        )?))
    }
}

fn refund_transaction(tx_ctx: &TransactionContext) -> Transaction {
    Transaction {
        inputs: vec![TxInput {
            outpoint: OutPoint::new(tx_ctx.tx_hash, tx_ctx.vout_index),
        }],
        outputs: vec![TxOutput {
            value: tx_ctx.value,
            script: OutputScript::Address(tx_ctx.sender),
        }],
    }
}

fn condense(
    repository: &mut TrackedRepository,
    contract: Address,
    tx_ctx: &TransactionContext,
    incoming: Amount,
    deltas: &BTreeMap<Address, i128>,
) -> Result<Transaction, TransferError> {
    let mut involved: BTreeSet<Address> = deltas.keys().copied().collect();
    involved.insert(contract);

    let mut inputs = Vec::new();
    let mut balances: BTreeMap<Address, i128> = BTreeMap::new();
    // Contract-held value is re-emitted to the owner's reconciliation
    // script and its record updated; plain recipients get ordinary outputs.
    let mut tracked: BTreeSet<Address> = BTreeSet::new();
    tracked.insert(contract);

    for addr in &involved {
        if let Some(unspent) = repository.unspent_output(addr) {
            inputs.push(TxInput {
                outpoint: unspent.outpoint(),
            });
            *balances.entry(*addr).or_default() += unspent.value as i128;
            tracked.insert(*addr);
        } else if repository.code(addr).is_some() {
            tracked.insert(*addr);
        }
    }
    if incoming > 0 {
        inputs.push(TxInput {
            outpoint: OutPoint::new(tx_ctx.tx_hash, tx_ctx.vout_index),
        });
        *balances.entry(contract).or_default() += incoming as i128;
    }

    for (addr, delta) in deltas {
        *balances.entry(*addr).or_default() += delta;
    }
    for (addr, balance) in &balances {
        if *balance < 0 {
            return Err(TransferError::Overspend(*addr));
        }
    }

    let outputs: Vec<TxOutput> = balances
        .iter()
        .filter(|(_, balance)| **balance > 0)
        .map(|(addr, balance)| TxOutput {
            value: *balance as Amount,
            script: if tracked.contains(addr) {
                OutputScript::Contract(*addr)
            } else {
                OutputScript::Address(*addr)
            },
        })
        .collect();

    let transaction = Transaction { inputs, outputs };
    let tx_hash = transaction.hash();

    for addr in &tracked {
        let output_index = transaction
            .outputs
            .iter()
            .position(|o| o.script == OutputScript::Contract(*addr));
        let record = output_index.map(|index| ContractUnspentOutput {
            tx_hash,
            index: index as u32,
            value: transaction.outputs[index].value,
        });
        if record.is_none() && repository.unspent_output(addr).is_none() {
            continue;
        }
        repository.set_unspent_output(*addr, record);
    }

    Ok(transaction)
}
