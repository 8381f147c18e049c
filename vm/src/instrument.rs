// Copyright 2022-2026 SCVM Core Devs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Metering injection. Every method body is split into basic blocks
//! (method entry, branch targets, post-branch fall-throughs); each block is
//! prefixed with a `ChargeGas` covering the static cost of the
//! instructions it contains, so loop back-edges re-charge their block on
//! every iteration. Value-dependent costs (storage bytes, log bytes,
//! allocations, nested operations) are charged by the interpreter at
//! execution time against the same observer.

use std::collections::BTreeSet;

use scvm_shared::Gas;

use crate::bytecode::{ContractModule, Instruction};
use crate::gas::PRICES;

/// Produces the instrumented twin of a validated module.
pub fn instrument_module(module: &ContractModule) -> ContractModule {
    let mut out = module.clone();
    for ty in &mut out.types {
        for method in &mut ty.methods {
            method.body = instrument_body(&method.body);
        }
    }
    out
}

fn instrument_body(body: &[Instruction]) -> Vec<Instruction> {
    if body.is_empty() {
        return Vec::new();
    }

    let leaders = block_leaders(body);

    // Cost of the block starting at each leader: static per-instruction cost
    // up to (excluding) the next leader.
    let leader_list: Vec<usize> = leaders.iter().copied().collect();
    let mut block_cost = vec![0u64; leader_list.len()];
    for (b, &start) in leader_list.iter().enumerate() {
        let end = leader_list.get(b + 1).copied().unwrap_or(body.len());
        block_cost[b] = body[start..end]
            .iter()
            .map(|i| PRICES.on_instruction(i.operand_bytes()))
            .sum::<Gas>();
    }

    // An instruction at old index i lands at i + |leaders <= i|; the charge
    // for a leader sits immediately before it, which is where branches into
    // the block must land.
    let inserted_before = |i: usize| leaders.iter().take_while(|&&l| l <= i).count();
    let charge_position = |leader: usize| leader + inserted_before(leader) - 1;

    let mut out = Vec::with_capacity(body.len() + leader_list.len());
    for (i, instruction) in body.iter().enumerate() {
        if let Some(b) = leader_list.iter().position(|&l| l == i) {
            out.push(Instruction::ChargeGas(block_cost[b]));
        }
        let mut instruction = instruction.clone();
        if let Some(target) = instruction.branch_target() {
            instruction.set_branch_target(charge_position(target as usize) as u32);
        }
        out.push(instruction);
    }
    out
}

fn block_leaders(body: &[Instruction]) -> BTreeSet<usize> {
    let mut leaders = BTreeSet::new();
    leaders.insert(0);
    for (i, instruction) in body.iter().enumerate() {
        if let Some(target) = instruction.branch_target() {
            leaders.insert(target as usize);
        }
        if instruction.ends_block() && i + 1 < body.len() {
            leaders.insert(i + 1);
        }
    }
    leaders
}
