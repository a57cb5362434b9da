//! Free-list linear scan over register slots.
//!
//! Slots are unbounded, so nothing is ever spilled: an interval takes the most
//! recently freed slot, or a fresh one when the free list is empty.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::diag::CompileError;
use crate::ssa::analysis::liveness;
use crate::ssa::model::ir::{Function, InstKind, ValueId, for_each_inst_use, for_each_term_use};

use super::intervals::{LiveInterval, LiveIntervalMap};
use super::{Reg, ValueClass, ValueTracker};

#[derive(Debug, Clone, Default)]
pub struct SlotAssignment {
    pub slots: HashMap<ValueId, Reg>,
    pub reg_count: u32,
}

#[derive(Clone)]
struct Active {
    interval: LiveInterval,
    reg: Reg,
}

/// Parameters take slots `0..n` in order; every other interval is placed by
/// start position.
pub fn assign(func: &Function, intervals: &LiveIntervalMap) -> SlotAssignment {
    let mut result = SlotAssignment::default();
    let mut active: Vec<Active> = Vec::new();
    let mut free: Vec<Reg> = Vec::new();

    for param in &func.params {
        let reg = Reg(result.reg_count);
        result.reg_count += 1;
        result.slots.insert(param.id, reg);
        if let Some(interval) = intervals.get(&param.id) {
            active.push(Active {
                interval: *interval,
                reg,
            });
        } else {
            free.push(reg);
        }
    }

    let mut ordered: Vec<(ValueId, LiveInterval)> = intervals
        .iter()
        .filter(|(id, _)| !result.slots.contains_key(*id))
        .map(|(id, iv)| (*id, *iv))
        .collect();
    ordered.sort_by(|a, b| match a.1.start.cmp(&b.1.start) {
        Ordering::Equal => a.1.end.cmp(&b.1.end).then(a.0.cmp(&b.0)),
        other => other,
    });

    for (value, interval) in ordered {
        expire_old(&mut active, interval.start, &mut free);
        let reg = free.pop().unwrap_or_else(|| {
            let reg = Reg(result.reg_count);
            result.reg_count += 1;
            reg
        });
        active.push(Active { interval, reg });
        result.slots.insert(value, reg);
        active.sort_by_key(|entry| entry.interval.end);
    }

    result
}

fn expire_old(active: &mut Vec<Active>, start: u32, free: &mut Vec<Reg>) {
    let mut idx = 0;
    while idx < active.len() {
        if active[idx].interval.end > start {
            idx += 1;
            continue;
        }
        free.push(active[idx].reg);
        active.remove(idx);
    }
}

/// Cross-checks an assignment against block liveness: no two register values
/// that are live at the same point may share a slot.
pub fn verify_assignment(func: &Function, tracker: &ValueTracker) -> Result<(), CompileError> {
    let live = liveness::analyze(func);

    // Folded values are read where their consumer executes.
    let mut operands: HashMap<ValueId, Vec<ValueId>> = HashMap::new();
    for inst in func.blocks.iter().flat_map(|block| block.insts.iter()) {
        if let Some(result) = &inst.result
            && tracker.class(result.id) != ValueClass::Register
        {
            let mut reads = Vec::new();
            for_each_inst_use(&inst.kind, |value| reads.push(value));
            operands.insert(result.id, reads);
        }
    }

    for (block, sets) in func.blocks.iter().zip(&live) {
        let mut current: HashSet<ValueId> = sets.live_out.clone();
        check_live(func, tracker, &current)?;

        let mut term_uses = Vec::new();
        for_each_term_use(&block.term, |value| term_uses.push(value));
        for value in term_uses {
            add_effective(tracker, &operands, value, &mut current);
        }
        check_live(func, tracker, &current)?;

        for inst in block.insts.iter().rev() {
            if let Some(result) = &inst.result {
                if operands.contains_key(&result.id) {
                    continue;
                }
                current.remove(&result.id);
            }
            if matches!(inst.kind, InstKind::Phi { .. }) {
                continue;
            }
            let mut reads = Vec::new();
            for_each_inst_use(&inst.kind, |value| reads.push(value));
            for value in reads {
                add_effective(tracker, &operands, value, &mut current);
            }
            check_live(func, tracker, &current)?;
        }
    }
    Ok(())
}

fn add_effective(
    tracker: &ValueTracker,
    operands: &HashMap<ValueId, Vec<ValueId>>,
    value: ValueId,
    live: &mut HashSet<ValueId>,
) {
    match operands.get(&value) {
        Some(reads) if tracker.class(value) != ValueClass::Register => {
            for read in reads {
                add_effective(tracker, operands, *read, live);
            }
        }
        _ => {
            live.insert(value);
        }
    }
}

fn check_live(
    func: &Function,
    tracker: &ValueTracker,
    live: &HashSet<ValueId>,
) -> Result<(), CompileError> {
    let mut owners: HashMap<Reg, ValueId> = HashMap::new();
    for value in live {
        let Some(reg) = tracker.reg(*value) else {
            continue;
        };
        if let Some(other) = owners.insert(reg, *value) {
            return Err(CompileError::internal(format!(
                "{}: values {:?} and {:?} are both live in {}",
                func.name, other, value, reg
            )));
        }
    }
    Ok(())
}
