//! Value/register tracking for the resumable compiler.
//!
//! Decides which SSA values are recomputed inline, which pointer values are
//! threaded straight into their single consumer, and which need a register
//! slot; then assigns slots with a free-list linear scan so a slot is reused
//! once its value's last use has been emitted.

use std::collections::HashMap;
use std::fmt;

use crate::backend::structure::Reconstruction;
use crate::ssa::analysis::suspend::SuspendInfo;
use crate::ssa::model::ir::{Function, ValueId};

pub mod intervals;
pub mod slots;
pub mod track;

pub use intervals::{LiveInterval, LiveIntervalMap};
pub use track::{UseSite, ValueClass};

/// Register slot of a dispatch routine's frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(pub u32);

impl Reg {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Per-function tracking result consulted while emitting dispatch code.
#[derive(Debug, Clone)]
pub struct ValueTracker {
    classes: HashMap<ValueId, ValueClass>,
    intervals: LiveIntervalMap,
    slots: HashMap<ValueId, Reg>,
    reg_count: u32,
    scratch: Option<Reg>,
}

impl ValueTracker {
    pub fn build(func: &Function, recon: &Reconstruction, suspend: &SuspendInfo) -> Self {
        let uses = track::collect(func, recon, suspend);
        let classes = track::classify(func, &uses);
        let intervals = intervals::build_live_intervals(func, recon, &uses, &classes);
        let assignment = slots::assign(func, &intervals);
        tracing::trace!(
            func = %func.name,
            regs = assignment.reg_count,
            inline = classes.values().filter(|c| **c != ValueClass::Register).count(),
            "tracked values"
        );
        Self {
            classes,
            intervals,
            slots: assignment.slots,
            reg_count: assignment.reg_count,
            scratch: None,
        }
    }

    /// Values never classified (unreachable code) default to `Register`.
    pub fn class(&self, value: ValueId) -> ValueClass {
        self.classes
            .get(&value)
            .copied()
            .unwrap_or(ValueClass::Register)
    }

    pub fn reg(&self, value: ValueId) -> Option<Reg> {
        self.slots.get(&value).copied()
    }

    pub fn interval(&self, value: ValueId) -> Option<LiveInterval> {
        self.intervals.get(&value).copied()
    }

    pub fn slots(&self) -> &HashMap<ValueId, Reg> {
        &self.slots
    }

    /// Slot used to break phi-copy cycles, reserved on first request.
    pub fn scratch(&mut self) -> Reg {
        if let Some(reg) = self.scratch {
            return reg;
        }
        let reg = Reg(self.reg_count);
        self.reg_count += 1;
        self.scratch = Some(reg);
        reg
    }

    pub fn reg_count(&self) -> u32 {
        self.reg_count
    }
}

#[cfg(test)]
#[path = "../../tests/backend/t_regalloc.rs"]
mod tests;
