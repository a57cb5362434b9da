//! Use collection and value classification.
//!
//! One pass over the reconstructed blocks records every use site, every
//! definition and the suspension points of each block. Classification then
//! reads the use lists directly; SSA already tells us every use of a value, so
//! no backward dataflow is involved.

use std::collections::{HashMap, HashSet};

use crate::backend::structure::Reconstruction;
use crate::ssa::analysis::suspend::SuspendInfo;
use crate::ssa::model::ir::{
    BlockId, Function, InstKind, ValueId, for_each_inst_use, for_each_term_use,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueClass {
    /// Recomputed at its single use; never stored.
    Inline,
    /// Address folded into the single load or store that consumes it.
    SingleUsePtr,
    /// Materialized in a register slot.
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseSite {
    Inst { block: BlockId, inst: usize },
    Term { block: BlockId },
    /// Phi copy on the edge leaving `pred`.
    Edge { pred: BlockId },
}

impl UseSite {
    /// Block and instruction index of the site; terminators and edge copies
    /// sit after the last instruction.
    pub fn location(self, func: &Function) -> (BlockId, usize) {
        match self {
            UseSite::Inst { block, inst } => (block, inst),
            UseSite::Term { block } | UseSite::Edge { pred: block } => {
                let len = func.block(block).map_or(0, |b| b.insts.len());
                (block, len)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UseInfo {
    pub sites: HashMap<ValueId, Vec<UseSite>>,
    /// Instruction definitions in reachable blocks.
    pub defs: HashMap<ValueId, (BlockId, usize)>,
    /// Indices of suspension-point instructions per block.
    pub suspends: HashMap<BlockId, Vec<usize>>,
    /// Indices of instructions with an observable effect per block.
    pub effects: HashMap<BlockId, Vec<usize>>,
    pub reachable: HashSet<BlockId>,
}

impl UseInfo {
    pub fn uses(&self, value: ValueId) -> &[UseSite] {
        self.sites.get(&value).map_or(&[], |sites| sites.as_slice())
    }

    /// Whether a suspension point lies strictly between two instructions of `block`.
    pub fn suspends_between(&self, block: BlockId, from: usize, to: usize) -> bool {
        self.suspends
            .get(&block)
            .is_some_and(|points| points.iter().any(|&p| p > from && p < to))
    }

    /// Whether an instruction with an effect lies strictly between two
    /// instructions of `block`.
    pub fn effects_between(&self, block: BlockId, from: usize, to: usize) -> bool {
        self.effects
            .get(&block)
            .is_some_and(|points| points.iter().any(|&p| p > from && p < to))
    }
}

pub fn collect(func: &Function, recon: &Reconstruction, suspend: &SuspendInfo) -> UseInfo {
    let mut info = UseInfo::default();
    for block_id in recon.order() {
        let Some(block) = func.block(block_id) else {
            continue;
        };
        info.reachable.insert(block_id);
        let mut points = Vec::new();
        let mut effects = Vec::new();
        for (idx, inst) in block.insts.iter().enumerate() {
            if let Some(result) = &inst.result {
                info.defs.insert(result.id, (block_id, idx));
            }
            if suspend.is_suspension_point(&inst.kind) {
                points.push(idx);
            }
            if inst.kind.has_effect() {
                effects.push(idx);
            }
            match &inst.kind {
                InstKind::Phi { incoming } => {
                    for arg in incoming {
                        info.sites
                            .entry(arg.value)
                            .or_default()
                            .push(UseSite::Edge { pred: arg.pred });
                    }
                }
                kind => for_each_inst_use(kind, |value| {
                    info.sites.entry(value).or_default().push(UseSite::Inst {
                        block: block_id,
                        inst: idx,
                    });
                }),
            }
        }
        for_each_term_use(&block.term, |value| {
            info.sites
                .entry(value)
                .or_default()
                .push(UseSite::Term { block: block_id });
        });
        info.suspends.insert(block_id, points);
        info.effects.insert(block_id, effects);
    }
    // Phi copies on edges from unreachable predecessors are never emitted.
    for sites in info.sites.values_mut() {
        sites.retain(|site| match site {
            UseSite::Edge { pred } => info.reachable.contains(pred),
            _ => true,
        });
    }
    info
}

/// Classifies every value. Blocks are walked in instruction order so a value
/// knows whether its inline operands carry a fault with them.
pub fn classify(func: &Function, uses: &UseInfo) -> HashMap<ValueId, ValueClass> {
    let mut classes = HashMap::with_capacity(uses.defs.len() + func.params.len());
    for param in &func.params {
        classes.insert(param.id, ValueClass::Register);
    }
    // Inline values whose evaluation can fault.
    let mut faulting: HashSet<ValueId> = HashSet::new();
    for block in func.blocks.iter().filter(|b| uses.reachable.contains(&b.id)) {
        for (def_idx, inst) in block.insts.iter().enumerate() {
            let Some(result) = &inst.result else {
                continue;
            };
            let mut may_fault = inst.kind.may_trap();
            for_each_inst_use(&inst.kind, |operand| {
                may_fault |= faulting.contains(&operand);
            });
            let class =
                classify_value(func, uses, result.id, block.id, def_idx, &inst.kind, may_fault);
            if class == ValueClass::Inline && may_fault {
                faulting.insert(result.id);
            }
            classes.insert(result.id, class);
        }
    }
    classes
}

fn classify_value(
    func: &Function,
    uses: &UseInfo,
    value: ValueId,
    block_id: BlockId,
    def_idx: usize,
    kind: &InstKind,
    may_fault: bool,
) -> ValueClass {
    let [site] = uses.uses(value) else {
        return ValueClass::Register;
    };
    let (use_block, use_idx) = match *site {
        UseSite::Edge { .. } => return ValueClass::Register,
        site => site.location(func),
    };
    if use_block != block_id || use_idx <= def_idx {
        return ValueClass::Register;
    }
    if uses.suspends_between(block_id, def_idx, use_idx) {
        return ValueClass::Register;
    }
    // A fault must not move past an effect that follows it.
    if may_fault && uses.effects_between(block_id, def_idx, use_idx) {
        return ValueClass::Register;
    }

    if kind.is_pure() {
        return ValueClass::Inline;
    }
    if let InstKind::IndexAddr { .. } = kind
        && let UseSite::Inst { inst, .. } = *site
        && !uses.effects_between(block_id, def_idx, use_idx)
        && is_pointer_operand(func, block_id, inst, value)
    {
        return ValueClass::SingleUsePtr;
    }
    ValueClass::Register
}

/// The consumer reads `value` only as the address of a load or store.
fn is_pointer_operand(func: &Function, block: BlockId, inst: usize, value: ValueId) -> bool {
    let Some(consumer) = func.block(block).and_then(|b| b.insts.get(inst)) else {
        return false;
    };
    match &consumer.kind {
        InstKind::Load { ptr } => *ptr == value,
        InstKind::Store { ptr, value: stored } => *ptr == value && *stored != value,
        _ => false,
    }
}
