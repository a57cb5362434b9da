//! SSA liveness analysis.
//!
//! Phi operands are treated as uses on the incoming edge: they are live-out of
//! the matching predecessor and not live-in of the phi's own block.

use std::collections::{HashMap, HashSet};

use crate::ssa::analysis::cfg::Cfg;
use crate::ssa::analysis::dataflow::{DataflowGraph, solve_backward};
use crate::ssa::model::ir::{
    Block, BlockId, Function, InstKind, ValueId, for_each_inst_use, for_each_term_use,
};

#[derive(Debug, Clone, Default)]
pub struct LiveSet {
    pub live_in: HashSet<ValueId>,
    pub live_out: HashSet<ValueId>,
}

/// Liveness per block, indexed like `Function::blocks`.
pub type LiveMap = Vec<LiveSet>;

#[derive(Debug, Clone)]
struct UseDef {
    use_set: HashSet<ValueId>,
    def_set: HashSet<ValueId>,
}

impl UseDef {
    fn new() -> Self {
        Self {
            use_set: HashSet::new(),
            def_set: HashSet::new(),
        }
    }

    fn add_use(&mut self, value: ValueId) {
        if !self.def_set.contains(&value) {
            self.use_set.insert(value);
        }
    }

    fn add_def(&mut self, value: ValueId) {
        self.def_set.insert(value);
    }
}

/// Compute liveness for a single SSA function.
pub fn analyze(func: &Function) -> LiveMap {
    let cfg = Cfg::new(func);
    let edge_uses = phi_edge_uses(func);
    let use_defs: Vec<UseDef> = func.blocks.iter().map(block_use_def).collect();

    let empty = HashSet::new();
    let result = solve_backward(
        &cfg,
        empty.clone(),
        empty,
        |states| {
            let mut out = HashSet::new();
            for state in states {
                out.extend(state.iter().cloned());
            }
            out
        },
        |block_id, out_state| {
            let idx = cfg.index(block_id);
            let mut out_state = out_state.clone();
            out_state.extend(edge_uses[idx].iter().cloned());

            let use_def = &use_defs[idx];
            let mut in_state: HashSet<_> =
                out_state.difference(&use_def.def_set).cloned().collect();
            in_state.extend(use_def.use_set.iter().cloned());
            in_state
        },
    );

    let mut out_map = result.out_map;
    for (idx, uses) in edge_uses.iter().enumerate() {
        out_map[idx].extend(uses.iter().cloned());
    }

    result
        .in_map
        .into_iter()
        .zip(out_map)
        .map(|(live_in, live_out)| LiveSet { live_in, live_out })
        .collect()
}

fn block_use_def(block: &Block) -> UseDef {
    let mut use_def = UseDef::new();

    for inst in &block.insts {
        // Phi operands belong to the incoming edges.
        if !matches!(inst.kind, InstKind::Phi { .. }) {
            for_each_inst_use(&inst.kind, |value| use_def.add_use(value));
        }
        if let Some(result) = &inst.result {
            use_def.add_def(result.id);
        }
    }

    for_each_term_use(&block.term, |value| use_def.add_use(value));

    use_def
}

/// Values each block must provide to the phis of its successors.
fn phi_edge_uses(func: &Function) -> Vec<HashSet<ValueId>> {
    let index: HashMap<BlockId, usize> = func
        .blocks
        .iter()
        .enumerate()
        .map(|(idx, block)| (block.id, idx))
        .collect();
    let mut uses = vec![HashSet::new(); func.blocks.len()];
    for block in &func.blocks {
        for inst in &block.insts {
            let InstKind::Phi { incoming } = &inst.kind else {
                continue;
            };
            for arg in incoming {
                if let Some(&pred) = index.get(&arg.pred) {
                    uses[pred].insert(arg.value);
                }
            }
        }
    }
    uses
}
