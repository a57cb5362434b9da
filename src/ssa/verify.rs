//! Structural checks on front-end SSA before it reaches the backend.

use std::collections::{HashMap, HashSet};

use crate::diag::CompileError;
use crate::ssa::analysis::cfg::Cfg;
use crate::ssa::analysis::dataflow::DataflowGraph;
use crate::ssa::analysis::dom::Dominators;
use crate::ssa::model::ir::{
    BlockId, Function, InstKind, Program, ValueId, for_each_inst_use, for_each_term_use,
};

pub fn verify_program(program: &Program) -> Result<(), CompileError> {
    let mut ids = HashSet::new();
    for func in &program.functions {
        if !ids.insert(func.id) {
            return Err(err(&func.name, None, format!("duplicate function {:?}", func.id)));
        }
    }
    for func in &program.functions {
        verify_function(func)?;
    }
    Ok(())
}

/// Where each value is defined: block and instruction index (params use `None`).
type DefSites = HashMap<ValueId, (BlockId, Option<usize>)>;

pub fn verify_function(func: &Function) -> Result<(), CompileError> {
    let name = func.name.as_str();
    if func.blocks.is_empty() {
        return Err(err(name, None, "function has no blocks"));
    }
    if func.params.len() != func.sig.params.len() {
        return Err(err(name, None, "parameter count does not match signature"));
    }

    let mut blocks = HashSet::new();
    for block in &func.blocks {
        if !blocks.insert(block.id) {
            return Err(err(name, Some(block.id), format!("duplicate block {:?}", block.id)));
        }
    }

    let entry = func.blocks[0].id;
    let mut defs: DefSites = HashMap::new();
    for param in &func.params {
        if defs.insert(param.id, (entry, None)).is_some() {
            return Err(err(name, None, format!("duplicate value {:?}", param.id)));
        }
    }
    for block in &func.blocks {
        for (idx, inst) in block.insts.iter().enumerate() {
            if let Some(result) = &inst.result
                && defs.insert(result.id, (block.id, Some(idx))).is_some()
            {
                return Err(err(name, Some(block.id), format!("duplicate value {:?}", result.id)));
            }
        }
        for target in block.term.targets() {
            if !blocks.contains(&target) {
                return Err(err(
                    name,
                    Some(block.id),
                    format!("branch to unknown block {:?}", target),
                ));
            }
        }
    }

    let cfg = Cfg::new(func);
    let doms = Dominators::compute(&cfg, cfg.entry());

    for block in &func.blocks {
        let block_idx = cfg.index(block.id);
        let mut seen_non_phi = false;
        for (idx, inst) in block.insts.iter().enumerate() {
            if let InstKind::Phi { incoming } = &inst.kind {
                if seen_non_phi {
                    return Err(err(name, Some(block.id), "phi after non-phi instruction"));
                }
                verify_phi(name, &cfg, block.id, incoming.iter().map(|a| a.pred))?;
                for arg in incoming {
                    let Some(&(def_block, _)) = defs.get(&arg.value) else {
                        return Err(undefined(name, block.id, arg.value));
                    };
                    let pred_idx = cfg.index(arg.pred);
                    if doms.is_reachable(pred_idx)
                        && !doms.dominates(cfg.index(def_block), pred_idx)
                    {
                        return Err(not_dominated(name, block.id, arg.value));
                    }
                }
                continue;
            }
            seen_non_phi = true;

            let mut failure = None;
            for_each_inst_use(&inst.kind, |value| {
                if failure.is_none() {
                    let site = Some(idx);
                    failure = check_use(name, &defs, &doms, &cfg, block.id, block_idx, site, value)
                        .err();
                }
            });
            if let Some(error) = failure {
                return Err(error);
            }
        }

        let mut failure = None;
        for_each_term_use(&block.term, |value| {
            if failure.is_none() {
                failure =
                    check_use(name, &defs, &doms, &cfg, block.id, block_idx, None, value).err();
            }
        });
        if let Some(error) = failure {
            return Err(error);
        }
    }

    Ok(())
}

fn verify_phi(
    name: &str,
    cfg: &Cfg,
    block: BlockId,
    preds: impl Iterator<Item = BlockId>,
) -> Result<(), CompileError> {
    let mut seen = HashSet::new();
    for pred in preds {
        if !cfg.contains(pred) || !cfg.preds(block).contains(&pred) {
            return Err(err(
                name,
                Some(block),
                format!("phi names {:?}, which is not a predecessor", pred),
            ));
        }
        if !seen.insert(pred) {
            return Err(err(name, Some(block), format!("phi names {:?} twice", pred)));
        }
    }
    if seen.len() != cfg.preds(block).len() {
        return Err(err(name, Some(block), "phi does not cover every predecessor"));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn check_use(
    name: &str,
    defs: &DefSites,
    doms: &Dominators,
    cfg: &Cfg,
    block: BlockId,
    block_idx: usize,
    inst_idx: Option<usize>,
    value: ValueId,
) -> Result<(), CompileError> {
    let Some(&(def_block, def_idx)) = defs.get(&value) else {
        return Err(undefined(name, block, value));
    };
    if !doms.is_reachable(block_idx) {
        return Ok(());
    }
    if def_block == block {
        // Same block: the definition must come first. `None` on the use side
        // is the terminator, which follows every instruction.
        let ordered = match (def_idx, inst_idx) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(d), Some(u)) => d < u,
        };
        if !ordered {
            return Err(not_dominated(name, block, value));
        }
        return Ok(());
    }
    if !doms.dominates(cfg.index(def_block), block_idx) {
        return Err(not_dominated(name, block, value));
    }
    Ok(())
}

fn undefined(name: &str, block: BlockId, value: ValueId) -> CompileError {
    err(name, Some(block), format!("use of undefined value {:?}", value))
}

fn not_dominated(name: &str, block: BlockId, value: ValueId) -> CompileError {
    err(
        name,
        Some(block),
        format!("definition of {:?} does not dominate its use", value),
    )
}

fn err(func: &str, block: Option<BlockId>, message: impl Into<String>) -> CompileError {
    let message = message.into();
    let message = match block {
        Some(block) => format!("bb{}: {}", block.0, message),
        None => message,
    };
    CompileError::Verify {
        func: func.to_string(),
        message,
    }
}

#[cfg(test)]
#[path = "../tests/ssa/t_verify.rs"]
mod tests;
