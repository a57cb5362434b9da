//! Sub-function splitting.
//!
//! A run of instructions lowered from one source statement has to execute as
//! one target statement, so it may only suspend at its very end. When a
//! statement group holds a suspension point before its last instruction, the
//! tail of the group starting at that point moves into a helper function of
//! its own, and the parent calls the helper in its place. The call is itself a
//! suspension point and is now the group's last instruction.
//!
//! Values crossing the cut travel as parameters (into the helper) and as
//! results (back out). The helper keeps the original value ids, and the
//! parent rebinds the results to the same ids, so no other instruction in
//! either function needs rewriting.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::context::ProgramContext;
use crate::diag::CompileError;
use crate::ssa::analysis::suspend::SuspendInfo;
use crate::ssa::model::ir::{
    Block, BlockId, Callee, Function, FunctionSig, InstKind, Instruction, Terminator, Ty,
    ValueDef, ValueId, for_each_inst_use, for_each_term_use,
};

/// Tail of a statement group to move out: `block.insts[start..end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cut {
    pub block: usize,
    pub start: usize,
    pub end: usize,
}

/// Splits `func` until every statement group suspends only at its end.
/// Returns the rewritten function first, then every helper created, helpers
/// of helpers included.
pub fn split_function(
    func: Function,
    ctx: &mut ProgramContext<'_>,
) -> Result<Vec<Function>, CompileError> {
    let mut out = vec![func];
    let mut idx = 0;
    while idx < out.len() {
        let mut made = 0;
        while let Some(cut) = find_cut(&out[idx], &ctx.suspend) {
            let name = format!("{}$sub{}", out[idx].name, made);
            let sub = extract(&mut out[idx], cut, name, ctx)?;
            made += 1;
            out.push(sub);
        }
        idx += 1;
    }
    Ok(out)
}

/// First statement group holding a suspension point before its last
/// instruction.
pub fn find_cut(func: &Function, suspend: &SuspendInfo) -> Option<Cut> {
    for (b, block) in func.blocks.iter().enumerate() {
        let mut start = 0;
        while start < block.insts.len() {
            let stmt = block.insts[start].stmt;
            let mut end = start + 1;
            while stmt.is_some()
                && end < block.insts.len()
                && block.insts[end].stmt == stmt
                && !matches!(block.insts[end].kind, InstKind::Phi { .. })
            {
                end += 1;
            }
            if stmt.is_some() {
                let inner = (start..end - 1)
                    .find(|&i| suspend.is_suspension_point(&block.insts[i].kind));
                if let Some(head) = inner {
                    return Some(Cut {
                        block: b,
                        start: head,
                        end,
                    });
                }
            }
            start = end;
        }
    }
    None
}

/// Moves the cut into a new helper and rewires the parent to call it.
fn extract(
    func: &mut Function,
    cut: Cut,
    name: String,
    ctx: &mut ProgramContext<'_>,
) -> Result<Function, CompileError> {
    let types = value_types(func);
    let block = func
        .blocks
        .get(cut.block)
        .ok_or_else(|| CompileError::internal(format!("{}: split in a missing block", func.name)))?;
    let run = &block.insts[cut.start..cut.end];
    let head = &run[0];

    let defined: HashSet<ValueId> = run
        .iter()
        .filter_map(|inst| inst.result.as_ref().map(|r| r.id))
        .collect();

    let mut inputs: Vec<ValueId> = Vec::new();
    for inst in run {
        for_each_inst_use(&inst.kind, |value| {
            if !defined.contains(&value) && !inputs.contains(&value) {
                inputs.push(value);
            }
        });
    }

    let used_outside = uses_outside(func, cut);
    let outputs: Vec<ValueId> = run
        .iter()
        .filter_map(|inst| inst.result.as_ref().map(|r| r.id))
        .filter(|id| used_outside.contains(id))
        .collect();

    let ty_of = |value: &ValueId| {
        types.get(value).copied().ok_or_else(|| {
            CompileError::internal(format!("{}: %v{} has no type", func.name, value.0))
        })
    };
    let params = inputs
        .iter()
        .map(|id| Ok(ValueDef { id: *id, ty: ty_of(id)? }))
        .collect::<Result<Vec<_>, CompileError>>()?;
    let results = outputs
        .iter()
        .map(ty_of)
        .collect::<Result<Vec<_>, CompileError>>()?;

    let mut body: Vec<Instruction> = run.to_vec();
    body[0].stmt = None;
    let sub_id = ctx.fresh_func_id();
    let sub = Function {
        id: sub_id,
        name,
        pos: head.pos,
        sig: FunctionSig {
            params: params.iter().map(|p| p.ty).collect(),
            results: results.clone(),
        },
        params,
        blocks: vec![Block {
            id: BlockId(0),
            insts: body,
            term: Terminator::Return {
                values: outputs.clone(),
            },
        }],
    };
    ctx.suspend.register(sub_id, true);

    let (pos, stmt) = (head.pos, head.stmt);
    let call = |result: Option<ValueDef>| Instruction {
        result,
        kind: InstKind::Call {
            callee: Callee::Direct(sub_id),
            args: inputs.clone(),
        },
        pos,
        stmt,
    };
    let replacement = match outputs.as_slice() {
        [] => vec![call(None)],
        [single] => vec![call(Some(ValueDef {
            id: *single,
            ty: results[0],
        }))],
        many => {
            let tuple = ValueId(func.value_bound());
            let mut insts = vec![call(Some(ValueDef {
                id: tuple,
                ty: Ty::Tuple,
            }))];
            for (index, (id, ty)) in many.iter().zip(&results).enumerate() {
                insts.push(Instruction {
                    result: Some(ValueDef { id: *id, ty: *ty }),
                    kind: InstKind::Extract {
                        tuple,
                        index: index as u32,
                    },
                    pos,
                    stmt: None,
                });
            }
            insts
        }
    };

    debug!(
        parent = %func.name,
        sub = %sub.name,
        inputs = inputs.len(),
        outputs = outputs.len(),
        "split statement at suspension point"
    );
    func.blocks[cut.block]
        .insts
        .splice(cut.start..cut.end, replacement);
    Ok(sub)
}

fn value_types(func: &Function) -> HashMap<ValueId, Ty> {
    let params = func.params.iter().map(|p| (p.id, p.ty));
    let results = func
        .blocks
        .iter()
        .flat_map(|b| b.insts.iter())
        .filter_map(|inst| inst.result.as_ref().map(|r| (r.id, r.ty)));
    params.chain(results).collect()
}

/// Values read anywhere except inside the cut.
fn uses_outside(func: &Function, cut: Cut) -> HashSet<ValueId> {
    let mut used = HashSet::new();
    for (b, block) in func.blocks.iter().enumerate() {
        for (i, inst) in block.insts.iter().enumerate() {
            if b == cut.block && (cut.start..cut.end).contains(&i) {
                continue;
            }
            for_each_inst_use(&inst.kind, |value| {
                used.insert(value);
            });
        }
        for_each_term_use(&block.term, |value| {
            used.insert(value);
        });
    }
    used
}

#[cfg(test)]
#[path = "../tests/backend/t_split.rs"]
mod tests;
