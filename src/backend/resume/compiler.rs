//! Resumable function compiler.
//!
//! Walks the reconstructed block order of one function and emits its
//! dispatch routine. Code is appended to the open pseudo-block; a pseudo-block
//! is closed by a transfer, a suspension point, or a return, and the next one
//! always takes the next free index. Pseudo-blocks begin at:
//!
//! - the entry, loop headers, joins and branch targets
//! - the instruction after every suspension point
//! - a blocking channel operation, when the open pseudo-block has statements
//!
//! A straight-line block whose only predecessor is emitted just before it
//! continues that predecessor's pseudo-block.

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::backend::marshal::int64::{self, Words};
use crate::backend::regalloc::{Reg, ValueClass, ValueTracker, slots};
use crate::backend::structure::{
    Arm, BlockDescriptor, BlockExit, BlockKind, BranchTest, BranchTree, Reconstruction,
    reconstruct,
};
use crate::context::ProgramContext;
use crate::diag::CompileError;
use crate::ssa::analysis::cfg::Cfg;
use crate::ssa::model::ir::{
    Block, BlockId, Builtin, Callee, ConstValue, Function, InstKind, Instruction, PosHash,
    Terminator, Ty, ValueId,
};

use super::moves::edge_moves;
use super::pseudo::{
    BranchTerm, CallTarget, DispatchFn, Edge, ElseArm, Expr, PseudoBlock, PseudoTerm, Stmt,
    SuspendOp, Test, WaitOp,
};

/// Edge target before `resolve_targets` has run.
const UNRESOLVED: u32 = u32::MAX;

/// Compiles one verified function into its dispatch routine.
#[instrument(skip_all, fields(func = %func.name))]
pub fn compile_function(
    func: &Function,
    ctx: &mut ProgramContext<'_>,
) -> Result<DispatchFn, CompileError> {
    let cfg = Cfg::new(func);
    let recon = reconstruct(&cfg);
    recon.validate(&cfg)?;
    let tracker = ValueTracker::build(func, &recon, &ctx.suspend);
    if ctx.options.verify_input {
        slots::verify_assignment(func, &tracker)?;
    }

    let mut compiler = FunctionCompiler::new(func, ctx, &recon, tracker);
    compiler.run()?;
    let dispatch = compiler.finish()?;
    debug!(
        blocks = dispatch.blocks.len(),
        regs = dispatch.reg_count,
        suspends = dispatch.may_suspend,
        "compiled dispatch routine"
    );
    Ok(dispatch)
}

struct OpenBlock {
    index: u32,
    origin: Option<BlockId>,
    bind_result: Option<Reg>,
    stmts: Vec<Stmt>,
}

/// Function Compilation Context: all state for translating one function.
struct FunctionCompiler<'f, 'c, 'a> {
    func: &'f Function,
    ctx: &'c mut ProgramContext<'a>,
    recon: &'f Reconstruction,
    tracker: ValueTracker,
    defs: HashMap<ValueId, &'f Instruction>,
    types: HashMap<ValueId, Ty>,
    /// Whether the block at each descriptor position opens a pseudo-block.
    starts: Vec<bool>,
    blocks: Vec<PseudoBlock>,
    open: Option<OpenBlock>,
    /// Pseudo-block where each source block's code begins.
    block_entry: HashMap<BlockId, u32>,
    /// Pure expressions held by registers in the open pseudo-block.
    cse: Vec<(Expr, Reg)>,
    had_return: bool,
    had_block_return: bool,
}

impl<'f, 'c, 'a> FunctionCompiler<'f, 'c, 'a> {
    fn new(
        func: &'f Function,
        ctx: &'c mut ProgramContext<'a>,
        recon: &'f Reconstruction,
        tracker: ValueTracker,
    ) -> Self {
        let mut defs = HashMap::new();
        let mut types = HashMap::new();
        for param in &func.params {
            types.insert(param.id, param.ty);
        }
        for inst in func.blocks.iter().flat_map(|b| b.insts.iter()) {
            if let Some(result) = &inst.result {
                defs.insert(result.id, inst);
                types.insert(result.id, result.ty);
            }
        }
        Self {
            func,
            ctx,
            recon,
            tracker,
            defs,
            types,
            starts: block_starts(func, recon),
            blocks: Vec::new(),
            open: None,
            block_entry: HashMap::new(),
            cse: Vec::new(),
            had_return: false,
            had_block_return: false,
        }
    }

    fn run(&mut self) -> Result<(), CompileError> {
        let (func, recon) = (self.func, self.recon);
        for (pos, desc) in recon.descriptors().iter().enumerate() {
            let block = func.block(desc.block).ok_or_else(|| {
                CompileError::internal(format!("descriptor for unknown bb{}", desc.block.0))
            })?;
            if self.starts[pos] {
                let index = self.open_block(Some(desc.block), None)?;
                self.block_entry.insert(desc.block, index);
            } else if self.open.is_none() {
                return Err(CompileError::internal(format!(
                    "bb{} continues a closed pseudo-block",
                    desc.block.0
                )));
            }

            self.had_block_return = false;
            let mut warned = false;
            for (idx, inst) in block.insts.iter().enumerate() {
                if self.had_block_return {
                    if !warned {
                        self.warn(inst.pos, "unreachable code after return");
                        warned = true;
                    }
                    continue;
                }
                self.compile_inst(block, idx, inst)?;
            }
            if self.had_block_return {
                continue;
            }
            self.compile_exit(pos, desc, block)?;
        }

        for block_id in recon.unreachable() {
            let pos = func
                .block(*block_id)
                .and_then(|b| b.insts.first())
                .map_or(func.pos, |inst| inst.pos);
            self.warn(pos, format!("unreachable block bb{}", block_id.0));
        }
        Ok(())
    }

    fn finish(mut self) -> Result<DispatchFn, CompileError> {
        if let Some(open) = &self.open {
            return Err(CompileError::internal(format!(
                "pseudo-block pb{} was never terminated",
                open.index
            )));
        }
        self.resolve_targets()?;
        if !self.had_return {
            debug!("function has no reachable return");
        }

        let params = self
            .func
            .params
            .iter()
            .map(|p| self.value_reg(p.id))
            .collect::<Result<Vec<_>, _>>()?;
        let dispatch = DispatchFn {
            id: self.func.id,
            name: self.func.name.clone(),
            pos: self.func.pos,
            params,
            param_tys: self.func.params.iter().map(|p| p.ty).collect(),
            results: self.func.sig.results.clone(),
            reg_count: self.tracker.reg_count(),
            may_suspend: self.ctx.suspend.may_suspend(self.func.id),
            blocks: self.blocks,
        };
        validate(&dispatch)?;
        Ok(dispatch)
    }

    // -------------------------------------------------------------------------
    // Pseudo-block lifecycle
    // -------------------------------------------------------------------------

    fn open_block(
        &mut self,
        origin: Option<BlockId>,
        bind_result: Option<Reg>,
    ) -> Result<u32, CompileError> {
        if let Some(open) = &self.open {
            return Err(CompileError::internal(format!(
                "pseudo-block pb{} opened while pb{} is still open",
                self.blocks.len(),
                open.index
            )));
        }
        let index = self.blocks.len() as u32;
        self.open = Some(OpenBlock {
            index,
            origin,
            bind_result,
            stmts: Vec::new(),
        });
        self.cse.clear();
        Ok(index)
    }

    fn close_block(&mut self, term: PseudoTerm) -> Result<u32, CompileError> {
        let open = self
            .open
            .take()
            .ok_or_else(|| CompileError::internal("terminator emitted with no open pseudo-block"))?;
        if open.index as usize != self.blocks.len() {
            return Err(CompileError::internal(format!(
                "pseudo-block index pb{} collides with an emitted block",
                open.index
            )));
        }
        self.blocks.push(PseudoBlock {
            index: open.index,
            origin: open.origin,
            bind_result: open.bind_result,
            stmts: open.stmts,
            term,
        });
        Ok(open.index)
    }

    fn current(&mut self) -> Result<&mut OpenBlock, CompileError> {
        self.open
            .as_mut()
            .ok_or_else(|| CompileError::internal("statement emitted into a closed pseudo-block"))
    }

    fn emit(&mut self, stmt: Stmt) -> Result<(), CompileError> {
        self.current()?.stmts.push(stmt);
        Ok(())
    }

    /// Assigns `expr` to `dst`, reusing a register that already holds the
    /// same pure value in this pseudo-block.
    fn assign(&mut self, dst: Reg, expr: Expr) -> Result<(), CompileError> {
        let tracked = expr.is_pure() && !matches!(expr, Expr::Reg(_) | Expr::Const(..));
        let expr = match self.cse.iter().find(|(known, _)| tracked && *known == expr) {
            Some((_, reg)) => Expr::Reg(*reg),
            None => expr,
        };
        self.cse
            .retain(|(known, reg)| *reg != dst && !known.reads(dst));
        if tracked && !expr.reads(dst) && !matches!(expr, Expr::Reg(_)) {
            self.cse.push((expr.clone(), dst));
        }
        self.emit(Stmt::Assign { dst, expr })
    }

    /// Ends the open pseudo-block at a scheduling point and opens the block
    /// that resumes after it.
    fn suspend(&mut self, op: SuspendOp, bind: Option<Reg>) -> Result<(), CompileError> {
        let origin = self.current()?.origin;
        let resume = self.blocks.len() as u32 + 1;
        self.close_block(PseudoTerm::Suspend { op, resume })?;
        self.open_block(origin, bind)?;
        Ok(())
    }

    /// Blocking operations get a pseudo-block of their own so re-entry
    /// retries only the operation.
    fn wait(&mut self, op: WaitOp) -> Result<(), CompileError> {
        let open = self.current()?;
        let origin = open.origin;
        if !open.stmts.is_empty() {
            self.close_block(PseudoTerm::Fallthrough)?;
            self.open_block(origin, None)?;
        }
        let resume = self.blocks.len() as u32 + 1;
        self.close_block(PseudoTerm::Wait { op, resume })?;
        self.open_block(origin, None)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Instructions
    // -------------------------------------------------------------------------

    fn compile_inst(
        &mut self,
        block: &'f Block,
        idx: usize,
        inst: &'f Instruction,
    ) -> Result<(), CompileError> {
        if let Some(result) = &inst.result
            && self.tracker.class(result.id) != ValueClass::Register
        {
            // Rebuilt at its single consumer.
            return Ok(());
        }
        let dst = inst
            .result
            .as_ref()
            .map(|r| self.value_reg(r.id))
            .transpose()?;

        match &inst.kind {
            InstKind::Phi { .. } => Ok(()),
            InstKind::Const { .. }
            | InstKind::BinOp { .. }
            | InstKind::UnOp { .. }
            | InstKind::Cmp { .. }
            | InstKind::Extract { .. }
            | InstKind::IndexAddr { .. } => match dst {
                Some(dst) => {
                    let expr = self.expr_of(inst)?;
                    self.assign(dst, expr)
                }
                None => Ok(()),
            },
            InstKind::Alloc { count } => self.assign_or_eval(dst, Expr::Alloc(*count)),
            InstKind::MakeChan { cap } => self.assign_or_eval(dst, Expr::MakeChan(*cap)),
            InstKind::Load { ptr } => {
                let expr = self.load(*ptr)?;
                self.assign_or_eval(dst, expr)
            }
            InstKind::Store { ptr, value } => {
                let ptr = self.operand(*ptr)?;
                let value = self.operand(*value)?;
                self.emit(Stmt::Store { ptr, value })
            }
            InstKind::Call {
                callee: Callee::Builtin(builtin),
                args,
            } => self.builtin(*builtin, args, dst, inst.pos),
            InstKind::Call { callee, args } => {
                let callee = self.call_target(callee, inst.pos)?;
                let args = self.operands(args)?;
                if self.ctx.suspend.is_suspension_point(&inst.kind) {
                    self.suspend(SuspendOp::Call { callee, args }, dst)
                } else {
                    self.assign_or_eval(dst, Expr::Call { callee, args })
                }
            }
            InstKind::Go { callee, args } => {
                let callee = self.call_target(callee, inst.pos)?;
                let args = self.operands(args)?;
                self.emit(Stmt::Spawn { callee, args })
            }
            InstKind::Send { chan, value } => {
                let chan = self.operand(*chan)?;
                let value = self.operand(*value)?;
                self.wait(WaitOp::Send { chan, value })
            }
            InstKind::Recv { chan } => {
                let chan = self.operand(*chan)?;
                self.wait(WaitOp::Recv { chan, dst })
            }
            InstKind::Yield => self.suspend(SuspendOp::Yield, None),
            InstKind::Foreign { op, .. } => Err(self.unsupported(
                inst.pos,
                format!("instruction `{}` in bb{}[{}] has no translation", op, block.id.0, idx),
            )),
        }
    }

    fn assign_or_eval(&mut self, dst: Option<Reg>, expr: Expr) -> Result<(), CompileError> {
        match dst {
            Some(dst) => self.assign(dst, expr),
            None => self.emit(Stmt::Eval(expr)),
        }
    }

    fn builtin(
        &mut self,
        builtin: Builtin,
        args: &[ValueId],
        dst: Option<Reg>,
        pos: PosHash,
    ) -> Result<(), CompileError> {
        match (builtin, args) {
            (Builtin::Print, _) => {
                let args = self.operands(args)?;
                self.emit(Stmt::Print(args))
            }
            (Builtin::Len, [value]) => {
                let value = self.operand(*value)?;
                self.assign_or_eval(dst, Expr::Len(Box::new(value)))
            }
            (Builtin::Panic, [value]) => {
                let value = self.operand(*value)?;
                self.close_block(PseudoTerm::Panic(value))?;
                self.had_block_return = true;
                Ok(())
            }
            (builtin, args) => Err(self.unsupported(
                pos,
                format!("builtin {} with {} argument(s)", builtin.name(), args.len()),
            )),
        }
    }

    fn call_target(&mut self, callee: &Callee, pos: PosHash) -> Result<CallTarget, CompileError> {
        match callee {
            Callee::Direct(id) => Ok(CallTarget::Direct(*id)),
            Callee::Value(value) => Ok(CallTarget::Value(Box::new(self.operand(*value)?))),
            Callee::Builtin(builtin) => Err(self.unsupported(
                pos,
                format!("builtin {} used as a goroutine body", builtin.name()),
            )),
        }
    }

    // -------------------------------------------------------------------------
    // Operands
    // -------------------------------------------------------------------------

    fn value_reg(&self, value: ValueId) -> Result<Reg, CompileError> {
        self.tracker.reg(value).ok_or_else(|| {
            CompileError::internal(format!("{}: value %v{} has no slot", self.func.name, value.0))
        })
    }

    /// Expression reading `value`: its register, or its folded definition.
    fn operand(&mut self, value: ValueId) -> Result<Expr, CompileError> {
        match self.tracker.class(value) {
            ValueClass::Register => Ok(Expr::Reg(self.value_reg(value)?)),
            ValueClass::Inline | ValueClass::SingleUsePtr => {
                let inst = self.defs.get(&value).copied().ok_or_else(|| {
                    CompileError::internal(format!("folded value %v{} has no definition", value.0))
                })?;
                self.expr_of(inst)
            }
        }
    }

    fn operands(&mut self, values: &[ValueId]) -> Result<Vec<Expr>, CompileError> {
        values.iter().map(|v| self.operand(*v)).collect()
    }

    fn load(&mut self, ptr: ValueId) -> Result<Expr, CompileError> {
        if self.tracker.class(ptr) == ValueClass::SingleUsePtr
            && let Some(def) = self.defs.get(&ptr).copied()
            && let InstKind::IndexAddr { base, index } = &def.kind
        {
            return Ok(Expr::LoadAt {
                base: Box::new(self.operand(*base)?),
                index: Box::new(self.operand(*index)?),
            });
        }
        Ok(Expr::Load(Box::new(self.operand(ptr)?)))
    }

    /// Expression computing a pure or address instruction.
    fn expr_of(&mut self, inst: &'f Instruction) -> Result<Expr, CompileError> {
        let ty = inst.result.as_ref().map_or(Ty::Unit, |r| r.ty);
        let expr = match &inst.kind {
            InstKind::Const { value } => self.constant(value, ty, inst.pos)?,
            InstKind::BinOp { op, lhs, rhs } => Expr::Bin {
                op: *op,
                ty,
                lhs: Box::new(self.operand(*lhs)?),
                rhs: Box::new(self.operand(*rhs)?),
            },
            InstKind::UnOp { op, value } => Expr::Un {
                op: *op,
                ty,
                value: Box::new(self.operand(*value)?),
            },
            InstKind::Cmp { op, lhs, rhs } => Expr::Cmp {
                op: *op,
                ty: self.types.get(lhs).copied().unwrap_or(Ty::Unit),
                lhs: Box::new(self.operand(*lhs)?),
                rhs: Box::new(self.operand(*rhs)?),
            },
            InstKind::Extract { tuple, index } => Expr::Extract {
                tuple: Box::new(self.operand(*tuple)?),
                index: *index,
            },
            InstKind::IndexAddr { base, index } => Expr::IndexAddr {
                base: Box::new(self.operand(*base)?),
                index: Box::new(self.operand(*index)?),
            },
            other => {
                return Err(CompileError::internal(format!(
                    "{:?} cannot be computed in place",
                    other
                )));
            }
        };
        Ok(expr)
    }

    /// Checks a constant against its type and normalizes its value.
    fn constant(
        &mut self,
        value: &ConstValue,
        ty: Ty,
        pos: PosHash,
    ) -> Result<Expr, CompileError> {
        let value = match (value, ty) {
            (ConstValue::Int(v), Ty::Int { signed, bits }) => {
                if !int64::in_64bit_range(*v) {
                    self.warn(pos, format!("integer constant value out of 64-bit range: {}", v));
                } else if bits < 64 && !Words::from_i64(*v as i64).fits_32() {
                    self.warn(pos, format!("integer constant value > 32 bits : {}", v));
                }
                ConstValue::Int(int64::truncate(*v, signed, bits))
            }
            (ConstValue::Int(0), Ty::Ptr) | (ConstValue::Nil, Ty::Ptr | Ty::Chan | Ty::Func) => {
                ConstValue::Nil
            }
            (ConstValue::Int(v), Ty::Ptr) => {
                return Err(self.unsupported(
                    pos,
                    format!("pointers cannot be initialized to a non-zero value: {}", v),
                ));
            }
            (ConstValue::Float(f), Ty::Float { bits: 32 }) => ConstValue::Float(*f as f32 as f64),
            (ConstValue::Float(_), Ty::Float { .. })
            | (ConstValue::Bool(_), Ty::Bool)
            | (ConstValue::Str(_), Ty::Str)
            | (ConstValue::Func(_), Ty::Func) => value.clone(),
            (value, ty) => {
                return Err(self.unsupported(
                    pos,
                    format!("invalid constant {:?} for type {}", value, ty),
                ));
            }
        };
        Ok(Expr::Const(value, ty))
    }

    // -------------------------------------------------------------------------
    // Block exits
    // -------------------------------------------------------------------------

    fn compile_exit(
        &mut self,
        pos: usize,
        desc: &BlockDescriptor,
        block: &Block,
    ) -> Result<(), CompileError> {
        match &desc.exit {
            BlockExit::Straight(target) => {
                let merged = self.recon.position(*target) == Some(pos + 1)
                    && self.starts.get(pos + 1) == Some(&false);
                if merged {
                    let to = self.target_block(*target)?;
                    for mov in edge_moves(desc.block, to, &mut self.tracker) {
                        self.assign(mov.dst, Expr::Reg(mov.src))?;
                    }
                } else {
                    let edge = self.edge(desc.block, *target)?;
                    self.close_block(PseudoTerm::Jump(edge))?;
                }
            }
            BlockExit::Branch(tree) => {
                let term = match &tree.otherwise {
                    Arm::Empty(join) => PseudoTerm::Jump(self.edge(desc.block, *join)?),
                    _ => PseudoTerm::Branch(self.branch(desc.block, tree)?),
                };
                self.close_block(term)?;
            }
            BlockExit::Return => {
                let values = match &block.term {
                    Terminator::Return { values } => self.operands(values)?,
                    _ => Vec::new(),
                };
                self.close_block(PseudoTerm::Return(values))?;
                self.had_return = true;
            }
            BlockExit::Unreachable => {
                self.close_block(PseudoTerm::Unreachable)?;
            }
        }
        Ok(())
    }

    fn branch(&mut self, from: BlockId, tree: &BranchTree) -> Result<BranchTerm, CompileError> {
        let test = match &tree.test {
            BranchTest::Cond(cond) => Test::Cond(self.operand(*cond)?),
            BranchTest::Case { value, consts } => Test::Case {
                value: self.operand(*value)?,
                ty: self.types.get(value).copied().unwrap_or(Ty::Unit),
                consts: consts.clone(),
            },
        };
        let then_edge = self.edge(from, tree.then_target)?;
        let otherwise = match &tree.otherwise {
            Arm::Target(target) | Arm::Empty(target) => ElseArm::Edge(self.edge(from, *target)?),
            Arm::Nested(next) => ElseArm::Nested(Box::new(self.branch(from, next)?)),
        };
        Ok(BranchTerm {
            test,
            then_edge,
            otherwise,
        })
    }

    fn target_block(&self, target: BlockId) -> Result<&'f Block, CompileError> {
        let func = self.func;
        func.block(target)
            .ok_or_else(|| CompileError::internal(format!("jump to unknown bb{}", target.0)))
    }

    fn edge(&mut self, from: BlockId, to: BlockId) -> Result<Edge, CompileError> {
        let block = self.target_block(to)?;
        Ok(Edge {
            to,
            target: UNRESOLVED,
            moves: edge_moves(from, block, &mut self.tracker),
        })
    }

    fn resolve_targets(&mut self) -> Result<(), CompileError> {
        for block in &mut self.blocks {
            for edge in block.term.edges_mut() {
                edge.target = *self.block_entry.get(&edge.to).ok_or_else(|| {
                    CompileError::internal(format!(
                        "pb{} jumps to bb{}, which starts no pseudo-block",
                        block.index, edge.to.0
                    ))
                })?;
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    fn warn(&mut self, pos: PosHash, message: impl Into<String>) {
        let ctx = &mut *self.ctx;
        ctx.diags.warning(&ctx.positions, pos, message);
    }

    fn unsupported(&self, pos: PosHash, message: String) -> CompileError {
        CompileError::Unsupported {
            pos: self.ctx.positions.describe(pos),
            message,
        }
    }
}

/// Which descriptor positions open a new pseudo-block.
fn block_starts(func: &Function, recon: &Reconstruction) -> Vec<bool> {
    let mut preds: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    for (from, to) in recon.transitions() {
        preds.entry(to).or_default().push(from);
    }
    let descriptors = recon.descriptors();
    descriptors
        .iter()
        .enumerate()
        .map(|(pos, desc)| {
            if pos == 0 || desc.kind != BlockKind::Plain {
                return true;
            }
            let prev = &descriptors[pos - 1];
            let sole_pred = matches!(
                preds.get(&desc.block).map(Vec::as_slice),
                Some([pred]) if *pred == prev.block
            );
            let straight = prev.exit == BlockExit::Straight(desc.block);
            let panics = func.block(prev.block).is_some_and(|b| {
                b.insts.iter().any(|inst| {
                    matches!(
                        inst.kind,
                        InstKind::Call {
                            callee: Callee::Builtin(Builtin::Panic),
                            ..
                        }
                    )
                })
            });
            !(sole_pred && straight && !panics)
        })
        .collect()
}

/// Structural checks on a finished dispatch routine.
pub fn validate(dispatch: &DispatchFn) -> Result<(), CompileError> {
    let count = dispatch.blocks.len() as u32;
    for (pos, block) in dispatch.blocks.iter().enumerate() {
        if block.index as usize != pos {
            return Err(CompileError::internal(format!(
                "{}: pseudo-block at slot {} is numbered pb{}",
                dispatch.name, pos, block.index
            )));
        }
        if let Some(target) = block
            .term
            .successors(block.index)
            .into_iter()
            .find(|t| *t >= count)
        {
            return Err(CompileError::internal(format!(
                "{}: pb{} continues at missing pb{}",
                dispatch.name, block.index, target
            )));
        }
        if matches!(block.term, PseudoTerm::Wait { .. }) && !block.stmts.is_empty() {
            return Err(CompileError::internal(format!(
                "{}: blocking pb{} has statements before its operation",
                dispatch.name, block.index
            )));
        }
    }
    if dispatch.blocks.is_empty() {
        return Err(CompileError::internal(format!(
            "{}: no pseudo-blocks emitted",
            dispatch.name
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/backend/t_resume.rs"]
mod tests;
