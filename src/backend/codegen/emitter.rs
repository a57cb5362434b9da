//! Target-agnostic emission interface for dispatch routines.

use crate::backend::resume::{DispatchFn, PseudoBlock, Stmt};
use crate::ssa::model::ir::{BinOp, CmpOp, UnOp};

/// Receives one dispatch routine at a time, pseudo-block by pseudo-block.
pub trait TargetEmitter {
    /// Begin a routine: its frame fields and entry point.
    fn begin_function(&mut self, func: &DispatchFn);

    /// Begin the code for one pseudo-block index.
    fn begin_block(&mut self, block: &PseudoBlock);

    fn emit_stmt(&mut self, stmt: &Stmt);

    /// Emit the block's terminator, including any phi copies on its edges.
    fn emit_terminator(&mut self, block: &PseudoBlock);

    fn end_function(&mut self, _func: &DispatchFn) {}
}

/// Drives `emitter` over every pseudo-block of `func` in index order.
pub fn emit_dispatch(func: &DispatchFn, emitter: &mut dyn TargetEmitter) {
    emitter.begin_function(func);
    for block in &func.blocks {
        emitter.begin_block(block);
        for stmt in &block.stmts {
            emitter.emit_stmt(stmt);
        }
        emitter.emit_terminator(block);
    }
    emitter.end_function(func);
}

pub fn binop_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Rem => "%",
        BinOp::And => "&",
        BinOp::Or => "|",
        BinOp::Xor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
    }
}

/// Method name on the 64-bit word-pair class.
pub fn binop_method(op: BinOp, signed: bool) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div if signed => "div",
        BinOp::Div => "udiv",
        BinOp::Rem if signed => "mod",
        BinOp::Rem => "umod",
        BinOp::And => "and",
        BinOp::Or => "or",
        BinOp::Xor => "xor",
        BinOp::Shl => "shl",
        BinOp::Shr if signed => "shr",
        BinOp::Shr => "ushr",
    }
}

/// Method name on the 64-bit word-pair class.
pub fn unop_method(op: UnOp) -> &'static str {
    match op {
        UnOp::Neg => "neg",
        UnOp::BitNot => "complement",
        UnOp::Not => "not",
    }
}

pub fn cmp_symbol(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "==",
        CmpOp::Ne => "!=",
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
    }
}

pub fn unop_symbol(op: UnOp) -> &'static str {
    match op {
        UnOp::Neg => "-",
        UnOp::Not => "!",
        UnOp::BitNot => "~",
    }
}
