//! Textual form of SSA functions, used by `--dump ssa` and test expectations.

use std::fmt::{self, Write};

use super::ir::*;

pub fn format_func(func: &Function) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_func(&mut out, func);
    out
}

fn write_func(out: &mut String, func: &Function) -> fmt::Result {
    let params: Vec<String> = func
        .params
        .iter()
        .map(|p| format!("%v{}: {}", p.id.0, p.ty))
        .collect();
    let results: Vec<String> = func.sig.results.iter().map(|ty| ty.to_string()).collect();
    writeln!(
        out,
        "fn {}({}) -> ({}) {{",
        func.name,
        params.join(", "),
        results.join(", ")
    )?;
    for block in &func.blocks {
        writeln!(out, "  bb{}:", block.id.0)?;
        for inst in &block.insts {
            write!(out, "    ")?;
            if let Some(result) = &inst.result {
                write!(out, "%v{}: {} = ", result.id.0, result.ty)?;
            }
            writeln!(out, "{}", FormatInst(&inst.kind))?;
        }
        writeln!(out, "    {}", FormatTerm(&block.term))?;
    }
    writeln!(out, "}}")
}

struct FormatInst<'a>(&'a InstKind);

impl fmt::Display for FormatInst<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            InstKind::Const { value } => write!(f, "const {}", FormatConst(value)),
            InstKind::BinOp { op, lhs, rhs } => {
                write!(f, "{:?} %v{}, %v{}", op, lhs.0, rhs.0)
            }
            InstKind::UnOp { op, value } => write!(f, "{:?} %v{}", op, value.0),
            InstKind::Cmp { op, lhs, rhs } => {
                write!(f, "cmp.{:?} %v{}, %v{}", op, lhs.0, rhs.0)
            }
            InstKind::Phi { incoming } => {
                let args: Vec<String> = incoming
                    .iter()
                    .map(|arg| format!("bb{}: %v{}", arg.pred.0, arg.value.0))
                    .collect();
                write!(f, "phi [{}]", args.join(", "))
            }
            InstKind::Alloc { count } => write!(f, "alloc {}", count),
            InstKind::IndexAddr { base, index } => {
                write!(f, "index_addr %v{}, %v{}", base.0, index.0)
            }
            InstKind::Load { ptr } => write!(f, "load %v{}", ptr.0),
            InstKind::Store { ptr, value } => write!(f, "store %v{}, %v{}", ptr.0, value.0),
            InstKind::Call { callee, args } => {
                write!(f, "call {}({})", FormatCallee(callee), FormatArgs(args))
            }
            InstKind::Go { callee, args } => {
                write!(f, "go {}({})", FormatCallee(callee), FormatArgs(args))
            }
            InstKind::MakeChan { cap } => write!(f, "make_chan {}", cap),
            InstKind::Send { chan, value } => write!(f, "send %v{}, %v{}", chan.0, value.0),
            InstKind::Recv { chan } => write!(f, "recv %v{}", chan.0),
            InstKind::Yield => write!(f, "yield"),
            InstKind::Extract { tuple, index } => write!(f, "extract %v{}.{}", tuple.0, index),
            InstKind::Foreign { op, args } => write!(f, "foreign {}({})", op, FormatArgs(args)),
        }
    }
}

struct FormatTerm<'a>(&'a Terminator);

impl fmt::Display for FormatTerm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Terminator::Jump { target } => write!(f, "jump bb{}", target.0),
            Terminator::If {
                cond,
                then_bb,
                else_bb,
            } => write!(f, "if %v{} then bb{} else bb{}", cond.0, then_bb.0, else_bb.0),
            Terminator::Switch {
                value,
                cases,
                default,
            } => {
                write!(f, "switch %v{} [", value.0)?;
                for case in cases {
                    write!(f, "{} => bb{}, ", FormatConst(&case.value), case.target.0)?;
                }
                write!(f, "_ => bb{}]", default.0)
            }
            Terminator::Return { values } => write!(f, "return {}", FormatArgs(values)),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

struct FormatConst<'a>(&'a ConstValue);

impl fmt::Display for FormatConst<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ConstValue::Nil => write!(f, "nil"),
            ConstValue::Bool(b) => write!(f, "{}", b),
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Float(v) => write!(f, "{:?}", v),
            ConstValue::Str(s) => write!(f, "{:?}", s),
            ConstValue::Func(id) => write!(f, "@f{}", id.0),
        }
    }
}

struct FormatCallee<'a>(&'a Callee);

impl fmt::Display for FormatCallee<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Callee::Direct(id) => write!(f, "@f{}", id.0),
            Callee::Value(value) => write!(f, "%v{}", value.0),
            Callee::Builtin(builtin) => write!(f, "{}", builtin.name()),
        }
    }
}

struct FormatArgs<'a>(&'a [ValueId]);

impl fmt::Display for FormatArgs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, arg) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "%v{}", arg.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/ssa/t_format.rs"]
mod tests;
