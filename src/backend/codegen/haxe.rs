//! Haxe emission of dispatch routines.
//!
//! Each routine becomes a class holding its frame: one field per register
//! slot, the inherited `_Next` pseudo-block index and `_incomplete` flag, and
//! a `run()` method that dispatches on `_Next` until the routine suspends or
//! returns.
//!
//! A frame registers itself on its goroutine's stack when constructed and
//! pops itself when it returns. Multi-value results are arrays indexed by
//! position.

use std::collections::HashMap;
use std::fmt::Write;

use crate::backend::marshal::{Words, float_literal, string_literal};
use crate::backend::regalloc::Reg;
use crate::backend::resume::{
    BranchTerm, CallTarget, DispatchFn, Edge, ElseArm, Expr, PseudoBlock, PseudoTerm, Stmt,
    SuspendOp, Test, WaitOp,
};
use crate::context::TargetCaps;
use crate::ssa::model::ir::{ConstValue, FuncId, Ty};

use super::emitter::{
    TargetEmitter, binop_method, binop_symbol, cmp_symbol, unop_method, unop_symbol,
};

/// Class name for a routine named `name`.
pub fn class_name(name: &str) -> String {
    let body: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("Go_{}", body)
}

pub struct HaxeEmitter {
    output: String,
    target: TargetCaps,
    classes: HashMap<FuncId, String>,
    indent: usize,
}

impl HaxeEmitter {
    pub fn new(target: TargetCaps, classes: HashMap<FuncId, String>) -> Self {
        Self {
            output: String::new(),
            target,
            classes,
            indent: 0,
        }
    }

    pub fn finish(self) -> String {
        self.output
    }

    fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.output.push('\n');
            return;
        }
        let _ = writeln!(self.output, "{}{}", "\t".repeat(self.indent), text);
    }

    fn class_of(&self, id: FuncId) -> String {
        self.classes
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Go_f{}", id.0))
    }

    /// `Some(signed)` when values of `ty` are `GOint64` word pairs.
    fn word_pair(&self, ty: Ty) -> Option<bool> {
        match ty {
            Ty::Int { signed, bits: 64 } if !self.target.native_int64 => Some(signed),
            _ => None,
        }
    }

    fn wide_compare(signed: bool, lhs: &str, rhs: &str) -> String {
        let method = if signed { "compare" } else { "ucompare" };
        format!("GOint64.{}({}, {})", method, lhs, rhs)
    }

    fn reg(reg: Reg) -> String {
        format!("_t{}", reg.0)
    }

    fn args(&self, args: &[Expr]) -> String {
        let items: Vec<String> = args.iter().map(|arg| self.expr(arg)).collect();
        format!("[{}]", items.join(", "))
    }

    fn frame_of(&self, callee: &CallTarget, args: &[Expr]) -> String {
        match callee {
            CallTarget::Direct(id) => {
                format!("{}.call(_goroutine, {})", self.class_of(*id), self.args(args))
            }
            CallTarget::Value(value) => format!(
                "Scheduler.frameOf({}, _goroutine, {})",
                self.expr(value),
                self.args(args)
            ),
        }
    }

    fn constant(&self, value: &ConstValue, ty: Ty) -> String {
        match (value, ty) {
            (ConstValue::Nil, _) => "null".to_string(),
            (ConstValue::Bool(b), _) => b.to_string(),
            (ConstValue::Int(v), Ty::Int { signed, bits: 64 }) if !self.target.native_int64 => {
                if signed {
                    format!("Force.toInt64({})", Words::from_i64(*v as i64))
                } else {
                    format!("Force.toUint64({})", Words::from_u64(*v as u64))
                }
            }
            (ConstValue::Int(v), Ty::Int { signed: false, .. }) => format!("0x{:x}", v),
            (ConstValue::Int(v), _) if *v < 0 => format!("({})", v),
            (ConstValue::Int(v), _) => v.to_string(),
            (ConstValue::Float(f), Ty::Float { bits }) => float_literal(*f, bits),
            (ConstValue::Float(f), _) => float_literal(*f, 64),
            (ConstValue::Str(s), _) => string_literal(s.as_bytes(), self.target.strings),
            (ConstValue::Func(id), _) => format!("{}.call", self.class_of(*id)),
        }
    }

    fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Reg(reg) => Self::reg(*reg),
            Expr::Const(value, ty) => self.constant(value, *ty),
            Expr::Bin { op, ty, lhs, rhs } => match self.word_pair(*ty) {
                Some(signed) => format!(
                    "GOint64.{}({}, {})",
                    binop_method(*op, signed),
                    self.expr(lhs),
                    self.expr(rhs)
                ),
                None => format!("({} {} {})", self.expr(lhs), binop_symbol(*op), self.expr(rhs)),
            },
            Expr::Un { op, ty, value } => match self.word_pair(*ty) {
                Some(_) => format!("GOint64.{}({})", unop_method(*op), self.expr(value)),
                None => format!("({}{})", unop_symbol(*op), self.expr(value)),
            },
            Expr::Cmp { op, ty, lhs, rhs } => {
                let (lhs, rhs) = (self.expr(lhs), self.expr(rhs));
                match self.word_pair(*ty) {
                    Some(signed) => format!(
                        "({} {} 0)",
                        Self::wide_compare(signed, &lhs, &rhs),
                        cmp_symbol(*op)
                    ),
                    None => format!("({} {} {})", lhs, cmp_symbol(*op), rhs),
                }
            }
            Expr::Load(ptr) => format!("{}.load()", self.expr(ptr)),
            Expr::LoadAt { base, index } => {
                format!("{}.addr({}).load()", self.expr(base), self.expr(index))
            }
            Expr::IndexAddr { base, index } => {
                format!("{}.addr({})", self.expr(base), self.expr(index))
            }
            Expr::Alloc(count) => format!("Pointer.make(Object.make({}))", count),
            Expr::Call { callee, args } => format!("{}.res()", self.frame_of_sync(callee, args)),
            Expr::MakeChan(cap) => format!("new Channel({})", cap),
            Expr::Extract { tuple, index } => format!("{}[{}]", self.expr(tuple), index),
            Expr::Len(value) => format!("Force.len({})", self.expr(value)),
        }
    }

    /// A call that never suspends runs to completion before returning.
    fn frame_of_sync(&self, callee: &CallTarget, args: &[Expr]) -> String {
        format!("{}.run()", self.frame_of(callee, args))
    }

    fn moves(&mut self, edge: &Edge) {
        for mov in &edge.moves {
            let text = format!("{} = {};", Self::reg(mov.dst), Self::reg(mov.src));
            self.line(&text);
        }
        let text = format!("_Next = {};", edge.target);
        self.line(&text);
    }

    fn test(&self, test: &Test) -> String {
        match test {
            Test::Cond(cond) => self.expr(cond),
            Test::Case { value, ty, consts } => {
                let value = self.expr(value);
                let wide = self.word_pair(*ty);
                let parts: Vec<String> = consts
                    .iter()
                    .map(|c| {
                        let c = self.constant(c, *ty);
                        match wide {
                            Some(signed) => {
                                format!("{} == 0", Self::wide_compare(signed, &value, &c))
                            }
                            None => format!("{} == {}", value, c),
                        }
                    })
                    .collect();
                parts.join(" || ")
            }
        }
    }

    fn branch(&mut self, branch: &BranchTerm, prefix: &str) {
        let head = format!("{}if ({}) {{", prefix, self.test(&branch.test));
        self.line(&head);
        self.indent += 1;
        self.moves(&branch.then_edge);
        self.indent -= 1;
        match &branch.otherwise {
            ElseArm::Edge(edge) => {
                self.line("} else {");
                self.indent += 1;
                self.moves(edge);
                self.indent -= 1;
                self.line("}");
            }
            ElseArm::Nested(next) => self.branch(next, "} else "),
        }
    }
}

impl TargetEmitter for HaxeEmitter {
    fn begin_function(&mut self, func: &DispatchFn) {
        let class = class_name(&func.name);
        let _ = writeln!(self.output);
        self.line(&format!(
            "class {} extends StackFrameBasis implements StackFrame {{",
            class
        ));
        self.indent += 1;
        for reg in 0..func.reg_count {
            self.line(&format!("var {}:Dynamic = null;", Self::reg(Reg(reg))));
        }
        let calls = func.blocks.iter().any(|b| {
            matches!(
                b.term,
                PseudoTerm::Suspend {
                    op: SuspendOp::Call { .. },
                    ..
                }
            )
        });
        if calls {
            self.line("var _sf:StackFrame = null;");
        }
        self.line("");
        self.line("public function new(gr:Int, _p:Array<Dynamic>) {");
        self.indent += 1;
        self.line(&format!("super(gr, {}, \"{}\");", func.pos.0, class));
        for (idx, reg) in func.params.iter().enumerate() {
            self.line(&format!("{} = _p[{}];", Self::reg(*reg), idx));
        }
        self.indent -= 1;
        self.line("}");
        self.line("");
        self.line(&format!(
            "public static function call(gr:Int, _p:Array<Dynamic>):{} {{",
            class
        ));
        self.line(&format!("\treturn new {}(gr, _p);", class));
        self.line("}");
        self.line("");
        self.line(&format!("public function run():{} {{", class));
        self.indent += 1;
        self.line("while (true) {");
        self.indent += 1;
        self.line("switch (_Next) {");
        self.indent += 1;
    }

    fn begin_block(&mut self, block: &PseudoBlock) {
        match block.origin {
            Some(origin) => self.line(&format!("case {}: // bb{}", block.index, origin.0)),
            None => self.line(&format!("case {}:", block.index)),
        }
        self.indent += 1;
        if let Some(reg) = block.bind_result {
            self.line(&format!("{} = _sf.res();", Self::reg(reg)));
        }
    }

    fn emit_stmt(&mut self, stmt: &Stmt) {
        let text = match stmt {
            Stmt::Assign { dst, expr } => format!("{} = {};", Self::reg(*dst), self.expr(expr)),
            Stmt::Store { ptr, value } => {
                format!("{}.store({});", self.expr(ptr), self.expr(value))
            }
            Stmt::Eval(expr) => format!("{};", self.expr(expr)),
            Stmt::Spawn { callee, args } => match callee {
                CallTarget::Direct(id) => format!(
                    "{}.call(Scheduler.makeGoroutine(), {});",
                    self.class_of(*id),
                    self.args(args)
                ),
                CallTarget::Value(value) => format!(
                    "Scheduler.frameOf({}, Scheduler.makeGoroutine(), {});",
                    self.expr(value),
                    self.args(args)
                ),
            },
            Stmt::Print(args) => format!("Console.println({});", self.args(args)),
        };
        self.line(&text);
    }

    fn emit_terminator(&mut self, block: &PseudoBlock) {
        match &block.term {
            PseudoTerm::Fallthrough => self.line(&format!("_Next = {};", block.index + 1)),
            PseudoTerm::Jump(edge) => self.moves(edge),
            PseudoTerm::Branch(branch) => self.branch(branch, ""),
            PseudoTerm::Suspend { op, resume } => {
                if let SuspendOp::Call { callee, args } = op {
                    let text = format!("_sf = {};", self.frame_of(callee, args));
                    self.line(&text);
                }
                self.line(&format!("_Next = {};", resume));
                self.line("return this;");
            }
            PseudoTerm::Wait { op, resume } => {
                match op {
                    WaitOp::Send { chan, value } => {
                        let text = format!(
                            "if (!{}.trySend({})) return this;",
                            self.expr(chan),
                            self.expr(value)
                        );
                        self.line(&text);
                    }
                    WaitOp::Recv { chan, dst } => {
                        let chan = self.expr(chan);
                        self.line(&format!("if (!{}.ready()) return this;", chan));
                        match dst {
                            Some(dst) => {
                                self.line(&format!("{} = {}.recv();", Self::reg(*dst), chan))
                            }
                            None => self.line(&format!("{}.recv();", chan)),
                        }
                    }
                }
                self.line(&format!("_Next = {};", resume));
            }
            PseudoTerm::Return(values) => {
                match values.as_slice() {
                    [] => {}
                    [single] => {
                        let text = format!("_res = {};", self.expr(single));
                        self.line(&text);
                    }
                    many => {
                        let text = format!("_res = {};", self.args(many));
                        self.line(&text);
                    }
                }
                self.line("_incomplete = false;");
                self.line("Scheduler.pop(_goroutine);");
                self.line("return this;");
            }
            PseudoTerm::Panic(value) => {
                let text = format!("Scheduler.panic(_goroutine, {});", self.expr(value));
                self.line(&text);
                self.line("return this;");
            }
            PseudoTerm::Unreachable => self.line("throw \"unreachable code\";"),
        }
        self.indent -= 1;
    }

    fn end_function(&mut self, _func: &DispatchFn) {
        self.line("default:");
        self.line("\tthrow \"unknown pseudo-block \" + _Next;");
        for _ in 0..3 {
            self.indent -= 1;
            self.line("}");
        }
        self.indent -= 1;
        self.line("}");
    }
}
