//! Dispatch-routine model produced by the resumable compiler.
//!
//! A `DispatchFn` is a list of pseudo-blocks addressed by index. The frame
//! executing it keeps the index of the next pseudo-block to run; every
//! suspension stores a resume index and returns control to the scheduler.

use std::fmt;

use crate::backend::regalloc::Reg;
use crate::ssa::model::ir::{BinOp, BlockId, CmpOp, ConstValue, FuncId, PosHash, Ty, UnOp};

use super::moves::Move;

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchFn {
    pub id: FuncId,
    pub name: String,
    pub pos: PosHash,
    /// Slot of each parameter, in order.
    pub params: Vec<Reg>,
    pub param_tys: Vec<Ty>,
    pub results: Vec<Ty>,
    pub reg_count: u32,
    pub may_suspend: bool,
    pub blocks: Vec<PseudoBlock>,
}

impl DispatchFn {
    pub fn block(&self, index: u32) -> Option<&PseudoBlock> {
        self.blocks.get(index as usize)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PseudoBlock {
    pub index: u32,
    /// Source block whose code starts or continues here.
    pub origin: Option<BlockId>,
    /// Receives the result of the call that suspended into this block.
    pub bind_result: Option<Reg>,
    pub stmts: Vec<Stmt>,
    pub term: PseudoTerm,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    Direct(FuncId),
    Value(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Reg(Reg),
    Const(ConstValue, Ty),
    Bin {
        op: BinOp,
        ty: Ty,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Un {
        op: UnOp,
        ty: Ty,
        value: Box<Expr>,
    },
    /// `ty` is the operand type.
    Cmp {
        op: CmpOp,
        ty: Ty,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Load(Box<Expr>),
    /// Load through an address computed in place.
    LoadAt {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    IndexAddr {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Alloc(u32),
    /// Call to a function that never suspends.
    Call {
        callee: CallTarget,
        args: Vec<Expr>,
    },
    MakeChan(u32),
    Extract {
        tuple: Box<Expr>,
        index: u32,
    },
    Len(Box<Expr>),
}

impl Expr {
    /// Pure expressions may be shared between equal computations.
    pub fn is_pure(&self) -> bool {
        match self {
            Expr::Reg(_) | Expr::Const(..) => true,
            Expr::Bin { lhs, rhs, .. } | Expr::Cmp { lhs, rhs, .. } => {
                lhs.is_pure() && rhs.is_pure()
            }
            Expr::Un { value, .. } => value.is_pure(),
            Expr::IndexAddr { base, index } => base.is_pure() && index.is_pure(),
            Expr::Extract { tuple, .. } => tuple.is_pure(),
            Expr::Len(value) => value.is_pure(),
            Expr::Load(_)
            | Expr::LoadAt { .. }
            | Expr::Alloc(_)
            | Expr::Call { .. }
            | Expr::MakeChan(_) => false,
        }
    }

    /// Whether the expression reads `reg`.
    pub fn reads(&self, reg: Reg) -> bool {
        match self {
            Expr::Reg(r) => *r == reg,
            Expr::Const(..) | Expr::Alloc(_) | Expr::MakeChan(_) => false,
            Expr::Bin { lhs, rhs, .. } | Expr::Cmp { lhs, rhs, .. } => {
                lhs.reads(reg) || rhs.reads(reg)
            }
            Expr::Un { value, .. } | Expr::Load(value) | Expr::Len(value) => value.reads(reg),
            Expr::LoadAt { base, index } | Expr::IndexAddr { base, index } => {
                base.reads(reg) || index.reads(reg)
            }
            Expr::Call { callee, args } => {
                matches!(callee, CallTarget::Value(target) if target.reads(reg))
                    || args.iter().any(|arg| arg.reads(reg))
            }
            Expr::Extract { tuple, .. } => tuple.reads(reg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign { dst: Reg, expr: Expr },
    Store { ptr: Expr, value: Expr },
    /// Evaluate for effect only.
    Eval(Expr),
    Spawn { callee: CallTarget, args: Vec<Expr> },
    Print(Vec<Expr>),
}

/// Transfer to the pseudo-block that starts source block `to`, after the
/// edge's phi copies.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub to: BlockId,
    pub target: u32,
    pub moves: Vec<Move>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Test {
    Cond(Expr),
    /// Value equals any of the constants.
    Case {
        value: Expr,
        ty: Ty,
        consts: Vec<ConstValue>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElseArm {
    Edge(Edge),
    Nested(Box<BranchTerm>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchTerm {
    pub test: Test,
    pub then_edge: Edge,
    pub otherwise: ElseArm,
}

impl BranchTerm {
    pub fn edges(&self) -> Vec<&Edge> {
        let mut out = vec![&self.then_edge];
        match &self.otherwise {
            ElseArm::Edge(edge) => out.push(edge),
            ElseArm::Nested(next) => out.extend(next.edges()),
        }
        out
    }

    fn edges_mut(&mut self) -> Vec<&mut Edge> {
        let mut out = vec![&mut self.then_edge];
        match &mut self.otherwise {
            ElseArm::Edge(edge) => out.push(edge),
            ElseArm::Nested(next) => out.extend(next.edges_mut()),
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SuspendOp {
    /// Call into a function that may suspend. The result lands in the
    /// resume block's `bind_result`.
    Call {
        callee: CallTarget,
        args: Vec<Expr>,
    },
    Yield,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaitOp {
    Send { chan: Expr, value: Expr },
    Recv { chan: Expr, dst: Option<Reg> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PseudoTerm {
    /// Continue with the pseudo-block at `index + 1`.
    Fallthrough,
    Jump(Edge),
    Branch(BranchTerm),
    Suspend { op: SuspendOp, resume: u32 },
    /// Blocking channel operation. Re-entering the block retries it.
    Wait { op: WaitOp, resume: u32 },
    Return(Vec<Expr>),
    Panic(Expr),
    Unreachable,
}

impl PseudoTerm {
    pub fn edges(&self) -> Vec<&Edge> {
        match self {
            PseudoTerm::Jump(edge) => vec![edge],
            PseudoTerm::Branch(branch) => branch.edges(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn edges_mut(&mut self) -> Vec<&mut Edge> {
        match self {
            PseudoTerm::Jump(edge) => vec![edge],
            PseudoTerm::Branch(branch) => branch.edges_mut(),
            _ => Vec::new(),
        }
    }

    /// Pseudo-block indices this terminator can continue at.
    pub fn successors(&self, index: u32) -> Vec<u32> {
        match self {
            PseudoTerm::Fallthrough => vec![index + 1],
            PseudoTerm::Suspend { resume, .. } | PseudoTerm::Wait { resume, .. } => vec![*resume],
            _ => self.edges().into_iter().map(|edge| edge.target).collect(),
        }
    }

    pub fn is_suspension(&self) -> bool {
        matches!(self, PseudoTerm::Suspend { .. } | PseudoTerm::Wait { .. })
    }
}

// -----------------------------------------------------------------------------
// Dump format
// -----------------------------------------------------------------------------

impl fmt::Display for DispatchFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(|r| r.to_string()).collect();
        writeln!(
            f,
            "dispatch {}({}) regs={} suspends={} {{",
            self.name,
            params.join(", "),
            self.reg_count,
            self.may_suspend
        )?;
        for block in &self.blocks {
            write!(f, "  pb{}", block.index)?;
            if let Some(origin) = block.origin {
                write!(f, " (bb{})", origin.0)?;
            }
            if let Some(reg) = block.bind_result {
                write!(f, " bind {}", reg)?;
            }
            writeln!(f, ":")?;
            for stmt in &block.stmts {
                writeln!(f, "    {}", stmt)?;
            }
            writeln!(f, "    {}", block.term)?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Assign { dst, expr } => write!(f, "{} = {}", dst, expr),
            Stmt::Store { ptr, value } => write!(f, "*{} = {}", ptr, value),
            Stmt::Eval(expr) => write!(f, "{}", expr),
            Stmt::Spawn { callee, args } => write!(f, "go {}({})", callee, List(args)),
            Stmt::Print(args) => write!(f, "print({})", List(args)),
        }
    }
}

impl fmt::Display for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallTarget::Direct(id) => write!(f, "@f{}", id.0),
            CallTarget::Value(expr) => write!(f, "({})", expr),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Reg(reg) => write!(f, "{}", reg),
            Expr::Const(value, _) => match value {
                ConstValue::Nil => write!(f, "nil"),
                ConstValue::Bool(b) => write!(f, "{}", b),
                ConstValue::Int(v) => write!(f, "{}", v),
                ConstValue::Float(v) => write!(f, "{:?}", v),
                ConstValue::Str(s) => write!(f, "{:?}", s),
                ConstValue::Func(id) => write!(f, "@f{}", id.0),
            },
            Expr::Bin { op, lhs, rhs, .. } => write!(f, "({} {:?} {})", lhs, op, rhs),
            Expr::Un { op, value, .. } => write!(f, "{:?}({})", op, value),
            Expr::Cmp { op, lhs, rhs, .. } => write!(f, "({} {:?} {})", lhs, op, rhs),
            Expr::Load(ptr) => write!(f, "*{}", ptr),
            Expr::LoadAt { base, index } => write!(f, "{}[{}]", base, index),
            Expr::IndexAddr { base, index } => write!(f, "&{}[{}]", base, index),
            Expr::Alloc(count) => write!(f, "alloc({})", count),
            Expr::Call { callee, args } => write!(f, "{}({})", callee, List(args)),
            Expr::MakeChan(cap) => write!(f, "chan({})", cap),
            Expr::Extract { tuple, index } => write!(f, "{}.{}", tuple, index),
            Expr::Len(value) => write!(f, "len({})", value),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for mov in &self.moves {
            write!(f, "{} = {}; ", mov.dst, mov.src)?;
        }
        write!(f, "goto pb{}", self.target)
    }
}

impl fmt::Display for BranchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.test {
            Test::Cond(cond) => write!(f, "if {} {{ {} }}", cond, self.then_edge)?,
            Test::Case { value, consts, .. } => {
                let consts: Vec<String> = consts
                    .iter()
                    .map(|c| Expr::Const(c.clone(), Ty::Unit).to_string())
                    .collect();
                write!(f, "if {} in [{}] {{ {} }}", value, consts.join(", "), self.then_edge)?
            }
        }
        match &self.otherwise {
            ElseArm::Edge(edge) => write!(f, " else {{ {} }}", edge),
            ElseArm::Nested(next) => write!(f, " else {}", next),
        }
    }
}

impl fmt::Display for PseudoTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PseudoTerm::Fallthrough => write!(f, "fallthrough"),
            PseudoTerm::Jump(edge) => write!(f, "{}", edge),
            PseudoTerm::Branch(branch) => write!(f, "{}", branch),
            PseudoTerm::Suspend { op, resume } => match op {
                SuspendOp::Call { callee, args } => {
                    write!(f, "suspend call {}({}) -> pb{}", callee, List(args), resume)
                }
                SuspendOp::Yield => write!(f, "suspend yield -> pb{}", resume),
            },
            PseudoTerm::Wait { op, resume } => match op {
                WaitOp::Send { chan, value } => {
                    write!(f, "wait send {} <- {} -> pb{}", chan, value, resume)
                }
                WaitOp::Recv { chan, dst } => match dst {
                    Some(dst) => write!(f, "wait {} = recv {} -> pb{}", dst, chan, resume),
                    None => write!(f, "wait recv {} -> pb{}", chan, resume),
                },
            },
            PseudoTerm::Return(values) => write!(f, "return {}", List(values)),
            PseudoTerm::Panic(value) => write!(f, "panic {}", value),
            PseudoTerm::Unreachable => write!(f, "unreachable"),
        }
    }
}

struct List<'a>(&'a [Expr]);

impl fmt::Display for List<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, item) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}
