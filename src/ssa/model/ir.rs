//! SSA input model.
//!
//! Defines the entities the front end hands to the backend: programs,
//! functions, blocks, values and instructions. Block 0 of every function is
//! its entry block.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

impl ValueId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FuncId(pub u32);

/// Source statement a run of instructions was lowered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StmtId(pub u32);

/// Opaque source position hash assigned by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PosHash(pub i32);

impl PosHash {
    pub const NONE: PosHash = PosHash(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    Unit,
    Bool,
    Int { signed: bool, bits: u8 },
    Float { bits: u8 },
    Str,
    Ptr,
    Chan,
    Func,
    Tuple,
}

impl Ty {
    pub const I32: Ty = Ty::Int {
        signed: true,
        bits: 32,
    };
    pub const I64: Ty = Ty::Int {
        signed: true,
        bits: 64,
    };
    pub const U64: Ty = Ty::Int {
        signed: false,
        bits: 64,
    };
    pub const F64: Ty = Ty::Float { bits: 64 };

    pub fn is_int(self) -> bool {
        matches!(self, Ty::Int { .. })
    }

    pub fn is_pointer(self) -> bool {
        matches!(self, Ty::Ptr)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Nil,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    Func(FuncId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Builtin {
    Print,
    Len,
    Panic,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Panic => "panic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    Direct(FuncId),
    Value(ValueId),
    Builtin(Builtin),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDef {
    pub id: ValueId,
    pub ty: Ty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhiArg {
    pub pred: BlockId,
    pub value: ValueId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub result: Option<ValueDef>,
    pub kind: InstKind,
    #[serde(default)]
    pub pos: PosHash,
    #[serde(default)]
    pub stmt: Option<StmtId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstKind {
    Const {
        value: ConstValue,
    },
    BinOp {
        op: BinOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    UnOp {
        op: UnOp,
        value: ValueId,
    },
    Cmp {
        op: CmpOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    Phi {
        incoming: Vec<PhiArg>,
    },
    Alloc {
        count: u32,
    },
    IndexAddr {
        base: ValueId,
        index: ValueId,
    },
    Load {
        ptr: ValueId,
    },
    Store {
        ptr: ValueId,
        value: ValueId,
    },
    Call {
        callee: Callee,
        args: Vec<ValueId>,
    },
    Go {
        callee: Callee,
        args: Vec<ValueId>,
    },
    MakeChan {
        cap: u32,
    },
    Send {
        chan: ValueId,
        value: ValueId,
    },
    Recv {
        chan: ValueId,
    },
    Yield,
    Extract {
        tuple: ValueId,
        index: u32,
    },
    Foreign {
        op: String,
        args: Vec<ValueId>,
    },
}

impl InstKind {
    /// Pure instructions can be recomputed at their use site.
    pub fn is_pure(&self) -> bool {
        matches!(
            self,
            InstKind::Const { .. }
                | InstKind::BinOp { .. }
                | InstKind::UnOp { .. }
                | InstKind::Cmp { .. }
                | InstKind::Extract { .. }
        )
    }

    /// Instructions that can raise a runtime fault.
    pub fn may_trap(&self) -> bool {
        matches!(
            self,
            InstKind::BinOp {
                op: BinOp::Div | BinOp::Rem,
                ..
            } | InstKind::Extract { .. }
                | InstKind::Load { .. }
        )
    }

    /// Instructions whose effect another thread or the host can observe, or
    /// that can fault.
    pub fn has_effect(&self) -> bool {
        !matches!(
            self,
            InstKind::Const { .. }
                | InstKind::BinOp { .. }
                | InstKind::UnOp { .. }
                | InstKind::Cmp { .. }
                | InstKind::Phi { .. }
                | InstKind::Alloc { .. }
                | InstKind::IndexAddr { .. }
                | InstKind::MakeChan { .. }
                | InstKind::Extract { .. }
        ) || self.may_trap()
    }

    /// Blocking channel operations retry in place when not ready.
    pub fn is_blocking(&self) -> bool {
        matches!(self, InstKind::Send { .. } | InstKind::Recv { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub value: ConstValue,
    pub target: BlockId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    Jump {
        target: BlockId,
    },
    If {
        cond: ValueId,
        then_bb: BlockId,
        else_bb: BlockId,
    },
    Switch {
        value: ValueId,
        cases: Vec<SwitchCase>,
        default: BlockId,
    },
    Return {
        values: Vec<ValueId>,
    },
    Unreachable,
}

impl Terminator {
    /// Successor blocks in branch order, with duplicates preserved.
    pub fn targets(&self) -> Vec<BlockId> {
        match self {
            Terminator::Jump { target } => vec![*target],
            Terminator::If {
                then_bb, else_bb, ..
            } => vec![*then_bb, *else_bb],
            Terminator::Switch { cases, default, .. } => {
                let mut out: Vec<BlockId> = cases.iter().map(|case| case.target).collect();
                out.push(*default);
                out
            }
            Terminator::Return { .. } | Terminator::Unreachable => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub insts: Vec<Instruction>,
    pub term: Terminator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSig {
    pub params: Vec<Ty>,
    pub results: Vec<Ty>,
}

impl FunctionSig {
    /// Type of a call's single result value, if any.
    pub fn result_ty(&self) -> Option<Ty> {
        match self.results.as_slice() {
            [] => None,
            [ty] => Some(*ty),
            _ => Some(Ty::Tuple),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub id: FuncId,
    pub name: String,
    #[serde(default)]
    pub pos: PosHash,
    pub sig: FunctionSig,
    pub params: Vec<ValueDef>,
    pub blocks: Vec<Block>,
}

impl Function {
    pub fn entry(&self) -> Option<BlockId> {
        self.blocks.first().map(|block| block.id)
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|block| block.id == id)
    }

    /// Largest value id in use, plus one.
    pub fn value_bound(&self) -> u32 {
        let params = self.params.iter().map(|p| p.id.0 + 1);
        let insts = self
            .blocks
            .iter()
            .flat_map(|b| b.insts.iter())
            .filter_map(|inst| inst.result.as_ref().map(|r| r.id.0 + 1));
        params.chain(insts).max().unwrap_or(0)
    }
}

/// Maps a range of position hashes to a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosFile {
    pub base: i32,
    pub file: String,
}

/// Package-level named constant, checked for compiler directives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedConst {
    pub name: String,
    pub value: ConstValue,
    #[serde(default)]
    pub pos: PosHash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<Function>,
    pub init: Option<FuncId>,
    pub main: FuncId,
    #[serde(default)]
    pub positions: Vec<PosFile>,
    #[serde(default)]
    pub constants: Vec<NamedConst>,
}

impl Program {
    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.iter().find(|func| func.id == id)
    }

    pub fn next_func_id(&self) -> FuncId {
        FuncId(self.functions.iter().map(|f| f.id.0 + 1).max().unwrap_or(0))
    }
}

/// Calls `f` for every value an instruction reads.
pub fn for_each_inst_use(kind: &InstKind, mut f: impl FnMut(ValueId)) {
    match kind {
        InstKind::Const { .. } | InstKind::Alloc { .. } | InstKind::MakeChan { .. } => {}
        InstKind::Yield => {}
        InstKind::BinOp { lhs, rhs, .. } | InstKind::Cmp { lhs, rhs, .. } => {
            f(*lhs);
            f(*rhs);
        }
        InstKind::UnOp { value, .. } => f(*value),
        InstKind::Phi { incoming } => {
            for arg in incoming {
                f(arg.value);
            }
        }
        InstKind::IndexAddr { base, index } => {
            f(*base);
            f(*index);
        }
        InstKind::Load { ptr } => f(*ptr),
        InstKind::Store { ptr, value } => {
            f(*ptr);
            f(*value);
        }
        InstKind::Call { callee, args } | InstKind::Go { callee, args } => {
            if let Callee::Value(value) = callee {
                f(*value);
            }
            for arg in args {
                f(*arg);
            }
        }
        InstKind::Send { chan, value } => {
            f(*chan);
            f(*value);
        }
        InstKind::Recv { chan } => f(*chan),
        InstKind::Extract { tuple, .. } => f(*tuple),
        InstKind::Foreign { args, .. } => {
            for arg in args {
                f(*arg);
            }
        }
    }
}

/// Calls `f` for every value a terminator reads.
pub fn for_each_term_use(term: &Terminator, mut f: impl FnMut(ValueId)) {
    match term {
        Terminator::If { cond, .. } => f(*cond),
        Terminator::Switch { value, .. } => f(*value),
        Terminator::Return { values } => {
            for value in values {
                f(*value);
            }
        }
        Terminator::Jump { .. } | Terminator::Unreachable => {}
    }
}

/// Rewrites every value an instruction reads.
pub fn map_inst_uses(kind: &mut InstKind, mut f: impl FnMut(ValueId) -> ValueId) {
    match kind {
        InstKind::Const { .. } | InstKind::Alloc { .. } | InstKind::MakeChan { .. } => {}
        InstKind::Yield => {}
        InstKind::BinOp { lhs, rhs, .. } | InstKind::Cmp { lhs, rhs, .. } => {
            *lhs = f(*lhs);
            *rhs = f(*rhs);
        }
        InstKind::UnOp { value, .. } => *value = f(*value),
        InstKind::Phi { incoming } => {
            for arg in incoming {
                arg.value = f(arg.value);
            }
        }
        InstKind::IndexAddr { base, index } => {
            *base = f(*base);
            *index = f(*index);
        }
        InstKind::Load { ptr } => *ptr = f(*ptr),
        InstKind::Store { ptr, value } => {
            *ptr = f(*ptr);
            *value = f(*value);
        }
        InstKind::Call { callee, args } | InstKind::Go { callee, args } => {
            if let Callee::Value(value) = callee {
                *value = f(*value);
            }
            for arg in args {
                *arg = f(*arg);
            }
        }
        InstKind::Send { chan, value } => {
            *chan = f(*chan);
            *value = f(*value);
        }
        InstKind::Recv { chan } => *chan = f(*chan),
        InstKind::Extract { tuple, .. } => *tuple = f(*tuple),
        InstKind::Foreign { args, .. } => {
            for arg in args {
                *arg = f(*arg);
            }
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Unit => write!(f, "()"),
            Ty::Bool => write!(f, "bool"),
            Ty::Int { signed, bits } => {
                let prefix = if *signed { "i" } else { "u" };
                write!(f, "{}{}", prefix, bits)
            }
            Ty::Float { bits } => write!(f, "f{}", bits),
            Ty::Str => write!(f, "string"),
            Ty::Ptr => write!(f, "ptr"),
            Ty::Chan => write!(f, "chan"),
            Ty::Func => write!(f, "func"),
            Ty::Tuple => write!(f, "tuple"),
        }
    }
}
