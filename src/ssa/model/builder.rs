//! Minimal SSA function builder.
//!
//! Provides a small API for creating SSA functions for tests and front ends
//! without exposing the raw ID allocation details.

use super::ir::*;

/// Constructs SSA functions while managing ID allocation.
pub struct FunctionBuilder {
    func: Function,
    next_value: u32,
    next_block: u32,
    stmt: Option<StmtId>,
    pos: PosHash,
}

impl FunctionBuilder {
    pub fn new(id: FuncId, name: impl Into<String>, sig: FunctionSig) -> Self {
        let mut builder = Self {
            func: Function {
                id,
                name: name.into(),
                pos: PosHash::NONE,
                sig: sig.clone(),
                params: Vec::new(),
                blocks: Vec::new(),
            },
            next_value: 0,
            next_block: 0,
            stmt: None,
            pos: PosHash::NONE,
        };
        for ty in sig.params {
            let id = builder.alloc_value();
            builder.func.params.push(ValueDef { id, ty });
        }
        builder
    }

    pub fn param(&self, index: usize) -> ValueId {
        self.func.params[index].id
    }

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.func.blocks.push(Block {
            id,
            insts: Vec::new(),
            term: Terminator::Unreachable,
        });
        id
    }

    /// Tags subsequently added instructions with a statement group.
    pub fn set_stmt(&mut self, stmt: Option<StmtId>) {
        self.stmt = stmt;
    }

    /// Tags subsequently added instructions with a source position.
    pub fn set_pos(&mut self, pos: PosHash) {
        self.pos = pos;
    }

    pub fn const_value(&mut self, block: BlockId, value: ConstValue, ty: Ty) -> ValueId {
        self.push_value(block, ty, InstKind::Const { value })
    }

    pub fn const_int(&mut self, block: BlockId, value: i128, ty: Ty) -> ValueId {
        self.const_value(block, ConstValue::Int(value), ty)
    }

    pub fn binop(
        &mut self,
        block: BlockId,
        op: BinOp,
        lhs: ValueId,
        rhs: ValueId,
        ty: Ty,
    ) -> ValueId {
        self.push_value(block, ty, InstKind::BinOp { op, lhs, rhs })
    }

    pub fn unop(&mut self, block: BlockId, op: UnOp, value: ValueId, ty: Ty) -> ValueId {
        self.push_value(block, ty, InstKind::UnOp { op, value })
    }

    pub fn cmp(&mut self, block: BlockId, op: CmpOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.push_value(block, Ty::Bool, InstKind::Cmp { op, lhs, rhs })
    }

    pub fn phi(&mut self, block: BlockId, incoming: Vec<(BlockId, ValueId)>, ty: Ty) -> ValueId {
        let incoming = incoming
            .into_iter()
            .map(|(pred, value)| PhiArg { pred, value })
            .collect();
        self.push_value(block, ty, InstKind::Phi { incoming })
    }

    /// Adds a phi whose incoming values are filled in later with `set_phi`.
    pub fn phi_placeholder(&mut self, block: BlockId, ty: Ty) -> ValueId {
        self.phi(block, Vec::new(), ty)
    }

    pub fn set_phi(&mut self, block: BlockId, phi: ValueId, incoming: Vec<(BlockId, ValueId)>) {
        let block = self.block_mut(block);
        let inst = block
            .insts
            .iter_mut()
            .find(|inst| inst.result.as_ref().map(|r| r.id) == Some(phi))
            .unwrap_or_else(|| panic!("no phi {:?}", phi));
        inst.kind = InstKind::Phi {
            incoming: incoming
                .into_iter()
                .map(|(pred, value)| PhiArg { pred, value })
                .collect(),
        };
    }

    pub fn alloc(&mut self, block: BlockId, count: u32) -> ValueId {
        self.push_value(block, Ty::Ptr, InstKind::Alloc { count })
    }

    pub fn index_addr(&mut self, block: BlockId, base: ValueId, index: ValueId) -> ValueId {
        self.push_value(block, Ty::Ptr, InstKind::IndexAddr { base, index })
    }

    pub fn load(&mut self, block: BlockId, ptr: ValueId, ty: Ty) -> ValueId {
        self.push_value(block, ty, InstKind::Load { ptr })
    }

    pub fn store(&mut self, block: BlockId, ptr: ValueId, value: ValueId) {
        self.push_effect(block, InstKind::Store { ptr, value });
    }

    pub fn call(
        &mut self,
        block: BlockId,
        callee: Callee,
        args: Vec<ValueId>,
        ret: Option<Ty>,
    ) -> Option<ValueId> {
        let kind = InstKind::Call { callee, args };
        match ret {
            Some(ty) => Some(self.push_value(block, ty, kind)),
            None => {
                self.push_effect(block, kind);
                None
            }
        }
    }

    pub fn go(&mut self, block: BlockId, callee: Callee, args: Vec<ValueId>) {
        self.push_effect(block, InstKind::Go { callee, args });
    }

    pub fn make_chan(&mut self, block: BlockId, cap: u32) -> ValueId {
        self.push_value(block, Ty::Chan, InstKind::MakeChan { cap })
    }

    pub fn send(&mut self, block: BlockId, chan: ValueId, value: ValueId) {
        self.push_effect(block, InstKind::Send { chan, value });
    }

    pub fn recv(&mut self, block: BlockId, chan: ValueId, ty: Ty) -> ValueId {
        self.push_value(block, ty, InstKind::Recv { chan })
    }

    pub fn yield_now(&mut self, block: BlockId) {
        self.push_effect(block, InstKind::Yield);
    }

    pub fn extract(&mut self, block: BlockId, tuple: ValueId, index: u32, ty: Ty) -> ValueId {
        self.push_value(block, ty, InstKind::Extract { tuple, index })
    }

    pub fn foreign(
        &mut self,
        block: BlockId,
        op: impl Into<String>,
        args: Vec<ValueId>,
        ty: Ty,
    ) -> ValueId {
        self.push_value(
            block,
            ty,
            InstKind::Foreign {
                op: op.into(),
                args,
            },
        )
    }

    pub fn set_terminator(&mut self, block: BlockId, term: Terminator) {
        let block = self.block_mut(block);
        block.term = term;
    }

    pub fn jump(&mut self, block: BlockId, target: BlockId) {
        self.set_terminator(block, Terminator::Jump { target });
    }

    pub fn branch(&mut self, block: BlockId, cond: ValueId, then_bb: BlockId, else_bb: BlockId) {
        self.set_terminator(
            block,
            Terminator::If {
                cond,
                then_bb,
                else_bb,
            },
        );
    }

    pub fn ret(&mut self, block: BlockId, values: Vec<ValueId>) {
        self.set_terminator(block, Terminator::Return { values });
    }

    pub fn finish(self) -> Function {
        self.func
    }

    fn push_value(&mut self, block: BlockId, ty: Ty, kind: InstKind) -> ValueId {
        let id = self.alloc_value();
        let (pos, stmt) = (self.pos, self.stmt);
        self.block_mut(block).insts.push(Instruction {
            result: Some(ValueDef { id, ty }),
            kind,
            pos,
            stmt,
        });
        id
    }

    fn push_effect(&mut self, block: BlockId, kind: InstKind) {
        let (pos, stmt) = (self.pos, self.stmt);
        self.block_mut(block).insts.push(Instruction {
            result: None,
            kind,
            pos,
            stmt,
        });
    }

    fn alloc_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }

    fn block_mut(&mut self, block: BlockId) -> &mut Block {
        let index = block.index();
        self.func
            .blocks
            .get_mut(index)
            .unwrap_or_else(|| panic!("invalid block id {:?}", block))
    }
}
