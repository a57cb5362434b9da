//! Block descriptors produced by control-flow reconstruction.

use crate::ssa::model::ir::{BlockId, ConstValue, Terminator, ValueId};

/// Structural classification of a block from its incoming edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Entry,
    /// Target of a retreating edge.
    LoopHeader,
    /// More than one forward predecessor.
    Join,
    Plain,
}

/// Single structural role of a block, combining its kind and its exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockRole {
    Entry,
    LoopHeader,
    Join,
    Branch,
    Plain,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BranchTest {
    /// Taken when the boolean value is true.
    Cond(ValueId),
    /// Taken when the value equals any of the constants.
    Case {
        value: ValueId,
        consts: Vec<ConstValue>,
    },
}

/// The "else" side of a binary branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Arm {
    Target(BlockId),
    /// Both sides converge on the given block immediately; the arm holds no
    /// transition of its own.
    Empty(BlockId),
    Nested(Box<BranchTree>),
}

/// Binary branch; multi-way branches become a chain through `Arm::Nested`.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchTree {
    pub test: BranchTest,
    pub then_target: BlockId,
    pub otherwise: Arm,
}

impl BranchTree {
    /// Distinct transition targets, "then" sides first, final "else" last.
    pub fn targets(&self) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut tree = self;
        loop {
            out.push(tree.then_target);
            match &tree.otherwise {
                Arm::Target(target) => {
                    out.push(*target);
                    return out;
                }
                Arm::Empty(_) => return out,
                Arm::Nested(next) => tree = next,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockExit {
    Straight(BlockId),
    Branch(BranchTree),
    Return,
    Unreachable,
}

impl BlockExit {
    /// Builds the exit shape of a source terminator.
    pub fn from_terminator(term: &Terminator) -> Self {
        match term {
            Terminator::Jump { target } => BlockExit::Straight(*target),
            Terminator::If {
                cond,
                then_bb,
                else_bb,
            } => {
                let otherwise = if then_bb == else_bb {
                    Arm::Empty(*then_bb)
                } else {
                    Arm::Target(*else_bb)
                };
                BlockExit::Branch(BranchTree {
                    test: BranchTest::Cond(*cond),
                    then_target: *then_bb,
                    otherwise,
                })
            }
            Terminator::Switch {
                value,
                cases,
                default,
            } => {
                // Merge cases by target, in order of first appearance.
                let mut groups: Vec<(BlockId, Vec<ConstValue>)> = Vec::new();
                for case in cases {
                    if case.target == *default {
                        continue;
                    }
                    match groups.iter_mut().find(|(target, _)| *target == case.target) {
                        Some((_, consts)) => consts.push(case.value.clone()),
                        None => groups.push((case.target, vec![case.value.clone()])),
                    }
                }
                let mut otherwise = Arm::Target(*default);
                for (target, consts) in groups.into_iter().rev() {
                    let tree = BranchTree {
                        test: BranchTest::Case {
                            value: *value,
                            consts,
                        },
                        then_target: target,
                        otherwise,
                    };
                    otherwise = Arm::Nested(Box::new(tree));
                }
                match otherwise {
                    Arm::Nested(tree) => BlockExit::Branch(*tree),
                    _ => BlockExit::Straight(*default),
                }
            }
            Terminator::Return { .. } => BlockExit::Return,
            Terminator::Unreachable => BlockExit::Unreachable,
        }
    }

    pub fn targets(&self) -> Vec<BlockId> {
        match self {
            BlockExit::Straight(target) => vec![*target],
            BlockExit::Branch(tree) => tree.targets(),
            BlockExit::Return | BlockExit::Unreachable => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockDescriptor {
    pub block: BlockId,
    pub kind: BlockKind,
    pub exit: BlockExit,
    /// Number of loops containing the block.
    pub loop_depth: u32,
    /// Open `else` sections when the block is emitted.
    pub else_depth: u32,
}

impl BlockDescriptor {
    pub fn role(&self) -> BlockRole {
        match self.kind {
            BlockKind::Entry => BlockRole::Entry,
            BlockKind::LoopHeader => BlockRole::LoopHeader,
            BlockKind::Join => BlockRole::Join,
            BlockKind::Plain => match self.exit {
                BlockExit::Branch(_) => BlockRole::Branch,
                _ => BlockRole::Plain,
            },
        }
    }
}

/// Body of one loop, blocks listed in reconstructed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopInfo {
    pub header: BlockId,
    pub body: Vec<BlockId>,
}
