use crate::backend::structure::{
    Arm, BlockExit, BlockKind, BlockRole, BranchTest, LoopInfo, reconstruct,
};
use crate::ssa::analysis::cfg::Cfg;
use crate::ssa::model::builder::FunctionBuilder;
use crate::ssa::model::ir::{
    BlockId, ConstValue, FuncId, Function, FunctionSig, SwitchCase, Terminator, Ty,
};

fn blocks(params: Vec<Ty>, count: usize) -> (FunctionBuilder, Vec<BlockId>) {
    let mut b = FunctionBuilder::new(
        FuncId(0),
        "f",
        FunctionSig {
            params,
            results: vec![],
        },
    );
    let ids = (0..count).map(|_| b.add_block()).collect();
    (b, ids)
}

fn diamond() -> Function {
    let (mut b, bb) = blocks(vec![Ty::Bool], 4);
    let cond = b.param(0);
    b.branch(bb[0], cond, bb[1], bb[2]);
    b.jump(bb[1], bb[3]);
    b.jump(bb[2], bb[3]);
    b.ret(bb[3], vec![]);
    b.finish()
}

fn while_loop() -> Function {
    let (mut b, bb) = blocks(vec![Ty::Bool], 4);
    let cond = b.param(0);
    b.jump(bb[0], bb[1]);
    b.branch(bb[1], cond, bb[2], bb[3]);
    b.jump(bb[2], bb[1]);
    b.ret(bb[3], vec![]);
    b.finish()
}

fn switch() -> Function {
    let (mut b, bb) = blocks(vec![Ty::I64], 4);
    let value = b.param(0);
    let case = |v: i128, target: BlockId| SwitchCase {
        value: ConstValue::Int(v),
        target,
    };
    b.set_terminator(
        bb[0],
        Terminator::Switch {
            value,
            cases: vec![
                case(1, bb[1]),
                case(2, bb[2]),
                case(3, bb[1]),
                case(4, bb[3]),
            ],
            default: bb[3],
        },
    );
    b.jump(bb[1], bb[3]);
    b.jump(bb[2], bb[3]);
    b.ret(bb[3], vec![]);
    b.finish()
}

#[test]
fn test_diamond_then_before_else() {
    let cfg = Cfg::new(&diamond());
    let recon = reconstruct(&cfg);
    recon.validate(&cfg).unwrap();

    assert_eq!(recon.order(), vec![BlockId(0), BlockId(1), BlockId(2), BlockId(3)]);
    let kinds: Vec<BlockKind> = recon.descriptors().iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![BlockKind::Entry, BlockKind::Plain, BlockKind::Plain, BlockKind::Join]
    );
    let else_depths: Vec<u32> = recon.descriptors().iter().map(|d| d.else_depth).collect();
    assert_eq!(else_depths, vec![0, 1, 0, 0]);
    assert_eq!(
        recon.descriptor(BlockId(0)).map(|d| d.role()),
        Some(BlockRole::Entry)
    );
    assert!(recon.loops().is_empty());
}

#[test]
fn test_loop_header_and_body() {
    let cfg = Cfg::new(&while_loop());
    let recon = reconstruct(&cfg);
    recon.validate(&cfg).unwrap();

    assert_eq!(recon.order(), vec![BlockId(0), BlockId(1), BlockId(2), BlockId(3)]);
    assert_eq!(
        recon.descriptor(BlockId(1)).map(|d| d.role()),
        Some(BlockRole::LoopHeader)
    );
    assert_eq!(recon.descriptor(BlockId(2)).map(|d| d.loop_depth), Some(1));
    assert_eq!(recon.descriptor(BlockId(3)).map(|d| d.loop_depth), Some(0));
    assert_eq!(
        recon.loops(),
        &[LoopInfo {
            header: BlockId(1),
            body: vec![BlockId(1), BlockId(2)],
        }]
    );
    assert_eq!(
        recon.transitions(),
        vec![
            (BlockId(0), BlockId(1)),
            (BlockId(1), BlockId(2)),
            (BlockId(1), BlockId(3)),
            (BlockId(2), BlockId(1)),
        ]
    );
}

#[test]
fn test_switch_becomes_binary_chain() {
    let cfg = Cfg::new(&switch());
    let recon = reconstruct(&cfg);
    recon.validate(&cfg).unwrap();

    let Some(BlockExit::Branch(tree)) = recon.descriptor(BlockId(0)).map(|d| d.exit.clone())
    else {
        panic!("expected a branch exit");
    };
    assert_eq!(
        tree.test,
        BranchTest::Case {
            value: crate::ssa::model::ir::ValueId(0),
            consts: vec![ConstValue::Int(1), ConstValue::Int(3)],
        }
    );
    assert_eq!(tree.then_target, BlockId(1));
    let Arm::Nested(next) = &tree.otherwise else {
        panic!("expected a nested test");
    };
    assert_eq!(next.then_target, BlockId(2));
    assert_eq!(next.otherwise, Arm::Target(BlockId(3)));
    assert_eq!(tree.targets(), vec![BlockId(1), BlockId(2), BlockId(3)]);
    assert_eq!(recon.descriptor(BlockId(3)).map(|d| d.kind), Some(BlockKind::Join));
}

#[test]
fn test_branch_to_same_block_has_empty_else() {
    let (mut b, bb) = blocks(vec![Ty::Bool], 2);
    let cond = b.param(0);
    b.branch(bb[0], cond, bb[1], bb[1]);
    b.ret(bb[1], vec![]);
    let cfg = Cfg::new(&b.finish());
    let recon = reconstruct(&cfg);
    recon.validate(&cfg).unwrap();

    let exit = recon.descriptor(BlockId(0)).map(|d| d.exit.clone());
    let Some(BlockExit::Branch(tree)) = exit else {
        panic!("expected a branch exit");
    };
    assert_eq!(tree.otherwise, Arm::Empty(BlockId(1)));
    assert_eq!(recon.transitions(), vec![(BlockId(0), BlockId(1))]);
}

#[test]
fn test_unreachable_blocks_are_omitted() {
    let (mut b, bb) = blocks(vec![], 3);
    b.jump(bb[0], bb[2]);
    b.jump(bb[1], bb[2]);
    b.ret(bb[2], vec![]);
    let cfg = Cfg::new(&b.finish());
    let recon = reconstruct(&cfg);
    recon.validate(&cfg).unwrap();

    assert_eq!(recon.order(), vec![BlockId(0), BlockId(2)]);
    assert_eq!(recon.unreachable(), &[BlockId(1)]);
    // The dead predecessor does not make bb2 a join.
    assert_eq!(recon.descriptor(BlockId(2)).map(|d| d.kind), Some(BlockKind::Plain));
}

#[test]
fn test_reconstruction_is_idempotent() {
    for func in [diamond(), while_loop(), switch()] {
        let cfg = Cfg::new(&func);
        let first = reconstruct(&cfg);
        let second = reconstruct(&first);
        assert_eq!(first, second, "{}", func.name);
        second.validate(&first).unwrap();
    }
}

#[test]
fn test_validate_reports_dropped_edge() {
    let cfg = Cfg::new(&diamond());
    let recon = reconstruct(&cfg);
    let other = Cfg::new(&while_loop());
    let err = recon.validate(&other).unwrap_err();
    assert!(err.is_internal());
}

#[test]
fn test_else_stack_drains_on_every_shape() {
    for func in [diamond(), while_loop(), switch()] {
        let recon = reconstruct(&Cfg::new(&func));
        assert_eq!(recon.else_left, 0, "{}", func.name);
    }
}

#[test]
fn test_validate_reports_undrained_else_stack() {
    let cfg = Cfg::new(&diamond());
    let mut recon = reconstruct(&cfg);
    recon.validate(&cfg).unwrap();

    recon.else_left = 1;
    let err = recon.validate(&cfg).unwrap_err();
    assert!(err.is_internal());
    assert!(err.to_string().contains("else-stack not drained"));
}
