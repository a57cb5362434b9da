use crate::ssa::analysis::cfg::Cfg;
use crate::ssa::model::builder::FunctionBuilder;
use crate::ssa::model::ir::{BlockId, FuncId, FunctionSig, Ty};

#[test]
fn test_cfg_loop_edges_and_order() {
    let mut b = FunctionBuilder::new(
        FuncId(0),
        "f",
        FunctionSig {
            params: vec![Ty::Bool],
            results: vec![],
        },
    );
    let cond = b.param(0);
    let bb0 = b.add_block();
    let bb1 = b.add_block();
    let bb2 = b.add_block();
    let bb3 = b.add_block();
    b.jump(bb0, bb1);
    b.branch(bb1, cond, bb2, bb3);
    b.jump(bb2, bb1);
    b.ret(bb3, vec![]);
    let cfg = Cfg::new(&b.finish());

    assert_eq!(cfg.entry(), bb0);
    assert_eq!(cfg.succs(bb1), &[bb2, bb3]);
    assert_eq!(cfg.preds(bb1), &[bb0, bb2]);
    assert_eq!(cfg.preds(bb3), &[bb1]);
    assert_eq!(cfg.postorder(), vec![bb2, bb3, bb1, bb0]);
    assert_eq!(cfg.rpo(), vec![bb0, bb1, bb3, bb2]);
}

#[test]
fn test_cfg_deduplicates_successors() {
    let mut b = FunctionBuilder::new(
        FuncId(0),
        "f",
        FunctionSig {
            params: vec![Ty::Bool],
            results: vec![],
        },
    );
    let cond = b.param(0);
    let bb0 = b.add_block();
    let bb1 = b.add_block();
    let dead = b.add_block();
    b.branch(bb0, cond, bb1, bb1);
    b.ret(bb1, vec![]);
    b.ret(dead, vec![]);
    let cfg = Cfg::new(&b.finish());

    assert_eq!(cfg.succs(bb0), &[bb1]);
    assert_eq!(cfg.preds(bb1), &[bb0]);
    assert!(cfg.contains(dead));
    assert!(!cfg.contains(BlockId(9)));
    // Unreachable blocks are left out of traversal orders.
    assert_eq!(cfg.rpo(), vec![bb0, bb1]);
}
