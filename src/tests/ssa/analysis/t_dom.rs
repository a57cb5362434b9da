use crate::ssa::analysis::cfg::Cfg;
use crate::ssa::analysis::dataflow::DataflowGraph;
use crate::ssa::analysis::dom::{Dominators, LoopForest, retreating_edges, reverse_postorder};
use crate::ssa::model::builder::FunctionBuilder;
use crate::ssa::model::ir::{BlockId, FuncId, Function, FunctionSig, Ty};

fn bool_fn(blocks: usize) -> (FunctionBuilder, Vec<BlockId>) {
    let mut b = FunctionBuilder::new(
        FuncId(0),
        "f",
        FunctionSig {
            params: vec![Ty::Bool],
            results: vec![],
        },
    );
    let ids = (0..blocks).map(|_| b.add_block()).collect();
    (b, ids)
}

fn diamond() -> Function {
    let (mut b, bb) = bool_fn(4);
    let cond = b.param(0);
    b.branch(bb[0], cond, bb[1], bb[2]);
    b.jump(bb[1], bb[3]);
    b.jump(bb[2], bb[3]);
    b.ret(bb[3], vec![]);
    b.finish()
}

/// bb1 is the outer loop header, bb2 the inner one.
fn nested_loops() -> Function {
    let (mut b, bb) = bool_fn(5);
    let cond = b.param(0);
    b.jump(bb[0], bb[1]);
    b.branch(bb[1], cond, bb[2], bb[4]);
    b.branch(bb[2], cond, bb[3], bb[1]);
    b.jump(bb[3], bb[2]);
    b.ret(bb[4], vec![]);
    b.finish()
}

#[test]
fn test_dominators_diamond() {
    let cfg = Cfg::new(&diamond());
    let doms = Dominators::compute(&cfg, cfg.entry());

    assert_eq!(doms.idom(0), Some(0));
    assert_eq!(doms.idom(1), Some(0));
    assert_eq!(doms.idom(3), Some(0));
    assert!(doms.dominates(0, 3));
    assert!(!doms.dominates(1, 3));
    assert!(doms.dominates(3, 3));
}

#[test]
fn test_dominators_skip_unreachable() {
    let (mut b, bb) = bool_fn(3);
    b.jump(bb[0], bb[1]);
    b.ret(bb[1], vec![]);
    b.jump(bb[2], bb[1]);
    let cfg = Cfg::new(&b.finish());
    let doms = Dominators::compute(&cfg, cfg.entry());

    assert!(!doms.is_reachable(2));
    assert!(!doms.dominates(2, 1));
    assert_eq!(doms.idom(1), Some(0));
}

#[test]
fn test_reverse_postorder_indices() {
    let cfg = Cfg::new(&diamond());
    let order = reverse_postorder(&cfg, cfg.entry());
    assert_eq!(order, vec![0, 2, 1, 3]);
    assert_eq!(cfg.index(BlockId(3)), 3);
}

#[test]
fn test_nested_loop_forest() {
    let cfg = Cfg::new(&nested_loops());
    let back = retreating_edges(&cfg, cfg.entry());
    assert_eq!(back.len(), 2);
    assert!(back.contains(&(3, 2)));
    assert!(back.contains(&(2, 1)));

    let loops = LoopForest::compute(&cfg, cfg.entry());
    assert!(loops.is_header(1));
    assert!(loops.is_header(2));
    assert!(!loops.is_header(0));
    assert_eq!(
        (0..5).map(|idx| loops.depth(idx)).collect::<Vec<_>>(),
        vec![0, 1, 2, 2, 0]
    );
    assert!(loops.is_back_edge(3, 2));
    assert!(!loops.is_back_edge(1, 2));

    let bodies: Vec<(usize, Vec<usize>)> = loops
        .loops()
        .map(|(header, body)| {
            let members = body
                .iter()
                .enumerate()
                .filter_map(|(idx, inside)| inside.then_some(idx))
                .collect();
            (header, members)
        })
        .collect();
    assert_eq!(bodies, vec![(1, vec![1, 2, 3]), (2, vec![2, 3])]);
}
