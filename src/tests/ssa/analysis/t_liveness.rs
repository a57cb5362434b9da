use std::collections::HashSet;

use crate::ssa::analysis::liveness;
use crate::ssa::model::builder::FunctionBuilder;
use crate::ssa::model::ir::{BinOp, CmpOp, FuncId, FunctionSig, Ty, ValueId};

fn set(values: &[ValueId]) -> HashSet<ValueId> {
    values.iter().copied().collect()
}

#[test]
fn test_liveness_counting_loop() {
    let mut b = FunctionBuilder::new(
        FuncId(0),
        "count",
        FunctionSig {
            params: vec![Ty::I64],
            results: vec![Ty::I64],
        },
    );
    let n = b.param(0);
    let entry = b.add_block();
    let header = b.add_block();
    let body = b.add_block();
    let exit = b.add_block();

    let zero = b.const_int(entry, 0, Ty::I64);
    b.jump(entry, header);
    let i = b.phi_placeholder(header, Ty::I64);
    let cond = b.cmp(header, CmpOp::Lt, i, n);
    b.branch(header, cond, body, exit);
    let one = b.const_int(body, 1, Ty::I64);
    let next = b.binop(body, BinOp::Add, i, one, Ty::I64);
    b.jump(body, header);
    b.set_phi(header, i, vec![(entry, zero), (body, next)]);
    b.ret(exit, vec![i]);

    let live = liveness::analyze(&b.finish());

    assert_eq!(live[0].live_in, set(&[n]));
    // Phi operands are live out of their predecessor only.
    assert_eq!(live[0].live_out, set(&[n, zero]));
    assert_eq!(live[1].live_in, set(&[n]));
    assert_eq!(live[1].live_out, set(&[n, i]));
    assert_eq!(live[2].live_in, set(&[n, i]));
    assert_eq!(live[2].live_out, set(&[n, next]));
    assert_eq!(live[3].live_in, set(&[i]));
    assert!(live[3].live_out.is_empty());
    assert!(!live[1].live_in.contains(&cond));
}
