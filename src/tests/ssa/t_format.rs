use indoc::indoc;

use crate::ssa::model::builder::FunctionBuilder;
use crate::ssa::model::format::format_func;
use crate::ssa::model::ir::{BinOp, Builtin, Callee, CmpOp, FuncId, FunctionSig, Ty};

#[test]
fn test_format_counting_loop() {
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
    let head = b.add_block();
    let body = b.add_block();
    let exit = b.add_block();
    let zero = b.const_int(entry, 0, Ty::I64);
    b.jump(entry, head);
    let i = b.phi_placeholder(head, Ty::I64);
    let cond = b.cmp(head, CmpOp::Lt, i, n);
    b.branch(head, cond, body, exit);
    let one = b.const_int(body, 1, Ty::I64);
    let next = b.binop(body, BinOp::Add, i, one, Ty::I64);
    b.jump(body, head);
    b.set_phi(head, i, vec![(entry, zero), (body, next)]);
    b.ret(exit, vec![i]);

    let expected = indoc! {"
        fn count(%v0: i64) -> (i64) {
          bb0:
            %v1: i64 = const 0
            jump bb1
          bb1:
            %v2: i64 = phi [bb0: %v1, bb2: %v5]
            %v3: bool = cmp.Lt %v2, %v0
            if %v3 then bb2 else bb3
          bb2:
            %v4: i64 = const 1
            %v5: i64 = Add %v2, %v4
            jump bb1
          bb3:
            return %v2
        }
    "};
    assert_eq!(format_func(&b.finish()), expected);
}

#[test]
fn test_format_channel_and_calls() {
    let mut b = FunctionBuilder::new(
        FuncId(0),
        "main",
        FunctionSig {
            params: vec![],
            results: vec![Ty::I64],
        },
    );
    let bb = b.add_block();
    let chan = b.make_chan(bb, 0);
    b.go(bb, Callee::Direct(FuncId(1)), vec![chan]);
    let value = b.recv(bb, chan, Ty::I64);
    b.call(bb, Callee::Builtin(Builtin::Print), vec![value], None);
    b.yield_now(bb);
    b.ret(bb, vec![value]);

    let expected = indoc! {"
        fn main() -> (i64) {
          bb0:
            %v0: chan = make_chan 0
            go @f1(%v0)
            %v1: i64 = recv %v0
            call print(%v1)
            yield
            return %v1
        }
    "};
    assert_eq!(format_func(&b.finish()), expected);
}
