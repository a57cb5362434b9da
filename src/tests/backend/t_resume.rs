use indoc::indoc;

use crate::backend::regalloc::{Reg, ValueTracker};
use crate::backend::resume::compiler::{compile_function, validate};
use crate::backend::resume::moves::{Move, resolve_move_list};
use crate::backend::resume::pseudo::{
    CallTarget, DispatchFn, Expr, PseudoTerm, Stmt, SuspendOp, Test, WaitOp,
};
use crate::backend::structure::reconstruct;
use crate::context::{CompileOptions, ProgramContext};
use crate::diag::CompileError;
use crate::ssa::analysis::cfg::Cfg;
use crate::ssa::analysis::suspend::SuspendInfo;
use crate::ssa::model::builder::FunctionBuilder;
use crate::ssa::model::ir::{
    BinOp, BlockId, Builtin, Callee, CmpOp, ConstValue, FuncId, Function, FunctionSig, Program,
    Ty,
};

fn sig(params: Vec<Ty>, results: Vec<Ty>) -> FunctionSig {
    FunctionSig { params, results }
}

fn program(functions: Vec<Function>) -> Program {
    let main = functions.first().map_or(FuncId(0), |f| f.id);
    Program {
        functions,
        init: None,
        main,
        positions: Vec::new(),
        constants: Vec::new(),
    }
}

/// Compiles the first function of `functions` with the others visible to
/// suspension analysis.
fn compile(functions: Vec<Function>) -> (Result<DispatchFn, CompileError>, Vec<String>) {
    let program = program(functions);
    let options = CompileOptions::default();
    let mut ctx = ProgramContext::new(&program, &options);
    let result = compile_function(&program.functions[0], &mut ctx);
    let warnings = ctx.diags.warnings().map(|d| d.message.clone()).collect();
    (result, warnings)
}

fn tracker_for(func: &Function, others: &[Function]) -> ValueTracker {
    let mut functions = vec![func.clone()];
    functions.extend(others.iter().cloned());
    let suspend = SuspendInfo::analyze(&program(functions));
    let cfg = Cfg::new(func);
    ValueTracker::build(func, &reconstruct(&cfg), &suspend)
}

/// `sign(x) { if x > 0 { return 1 }; return -1 }`
fn sign() -> Function {
    let mut b = FunctionBuilder::new(FuncId(0), "sign", sig(vec![Ty::I64], vec![Ty::I64]));
    let x = b.param(0);
    let entry = b.add_block();
    let pos = b.add_block();
    let neg = b.add_block();
    let zero = b.const_int(entry, 0, Ty::I64);
    let cond = b.cmp(entry, CmpOp::Gt, x, zero);
    b.branch(entry, cond, pos, neg);
    let one = b.const_int(pos, 1, Ty::I64);
    b.ret(pos, vec![one]);
    let minus_one = b.const_int(neg, -1, Ty::I64);
    b.ret(neg, vec![minus_one]);
    b.finish()
}

#[test]
fn test_branching_function_needs_three_pseudo_blocks() {
    let (dispatch, warnings) = compile(vec![sign()]);
    let dispatch = dispatch.unwrap();

    assert!(warnings.is_empty());
    assert_eq!(dispatch.blocks.len(), 3);
    assert!(!dispatch.may_suspend);
    assert_eq!(dispatch.params, vec![Reg(0)]);
    assert!(dispatch.blocks.iter().all(|b| !b.term.is_suspension()));

    let expected = indoc! {"
        dispatch sign(r0) regs=1 suspends=false {
          pb0 (bb0):
            if (r0 Gt 0) { goto pb1 } else { goto pb2 }
          pb1 (bb1):
            return 1
          pb2 (bb2):
            return -1
        }
    "};
    assert_eq!(dispatch.to_string(), expected);
}

#[test]
fn test_branch_condition_is_computed_in_place() {
    let (dispatch, _) = compile(vec![sign()]);
    let dispatch = dispatch.unwrap();

    let PseudoTerm::Branch(branch) = &dispatch.blocks[0].term else {
        panic!("expected a branch, got {:?}", dispatch.blocks[0].term);
    };
    assert!(dispatch.blocks[0].stmts.is_empty());
    assert_eq!(
        branch.test,
        Test::Cond(Expr::Cmp {
            op: CmpOp::Gt,
            ty: Ty::I64,
            lhs: Box::new(Expr::Reg(Reg(0))),
            rhs: Box::new(Expr::Const(ConstValue::Int(0), Ty::I64)),
        })
    );
    assert_eq!(branch.then_edge.target, 1);
    assert_eq!(dispatch.blocks[0].term.successors(0), vec![1, 2]);
}

#[test]
fn test_single_yield_splits_straight_line_in_two() {
    let mut b = FunctionBuilder::new(FuncId(0), "inc", sig(vec![Ty::I64], vec![Ty::I64]));
    let a = b.param(0);
    let bb = b.add_block();
    let one = b.const_int(bb, 1, Ty::I64);
    let sum = b.binop(bb, BinOp::Add, a, one, Ty::I64);
    b.yield_now(bb);
    b.ret(bb, vec![sum]);
    let func = b.finish();
    let sum_reg = tracker_for(&func, &[]).reg(sum).unwrap();

    let (dispatch, _) = compile(vec![func]);
    let dispatch = dispatch.unwrap();

    assert!(dispatch.may_suspend);
    assert_eq!(dispatch.blocks.len(), 2);
    assert_eq!(
        dispatch.blocks[0].term,
        PseudoTerm::Suspend {
            op: SuspendOp::Yield,
            resume: 1
        }
    );
    assert_eq!(dispatch.blocks[0].stmts.len(), 1);
    assert_eq!(dispatch.blocks[1].origin, Some(BlockId(0)));
    assert!(dispatch.blocks[1].stmts.is_empty());
    assert_eq!(
        dispatch.blocks[1].term,
        PseudoTerm::Return(vec![Expr::Reg(sum_reg)])
    );
}

#[test]
fn test_suspending_call_binds_result_in_resume_block() {
    let mut g = FunctionBuilder::new(FuncId(1), "g", sig(vec![Ty::I64], vec![Ty::I64]));
    let x = g.param(0);
    let gb = g.add_block();
    g.yield_now(gb);
    g.ret(gb, vec![x]);
    let g = g.finish();

    let mut b = FunctionBuilder::new(FuncId(0), "f", sig(vec![Ty::I64], vec![Ty::I64]));
    let a = b.param(0);
    let bb = b.add_block();
    let result = b
        .call(bb, Callee::Direct(FuncId(1)), vec![a], Some(Ty::I64))
        .unwrap();
    let one = b.const_int(bb, 1, Ty::I64);
    let sum = b.binop(bb, BinOp::Add, result, one, Ty::I64);
    b.ret(bb, vec![sum]);
    let func = b.finish();
    let tracker = tracker_for(&func, std::slice::from_ref(&g));
    let (a_reg, result_reg) = (tracker.reg(a).unwrap(), tracker.reg(result).unwrap());

    let (dispatch, _) = compile(vec![func, g]);
    let dispatch = dispatch.unwrap();

    assert!(dispatch.may_suspend);
    assert_eq!(dispatch.blocks.len(), 2);
    assert_eq!(
        dispatch.blocks[0].term,
        PseudoTerm::Suspend {
            op: SuspendOp::Call {
                callee: CallTarget::Direct(FuncId(1)),
                args: vec![Expr::Reg(a_reg)],
            },
            resume: 1,
        }
    );
    assert_eq!(dispatch.blocks[1].bind_result, Some(result_reg));
    let PseudoTerm::Return(values) = &dispatch.blocks[1].term else {
        panic!("expected a return");
    };
    assert!(values[0].reads(result_reg));
}

#[test]
fn test_non_suspending_call_stays_inline() {
    let mut g = FunctionBuilder::new(FuncId(1), "g", sig(vec![Ty::I64], vec![Ty::I64]));
    let x = g.param(0);
    let gb = g.add_block();
    g.ret(gb, vec![x]);
    let g = g.finish();

    let mut b = FunctionBuilder::new(FuncId(0), "f", sig(vec![Ty::I64], vec![Ty::I64]));
    let a = b.param(0);
    let bb = b.add_block();
    let result = b
        .call(bb, Callee::Direct(FuncId(1)), vec![a], Some(Ty::I64))
        .unwrap();
    b.ret(bb, vec![result]);
    let func = b.finish();

    let (dispatch, _) = compile(vec![func, g]);
    let dispatch = dispatch.unwrap();

    assert!(!dispatch.may_suspend);
    assert_eq!(dispatch.blocks.len(), 1);
    assert!(matches!(
        &dispatch.blocks[0].stmts[..],
        [Stmt::Assign {
            expr: Expr::Call { .. },
            ..
        }]
    ));
}

#[test]
fn test_receive_gets_a_pseudo_block_of_its_own() {
    let mut b = FunctionBuilder::new(FuncId(0), "take", sig(vec![], vec![Ty::I64]));
    let bb = b.add_block();
    let chan = b.make_chan(bb, 1);
    let value = b.recv(bb, chan, Ty::I64);
    b.ret(bb, vec![value]);
    let func = b.finish();
    let tracker = tracker_for(&func, &[]);
    let (chan_reg, value_reg) = (tracker.reg(chan).unwrap(), tracker.reg(value).unwrap());

    let (dispatch, _) = compile(vec![func]);
    let dispatch = dispatch.unwrap();

    assert_eq!(dispatch.blocks.len(), 3);
    assert_eq!(
        dispatch.blocks[0].stmts,
        vec![Stmt::Assign {
            dst: chan_reg,
            expr: Expr::MakeChan(1)
        }]
    );
    assert_eq!(dispatch.blocks[0].term, PseudoTerm::Fallthrough);
    assert!(dispatch.blocks[1].stmts.is_empty());
    assert_eq!(
        dispatch.blocks[1].term,
        PseudoTerm::Wait {
            op: WaitOp::Recv {
                chan: Expr::Reg(chan_reg),
                dst: Some(value_reg),
            },
            resume: 2,
        }
    );
    assert_eq!(
        dispatch.blocks[2].term,
        PseudoTerm::Return(vec![Expr::Reg(value_reg)])
    );
}

#[test]
fn test_send_first_in_block_needs_no_fallthrough() {
    let mut b = FunctionBuilder::new(FuncId(0), "give", sig(vec![Ty::Chan], vec![]));
    let chan = b.param(0);
    let bb = b.add_block();
    let seven = b.const_int(bb, 7, Ty::I64);
    b.send(bb, chan, seven);
    b.ret(bb, vec![]);

    let (dispatch, _) = compile(vec![b.finish()]);
    let dispatch = dispatch.unwrap();

    assert_eq!(dispatch.blocks.len(), 2);
    assert!(matches!(
        dispatch.blocks[0].term,
        PseudoTerm::Wait {
            op: WaitOp::Send { .. },
            resume: 1
        }
    ));
    assert_eq!(dispatch.blocks[1].term, PseudoTerm::Return(vec![]));
}

#[test]
fn test_phis_become_moves_on_incoming_edges() {
    let mut b = FunctionBuilder::new(FuncId(0), "count", sig(vec![Ty::I64], vec![Ty::I64]));
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
    let func = b.finish();
    let tracker = tracker_for(&func, &[]);
    let reg = |value| tracker.reg(value).unwrap();

    let (dispatch, _) = compile(vec![func.clone()]);
    let dispatch = dispatch.unwrap();

    let jump_from = |origin: BlockId| {
        dispatch
            .blocks
            .iter()
            .filter(|pb| pb.origin == Some(origin))
            .find_map(|pb| match &pb.term {
                PseudoTerm::Jump(edge) => Some(edge.clone()),
                _ => None,
            })
            .unwrap()
    };
    let head_entry = dispatch
        .blocks
        .iter()
        .find(|pb| pb.origin == Some(head))
        .map(|pb| pb.index)
        .unwrap();

    let into_loop = jump_from(entry);
    assert_eq!(into_loop.to, head);
    assert_eq!(into_loop.target, head_entry);
    assert_eq!(
        into_loop.moves,
        vec![Move {
            dst: reg(i),
            src: reg(zero)
        }]
    );

    let back = jump_from(body);
    assert_eq!(back.target, head_entry);
    assert_eq!(
        back.moves,
        vec![Move {
            dst: reg(i),
            src: reg(next)
        }]
    );
    assert!(validate(&dispatch).is_ok());
}

#[test]
fn test_equal_pure_expressions_share_a_register() {
    let mut b = FunctionBuilder::new(
        FuncId(0),
        "twice",
        sig(vec![Ty::I64, Ty::I64], vec![Ty::I64]),
    );
    let (x, y) = (b.param(0), b.param(1));
    let bb = b.add_block();
    let first = b.binop(bb, BinOp::Add, x, y, Ty::I64);
    let second = b.binop(bb, BinOp::Add, x, y, Ty::I64);
    let a = b.binop(bb, BinOp::Mul, first, first, Ty::I64);
    let c = b.binop(bb, BinOp::Mul, second, second, Ty::I64);
    let total = b.binop(bb, BinOp::Add, a, c, Ty::I64);
    b.ret(bb, vec![total]);
    let func = b.finish();
    let tracker = tracker_for(&func, &[]);
    let (first_reg, second_reg) = (tracker.reg(first).unwrap(), tracker.reg(second).unwrap());

    let (dispatch, _) = compile(vec![func]);
    let dispatch = dispatch.unwrap();

    let stmts = &dispatch.blocks[0].stmts;
    assert_eq!(stmts.len(), 2);
    assert_eq!(
        stmts[1],
        Stmt::Assign {
            dst: second_reg,
            expr: Expr::Reg(first_reg)
        }
    );
}

#[test]
fn test_foreign_instruction_is_unsupported() {
    let mut b = FunctionBuilder::new(FuncId(0), "asm", sig(vec![], vec![Ty::I64]));
    let bb = b.add_block();
    let value = b.foreign(bb, "cpuid", vec![], Ty::I64);
    b.ret(bb, vec![value]);

    let (result, _) = compile(vec![b.finish()]);
    match result {
        Err(CompileError::Unsupported { pos, message }) => {
            assert_eq!(pos, "(No File Position Hash)");
            assert_eq!(message, "instruction `cpuid` in bb0[0] has no translation");
        }
        other => panic!("expected unsupported construct, got {:?}", other),
    }
}

#[test]
fn test_non_zero_pointer_constant_is_unsupported() {
    let mut b = FunctionBuilder::new(FuncId(0), "ptr", sig(vec![], vec![Ty::Ptr]));
    let bb = b.add_block();
    let value = b.const_int(bb, 16, Ty::Ptr);
    b.ret(bb, vec![value]);

    let (result, _) = compile(vec![b.finish()]);
    assert!(matches!(
        result,
        Err(CompileError::Unsupported { ref message, .. })
            if message == "pointers cannot be initialized to a non-zero value: 16"
    ));
}

#[test]
fn test_wide_constants_warn_and_truncate() {
    let mut b = FunctionBuilder::new(FuncId(0), "wide", sig(vec![], vec![Ty::I32, Ty::I64]));
    let bb = b.add_block();
    let narrow = b.const_int(bb, 1 << 40, Ty::I32);
    let huge = b.const_int(bb, 1 << 70, Ty::I64);
    b.ret(bb, vec![narrow, huge]);

    let (dispatch, warnings) = compile(vec![b.finish()]);
    let dispatch = dispatch.unwrap();

    assert_eq!(
        warnings,
        vec![
            "integer constant value > 32 bits : 1099511627776".to_string(),
            "integer constant value out of 64-bit range: 1180591620717411303424".to_string(),
        ]
    );
    assert_eq!(
        dispatch.blocks[0].term,
        PseudoTerm::Return(vec![
            Expr::Const(ConstValue::Int(0), Ty::I32),
            Expr::Const(ConstValue::Int(0), Ty::I64),
        ])
    );
}

#[test]
fn test_code_after_panic_is_reported_once() {
    let mut b = FunctionBuilder::new(FuncId(0), "boom", sig(vec![], vec![]));
    let bb = b.add_block();
    let msg = b.const_value(bb, ConstValue::Str("boom".into()), Ty::Str);
    b.call(bb, Callee::Builtin(Builtin::Panic), vec![msg], None);
    let later = b.const_value(bb, ConstValue::Str("later".into()), Ty::Str);
    b.call(bb, Callee::Builtin(Builtin::Print), vec![later], None);
    b.call(bb, Callee::Builtin(Builtin::Print), vec![later], None);
    b.ret(bb, vec![]);

    let (dispatch, warnings) = compile(vec![b.finish()]);
    let dispatch = dispatch.unwrap();

    assert_eq!(warnings, vec!["unreachable code after return".to_string()]);
    assert_eq!(dispatch.blocks.len(), 1);
    assert_eq!(
        dispatch.blocks[0].term,
        PseudoTerm::Panic(Expr::Const(ConstValue::Str("boom".into()), Ty::Str))
    );
}

#[test]
fn test_unreachable_blocks_are_warned_and_skipped() {
    let mut b = FunctionBuilder::new(FuncId(0), "dead", sig(vec![], vec![]));
    let entry = b.add_block();
    let dead = b.add_block();
    b.ret(entry, vec![]);
    b.ret(dead, vec![]);

    let (dispatch, warnings) = compile(vec![b.finish()]);
    let dispatch = dispatch.unwrap();

    assert_eq!(warnings, vec!["unreachable block bb1".to_string()]);
    assert_eq!(dispatch.blocks.len(), 1);
}

#[test]
fn test_validate_rejects_dangling_targets() {
    let (dispatch, _) = compile(vec![sign()]);
    let mut dispatch = dispatch.unwrap();
    assert!(validate(&dispatch).is_ok());

    dispatch.blocks[2].term = PseudoTerm::Fallthrough;
    let err = validate(&dispatch).unwrap_err();
    assert!(err.is_internal());
    assert_eq!(
        err.to_string(),
        "internal compiler error: sign: pb2 continues at missing pb3"
    );
}

#[test]
fn test_validate_rejects_statements_before_wait() {
    let mut b = FunctionBuilder::new(FuncId(0), "take", sig(vec![], vec![Ty::I64]));
    let bb = b.add_block();
    let chan = b.make_chan(bb, 1);
    let value = b.recv(bb, chan, Ty::I64);
    b.ret(bb, vec![value]);
    let (dispatch, _) = compile(vec![b.finish()]);
    let mut dispatch = dispatch.unwrap();

    let stmt = dispatch.blocks[0].stmts[0].clone();
    dispatch.blocks[1].stmts.push(stmt);
    let err = validate(&dispatch).unwrap_err();
    assert_eq!(
        err.to_string(),
        "internal compiler error: take: blocking pb1 has statements before its operation"
    );
}

#[test]
fn test_move_cycle_is_broken_with_scratch() {
    let mut moves = vec![
        Move {
            dst: Reg(1),
            src: Reg(2),
        },
        Move {
            dst: Reg(2),
            src: Reg(1),
        },
    ];
    resolve_move_list(&mut moves, || Reg(9));

    assert_eq!(
        moves,
        vec![
            Move {
                dst: Reg(9),
                src: Reg(2)
            },
            Move {
                dst: Reg(2),
                src: Reg(1)
            },
            Move {
                dst: Reg(1),
                src: Reg(9)
            },
        ]
    );
}

#[test]
fn test_move_chain_runs_readers_first() {
    // r1 <- r0, r2 <- r1: r2 has to copy r1 before r1 is overwritten.
    let mut moves = vec![
        Move {
            dst: Reg(1),
            src: Reg(0),
        },
        Move {
            dst: Reg(2),
            src: Reg(1),
        },
    ];
    let mut used_scratch = false;
    resolve_move_list(&mut moves, || {
        used_scratch = true;
        Reg(9)
    });

    assert!(!used_scratch);
    assert_eq!(
        moves,
        vec![
            Move {
                dst: Reg(2),
                src: Reg(1)
            },
            Move {
                dst: Reg(1),
                src: Reg(0)
            },
        ]
    );
}
