use std::rc::Rc;

use crate::backend::resume::{DispatchFn, compile_function};
use crate::context::{CompileOptions, ProgramContext};
use crate::runtime::{Env, Frame, Pending, Pointer, Runtime, RuntimeError, Step, Value};
use crate::ssa::model::builder::FunctionBuilder;
use crate::ssa::model::ir::{
    BinOp, BlockId, Builtin, Callee, CmpOp, ConstValue, FuncId, Function, FunctionSig, Program,
    Ty,
};

const LIMIT: u64 = 100;

fn sig(params: Vec<Ty>, results: Vec<Ty>) -> FunctionSig {
    FunctionSig { params, results }
}

fn compile_all(functions: Vec<Function>) -> Vec<DispatchFn> {
    let program = Program {
        functions,
        init: None,
        main: FuncId(0),
        positions: Vec::new(),
        constants: Vec::new(),
    };
    let options = CompileOptions::default();
    let mut ctx = ProgramContext::new(&program, &options);
    program
        .functions
        .iter()
        .map(|func| compile_function(func, &mut ctx).unwrap())
        .collect()
}

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

fn print(b: &mut FunctionBuilder, block: BlockId, text: &str) {
    let value = b.const_value(block, ConstValue::Str(text.into()), Ty::Str);
    b.call(block, Callee::Builtin(Builtin::Print), vec![value], None);
}

fn binary(id: FuncId, op: BinOp, ty: Ty) -> Function {
    let mut b = FunctionBuilder::new(id, "binary", sig(vec![ty, ty], vec![ty]));
    let (lhs, rhs) = (b.param(0), b.param(1));
    let bb = b.add_block();
    let result = b.binop(bb, op, lhs, rhs, ty);
    b.ret(bb, vec![result]);
    b.finish()
}

#[test]
fn test_non_suspending_routine_completes_in_one_step() {
    let mut env = Env::new(compile_all(vec![sign()]));
    let func = env.function(FuncId(0)).unwrap();

    let mut frame = Frame::new(Rc::clone(&func), vec![Value::Int(5)]).unwrap();
    assert_eq!(frame.step(&mut env).unwrap(), Step::Complete(Value::Int(1)));

    let mut frame = Frame::new(func, vec![Value::Int(-5)]).unwrap();
    assert_eq!(frame.step(&mut env).unwrap(), Step::Complete(Value::Int(-1)));
}

#[test]
fn test_frame_rejects_wrong_argument_count() {
    let env = Env::new(compile_all(vec![sign()]));
    let err = Frame::new(env.function(FuncId(0)).unwrap(), vec![]).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::Internal("sign expects 1 argument(s), got 0".to_string())
    );
}

#[test]
fn test_yield_resumes_with_registers_intact() {
    let mut b = FunctionBuilder::new(FuncId(0), "inc", sig(vec![Ty::I64], vec![Ty::I64]));
    let a = b.param(0);
    let bb = b.add_block();
    let one = b.const_int(bb, 1, Ty::I64);
    let sum = b.binop(bb, BinOp::Add, a, one, Ty::I64);
    b.yield_now(bb);
    b.ret(bb, vec![sum]);

    let mut env = Env::new(compile_all(vec![b.finish()]));
    let mut frame = Frame::new(env.function(FuncId(0)).unwrap(), vec![Value::Int(41)]).unwrap();

    assert_eq!(
        frame.step(&mut env).unwrap(),
        Step::Incomplete(Pending::Yield)
    );
    assert_eq!(frame.resume_at(), 1);
    let saved = frame.regs().to_vec();
    assert!(saved.contains(&Value::Int(42)));

    assert_eq!(frame.step(&mut env).unwrap(), Step::Complete(Value::Int(42)));
    assert_eq!(frame.regs(), saved.as_slice());
}

#[test]
fn test_receive_on_empty_channel_waits_without_progress() {
    let mut b = FunctionBuilder::new(FuncId(0), "take", sig(vec![Ty::Chan], vec![Ty::I64]));
    let chan = b.param(0);
    let bb = b.add_block();
    let value = b.recv(bb, chan, Ty::I64);
    b.ret(bb, vec![value]);

    let mut env = Env::new(compile_all(vec![b.finish()]));
    let id = env.make_chan(0);
    let mut frame = Frame::new(env.function(FuncId(0)).unwrap(), vec![Value::Chan(id)]).unwrap();

    let before = frame.regs().to_vec();
    for _ in 0..3 {
        assert_eq!(frame.step(&mut env).unwrap(), Step::Incomplete(Pending::Wait));
        assert_eq!(frame.resume_at(), 0);
        assert_eq!(frame.regs(), before.as_slice());
    }

    assert!(env.try_send(id, Value::Int(9)).unwrap());
    assert_eq!(frame.step(&mut env).unwrap(), Step::Complete(Value::Int(9)));
}

#[test]
fn test_unbuffered_channel_holds_one_value() {
    let mut env = Env::default();
    let id = env.make_chan(0);

    assert!(env.try_send(id, Value::Int(1)).unwrap());
    assert!(!env.try_send(id, Value::Int(2)).unwrap());
    assert_eq!(env.channel(id).unwrap().len(), 1);
    assert_eq!(env.try_recv(id).unwrap(), Some(Value::Int(1)));
    assert_eq!(env.try_recv(id).unwrap(), None);

    let buffered = env.make_chan(2);
    assert!(env.try_send(buffered, Value::Int(1)).unwrap());
    assert!(env.try_send(buffered, Value::Int(2)).unwrap());
    assert!(!env.try_send(buffered, Value::Int(3)).unwrap());
}

#[test]
fn test_heap_cells_and_bad_pointers() {
    let mut env = Env::default();
    let ptr = env.alloc(2);
    assert_eq!(env.load(ptr).unwrap(), Value::Unit);
    env.store(ptr, Value::Int(3)).unwrap();
    assert_eq!(env.load(ptr).unwrap(), Value::Int(3));
    assert_eq!(env.remaining(ptr).unwrap(), 2);

    let past_end = Pointer { obj: ptr.obj, off: 2 };
    assert_eq!(env.load(past_end), Err(RuntimeError::BadPointer));
    assert_eq!(Value::Nil.as_ptr(), Err(RuntimeError::BadPointer));
}

#[test]
fn test_producer_and_consumer_both_complete() {
    // producer(ch): ch <- 1; ch <- 2; ch <- 3
    let mut p = FunctionBuilder::new(FuncId(1), "producer", sig(vec![Ty::Chan], vec![]));
    let chan = p.param(0);
    let pb = p.add_block();
    for n in 1..=3 {
        let value = p.const_int(pb, n, Ty::I64);
        p.send(pb, chan, value);
    }
    p.ret(pb, vec![]);

    // main: ch := make(chan int); go producer(ch); print(<-ch + <-ch + <-ch)
    let mut m = FunctionBuilder::new(FuncId(0), "main", sig(vec![], vec![]));
    let mb = m.add_block();
    let chan = m.make_chan(mb, 0);
    m.go(mb, Callee::Direct(FuncId(1)), vec![chan]);
    let a = m.recv(mb, chan, Ty::I64);
    let b = m.recv(mb, chan, Ty::I64);
    let c = m.recv(mb, chan, Ty::I64);
    let ab = m.binop(mb, BinOp::Add, a, b, Ty::I64);
    let total = m.binop(mb, BinOp::Add, ab, c, Ty::I64);
    m.call(mb, Callee::Builtin(Builtin::Print), vec![total], None);
    m.ret(mb, vec![]);

    let mut runtime = Runtime::new(compile_all(vec![m.finish(), p.finish()]));
    runtime.boot(None, FuncId(0), LIMIT).unwrap();

    assert_eq!(runtime.output(), ["6".to_string()]);
    assert_eq!(runtime.scheduler.live(), 0);
    assert_eq!(runtime.scheduler.ticks(), 5);
    assert!(runtime.done_init());
}

#[test]
fn test_initializer_runs_before_main() {
    let mut init = FunctionBuilder::new(FuncId(1), "init", sig(vec![], vec![]));
    let ib = init.add_block();
    print(&mut init, ib, "init");
    init.yield_now(ib);
    print(&mut init, ib, "init done");
    init.ret(ib, vec![]);

    let mut main = FunctionBuilder::new(FuncId(0), "main", sig(vec![], vec![]));
    let mb = main.add_block();
    print(&mut main, mb, "main");
    main.ret(mb, vec![]);

    let mut runtime = Runtime::new(compile_all(vec![main.finish(), init.finish()]));
    assert!(!runtime.done_init());
    runtime.boot(Some(FuncId(1)), FuncId(0), LIMIT).unwrap();

    assert!(runtime.done_init());
    assert_eq!(runtime.output(), ["init", "init done", "main"]);
    assert!(runtime.scheduler.is_complete(0));
    assert_eq!(runtime.scheduler.retained(), 0);
}

#[test]
fn test_initializer_must_be_goroutine_zero() {
    let mut b = FunctionBuilder::new(FuncId(0), "noop", sig(vec![], vec![]));
    let bb = b.add_block();
    b.ret(bb, vec![]);
    let mut runtime = Runtime::new(compile_all(vec![b.finish()]));
    runtime.call(FuncId(0), vec![], LIMIT).unwrap();

    let err = runtime.boot(Some(FuncId(0)), FuncId(0), LIMIT).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::Internal("non-zero goroutine number in init".to_string())
    );
}

#[test]
fn test_forever_blocked_program_hits_tick_limit() {
    let mut b = FunctionBuilder::new(FuncId(0), "main", sig(vec![], vec![]));
    let bb = b.add_block();
    let chan = b.make_chan(bb, 0);
    b.recv(bb, chan, Ty::I64);
    b.ret(bb, vec![]);

    let mut runtime = Runtime::new(compile_all(vec![b.finish()]));
    let err = runtime.boot(None, FuncId(0), 10).unwrap_err();

    assert_eq!(err, RuntimeError::TickLimit(10));
    assert_eq!(runtime.scheduler.ticks(), 10);
    assert_eq!(runtime.scheduler.live(), 1);
}

#[test]
fn test_nested_suspending_call_delivers_result() {
    let mut g = FunctionBuilder::new(FuncId(1), "g", sig(vec![], vec![Ty::I64]));
    let gb = g.add_block();
    g.yield_now(gb);
    let seven = g.const_int(gb, 7, Ty::I64);
    g.ret(gb, vec![seven]);

    let mut f = FunctionBuilder::new(FuncId(0), "f", sig(vec![], vec![Ty::I64]));
    let fb = f.add_block();
    let value = f
        .call(fb, Callee::Direct(FuncId(1)), vec![], Some(Ty::I64))
        .unwrap();
    let one = f.const_int(fb, 1, Ty::I64);
    let sum = f.binop(fb, BinOp::Add, value, one, Ty::I64);
    f.ret(fb, vec![sum]);

    let mut runtime = Runtime::new(compile_all(vec![f.finish(), g.finish()]));
    let result = runtime.call(FuncId(0), vec![], LIMIT).unwrap();

    assert_eq!(result, Value::Int(8));
    assert_eq!(runtime.scheduler.ticks(), 2);
}

#[test]
fn test_loop_with_phis_counts_up() {
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

    let mut runtime = Runtime::new(compile_all(vec![b.finish()]));
    assert_eq!(
        runtime.call(FuncId(0), vec![Value::Int(4)], LIMIT).unwrap(),
        Value::Int(4)
    );
    assert_eq!(
        runtime.call(FuncId(0), vec![Value::Int(-3)], LIMIT).unwrap(),
        Value::Int(0)
    );
}

#[test]
fn test_integer_arithmetic_wraps_to_type_width() {
    let mut runtime = Runtime::new(compile_all(vec![
        binary(FuncId(0), BinOp::Add, Ty::I32),
        binary(FuncId(1), BinOp::Sub, Ty::U64),
        binary(FuncId(2), BinOp::Div, Ty::I64),
    ]));

    let add = runtime
        .call(FuncId(0), vec![Value::Int(i32::MAX as i64), Value::Int(1)], LIMIT)
        .unwrap();
    assert_eq!(add, Value::Int(i32::MIN as i64));

    let sub = runtime
        .call(FuncId(1), vec![Value::Int(0), Value::Int(1)], LIMIT)
        .unwrap();
    assert_eq!(sub, Value::Int(-1));

    let err = runtime
        .call(FuncId(2), vec![Value::Int(1), Value::Int(0)], LIMIT)
        .unwrap_err();
    assert_eq!(err, RuntimeError::DivideByZero);
}

#[test]
fn test_division_fault_comes_before_later_print() {
    let mut b = FunctionBuilder::new(FuncId(0), "f", sig(vec![Ty::I64, Ty::I64], vec![Ty::I64]));
    let (x, y) = (b.param(0), b.param(1));
    let bb = b.add_block();
    let quotient = b.binop(bb, BinOp::Div, x, y, Ty::I64);
    print(&mut b, bb, "after division");
    b.ret(bb, vec![quotient]);

    let routines = compile_all(vec![b.finish()]);

    let mut runtime = Runtime::new(routines.clone());
    let err = runtime
        .call(FuncId(0), vec![Value::Int(1), Value::Int(0)], LIMIT)
        .unwrap_err();
    assert_eq!(err, RuntimeError::DivideByZero);
    assert!(runtime.output().is_empty());

    let mut runtime = Runtime::new(routines);
    let result = runtime.call(FuncId(0), vec![Value::Int(7), Value::Int(2)], LIMIT);
    assert_eq!(result.unwrap(), Value::Int(3));
    assert_eq!(runtime.output(), ["after division"]);
}

#[test]
fn test_panic_stops_the_program() {
    let mut b = FunctionBuilder::new(FuncId(0), "main", sig(vec![], vec![]));
    let bb = b.add_block();
    let msg = b.const_value(bb, ConstValue::Str("boom".into()), Ty::Str);
    b.call(bb, Callee::Builtin(Builtin::Panic), vec![msg], None);
    b.ret(bb, vec![]);

    let mut runtime = Runtime::new(compile_all(vec![b.finish()]));
    let err = runtime.boot(None, FuncId(0), LIMIT).unwrap_err();
    assert_eq!(err, RuntimeError::Panic("boom".to_string()));
    assert_eq!(err.to_string(), "panic: boom");
}

#[test]
fn test_unsigned_64_bit_compare_uses_all_bits() {
    let less_sig = sig(vec![Ty::U64, Ty::U64], vec![Ty::Bool]);
    let mut b = FunctionBuilder::new(FuncId(0), "less", less_sig);
    let (x, y) = (b.param(0), b.param(1));
    let bb = b.add_block();
    let less = b.cmp(bb, CmpOp::Lt, x, y);
    b.ret(bb, vec![less]);

    let mut runtime = Runtime::new(compile_all(vec![b.finish()]));
    let max = Value::Int(u64::MAX as i64);
    let result = runtime.call(FuncId(0), vec![max.clone(), Value::Int(1)], LIMIT);
    assert_eq!(result.unwrap(), Value::Bool(false));
    let result = runtime.call(FuncId(0), vec![Value::Int(1), max], LIMIT);
    assert_eq!(result.unwrap(), Value::Bool(true));
}

#[test]
fn test_completed_goroutines_are_not_retained() {
    let mut runtime = Runtime::new(compile_all(vec![sign()]));
    for arg in 0..50 {
        let result = runtime.call(FuncId(0), vec![Value::Int(arg - 25)], LIMIT);
        assert!(result.is_ok());
    }
    assert_eq!(runtime.scheduler.live(), 0);
    assert_eq!(runtime.scheduler.retained(), 0);
    assert!(runtime.scheduler.goroutine(0).is_none());
    assert!(runtime.scheduler.is_complete(49));
}

#[test]
fn test_unknown_goroutines_count_as_complete() {
    let runtime = Runtime::new(compile_all(vec![sign()]));
    assert!(runtime.scheduler.is_complete(42));
    assert!(runtime.scheduler.goroutine(42).is_none());
}
