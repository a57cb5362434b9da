//! One activation of a dispatch routine.
//!
//! A frame owns the routine's register slots and the index of the next
//! pseudo-block to run. `step` runs pseudo-blocks until the routine returns
//! or reaches a point where control has to go back to the scheduler; the
//! frame then holds everything needed to continue from exactly that point.

use std::rc::Rc;

use tracing::trace;

use crate::backend::marshal::int64;
use crate::backend::regalloc::Reg;
use crate::backend::resume::{
    BranchTerm, CallTarget, DispatchFn, Edge, ElseArm, Expr, PseudoTerm, Stmt, SuspendOp, Test,
    WaitOp,
};
use crate::ssa::model::ir::{BinOp, CmpOp, FuncId, Ty, UnOp};

use super::error::RuntimeError;
use super::heap::Env;
use super::value::Value;

/// Why a frame handed control back.
#[derive(Debug, Clone, PartialEq)]
pub enum Pending {
    /// Run `func` on the same goroutine; its result resumes this frame.
    Call { func: FuncId, args: Vec<Value> },
    /// A channel operation was not ready; re-entry retries it.
    Wait,
    Yield,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Complete(Value),
    Incomplete(Pending),
}

#[derive(Debug, Clone)]
pub struct Frame {
    func: Rc<DispatchFn>,
    next: u32,
    regs: Vec<Value>,
    /// Register that receives the result of the call this frame waits on.
    pending: Option<Reg>,
}

impl Frame {
    pub fn new(func: Rc<DispatchFn>, args: Vec<Value>) -> Result<Self, RuntimeError> {
        if args.len() != func.params.len() {
            return Err(RuntimeError::internal(format!(
                "{} expects {} argument(s), got {}",
                func.name,
                func.params.len(),
                args.len()
            )));
        }
        let mut regs = vec![Value::Unit; func.reg_count as usize];
        for (reg, arg) in func.params.iter().zip(args) {
            *slot(&mut regs, *reg)? = arg;
        }
        Ok(Self {
            func,
            next: 0,
            regs,
            pending: None,
        })
    }

    pub fn func(&self) -> FuncId {
        self.func.id
    }

    /// Pseudo-block the next `step` starts at.
    pub fn resume_at(&self) -> u32 {
        self.next
    }

    pub fn regs(&self) -> &[Value] {
        &self.regs
    }

    /// Hands a finished callee's result to the frame that called it.
    pub fn deliver(&mut self, value: Value) -> Result<(), RuntimeError> {
        if let Some(reg) = self.pending.take() {
            *slot(&mut self.regs, reg)? = value;
        }
        Ok(())
    }

    pub fn step(&mut self, env: &mut Env) -> Result<Step, RuntimeError> {
        let func = Rc::clone(&self.func);
        loop {
            let block = func.block(self.next).ok_or_else(|| {
                RuntimeError::internal(format!("{}: no pseudo-block {}", func.name, self.next))
            })?;
            trace!(func = %func.name, block = self.next, "enter pseudo-block");
            for stmt in &block.stmts {
                self.exec(stmt, env)?;
            }

            match &block.term {
                PseudoTerm::Fallthrough => self.next += 1,
                PseudoTerm::Jump(edge) => self.take(edge)?,
                PseudoTerm::Branch(branch) => {
                    let edge = self.choose(branch, env)?;
                    self.take(edge)?;
                }
                PseudoTerm::Suspend { op, resume } => {
                    let pending = match op {
                        SuspendOp::Call { callee, args } => {
                            let target = self.callee(callee, env)?;
                            let args = self.eval_all(args, env)?;
                            self.pending = func.block(*resume).and_then(|b| b.bind_result);
                            Pending::Call { func: target, args }
                        }
                        SuspendOp::Yield => Pending::Yield,
                    };
                    self.next = *resume;
                    return Ok(Step::Incomplete(pending));
                }
                PseudoTerm::Wait { op, resume } => {
                    let done = match op {
                        WaitOp::Send { chan, value } => {
                            let chan = self.eval(chan, env)?.as_chan()?;
                            let value = self.eval(value, env)?;
                            env.try_send(chan, value)?
                        }
                        WaitOp::Recv { chan, dst } => {
                            let chan = self.eval(chan, env)?.as_chan()?;
                            match env.try_recv(chan)? {
                                Some(value) => {
                                    if let Some(dst) = dst {
                                        *slot(&mut self.regs, *dst)? = value;
                                    }
                                    true
                                }
                                None => false,
                            }
                        }
                    };
                    if !done {
                        return Ok(Step::Incomplete(Pending::Wait));
                    }
                    self.next = *resume;
                }
                PseudoTerm::Return(values) => {
                    let mut values = self.eval_all(values, env)?;
                    let result = match values.len() {
                        0 => Value::Unit,
                        1 => values.remove(0),
                        _ => Value::Tuple(values),
                    };
                    return Ok(Step::Complete(result));
                }
                PseudoTerm::Panic(value) => {
                    let value = self.eval(value, env)?;
                    return Err(RuntimeError::Panic(value.to_string()));
                }
                PseudoTerm::Unreachable => {
                    return Err(RuntimeError::internal(format!(
                        "{}: reached unreachable pseudo-block {}",
                        func.name, self.next
                    )));
                }
            }
        }
    }

    fn take(&mut self, edge: &Edge) -> Result<(), RuntimeError> {
        for mov in &edge.moves {
            let value = slot(&mut self.regs, mov.src)?.clone();
            *slot(&mut self.regs, mov.dst)? = value;
        }
        self.next = edge.target;
        Ok(())
    }

    fn choose<'b>(&self, branch: &'b BranchTerm, env: &mut Env) -> Result<&'b Edge, RuntimeError> {
        let mut branch = branch;
        loop {
            let taken = match &branch.test {
                Test::Cond(cond) => self.eval(cond, env)?.as_bool()?,
                Test::Case { value, ty, consts } => {
                    let value = self.eval(value, env)?;
                    consts.iter().any(|c| Value::from_const(c, *ty) == value)
                }
            };
            if taken {
                return Ok(&branch.then_edge);
            }
            match &branch.otherwise {
                ElseArm::Edge(edge) => return Ok(edge),
                ElseArm::Nested(next) => branch = next.as_ref(),
            }
        }
    }

    fn exec(&mut self, stmt: &Stmt, env: &mut Env) -> Result<(), RuntimeError> {
        match stmt {
            Stmt::Assign { dst, expr } => {
                let value = self.eval(expr, env)?;
                *slot(&mut self.regs, *dst)? = value;
            }
            Stmt::Store { ptr, value } => {
                let ptr = self.eval(ptr, env)?.as_ptr()?;
                let value = self.eval(value, env)?;
                env.store(ptr, value)?;
            }
            Stmt::Eval(expr) => {
                self.eval(expr, env)?;
            }
            Stmt::Spawn { callee, args } => {
                let func = self.callee(callee, env)?;
                let args = self.eval_all(args, env)?;
                env.spawn(func, args);
            }
            Stmt::Print(args) => {
                let args = self.eval_all(args, env)?;
                let line: Vec<String> = args.iter().map(Value::to_string).collect();
                env.print(line.join(" "));
            }
        }
        Ok(())
    }

    fn callee(&self, callee: &CallTarget, env: &mut Env) -> Result<FuncId, RuntimeError> {
        match callee {
            CallTarget::Direct(id) => Ok(*id),
            CallTarget::Value(value) => self.eval(value, env)?.as_func(),
        }
    }

    fn eval_all(&self, exprs: &[Expr], env: &mut Env) -> Result<Vec<Value>, RuntimeError> {
        exprs.iter().map(|expr| self.eval(expr, env)).collect()
    }

    fn eval(&self, expr: &Expr, env: &mut Env) -> Result<Value, RuntimeError> {
        let value = match expr {
            Expr::Reg(reg) => self
                .regs
                .get(reg.index())
                .cloned()
                .ok_or_else(|| RuntimeError::internal(format!("read of missing slot {}", reg)))?,
            Expr::Const(value, ty) => Value::from_const(value, *ty),
            Expr::Bin { op, ty, lhs, rhs } => {
                let lhs = self.eval(lhs, env)?;
                let rhs = self.eval(rhs, env)?;
                binary(*op, *ty, lhs, rhs)?
            }
            Expr::Un { op, ty, value } => unary(*op, *ty, self.eval(value, env)?)?,
            Expr::Cmp { op, ty, lhs, rhs } => {
                let lhs = self.eval(lhs, env)?;
                let rhs = self.eval(rhs, env)?;
                Value::Bool(compare(*op, *ty, &lhs, &rhs)?)
            }
            Expr::Load(ptr) => {
                let ptr = self.eval(ptr, env)?.as_ptr()?;
                env.load(ptr)?
            }
            Expr::LoadAt { base, index } => {
                let ptr = self.address(base, index, env)?;
                env.load(ptr.as_ptr()?)?
            }
            Expr::IndexAddr { base, index } => self.address(base, index, env)?,
            Expr::Alloc(count) => Value::Ptr(env.alloc(*count)),
            Expr::Call { callee, args } => {
                let func = self.callee(callee, env)?;
                let args = self.eval_all(args, env)?;
                call_sync(func, args, env)?
            }
            Expr::MakeChan(cap) => Value::Chan(env.make_chan(*cap)),
            Expr::Extract { tuple, index } => match self.eval(tuple, env)? {
                Value::Tuple(mut items) if (*index as usize) < items.len() => {
                    items.swap_remove(*index as usize)
                }
                other => {
                    return Err(RuntimeError::TypeMismatch {
                        expected: "tuple",
                        found: other.kind().to_string(),
                    });
                }
            },
            Expr::Len(value) => match self.eval(value, env)? {
                Value::Str(s) => Value::Int(s.len() as i64),
                Value::Ptr(ptr) => Value::Int(env.remaining(ptr)? as i64),
                Value::Chan(id) => Value::Int(env.channel(id)?.len() as i64),
                Value::Nil => Value::Int(0),
                other => {
                    return Err(RuntimeError::TypeMismatch {
                        expected: "string, pointer or chan",
                        found: other.kind().to_string(),
                    });
                }
            },
        };
        Ok(value)
    }

    fn address(&self, base: &Expr, index: &Expr, env: &mut Env) -> Result<Value, RuntimeError> {
        let mut ptr = self.eval(base, env)?.as_ptr()?;
        let index = self.eval(index, env)?.as_int()?;
        let index = usize::try_from(index).map_err(|_| RuntimeError::BadPointer)?;
        ptr.off += index;
        Ok(Value::Ptr(ptr))
    }
}

/// Runs a routine that must not suspend to completion.
fn call_sync(func: FuncId, args: Vec<Value>, env: &mut Env) -> Result<Value, RuntimeError> {
    let mut frame = Frame::new(env.function(func)?, args)?;
    match frame.step(env)? {
        Step::Complete(value) => Ok(value),
        Step::Incomplete(pending) => Err(RuntimeError::internal(format!(
            "f{} suspended ({:?}) inside a non-suspending call",
            func.0, pending
        ))),
    }
}

fn slot(regs: &mut [Value], reg: Reg) -> Result<&mut Value, RuntimeError> {
    regs.get_mut(reg.index())
        .ok_or_else(|| RuntimeError::internal(format!("write to missing slot {}", reg)))
}

fn wrap(value: i128, ty: Ty) -> Value {
    match ty {
        Ty::Int { signed, bits } => Value::Int(int64::truncate(value, signed, bits) as i64),
        _ => Value::Int(value as i64),
    }
}

fn binary(op: BinOp, ty: Ty, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => {
            let unsigned = matches!(ty, Ty::Int { signed: false, .. });
            let bits = match ty {
                Ty::Int { bits, .. } => u32::from(bits),
                _ => 64,
            };
            // Unsigned values are held wrapped; widen them back before dividing.
            let widen = |v: i64| -> i128 {
                if unsigned {
                    int64::truncate(i128::from(v), false, bits as u8)
                } else {
                    i128::from(v)
                }
            };
            let (a, b) = (widen(a), widen(b));
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a.wrapping_mul(b),
                BinOp::Div | BinOp::Rem if b == 0 => return Err(RuntimeError::DivideByZero),
                BinOp::Div => a / b,
                BinOp::Rem => a % b,
                BinOp::And => a & b,
                BinOp::Or => a | b,
                BinOp::Xor => a ^ b,
                BinOp::Shl if b < 0 || b >= i128::from(bits) => 0,
                BinOp::Shl => a << b,
                BinOp::Shr if b < 0 || b >= i128::from(bits) => {
                    if a < 0 {
                        -1
                    } else {
                        0
                    }
                }
                BinOp::Shr => a >> b,
            };
            Ok(wrap(result, ty))
        }
        (Value::Float(a), Value::Float(b)) => {
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Rem => a % b,
                _ => {
                    return Err(RuntimeError::TypeMismatch {
                        expected: "integer operands",
                        found: "float".to_string(),
                    });
                }
            };
            let result = match ty {
                Ty::Float { bits: 32 } => result as f32 as f64,
                _ => result,
            };
            Ok(Value::Float(result))
        }
        (Value::Str(a), Value::Str(b)) if op == BinOp::Add => Ok(Value::Str(a + &b)),
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinOp::And => Ok(Value::Bool(a && b)),
            BinOp::Or => Ok(Value::Bool(a || b)),
            BinOp::Xor => Ok(Value::Bool(a ^ b)),
            _ => Err(RuntimeError::TypeMismatch {
                expected: "logical operator",
                found: format!("{:?}", op),
            }),
        },
        (lhs, rhs) => Err(RuntimeError::TypeMismatch {
            expected: "matching operands",
            found: format!("{} {:?} {}", lhs.kind(), op, rhs.kind()),
        }),
    }
}

fn unary(op: UnOp, ty: Ty, value: Value) -> Result<Value, RuntimeError> {
    match (op, value) {
        (UnOp::Neg, Value::Int(v)) => Ok(wrap(-i128::from(v), ty)),
        (UnOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnOp::BitNot, Value::Int(v)) => Ok(wrap(i128::from(!v), ty)),
        (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, value) => Err(RuntimeError::TypeMismatch {
            expected: "operand of matching kind",
            found: format!("{:?} {}", op, value.kind()),
        }),
    }
}

fn compare(op: CmpOp, ty: Ty, lhs: &Value, rhs: &Value) -> Result<bool, RuntimeError> {
    let ordering = match (lhs, rhs) {
        // Narrower unsigned values are stored in range, so only u64 needs this.
        (Value::Int(a), Value::Int(b)) if ty == Ty::U64 => (*a as u64).partial_cmp(&(*b as u64)),
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        _ => match op {
            CmpOp::Eq => return Ok(lhs == rhs),
            CmpOp::Ne => return Ok(lhs != rhs),
            _ => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "ordered operands",
                    found: format!("{} and {}", lhs.kind(), rhs.kind()),
                });
            }
        },
    };
    // NaN compares unequal to everything.
    let Some(ordering) = ordering else {
        return Ok(op == CmpOp::Ne);
    };
    Ok(match op {
        CmpOp::Eq => ordering.is_eq(),
        CmpOp::Ne => ordering.is_ne(),
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::Le => ordering.is_le(),
        CmpOp::Gt => ordering.is_gt(),
        CmpOp::Ge => ordering.is_ge(),
    })
}
