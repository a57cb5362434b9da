//! Runtime values held in register slots, heap cells and channels.

use std::fmt;

use crate::ssa::model::ir::{ConstValue, FuncId, Ty};

use super::error::RuntimeError;

/// Address of one heap cell: object plus cell offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pointer {
    pub obj: usize,
    pub off: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChanId(pub usize);

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Contents of a slot that was never written.
    #[default]
    Unit,
    Nil,
    Bool(bool),
    /// Every integer width, wrapped to its type's range.
    Int(i64),
    Float(f64),
    Str(String),
    Ptr(Pointer),
    Chan(ChanId),
    Func(FuncId),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn from_const(value: &ConstValue, ty: Ty) -> Value {
        match value {
            ConstValue::Nil => Value::Nil,
            ConstValue::Bool(b) => Value::Bool(*b),
            ConstValue::Int(v) => match ty {
                Ty::Float { .. } => Value::Float(*v as f64),
                _ => Value::Int(*v as i64),
            },
            ConstValue::Float(f) => Value::Float(*f),
            ConstValue::Str(s) => Value::Str(s.clone()),
            ConstValue::Func(id) => Value::Func(*id),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Ptr(_) => "pointer",
            Value::Chan(_) => "chan",
            Value::Func(_) => "func",
            Value::Tuple(_) => "tuple",
        }
    }

    fn mismatch(&self, expected: &'static str) -> RuntimeError {
        RuntimeError::TypeMismatch {
            expected,
            found: self.kind().to_string(),
        }
    }

    pub fn as_bool(&self) -> Result<bool, RuntimeError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_int(&self) -> Result<i64, RuntimeError> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn as_float(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Float(f) => Ok(*f),
            other => Err(other.mismatch("float")),
        }
    }

    /// Nil pointers fault like any other bad address.
    pub fn as_ptr(&self) -> Result<Pointer, RuntimeError> {
        match self {
            Value::Ptr(ptr) => Ok(*ptr),
            Value::Nil => Err(RuntimeError::BadPointer),
            other => Err(other.mismatch("pointer")),
        }
    }

    pub fn as_chan(&self) -> Result<ChanId, RuntimeError> {
        match self {
            Value::Chan(id) => Ok(*id),
            other => Err(other.mismatch("chan")),
        }
    }

    pub fn as_func(&self) -> Result<FuncId, RuntimeError> {
        match self {
            Value::Func(id) => Ok(*id),
            other => Err(other.mismatch("func")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:e}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Ptr(ptr) => write!(f, "0x{:x}:{}", ptr.obj, ptr.off),
            Value::Chan(id) => write!(f, "chan#{}", id.0),
            Value::Func(id) => write!(f, "func#{}", id.0),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}
