//! Resumable Function Compiler: SSA function to pseudo-block dispatch routine.

pub mod compiler;
pub mod moves;
pub mod pseudo;

pub use compiler::{compile_function, validate};
pub use moves::{Move, edge_moves, resolve_move_list};
pub use pseudo::{
    BranchTerm, CallTarget, DispatchFn, Edge, ElseArm, Expr, PseudoBlock, PseudoTerm, Stmt,
    SuspendOp, Test, WaitOp,
};
