//! Cooperative Scheduler Runtime.
//!
//! Executes compiled dispatch routines directly: every goroutine is a stack
//! of frames, and the scheduler drives all of them round-robin until they
//! complete.

pub mod error;
pub mod frame;
pub mod heap;
pub mod scheduler;
pub mod value;

use tracing::info;

use crate::backend::resume::DispatchFn;
use crate::ssa::model::ir::FuncId;

pub use error::RuntimeError;
pub use frame::{Frame, Pending, Step};
pub use heap::{Channel, Env};
pub use scheduler::{Goroutine, Scheduler};
pub use value::{ChanId, Pointer, Value};

pub const DEFAULT_TICK_LIMIT: u64 = 1_000_000;

pub struct Runtime {
    pub env: Env,
    pub scheduler: Scheduler,
    done_init: bool,
}

impl Runtime {
    pub fn new(functions: impl IntoIterator<Item = DispatchFn>) -> Self {
        Self {
            env: Env::new(functions),
            scheduler: Scheduler::new(),
            done_init: false,
        }
    }

    /// Runs the program: goroutine 0 completes the initializer before `main`
    /// is spawned, then everything runs until all goroutines complete.
    pub fn boot(
        &mut self,
        init: Option<FuncId>,
        main: FuncId,
        limit: u64,
    ) -> Result<(), RuntimeError> {
        if let Some(init) = init {
            let gr = self.scheduler.spawn(&self.env, init, Vec::new())?;
            if gr != 0 {
                return Err(RuntimeError::internal("non-zero goroutine number in init"));
            }
            self.scheduler.run_until(&mut self.env, gr, limit)?;
        }
        self.done_init = true;
        self.scheduler.spawn(&self.env, main, Vec::new())?;
        self.scheduler.run(&mut self.env, limit)?;
        info!(ticks = self.scheduler.ticks(), "program complete");
        Ok(())
    }

    /// Runs `func` on a fresh goroutine until it completes and returns its
    /// result. Other goroutines keep running alongside it.
    pub fn call(
        &mut self,
        func: FuncId,
        args: Vec<Value>,
        limit: u64,
    ) -> Result<Value, RuntimeError> {
        let gr = self.scheduler.spawn(&self.env, func, args)?;
        self.scheduler.watch(gr);
        self.scheduler.run_until(&mut self.env, gr, limit)?;
        self.scheduler
            .take_result(gr)
            .ok_or_else(|| RuntimeError::internal(format!("goroutine {} left no result", gr)))
    }

    pub fn done_init(&self) -> bool {
        self.done_init
    }

    pub fn output(&self) -> &[String] {
        self.env.output()
    }
}

#[cfg(test)]
#[path = "../tests/runtime/t_runtime.rs"]
mod tests;
