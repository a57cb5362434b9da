//! Round-robin cooperative scheduler.
//!
//! Every tick gives each live goroutine one turn, in spawn order. A turn runs
//! the goroutine's top frame until it waits, yields, or its outermost frame
//! completes; calls push frames and completed callees hand their result to
//! the frame below. Nothing is ever preempted.
//!
//! Completed goroutines are dropped at the end of the tick. Only the results
//! of watched goroutines are kept, until they are taken.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::ssa::model::ir::FuncId;

use super::error::RuntimeError;
use super::frame::{Frame, Pending, Step};
use super::heap::Env;
use super::value::Value;

#[derive(Debug)]
pub struct Goroutine {
    pub id: usize,
    stack: Vec<Frame>,
    result: Option<Value>,
}

impl Goroutine {
    pub fn is_complete(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.stack.last()
    }

    /// Runs until the goroutine can make no further progress this turn.
    fn turn(&mut self, env: &mut Env) -> Result<(), RuntimeError> {
        while let Some(frame) = self.stack.last_mut() {
            match frame.step(env)? {
                Step::Complete(value) => {
                    self.stack.pop();
                    match self.stack.last_mut() {
                        Some(caller) => caller.deliver(value)?,
                        None => self.result = Some(value),
                    }
                }
                Step::Incomplete(Pending::Call { func, args }) => {
                    let callee = Frame::new(env.function(func)?, args)?;
                    self.stack.push(callee);
                }
                Step::Incomplete(Pending::Wait | Pending::Yield) => break,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    goroutines: Vec<Goroutine>,
    watched: HashSet<usize>,
    results: HashMap<usize, Value>,
    next_id: usize,
    ticks: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(
        &mut self,
        env: &Env,
        func: FuncId,
        args: Vec<Value>,
    ) -> Result<usize, RuntimeError> {
        let frame = Frame::new(env.function(func)?, args)?;
        let id = self.next_id;
        self.next_id += 1;
        debug!(goroutine = id, func = func.0, "spawn");
        self.goroutines.push(Goroutine {
            id,
            stack: vec![frame],
            result: None,
        });
        Ok(id)
    }

    /// One round over every live goroutine. Goroutines spawned during the
    /// round first run in the next one.
    pub fn tick(&mut self, env: &mut Env) -> Result<(), RuntimeError> {
        self.ticks += 1;
        for goroutine in &mut self.goroutines {
            trace!(goroutine = goroutine.id, tick = self.ticks, "turn");
            goroutine.turn(env)?;
        }
        let (done, live): (Vec<Goroutine>, Vec<Goroutine>) = std::mem::take(&mut self.goroutines)
            .into_iter()
            .partition(Goroutine::is_complete);
        self.goroutines = live;
        for goroutine in done {
            if !self.watched.remove(&goroutine.id) {
                trace!(goroutine = goroutine.id, "dropped");
                continue;
            }
            if let Some(result) = goroutine.result {
                self.results.insert(goroutine.id, result);
            }
        }
        for (func, args) in env.take_spawned() {
            self.spawn(env, func, args)?;
        }
        Ok(())
    }

    /// Ticks until every goroutine completes. `limit` bounds the number of
    /// ticks for callers; a program where every goroutine waits forever
    /// simply runs into it.
    pub fn run(&mut self, env: &mut Env, limit: u64) -> Result<(), RuntimeError> {
        while !self.goroutines.is_empty() {
            self.tick_within(env, limit)?;
        }
        Ok(())
    }

    /// Ticks until goroutine `id` completes.
    pub fn run_until(&mut self, env: &mut Env, id: usize, limit: u64) -> Result<(), RuntimeError> {
        while !self.is_complete(id) {
            self.tick_within(env, limit)?;
        }
        Ok(())
    }

    fn tick_within(&mut self, env: &mut Env, limit: u64) -> Result<(), RuntimeError> {
        if self.ticks >= limit {
            return Err(RuntimeError::TickLimit(limit));
        }
        self.tick(env)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn live(&self) -> usize {
        self.goroutines.len()
    }

    /// A live goroutine.
    pub fn goroutine(&self, id: usize) -> Option<&Goroutine> {
        self.goroutines.iter().find(|g| g.id == id)
    }

    /// Keeps the result of live goroutine `id` once it completes.
    pub fn watch(&mut self, id: usize) {
        if self.goroutine(id).is_some() {
            self.watched.insert(id);
        }
    }

    pub fn take_result(&mut self, id: usize) -> Option<Value> {
        self.results.remove(&id)
    }

    /// Results completed and not yet taken.
    pub fn retained(&self) -> usize {
        self.results.len()
    }

    /// Unknown ids count as complete.
    pub fn is_complete(&self, id: usize) -> bool {
        self.goroutine(id).is_none_or(Goroutine::is_complete)
    }
}
