//! Execution environment shared by every goroutine: heap cells, channels,
//! compiled routines, pending spawns and printed output.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::backend::resume::DispatchFn;
use crate::ssa::model::ir::FuncId;

use super::error::RuntimeError;
use super::value::{ChanId, Pointer, Value};

/// Buffered FIFO channel. An unbuffered channel holds one value, so a send
/// completes once the slot is free rather than at the matching receive.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    cap: usize,
    queue: VecDeque<Value>,
}

impl Channel {
    pub fn new(cap: u32) -> Self {
        Self {
            cap: (cap as usize).max(1),
            queue: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Env {
    objects: Vec<Vec<Value>>,
    channels: Vec<Channel>,
    functions: HashMap<FuncId, Rc<DispatchFn>>,
    spawned: Vec<(FuncId, Vec<Value>)>,
    output: Vec<String>,
}

impl Env {
    pub fn new(functions: impl IntoIterator<Item = DispatchFn>) -> Self {
        Self {
            functions: functions
                .into_iter()
                .map(|func| (func.id, Rc::new(func)))
                .collect(),
            ..Self::default()
        }
    }

    pub fn function(&self, id: FuncId) -> Result<Rc<DispatchFn>, RuntimeError> {
        self.functions
            .get(&id)
            .cloned()
            .ok_or_else(|| RuntimeError::internal(format!("call to unknown function f{}", id.0)))
    }

    // -------------------------------------------------------------------------
    // Heap
    // -------------------------------------------------------------------------

    pub fn alloc(&mut self, count: u32) -> Pointer {
        self.objects.push(vec![Value::Unit; count as usize]);
        Pointer {
            obj: self.objects.len() - 1,
            off: 0,
        }
    }

    pub fn load(&self, ptr: Pointer) -> Result<Value, RuntimeError> {
        self.objects
            .get(ptr.obj)
            .and_then(|cells| cells.get(ptr.off))
            .cloned()
            .ok_or(RuntimeError::BadPointer)
    }

    pub fn store(&mut self, ptr: Pointer, value: Value) -> Result<(), RuntimeError> {
        let cell = self
            .objects
            .get_mut(ptr.obj)
            .and_then(|cells| cells.get_mut(ptr.off))
            .ok_or(RuntimeError::BadPointer)?;
        *cell = value;
        Ok(())
    }

    /// Cells from `ptr` to the end of its object.
    pub fn remaining(&self, ptr: Pointer) -> Result<usize, RuntimeError> {
        self.objects
            .get(ptr.obj)
            .map(|cells| cells.len().saturating_sub(ptr.off))
            .ok_or(RuntimeError::BadPointer)
    }

    // -------------------------------------------------------------------------
    // Channels
    // -------------------------------------------------------------------------

    pub fn make_chan(&mut self, cap: u32) -> ChanId {
        self.channels.push(Channel::new(cap));
        ChanId(self.channels.len() - 1)
    }

    pub fn channel(&self, id: ChanId) -> Result<&Channel, RuntimeError> {
        self.channels
            .get(id.0)
            .ok_or_else(|| RuntimeError::internal(format!("unknown channel #{}", id.0)))
    }

    /// Queues `value` if there is room; `false` leaves the channel untouched.
    pub fn try_send(&mut self, id: ChanId, value: Value) -> Result<bool, RuntimeError> {
        let chan = self
            .channels
            .get_mut(id.0)
            .ok_or_else(|| RuntimeError::internal(format!("unknown channel #{}", id.0)))?;
        if chan.queue.len() >= chan.cap {
            return Ok(false);
        }
        chan.queue.push_back(value);
        Ok(true)
    }

    pub fn try_recv(&mut self, id: ChanId) -> Result<Option<Value>, RuntimeError> {
        let chan = self
            .channels
            .get_mut(id.0)
            .ok_or_else(|| RuntimeError::internal(format!("unknown channel #{}", id.0)))?;
        Ok(chan.queue.pop_front())
    }

    // -------------------------------------------------------------------------
    // Spawns and output
    // -------------------------------------------------------------------------

    pub fn spawn(&mut self, func: FuncId, args: Vec<Value>) {
        self.spawned.push((func, args));
    }

    pub(crate) fn take_spawned(&mut self) -> Vec<(FuncId, Vec<Value>)> {
        std::mem::take(&mut self.spawned)
    }

    pub fn print(&mut self, line: String) {
        self.output.push(line);
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }
}
