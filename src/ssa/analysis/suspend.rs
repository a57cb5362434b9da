//! Whole-program may-suspend analysis.
//!
//! A function may suspend when it performs a blocking channel operation, an
//! explicit yield, an indirect call, or a direct call to a function that may
//! suspend. The call graph is iterated to a fixed point so recursion is
//! handled.

use std::collections::HashMap;

use crate::ssa::model::ir::{Callee, FuncId, Function, InstKind, Program};

#[derive(Debug, Clone, Default)]
pub struct SuspendInfo {
    may_suspend: HashMap<FuncId, bool>,
}

impl SuspendInfo {
    pub fn analyze(program: &Program) -> Self {
        let mut info = SuspendInfo::default();
        for func in &program.functions {
            info.may_suspend.insert(func.id, suspends_locally(func));
        }

        let mut changed = true;
        while changed {
            changed = false;
            for func in &program.functions {
                if info.may_suspend(func.id) {
                    continue;
                }
                let calls_suspending = func
                    .blocks
                    .iter()
                    .flat_map(|block| block.insts.iter())
                    .any(|inst| match &inst.kind {
                        InstKind::Call {
                            callee: Callee::Direct(target),
                            ..
                        } => info.may_suspend(*target),
                        _ => false,
                    });
                if calls_suspending {
                    info.may_suspend.insert(func.id, true);
                    changed = true;
                }
            }
        }

        info
    }

    /// Unknown functions are assumed to suspend.
    pub fn may_suspend(&self, func: FuncId) -> bool {
        self.may_suspend.get(&func).copied().unwrap_or(true)
    }

    /// Records a function created after analysis, such as a split-off helper.
    pub fn register(&mut self, func: FuncId, may_suspend: bool) {
        self.may_suspend.insert(func, may_suspend);
    }

    /// Whether executing `kind` may hand control back to the scheduler.
    pub fn is_suspension_point(&self, kind: &InstKind) -> bool {
        match kind {
            InstKind::Send { .. } | InstKind::Recv { .. } | InstKind::Yield => true,
            InstKind::Call { callee, .. } => match callee {
                Callee::Direct(target) => self.may_suspend(*target),
                Callee::Value(_) => true,
                Callee::Builtin(_) => false,
            },
            _ => false,
        }
    }
}

fn suspends_locally(func: &Function) -> bool {
    func.blocks
        .iter()
        .flat_map(|block| block.insts.iter())
        .any(|inst| match &inst.kind {
            InstKind::Send { .. } | InstKind::Recv { .. } | InstKind::Yield => true,
            InstKind::Call {
                callee: Callee::Value(_),
                ..
            } => true,
            _ => false,
        })
}
