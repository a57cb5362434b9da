//! Phi elimination moves.
//!
//! Phis become parallel register copies on each incoming edge. A parallel
//! copy like `{r1 <- r2, r2 <- r1}` has to be sequenced so no source is
//! overwritten before it is read:
//!
//! 1. Emit moves whose destination is not a source of another pending move.
//! 2. When only cycles remain, save one source in the scratch slot, rewrite
//!    its move to read from scratch, and continue.

use std::collections::HashMap;

use crate::backend::regalloc::{Reg, ValueTracker};
use crate::ssa::model::ir::{Block, BlockId, InstKind};

/// A single register copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub dst: Reg,
    pub src: Reg,
}

/// Copies needed on the edge `from -> to`, in an order safe to run one by one.
pub fn edge_moves(from: BlockId, to: &Block, tracker: &mut ValueTracker) -> Vec<Move> {
    let mut moves = Vec::new();
    for inst in &to.insts {
        let (Some(result), InstKind::Phi { incoming }) = (&inst.result, &inst.kind) else {
            continue;
        };
        let Some(arg) = incoming.iter().find(|arg| arg.pred == from) else {
            continue;
        };
        if let (Some(dst), Some(src)) = (tracker.reg(result.id), tracker.reg(arg.value))
            && dst != src
        {
            moves.push(Move { dst, src });
        }
    }
    resolve_move_list(&mut moves, || tracker.scratch());
    moves
}

/// Orders a parallel move list in place. `scratch` is only called when a
/// cycle has to be broken.
pub fn resolve_move_list(moves: &mut Vec<Move>, mut scratch: impl FnMut() -> Reg) {
    if moves.len() <= 1 {
        return;
    }

    let mut pending = std::mem::take(moves);

    // How many pending moves read each register.
    let mut src_counts: HashMap<Reg, usize> = HashMap::new();
    for mov in &pending {
        *src_counts.entry(mov.src).or_insert(0) += 1;
    }

    let mut ordered = Vec::with_capacity(pending.len() + 1);

    while !pending.is_empty() {
        // A move is ready when nothing else still needs its destination.
        let ready_idx = pending.iter().position(|mov| {
            let total = src_counts.get(&mov.dst).copied().unwrap_or(0);
            let self_uses = usize::from(mov.src == mov.dst);
            total <= self_uses
        });

        if let Some(idx) = ready_idx {
            let removed = pending.remove(idx);
            release(&mut src_counts, removed.src);
            ordered.push(removed);
            continue;
        }

        // Only cycles remain: park one source in scratch.
        let mut mov = pending.remove(0);
        release(&mut src_counts, mov.src);
        let tmp = scratch();
        ordered.push(Move {
            dst: tmp,
            src: mov.src,
        });
        mov.src = tmp;
        *src_counts.entry(tmp).or_insert(0) += 1;
        pending.push(mov);
    }

    *moves = ordered;
}

fn release(src_counts: &mut HashMap<Reg, usize>, reg: Reg) {
    if let Some(count) = src_counts.get_mut(&reg) {
        *count -= 1;
        if *count == 0 {
            src_counts.remove(&reg);
        }
    }
}
