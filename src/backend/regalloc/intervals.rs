//! Live interval construction for register-class values.

use std::collections::HashMap;

use crate::backend::structure::Reconstruction;
use crate::ssa::model::ir::{BlockId, Function, InstKind, ValueId};

use super::track::{UseInfo, UseSite, ValueClass};

/// Half-open live interval [start, end) in linear position space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveInterval {
    pub start: u32,
    pub end: u32,
}

impl LiveInterval {
    pub fn overlaps(&self, other: &LiveInterval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Live intervals keyed by SSA `ValueId`.
pub type LiveIntervalMap = HashMap<ValueId, LiveInterval>;

/// Linear numbering of the reconstructed function. Each block gets a start
/// position (where its phis are defined), one position per instruction, and
/// an end position shared by its terminator and outgoing phi copies.
#[derive(Debug, Clone, Default)]
pub struct Positions {
    block_start: HashMap<BlockId, u32>,
    block_end: HashMap<BlockId, u32>,
    inst: HashMap<(BlockId, usize), u32>,
}

impl Positions {
    pub fn number(func: &Function, recon: &Reconstruction) -> Self {
        let mut positions = Positions::default();
        let mut next: u32 = 0;
        for block_id in recon.order() {
            let Some(block) = func.block(block_id) else {
                continue;
            };
            positions.block_start.insert(block_id, next);
            next += 1;
            for idx in 0..block.insts.len() {
                positions.inst.insert((block_id, idx), next);
                next += 1;
            }
            positions.block_end.insert(block_id, next);
            next += 1;
        }
        positions
    }

    pub fn start(&self, block: BlockId) -> u32 {
        self.block_start.get(&block).copied().unwrap_or(0)
    }

    pub fn end(&self, block: BlockId) -> u32 {
        self.block_end.get(&block).copied().unwrap_or(0)
    }

    pub fn site(&self, site: UseSite) -> u32 {
        match site {
            UseSite::Inst { block, inst } => self.inst.get(&(block, inst)).copied().unwrap_or(0),
            UseSite::Term { block } | UseSite::Edge { pred: block } => self.end(block),
        }
    }
}

/// Build intervals in one pass over the reconstructed order.
///
/// Uses by inline or folded-pointer consumers count at the position where the
/// consumer is itself used. An interval that reaches into a loop whose header
/// follows its definition is stretched to the end of that loop.
pub fn build_live_intervals(
    func: &Function,
    recon: &Reconstruction,
    uses: &UseInfo,
    classes: &HashMap<ValueId, ValueClass>,
) -> LiveIntervalMap {
    let positions = Positions::number(func, recon);
    let entry_start = recon
        .descriptors()
        .first()
        .map_or(0, |d| positions.start(d.block));
    let mut map = LiveIntervalMap::new();

    // Effective position of each instruction: its own, or that of the
    // consumer it is folded into.
    let mut effective: HashMap<(BlockId, usize), u32> = HashMap::new();
    for block_id in recon.order() {
        let Some(block) = func.block(block_id) else {
            continue;
        };
        for idx in (0..block.insts.len()).rev() {
            let own = positions.site(UseSite::Inst { block: block_id, inst: idx });
            let folded = block.insts[idx]
                .result
                .as_ref()
                .filter(|r| classes.get(&r.id).is_some_and(|c| *c != ValueClass::Register))
                .and_then(|r| uses.uses(r.id).first().copied());
            let pos = match folded {
                Some(UseSite::Inst { block, inst }) => effective
                    .get(&(block, inst))
                    .copied()
                    .unwrap_or(own),
                Some(site) => positions.site(site),
                None => own,
            };
            effective.insert((block_id, idx), pos);
        }
    }
    let use_pos = |site: UseSite| match site {
        UseSite::Inst { block, inst } => effective
            .get(&(block, inst))
            .copied()
            .unwrap_or_else(|| positions.site(site)),
        other => positions.site(other),
    };

    for param in &func.params {
        mark_def(param.id, entry_start, &mut map);
    }

    for block_id in recon.order() {
        let Some(block) = func.block(block_id) else {
            continue;
        };
        for (idx, inst) in block.insts.iter().enumerate() {
            let Some(result) = &inst.result else {
                continue;
            };
            if classes.get(&result.id).is_some_and(|c| *c != ValueClass::Register) {
                continue;
            }
            if let InstKind::Phi { incoming } = &inst.kind {
                mark_def(result.id, positions.start(block_id), &mut map);
                // The phi's slot is written by the copies on each incoming edge.
                for arg in incoming {
                    if uses.reachable.contains(&arg.pred) {
                        mark_def(result.id, positions.end(arg.pred), &mut map);
                    }
                }
            } else {
                let pos = positions.site(UseSite::Inst { block: block_id, inst: idx });
                mark_def(result.id, pos, &mut map);
            }
        }
    }

    let registers: Vec<ValueId> = map.keys().copied().collect();
    for value in registers {
        for site in uses.uses(value) {
            mark_use(value, use_pos(*site) + 1, &mut map);
        }
    }

    extend_over_loops(recon, &positions, &mut map);
    map
}

fn extend_over_loops(recon: &Reconstruction, positions: &Positions, map: &mut LiveIntervalMap) {
    let spans: Vec<(u32, u32)> = recon
        .loops()
        .iter()
        .map(|info| {
            let start = positions.start(info.header);
            let end = info
                .body
                .iter()
                .map(|b| positions.end(*b))
                .max()
                .unwrap_or(start);
            (start, end + 1)
        })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for interval in map.values_mut() {
            for &(loop_start, loop_end) in &spans {
                if interval.start < loop_start
                    && interval.end > loop_start
                    && interval.end < loop_end
                {
                    interval.end = loop_end;
                    changed = true;
                }
            }
        }
    }
}

fn mark_use(value: ValueId, end: u32, map: &mut LiveIntervalMap) {
    map.entry(value)
        .and_modify(|iv| iv.end = iv.end.max(end))
        .or_insert(LiveInterval {
            start: end.saturating_sub(1),
            end,
        });
}

fn mark_def(value: ValueId, start: u32, map: &mut LiveIntervalMap) {
    map.entry(value)
        .and_modify(|iv| {
            if start < iv.start {
                iv.start = start;
            }
            iv.end = iv.end.max(start + 1);
        })
        .or_insert(LiveInterval {
            start,
            end: start + 1,
        });
}
