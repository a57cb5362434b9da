//! Control-flow reconstruction.
//!
//! Turns a block graph into an ordered list of block descriptors. Blocks are
//! placed in a forward-edge topological order in which the "then" side of a
//! branch is emitted before its "else" side; pending else targets live on an
//! explicit stack owned by the walk.

mod descriptor;

use std::collections::HashMap;

use crate::diag::CompileError;
use crate::ssa::analysis::cfg::Cfg;
use crate::ssa::analysis::dataflow::DataflowGraph;
use crate::ssa::analysis::dom::{LoopForest, reverse_postorder};
use crate::ssa::model::ir::BlockId;

pub use descriptor::{
    Arm, BlockDescriptor, BlockExit, BlockKind, BlockRole, BranchTest, BranchTree, LoopInfo,
};

/// A block graph the reconstructor can walk.
pub trait FlowGraph {
    fn entry(&self) -> BlockId;
    /// Every block, reachable or not.
    fn nodes(&self) -> Vec<BlockId>;
    fn exit(&self, block: BlockId) -> BlockExit;
}

impl FlowGraph for Cfg {
    fn entry(&self) -> BlockId {
        Cfg::entry(self)
    }

    fn nodes(&self) -> Vec<BlockId> {
        self.blocks().to_vec()
    }

    fn exit(&self, block: BlockId) -> BlockExit {
        BlockExit::from_terminator(self.terminator(block))
    }
}

/// Reconstructed block order of one function.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    entry: BlockId,
    descriptors: Vec<BlockDescriptor>,
    loops: Vec<LoopInfo>,
    unreachable: Vec<BlockId>,
    positions: HashMap<BlockId, usize>,
    /// Else targets the walk never placed.
    else_left: usize,
}

impl Reconstruction {
    pub fn descriptors(&self) -> &[BlockDescriptor] {
        &self.descriptors
    }

    pub fn order(&self) -> Vec<BlockId> {
        self.descriptors.iter().map(|d| d.block).collect()
    }

    pub fn position(&self, block: BlockId) -> Option<usize> {
        self.positions.get(&block).copied()
    }

    pub fn descriptor(&self, block: BlockId) -> Option<&BlockDescriptor> {
        self.position(block).map(|pos| &self.descriptors[pos])
    }

    pub fn loops(&self) -> &[LoopInfo] {
        &self.loops
    }

    /// Blocks with no path from the entry; they are not emitted.
    pub fn unreachable(&self) -> &[BlockId] {
        &self.unreachable
    }

    /// Every `(from, to)` transition, in descriptor order.
    pub fn transitions(&self) -> Vec<(BlockId, BlockId)> {
        self.descriptors
            .iter()
            .flat_map(|d| d.exit.targets().into_iter().map(move |to| (d.block, to)))
            .collect()
    }

    /// Checks that every edge of `graph` between emitted blocks appears as
    /// exactly one transition and that nothing else does.
    pub fn validate<G: FlowGraph>(&self, graph: &G) -> Result<(), CompileError> {
        let mut expected: HashMap<(BlockId, BlockId), usize> = HashMap::new();
        for block in self.order() {
            for target in dedup(graph.exit(block).targets()) {
                *expected.entry((block, target)).or_default() += 1;
            }
        }
        for edge in self.transitions() {
            match expected.get_mut(&edge) {
                Some(count) if *count > 0 => *count -= 1,
                _ => {
                    return Err(CompileError::internal(format!(
                        "transition bb{} -> bb{} is not a single graph edge",
                        edge.0.0, edge.1.0
                    )));
                }
            }
        }
        if let Some(((from, to), _)) = expected.iter().find(|(_, count)| **count > 0) {
            return Err(CompileError::internal(format!(
                "edge bb{} -> bb{} was dropped by reconstruction",
                from.0, to.0
            )));
        }
        for descriptor in &self.descriptors {
            for target in descriptor.exit.targets() {
                if self.position(target).is_none() {
                    return Err(CompileError::internal(format!(
                        "bb{} branches to unplaced bb{}",
                        descriptor.block.0, target.0
                    )));
                }
            }
        }
        if self.else_left > 0 {
            return Err(CompileError::internal(format!(
                "else-stack not drained: {} target(s) left",
                self.else_left
            )));
        }
        match self.descriptors.first() {
            Some(first) if first.block == self.entry && first.else_depth == 0 => Ok(()),
            _ => Err(CompileError::internal("reconstruction does not start at the entry")),
        }
    }
}

impl FlowGraph for Reconstruction {
    fn entry(&self) -> BlockId {
        self.entry
    }

    fn nodes(&self) -> Vec<BlockId> {
        let mut nodes = self.order();
        nodes.extend(self.unreachable.iter().copied());
        nodes
    }

    fn exit(&self, block: BlockId) -> BlockExit {
        self.descriptor(block)
            .map(|d| d.exit.clone())
            .unwrap_or(BlockExit::Unreachable)
    }
}

/// Successor/predecessor view of a `FlowGraph`, restricted to known nodes.
struct EdgeGraph {
    nodes: Vec<BlockId>,
    index: HashMap<BlockId, usize>,
    exits: Vec<BlockExit>,
    succs: Vec<Vec<BlockId>>,
    preds: Vec<Vec<BlockId>>,
}

impl EdgeGraph {
    fn new<G: FlowGraph>(graph: &G) -> Self {
        let mut nodes = graph.nodes();
        let entry = graph.entry();
        if !nodes.contains(&entry) {
            nodes.insert(0, entry);
        }
        let index: HashMap<BlockId, usize> =
            nodes.iter().enumerate().map(|(idx, b)| (*b, idx)).collect();
        let exits: Vec<BlockExit> = nodes.iter().map(|b| graph.exit(*b)).collect();
        let mut succs = vec![Vec::new(); nodes.len()];
        let mut preds = vec![Vec::new(); nodes.len()];
        for (idx, exit) in exits.iter().enumerate() {
            for target in dedup(exit.targets()) {
                let Some(&t_idx) = index.get(&target) else {
                    continue;
                };
                succs[idx].push(target);
                if !preds[t_idx].contains(&nodes[idx]) {
                    preds[t_idx].push(nodes[idx]);
                }
            }
        }
        Self {
            nodes,
            index,
            exits,
            succs,
            preds,
        }
    }
}

impl DataflowGraph for EdgeGraph {
    type Node = BlockId;

    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn index(&self, node: BlockId) -> usize {
        self.index[&node]
    }

    fn node_at(&self, idx: usize) -> BlockId {
        self.nodes[idx]
    }

    fn preds(&self, node: BlockId) -> &[BlockId] {
        &self.preds[self.index[&node]]
    }

    fn succs(&self, node: BlockId) -> &[BlockId] {
        &self.succs[self.index[&node]]
    }
}

/// Reconstructs the structured block order of `graph`.
pub fn reconstruct<G: FlowGraph>(graph: &G) -> Reconstruction {
    let edges = EdgeGraph::new(graph);
    let entry = graph.entry();
    let n = edges.num_nodes();

    let rpo = reverse_postorder(&edges, entry);
    let mut reachable = vec![false; n];
    for &idx in &rpo {
        reachable[idx] = true;
    }
    let loops = LoopForest::compute(&edges, entry);

    // Forward predecessors still waiting to be placed.
    let mut pending = vec![0usize; n];
    let mut forward_preds = vec![0usize; n];
    for &idx in &rpo {
        let node = edges.node_at(idx);
        for &pred in edges.preds(node) {
            let p = edges.index(pred);
            if reachable[p] && !loops.is_back_edge(p, idx) {
                forward_preds[idx] += 1;
            }
        }
        pending[idx] = forward_preds[idx];
    }

    let mut placed = vec![false; n];
    let mut descriptors = Vec::with_capacity(rpo.len());
    let mut else_stack: Vec<usize> = Vec::new();
    let mut skipped: Vec<usize> = Vec::new();
    let ready = |idx: usize, pending: &[usize], placed: &[bool]| pending[idx] == 0 && !placed[idx];

    let mut current = Some(edges.index(entry));
    loop {
        let idx = match current.take() {
            Some(idx) => idx,
            None => {
                let mut next = None;
                while let Some(candidate) = else_stack.pop() {
                    if ready(candidate, &pending, &placed) {
                        next = Some(candidate);
                        break;
                    }
                    skipped.push(candidate);
                }
                let fallback = || rpo.iter().copied().find(|&i| ready(i, &pending, &placed));
                match next.or_else(fallback) {
                    Some(idx) => idx,
                    None => break,
                }
            }
        };

        placed[idx] = true;
        let block = edges.node_at(idx);
        for &succ in edges.succs(block) {
            let s = edges.index(succ);
            if !loops.is_back_edge(idx, s) {
                pending[s] = pending[s].saturating_sub(1);
            }
        }

        let exit = edges.exits[idx].clone();
        let kind = if block == entry {
            BlockKind::Entry
        } else if loops.is_header(idx) {
            BlockKind::LoopHeader
        } else if forward_preds[idx] > 1 {
            BlockKind::Join
        } else {
            BlockKind::Plain
        };
        descriptors.push(BlockDescriptor {
            block,
            kind,
            exit: exit.clone(),
            loop_depth: loops.depth(idx),
            else_depth: else_stack.len() as u32,
        });

        match &exit {
            BlockExit::Straight(target) => {
                let t = edges.index(*target);
                if ready(t, &pending, &placed) {
                    current = Some(t);
                }
            }
            BlockExit::Branch(tree) => {
                let targets = tree.targets();
                for target in targets.iter().skip(1).rev() {
                    else_stack.push(edges.index(*target));
                }
                let then = edges.index(tree.then_target);
                if ready(then, &pending, &placed) {
                    current = Some(then);
                }
            }
            BlockExit::Return | BlockExit::Unreachable => {}
        }
    }

    skipped.extend(else_stack.drain(..));
    skipped.retain(|&idx| !placed[idx]);
    skipped.sort_unstable();
    skipped.dedup();

    let positions: HashMap<BlockId, usize> = descriptors
        .iter()
        .enumerate()
        .map(|(pos, d)| (d.block, pos))
        .collect();

    let mut loops: Vec<LoopInfo> = loops
        .loops()
        .map(|(header, body)| {
            let mut members: Vec<BlockId> = body
                .iter()
                .enumerate()
                .filter(|(_, inside)| **inside)
                .map(|(idx, _)| edges.node_at(idx))
                .filter(|b| positions.contains_key(b))
                .collect();
            members.sort_by_key(|b| positions[b]);
            LoopInfo {
                header: edges.node_at(header),
                body: members,
            }
        })
        .collect();
    loops.sort_by_key(|info| positions.get(&info.header).copied().unwrap_or(usize::MAX));

    let mut unreachable: Vec<BlockId> = edges
        .nodes
        .iter()
        .enumerate()
        .filter(|(idx, _)| !reachable[*idx])
        .map(|(_, b)| *b)
        .collect();
    unreachable.sort();
    unreachable.dedup();

    tracing::trace!(blocks = descriptors.len(), loops = loops.len(), "reconstructed");

    Reconstruction {
        entry,
        descriptors,
        loops,
        unreachable,
        positions,
        else_left: skipped.len(),
    }
}

fn dedup(targets: Vec<BlockId>) -> Vec<BlockId> {
    let mut out = Vec::with_capacity(targets.len());
    for target in targets {
        if !out.contains(&target) {
            out.push(target);
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/backend/t_structure.rs"]
mod tests;
