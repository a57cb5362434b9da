//! Dominators, retreating edges and loop nesting.
//!
//! Dominators use the iterative algorithm of Cooper, Harvey and Kennedy
//! ("A Simple, Fast Dominance Algorithm"). Loops are discovered from DFS
//! retreating edges rather than dominator back edges, so irreducible cycles
//! still get a header.

use std::collections::HashSet;

use super::dataflow::DataflowGraph;

/// Immediate-dominator tree over node indices.
#[derive(Debug, Clone)]
pub struct Dominators {
    idom: Vec<Option<usize>>,
    rpo_number: Vec<usize>,
}

impl Dominators {
    pub fn compute<G: DataflowGraph>(graph: &G, entry: G::Node) -> Self {
        let n = graph.num_nodes();
        let order = reverse_postorder(graph, entry);
        let mut rpo_number = vec![usize::MAX; n];
        for (pos, &idx) in order.iter().enumerate() {
            rpo_number[idx] = pos;
        }

        let mut idom: Vec<Option<usize>> = vec![None; n];
        let Some(&entry_idx) = order.first() else {
            return Self { idom, rpo_number };
        };
        idom[entry_idx] = Some(entry_idx);

        let mut changed = true;
        while changed {
            changed = false;
            for &idx in order.iter().skip(1) {
                let node = graph.node_at(idx);
                let mut new_idom: Option<usize> = None;
                for &pred in graph.preds(node) {
                    let p = graph.index(pred);
                    if idom[p].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(current) => intersect(&idom, &rpo_number, p, current),
                    });
                }
                if new_idom.is_some() && idom[idx] != new_idom {
                    idom[idx] = new_idom;
                    changed = true;
                }
            }
        }

        Self { idom, rpo_number }
    }

    pub fn is_reachable(&self, idx: usize) -> bool {
        self.idom[idx].is_some()
    }

    /// Immediate dominator; the entry is its own.
    pub fn idom(&self, idx: usize) -> Option<usize> {
        self.idom[idx]
    }

    pub fn dominates(&self, a: usize, b: usize) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        let mut cursor = b;
        loop {
            if cursor == a {
                return true;
            }
            match self.idom[cursor] {
                Some(parent) if parent != cursor => cursor = parent,
                _ => return false,
            }
        }
    }

    pub fn rpo_number(&self, idx: usize) -> usize {
        self.rpo_number[idx]
    }
}

fn intersect(idom: &[Option<usize>], rpo: &[usize], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while rpo[a] > rpo[b] {
            a = idom[a].unwrap_or(a);
        }
        while rpo[b] > rpo[a] {
            b = idom[b].unwrap_or(b);
        }
    }
    a
}

/// Reverse postorder of node indices reachable from `entry`.
pub fn reverse_postorder<G: DataflowGraph>(graph: &G, entry: G::Node) -> Vec<usize> {
    let n = graph.num_nodes();
    let mut post = Vec::with_capacity(n);
    if n == 0 {
        return post;
    }
    let mut visited = vec![false; n];
    // (node index, next successor to visit)
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let start = graph.index(entry);
    visited[start] = true;
    stack.push((start, 0));

    while let Some(&mut (idx, ref mut next)) = stack.last_mut() {
        let succs = graph.succs(graph.node_at(idx));
        if *next < succs.len() {
            let succ = graph.index(succs[*next]);
            *next += 1;
            if !visited[succ] {
                visited[succ] = true;
                stack.push((succ, 0));
            }
        } else {
            post.push(idx);
            stack.pop();
        }
    }

    post.reverse();
    post
}

/// Edges `(from, to)` whose target is on the DFS stack when the edge is seen.
pub fn retreating_edges<G: DataflowGraph>(graph: &G, entry: G::Node) -> HashSet<(usize, usize)> {
    let n = graph.num_nodes();
    let mut edges = HashSet::new();
    if n == 0 {
        return edges;
    }
    let mut visited = vec![false; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let start = graph.index(entry);
    visited[start] = true;
    on_stack[start] = true;
    stack.push((start, 0));

    while let Some(&mut (idx, ref mut next)) = stack.last_mut() {
        let succs = graph.succs(graph.node_at(idx));
        if *next < succs.len() {
            let succ = graph.index(succs[*next]);
            *next += 1;
            if on_stack[succ] {
                edges.insert((idx, succ));
            } else if !visited[succ] {
                visited[succ] = true;
                on_stack[succ] = true;
                stack.push((succ, 0));
            }
        } else {
            on_stack[idx] = false;
            stack.pop();
        }
    }

    edges
}

/// Loop headers, loop bodies and per-node nesting depth.
#[derive(Debug, Clone)]
pub struct LoopForest {
    headers: Vec<bool>,
    depth: Vec<u32>,
    bodies: Vec<(usize, Vec<bool>)>,
    back_edges: HashSet<(usize, usize)>,
}

impl LoopForest {
    pub fn compute<G: DataflowGraph>(graph: &G, entry: G::Node) -> Self {
        let n = graph.num_nodes();
        let back_edges = retreating_edges(graph, entry);
        let mut headers = vec![false; n];
        let mut bodies: Vec<(usize, Vec<bool>)> = Vec::new();

        for &(src, header) in &back_edges {
            headers[header] = true;
            let slot = match bodies.iter().position(|(h, _)| *h == header) {
                Some(slot) => slot,
                None => {
                    let mut body = vec![false; n];
                    body[header] = true;
                    bodies.push((header, body));
                    bodies.len() - 1
                }
            };
            let body = &mut bodies[slot].1;
            let mut work = vec![src];
            while let Some(idx) = work.pop() {
                if body[idx] {
                    continue;
                }
                body[idx] = true;
                for &pred in graph.preds(graph.node_at(idx)) {
                    work.push(graph.index(pred));
                }
            }
        }
        bodies.sort_by_key(|(header, _)| *header);

        let mut depth = vec![0u32; n];
        for (_, body) in &bodies {
            for (idx, inside) in body.iter().enumerate() {
                if *inside {
                    depth[idx] += 1;
                }
            }
        }

        Self {
            headers,
            depth,
            bodies,
            back_edges,
        }
    }

    pub fn is_header(&self, idx: usize) -> bool {
        self.headers[idx]
    }

    pub fn depth(&self, idx: usize) -> u32 {
        self.depth[idx]
    }

    pub fn is_back_edge(&self, from: usize, to: usize) -> bool {
        self.back_edges.contains(&(from, to))
    }

    /// Loop bodies as `(header, membership)` pairs, ordered by header index.
    pub fn loops(&self) -> impl Iterator<Item = (usize, &[bool])> {
        self.bodies
            .iter()
            .map(|(header, body)| (*header, body.as_slice()))
    }
}
