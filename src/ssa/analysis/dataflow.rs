//! Generic dataflow analysis utilities.
//! Concrete analyses (liveness, dominators, loops) build on `DataflowGraph`.

pub trait DataflowGraph {
    type Node: Copy + Eq;

    fn num_nodes(&self) -> usize;
    fn index(&self, node: Self::Node) -> usize;
    fn node_at(&self, idx: usize) -> Self::Node;
    fn preds(&self, node: Self::Node) -> &[Self::Node];
    fn succs(&self, node: Self::Node) -> &[Self::Node];
}

#[derive(Debug, Clone)]
pub struct DataflowResult<T> {
    pub in_map: Vec<T>,
    pub out_map: Vec<T>,
}

/// Solves a backward problem to a fixed point. `exit_state` seeds nodes
/// without successors.
pub fn solve_backward<T, G, FMeet, FTransfer>(
    graph: &G,
    exit_state: T,
    bottom: T,
    meet: FMeet,
    transfer: FTransfer,
) -> DataflowResult<T>
where
    T: Clone + PartialEq,
    G: DataflowGraph,
    FMeet: Fn(&[T]) -> T,
    FTransfer: Fn(G::Node, &T) -> T,
{
    let num_nodes = graph.num_nodes();
    let mut in_map = vec![bottom.clone(); num_nodes];
    let mut out_map = vec![bottom.clone(); num_nodes];
    let mut in_worklist = vec![true; num_nodes];
    let mut worklist: Vec<G::Node> = (0..num_nodes).map(|idx| graph.node_at(idx)).collect();

    while let Some(node) = worklist.pop() {
        let idx = graph.index(node);
        in_worklist[idx] = false;

        let succs = graph.succs(node);
        let out_state = if succs.is_empty() {
            exit_state.clone()
        } else {
            let mut succ_states = Vec::with_capacity(succs.len());
            for &succ in succs {
                let s_idx = graph.index(succ);
                succ_states.push(in_map[s_idx].clone());
            }
            meet(&succ_states)
        };

        let in_state = transfer(node, &out_state);

        let mut changed = false;
        if in_state != in_map[idx] {
            in_map[idx] = in_state;
            changed = true;
        }
        if out_state != out_map[idx] {
            out_map[idx] = out_state;
            changed = true;
        }

        if changed {
            for &pred in graph.preds(node) {
                let p_idx = graph.index(pred);
                if !in_worklist[p_idx] {
                    in_worklist[p_idx] = true;
                    worklist.push(pred);
                }
            }
        }
    }

    DataflowResult { in_map, out_map }
}
