use std::collections::VecDeque;

use hashbrown::HashSet;
use loadelim_ir::{Graph, NodeIndex};

use crate::{Reducer, Reduction, Replacement};

/// Counters collected by a [`GraphReducer`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OptimizationStats {
    /// Number of times a node was handed to the reducers.
    pub visits: usize,
    /// Number of reductions that changed something without replacing the node.
    pub changes: usize,
    /// Number of nodes that were replaced and removed.
    pub replacements: usize,
}

/// Drives a set of [`Reducer`]s over a graph until none of them reports a change.
///
/// Nodes are first visited in post-order over their inputs, so a node is only visited after
/// everything it depends on. Whenever a reducer reports a change the users of the node are
/// visited again. Replaced nodes are rewired and removed from the graph.
#[derive(Default)]
pub struct GraphReducer {
    reducers: Vec<Box<dyn Reducer>>,
    worklist: VecDeque<NodeIndex>,
    queued: HashSet<NodeIndex>,
}

impl GraphReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reducer(&mut self, reducer: impl Reducer + 'static) {
        self.reducers.push(Box::new(reducer));
    }

    /// Run all reducers on `graph` until a fixed point is reached.
    pub fn reduce_graph(&mut self, graph: &mut Graph) -> OptimizationStats {
        let mut stats = OptimizationStats::default();
        for node in post_order(graph) {
            self.enqueue(node);
        }

        while let Some(node) = self.worklist.pop_front() {
            self.queued.remove(&node);
            if !graph.is_live(node) {
                continue;
            }
            stats.visits += 1;

            match self.reduce_node(graph, node) {
                Reduction::NoChange => {}
                Reduction::Changed => {
                    stats.changes += 1;
                    for user in graph.users(node) {
                        self.enqueue(user);
                    }
                }
                Reduction::Replace(replacement) => {
                    stats.replacements += 1;
                    self.replace(graph, node, replacement);
                }
            }
        }

        log::debug!(
            "Reduced graph: {} visits, {} changes, {} replacements",
            stats.visits,
            stats.changes,
            stats.replacements
        );
        stats
    }

    /// Run every reducer on `node`. The first replacement wins, later reducers don't see the
    /// node anymore.
    fn reduce_node(&mut self, graph: &mut Graph, node: NodeIndex) -> Reduction {
        let mut result = Reduction::NoChange;
        for reducer in self.reducers.iter_mut() {
            let reduction = reducer.reduce(graph, node);
            if let Some(replacement) = reduction.replacement() {
                log::trace!(
                    "{}: {node:?} -> {:?}",
                    reducer.reducer_name(),
                    replacement.value
                );
                return reduction;
            }
            if reduction.changed() {
                result = Reduction::Changed;
            }
        }
        result
    }

    fn replace(&mut self, graph: &mut Graph, node: NodeIndex, replacement: Replacement) {
        let users = graph.users(node);
        graph.replace_uses(
            node,
            replacement.value,
            replacement.effect,
            replacement.control,
        );
        graph.kill(node);

        // The value may be a node created by the reducer.
        self.enqueue(replacement.value);
        for user in users {
            self.enqueue(user);
        }
    }

    fn enqueue(&mut self, node: NodeIndex) {
        if self.queued.insert(node) {
            self.worklist.push_back(node);
        }
    }
}

/// All nodes reachable from `End` through inputs, every node listed after its inputs. Graphs
/// without an `End` node are traversed from every node.
fn post_order(graph: &Graph) -> Vec<NodeIndex> {
    let roots = match graph.end() {
        Some(end) => vec![end],
        None => graph.node_ids(),
    };

    let mut order = Vec::new();
    let mut visited = HashSet::new();
    for root in roots {
        if !visited.insert(root) {
            continue;
        }
        // (node, index of the next input to visit)
        let mut stack = vec![(root, 0)];
        while let Some((node, next)) = stack.last_mut() {
            let node = *node;
            match graph.inputs(node).get(*next).copied() {
                Some(input) => {
                    *next += 1;
                    if visited.insert(input) {
                        stack.push((input, 0));
                    }
                }
                None => {
                    order.push(node);
                    stack.pop();
                }
            }
        }
    }
    order
}
