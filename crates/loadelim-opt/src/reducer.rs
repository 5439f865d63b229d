use loadelim_ir::{Graph, NodeIndex};

/// The nodes that take over the uses of a reduced node, split by edge kind.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replacement {
    pub value: NodeIndex,
    pub effect: NodeIndex,
    pub control: NodeIndex,
}

/// The outcome of reducing a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Nothing was learned or changed.
    NoChange,
    /// The node is redundant and should be replaced.
    Replace(Replacement),
    /// The node stays, but something derived from it changed, so its users must be revisited.
    Changed,
}

impl Reduction {
    pub fn changed(&self) -> bool {
        !matches!(self, Reduction::NoChange)
    }

    pub fn replacement(&self) -> Option<Replacement> {
        match self {
            Reduction::Replace(replacement) => Some(*replacement),
            _ => None,
        }
    }
}

/// A local rewrite that looks at one node at a time. Reducers are driven by a
/// [`GraphReducer`](crate::GraphReducer), which revisits users of changed nodes until nothing
/// changes anymore.
pub trait Reducer {
    /// Name used in log output.
    fn reducer_name(&self) -> &'static str;

    /// Reduce `node`. The reducer may add new nodes to the graph, but rewiring uses of `node` is
    /// left to the driver.
    fn reduce(&mut self, graph: &mut Graph, node: NodeIndex) -> Reduction;
}
