use hashbrown::HashMap;
use loadelim_ir::{Graph, NodeIndex, Operator, Type};

/// Type guards created while reconciling known values with narrower access types, keyed by
/// (value, control, guarded type).
#[derive(Debug, Default)]
pub struct TypeGuards {
    guards: HashMap<(NodeIndex, NodeIndex, Type), NodeIndex>,
}

impl TypeGuards {
    /// Returns `value` if its proven type already fits `expected`, or a guard narrowing it
    /// otherwise. The same guard node is returned for repeated requests.
    pub fn reconcile(
        &mut self,
        graph: &mut Graph,
        value: NodeIndex,
        proven: Type,
        expected: Type,
        control: NodeIndex,
    ) -> NodeIndex {
        if proven.is(expected) {
            return value;
        }

        let key = (value, control, expected);
        if let Some(guard) = self.guards.get(&key).copied()
            && is_guard_of(graph, guard, value, control, expected)
        {
            return guard;
        }

        let guard = graph.type_guard(expected, value, control);
        log::trace!("Guarding {value:?}: {proven} is not {expected}, created {guard:?}");
        self.guards.insert(key, guard);
        guard
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

/// Whether `guard` is still the node created for the key. Indices of removed nodes are reused
/// by the graph, so liveness alone isn't enough.
fn is_guard_of(
    graph: &Graph,
    guard: NodeIndex,
    value: NodeIndex,
    control: NodeIndex,
    expected: Type,
) -> bool {
    graph.is_live(guard)
        && graph.op(guard) == Operator::TypeGuard(expected)
        && graph.inputs(guard) == [value, control]
}
