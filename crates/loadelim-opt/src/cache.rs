use std::rc::Rc;

use hashbrown::HashMap;
use loadelim_ir::NodeIndex;

use crate::AbstractState;

/// The abstract state valid right after each effect-producing node. Entries are created the first
/// time a node is reduced and replaced on every revisit.
#[derive(Debug, Default, Clone)]
pub struct NodeStates {
    states: HashMap<NodeIndex, Rc<AbstractState>>,
}

impl NodeStates {
    pub fn get(&self, node: NodeIndex) -> Option<&Rc<AbstractState>> {
        self.states.get(&node)
    }

    /// Associate `state` with `node`. Returns whether the cached state actually changed.
    pub fn set(&mut self, node: NodeIndex, state: Rc<AbstractState>) -> bool {
        match self.states.get_mut(&node) {
            Some(current) if Rc::ptr_eq(current, &state) || **current == *state => false,
            Some(current) => {
                *current = state;
                true
            }
            None => {
                self.states.insert(node, state);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
