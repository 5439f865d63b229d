use std::rc::Rc;

use hashbrown::HashSet;
use loadelim_ir::{ElementAccess, FieldAccess, Graph, NodeIndex, Operator, Properties, Type};

use crate::{
    AbstractState, LoadEliminationConfig, NodeStates, Reducer, Reduction, Replacement,
    type_guard::TypeGuards,
};

/// Removes loads whose value is already known along the effect chain.
///
/// The reducer remembers, for every effectful node, which (object, field) and
/// (object, index) locations hold which value right after that node. Stores record the stored
/// value and forget everything they may overwrite, loads either hit and get replaced or become
/// the known value for later loads, effect-phis keep what all their inputs agree on.
///
/// Knowledge only flows forward from the `Start` node, so a node is only reduced once its effect
/// predecessor has a state. Users of nodes whose state changed have to be revisited, which
/// [`GraphReducer`](crate::GraphReducer) takes care of.
#[derive(Debug)]
pub struct LoadElimination {
    config: LoadEliminationConfig,
    empty_state: Rc<AbstractState>,
    node_states: NodeStates,
    guards: TypeGuards,
}

impl LoadElimination {
    pub fn new(config: LoadEliminationConfig) -> Self {
        let empty_state = Rc::new(AbstractState::empty(config.limits()));
        Self {
            config,
            empty_state,
            node_states: NodeStates::default(),
            guards: TypeGuards::default(),
        }
    }

    pub fn config(&self) -> &LoadEliminationConfig {
        &self.config
    }

    /// The state known right after `node`, if it was reduced already.
    pub fn state(&self, node: NodeIndex) -> Option<&AbstractState> {
        self.node_states.get(node).map(|state| state.as_ref())
    }

    fn reduce_load_field(
        &mut self,
        graph: &mut Graph,
        node: NodeIndex,
        access: FieldAccess,
    ) -> Reduction {
        let object = graph.value_input(node, 0);
        let effect = graph.effect_input(node, 0);
        let control = graph.control_input(node, 0);
        let Some(state) = self.node_states.get(effect).cloned() else {
            return Reduction::NoChange;
        };

        if let Some(known) = state.lookup_field(object, &access).copied()
            && known.value != node
            && let Some(value) = self.reconcile(graph, known.value, known.ty, access.ty, control)
        {
            self.node_states.set(node, state);
            log::trace!("Replacing {node:?} ({access}) with {value:?}");
            return Reduction::Replace(Replacement::new(value, effect, control));
        }

        let state = state.add_field(object, &access, node, access.ty);
        self.update_state(node, Rc::new(state))
    }

    fn reduce_store_field(&mut self, graph: &Graph, node: NodeIndex, access: FieldAccess) -> Reduction {
        let object = graph.value_input(node, 0);
        let value = graph.value_input(node, 1);
        let effect = graph.effect_input(node, 0);
        let Some(state) = self.node_states.get(effect) else {
            return Reduction::NoChange;
        };

        let state = state
            .kill_field(object, &access)
            .add_field(object, &access, value, graph.ty(value));
        self.update_state(node, Rc::new(state))
    }

    fn reduce_load_element(
        &mut self,
        graph: &mut Graph,
        node: NodeIndex,
        access: ElementAccess,
    ) -> Reduction {
        let object = graph.value_input(node, 0);
        let index = graph.value_input(node, 1);
        let effect = graph.effect_input(node, 0);
        let control = graph.control_input(node, 0);
        let Some(state) = self.node_states.get(effect).cloned() else {
            return Reduction::NoChange;
        };

        if let Some(known) = state.lookup_element(object, index, &access).copied()
            && known.value != node
            && let Some(value) = self.reconcile(graph, known.value, known.ty, access.ty, control)
        {
            self.node_states.set(node, state);
            log::trace!("Replacing {node:?} (element {index:?}) with {value:?}");
            return Reduction::Replace(Replacement::new(value, effect, control));
        }

        let state = state.add_element(object, index, &access, node, access.ty);
        self.update_state(node, Rc::new(state))
    }

    fn reduce_store_element(
        &mut self,
        graph: &Graph,
        node: NodeIndex,
        access: ElementAccess,
    ) -> Reduction {
        let object = graph.value_input(node, 0);
        let index = graph.value_input(node, 1);
        let value = graph.value_input(node, 2);
        let effect = graph.effect_input(node, 0);
        let Some(state) = self.node_states.get(effect) else {
            return Reduction::NoChange;
        };

        let state = state
            .kill_element(graph, object, index, &access)
            .add_element(object, index, &access, value, graph.ty(value));
        self.update_state(node, Rc::new(state))
    }

    fn reduce_effect_phi(&mut self, graph: &Graph, node: NodeIndex, count: usize) -> Reduction {
        let control = graph.control_input(node, 0);
        if matches!(graph.op(control), Operator::Loop(_)) {
            let Some(entry) = self.node_states.get(graph.effect_input(node, 0)).cloned() else {
                return Reduction::NoChange;
            };
            let state = self.compute_loop_state(graph, node, count, entry);
            return self.update_state(node, state);
        }

        let mut states = Vec::with_capacity(count);
        for index in 0..count {
            match self.node_states.get(graph.effect_input(node, index)) {
                Some(state) => states.push(state.clone()),
                None => return Reduction::NoChange,
            }
        }
        self.update_state(node, Rc::new(AbstractState::merge(&states)))
    }

    /// Start from the state entering the loop and forget everything the loop body may write, by
    /// walking the back edges up to `phi`.
    fn compute_loop_state(
        &self,
        graph: &Graph,
        phi: NodeIndex,
        count: usize,
        entry: Rc<AbstractState>,
    ) -> Rc<AbstractState> {
        let mut state = entry;
        let mut visited = HashSet::new();
        visited.insert(phi);
        let mut queue = (1..count)
            .map(|index| graph.effect_input(phi, index))
            .collect::<Vec<_>>();

        while let Some(current) = queue.pop() {
            if !visited.insert(current) {
                continue;
            }
            let op = graph.op(current);
            match op {
                Operator::StoreField(access) => {
                    let object = graph.value_input(current, 0);
                    state = Rc::new(state.kill_field(object, &access));
                }
                Operator::StoreElement(access) => {
                    let object = graph.value_input(current, 0);
                    let index = graph.value_input(current, 1);
                    state = Rc::new(state.kill_element(graph, object, index, &access));
                }
                Operator::LoadField(_) | Operator::LoadElement(_) | Operator::EffectPhi(_) => {}
                op if op.effect_input_count() > 0 && self.passes_through(&op) => {}
                _ => {
                    log::trace!("{op} at {current:?} may write, {phi:?} starts empty");
                    return self.empty_state.clone();
                }
            }
            queue.extend((0..op.effect_input_count()).map(|index| graph.effect_input(current, index)));
        }

        state
    }

    fn reduce_other_node(&mut self, graph: &Graph, node: NodeIndex) -> Reduction {
        let op = graph.op(node);
        if op.effect_input_count() != 1 {
            return Reduction::NoChange;
        }
        let Some(state) = self.node_states.get(graph.effect_input(node, 0)) else {
            return Reduction::NoChange;
        };

        let state = if self.passes_through(&op) {
            state.clone()
        } else {
            self.empty_state.clone()
        };
        self.update_state(node, state)
    }

    fn passes_through(&self, op: &Operator) -> bool {
        self.config.trust_no_write && op.properties().contains(Properties::NO_WRITE)
    }

    /// The value replacing a load of type `expected`, or `None` if the known value can't be used.
    fn reconcile(
        &mut self,
        graph: &mut Graph,
        value: NodeIndex,
        proven: Type,
        expected: Type,
        control: NodeIndex,
    ) -> Option<NodeIndex> {
        if !proven.is(expected) && !self.config.guard_type_mismatch {
            return None;
        }
        Some(self.guards.reconcile(graph, value, proven, expected, control))
    }

    fn update_state(&mut self, node: NodeIndex, state: Rc<AbstractState>) -> Reduction {
        let (fields, elements) = (state.field_count(), state.element_count());
        if self.node_states.set(node, state) {
            log::trace!("State after {node:?}: {fields} fields, {elements} elements");
            Reduction::Changed
        } else {
            Reduction::NoChange
        }
    }
}

impl Reducer for LoadElimination {
    fn reducer_name(&self) -> &'static str {
        "LoadElimination"
    }

    fn reduce(&mut self, graph: &mut Graph, node: NodeIndex) -> Reduction {
        match graph.op(node) {
            Operator::Start => self.update_state(node, self.empty_state.clone()),
            Operator::LoadField(access) => self.reduce_load_field(graph, node, access),
            Operator::StoreField(access) => self.reduce_store_field(graph, node, access),
            Operator::LoadElement(access) => self.reduce_load_element(graph, node, access),
            Operator::StoreElement(access) => self.reduce_store_element(graph, node, access),
            Operator::EffectPhi(count) => self.reduce_effect_phi(graph, node, count as usize),
            op if op.is_effectful() => self.reduce_other_node(graph, node),
            _ => Reduction::NoChange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadelim_ir::AccessBuilder;
    use pretty_assertions::assert_eq;

    fn reducer() -> LoadElimination {
        LoadElimination::new(LoadEliminationConfig::default())
    }

    #[test_log::test]
    fn start_is_changed_once() {
        let mut graph = Graph::new();
        let start = graph.start();
        let mut load_elim = reducer();

        assert_eq!(load_elim.reduce(&mut graph, start), Reduction::Changed);
        assert_eq!(load_elim.reduce(&mut graph, start), Reduction::NoChange);
        assert!(load_elim.state(start).is_some_and(|state| state.is_empty()));
    }

    #[test_log::test]
    fn nodes_wait_for_their_predecessor() {
        let mut graph = Graph::new();
        let start = graph.start();
        let object = graph.parameter(0, Type::ANY);
        let load = graph.load_field(AccessBuilder::for_map(), object, start, start);
        let mut load_elim = reducer();

        assert_eq!(load_elim.reduce(&mut graph, load), Reduction::NoChange);
        assert!(load_elim.state(load).is_none());

        load_elim.reduce(&mut graph, start);
        assert_eq!(load_elim.reduce(&mut graph, load), Reduction::Changed);
        assert_eq!(load_elim.reduce(&mut graph, load), Reduction::NoChange);
    }

    #[test_log::test]
    fn value_nodes_are_ignored() {
        let mut graph = Graph::new();
        let object = graph.parameter(0, Type::ANY);
        let mut load_elim = reducer();

        assert_eq!(load_elim.reduce(&mut graph, object), Reduction::NoChange);
        assert!(load_elim.state(object).is_none());
    }

    #[test_log::test]
    fn effect_phi_waits_for_all_inputs() {
        let mut graph = Graph::new();
        let start = graph.start();
        let object = graph.parameter(0, Type::ANY);
        let value = graph.parameter(1, Type::ANY);
        let access = AccessBuilder::for_map();
        let store = graph.store_field(access, object, value, start, start);
        let merge = graph.merge(&[start, start]);
        let phi = graph.effect_phi(&[store, start], merge);
        let mut load_elim = reducer();

        load_elim.reduce(&mut graph, start);
        assert_eq!(load_elim.reduce(&mut graph, phi), Reduction::NoChange);
        load_elim.reduce(&mut graph, store);
        assert_eq!(load_elim.reduce(&mut graph, phi), Reduction::Changed);
        assert!(load_elim.state(phi).is_some_and(|state| state.is_empty()));
    }

    #[test_log::test]
    fn loop_keeps_what_the_body_does_not_write() {
        let mut graph = Graph::new();
        let start = graph.start();
        let object = graph.parameter(0, Type::ANY);
        let value = graph.parameter(1, Type::INTERNAL);
        let map = AccessBuilder::for_map();
        let length = AccessBuilder::for_fixed_array_length();

        let store_map = graph.store_field(map, object, value, start, start);
        let store_length = graph.store_field(length, object, value, store_map, start);
        let header = graph.loop_header(&[start, start]);
        let phi = graph.effect_phi(&[store_length, store_length], header);
        let load = graph.load_field(map, object, phi, header);
        let checkpoint = graph.checkpoint(load, header);
        let body_store = graph.store_field(length, object, load, checkpoint, header);
        graph.replace_input(phi, 1, body_store);

        let mut load_elim = reducer();
        for node in [start, store_map, store_length, phi] {
            load_elim.reduce(&mut graph, node);
        }

        let state = load_elim.state(phi).cloned().unwrap();
        assert_eq!(state.lookup_field(object, &map).map(|it| it.value), Some(value));
        assert!(state.lookup_field(object, &length).is_none());
        assert_eq!(
            load_elim.reduce(&mut graph, load),
            Reduction::Replace(Replacement::new(value, phi, header))
        );
    }

    #[test_log::test]
    fn loop_with_call_starts_empty() {
        let mut graph = Graph::new();
        let start = graph.start();
        let object = graph.parameter(0, Type::ANY);
        let value = graph.parameter(1, Type::ANY);
        let map = AccessBuilder::for_map();

        let store = graph.store_field(map, object, value, start, start);
        let header = graph.loop_header(&[start, start]);
        let phi = graph.effect_phi(&[store, store], header);
        let call = graph.call(Properties::empty(), &[], phi, header);
        graph.replace_input(phi, 1, call);

        let mut load_elim = reducer();
        for node in [start, store, phi] {
            load_elim.reduce(&mut graph, node);
        }
        assert!(load_elim.state(phi).is_some_and(|state| state.is_empty()));
    }

    #[test_log::test]
    fn untrusted_no_write_resets() {
        let mut graph = Graph::new();
        let start = graph.start();
        let object = graph.parameter(0, Type::ANY);
        let value = graph.parameter(1, Type::ANY);
        let store = graph.store_field(AccessBuilder::for_map(), object, value, start, start);
        let checkpoint = graph.checkpoint(store, start);

        let mut trusting = reducer();
        let mut wary = LoadElimination::new(LoadEliminationConfig {
            trust_no_write: false,
            ..Default::default()
        });
        for load_elim in [&mut trusting, &mut wary] {
            for node in [start, store, checkpoint] {
                load_elim.reduce(&mut graph, node);
            }
        }

        assert!(!wary.config().trust_no_write);
        assert_eq!(trusting.state(checkpoint), trusting.state(store));
        assert!(wary.state(checkpoint).is_some_and(|state| state.is_empty()));
    }
}
