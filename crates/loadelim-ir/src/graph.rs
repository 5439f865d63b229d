use core::ops::Deref;

use petgraph::{
    Direction,
    dot::{Config, Dot},
    prelude::StableDiGraph,
    visit::EdgeRef,
};
use smallvec::SmallVec;

use crate::{ElementAccess, FieldAccess, NodeIndex, Operator, Properties, Type};

/// A single operation in the graph together with its ordered inputs.
#[derive(Debug, Clone)]
pub struct Node {
    pub op: Operator,
    pub inputs: SmallVec<[NodeIndex; 4]>,
    /// The static type of the value produced by this node.
    pub ty: Type,
}

/// A use of a node as the `slot`-th input of `user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: NodeIndex,
    pub slot: u32,
}

/// The kind of dependency an input slot represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Value,
    Effect,
    Control,
}

/// A sea-of-nodes graph. Nodes are kept in a [`StableDiGraph`] so indices stay valid when other
/// nodes are removed. Every input of a node is mirrored by an edge from the input to the user,
/// weighted with the input slot, so uses can be found without scanning the graph.
#[derive(Debug, Clone)]
pub struct Graph {
    graph: StableDiGraph<Node, u32>,
    start: NodeIndex,
    end: Option<NodeIndex>,
}

impl Deref for Graph {
    type Target = StableDiGraph<Node, u32>;

    fn deref(&self) -> &Self::Target {
        &self.graph
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Create a new graph containing only the `Start` node.
    pub fn new() -> Self {
        let mut graph = StableDiGraph::default();
        let start = graph.add_node(Node {
            op: Operator::Start,
            inputs: SmallVec::new(),
            ty: Type::NONE,
        });
        Self {
            graph,
            start,
            end: None,
        }
    }

    pub fn start(&self) -> NodeIndex {
        self.start
    }

    pub fn end(&self) -> Option<NodeIndex> {
        self.end
    }

    /// Add a node with the given operator and inputs.
    ///
    /// # Panics
    /// If the number of inputs doesn't match the operator.
    #[track_caller]
    pub fn add_node(&mut self, op: Operator, inputs: &[NodeIndex]) -> NodeIndex {
        assert_eq!(
            inputs.len(),
            op.input_count(),
            "{op} expects {} inputs",
            op.input_count()
        );
        let node = self.graph.add_node(Node {
            op,
            inputs: SmallVec::from_slice(inputs),
            ty: default_type(&op),
        });
        for (slot, input) in inputs.iter().enumerate() {
            self.graph.add_edge(*input, node, slot as u32);
        }
        if matches!(op, Operator::End(_)) {
            self.end = Some(node);
        }
        node
    }

    /// A set of node indices for all live nodes in the graph
    pub fn node_ids(&self) -> Vec<NodeIndex> {
        self.graph.node_indices().collect()
    }

    #[track_caller]
    pub fn node(&self, node: NodeIndex) -> &Node {
        &self.graph[node]
    }

    #[track_caller]
    pub fn op(&self, node: NodeIndex) -> Operator {
        self.graph[node].op
    }

    #[track_caller]
    pub fn ty(&self, node: NodeIndex) -> Type {
        self.graph[node].ty
    }

    #[track_caller]
    pub fn set_type(&mut self, node: NodeIndex, ty: Type) {
        self.graph[node].ty = ty;
    }

    #[track_caller]
    pub fn inputs(&self, node: NodeIndex) -> &[NodeIndex] {
        &self.graph[node].inputs
    }

    /// The `index`-th value input of `node`.
    #[track_caller]
    pub fn value_input(&self, node: NodeIndex, index: usize) -> NodeIndex {
        let op = self.op(node);
        assert!(index < op.value_input_count(), "{op} has no value input {index}");
        self.inputs(node)[index]
    }

    /// The `index`-th effect input of `node`.
    #[track_caller]
    pub fn effect_input(&self, node: NodeIndex, index: usize) -> NodeIndex {
        let op = self.op(node);
        assert!(index < op.effect_input_count(), "{op} has no effect input {index}");
        self.inputs(node)[op.value_input_count() + index]
    }

    /// The `index`-th control input of `node`.
    #[track_caller]
    pub fn control_input(&self, node: NodeIndex, index: usize) -> NodeIndex {
        let op = self.op(node);
        assert!(index < op.control_input_count(), "{op} has no control input {index}");
        self.inputs(node)[op.value_input_count() + op.effect_input_count() + index]
    }

    /// The kind of dependency carried by input `slot` of `node`.
    pub fn edge_kind(&self, node: NodeIndex, slot: u32) -> EdgeKind {
        let op = self.op(node);
        let slot = slot as usize;
        if slot < op.value_input_count() {
            EdgeKind::Value
        } else if slot < op.value_input_count() + op.effect_input_count() {
            EdgeKind::Effect
        } else {
            EdgeKind::Control
        }
    }

    /// All uses of `node`, in no particular order.
    pub fn uses(&self, node: NodeIndex) -> Vec<Use> {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| Use {
                user: edge.target(),
                slot: *edge.weight(),
            })
            .collect()
    }

    /// The distinct users of `node`.
    pub fn users(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut users = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect::<Vec<_>>();
        users.sort();
        users.dedup();
        users
    }

    /// Replace input `slot` of `user` with `input`.
    #[track_caller]
    pub fn replace_input(&mut self, user: NodeIndex, slot: u32, input: NodeIndex) {
        let old = self.graph[user].inputs[slot as usize];
        if old == input {
            return;
        }
        let edge = self
            .graph
            .edges_directed(user, Direction::Incoming)
            .find(|edge| edge.source() == old && *edge.weight() == slot)
            .map(|edge| edge.id())
            .expect("Every input should be mirrored by an edge");
        self.graph.remove_edge(edge);
        self.graph.add_edge(input, user, slot);
        self.graph[user].inputs[slot as usize] = input;
    }

    /// Redirect every use of `node` depending on the kind of edge: value uses to `value`, effect
    /// uses to `effect` and control uses to `control`.
    pub fn replace_uses(
        &mut self,
        node: NodeIndex,
        value: NodeIndex,
        effect: NodeIndex,
        control: NodeIndex,
    ) {
        for Use { user, slot } in self.uses(node) {
            let replacement = match self.edge_kind(user, slot) {
                EdgeKind::Value => value,
                EdgeKind::Effect => effect,
                EdgeKind::Control => control,
            };
            self.replace_input(user, slot, replacement);
        }
    }

    /// Remove a node that is no longer used.
    ///
    /// # Panics
    /// If the node still has uses.
    #[track_caller]
    pub fn kill(&mut self, node: NodeIndex) {
        assert!(
            self.uses(node).is_empty(),
            "Can't kill {} while it is still used",
            self.op(node)
        );
        self.graph.remove_node(node);
        if self.end == Some(node) {
            self.end = None;
        }
    }

    pub fn is_live(&self, node: NodeIndex) -> bool {
        self.graph.contains_node(node)
    }

    /// The value of `node` if it is an integer constant.
    pub fn int32_value(&self, node: NodeIndex) -> Option<i32> {
        match self.op(node) {
            Operator::Int32Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn dot_viz(&self) -> Dot<'_, &StableDiGraph<Node, u32>> {
        Dot::with_config(&self.graph, &[Config::EdgeNoLabel])
    }
}

/// Typed constructors for the operators in the graph.
impl Graph {
    pub fn parameter(&mut self, index: u32, ty: Type) -> NodeIndex {
        let node = self.add_node(Operator::Parameter(index), &[self.start]);
        self.set_type(node, ty);
        node
    }

    pub fn int32_constant(&mut self, value: i32) -> NodeIndex {
        self.add_node(Operator::Int32Constant(value), &[])
    }

    pub fn branch(&mut self, cond: NodeIndex, control: NodeIndex) -> NodeIndex {
        self.add_node(Operator::Branch, &[cond, control])
    }

    pub fn if_true(&mut self, branch: NodeIndex) -> NodeIndex {
        self.add_node(Operator::IfTrue, &[branch])
    }

    pub fn if_false(&mut self, branch: NodeIndex) -> NodeIndex {
        self.add_node(Operator::IfFalse, &[branch])
    }

    pub fn merge(&mut self, controls: &[NodeIndex]) -> NodeIndex {
        self.add_node(Operator::Merge(controls.len() as u32), controls)
    }

    /// A loop header. Back edges are usually not built yet, so callers pass placeholders and patch
    /// them later with [`Graph::replace_input`].
    pub fn loop_header(&mut self, controls: &[NodeIndex]) -> NodeIndex {
        self.add_node(Operator::Loop(controls.len() as u32), controls)
    }

    pub fn effect_phi(&mut self, effects: &[NodeIndex], control: NodeIndex) -> NodeIndex {
        let mut inputs = SmallVec::<[NodeIndex; 4]>::from_slice(effects);
        inputs.push(control);
        self.add_node(Operator::EffectPhi(effects.len() as u32), &inputs)
    }

    pub fn checkpoint(&mut self, effect: NodeIndex, control: NodeIndex) -> NodeIndex {
        self.add_node(Operator::Checkpoint, &[effect, control])
    }

    pub fn call(
        &mut self,
        properties: Properties,
        args: &[NodeIndex],
        effect: NodeIndex,
        control: NodeIndex,
    ) -> NodeIndex {
        let mut inputs = SmallVec::<[NodeIndex; 4]>::from_slice(args);
        inputs.push(effect);
        inputs.push(control);
        let op = Operator::Call {
            properties,
            value_inputs: args.len() as u32,
        };
        self.add_node(op, &inputs)
    }

    pub fn allocate(&mut self, size: NodeIndex, effect: NodeIndex, control: NodeIndex) -> NodeIndex {
        self.add_node(Operator::Allocate, &[size, effect, control])
    }

    pub fn load_field(
        &mut self,
        access: FieldAccess,
        object: NodeIndex,
        effect: NodeIndex,
        control: NodeIndex,
    ) -> NodeIndex {
        self.add_node(Operator::LoadField(access), &[object, effect, control])
    }

    pub fn store_field(
        &mut self,
        access: FieldAccess,
        object: NodeIndex,
        value: NodeIndex,
        effect: NodeIndex,
        control: NodeIndex,
    ) -> NodeIndex {
        self.add_node(
            Operator::StoreField(access),
            &[object, value, effect, control],
        )
    }

    pub fn load_element(
        &mut self,
        access: ElementAccess,
        object: NodeIndex,
        index: NodeIndex,
        effect: NodeIndex,
        control: NodeIndex,
    ) -> NodeIndex {
        self.add_node(
            Operator::LoadElement(access),
            &[object, index, effect, control],
        )
    }

    pub fn store_element(
        &mut self,
        access: ElementAccess,
        object: NodeIndex,
        index: NodeIndex,
        value: NodeIndex,
        effect: NodeIndex,
        control: NodeIndex,
    ) -> NodeIndex {
        self.add_node(
            Operator::StoreElement(access),
            &[object, index, value, effect, control],
        )
    }

    pub fn type_guard(&mut self, ty: Type, value: NodeIndex, control: NodeIndex) -> NodeIndex {
        let node = self.add_node(Operator::TypeGuard(ty), &[value, control]);
        self.set_type(node, self.ty(value).intersect(ty));
        node
    }

    pub fn ret(&mut self, value: NodeIndex, effect: NodeIndex, control: NodeIndex) -> NodeIndex {
        self.add_node(Operator::Return, &[value, effect, control])
    }

    /// Close the graph with an `End` node joining `controls`.
    pub fn finish(&mut self, controls: &[NodeIndex]) -> NodeIndex {
        self.add_node(Operator::End(controls.len() as u32), controls)
    }
}

fn default_type(op: &Operator) -> Type {
    match op {
        Operator::Int32Constant(value) => Type::constant(*value as i64),
        Operator::LoadField(access) => access.ty,
        Operator::LoadElement(access) => access.ty,
        Operator::TypeGuard(ty) => *ty,
        op if op.value_output_count() > 0 => Type::ANY,
        _ => Type::NONE,
    }
}
