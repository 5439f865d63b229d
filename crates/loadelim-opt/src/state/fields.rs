use hashbrown::HashMap;
use loadelim_ir::{MachineRepresentation, NodeIndex, Type};

/// What is known about one field of one object.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// The node producing the value currently stored in the field.
    pub value: NodeIndex,
    /// The type the value is proven to have.
    pub ty: Type,
    /// The representation the value was stored or loaded with.
    pub representation: MachineRepresentation,
}

/// Known values of a single field slot, keyed by the object node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbstractField {
    info_for_node: HashMap<NodeIndex, FieldInfo>,
}

impl AbstractField {
    pub fn new(object: NodeIndex, info: FieldInfo) -> Self {
        let mut info_for_node = HashMap::new();
        info_for_node.insert(object, info);
        Self { info_for_node }
    }

    pub fn lookup(&self, object: NodeIndex) -> Option<&FieldInfo> {
        self.info_for_node.get(&object)
    }

    /// A copy of this field with `object` mapped to `info`.
    pub fn extend(&self, object: NodeIndex, info: FieldInfo) -> Self {
        let mut that = self.clone();
        that.info_for_node.insert(object, info);
        that
    }

    /// A copy with only the entries whose object satisfies `keep`.
    pub fn retain(&self, keep: impl Fn(NodeIndex) -> bool) -> Self {
        let info_for_node = self
            .info_for_node
            .iter()
            .filter(|(object, _)| keep(**object))
            .map(|(object, info)| (*object, *info))
            .collect();
        Self { info_for_node }
    }

    /// Entries present with the same value in both fields. The proven type becomes the union of
    /// both, since either path may have been taken.
    pub fn merge(&self, other: &AbstractField) -> Self {
        let info_for_node = self
            .info_for_node
            .iter()
            .filter_map(|(object, info)| {
                let other = other.info_for_node.get(object)?;
                let compatible = other.value == info.value
                    && other.representation.is_compatible(info.representation);
                compatible.then(|| {
                    let ty = info.ty.union(other.ty);
                    (*object, FieldInfo { ty, ..*info })
                })
            })
            .collect();
        Self { info_for_node }
    }

    pub fn is_empty(&self) -> bool {
        self.info_for_node.is_empty()
    }

    pub fn len(&self) -> usize {
        self.info_for_node.len()
    }
}
