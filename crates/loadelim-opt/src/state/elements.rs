use std::collections::VecDeque;

use loadelim_ir::{ElementAccess, Graph, NodeIndex, Type};

use crate::alias::{Aliasing, query_index_alias, query_object_alias, same_element_layout};

/// A known element value.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub object: NodeIndex,
    pub index: NodeIndex,
    pub value: NodeIndex,
    /// The type the value is proven to have.
    pub ty: Type,
    pub access: ElementAccess,
}

/// A bounded list of known element values. Once full, the oldest entry is evicted.
#[derive(Debug, Clone, Default)]
pub struct AbstractElements {
    elements: VecDeque<Element>,
}

impl PartialEq for AbstractElements {
    /// Order of insertion doesn't matter, only the set of known elements.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|it| other.elements.contains(it))
    }
}

impl Eq for AbstractElements {}

impl AbstractElements {
    pub fn lookup(
        &self,
        object: NodeIndex,
        index: NodeIndex,
        access: &ElementAccess,
    ) -> Option<&Element> {
        let representation = access.machine_type.representation;
        self.elements.iter().find(|element| {
            element.object == object
                && element.index == index
                && element.access.header_size == access.header_size
                && element
                    .access
                    .machine_type
                    .representation
                    .is_compatible(representation)
        })
    }

    /// A copy with `element` added, replacing any entry for the same object and index.
    pub fn extend(&self, element: Element, max_elements: usize) -> Self {
        let mut elements = self
            .elements
            .iter()
            .filter(|it| it.object != element.object || it.index != element.index)
            .copied()
            .collect::<VecDeque<_>>();
        elements.push_back(element);
        while elements.len() > max_elements {
            elements.pop_front();
        }
        Self { elements }
    }

    /// A copy without the elements a store of `access` at `object[index]` may overwrite.
    pub fn kill(
        &self,
        graph: &Graph,
        object: NodeIndex,
        index: NodeIndex,
        access: &ElementAccess,
    ) -> Self {
        let elements = self
            .elements
            .iter()
            .filter(|element| {
                query_object_alias(element.object, object) == Aliasing::NoAlias
                    || (same_element_layout(&element.access, access)
                        && query_index_alias(graph, element.index, index) == Aliasing::NoAlias)
            })
            .copied()
            .collect();
        Self { elements }
    }

    /// Elements known with the same value and a compatible layout in both lists, in the order of
    /// `self`.
    pub fn merge(&self, other: &AbstractElements) -> Self {
        let elements = self
            .elements
            .iter()
            .filter_map(|element| {
                let representation = element.access.machine_type.representation;
                let other = other.elements.iter().find(|it| {
                    it.object == element.object
                        && it.index == element.index
                        && it.value == element.value
                        && same_element_layout(&it.access, &element.access)
                        && it
                            .access
                            .machine_type
                            .representation
                            .is_compatible(representation)
                })?;
                Some(Element {
                    ty: element.ty.union(other.ty),
                    ..*element
                })
            })
            .collect();
        Self { elements }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }
}
