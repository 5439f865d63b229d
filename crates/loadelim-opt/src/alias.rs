use core::ops::Range;

use loadelim_ir::{ElementAccess, Graph, NodeIndex};

/// The result of an alias query between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aliasing {
    /// The nodes never refer to the same location.
    NoAlias,
    /// The nodes may or may not refer to the same location.
    MayAlias,
    /// The nodes always refer to the same location.
    MustAlias,
}

/// Alias query for two object-producing nodes. Only node identity is considered, so distinct
/// nodes may always alias.
pub fn query_object_alias(a: NodeIndex, b: NodeIndex) -> Aliasing {
    if a == b {
        Aliasing::MustAlias
    } else {
        Aliasing::MayAlias
    }
}

/// Alias query for two index nodes. Distinct integer constants never alias.
pub fn query_index_alias(graph: &Graph, a: NodeIndex, b: NodeIndex) -> Aliasing {
    if a == b {
        return Aliasing::MustAlias;
    }
    match (graph.int32_value(a), graph.int32_value(b)) {
        (Some(lhs), Some(rhs)) if lhs == rhs => Aliasing::MustAlias,
        (Some(_), Some(_)) => Aliasing::NoAlias,
        _ => Aliasing::MayAlias,
    }
}

/// Whether two byte ranges share at least one byte.
pub fn ranges_overlap(lhs: &Range<u32>, rhs: &Range<u32>) -> bool {
    lhs.start < rhs.end && rhs.start < lhs.end
}

/// Whether elements at two distinct indices are guaranteed to be disjoint, which only holds when
/// both accesses share the element layout.
pub fn same_element_layout(lhs: &ElementAccess, rhs: &ElementAccess) -> bool {
    lhs.base == rhs.base
        && lhs.header_size == rhs.header_size
        && lhs.machine_type.size() == rhs.machine_type.size()
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadelim_ir::{AccessBuilder, MachineType, Type};

    #[test]
    fn distinct_constants_never_alias() {
        let mut graph = Graph::new();
        let zero = graph.int32_constant(0);
        let one = graph.int32_constant(1);
        let other_zero = graph.int32_constant(0);
        let index = graph.parameter(0, Type::UNSIGNED_SMALL);

        assert_eq!(query_index_alias(&graph, zero, one), Aliasing::NoAlias);
        assert_eq!(query_index_alias(&graph, zero, other_zero), Aliasing::MustAlias);
        assert_eq!(query_index_alias(&graph, zero, index), Aliasing::MayAlias);
        assert_eq!(query_index_alias(&graph, index, index), Aliasing::MustAlias);
    }

    #[test]
    fn distinct_objects_may_alias() {
        let mut graph = Graph::new();
        let a = graph.parameter(0, Type::ANY);
        let b = graph.parameter(1, Type::ANY);
        assert_eq!(query_object_alias(a, b), Aliasing::MayAlias);
        assert_eq!(query_object_alias(a, a), Aliasing::MustAlias);
    }

    #[test]
    fn overlapping_byte_ranges() {
        let map = AccessBuilder::for_map();
        let mut half = map;
        half.offset = 4;
        half.machine_type = MachineType::int32();
        let length = AccessBuilder::for_fixed_array_length();

        assert!(ranges_overlap(&half.byte_range(), &map.byte_range()));
        assert!(!ranges_overlap(&length.byte_range(), &map.byte_range()));
        assert!(!same_element_layout(
            &AccessBuilder::for_fixed_array_element(),
            &{
                let mut narrow = AccessBuilder::for_fixed_array_element();
                narrow.machine_type = MachineType::int32();
                narrow
            }
        ));
    }
}
