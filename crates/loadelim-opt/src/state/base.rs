use std::rc::Rc;

use loadelim_ir::{ElementAccess, FieldAccess, Graph, NodeIndex, POINTER_SIZE, Type};

use crate::alias::{Aliasing, query_object_alias, ranges_overlap};

use super::{AbstractElements, AbstractField, Element, FieldInfo};

/// How much an [`AbstractState`] is allowed to remember.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateLimits {
    /// Number of pointer-sized field slots that are tracked, starting at offset 0.
    pub max_fields: usize,
    /// Maximum number of element entries.
    pub max_elements: usize,
}

/// An immutable snapshot of the memory contents known along one effect path.
///
/// Every update returns a new state and leaves the receiver untouched. Field slots and the
/// element list are shared between snapshots through [`Rc`] and only copied when they change, so
/// deriving a state from its predecessor is cheap.
#[derive(Debug, Clone)]
pub struct AbstractState {
    limits: StateLimits,
    fields: Vec<Option<Rc<AbstractField>>>,
    elements: Option<Rc<AbstractElements>>,
}

impl AbstractState {
    /// A state that knows nothing.
    pub fn empty(limits: StateLimits) -> Self {
        Self {
            limits,
            fields: vec![None; limits.max_fields],
            elements: None,
        }
    }

    pub fn limits(&self) -> StateLimits {
        self.limits
    }

    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(Option::is_none) && self.elements.is_none()
    }

    /// Number of known (object, field) pairs.
    pub fn field_count(&self) -> usize {
        self.fields.iter().flatten().map(|field| field.len()).sum()
    }

    pub fn element_count(&self) -> usize {
        self.elements.as_ref().map(|it| it.len()).unwrap_or(0)
    }

    fn tracked_slot(&self, access: &FieldAccess) -> Option<usize> {
        access.slot().filter(|slot| *slot < self.fields.len())
    }

    pub fn lookup_field(&self, object: NodeIndex, access: &FieldAccess) -> Option<&FieldInfo> {
        let slot = self.tracked_slot(access)?;
        let info = self.fields[slot].as_ref()?.lookup(object)?;
        info.representation
            .is_compatible(access.machine_type.representation)
            .then_some(info)
    }

    /// A copy of this state where `object.field` is known to hold `value`. Fields outside the
    /// tracked slots are silently forgotten.
    pub fn add_field(
        &self,
        object: NodeIndex,
        access: &FieldAccess,
        value: NodeIndex,
        ty: Type,
    ) -> Self {
        let mut that = self.clone();
        if let Some(slot) = self.tracked_slot(access) {
            let info = FieldInfo::new(value, ty, access.machine_type.representation);
            let field = match &self.fields[slot] {
                Some(field) => field.extend(object, info),
                None => AbstractField::new(object, info),
            };
            that.fields[slot] = Some(Rc::new(field));
        }
        that
    }

    /// A copy of this state without the field values a store of `access` to `object` may
    /// overwrite. Element values are kept.
    pub fn kill_field(&self, object: NodeIndex, access: &FieldAccess) -> Self {
        let mut that = self.clone();
        for (slot, field) in that.fields.iter_mut().enumerate() {
            let Some(known) = field else {
                continue;
            };
            let slot_range = slot as u32 * POINTER_SIZE..(slot as u32 + 1) * POINTER_SIZE;
            if !ranges_overlap(&access.byte_range(), &slot_range) {
                continue;
            }
            let survivors = known.retain(|other| {
                query_object_alias(other, object) == Aliasing::NoAlias
            });
            *field = (!survivors.is_empty()).then(|| Rc::new(survivors));
        }
        that
    }

    pub fn lookup_element(
        &self,
        object: NodeIndex,
        index: NodeIndex,
        access: &ElementAccess,
    ) -> Option<&Element> {
        self.elements.as_ref()?.lookup(object, index, access)
    }

    /// A copy of this state where `object[index]` is known to hold `value`.
    pub fn add_element(
        &self,
        object: NodeIndex,
        index: NodeIndex,
        access: &ElementAccess,
        value: NodeIndex,
        ty: Type,
    ) -> Self {
        if self.limits.max_elements == 0 {
            return self.clone();
        }
        let element = Element::new(object, index, value, ty, *access);
        let elements = match &self.elements {
            Some(elements) => elements.extend(element, self.limits.max_elements),
            None => AbstractElements::default().extend(element, self.limits.max_elements),
        };
        Self {
            elements: Some(Rc::new(elements)),
            ..self.clone()
        }
    }

    /// A copy of this state without the element values a store of `access` to `object[index]`
    /// may overwrite. Field values are kept.
    pub fn kill_element(
        &self,
        graph: &Graph,
        object: NodeIndex,
        index: NodeIndex,
        access: &ElementAccess,
    ) -> Self {
        let Some(elements) = &self.elements else {
            return self.clone();
        };
        let survivors = elements.kill(graph, object, index, access);
        Self {
            elements: (!survivors.is_empty()).then(|| Rc::new(survivors)),
            ..self.clone()
        }
    }

    /// The knowledge common to all `states`: an entry survives only if every state knows the
    /// same value node for it.
    ///
    /// # Panics
    /// If `states` is empty.
    pub fn merge(states: &[Rc<AbstractState>]) -> AbstractState {
        let (first, rest) = states
            .split_first()
            .expect("Merging requires at least one state");
        let mut merged = AbstractState::clone(first);

        for (slot, field) in merged.fields.iter_mut().enumerate() {
            for state in rest {
                let Some(current) = field.as_ref() else {
                    break;
                };
                match state.fields.get(slot).and_then(Option::as_ref) {
                    Some(other) if Rc::ptr_eq(current, other) => {}
                    Some(other) => {
                        let intersection = current.merge(other);
                        *field = (!intersection.is_empty()).then(|| Rc::new(intersection));
                    }
                    None => *field = None,
                }
            }
        }

        for state in rest {
            let Some(current) = merged.elements.as_ref() else {
                break;
            };
            match &state.elements {
                Some(other) if Rc::ptr_eq(current, other) => {}
                Some(other) => {
                    let intersection = current.merge(other);
                    merged.elements = (!intersection.is_empty()).then(|| Rc::new(intersection));
                }
                None => merged.elements = None,
            }
        }

        merged
    }
}

fn shared_eq<T: PartialEq>(lhs: &Option<Rc<T>>, rhs: &Option<Rc<T>>) -> bool {
    match (lhs, rhs) {
        (None, None) => true,
        (Some(lhs), Some(rhs)) => Rc::ptr_eq(lhs, rhs) || **lhs == **rhs,
        _ => false,
    }
}

impl PartialEq for AbstractState {
    fn eq(&self, other: &Self) -> bool {
        let slots = self.fields.len().max(other.fields.len());
        let fields_eq = (0..slots).all(|slot| {
            let lhs = self.fields.get(slot).cloned().flatten();
            let rhs = other.fields.get(slot).cloned().flatten();
            shared_eq(&lhs, &rhs)
        });
        fields_eq && shared_eq(&self.elements, &other.elements)
    }
}

impl Eq for AbstractState {}

#[cfg(test)]
mod tests {
    use super::*;
    use loadelim_ir::{AccessBuilder, MachineType};
    use pretty_assertions::assert_eq;

    const LIMITS: StateLimits = StateLimits {
        max_fields: 32,
        max_elements: 8,
    };

    struct Fixture {
        graph: Graph,
        object: NodeIndex,
        other: NodeIndex,
        value: NodeIndex,
        index: NodeIndex,
    }

    fn fixture() -> Fixture {
        let mut graph = Graph::new();
        let object = graph.parameter(0, Type::ANY);
        let other = graph.parameter(1, Type::ANY);
        let value = graph.parameter(2, Type::ANY);
        let index = graph.parameter(3, Type::UNSIGNED_SMALL);
        Fixture {
            graph,
            object,
            other,
            value,
            index,
        }
    }

    #[test]
    fn add_does_not_mutate_the_receiver() {
        let f = fixture();
        let map = AccessBuilder::for_map();
        let empty = AbstractState::empty(LIMITS);
        let state = empty.add_field(f.object, &map, f.value, Type::ANY);

        assert!(empty.is_empty());
        assert!(empty.lookup_field(f.object, &map).is_none());
        assert_eq!(
            state.lookup_field(f.object, &map).map(|it| it.value),
            Some(f.value)
        );
        assert!(state.lookup_field(f.other, &map).is_none());
    }

    #[test]
    fn field_store_kills_every_object_at_the_offset() {
        let f = fixture();
        let map = AccessBuilder::for_map();
        let length = AccessBuilder::for_fixed_array_length();
        let state = AbstractState::empty(LIMITS)
            .add_field(f.object, &map, f.value, Type::ANY)
            .add_field(f.other, &map, f.value, Type::ANY)
            .add_field(f.object, &length, f.value, Type::ANY);

        let killed = state.kill_field(f.object, &map);

        assert!(killed.lookup_field(f.object, &map).is_none());
        assert!(killed.lookup_field(f.other, &map).is_none());
        assert!(killed.lookup_field(f.object, &length).is_some());
    }

    #[test]
    fn unaligned_store_kills_overlapping_slots() {
        let f = fixture();
        let map = AccessBuilder::for_map();
        let length = AccessBuilder::for_fixed_array_length();
        let mut straddling = map;
        straddling.offset = 4;

        let state = AbstractState::empty(LIMITS)
            .add_field(f.object, &map, f.value, Type::ANY)
            .add_field(f.object, &length, f.value, Type::ANY);
        assert_eq!(state.field_count(), 2);

        // Not tracked, but still clobbers both neighbours.
        let state = state.add_field(f.object, &straddling, f.value, Type::ANY);
        assert!(state.lookup_field(f.object, &straddling).is_none());
        let killed = state.kill_field(f.object, &straddling);
        assert!(killed.is_empty());
    }

    #[test]
    fn lookup_requires_compatible_representation() {
        let f = fixture();
        let map = AccessBuilder::for_map();
        let mut raw = map;
        raw.machine_type = MachineType::int32();
        let state = AbstractState::empty(LIMITS).add_field(f.object, &map, f.value, Type::ANY);

        assert!(state.lookup_field(f.object, &raw).is_none());
    }

    #[test]
    fn fields_beyond_the_limit_are_not_tracked() {
        let f = fixture();
        let limits = StateLimits::new(1, 8);
        let state = AbstractState::empty(limits)
            .add_field(f.object, &AccessBuilder::for_fixed_array_length(), f.value, Type::ANY);
        assert!(state.is_empty());
    }

    #[test]
    fn element_store_keeps_distinct_constant_indices() {
        let mut f = fixture();
        let zero = f.graph.int32_constant(0);
        let one = f.graph.int32_constant(1);
        let access = AccessBuilder::for_fixed_array_element();
        let state = AbstractState::empty(LIMITS)
            .add_element(f.object, zero, &access, f.value, Type::ANY)
            .add_element(f.object, f.index, &access, f.value, Type::ANY);

        let killed = state.kill_element(&f.graph, f.other, one, &access);

        assert!(killed.lookup_element(f.object, zero, &access).is_some());
        assert!(killed.lookup_element(f.object, f.index, &access).is_none());
    }

    #[test]
    fn element_store_with_other_layout_kills_everything() {
        let mut f = fixture();
        let zero = f.graph.int32_constant(0);
        let one = f.graph.int32_constant(1);
        let tagged = AccessBuilder::for_fixed_array_element();
        let mut narrow = tagged;
        narrow.machine_type = MachineType::int32();
        let state =
            AbstractState::empty(LIMITS).add_element(f.object, zero, &tagged, f.value, Type::ANY);

        let killed = state.kill_element(&f.graph, f.object, one, &narrow);
        assert!(killed.is_empty());
    }

    #[test]
    fn elements_are_bounded() {
        let mut f = fixture();
        let access = AccessBuilder::for_fixed_array_element();
        let mut state = AbstractState::empty(StateLimits::new(32, 2));
        let indices = (0..3).map(|i| f.graph.int32_constant(i)).collect::<Vec<_>>();
        for index in &indices {
            state = state.add_element(f.object, *index, &access, f.value, Type::ANY);
        }

        assert_eq!(state.element_count(), 2);
        assert!(state.lookup_element(f.object, indices[0], &access).is_none());
        assert!(state.lookup_element(f.object, indices[2], &access).is_some());
    }

    #[test]
    fn merge_is_an_intersection() {
        let f = fixture();
        let map = AccessBuilder::for_map();
        let length = AccessBuilder::for_fixed_array_length();
        let elements = AccessBuilder::for_fixed_array_element();
        let base = AbstractState::empty(LIMITS).add_field(f.object, &map, f.value, Type::ANY);
        let left = base
            .add_field(f.object, &length, f.value, Type::ANY)
            .add_element(f.object, f.index, &elements, f.value, Type::ANY);
        let right = base.add_field(f.object, &length, f.other, Type::ANY);

        let merged = AbstractState::merge(&[Rc::new(left), Rc::new(right)]);

        assert!(merged.lookup_field(f.object, &map).is_some());
        assert!(merged.lookup_field(f.object, &length).is_none());
        assert!(merged.lookup_element(f.object, f.index, &elements).is_none());
        assert_eq!(merged, base);
    }

    #[test]
    fn merge_of_one_state_is_identity() {
        let f = fixture();
        let state = Rc::new(AbstractState::empty(LIMITS).add_field(
            f.object,
            &AccessBuilder::for_map(),
            f.value,
            Type::SIGNED32,
        ));
        assert_eq!(AbstractState::merge(&[state.clone()]), *state);
    }

    #[test]
    fn merge_drops_elements_with_other_representation() {
        let mut f = fixture();
        let zero = f.graph.int32_constant(0);
        let tagged = AccessBuilder::for_fixed_array_element();
        let mut word32 = tagged;
        word32.machine_type = MachineType::int32();
        let left =
            AbstractState::empty(LIMITS).add_element(f.object, zero, &word32, f.value, Type::ANY);
        let right =
            AbstractState::empty(LIMITS).add_element(f.object, zero, &tagged, f.value, Type::ANY);

        let merged = AbstractState::merge(&[Rc::new(left), Rc::new(right)]);

        assert!(merged.lookup_element(f.object, zero, &word32).is_none());
        assert!(merged.lookup_element(f.object, zero, &tagged).is_none());
        assert!(merged.is_empty());
    }

    #[test]
    fn merge_widens_proven_types() {
        let f = fixture();
        let index = f.index;
        let field = AccessBuilder::for_fixed_array_length();
        let element = AccessBuilder::for_fixed_array_element();
        let narrow = AbstractState::empty(LIMITS)
            .add_field(f.object, &field, f.value, Type::UNSIGNED31)
            .add_element(f.object, index, &element, f.value, Type::UNSIGNED31);
        let wide = AbstractState::empty(LIMITS)
            .add_field(f.object, &field, f.value, Type::SIGNED32)
            .add_element(f.object, index, &element, f.value, Type::SIGNED32);

        let merged = AbstractState::merge(&[Rc::new(narrow), Rc::new(wide)]);

        let known_field = merged.lookup_field(f.object, &field).map(|it| it.ty);
        let known_element = merged.lookup_element(f.object, index, &element).map(|it| it.ty);
        assert_eq!(known_field, Some(Type::SIGNED32));
        assert_eq!(known_element, Some(Type::SIGNED32));
    }

    #[test]
    #[should_panic(expected = "at least one state")]
    fn merge_of_nothing_panics() {
        AbstractState::merge(&[]);
    }

    #[test]
    fn equality_is_structural() {
        let f = fixture();
        let map = AccessBuilder::for_map();
        let lhs = AbstractState::empty(LIMITS).add_field(f.object, &map, f.value, Type::ANY);
        let rhs = AbstractState::empty(LIMITS).add_field(f.object, &map, f.value, Type::ANY);
        assert_eq!(lhs, rhs);
        assert_ne!(lhs, AbstractState::empty(LIMITS));
    }
}
