use core::fmt::Display;

use derive_more::derive::Display;

use crate::{MachineType, POINTER_SIZE, Type};

/// How the base pointer of an access is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BaseTaggedness {
    /// The base is a raw, untagged address.
    #[display("untagged")]
    UntaggedBase,
    /// The base is a tagged heap object pointer.
    #[display("tagged")]
    TaggedBase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum WriteBarrierKind {
    #[display("no_write_barrier")]
    NoWriteBarrier,
    #[display("map_write_barrier")]
    MapWriteBarrier,
    #[display("pointer_write_barrier")]
    PointerWriteBarrier,
    #[display("full_write_barrier")]
    FullWriteBarrier,
}

/// Describes a load or store of a fixed-offset field.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldAccess {
    pub base: BaseTaggedness,
    /// Byte offset of the field from the base pointer.
    pub offset: u32,
    /// Debug name of the field, if any.
    pub name: Option<&'static str>,
    /// The static type of the values stored in the field.
    pub ty: Type,
    pub machine_type: MachineType,
    pub write_barrier: WriteBarrierKind,
}

impl FieldAccess {
    /// The byte range covered by the field.
    pub fn byte_range(&self) -> core::ops::Range<u32> {
        self.offset..self.offset.saturating_add(self.machine_type.size())
    }

    /// The pointer-sized slot this field occupies, if it is aligned to one.
    pub fn slot(&self) -> Option<usize> {
        (self.offset % POINTER_SIZE == 0).then(|| (self.offset / POINTER_SIZE) as usize)
    }
}

impl Display for FieldAccess {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}, {}", self.base, self.offset)?;
        if let Some(name) = self.name {
            write!(f, ", {name}")?;
        }
        write!(
            f,
            ", {}, {}, {}]",
            self.ty, self.machine_type, self.write_barrier
        )
    }
}

/// Describes a load or store of an indexed element.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("[{base}, {header_size}, {ty}, {machine_type}, {write_barrier}]")]
pub struct ElementAccess {
    pub base: BaseTaggedness,
    /// Offset of the first element from the base pointer.
    pub header_size: u32,
    /// The static type of the elements.
    pub ty: Type,
    pub machine_type: MachineType,
    pub write_barrier: WriteBarrierKind,
}

/// Ready-made access descriptors for the common object layouts.
pub struct AccessBuilder;

impl AccessBuilder {
    pub fn for_map() -> FieldAccess {
        FieldAccess::new(
            BaseTaggedness::TaggedBase,
            0,
            Some("map"),
            Type::INTERNAL,
            MachineType::tagged_pointer(),
            WriteBarrierKind::MapWriteBarrier,
        )
    }

    pub fn for_js_object_properties() -> FieldAccess {
        FieldAccess::new(
            BaseTaggedness::TaggedBase,
            POINTER_SIZE,
            Some("properties"),
            Type::INTERNAL,
            MachineType::tagged_pointer(),
            WriteBarrierKind::PointerWriteBarrier,
        )
    }

    pub fn for_js_object_elements() -> FieldAccess {
        FieldAccess::new(
            BaseTaggedness::TaggedBase,
            2 * POINTER_SIZE,
            Some("elements"),
            Type::INTERNAL,
            MachineType::tagged_pointer(),
            WriteBarrierKind::PointerWriteBarrier,
        )
    }

    pub fn for_js_array_length() -> FieldAccess {
        FieldAccess::new(
            BaseTaggedness::TaggedBase,
            3 * POINTER_SIZE,
            Some("length"),
            Type::UNSIGNED32,
            MachineType::any_tagged(),
            WriteBarrierKind::FullWriteBarrier,
        )
    }

    pub fn for_fixed_array_length() -> FieldAccess {
        FieldAccess::new(
            BaseTaggedness::TaggedBase,
            POINTER_SIZE,
            Some("length"),
            Type::UNSIGNED30,
            MachineType::tagged_signed(),
            WriteBarrierKind::NoWriteBarrier,
        )
    }

    pub fn for_fixed_array_element() -> ElementAccess {
        ElementAccess::new(
            BaseTaggedness::TaggedBase,
            2 * POINTER_SIZE,
            Type::ANY,
            MachineType::any_tagged(),
            WriteBarrierKind::FullWriteBarrier,
        )
    }

    pub fn for_fixed_double_array_element() -> ElementAccess {
        ElementAccess::new(
            BaseTaggedness::TaggedBase,
            2 * POINTER_SIZE,
            Type::NUMBER,
            MachineType::float64(),
            WriteBarrierKind::NoWriteBarrier,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn field_slots_are_pointer_sized() {
        assert_eq!(AccessBuilder::for_map().slot(), Some(0));
        assert_eq!(AccessBuilder::for_js_array_length().slot(), Some(3));

        let mut unaligned = AccessBuilder::for_map();
        unaligned.offset = 4;
        assert_eq!(unaligned.slot(), None);
        assert_eq!(unaligned.byte_range(), 4..12);

        let mut far = AccessBuilder::for_map();
        far.offset = u32::MAX - 2;
        assert_eq!(far.byte_range(), u32::MAX - 2..u32::MAX);
    }

    #[test]
    fn object_header_fields_get_their_own_slots() {
        let slots = [
            AccessBuilder::for_map(),
            AccessBuilder::for_js_object_properties(),
            AccessBuilder::for_js_object_elements(),
            AccessBuilder::for_js_array_length(),
        ]
        .map(|access| access.slot());
        assert_eq!(slots, [Some(0), Some(1), Some(2), Some(3)]);

        let doubles = AccessBuilder::for_fixed_double_array_element();
        let tagged = AccessBuilder::for_fixed_array_element();
        assert_eq!(doubles.header_size, tagged.header_size);
        assert!(
            !doubles
                .machine_type
                .representation
                .is_compatible(tagged.machine_type.representation)
        );
    }

    #[test]
    fn display_lists_every_attribute() {
        assert_eq!(
            AccessBuilder::for_map().to_string(),
            "[tagged, 0, map, Internal, tagged_pointer|any, map_write_barrier]"
        );
        assert_eq!(
            AccessBuilder::for_fixed_array_element().to_string(),
            "[tagged, 16, Any, tagged|any, full_write_barrier]"
        );
    }
}
