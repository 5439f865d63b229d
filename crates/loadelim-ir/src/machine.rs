use derive_more::derive::Display;

/// The size of a tagged pointer and the granularity of tracked fields.
pub const POINTER_SIZE: u32 = 8;

/// How a value is laid out in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum MachineRepresentation {
    #[display("bit")]
    Bit,
    #[display("word8")]
    Word8,
    #[display("word16")]
    Word16,
    #[display("word32")]
    Word32,
    #[display("word64")]
    Word64,
    #[display("float32")]
    Float32,
    #[display("float64")]
    Float64,
    #[display("tagged_signed")]
    TaggedSigned,
    #[display("tagged_pointer")]
    TaggedPointer,
    #[display("tagged")]
    Tagged,
}

impl MachineRepresentation {
    pub fn is_tagged(self) -> bool {
        matches!(
            self,
            MachineRepresentation::Tagged
                | MachineRepresentation::TaggedSigned
                | MachineRepresentation::TaggedPointer
        )
    }

    /// Size of the representation in bytes.
    pub fn size(self) -> u32 {
        match self {
            MachineRepresentation::Bit | MachineRepresentation::Word8 => 1,
            MachineRepresentation::Word16 => 2,
            MachineRepresentation::Word32 | MachineRepresentation::Float32 => 4,
            MachineRepresentation::Word64
            | MachineRepresentation::Float64
            | MachineRepresentation::TaggedSigned
            | MachineRepresentation::TaggedPointer
            | MachineRepresentation::Tagged => POINTER_SIZE,
        }
    }

    /// Whether a value stored with `self` can be read back with `other` without conversion.
    /// All tagged flavours share one layout.
    pub fn is_compatible(self, other: MachineRepresentation) -> bool {
        self == other || (self.is_tagged() && other.is_tagged())
    }
}

/// How the bits of a value are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum MachineSemantic {
    #[display("none")]
    None,
    #[display("bool")]
    Bool,
    #[display("int32")]
    Int32,
    #[display("uint32")]
    Uint32,
    #[display("int64")]
    Int64,
    #[display("number")]
    Number,
    #[display("any")]
    Any,
}

#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{representation}|{semantic}")]
pub struct MachineType {
    pub representation: MachineRepresentation,
    pub semantic: MachineSemantic,
}

impl MachineType {
    pub fn any_tagged() -> Self {
        Self::new(MachineRepresentation::Tagged, MachineSemantic::Any)
    }

    pub fn tagged_signed() -> Self {
        Self::new(MachineRepresentation::TaggedSigned, MachineSemantic::Int32)
    }

    pub fn tagged_pointer() -> Self {
        Self::new(MachineRepresentation::TaggedPointer, MachineSemantic::Any)
    }

    pub fn int32() -> Self {
        Self::new(MachineRepresentation::Word32, MachineSemantic::Int32)
    }

    pub fn float64() -> Self {
        Self::new(MachineRepresentation::Float64, MachineSemantic::Number)
    }

    pub fn size(&self) -> u32 {
        self.representation.size()
    }
}
