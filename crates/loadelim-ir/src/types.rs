use core::fmt::Display;

use bitflags::bitflags;

bitflags! {
    /// A static type from the bitset lattice. Every primitive bit is a disjoint set of runtime
    /// values, unions are plain bitwise or. `NONE` is the bottom and `ANY` the top of the lattice.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Type: u32 {
        const UNSIGNED30 = 1 << 0;
        const OTHER_UNSIGNED31 = 1 << 1;
        const OTHER_UNSIGNED32 = 1 << 2;
        const NEGATIVE31 = 1 << 3;
        const OTHER_SIGNED32 = 1 << 4;
        const OTHER_NUMBER = 1 << 5;
        const MINUS_ZERO = 1 << 6;
        const NAN = 1 << 7;
        const BOOLEAN = 1 << 8;
        const NULL = 1 << 9;
        const UNDEFINED = 1 << 10;
        const STRING = 1 << 11;
        const SYMBOL = 1 << 12;
        const RECEIVER = 1 << 13;
        const INTERNAL = 1 << 14;

        const UNSIGNED_SMALL = Self::UNSIGNED30.bits();
        const UNSIGNED31 = Self::UNSIGNED30.bits() | Self::OTHER_UNSIGNED31.bits();
        const UNSIGNED32 = Self::UNSIGNED31.bits() | Self::OTHER_UNSIGNED32.bits();
        const SIGNED31 = Self::UNSIGNED30.bits() | Self::NEGATIVE31.bits();
        const NEGATIVE32 = Self::NEGATIVE31.bits() | Self::OTHER_SIGNED32.bits();
        const SIGNED32 = Self::SIGNED31.bits()
            | Self::OTHER_UNSIGNED31.bits()
            | Self::OTHER_SIGNED32.bits();
        const INTEGRAL32 = Self::SIGNED32.bits() | Self::UNSIGNED32.bits();
        const PLAIN_NUMBER = Self::INTEGRAL32.bits() | Self::OTHER_NUMBER.bits();
        const NUMBER = Self::PLAIN_NUMBER.bits() | Self::MINUS_ZERO.bits() | Self::NAN.bits();
        const NULL_OR_UNDEFINED = Self::NULL.bits() | Self::UNDEFINED.bits();
        const PRIMITIVE = Self::NUMBER.bits()
            | Self::BOOLEAN.bits()
            | Self::NULL_OR_UNDEFINED.bits()
            | Self::STRING.bits()
            | Self::SYMBOL.bits();
        const ANY = Self::PRIMITIVE.bits() | Self::RECEIVER.bits() | Self::INTERNAL.bits();
    }
}

/// Integer bits with the closed ranges of values they contain.
const INTEGER_BITS: [(Type, i64, i64); 5] = [
    (Type::OTHER_SIGNED32, i32::MIN as i64, -(1 << 30) - 1),
    (Type::NEGATIVE31, -(1 << 30), -1),
    (Type::UNSIGNED30, 0, (1 << 30) - 1),
    (Type::OTHER_UNSIGNED31, 1 << 30, i32::MAX as i64),
    (Type::OTHER_UNSIGNED32, 1 << 31, u32::MAX as i64),
];

const NAMED: [(Type, &str); 21] = [
    (Type::NONE, "None"),
    (Type::ANY, "Any"),
    (Type::PRIMITIVE, "Primitive"),
    (Type::NUMBER, "Number"),
    (Type::PLAIN_NUMBER, "PlainNumber"),
    (Type::INTEGRAL32, "Integral32"),
    (Type::SIGNED32, "Signed32"),
    (Type::UNSIGNED32, "Unsigned32"),
    (Type::NEGATIVE32, "Negative32"),
    (Type::SIGNED31, "Signed31"),
    (Type::UNSIGNED31, "Unsigned31"),
    (Type::UNSIGNED30, "Unsigned30"),
    (Type::NEGATIVE31, "Negative31"),
    (Type::NULL_OR_UNDEFINED, "NullOrUndefined"),
    (Type::BOOLEAN, "Boolean"),
    (Type::NULL, "Null"),
    (Type::UNDEFINED, "Undefined"),
    (Type::STRING, "String"),
    (Type::SYMBOL, "Symbol"),
    (Type::RECEIVER, "Receiver"),
    (Type::INTERNAL, "Internal"),
];

impl Type {
    pub const NONE: Type = Type::empty();

    /// Subtyping: whether every value of `self` is also a value of `other`.
    pub fn is(self, other: Type) -> bool {
        other.contains(self)
    }

    /// Whether `self` and `other` share at least one value.
    pub fn maybe(self, other: Type) -> bool {
        self.intersects(other)
    }

    pub fn intersect(self, other: Type) -> Type {
        self & other
    }

    /// The smallest type containing every integer in `min..=max`.
    pub fn range(min: i64, max: i64) -> Type {
        assert!(min <= max, "Empty range {min}..={max}");
        let mut ty = Type::NONE;
        for (bits, lo, hi) in INTEGER_BITS {
            if min <= hi && max >= lo {
                ty |= bits;
            }
        }
        if min < i32::MIN as i64 || max > u32::MAX as i64 {
            ty |= Type::OTHER_NUMBER;
        }
        ty
    }

    /// The type of a single integer constant.
    pub fn constant(value: i64) -> Type {
        Type::range(value, value)
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some((_, name)) = NAMED.iter().find(|(ty, _)| ty == self) {
            return f.write_str(name);
        }
        let bits = NAMED
            .iter()
            .filter(|(ty, _)| ty.bits().is_power_of_two() && self.contains(*ty))
            .collect::<Vec<_>>();
        // Bits without a name of their own (e.g. `OTHER_NUMBER`) fall back to the raw value.
        let named = bits.iter().fold(Type::NONE, |acc, (ty, _)| acc | *ty);
        if named != *self {
            return write!(f, "Type({:#x})", self.bits());
        }
        let parts = bits.iter().map(|(_, name)| *name).collect::<Vec<_>>();
        write!(f, "{}", parts.join(" | "))
    }
}
