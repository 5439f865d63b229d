use core::fmt::Display;

use bitflags::bitflags;

use crate::{ElementAccess, FieldAccess, MachineRepresentation, Type};

bitflags! {
    /// Properties of an operator that optimizations are allowed to rely on.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Properties: u8 {
        /// The operator does not read memory.
        const NO_READ = 1 << 0;
        /// The operator does not write memory.
        const NO_WRITE = 1 << 1;
        /// The operator cannot throw.
        const NO_THROW = 1 << 2;
        /// The operator cannot deoptimize.
        const NO_DEOPT = 1 << 3;
        const PURE = Self::NO_READ.bits()
            | Self::NO_WRITE.bits()
            | Self::NO_THROW.bits()
            | Self::NO_DEOPT.bits();
    }
}

/// The operation performed by a node. Inputs are always ordered as value inputs, then effect
/// inputs, then control inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// The entry of the graph, produces the initial effect and control.
    Start,
    /// The exit of the graph, joins `n` terminating control nodes.
    End(u32),
    /// Returns a value. Inputs: value, effect, control.
    Return,
    /// The parameter with the given index. Inputs: start (control).
    Parameter(u32),
    Int32Constant(i32),
    /// Two-way branch. Inputs: condition, control.
    Branch,
    IfTrue,
    IfFalse,
    /// Joins `n` control paths.
    Merge(u32),
    /// Loop header joining the entry and `n - 1` back edges.
    Loop(u32),
    /// Value phi over `n` values. Inputs: `n` values, merge (control).
    Phi(MachineRepresentation, u32),
    /// Effect phi over `n` effects. Inputs: `n` effects, merge (control).
    EffectPhi(u32),
    /// A deoptimization point. Observes the effect chain without writing memory.
    Checkpoint,
    /// An opaque call with `value_inputs` arguments.
    Call {
        properties: Properties,
        value_inputs: u32,
    },
    /// Allocates a new object. Inputs: size, effect, control.
    Allocate,
    /// Inputs: object, effect, control.
    LoadField(FieldAccess),
    /// Inputs: object, value, effect, control.
    StoreField(FieldAccess),
    /// Inputs: object, index, effect, control.
    LoadElement(ElementAccess),
    /// Inputs: object, index, value, effect, control.
    StoreElement(ElementAccess),
    /// Narrows the static type of a value at a control point. Inputs: value, control.
    TypeGuard(Type),
}

impl Operator {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Operator::Start => "Start",
            Operator::End(_) => "End",
            Operator::Return => "Return",
            Operator::Parameter(_) => "Parameter",
            Operator::Int32Constant(_) => "Int32Constant",
            Operator::Branch => "Branch",
            Operator::IfTrue => "IfTrue",
            Operator::IfFalse => "IfFalse",
            Operator::Merge(_) => "Merge",
            Operator::Loop(_) => "Loop",
            Operator::Phi(..) => "Phi",
            Operator::EffectPhi(_) => "EffectPhi",
            Operator::Checkpoint => "Checkpoint",
            Operator::Call { .. } => "Call",
            Operator::Allocate => "Allocate",
            Operator::LoadField(_) => "LoadField",
            Operator::StoreField(_) => "StoreField",
            Operator::LoadElement(_) => "LoadElement",
            Operator::StoreElement(_) => "StoreElement",
            Operator::TypeGuard(_) => "TypeGuard",
        }
    }

    pub fn properties(&self) -> Properties {
        match self {
            Operator::Start | Operator::End(_) | Operator::Return => Properties::NO_THROW,
            Operator::Parameter(_)
            | Operator::Int32Constant(_)
            | Operator::Branch
            | Operator::IfTrue
            | Operator::IfFalse
            | Operator::Merge(_)
            | Operator::Loop(_)
            | Operator::Phi(..)
            | Operator::EffectPhi(_)
            | Operator::TypeGuard(_) => Properties::PURE,
            Operator::Checkpoint => Properties::NO_WRITE | Properties::NO_THROW,
            Operator::Call { properties, .. } => *properties,
            Operator::Allocate => Properties::NO_THROW,
            Operator::LoadField(_) | Operator::LoadElement(_) => {
                Properties::NO_WRITE | Properties::NO_THROW | Properties::NO_DEOPT
            }
            Operator::StoreField(_) | Operator::StoreElement(_) => {
                Properties::NO_READ | Properties::NO_THROW | Properties::NO_DEOPT
            }
        }
    }

    pub fn value_input_count(&self) -> usize {
        match self {
            Operator::Start
            | Operator::End(_)
            | Operator::Parameter(_)
            | Operator::Int32Constant(_)
            | Operator::IfTrue
            | Operator::IfFalse
            | Operator::Merge(_)
            | Operator::Loop(_)
            | Operator::EffectPhi(_)
            | Operator::Checkpoint => 0,
            Operator::Return
            | Operator::Branch
            | Operator::Allocate
            | Operator::LoadField(_)
            | Operator::TypeGuard(_) => 1,
            Operator::StoreField(_) | Operator::LoadElement(_) => 2,
            Operator::StoreElement(_) => 3,
            Operator::Phi(_, n) => *n as usize,
            Operator::Call { value_inputs, .. } => *value_inputs as usize,
        }
    }

    pub fn effect_input_count(&self) -> usize {
        match self {
            Operator::EffectPhi(n) => *n as usize,
            Operator::Return
            | Operator::Checkpoint
            | Operator::Call { .. }
            | Operator::Allocate
            | Operator::LoadField(_)
            | Operator::StoreField(_)
            | Operator::LoadElement(_)
            | Operator::StoreElement(_) => 1,
            _ => 0,
        }
    }

    pub fn control_input_count(&self) -> usize {
        match self {
            Operator::Start | Operator::Int32Constant(_) => 0,
            Operator::End(n) | Operator::Merge(n) | Operator::Loop(n) => *n as usize,
            _ => 1,
        }
    }

    pub fn input_count(&self) -> usize {
        self.value_input_count() + self.effect_input_count() + self.control_input_count()
    }

    pub fn value_output_count(&self) -> usize {
        match self {
            Operator::Parameter(_)
            | Operator::Int32Constant(_)
            | Operator::Phi(..)
            | Operator::Call { .. }
            | Operator::Allocate
            | Operator::LoadField(_)
            | Operator::LoadElement(_)
            | Operator::TypeGuard(_) => 1,
            _ => 0,
        }
    }

    pub fn effect_output_count(&self) -> usize {
        match self {
            Operator::Start
            | Operator::EffectPhi(_)
            | Operator::Checkpoint
            | Operator::Call { .. }
            | Operator::Allocate
            | Operator::LoadField(_)
            | Operator::StoreField(_)
            | Operator::LoadElement(_)
            | Operator::StoreElement(_) => 1,
            _ => 0,
        }
    }

    pub fn control_output_count(&self) -> usize {
        match self {
            Operator::Start
            | Operator::Branch
            | Operator::IfTrue
            | Operator::IfFalse
            | Operator::Merge(_)
            | Operator::Loop(_)
            | Operator::Return
            | Operator::Call { .. } => 1,
            _ => 0,
        }
    }

    /// Whether the operator takes part in the effect chain.
    pub fn is_effectful(&self) -> bool {
        self.effect_output_count() > 0
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.mnemonic())?;
        match self {
            Operator::End(n) | Operator::Merge(n) | Operator::Loop(n) | Operator::EffectPhi(n) => {
                write!(f, "({n})")
            }
            Operator::Parameter(index) => write!(f, "[{index}]"),
            Operator::Int32Constant(value) => write!(f, "[{value}]"),
            Operator::Phi(rep, n) => write!(f, "[{rep}]({n})"),
            Operator::Call {
                properties,
                value_inputs,
            } => write!(f, "[{:#x}]({value_inputs})", properties.bits()),
            Operator::LoadField(access) | Operator::StoreField(access) => write!(f, "{access}"),
            Operator::LoadElement(access) | Operator::StoreElement(access) => {
                write!(f, "{access}")
            }
            Operator::TypeGuard(ty) => write!(f, "[{ty}]"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AccessBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn input_layout_matches_operator() {
        let store = Operator::StoreElement(AccessBuilder::for_fixed_array_element());
        assert_eq!(store.value_input_count(), 3);
        assert_eq!(store.effect_input_count(), 1);
        assert_eq!(store.control_input_count(), 1);
        assert_eq!(store.input_count(), 5);

        let phi = Operator::EffectPhi(2);
        assert_eq!(phi.input_count(), 3);
        assert!(phi.is_effectful());
        assert!(!Operator::TypeGuard(Type::ANY).is_effectful());
    }

    #[test]
    fn checkpoint_does_not_write() {
        assert!(Operator::Checkpoint.properties().contains(Properties::NO_WRITE));
        assert!(!Operator::Allocate.properties().contains(Properties::NO_WRITE));
    }
}
