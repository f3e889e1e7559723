//! Type kinds, flags and generic-parameter constraints.

use bitflags::bitflags;

use super::Type;

bitflags! {
    /// Structural properties of a type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeFlags: u8 {
        /// Stored inline; requires boxing to become a reference.
        const VALUE_TYPE = 1 << 0;
        /// No type can derive from this one.
        const SEALED = 1 << 1;
        /// Interface type.
        const INTERFACE = 1 << 2;
        /// Open generic definition (`List<T>` itself, not an instance).
        const GENERIC_DEFINITION = 1 << 3;
    }
}

bitflags! {
    /// Constraint flags on a generic parameter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ConstraintFlags: u8 {
        /// `where T : class`
        const REFERENCE_TYPE = 1 << 0;
        /// `where T : struct` (non-nullable value type)
        const VALUE_TYPE = 1 << 1;
    }
}

/// Constraints declared on a generic parameter.
#[derive(Debug, Clone, Default)]
pub struct GenericConstraints {
    pub flags: ConstraintFlags,
    /// Required base type or interface. May mention other generic parameters.
    pub base: Option<Type>,
}

impl GenericConstraints {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn reference_type() -> Self {
        Self {
            flags: ConstraintFlags::REFERENCE_TYPE,
            base: None,
        }
    }

    pub fn value_type() -> Self {
        Self {
            flags: ConstraintFlags::VALUE_TYPE,
            base: None,
        }
    }

    pub fn with_base(base: Type) -> Self {
        Self {
            flags: ConstraintFlags::empty(),
            base: Some(base),
        }
    }

    /// Check the flag constraints and the (already substituted) base constraint.
    pub fn is_satisfied_by(&self, candidate: &Type, base: Option<&Type>) -> bool {
        if self.flags.contains(ConstraintFlags::REFERENCE_TYPE) && candidate.is_value_type() {
            return false;
        }
        if self.flags.contains(ConstraintFlags::VALUE_TYPE)
            && (!candidate.is_value_type() || candidate.is_nullable())
        {
            return false;
        }
        match base {
            Some(base) => candidate.is_subtype_of(base),
            None => true,
        }
    }
}

/// A generic parameter of a type or method definition.
#[derive(Debug, Clone)]
pub struct GenericParam {
    /// Position within the owner's generic parameter list.
    pub position: usize,
    pub constraints: GenericConstraints,
}

/// What kind of type a [`Type`] is.
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// Root of every type hierarchy.
    Object,
    Void,
    /// Type of the `null` literal.
    Null,
    Bool,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    Double,
    String,
    Class,
    Struct,
    Interface,
    GenericParam(GenericParam),
    Array(Type),
    Delegate { params: Vec<Type>, ret: Type },
    /// Out-of-band invocation metadata.
    Metadata,
}

impl TypeKind {
    /// Numeric rank used for implicit widening: int < long < double.
    pub fn numeric_rank(&self) -> Option<u8> {
        match self {
            TypeKind::Int => Some(0),
            TypeKind::Long => Some(1),
            TypeKind::Double => Some(2),
            _ => None,
        }
    }
}
