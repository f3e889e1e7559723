//! Fluent construction of user types.

use super::{Type, TypeData, TypeFlags, TypeKind};
use crate::TypeHash;

/// Builder for classes, structs and interfaces.
///
/// ```
/// use bindexpr_core::{Type, TypeBuilder, GenericConstraints};
///
/// let t = Type::generic_param("Box.T", 0, GenericConstraints::none());
/// let boxed = TypeBuilder::class("Box").generic_params(vec![t]).build();
/// let box_int = boxed.instantiate(&[Type::int()]).unwrap();
/// assert_eq!(box_int.name(), "Box<int>");
/// ```
#[derive(Debug)]
pub struct TypeBuilder {
    name: String,
    kind: TypeKind,
    flags: TypeFlags,
    base: Option<Type>,
    interfaces: Vec<Type>,
    generic_params: Vec<Type>,
}

impl TypeBuilder {
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name.into(), TypeKind::Class, TypeFlags::empty())
    }

    /// A value type.
    pub fn structure(name: impl Into<String>) -> Self {
        Self::new(
            name.into(),
            TypeKind::Struct,
            TypeFlags::VALUE_TYPE | TypeFlags::SEALED,
        )
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name.into(), TypeKind::Interface, TypeFlags::INTERFACE)
    }

    fn new(name: String, kind: TypeKind, flags: TypeFlags) -> Self {
        Self {
            name,
            kind,
            flags,
            base: None,
            interfaces: Vec::new(),
            generic_params: Vec::new(),
        }
    }

    pub fn base(mut self, base: Type) -> Self {
        self.base = Some(base);
        self
    }

    pub fn implements(mut self, interface: Type) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn sealed(mut self) -> Self {
        self.flags |= TypeFlags::SEALED;
        self
    }

    /// Make this a generic definition over `params`.
    pub fn generic_params(mut self, params: Vec<Type>) -> Self {
        self.generic_params = params;
        self
    }

    pub fn build(self) -> Type {
        let mut flags = self.flags;
        let hash = if self.generic_params.is_empty() {
            TypeHash::from_name(&self.name)
        } else {
            flags |= TypeFlags::GENERIC_DEFINITION;
            TypeHash::from_name(&format!("{}`{}", self.name, self.generic_params.len()))
        };
        let base = match self.kind {
            TypeKind::Interface => None,
            _ => Some(self.base.unwrap_or_else(Type::object)),
        };
        Type::from_data(TypeData {
            name: self.name,
            hash,
            kind: self.kind,
            flags,
            base,
            interfaces: self.interfaces,
            generic_params: self.generic_params,
            instance_of: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GenericConstraints;

    #[test]
    fn generic_definition_hash_includes_arity() {
        let plain = TypeBuilder::class("Pair").build();
        let t = Type::generic_param("Pair.T", 0, GenericConstraints::none());
        let generic = TypeBuilder::class("Pair").generic_params(vec![t]).build();
        assert_ne!(plain, generic);
        assert!(generic.is_generic_definition());
        assert!(!plain.is_generic_definition());
    }

    #[test]
    fn structs_are_sealed_value_types() {
        let point = TypeBuilder::structure("Point").build();
        assert!(point.is_value_type());
        assert!(point.is_sealed());
        assert_eq!(point.base(), Some(&Type::object()));
    }

    #[test]
    fn interfaces_have_no_base() {
        let iface = TypeBuilder::interface("IThing").build();
        assert!(iface.is_interface());
        assert!(iface.base().is_none());
    }
}
