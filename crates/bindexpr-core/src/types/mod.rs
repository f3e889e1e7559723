//! Runtime type model.
//!
//! [`Type`] is a shared, immutable handle describing a type the compiler can
//! reason about: primitives, classes, structs, interfaces, arrays, delegates,
//! generic definitions with their closed instantiations, and generic
//! parameters. Equality and hashing go through [`TypeHash`] only, so two
//! independently constructed `List<string>` handles are the same type.
//!
//! ## Hierarchy
//!
//! Every type derives from `object`. [`Type::ancestors`] yields the lookup
//! order used by member resolution and generic inference: the type itself,
//! its base chain, then every implemented interface.

mod builder;
mod kind;
mod substitution;

pub use builder::TypeBuilder;
pub use kind::{ConstraintFlags, GenericConstraints, GenericParam, TypeFlags, TypeKind};
pub use substitution::{SubstitutionMap, build_substitution_map};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use rustc_hash::FxHashSet;

use crate::TypeHash;

#[derive(Debug)]
pub(crate) struct TypeData {
    pub(crate) name: String,
    pub(crate) hash: TypeHash,
    pub(crate) kind: TypeKind,
    pub(crate) flags: TypeFlags,
    pub(crate) base: Option<Type>,
    pub(crate) interfaces: Vec<Type>,
    /// Parameters of a generic definition.
    pub(crate) generic_params: Vec<Type>,
    /// Definition and arguments of a closed instantiation.
    pub(crate) instance_of: Option<(Type, Vec<Type>)>,
}

/// A shared handle to a runtime type.
#[derive(Clone)]
pub struct Type(Arc<TypeData>);

static OBJECT: LazyLock<Type> = LazyLock::new(|| {
    Type::from_data(TypeData::simple("object", TypeKind::Object, TypeFlags::empty(), None))
});
static VOID: LazyLock<Type> = LazyLock::new(|| primitive("void", TypeKind::Void, false));
static NULL: LazyLock<Type> = LazyLock::new(|| primitive("null", TypeKind::Null, false));
static BOOL: LazyLock<Type> = LazyLock::new(|| primitive("bool", TypeKind::Bool, true));
static INT: LazyLock<Type> = LazyLock::new(|| primitive("int", TypeKind::Int, true));
static LONG: LazyLock<Type> = LazyLock::new(|| primitive("long", TypeKind::Long, true));
static DOUBLE: LazyLock<Type> = LazyLock::new(|| primitive("double", TypeKind::Double, true));
static STRING: LazyLock<Type> = LazyLock::new(|| primitive("string", TypeKind::String, false));
static METADATA: LazyLock<Type> =
    LazyLock::new(|| primitive("metadata", TypeKind::Metadata, false));
static NULLABLE: LazyLock<Type> = LazyLock::new(|| {
    let t = Type::generic_param("Nullable.T", 0, GenericConstraints::value_type());
    TypeBuilder::structure("Nullable").generic_params(vec![t]).build()
});

fn primitive(name: &str, kind: TypeKind, value_type: bool) -> Type {
    let mut flags = TypeFlags::SEALED;
    if value_type {
        flags |= TypeFlags::VALUE_TYPE;
    }
    Type::from_data(TypeData::simple(name, kind, flags, Some(Type::object())))
}

impl TypeData {
    fn simple(name: &str, kind: TypeKind, flags: TypeFlags, base: Option<Type>) -> Self {
        Self {
            name: name.to_string(),
            hash: TypeHash::from_name(name),
            kind,
            flags,
            base,
            interfaces: Vec::new(),
            generic_params: Vec::new(),
            instance_of: None,
        }
    }
}

impl Type {
    pub(crate) fn from_data(data: TypeData) -> Self {
        Type(Arc::new(data))
    }

    // =========================================================================
    // Well-known types
    // =========================================================================

    pub fn object() -> Type {
        OBJECT.clone()
    }

    pub fn void() -> Type {
        VOID.clone()
    }

    /// Type of the `null` literal.
    pub fn null() -> Type {
        NULL.clone()
    }

    pub fn bool() -> Type {
        BOOL.clone()
    }

    pub fn int() -> Type {
        INT.clone()
    }

    pub fn long() -> Type {
        LONG.clone()
    }

    pub fn double() -> Type {
        DOUBLE.clone()
    }

    pub fn string() -> Type {
        STRING.clone()
    }

    pub fn metadata() -> Type {
        METADATA.clone()
    }

    /// The open `Nullable<T>` definition.
    pub fn nullable_definition() -> Type {
        NULLABLE.clone()
    }

    // =========================================================================
    // Constructed types
    // =========================================================================

    /// `Nullable<inner>` for non-nullable value types; other types already
    /// admit null and are returned unchanged.
    pub fn nullable(inner: &Type) -> Type {
        if !inner.is_value_type() || inner.is_nullable() {
            return inner.clone();
        }
        NULLABLE
            .instantiate(std::slice::from_ref(inner))
            .unwrap_or_else(|| inner.clone())
    }

    /// Array of `element`.
    pub fn array(element: &Type) -> Type {
        let name = format!("{}[]", element.name());
        let hash =
            TypeHash::from_generic_instance(TypeHash::from_name("[]"), &[element.hash()]);
        Type::from_data(TypeData {
            name,
            hash,
            kind: TypeKind::Array(element.clone()),
            flags: TypeFlags::SEALED,
            base: Some(Type::object()),
            interfaces: Vec::new(),
            generic_params: Vec::new(),
            instance_of: None,
        })
    }

    /// Delegate type with the given parameter and return types.
    pub fn delegate(params: Vec<Type>, ret: Type) -> Type {
        let mut parts: Vec<String> = params.iter().map(|p| p.name().to_string()).collect();
        parts.push(ret.name().to_string());
        let name = format!("Func<{}>", parts.join(", "));
        let mut hashes: Vec<TypeHash> = params.iter().map(Type::hash).collect();
        hashes.push(ret.hash());
        let hash = TypeHash::from_generic_instance(TypeHash::from_name("=>"), &hashes);
        Type::from_data(TypeData {
            name,
            hash,
            kind: TypeKind::Delegate { params, ret },
            flags: TypeFlags::SEALED,
            base: Some(Type::object()),
            interfaces: Vec::new(),
            generic_params: Vec::new(),
            instance_of: None,
        })
    }

    /// A generic parameter. `qualified_name` should include the owner
    /// (`"List.T"`, `"Enumerable.Select.TResult"`) so parameters of different
    /// owners never collide.
    pub fn generic_param(
        qualified_name: &str,
        position: usize,
        constraints: GenericConstraints,
    ) -> Type {
        let display = qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(qualified_name)
            .to_string();
        let mut data = TypeData::simple(
            qualified_name,
            TypeKind::GenericParam(GenericParam {
                position,
                constraints,
            }),
            TypeFlags::empty(),
            Some(Type::object()),
        );
        data.name = display;
        Type::from_data(data)
    }

    /// Close a generic definition over `args`.
    ///
    /// Returns `None` if this is not a generic definition or the argument
    /// count does not match.
    pub fn instantiate(&self, args: &[Type]) -> Option<Type> {
        if !self.is_generic_definition() || self.0.generic_params.len() != args.len() {
            return None;
        }
        let map = build_substitution_map(&self.0.generic_params, args);
        let arg_names: Vec<&str> = args.iter().map(Type::name).collect();
        let arg_hashes: Vec<TypeHash> = args.iter().map(Type::hash).collect();
        Some(Type::from_data(TypeData {
            name: format!("{}<{}>", self.0.name, arg_names.join(", ")),
            hash: TypeHash::from_generic_instance(self.hash(), &arg_hashes),
            kind: self.0.kind.clone(),
            flags: self.0.flags - TypeFlags::GENERIC_DEFINITION,
            base: self.0.base.as_ref().map(|b| b.substitute(&map)),
            interfaces: self.0.interfaces.iter().map(|i| i.substitute(&map)).collect(),
            generic_params: Vec::new(),
            instance_of: Some((self.clone(), args.to_vec())),
        }))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn hash(&self) -> TypeHash {
        self.0.hash
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn flags(&self) -> TypeFlags {
        self.0.flags
    }

    pub fn base(&self) -> Option<&Type> {
        self.0.base.as_ref()
    }

    pub fn interfaces(&self) -> &[Type] {
        &self.0.interfaces
    }

    /// Parameters of a generic definition (empty otherwise).
    pub fn generic_params(&self) -> &[Type] {
        &self.0.generic_params
    }

    /// Definition this type was instantiated from.
    pub fn generic_definition(&self) -> Option<&Type> {
        self.0.instance_of.as_ref().map(|(def, _)| def)
    }

    /// Arguments of a closed instantiation (empty otherwise).
    pub fn generic_args(&self) -> &[Type] {
        self.0
            .instance_of
            .as_ref()
            .map(|(_, args)| args.as_slice())
            .unwrap_or(&[])
    }

    /// Element type of an array.
    pub fn element_type(&self) -> Option<&Type> {
        match &self.0.kind {
            TypeKind::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Parameter and return types of a delegate.
    pub fn delegate_signature(&self) -> Option<(&[Type], &Type)> {
        match &self.0.kind {
            TypeKind::Delegate { params, ret } => Some((params.as_slice(), ret)),
            _ => None,
        }
    }

    pub fn as_generic_param(&self) -> Option<&GenericParam> {
        match &self.0.kind {
            TypeKind::GenericParam(param) => Some(param),
            _ => None,
        }
    }

    // =========================================================================
    // Classification
    // =========================================================================

    pub fn is_value_type(&self) -> bool {
        self.0.flags.contains(TypeFlags::VALUE_TYPE)
    }

    pub fn is_sealed(&self) -> bool {
        self.0.flags.contains(TypeFlags::SEALED)
    }

    pub fn is_interface(&self) -> bool {
        self.0.flags.contains(TypeFlags::INTERFACE)
    }

    pub fn is_generic_definition(&self) -> bool {
        self.0.flags.contains(TypeFlags::GENERIC_DEFINITION)
    }

    pub fn is_object(&self) -> bool {
        matches!(self.0.kind, TypeKind::Object)
    }

    pub fn is_void(&self) -> bool {
        matches!(self.0.kind, TypeKind::Void)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.0.kind, TypeKind::Null)
    }

    pub fn is_generic_param(&self) -> bool {
        matches!(self.0.kind, TypeKind::GenericParam(_))
    }

    /// `Nullable<T>` instance.
    pub fn is_nullable(&self) -> bool {
        self.generic_definition().is_some_and(|def| *def == *NULLABLE)
    }

    /// Underlying type of a `Nullable<T>`, or the type itself.
    pub fn non_nullable(&self) -> Type {
        if self.is_nullable() {
            self.generic_args()[0].clone()
        } else {
            self.clone()
        }
    }

    /// Whether a value of this static type may be null at runtime.
    pub fn can_be_null(&self) -> bool {
        !self.is_value_type() || self.is_nullable()
    }

    pub fn numeric_rank(&self) -> Option<u8> {
        self.0.kind.numeric_rank()
    }

    /// Whether any generic parameter appears anywhere in this type.
    pub fn contains_generic_params(&self) -> bool {
        match &self.0.kind {
            TypeKind::GenericParam(_) => true,
            TypeKind::Array(element) => element.contains_generic_params(),
            TypeKind::Delegate { params, ret } => {
                ret.contains_generic_params() || params.iter().any(Type::contains_generic_params)
            }
            _ => self.generic_args().iter().any(Type::contains_generic_params),
        }
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// The type, its base chain, then all implemented interfaces, each once.
    /// `object` is always last.
    pub fn ancestors(&self) -> Vec<Type> {
        let mut seen = FxHashSet::default();
        let mut chain = Vec::new();

        let mut current = Some(self.clone());
        while let Some(ty) = current {
            if ty.is_object() || !seen.insert(ty.hash()) {
                break;
            }
            current = ty.base().cloned();
            chain.push(ty);
        }

        let mut pending: Vec<Type> = chain
            .iter()
            .flat_map(|t| t.interfaces().iter().cloned())
            .collect();
        let mut interfaces = Vec::new();
        while let Some(iface) = pending.pop() {
            if seen.insert(iface.hash()) {
                pending.extend(iface.interfaces().iter().cloned());
                interfaces.push(iface);
            }
        }
        interfaces.reverse();

        chain.extend(interfaces);
        chain.push(Type::object());
        chain
    }

    /// Identity, base-chain or interface relationship (`self : target`).
    pub fn is_subtype_of(&self, target: &Type) -> bool {
        self == target || target.is_object() || self.ancestors().iter().any(|a| a == target)
    }

    /// Find the ancestor instantiated from `definition`.
    pub fn find_generic_ancestor(&self, definition: &Type) -> Option<Type> {
        self.ancestors()
            .into_iter()
            .find(|a| a.generic_definition() == Some(definition))
    }

    /// Apply a substitution of generic parameters.
    pub fn substitute(&self, map: &SubstitutionMap) -> Type {
        substitution::substitute(self, map)
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.0.hash == other.0.hash
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.0.name)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}
