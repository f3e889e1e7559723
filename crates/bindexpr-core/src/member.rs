//! Member descriptors supplied by a [`MemberProvider`](crate::MemberProvider).
//!
//! A [`MemberDescriptor`] is a closed description of one property, field,
//! method or indexer: its signature, its generic parameters, how it may be
//! called, and the handle that performs the call. Resolution code matches on
//! [`MemberKind`] instead of inspecting handles.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::{Metadata, RuntimeError, SubstitutionMap, Type, TypeHash, Value, build_substitution_map};

/// Native call target: `(target, args, metadata) -> value`.
///
/// Static members and extension methods receive `None` as target; extension
/// methods get the receiver as their first argument.
pub type NativeFn =
    Arc<dyn Fn(Option<&Value>, &[Value], &Metadata) -> Result<Value, RuntimeError> + Send + Sync>;

bitflags! {
    /// Member kinds to query for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemberKinds: u8 {
        const PROPERTY = 1 << 0;
        const FIELD = 1 << 1;
        const METHOD = 1 << 2;
        const INDEXER = 1 << 3;
        const ACCESSORS = Self::PROPERTY.bits() | Self::FIELD.bits();
    }
}

bitflags! {
    /// Binding flags on descriptors and queries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemberFlags: u8 {
        const INSTANCE = 1 << 0;
        const STATIC = 1 << 1;
        const EXTENSION = 1 << 2;
        /// Query flag: include extension methods applicable to the target.
        const INSTANCE_ALL = Self::INSTANCE.bits() | Self::EXTENSION.bits();
    }
}

/// Kind discriminator of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Property,
    Field,
    Method,
    Indexer,
}

impl MemberKind {
    pub fn as_flags(self) -> MemberKinds {
        match self {
            MemberKind::Property => MemberKinds::PROPERTY,
            MemberKind::Field => MemberKinds::FIELD,
            MemberKind::Method => MemberKinds::METHOD,
            MemberKind::Indexer => MemberKinds::INDEXER,
        }
    }
}

/// How a member is invoked.
#[derive(Clone)]
pub enum MemberHandle {
    /// Directly invocable with converted, padded arguments.
    Native(NativeFn),
    /// Only a descriptor-level invoke exists; call sites go through a
    /// per-call-site dynamic invoker that re-resolves on runtime types.
    Descriptor(NativeFn),
}

impl MemberHandle {
    pub fn is_native(&self) -> bool {
        matches!(self, MemberHandle::Native(_))
    }

    fn callable(&self) -> &NativeFn {
        match self {
            MemberHandle::Native(f) | MemberHandle::Descriptor(f) => f,
        }
    }
}

impl fmt::Debug for MemberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberHandle::Native(_) => f.write_str("Native"),
            MemberHandle::Descriptor(_) => f.write_str("Descriptor"),
        }
    }
}

/// A method or indexer parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    /// Default value used when the argument is omitted.
    pub default: Option<Value>,
    /// Trailing variadic parameter; `ty` is the array type.
    pub is_params: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            is_params: false,
        }
    }

    pub fn with_default(name: impl Into<String>, ty: Type, default: impl Into<Value>) -> Self {
        Self {
            default: Some(default.into()),
            ..Self::new(name, ty)
        }
    }

    /// Variadic parameter over `element`.
    pub fn params(name: impl Into<String>, element: &Type) -> Self {
        Self {
            is_params: true,
            ..Self::new(name, Type::array(element))
        }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Description of one resolvable member.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    pub name: String,
    pub kind: MemberKind,
    pub declaring_type: Type,
    /// Property/field type, or return type of methods and indexers.
    pub ty: Type,
    pub params: Vec<Param>,
    /// Unbound generic parameters of a generic method.
    pub generic_params: Vec<Type>,
    pub flags: MemberFlags,
    pub handle: MemberHandle,
}

impl MemberDescriptor {
    pub fn property(name: impl Into<String>, declaring_type: Type, ty: Type) -> MemberBuilder {
        MemberBuilder::new(name.into(), MemberKind::Property, declaring_type, ty)
    }

    pub fn field(name: impl Into<String>, declaring_type: Type, ty: Type) -> MemberBuilder {
        MemberBuilder::new(name.into(), MemberKind::Field, declaring_type, ty)
    }

    pub fn method(name: impl Into<String>, declaring_type: Type, ret: Type) -> MemberBuilder {
        MemberBuilder::new(name.into(), MemberKind::Method, declaring_type, ret)
    }

    pub fn indexer(declaring_type: Type, ty: Type) -> MemberBuilder {
        MemberBuilder::new("Item".to_string(), MemberKind::Indexer, declaring_type, ty)
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    pub fn is_extension(&self) -> bool {
        self.flags.contains(MemberFlags::EXTENSION)
    }

    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Number of parameters without defaults (the variadic tail is optional).
    pub fn required_param_count(&self) -> usize {
        self.params
            .iter()
            .filter(|p| !p.has_default() && !p.is_params)
            .count()
    }

    pub fn has_params_array(&self) -> bool {
        self.params.last().is_some_and(|p| p.is_params)
    }

    /// Identity of the signature, used to hide overridden base members.
    pub fn signature_hash(&self) -> TypeHash {
        let params: Vec<TypeHash> = self.params.iter().map(|p| p.ty.hash()).collect();
        TypeHash::from_member(TypeHash::EMPTY, &self.name, &params)
    }

    /// Apply a generic substitution to the signature. Mapped generic
    /// parameters are removed from `generic_params`.
    pub fn substitute(&self, map: &SubstitutionMap) -> MemberDescriptor {
        MemberDescriptor {
            name: self.name.clone(),
            kind: self.kind,
            declaring_type: self.declaring_type.substitute(map),
            ty: self.ty.substitute(map),
            params: self
                .params
                .iter()
                .map(|p| Param {
                    ty: p.ty.substitute(map),
                    ..p.clone()
                })
                .collect(),
            generic_params: self
                .generic_params
                .iter()
                .filter(|g| !map.contains_key(&g.hash()))
                .cloned()
                .collect(),
            flags: self.flags,
            handle: self.handle.clone(),
        }
    }

    /// Close a generic method over explicit type arguments.
    pub fn instantiate(&self, type_args: &[Type]) -> Option<MemberDescriptor> {
        if self.generic_params.len() != type_args.len() {
            return None;
        }
        Some(self.substitute(&build_substitution_map(&self.generic_params, type_args)))
    }

    /// Invoke through whichever handle the member exposes.
    pub fn invoke(
        &self,
        target: Option<&Value>,
        args: &[Value],
        metadata: &Metadata,
    ) -> Result<Value, RuntimeError> {
        (self.handle.callable())(target, args, metadata)
    }

    /// Human-readable signature for diagnostics.
    pub fn display_signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                if p.is_params {
                    format!("params {}", p.ty)
                } else {
                    p.ty.to_string()
                }
            })
            .collect();
        format!("{}.{}({})", self.declaring_type, self.name, params.join(", "))
    }
}

/// Fluent construction of a [`MemberDescriptor`].
#[derive(Debug)]
pub struct MemberBuilder {
    descriptor: MemberDescriptor,
}

impl MemberBuilder {
    fn new(name: String, kind: MemberKind, declaring_type: Type, ty: Type) -> Self {
        let unbound: NativeFn = Arc::new(|_, _, _| Err(RuntimeError::native("member has no handle")));
        Self {
            descriptor: MemberDescriptor {
                name,
                kind,
                declaring_type,
                ty,
                params: Vec::new(),
                generic_params: Vec::new(),
                flags: MemberFlags::INSTANCE,
                handle: MemberHandle::Native(unbound),
            },
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.descriptor.params.push(param);
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = Param>) -> Self {
        self.descriptor.params.extend(params);
        self
    }

    pub fn generic_params(mut self, params: Vec<Type>) -> Self {
        self.descriptor.generic_params = params;
        self
    }

    pub fn static_member(mut self) -> Self {
        self.descriptor.flags = MemberFlags::STATIC;
        self
    }

    /// Extension method: the first parameter receives the target.
    pub fn extension(mut self) -> Self {
        self.descriptor.flags = MemberFlags::STATIC | MemberFlags::EXTENSION;
        self
    }

    /// Attach a directly invocable handle.
    pub fn native<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Value>, &[Value], &Metadata) -> Result<Value, RuntimeError>
            + Send
            + Sync
            + 'static,
    {
        self.descriptor.handle = MemberHandle::Native(Arc::new(f));
        self
    }

    /// Attach a descriptor-level invoke only.
    pub fn descriptor<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Value>, &[Value], &Metadata) -> Result<Value, RuntimeError>
            + Send
            + Sync
            + 'static,
    {
        self.descriptor.handle = MemberHandle::Descriptor(Arc::new(f));
        self
    }

    pub fn build(self) -> MemberDescriptor {
        self.descriptor
    }
}
