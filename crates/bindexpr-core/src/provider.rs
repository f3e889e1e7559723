//! Member resolution provider.
//!
//! The compiler never inspects host types itself; it asks a
//! [`MemberProvider`] for candidate descriptors by type and name.
//! [`MemberRegistry`] is the in-memory provider used by hosts that describe
//! their types up front.
//!
//! # Thread Safety
//!
//! Providers are shared between compilations and dynamic call sites, so the
//! trait requires `Send + Sync`. `MemberRegistry` is populated once and is
//! read-only afterwards.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    MemberDescriptor, MemberFlags, MemberKinds, Metadata, Type, TypeHash, TypeKind,
    build_substitution_map,
};

/// Source of member descriptors and named types.
pub trait MemberProvider: Send + Sync {
    /// Members called `name` on `ty`, most derived first.
    fn get_members(
        &self,
        ty: &Type,
        name: &str,
        kinds: MemberKinds,
        flags: MemberFlags,
        metadata: &Metadata,
    ) -> Vec<Arc<MemberDescriptor>>;

    /// Resolve a type by name (explicit generic arguments, static access).
    fn resolve_type(&self, name: &str) -> Option<Type>;
}

/// In-memory [`MemberProvider`].
///
/// Members registered on a generic definition are returned substituted for
/// the queried instantiation. Extension methods are indexed by name and
/// returned when their first parameter accepts the queried type.
#[derive(Default)]
pub struct MemberRegistry {
    /// Members keyed by declaring type (generic definition for instances).
    members: FxHashMap<TypeHash, Vec<Arc<MemberDescriptor>>>,
    /// Extension methods by name.
    extensions: FxHashMap<String, Vec<Arc<MemberDescriptor>>>,
    /// Named types.
    types: FxHashMap<String, Type>,
}

impl MemberRegistry {
    /// Create a registry with the primitive types registered.
    pub fn new() -> Self {
        let mut registry = Self::default();
        for ty in [
            Type::object(),
            Type::bool(),
            Type::int(),
            Type::long(),
            Type::double(),
            Type::string(),
        ] {
            registry.register_type(ty);
        }
        registry
    }

    pub fn register_type(&mut self, ty: Type) {
        self.types.insert(ty.name().to_string(), ty);
    }

    pub fn register_member(&mut self, member: MemberDescriptor) {
        let member = Arc::new(member);
        if member.is_extension() {
            self.extensions
                .entry(member.name.clone())
                .or_default()
                .push(member);
        } else {
            self.members
                .entry(member.declaring_type.hash())
                .or_default()
                .push(member);
        }
    }

    /// Number of registered members, extensions included.
    pub fn member_count(&self) -> usize {
        self.members.values().map(Vec::len).sum::<usize>()
            + self.extensions.values().map(Vec::len).sum::<usize>()
    }

    fn collect_declared(
        &self,
        ty: &Type,
        name: &str,
        kinds: MemberKinds,
        flags: MemberFlags,
        out: &mut Vec<Arc<MemberDescriptor>>,
        hidden: &mut FxHashSet<TypeHash>,
    ) {
        // Static members are not inherited through interfaces
        let scope: Vec<Type> = if flags.contains(MemberFlags::INSTANCE) {
            ty.ancestors()
        } else {
            let mut chain = vec![ty.clone()];
            let mut current = ty.base().cloned();
            while let Some(base) = current {
                current = base.base().cloned();
                chain.push(base);
            }
            chain
        };

        for owner in scope {
            let (key, map) = match owner.generic_definition() {
                Some(def) => (
                    def.hash(),
                    Some(build_substitution_map(def.generic_params(), owner.generic_args())),
                ),
                None => (owner.hash(), None),
            };
            let Some(declared) = self.members.get(&key) else {
                continue;
            };
            for member in declared {
                if member.name != name || !kinds.intersects(member.kind.as_flags()) {
                    continue;
                }
                let wanted = if member.is_static() {
                    MemberFlags::STATIC
                } else {
                    MemberFlags::INSTANCE
                };
                if !flags.contains(wanted) {
                    continue;
                }
                let member = match &map {
                    Some(map) => Arc::new(member.substitute(map)),
                    None => Arc::clone(member),
                };
                // Most derived declaration of a signature wins
                if hidden.insert(member.signature_hash()) {
                    out.push(member);
                }
            }
        }
    }

    fn collect_extensions(&self, ty: &Type, name: &str, out: &mut Vec<Arc<MemberDescriptor>>) {
        let Some(candidates) = self.extensions.get(name) else {
            return;
        };
        for member in candidates {
            let Some(receiver) = member.params.first() else {
                continue;
            };
            if extension_accepts(&receiver.ty, ty) {
                out.push(Arc::clone(member));
            }
        }
    }
}

/// Whether an extension receiver parameter can bind `ty`.
fn extension_accepts(receiver: &Type, ty: &Type) -> bool {
    match receiver.kind() {
        TypeKind::GenericParam(_) => true,
        TypeKind::Array(element) if element.contains_generic_params() => {
            ty.element_type().is_some()
        }
        _ => match receiver.generic_definition() {
            Some(def) if receiver.contains_generic_params() => {
                ty.find_generic_ancestor(def).is_some()
            }
            _ => ty.is_subtype_of(receiver),
        },
    }
}

impl MemberProvider for MemberRegistry {
    fn get_members(
        &self,
        ty: &Type,
        name: &str,
        kinds: MemberKinds,
        flags: MemberFlags,
        _metadata: &Metadata,
    ) -> Vec<Arc<MemberDescriptor>> {
        let mut out = Vec::new();
        let mut hidden = FxHashSet::default();
        self.collect_declared(ty, name, kinds, flags, &mut out, &mut hidden);
        if flags.contains(MemberFlags::EXTENSION) && kinds.contains(MemberKinds::METHOD) {
            self.collect_extensions(ty, name, &mut out);
        }
        out
    }

    fn resolve_type(&self, name: &str) -> Option<Type> {
        self.types.get(name).cloned()
    }
}
