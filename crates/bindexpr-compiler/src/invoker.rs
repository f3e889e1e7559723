//! Dynamic call sites.
//!
//! A [`DynamicInvoker`] stands in for a member access whose target could not
//! be fully resolved at compile time: either the member only exposes a
//! descriptor-level invoke, or the target's static type is too weak to find
//! the member at all. Each invocation resolves by name against the runtime
//! types of the target and arguments, and keeps the resolution in a per-site
//! inline cache keyed by those types.
//!
//! # Thread Safety
//!
//! A site is shared by every invocation of the artifact that embeds it. The
//! cache is guarded by a mutex that is never held while the member runs.

use std::sync::{Arc, Mutex, PoisonError};

use bindexpr_core::{
    MemberDescriptor, MemberFlags, MemberKinds, MemberProvider, Metadata, RuntimeError, Type,
    TypeHash, Value, convert_value,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::lower::index_array;
use crate::overload::{ArgSource, PlannedArg, resolve_runtime};

/// What a call site does with its resolved member.
#[derive(Debug, Clone)]
pub enum CallSiteKind {
    /// Property or field read.
    Member,
    /// Method call with optional explicit type arguments.
    Method { type_args: Vec<Type> },
    /// Indexer read.
    Indexer,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InlineKey {
    target: TypeHash,
    args: SmallVec<[TypeHash; 4]>,
}

/// A resolution cached for one runtime shape.
enum ResolvedCall {
    Accessor(Arc<MemberDescriptor>),
    Call {
        member: Arc<MemberDescriptor>,
        plan: Vec<PlannedArg>,
        is_extension: bool,
    },
    /// Built-in element read on arrays.
    ArrayIndex,
}

/// A late-bound member access embedded in a compiled artifact.
pub struct DynamicInvoker {
    kind: CallSiteKind,
    name: String,
    provider: Arc<dyn MemberProvider>,
    extension_bias: f64,
    /// Declaring type for static access; instance sites use the target.
    static_target: Option<Type>,
    cache: Mutex<FxHashMap<InlineKey, Arc<ResolvedCall>>>,
}

impl DynamicInvoker {
    pub fn new(
        kind: CallSiteKind,
        name: String,
        provider: Arc<dyn MemberProvider>,
        extension_bias: f64,
    ) -> Self {
        Self {
            kind,
            name,
            provider,
            extension_bias,
            static_target: None,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    /// Resolve against `ty`'s static members instead of a target value.
    pub fn with_static_target(mut self, ty: Type) -> Self {
        self.static_target = Some(ty);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &CallSiteKind {
        &self.kind
    }

    /// Number of runtime shapes resolved so far.
    pub fn cache_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Resolve for the runtime types of `target` and `args`, then invoke.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn invoke(
        &self,
        target: Option<Value>,
        args: Vec<Value>,
        metadata: &Metadata,
    ) -> Result<Value, RuntimeError> {
        let receiver = match &self.static_target {
            Some(ty) => ty.clone(),
            None => target
                .as_ref()
                .and_then(Value::runtime_type)
                .ok_or_else(|| RuntimeError::NullReference {
                    member: self.name.clone(),
                })?,
        };
        let arg_types: Vec<Type> = args
            .iter()
            .map(|a| a.runtime_type().unwrap_or_else(Type::null))
            .collect();

        let key = InlineKey {
            target: receiver.hash(),
            args: arg_types.iter().map(Type::hash).collect(),
        };
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        let resolved = match cached {
            Some(resolved) => resolved,
            None => {
                trace!(site = %self.name, target = %receiver, "inline cache miss");
                let resolved = Arc::new(self.resolve(&receiver, &arg_types, metadata)?);
                self.cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key, Arc::clone(&resolved));
                resolved
            }
        };

        let target = if self.static_target.is_some() { None } else { target };
        match resolved.as_ref() {
            ResolvedCall::Accessor(member) => member.invoke(target.as_ref(), &[], metadata),
            ResolvedCall::ArrayIndex => {
                let array = target.unwrap_or_default();
                let index = args.first().cloned().unwrap_or_default();
                index_array(&array, &index)
            }
            ResolvedCall::Call {
                member,
                plan,
                is_extension,
            } => {
                let mut effective = Vec::with_capacity(args.len() + 1);
                if *is_extension {
                    effective.push(target.clone().unwrap_or_default());
                }
                effective.extend(args);
                let values = apply_plan(plan, effective)?;
                let target = if *is_extension || member.is_static() {
                    None
                } else {
                    target
                };
                member.invoke(target.as_ref(), &values, metadata)
            }
        }
    }

    fn resolve(
        &self,
        receiver: &Type,
        arg_types: &[Type],
        metadata: &Metadata,
    ) -> Result<ResolvedCall, RuntimeError> {
        let is_static = self.static_target.is_some();
        let instance_flags = |extensions: bool| match (is_static, extensions) {
            (true, _) => MemberFlags::STATIC,
            (false, true) => MemberFlags::INSTANCE_ALL,
            (false, false) => MemberFlags::INSTANCE,
        };

        let (kinds, flags, explicit): (MemberKinds, MemberFlags, &[Type]) = match &self.kind {
            CallSiteKind::Member => {
                let found = self.provider.get_members(
                    receiver,
                    &self.name,
                    MemberKinds::ACCESSORS,
                    instance_flags(false),
                    metadata,
                );
                return match found.into_iter().next() {
                    Some(member) => Ok(ResolvedCall::Accessor(member)),
                    None => Err(self.unresolved(receiver)),
                };
            }
            CallSiteKind::Method { type_args } => {
                (MemberKinds::METHOD, instance_flags(true), type_args.as_slice())
            }
            CallSiteKind::Indexer => (MemberKinds::INDEXER, instance_flags(false), &[] as &[Type]),
        };

        let candidates = self
            .provider
            .get_members(receiver, &self.name, kinds, flags, metadata);
        let extension_receiver = if is_static { None } else { Some(receiver) };
        let best = resolve_runtime(
            &candidates,
            extension_receiver,
            arg_types,
            explicit,
            self.extension_bias,
        )
        .map_err(|ambiguity| {
            trace!(site = %self.name, candidates = %ambiguity.describe(), "ambiguous at runtime");
            RuntimeError::AmbiguousOverload {
                name: self.name.clone(),
                args: arg_types
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            }
        })?;

        match best {
            Some(score) => Ok(ResolvedCall::Call {
                plan: score.plan(),
                is_extension: score.is_extension,
                member: score.member,
            }),
            None if matches!(self.kind, CallSiteKind::Indexer)
                && receiver.element_type().is_some()
                && matches!(arg_types, [t] if *t == Type::int() || *t == Type::long()) =>
            {
                Ok(ResolvedCall::ArrayIndex)
            }
            None => Err(self.unresolved(receiver)),
        }
    }

    fn unresolved(&self, receiver: &Type) -> RuntimeError {
        RuntimeError::InvalidBindingMember {
            member: self.name.clone(),
            ty: receiver.to_string(),
        }
    }
}

/// Convert, pad and pack `args` according to `plan`.
fn apply_plan(plan: &[PlannedArg], args: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
    plan.iter()
        .map(|planned| match &planned.source {
            ArgSource::Arg(index) => {
                convert_value(args.get(*index).cloned().unwrap_or_default(), &planned.ty)
            }
            ArgSource::Default(value) => Ok(value.clone()),
            ArgSource::Array { element, start } => {
                let items = args
                    .iter()
                    .skip(*start)
                    .map(|item| convert_value(item.clone(), element))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(element.clone(), items))
            }
        })
        .collect()
}

impl std::fmt::Debug for DynamicInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicInvoker")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("static_target", &self.static_target)
            .field("cached", &self.cache_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bindexpr_core::{MemberRegistry, Param, TypeBuilder};

    struct Zoo {
        registry: MemberRegistry,
        animal: Type,
        dog: Type,
    }

    fn zoo() -> Zoo {
        let animal = TypeBuilder::class("Animal").build();
        let dog = TypeBuilder::class("Dog").base(animal.clone()).build();
        let mut registry = MemberRegistry::new();
        registry.register_member(
            MemberDescriptor::property("Sound", dog.clone(), Type::string())
                .native(|_, _, _| Ok(Value::str("woof")))
                .build(),
        );
        registry.register_member(
            MemberDescriptor::method("Fetch", dog.clone(), Type::string())
                .param(Param::new("count", Type::long()))
                .native(|_, args, _| Ok(Value::str(format!("long {}", args[0].as_long().unwrap_or(0)))))
                .build(),
        );
        registry.register_member(
            MemberDescriptor::method("Fetch", dog.clone(), Type::string())
                .param(Param::new("item", Type::string()))
                .native(|_, args, _| Ok(Value::str(format!("item {}", args[0]))))
                .build(),
        );
        Zoo {
            registry,
            animal,
            dog,
        }
    }

    fn site(zoo: Zoo, kind: CallSiteKind, name: &str) -> (DynamicInvoker, Type, Type) {
        let Zoo {
            registry,
            animal,
            dog,
        } = zoo;
        (
            DynamicInvoker::new(kind, name.to_string(), Arc::new(registry), 1.1),
            animal,
            dog,
        )
    }

    #[test]
    fn resolves_against_runtime_type() {
        let (site, _, dog) = site(zoo(), CallSiteKind::Member, "Sound");
        let rex = Value::object(dog, ());
        let result = site.invoke(Some(rex), Vec::new(), &Metadata::new()).unwrap();
        assert_eq!(result, Value::str("woof"));
    }

    #[test]
    fn overloads_follow_argument_types() {
        let (site, _, dog) = site(
            zoo(),
            CallSiteKind::Method {
                type_args: Vec::new(),
            },
            "Fetch",
        );
        let rex = Value::object(dog, ());
        let metadata = Metadata::new();
        assert_eq!(
            site.invoke(Some(rex.clone()), vec![Value::Int(2)], &metadata).unwrap(),
            Value::str("long 2")
        );
        assert_eq!(
            site.invoke(Some(rex.clone()), vec![Value::str("ball")], &metadata).unwrap(),
            Value::str("item ball")
        );
        // One entry per argument shape
        site.invoke(Some(rex), vec![Value::Int(7)], &metadata).unwrap();
        assert_eq!(site.cache_len(), 2);
    }

    #[test]
    fn null_target_is_a_null_reference() {
        let (site, _, _) = site(zoo(), CallSiteKind::Member, "Sound");
        assert!(matches!(
            site.invoke(Some(Value::Null), Vec::new(), &Metadata::new()),
            Err(RuntimeError::NullReference { .. })
        ));
    }

    #[test]
    fn missing_member_names_runtime_type() {
        let (site, animal, _) = site(zoo(), CallSiteKind::Member, "Sound");
        let cat = Value::object(animal, ());
        assert_eq!(
            site.invoke(Some(cat), Vec::new(), &Metadata::new()).unwrap_err(),
            RuntimeError::InvalidBindingMember {
                member: "Sound".to_string(),
                ty: "Animal".to_string(),
            }
        );
    }

    #[test]
    fn failed_resolutions_are_not_cached() {
        let (site, animal, _) = site(zoo(), CallSiteKind::Member, "Sound");
        let cat = Value::object(animal, ());
        assert!(site.invoke(Some(cat), Vec::new(), &Metadata::new()).is_err());
        assert_eq!(site.cache_len(), 0);
    }

    #[test]
    fn arrays_index_dynamically() {
        let (site, _, _) = site(zoo(), CallSiteKind::Indexer, "Item");
        let xs = Value::array(Type::int(), vec![Value::Int(4), Value::Int(5)]);
        assert_eq!(
            site.invoke(Some(xs), vec![Value::Int(1)], &Metadata::new()).unwrap(),
            Value::Int(5)
        );
    }

    #[test]
    fn static_sites_pass_no_target() {
        let config = TypeBuilder::class("Config").build();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut registry = MemberRegistry::new();
        registry.register_member(
            MemberDescriptor::property("Version", config.clone(), Type::int())
                .static_member()
                .descriptor(move |target, _, _| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    assert!(target.is_none());
                    Ok(Value::Int(3))
                })
                .build(),
        );
        let site = DynamicInvoker::new(CallSiteKind::Member, "Version".to_string(), Arc::new(registry), 1.1)
            .with_static_target(config);
        assert_eq!(site.invoke(None, Vec::new(), &Metadata::new()).unwrap(), Value::Int(3));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
