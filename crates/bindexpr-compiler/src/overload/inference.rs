//! Generic argument inference.
//!
//! Positional unification of a parameter type against an argument type.
//! Bindings accumulate in a [`SubstitutionMap`]; a conflicting binding only
//! fails when neither type converts implicitly into the other.

use bindexpr_core::{SubstitutionMap, Type, TypeHash, TypeKind};
use rustc_hash::FxHashSet;

use crate::conversion::{ConversionKind, find_conversion};

/// Unify `param` against `arg`, binding generic parameters listed in
/// `generics`. Returns `false` on an irreconcilable conflict.
///
/// Arguments that carry no type information (`null`) or whose shape does
/// not match the parameter contribute nothing; compatibility is checked
/// later when the candidate is scored.
pub fn unify(
    param: &Type,
    arg: &Type,
    generics: &FxHashSet<TypeHash>,
    map: &mut SubstitutionMap,
) -> bool {
    if arg.is_null() || !param.contains_generic_params() {
        return true;
    }

    match param.kind() {
        TypeKind::GenericParam(_) => {
            if generics.contains(&param.hash()) {
                bind(param, arg, map)
            } else {
                true
            }
        }
        TypeKind::Array(element) => match arg.element_type() {
            Some(arg_element) => unify(element, arg_element, generics, map),
            None => true,
        },
        TypeKind::Delegate { params, ret } => match arg.delegate_signature() {
            Some((arg_params, arg_ret)) if arg_params.len() == params.len() => {
                params
                    .iter()
                    .zip(arg_params)
                    .all(|(p, a)| unify(p, a, generics, map))
                    && unify(ret, arg_ret, generics, map)
            }
            _ => true,
        },
        _ => {
            let Some(definition) = param.generic_definition() else {
                return true;
            };
            // Nullable<T> accepts a bare value type
            if param.is_nullable() && !arg.is_nullable() && arg.is_value_type() {
                return unify(&param.generic_args()[0], arg, generics, map);
            }
            match arg.find_generic_ancestor(definition) {
                Some(instance) => param
                    .generic_args()
                    .iter()
                    .zip(instance.generic_args())
                    .all(|(p, a)| unify(p, a, generics, map)),
                None => true,
            }
        }
    }
}

fn bind(param: &Type, arg: &Type, map: &mut SubstitutionMap) -> bool {
    let key = param.hash();
    let Some(existing) = map.get(&key) else {
        map.insert(key, arg.clone());
        return true;
    };
    if existing == arg || widens(arg, existing) {
        return true;
    }
    if widens(existing, arg) {
        map.insert(key, arg.clone());
        return true;
    }
    false
}

fn widens(from: &Type, to: &Type) -> bool {
    find_conversion(from, to).is_some_and(|c| c.kind != ConversionKind::Unchecked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindexpr_core::{GenericConstraints, TypeBuilder};

    fn param(name: &str, position: usize) -> Type {
        Type::generic_param(name, position, GenericConstraints::none())
    }

    fn set(params: &[&Type]) -> FxHashSet<TypeHash> {
        params.iter().map(|p| p.hash()).collect()
    }

    #[test]
    fn binds_direct_parameter() {
        let t = param("M.T", 0);
        let mut map = SubstitutionMap::default();
        assert!(unify(&t, &Type::string(), &set(&[&t]), &mut map));
        assert_eq!(map.get(&t.hash()), Some(&Type::string()));
    }

    #[test]
    fn finds_generic_ancestor() {
        let t = param("IEnumerable.T", 0);
        let enumerable = TypeBuilder::interface("IEnumerable")
            .generic_params(vec![t.clone()])
            .build();
        let lt = param("List.T", 0);
        let list = TypeBuilder::class("List")
            .implements(enumerable.instantiate(&[lt.clone()]).unwrap())
            .generic_params(vec![lt])
            .build();

        let mt = param("Ext.Select.T", 0);
        let receiver = enumerable.instantiate(&[mt.clone()]).unwrap();
        let list_of_string = list.instantiate(&[Type::string()]).unwrap();

        let mut map = SubstitutionMap::default();
        assert!(unify(&receiver, &list_of_string, &set(&[&mt]), &mut map));
        assert_eq!(map.get(&mt.hash()), Some(&Type::string()));
    }

    #[test]
    fn delegate_return_is_inferred() {
        let t = param("M.T", 0);
        let r = param("M.R", 1);
        let expected = Type::delegate(vec![t.clone()], r.clone());
        let actual = Type::delegate(vec![Type::string()], Type::int());

        let mut map = SubstitutionMap::default();
        assert!(unify(&expected, &actual, &set(&[&t, &r]), &mut map));
        assert_eq!(map.get(&r.hash()), Some(&Type::int()));
    }

    #[test]
    fn conflicting_bindings_widen_or_fail() {
        let t = param("M.T", 0);
        let generics = set(&[&t]);
        let mut map = SubstitutionMap::default();
        assert!(unify(&t, &Type::int(), &generics, &mut map));
        assert!(unify(&t, &Type::long(), &generics, &mut map));
        assert_eq!(map.get(&t.hash()), Some(&Type::long()));
        assert!(!unify(&t, &Type::bool(), &generics, &mut map));
    }

    #[test]
    fn null_contributes_nothing() {
        let t = param("M.T", 0);
        let mut map = SubstitutionMap::default();
        assert!(unify(&t, &Type::null(), &set(&[&t]), &mut map));
        assert!(map.is_empty());
    }
}
