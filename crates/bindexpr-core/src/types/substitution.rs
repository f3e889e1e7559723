//! Generic parameter substitution.

use rustc_hash::FxHashMap;

use super::{Type, TypeKind};
use crate::TypeHash;

/// Map from generic parameter hash to concrete type.
pub type SubstitutionMap = FxHashMap<TypeHash, Type>;

/// Pair generic parameters with arguments positionally.
///
/// Extra parameters or arguments are ignored; callers check arity first.
pub fn build_substitution_map(params: &[Type], args: &[Type]) -> SubstitutionMap {
    params
        .iter()
        .zip(args.iter())
        .map(|(param, arg)| (param.hash(), arg.clone()))
        .collect()
}

/// Replace every mapped generic parameter occurring in `ty`.
pub(super) fn substitute(ty: &Type, map: &SubstitutionMap) -> Type {
    if map.is_empty() {
        return ty.clone();
    }
    match ty.kind() {
        TypeKind::GenericParam(_) => map.get(&ty.hash()).cloned().unwrap_or_else(|| ty.clone()),
        TypeKind::Array(element) => {
            let element = substitute(element, map);
            Type::array(&element)
        }
        TypeKind::Delegate { params, ret } => {
            let params = params.iter().map(|p| substitute(p, map)).collect();
            Type::delegate(params, substitute(ret, map))
        }
        _ => match ty.generic_definition() {
            Some(definition) if ty.contains_generic_params() => {
                let args: Vec<Type> = ty.generic_args().iter().map(|a| substitute(a, map)).collect();
                definition.instantiate(&args).unwrap_or_else(|| ty.clone())
            }
            _ => ty.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GenericConstraints, TypeBuilder};

    #[test]
    fn substitutes_nested_positions() {
        let t = Type::generic_param("F.T", 0, GenericConstraints::none());
        let map = build_substitution_map(std::slice::from_ref(&t), &[Type::string()]);

        assert_eq!(t.substitute(&map), Type::string());
        assert_eq!(Type::array(&t).substitute(&map), Type::array(&Type::string()));

        let func = Type::delegate(vec![t.clone()], Type::bool());
        assert_eq!(
            func.substitute(&map),
            Type::delegate(vec![Type::string()], Type::bool())
        );
    }

    #[test]
    fn substitutes_generic_instances() {
        let u = Type::generic_param("Box.U", 0, GenericConstraints::none());
        let boxed = TypeBuilder::class("Box").generic_params(vec![u]).build();
        let t = Type::generic_param("F.T", 0, GenericConstraints::none());
        let box_t = boxed.instantiate(std::slice::from_ref(&t)).unwrap();

        let map = build_substitution_map(&[t], &[Type::int()]);
        assert_eq!(
            box_t.substitute(&map),
            boxed.instantiate(&[Type::int()]).unwrap()
        );
    }

    #[test]
    fn unmapped_params_survive() {
        let t = Type::generic_param("F.T", 0, GenericConstraints::none());
        let other = Type::generic_param("F.U", 1, GenericConstraints::none());
        let map = build_substitution_map(&[other], &[Type::int()]);
        assert_eq!(t.substitute(&map), t);
    }
}
