//! Argument conversion weights.
//!
//! Determines whether a value of one static type can flow into a slot of
//! another, and how much that costs for overload resolution. Weights only
//! ever depend on types, never on values, so the same argument shape always
//! selects the same candidate.
//!
//! ## Weight tiers
//!
//! 1. Exact match (0)
//! 2. Implicit conversion: numeric widening, nullable lifting, reference
//!    up-cast, null literal to a nullable slot (1.0)
//! 3. Boxing: value type into a reference slot (1.1)
//! 4. Unchecked cast from a reference type with no known conversion (1000)
//!
//! A value type with no known conversion is rejected outright.

use bindexpr_core::{Type, TypeKind};

/// A conversion with its overload-resolution weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub kind: ConversionKind,
    pub weight: f64,
}

/// The kind of conversion being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    /// No conversion needed.
    Identity,
    /// Implicit, allocation-free conversion.
    Implicit,
    /// Value type boxed into a reference slot.
    Boxing,
    /// Tentative cast checked only at runtime.
    Unchecked,
}

impl Conversion {
    pub const WEIGHT_EXACT: f64 = 0.0;
    pub const WEIGHT_IMPLICIT: f64 = 1.0;
    pub const WEIGHT_BOXING: f64 = 1.1;
    pub const WEIGHT_UNCHECKED: f64 = 1000.0;

    pub fn identity() -> Self {
        Self {
            kind: ConversionKind::Identity,
            weight: Self::WEIGHT_EXACT,
        }
    }

    fn implicit() -> Self {
        Self {
            kind: ConversionKind::Implicit,
            weight: Self::WEIGHT_IMPLICIT,
        }
    }

    fn boxing() -> Self {
        Self {
            kind: ConversionKind::Boxing,
            weight: Self::WEIGHT_BOXING,
        }
    }

    fn unchecked() -> Self {
        Self {
            kind: ConversionKind::Unchecked,
            weight: Self::WEIGHT_UNCHECKED,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.kind == ConversionKind::Identity
    }

    /// Usable without an explicit cast.
    pub fn is_implicit(&self) -> bool {
        self.kind != ConversionKind::Unchecked
    }
}

/// Find the conversion from `source` to `target`, if any.
pub fn find_conversion(source: &Type, target: &Type) -> Option<Conversion> {
    if source == target {
        return Some(Conversion::identity());
    }

    // Unbound generic slots accept anything; inference settles them later
    if target.is_generic_param() {
        return Some(Conversion::implicit());
    }

    if source.is_null() {
        return target.can_be_null().then(Conversion::implicit);
    }

    if let Some(conv) = find_numeric_conversion(source, target) {
        return Some(conv);
    }

    if let Some(conv) = find_delegate_conversion(source, target) {
        return Some(conv);
    }

    if source.is_subtype_of(target) {
        return Some(if source.is_value_type() && !target.is_value_type() {
            Conversion::boxing()
        } else {
            Conversion::implicit()
        });
    }

    if !source.is_value_type() {
        return Some(Conversion::unchecked());
    }

    None
}

/// Numeric widening and nullable lifting.
fn find_numeric_conversion(source: &Type, target: &Type) -> Option<Conversion> {
    let lifted = target.is_nullable();
    let underlying = target.non_nullable();

    if lifted && source.non_nullable() == underlying {
        return Some(Conversion::implicit());
    }

    match (source.non_nullable().numeric_rank(), underlying.numeric_rank()) {
        (Some(from), Some(to)) if from < to => {
            // Nullable source cannot flow into a non-nullable slot implicitly
            if source.is_nullable() && !lifted {
                None
            } else {
                Some(Conversion::implicit())
            }
        }
        _ => None,
    }
}

/// Delegates convert when parameters match and the return type converts.
fn find_delegate_conversion(source: &Type, target: &Type) -> Option<Conversion> {
    let (TypeKind::Delegate { params: sp, ret: sr }, TypeKind::Delegate { params: tp, ret: tr }) =
        (source.kind(), target.kind())
    else {
        return None;
    };
    if sp.len() != tp.len() || sp.iter().zip(tp.iter()).any(|(s, t)| s != t) {
        return None;
    }
    if tr.is_void() {
        return Some(Conversion::implicit());
    }
    match find_conversion(sr, tr) {
        Some(conv) if conv.is_implicit() => Some(Conversion::implicit()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindexpr_core::{GenericConstraints, TypeBuilder};

    #[test]
    fn exact_match_is_free() {
        let conv = find_conversion(&Type::int(), &Type::int()).unwrap();
        assert!(conv.is_exact());
        assert_eq!(conv.weight, Conversion::WEIGHT_EXACT);
    }

    #[test]
    fn widening_is_implicit() {
        let conv = find_conversion(&Type::int(), &Type::long()).unwrap();
        assert_eq!(conv.kind, ConversionKind::Implicit);
        assert!(find_conversion(&Type::double(), &Type::int()).is_none());
    }

    #[test]
    fn boxing_costs_more_than_implicit() {
        let conv = find_conversion(&Type::int(), &Type::object()).unwrap();
        assert_eq!(conv.kind, ConversionKind::Boxing);
        assert!(conv.weight > Conversion::WEIGHT_IMPLICIT);
    }

    #[test]
    fn reference_downcast_is_unchecked() {
        let conv = find_conversion(&Type::object(), &Type::string()).unwrap();
        assert_eq!(conv.kind, ConversionKind::Unchecked);
        assert_eq!(conv.weight, Conversion::WEIGHT_UNCHECKED);
    }

    #[test]
    fn value_type_mismatch_is_rejected() {
        assert!(find_conversion(&Type::int(), &Type::string()).is_none());
        assert!(find_conversion(&Type::bool(), &Type::int()).is_none());
    }

    #[test]
    fn null_literal_needs_nullable_slot() {
        assert!(find_conversion(&Type::null(), &Type::string()).is_some());
        assert!(find_conversion(&Type::null(), &Type::nullable(&Type::int())).is_some());
        assert!(find_conversion(&Type::null(), &Type::int()).is_none());
    }

    #[test]
    fn nullable_lifting() {
        let n_long = Type::nullable(&Type::long());
        assert!(find_conversion(&Type::int(), &n_long).is_some());
        assert!(find_conversion(&Type::nullable(&Type::int()), &Type::long()).is_none());
    }

    #[test]
    fn reference_upcast_is_implicit() {
        let animal = TypeBuilder::class("Animal").build();
        let dog = TypeBuilder::class("Dog").base(animal.clone()).build();
        let conv = find_conversion(&dog, &animal).unwrap();
        assert_eq!(conv.kind, ConversionKind::Implicit);
    }

    #[test]
    fn delegate_return_covariance() {
        let from = Type::delegate(vec![Type::string()], Type::int());
        let to = Type::delegate(vec![Type::string()], Type::long());
        let to_void = Type::delegate(vec![Type::string()], Type::void());
        let other = Type::delegate(vec![Type::int()], Type::int());
        assert!(find_conversion(&from, &to).is_some());
        assert!(find_conversion(&from, &to_void).is_some());
        // Delegates are reference types, so a mismatch falls to the unchecked tier
        assert_eq!(
            find_conversion(&from, &other).map(|c| c.kind),
            Some(ConversionKind::Unchecked)
        );
    }

    #[test]
    fn generic_slots_accept_anything() {
        let t = Type::generic_param("F.T", 0, GenericConstraints::none());
        assert!(find_conversion(&Type::int(), &t).is_some());
    }
}
