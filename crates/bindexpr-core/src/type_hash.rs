//! Deterministic hash-based type identity.
//!
//! [`TypeHash`] is a 64-bit hash that identifies a type or a member. Hashes are
//! computed from names and generic arguments, so two structurally identical
//! types always compare equal no matter where or when they were constructed.
//! This is what lets the compiled-expression cache key purely on the shape of
//! the supplied arguments.
//!
//! # Examples
//!
//! ```
//! use bindexpr_core::TypeHash;
//!
//! let list = TypeHash::from_name("List`1");
//! let string = TypeHash::from_name("string");
//! let int = TypeHash::from_name("int");
//!
//! // Generic argument lists participate in the hash
//! assert_ne!(
//!     TypeHash::from_generic_instance(list, &[string]),
//!     TypeHash::from_generic_instance(list, &[int]),
//! );
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
///
/// Different entity kinds (types, generic instances, members) produce
/// distinct hashes even when they share a name.
pub mod hash_constants {
    /// Separator constant for argument sequences.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for named types.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for generic instantiations.
    pub const GENERIC: u64 = 0x6b43a9b5d2e1f087;

    /// Domain marker for members.
    pub const MEMBER: u64 = 0x7d3c8b4a92e15f6d;

    /// Positional mixing constants so argument order matters.
    pub const POSITION_MARKERS: [u64; 8] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
    ];
}

/// A deterministic 64-bit hash identifying a type or member.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a type name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Create the hash of a closed generic instantiation.
    ///
    /// `Map<string, int>` and `Map<int, string>` hash differently.
    #[inline]
    pub fn from_generic_instance(definition: TypeHash, args: &[TypeHash]) -> Self {
        TypeHash(mix_sequence(hash_constants::GENERIC ^ definition.0, args))
    }

    /// Create a member hash from its declaring type, name and parameter types.
    #[inline]
    pub fn from_member(owner: TypeHash, name: &str, params: &[TypeHash]) -> Self {
        let seed = hash_constants::MEMBER ^ owner.0 ^ xxh64(name.as_bytes(), 0);
        TypeHash(mix_sequence(seed, params))
    }

    /// Get the raw hash value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Check if this is the empty hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

fn mix_sequence(seed: u64, items: &[TypeHash]) -> u64 {
    let mut hash = seed;
    for (i, item) in items.iter().enumerate() {
        let marker = hash_constants::POSITION_MARKERS
            .get(i)
            .copied()
            .unwrap_or_else(|| hash_constants::POSITION_MARKERS[0].wrapping_add(i as u64));
        // wrapping_mul keeps the mix non-commutative
        hash = hash.wrapping_mul(hash_constants::SEP).wrapping_add(marker ^ item.0);
    }
    hash
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_is_deterministic() {
        assert_eq!(TypeHash::from_name("int"), TypeHash::from_name("int"));
        assert_ne!(TypeHash::from_name("int"), TypeHash::from_name("long"));
    }

    #[test]
    fn generic_argument_order_matters() {
        let map = TypeHash::from_name("Map`2");
        let a = TypeHash::from_name("string");
        let b = TypeHash::from_name("int");
        assert_ne!(
            TypeHash::from_generic_instance(map, &[a, b]),
            TypeHash::from_generic_instance(map, &[b, a])
        );
    }

    #[test]
    fn instance_differs_from_definition() {
        let list = TypeHash::from_name("List`1");
        let inst = TypeHash::from_generic_instance(list, &[TypeHash::from_name("int")]);
        assert_ne!(list, inst);
    }

    #[test]
    fn member_hash_includes_owner() {
        let a = TypeHash::from_name("A");
        let b = TypeHash::from_name("B");
        assert_ne!(
            TypeHash::from_member(a, "Run", &[]),
            TypeHash::from_member(b, "Run", &[])
        );
    }

    #[test]
    fn many_positions_do_not_panic() {
        let args: Vec<_> = (0..20).map(|i| TypeHash::from_name(&i.to_string())).collect();
        let def = TypeHash::from_name("Tuple");
        assert!(!TypeHash::from_generic_instance(def, &args).is_empty());
    }
}
