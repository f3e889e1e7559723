//! Core data model for the bindexpr binding-expression compiler.
//!
//! ## Modules
//!
//! - [`type_hash`]: deterministic type identity
//! - [`types`]: runtime type model (generics, nullability, hierarchy)
//! - [`value`]: dynamic values and delegates
//! - [`ast`]: binding-expression syntax tree
//! - [`member`]: member descriptors and native handles
//! - [`provider`]: member-resolution provider trait and in-memory registry
//! - [`metadata`]: out-of-band invocation metadata
//! - [`convert`]: runtime value conversion
//! - [`error`]: compilation and runtime errors

pub mod ast;
pub mod convert;
pub mod error;
pub mod member;
pub mod metadata;
pub mod provider;
pub mod type_hash;
pub mod types;
pub mod value;

pub use ast::{AstNode, BinaryOp, ParameterRef, UnaryOp};
pub use convert::convert_value;
pub use error::{CompilationError, RuntimeError};
pub use member::{
    MemberBuilder, MemberDescriptor, MemberFlags, MemberHandle, MemberKind, MemberKinds, NativeFn,
    Param,
};
pub use metadata::Metadata;
pub use provider::{MemberProvider, MemberRegistry};
pub use type_hash::TypeHash;
pub use types::{
    ConstraintFlags, GenericConstraints, GenericParam, SubstitutionMap, Type, TypeBuilder,
    TypeFlags, TypeKind, build_substitution_map,
};
pub use value::{ArrayValue, Delegate, DelegateFn, ObjectRef, Value};
