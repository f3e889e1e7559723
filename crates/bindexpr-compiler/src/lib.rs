//! Compiler for bindexpr binding expressions.
//!
//! ```text
//! AstNode ──► builder pipeline ──► IrExpr ──► lower ──► LoweredFn
//!               │                                          │
//!               └─ overload resolution                     └─ cached per
//!                  dynamic call sites                         argument shape
//! ```
//!
//! ## Modules
//!
//! - [`pipeline`]: [`ExpressionCompiler`], the builder trait and options
//! - [`builders`]: the default builders
//! - [`context`]: per-compilation bindings, lambda signatures, frame slots
//! - [`overload`]: candidate inference, scoring and ranking
//! - [`conversion`]: static conversion classification and weights
//! - [`ir`]: typed intermediate representation
//! - [`lower`]: IR to closures
//! - [`invoker`]: late-bound call sites with inline caches
//! - [`compiled`]: [`CompiledExpression`] and its artifact cache

pub mod builders;
pub mod compiled;
pub mod context;
pub mod conversion;
pub mod invoker;
pub mod ir;
pub mod lower;
pub mod overload;
pub mod pipeline;

pub use compiled::{CacheKey, CompiledArtifact, CompiledExpression};
pub use context::{BindingKey, CompilationContext};
pub use conversion::{Conversion, ConversionKind, find_conversion};
pub use invoker::{CallSiteKind, DynamicInvoker};
pub use ir::{IrExpr, IrKind};
pub use lower::{LoweredFn, lower};
pub use pipeline::{
    BuiltExpression, CompilerOptions, ExpressionBuilder, ExpressionCompiler, ExpressionParameter,
    priority,
};
