//! Runtime compiler for UI data-binding expressions.
//!
//! A binding template is parsed once into an [`AstNode`] tree. Wrapping it
//! in a [`CompiledExpression`] gives a callable that builds native code
//! lazily for every distinct shape of argument types it sees:
//!
//! ```
//! use std::sync::Arc;
//! use bindexpr::prelude::*;
//!
//! let compiler = Arc::new(ExpressionCompiler::new(Arc::new(MemberRegistry::new())));
//! let mut expr = compiler.compile(
//!     AstNode::binary(BinaryOp::Mul, AstNode::parameter(0, "x"), AstNode::constant(2)),
//!     vec![ExpressionParameter::new(0, "x", Type::object())],
//! );
//! let metadata = Metadata::new();
//! assert_eq!(expr.invoke(&[Value::Int(21)], &metadata).unwrap(), Value::Int(42));
//! assert_eq!(expr.invoke(&[Value::Double(1.5)], &metadata).unwrap(), Value::Double(3.0));
//! assert_eq!(expr.artifact_count(), 2);
//! ```
//!
//! Member lookups go through a [`MemberProvider`]; [`MemberRegistry`] is
//! the in-memory implementation.

pub use bindexpr_compiler::{
    CompiledExpression, CompilerOptions, ExpressionBuilder, ExpressionCompiler, ExpressionParameter,
};
pub use bindexpr_core::{
    AstNode, CompilationError, MemberDescriptor, MemberProvider, MemberRegistry, Metadata,
    RuntimeError, Type, Value,
};

pub mod prelude {
    pub use bindexpr_compiler::{
        CompiledExpression, CompilerOptions, ExpressionCompiler, ExpressionParameter,
    };
    pub use bindexpr_core::{
        AstNode, BinaryOp, CompilationError, GenericConstraints, MemberDescriptor, MemberProvider,
        MemberRegistry, Metadata, Param, RuntimeError, Type, TypeBuilder, UnaryOp, Value,
    };
}
