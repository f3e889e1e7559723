//! Error types for compilation and invocation.
//!
//! ```text
//! CompilationError  - raised while building an expression into IR
//! RuntimeError      - raised while invoking a compiled artifact
//! ```
//!
//! Builders signal "no match" with `Ok(None)`; a `CompilationError` is only
//! produced for terminal conditions.

use thiserror::Error;

/// Errors raised while compiling a binding expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilationError {
    /// No builder in the pipeline accepted the node.
    #[error("cannot compile expression '{node}'")]
    CannotCompileExpression { node: String },

    /// A member name did not resolve statically or dynamically.
    #[error("member '{member}' cannot be resolved on type '{ty}'")]
    InvalidBindingMember { member: String, ty: String },

    /// An explicit type name could not be resolved.
    #[error("cannot resolve type '{name}'")]
    CannotResolveType { name: String },

    /// The best candidate only matches through unchecked casts.
    #[error("ambiguous call to '{name}': {candidates}")]
    AmbiguousOverload { name: String, candidates: String },

    /// Operand or conversion types are incompatible.
    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    /// A lambda does not fit the delegate signature expected at its call site.
    #[error("invalid lambda: {message}")]
    InvalidLambda { message: String },
}

/// Errors raised while invoking a compiled expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("member '{member}' cannot be resolved on type '{ty}'")]
    InvalidBindingMember { member: String, ty: String },

    #[error("ambiguous call to '{name}' for runtime argument types ({args})")]
    AmbiguousOverload { name: String, args: String },

    #[error("cannot cast '{from}' to '{to}'")]
    InvalidCast { from: String, to: String },

    #[error("null reference while accessing '{member}'")]
    NullReference { member: String },

    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("division by zero")]
    DivideByZero,

    #[error("expected {expected} arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    /// Failure reported by a native member.
    #[error("{message}")]
    Native { message: String },

    /// Compiling the artifact for the observed argument shape failed.
    #[error(transparent)]
    Compilation(#[from] CompilationError),
}

impl CompilationError {
    /// Whether the error only rules out the signature a lambda body was
    /// built against. Unresolvable type names and ambiguous calls fail the
    /// same way for every candidate and are terminal.
    pub fn is_candidate_mismatch(&self) -> bool {
        matches!(
            self,
            CompilationError::CannotCompileExpression { .. }
                | CompilationError::InvalidBindingMember { .. }
                | CompilationError::TypeMismatch { .. }
                | CompilationError::InvalidLambda { .. }
        )
    }
}

impl RuntimeError {
    pub fn native(message: impl Into<String>) -> Self {
        RuntimeError::Native {
            message: message.into(),
        }
    }
}
