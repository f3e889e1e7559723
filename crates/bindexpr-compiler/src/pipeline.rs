//! The builder pipeline and its configuration.
//!
//! An [`ExpressionCompiler`] owns an ordered set of [`ExpressionBuilder`]s.
//! For every node the context offers it to each builder by descending
//! priority; the first builder that returns an expression wins.

use std::cmp::Reverse;
use std::sync::Arc;

use bindexpr_core::{AstNode, CompilationError, MemberProvider, Metadata, ParameterRef, Type};

use crate::builders;
use crate::compiled::CompiledExpression;
use crate::context::{BindingKey, CompilationContext};
use crate::ir::IrExpr;

/// Builder priorities of the default pipeline, highest first.
pub mod priority {
    /// Bound parameters and nodes take precedence over any other builder.
    pub const PARAMETER: i32 = 1000;
    pub const NULL_CONDITIONAL: i32 = 900;
    pub const LAMBDA: i32 = 800;
    pub const CONSTANT: i32 = 700;
    pub const OPERATOR: i32 = 600;
    pub const CALL: i32 = 500;
    pub const MEMBER: i32 = 400;
    /// Last resort: resolve by name against runtime types.
    pub const DYNAMIC: i32 = 0;
}

/// One stage of the pipeline.
///
/// `Ok(None)` means "not mine" and passes the node on to the next builder.
/// An error is terminal for the whole compilation.
pub trait ExpressionBuilder: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32;

    fn try_build<'a>(
        &self,
        ctx: &mut CompilationContext<'a>,
        node: &'a AstNode,
    ) -> Result<Option<IrExpr>, CompilationError>;
}

/// Compiler configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerOptions {
    /// Resolve unknown members by name at runtime on non-sealed targets.
    pub dynamic_fallback: bool,
    /// Weight added to extension-method candidates.
    pub extension_bias: f64,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            dynamic_fallback: true,
            extension_bias: 1.1,
        }
    }
}

impl CompilerOptions {
    pub fn with_dynamic_fallback(mut self, enabled: bool) -> Self {
        self.dynamic_fallback = enabled;
        self
    }

    pub fn with_extension_bias(mut self, bias: f64) -> Self {
        self.extension_bias = bias;
        self
    }
}

/// A declared expression parameter.
#[derive(Debug, Clone)]
pub struct ExpressionParameter {
    pub reference: ParameterRef,
    /// Declared type, used when the runtime argument is null.
    pub ty: Type,
}

impl ExpressionParameter {
    pub fn new(index: usize, name: impl Into<String>, ty: Type) -> Self {
        Self {
            reference: ParameterRef::new(index, name),
            ty,
        }
    }
}

/// IR built for one argument shape, with its frame layout.
#[derive(Debug)]
pub struct BuiltExpression {
    pub ir: IrExpr,
    pub slot_count: usize,
    pub metadata_slot: usize,
}

/// Owner of the member provider and the builder pipeline.
///
/// # Thread Safety
///
/// The compiler is immutable once configured and can be shared through an
/// `Arc` by any number of compiled expressions.
pub struct ExpressionCompiler {
    provider: Arc<dyn MemberProvider>,
    builders: Vec<Box<dyn ExpressionBuilder>>,
    options: CompilerOptions,
}

impl ExpressionCompiler {
    /// Compiler with the default pipeline and options.
    pub fn new(provider: Arc<dyn MemberProvider>) -> Self {
        Self::with_options(provider, CompilerOptions::default())
    }

    pub fn with_options(provider: Arc<dyn MemberProvider>, options: CompilerOptions) -> Self {
        let mut compiler = Self {
            provider,
            builders: builders::default_builders(&options),
            options,
        };
        compiler.sort_builders();
        compiler
    }

    /// Add a builder; it is ordered by its priority, after existing builders
    /// of equal priority.
    pub fn with_builder(mut self, builder: impl ExpressionBuilder + 'static) -> Self {
        self.builders.push(Box::new(builder));
        self.sort_builders();
        self
    }

    fn sort_builders(&mut self) {
        self.builders.sort_by_key(|b| Reverse(b.priority()));
    }

    pub fn provider(&self) -> &Arc<dyn MemberProvider> {
        &self.provider
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn builders(&self) -> &[Box<dyn ExpressionBuilder>] {
        &self.builders
    }

    pub fn builder_names(&self) -> Vec<&'static str> {
        self.builders.iter().map(|b| b.name()).collect()
    }

    /// Wrap `ast` for repeated invocation with the given parameters.
    pub fn compile(
        self: &Arc<Self>,
        ast: Arc<AstNode>,
        parameters: Vec<ExpressionParameter>,
    ) -> CompiledExpression {
        CompiledExpression::new(Arc::clone(self), ast, parameters)
    }

    /// Build the IR of `ast` with each parameter typed by `arg_types`.
    pub fn build(
        &self,
        ast: &AstNode,
        parameters: &[ExpressionParameter],
        arg_types: &[Type],
        metadata: &Metadata,
    ) -> Result<BuiltExpression, CompilationError> {
        let mut ctx = CompilationContext::new(self, metadata, parameters.len());
        let bindings = parameters
            .iter()
            .zip(arg_types)
            .enumerate()
            .map(|(slot, (param, ty))| (BindingKey::Parameter(&param.reference), IrExpr::slot(slot, ty.clone())));

        let ir = {
            let mut scope = ctx.bind(bindings);
            scope.build(ast)?
        };
        Ok(BuiltExpression {
            ir,
            slot_count: ctx.slot_count(),
            metadata_slot: ctx.metadata_slot(),
        })
    }
}

impl std::fmt::Debug for ExpressionCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionCompiler")
            .field("builders", &self.builder_names())
            .field("options", &self.options)
            .finish()
    }
}
