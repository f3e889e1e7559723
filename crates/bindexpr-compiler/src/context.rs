//! Per-compilation state shared by every builder.
//!
//! The context owns the substitution table (parameter and node bindings),
//! the stack of expected lambda signatures, and frame slot allocation. A
//! context lives for exactly one artifact build and is never shared.
//!
//! Bindings and expected signatures are pushed through scope guards that
//! restore the previous state when dropped, so a builder that fails halfway
//! (or returns early with `?`) cannot leak a binding into its siblings.
//!
//! A static builder that builds a receiver and arguments and then finds no
//! member hands that work to the next builder of the same node through
//! `CompilationContext::stash_prebuilt`, so a late-bound fallback does not
//! build the subtree a second time.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use bindexpr_core::{
    AstNode, CompilationError, MemberProvider, Metadata, ParameterRef, Type,
};

use crate::builders::Receiver;
use crate::ir::IrExpr;
use crate::pipeline::{CompilerOptions, ExpressionCompiler};

/// Key of a substitution: a parameter by identity, or a node by address.
#[derive(Debug, Clone, Copy)]
pub enum BindingKey<'a> {
    Parameter(&'a ParameterRef),
    Node(&'a AstNode),
}

impl BindingKey<'_> {
    fn matches(&self, node: &AstNode) -> bool {
        match (self, node) {
            (BindingKey::Parameter(p), AstNode::Parameter(q)) => *p == q,
            (BindingKey::Node(bound), _) => std::ptr::eq(*bound, node),
            _ => false,
        }
    }
}

/// Receiver and arguments built for a node by a builder that then declined it.
pub(crate) struct Prebuilt {
    pub receiver: Receiver,
    pub args: Vec<IrExpr>,
}

/// Mutable state of one compilation.
pub struct CompilationContext<'a> {
    compiler: &'a ExpressionCompiler,
    metadata: &'a Metadata,
    bindings: Vec<(BindingKey<'a>, IrExpr)>,
    lambda_signatures: Vec<Type>,
    metadata_slot: usize,
    next_slot: usize,
    /// Last member lookup that found nothing, for diagnostics.
    unresolved: Option<(&'a AstNode, String)>,
    /// Work left by declining builders, valid until their node is built.
    prebuilt: Vec<(&'a AstNode, Prebuilt)>,
}

impl<'a> CompilationContext<'a> {
    /// Arguments occupy slots `0..argument_count`; the metadata slot follows.
    pub fn new(compiler: &'a ExpressionCompiler, metadata: &'a Metadata, argument_count: usize) -> Self {
        Self {
            compiler,
            metadata,
            bindings: Vec::new(),
            lambda_signatures: Vec::new(),
            metadata_slot: argument_count,
            next_slot: argument_count + 1,
            unresolved: None,
            prebuilt: Vec::new(),
        }
    }

    // ========================================================================
    // Building
    // ========================================================================

    /// Build `node` with the first builder, by descending priority, that
    /// accepts it.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build(&mut self, node: &'a AstNode) -> Result<IrExpr, CompilationError> {
        let result = self.dispatch(node);
        self.prebuilt.retain(|(owner, _)| !std::ptr::eq(*owner, node));
        result
    }

    fn dispatch(&mut self, node: &'a AstNode) -> Result<IrExpr, CompilationError> {
        let compiler = self.compiler;
        for builder in compiler.builders() {
            let depth = (self.bindings.len(), self.lambda_signatures.len());
            let built = builder.try_build(self, node)?;
            debug_assert_eq!(
                depth,
                (self.bindings.len(), self.lambda_signatures.len()),
                "builder '{}' leaked scope state",
                builder.name()
            );
            if let Some(ir) = built {
                return Ok(ir);
            }
        }
        Err(self.no_builder(node))
    }

    fn no_builder(&self, node: &AstNode) -> CompilationError {
        match (node, node.member_name()) {
            (AstNode::Member { .. } | AstNode::MethodCall { .. } | AstNode::Index { .. }, Some(name)) => {
                let ty = self
                    .unresolved
                    .as_ref()
                    .filter(|(n, _)| std::ptr::eq(*n, node))
                    .map_or_else(|| "unknown".to_string(), |(_, ty)| ty.clone());
                CompilationError::InvalidBindingMember {
                    member: name.to_string(),
                    ty,
                }
            }
            _ => CompilationError::CannotCompileExpression {
                node: node.to_string(),
            },
        }
    }

    /// Record that no member named by `node` exists on `ty`.
    pub fn note_unresolved(&mut self, node: &'a AstNode, ty: &Type) {
        self.unresolved = Some((node, ty.to_string()));
    }

    /// Leave a built receiver and arguments for the next builder of `node`.
    pub(crate) fn stash_prebuilt(&mut self, node: &'a AstNode, prebuilt: Prebuilt) {
        self.prebuilt.push((node, prebuilt));
    }

    /// Take what an earlier builder of `node` left behind.
    pub(crate) fn take_prebuilt(&mut self, node: &AstNode) -> Option<Prebuilt> {
        let index = self
            .prebuilt
            .iter()
            .rposition(|(owner, _)| std::ptr::eq(*owner, node))?;
        Some(self.prebuilt.remove(index).1)
    }

    // ========================================================================
    // Substitutions
    // ========================================================================

    /// The most recent binding for `node`, if any.
    pub fn lookup(&self, node: &AstNode) -> Option<IrExpr> {
        self.bindings
            .iter()
            .rev()
            .find(|(key, _)| key.matches(node))
            .map(|(_, ir)| ir.clone())
    }

    pub fn is_bound(&self, node: &AstNode) -> bool {
        self.bindings.iter().any(|(key, _)| key.matches(node))
    }

    /// Push bindings for the lifetime of the returned scope.
    pub fn bind<'c>(
        &'c mut self,
        bindings: impl IntoIterator<Item = (BindingKey<'a>, IrExpr)>,
    ) -> BindingScope<'c, 'a> {
        let mark = self.bindings.len();
        self.bindings.extend(bindings);
        BindingScope { ctx: self, mark }
    }

    pub fn binding_depth(&self) -> usize {
        self.bindings.len()
    }

    // ========================================================================
    // Lambda signatures
    // ========================================================================

    /// Make `signature` the expected lambda signature for the lifetime of
    /// the returned scope.
    pub fn expect_lambda<'c>(&'c mut self, signature: Type) -> LambdaScope<'c, 'a> {
        let mark = self.lambda_signatures.len();
        self.lambda_signatures.push(signature);
        LambdaScope { ctx: self, mark }
    }

    /// Innermost expected lambda signature.
    pub fn expected_lambda(&self) -> Option<&Type> {
        self.lambda_signatures.last()
    }

    pub fn lambda_depth(&self) -> usize {
        self.lambda_signatures.len()
    }

    // ========================================================================
    // Frame layout
    // ========================================================================

    pub fn allocate_slot(&mut self) -> usize {
        let slot = self.next_slot;
        self.next_slot += 1;
        slot
    }

    /// Frame size needed by everything built so far.
    pub fn slot_count(&self) -> usize {
        self.next_slot
    }

    pub fn metadata_slot(&self) -> usize {
        self.metadata_slot
    }

    /// Expression reading the invocation metadata.
    pub fn metadata_ir(&self) -> IrExpr {
        IrExpr::slot(self.metadata_slot, Type::metadata())
    }

    // ========================================================================
    // Compiler services
    // ========================================================================

    pub fn provider(&self) -> &'a Arc<dyn MemberProvider> {
        self.compiler.provider()
    }

    /// Metadata of the invocation that triggered this compilation.
    pub fn metadata(&self) -> &'a Metadata {
        self.metadata
    }

    pub fn options(&self) -> &'a CompilerOptions {
        self.compiler.options()
    }

    pub fn resolve_type(&self, name: &str) -> Result<Type, CompilationError> {
        self.provider()
            .resolve_type(name)
            .ok_or_else(|| CompilationError::CannotResolveType {
                name: name.to_string(),
            })
    }
}

/// Bindings pushed by [`CompilationContext::bind`]; popped on drop.
pub struct BindingScope<'c, 'a> {
    ctx: &'c mut CompilationContext<'a>,
    mark: usize,
}

impl Drop for BindingScope<'_, '_> {
    fn drop(&mut self) {
        self.ctx.bindings.truncate(self.mark);
    }
}

impl<'a> Deref for BindingScope<'_, 'a> {
    type Target = CompilationContext<'a>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for BindingScope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

/// Expected signature pushed by [`CompilationContext::expect_lambda`];
/// popped on drop.
pub struct LambdaScope<'c, 'a> {
    ctx: &'c mut CompilationContext<'a>,
    mark: usize,
}

impl Drop for LambdaScope<'_, '_> {
    fn drop(&mut self) {
        self.ctx.lambda_signatures.truncate(self.mark);
    }
}

impl<'a> Deref for LambdaScope<'_, 'a> {
    type Target = CompilationContext<'a>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for LambdaScope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}
