//! Substitution lookup.

use bindexpr_core::{AstNode, CompilationError};

use crate::context::CompilationContext;
use crate::ir::IrExpr;
use crate::pipeline::{ExpressionBuilder, priority};

/// Replaces parameters and bound nodes with the expression bound to them:
/// expression arguments, lambda parameters, and null-conditional roots.
pub struct ParameterBuilder;

impl ExpressionBuilder for ParameterBuilder {
    fn name(&self) -> &'static str {
        "parameter"
    }

    fn priority(&self) -> i32 {
        priority::PARAMETER
    }

    fn try_build<'a>(
        &self,
        ctx: &mut CompilationContext<'a>,
        node: &'a AstNode,
    ) -> Result<Option<IrExpr>, CompilationError> {
        Ok(ctx.lookup(node))
    }
}
