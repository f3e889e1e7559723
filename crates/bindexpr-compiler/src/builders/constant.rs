//! Literal constants.

use bindexpr_core::{AstNode, CompilationError};

use crate::context::CompilationContext;
use crate::ir::IrExpr;
use crate::pipeline::{ExpressionBuilder, priority};

pub struct ConstantBuilder;

impl ExpressionBuilder for ConstantBuilder {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn priority(&self) -> i32 {
        priority::CONSTANT
    }

    fn try_build<'a>(
        &self,
        _ctx: &mut CompilationContext<'a>,
        node: &'a AstNode,
    ) -> Result<Option<IrExpr>, CompilationError> {
        Ok(match node {
            AstNode::Constant { value, ty } => Some(IrExpr::constant(value.clone(), ty.clone())),
            _ => None,
        })
    }
}
