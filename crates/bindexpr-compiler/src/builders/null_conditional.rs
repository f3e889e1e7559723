//! Null-propagating member chains.
//!
//! For `a?.b.c` the chain root `a?` is evaluated once into a temporary slot.
//! The rest of the chain is built with the root bound to that slot, and the
//! whole chain yields null when the root is null:
//!
//! ```text
//! { tmp = a; tmp == null ? null : tmp.b.c }
//! ```

use bindexpr_core::{AstNode, CompilationError, Type, Value};

use crate::context::{BindingKey, CompilationContext};
use crate::ir::{IrExpr, IrKind};
use crate::pipeline::{ExpressionBuilder, priority};

pub struct NullConditionalBuilder;

impl ExpressionBuilder for NullConditionalBuilder {
    fn name(&self) -> &'static str {
        "null_conditional"
    }

    fn priority(&self) -> i32 {
        priority::NULL_CONDITIONAL
    }

    fn try_build<'a>(
        &self,
        ctx: &mut CompilationContext<'a>,
        node: &'a AstNode,
    ) -> Result<Option<IrExpr>, CompilationError> {
        // A root outside of any chain is just its target
        if let AstNode::NullConditional { target } = node {
            return ctx.build(target).map(Some);
        }

        let Some(root) = node.null_conditional_root() else {
            return Ok(None);
        };
        if ctx.is_bound(root) {
            return Ok(None);
        }
        let AstNode::NullConditional { target } = root else {
            return Ok(None);
        };

        let target = ctx.build(target)?;
        if !target.ty.can_be_null() {
            let mut scope = ctx.bind([(BindingKey::Node(root), target)]);
            return scope.build(node).map(Some);
        }

        let temp = ctx.allocate_slot();
        let bound = IrExpr::slot(temp, target.ty.non_nullable());
        let body = {
            let mut scope = ctx.bind([(BindingKey::Node(root), bound)]);
            scope.build(node)?
        };

        let ty = if body.ty.is_void() {
            Type::void()
        } else {
            Type::nullable(&body.ty)
        };
        let assign_ty = target.ty.clone();
        let ir = IrExpr::new(
            IrKind::Block(vec![
                IrExpr::new(
                    IrKind::Assign {
                        slot: temp,
                        value: target.boxed(),
                    },
                    assign_ty.clone(),
                ),
                IrExpr::new(
                    IrKind::Conditional {
                        condition: IrExpr::new(
                            IrKind::IsNull(IrExpr::slot(temp, assign_ty).boxed()),
                            Type::bool(),
                        )
                        .boxed(),
                        if_true: IrExpr::constant(Value::Null, ty.clone()).boxed(),
                        if_false: body.convert_to(&ty).boxed(),
                    },
                    ty.clone(),
                ),
            ]),
            ty,
        );
        Ok(Some(ir))
    }
}
