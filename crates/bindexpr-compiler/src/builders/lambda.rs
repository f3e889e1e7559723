//! Lambda arguments.

use bindexpr_core::{AstNode, CompilationError, Type};

use crate::context::{BindingKey, CompilationContext};
use crate::ir::{IrExpr, IrKind};
use crate::pipeline::{ExpressionBuilder, priority};

/// Builds a lambda against the innermost expected delegate signature.
///
/// Lambdas only appear as call arguments; the call builder pushes the
/// candidate's delegate type before building one. Each lambda parameter gets
/// its own frame slot and shadows any outer binding of the same parameter
/// for the duration of the body.
pub struct LambdaBuilder;

impl ExpressionBuilder for LambdaBuilder {
    fn name(&self) -> &'static str {
        "lambda"
    }

    fn priority(&self) -> i32 {
        priority::LAMBDA
    }

    fn try_build<'a>(
        &self,
        ctx: &mut CompilationContext<'a>,
        node: &'a AstNode,
    ) -> Result<Option<IrExpr>, CompilationError> {
        let AstNode::Lambda { params, body } = node else {
            return Ok(None);
        };
        let Some((param_types, ret)) = ctx
            .expected_lambda()
            .and_then(Type::delegate_signature)
            .map(|(p, r)| (p.to_vec(), r.clone()))
        else {
            return Ok(None);
        };
        if param_types.len() != params.len() {
            return Ok(None);
        }

        let slots: Vec<usize> = params.iter().map(|_| ctx.allocate_slot()).collect();
        let bindings = params
            .iter()
            .zip(&slots)
            .zip(&param_types)
            .map(|((param, &slot), ty)| (BindingKey::Parameter(param), IrExpr::slot(slot, ty.clone())));

        // Nested lambdas in the body only see a signature when the body is
        // itself the returned delegate.
        let inner = if ret.delegate_signature().is_some() {
            ret.clone()
        } else {
            Type::void()
        };
        let body = {
            let mut scope = ctx.bind(bindings);
            let mut scope = scope.expect_lambda(inner);
            scope.build(body)?
        };

        let body = if ret.is_void() || ret.contains_generic_params() {
            body
        } else if body.converts_to(&ret) {
            body.convert_to(&ret)
        } else {
            return Err(CompilationError::InvalidLambda {
                message: format!("body of type '{}' does not convert to '{ret}'", body.ty),
            });
        };

        let result = if ret.is_void() { Type::void() } else { body.ty.clone() };
        let ty = Type::delegate(param_types, result);
        Ok(Some(IrExpr::new(
            IrKind::Lambda {
                params: slots,
                body: body.boxed(),
            },
            ty,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bindexpr_core::{BinaryOp, MemberRegistry, Metadata, ParameterRef, Value};

    use crate::pipeline::ExpressionCompiler;

    fn compiler() -> ExpressionCompiler {
        ExpressionCompiler::new(Arc::new(MemberRegistry::new()))
    }

    #[test]
    fn lambda_without_expected_signature_is_rejected() {
        let compiler = compiler();
        let node = AstNode::lambda(&["x"], AstNode::parameter(0, "x"));
        let metadata = Metadata::new();
        let mut ctx = CompilationContext::new(&compiler, &metadata, 0);
        assert!(ctx.build(&node).is_err());
    }

    #[test]
    fn parameters_take_expected_types() {
        let compiler = compiler();
        let metadata = Metadata::new();
        let node = AstNode::lambda(
            &["x"],
            AstNode::binary(BinaryOp::Add, AstNode::parameter(0, "x"), AstNode::constant(1)),
        );
        let mut ctx = CompilationContext::new(&compiler, &metadata, 0);
        let mut scope = ctx.expect_lambda(Type::delegate(vec![Type::long()], Type::double()));
        let ir = scope.build(&node).unwrap();
        assert_eq!(ir.ty, Type::delegate(vec![Type::long()], Type::double()));
        let IrKind::Lambda { params, body } = &ir.kind else {
            panic!("expected lambda, got {ir:?}");
        };
        assert_eq!(params, &vec![1]);
        assert!(matches!(body.kind, IrKind::Convert(_)));
    }

    #[test]
    fn lambda_parameters_shadow_outer_bindings() {
        let compiler = compiler();
        let metadata = Metadata::new();
        let outer = ParameterRef::new(0, "x");
        let node = AstNode::lambda(&["x"], AstNode::parameter(0, "x"));
        let mut ctx = CompilationContext::new(&compiler, &metadata, 1);
        let mut scope = ctx.bind([(BindingKey::Parameter(&outer), IrExpr::slot(0, Type::string()))]);
        let ir = {
            let mut inner = scope.expect_lambda(Type::delegate(vec![Type::int()], Type::int()));
            inner.build(&node).unwrap()
        };
        let IrKind::Lambda { body, .. } = &ir.kind else {
            panic!("expected lambda, got {ir:?}");
        };
        assert!(matches!(body.kind, IrKind::Slot(2)));
        // The outer binding is intact after the lambda
        let found = scope.lookup(&AstNode::Parameter(outer.clone())).unwrap();
        assert_eq!(found.ty, Type::string());
    }

    #[test]
    fn arity_mismatch_declines() {
        let compiler = compiler();
        let metadata = Metadata::new();
        let node = AstNode::lambda(&["a", "b"], AstNode::constant(1));
        let mut ctx = CompilationContext::new(&compiler, &metadata, 0);
        let mut scope = ctx.expect_lambda(Type::delegate(vec![Type::int()], Type::int()));
        assert!(matches!(
            scope.build(&node),
            Err(CompilationError::CannotCompileExpression { .. })
        ));
    }

    #[test]
    fn body_must_convert_to_return_type() {
        let compiler = compiler();
        let metadata = Metadata::new();
        let node = AstNode::lambda(&["x"], AstNode::constant(Value::str("no")));
        let mut ctx = CompilationContext::new(&compiler, &metadata, 0);
        let mut scope = ctx.expect_lambda(Type::delegate(vec![Type::int()], Type::int()));
        assert!(matches!(
            scope.build(&node),
            Err(CompilationError::InvalidLambda { .. })
        ));
    }
}
