//! Operator expressions: binary, unary and conditional.
//!
//! Numeric operands are promoted to the wider of the two types
//! (int < long < double); a nullable operand lifts the result. Operands
//! typed `object` defer the operation to the runtime values.

use bindexpr_core::{AstNode, BinaryOp, CompilationError, Type, UnaryOp};

use crate::context::CompilationContext;
use crate::ir::{IrExpr, IrKind};
use crate::pipeline::{ExpressionBuilder, priority};

// ============================================================================
// Typing helpers
// ============================================================================

fn mismatch(message: String) -> CompilationError {
    CompilationError::TypeMismatch { message }
}

/// Common numeric type of two operands, lifted if either is nullable.
fn promote(left: &Type, right: &Type) -> Option<Type> {
    let (l, r) = (left.non_nullable(), right.non_nullable());
    let wide = if l.numeric_rank()? >= r.numeric_rank()? { l } else { r };
    Some(if left.is_nullable() || right.is_nullable() {
        Type::nullable(&wide)
    } else {
        wide
    })
}

/// Operand usable as a condition.
fn condition(ir: IrExpr, what: &str) -> Result<IrExpr, CompilationError> {
    if ir.ty == Type::bool() || ir.ty.is_object() {
        Ok(ir.convert_to(&Type::bool()))
    } else {
        Err(mismatch(format!("{what} must be bool, found '{}'", ir.ty)))
    }
}

/// Result type of two branches that must meet.
fn common_type(a: &Type, b: &Type) -> Type {
    if a == b {
        return a.clone();
    }
    if a.is_null() {
        return Type::nullable(b);
    }
    if b.is_null() {
        return Type::nullable(a);
    }
    let implicit = |from: &Type, to: &Type| {
        crate::conversion::find_conversion(from, to).is_some_and(|c| c.is_implicit())
    };
    if implicit(a, b) {
        b.clone()
    } else if implicit(b, a) {
        a.clone()
    } else {
        Type::object()
    }
}

fn binary(op: BinaryOp, left: IrExpr, right: IrExpr, ty: Type) -> IrExpr {
    IrExpr::new(
        IrKind::Binary {
            op,
            left: left.boxed(),
            right: right.boxed(),
        },
        ty,
    )
}

// ============================================================================
// Binary
// ============================================================================

pub struct BinaryBuilder;

impl BinaryBuilder {
    fn build_coalesce(left: IrExpr, right: IrExpr) -> Result<IrExpr, CompilationError> {
        if !left.ty.can_be_null() {
            return Err(mismatch(format!(
                "left operand of '??' has non-nullable type '{}'",
                left.ty
            )));
        }
        let underlying = left.ty.non_nullable();
        let ty = if right.converts_to(&underlying) {
            underlying
        } else if right.converts_to(&left.ty) {
            left.ty.clone()
        } else if left.converts_to(&right.ty) {
            right.ty.clone()
        } else {
            Type::object()
        };
        Ok(IrExpr::new(
            IrKind::Coalesce {
                left: left.boxed(),
                right: right.convert_to(&ty).boxed(),
            },
            ty,
        ))
    }

    fn build_arithmetic(op: BinaryOp, left: IrExpr, right: IrExpr) -> Result<IrExpr, CompilationError> {
        if op == BinaryOp::Add && (left.ty == Type::string() || right.ty == Type::string()) {
            return Ok(binary(op, left, right, Type::string()));
        }
        if left.ty.is_object() || right.ty.is_object() {
            return Ok(binary(op, left, right, Type::object()));
        }
        match promote(&left.ty, &right.ty) {
            Some(ty) => Ok(binary(op, left.convert_to(&ty), right.convert_to(&ty), ty)),
            None => Err(mismatch(format!(
                "operator '{}' cannot be applied to '{}' and '{}'",
                op.symbol(),
                left.ty,
                right.ty
            ))),
        }
    }

    fn build_comparison(op: BinaryOp, left: IrExpr, right: IrExpr) -> Result<IrExpr, CompilationError> {
        if (left.ty == Type::string() && right.ty == Type::string())
            || left.ty.is_object()
            || right.ty.is_object()
        {
            return Ok(binary(op, left, right, Type::bool()));
        }
        match promote(&left.ty, &right.ty) {
            Some(ty) => Ok(binary(op, left.convert_to(&ty), right.convert_to(&ty), Type::bool())),
            None => Err(mismatch(format!(
                "operator '{}' cannot be applied to '{}' and '{}'",
                op.symbol(),
                left.ty,
                right.ty
            ))),
        }
    }
}

impl ExpressionBuilder for BinaryBuilder {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn priority(&self) -> i32 {
        priority::OPERATOR
    }

    fn try_build<'a>(
        &self,
        ctx: &mut CompilationContext<'a>,
        node: &'a AstNode,
    ) -> Result<Option<IrExpr>, CompilationError> {
        let AstNode::Binary { op, left, right } = node else {
            return Ok(None);
        };
        let left = ctx.build(left)?;
        let right = ctx.build(right)?;

        let ir = match op {
            BinaryOp::And | BinaryOp::Or => binary(
                *op,
                condition(left, "left operand")?,
                condition(right, "right operand")?,
                Type::bool(),
            ),
            BinaryOp::Eq | BinaryOp::Ne => binary(*op, left, right, Type::bool()),
            BinaryOp::Coalesce => Self::build_coalesce(left, right)?,
            op if op.is_comparison() => Self::build_comparison(*op, left, right)?,
            op => Self::build_arithmetic(*op, left, right)?,
        };
        Ok(Some(ir))
    }
}

// ============================================================================
// Unary
// ============================================================================

pub struct UnaryBuilder;

impl ExpressionBuilder for UnaryBuilder {
    fn name(&self) -> &'static str {
        "unary"
    }

    fn priority(&self) -> i32 {
        priority::OPERATOR
    }

    fn try_build<'a>(
        &self,
        ctx: &mut CompilationContext<'a>,
        node: &'a AstNode,
    ) -> Result<Option<IrExpr>, CompilationError> {
        let AstNode::Unary { op, operand } = node else {
            return Ok(None);
        };
        let operand = ctx.build(operand)?;
        let (operand, ty) = match op {
            UnaryOp::Not => (condition(operand, "operand of '!'")?, Type::bool()),
            UnaryOp::Neg => {
                if operand.ty.non_nullable().numeric_rank().is_none() && !operand.ty.is_object() {
                    return Err(mismatch(format!(
                        "operator '-' cannot be applied to '{}'",
                        operand.ty
                    )));
                }
                let ty = operand.ty.clone();
                (operand, ty)
            }
        };
        Ok(Some(IrExpr::new(
            IrKind::Unary {
                op: *op,
                operand: operand.boxed(),
            },
            ty,
        )))
    }
}

// ============================================================================
// Conditional
// ============================================================================

pub struct ConditionalBuilder;

impl ExpressionBuilder for ConditionalBuilder {
    fn name(&self) -> &'static str {
        "conditional"
    }

    fn priority(&self) -> i32 {
        priority::OPERATOR
    }

    fn try_build<'a>(
        &self,
        ctx: &mut CompilationContext<'a>,
        node: &'a AstNode,
    ) -> Result<Option<IrExpr>, CompilationError> {
        let AstNode::Conditional {
            condition: test,
            if_true,
            if_false,
        } = node
        else {
            return Ok(None);
        };
        let test = condition(ctx.build(test)?, "condition")?;
        let if_true = ctx.build(if_true)?;
        let if_false = ctx.build(if_false)?;
        let ty = common_type(&if_true.ty, &if_false.ty);

        Ok(Some(IrExpr::new(
            IrKind::Conditional {
                condition: test.boxed(),
                if_true: if_true.convert_to(&ty).boxed(),
                if_false: if_false.convert_to(&ty).boxed(),
            },
            ty,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bindexpr_core::{MemberRegistry, Metadata, Value};

    use crate::pipeline::ExpressionCompiler;

    fn build(node: &AstNode) -> Result<IrExpr, CompilationError> {
        let compiler = ExpressionCompiler::new(Arc::new(MemberRegistry::new()));
        compiler.build(node, &[], &[], &Metadata::new()).map(|b| b.ir)
    }

    #[test]
    fn numeric_operands_are_promoted() {
        let node = AstNode::binary(BinaryOp::Add, AstNode::constant(1), AstNode::constant(2.5));
        let ir = build(&node).unwrap();
        assert_eq!(ir.ty, Type::double());
        let IrKind::Binary { left, .. } = &ir.kind else {
            panic!("expected binary, got {ir:?}");
        };
        assert!(matches!(left.kind, IrKind::Convert(_)));
    }

    #[test]
    fn nullable_operands_lift() {
        let node = AstNode::binary(
            BinaryOp::Mul,
            AstNode::constant_typed(Value::Null, Type::nullable(&Type::int())),
            AstNode::constant(2i64),
        );
        assert_eq!(build(&node).unwrap().ty, Type::nullable(&Type::long()));
    }

    #[test]
    fn string_concatenation() {
        let node = AstNode::binary(BinaryOp::Add, AstNode::constant("n="), AstNode::constant(3));
        assert_eq!(build(&node).unwrap().ty, Type::string());
    }

    #[test]
    fn incompatible_operands_are_rejected() {
        let node = AstNode::binary(BinaryOp::Sub, AstNode::constant(true), AstNode::constant(1));
        assert!(matches!(build(&node), Err(CompilationError::TypeMismatch { .. })));
    }

    #[test]
    fn coalesce_unwraps_nullable() {
        let node = AstNode::binary(
            BinaryOp::Coalesce,
            AstNode::constant_typed(Value::Null, Type::nullable(&Type::int())),
            AstNode::constant(0),
        );
        assert_eq!(build(&node).unwrap().ty, Type::int());

        let not_nullable = AstNode::binary(BinaryOp::Coalesce, AstNode::constant(1), AstNode::constant(0));
        assert!(build(&not_nullable).is_err());
    }

    #[test]
    fn conditional_branches_meet() {
        let node = AstNode::conditional(AstNode::constant(true), AstNode::constant(1), AstNode::null());
        assert_eq!(build(&node).unwrap().ty, Type::nullable(&Type::int()));

        let widened = AstNode::conditional(AstNode::constant(false), AstNode::constant(1), AstNode::constant(2i64));
        assert_eq!(build(&widened).unwrap().ty, Type::long());
    }

    #[test]
    fn conditions_must_be_bool() {
        let node = AstNode::conditional(AstNode::constant(1), AstNode::constant(1), AstNode::constant(2));
        assert!(matches!(build(&node), Err(CompilationError::TypeMismatch { .. })));
        let not = AstNode::unary(UnaryOp::Not, AstNode::constant("x"));
        assert!(build(&not).is_err());
    }
}
