//! Late-bound member access.

use std::sync::Arc;

use bindexpr_core::{AstNode, CompilationError, Type};

use super::Receiver;
use crate::context::{CompilationContext, Prebuilt};
use crate::invoker::{CallSiteKind, DynamicInvoker};
use crate::ir::{IrExpr, IrKind};
use crate::pipeline::{ExpressionBuilder, priority};

/// Last resort for members that did not resolve statically.
///
/// A target whose static type is `object` or an unsealed reference type may
/// carry a more derived runtime type, so the access is deferred to a
/// [`DynamicInvoker`] that resolves by name against the runtime types of
/// target and arguments. Sealed and value-type targets cannot gain members
/// at runtime and are left to fail.
pub struct DynamicBuilder;

fn defers(ty: &Type) -> bool {
    !ty.is_value_type() && (ty.is_object() || !ty.is_sealed())
}

impl ExpressionBuilder for DynamicBuilder {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn priority(&self) -> i32 {
        priority::DYNAMIC
    }

    fn try_build<'a>(
        &self,
        ctx: &mut CompilationContext<'a>,
        node: &'a AstNode,
    ) -> Result<Option<IrExpr>, CompilationError> {
        let (target, name, args, kind): (&'a AstNode, &'a str, &'a [Arc<AstNode>], CallSiteKind) =
            match node {
                AstNode::Member {
                    target: Some(target),
                    name,
                } => {
                    let none: &[Arc<AstNode>] = &[];
                    (target.as_ref(), name.as_str(), none, CallSiteKind::Member)
                }
                AstNode::MethodCall {
                    target: Some(target),
                    name,
                    args,
                    type_args,
                } => {
                    // Lambdas need a statically known delegate signature
                    if args.iter().any(|a| matches!(a.as_ref(), AstNode::Lambda { .. })) {
                        return Ok(None);
                    }
                    let type_args = type_args
                        .iter()
                        .map(|t| ctx.resolve_type(t))
                        .collect::<Result<Vec<_>, _>>()?;
                    let kind = CallSiteKind::Method { type_args };
                    (target.as_ref(), name.as_str(), args.as_slice(), kind)
                }
                AstNode::Index { target, args } => {
                    (target.as_ref(), "Item", args.as_slice(), CallSiteKind::Indexer)
                }
                _ => return Ok(None),
            };

        // Reuse what a static builder of this node already built
        let prebuilt = match ctx.take_prebuilt(node) {
            Some(prebuilt) => prebuilt,
            None => {
                let receiver = Receiver::build(ctx, target)?;
                if !matches!(&receiver, Receiver::Instance(ir) if defers(&ir.ty)) {
                    return Ok(None);
                }
                let args = args
                    .iter()
                    .map(|arg| ctx.build(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Prebuilt { receiver, args }
            }
        };
        let Prebuilt {
            receiver: Receiver::Instance(target),
            args,
        } = prebuilt
        else {
            return Ok(None);
        };
        if !defers(&target.ty) {
            return Ok(None);
        }

        let site = DynamicInvoker::new(
            kind,
            name.to_string(),
            ctx.provider().clone(),
            ctx.options().extension_bias,
        );
        Ok(Some(IrExpr::new(
            IrKind::Dynamic {
                site: Arc::new(site),
                target: Some(target.boxed()),
                args,
            },
            Type::object(),
        )))
    }
}
