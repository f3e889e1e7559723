//! Property and field access.

use bindexpr_core::{AstNode, CompilationError, MemberKinds};

use super::{Receiver, emit_dynamic};
use crate::context::{CompilationContext, Prebuilt};
use crate::invoker::{CallSiteKind, DynamicInvoker};
use crate::ir::{IrExpr, IrKind};
use crate::pipeline::{ExpressionBuilder, priority};

/// Resolves `target.Name` against the target's static type. Static access
/// goes through a `TypeAccess` target.
pub struct MemberBuilder;

impl ExpressionBuilder for MemberBuilder {
    fn name(&self) -> &'static str {
        "member"
    }

    fn priority(&self) -> i32 {
        priority::MEMBER
    }

    fn try_build<'a>(
        &self,
        ctx: &mut CompilationContext<'a>,
        node: &'a AstNode,
    ) -> Result<Option<IrExpr>, CompilationError> {
        let AstNode::Member {
            target: Some(target),
            name,
        } = node
        else {
            return Ok(None);
        };

        let receiver = Receiver::build(ctx, target)?;
        let members = ctx.provider().get_members(
            receiver.ty(),
            name,
            MemberKinds::ACCESSORS,
            receiver.flags(false),
            ctx.metadata(),
        );
        let Some(member) = members.into_iter().next() else {
            ctx.note_unresolved(node, receiver.ty());
            ctx.stash_prebuilt(
                node,
                Prebuilt {
                    receiver,
                    args: Vec::new(),
                },
            );
            return Ok(None);
        };

        let ir = if member.handle.is_native() {
            let ty = member.ty.clone();
            IrExpr::new(
                IrKind::GetMember {
                    target: receiver.into_target(),
                    member,
                },
                ty,
            )
        } else {
            let mut site = DynamicInvoker::new(
                CallSiteKind::Member,
                name.clone(),
                ctx.provider().clone(),
                ctx.options().extension_bias,
            );
            if let Some(ty) = receiver.static_type() {
                site = site.with_static_target(ty.clone());
            }
            emit_dynamic(site, &member, receiver.into_target(), Vec::new())
        };
        Ok(Some(ir))
    }
}
