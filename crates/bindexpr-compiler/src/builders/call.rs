//! Method calls and indexers.
//!
//! Candidates come from the provider; [`resolve_call`] picks one. The
//! winner is emitted as a direct call when its handle is native, with
//! arguments converted to the parameter types, omitted arguments filled
//! from defaults, and a variadic tail packed into an array. Descriptor-only
//! winners go through a dynamic call site instead.

use bindexpr_core::{AstNode, CompilationError, MemberHandle, MemberKinds, Type};

use super::{Receiver, emit_dynamic};
use crate::context::{CompilationContext, Prebuilt};
use crate::invoker::{CallSiteKind, DynamicInvoker};
use crate::ir::{IrExpr, IrKind};
use crate::overload::{ArgSource, Argument, Resolution, resolve_call};
use crate::pipeline::{ExpressionBuilder, priority};

pub struct CallBuilder;

/// What kind of call a node makes.
struct CallShape<'a> {
    target: &'a AstNode,
    name: &'a str,
    args: &'a [std::sync::Arc<AstNode>],
    type_args: &'a [String],
    kinds: MemberKinds,
}

impl<'a> CallShape<'a> {
    fn of(node: &'a AstNode) -> Option<Self> {
        match node {
            AstNode::MethodCall {
                target: Some(target),
                name,
                args,
                type_args,
            } => Some(Self {
                target,
                name,
                args,
                type_args,
                kinds: MemberKinds::METHOD,
            }),
            AstNode::Index { target, args } => Some(Self {
                target,
                name: "Item",
                args,
                type_args: &[],
                kinds: MemberKinds::INDEXER,
            }),
            _ => None,
        }
    }

    fn site_kind(&self, type_args: Vec<Type>) -> CallSiteKind {
        if self.kinds == MemberKinds::INDEXER {
            CallSiteKind::Indexer
        } else {
            CallSiteKind::Method { type_args }
        }
    }
}

impl ExpressionBuilder for CallBuilder {
    fn name(&self) -> &'static str {
        "call"
    }

    fn priority(&self) -> i32 {
        priority::CALL
    }

    fn try_build<'a>(
        &self,
        ctx: &mut CompilationContext<'a>,
        node: &'a AstNode,
    ) -> Result<Option<IrExpr>, CompilationError> {
        let Some(shape) = CallShape::of(node) else {
            return Ok(None);
        };

        let receiver = Receiver::build(ctx, shape.target)?;
        let explicit = shape
            .type_args
            .iter()
            .map(|name| ctx.resolve_type(name))
            .collect::<Result<Vec<_>, _>>()?;
        let arguments = Argument::build_all(ctx, shape.args)?;

        let with_extensions = shape.kinds == MemberKinds::METHOD;
        let candidates = ctx.provider().get_members(
            receiver.ty(),
            shape.name,
            shape.kinds,
            receiver.flags(with_extensions),
            ctx.metadata(),
        );

        let resolution = resolve_call(
            ctx,
            shape.name,
            &candidates,
            receiver.extension_receiver(),
            &arguments,
            &explicit,
        )?;

        match resolution {
            Some(resolution) => emit(ctx, &shape, receiver, arguments, resolution, explicit).map(Some),
            None => {
                if shape.kinds == MemberKinds::INDEXER {
                    if let Some(ir) = index_array(&receiver, &arguments) {
                        return Ok(Some(ir));
                    }
                }
                ctx.note_unresolved(node, receiver.ty());
                let built: Option<Vec<IrExpr>> = arguments.into_iter().map(|a| a.ir).collect();
                if let Some(args) = built {
                    ctx.stash_prebuilt(node, Prebuilt { receiver, args });
                }
                Ok(None)
            }
        }
    }
}

/// Element access on arrays without a declared indexer.
fn index_array(receiver: &Receiver, arguments: &[Argument<'_>]) -> Option<IrExpr> {
    let Receiver::Instance(target) = receiver else {
        return None;
    };
    let element = target.ty.element_type()?.clone();
    let [Argument { ir: Some(index), .. }] = arguments else {
        return None;
    };
    if index.ty != Type::int() && index.ty != Type::long() {
        return None;
    }
    Some(IrExpr::new(
        IrKind::ArrayIndex {
            target: target.clone().boxed(),
            index: index.clone().boxed(),
        },
        element,
    ))
}

fn emit(
    ctx: &CompilationContext<'_>,
    shape: &CallShape<'_>,
    receiver: Receiver,
    arguments: Vec<Argument<'_>>,
    resolution: Resolution,
    explicit: Vec<Type>,
) -> Result<IrExpr, CompilationError> {
    let Resolution { score, lambdas } = resolution;
    let member = score.member.clone();

    // Effective arguments: the receiver leads for extension methods
    let mut effective: Vec<Option<IrExpr>> = Vec::with_capacity(arguments.len() + 1);
    if score.is_extension {
        let Receiver::Instance(target) = &receiver else {
            return Err(CompilationError::InvalidBindingMember {
                member: shape.name.to_string(),
                ty: receiver.ty().to_string(),
            });
        };
        effective.push(Some(target.clone()));
    }
    effective.extend(arguments.into_iter().map(|a| a.ir));
    for (index, ir) in lambdas {
        if let Some(slot) = effective.get_mut(index) {
            *slot = Some(ir);
        }
    }
    let effective = effective
        .into_iter()
        .collect::<Option<Vec<IrExpr>>>()
        .ok_or_else(|| CompilationError::InvalidLambda {
            message: format!("lambda argument of '{}' was not built", shape.name),
        })?;

    if let MemberHandle::Descriptor(_) = member.handle {
        let offset = usize::from(score.is_extension);
        let mut site = DynamicInvoker::new(
            shape.site_kind(explicit),
            shape.name.to_string(),
            ctx.provider().clone(),
            ctx.options().extension_bias,
        );
        if let Some(ty) = receiver.static_type() {
            site = site.with_static_target(ty.clone());
        }
        let args = effective.into_iter().skip(offset).collect();
        return Ok(emit_dynamic(site, &member, receiver.into_target(), args));
    }

    let args = score
        .plan()
        .into_iter()
        .map(|planned| match planned.source {
            ArgSource::Arg(index) => effective[index].clone().convert_to(&planned.ty),
            ArgSource::Default(value) => IrExpr::constant(value, planned.ty),
            ArgSource::Array { element, start } => {
                let items = effective
                    .iter()
                    .skip(start)
                    .map(|item| item.clone().convert_to(&element))
                    .collect();
                IrExpr::new(IrKind::NewArray { element, items }, planned.ty)
            }
        })
        .collect();

    let target = if score.is_extension {
        None
    } else {
        receiver.into_target()
    };
    let ty = member.ty.clone();
    Ok(IrExpr::new(IrKind::Call { target, member, args }, ty))
}
