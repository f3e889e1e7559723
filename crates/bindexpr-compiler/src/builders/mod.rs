//! Default expression builders.
//!
//! | Builder            | Priority | Handles                                   |
//! |--------------------|----------|-------------------------------------------|
//! | `parameter`        | 1000     | any node with a binding in scope          |
//! | `null_conditional` | 900      | member chains under a `?.` root           |
//! | `lambda`           | 800      | lambdas with an expected signature        |
//! | `constant`         | 700      | literals                                  |
//! | `binary`/`unary`/`conditional` | 600 | operators                        |
//! | `call`             | 500      | method calls and indexers                 |
//! | `member`           | 400      | properties and fields                     |
//! | `dynamic`          | 0        | by-name resolution against runtime types  |

mod call;
mod constant;
mod dynamic;
mod lambda;
mod member;
mod null_conditional;
mod operators;
mod parameter;

use std::sync::Arc;

use bindexpr_core::{AstNode, CompilationError, MemberDescriptor, MemberFlags, Type};

pub use call::CallBuilder;
pub use constant::ConstantBuilder;
pub use dynamic::DynamicBuilder;
pub use lambda::LambdaBuilder;
pub use member::MemberBuilder;
pub use null_conditional::NullConditionalBuilder;
pub use operators::{BinaryBuilder, ConditionalBuilder, UnaryBuilder};
pub use parameter::ParameterBuilder;

use crate::context::CompilationContext;
use crate::invoker::DynamicInvoker;
use crate::ir::{IrExpr, IrKind};
use crate::pipeline::{CompilerOptions, ExpressionBuilder};

/// The standard pipeline for `options`.
pub fn default_builders(options: &CompilerOptions) -> Vec<Box<dyn ExpressionBuilder>> {
    let mut builders: Vec<Box<dyn ExpressionBuilder>> = vec![
        Box::new(ParameterBuilder),
        Box::new(NullConditionalBuilder),
        Box::new(LambdaBuilder),
        Box::new(ConstantBuilder),
        Box::new(BinaryBuilder),
        Box::new(UnaryBuilder),
        Box::new(ConditionalBuilder),
        Box::new(CallBuilder),
        Box::new(MemberBuilder),
    ];
    if options.dynamic_fallback {
        builders.push(Box::new(DynamicBuilder));
    }
    builders
}

/// Target of a member access: an instance expression or a static type.
pub(crate) enum Receiver {
    Instance(IrExpr),
    Static(Type),
}

impl Receiver {
    /// Build a member-chain target; `TypeAccess` nodes become static
    /// receivers.
    pub fn build<'a>(
        ctx: &mut CompilationContext<'a>,
        target: &'a AstNode,
    ) -> Result<Receiver, CompilationError> {
        match target {
            AstNode::TypeAccess { name } => Ok(Receiver::Static(ctx.resolve_type(name)?)),
            other => Ok(Receiver::Instance(ctx.build(other)?)),
        }
    }

    pub fn ty(&self) -> &Type {
        match self {
            Receiver::Instance(ir) => &ir.ty,
            Receiver::Static(ty) => ty,
        }
    }

    /// Binding flags for a member query; extensions only apply to instances.
    pub fn flags(&self, with_extensions: bool) -> MemberFlags {
        match self {
            Receiver::Static(_) => MemberFlags::STATIC,
            Receiver::Instance(_) if with_extensions => MemberFlags::INSTANCE_ALL,
            Receiver::Instance(_) => MemberFlags::INSTANCE,
        }
    }

    /// Type offered to extension methods as their implicit first argument.
    pub fn extension_receiver(&self) -> Option<&Type> {
        match self {
            Receiver::Instance(ir) => Some(&ir.ty),
            Receiver::Static(_) => None,
        }
    }

    pub fn static_type(&self) -> Option<&Type> {
        match self {
            Receiver::Static(ty) => Some(ty),
            Receiver::Instance(_) => None,
        }
    }

    pub fn into_target(self) -> Option<Box<IrExpr>> {
        match self {
            Receiver::Instance(ir) => Some(Box::new(ir)),
            Receiver::Static(_) => None,
        }
    }
}

/// Route a descriptor-only member through a dynamic call site, typed by the
/// statically selected member.
pub(crate) fn emit_dynamic(
    site: DynamicInvoker,
    member: &MemberDescriptor,
    target: Option<Box<IrExpr>>,
    args: Vec<IrExpr>,
) -> IrExpr {
    let call = IrExpr::new(
        IrKind::Dynamic {
            site: Arc::new(site),
            target,
            args,
        },
        Type::object(),
    );
    if member.ty.is_void() {
        IrExpr { ty: Type::void(), ..call }
    } else {
        call.convert_to(&member.ty)
    }
}
