//! Typed intermediate representation produced by expression builders.
//!
//! Every node carries its static result type. Values flow through a frame of
//! slots: the expression arguments occupy the first slots, the invocation
//! metadata sits right after them, and lambda parameters and null-conditional
//! temporaries are allocated above that.

use std::fmt;
use std::sync::Arc;

use bindexpr_core::{BinaryOp, MemberDescriptor, Type, UnaryOp, Value};

use crate::conversion::find_conversion;
use crate::invoker::DynamicInvoker;

/// A typed IR node.
#[derive(Clone)]
pub struct IrExpr {
    pub kind: IrKind,
    pub ty: Type,
}

/// IR node kinds.
#[derive(Clone)]
pub enum IrKind {
    Constant(Value),
    /// Read a frame slot.
    Slot(usize),
    /// Store into a frame slot; evaluates to the stored value.
    Assign { slot: usize, value: Box<IrExpr> },
    /// Evaluate in order, yielding the last value.
    Block(Vec<IrExpr>),
    /// Runtime conversion to the node type.
    Convert(Box<IrExpr>),
    Binary {
        op: BinaryOp,
        left: Box<IrExpr>,
        right: Box<IrExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<IrExpr>,
    },
    Conditional {
        condition: Box<IrExpr>,
        if_true: Box<IrExpr>,
        if_false: Box<IrExpr>,
    },
    IsNull(Box<IrExpr>),
    /// `left ?? right`; a non-null left is converted to the node type.
    Coalesce { left: Box<IrExpr>, right: Box<IrExpr> },
    /// Property or field read through a native handle.
    GetMember {
        target: Option<Box<IrExpr>>,
        member: Arc<MemberDescriptor>,
    },
    /// Direct call with arguments already converted and padded.
    Call {
        target: Option<Box<IrExpr>>,
        member: Arc<MemberDescriptor>,
        args: Vec<IrExpr>,
    },
    NewArray { element: Type, items: Vec<IrExpr> },
    ArrayIndex { target: Box<IrExpr>, index: Box<IrExpr> },
    /// Delegate creation; parameters are written to `params` slots.
    Lambda { params: Vec<usize>, body: Box<IrExpr> },
    /// Call re-resolved against runtime argument types.
    Dynamic {
        site: Arc<DynamicInvoker>,
        target: Option<Box<IrExpr>>,
        args: Vec<IrExpr>,
    },
}

impl IrExpr {
    pub fn new(kind: IrKind, ty: Type) -> Self {
        Self { kind, ty }
    }

    pub fn constant(value: Value, ty: Type) -> Self {
        Self::new(IrKind::Constant(value), ty)
    }

    pub fn null() -> Self {
        Self::constant(Value::Null, Type::null())
    }

    pub fn slot(index: usize, ty: Type) -> Self {
        Self::new(IrKind::Slot(index), ty)
    }

    /// Convert to `target`, skipping identity conversions.
    pub fn convert_to(self, target: &Type) -> IrExpr {
        if &self.ty == target || target.is_generic_param() {
            return self;
        }
        if let IrKind::Constant(Value::Null) = self.kind {
            return IrExpr::constant(Value::Null, target.clone());
        }
        IrExpr::new(IrKind::Convert(Box::new(self)), target.clone())
    }

    /// Whether this expression can implicitly flow into `target`.
    pub fn converts_to(&self, target: &Type) -> bool {
        find_conversion(&self.ty, target).is_some_and(|c| c.is_implicit())
    }

    pub fn boxed(self) -> Box<IrExpr> {
        Box::new(self)
    }
}

impl fmt::Debug for IrExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IrKind::Constant(v) => write!(f, "Constant({v:?})")?,
            IrKind::Slot(i) => write!(f, "Slot({i})")?,
            IrKind::Assign { slot, value } => write!(f, "Assign({slot}, {value:?})")?,
            IrKind::Block(items) => f.debug_list().entries(items).finish()?,
            IrKind::Convert(inner) => write!(f, "Convert({inner:?})")?,
            IrKind::Binary { op, left, right } => {
                write!(f, "Binary({left:?} {} {right:?})", op.symbol())?
            }
            IrKind::Unary { op, operand } => write!(f, "Unary({op:?}, {operand:?})")?,
            IrKind::Conditional {
                condition,
                if_true,
                if_false,
            } => write!(f, "Conditional({condition:?}, {if_true:?}, {if_false:?})")?,
            IrKind::IsNull(inner) => write!(f, "IsNull({inner:?})")?,
            IrKind::Coalesce { left, right } => write!(f, "Coalesce({left:?}, {right:?})")?,
            IrKind::GetMember { target, member } => {
                write!(f, "GetMember({target:?}, {})", member.name)?
            }
            IrKind::Call {
                target,
                member,
                args,
            } => write!(f, "Call({target:?}, {}, {args:?})", member.display_signature())?,
            IrKind::NewArray { element, items } => write!(f, "NewArray({element}, {items:?})")?,
            IrKind::ArrayIndex { target, index } => write!(f, "ArrayIndex({target:?}, {index:?})")?,
            IrKind::Lambda { params, body } => write!(f, "Lambda({params:?}, {body:?})")?,
            IrKind::Dynamic { site, target, args } => {
                write!(f, "Dynamic({}, {target:?}, {args:?})", site.name())?
            }
        }
        write!(f, ": {}", self.ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_conversion_is_elided() {
        let ir = IrExpr::slot(0, Type::int()).convert_to(&Type::int());
        assert!(matches!(ir.kind, IrKind::Slot(0)));

        let widened = IrExpr::slot(0, Type::int()).convert_to(&Type::long());
        assert!(matches!(widened.kind, IrKind::Convert(_)));
        assert_eq!(widened.ty, Type::long());
    }

    #[test]
    fn null_constants_retype_in_place() {
        let ir = IrExpr::null().convert_to(&Type::string());
        assert!(matches!(ir.kind, IrKind::Constant(Value::Null)));
        assert_eq!(ir.ty, Type::string());
    }
}
