//! Binding-expression syntax tree.
//!
//! Nodes are produced once by the parser and shared read-only across every
//! compilation of a binding template. Resolved members never get written
//! back into nodes; they live in the IR built for a particular argument
//! shape.

use std::fmt;
use std::sync::Arc;

use crate::{Type, Value};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    /// `??`
    Coalesce,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Identity of a parameter: position plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterRef {
    pub index: usize,
    pub name: String,
}

impl ParameterRef {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

/// A node of the binding-expression tree.
#[derive(Debug, Clone)]
pub enum AstNode {
    Constant {
        value: Value,
        ty: Type,
    },
    Member {
        target: Option<Arc<AstNode>>,
        name: String,
    },
    Binary {
        op: BinaryOp,
        left: Arc<AstNode>,
        right: Arc<AstNode>,
    },
    Unary {
        op: UnaryOp,
        operand: Arc<AstNode>,
    },
    Conditional {
        condition: Arc<AstNode>,
        if_true: Arc<AstNode>,
        if_false: Arc<AstNode>,
    },
    Index {
        target: Arc<AstNode>,
        args: Vec<Arc<AstNode>>,
    },
    MethodCall {
        target: Option<Arc<AstNode>>,
        name: String,
        args: Vec<Arc<AstNode>>,
        /// Explicit generic arguments by type name.
        type_args: Vec<String>,
    },
    Lambda {
        params: Vec<ParameterRef>,
        body: Arc<AstNode>,
    },
    Parameter(ParameterRef),
    /// Null-propagating root of a member chain: the `a?` in `a?.b.c`.
    NullConditional {
        target: Arc<AstNode>,
    },
    /// Static type used as the target of static member access.
    TypeAccess {
        name: String,
    },
}

impl AstNode {
    /// Constant typed by its runtime type (`null` gets the null type).
    pub fn constant(value: impl Into<Value>) -> Arc<Self> {
        let value = value.into();
        let ty = value.runtime_type().unwrap_or_else(Type::null);
        Arc::new(AstNode::Constant { value, ty })
    }

    pub fn constant_typed(value: impl Into<Value>, ty: Type) -> Arc<Self> {
        Arc::new(AstNode::Constant {
            value: value.into(),
            ty,
        })
    }

    pub fn null() -> Arc<Self> {
        Self::constant(Value::Null)
    }

    pub fn parameter(index: usize, name: impl Into<String>) -> Arc<Self> {
        Arc::new(AstNode::Parameter(ParameterRef::new(index, name)))
    }

    pub fn member(target: Arc<AstNode>, name: impl Into<String>) -> Arc<Self> {
        Arc::new(AstNode::Member {
            target: Some(target),
            name: name.into(),
        })
    }

    pub fn call(target: Arc<AstNode>, name: impl Into<String>, args: Vec<Arc<AstNode>>) -> Arc<Self> {
        Arc::new(AstNode::MethodCall {
            target: Some(target),
            name: name.into(),
            args,
            type_args: Vec::new(),
        })
    }

    pub fn call_generic(
        target: Arc<AstNode>,
        name: impl Into<String>,
        type_args: Vec<String>,
        args: Vec<Arc<AstNode>>,
    ) -> Arc<Self> {
        Arc::new(AstNode::MethodCall {
            target: Some(target),
            name: name.into(),
            args,
            type_args,
        })
    }

    pub fn index(target: Arc<AstNode>, args: Vec<Arc<AstNode>>) -> Arc<Self> {
        Arc::new(AstNode::Index { target, args })
    }

    /// Lambda whose parameters are numbered by position.
    pub fn lambda(params: &[&str], body: Arc<AstNode>) -> Arc<Self> {
        Arc::new(AstNode::Lambda {
            params: params
                .iter()
                .enumerate()
                .map(|(i, name)| ParameterRef::new(i, *name))
                .collect(),
            body,
        })
    }

    pub fn binary(op: BinaryOp, left: Arc<AstNode>, right: Arc<AstNode>) -> Arc<Self> {
        Arc::new(AstNode::Binary { op, left, right })
    }

    pub fn unary(op: UnaryOp, operand: Arc<AstNode>) -> Arc<Self> {
        Arc::new(AstNode::Unary { op, operand })
    }

    pub fn conditional(
        condition: Arc<AstNode>,
        if_true: Arc<AstNode>,
        if_false: Arc<AstNode>,
    ) -> Arc<Self> {
        Arc::new(AstNode::Conditional {
            condition,
            if_true,
            if_false,
        })
    }

    pub fn null_conditional(target: Arc<AstNode>) -> Arc<Self> {
        Arc::new(AstNode::NullConditional { target })
    }

    pub fn type_access(name: impl Into<String>) -> Arc<Self> {
        Arc::new(AstNode::TypeAccess { name: name.into() })
    }

    /// Target of a member-chain link (member, index or call).
    pub fn chain_target(&self) -> Option<&AstNode> {
        match self {
            AstNode::Member { target, .. } | AstNode::MethodCall { target, .. } => {
                target.as_deref()
            }
            AstNode::Index { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Nearest null-conditional root on this node's member chain.
    pub fn null_conditional_root(&self) -> Option<&AstNode> {
        let mut current = self.chain_target();
        while let Some(node) = current {
            if matches!(node, AstNode::NullConditional { .. }) {
                return Some(node);
            }
            current = node.chain_target();
        }
        None
    }

    /// Member name for member-like nodes.
    pub fn member_name(&self) -> Option<&str> {
        match self {
            AstNode::Member { name, .. } | AstNode::MethodCall { name, .. } => Some(name),
            AstNode::Index { .. } => Some("Item"),
            _ => None,
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Arc<AstNode>]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstNode::Constant { value: Value::Str(s), .. } => write!(f, "\"{s}\""),
            AstNode::Constant { value: Value::Null, .. } => f.write_str("null"),
            AstNode::Constant { value, .. } => write!(f, "{value}"),
            AstNode::Member { target, name } => match target {
                Some(t) => write!(f, "{t}.{name}"),
                None => f.write_str(name),
            },
            AstNode::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            AstNode::Unary { op, operand } => match op {
                UnaryOp::Neg => write!(f, "-{operand}"),
                UnaryOp::Not => write!(f, "!{operand}"),
            },
            AstNode::Conditional {
                condition,
                if_true,
                if_false,
            } => write!(f, "({condition} ? {if_true} : {if_false})"),
            AstNode::Index { target, args } => {
                write!(f, "{target}[")?;
                write_args(f, args)?;
                f.write_str("]")
            }
            AstNode::MethodCall {
                target,
                name,
                args,
                type_args,
            } => {
                if let Some(t) = target {
                    write!(f, "{t}.")?;
                }
                f.write_str(name)?;
                if !type_args.is_empty() {
                    write!(f, "<{}>", type_args.join(", "))?;
                }
                f.write_str("(")?;
                write_args(f, args)?;
                f.write_str(")")
            }
            AstNode::Lambda { params, body } => {
                let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
                write!(f, "({}) => {body}", names.join(", "))
            }
            AstNode::Parameter(p) => f.write_str(&p.name),
            AstNode::NullConditional { target } => write!(f, "{target}?"),
            AstNode::TypeAccess { name } => f.write_str(name),
        }
    }
}
