//! Lowering of IR trees into executable closures.
//!
//! Each IR node becomes one boxed closure over the invocation frame. The
//! closures hold no reference to any argument value or binding instance, so
//! a lowered tree can be shared by every invocation with the same argument
//! shape.

use std::cmp::Ordering;
use std::sync::Arc;

use bindexpr_core::{
    BinaryOp, Delegate, Metadata, RuntimeError, Type, UnaryOp, Value, convert_value,
};

use crate::ir::{IrExpr, IrKind};

/// Executable form of an IR tree.
pub type LoweredFn = Arc<dyn Fn(&mut [Value]) -> Result<Value, RuntimeError> + Send + Sync>;

/// Lower `ir`; `metadata_slot` is the frame slot holding the invocation
/// metadata.
pub fn lower(ir: &IrExpr, metadata_slot: usize) -> LoweredFn {
    Lowering { metadata_slot }.lower(ir)
}

struct Lowering {
    metadata_slot: usize,
}

fn node<F>(f: F) -> LoweredFn
where
    F: Fn(&mut [Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
{
    Arc::new(f)
}

impl Lowering {
    fn lower_all(&self, items: &[IrExpr]) -> Vec<LoweredFn> {
        items.iter().map(|item| self.lower(item)).collect()
    }

    fn lower(&self, ir: &IrExpr) -> LoweredFn {
        let meta = self.metadata_slot;
        match &ir.kind {
            IrKind::Constant(value) => {
                let value = value.clone();
                node(move |_| Ok(value.clone()))
            }
            IrKind::Slot(index) => {
                let index = *index;
                node(move |frame| Ok(frame.get(index).cloned().unwrap_or_default()))
            }
            IrKind::Assign { slot, value } => {
                let slot = *slot;
                let value = self.lower(value);
                node(move |frame| {
                    let v = value(frame)?;
                    if let Some(target) = frame.get_mut(slot) {
                        *target = v.clone();
                    }
                    Ok(v)
                })
            }
            IrKind::Block(items) => {
                let items = self.lower_all(items);
                node(move |frame| {
                    let mut last = Value::Null;
                    for item in &items {
                        last = item(frame)?;
                    }
                    Ok(last)
                })
            }
            IrKind::Convert(operand) => {
                let operand = self.lower(operand);
                let target = ir.ty.clone();
                node(move |frame| convert_value(operand(frame)?, &target))
            }
            IrKind::Binary { op, left, right } => self.lower_binary(*op, left, right),
            IrKind::Unary { op, operand } => {
                let operand = self.lower(operand);
                match op {
                    UnaryOp::Neg => node(move |frame| negate(operand(frame)?)),
                    UnaryOp::Not => node(move |frame| {
                        Ok(Value::Bool(!expect_bool(&operand(frame)?)?))
                    }),
                }
            }
            IrKind::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                let condition = self.lower(condition);
                let if_true = self.lower(if_true);
                let if_false = self.lower(if_false);
                node(move |frame| {
                    if expect_bool(&condition(frame)?)? {
                        if_true(frame)
                    } else {
                        if_false(frame)
                    }
                })
            }
            IrKind::IsNull(operand) => {
                let operand = self.lower(operand);
                node(move |frame| Ok(Value::Bool(operand(frame)?.is_null())))
            }
            IrKind::Coalesce { left, right } => {
                let left = self.lower(left);
                let right = self.lower(right);
                let ty = ir.ty.clone();
                node(move |frame| {
                    let value = left(frame)?;
                    if value.is_null() {
                        right(frame)
                    } else {
                        convert_value(value, &ty)
                    }
                })
            }
            IrKind::GetMember { target, member } => {
                let target = target.as_deref().map(|t| self.lower(t));
                let member = Arc::clone(member);
                node(move |frame| {
                    let target = match &target {
                        Some(t) => Some(non_null(t(frame)?, &member.name)?),
                        None => None,
                    };
                    member.invoke(target.as_ref(), &[], &metadata(frame, meta))
                })
            }
            IrKind::Call {
                target,
                member,
                args,
            } => {
                let target = target.as_deref().map(|t| self.lower(t));
                let args = self.lower_all(args);
                let member = Arc::clone(member);
                node(move |frame| {
                    let target = match &target {
                        Some(t) => Some(non_null(t(frame)?, &member.name)?),
                        None => None,
                    };
                    let values = evaluate_all(&args, frame)?;
                    member.invoke(target.as_ref(), &values, &metadata(frame, meta))
                })
            }
            IrKind::NewArray { element, items } => {
                let items = self.lower_all(items);
                let element = element.clone();
                node(move |frame| Ok(Value::array(element.clone(), evaluate_all(&items, frame)?)))
            }
            IrKind::ArrayIndex { target, index } => {
                let target = self.lower(target);
                let index = self.lower(index);
                node(move |frame| {
                    let array = non_null(target(frame)?, "Item")?;
                    let index = index(frame)?;
                    index_array(&array, &index)
                })
            }
            IrKind::Lambda { params, body } => {
                let body = self.lower(body);
                let params = params.clone();
                let ty = ir.ty.clone();
                node(move |frame| {
                    // The delegate sees the frame as it was when it was created
                    let snapshot: Arc<[Value]> = Arc::from(&*frame);
                    let body = Arc::clone(&body);
                    let params = params.clone();
                    Ok(Value::Delegate(Delegate::new(
                        ty.clone(),
                        Arc::new(move |args: &[Value]| {
                            if args.len() != params.len() {
                                return Err(RuntimeError::ArgumentCount {
                                    expected: params.len(),
                                    actual: args.len(),
                                });
                            }
                            let mut inner = snapshot.to_vec();
                            for (slot, arg) in params.iter().zip(args) {
                                if let Some(target) = inner.get_mut(*slot) {
                                    *target = arg.clone();
                                }
                            }
                            body(&mut inner)
                        }),
                    )))
                })
            }
            IrKind::Dynamic { site, target, args } => {
                let site = Arc::clone(site);
                let target = target.as_deref().map(|t| self.lower(t));
                let args = self.lower_all(args);
                node(move |frame| {
                    let target = match &target {
                        Some(t) => Some(t(frame)?),
                        None => None,
                    };
                    let values = evaluate_all(&args, frame)?;
                    site.invoke(target, values, &metadata(frame, meta))
                })
            }
        }
    }

    fn lower_binary(&self, op: BinaryOp, left: &IrExpr, right: &IrExpr) -> LoweredFn {
        let left = self.lower(left);
        let right = self.lower(right);
        match op {
            BinaryOp::And => node(move |frame| {
                Ok(Value::Bool(
                    expect_bool(&left(frame)?)? && expect_bool(&right(frame)?)?,
                ))
            }),
            BinaryOp::Or => node(move |frame| {
                Ok(Value::Bool(
                    expect_bool(&left(frame)?)? || expect_bool(&right(frame)?)?,
                ))
            }),
            BinaryOp::Coalesce => node(move |frame| {
                let value = left(frame)?;
                if value.is_null() { right(frame) } else { Ok(value) }
            }),
            BinaryOp::Eq => node(move |frame| Ok(Value::Bool(left(frame)? == right(frame)?))),
            BinaryOp::Ne => node(move |frame| Ok(Value::Bool(left(frame)? != right(frame)?))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => node(move |frame| {
                let ordering = compare(&left(frame)?, &right(frame)?);
                Ok(Value::Bool(match (op, ordering) {
                    (_, None) => false,
                    (BinaryOp::Lt, Some(o)) => o == Ordering::Less,
                    (BinaryOp::Le, Some(o)) => o != Ordering::Greater,
                    (BinaryOp::Gt, Some(o)) => o == Ordering::Greater,
                    (_, Some(o)) => o != Ordering::Less,
                }))
            }),
            _ => node(move |frame| arithmetic(op, left(frame)?, right(frame)?)),
        }
    }
}

fn evaluate_all(items: &[LoweredFn], frame: &mut [Value]) -> Result<Vec<Value>, RuntimeError> {
    items.iter().map(|item| item(frame)).collect()
}

fn metadata(frame: &[Value], slot: usize) -> Metadata {
    match frame.get(slot) {
        Some(Value::Metadata(metadata)) => metadata.clone(),
        _ => Metadata::default(),
    }
}

fn non_null(value: Value, member: &str) -> Result<Value, RuntimeError> {
    if value.is_null() {
        Err(RuntimeError::NullReference {
            member: member.to_string(),
        })
    } else {
        Ok(value)
    }
}

fn describe(value: &Value) -> String {
    value
        .runtime_type()
        .map_or_else(|| "null".to_string(), |t| t.to_string())
}

fn expect_bool(value: &Value) -> Result<bool, RuntimeError> {
    value.as_bool().ok_or_else(|| RuntimeError::InvalidCast {
        from: describe(value),
        to: Type::bool().to_string(),
    })
}

/// Element read shared by compiled and dynamic indexing.
pub(crate) fn index_array(array: &Value, index: &Value) -> Result<Value, RuntimeError> {
    let Some(items) = array.as_array() else {
        return Err(RuntimeError::InvalidCast {
            from: describe(array),
            to: "array".to_string(),
        });
    };
    let Some(i) = index.as_long() else {
        return Err(RuntimeError::InvalidCast {
            from: describe(index),
            to: Type::int().to_string(),
        });
    };
    usize::try_from(i)
        .ok()
        .and_then(|i| items.get(i))
        .cloned()
        .ok_or(RuntimeError::IndexOutOfRange {
            index: i,
            len: items.len(),
        })
}

fn negate(value: Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
        Value::Long(l) => Ok(Value::Long(l.wrapping_neg())),
        Value::Double(d) => Ok(Value::Double(-d)),
        other => Err(RuntimeError::native(format!(
            "operator '-' cannot be applied to '{}'",
            describe(&other)
        ))),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Double(_), _) | (_, Value::Double(_)) => {
            left.as_double()?.partial_cmp(&right.as_double()?)
        }
        _ => Some(left.as_long()?.cmp(&right.as_long()?)),
    }
}

/// Arithmetic on runtime values. Operands were converted to a common type
/// at compile time unless they were statically typed as `object`.
fn arithmetic(op: BinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    if op == BinaryOp::Add && (matches!(left, Value::Str(_)) || matches!(right, Value::Str(_))) {
        return Ok(Value::str(format!("{left}{right}")));
    }
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => int_op(op, *a, *b).map(Value::Int),
        (Value::Int(_) | Value::Long(_), Value::Int(_) | Value::Long(_)) => {
            let (a, b) = (left.as_long().unwrap_or_default(), right.as_long().unwrap_or_default());
            long_op(op, a, b).map(Value::Long)
        }
        _ => match (left.as_double(), right.as_double()) {
            (Some(a), Some(b)) => Ok(Value::Double(double_op(op, a, b))),
            _ => Err(RuntimeError::native(format!(
                "operator '{}' cannot be applied to '{}' and '{}'",
                op.symbol(),
                describe(&left),
                describe(&right)
            ))),
        },
    }
}

fn int_op(op: BinaryOp, a: i32, b: i32) -> Result<i32, RuntimeError> {
    Ok(match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div if b == 0 => return Err(RuntimeError::DivideByZero),
        BinaryOp::Div => a.wrapping_div(b),
        BinaryOp::Rem if b == 0 => return Err(RuntimeError::DivideByZero),
        _ => a.wrapping_rem(b),
    })
}

fn long_op(op: BinaryOp, a: i64, b: i64) -> Result<i64, RuntimeError> {
    Ok(match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div if b == 0 => return Err(RuntimeError::DivideByZero),
        BinaryOp::Div => a.wrapping_div(b),
        BinaryOp::Rem if b == 0 => return Err(RuntimeError::DivideByZero),
        _ => a.wrapping_rem(b),
    })
}

fn double_op(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    }
}
