//! Runtime value conversion.
//!
//! Applies a conversion chosen at compile time (or by a dynamic call site)
//! to a concrete value: numeric widening, nullable lifting, boxing, delegate
//! retyping and checked reference casts.

use std::sync::Arc;

use crate::{Delegate, RuntimeError, Type, TypeKind, Value};

/// Convert `value` so it can flow into a slot of type `target`.
pub fn convert_value(value: Value, target: &Type) -> Result<Value, RuntimeError> {
    if target.is_object() || target.is_void() || target.is_generic_param() {
        return Ok(value);
    }
    if value.is_null() {
        return if target.can_be_null() {
            Ok(Value::Null)
        } else {
            Err(invalid_cast(&value, target))
        };
    }
    let target = target.non_nullable();

    match (target.kind(), &value) {
        (TypeKind::Int, Value::Int(_))
        | (TypeKind::Long, Value::Long(_))
        | (TypeKind::Double, Value::Double(_))
        | (TypeKind::Bool, Value::Bool(_))
        | (TypeKind::String, Value::Str(_)) => Ok(value),
        (TypeKind::Long, Value::Int(i)) => Ok(Value::Long(i64::from(*i))),
        (TypeKind::Double, Value::Int(_) | Value::Long(_)) => {
            Ok(Value::Double(value.as_double().unwrap_or_default()))
        }
        (TypeKind::Delegate { params, ret }, Value::Delegate(delegate)) => {
            if delegate.ty() == &target {
                Ok(value)
            } else if delegate.arity() == params.len() {
                Ok(Value::Delegate(retype_delegate(delegate.clone(), &target, ret.clone())))
            } else {
                Err(invalid_cast(&value, &target))
            }
        }
        _ => match value.runtime_type() {
            Some(actual) if actual.is_subtype_of(&target) => Ok(value),
            _ => Err(invalid_cast(&value, &target)),
        },
    }
}

fn retype_delegate(inner: Delegate, target: &Type, ret: Type) -> Delegate {
    Delegate::new(
        target.clone(),
        Arc::new(move |args: &[Value]| convert_value(inner.invoke(args)?, &ret)),
    )
}

fn invalid_cast(value: &Value, target: &Type) -> RuntimeError {
    RuntimeError::InvalidCast {
        from: value
            .runtime_type()
            .map_or_else(|| "null".to_string(), |t| t.to_string()),
        to: target.to_string(),
    }
}
