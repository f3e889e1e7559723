//! Dynamic values flowing through compiled expressions.
//!
//! [`Value`] is the positional currency of the runtime: compiled artifacts
//! receive a slice of values, native members receive and return values, and
//! delegates produced by lambdas are values too. Every variant reports its
//! concrete [`Type`] through [`Value::runtime_type`], which is what the
//! compiled-expression cache keys on.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{Metadata, RuntimeError, Type};

/// Shared callable behind a delegate value.
pub type DelegateFn = Arc<dyn Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync>;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Str(Arc<str>),
    Array(ArrayValue),
    Object(ObjectRef),
    Delegate(Delegate),
    Metadata(Metadata),
}

/// An immutable array with a known element type.
#[derive(Clone)]
pub struct ArrayValue {
    element: Type,
    items: Arc<[Value]>,
}

/// A reference to a host object with its runtime type.
#[derive(Clone)]
pub struct ObjectRef {
    ty: Type,
    data: Arc<dyn Any + Send + Sync>,
}

/// A callable value, typically produced by a compiled lambda.
#[derive(Clone)]
pub struct Delegate {
    ty: Type,
    func: DelegateFn,
}

impl Value {
    /// Concrete type of the value; `None` for null.
    pub fn runtime_type(&self) -> Option<Type> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => Type::bool(),
            Value::Int(_) => Type::int(),
            Value::Long(_) => Type::long(),
            Value::Double(_) => Type::double(),
            Value::Str(_) => Type::string(),
            Value::Array(array) => Type::array(&array.element),
            Value::Object(object) => object.ty.clone(),
            Value::Delegate(delegate) => delegate.ty.clone(),
            Value::Metadata(_) => Type::metadata(),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn object<T: Any + Send + Sync>(ty: Type, data: T) -> Self {
        Value::Object(ObjectRef::new(ty, data))
    }

    pub fn array(element: Type, items: Vec<Value>) -> Self {
        Value::Array(ArrayValue::new(element, items))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integer view accepting both integer widths.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(i64::from(*i)),
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    /// Floating view accepting every numeric variant.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(f64::from(*i)),
            Value::Long(l) => Some(*l as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_delegate(&self) -> Option<&Delegate> {
        match self {
            Value::Delegate(delegate) => Some(delegate),
            _ => None,
        }
    }

    /// Downcast an object payload.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_object().and_then(ObjectRef::downcast_ref)
    }
}

impl ArrayValue {
    pub fn new(element: Type, items: Vec<Value>) -> Self {
        Self {
            element,
            items: items.into(),
        }
    }

    pub fn element_type(&self) -> &Type {
        &self.element
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }
}

impl ObjectRef {
    pub fn new<T: Any + Send + Sync>(ty: Type, data: T) -> Self {
        Self {
            ty,
            data: Arc::new(data),
        }
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Delegate {
    pub fn new(ty: Type, func: DelegateFn) -> Self {
        Self { ty, func }
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn arity(&self) -> usize {
        self.ty.delegate_signature().map_or(0, |(params, _)| params.len())
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        (self.func)(args)
    }

    pub fn ptr_eq(&self, other: &Delegate) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(&a.items, &b.items),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Delegate(a), Value::Delegate(b)) => a.ptr_eq(b),
            (Value::Metadata(a), Value::Metadata(b)) => a.ptr_eq(b),
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Long(_), Value::Int(_) | Value::Long(_)) => {
                self.as_long() == other.as_long()
            }
            (
                Value::Int(_) | Value::Long(_) | Value::Double(_),
                Value::Int(_) | Value::Long(_) | Value::Double(_),
            ) => self.as_double() == other.as_double(),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Long(l) => write!(f, "Long({l})"),
            Value::Double(d) => write!(f, "Double({d})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Array(a) => f.debug_list().entries(a.items.iter()).finish(),
            Value::Object(o) => write!(f, "Object({})", o.ty),
            Value::Delegate(d) => write!(f, "Delegate({})", d.ty),
            Value::Metadata(_) => f.write_str("Metadata"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Long(l) => write!(f, "{l}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Str(s) => f.write_str(s),
            Value::Array(a) => write!(f, "{}[{}]", a.element, a.len()),
            Value::Object(o) => write!(f, "{}", o.ty),
            Value::Delegate(d) => write!(f, "{}", d.ty),
            Value::Metadata(_) => f.write_str("metadata"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::str(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Arc::from(value))
    }
}
