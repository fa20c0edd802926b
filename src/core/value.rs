use ordered_float::OrderedFloat;
use std::{
    any::Any,
    fmt,
    hash::{Hash, Hasher},
    rc::{Rc, Weak},
};

// NOTE: Identity is the address of the shared allocation. While any Object or WeakObject
// for it exists the allocation stays put, so the address can't be handed out to another
// object. That's what lets registries key on the address and hold only a WeakObject.

/// Reference type. Compared and hashed by identity, never by content.
#[derive(Clone)]
pub struct Object(Rc<dyn Any>);

impl Object {
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    pub fn from_rc<T: Any>(rc: Rc<T>) -> Self {
        Self(rc)
    }

    /// Identity of this object.
    #[inline(always)]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.0))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl Eq for Object {}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({:#x})", self.addr())
    }
}

/// Non owning handle of an Object.
#[derive(Clone)]
pub struct WeakObject(Weak<dyn Any>);

impl WeakObject {
    pub fn upgrade(&self) -> Option<Object> {
        self.0.upgrade().map(Object)
    }

    /// True while some Object keeps the value alive.
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Same as Object::addr of the object this was downgraded from.
    #[inline(always)]
    pub fn addr(&self) -> usize {
        self.0.as_ptr() as *const () as usize
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakObject({:#x}, alive: {})", self.addr(), self.is_alive())
    }
}

/// Anything that can be part of a composite key.
///
/// Only `Object` is a reference type, everything else is compared by value.
/// Values of different variants are never equal, so `Int(1)` and `Float(1.0)` are
/// different keys.
#[derive(Clone)]
pub enum Value {
    Object(Object),
    Null,
    Bool(bool),
    Int(i64),
    /// `-0.0` equals `0.0`, and `NaN` equals `NaN`.
    Float(f64),
    Str(Rc<str>),
}

impl Value {
    pub fn object<T: Any>(value: T) -> Self {
        Value::Object(Object::new(value))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Object(_) => ValueKind::Object,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Object(object) => fmt::Debug::fmt(object, f),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<&Object> for Value {
    fn from(object: &Object) -> Self {
        Value::Object(object.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Object,
    Null,
    Bool,
    Int,
    Float,
    Str,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Object => "object",
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
        };
        f.write_str(name)
    }
}

/// Value of a non object, usable as a strong map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Primitive {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(Rc<str>),
}

impl Primitive {
    /// Splits values into primitives and objects.
    pub fn of(value: &Value) -> Result<Self, &Object> {
        match value {
            Value::Object(object) => Err(object),
            Value::Null => Ok(Primitive::Null),
            Value::Bool(b) => Ok(Primitive::Bool(*b)),
            Value::Int(i) => Ok(Primitive::Int(*i)),
            Value::Float(x) => Ok(Primitive::Float(OrderedFloat(*x))),
            Value::Str(s) => Ok(Primitive::Str(s.clone())),
        }
    }
}
