use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::{Mapping, Scalar, Sequence};

/// Anything a reactive container can hold: a primitive, or another container.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
    Scalar(Scalar),
    Mapping(Mapping),
    Sequence(Sequence),
}

impl Value {
    /// Identity equality: primitives by value, containers by pointer.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Scalar(a), Value::Scalar(b)) => a.ptr_eq(b),
            (Value::Mapping(a), Value::Mapping(b)) => a.ptr_eq(b),
            (Value::Sequence(a), Value::Sequence(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_reactive(&self) -> bool {
        matches!(
            self,
            Value::Scalar(_) | Value::Mapping(_) | Value::Sequence(_)
        )
    }

    pub fn is_bidirectional(&self) -> bool {
        match self {
            Value::Scalar(s) => s.is_bidirectional(),
            Value::Mapping(m) => m.is_bidirectional(),
            Value::Sequence(q) => q.is_bidirectional(),
            _ => false,
        }
    }

    /// Reads through Scalar wrappers. Mappings and Sequences are returned as-is.
    pub fn unwrapped(&self) -> Value {
        match self {
            Value::Scalar(s) => s.get_value().unwrapped(),
            other => other.clone(),
        }
    }

    /// Named field of a mapping element, read through Scalar wrappers on both sides.
    pub fn field(&self, name: &str) -> Option<Value> {
        match self.unwrapped() {
            Value::Mapping(m) => m.get(name).map(|v| v.unwrapped()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.unwrapped() {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.unwrapped() {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<Rc<str>> {
        match self.unwrapped() {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Value::Sequence(q) => Some(q),
            _ => None,
        }
    }

    /// Snapshot-then-bind: `store` receives the first value the source
    /// delivers after this call (its current value, re-announced), then the
    /// subscription is dropped. Non-reactive values are stored immediately.
    pub(crate) fn bind_once(&self, store: impl Fn(Value) + 'static) -> Result<()> {
        match self {
            Value::Scalar(s) => {
                s.bind_once(store);
            }
            Value::Mapping(m) => {
                m.bind_once(store);
            }
            Value::Sequence(q) => {
                q.bind_once(store);
            }
            other => {
                store(other.clone());
                return Ok(());
            }
        }
        self.announce()
    }

    /// Re-delivers a container's current state to its change listeners
    /// without changing it. Primitives have no listeners; this is a no-op.
    ///
    /// A delivery already pending on the container carries its current state,
    /// so nothing new is scheduled then and the pending event keeps its own
    /// `old_value`.
    pub fn announce(&self) -> Result<()> {
        let pending = match self {
            Value::Scalar(s) => s.usage().has_pending_batch(),
            Value::Mapping(m) => m.usage().has_pending_batch(),
            Value::Sequence(q) => q.usage().has_pending_batch(),
            _ => return Ok(()),
        };
        if pending {
            log::trace!("announce rides on the delivery already pending");
            return Ok(());
        }
        match self {
            Value::Scalar(s) => s.announce(),
            Value::Mapping(m) => m.announce(),
            Value::Sequence(q) => q.announce(),
            _ => Ok(()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(t) => f.write_str(t),
            Value::Scalar(s) => write!(f, "{}", s.get_value()),
            Value::Mapping(_) => f.write_str("[object Mapping]"),
            Value::Sequence(q) => write!(f, "{q}"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Text(t) => write!(f, "Text({t:?})"),
            Value::Scalar(s) => write!(f, "Scalar({:?})", s.get_value()),
            Value::Mapping(m) => f.debug_map().entries(m.entries()).finish(),
            Value::Sequence(q) => f.debug_list().entries(q.values()).finish(),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s.into())
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Text(s)
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Mapping(m)
    }
}

impl From<Sequence> for Value {
    fn from(q: Sequence) -> Self {
        Value::Sequence(q)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or_default()
    }
}

/// Outcome of writing into one container slot.
pub(crate) enum SlotWrite {
    Unchanged,
    /// The slot's Scalar took the value; the slot itself was kept.
    Delegated { old: Value },
    /// The slot must be replaced with `stored`.
    Store { stored: Value, old: Value },
}

/// Decision tree shared by Mapping and Sequence slot writes: delegate to an
/// existing Scalar, skip identical values, otherwise wrap non-reactive values.
pub(crate) fn write_slot(current: Option<Value>, value: Value) -> Result<SlotWrite> {
    match current {
        Some(Value::Scalar(slot)) if !value.is_reactive() => {
            let old = slot.get_value();
            if slot.set_value(value)? {
                Ok(SlotWrite::Delegated { old })
            } else {
                Ok(SlotWrite::Unchanged)
            }
        }
        Some(current) if current.same(&value) => Ok(SlotWrite::Unchanged),
        current => {
            let old = current.map(|c| c.unwrapped()).unwrap_or_default();
            let stored = if value.is_reactive() {
                value
            } else {
                Value::Scalar(Scalar::new(value))
            };
            Ok(SlotWrite::Store { stored, old })
        }
    }
}
