use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::error::{ObserveError, Result};
use crate::event::{ChangeEvent, ChangeInfo};
use crate::observed::{Delivery, Observed, Target};
use crate::value::{SlotWrite, write_slot};
use crate::Value;

pub const SEQUENCE_RESERVED: &[&str] = &[
    "add_event_listener",
    "remove_event_listener",
    "dispatch_event",
    "bidirectional",
    "make_bidirectional",
    "remove_bidirectional",
    "usage",
    "push",
    "delete",
    "map",
    "filter",
    "pipe",
    "trigger_empty_change",
    "replace_with",
    "clean_after_render",
    "provenance",
];

/// The one reserved name whose writes are forwarded (unwrapped, no event).
pub const LENGTH: &str = "length";

pub type Transform = Rc<dyn Fn(&Value, usize) -> Value>;
pub type Predicate = Rc<dyn Fn(&Value) -> bool>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BuildKind {
    #[default]
    Constructor,
    Map,
}

impl BuildKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildKind::Constructor => "constructor",
            BuildKind::Map => "map",
        }
    }
}

/// How a sequence was produced, read by consumers to pick a render strategy.
#[derive(Clone, Default)]
pub struct Provenance {
    pub built_with: BuildKind,
    pub transform: Option<Transform>,
    /// Values are text rather than markup fragments.
    pub produces_text: bool,
    /// Single-use buffer emptied by `clean_after_render`.
    pub is_render_artifact: bool,
    /// Consumer-owned rendering container; opaque to the engine.
    pub container: Option<Rc<dyn Any>>,
}

impl fmt::Debug for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provenance")
            .field("built_with", &self.built_with)
            .field("has_transform", &self.transform.is_some())
            .field("produces_text", &self.produces_text)
            .field("is_render_artifact", &self.is_render_artifact)
            .field("has_container", &self.container.is_some())
            .finish()
    }
}

#[derive(Default)]
pub struct SequenceState {
    pub(crate) items: Vec<Value>,
    pub(crate) provenance: Provenance,
}

impl Target for SequenceState {
    const RESERVED: &'static [&'static str] = SEQUENCE_RESERVED;
}

/// Ordered, index-addressable container producing typed change descriptors.
#[derive(Clone)]
pub struct Sequence(pub(crate) Rc<Observed<SequenceState>>);

impl Deref for Sequence {
    type Target = Observed<SequenceState>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::with_provenance(Vec::new(), Provenance::default())
    }
}

impl Sequence {
    /// Initial elements are stored as given, without wrapping.
    pub fn new<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Self::with_provenance(
            items.into_iter().map(Into::into).collect(),
            Provenance::default(),
        )
    }

    pub(crate) fn with_provenance(items: Vec<Value>, provenance: Provenance) -> Self {
        Self(Rc::new(Observed::new(SequenceState { items, provenance })))
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.state().items.get(index).cloned()
    }

    /// Stored elements, Scalar wrappers included.
    pub fn values(&self) -> Vec<Value> {
        self.state().items.clone()
    }

    /// Elements read through their Scalar wrappers.
    pub fn snapshot(&self) -> Vec<Value> {
        self.state().items.iter().map(Value::unwrapped).collect()
    }

    pub fn provenance(&self) -> Provenance {
        self.state().provenance.clone()
    }

    /// Binds the consumer's rendering container to this sequence.
    pub fn bind_container(&self, container: Rc<dyn Any>) {
        self.state_mut().provenance.container = Some(container);
    }

    pub fn container(&self) -> Option<Rc<dyn Any>> {
        self.state().provenance.container.clone()
    }

    pub fn ptr_eq(&self, other: &Sequence) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Index assignment. Writing past the end pads with `Null`.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        if value.is_bidirectional() {
            let target = Rc::downgrade(&self.0);
            value.bind_once(move |snapshot| {
                let Some(target) = target.upgrade() else {
                    return;
                };
                if let Err(err) = Sequence(target).store(index, snapshot) {
                    log::warn!("bidirectional snapshot into index {index} failed: {err}");
                }
            })?;
            return Ok(false);
        }
        self.store(index, value)
    }

    fn store(&self, index: usize, value: Value) -> Result<bool> {
        let current = self.get(index);
        let old = match write_slot(current, value.clone())? {
            SlotWrite::Unchanged => return Ok(false),
            SlotWrite::Delegated { old } => old,
            SlotWrite::Store { stored, old } => {
                let mut state = self.state_mut();
                if index >= state.items.len() {
                    state.items.resize(index + 1, Value::Null);
                }
                state.items[index] = stored;
                old
            }
        };
        self.dispatch(
            ChangeEvent::new(
                value,
                old,
                Value::Sequence(self.clone()),
                Some(ChangeInfo::set_index(index)),
            ),
            Delivery::Distinct,
        )?;
        Ok(true)
    }

    /// String-keyed accessor: `"length"` resizes silently, numeric keys go
    /// through [`set`](Self::set), reserved and other names are ignored.
    pub fn set_field(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        if key == LENGTH {
            let Some(len) = value.as_number().filter(|n| *n >= 0.0 && n.fract() == 0.0) else {
                log::debug!("ignoring non-integer length {value}");
                return Ok(false);
            };
            self.set_len(len as usize);
            return Ok(true);
        }
        if SequenceState::is_reserved(key) {
            log::debug!("ignoring write to reserved sequence key '{key}'");
            return Ok(false);
        }
        match key.parse::<usize>() {
            Ok(index) => self.set(index, value),
            Err(_) => {
                log::debug!("ignoring write to non-index sequence key '{key}'");
                Ok(false)
            }
        }
    }

    pub fn get_field(&self, key: &str) -> Option<Value> {
        if key == LENGTH {
            return Some(Value::from(self.len()));
        }
        if SequenceState::is_reserved(key) {
            return None;
        }
        key.parse::<usize>().ok().and_then(|index| self.get(index))
    }

    /// Truncates or pads with `Null`. Emits nothing.
    pub fn set_len(&self, len: usize) {
        self.state_mut().items.resize(len, Value::Null);
    }

    /// Appends, wrapping like index assignment. Returns the new index.
    ///
    /// A bidirectional value reserves its slot with `Null`; the `Push` event
    /// goes out when the source's snapshot lands in it.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into();
        let index = self.len();
        self.state_mut().items.push(Value::Null);
        if value.is_bidirectional() {
            let target = Rc::downgrade(&self.0);
            value.bind_once(move |snapshot| {
                let Some(target) = target.upgrade() else {
                    return;
                };
                if let Err(err) = Sequence(target).fill_pushed(index, snapshot) {
                    log::warn!("bidirectional snapshot for pushed index {index} failed: {err}");
                }
            })?;
            return Ok(index);
        }
        self.fill_pushed(index, value)?;
        Ok(index)
    }

    fn fill_pushed(&self, index: usize, value: Value) -> Result<()> {
        let stored = if value.is_reactive() {
            value.clone()
        } else {
            Value::Scalar(crate::Scalar::new(value.clone()))
        };
        {
            let mut state = self.state_mut();
            if index >= state.items.len() {
                state.items.resize(index + 1, Value::Null);
            }
            state.items[index] = stored;
        }
        self.dispatch(
            ChangeEvent::new(
                value,
                Value::Null,
                Value::Sequence(self.clone()),
                Some(ChangeInfo::Push { key: index }),
            ),
            Delivery::Distinct,
        )
    }

    pub(crate) fn position_of(&self, id: &Value, identifier: &str) -> Option<usize> {
        self.state()
            .items
            .iter()
            .position(|item| item.field(identifier).is_some_and(|v| v.same(id)))
    }

    /// Removes the first element whose `"id"` field equals `id`.
    pub fn delete(&self, id: impl Into<Value>) -> Result<usize> {
        self.delete_by(id, "id")
    }

    /// Removes the first element whose `identifier` field equals `id`.
    ///
    /// Nothing is removed and no event is emitted when no element matches.
    pub fn delete_by(&self, id: impl Into<Value>, identifier: &str) -> Result<usize> {
        let id = id.into();
        let Some(index) = self.position_of(&id, identifier) else {
            return Err(ObserveError::NotFound {
                identifier: identifier.to_string(),
                id: id.to_string(),
            });
        };
        let removed = self.state_mut().items.remove(index);
        self.dispatch(
            ChangeEvent::new(
                Value::Null,
                removed.unwrapped(),
                Value::Sequence(self.clone()),
                Some(ChangeInfo::Delete {
                    id,
                    identifier: identifier.into(),
                    key: index,
                }),
            ),
            Delivery::Distinct,
        )?;
        Ok(index)
    }

    /// Forces listeners to rebuild, even when nothing structural changed.
    pub fn trigger_empty_change(&self) -> Result<()> {
        let len = Value::from(self.len());
        self.dispatch(
            ChangeEvent::new(len.clone(), len, Value::Sequence(self.clone()), None),
            Delivery::Coalesce,
        )
    }

    /// Swaps the whole backing store for `items`.
    pub fn replace_with<V: Into<Value>>(
        &self,
        items: impl IntoIterator<Item = V>,
        emit: bool,
    ) -> Result<()> {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        self.state_mut().items = items;
        if emit {
            self.dispatch(
                ChangeEvent::new(
                    Value::Null,
                    Value::Null,
                    Value::Sequence(self.clone()),
                    Some(ChangeInfo::Replace),
                ),
                Delivery::Coalesce,
            )?;
        }
        Ok(())
    }

    /// Empties render-artifact sequences after they were consumed. Returns
    /// whether anything was cleared.
    pub fn clean_after_render(&self) -> bool {
        let mut state = self.state_mut();
        if !state.provenance.is_render_artifact {
            return false;
        }
        state.items.clear();
        true
    }

    /// Sequences are not numerically meaningful.
    pub fn to_number(&self) -> f64 {
        f64::NAN
    }

    pub(crate) fn announce(&self) -> Result<()> {
        let me = Value::Sequence(self.clone());
        self.dispatch(
            ChangeEvent::new(me.clone(), me.clone(), me, None),
            Delivery::Distinct,
        )
    }
}

/// Elements joined with no separator.
impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in self.state().items.iter() {
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("items", &self.state().items)
            .field("provenance", &self.state().provenance)
            .finish()
    }
}
