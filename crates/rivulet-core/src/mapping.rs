use std::ops::Deref;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::event::{ChangeEvent, ChangeInfo};
use crate::observed::{Delivery, Observed, Target};
use crate::value::{SlotWrite, write_slot};
use crate::Value;

/// Names owned by the container API; writes to them are ignored.
pub const MAPPING_RESERVED: &[&str] = &[
    "add_event_listener",
    "remove_event_listener",
    "dispatch_event",
    "bidirectional",
    "make_bidirectional",
    "remove_bidirectional",
    "usage",
];

#[derive(Default)]
pub struct MappingState {
    entries: IndexMap<Rc<str>, Value>,
}

impl Target for MappingState {
    const RESERVED: &'static [&'static str] = MAPPING_RESERVED;
}

/// Key/value container. Plain values written into it are wrapped in
/// [`Scalar`](crate::Scalar)s; writing a plain value over an existing Scalar
/// goes through that Scalar so its subscribers stay attached.
///
/// Changes are reported once, on this container's own listeners. Nested
/// containers are not re-bubbled to their parent.
#[derive(Clone)]
pub struct Mapping(Rc<Observed<MappingState>>);

impl Deref for Mapping {
    type Target = Observed<MappingState>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Default for Mapping {
    fn default() -> Self {
        Self::new()
    }
}

impl Mapping {
    pub fn new() -> Self {
        Self(Rc::new(Observed::new(MappingState::default())))
    }

    /// Builds a mapping without emitting events. Reserved keys are skipped.
    pub fn from_entries<K: AsRef<str>, V: Into<Value>>(
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let mut state = MappingState::default();
        for (key, value) in entries {
            let key = key.as_ref();
            if MappingState::is_reserved(key) {
                log::debug!("skipping reserved mapping key '{key}'");
                continue;
            }
            let value = value.into();
            let stored = if value.is_reactive() {
                value
            } else {
                Value::Scalar(crate::Scalar::new(value))
            };
            state.entries.insert(key.into(), stored);
        }
        Self(Rc::new(Observed::new(state)))
    }

    /// Stored value, wrapped or not. Reserved keys read as `None`.
    pub fn get(&self, key: &str) -> Option<Value> {
        if MappingState::is_reserved(key) {
            return None;
        }
        self.state().entries.get(key).cloned()
    }

    /// Writes `value` under `key`.
    ///
    /// Returns `Ok(false)` for reserved keys, unchanged values, and
    /// bidirectional sources (whose value lands on the first delivery).
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        if MappingState::is_reserved(key) {
            log::debug!("ignoring write to reserved mapping key '{key}'");
            return Ok(false);
        }
        if value.is_bidirectional() {
            let target = Rc::downgrade(&self.0);
            let key: Rc<str> = key.into();
            value.bind_once(move |snapshot| {
                let Some(target) = target.upgrade() else {
                    return;
                };
                if let Err(err) = Mapping(target).store(&key, snapshot) {
                    log::warn!("bidirectional snapshot into '{key}' failed: {err}");
                }
            })?;
            return Ok(false);
        }
        self.store(key, value)
    }

    fn store(&self, key: &str, value: Value) -> Result<bool> {
        let current = self.state().entries.get(key).cloned();
        let old = match write_slot(current, value.clone())? {
            SlotWrite::Unchanged => return Ok(false),
            SlotWrite::Delegated { old } => old,
            SlotWrite::Store { stored, old } => {
                self.state_mut().entries.insert(key.into(), stored);
                old
            }
        };
        self.dispatch(
            ChangeEvent::new(
                value,
                old,
                Value::Mapping(self.clone()),
                Some(ChangeInfo::set_name(key)),
            ),
            Delivery::Distinct,
        )?;
        Ok(true)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state().entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<Rc<str>> {
        self.state().entries.keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(Rc<str>, Value)> {
        self.state()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ptr_eq(&self, other: &Mapping) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn announce(&self) -> Result<()> {
        let me = Value::Mapping(self.clone());
        self.dispatch(
            ChangeEvent::new(me.clone(), me.clone(), me, None),
            Delivery::Distinct,
        )
    }
}
