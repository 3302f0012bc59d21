use std::ops::Deref;
use std::rc::Rc;

use crate::error::Result;
use crate::event::ChangeEvent;
use crate::observed::{Delivery, Observed, Target};
use crate::Value;

pub struct ScalarState {
    value: Value,
}

impl Target for ScalarState {}

/// A single observed value.
///
/// `set_value` with a value identical to the current one does nothing;
/// anything else stores it and schedules one coalesced change event.
#[derive(Clone)]
pub struct Scalar(Rc<Observed<ScalarState>>);

impl Deref for Scalar {
    type Target = Observed<ScalarState>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Scalar {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(Rc::new(Observed::new(ScalarState {
            value: value.into(),
        })))
    }

    pub fn get_value(&self) -> Value {
        self.state().value.clone()
    }

    /// Returns `Ok(true)` when the value changed and an event was scheduled.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        let old = {
            let mut state = self.state_mut();
            if state.value.same(&value) {
                return Ok(false);
            }
            std::mem::replace(&mut state.value, value.clone())
        };
        self.dispatch(
            ChangeEvent::new(value, old, Value::Scalar(self.clone()), None),
            Delivery::Coalesce,
        )?;
        Ok(true)
    }

    pub fn ptr_eq(&self, other: &Scalar) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Re-delivers the current value to listeners without changing it.
    pub(crate) fn announce(&self) -> Result<()> {
        let value = self.get_value();
        self.dispatch(
            ChangeEvent::new(value.clone(), value, Value::Scalar(self.clone()), None),
            Delivery::Distinct,
        )
    }
}
