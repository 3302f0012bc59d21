//! # Component host
//!
//! A `ComponentHost` is what a UI element looks like from the engine's side:
//! an observed `state` mapping, an observed `attrs` mapping for the declared
//! attributes, a plain native attribute table, and a coalesced render
//! request.
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use rivulet_core::*;
//! use rivulet_host::{ComponentHost, HostConfig};
//!
//! let host = ComponentHost::new(HostConfig::default().observe("label"));
//! let renders = Rc::new(Cell::new(0));
//! host.set_render({
//!     let renders = renders.clone();
//!     move |_| renders.set(renders.get() + 1)
//! });
//!
//! host.request_render().unwrap();
//! host.request_render().unwrap();
//! flush_ticks();
//!
//! assert_eq!(renders.get(), 1);
//! assert!(host.state().usage().is_rendered());
//! ```

pub mod binders;

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use rivulet_core::scheduler;
use rivulet_core::{
    ChangeEvent, ChangeInfo, Delivery, Mapping, PendingTask, Result, Sequence, Value,
};

pub use binders::{bind_attr, bind_bool_attr};

/// Where the host renders into. The engine only records it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShadowMode {
    #[default]
    Closed,
    Open,
    /// Render straight into the element.
    None,
}

#[derive(Clone, Debug, Default)]
pub struct HostConfig {
    pub observed_attributes: Vec<Rc<str>>,
    /// Native attributes present before the host is constructed.
    pub initial_attributes: Vec<(Rc<str>, Rc<str>)>,
    pub shadow: ShadowMode,
}

impl HostConfig {
    pub fn observe(mut self, name: &str) -> Self {
        self.observed_attributes.push(name.into());
        self
    }

    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.initial_attributes.push((name.into(), value.into()));
        self
    }

    pub fn shadow(mut self, mode: ShadowMode) -> Self {
        self.shadow = mode;
        self
    }
}

type RenderFn = Rc<dyn Fn(&ComponentHost)>;

pub struct ComponentHost {
    config: HostConfig,
    state: Mapping,
    attrs: Mapping,
    native: RefCell<IndexMap<Rc<str>, Rc<str>>>,
    render: RefCell<Option<RenderFn>>,
    requested: RefCell<Option<PendingTask>>,
    me: Weak<ComponentHost>,
}

impl ComponentHost {
    pub fn new(config: HostConfig) -> Rc<Self> {
        let native: IndexMap<Rc<str>, Rc<str>> =
            config.initial_attributes.iter().cloned().collect();
        // Declared attributes start as Scalars seeded from the native table.
        let attrs = Mapping::from_entries(config.observed_attributes.iter().map(|name| {
            let seed = native.get(name).cloned().map(Value::Text).unwrap_or_default();
            (name.clone(), Value::Scalar(rivulet_core::Scalar::new(seed)))
        }));

        Rc::new_cyclic(|me: &Weak<ComponentHost>| {
            let state = Mapping::new();
            let owner: Weak<dyn Any> = me.clone();
            state.usage_mut().set_owner(owner);
            log::debug!(
                "component host created ({} observed attribute(s), shadow {:?})",
                config.observed_attributes.len(),
                config.shadow
            );
            ComponentHost {
                config,
                state,
                attrs,
                native: RefCell::new(native),
                render: RefCell::new(None),
                requested: RefCell::new(None),
                me: me.clone(),
            }
        })
    }

    pub fn state(&self) -> &Mapping {
        &self.state
    }

    pub fn attrs(&self) -> &Mapping {
        &self.attrs
    }

    pub fn shadow_mode(&self) -> ShadowMode {
        self.config.shadow
    }

    pub fn is_observed(&self, name: &str) -> bool {
        self.config.observed_attributes.iter().any(|a| &**a == name)
    }

    /// Observed attribute as stored in `attrs`.
    pub fn attr(&self, name: &str) -> Option<Value> {
        if !self.is_observed(name) {
            return None;
        }
        self.attrs.get(name)
    }

    /// Native (text) attribute.
    pub fn get_attribute(&self, name: &str) -> Option<Rc<str>> {
        self.native.borrow().get(name).cloned()
    }

    /// Text lands in the native table (and in `attrs` when observed).
    /// Containers go to `attrs` when `name` is observed and are ignored
    /// otherwise; other primitives are stringified like text.
    pub fn set_attribute(&self, name: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        match &value {
            Value::Text(text) => self.set_native(name, text.clone()),
            _ if self.is_observed(name) => self.attrs.set(name, value.clone()),
            Value::Scalar(_) | Value::Mapping(_) | Value::Sequence(_) => {
                log::debug!("ignoring container written to unobserved attribute '{name}'");
                Ok(false)
            }
            primitive => self.set_native(name, primitive.to_string().into()),
        }
    }

    fn set_native(&self, name: &str, text: Rc<str>) -> Result<bool> {
        let old = self.native.borrow_mut().insert(name.into(), text.clone());
        if old.as_ref() == Some(&text) {
            return Ok(false);
        }
        if self.is_observed(name) {
            return self.attribute_changed(name, old.as_deref(), Some(&*text));
        }
        Ok(true)
    }

    /// Observed attributes are reset to the empty string; others are removed
    /// from the native table.
    pub fn remove_attribute(&self, name: &str) -> Result<bool> {
        if self.is_observed(name) {
            return self.attrs.set(name, "");
        }
        Ok(self.native.borrow_mut().shift_remove(name).is_some())
    }

    /// Native attribute change notification for an observed attribute.
    pub fn attribute_changed(
        &self,
        name: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) -> Result<bool> {
        log::trace!("attribute '{name}' changed: {old:?} -> {new:?}");
        self.attrs.set(name, new)
    }

    /// Points `attrs[name]` at `seq`. When it already holds `seq`, the
    /// sequence's change descriptor is re-dispatched on `attrs`, one event
    /// per source change, so consumers can patch instead of rebuilding.
    pub fn forward_sequence(
        &self,
        name: &str,
        seq: &Sequence,
        change_info: Option<ChangeInfo>,
    ) -> Result<bool> {
        if !self.is_observed(name) {
            log::debug!("ignoring sequence written to unobserved attribute '{name}'");
            return Ok(false);
        }
        match self.attrs.get(name) {
            Some(Value::Sequence(current)) if current.ptr_eq(seq) => {
                let value = Value::Sequence(seq.clone());
                self.attrs.dispatch(
                    ChangeEvent::new(
                        value.clone(),
                        value,
                        Value::Mapping(self.attrs.clone()),
                        change_info,
                    ),
                    Delivery::Distinct,
                )?;
                Ok(true)
            }
            _ => self.attrs.set(name, seq.clone()),
        }
    }

    pub fn set_render(&self, render: impl Fn(&ComponentHost) + 'static) {
        *self.render.borrow_mut() = Some(Rc::new(render));
    }

    pub fn render_requested(&self) -> bool {
        self.requested.borrow().is_some()
    }

    /// Schedules one render pass. A request still pending is cancelled first,
    /// so a burst of requests renders once.
    pub fn request_render(&self) -> Result<()> {
        if let Some(previous) = self.requested.borrow_mut().take() {
            previous.cancel();
        }
        let me = self.me.clone();
        let pending = scheduler::schedule(Box::new(move || {
            if let Some(host) = me.upgrade() {
                host.requested.borrow_mut().take();
                host.render_now();
            }
        }))?;
        *self.requested.borrow_mut() = Some(pending);
        Ok(())
    }

    /// Runs the render callback and marks the state as rendered.
    pub fn render_now(&self) {
        let render = self.render.borrow().clone();
        if let Some(render) = render {
            render(self);
        }
        self.state.usage_mut().set_rendered(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observed_attributes_are_seeded() {
        let host = ComponentHost::new(
            HostConfig::default()
                .attribute("title", "hello")
                .observe("title")
                .observe("count"),
        );
        assert_eq!(host.attr("title").unwrap().unwrapped(), Value::from("hello"));
        assert_eq!(host.attr("count").unwrap().unwrapped(), Value::Null);
        assert!(host.attr("title").unwrap().as_scalar().is_some());
        assert_eq!(host.shadow_mode(), ShadowMode::Closed);
    }

    #[test]
    fn test_state_owner_is_host() {
        let host = ComponentHost::new(HostConfig::default());
        let owner = host.state().usage().owner().unwrap();
        assert!(owner.downcast::<ComponentHost>().is_ok());
    }
}
