//! Listeners that keep a host attribute in sync with a reactive source.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use rivulet_core::{CHANGE, ChangeEvent, ListenerId, Result, Value};

use crate::ComponentHost;

type Registration = Rc<Cell<Option<ListenerId>>>;

fn listen(source: &Value, handler: impl Fn(&ChangeEvent) + 'static) -> Option<ListenerId> {
    match source {
        Value::Scalar(s) => Some(s.add_event_listener(CHANGE, handler)),
        Value::Mapping(m) => Some(m.add_event_listener(CHANGE, handler)),
        Value::Sequence(q) => Some(q.add_event_listener(CHANGE, handler)),
        _ => None,
    }
}

fn unlisten(source: &Value, id: ListenerId) -> bool {
    match source {
        Value::Scalar(s) => s.remove_event_listener(CHANGE, id),
        Value::Mapping(m) => m.remove_event_listener(CHANGE, id),
        Value::Sequence(q) => q.remove_event_listener(CHANGE, id),
        _ => false,
    }
}

/// Subscribes `attrs[name]` of `host` to `source`.
///
/// Plain values are written once and `None` is returned. Bidirectional
/// sources are followed for a single delivery: they re-announce their
/// current value, it is written, and the listener removes itself.
pub fn bind_attr(
    host: &Rc<ComponentHost>,
    name: &str,
    source: &Value,
) -> Result<Option<ListenerId>> {
    if !source.is_reactive() {
        host.set_attribute(name, source.clone())?;
        return Ok(None);
    }
    let registration: Registration = Rc::default();
    let handler = attr_change_handler(Rc::downgrade(host), name.into(), registration.clone());
    let id = listen(source, handler);
    registration.set(id);

    if source.is_bidirectional() {
        source.announce()?;
    } else {
        let initial = match source {
            Value::Scalar(s) => s.get_value(),
            container => container.clone(),
        };
        host.set_attribute(name, initial)?;
    }
    Ok(id)
}

fn attr_change_handler(
    host: Weak<ComponentHost>,
    name: Rc<str>,
    registration: Registration,
) -> impl Fn(&ChangeEvent) + 'static {
    move |event| {
        let source = &event.event_target;
        let Some(host) = host.upgrade() else {
            if let Some(id) = registration.take() {
                unlisten(source, id);
            }
            return;
        };
        if source.is_bidirectional()
            && let Some(id) = registration.take()
        {
            unlisten(source, id);
        }
        let written = match source {
            Value::Sequence(seq) => host.forward_sequence(&name, seq, event.change_info.clone()),
            Value::Mapping(_) => host.set_attribute(&name, source.clone()),
            _ => host.set_attribute(&name, event.value.clone()),
        };
        if let Err(err) = written {
            log::warn!("attribute '{name}' did not take the source change: {err}");
        }
    }
}

/// Presence-style attribute driven by `source`. The attribute is removed up
/// front and set again whenever the source turns truthy.
pub fn bind_bool_attr(
    host: &Rc<ComponentHost>,
    name: &str,
    source: &Value,
) -> Result<Option<ListenerId>> {
    host.remove_attribute(name)?;
    apply_bool(host, name, &source.unwrapped())?;
    if !source.is_reactive() {
        return Ok(None);
    }
    let handler = bool_attr_handler(Rc::downgrade(host), name.into());
    Ok(listen(source, handler))
}

fn bool_attr_handler(host: Weak<ComponentHost>, name: Rc<str>) -> impl Fn(&ChangeEvent) + 'static {
    move |event| {
        let Some(host) = host.upgrade() else {
            return;
        };
        if let Err(err) = apply_bool(&host, &name, &event.value.unwrapped()) {
            log::warn!("boolean attribute '{name}' not updated: {err}");
        }
    }
}

fn apply_bool(host: &ComponentHost, name: &str, value: &Value) -> Result<bool> {
    if is_truthy(value, name) {
        host.set_attribute(name, true)
    } else {
        host.remove_attribute(name)
    }
}

/// `true`, `"true"`, `"on"`, or the attribute's own name.
pub fn is_truthy(value: &Value, name: &str) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Text(t) => &**t == "true" || &**t == "on" || &**t == name,
        _ => false,
    }
}
