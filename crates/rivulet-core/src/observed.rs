//! # Event capability
//!
//! `Observed<T>` decorates a container state `T` with the per-instance
//! usage record (listeners, owner back-reference, rendered flag, pending
//! batch) and the add/remove/dispatch surface shared by every reactive
//! container.
//!
//! The capability cannot be layered twice. `Observed<T>` is not a `Target`,
//! so wrapping an already observed type is rejected by the compiler:
//!
//! ```compile_fail
//! use rivulet_core::{Observed, ScalarState};
//!
//! let twice: Observed<Observed<ScalarState>> = todo!();
//! ```

use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::error::Result;
use crate::event::{CHANGE, ChangeEvent, internal_event_name};
use crate::scheduler::{self, PendingTask};

new_key_type! {
    pub struct ListenerId;
}

pub type Handler = Rc<dyn Fn(&ChangeEvent)>;

/// Keys with this prefix are private to the engine and never writable as data.
pub const PRIVATE_PREFIX: &str = "__";

/// Inner state a reactive container is built around.
pub trait Target: 'static {
    /// Field names that belong to the container type itself, not to user data.
    const RESERVED: &'static [&'static str] = &[];

    fn is_reserved(name: &str) -> bool {
        name.starts_with(PRIVATE_PREFIX) || Self::RESERVED.contains(&name)
    }
}

/// Whether a dispatch may be collapsed into a later one on the same record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Cancel any pending delivery; only the latest event of a burst survives.
    Coalesce,
    /// Every dispatch is delivered on its own.
    Distinct,
}

struct Listener {
    event: Rc<str>,
    handler: Handler,
}

struct PendingBatch {
    task: PendingTask,
    seq: u64,
}

/// Internal usage record, one per reactive instance.
#[derive(Default)]
pub struct UsageRecord {
    listeners: SlotMap<ListenerId, Listener>,
    by_event: HashMap<Rc<str>, SmallVec<[ListenerId; 4]>>,
    owner: Option<Weak<dyn Any>>,
    rendered: bool,
    pending: Option<PendingBatch>,
    batch_seq: u64,
}

impl UsageRecord {
    fn add(&mut self, event: &str, handler: Handler) -> ListenerId {
        let event: Rc<str> = event.into();
        let id = self.listeners.insert(Listener {
            event: event.clone(),
            handler,
        });
        self.by_event.entry(event).or_default().push(id);
        id
    }

    fn remove(&mut self, event: &str, id: ListenerId) -> bool {
        match self.listeners.get(id) {
            Some(l) if &*l.event == event => {}
            _ => return false,
        }
        self.listeners.remove(id);
        if let Some(ids) = self.by_event.get_mut(event) {
            ids.retain(|l| *l != id);
        }
        true
    }

    fn handlers(&self, event: &str) -> Vec<(ListenerId, Handler)> {
        self.by_event
            .get(event)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.listeners.get(*id).map(|l| (*id, l.handler.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_registered(&self, id: ListenerId) -> bool {
        self.listeners.contains_key(id)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.by_event
            .get(internal_event_name(event, false))
            .map_or(0, |ids| ids.len())
    }

    /// Non-owning back-reference to the element that owns this container.
    pub fn owner(&self) -> Option<Rc<dyn Any>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }

    pub fn set_owner(&mut self, owner: Weak<dyn Any>) {
        self.owner = Some(owner);
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    pub fn set_rendered(&mut self, rendered: bool) {
        self.rendered = rendered;
    }

    pub fn has_pending_batch(&self) -> bool {
        self.pending.is_some()
    }
}

/// A container state decorated with the event capability.
pub struct Observed<T: Target> {
    usage: Rc<RefCell<UsageRecord>>,
    bidirectional: Cell<bool>,
    state: RefCell<T>,
}

impl<T: Target> Observed<T> {
    pub fn new(state: T) -> Self {
        Self {
            usage: Rc::new(RefCell::new(UsageRecord::default())),
            bidirectional: Cell::new(false),
            state: RefCell::new(state),
        }
    }

    pub fn add_event_listener(
        &self,
        name: &str,
        handler: impl Fn(&ChangeEvent) + 'static,
    ) -> ListenerId {
        self.add_event_listener_with(name, handler, false)
    }

    /// `literal` keeps `"change"` as-is instead of aliasing it to `"changeValue"`.
    pub fn add_event_listener_with(
        &self,
        name: &str,
        handler: impl Fn(&ChangeEvent) + 'static,
        literal: bool,
    ) -> ListenerId {
        self.usage
            .borrow_mut()
            .add(internal_event_name(name, literal), Rc::new(handler))
    }

    /// Removing a listener that is not registered under `name` is a no-op.
    pub fn remove_event_listener(&self, name: &str, id: ListenerId) -> bool {
        self.remove_event_listener_with(name, id, false)
    }

    pub fn remove_event_listener_with(&self, name: &str, id: ListenerId, literal: bool) -> bool {
        self.usage
            .borrow_mut()
            .remove(internal_event_name(name, literal), id)
    }

    /// Schedules delivery of `event` to this container's listeners. Bursts are coalesced.
    pub fn dispatch_event(&self, event: ChangeEvent) -> Result<()> {
        dispatch_static(&self.usage_handle(), event, Delivery::Coalesce)
    }

    /// Like [`dispatch_event`](Self::dispatch_event), with the delivery mode
    /// chosen by the caller. Forwarded structural changes go `Distinct`.
    pub fn dispatch(&self, event: ChangeEvent, delivery: Delivery) -> Result<()> {
        dispatch_static(&self.usage_handle(), event, delivery)
    }

    pub fn is_bidirectional(&self) -> bool {
        self.bidirectional.get()
    }

    pub fn make_bidirectional(&self) -> bool {
        self.bidirectional.set(true);
        true
    }

    pub fn remove_bidirectional(&self) -> bool {
        self.bidirectional.set(false);
        false
    }

    pub fn usage(&self) -> Ref<'_, UsageRecord> {
        self.usage.borrow()
    }

    pub fn usage_mut(&self) -> RefMut<'_, UsageRecord> {
        self.usage.borrow_mut()
    }

    pub fn usage_handle(&self) -> Weak<RefCell<UsageRecord>> {
        Rc::downgrade(&self.usage)
    }

    pub(crate) fn state(&self) -> Ref<'_, T> {
        self.state.borrow()
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, T> {
        self.state.borrow_mut()
    }

    /// Registers a change listener that unregisters itself after its first
    /// delivery and hands the delivered snapshot to `store`: the new value for
    /// a Scalar, the container itself otherwise.
    pub(crate) fn bind_once(&self, store: impl Fn(crate::Value) + 'static) -> ListenerId {
        let registration: Rc<Cell<Option<ListenerId>>> = Rc::default();
        let usage = self.usage_handle();
        let id = self.add_event_listener(CHANGE, {
            let registration = registration.clone();
            move |event| {
                let Some(id) = registration.take() else {
                    return;
                };
                if let Some(record) = usage.upgrade() {
                    record.borrow_mut().remove(&event.name, id);
                }
                let snapshot = match &event.event_target {
                    crate::Value::Scalar(_) => event.value.clone(),
                    container => container.clone(),
                };
                store(snapshot);
            }
        });
        registration.set(Some(id));
        id
    }
}

/// Shared batching routine: schedules delivery of `event` to the listeners of
/// the record behind `usage`. A record that no longer exists is a silent no-op.
pub fn dispatch_static(
    usage: &Weak<RefCell<UsageRecord>>,
    event: ChangeEvent,
    delivery: Delivery,
) -> Result<()> {
    let Some(record) = usage.upgrade() else {
        log::trace!("dropping '{}' dispatch: usage record is gone", event.name);
        return Ok(());
    };
    let scheduler = scheduler::current()?;

    let seq = {
        let mut rec = record.borrow_mut();
        if delivery == Delivery::Coalesce
            && let Some(previous) = rec.pending.take()
            && previous.task.cancel()
        {
            log::debug!(
                "cancelled pending delivery; only the latest '{}' event will run",
                event.name
            );
        }
        rec.batch_seq += 1;
        rec.batch_seq
    };

    let handle = usage.clone();
    let task = scheduler::schedule_on(
        scheduler,
        Box::new(move || {
            let Some(record) = handle.upgrade() else {
                return;
            };
            {
                let mut rec = record.borrow_mut();
                if rec.pending.as_ref().is_some_and(|p| p.seq == seq) {
                    rec.pending = None;
                }
            }
            deliver(&record, &event);
        }),
    );
    record.borrow_mut().pending = Some(PendingBatch { task, seq });
    Ok(())
}

fn deliver(record: &Rc<RefCell<UsageRecord>>, event: &ChangeEvent) {
    let handlers = record.borrow().handlers(&event.name);
    log::trace!(
        "delivering '{}' to {} listener(s)",
        event.name,
        handlers.len()
    );
    for (id, handler) in handlers {
        // Listeners removed earlier in this delivery are skipped.
        if !record.borrow().is_registered(id) {
            continue;
        }
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
            let message = if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic.downcast_ref::<&str>() {
                s.to_string()
            } else {
                "Unknown panic".to_string()
            };
            log::error!(
                "listener for '{}' panicked: {message}; continuing delivery",
                event.name
            );
        }
    }
}
