//! Derived views over a [`Sequence`]: `map`, `filter` and `pipe`.
//!
//! `map` and `filter` views subscribe to their source exactly once. The
//! source listener holds the view weakly; once the view is dropped the
//! listener removes itself on its next delivery. `pipe` keeps its target.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use crate::error::Result;
use crate::event::{CHANGE, ChangeEvent, ChangeInfo, Key};
use crate::observed::{Delivery, ListenerId, Observed};
use crate::sequence::{BuildKind, Predicate, Provenance, SequenceState, Transform};
use crate::{Sequence, Value};

impl Sequence {
    /// Mapped render view: values are markup fragments, single-use.
    pub fn map(&self, transform: impl Fn(&Value, usize) -> Value + 'static) -> Sequence {
        self.map_with(transform, false, true)
    }

    pub fn map_with(
        &self,
        transform: impl Fn(&Value, usize) -> Value + 'static,
        produces_text: bool,
        is_render_artifact: bool,
    ) -> Sequence {
        let transform: Transform = Rc::new(transform);
        let view = Sequence::with_provenance(
            mapped(&self.values(), &transform),
            Provenance {
                built_with: BuildKind::Map,
                transform: Some(transform.clone()),
                produces_text,
                is_render_artifact,
                container: None,
            },
        );
        self.follow(&view, move |view, source, event| {
            view.follow_mapped(source, event, &transform)
        });
        view
    }

    pub fn filter(&self, predicate: impl Fn(&Value) -> bool + 'static) -> Sequence {
        let predicate: Predicate = Rc::new(predicate);
        let view = Sequence::new(self.values().into_iter().filter(|v| predicate(v)));
        self.follow(&view, move |view, source, event| {
            view.follow_filtered(source, event, &predicate)
        });
        view
    }

    /// Replays every change on this sequence against `target`: index writes
    /// and deletions verbatim, anything else as a full replace.
    ///
    /// The listener holds `target` strongly, so the pipe lives as long as this
    /// sequence does. Remove the returned listener to end it.
    pub fn pipe(&self, target: &Sequence) -> ListenerId {
        let target = target.clone();
        self.add_event_listener(CHANGE, move |event| {
            let Value::Sequence(source) = &event.event_target else {
                return;
            };
            let replayed = match &event.change_info {
                Some(ChangeInfo::Set {
                    key: Key::Index(index),
                }) => target.set(*index, event.value.clone()).map(|_| ()),
                Some(ChangeInfo::Delete { id, identifier, .. }) => {
                    target.delete_by(id.clone(), identifier).map(|_| ())
                }
                _ => target.replace_with(source.values(), true),
            };
            if let Err(err) = replayed {
                log::warn!("pipe target rejected a replayed change: {err}");
            }
        })
    }

    /// Subscribes `apply` to this sequence's changes on behalf of `view`.
    fn follow(
        &self,
        view: &Sequence,
        apply: impl Fn(&Sequence, &Sequence, &ChangeEvent) -> Result<()> + 'static,
    ) -> ListenerId {
        let weak_view: Weak<Observed<SequenceState>> = Rc::downgrade(&view.0);
        let registration: Rc<Cell<Option<ListenerId>>> = Rc::default();
        let id = self.add_event_listener(CHANGE, {
            let registration = registration.clone();
            move |event| {
                let Value::Sequence(from) = &event.event_target else {
                    return;
                };
                let Some(view) = weak_view.upgrade().map(Sequence) else {
                    if let Some(id) = registration.take() {
                        from.remove_event_listener(CHANGE, id);
                        log::trace!("derived view dropped; listener removed");
                    }
                    return;
                };
                if let Err(err) = apply(&view, from, event) {
                    log::warn!("derived view failed to follow source change: {err}");
                }
            }
        });
        registration.set(Some(id));
        id
    }

    /// Mirrors the source and forwards its descriptor unchanged. The view is
    /// already at the source's latest state when an earlier event of a burst
    /// is delivered; the descriptor and the computed `value` still describe
    /// that one change.
    fn follow_mapped(
        &self,
        source: &Sequence,
        event: &ChangeEvent,
        transform: &Transform,
    ) -> Result<()> {
        self.state_mut().items = mapped(&source.values(), transform);
        let (value, old) = match &event.change_info {
            Some(ChangeInfo::Set {
                key: Key::Index(index),
            }) => (
                transform(&event.value, *index),
                transform(&event.old_value, *index),
            ),
            Some(ChangeInfo::Push { key }) => (transform(&event.value, *key), Value::Null),
            Some(ChangeInfo::Delete { key, .. }) => {
                (Value::Null, transform(&event.old_value, *key))
            }
            _ => (Value::Null, Value::Null),
        };
        let delivery = if event.change_info.is_some() {
            Delivery::Distinct
        } else {
            Delivery::Coalesce
        };
        self.dispatch(
            ChangeEvent::new(
                value,
                old,
                Value::Sequence(self.clone()),
                event.change_info.clone(),
            ),
            delivery,
        )
    }

    fn follow_filtered(
        &self,
        source: &Sequence,
        event: &ChangeEvent,
        predicate: &Predicate,
    ) -> Result<()> {
        match &event.change_info {
            Some(ChangeInfo::Set {
                key: Key::Index(index),
            }) => {
                let Some(current) = source.get(*index) else {
                    return self.refilter(source, predicate);
                };
                match (predicate(&event.old_value), predicate(&current)) {
                    (false, false) => Ok(()),
                    (true, true) => {
                        let position = source.values()[..*index]
                            .iter()
                            .filter(|v| predicate(v))
                            .count();
                        if position >= self.len() {
                            return self.refilter(source, predicate);
                        }
                        let old =
                            std::mem::replace(&mut self.state_mut().items[position], current);
                        self.dispatch(
                            ChangeEvent::new(
                                event.value.clone(),
                                old.unwrapped(),
                                Value::Sequence(self.clone()),
                                Some(ChangeInfo::set_index(position)),
                            ),
                            Delivery::Distinct,
                        )
                    }
                    _ => self.refilter(source, predicate),
                }
            }
            Some(ChangeInfo::Delete { id, identifier, .. }) => {
                if self.position_of(id, identifier).is_some() {
                    self.delete_by(id.clone(), identifier)?;
                }
                Ok(())
            }
            _ => self.refilter(source, predicate),
        }
    }

    fn refilter(&self, source: &Sequence, predicate: &Predicate) -> Result<()> {
        self.state_mut().items = source.values().into_iter().filter(|v| predicate(v)).collect();
        self.dispatch(
            ChangeEvent::new(Value::Null, Value::Null, Value::Sequence(self.clone()), None),
            Delivery::Coalesce,
        )
    }
}

fn mapped(items: &[Value], transform: &Transform) -> Vec<Value> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| transform(item, i))
        .collect()
}
