#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    use web_time::Instant;

    use crate::observed::{Observed, Target};
    use crate::scheduler::*;
    use crate::*;

    fn record<T: Target>(target: &Observed<T>) -> Rc<RefCell<Vec<ChangeEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        target.add_event_listener("change", move |e| sink.borrow_mut().push(e.clone()));
        seen
    }

    fn item(id: i32) -> Mapping {
        Mapping::from_entries([("id", id)])
    }

    fn nums(values: &[i32]) -> Vec<Value> {
        values.iter().copied().map(Value::from).collect()
    }

    fn even_id(x: &Value) -> bool {
        x.field("id").and_then(|v| v.as_number()).unwrap_or(1.0) % 2.0 == 0.0
    }

    fn number(n: f64) -> impl Fn(&Value, usize) -> Value {
        move |x, _| Value::from(x.as_number().unwrap_or(0.0) * n)
    }

    #[test]
    fn test_scalar_emits_only_on_change() {
        let s = Scalar::new(1);
        let seen = record(&s);

        assert!(!s.set_value(1).unwrap());
        flush_ticks();
        assert!(seen.borrow().is_empty());

        assert!(s.set_value(2).unwrap());
        assert_eq!(s.get_value(), Value::from(2));
        flush_ticks();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].value, Value::from(2));
        assert_eq!(seen[0].old_value, Value::from(1));
        assert!(seen[0].change_info.is_none());
        assert!(matches!(&seen[0].event_target, Value::Scalar(t) if t.ptr_eq(&s)));
    }

    #[test]
    fn test_scalar_same_value_twice_emits_once() {
        let s = Scalar::new("a");
        let seen = record(&s);

        s.set_value("b").unwrap();
        flush_ticks();
        s.set_value("b").unwrap();
        flush_ticks();

        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_scalar_burst_is_coalesced() {
        let s = Scalar::new(0);
        let seen = record(&s);

        s.set_value(1).unwrap();
        s.set_value(2).unwrap();
        flush_ticks();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].value, Value::from(2));
        assert_eq!(seen[0].old_value, Value::from(1));
    }

    #[test]
    fn test_sequence_mutations_are_distinct() {
        let q = Sequence::default();
        let seen = record(&q);

        q.push(1).unwrap();
        q.push(2).unwrap();
        flush_ticks();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].change_info, Some(ChangeInfo::Push { key: 0 }));
        assert_eq!(seen[1].change_info, Some(ChangeInfo::Push { key: 1 }));
    }

    #[test]
    fn test_change_alias_and_literal_name() {
        let s = Scalar::new(0);
        let aliased = Rc::new(Cell::new(0));
        let literal = Rc::new(Cell::new(0));

        s.add_event_listener(CHANGE_VALUE, {
            let aliased = aliased.clone();
            move |_| aliased.set(aliased.get() + 1)
        });
        s.add_event_listener_with(
            "change",
            {
                let literal = literal.clone();
                move |_| literal.set(literal.get() + 1)
            },
            true,
        );

        s.set_value(1).unwrap();
        flush_ticks();
        assert_eq!(aliased.get(), 1);
        assert_eq!(literal.get(), 0);

        s.dispatch_event(ChangeEvent::named(
            "change",
            Value::Null,
            Value::Null,
            Value::Scalar(s.clone()),
            None,
        ))
        .unwrap();
        flush_ticks();
        assert_eq!(literal.get(), 1);
    }

    #[test]
    fn test_remove_listener() {
        let s = Scalar::new(0);
        let hits = Rc::new(Cell::new(0));
        let id = s.add_event_listener("change", {
            let hits = hits.clone();
            move |_| hits.set(hits.get() + 1)
        });

        // Wrong name: the literal "change" set never held it.
        assert!(!s.remove_event_listener_with("change", id, true));
        assert!(s.remove_event_listener("change", id));
        assert!(!s.remove_event_listener("change", id));

        s.set_value(1).unwrap();
        flush_ticks();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_bidirectional_flag() {
        let s = Scalar::new(0);
        assert!(!s.is_bidirectional());
        assert!(s.make_bidirectional());
        assert!(s.make_bidirectional());
        assert!(s.is_bidirectional());
        assert!(!s.remove_bidirectional());
        assert!(!s.is_bidirectional());
    }

    #[test]
    fn test_mapping_wraps_plain_values() {
        let m = Mapping::new();
        let seen = record(&m);

        assert!(m.set("name", "ada").unwrap());
        let stored = m.get("name").unwrap();
        assert!(stored.as_scalar().is_some());
        assert_eq!(stored.unwrapped(), Value::from("ada"));

        flush_ticks();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].change_info, Some(ChangeInfo::set_name("name")));
        assert_eq!(seen[0].value, Value::from("ada"));
        assert_eq!(seen[0].old_value, Value::Null);
    }

    #[test]
    fn test_mapping_write_keeps_scalar_identity() {
        let m = Mapping::new();
        m.set("count", 1).unwrap();
        let slot = m.get("count").unwrap().as_scalar().cloned().unwrap();
        let slot_seen = record(&slot);
        flush_ticks();

        m.set("count", 2).unwrap();
        flush_ticks();

        let now = m.get("count").unwrap();
        assert!(now.as_scalar().unwrap().ptr_eq(&slot));
        assert_eq!(slot.get_value(), Value::from(2));
        assert_eq!(slot_seen.borrow().len(), 1);

        // Same value again: no-op all the way down.
        assert!(!m.set("count", 2).unwrap());
    }

    #[test]
    fn test_mapping_stores_reactive_values_as_is() {
        let m = Mapping::new();
        let inner = Sequence::new([1, 2]);
        m.set("items", inner.clone()).unwrap();
        assert!(m.get("items").unwrap().as_sequence().unwrap().ptr_eq(&inner));
    }

    #[test]
    fn test_mapping_rejects_reserved_keys() {
        let m = Mapping::new();
        let seen = record(&m);

        assert!(!m.set("__secret", 1).unwrap());
        assert!(!m.set("dispatch_event", 1).unwrap());
        assert!(m.get("__secret").is_none());
        assert!(m.is_empty());

        flush_ticks();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_mapping_does_not_rebubble_nested_changes() {
        let parent = Mapping::new();
        let child = Mapping::new();
        parent.set("child", child.clone()).unwrap();
        flush_ticks();

        let seen = record(&parent);
        child.set("x", 1).unwrap();
        flush_ticks();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_sequence_index_set() {
        let q = Sequence::new([1, 2, 3]);
        let seen = record(&q);

        assert!(q.set(1, 10).unwrap());
        assert!(q.get(1).unwrap().as_scalar().is_some());
        flush_ticks();

        let seen = seen.borrow();
        assert_eq!(seen[0].change_info, Some(ChangeInfo::set_index(1)));
        assert_eq!(seen[0].value, Value::from(10));
        assert_eq!(seen[0].old_value, Value::from(2));
    }

    #[test]
    fn test_sequence_set_past_end_pads() {
        let q = Sequence::new([1]);
        q.set(3, 4).unwrap();
        assert_eq!(q.len(), 4);
        assert_eq!(q.get(2), Some(Value::Null));
    }

    #[test]
    fn test_sequence_length_field() {
        let q = Sequence::new([1, 2, 3]);
        let seen = record(&q);

        assert!(q.set_field("length", 1).unwrap());
        assert_eq!(q.len(), 1);
        assert_eq!(q.get_field("length"), Some(Value::from(1)));

        assert!(!q.set_field("map", 1).unwrap());
        assert!(!q.set_field("__hidden", 1).unwrap());
        assert!(!q.set_field("label", 1).unwrap());
        assert!(q.set_field("0", 7).unwrap());
        assert_eq!(q.get_field("0").unwrap().unwrapped(), Value::from(7));

        flush_ticks();
        // Only the index write emits.
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_delete_round_trip() {
        let q = Sequence::default();
        let seen = record(&q);

        q.push(item(1)).unwrap();
        assert_eq!(q.delete(1).unwrap(), 0);
        assert_eq!(q.len(), 0);
        flush_ticks();

        let seen = seen.borrow();
        assert_eq!(
            seen[1].change_info,
            Some(ChangeInfo::Delete {
                id: Value::from(1),
                identifier: "id".into(),
                key: 0,
            })
        );
    }

    #[test]
    fn test_delete_by_custom_identifier() {
        let q = Sequence::new([
            Mapping::from_entries([("slug", "a")]),
            Mapping::from_entries([("slug", "b")]),
        ]);
        assert_eq!(q.delete_by("b", "slug").unwrap(), 1);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let q = Sequence::new([item(1)]);
        let seen = record(&q);

        let err = q.delete(9).unwrap_err();
        assert!(matches!(err, ObserveError::NotFound { .. }));
        assert_eq!(q.len(), 1);

        flush_ticks();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_trigger_empty_change_has_no_descriptor() {
        let q = Sequence::default();
        let seen = record(&q);

        q.trigger_empty_change().unwrap();
        flush_ticks();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].change_info.is_none());
        assert!(seen[0].is_full_rebuild());
    }

    #[test]
    fn test_replace_with() {
        let q = Sequence::new([1, 2]);
        let seen = record(&q);

        q.replace_with([7], false).unwrap();
        flush_ticks();
        assert!(seen.borrow().is_empty());
        assert_eq!(q.snapshot(), vec![Value::from(7)]);

        q.replace_with([8, 9], true).unwrap();
        flush_ticks();
        assert_eq!(seen.borrow()[0].change_info, Some(ChangeInfo::Replace));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_map_follows_set() {
        let a = Sequence::new([1, 2, 3]);
        let doubled = a.map(number(2.0));
        let seen = record(&doubled);

        a.set(1, 10).unwrap();
        flush_ticks();

        assert_eq!(
            doubled.snapshot(),
            vec![Value::from(2), Value::from(20), Value::from(6)]
        );
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].change_info, Some(ChangeInfo::set_index(1)));
        assert_eq!(seen[0].value, Value::from(20));
    }

    #[test]
    fn test_map_provenance() {
        let a = Sequence::new([1]);
        let view = a.map_with(|x, _| Value::from(x.to_string()), true, false);
        let p = view.provenance();
        assert_eq!(p.built_with, BuildKind::Map);
        assert!(p.transform.is_some());
        assert!(p.produces_text);
        assert!(!p.is_render_artifact);
        assert_eq!(a.provenance().built_with, BuildKind::Constructor);
    }

    #[test]
    fn test_map_of_empty_source_is_empty() {
        let a = Sequence::default();
        let view = a.map(number(2.0));
        assert!(view.is_empty());
    }

    #[test]
    fn test_map_follows_push_delete_and_replace() {
        let a = Sequence::new([item(1), item(2)]);
        let ids = a.map(|x, _| x.field("id").unwrap_or_default());
        let seen = record(&ids);

        a.push(item(3)).unwrap();
        flush_ticks();
        assert_eq!(ids.snapshot(), nums(&[1, 2, 3]));

        a.delete(1).unwrap();
        flush_ticks();
        assert_eq!(ids.snapshot(), nums(&[2, 3]));

        a.replace_with([item(5)], true).unwrap();
        flush_ticks();
        assert_eq!(ids.snapshot(), nums(&[5]));

        let kinds: Vec<_> = seen.borrow().iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                Some(ChangeKind::Push),
                Some(ChangeKind::Delete),
                Some(ChangeKind::Replace)
            ]
        );
    }

    #[test]
    fn test_map_length_tracks_source_after_full_replace() {
        let a = Sequence::new([1, 2, 3]);
        let view = a.map(number(1.0));
        a.replace_with([4], false).unwrap();
        a.trigger_empty_change().unwrap();
        flush_ticks();
        assert_eq!(view.len(), a.len());
    }

    #[test]
    fn test_filter_follows_delete() {
        let a = Sequence::new([item(1), item(2)]);
        let evens = a.filter(even_id);
        assert_eq!(evens.len(), 1);

        a.delete(2).unwrap();
        flush_ticks();
        assert!(evens.is_empty());
    }

    #[test]
    fn test_filter_ignores_delete_of_non_member() {
        let a = Sequence::new([item(1), item(2)]);
        let evens = a.filter(even_id);
        let seen = record(&evens);

        a.delete(1).unwrap();
        flush_ticks();
        assert_eq!(evens.len(), 1);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_filter_set_updates_or_rebuilds() {
        let a = Sequence::new([1, 2, 3, 4]);
        let big = a.filter(|x| x.as_number().unwrap_or(0.0) > 2.0);
        let seen = record(&big);

        // Member stays a member: patched in place at its view position.
        a.set(3, 40).unwrap();
        flush_ticks();
        assert_eq!(big.snapshot(), nums(&[3, 40]));
        assert_eq!(seen.borrow()[0].change_info, Some(ChangeInfo::set_index(1)));

        // Non-member becomes a member: full rebuild.
        a.set(0, 10).unwrap();
        flush_ticks();
        assert_eq!(big.snapshot(), nums(&[10, 3, 40]));
        assert!(seen.borrow()[1].is_full_rebuild());

        // Non-member stays out: ignored.
        a.set(1, 0).unwrap();
        flush_ticks();
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_filter_rebuilds_on_push() {
        let a = Sequence::new([1]);
        let odd = a.filter(|x| x.as_number().unwrap_or(0.0) % 2.0 == 1.0);
        a.push(3).unwrap();
        a.push(4).unwrap();
        flush_ticks();
        assert_eq!(odd.snapshot(), nums(&[1, 3]));
    }

    #[test]
    fn test_pipe_replays_changes() {
        let source = Sequence::new([item(1), item(2)]);
        let target = Sequence::new([item(1), item(2)]);
        source.pipe(&target);

        source.set(0, item(7)).unwrap();
        flush_ticks();
        assert_eq!(target.get(0).unwrap().field("id"), Some(Value::from(7)));

        source.delete(2).unwrap();
        flush_ticks();
        assert_eq!(target.len(), 1);

        source.push(item(3)).unwrap();
        flush_ticks();
        assert_eq!(target.len(), 2);
        assert_eq!(target.get(1).unwrap().field("id"), Some(Value::from(3)));
    }

    #[test]
    fn test_dropped_view_unsubscribes() {
        let a = Sequence::new([1, 2]);
        let view = a.map(number(2.0));
        assert_eq!(a.usage().listener_count("change"), 1);

        drop(view);
        a.push(3).unwrap();
        flush_ticks();
        assert_eq!(a.usage().listener_count("change"), 0);
    }

    #[test]
    fn test_clean_after_render() {
        let a = Sequence::new([1, 2]);
        let rendered = a.map(number(1.0));
        let text = a.map_with(number(1.0), true, false);

        assert!(rendered.clean_after_render());
        assert!(rendered.is_empty());
        assert!(!text.clean_after_render());
        assert_eq!(text.len(), 2);
        assert!(!a.clean_after_render());
    }

    #[test]
    fn test_sequence_coercions() {
        let q = Sequence::new([Value::from("a"), Value::from(1), Value::from("b")]);
        assert_eq!(q.to_string(), "a1b");
        assert!(q.to_number().is_nan());
    }

    #[test]
    fn test_bidirectional_snapshot_then_bind() {
        let source = Scalar::new("initial");
        source.make_bidirectional();
        let m = Mapping::new();

        assert!(!m.set("title", source.clone()).unwrap());
        assert_eq!(source.usage().listener_count("change"), 1);
        flush_ticks();

        assert_eq!(m.get("title").unwrap().unwrapped(), Value::from("initial"));
        assert!(!m.get("title").unwrap().as_scalar().unwrap().ptr_eq(&source));
        assert_eq!(source.usage().listener_count("change"), 0);

        source.set_value("later").unwrap();
        flush_ticks();
        assert_eq!(m.get("title").unwrap().unwrapped(), Value::from("initial"));
    }

    #[test]
    fn test_bidirectional_push_into_sequence() {
        let source = Scalar::new(5);
        source.make_bidirectional();
        let q = Sequence::default();
        let seen = record(&q);

        assert_eq!(q.push(source.clone()).unwrap(), 0);
        assert_eq!(q.len(), 1);
        flush_ticks();
        assert_eq!(q.snapshot(), nums(&[5]));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].change_info, Some(ChangeInfo::Push { key: 0 }));
        assert_eq!(seen[0].value, Value::from(5));
    }

    #[test]
    fn test_binding_keeps_pending_old_value() {
        let source = Scalar::new(4);
        source.make_bidirectional();
        let seen = record(&source);

        source.set_value(5).unwrap();
        let m = Mapping::new();
        assert!(!m.set("k", source.clone()).unwrap());
        flush_ticks();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].value, Value::from(5));
        assert_eq!(seen[0].old_value, Value::from(4));
        assert_eq!(m.get("k").unwrap().unwrapped(), Value::from(5));
        assert_eq!(source.usage().listener_count("change"), 1);
    }

    #[test]
    fn test_binding_bidirectional_sequence_stores_the_container() {
        let source = Sequence::new([1]);
        source.make_bidirectional();
        source.push(2).unwrap();
        let m = Mapping::new();
        m.set("items", source.clone()).unwrap();
        flush_ticks();

        assert!(m.get("items").unwrap().as_sequence().unwrap().ptr_eq(&source));
    }

    #[test]
    fn test_no_scheduler_is_fatal() {
        set_tick_fallback(false);
        let s = Scalar::new(0);
        let err = s.set_value(1).unwrap_err();
        assert!(matches!(err, ObserveError::NoScheduler));
        set_tick_fallback(true);
    }

    #[test]
    fn test_frame_scheduler_takes_precedence() {
        let frames = Rc::new(FrameQueue::new());
        install_frame_scheduler(frames.clone());

        let s = Scalar::new(0);
        let seen = record(&s);
        s.set_value(1).unwrap();

        assert_eq!(flush_ticks(), 0);
        assert!(seen.borrow().is_empty());
        assert_eq!(frames.pending(), 1);

        assert_eq!(frames.run_frame(), 1);
        assert_eq!(seen.borrow().len(), 1);
        assert!(!s.usage().has_pending_batch());

        uninstall_frame_scheduler();
    }

    #[test]
    fn test_frame_queue_defers_work_requested_during_frame() {
        let frames = Rc::new(FrameQueue::new());
        let ran = Rc::new(Cell::new(0));
        let inner = frames.clone();
        let counter = ran.clone();
        frames.schedule(Box::new(move || {
            counter.set(counter.get() + 1);
            let counter = counter.clone();
            inner.schedule(Box::new(move || counter.set(counter.get() + 1)));
        }));

        assert_eq!(frames.run_frame(), 1);
        assert_eq!(ran.get(), 1);
        assert_eq!(frames.run_frame(), 1);
        assert_eq!(ran.get(), 2);
    }

    #[test]
    fn test_frame_pacing() {
        let frames = FrameQueue::with_interval(Duration::from_millis(16));
        let t0 = Instant::now();

        assert_eq!(frames.tick(t0), Some(0));
        assert_eq!(frames.tick(t0 + Duration::from_millis(5)), None);
        assert_eq!(frames.tick(t0 + Duration::from_millis(16)), Some(0));
        assert_eq!(frames.frame_count(), 2);
    }

    #[test]
    fn test_cancelled_task_does_not_run() {
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let pending = schedule(Box::new(move || flag.set(true))).unwrap();
        assert_eq!(pending.kind(), SchedulerKind::NextTick);
        assert!(pending.cancel());
        flush_ticks();
        assert!(!ran.get());
    }

    #[test]
    fn test_panicking_listener_does_not_stop_delivery() {
        let s = Scalar::new(0);
        s.add_event_listener("change", |_| panic!("boom"));
        let seen = record(&s);

        s.set_value(1).unwrap();
        flush_ticks();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_listener_removed_mid_delivery_is_skipped() {
        let s = Scalar::new(0);
        let second_ran = Rc::new(Cell::new(false));
        let second_id = Rc::new(Cell::new(None));

        s.add_event_listener("change", {
            let s = s.clone();
            let second_id = second_id.clone();
            move |_| {
                if let Some(id) = second_id.get() {
                    s.remove_event_listener("change", id);
                }
            }
        });
        let id = s.add_event_listener("change", {
            let second_ran = second_ran.clone();
            move |_| second_ran.set(true)
        });
        second_id.set(Some(id));

        s.set_value(1).unwrap();
        flush_ticks();
        assert!(!second_ran.get());
    }

    #[test]
    fn test_dispatch_after_drop_is_silent() {
        let s = Scalar::new(0);
        let handle = s.usage_handle();
        drop(s);
        let event = ChangeEvent::new(Value::Null, Value::Null, Value::Null, None);
        assert!(dispatch_static(&handle, event, Delivery::Coalesce).is_ok());
        assert_eq!(pending_ticks(), 0);
    }

    #[test]
    fn test_owner_is_not_kept_alive() {
        let m = Mapping::new();
        let owner: Rc<dyn Any> = Rc::new(String::from("element"));
        m.usage_mut().set_owner(Rc::downgrade(&owner));
        assert!(m.usage().owner().is_some());

        drop(owner);
        assert!(m.usage().owner().is_none());
    }

    #[test]
    fn test_value_identity() {
        let a = Scalar::new(1);
        let b = Scalar::new(1);
        assert_ne!(Value::from(a.clone()), Value::from(b));
        assert_eq!(Value::from(a.clone()), Value::from(a));
        assert_ne!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_eq!(Value::from(2.0).to_string(), "2");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_map_burst_of_pushes() {
        let a = Sequence::new([1]);
        let view = a.map(number(2.0));
        let seen = record(&view);

        a.push(2).unwrap();
        a.push(3).unwrap();
        flush_ticks();

        assert_eq!(view.snapshot(), nums(&[2, 4, 6]));
        let seen = seen.borrow();
        let infos: Vec<_> = seen.iter().map(|e| e.change_info.clone()).collect();
        assert_eq!(
            infos,
            vec![
                Some(ChangeInfo::Push { key: 1 }),
                Some(ChangeInfo::Push { key: 2 })
            ]
        );
        assert_eq!(seen[0].value, Value::from(4));
        assert_eq!(seen[1].value, Value::from(6));
    }

    #[test]
    fn test_map_burst_of_deletes() {
        let a = Sequence::new([item(1), item(2), item(3)]);
        let ids = a.map(|x, _| x.field("id").unwrap_or_default());
        let seen = record(&ids);

        a.delete(1).unwrap();
        a.delete(2).unwrap();
        flush_ticks();

        assert_eq!(ids.snapshot(), nums(&[3]));
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[0].change_info,
            Some(ChangeInfo::Delete {
                id: Value::from(1),
                identifier: "id".into(),
                key: 0,
            })
        );
        assert_eq!(
            seen[1].change_info,
            Some(ChangeInfo::Delete {
                id: Value::from(2),
                identifier: "id".into(),
                key: 0,
            })
        );
        assert_eq!(seen[0].old_value, Value::from(1));
    }

    #[test]
    fn test_map_push_then_delete_in_one_tick() {
        let a = Sequence::new([item(1)]);
        let ids = a.map(|x, _| x.field("id").unwrap_or_default());
        let seen = record(&ids);

        a.push(item(2)).unwrap();
        a.delete(1).unwrap();
        flush_ticks();

        assert_eq!(ids.snapshot(), nums(&[2]));
        let kinds: Vec<_> = seen.borrow().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![Some(ChangeKind::Push), Some(ChangeKind::Delete)]);
        assert_eq!(seen.borrow()[0].value, Value::from(2));
    }

    #[test]
    fn test_pipe_outlives_target_handle() {
        let source = Sequence::new([1]);
        let target = Sequence::new([1]);
        let seen = record(&target);
        source.pipe(&target);
        drop(target);

        source.push(2).unwrap();
        flush_ticks();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].change_info, Some(ChangeInfo::Replace));
    }
}
