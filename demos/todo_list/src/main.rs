use std::rc::Rc;
use std::time::Duration;

use rivulet_core::*;
use rivulet_host::{ComponentHost, HostConfig, bind_attr};
use web_time::Instant;

fn todo(id: i32, title: &str, done: bool) -> Mapping {
    Mapping::from_entries([
        ("id", Value::from(id)),
        ("title", Value::from(title)),
        ("done", Value::from(done)),
    ])
}

fn is_done(item: &Value) -> bool {
    item.field("done").and_then(|d| d.as_bool()).unwrap_or(false)
}

/// Steps the frame queue at 8ms until nothing is left to run.
fn drain(frames: &FrameQueue, now: &mut Instant) {
    while frames.pending() > 0 {
        if let Some(ran) = frames.tick(*now) {
            log::info!("frame {}: {ran} task(s)", frames.frame_count());
        }
        *now += Duration::from_millis(8);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let frames = Rc::new(FrameQueue::with_interval(Duration::from_millis(16)));
    install_frame_scheduler(frames.clone());
    let mut now = Instant::now();

    let todos = Sequence::new([todo(1, "write parser", false), todo(2, "ship it", false)]);
    let rows = todos.map_with(
        |item, i| {
            let mark = if is_done(item) { "x" } else { " " };
            let title = item.field("title").unwrap_or_default();
            Value::from(format!("{}. [{mark}] {title}\n", i + 1))
        },
        true,
        false,
    );
    let open = todos.filter(|item| !is_done(item));

    let host = ComponentHost::new(HostConfig::default().observe("rows"));
    bind_attr(&host, "rows", &Value::from(rows.clone()))?;
    host.set_render({
        let rows = rows.clone();
        let open = open.clone();
        move |_| {
            print!("{rows}");
            println!("-- {} open --", open.len());
        }
    });
    host.attrs().add_event_listener(CHANGE, {
        let host = Rc::downgrade(&host);
        move |_| {
            let Some(host) = host.upgrade() else {
                return;
            };
            if let Err(err) = host.request_render() {
                log::warn!("render request failed: {err}");
            }
        }
    });

    host.request_render()?;
    drain(&frames, &mut now);

    todos.push(todo(3, "celebrate", false))?;
    todos.set(0, todo(1, "write parser", true))?;
    drain(&frames, &mut now);

    todos.delete(2)?;
    drain(&frames, &mut now);

    uninstall_frame_scheduler();
    Ok(())
}
