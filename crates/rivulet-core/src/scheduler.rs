//! # Delivery scheduling
//!
//! Change events are never delivered inside the mutation that raised them.
//! Delivery is deferred to one of two queues:
//!
//! - a **next-frame** scheduler provided by the host (`FrameQueue`, or any
//!   other `Scheduler` the platform installs), drained once per frame;
//! - the per-thread **next-tick** fallback (`TickQueue`), drained by
//!   `flush_ticks()`.
//!
//! ```rust
//! use std::rc::Rc;
//! use rivulet_core::scheduler::*;
//!
//! let frames = Rc::new(FrameQueue::new());
//! install_frame_scheduler(frames.clone());
//!
//! let pending = schedule(Box::new(|| println!("next frame"))).unwrap();
//! assert_eq!(pending.kind(), SchedulerKind::NextFrame);
//! assert_eq!(frames.run_frame(), 1);
//!
//! uninstall_frame_scheduler();
//! ```
//!
//! When no frame scheduler is installed and the tick fallback has been
//! disabled, scheduling fails with `ObserveError::NoScheduler`.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use slotmap::{SlotMap, new_key_type};
use web_time::Instant;

use crate::error::{ObserveError, Result};

new_key_type! {
    pub struct TaskId;
}

pub type Task = Box<dyn FnOnce()>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerKind {
    NextFrame,
    NextTick,
}

/// A deferred-execution queue the engine can hand delivery work to.
pub trait Scheduler {
    fn schedule(&self, task: Task) -> TaskId;
    /// Returns false when the task already ran or was cancelled.
    fn cancel(&self, id: TaskId) -> bool;
    fn kind(&self) -> SchedulerKind;
}

#[derive(Default)]
struct TaskQueue {
    tasks: RefCell<SlotMap<TaskId, Task>>,
    order: RefCell<VecDeque<TaskId>>,
}

impl TaskQueue {
    fn push(&self, task: Task) -> TaskId {
        let id = self.tasks.borrow_mut().insert(task);
        self.order.borrow_mut().push_back(id);
        id
    }

    fn cancel(&self, id: TaskId) -> bool {
        self.tasks.borrow_mut().remove(id).is_some()
    }

    fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    fn queued(&self) -> usize {
        self.order.borrow().len()
    }

    /// Pops up to `limit` entries off the queue, running the ones that were
    /// not cancelled. Borrows are released before each task runs so tasks may
    /// schedule more work.
    fn run(&self, limit: Option<usize>) -> usize {
        let mut visited = 0;
        let mut ran = 0;
        loop {
            if let Some(limit) = limit
                && visited >= limit
            {
                break;
            }
            let Some(id) = self.order.borrow_mut().pop_front() else {
                break;
            };
            visited += 1;
            let task = self.tasks.borrow_mut().remove(id);
            if let Some(task) = task {
                task();
                ran += 1;
            }
        }
        ran
    }
}

/// Next-frame scheduler driven by the host's render loop.
///
/// Work requested while a frame is running lands in the following frame.
pub struct FrameQueue {
    queue: TaskQueue,
    interval: Option<Duration>,
    last_frame: Cell<Option<Instant>>,
    frames: Cell<u64>,
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameQueue {
    pub fn new() -> Self {
        Self {
            queue: TaskQueue::default(),
            interval: None,
            last_frame: Cell::new(None),
            frames: Cell::new(0),
        }
    }

    /// Frame-paced queue: `tick` only runs a frame once `interval` has passed.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            ..Self::new()
        }
    }

    /// Runs every task that was queued before this call.
    pub fn run_frame(&self) -> usize {
        let limit = self.queue.queued();
        let ran = self.queue.run(Some(limit));
        self.frames.set(self.frames.get() + 1);
        log::trace!("frame {} ran {} task(s)", self.frames.get(), ran);
        ran
    }

    /// Runs a frame if one is due at `now`. Returns `None` when skipped.
    pub fn tick(&self, now: Instant) -> Option<usize> {
        if let (Some(interval), Some(last)) = (self.interval, self.last_frame.get())
            && now.saturating_duration_since(last) < interval
        {
            return None;
        }
        self.last_frame.set(Some(now));
        Some(self.run_frame())
    }

    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.get()
    }
}

impl Scheduler for FrameQueue {
    fn schedule(&self, task: Task) -> TaskId {
        self.queue.push(task)
    }

    fn cancel(&self, id: TaskId) -> bool {
        self.queue.cancel(id)
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::NextFrame
    }
}

/// Same-turn deferred queue. Tasks queued while flushing run in that flush.
#[derive(Default)]
pub struct TickQueue {
    queue: TaskQueue,
}

impl TickQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush(&self) -> usize {
        self.queue.run(None)
    }

    pub fn pending(&self) -> usize {
        self.queue.pending()
    }
}

impl Scheduler for TickQueue {
    fn schedule(&self, task: Task) -> TaskId {
        self.queue.push(task)
    }

    fn cancel(&self, id: TaskId) -> bool {
        self.queue.cancel(id)
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::NextTick
    }
}

struct HostSchedulers {
    frame: Option<Rc<dyn Scheduler>>,
    tick: Rc<TickQueue>,
    tick_enabled: bool,
}

impl Default for HostSchedulers {
    fn default() -> Self {
        Self {
            frame: None,
            tick: Rc::new(TickQueue::new()),
            tick_enabled: true,
        }
    }
}

thread_local! {
    static HOST: RefCell<HostSchedulers> = RefCell::new(HostSchedulers::default());
}

/// Install the host's next-frame scheduler for this thread, replacing any previous one.
pub fn install_frame_scheduler(scheduler: Rc<dyn Scheduler>) {
    HOST.with(|h| h.borrow_mut().frame = Some(scheduler));
}

pub fn uninstall_frame_scheduler() -> Option<Rc<dyn Scheduler>> {
    HOST.with(|h| h.borrow_mut().frame.take())
}

/// Enable or disable the next-tick fallback. Enabled by default.
pub fn set_tick_fallback(enabled: bool) {
    HOST.with(|h| h.borrow_mut().tick_enabled = enabled);
}

/// Drain this thread's tick queue, including work queued while draining.
pub fn flush_ticks() -> usize {
    let tick = HOST.with(|h| h.borrow().tick.clone());
    tick.flush()
}

pub fn pending_ticks() -> usize {
    HOST.with(|h| h.borrow().tick.pending())
}

/// Resolve the scheduler deliveries go to: next-frame first, then next-tick.
pub fn current() -> Result<Rc<dyn Scheduler>> {
    HOST.with(|h| {
        let h = h.borrow();
        if let Some(frame) = &h.frame {
            return Ok(frame.clone());
        }
        if h.tick_enabled {
            let tick: Rc<dyn Scheduler> = h.tick.clone();
            return Ok(tick);
        }
        Err(ObserveError::NoScheduler)
    })
}

/// Handle to a scheduled task; the opaque "pending batch" of a usage record.
pub struct PendingTask {
    scheduler: Rc<dyn Scheduler>,
    id: TaskId,
}

impl PendingTask {
    pub fn cancel(self) -> bool {
        self.scheduler.cancel(self.id)
    }

    pub fn kind(&self) -> SchedulerKind {
        self.scheduler.kind()
    }
}

impl std::fmt::Debug for PendingTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTask")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .finish()
    }
}

pub fn schedule(task: Task) -> Result<PendingTask> {
    Ok(schedule_on(current()?, task))
}

pub fn schedule_on(scheduler: Rc<dyn Scheduler>, task: Task) -> PendingTask {
    let id = scheduler.schedule(task);
    PendingTask { scheduler, id }
}
