pub use crate::error::{ObserveError, Result};
pub use crate::event::{CHANGE, CHANGE_VALUE, ChangeEvent, ChangeInfo, ChangeKind, Key};
pub use crate::mapping::Mapping;
pub use crate::observed::{Delivery, ListenerId, Observed, Target, UsageRecord};
pub use crate::scalar::Scalar;
pub use crate::scheduler::{
    FrameQueue, PendingTask, Scheduler, SchedulerKind, TickQueue, flush_ticks,
    install_frame_scheduler, set_tick_fallback, uninstall_frame_scheduler,
};
pub use crate::sequence::{BuildKind, Provenance, Sequence};
pub use crate::value::Value;
