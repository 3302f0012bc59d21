//! # Observed containers and change propagation
//!
//! Rivulet gives a UI layer mutable values that report their own changes.
//! There are three containers, all sharing one event capability:
//!
//! - `Scalar`: a single observed value.
//! - `Mapping`: key/value store; plain values written into it are wrapped
//!   in `Scalar`s.
//! - `Sequence`: ordered container whose changes carry a descriptor
//!   (`set`, `push`, `delete`, `replace`) so consumers can patch instead of
//!   rebuilding.
//!
//! ## Scalars
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use rivulet_core::*;
//!
//! let count = Scalar::new(0);
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! count.add_event_listener("change", {
//!     let seen = seen.clone();
//!     move |e| seen.borrow_mut().push(e.value.clone())
//! });
//!
//! count.set_value(1).unwrap();
//! count.set_value(2).unwrap(); // same tick: replaces the pending delivery
//! flush_ticks();
//!
//! assert_eq!(*seen.borrow(), vec![Value::from(2)]);
//! ```
//!
//! ## Sequences and derived views
//!
//! `map` and `filter` return sequences that follow their source. They
//! subscribe once and translate each change descriptor:
//!
//! ```rust
//! use rivulet_core::*;
//!
//! let a = Sequence::new([1, 2, 3]);
//! let doubled = a.map(|x, _| Value::from(x.as_number().unwrap_or(0.0) * 2.0));
//!
//! a.set(1, 10).unwrap();
//! flush_ticks();
//!
//! assert_eq!(doubled.snapshot(), vec![Value::from(2), Value::from(20), Value::from(6)]);
//! ```
//!
//! ## Delivery
//!
//! Events are delivered on the host's next frame when a frame scheduler is
//! installed, otherwise on the next tick (`flush_ticks`). Scalar events are
//! coalesced per container; mapping and sequence mutations are delivered one
//! by one. See [`scheduler`] for installing a frame scheduler.

pub mod derived;
pub mod error;
pub mod event;
pub mod mapping;
pub mod observed;
pub mod prelude;
pub mod scalar;
pub mod scheduler;
pub mod sequence;
pub mod tests;
pub mod value;

pub use error::*;
pub use event::*;
pub use mapping::*;
pub use observed::*;
pub use prelude::*;
pub use scalar::*;
pub use scheduler::*;
pub use sequence::*;
pub use value::*;
