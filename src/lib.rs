//! A deferred value: a [`Promise`] starts out undecided, settles exactly
//! once as fulfilled or rejected, and notifies every handler chained on it,
//! before or after it settled, exactly once each and in registration order.
//!
//! Handlers never run on the stack of the call that made them eligible.
//! They go through a [`Scheduler`], chosen per promise in a [`Config`].
//! A handler's result settles a new derived promise; if that result is
//! itself thenable (see [`Payload`]) its eventual outcome is adopted.
//!
//! ```
//! use thenable::{deferred, Config, Error, TaskQueue};
//! use std::sync::{Arc, Mutex};
//!
//! let queue = TaskQueue::new();
//! let seen = Arc::new(Mutex::new(None));
//! let d = deferred::<i32, Error>(&Config::new(queue.clone()));
//! let sink = seen.clone();
//! d.promise
//!     .and_then(|v| Ok(v * 2))
//!     .and_then(move |v| {
//!         *sink.lock().unwrap() = Some(v);
//!         Ok(())
//!     });
//! (d.resolve)(42);
//! assert_eq!(*seen.lock().unwrap(), None);
//! queue.run_until_idle();
//! assert_eq!(*seen.lock().unwrap(), Some(84));
//! ```
pub mod config;
pub mod deferred;
pub mod error;
pub mod payload;
pub mod promise;
pub mod scheduler;
pub mod settled;

pub use config::Config;
pub use deferred::{deferred, rejected, resolved, Deferred};
pub use error::Error;
pub use payload::{is_thenable, Callback, Payload, Reason, Then, ThenFn};
pub use promise::{Promise, PromiseId, PromiseState};
pub use scheduler::{Scheduler, Task, TaskQueue, ThreadScheduler};
pub use settled::Settled;
