//! Worker and cancellation primitives for the discovery engine.
//!
//! Every long-lived subsystem (SSDP search, legacy search, NOTIFY listen,
//! per-adapter listeners) owns a [`Worker`]: a dedicated thread pulling
//! closures off a FIFO queue. Callers enqueue and return immediately;
//! blocking socket reads happen inside the worker with bounded timeouts.
//!
//! [`CancelToken`] provides cooperative cancellation: receive loops poll it
//! between bounded waits, and a companion timer can flip it once a listen
//! window elapses.

mod cancel;
mod worker;

pub use cancel::CancelToken;
pub use worker::Worker;
