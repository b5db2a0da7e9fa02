//! Background machinery: the timer thread that fires expirations, the worker
//! pool for asynchronous listeners, and the listener notifier.

pub(crate) mod notifier;
pub(crate) mod pool;
pub(crate) mod timer;
