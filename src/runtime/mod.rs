//! Time and timers.
//!
//! Staleness checks read a [`Clock`]; the URL and channel transports poll
//! through a [`Scheduler`]. Browsers get [`SystemClock`] and
//! [`BrowserScheduler`]; tests drive [`ManualClock`] and [`ManualScheduler`]
//! by hand.

mod time;
mod timer;

pub use time::{Clock, ManualClock, SystemClock};
#[cfg(target_arch = "wasm32")]
pub use timer::BrowserScheduler;
pub use timer::{ManualScheduler, Scheduler, TimerHandle};
