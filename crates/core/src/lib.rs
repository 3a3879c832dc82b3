#![forbid(unsafe_code)]

pub mod error;
pub mod grader;
pub mod model;
pub mod time;
pub mod timer;

pub use error::Error;
pub use grader::{grade, percentage};
pub use time::Clock;
pub use timer::{CountdownTimer, TickEvent, TimerState, format_remaining};
