//! Interval-throttled driving of tail cursors

pub mod error;
pub mod handler;
pub mod throttle;

pub use error::MisuseError;
pub use handler::{DriveEvent, Flow, HandlerFuture, RecordHandler};
pub use throttle::{DriveSummary, StopReason, ThrottledDriver};
