//! Tailing primitives
//!
//! - [`is_capped`] gates startup on the target collection being a capped log
//! - [`TailCursor`] iterates a capped log in natural order and waits at the tail

pub mod config;
pub mod cursor;
pub mod eligibility;
pub mod error;

pub use config::TailConfig;
pub use cursor::{CursorState, Fetch, TailCursor};
pub use eligibility::is_capped;
pub use error::{CursorError, EligibilityError};
