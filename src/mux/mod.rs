//! Per-connection subscription multiplexing
//!
//! Every connection gets one independently filtered, independently paced
//! tail stream per [`SubscriptionTemplate`], each routed to its own label.

pub mod multiplexer;
pub mod template;

pub use multiplexer::{ConnectionSubscriptions, SubscriptionMux};
pub use template::{SubscriptionTemplate, CLASSIFICATION_FIELD};
