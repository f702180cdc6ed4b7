//! Subscription templates
//!
//! A template is the (filter, interval, label) triple that defines one kind
//! of live stream. Every connection gets one subscription per template.

use std::sync::Arc;
use std::time::Duration;

use crate::store::RecordFilter;

/// Field carrying a record's classification
pub const CLASSIFICATION_FIELD: &str = "messagetype";

/// Definition of one labeled stream
#[derive(Debug, Clone)]
pub struct SubscriptionTemplate {
    /// Output channel label
    pub label: Arc<str>,
    /// Filter applied by the store
    pub filter: RecordFilter,
    /// Minimum delay between fetches
    pub interval: Duration,
}

impl SubscriptionTemplate {
    /// Create an unfiltered template
    pub fn new(label: impl Into<Arc<str>>, interval: Duration) -> Self {
        Self {
            label: label.into(),
            filter: RecordFilter::new(),
            interval,
        }
    }

    /// Set the filter
    pub fn filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Frequent lightweight updates: every record every 300ms on `all`
    pub fn all_updates() -> Self {
        Self::new("all", Duration::from_millis(300))
    }

    /// Infrequent heavyweight updates: `complex` records every 900ms on `complex`
    pub fn complex_updates() -> Self {
        Self::new("complex", Duration::from_millis(900))
            .filter(RecordFilter::new().field_eq(CLASSIFICATION_FIELD, "complex"))
    }

    /// The default template set
    pub fn baseline() -> Vec<Self> {
        vec![Self::all_updates(), Self::complex_updates()]
    }
}
