//! Record filter for tailable iteration
//!
//! `RecordFilter` is handed to the store when a tailable cursor is opened, so
//! non-matching records are skipped inside the store's iteration and never
//! reach the driver.
//!
//! # Filter Logic
//!
//! - An empty filter matches every record
//! - Each condition is an equality test on a top-level field
//! - Conditions are AND'd
//!
//! # Example
//!
//! ```
//! use tailpush::store::RecordFilter;
//!
//! let filter = RecordFilter::new().field_eq("messagetype", "complex");
//! assert!(!filter.is_empty());
//! ```

use serde_json::Value;

use super::record::Document;

/// Equality filter over document fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    conditions: Vec<(String, Value)>,
}

impl RecordFilter {
    /// Create an empty filter (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`
    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Check if filter is empty (matches everything)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Check if a document matches every condition
    #[inline]
    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }

    /// Conditions in insertion order
    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }
}

impl std::fmt::Display for RecordFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (i, (field, value)) in self.conditions.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", field, value)?;
        }
        f.write_str("}")
    }
}
