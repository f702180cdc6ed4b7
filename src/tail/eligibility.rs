//! Capped-log eligibility check
//!
//! Tailable cursors only work on capped collections, so the options document
//! of the target collection is checked once before anything is served.
//! A store that answers without an options document is reported as an error,
//! not as "not capped".

use crate::store::{CollectionHandle, LogStore};

use super::error::EligibilityError;

/// Report whether a collection is capped
///
/// Reads the collection's options document and has no other side effects.
pub async fn is_capped<S: LogStore>(
    store: &S,
    collection: &CollectionHandle,
) -> Result<bool, EligibilityError> {
    let options = store
        .collection_options(collection)
        .await
        .map_err(|source| EligibilityError::Query {
            collection: collection.name().to_string(),
            source,
        })?;

    match options {
        Some(options) => Ok(options.capped),
        None => Err(EligibilityError::MissingOptions(
            collection.name().to_string(),
        )),
    }
}
