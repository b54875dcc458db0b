//! Per-operation identity and retry bookkeeping

use crate::domain::{BulkError, Result};
use std::fmt;

/// Identity and retry counter attached to every in-flight write
///
/// A context is immutable. Retrying an operation produces a fresh context
/// through [`OperationContext::for_retry`], which keeps the identity and bumps
/// the retry counter.
///
/// # Examples
///
/// ```
/// use bulkwriter::core::bulk::OperationContext;
///
/// let context = OperationContext::new("doc-1", "batch-42").unwrap();
/// assert_eq!(context.retry_count(), 0);
///
/// let retry = context.for_retry();
/// assert_eq!(retry.id(), "doc-1");
/// assert_eq!(retry.retry_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationContext {
    id: String,
    identifier: String,
    retry_count: u32,
}

impl OperationContext {
    /// Creates a context for a first attempt
    ///
    /// # Arguments
    ///
    /// * `id` - Document id of the write
    /// * `identifier` - Caller-supplied batch/operation identifier
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::InvalidArgument`] if either value is empty.
    pub fn new(id: impl Into<String>, identifier: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let identifier = identifier.into();

        if id.trim().is_empty() {
            return Err(BulkError::InvalidArgument(
                "operation id cannot be empty".to_string(),
            ));
        }
        if identifier.trim().is_empty() {
            return Err(BulkError::InvalidArgument(
                "operation identifier cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            id,
            identifier,
            retry_count: 0,
        })
    }

    /// Returns the context for the next attempt of the same write
    pub fn for_retry(&self) -> Self {
        Self {
            id: self.id.clone(),
            identifier: self.identifier.clone(),
            retry_count: self.retry_count + 1,
        }
    }

    /// Document id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Caller-supplied identifier
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Number of retries that preceded this attempt
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }
}

impl fmt::Display for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} (retry {})",
            self.identifier, self.id, self.retry_count
        )
    }
}
