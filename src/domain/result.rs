//! Result type alias for bulkwriter

use super::errors::BulkError;

/// Result type alias for bulkwriter operations
///
/// # Examples
///
/// ```
/// use bulkwriter::domain::result::Result;
/// use bulkwriter::domain::errors::BulkError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(BulkError::InvalidArgument("id cannot be empty".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, BulkError>;
