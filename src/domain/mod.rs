//! Domain types for bulkwriter.
//!
//! The domain layer holds the crate-wide error hierarchy and the [`Result`]
//! alias used by every fallible operation:
//!
//! ```rust
//! use bulkwriter::domain::{BulkError, Result};
//!
//! fn example() -> Result<()> {
//!     // Errors are automatically converted using the ? operator
//!     let config = bulkwriter::config::load_config("bulkwriter.toml")?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod result;

pub use errors::{BulkError, CosmosDbError};
pub use result::Result;
