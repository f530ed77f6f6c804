//! Domain validation errors

use thiserror::Error;

/// Errors raised while constructing domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A book identifier was empty after trimming
    #[error("Book ID must not be empty")]
    EmptyBookId,
}
