//! Catalog and selection errors

use thiserror::Error;

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Invalid operator input to candidate selection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid date '{0}', expected YYYY.MM.DD")]
    InvalidDate(String),
}
