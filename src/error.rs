// src/error.rs

//! Error taxonomy at the request boundary.
//!
//! Only validation errors surface to the user as errors; everything
//! downstream of validation degrades to a fallback value instead of
//! propagating.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("0xHunter needs more to track. Query must be at least 3 characters.")]
    TooShort,

    #[error("The path is too long. Query must be under 500 characters.")]
    TooLong,

    #[error("0xHunter cannot track this target - invalid address format: {0}...")]
    MalformedAddress(String),
}
