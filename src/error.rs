//! Library error type
//!
//! Insufficient history and guarded divisions are not errors: they surface as
//! `None` values or flags on the returned structures.

use thiserror::Error;

use crate::types::BarValidationError;

#[derive(Debug, Error)]
pub enum RecoError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("not enough data for 30m/60m/180m")]
    NoCandidates,

    #[error("invalid bar: {0}")]
    InvalidBar(#[from] BarValidationError),

    #[error("bar store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecoError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        RecoError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecoError>;
