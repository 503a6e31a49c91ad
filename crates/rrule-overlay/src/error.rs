//! Error types for rrule-overlay operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),

    #[error("Invalid schedule record: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, OverlayError>;
