//! Error types for the QEEG engine

use thiserror::Error;

/// Core error type
///
/// The engine distinguishes four failure kinds. `InvalidParam` and
/// `StateViolation` abort the call that raised them; `InsufficientData` is
/// swallowed where that is the natural semantics (online estimators emit no
/// frame); `Numerical` usually surfaces as NaN in the produced value rather
/// than as an `Err`.
#[derive(Error, Debug)]
pub enum QeegError {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("State violation: {0}")]
    StateViolation(String),
}

impl QeegError {
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Self::InvalidParam(msg.into())
    }

    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    pub fn numerical(msg: impl Into<String>) -> Self {
        Self::Numerical(msg.into())
    }

    pub fn state_violation(msg: impl Into<String>) -> Self {
        Self::StateViolation(msg.into())
    }
}

/// Result type alias
pub type QeegResult<T> = Result<T, QeegError>;
