//! Error handling primitives shared across the core.
//!
//! Every variant maps onto a stable numeric code so failures can cross the
//! C ABI without carrying Rust types.

use std::path::PathBuf;

use thiserror::Error;

/// Stable error codes that cross the FFI boundary.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RetroCode {
    /// Success code used as a sentinel.
    Ok = 0,
    /// A required configuration argument was not supplied.
    MissingArgument = 1,
    /// Input failed validation.
    InvalidInput = 2,
    /// Requested model or fitted artefact was not available.
    ModelMissing = 3,
    /// Requested data set or column was not available.
    DataMissing = 4,
    /// Error raised by an external modelling backend.
    Backend = 5,
    /// Filesystem or CSV failure.
    Io = 6,
    /// Catch-all for bugs.
    Internal = 7,
}

/// Canonical error type for the core.
#[derive(Debug, Error)]
pub enum RetroError {
    #[error("{0} cannot be None")]
    MissingArgument(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model not found: {0}")]
    ModelMissing(String),

    #[error("data not found: {0}")]
    DataMissing(String),

    #[error("{algorithm} backend failed: {message}")]
    Backend { algorithm: String, message: String },

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the crate.
pub type RetroResult<T> = Result<T, RetroError>;

impl RetroError {
    /// Machine parsable code for this error.
    pub fn code(&self) -> RetroCode {
        match self {
            RetroError::MissingArgument(_) => RetroCode::MissingArgument,
            RetroError::InvalidInput(_) | RetroError::Config(_) => RetroCode::InvalidInput,
            RetroError::ModelMissing(_) => RetroCode::ModelMissing,
            RetroError::DataMissing(_) => RetroCode::DataMissing,
            RetroError::Backend { .. } => RetroCode::Backend,
            RetroError::Io { .. } | RetroError::Csv(_) => RetroCode::Io,
            RetroError::Internal(_) => RetroCode::Internal,
        }
    }

    /// Validation helper.
    pub fn invalid(msg: impl Into<String>) -> Self {
        RetroError::InvalidInput(msg.into())
    }

    /// Model missing helper.
    pub fn model_missing(name: impl Into<String>) -> Self {
        RetroError::ModelMissing(name.into())
    }

    /// Data missing helper.
    pub fn data_missing(name: impl Into<String>) -> Self {
        RetroError::DataMissing(name.into())
    }

    /// Wrap a failure reported by an external backend without altering its message.
    pub fn backend(algorithm: impl Into<String>, message: impl Into<String>) -> Self {
        RetroError::Backend {
            algorithm: algorithm.into(),
            message: message.into(),
        }
    }

    /// IO helper carrying the offending path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RetroError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(RetroCode::Ok as u32, 0);
        assert_eq!(RetroCode::MissingArgument as u32, 1);
        assert_eq!(RetroCode::InvalidInput as u32, 2);
        assert_eq!(RetroCode::ModelMissing as u32, 3);
        assert_eq!(RetroCode::DataMissing as u32, 4);
        assert_eq!(RetroCode::Backend as u32, 5);
        assert_eq!(RetroCode::Io as u32, 6);
        assert_eq!(RetroCode::Internal as u32, 7);
    }

    #[test]
    fn missing_argument_names_the_argument() {
        let err = RetroError::MissingArgument("TargetType");
        assert_eq!(err.to_string(), "TargetType cannot be None");
        assert_eq!(err.code(), RetroCode::MissingArgument);
    }

    #[test]
    fn backend_message_is_preserved() {
        let err = RetroError::backend("LightGBM", "label must be numeric");
        assert_eq!(err.to_string(), "LightGBM backend failed: label must be numeric");
        assert_eq!(err.code(), RetroCode::Backend);
    }
}
