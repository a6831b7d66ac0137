//! Error types for Chatflow.
//!
//! All errors are represented by the `FlowError` enum. Each variant maps onto one
//! [`ErrorKind`], which is what metrics records and fallback responses are tagged with.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::delegate::DelegateError;

/// Coarse error classification carried by metrics records.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    NotFound,
    Validation,
    Delegate,
    Internal,
}

/// Unified error type for all Chatflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    /// Malformed graph: missing entry node, condition node without transitions, hop limit.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unknown node, flow or tenant.
    #[error("not found: {0}")]
    NotFound(String),

    /// Navigation target outside the tenant, circular navigation limit exceeded.
    #[error("validation error: {0}")]
    Validation(String),

    /// Another turn or navigation holds the session.
    #[error("session busy: {0}")]
    SessionBusy(String),

    /// AI, speech or api collaborator failure.
    #[error(transparent)]
    Delegate(#[from] DelegateError),

    /// Unexpected dispatch failure, such as a panicking handler or delegate.
    #[error("internal error: {0}")]
    Internal(String),

    /// Configuration file parsing errors.
    #[error("config error: {0}")]
    Config(String),
}

impl FlowError {
    /// The classification recorded in metrics for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::Configuration(_) | FlowError::Config(_) => ErrorKind::Configuration,
            FlowError::NotFound(_) => ErrorKind::NotFound,
            FlowError::Validation(_) | FlowError::SessionBusy(_) => ErrorKind::Validation,
            FlowError::Delegate(_) => ErrorKind::Delegate,
            FlowError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<std::io::Error> for FlowError {
    fn from(error: std::io::Error) -> Self {
        FlowError::Config(error.to_string())
    }
}

/// Flow definitions that fail to (de)serialize are malformed graphs.
impl From<serde_json::Error> for FlowError {
    fn from(error: serde_json::Error) -> Self {
        FlowError::Configuration(error.to_string())
    }
}

impl From<toml::de::Error> for FlowError {
    fn from(error: toml::de::Error) -> Self {
        FlowError::Config(error.to_string())
    }
}

impl From<regex::Error> for FlowError {
    fn from(error: regex::Error) -> Self {
        FlowError::Configuration(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::DelegateErrorKind;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(FlowError::Configuration("x".into()).kind(), ErrorKind::Configuration);
        assert_eq!(FlowError::SessionBusy("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(FlowError::Internal("x".into()).kind(), ErrorKind::Internal);

        let err: FlowError = DelegateError::new(DelegateErrorKind::RateLimit, "slow down").into();
        assert_eq!(err.kind(), ErrorKind::Delegate);
        assert_eq!(err.to_string(), "rate_limit: slow down");
    }

    #[test]
    fn test_malformed_json_is_configuration_error() {
        let err: FlowError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(ErrorKind::NotFound.as_ref(), "not_found");
    }
}
