//! Collaborator contracts for AI, speech and outbound API calls.
//!
//! Implementations live outside the engine; only the reqwest-backed [`HttpApiDelegate`]
//! ships with the crate. All of them report failures as [`DelegateError`], whose kind
//! decides whether the executor retries.

mod ai;
mod api;
mod speech;

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub use ai::{AiDelegate, Completion, ModelConfig};
pub use api::{ApiDelegate, ApiRequest, HttpApiDelegate};
pub use speech::{SpeechDelegate, VoiceConfig};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DelegateErrorKind {
    RateLimit,
    Auth,
    BadRequest,
    /// Upstream 5xx or connection failure.
    Upstream,
    Timeout,
    /// No delegate of the required type is configured.
    Unavailable,
}

#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct DelegateError {
    pub kind: DelegateErrorKind,
    pub message: String,
}

impl DelegateError {
    pub fn new(
        kind: DelegateErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(what: &str) -> Self {
        Self::new(DelegateErrorKind::Unavailable, format!("no {} delegate configured", what))
    }

    /// Only upstream faults are worth another attempt.
    pub fn retryable(&self) -> bool {
        self.kind == DelegateErrorKind::Upstream
    }

    /// Classify an HTTP status code.
    pub fn from_status(
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        let kind = match status {
            429 => DelegateErrorKind::RateLimit,
            401 | 403 => DelegateErrorKind::Auth,
            408 | 504 => DelegateErrorKind::Timeout,
            400..=499 => DelegateErrorKind::BadRequest,
            _ => DelegateErrorKind::Upstream,
        };
        Self::new(kind, message)
    }
}

/// Run `call` until it succeeds, fails with a non-retryable error, or `max_retries`
/// extra attempts are spent. Waits `backoff * attempt` between attempts.
pub async fn with_retry<T, F, Fut>(
    what: &str,
    max_retries: u32,
    backoff: Duration,
    mut call: F,
) -> std::result::Result<T, DelegateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, DelegateError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(v) => return Ok(v),
            Err(e) if e.retryable() && attempt < max_retries => {
                attempt += 1;
                warn!(delegate = what, attempt, error = %e, "retrying delegate call");
                tokio::time::sleep(backoff * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}
