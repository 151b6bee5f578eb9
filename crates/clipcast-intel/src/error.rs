use clipcast_models::FailureKind;
use thiserror::Error;

pub type IntelResult<T> = Result<T, IntelError>;

/// Errors from the content-intelligence service.
#[derive(Debug, Error)]
pub enum IntelError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid response payload: {0}")]
    InvalidResponse(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IntelError {
    /// Classify this error for the stage runner.
    pub fn to_failure_kind(&self) -> FailureKind {
        match self {
            IntelError::Request(e) if e.is_timeout() => FailureKind::Timeout,
            IntelError::Request(_) => FailureKind::Network,
            IntelError::Status { .. } => FailureKind::Network,
            IntelError::RateLimited { retry_after_secs } => FailureKind::RateLimited {
                retry_after_secs: *retry_after_secs,
            },
            IntelError::Unauthorized(_) => FailureKind::Unauthorized,
            IntelError::InvalidRequest(_) => FailureKind::InvalidInput,
            IntelError::InvalidResponse(msg) => FailureKind::Internal(msg.clone()),
            IntelError::Config(msg) => FailureKind::Internal(msg.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_carries_hint() {
        let err = IntelError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(
            err.to_failure_kind(),
            FailureKind::RateLimited {
                retry_after_secs: Some(30)
            }
        );
        assert!(err.to_failure_kind().is_retryable());
    }

    #[test]
    fn test_unauthorized_is_fatal() {
        let err = IntelError::Unauthorized("bad key".into());
        assert!(!err.to_failure_kind().is_retryable());
    }
}
