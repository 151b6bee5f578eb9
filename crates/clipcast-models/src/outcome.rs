//! Stage outcome taxonomy.
//!
//! Stage operations return an explicit [`Outcome`] sum type instead of
//! driving retries through error control flow. The stage runner interprets
//! the classification; nothing downstream inspects error strings.

use serde::{Deserialize, Serialize};

/// The discrete, retry-wrapped units of external work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Download,
    Brand,
    Analyze,
    ExtractClip,
    Subtitle,
    GenerateMetadata,
    PublishClip,
    PublishOriginal,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Download => "download",
            StageKind::Brand => "brand",
            StageKind::Analyze => "analyze",
            StageKind::ExtractClip => "extract_clip",
            StageKind::Subtitle => "subtitle",
            StageKind::GenerateMetadata => "generate_metadata",
            StageKind::PublishClip => "publish_clip",
            StageKind::PublishOriginal => "publish_original",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classified failure reported by a collaborator operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Transient network or remote-service error.
    Network,
    /// Rate limit or quota hit; optionally carries the reset hint.
    RateLimited { retry_after_secs: Option<u64> },
    /// The operation exceeded its caller-supplied timeout.
    Timeout,
    /// Malformed or rejected input.
    InvalidInput,
    /// A required asset (file, overlay, credential file) is missing.
    MissingAsset,
    /// Authentication or authorization failure.
    Unauthorized,
    /// The media itself cannot be processed.
    UnsupportedMedia,
    /// Anything else, with a short description.
    Internal(String),
}

impl FailureKind {
    /// Whether the stage runner should retry this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::Network | FailureKind::RateLimited { .. } | FailureKind::Timeout
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::RateLimited { .. } => "rate_limited",
            FailureKind::Timeout => "timeout",
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::MissingAsset => "missing_asset",
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::UnsupportedMedia => "unsupported_media",
            FailureKind::Internal(_) => "internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Internal(msg) => write!(f, "internal: {}", msg),
            FailureKind::RateLimited {
                retry_after_secs: Some(s),
            } => write!(f, "rate_limited (reset in {}s)", s),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Result of one attempt of a stage operation.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Success(T),
    /// Transient failure, eligible for bounded retry.
    Retryable(FailureKind),
    /// Permanent failure, never retried.
    Fatal(FailureKind),
}

impl<T> Outcome<T> {
    /// Classify a failure kind into the matching outcome variant.
    pub fn failure(kind: FailureKind) -> Self {
        if kind.is_retryable() {
            Outcome::Retryable(kind)
        } else {
            Outcome::Fatal(kind)
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(v) => Outcome::Success(f(v)),
            Outcome::Retryable(k) => Outcome::Retryable(k),
            Outcome::Fatal(k) => Outcome::Fatal(k),
        }
    }
}
