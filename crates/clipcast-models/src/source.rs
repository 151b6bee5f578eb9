//! Source video identity and per-source pipeline status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable external identifier for a source video.
///
/// This is the dedup key: a given `SourceId` is committed as used at most
/// once across all runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A long-form source video discovered for repurposing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceVideo {
    /// Stable external id (dedup key).
    pub id: SourceId,
    /// Destination URL the transport can download from.
    pub url: String,
    /// Original title.
    pub title: String,
    /// Channel the video came from (drives branding/metadata defaults).
    pub channel: String,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// When discovery first saw this source.
    pub discovered_at: DateTime<Utc>,
}

impl SourceVideo {
    pub fn new(
        id: impl Into<SourceId>,
        url: impl Into<String>,
        title: impl Into<String>,
        channel: impl Into<String>,
        duration_secs: f64,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: title.into(),
            channel: channel.into(),
            duration_secs,
            discovered_at: Utc::now(),
        }
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Per-source pipeline status.
///
/// The orchestrator walks `Discovered → Downloading → Downloaded → Branding →
/// Branded → Splitting → PublishingOriginal → Completed`. Any source-level
/// stage failure lands in `Failed`; a source whose clips partially failed
/// lands in `PartiallyCompleted` and is never dedup-committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    #[default]
    Discovered,
    Downloading,
    Downloaded,
    Branding,
    Branded,
    Splitting,
    PublishingOriginal,
    Completed,
    PartiallyCompleted,
    Failed,
    Skipped,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Discovered => "discovered",
            SourceStatus::Downloading => "downloading",
            SourceStatus::Downloaded => "downloaded",
            SourceStatus::Branding => "branding",
            SourceStatus::Branded => "branded",
            SourceStatus::Splitting => "splitting",
            SourceStatus::PublishingOriginal => "publishing_original",
            SourceStatus::Completed => "completed",
            SourceStatus::PartiallyCompleted => "partially_completed",
            SourceStatus::Failed => "failed",
            SourceStatus::Skipped => "skipped",
        }
    }

    /// Terminal states get no further automatic transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SourceStatus::Completed
                | SourceStatus::PartiallyCompleted
                | SourceStatus::Failed
                | SourceStatus::Skipped
        )
    }

    /// Position along the happy path, used for resume decisions.
    ///
    /// Terminal failure states have no rank: a `Failed` or
    /// `PartiallyCompleted` source is re-evaluated from its durable artifact
    /// anchors, not from its status.
    pub fn rank(&self) -> Option<u8> {
        match self {
            SourceStatus::Discovered => Some(0),
            SourceStatus::Downloading => Some(1),
            SourceStatus::Downloaded => Some(2),
            SourceStatus::Branding => Some(3),
            SourceStatus::Branded => Some(4),
            SourceStatus::Splitting => Some(5),
            SourceStatus::PublishingOriginal => Some(6),
            SourceStatus::Completed => Some(7),
            SourceStatus::PartiallyCompleted
            | SourceStatus::Failed
            | SourceStatus::Skipped => None,
        }
    }

    /// True if this status is at or past `other` on the happy path.
    pub fn has_reached(&self, other: SourceStatus) -> bool {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => a >= b,
            _ => false,
        }
    }
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering_for_resume() {
        assert!(SourceStatus::Branded.has_reached(SourceStatus::Downloaded));
        assert!(SourceStatus::Downloaded.has_reached(SourceStatus::Downloaded));
        assert!(!SourceStatus::Downloading.has_reached(SourceStatus::Downloaded));
        // Failure states never claim progress.
        assert!(!SourceStatus::Failed.has_reached(SourceStatus::Discovered));
        assert!(!SourceStatus::PartiallyCompleted.has_reached(SourceStatus::Splitting));
    }

    #[test]
    fn test_terminal_states() {
        assert!(SourceStatus::Completed.is_terminal());
        assert!(SourceStatus::PartiallyCompleted.is_terminal());
        assert!(SourceStatus::Skipped.is_terminal());
        assert!(!SourceStatus::Splitting.is_terminal());
    }

    #[test]
    fn test_status_serde_round_trip() {
        let json = serde_json::to_string(&SourceStatus::PublishingOriginal).unwrap();
        assert_eq!(json, "\"publishing_original\"");
        let back: SourceStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SourceStatus::PublishingOriginal);
    }
}
