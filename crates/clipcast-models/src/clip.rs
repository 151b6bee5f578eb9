//! Clip work items: the tracked unit progressing a candidate through the
//! clip / subtitle / publish stages.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candidate::ClipCandidate;
use crate::outcome::FailureKind;
use crate::publish::PublishMetadata;
use crate::source::SourceId;

/// Identifier for a clip work item.
///
/// Derived from the source id and candidate index so the same candidate set
/// maps to the same ids on every run; the resume path depends on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(String);

impl ClipId {
    pub fn derive(source: &SourceId, candidate_index: u32) -> Self {
        Self(format!("{}-c{:02}", source, candidate_index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-clip pipeline stage.
///
/// Stages only move forward along `rank()`, with one exception: any
/// non-terminal stage may jump to `Failed` after retry exhaustion or a fatal
/// error. `Deleted` marks a record whose artifacts were released while the
/// record itself is retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClipStage {
    #[default]
    Created,
    Clipped,
    Subtitled,
    MetadataGenerated,
    Uploading,
    Uploaded,
    Failed,
    Deleted,
}

impl ClipStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipStage::Created => "created",
            ClipStage::Clipped => "clipped",
            ClipStage::Subtitled => "subtitled",
            ClipStage::MetadataGenerated => "metadata_generated",
            ClipStage::Uploading => "uploading",
            ClipStage::Uploaded => "uploaded",
            ClipStage::Failed => "failed",
            ClipStage::Deleted => "deleted",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            ClipStage::Created => 0,
            ClipStage::Clipped => 1,
            ClipStage::Subtitled => 2,
            ClipStage::MetadataGenerated => 3,
            ClipStage::Uploading => 4,
            ClipStage::Uploaded => 5,
            ClipStage::Failed => 6,
            ClipStage::Deleted => 7,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ClipStage::Uploaded | ClipStage::Failed | ClipStage::Deleted
        )
    }

    /// Whether a transition to `next` is legal.
    ///
    /// Forward-only along the stage order; `Failed` is reachable from any
    /// non-terminal stage; `Deleted` only from a terminal one. The subtitle
    /// bypass (`Clipped → MetadataGenerated`) is just a forward skip.
    pub fn can_advance_to(&self, next: ClipStage) -> bool {
        match next {
            ClipStage::Failed => !self.is_terminal(),
            ClipStage::Deleted => matches!(self, ClipStage::Uploaded | ClipStage::Failed),
            _ => !self.is_terminal() && next.rank() > self.rank(),
        }
    }
}

impl std::fmt::Display for ClipStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One derived unit of work: a candidate progressing toward publication.
///
/// Owns its transient artifact paths until the cleanup coordinator releases
/// them. All mutation goes through the ledger; stage moves are validated by
/// [`ClipStage::can_advance_to`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipWorkItem {
    pub id: ClipId,
    pub source_id: SourceId,
    pub candidate: ClipCandidate,
    pub stage: ClipStage,
    /// Attempts consumed by the most recently failed stage.
    pub retry_count: u32,
    /// Raw extracted clip, present after `Clipped`.
    pub raw_path: Option<PathBuf>,
    /// Subtitled clip, present after `Subtitled` when subtitling is enabled.
    pub subtitled_path: Option<PathBuf>,
    /// Generated publish metadata, present after `MetadataGenerated`.
    pub metadata: Option<PublishMetadata>,
    /// Id returned by the destination on successful publish.
    pub published_id: Option<String>,
    pub last_error: Option<FailureKind>,
    pub updated_at: DateTime<Utc>,
}

impl ClipWorkItem {
    pub fn new(source_id: SourceId, candidate: ClipCandidate) -> Self {
        Self {
            id: ClipId::derive(&source_id, candidate.index),
            source_id,
            candidate,
            stage: ClipStage::Created,
            retry_count: 0,
            raw_path: None,
            subtitled_path: None,
            metadata: None,
            published_id: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// The artifact that should be published: subtitled output when present,
    /// otherwise the raw clip.
    pub fn upload_artifact(&self) -> Option<&PathBuf> {
        self.subtitled_path.as_ref().or(self.raw_path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_id_is_deterministic() {
        let source = SourceId::new("v1");
        assert_eq!(ClipId::derive(&source, 0).as_str(), "v1-c00");
        assert_eq!(ClipId::derive(&source, 7).as_str(), "v1-c07");
        assert_eq!(ClipId::derive(&source, 0), ClipId::derive(&source, 0));
    }

    #[test]
    fn test_stage_forward_only() {
        assert!(ClipStage::Created.can_advance_to(ClipStage::Clipped));
        assert!(ClipStage::Clipped.can_advance_to(ClipStage::Subtitled));
        // Subtitle bypass.
        assert!(ClipStage::Clipped.can_advance_to(ClipStage::MetadataGenerated));
        // No going back.
        assert!(!ClipStage::Uploading.can_advance_to(ClipStage::Clipped));
        assert!(!ClipStage::Uploaded.can_advance_to(ClipStage::Uploading));
    }

    #[test]
    fn test_failed_reachable_from_non_terminal_only() {
        assert!(ClipStage::Created.can_advance_to(ClipStage::Failed));
        assert!(ClipStage::Uploading.can_advance_to(ClipStage::Failed));
        assert!(!ClipStage::Uploaded.can_advance_to(ClipStage::Failed));
        assert!(!ClipStage::Deleted.can_advance_to(ClipStage::Failed));
    }

    #[test]
    fn test_deleted_only_from_terminal() {
        assert!(ClipStage::Uploaded.can_advance_to(ClipStage::Deleted));
        assert!(ClipStage::Failed.can_advance_to(ClipStage::Deleted));
        assert!(!ClipStage::Clipped.can_advance_to(ClipStage::Deleted));
    }

    #[test]
    fn test_upload_artifact_prefers_subtitled() {
        let mut item = ClipWorkItem::new(
            SourceId::new("v1"),
            ClipCandidate::new(0, 0.0, 30.0, 0.5),
        );
        assert!(item.upload_artifact().is_none());

        item.raw_path = Some(PathBuf::from("/tmp/raw.mp4"));
        assert_eq!(item.upload_artifact().unwrap(), &PathBuf::from("/tmp/raw.mp4"));

        item.subtitled_path = Some(PathBuf::from("/tmp/sub.mp4"));
        assert_eq!(item.upload_artifact().unwrap(), &PathBuf::from("/tmp/sub.mp4"));
    }
}
