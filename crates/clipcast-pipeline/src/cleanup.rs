//! Best-effort removal of transient artifacts once work is terminal.
//!
//! Deletion is policy-driven and never blocks the pipeline: a failed remove
//! is logged and forgotten. Partial and failed sources keep every artifact
//! so a later run can resume from the durable anchors.

use std::path::Path;

use tracing::{debug, warn};

use clipcast_models::{ClipStage, ClipWorkItem, PipelineRun, SourceStatus};
use clipcast_store::{ClipLedger, StoreResult};

use crate::config::CleanupPolicy;

#[derive(Debug, Clone)]
pub struct CleanupCoordinator {
    policy: CleanupPolicy,
}

impl CleanupCoordinator {
    pub fn new(policy: CleanupPolicy) -> Self {
        Self { policy }
    }

    /// Release artifacts of an uploaded clip and mark the record `Deleted`.
    ///
    /// The ledger record is retained; only the files go. No-op when the
    /// policy keeps clip artifacts or the clip is not `Uploaded`.
    pub async fn on_clip_uploaded(
        &self,
        item: &ClipWorkItem,
        ledger: &ClipLedger,
    ) -> StoreResult<()> {
        if !self.policy.delete_clip_after_upload || item.stage != ClipStage::Uploaded {
            return Ok(());
        }

        if let Some(path) = &item.subtitled_path {
            remove_quietly(path).await;
            remove_quietly(&path.with_extension("srt")).await;
        }
        if let Some(path) = &item.raw_path {
            remove_quietly(path).await;
        }

        ledger
            .update(&item.id, |item| {
                item.raw_path = None;
                item.subtitled_path = None;
            })
            .await?;
        ledger.advance(&item.id, ClipStage::Deleted).await?;
        debug!(clip_id = %item.id, "clip artifacts released");
        Ok(())
    }

    /// Release source-level intermediates once the source is `Completed`.
    ///
    /// Non-completed terminal states retain everything: `Failed` and
    /// `PartiallyCompleted` sources resume from these artifacts.
    pub async fn on_source_terminal(&self, run: &PipelineRun) {
        if run.status != SourceStatus::Completed {
            return;
        }
        if self.policy.delete_branded_after_complete {
            if let Some(path) = &run.branded_path {
                remove_quietly(path).await;
            }
        }
        if self.policy.delete_original_after_complete {
            if let Some(path) = &run.downloaded_path {
                remove_quietly(path).await;
            }
        }
        debug!(source_id = %run.source.id, "source intermediates released");
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove artifact"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use clipcast_models::{ClipCandidate, SourceId, SourceVideo};
    use clipcast_store::MemoryStore;

    fn coordinator() -> CleanupCoordinator {
        CleanupCoordinator::new(CleanupPolicy::default())
    }

    #[tokio::test]
    async fn test_uploaded_clip_files_are_removed_and_record_marked_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("clip.mp4");
        let sub = dir.path().join("clip_sub.mp4");
        tokio::fs::write(&raw, b"raw").await.unwrap();
        tokio::fs::write(&sub, b"sub").await.unwrap();

        let ledger = ClipLedger::new(Arc::new(MemoryStore::new()));
        let source = SourceId::new("v1");
        let item = ledger
            .create(&source, &ClipCandidate::new(0, 10.0, 40.0, 0.9))
            .await
            .unwrap();
        ledger
            .update(&item.id, |i| {
                i.raw_path = Some(raw.clone());
                i.subtitled_path = Some(sub.clone());
            })
            .await
            .unwrap();
        let item = ledger.advance(&item.id, ClipStage::Uploaded).await.unwrap();

        coordinator().on_clip_uploaded(&item, &ledger).await.unwrap();

        assert!(!raw.exists());
        assert!(!sub.exists());
        let record = ledger.get(&item.id).await.unwrap().unwrap();
        assert_eq!(record.stage, ClipStage::Deleted);
        assert!(record.raw_path.is_none());
    }

    #[tokio::test]
    async fn test_failed_clip_artifacts_are_retained() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("clip.mp4");
        tokio::fs::write(&raw, b"raw").await.unwrap();

        let ledger = ClipLedger::new(Arc::new(MemoryStore::new()));
        let source = SourceId::new("v1");
        let item = ledger
            .create(&source, &ClipCandidate::new(0, 10.0, 40.0, 0.9))
            .await
            .unwrap();
        ledger
            .update(&item.id, |i| i.raw_path = Some(raw.clone()))
            .await
            .unwrap();
        let item = ledger
            .record_failure(&item.id, clipcast_models::FailureKind::Network, 3)
            .await
            .unwrap();

        coordinator().on_clip_uploaded(&item, &ledger).await.unwrap();
        assert!(raw.exists());
        let record = ledger.get(&item.id).await.unwrap().unwrap();
        assert_eq!(record.stage, ClipStage::Failed);
    }

    #[tokio::test]
    async fn test_completed_source_intermediates_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let downloaded = dir.path().join("source.mp4");
        let branded = dir.path().join("branded.mp4");
        tokio::fs::write(&downloaded, b"a").await.unwrap();
        tokio::fs::write(&branded, b"b").await.unwrap();

        let mut run = PipelineRun::new(SourceVideo::new(
            "v1",
            "https://example.com/v1",
            "Title",
            "chan",
            600.0,
        ));
        run.downloaded_path = Some(downloaded.clone());
        run.branded_path = Some(branded.clone());
        run.status = SourceStatus::Completed;

        coordinator().on_source_terminal(&run).await;
        assert!(!downloaded.exists());
        assert!(!branded.exists());
    }

    #[tokio::test]
    async fn test_partial_source_retains_everything() {
        let dir = tempfile::tempdir().unwrap();
        let downloaded = dir.path().join("source.mp4");
        tokio::fs::write(&downloaded, b"a").await.unwrap();

        let mut run = PipelineRun::new(SourceVideo::new(
            "v1",
            "https://example.com/v1",
            "Title",
            "chan",
            600.0,
        ));
        run.downloaded_path = Some(downloaded.clone());
        run.status = SourceStatus::PartiallyCompleted;

        coordinator().on_source_terminal(&run).await;
        assert!(downloaded.exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_an_error() {
        let mut run = PipelineRun::new(SourceVideo::new(
            "v1",
            "https://example.com/v1",
            "Title",
            "chan",
            600.0,
        ));
        run.downloaded_path = Some("/nonexistent/source.mp4".into());
        run.status = SourceStatus::Completed;
        coordinator().on_source_terminal(&run).await;
    }
}
