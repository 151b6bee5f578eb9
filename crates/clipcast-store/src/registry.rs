//! Persistent record of which source videos have been seen, processed, or
//! skipped.
//!
//! The registry is the dedup authority: `commit_completed` is the only way a
//! source becomes "used", and the caller contract requires every child clip
//! to be terminal-success first. Every transition is persisted before the
//! caller proceeds, so a crash between two stages never loses the earlier
//! stage's success.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use clipcast_models::{PipelineRun, SourceId, SourceStatus, SourceVideo, StageKind};

use crate::error::{StoreError, StoreResult};
use crate::kv::{EntityLocks, StateStore};

pub struct SourceRegistry {
    store: Arc<dyn StateStore>,
    locks: EntityLocks,
}

impl SourceRegistry {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            locks: EntityLocks::new(),
        }
    }

    fn key(id: &SourceId) -> String {
        format!("sources/{}", id)
    }

    pub async fn load(&self, id: &SourceId) -> StoreResult<Option<PipelineRun>> {
        match self.store.load_raw(&Self::key(id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// True once the source reached a dedup-committed terminal state.
    ///
    /// Partial and failed sources stay eligible for a later run.
    pub async fn is_processed(&self, id: &SourceId) -> StoreResult<bool> {
        Ok(matches!(
            self.load(id).await?.map(|run| run.status),
            Some(SourceStatus::Completed) | Some(SourceStatus::Skipped)
        ))
    }

    /// Load the existing run record for a source, or create and persist one.
    pub async fn ensure(&self, source: &SourceVideo) -> StoreResult<PipelineRun> {
        let key = Self::key(&source.id);
        let _guard = self.locks.lock(&key).await;
        if let Some(raw) = self.store.load_raw(&key).await? {
            return Ok(serde_json::from_str(&raw)?);
        }
        let run = PipelineRun::new(source.clone());
        self.persist(&key, &run).await?;
        debug!(source_id = %source.id, "registered new source");
        Ok(run)
    }

    /// Record a stage transition. Idempotent: re-marking the current status
    /// is a no-op and does not rewrite the record.
    pub async fn mark_stage(&self, id: &SourceId, status: SourceStatus) -> StoreResult<PipelineRun> {
        self.with_run(id, |run| {
            if run.status != status {
                run.status = status;
                run.updated_at = Utc::now();
                true
            } else {
                false
            }
        })
        .await
    }

    pub async fn record_download(
        &self,
        id: &SourceId,
        path: impl AsRef<Path>,
    ) -> StoreResult<PipelineRun> {
        let path = path.as_ref().to_path_buf();
        self.with_run(id, move |run| {
            run.downloaded_path = Some(path);
            run.status = SourceStatus::Downloaded;
            run.updated_at = Utc::now();
            true
        })
        .await
    }

    pub async fn record_branded(
        &self,
        id: &SourceId,
        path: impl AsRef<Path>,
    ) -> StoreResult<PipelineRun> {
        let path = path.as_ref().to_path_buf();
        self.with_run(id, move |run| {
            run.branded_path = Some(path);
            run.status = SourceStatus::Branded;
            run.updated_at = Utc::now();
            true
        })
        .await
    }

    pub async fn record_original_published(
        &self,
        id: &SourceId,
        published_id: impl Into<String>,
    ) -> StoreResult<PipelineRun> {
        let published_id = published_id.into();
        self.with_run(id, move |run| {
            run.original_published_id = Some(published_id);
            run.updated_at = Utc::now();
            true
        })
        .await
    }

    pub async fn set_clip_ids(
        &self,
        id: &SourceId,
        clip_ids: Vec<clipcast_models::ClipId>,
    ) -> StoreResult<PipelineRun> {
        self.with_run(id, move |run| {
            run.clip_ids = clip_ids;
            run.updated_at = Utc::now();
            true
        })
        .await
    }

    pub async fn record_attempts(
        &self,
        id: &SourceId,
        stage: StageKind,
        attempts: u32,
    ) -> StoreResult<PipelineRun> {
        self.with_run(id, move |run| {
            run.record_attempts(stage, attempts);
            true
        })
        .await
    }

    /// Commit the source as fully used. Caller contract: only legal once all
    /// child clip work items are terminal-success and the original publish
    /// succeeded.
    pub async fn commit_completed(&self, id: &SourceId) -> StoreResult<PipelineRun> {
        let run = self.mark_stage(id, SourceStatus::Completed).await?;
        info!(source_id = %id, "source committed as completed");
        Ok(run)
    }

    /// Commit the source as skipped (never eligible again).
    pub async fn commit_skipped(
        &self,
        id: &SourceId,
        reason: impl Into<String>,
    ) -> StoreResult<PipelineRun> {
        let reason = reason.into();
        let run = self
            .with_run(id, move |run| {
                run.status = SourceStatus::Skipped;
                run.skip_reason = Some(reason);
                run.updated_at = Utc::now();
                true
            })
            .await?;
        info!(source_id = %id, "source committed as skipped");
        Ok(run)
    }

    /// Per-source locked read-modify-write. The mutator returns whether the
    /// record changed; unchanged records are not rewritten.
    async fn with_run<F>(&self, id: &SourceId, mutate: F) -> StoreResult<PipelineRun>
    where
        F: FnOnce(&mut PipelineRun) -> bool,
    {
        let key = Self::key(id);
        let _guard = self.locks.lock(&key).await;
        let raw = self
            .store
            .load_raw(&key)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        let mut run: PipelineRun = serde_json::from_str(&raw)?;
        if mutate(&mut run) {
            self.persist(&key, &run).await?;
        }
        Ok(run)
    }

    async fn persist(&self, key: &str, run: &PipelineRun) -> StoreResult<()> {
        let raw = serde_json::to_string_pretty(run)?;
        self.store.store_raw(key, raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    fn sample_source(id: &str) -> SourceVideo {
        SourceVideo::new(id, format!("https://example.com/{}", id), "Title", "chan", 600.0)
    }

    fn registry() -> SourceRegistry {
        SourceRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let registry = registry();
        let source = sample_source("v1");

        let first = registry.ensure(&source).await.unwrap();
        registry
            .mark_stage(&source.id, SourceStatus::Downloading)
            .await
            .unwrap();
        let second = registry.ensure(&source).await.unwrap();

        assert_eq!(first.source.id, second.source.id);
        // ensure() never resets progress.
        assert_eq!(second.status, SourceStatus::Downloading);
    }

    #[tokio::test]
    async fn test_mark_stage_same_status_is_noop() {
        let registry = registry();
        let source = sample_source("v1");
        registry.ensure(&source).await.unwrap();

        let a = registry
            .mark_stage(&source.id, SourceStatus::Downloading)
            .await
            .unwrap();
        let b = registry
            .mark_stage(&source.id, SourceStatus::Downloading)
            .await
            .unwrap();
        assert_eq!(a.updated_at, b.updated_at);
    }

    #[tokio::test]
    async fn test_is_processed_only_for_committed_states() {
        let registry = registry();
        let source = sample_source("v1");
        registry.ensure(&source).await.unwrap();
        assert!(!registry.is_processed(&source.id).await.unwrap());

        registry
            .mark_stage(&source.id, SourceStatus::PartiallyCompleted)
            .await
            .unwrap();
        assert!(!registry.is_processed(&source.id).await.unwrap());

        registry
            .mark_stage(&source.id, SourceStatus::Failed)
            .await
            .unwrap();
        assert!(!registry.is_processed(&source.id).await.unwrap());

        registry.commit_completed(&source.id).await.unwrap();
        assert!(registry.is_processed(&source.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_skipped_records_reason() {
        let registry = registry();
        let source = sample_source("v1");
        registry.ensure(&source).await.unwrap();

        let run = registry
            .commit_skipped(&source.id, "duration below minimum")
            .await
            .unwrap();
        assert_eq!(run.status, SourceStatus::Skipped);
        assert_eq!(run.skip_reason.as_deref(), Some("duration below minimum"));
        assert!(registry.is_processed(&source.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_stage_unknown_source_is_not_found() {
        let registry = registry();
        let err = registry
            .mark_stage(&SourceId::new("ghost"), SourceStatus::Downloading)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_artifact_anchors_survive_reload() {
        let store = Arc::new(MemoryStore::new());
        let registry = SourceRegistry::new(Arc::clone(&store) as Arc<dyn StateStore>);
        let source = sample_source("v1");
        registry.ensure(&source).await.unwrap();
        registry
            .record_download(&source.id, "/tmp/v1/source.mp4")
            .await
            .unwrap();

        // New registry handle over the same store sees the durable anchor.
        let reopened = SourceRegistry::new(store);
        let run = reopened.load(&source.id).await.unwrap().unwrap();
        assert!(run.download_done());
        assert_eq!(run.status, SourceStatus::Downloaded);
    }
}
