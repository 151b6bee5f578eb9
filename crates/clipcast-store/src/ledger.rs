//! Persistent per-clip ledger: one source fans out to many clip work items.
//!
//! The ledger enforces the monotonic stage order per clip and returns items
//! in candidate sequence order, deterministically across runs.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use clipcast_models::{ClipCandidate, ClipId, ClipStage, ClipWorkItem, FailureKind, SourceId};

use crate::error::{StoreError, StoreResult};
use crate::kv::{EntityLocks, StateStore};

pub struct ClipLedger {
    store: Arc<dyn StateStore>,
    locks: EntityLocks,
}

impl ClipLedger {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            locks: EntityLocks::new(),
        }
    }

    fn key(id: &ClipId) -> String {
        format!("clips/{}", id)
    }

    /// Materialize the work item for a candidate. Idempotent: an existing
    /// record is returned untouched so resume never resets clip progress.
    pub async fn create(
        &self,
        source_id: &SourceId,
        candidate: &ClipCandidate,
    ) -> StoreResult<ClipWorkItem> {
        let id = ClipId::derive(source_id, candidate.index);
        let key = Self::key(&id);
        let _guard = self.locks.lock(&key).await;
        if let Some(raw) = self.store.load_raw(&key).await? {
            return Ok(serde_json::from_str(&raw)?);
        }
        let item = ClipWorkItem::new(source_id.clone(), candidate.clone());
        self.persist(&key, &item).await?;
        debug!(clip_id = %item.id, "created clip work item");
        Ok(item)
    }

    pub async fn get(&self, id: &ClipId) -> StoreResult<Option<ClipWorkItem>> {
        match self.store.load_raw(&Self::key(id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Advance a clip to `stage`. Re-advancing to the current stage is a
    /// no-op; moving backwards or out of a terminal stage is an error.
    pub async fn advance(&self, id: &ClipId, stage: ClipStage) -> StoreResult<ClipWorkItem> {
        self.with_item(id, move |item| {
            if item.stage == stage {
                return Ok(false);
            }
            if !item.stage.can_advance_to(stage) {
                return Err(StoreError::IllegalTransition {
                    clip: item.id.to_string(),
                    from: item.stage.as_str().to_string(),
                    to: stage.as_str().to_string(),
                });
            }
            item.stage = stage;
            item.updated_at = Utc::now();
            Ok(true)
        })
        .await
    }

    /// Record a permanent clip failure: stage becomes `Failed` with the
    /// classified kind and the attempts consumed.
    pub async fn record_failure(
        &self,
        id: &ClipId,
        kind: FailureKind,
        retry_count: u32,
    ) -> StoreResult<ClipWorkItem> {
        self.with_item(id, move |item| {
            if !item.stage.can_advance_to(ClipStage::Failed) {
                return Err(StoreError::IllegalTransition {
                    clip: item.id.to_string(),
                    from: item.stage.as_str().to_string(),
                    to: ClipStage::Failed.as_str().to_string(),
                });
            }
            item.stage = ClipStage::Failed;
            item.last_error = Some(kind);
            item.retry_count = retry_count;
            item.updated_at = Utc::now();
            Ok(true)
        })
        .await
    }

    /// Reopen a `Failed` clip for another attempt.
    ///
    /// The stage rolls back to the latest one its recorded artifacts still
    /// support, so a reprocessed source redoes only the work that was lost.
    /// Reopening a non-failed clip is an error.
    pub async fn reopen(&self, id: &ClipId) -> StoreResult<ClipWorkItem> {
        self.with_item(id, move |item| {
            if item.stage != ClipStage::Failed {
                return Err(StoreError::IllegalTransition {
                    clip: item.id.to_string(),
                    from: item.stage.as_str().to_string(),
                    to: "reopened".to_string(),
                });
            }
            item.stage = if item.metadata.is_some() {
                ClipStage::MetadataGenerated
            } else if item.subtitled_path.is_some() {
                ClipStage::Subtitled
            } else if item.raw_path.is_some() {
                ClipStage::Clipped
            } else {
                ClipStage::Created
            };
            item.last_error = None;
            item.updated_at = Utc::now();
            Ok(true)
        })
        .await
    }

    /// Per-clip locked read-modify-write for artifact paths and metadata.
    pub async fn update<F>(&self, id: &ClipId, mutate: F) -> StoreResult<ClipWorkItem>
    where
        F: FnOnce(&mut ClipWorkItem),
    {
        self.with_item(id, move |item| {
            mutate(item);
            item.updated_at = Utc::now();
            Ok(true)
        })
        .await
    }

    /// All work items for a source, ordered by candidate sequence index.
    /// Deterministic across runs for the same source and candidate set.
    pub async fn list_by_source(&self, source_id: &SourceId) -> StoreResult<Vec<ClipWorkItem>> {
        let prefix = format!("clips/{}-c", source_id);
        let keys = self.store.list_keys(&prefix).await?;
        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(raw) = self.store.load_raw(&key).await? {
                let item: ClipWorkItem = serde_json::from_str(&raw)?;
                // The prefix also matches ids that textually extend this
                // source id, so ownership is checked on the record itself.
                if item.source_id == *source_id {
                    items.push(item);
                }
            }
        }
        items.sort_by_key(|item| item.candidate.index);
        Ok(items)
    }

    async fn with_item<F>(&self, id: &ClipId, mutate: F) -> StoreResult<ClipWorkItem>
    where
        F: FnOnce(&mut ClipWorkItem) -> StoreResult<bool>,
    {
        let key = Self::key(id);
        let _guard = self.locks.lock(&key).await;
        let raw = self
            .store
            .load_raw(&key)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        let mut item: ClipWorkItem = serde_json::from_str(&raw)?;
        if mutate(&mut item)? {
            self.persist(&key, &item).await?;
        }
        Ok(item)
    }

    async fn persist(&self, key: &str, item: &ClipWorkItem) -> StoreResult<()> {
        let raw = serde_json::to_string_pretty(item)?;
        self.store.store_raw(key, raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    fn ledger() -> ClipLedger {
        ClipLedger::new(Arc::new(MemoryStore::new()))
    }

    fn candidate(index: u32) -> ClipCandidate {
        let start = index as f64 * 60.0;
        ClipCandidate::new(index, start, start + 30.0, 0.8)
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let ledger = ledger();
        let source = SourceId::new("v1");

        let item = ledger.create(&source, &candidate(0)).await.unwrap();
        ledger.advance(&item.id, ClipStage::Clipped).await.unwrap();

        // Re-creating the same candidate returns the advanced record.
        let again = ledger.create(&source, &candidate(0)).await.unwrap();
        assert_eq!(again.stage, ClipStage::Clipped);
    }

    #[tokio::test]
    async fn test_advance_is_monotonic() {
        let ledger = ledger();
        let source = SourceId::new("v1");
        let item = ledger.create(&source, &candidate(0)).await.unwrap();

        ledger.advance(&item.id, ClipStage::Clipped).await.unwrap();
        ledger
            .advance(&item.id, ClipStage::MetadataGenerated)
            .await
            .unwrap();

        let err = ledger
            .advance(&item.id, ClipStage::Clipped)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn test_advance_to_current_stage_is_noop() {
        let ledger = ledger();
        let source = SourceId::new("v1");
        let item = ledger.create(&source, &candidate(0)).await.unwrap();

        ledger.advance(&item.id, ClipStage::Clipped).await.unwrap();
        let a = ledger.get(&item.id).await.unwrap().unwrap();
        let b = ledger.advance(&item.id, ClipStage::Clipped).await.unwrap();
        assert_eq!(a.updated_at, b.updated_at);
    }

    #[tokio::test]
    async fn test_record_failure_from_any_non_terminal_stage() {
        let ledger = ledger();
        let source = SourceId::new("v1");
        let item = ledger.create(&source, &candidate(0)).await.unwrap();
        ledger.advance(&item.id, ClipStage::Uploading).await.unwrap();

        let failed = ledger
            .record_failure(&item.id, FailureKind::Network, 3)
            .await
            .unwrap();
        assert_eq!(failed.stage, ClipStage::Failed);
        assert_eq!(failed.retry_count, 3);
        assert_eq!(failed.last_error, Some(FailureKind::Network));

        // Terminal: cannot fail an uploaded clip.
        let other = ledger.create(&source, &candidate(1)).await.unwrap();
        ledger.advance(&other.id, ClipStage::Uploaded).await.unwrap();
        assert!(ledger
            .record_failure(&other.id, FailureKind::Network, 1)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_by_source_is_ordered_and_scoped() {
        let ledger = ledger();
        let v1 = SourceId::new("v1");
        let v12 = SourceId::new("v12");

        // Created out of order on purpose.
        ledger.create(&v1, &candidate(2)).await.unwrap();
        ledger.create(&v1, &candidate(0)).await.unwrap();
        ledger.create(&v1, &candidate(1)).await.unwrap();
        ledger.create(&v12, &candidate(0)).await.unwrap();

        let items = ledger.list_by_source(&v1).await.unwrap();
        let indices: Vec<u32> = items.iter().map(|i| i.candidate.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(items.iter().all(|i| i.source_id == v1));
    }

    #[tokio::test]
    async fn test_list_by_source_excludes_prefix_colliding_source() {
        let ledger = ledger();
        let v1 = SourceId::new("v1");
        // This id textually extends "v1-c", so its keys share the prefix.
        let cam = SourceId::new("v1-cam2");

        ledger.create(&v1, &candidate(0)).await.unwrap();
        ledger.create(&cam, &candidate(0)).await.unwrap();

        let items = ledger.list_by_source(&v1).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_str(), "v1-c00");

        let items = ledger.list_by_source(&cam).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_str(), "v1-cam2-c00");
    }

    #[tokio::test]
    async fn test_reopen_rolls_back_to_last_supported_stage() {
        let ledger = ledger();
        let source = SourceId::new("v1");

        // Failed after extraction: the raw artifact survives.
        let item = ledger.create(&source, &candidate(0)).await.unwrap();
        ledger
            .update(&item.id, |i| i.raw_path = Some("/tmp/v1-c00.mp4".into()))
            .await
            .unwrap();
        ledger.advance(&item.id, ClipStage::Uploading).await.unwrap();
        ledger
            .record_failure(&item.id, FailureKind::Network, 3)
            .await
            .unwrap();

        let reopened = ledger.reopen(&item.id).await.unwrap();
        assert_eq!(reopened.stage, ClipStage::Clipped);
        assert!(reopened.last_error.is_none());

        // Failed before anything durable happened: back to the start.
        let item = ledger.create(&source, &candidate(1)).await.unwrap();
        ledger
            .record_failure(&item.id, FailureKind::UnsupportedMedia, 1)
            .await
            .unwrap();
        let reopened = ledger.reopen(&item.id).await.unwrap();
        assert_eq!(reopened.stage, ClipStage::Created);
    }

    #[tokio::test]
    async fn test_reopen_rejects_non_failed_clips() {
        let ledger = ledger();
        let source = SourceId::new("v1");
        let item = ledger.create(&source, &candidate(0)).await.unwrap();
        ledger.advance(&item.id, ClipStage::Uploaded).await.unwrap();

        let err = ledger.reopen(&item.id).await.unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }
}
