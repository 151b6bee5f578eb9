//! Per-source run records and the per-run summary.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clip::ClipId;
use crate::outcome::{FailureKind, StageKind};
use crate::source::{SourceId, SourceStatus, SourceVideo};

/// Durable per-source pipeline record, the resumability anchor.
///
/// Persisted synchronously after every transition. On restart the
/// orchestrator reconstructs, for any source not yet terminal, exactly which
/// stage to resume from: the status plus the recorded artifact paths say
/// which stages already succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub source: SourceVideo,
    pub status: SourceStatus,
    /// Ledger ids of the fanned-out clip work items, in candidate order.
    pub clip_ids: Vec<ClipId>,
    /// Downloaded original, present once `Downloaded` was reached.
    pub downloaded_path: Option<PathBuf>,
    /// Branded intermediate, present once `Branded` was reached.
    pub branded_path: Option<PathBuf>,
    /// Id returned by the long-form destination for the original publish.
    pub original_published_id: Option<String>,
    /// Attempts consumed per stage, for the run summary and diagnostics.
    pub stage_attempts: HashMap<String, u32>,
    pub skip_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn new(source: SourceVideo) -> Self {
        let now = Utc::now();
        Self {
            source,
            status: SourceStatus::Discovered,
            clip_ids: Vec::new(),
            downloaded_path: None,
            branded_path: None,
            original_published_id: None,
            stage_attempts: HashMap::new(),
            skip_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_attempts(&mut self, stage: StageKind, attempts: u32) {
        let entry = self.stage_attempts.entry(stage.as_str().to_string()).or_insert(0);
        *entry = (*entry).max(attempts);
        self.updated_at = Utc::now();
    }

    /// Whether the download stage has durably succeeded.
    pub fn download_done(&self) -> bool {
        self.downloaded_path.is_some()
    }

    /// Whether the branding stage has durably succeeded.
    pub fn brand_done(&self) -> bool {
        self.branded_path.is_some()
    }
}

/// One failed item in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub source_id: SourceId,
    /// Absent for source-level stage failures.
    pub clip_id: Option<ClipId>,
    pub stage: StageKind,
    pub kind: FailureKind,
}

/// Exit/reporting surface for one orchestrator run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub sources_attempted: u32,
    pub sources_completed: u32,
    pub sources_partial: u32,
    pub sources_failed: u32,
    pub sources_skipped: u32,
    pub sources_interrupted: u32,
    pub clips_uploaded: u32,
    pub clips_failed: u32,
    pub failures: Vec<FailureReport>,
}

impl RunSummary {
    /// True when no source ended in a non-transient failure state.
    pub fn is_clean(&self) -> bool {
        self.sources_failed == 0 && self.sources_partial == 0
    }

    pub fn record_failure(&mut self, report: FailureReport) {
        self.failures.push(report);
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sources: {} attempted, {} completed, {} partial, {} failed, {} skipped, {} interrupted; clips: {} uploaded, {} failed",
            self.sources_attempted,
            self.sources_completed,
            self.sources_partial,
            self.sources_failed,
            self.sources_skipped,
            self.sources_interrupted,
            self.clips_uploaded,
            self.clips_failed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_source() -> SourceVideo {
        SourceVideo::new("v1", "https://example.com/v1", "Title", "chan", 600.0)
    }

    #[test]
    fn test_run_record_attempts_keeps_max() {
        let mut run = PipelineRun::new(sample_source());
        run.record_attempts(StageKind::Download, 2);
        run.record_attempts(StageKind::Download, 1);
        assert_eq!(run.stage_attempts.get("download"), Some(&2));
    }

    #[test]
    fn test_summary_clean_classification() {
        let mut summary = RunSummary::default();
        summary.sources_completed = 3;
        summary.sources_skipped = 1;
        assert!(summary.is_clean());

        summary.sources_partial = 1;
        assert!(!summary.is_clean());
    }

    #[test]
    fn test_summary_display_covers_every_counter() {
        let summary = RunSummary {
            sources_attempted: 6,
            sources_completed: 2,
            sources_partial: 1,
            sources_failed: 1,
            sources_skipped: 1,
            sources_interrupted: 1,
            clips_uploaded: 5,
            clips_failed: 2,
            failures: Vec::new(),
        };
        assert_eq!(
            summary.to_string(),
            "sources: 6 attempted, 2 completed, 1 partial, 1 failed, 1 skipped, 1 interrupted; clips: 5 uploaded, 2 failed"
        );
    }

    #[test]
    fn test_run_serde_round_trip() {
        let mut run = PipelineRun::new(sample_source());
        run.status = SourceStatus::Branded;
        run.branded_path = Some(PathBuf::from("/tmp/v1/branded.mp4"));

        let json = serde_json::to_string(&run).unwrap();
        let back: PipelineRun = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, SourceStatus::Branded);
        assert!(back.brand_done());
        assert!(!back.download_done());
    }
}
