//! Typed pipeline configuration, validated once at startup.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use clipcast_models::{AspectPolicy, FailureKind, HighlightPolicy, OverlayConfig};

use crate::error::{PipelineError, PipelineResult};

/// Bounded exponential backoff for retryable stage failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per stage, including the first.
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub multiplier: u32,
    pub max_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1,
            multiplier: 2,
            max_delay_secs: 60,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt `attempt` (1-based).
    ///
    /// Exponential from the base, capped at the maximum. A rate-limit reset
    /// hint overrides the computed delay when it is longer.
    pub fn delay_after(&self, attempt: u32, kind: &FailureKind) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let computed = self
            .base_delay_secs
            .saturating_mul(u64::from(self.multiplier).saturating_pow(exp))
            .min(self.max_delay_secs);
        let secs = match kind {
            FailureKind::RateLimited {
                retry_after_secs: Some(hint),
            } => computed.max(*hint),
            _ => computed,
        };
        Duration::from_secs(secs)
    }
}

/// What the cleanup coordinator is allowed to delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupPolicy {
    /// Remove clip artifacts once the clip is uploaded.
    pub delete_clip_after_upload: bool,
    /// Remove the branded intermediate once the source completes.
    pub delete_branded_after_complete: bool,
    /// Remove the downloaded original once the source completes.
    pub delete_original_after_complete: bool,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            delete_clip_after_upload: true,
            delete_branded_after_complete: true,
            delete_original_after_complete: true,
        }
    }
}

/// Orchestration configuration. Built once, validated, then passed down.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root for per-source working directories.
    pub work_dir: PathBuf,
    /// Upper bound on sources processed per run.
    pub max_sources_per_run: usize,
    /// Concurrent clip work items per source.
    pub max_concurrent_clips: usize,
    /// Sources shorter than this are skipped permanently.
    pub min_source_secs: f64,
    /// Whether clips get burned-in subtitles.
    pub subtitles_enabled: bool,
    /// Whether the branded original is republished to the long-form
    /// destination after all clips upload.
    pub publish_original: bool,
    pub aspect: AspectPolicy,
    /// Branding overlay; `None` disables the branding stage.
    pub overlay: Option<OverlayConfig>,
    pub highlight: HighlightPolicy,
    pub retry: RetryPolicy,
    /// Wall-clock budget per stage attempt.
    pub stage_timeout_secs: u64,
    pub cleanup: CleanupPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("work"),
            max_sources_per_run: 1,
            max_concurrent_clips: 2,
            min_source_secs: 60.0,
            subtitles_enabled: true,
            publish_original: true,
            aspect: AspectPolicy::default(),
            overlay: None,
            highlight: HighlightPolicy::default(),
            retry: RetryPolicy::default(),
            stage_timeout_secs: 900,
            cleanup: CleanupPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(PipelineError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.base_delay_secs == 0 {
            return Err(PipelineError::Config(
                "retry.base_delay_secs must be at least 1".into(),
            ));
        }
        if self.retry.multiplier == 0 {
            return Err(PipelineError::Config(
                "retry.multiplier must be at least 1".into(),
            ));
        }
        if self.max_concurrent_clips == 0 {
            return Err(PipelineError::Config(
                "max_concurrent_clips must be at least 1".into(),
            ));
        }
        if self.max_sources_per_run == 0 {
            return Err(PipelineError::Config(
                "max_sources_per_run must be at least 1".into(),
            ));
        }
        if self.highlight.min_clip_secs <= 0.0
            || self.highlight.max_clip_secs <= self.highlight.min_clip_secs
        {
            return Err(PipelineError::Config(
                "highlight clip bounds must satisfy 0 < min < max".into(),
            ));
        }
        if self.highlight.max_clips == 0 {
            return Err(PipelineError::Config(
                "highlight.max_clips must be at least 1".into(),
            ));
        }
        if self.stage_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "stage_timeout_secs must be at least 1".into(),
            ));
        }
        if let Some(overlay) = &self.overlay {
            if overlay.logo_path.as_os_str().is_empty() {
                return Err(PipelineError::Config(
                    "overlay.logo_path must not be empty".into(),
                ));
            }
        }
        Ok(())
    }

    /// Working directory for one source.
    pub fn source_dir(&self, source_id: &str) -> PathBuf {
        self.work_dir.join(source_id)
    }
}
