//! The pipeline state machine.
//!
//! One run walks each discovered source through download, branding,
//! highlight analysis, clip fan-out, and publishing, persisting every
//! transition before moving on. Completed stages are gated on the durable
//! artifact anchors rather than the status label, so a source that failed or
//! was interrupted resumes exactly where it stopped.

use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use clipcast_models::{
    fallback_candidate, validate_candidates, ClipCandidate, ClipStage, ClipWorkItem, Destination,
    FailureKind, FailureReport, Outcome, PublishMetadata, RunSummary, SourceStatus, SourceVideo,
    StageKind,
};
use clipcast_store::{ClipLedger, SourceRegistry, StateStore};

use crate::cleanup::CleanupCoordinator;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::stage_runner::{StageResult, StageRunner};
use crate::traits::{ContentIntelligence, Discovery, MediaTransform, Transport};

/// How far back discovery looks; processed sources are filtered out, so the
/// window is wider than the per-run source budget.
const DISCOVERY_WINDOW: usize = 25;

enum ClipOutcome {
    Uploaded,
    /// The report is absent for clips that were already terminal without a
    /// published id when the run started.
    Failed(Option<FailureReport>),
}

pub struct PipelineOrchestrator<D, T, M, I> {
    config: PipelineConfig,
    registry: SourceRegistry,
    ledger: ClipLedger,
    discovery: D,
    transport: T,
    media: M,
    intel: I,
    runner: StageRunner,
    cleanup: CleanupCoordinator,
    shutdown: watch::Receiver<bool>,
}

impl<D, T, M, I> PipelineOrchestrator<D, T, M, I>
where
    D: Discovery,
    T: Transport,
    M: MediaTransform,
    I: ContentIntelligence,
{
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn StateStore>,
        discovery: D,
        transport: T,
        media: M,
        intel: I,
        shutdown: watch::Receiver<bool>,
    ) -> PipelineResult<Self> {
        config.validate()?;
        let runner = StageRunner::new(config.retry.clone(), config.stage_timeout_secs);
        let cleanup = CleanupCoordinator::new(config.cleanup.clone());
        Ok(Self {
            registry: SourceRegistry::new(Arc::clone(&store)),
            ledger: ClipLedger::new(store),
            config,
            discovery,
            transport,
            media,
            intel,
            runner,
            cleanup,
            shutdown,
        })
    }

    /// Process one batch of sources and report what happened.
    pub async fn run(&self) -> PipelineResult<RunSummary> {
        let mut summary = RunSummary::default();

        let limit = DISCOVERY_WINDOW.max(self.config.max_sources_per_run);
        let sources = match self.discovery.list_candidate_sources(limit).await {
            Outcome::Success(sources) => sources,
            Outcome::Retryable(kind) | Outcome::Fatal(kind) => {
                return Err(PipelineError::Discovery(kind));
            }
        };
        info!(discovered = sources.len(), "discovery finished");

        let mut attempted = 0usize;
        for source in &sources {
            if attempted >= self.config.max_sources_per_run {
                break;
            }
            if self.shutdown_requested() {
                info!("shutdown requested, stopping before next source");
                break;
            }
            if self.registry.is_processed(&source.id).await? {
                debug!(source_id = %source.id, "source already processed");
                continue;
            }
            attempted += 1;
            summary.sources_attempted += 1;

            if source.duration_secs < self.config.min_source_secs {
                self.registry.ensure(source).await?;
                self.registry
                    .commit_skipped(
                        &source.id,
                        format!(
                            "duration {:.0}s below minimum {:.0}s",
                            source.duration_secs, self.config.min_source_secs
                        ),
                    )
                    .await?;
                summary.sources_skipped += 1;
                continue;
            }

            self.process_source(source, &mut summary).await?;
        }

        info!(%summary, "run finished");
        Ok(summary)
    }

    #[instrument(skip(self, summary), fields(source_id = %source.id))]
    async fn process_source(
        &self,
        source: &SourceVideo,
        summary: &mut RunSummary,
    ) -> PipelineResult<()> {
        let mut run = self.registry.ensure(source).await?;
        let source_dir = self.config.source_dir(source.id.as_str());
        tokio::fs::create_dir_all(&source_dir).await?;

        // Download.
        if !run.download_done() {
            self.registry
                .mark_stage(&source.id, SourceStatus::Downloading)
                .await?;
            let dest = source_dir.join("source.mp4");
            let result = self
                .runner
                .run(StageKind::Download, || self.transport.download(source, &dest))
                .await;
            self.registry
                .record_attempts(&source.id, StageKind::Download, result.attempts())
                .await?;
            match result {
                StageResult::Ok { value, .. } => {
                    run = self.registry.record_download(&source.id, &value).await?;
                }
                StageResult::Fatal { kind, .. } | StageResult::Exhausted { kind, .. } => {
                    return self
                        .fail_source(source, StageKind::Download, kind, summary)
                        .await;
                }
            }
        }
        if self.check_interrupted(summary) {
            return Ok(());
        }

        // Branding, when an overlay is configured.
        if let Some(overlay) = &self.config.overlay {
            if !run.brand_done() {
                self.registry
                    .mark_stage(&source.id, SourceStatus::Branding)
                    .await?;
                let input = run.downloaded_path.clone().ok_or_else(|| {
                    PipelineError::MissingArtifact(source.id.to_string(), "downloaded_path")
                })?;
                let output = source_dir.join("branded.mp4");
                let result = self
                    .runner
                    .run(StageKind::Brand, || {
                        self.media.apply_branding(&input, &output, overlay)
                    })
                    .await;
                self.registry
                    .record_attempts(&source.id, StageKind::Brand, result.attempts())
                    .await?;
                match result {
                    StageResult::Ok { value, .. } => {
                        run = self.registry.record_branded(&source.id, &value).await?;
                    }
                    StageResult::Fatal { kind, .. } | StageResult::Exhausted { kind, .. } => {
                        return self
                            .fail_source(source, StageKind::Brand, kind, summary)
                            .await;
                    }
                }
            }
        }
        if self.check_interrupted(summary) {
            return Ok(());
        }

        // Clips cut from the branded copy when branding ran, otherwise from
        // the original download.
        let clip_input = run
            .branded_path
            .clone()
            .or_else(|| run.downloaded_path.clone())
            .ok_or_else(|| {
                PipelineError::MissingArtifact(source.id.to_string(), "downloaded_path")
            })?;

        // Highlight analysis, once per source.
        self.registry
            .mark_stage(&source.id, SourceStatus::Splitting)
            .await?;
        if run.clip_ids.is_empty() {
            let candidates = self.analyze(source).await?;
            let mut clip_ids = Vec::with_capacity(candidates.len());
            for candidate in &candidates {
                let item = self.ledger.create(&source.id, candidate).await?;
                clip_ids.push(item.id);
            }
            run = self.registry.set_clip_ids(&source.id, clip_ids).await?;
        }

        // Clip fan-out.
        let items = self.ledger.list_by_source(&source.id).await?;
        let results: Vec<PipelineResult<ClipOutcome>> = stream::iter(items)
            .map(|item| self.process_clip(source, clip_input.as_path(), item))
            .buffer_unordered(self.config.max_concurrent_clips)
            .collect()
            .await;

        let mut uploaded = 0u32;
        let mut failed = 0u32;
        for result in results {
            match result? {
                ClipOutcome::Uploaded => uploaded += 1,
                ClipOutcome::Failed(report) => {
                    failed += 1;
                    if let Some(report) = report {
                        summary.record_failure(report);
                    }
                }
            }
        }
        summary.clips_uploaded += uploaded;
        summary.clips_failed += failed;

        // Any failed clip keeps the source out of the dedup set; a later run
        // may retry the source once the failed clip records are resolved.
        if failed > 0 {
            let status = if uploaded > 0 {
                summary.sources_partial += 1;
                SourceStatus::PartiallyCompleted
            } else {
                summary.sources_failed += 1;
                SourceStatus::Failed
            };
            let run = self.registry.mark_stage(&source.id, status).await?;
            warn!(uploaded, failed, status = %status, "source left uncommitted");
            self.cleanup.on_source_terminal(&run).await;
            return Ok(());
        }
        if self.check_interrupted(summary) {
            return Ok(());
        }

        // Republish the branded original, gated on every clip being up.
        if self.config.publish_original && run.original_published_id.is_none() {
            self.registry
                .mark_stage(&source.id, SourceStatus::PublishingOriginal)
                .await?;
            let metadata = PublishMetadata::fallback(&source.title, &source.channel);
            let result = self
                .runner
                .run(StageKind::PublishOriginal, || {
                    self.transport
                        .publish(&clip_input, &metadata, Destination::Longform)
                })
                .await;
            self.registry
                .record_attempts(&source.id, StageKind::PublishOriginal, result.attempts())
                .await?;
            match result {
                StageResult::Ok { value, .. } => {
                    self.registry
                        .record_original_published(&source.id, value)
                        .await?;
                }
                StageResult::Fatal { kind, .. } | StageResult::Exhausted { kind, .. } => {
                    return self
                        .fail_source(source, StageKind::PublishOriginal, kind, summary)
                        .await;
                }
            }
        }

        let run = self.registry.commit_completed(&source.id).await?;
        summary.sources_completed += 1;
        self.cleanup.on_source_terminal(&run).await;
        Ok(())
    }

    /// Highlight analysis with the deterministic fallback: a source that
    /// reaches this point always yields at least one candidate.
    async fn analyze(&self, source: &SourceVideo) -> PipelineResult<Vec<ClipCandidate>> {
        let result = self
            .runner
            .run(StageKind::Analyze, || {
                self.intel.detect_highlights(source, &self.config.highlight)
            })
            .await;
        self.registry
            .record_attempts(&source.id, StageKind::Analyze, result.attempts())
            .await?;

        let mut candidates = match result {
            StageResult::Ok { value, .. } => value,
            StageResult::Fatal { kind, .. } | StageResult::Exhausted { kind, .. } => {
                warn!(error = %kind, "highlight detection failed, falling back");
                Vec::new()
            }
        };

        // Bound the set and make indices deterministic before deriving ids.
        candidates.truncate(self.config.highlight.max_clips as usize);
        for (i, candidate) in candidates.iter_mut().enumerate() {
            candidate.index = i as u32;
        }
        if let Err(e) = validate_candidates(&candidates, source.duration_secs) {
            warn!(error = %e, "rejected invalid candidate set, falling back");
            candidates.clear();
        }
        if candidates.is_empty() {
            candidates.push(fallback_candidate(
                source.duration_secs,
                &self.config.highlight,
            ));
        }
        debug!(candidates = candidates.len(), "analysis finished");
        Ok(candidates)
    }

    async fn process_clip(
        &self,
        source: &SourceVideo,
        input: &Path,
        mut item: ClipWorkItem,
    ) -> PipelineResult<ClipOutcome> {
        if item.stage == ClipStage::Failed {
            // The source was left uncommitted, so this clip gets another
            // attempt from whatever stage its artifacts still support.
            item = self.ledger.reopen(&item.id).await?;
            debug!(clip_id = %item.id, stage = %item.stage, "reopened failed clip");
        } else if item.stage.is_terminal() {
            return Ok(if item.published_id.is_some() {
                ClipOutcome::Uploaded
            } else {
                ClipOutcome::Failed(None)
            });
        }

        let clip_dir = self.config.source_dir(source.id.as_str()).join("clips");
        tokio::fs::create_dir_all(&clip_dir).await?;

        // Extract.
        if item.stage.rank() < ClipStage::Clipped.rank() {
            let output = clip_dir.join(format!("{}.mp4", item.id));
            let candidate = item.candidate.clone();
            let result = self
                .runner
                .run(StageKind::ExtractClip, || {
                    self.media
                        .extract_clip(input, &output, &candidate, self.config.aspect)
                })
                .await;
            self.registry
                .record_attempts(&source.id, StageKind::ExtractClip, result.attempts())
                .await?;
            match result {
                StageResult::Ok { value, .. } => {
                    self.ledger
                        .update(&item.id, move |i| i.raw_path = Some(value))
                        .await?;
                    item = self.ledger.advance(&item.id, ClipStage::Clipped).await?;
                }
                StageResult::Fatal { kind, attempts }
                | StageResult::Exhausted { kind, attempts } => {
                    return self
                        .fail_clip(&item, StageKind::ExtractClip, kind, attempts)
                        .await;
                }
            }
        }

        // Subtitles are best effort: a clip still publishes without them.
        if self.config.subtitles_enabled && item.stage.rank() < ClipStage::Subtitled.rank() {
            let raw = item.raw_path.clone().ok_or_else(|| {
                PipelineError::MissingArtifact(item.id.to_string(), "raw_path")
            })?;
            let output = clip_dir.join(format!("{}_sub.mp4", item.id));
            let candidate = item.candidate.clone();
            let result = self
                .runner
                .run(StageKind::Subtitle, || {
                    let raw = raw.clone();
                    let output = output.clone();
                    let candidate = candidate.clone();
                    async move {
                        match self.intel.transcribe(source, &candidate).await {
                            Outcome::Success(segments) if segments.is_empty() => {
                                Outcome::Success(None)
                            }
                            Outcome::Success(segments) => self
                                .media
                                .burn_subtitles(&raw, &output, &segments)
                                .await
                                .map(Some),
                            Outcome::Retryable(kind) => Outcome::Retryable(kind),
                            Outcome::Fatal(kind) => Outcome::Fatal(kind),
                        }
                    }
                })
                .await;
            self.registry
                .record_attempts(&source.id, StageKind::Subtitle, result.attempts())
                .await?;
            match result {
                StageResult::Ok {
                    value: Some(path), ..
                } => {
                    self.ledger
                        .update(&item.id, move |i| i.subtitled_path = Some(path))
                        .await?;
                    item = self.ledger.advance(&item.id, ClipStage::Subtitled).await?;
                }
                StageResult::Ok { value: None, .. } => {
                    debug!(clip_id = %item.id, "empty transcript, publishing without subtitles");
                }
                StageResult::Fatal { kind, .. } | StageResult::Exhausted { kind, .. } => {
                    warn!(clip_id = %item.id, error = %kind, "subtitling failed, publishing without subtitles");
                }
            }
        }

        // Metadata, with the static fallback when generation fails.
        if item.stage.rank() < ClipStage::MetadataGenerated.rank() {
            let candidate = item.candidate.clone();
            let result = self
                .runner
                .run(StageKind::GenerateMetadata, || {
                    self.intel.generate_metadata(source, &candidate)
                })
                .await;
            self.registry
                .record_attempts(&source.id, StageKind::GenerateMetadata, result.attempts())
                .await?;
            let metadata = match result {
                StageResult::Ok { value, .. } => value,
                StageResult::Fatal { kind, .. } | StageResult::Exhausted { kind, .. } => {
                    warn!(clip_id = %item.id, error = %kind, "metadata generation failed, using fallback");
                    PublishMetadata::fallback(&source.title, &source.channel)
                }
            };
            self.ledger
                .update(&item.id, move |i| i.metadata = Some(metadata))
                .await?;
            item = self
                .ledger
                .advance(&item.id, ClipStage::MetadataGenerated)
                .await?;
        }

        // Publish.
        if item.stage.rank() < ClipStage::Uploaded.rank() {
            let artifact = item.upload_artifact().cloned().ok_or_else(|| {
                PipelineError::MissingArtifact(item.id.to_string(), "upload artifact")
            })?;
            let metadata = item
                .metadata
                .clone()
                .unwrap_or_else(|| PublishMetadata::fallback(&source.title, &source.channel));
            item = self.ledger.advance(&item.id, ClipStage::Uploading).await?;
            let result = self
                .runner
                .run(StageKind::PublishClip, || {
                    self.transport
                        .publish(&artifact, &metadata, Destination::Shorts)
                })
                .await;
            self.registry
                .record_attempts(&source.id, StageKind::PublishClip, result.attempts())
                .await?;
            match result {
                StageResult::Ok { value, .. } => {
                    self.ledger
                        .update(&item.id, move |i| i.published_id = Some(value))
                        .await?;
                    item = self.ledger.advance(&item.id, ClipStage::Uploaded).await?;
                    info!(clip_id = %item.id, "clip uploaded");
                    self.cleanup.on_clip_uploaded(&item, &self.ledger).await?;
                }
                StageResult::Fatal { kind, attempts }
                | StageResult::Exhausted { kind, attempts } => {
                    return self
                        .fail_clip(&item, StageKind::PublishClip, kind, attempts)
                        .await;
                }
            }
        }

        Ok(ClipOutcome::Uploaded)
    }

    async fn fail_clip(
        &self,
        item: &ClipWorkItem,
        stage: StageKind,
        kind: FailureKind,
        attempts: u32,
    ) -> PipelineResult<ClipOutcome> {
        self.ledger
            .record_failure(&item.id, kind.clone(), attempts)
            .await?;
        Ok(ClipOutcome::Failed(Some(FailureReport {
            source_id: item.source_id.clone(),
            clip_id: Some(item.id.clone()),
            stage,
            kind,
        })))
    }

    async fn fail_source(
        &self,
        source: &SourceVideo,
        stage: StageKind,
        kind: FailureKind,
        summary: &mut RunSummary,
    ) -> PipelineResult<()> {
        self.registry
            .mark_stage(&source.id, SourceStatus::Failed)
            .await?;
        summary.sources_failed += 1;
        summary.record_failure(FailureReport {
            source_id: source.id.clone(),
            clip_id: None,
            stage,
            kind,
        });
        Ok(())
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Shutdown gate between source-level stages. The source stays in its
    /// current non-terminal status and resumes on the next run.
    fn check_interrupted(&self, summary: &mut RunSummary) -> bool {
        if self.shutdown_requested() {
            info!("shutdown requested, leaving source resumable");
            summary.sources_interrupted += 1;
            true
        } else {
            false
        }
    }
}
