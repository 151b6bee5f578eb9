//! Collaborator seams.
//!
//! The orchestrator talks to the outside world through these four traits.
//! Implementations report classified [`Outcome`]s; they never drive their
//! own retries.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use clipcast_models::{
    AspectPolicy, ClipCandidate, Destination, HighlightPolicy, Outcome, OverlayConfig,
    PublishMetadata, SourceVideo, SubtitleSegment,
};

/// Finds new source videos to repurpose.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Recent uploads in discovery order, newest first, up to `limit`.
    async fn list_candidate_sources(&self, limit: usize) -> Outcome<Vec<SourceVideo>>;
}

/// Moves bytes in and out: source download and artifact publishing.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Download the source to `dest`, returning the written path.
    async fn download(&self, source: &SourceVideo, dest: &Path) -> Outcome<PathBuf>;

    /// Publish `artifact` to `destination`, returning the remote id.
    async fn publish(
        &self,
        artifact: &Path,
        metadata: &PublishMetadata,
        destination: Destination,
    ) -> Outcome<String>;
}

/// Local media transformation.
#[async_trait]
pub trait MediaTransform: Send + Sync {
    async fn apply_branding(
        &self,
        input: &Path,
        output: &Path,
        overlay: &OverlayConfig,
    ) -> Outcome<PathBuf>;

    async fn extract_clip(
        &self,
        input: &Path,
        output: &Path,
        candidate: &ClipCandidate,
        aspect: AspectPolicy,
    ) -> Outcome<PathBuf>;

    async fn burn_subtitles(
        &self,
        input: &Path,
        output: &Path,
        segments: &[SubtitleSegment],
    ) -> Outcome<PathBuf>;
}

/// Highlight detection, transcription, and metadata drafting.
#[async_trait]
pub trait ContentIntelligence: Send + Sync {
    /// Scored highlight candidates for a source, honoring the policy bounds.
    async fn detect_highlights(
        &self,
        source: &SourceVideo,
        policy: &HighlightPolicy,
    ) -> Outcome<Vec<ClipCandidate>>;

    /// Subtitle cues for one clip window, relative to the clip start.
    async fn transcribe(
        &self,
        source: &SourceVideo,
        candidate: &ClipCandidate,
    ) -> Outcome<Vec<SubtitleSegment>>;

    /// Draft publish metadata for one clip.
    async fn generate_metadata(
        &self,
        source: &SourceVideo,
        candidate: &ClipCandidate,
    ) -> Outcome<PublishMetadata>;
}
