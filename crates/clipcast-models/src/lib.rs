//! Shared data models for the ClipCast pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Source videos and their per-source pipeline state
//! - Clip candidates and clip work items
//! - The stage outcome taxonomy (retryable / fatal / exhausted)
//! - Publish and transform configuration DTOs
//! - Run records and the per-run summary

pub mod candidate;
pub mod clip;
pub mod outcome;
pub mod publish;
pub mod run;
pub mod source;

// Re-export common types
pub use candidate::{fallback_candidate, validate_candidates, CandidateError, ClipCandidate, HighlightPolicy};
pub use clip::{ClipId, ClipStage, ClipWorkItem};
pub use outcome::{FailureKind, Outcome, StageKind};
pub use publish::{AspectPolicy, Destination, LogoCorner, OverlayConfig, PublishMetadata, SubtitleSegment};
pub use run::{FailureReport, PipelineRun, RunSummary};
pub use source::{SourceId, SourceStatus, SourceVideo};
