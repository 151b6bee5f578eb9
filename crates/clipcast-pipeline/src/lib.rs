//! Pipeline orchestration core.
//!
//! Drives source videos through download, branding, highlight analysis,
//! clip fan-out, subtitling, metadata, and publishing, with durable state in
//! the registry and ledger so an interrupted run resumes instead of
//! restarting. External collaborators are abstracted behind the traits in
//! [`traits`]; everything here is deterministic given their outcomes.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod stage_runner;
pub mod traits;

pub use cleanup::CleanupCoordinator;
pub use config::{CleanupPolicy, PipelineConfig, RetryPolicy};
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::PipelineOrchestrator;
pub use stage_runner::{StageResult, StageRunner};
pub use traits::{ContentIntelligence, Discovery, MediaTransform, Transport};
