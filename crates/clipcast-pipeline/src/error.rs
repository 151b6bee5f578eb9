use clipcast_models::FailureKind;
use clipcast_store::StoreError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that abort orchestration.
///
/// Stage failures are not errors here; they are classified outcomes handled
/// by the orchestrator. This type covers infrastructure faults the pipeline
/// cannot route around.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("source discovery failed: {0}")]
    Discovery(FailureKind),

    #[error("run record for {0} is missing artifact: {1}")]
    MissingArtifact(String, &'static str),
}
