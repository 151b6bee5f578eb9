//! Bounded retry around one stage operation.
//!
//! The runner owns the attempt loop: per-attempt timeout, classification of
//! the result, and backoff between retryable failures. It never touches the
//! registry or the ledger; callers persist whatever the result implies.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use clipcast_models::{FailureKind, Outcome, StageKind};

use crate::config::RetryPolicy;

/// Final result of a stage after the attempt loop.
#[derive(Debug)]
pub enum StageResult<T> {
    Ok { value: T, attempts: u32 },
    /// A fatal failure stopped the loop immediately.
    Fatal { kind: FailureKind, attempts: u32 },
    /// Every attempt failed retryably; `kind` is from the last attempt.
    Exhausted { kind: FailureKind, attempts: u32 },
}

impl<T> StageResult<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            StageResult::Ok { attempts, .. }
            | StageResult::Fatal { attempts, .. }
            | StageResult::Exhausted { attempts, .. } => *attempts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StageRunner {
    retry: RetryPolicy,
    stage_timeout: Duration,
}

impl StageRunner {
    pub fn new(retry: RetryPolicy, stage_timeout_secs: u64) -> Self {
        Self {
            retry,
            stage_timeout: Duration::from_secs(stage_timeout_secs),
        }
    }

    /// Run `attempt` up to `max_attempts` times.
    ///
    /// Each attempt is bounded by the stage timeout; an attempt that outlives
    /// it counts as a retryable timeout. Fatal outcomes stop the loop without
    /// consuming remaining attempts.
    pub async fn run<T, F, Fut>(&self, stage: StageKind, mut attempt: F) -> StageResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        let max = self.retry.max_attempts;
        let mut n = 0;
        loop {
            n += 1;
            let outcome = match tokio::time::timeout(self.stage_timeout, attempt()).await {
                Ok(outcome) => outcome,
                Err(_) => Outcome::Retryable(FailureKind::Timeout),
            };
            match outcome {
                Outcome::Success(value) => {
                    return StageResult::Ok { value, attempts: n };
                }
                Outcome::Fatal(kind) => {
                    warn!(stage = %stage, attempt = n, error = %kind, "stage failed fatally");
                    return StageResult::Fatal { kind, attempts: n };
                }
                Outcome::Retryable(kind) if n >= max => {
                    warn!(stage = %stage, attempts = n, error = %kind, "stage retries exhausted");
                    return StageResult::Exhausted { kind, attempts: n };
                }
                Outcome::Retryable(kind) => {
                    let delay = self.retry.delay_after(n, &kind);
                    warn!(
                        stage = %stage,
                        attempt = n,
                        error = %kind,
                        delay_secs = delay.as_secs(),
                        "stage attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
