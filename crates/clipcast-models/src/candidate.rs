//! Clip candidates: scored time-range proposals within a source video.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A scored time-range proposal for a short derivative clip.
///
/// Produced by the content-intelligence collaborator (or the deterministic
/// fallback). `index` is the generated sequence number and is the ordering
/// key for everything derived from this candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipCandidate {
    /// Sequence index within the source, deterministic across runs.
    pub index: u32,
    /// Inclusive start of the range, seconds into the source.
    pub start_secs: f64,
    /// Exclusive end of the range, seconds into the source.
    pub end_secs: f64,
    /// Relevance score in `[0, 1]`.
    pub score: f64,
}

impl ClipCandidate {
    pub fn new(index: u32, start_secs: f64, end_secs: f64, score: f64) -> Self {
        Self {
            index,
            start_secs,
            end_secs,
            score,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    fn overlaps(&self, other: &ClipCandidate) -> bool {
        self.start_secs < other.end_secs && other.start_secs < self.end_secs
    }
}

/// Validation failures for a candidate set.
#[derive(Debug, Error, PartialEq)]
pub enum CandidateError {
    #[error("candidate {index} has an empty or inverted range [{start}, {end})")]
    EmptyRange { index: u32, start: f64, end: f64 },

    #[error("candidate {index} extends past source duration ({end} > {duration})")]
    OutOfBounds { index: u32, end: f64, duration: f64 },

    #[error("candidates {a} and {b} have overlapping ranges")]
    Overlap { a: u32, b: u32 },
}

/// Validate that candidate ranges are non-empty, in bounds, and mutually
/// non-overlapping.
pub fn validate_candidates(
    candidates: &[ClipCandidate],
    source_duration_secs: f64,
) -> Result<(), CandidateError> {
    for c in candidates {
        if c.end_secs <= c.start_secs || c.start_secs < 0.0 {
            return Err(CandidateError::EmptyRange {
                index: c.index,
                start: c.start_secs,
                end: c.end_secs,
            });
        }
        if c.end_secs > source_duration_secs {
            return Err(CandidateError::OutOfBounds {
                index: c.index,
                end: c.end_secs,
                duration: source_duration_secs,
            });
        }
    }
    for (i, a) in candidates.iter().enumerate() {
        for b in &candidates[i + 1..] {
            if a.overlaps(b) {
                return Err(CandidateError::Overlap {
                    a: a.index,
                    b: b.index,
                });
            }
        }
    }
    Ok(())
}

/// Clip-length policy handed to the content-intelligence collaborator and to
/// the fallback generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightPolicy {
    /// Minimum clip length in seconds.
    pub min_clip_secs: f64,
    /// Maximum clip length in seconds.
    pub max_clip_secs: f64,
    /// Upper bound on candidates per source.
    pub max_clips: u32,
    /// Seconds to skip at the head of the source when falling back.
    pub fallback_lead_in_secs: f64,
}

impl Default for HighlightPolicy {
    fn default() -> Self {
        Self {
            min_clip_secs: 15.0,
            max_clip_secs: 60.0,
            max_clips: 3,
            fallback_lead_in_secs: 5.0,
        }
    }
}

/// Deterministic fallback when intelligence returns zero candidates.
///
/// Every eligible source must still yield at least one clip, so this carves a
/// single window of up to `max_clip_secs` starting just past the lead-in. The
/// result depends only on the source duration and the policy.
pub fn fallback_candidate(source_duration_secs: f64, policy: &HighlightPolicy) -> ClipCandidate {
    let start = if source_duration_secs > policy.fallback_lead_in_secs + policy.min_clip_secs {
        policy.fallback_lead_in_secs
    } else {
        0.0
    };
    let end = (start + policy.max_clip_secs).min(source_duration_secs);
    ClipCandidate::new(0, start, end, 0.5)
}
