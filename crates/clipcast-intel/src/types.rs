//! Wire types for the content-intelligence API.

use serde::{Deserialize, Serialize};

/// Request body for highlight detection.
#[derive(Debug, Clone, Serialize)]
pub struct HighlightRequest {
    pub source_id: String,
    pub title: String,
    pub duration_secs: f64,
    pub min_clip_secs: f64,
    pub max_clip_secs: f64,
    pub max_clips: usize,
}

/// One detected highlight window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightSegment {
    pub start_secs: f64,
    pub end_secs: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HighlightResponse {
    pub segments: Vec<HighlightSegment>,
}

/// Request body for clip transcription.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptRequest {
    pub source_id: String,
    pub clip_start_secs: f64,
    pub clip_end_secs: f64,
}

/// One subtitle cue, relative to the clip start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptCue {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptResponse {
    pub cues: Vec<TranscriptCue>,
}

/// Request body for metadata drafting.
#[derive(Debug, Clone, Serialize)]
pub struct MetadataRequest {
    pub source_id: String,
    pub source_title: String,
    pub channel: String,
    pub clip_start_secs: f64,
    pub clip_end_secs: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataResponse {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}
