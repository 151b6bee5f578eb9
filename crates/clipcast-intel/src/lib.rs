//! Client for the content-intelligence HTTP service.
//!
//! The service detects highlight-worthy segments in long-form video and
//! drafts publish metadata for finished clips. Calls are single-shot; retry
//! scheduling belongs to the stage runner, so transport and server failures
//! come back classified rather than re-attempted here.

pub mod client;
pub mod error;
pub mod types;

pub use client::{IntelClient, IntelClientConfig};
pub use error::{IntelError, IntelResult};
pub use types::{
    HighlightRequest, HighlightResponse, HighlightSegment, MetadataRequest, MetadataResponse,
    TranscriptCue, TranscriptRequest, TranscriptResponse,
};
