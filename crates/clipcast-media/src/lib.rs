//! yt-dlp and FFmpeg CLI wrappers for ClipCast.
//!
//! Thin subprocess adapters: download and metadata probing via yt-dlp,
//! branding overlay / clip extraction / subtitle burn via FFmpeg. All
//! functions return classified [`MediaError`]s; retry policy lives with the
//! caller.

pub mod brand;
pub mod clip;
pub mod command;
pub mod download;
pub mod error;
pub mod probe;
pub mod subtitle;

pub use brand::apply_branding;
pub use clip::extract_clip;
pub use command::{FfmpegCommand, FfmpegRunner};
pub use download::{download_video, fetch_video_metadata, list_channel_uploads, VideoProbe};
pub use error::{MediaError, MediaResult};
pub use probe::probe_duration;
pub use subtitle::burn_subtitles;
