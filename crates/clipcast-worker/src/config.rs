//! Worker configuration from environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use clipcast_intel::IntelClientConfig;
use clipcast_models::{AspectPolicy, HighlightPolicy, LogoCorner, OverlayConfig};
use clipcast_pipeline::config::{CleanupPolicy, PipelineConfig, RetryPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Channel or playlist URL discovery pulls uploads from.
    pub source_channel_url: String,
    /// Root for the registry/ledger JSON documents.
    pub state_dir: PathBuf,
    pub work_dir: PathBuf,
    pub max_sources_per_run: usize,
    pub max_concurrent_clips: usize,
    pub min_source_secs: f64,
    pub subtitles_enabled: bool,
    pub publish_original: bool,
    pub aspect: AspectPolicy,
    pub overlay: Option<OverlayConfig>,
    pub highlight: HighlightPolicy,
    pub retry: RetryPolicy,
    pub stage_timeout_secs: u64,
    pub cleanup: CleanupPolicy,
    pub publish_api_url: String,
    pub publish_api_key: Option<String>,
    pub intel: IntelClientConfig,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let overlay = match std::env::var("CHANNEL_LOGO_PATH") {
            Ok(path) if !path.is_empty() => Some(OverlayConfig {
                logo_path: PathBuf::from(path),
                corner: parse_corner("LOGO_CORNER")?,
                margin_x: env_parse("LOGO_MARGIN_X", 17)?,
                margin_y: env_parse("LOGO_MARGIN_Y", 15)?,
            }),
            _ => None,
        };

        Ok(Self {
            source_channel_url: require("SOURCE_CHANNEL_URL")?,
            state_dir: PathBuf::from(env_or("STATE_DIR", "state")),
            work_dir: PathBuf::from(env_or("WORK_DIR", "work")),
            max_sources_per_run: env_parse("MAX_SOURCES_PER_RUN", 1)?,
            max_concurrent_clips: env_parse("MAX_CONCURRENT_CLIPS", 2)?,
            min_source_secs: env_parse("MIN_SOURCE_SECS", 60.0)?,
            subtitles_enabled: env_bool("SUBTITLES_ENABLED", true)?,
            publish_original: env_bool("PUBLISH_ORIGINAL", true)?,
            aspect: parse_aspect("ASPECT_POLICY")?,
            overlay,
            highlight: HighlightPolicy {
                min_clip_secs: env_parse("MIN_CLIP_SECS", 15.0)?,
                max_clip_secs: env_parse("MAX_CLIP_SECS", 60.0)?,
                max_clips: env_parse("MAX_CLIPS", 3)?,
                fallback_lead_in_secs: env_parse("FALLBACK_LEAD_IN_SECS", 5.0)?,
            },
            retry: RetryPolicy {
                max_attempts: env_parse("RETRY_MAX_ATTEMPTS", 3)?,
                base_delay_secs: env_parse("RETRY_BASE_DELAY_SECS", 1)?,
                multiplier: env_parse("RETRY_MULTIPLIER", 2)?,
                max_delay_secs: env_parse("RETRY_MAX_DELAY_SECS", 60)?,
            },
            stage_timeout_secs: env_parse("STAGE_TIMEOUT_SECS", 900)?,
            cleanup: CleanupPolicy {
                delete_clip_after_upload: env_bool("DELETE_CLIP_AFTER_UPLOAD", true)?,
                delete_branded_after_complete: env_bool("DELETE_BRANDED_AFTER_COMPLETE", true)?,
                delete_original_after_complete: env_bool("DELETE_ORIGINAL_AFTER_COMPLETE", true)?,
            },
            publish_api_url: require("PUBLISH_API_URL")?,
            publish_api_key: std::env::var("PUBLISH_API_KEY").ok(),
            intel: IntelClientConfig::from_env(),
        })
    }

    /// Subprocess budget, kept under the stage timeout so classification
    /// comes from the media layer rather than the stage runner.
    pub fn media_timeout_secs(&self) -> u64 {
        self.stage_timeout_secs.saturating_sub(5).max(1)
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            work_dir: self.work_dir.clone(),
            max_sources_per_run: self.max_sources_per_run,
            max_concurrent_clips: self.max_concurrent_clips,
            min_source_secs: self.min_source_secs,
            subtitles_enabled: self.subtitles_enabled,
            publish_original: self.publish_original,
            aspect: self.aspect,
            overlay: self.overlay.clone(),
            highlight: self.highlight.clone(),
            retry: self.retry.clone(),
            stage_timeout_secs: self.stage_timeout_secs,
            cleanup: self.cleanup.clone(),
        }
    }
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::Invalid(key, v)),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid(key, v)),
        },
        Err(_) => Ok(default),
    }
}

fn parse_corner(key: &'static str) -> Result<LogoCorner, ConfigError> {
    match std::env::var(key) {
        Ok(v) => match v.to_lowercase().as_str() {
            "top_left" => Ok(LogoCorner::TopLeft),
            "top_right" => Ok(LogoCorner::TopRight),
            "bottom_left" => Ok(LogoCorner::BottomLeft),
            "bottom_right" => Ok(LogoCorner::BottomRight),
            _ => Err(ConfigError::Invalid(key, v)),
        },
        Err(_) => Ok(LogoCorner::BottomRight),
    }
}

fn parse_aspect(key: &'static str) -> Result<AspectPolicy, ConfigError> {
    match std::env::var(key) {
        Ok(v) => match v.to_lowercase().as_str() {
            "crop_center" => Ok(AspectPolicy::CropCenter),
            "pad_blur" => Ok(AspectPolicy::PadBlur),
            "original" => Ok(AspectPolicy::Original),
            _ => Err(ConfigError::Invalid(key, v)),
        },
        Err(_) => Ok(AspectPolicy::default()),
    }
}
