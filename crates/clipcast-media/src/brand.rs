//! Branding overlay: composite a channel logo onto the source video.

use std::path::{Path, PathBuf};

use tracing::info;

use clipcast_models::{LogoCorner, OverlayConfig};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Build the overlay filter expression for a logo placement.
pub fn branding_filter(overlay: &OverlayConfig) -> String {
    let (x, y) = match overlay.corner {
        LogoCorner::TopLeft => (format!("{}", overlay.margin_x), format!("{}", overlay.margin_y)),
        LogoCorner::TopRight => (
            format!("main_w-overlay_w-{}", overlay.margin_x),
            format!("{}", overlay.margin_y),
        ),
        LogoCorner::BottomLeft => (
            format!("{}", overlay.margin_x),
            format!("main_h-overlay_h-{}", overlay.margin_y),
        ),
        LogoCorner::BottomRight => (
            format!("main_w-overlay_w-{}", overlay.margin_x),
            format!("main_h-overlay_h-{}", overlay.margin_y),
        ),
    };
    format!("[0:v][1:v]overlay={}:{}", x, y)
}

/// Apply the branding overlay, writing the branded copy to `output`.
pub async fn apply_branding(
    input: &Path,
    output: &Path,
    overlay: &OverlayConfig,
    timeout_secs: u64,
) -> MediaResult<PathBuf> {
    if !overlay.logo_path.exists() {
        return Err(MediaError::FileNotFound(overlay.logo_path.clone()));
    }

    info!(
        input = %input.display(),
        logo = %overlay.logo_path.display(),
        "applying branding overlay"
    );

    let cmd = FfmpegCommand::new(input, output)
        .extra_input(&overlay.logo_path)
        .filter_complex(branding_filter(overlay))
        .video_codec("libx264")
        .audio_codec("copy")
        .crf(23)
        .preset("medium")
        .faststart();

    FfmpegRunner::new()
        .with_timeout(timeout_secs)
        .run(&cmd)
        .await?;

    Ok(cmd.output_path().to_path_buf())
}
