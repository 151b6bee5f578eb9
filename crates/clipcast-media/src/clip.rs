//! Clip extraction with vertical reframing.

use std::path::{Path, PathBuf};

use tracing::info;

use clipcast_models::AspectPolicy;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Build the video filter for an aspect policy, if any.
///
/// Target canvas is 1080x1920 (9:16).
pub fn aspect_filter(policy: AspectPolicy) -> Option<String> {
    match policy {
        AspectPolicy::CropCenter => {
            Some("crop=ih*9/16:ih,scale=1080:1920".to_string())
        }
        AspectPolicy::PadBlur => Some(
            "split[bg][fg];[bg]scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,boxblur=20[blurred];[fg]scale=1080:-2[scaled];[blurred][scaled]overlay=(W-w)/2:(H-h)/2"
                .to_string(),
        ),
        AspectPolicy::Original => None,
    }
}

/// Extract `[start, start+duration)` from `input` into `output`.
pub async fn extract_clip(
    input: &Path,
    output: &Path,
    start_secs: f64,
    duration_secs: f64,
    policy: AspectPolicy,
    timeout_secs: u64,
) -> MediaResult<PathBuf> {
    info!(
        input = %input.display(),
        start = start_secs,
        duration = duration_secs,
        "extracting clip"
    );

    let mut cmd = FfmpegCommand::new(input, output)
        .seek(start_secs)
        .duration(duration_secs)
        .video_codec("libx264")
        .audio_codec("aac")
        .crf(23)
        .preset("medium")
        .audio_bitrate("128k")
        .faststart();

    match aspect_filter(policy) {
        // PadBlur needs a filter graph with named pads.
        Some(filter) if matches!(policy, AspectPolicy::PadBlur) => {
            cmd = cmd.filter_complex(filter);
        }
        Some(filter) => {
            cmd = cmd.video_filter(filter);
        }
        None => {}
    }

    FfmpegRunner::new()
        .with_timeout(timeout_secs)
        .run(&cmd)
        .await?;

    Ok(cmd.output_path().to_path_buf())
}
