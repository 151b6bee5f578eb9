//! Subtitle rendering and burn-in.

use std::path::{Path, PathBuf};

use tracing::info;

use clipcast_models::SubtitleSegment;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Render segments as an SRT document.
pub fn render_srt(segments: &[SubtitleSegment]) -> String {
    let mut out = String::new();
    for (i, seg) in segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            srt_timestamp(seg.start_secs),
            srt_timestamp(seg.end_secs),
            seg.text.trim()
        ));
    }
    out
}

/// Format seconds as an SRT timestamp (`HH:MM:SS,mmm`).
fn srt_timestamp(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let s = (total_ms / 1000) % 60;
    let m = (total_ms / 60_000) % 60;
    let h = total_ms / 3_600_000;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// Burn subtitles into `input`, writing the result to `output`.
///
/// The SRT is written next to the output file and left in place; cleanup of
/// intermediates is the caller's concern.
pub async fn burn_subtitles(
    input: &Path,
    output: &Path,
    segments: &[SubtitleSegment],
    timeout_secs: u64,
) -> MediaResult<PathBuf> {
    let srt_path = output.with_extension("srt");
    tokio::fs::write(&srt_path, render_srt(segments)).await?;

    info!(
        input = %input.display(),
        cues = segments.len(),
        "burning subtitles"
    );

    // The subtitles filter parses ':' and '\' specially in its path argument.
    let escaped = srt_path
        .to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:");

    let cmd = FfmpegCommand::new(input, output)
        .video_filter(format!("subtitles={}", escaped))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srt_timestamp_format() {
        assert_eq!(srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(srt_timestamp(61.5), "00:01:01,500");
        assert_eq!(srt_timestamp(3661.007), "01:01:01,007");
    }

    #[test]
    fn test_render_srt_numbering_and_cues() {
        let segments = vec![
            SubtitleSegment {
                start_secs: 0.0,
                end_secs: 2.5,
                text: "First cue".into(),
            },
            SubtitleSegment {
                start_secs: 2.5,
                end_secs: 5.0,
                text: "Second cue".into(),
            },
        ];
        let srt = render_srt(&segments);
        let expected = "1\n00:00:00,000 --> 00:00:02,500\nFirst cue\n\n2\n00:00:02,500 --> 00:00:05,000\nSecond cue\n\n";
        assert_eq!(srt, expected);
    }
}
