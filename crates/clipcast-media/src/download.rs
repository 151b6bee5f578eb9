//! Video download and metadata probing via yt-dlp.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Download format: best mp4 up to 1080p with audio merged in.
const DOWNLOAD_FORMAT: &str = "bestvideo[ext=mp4][height<=1080]+bestaudio[ext=m4a]/best[ext=mp4]/best";

/// Metadata fields parsed out of yt-dlp's JSON dump.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoProbe {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
}

/// Download a video to `dest`.
pub async fn download_video(url: &str, dest: &Path, timeout_secs: u64) -> MediaResult<PathBuf> {
    info!(url = url, dest = %dest.display(), "downloading video");

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let dest_str = dest.to_string_lossy().to_string();
    run_ytdlp(
        &[
            "-f",
            DOWNLOAD_FORMAT,
            "--merge-output-format",
            "mp4",
            "--no-playlist",
            "-o",
            &dest_str,
            url,
        ],
        timeout_secs,
    )
    .await?;

    if !dest.exists() {
        return Err(MediaError::DownloadFailed(format!(
            "yt-dlp reported success but {} does not exist",
            dest.display()
        )));
    }

    info!(dest = %dest.display(), "download complete");
    Ok(dest.to_path_buf())
}

/// Fetch metadata for one video without downloading it.
pub async fn fetch_video_metadata(url: &str, timeout_secs: u64) -> MediaResult<VideoProbe> {
    let stdout = run_ytdlp(&["--dump-json", "--skip-download", "--no-playlist", url], timeout_secs)
        .await?;
    let probe: VideoProbe = serde_json::from_str(stdout.trim())?;
    Ok(probe)
}

/// List recent uploads for a channel or playlist URL.
///
/// Uses a flat playlist dump: one JSON object per line, cheap on quota.
pub async fn list_channel_uploads(
    channel_url: &str,
    max_results: u32,
    timeout_secs: u64,
) -> MediaResult<Vec<VideoProbe>> {
    let end = max_results.to_string();
    let stdout = run_ytdlp(
        &[
            "--flat-playlist",
            "--dump-json",
            "--playlist-end",
            &end,
            channel_url,
        ],
        timeout_secs,
    )
    .await?;

    let mut probes = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        probes.push(serde_json::from_str::<VideoProbe>(line)?);
    }
    debug!(channel = channel_url, count = probes.len(), "listed channel uploads");
    Ok(probes)
}

async fn run_ytdlp(args: &[&str], timeout_secs: u64) -> MediaResult<String> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    debug!("Running yt-dlp {}", args.join(" "));

    let child = Command::new("yt-dlp")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
        .await
        .map_err(|_| MediaError::Timeout(timeout_secs))??;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(MediaError::DownloadFailed(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_parses_yt_dlp_json() {
        let json = r#"{
            "id": "abc123",
            "title": "Wild Rivers of the North",
            "channel": "naturechannel",
            "duration": 612.4,
            "webpage_url": "https://example.com/watch?v=abc123",
            "upload_date": "20250812",
            "license": "Creative Commons"
        }"#;
        let probe: VideoProbe = serde_json::from_str(json).unwrap();
        assert_eq!(probe.id, "abc123");
        assert_eq!(probe.duration, Some(612.4));
        assert_eq!(probe.license.as_deref(), Some("Creative Commons"));
    }

    #[test]
    fn test_probe_tolerates_missing_fields() {
        // Flat playlist entries omit most fields.
        let json = r#"{"id": "abc123", "title": "A video"}"#;
        let probe: VideoProbe = serde_json::from_str(json).unwrap();
        assert!(probe.duration.is_none());
        assert!(probe.channel.is_none());
    }
}
