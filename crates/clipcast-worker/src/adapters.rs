//! Concrete collaborators behind the pipeline seams: yt-dlp discovery and
//! download, FFmpeg transforms, the intelligence client, and the HTTP
//! publish endpoint.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::warn;

use clipcast_intel::{
    HighlightRequest, IntelClient, MetadataRequest, TranscriptRequest,
};
use clipcast_media::{MediaError, MediaResult};
use clipcast_models::{
    AspectPolicy, ClipCandidate, Destination, FailureKind, HighlightPolicy, Outcome,
    OverlayConfig, PublishMetadata, SourceVideo, SubtitleSegment,
};
use clipcast_pipeline::traits::{ContentIntelligence, Discovery, MediaTransform, Transport};

/// Classify a media-layer error for the stage runner.
fn media_failure(e: &MediaError) -> FailureKind {
    match e {
        MediaError::Timeout(_) => FailureKind::Timeout,
        _ if e.is_transient() => FailureKind::Network,
        MediaError::FileNotFound(_) => FailureKind::MissingAsset,
        MediaError::FfmpegNotFound | MediaError::FfprobeNotFound | MediaError::YtDlpNotFound => {
            FailureKind::Internal(e.to_string())
        }
        MediaError::CommandFailed { .. }
        | MediaError::DownloadFailed(_)
        | MediaError::Probe(_) => FailureKind::UnsupportedMedia,
        MediaError::Io(_) | MediaError::JsonParse(_) => FailureKind::Internal(e.to_string()),
    }
}

fn media_outcome<T>(result: MediaResult<T>) -> Outcome<T> {
    match result {
        Ok(value) => Outcome::Success(value),
        Err(e) => Outcome::failure(media_failure(&e)),
    }
}

/// Discovery over a channel's recent uploads via yt-dlp.
pub struct ChannelDiscovery {
    channel_url: String,
    timeout_secs: u64,
}

impl ChannelDiscovery {
    pub fn new(channel_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            channel_url: channel_url.into(),
            timeout_secs,
        }
    }
}

#[async_trait]
impl Discovery for ChannelDiscovery {
    async fn list_candidate_sources(&self, limit: usize) -> Outcome<Vec<SourceVideo>> {
        let probes = match clipcast_media::list_channel_uploads(
            &self.channel_url,
            limit as u32,
            self.timeout_secs,
        )
        .await
        {
            Ok(probes) => probes,
            Err(e) => return Outcome::failure(media_failure(&e)),
        };

        let mut sources = Vec::with_capacity(probes.len());
        for probe in probes {
            let url = probe
                .webpage_url
                .clone()
                .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", probe.id));
            // Flat playlist entries usually omit duration; probe those
            // individually and drop the ones that still fail.
            let probe = if probe.duration.is_some() {
                probe
            } else {
                match clipcast_media::fetch_video_metadata(&url, self.timeout_secs).await {
                    Ok(full) => full,
                    Err(e) => {
                        warn!(video_id = %probe.id, error = %e, "skipping unprobeable upload");
                        continue;
                    }
                }
            };
            sources.push(SourceVideo::new(
                probe.id.clone(),
                url,
                probe.title.clone(),
                probe.channel.clone().unwrap_or_default(),
                probe.duration.unwrap_or(0.0),
            ));
        }
        Outcome::Success(sources)
    }
}

/// Download via yt-dlp, publish via the HTTP upload endpoint.
pub struct WorkerTransport {
    timeout_secs: u64,
    http: reqwest::Client,
    publish_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    id: String,
}

impl WorkerTransport {
    pub fn new(
        publish_url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            timeout_secs,
            http,
            publish_url: publish_url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl Transport for WorkerTransport {
    async fn download(&self, source: &SourceVideo, dest: &Path) -> Outcome<PathBuf> {
        let path =
            match clipcast_media::download_video(&source.url, dest, self.timeout_secs).await {
                Ok(path) => path,
                Err(e) => return Outcome::failure(media_failure(&e)),
            };
        // yt-dlp can exit zero with a truncated file; the artifact must be
        // probeable before any stage depends on it.
        match clipcast_media::probe_duration(&path, self.timeout_secs).await {
            Ok(_) => Outcome::Success(path),
            Err(e) => Outcome::failure(media_failure(&e)),
        }
    }

    async fn publish(
        &self,
        artifact: &Path,
        metadata: &PublishMetadata,
        destination: Destination,
    ) -> Outcome<String> {
        let bytes = match tokio::fs::read(artifact).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Outcome::Fatal(FailureKind::MissingAsset);
            }
            Err(e) => return Outcome::Fatal(FailureKind::Internal(e.to_string())),
        };
        let file_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.mp4".to_string());
        let part = match reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("video/mp4")
        {
            Ok(part) => part,
            Err(e) => return Outcome::Fatal(FailureKind::Internal(e.to_string())),
        };
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("title", metadata.title.clone())
            .text("description", metadata.description.clone())
            .text("tags", metadata.tags.join(","))
            .text("destination", destination.to_string());

        let mut request = self
            .http
            .post(format!("{}/v1/videos", self.publish_url))
            .multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Outcome::Retryable(FailureKind::Timeout),
            Err(_) => return Outcome::Retryable(FailureKind::Network),
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<PublishResponse>().await {
                Ok(body) => Outcome::Success(body.id),
                Err(e) => Outcome::Fatal(FailureKind::Internal(e.to_string())),
            };
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Outcome::Retryable(FailureKind::RateLimited { retry_after_secs });
        }
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Outcome::Fatal(FailureKind::Unauthorized)
            }
            s if s.is_client_error() => Outcome::Fatal(FailureKind::InvalidInput),
            _ => Outcome::Retryable(FailureKind::Network),
        }
    }
}

/// FFmpeg-backed transforms.
pub struct FfmpegTransform {
    timeout_secs: u64,
}

impl FfmpegTransform {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

#[async_trait]
impl MediaTransform for FfmpegTransform {
    async fn apply_branding(
        &self,
        input: &Path,
        output: &Path,
        overlay: &OverlayConfig,
    ) -> Outcome<PathBuf> {
        media_outcome(clipcast_media::apply_branding(input, output, overlay, self.timeout_secs).await)
    }

    async fn extract_clip(
        &self,
        input: &Path,
        output: &Path,
        candidate: &ClipCandidate,
        aspect: AspectPolicy,
    ) -> Outcome<PathBuf> {
        media_outcome(
            clipcast_media::extract_clip(
                input,
                output,
                candidate.start_secs,
                candidate.duration_secs(),
                aspect,
                self.timeout_secs,
            )
            .await,
        )
    }

    async fn burn_subtitles(
        &self,
        input: &Path,
        output: &Path,
        segments: &[SubtitleSegment],
    ) -> Outcome<PathBuf> {
        media_outcome(
            clipcast_media::burn_subtitles(input, output, segments, self.timeout_secs).await,
        )
    }
}

/// Content intelligence via the HTTP service client.
pub struct IntelBridge {
    client: IntelClient,
}

impl IntelBridge {
    pub fn new(client: IntelClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentIntelligence for IntelBridge {
    async fn detect_highlights(
        &self,
        source: &SourceVideo,
        policy: &HighlightPolicy,
    ) -> Outcome<Vec<ClipCandidate>> {
        let request = HighlightRequest {
            source_id: source.id.to_string(),
            title: source.title.clone(),
            duration_secs: source.duration_secs,
            min_clip_secs: policy.min_clip_secs,
            max_clip_secs: policy.max_clip_secs,
            max_clips: policy.max_clips as usize,
        };
        match self.client.detect_highlights(&request).await {
            Ok(segments) => Outcome::Success(
                segments
                    .into_iter()
                    .enumerate()
                    .map(|(i, s)| ClipCandidate::new(i as u32, s.start_secs, s.end_secs, s.score))
                    .collect(),
            ),
            Err(e) => Outcome::failure(e.to_failure_kind()),
        }
    }

    async fn transcribe(
        &self,
        source: &SourceVideo,
        candidate: &ClipCandidate,
    ) -> Outcome<Vec<SubtitleSegment>> {
        let request = TranscriptRequest {
            source_id: source.id.to_string(),
            clip_start_secs: candidate.start_secs,
            clip_end_secs: candidate.end_secs,
        };
        match self.client.transcribe(&request).await {
            Ok(cues) => Outcome::Success(
                cues.into_iter()
                    .map(|c| SubtitleSegment {
                        start_secs: c.start_secs,
                        end_secs: c.end_secs,
                        text: c.text,
                    })
                    .collect(),
            ),
            Err(e) => Outcome::failure(e.to_failure_kind()),
        }
    }

    async fn generate_metadata(
        &self,
        source: &SourceVideo,
        candidate: &ClipCandidate,
    ) -> Outcome<PublishMetadata> {
        let request = MetadataRequest {
            source_id: source.id.to_string(),
            source_title: source.title.clone(),
            channel: source.channel.clone(),
            clip_start_secs: candidate.start_secs,
            clip_end_secs: candidate.end_secs,
        };
        match self.client.generate_metadata(&request).await {
            Ok(body) => Outcome::Success(PublishMetadata {
                title: body.title,
                description: body.description,
                tags: body.tags,
            }),
            Err(e) => Outcome::failure(e.to_failure_kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_media_failure_classification() {
        assert_eq!(media_failure(&MediaError::Timeout(60)), FailureKind::Timeout);
        assert_eq!(
            media_failure(&MediaError::DownloadFailed(
                "HTTP Error 429: Too Many Requests".into()
            )),
            FailureKind::Network
        );
        assert_eq!(
            media_failure(&MediaError::DownloadFailed("Video unavailable".into())),
            FailureKind::UnsupportedMedia
        );
        assert_eq!(
            media_failure(&MediaError::FileNotFound("/tmp/gone.mp4".into())),
            FailureKind::MissingAsset
        );
        assert_eq!(
            media_failure(&MediaError::command_failed(
                "ffmpeg",
                "Invalid data found when processing input",
                Some(1)
            )),
            FailureKind::UnsupportedMedia
        );
        assert!(matches!(
            media_failure(&MediaError::FfmpegNotFound),
            FailureKind::Internal(_)
        ));
    }

    fn sample_metadata() -> PublishMetadata {
        PublishMetadata {
            title: "A clip".into(),
            description: "desc".into(),
            tags: vec!["shorts".into()],
        }
    }

    #[tokio::test]
    async fn test_publish_success_returns_remote_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "yt-42" })),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("clip.mp4");
        tokio::fs::write(&artifact, b"clip").await.unwrap();

        let transport = WorkerTransport::new(server.uri(), Some("key".into()), 5).unwrap();
        let outcome = transport
            .publish(&artifact, &sample_metadata(), Destination::Shorts)
            .await;
        match outcome {
            Outcome::Success(id) => assert_eq!(id, "yt-42"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_rate_limit_is_retryable_with_hint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("clip.mp4");
        tokio::fs::write(&artifact, b"clip").await.unwrap();

        let transport = WorkerTransport::new(server.uri(), None, 5).unwrap();
        let outcome = transport
            .publish(&artifact, &sample_metadata(), Destination::Shorts)
            .await;
        assert!(matches!(
            outcome,
            Outcome::Retryable(FailureKind::RateLimited {
                retry_after_secs: Some(30)
            })
        ));
    }

    #[tokio::test]
    async fn test_publish_missing_artifact_is_fatal() {
        let transport = WorkerTransport::new("http://localhost:9", None, 5).unwrap();
        let outcome = transport
            .publish(
                Path::new("/nonexistent/clip.mp4"),
                &sample_metadata(),
                Destination::Shorts,
            )
            .await;
        assert!(matches!(outcome, Outcome::Fatal(FailureKind::MissingAsset)));
    }
}
