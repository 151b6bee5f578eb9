use std::time::Duration;

use reqwest::{Response, StatusCode};
use tracing::{debug, instrument};

use crate::error::{IntelError, IntelResult};
use crate::types::{
    HighlightRequest, HighlightResponse, HighlightSegment, MetadataRequest, MetadataResponse,
    TranscriptCue, TranscriptRequest, TranscriptResponse,
};

/// Configuration for the intelligence client.
#[derive(Debug, Clone)]
pub struct IntelClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for IntelClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl IntelClientConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("INTEL_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            api_key: std::env::var("INTEL_SERVICE_API_KEY").ok(),
            timeout_secs: std::env::var("INTEL_SERVICE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(120),
        }
    }
}

/// HTTP client for the content-intelligence service.
///
/// Each call is a single attempt; callers own retry scheduling.
#[derive(Debug, Clone)]
pub struct IntelClient {
    config: IntelClientConfig,
    http: reqwest::Client,
}

impl IntelClient {
    pub fn new(config: IntelClientConfig) -> IntelResult<Self> {
        if config.base_url.is_empty() {
            return Err(IntelError::Config("base_url must not be empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> IntelResult<Self> {
        Self::new(IntelClientConfig::from_env())
    }

    /// Detect highlight windows in a source video.
    #[instrument(skip(self, request), fields(source_id = %request.source_id))]
    pub async fn detect_highlights(
        &self,
        request: &HighlightRequest,
    ) -> IntelResult<Vec<HighlightSegment>> {
        let url = format!("{}/v1/highlights", self.config.base_url);
        let response = self.post_json(&url, request).await?;
        let body: HighlightResponse = response
            .json()
            .await
            .map_err(|e| IntelError::InvalidResponse(e.to_string()))?;
        debug!(segments = body.segments.len(), "highlight detection done");
        Ok(body.segments)
    }

    /// Draft publish metadata for one clip.
    #[instrument(skip(self, request), fields(source_id = %request.source_id))]
    pub async fn generate_metadata(
        &self,
        request: &MetadataRequest,
    ) -> IntelResult<MetadataResponse> {
        let url = format!("{}/v1/metadata", self.config.base_url);
        let response = self.post_json(&url, request).await?;
        response
            .json()
            .await
            .map_err(|e| IntelError::InvalidResponse(e.to_string()))
    }

    /// Transcribe a clip window of the source into subtitle cues.
    #[instrument(skip(self, request), fields(source_id = %request.source_id))]
    pub async fn transcribe(&self, request: &TranscriptRequest) -> IntelResult<Vec<TranscriptCue>> {
        let url = format!("{}/v1/transcripts", self.config.base_url);
        let response = self.post_json(&url, request).await?;
        let body: TranscriptResponse = response
            .json()
            .await
            .map_err(|e| IntelError::InvalidResponse(e.to_string()))?;
        debug!(cues = body.cues.len(), "transcription done");
        Ok(body.cues)
    }

    async fn post_json<B: serde::Serialize>(&self, url: &str, body: &B) -> IntelResult<Response> {
        let mut req = self.http.post(url).json(body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await?;
        Self::check_status(response).await
    }

    async fn check_status(response: Response) -> IntelResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Err(IntelError::RateLimited { retry_after_secs });
        }

        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(IntelError::Unauthorized(body)),
            s if s.is_client_error() => Err(IntelError::InvalidRequest(body)),
            s => Err(IntelError::Status {
                status: s.as_u16(),
                body,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipcast_models::FailureKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> IntelClient {
        IntelClient::new(IntelClientConfig {
            base_url: server.uri(),
            api_key: Some("test-key".into()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn highlight_request() -> HighlightRequest {
        HighlightRequest {
            source_id: "abc123".into(),
            title: "A stream".into(),
            duration_secs: 600.0,
            min_clip_secs: 15.0,
            max_clip_secs: 60.0,
            max_clips: 3,
        }
    }

    #[tokio::test]
    async fn test_detect_highlights_parses_segments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/highlights"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "segments": [
                    { "start_secs": 10.0, "end_secs": 40.0, "score": 0.9 },
                    { "start_secs": 100.0, "end_secs": 130.0, "score": 0.7 }
                ]
            })))
            .mount(&server)
            .await;

        let segments = client_for(&server)
            .detect_highlights(&highlight_request())
            .await
            .unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start_secs, 10.0);
        assert_eq!(segments[1].score, 0.7);
    }

    #[tokio::test]
    async fn test_rate_limit_maps_with_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/highlights"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "42"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .detect_highlights(&highlight_request())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_failure_kind(),
            FailureKind::RateLimited {
                retry_after_secs: Some(42)
            }
        );
    }

    #[tokio::test]
    async fn test_unauthorized_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/highlights"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .detect_highlights(&highlight_request())
            .await
            .unwrap_err();
        assert!(matches!(err, IntelError::Unauthorized(_)));
        assert!(!err.to_failure_kind().is_retryable());
    }

    #[tokio::test]
    async fn test_client_error_maps_to_invalid_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/highlights"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad window"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .detect_highlights(&highlight_request())
            .await
            .unwrap_err();
        assert_eq!(err.to_failure_kind(), FailureKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_transcribe_parses_cues() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transcripts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cues": [
                    { "start_secs": 0.0, "end_secs": 2.5, "text": "hello" }
                ]
            })))
            .mount(&server)
            .await;

        let cues = client_for(&server)
            .transcribe(&TranscriptRequest {
                source_id: "abc123".into(),
                clip_start_secs: 10.0,
                clip_end_secs: 40.0,
            })
            .await
            .unwrap();
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "hello");
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/metadata"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate_metadata(&MetadataRequest {
                source_id: "abc123".into(),
                source_title: "A stream".into(),
                channel: "chan".into(),
                clip_start_secs: 10.0,
                clip_end_secs: 40.0,
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_failure_kind(), FailureKind::Network);
        assert!(err.to_failure_kind().is_retryable());
    }
}
