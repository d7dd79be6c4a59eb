use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{UpstreamConfig, UpstreamMode};
use crate::error::{AppError, AppResult};
use crate::wfs::KvpRequest;

/// What came back from the WFS behind the proxy
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[async_trait]
pub trait Upstream: Send + Sync {
    async fn forward_get(&self, request: &KvpRequest) -> AppResult<UpstreamResponse>;

    async fn forward_post(&self, body: String) -> AppResult<UpstreamResponse>;
}

pub fn from_config(config: &UpstreamConfig) -> AppResult<Arc<dyn Upstream>> {
    match config.mode {
        UpstreamMode::Http => Ok(Arc::new(HttpUpstream::new(config)?)),
        UpstreamMode::Echo => Ok(Arc::new(EchoUpstream)),
    }
}

/// Forwards rewritten requests to a real WFS
pub struct HttpUpstream {
    client: reqwest::Client,
    url: url::Url,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        let raw = config
            .url
            .as_deref()
            .ok_or_else(|| AppError::Config("upstream.url is not set".to_string()))?;
        let url = url::Url::parse(raw)
            .map_err(|e| AppError::Config(format!("Invalid upstream.url: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, url })
    }

    /// Upstream URL with the request's parameters appended to any it already has
    pub fn get_url(&self, request: &KvpRequest) -> url::Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().extend_pairs(request.params());
        url
    }

    async fn read_response(response: reqwest::Response) -> AppResult<UpstreamResponse> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.bytes().await?;

        if status >= 500 {
            tracing::warn!(status, "Upstream WFS returned a server error");
        }

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward_get(&self, request: &KvpRequest) -> AppResult<UpstreamResponse> {
        let url = self.get_url(request);
        tracing::debug!(host = ?url.host_str(), "Forwarding GET to upstream WFS");

        let response = self.client.get(url).send().await?;
        Self::read_response(response).await
    }

    async fn forward_post(&self, body: String) -> AppResult<UpstreamResponse> {
        tracing::debug!(bytes = body.len(), "Forwarding POST to upstream WFS");

        let response = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await?;
        Self::read_response(response).await
    }
}

/// Answers with the rewritten request instead of features, like the
/// development deployment does.
pub struct EchoUpstream;

impl EchoUpstream {
    fn text(body: String) -> UpstreamResponse {
        UpstreamResponse {
            status: 200,
            content_type: Some("text/plain; charset=utf-8".to_string()),
            body: Bytes::from(body),
        }
    }
}

#[async_trait]
impl Upstream for EchoUpstream {
    async fn forward_get(&self, request: &KvpRequest) -> AppResult<UpstreamResponse> {
        Ok(Self::text(request.to_echo()))
    }

    async fn forward_post(&self, body: String) -> AppResult<UpstreamResponse> {
        Ok(Self::text(format!("POSTDATA={}", body)))
    }
}
