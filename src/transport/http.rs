use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::RwLock;
use tracing::debug;

use super::{RawResponse, Transport};
use crate::error::{ClientError, Result};
use crate::signing::SignedRequest;

/// Transport over a pooled `reqwest::Client`.
///
/// Closing drops the pool handle. Requests already in flight hold their own
/// handle and finish normally.
pub struct ReqwestTransport {
    client: RwLock<Option<reqwest::Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(ClientError::transport)?;
        Ok(Self::with_client(client))
    }

    /// Wrap an already configured client (proxies, TLS roots, timeouts).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: RwLock::new(Some(client)),
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.client.read().await.is_none()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: &SignedRequest) -> Result<RawResponse> {
        let client = self.client.read().await.clone().ok_or(ClientError::Closed)?;

        debug!(
            endpoint = %request.endpoint,
            command = request.command().unwrap_or_default(),
            "sending GET"
        );
        let resp = client
            .get(request.url())
            .send()
            .await
            .map_err(ClientError::transport)?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await.map_err(ClientError::transport)?.to_vec();
        debug!(status, bytes = body.len(), "received response");

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }

    async fn close(&self) {
        self.client.write().await.take();
    }
}
