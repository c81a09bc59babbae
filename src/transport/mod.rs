pub mod http;
pub mod mock;

use async_trait::async_trait;

use crate::envelope;
use crate::error::Result;
use crate::signing::SignedRequest;

pub use http::ReqwestTransport;
pub use mock::MockTransport;

/// What came back from one GET.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// A 200 response with a JSON body.
    pub fn json(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: Some("application/json; charset=utf-8".to_string()),
            body: body.into(),
        }
    }

    /// A 200 response with a plain-text body.
    pub fn text(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: Some("text/plain; charset=utf-8".to_string()),
            body: body.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn declares_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(envelope::is_json_content_type)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The HTTP collaborator. One call, one GET; no retries.
///
/// A transport is owned by the client and closed explicitly. Calls made
/// after [`close`](Transport::close) fail with `ClientError::Closed`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &SignedRequest) -> Result<RawResponse>;

    async fn close(&self) {}
}
