//! The request executor.
//!
//! [`CloudStack::execute`] is the single operation: inject the fixed
//! parameters, sign, send, unwrap, then follow async jobs and list pages
//! until there is a final answer. Each call is strictly sequential; calls
//! share nothing but the transport, so many may run at once.

pub mod jobs;
pub mod pages;

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::consts::{JOB_QUERY_COMMAND, LIST_MARKER};
use crate::envelope;
use crate::error::{ClientError, Result};
use crate::signing::{ParameterSet, SignedRequest};
use crate::transport::{ReqwestTransport, Transport};

/// A CloudStack API client over an owned transport.
pub struct CloudStack {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

impl CloudStack {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Build a client over a fresh reqwest connection pool.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        Ok(Self::new(config, Arc::new(ReqwestTransport::new()?)))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run `command` with `params` and return its final payload.
    pub async fn execute(&self, command: &str, params: ParameterSet) -> Result<Value> {
        self.execute_with_cancel(command, params, &CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), aborting with `ClientError::Cancelled`
    /// once `cancel` fires. Checked at every HTTP round trip, poll wait and
    /// page boundary.
    pub async fn execute_with_cancel(
        &self,
        command: &str,
        params: ParameterSet,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let mut params = params;
        params.insert("command".to_string(), command.to_string());
        self.inject_fixed(&mut params);

        let lowered = command.to_lowercase();
        let await_job = !lowered.contains(&JOB_QUERY_COMMAND.to_lowercase());

        if !lowered.contains(LIST_MARKER) {
            return self.round_trip(params, await_job, cancel).await;
        }

        params.insert("pagesize".to_string(), self.config.page_size.to_string());
        let this = self;
        let base = &params;
        pages::paginate(
            move |page| {
                let mut params = base.clone();
                params.insert("page".to_string(), page.to_string());
                this.round_trip(params, await_job, cancel)
            },
            self.config.page_size,
            cancel,
        )
        .await
    }

    /// Close the transport. Dropping the client releases it too; this makes
    /// the release explicit and immediate.
    pub async fn close(self) {
        self.transport.close().await;
    }

    fn inject_fixed(&self, params: &mut ParameterSet) {
        params.insert("apikey".to_string(), self.config.api_key.clone());
        params.insert("response".to_string(), "json".to_string());
    }

    /// One request, followed through its async job when `await_job` is set.
    async fn round_trip(
        &self,
        params: ParameterSet,
        await_job: bool,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let payload = self.send(params, cancel).await?;
        if !await_job {
            return Ok(payload);
        }
        let this = self;
        jobs::resolve(
            payload,
            move |job_id| this.query_job(job_id, cancel),
            &self.config.poll,
            cancel,
        )
        .await
    }

    async fn query_job(&self, job_id: String, cancel: &CancellationToken) -> Result<Value> {
        let mut params = ParameterSet::new();
        params.insert("command".to_string(), JOB_QUERY_COMMAND.to_string());
        params.insert("jobid".to_string(), job_id);
        self.inject_fixed(&mut params);
        self.send(params, cancel).await
    }

    /// Sign, send and unwrap a single request.
    async fn send(&self, params: ParameterSet, cancel: &CancellationToken) -> Result<Value> {
        let request = SignedRequest::new(
            &self.config.endpoint,
            params,
            self.config.secret.as_bytes(),
        );
        debug!(
            command = request.command().unwrap_or_default(),
            page = request.params.get("page").map(String::as_str),
            jobid = request.params.get("jobid").map(String::as_str),
            "executing request"
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            response = self.transport.get(&request) => response?,
        };

        let payload = envelope::parse(&response.body, response.declares_json())?;
        if !response.is_success() {
            let code = payload
                .get("errorcode")
                .and_then(Value::as_i64)
                .or(Some(i64::from(response.status)));
            let text = payload
                .get("errortext")
                .and_then(Value::as_str)
                .map(str::to_string);
            warn!(status = response.status, ?code, ?text, "api call failed");
            return Err(ClientError::Api {
                status: response.status,
                code,
                text,
            });
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, RawResponse};
    use std::time::Duration;

    fn client(transport: Arc<MockTransport>) -> CloudStack {
        let config = ClientConfig::new("http://localhost:8080/compute", "Test", "Test")
            .with_poll_interval(Duration::ZERO);
        CloudStack::new(config, transport)
    }

    #[tokio::test]
    async fn injects_fixed_parameters_and_signs() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(RawResponse::json(r#"{"helloresponse": {"text": "Hello, world"}}"#))
        }));
        let cs = client(transport.clone());

        cs.execute("hello", ParameterSet::new()).await.unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent["command"], "hello");
        assert_eq!(sent["apikey"], "Test");
        assert_eq!(sent["response"], "json");
        assert!(sent.contains_key("signature"));
        assert!(!sent.contains_key("page"));
        assert!(!sent.contains_key("pagesize"));
    }

    #[tokio::test]
    async fn list_commands_get_page_parameters() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(RawResponse::json(r#"{"listzonesresponse": {}}"#))
        }));
        let cs = client(transport.clone());

        cs.execute("listZones", ParameterSet::new()).await.unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent["pagesize"], "500");
        assert_eq!(sent["page"], "1");
    }

    #[tokio::test]
    async fn job_query_command_is_not_followed() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(RawResponse::json(
                r#"{"queryasyncjobresultresponse": {"jobid": "1", "jobstatus": 0}}"#,
            ))
        }));
        let cs = client(transport.clone());

        let mut params = ParameterSet::new();
        params.insert("jobid".to_string(), "1".to_string());
        let payload = cs.execute("queryAsyncJobResult", params).await.unwrap();

        assert_eq!(payload["jobstatus"], 0);
        assert_eq!(transport.requests().len(), 1);
    }
}
