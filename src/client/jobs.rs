//! Async job completion.
//!
//! A command that runs asynchronously answers with only a `jobid`. The real
//! result is fetched by polling `queryAsyncJobResult` until `jobstatus`
//! leaves 0.

use std::future::Future;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PollPolicy;
use crate::error::{AsyncJobError, ClientError, Result};

/// Follow `initial` to its final payload.
///
/// Without a `jobid` the payload is already final and comes back unchanged.
/// `poll` issues one job status request and returns the unwrapped payload.
pub async fn resolve<F, Fut>(
    initial: Value,
    mut poll: F,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<Value>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let Some(job_id) = job_id(&initial) else {
        return Ok(initial);
    };

    // At least one poll, so a job that already finished is always seen.
    let max_attempts = policy.max_attempts.map(|max| max.max(1));
    let mut attempts: u32 = 0;
    loop {
        if let Some(max) = max_attempts
            && attempts >= max
        {
            warn!(%job_id, attempts, "async job still pending, giving up");
            return Err(ClientError::Timeout { job_id, attempts });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            _ = tokio::time::sleep(policy.interval) => {}
        }

        attempts += 1;
        debug!(%job_id, attempt = attempts, "polling async job");
        let status = poll(job_id.clone()).await?;

        match status.get("jobstatus").and_then(Value::as_i64) {
            Some(0) => continue,
            Some(_) => return finish(status),
            None => return Err(ClientError::MalformedJob(status)),
        }
    }
}

/// Turn a terminal job status into the job result or an error.
fn finish(mut status: Value) -> Result<Value> {
    let succeeded = status.get("jobresultcode").and_then(Value::as_i64) == Some(0);
    if succeeded && let Some(result) = status.get_mut("jobresult").map(Value::take) {
        return Ok(result);
    }

    let err = AsyncJobError {
        code: lookup(&status, "errorcode", Value::as_i64),
        text: lookup(&status, "errortext", |v| v.as_str().map(str::to_string)),
    };
    warn!(code = ?err.code, text = ?err.text, "async job failed");
    Err(err.into())
}

/// Read `key` from the status, or from inside `jobresult` where failed jobs
/// usually carry it.
fn lookup<T>(status: &Value, key: &str, read: impl Fn(&Value) -> Option<T>) -> Option<T> {
    status
        .get(key)
        .and_then(&read)
        .or_else(|| status.get("jobresult")?.get(key).and_then(&read))
}

fn job_id(payload: &Value) -> Option<String> {
    match payload.get("jobid")? {
        Value::String(id) => Some(id.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
