//! Errors surfaced by the request pipeline.
//!
//! Every variant is terminal for the `execute` call that produced it.
//! Nothing in the pipeline retries.

use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// The server answered with something that is not JSON.
#[derive(Debug, Clone, Error)]
#[error("could not decode content, server did not return json content")]
pub struct DecodeError {
    /// Raw response text, kept for diagnostics.
    pub raw: String,
}

/// An async job finished without a usable result.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("async job failed (errorcode={code:?}, errortext={text:?})")]
pub struct AsyncJobError {
    pub code: Option<i64>,
    pub text: Option<String>,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    AsyncJob(#[from] AsyncJobError),

    /// Non-2xx response carrying a JSON error payload.
    #[error("api call failed with status {status} (errorcode={code:?}, errortext={text:?})")]
    Api {
        status: u16,
        code: Option<i64>,
        text: Option<String>,
    },

    #[error("async job {job_id} still pending after {attempts} polls")]
    Timeout { job_id: String, attempts: u32 },

    #[error("request cancelled")]
    Cancelled,

    #[error("transport is closed")]
    Closed,

    #[error("job status response has no usable jobstatus: {0}")]
    MalformedJob(Value),

    #[error("list response has an invalid count: {0}")]
    MalformedPage(Value),

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ClientError {
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Transport(err.into())
    }
}
