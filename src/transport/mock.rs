use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{RawResponse, Transport};
use crate::error::{ClientError, Result};
use crate::signing::{ParameterSet, SignedRequest};

type Responder = dyn Fn(&ParameterSet) -> Result<RawResponse> + Send + Sync;

/// A scripted transport for tests. Answers each request with a responder
/// closure and records every signed parameter set it was sent.
pub struct MockTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<ParameterSet>>,
    closed: AtomicBool,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ParameterSet) -> Result<RawResponse> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<ParameterSet> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many requests ran `command`.
    pub fn count(&self, command: &str) -> usize {
        self.requests()
            .iter()
            .filter(|p| p.get("command").is_some_and(|c| c == command))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, request: &SignedRequest) -> Result<RawResponse> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.params.clone());
        (self.responder)(&request.params)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
