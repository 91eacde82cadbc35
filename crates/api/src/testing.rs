//! Test doubles for the transport seam

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bankrecon_common::{Backoff, RecordingSleeper};
use parking_lot::Mutex;

use crate::retry::HttpRetryPolicy;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

/// Replays queued responses in order and records every request
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.script.lock().push_back(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }));
        self
    }

    pub fn fail(self, error: TransportError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        self.requests.lock().push(request);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::other(format!("no scripted response for {url}"))))
    }
}

/// Retry policy that records sleeps instead of waiting
pub fn fast_policy(max_retries: u32) -> HttpRetryPolicy {
    HttpRetryPolicy::new(max_retries)
        .with_backoff(Backoff {
            factor: 2.0,
            max: 32.0,
            jitter: false,
        })
        .with_sleeper(Arc::new(RecordingSleeper::new()))
}
