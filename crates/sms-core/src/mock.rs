//! In-memory [`HttpTransport`] for tests: canned answers, recorded requests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{HttpRequest, HttpTransport, RawResponse, SmsError};

type Responder = dyn Fn(&HttpRequest) -> Result<RawResponse, SmsError> + Send + Sync;

#[derive(Clone, Default)]
pub struct MockTransport {
    queue: Arc<Mutex<VecDeque<Result<RawResponse, String>>>>,
    responder: Option<Arc<Responder>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request that has no queued response with `response`.
    pub fn always(response: RawResponse) -> Self {
        Self::responding(move |_| Ok(response.clone()))
    }

    /// Compute the answer from the request.
    pub fn responding<F>(responder: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<RawResponse, SmsError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(responder)),
            ..Self::default()
        }
    }

    /// Queue a response; queued responses are used first, in order.
    pub fn push(&self, response: RawResponse) -> &Self {
        lock(&self.queue).push_back(Ok(response));
        self
    }

    /// Queue a transport-level failure.
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        lock(&self.queue).push_back(Err(message.into()));
        self
    }

    /// Every request executed so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<RawResponse, SmsError> {
        lock(&self.requests).push(request.clone());
        if let Some(queued) = lock(&self.queue).pop_front() {
            return queued.map_err(SmsError::Transport);
        }
        match &self.responder {
            Some(responder) => responder(&request),
            None => Err(SmsError::Transport(format!(
                "no mock response for {}",
                request.url
            ))),
        }
    }
}
