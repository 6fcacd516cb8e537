use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use precis_core::{BackendError, InferenceBackend};

/// Pre-programmed responses for deterministic testing without a model.
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Return this text.
    Text(String),
    /// Fail with this error.
    Error(BackendError),
    /// Wait a duration, then resolve the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

type Responder = Box<dyn Fn(usize, &str) -> MockResponse + Send + Sync>;

enum Script {
    Queue(Mutex<VecDeque<MockResponse>>),
    Func(Responder),
}

/// Backend that answers from a queue or a closure and records every prompt.
pub struct MockBackend {
    script: Script,
    prompts: Mutex<Vec<String>>,
    output_limits: Mutex<Vec<u32>>,
    call_count: AtomicUsize,
}

impl MockBackend {
    /// Answer calls with `responses` in order; calls past the end fail.
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self::with_script(Script::Queue(Mutex::new(responses.into())))
    }

    /// Answer each call with `f(call_index, prompt)`.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(usize, &str) -> MockResponse + Send + Sync + 'static,
    {
        Self::with_script(Script::Func(Box::new(f)))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
            output_limits: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// The `max_output_tokens` passed with each call.
    pub fn output_limits(&self) -> Vec<u32> {
        self.output_limits.lock().clone()
    }
}

#[async_trait]
impl InferenceBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn invoke(&self, prompt: &str, max_output_tokens: u32) -> Result<String, BackendError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.prompts.lock().push(prompt.to_string());
        self.output_limits.lock().push(max_output_tokens);

        let response = match &self.script {
            Script::Queue(queue) => queue.lock().pop_front().ok_or_else(|| {
                BackendError::InvalidRequest(format!(
                    "MockBackend: no response configured for call {idx}"
                ))
            })?,
            Script::Func(f) => f(idx, prompt),
        };

        resolve_response(response).await
    }
}

/// Resolve a MockResponse, unrolling nested delays iteratively.
async fn resolve_response(mut current: MockResponse) -> Result<String, BackendError> {
    loop {
        match current {
            MockResponse::Text(text) => return Ok(text),
            MockResponse::Error(e) => return Err(e),
            MockResponse::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                current = *inner;
            }
        }
    }
}
