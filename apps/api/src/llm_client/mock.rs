//! Scripted model gateway for tests. Never compiled into the binary.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{CompletionRequest, LlmError, ModelGateway};

type Responder = Box<dyn Fn(&RecordedCall) -> Result<String, LlmError> + Send + Sync>;

/// A call as the gateway saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
}

pub struct MockGateway {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl MockGateway {
    /// Replies with the queued results in order; an exhausted queue yields `EmptyContent`.
    pub fn scripted(responses: impl IntoIterator<Item = Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            responder: None,
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Replies by computing a result from each call.
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&RecordedCall) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responses: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(responder)),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleeps before answering each call, simulating a slow provider.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn invoke(&self, request: CompletionRequest<'_>) -> Result<String, LlmError> {
        let call = RecordedCall {
            system: request.system.map(str::to_owned),
            prompt: request.prompt.to_owned(),
            temperature: request.temperature,
        };
        self.calls.lock().unwrap().push(call.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.responder {
            Some(responder) => responder(&call),
            None => self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyContent)),
        }
    }
}
