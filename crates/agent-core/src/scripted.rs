//! Scripted Provider
//!
//! An [`LlmProvider`] that replays canned completions in order and records
//! every request it receives. Used for development and testing.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{Completion, CompletionRequest, LlmProvider, OutputSchema, ProviderCapabilities};

/// Snapshot of one request seen by the scripted provider
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub response_schema: Option<OutputSchema>,
}

/// Replays a fixed script of model responses
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Completion>>>,
    /// Returned once the script is exhausted
    fallback: Option<Completion>,
    requests: Mutex<Vec<RecordedRequest>>,
    capabilities: ProviderCapabilities,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(script: impl IntoIterator<Item = Completion>) -> Self {
        Self::with_results(script.into_iter().map(Ok))
    }

    /// Script that may contain transport failures
    pub fn with_results(script: impl IntoIterator<Item = Result<Completion>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            capabilities: ProviderCapabilities::default(),
            delay: None,
        }
    }

    /// Answer every request with the same completion
    pub fn repeating(completion: Completion) -> Self {
        let mut provider = Self::new([]);
        provider.fallback = Some(completion);
        provider
    }

    pub fn with_capabilities(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion> {
        self.requests
            .lock()
            .push(RecordedRequest {
                messages: request.messages.to_vec(),
                tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
                response_schema: request.response_schema.cloned(),
            });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().pop_front();
        match next {
            Some(result) => result,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| AgentError::ProviderUnavailable("script exhausted".into())),
        }
    }
}
