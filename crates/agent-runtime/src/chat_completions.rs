//! Chat-Completions Provider
//!
//! Implementation of `LlmProvider` for OpenAI-compatible `/chat/completions`
//! endpoints with native tool calling and `json_schema` response format.
//! Mistral's API is the default; a local Ollama exposes the same surface
//! under `/v1`.

use std::collections::HashMap;
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{Completion, CompletionRequest, FinishReason, LlmProvider, OutputSchema, TokenUsage},
    tool::ToolCall,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Provider configuration
#[derive(Clone, Debug)]
pub struct ChatCompletionsConfig {
    /// Display name used in logs
    pub name: String,

    /// API base URL, without the `/chat/completions` suffix
    pub base_url: String,

    /// Bearer token (None for local servers)
    pub api_key: Option<String>,

    /// HTTP request timeout in seconds
    pub timeout_secs: u64,

    /// Whether the endpoint honours `response_format: json_schema`
    pub structured_output: bool,
}

impl Default for ChatCompletionsConfig {
    fn default() -> Self {
        Self {
            name: "Mistral".into(),
            base_url: "https://api.mistral.ai/v1".into(),
            api_key: None,
            timeout_secs: 120,
            structured_output: true,
        }
    }
}

impl ChatCompletionsConfig {
    /// Mistral La Plateforme
    pub fn mistral(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Local Ollama through its OpenAI-compatible endpoint
    pub fn ollama(host: impl Into<String>, port: u16) -> Self {
        Self {
            name: "Ollama".into(),
            base_url: format!("{}:{port}/v1", host.into().trim_end_matches('/')),
            api_key: None,
            timeout_secs: 300,
            structured_output: false,
        }
    }
}

/// OpenAI-compatible chat-completion provider
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    config: ChatCompletionsConfig,
}

impl ChatCompletionsProvider {
    /// Create from configuration
    pub fn from_config(config: ChatCompletionsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ChatCompletionsConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Build the wire request body
    fn build_body(&self, request: &CompletionRequest<'_>) -> ChatRequest {
        let tools: Vec<Value> = request.tools.iter().map(|t| t.to_function_declaration()).collect();
        let tool_choice = (!tools.is_empty()).then_some("auto");
        let response_format = request
            .response_schema
            .filter(|_| self.config.structured_output)
            .map(response_format);

        ChatRequest {
            model: request.options.model.clone(),
            messages: convert_messages(request.messages),
            tools,
            tool_choice,
            response_format,
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            top_p: request.options.top_p,
        }
    }

    fn map_transport_error(&self, err: &reqwest::Error) -> AgentError {
        if err.is_timeout() {
            AgentError::Timeout {
                stage: "http request",
                after: Duration::from_secs(self.config.timeout_secs),
            }
        } else if err.is_connect() {
            AgentError::ProviderUnavailable(format!("{}: {err}", self.config.name))
        } else {
            AgentError::Provider(err.to_string())
        }
    }
}

fn response_format(schema: &OutputSchema) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": schema.name,
            "schema": schema.schema,
            "strict": true,
        }
    })
}

fn status_error(status: StatusCode, body: String) -> AgentError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(body),
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(body),
        s if s.is_server_error() => AgentError::ProviderUnavailable(format!("{s}: {body}")),
        s => AgentError::Provider(format!("{s}: {body}")),
    }
}

/// Convert agent messages to the wire format
fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|m| {
            let tool_calls = (!m.tool_calls.is_empty()).then(|| {
                m.tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: Some(call.id.clone()),
                        kind: Some("function".into()),
                        function: WireFunction {
                            name: call.name.clone(),
                            arguments: Value::String(
                                serde_json::to_string(&call.arguments).unwrap_or_else(|_| "{}".into()),
                            ),
                        },
                    })
                    .collect()
            });
            WireMessage {
                role: m.role.to_string(),
                content: Some(m.content.clone()),
                tool_calls,
                tool_call_id: (m.role == Role::Tool).then(|| m.tool_call_id().map(str::to_string)).flatten(),
                name: (m.role == Role::Tool).then(|| m.name.clone()).flatten(),
            }
        })
        .collect()
}

/// Convert a wire response to an agent completion
fn convert_completion(response: ChatResponse, requested_model: &str) -> Result<Completion> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::Parse("response has no choices".into()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(WireToolCall::into_tool_call)
        .collect::<Result<Vec<_>>>()?;

    let finish_reason = choice.finish_reason.as_deref().map(|r| match r {
        "stop" => FinishReason::Stop,
        "length" | "model_length" => FinishReason::Length,
        "tool_calls" => FinishReason::ToolUse,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Error,
    });

    Ok(Completion {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        model: response.model.unwrap_or_else(|| requested_model.to_string()),
        usage: response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
        finish_reason,
    })
}

#[async_trait]
impl LlmProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn capabilities(&self) -> agent_core::provider::ProviderCapabilities {
        agent_core::provider::ProviderCapabilities {
            structured_output: self.config.structured_output,
        }
    }

    async fn health_check(&self) -> Result<bool> {
        let request = self.authorized(self.client.get(self.endpoint("models")));
        match request.send().await {
            Ok(resp) if resp.status().is_success() => Ok(true),
            Ok(resp) => {
                tracing::warn!(provider = %self.config.name, status = %resp.status(), "Health check failed");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(provider = %self.config.name, "Health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion> {
        let body = self.build_body(request);
        tracing::debug!(
            provider = %self.config.name,
            model = %body.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            structured = body.response_format.is_some(),
            "Sending chat completion"
        );

        let response = self
            .authorized(self.client.post(self.endpoint("chat/completions")))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(format!("failed to parse chat response: {e}")))?;

        if let Some(usage) = &data.usage {
            tracing::debug!(
                prompt = usage.prompt_tokens,
                completion = usage.completion_tokens,
                "Token usage"
            );
        }

        convert_completion(data, &request.options.model)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// JSON-encoded string on most servers; some send a bare object
    #[serde(default)]
    arguments: Value,
}

impl WireToolCall {
    fn into_tool_call(self) -> Result<ToolCall> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        match self.function.arguments {
            Value::String(raw) => ToolCall::from_json_arguments(id, self.function.name, &raw),
            Value::Null => Ok(ToolCall::new(id, self.function.name, HashMap::new())),
            Value::Object(map) => Ok(ToolCall::new(id, self.function.name, map.into_iter().collect())),
            other => Err(AgentError::ToolArguments {
                tool: self.function.name,
                message: format!("unexpected arguments value: {other}"),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
