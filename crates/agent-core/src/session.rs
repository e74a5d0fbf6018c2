//! Tool-Calling Session
//!
//! Drives one bounded conversation with the model:
//!
//! ```text
//! INIT ──► AWAITING_MODEL ──tool calls──► TOOL_ROUND ──┐
//!               ▲                                      │
//!               └──────────────────────────────────────┘
//!          AWAITING_MODEL ──plain answer──► FINALIZING ──► DONE
//!
//! any state ──unrecoverable──► FAILED
//! ```
//!
//! Tool rounds may repeat, but at most `max_tool_rounds` times. The final
//! answer is requested separately under a JSON schema and parsed into a
//! [`StructuredOutput`]. Every model call and tool call runs under a timeout.
//! Dropping the future returned by [`ToolCallingSession::run`] abandons the
//! whole session; no partial output is ever produced.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::provider::{Completion, CompletionRequest, GenerationOptions, LlmProvider, OutputSchema};
use crate::tool::{ToolCall, ToolName, ToolRegistry, ToolResult};

/// Instruction appended before the structured final request
pub const FINALIZE_INSTRUCTION: &str = "Return ONLY a JSON object matching the schema.";

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Final answer contract: a JSON schema plus semantic checks serde cannot express
pub trait StructuredOutput: DeserializeOwned + Send {
    /// Schema handed to the model for the final request
    fn output_schema() -> OutputSchema;

    /// Bounds and enum checks on a parsed value
    fn validate(&self) -> std::result::Result<(), String>;
}

/// Session limits and generation settings
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Maximum tool rounds before the session fails
    pub max_tool_rounds: usize,

    /// Budget for each model request
    pub model_timeout: Duration,

    /// Budget for each tool handler invocation
    pub tool_timeout: Duration,

    /// Generation options
    pub generation: GenerationOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 8,
            model_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
            generation: GenerationOptions::default(),
        }
    }
}

/// Observable protocol state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Init,
    AwaitingModel,
    ToolRound,
    Finalizing,
    Done,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }
}

/// Successful session result
#[derive(Clone, Debug)]
pub struct SessionOutcome<D> {
    pub id: SessionId,

    /// Validated final answer
    pub output: D,

    /// Full exchange, including tool results and the final answer
    pub conversation: Conversation,

    /// Tool rounds the model used
    pub tool_rounds: usize,
}

/// Work carried between states
enum Step {
    AwaitingModel,
    ToolRound(Vec<ToolCall>),
    Finalizing,
    Done(String),
}

/// One tool-calling conversation with the model
pub struct ToolCallingSession<'a, K: ToolName> {
    id: SessionId,
    provider: &'a dyn LlmProvider,
    tools: &'a ToolRegistry<K>,
    config: &'a SessionConfig,
    conversation: Conversation,
    state: SessionState,
    tool_rounds: usize,
}

impl<'a, K: ToolName> ToolCallingSession<'a, K> {
    pub fn new(provider: &'a dyn LlmProvider, tools: &'a ToolRegistry<K>, config: &'a SessionConfig) -> Self {
        Self {
            id: SessionId::new(),
            provider,
            tools,
            config,
            conversation: Conversation::new(),
            state: SessionState::Init,
            tool_rounds: 0,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Conversation so far (also available after a failure)
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn tool_rounds(&self) -> usize {
        self.tool_rounds
    }

    /// Run the session to a terminal state
    pub async fn run<D: StructuredOutput>(
        &mut self,
        system_prompt: &str,
        user_payload: &Value,
    ) -> Result<SessionOutcome<D>> {
        if self.state != SessionState::Init {
            return Err(AgentError::Config(format!("session {} already ran", self.id)));
        }

        match self.drive::<D>(system_prompt, user_payload).await {
            Ok(output) => {
                self.enter(SessionState::Done);
                tracing::info!(session = %self.id, tool_rounds = self.tool_rounds, "Session completed");
                Ok(SessionOutcome {
                    id: self.id.clone(),
                    output,
                    conversation: self.conversation.clone(),
                    tool_rounds: self.tool_rounds,
                })
            }
            Err(err) => {
                self.enter(SessionState::Failed);
                tracing::warn!(session = %self.id, error = %err, "Session failed");
                Err(err)
            }
        }
    }

    async fn drive<D: StructuredOutput>(&mut self, system_prompt: &str, user_payload: &Value) -> Result<D> {
        self.conversation = Conversation::with_system_prompt(system_prompt);
        self.conversation.push(Message::user(user_payload.to_string()));

        let declarations = self.tools.schemas();
        let schema = D::output_schema();
        let mut step = Step::AwaitingModel;

        loop {
            step = match step {
                Step::AwaitingModel => {
                    self.enter(SessionState::AwaitingModel);
                    let request = CompletionRequest::new(self.conversation.messages(), &self.config.generation)
                        .with_tools(&declarations);
                    let completion = self.call_model(&request, "model round").await?;
                    self.absorb_turn(completion)?
                }
                Step::ToolRound(calls) => {
                    self.enter(SessionState::ToolRound);
                    for call in &calls {
                        let result = self.run_tool(call).await?;
                        self.conversation.push(Message::tool(result.output, result.name, result.id));
                    }
                    Step::AwaitingModel
                }
                Step::Finalizing => {
                    self.enter(SessionState::Finalizing);
                    let content = self.request_final_answer(&schema).await?;
                    Step::Done(content)
                }
                Step::Done(content) => return parse_structured::<D>(&content),
            };
        }
    }

    /// Record the model's turn and pick the next state
    fn absorb_turn(&mut self, completion: Completion) -> Result<Step> {
        if !completion.requests_tools() {
            self.conversation.push(Message::assistant(completion.content).with_model(completion.model));
            return Ok(Step::Finalizing);
        }

        self.tool_rounds += 1;
        if self.tool_rounds > self.config.max_tool_rounds {
            tracing::warn!(
                session = %self.id,
                max = self.config.max_tool_rounds,
                "Model kept requesting tools past the round cap"
            );
            return Err(AgentError::ToolLoopExceeded(self.config.max_tool_rounds));
        }

        tracing::debug!(
            session = %self.id,
            round = self.tool_rounds,
            calls = completion.tool_calls.len(),
            "Model requested tools"
        );
        let calls = completion.tool_calls;
        self.conversation
            .push(Message::assistant_tool_calls(completion.content, calls.clone()).with_model(completion.model));
        Ok(Step::ToolRound(calls))
    }

    async fn request_final_answer(&mut self, schema: &OutputSchema) -> Result<String> {
        let structured = self.provider.capabilities().structured_output;
        let instruction = if structured {
            FINALIZE_INSTRUCTION.to_string()
        } else {
            format!("{FINALIZE_INSTRUCTION}\n\nJSON schema:\n{}", schema.schema)
        };
        self.conversation.push(Message::user(instruction));

        let mut request = CompletionRequest::new(self.conversation.messages(), &self.config.generation);
        if structured {
            request = request.with_response_schema(schema);
        }
        tracing::debug!(
            session = %self.id,
            estimated_tokens = self.conversation.estimate_tokens(),
            structured,
            "Requesting final answer"
        );
        let completion = self.call_model(&request, "finalizing").await?;

        if completion.content.trim().is_empty() {
            return Err(AgentError::EmptyResponse("finalizing"));
        }
        self.conversation
            .push(Message::assistant(completion.content.clone()).with_model(completion.model));
        Ok(completion.content)
    }

    async fn call_model(&self, request: &CompletionRequest<'_>, stage: &'static str) -> Result<Completion> {
        let budget = self.config.model_timeout;
        timeout(budget, self.provider.complete(request))
            .await
            .map_err(|_| AgentError::Timeout { stage, after: budget })?
    }

    async fn run_tool(&self, call: &ToolCall) -> Result<ToolResult> {
        let (kind, tool) = self.tools.resolve(&call.name).inspect_err(|_| {
            tracing::warn!(session = %self.id, tool = %call.name, "Model requested an undeclared tool");
        })?;
        tool.validate(call)?;

        tracing::debug!(session = %self.id, tool = kind.as_str(), call_id = %call.id, "Executing tool");
        let budget = self.config.tool_timeout;
        let mut result = timeout(budget, tool.execute(call))
            .await
            .map_err(|_| AgentError::Timeout { stage: "tool call", after: budget })??;

        result.name = kind.as_str().to_string();
        result.id.clone_from(&call.id);
        Ok(result)
    }

    fn enter(&mut self, next: SessionState) {
        tracing::debug!(session = %self.id, from = ?self.state, to = ?next, "Session transition");
        self.state = next;
    }
}

/// Parse the final answer, tolerating a surrounding Markdown code fence
pub fn parse_structured<D: StructuredOutput>(content: &str) -> Result<D> {
    let body = strip_code_fence(content);
    let output: D = serde_json::from_str(body).map_err(|e| AgentError::SchemaValidation(e.to_string()))?;
    output.validate().map_err(AgentError::SchemaValidation)?;
    Ok(output)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.trim_end().strip_suffix("```").map_or(trimmed, str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderCapabilities;
    use crate::scripted::ScriptedProvider;
    use crate::message::Role;
    use crate::tool::{ParameterSchema, Tool, ToolSchema};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    enum TestTool {
        PriceHistory,
    }

    impl ToolName for TestTool {
        const ALL: &'static [Self] = &[TestTool::PriceHistory];

        fn as_str(self) -> &'static str {
            "get_price_history"
        }
    }

    struct CountingTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "get_price_history".into(),
                description: "Fetch prices".into(),
                parameters: vec![ParameterSchema::string("ticker", "Symbol", true)],
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let ticker = call.required_str("ticker")?;
            Ok(ToolResult::new("get_price_history", call.id.clone(), json!({"ticker": ticker}).to_string()))
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Verdict {
        action: String,
        target_weight: f64,
    }

    impl StructuredOutput for Verdict {
        fn output_schema() -> OutputSchema {
            OutputSchema {
                name: "verdict".into(),
                schema: json!({"type": "object"}),
            }
        }

        fn validate(&self) -> std::result::Result<(), String> {
            if !["BUY", "SELL", "HOLD"].contains(&self.action.as_str()) {
                return Err(format!("bad action {}", self.action));
            }
            if !(0.0..=1.0).contains(&self.target_weight) {
                return Err("target_weight out of range".into());
            }
            Ok(())
        }
    }

    fn registry() -> (ToolRegistry<TestTool>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ToolRegistry::builder()
            .register(TestTool::PriceHistory, CountingTool { calls: calls.clone() })
            .build()
            .unwrap();
        (registry, calls)
    }

    fn price_call(id: &str, name: &str) -> ToolCall {
        let args = json!({"ticker": "AAPL", "period": "6mo", "interval": "1d"});
        ToolCall::new(id, name, serde_json::from_value(args).unwrap())
    }

    const HOLD: &str = r#"{"action":"HOLD","target_weight":0.1}"#;

    #[tokio::test]
    async fn test_single_tool_round_reaches_done() {
        let provider = ScriptedProvider::new([
            Completion::tools(vec![price_call("call_1", "get_price_history")]),
            Completion::text("Momentum is flat."),
            Completion::text(HOLD),
        ]);
        let (tools, calls) = registry();
        let config = SessionConfig::default();
        let mut session = ToolCallingSession::new(&provider, &tools, &config);

        let outcome = session
            .run::<Verdict>("system", &json!({"ticker": "AAPL"}))
            .await
            .unwrap();

        assert_eq!(session.state(), SessionState::Done);
        assert_eq!(outcome.output, Verdict { action: "HOLD".into(), target_weight: 0.1 });
        assert_eq!(outcome.tool_rounds, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let messages = outcome.conversation.messages();
        let tool_positions: Vec<usize> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role == Role::Tool)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(tool_positions.len(), 1);
        assert_eq!(messages[tool_positions[0]].tool_call_id(), Some("call_1"));
        assert_eq!(messages.last().unwrap().content, HOLD);
        assert!(tool_positions[0] < messages.len() - 1);

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].tool_names, vec!["get_price_history"]);
        assert!(requests[2].tool_names.is_empty());
        assert_eq!(requests[2].response_schema.as_ref().unwrap().name, "verdict");
        assert_eq!(requests[2].messages.last().unwrap().content, FINALIZE_INSTRUCTION);
    }

    #[tokio::test]
    async fn test_tool_results_keep_request_order() {
        let provider = ScriptedProvider::new([
            Completion::tools(vec![
                price_call("c1", "get_price_history"),
                price_call("c2", "get_price_history"),
            ]),
            Completion::text("ok"),
            Completion::text(HOLD),
        ]);
        let (tools, calls) = registry();
        let config = SessionConfig::default();
        let mut session = ToolCallingSession::new(&provider, &tools, &config);

        let outcome = session.run::<Verdict>("system", &json!({})).await.unwrap();

        let ids: Vec<_> = outcome
            .conversation
            .by_role(Role::Tool)
            .filter_map(Message::tool_call_id)
            .collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_fails() {
        let provider = ScriptedProvider::new([Completion::tools(vec![price_call("c1", "foo")])]);
        let (tools, calls) = registry();
        let config = SessionConfig::default();
        let mut session = ToolCallingSession::new(&provider, &tools, &config);

        let err = session.run::<Verdict>("system", &json!({})).await.unwrap_err();

        assert!(matches!(err, AgentError::UnknownTool(name) if name == "foo"));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn test_round_cap_enforced() {
        let provider = ScriptedProvider::repeating(Completion::tools(vec![price_call("c", "get_price_history")]));
        let (tools, calls) = registry();
        let config = SessionConfig::default();
        let mut session = ToolCallingSession::new(&provider, &tools, &config);

        let err = session.run::<Verdict>("system", &json!({})).await.unwrap_err();

        assert!(matches!(err, AgentError::ToolLoopExceeded(8)));
        assert_eq!(provider.request_count(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_eq!(session.tool_rounds(), 9);
    }

    #[tokio::test]
    async fn test_empty_final_answer_fails() {
        let provider = ScriptedProvider::new([Completion::text("thinking"), Completion::text("  ")]);
        let (tools, _) = registry();
        let config = SessionConfig::default();
        let mut session = ToolCallingSession::new(&provider, &tools, &config);

        let err = session.run::<Verdict>("system", &json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyResponse("finalizing")));
    }

    #[tokio::test]
    async fn test_schema_violations_fail() {
        for bad in [
            r#"{"action":"HOLD","target_weight":1.5}"#,
            r#"{"action":"MAYBE","target_weight":0.1}"#,
            r#"{"action":"HOLD","target_weight":0.1,"extra":true}"#,
            "I think you should hold.",
        ] {
            let provider = ScriptedProvider::new([Completion::text("analysis"), Completion::text(bad)]);
            let (tools, _) = registry();
            let config = SessionConfig::default();
            let mut session = ToolCallingSession::new(&provider, &tools, &config);

            let err = session.run::<Verdict>("system", &json!({})).await.unwrap_err();
            assert!(matches!(err, AgentError::SchemaValidation(_)), "accepted {bad}");
            assert_eq!(session.state(), SessionState::Failed);
        }
    }

    #[tokio::test]
    async fn test_schema_embedded_without_structured_output() {
        let provider = ScriptedProvider::new([Completion::text("analysis"), Completion::text(HOLD)])
            .with_capabilities(ProviderCapabilities { structured_output: false });
        let (tools, _) = registry();
        let config = SessionConfig::default();
        let mut session = ToolCallingSession::new(&provider, &tools, &config);

        session.run::<Verdict>("system", &json!({})).await.unwrap();

        let last = &provider.requests()[1];
        assert!(last.response_schema.is_none());
        assert!(last.messages.last().unwrap().content.contains("JSON schema"));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let provider = ScriptedProvider::with_results([Err(AgentError::RateLimited("429".into()))]);
        let (tools, _) = registry();
        let config = SessionConfig::default();
        let mut session = ToolCallingSession::new(&provider, &tools, &config);

        let err = session.run::<Verdict>("system", &json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::RateLimited(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_timeout() {
        let provider = ScriptedProvider::new([Completion::text("late")]).with_delay(Duration::from_secs(120));
        let (tools, _) = registry();
        let config = SessionConfig {
            model_timeout: Duration::from_secs(5),
            ..SessionConfig::default()
        };
        let mut session = ToolCallingSession::new(&provider, &tools, &config);

        let err = session.run::<Verdict>("system", &json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::Timeout { stage: "model round", .. }));
    }

    /// Never answers within any sane budget
    struct StalledTool;

    #[async_trait]
    impl Tool for StalledTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "get_price_history".into(),
                description: "Fetch prices".into(),
                parameters: vec![ParameterSchema::string("ticker", "Symbol", true)],
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ToolResult::new("get_price_history", call.id.clone(), "{}"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_call_timeout() {
        let provider = ScriptedProvider::new([
            Completion::tools(vec![price_call("call_1", "get_price_history")]),
            Completion::text(HOLD),
        ]);
        let tools = ToolRegistry::builder()
            .register(TestTool::PriceHistory, StalledTool)
            .build()
            .unwrap();
        let config = SessionConfig {
            tool_timeout: Duration::from_secs(2),
            ..SessionConfig::default()
        };
        let mut session = ToolCallingSession::new(&provider, &tools, &config);

        let err = session.run::<Verdict>("system", &json!({"ticker": "AAPL"})).await.unwrap_err();

        assert!(matches!(
            err,
            AgentError::Timeout { stage: "tool call", after } if after == Duration::from_secs(2)
        ));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn test_session_runs_once() {
        let provider = ScriptedProvider::new([Completion::text("a"), Completion::text(HOLD)]);
        let (tools, _) = registry();
        let config = SessionConfig::default();
        let mut session = ToolCallingSession::new(&provider, &tools, &config);

        session.run::<Verdict>("system", &json!({})).await.unwrap();
        assert!(session.run::<Verdict>("system", &json!({})).await.is_err());
    }

    #[test]
    fn test_code_fence_stripping() {
        let fenced = "```json\n{\"action\":\"SELL\",\"target_weight\":0.0}\n```";
        let verdict: Verdict = parse_structured(fenced).unwrap();
        assert_eq!(verdict.action, "SELL");
        assert_eq!(strip_code_fence("  {}  "), "{}");
    }
}
