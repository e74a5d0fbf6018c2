//! Tool System
//!
//! Tools are declared to the model as function schemas and dispatched through
//! a closed catalog: every tool name is a variant of a [`ToolName`] enum and
//! the registry refuses to build unless each variant has exactly one handler.
//! A name the model invents never reaches a handler; it resolves to
//! [`AgentError::UnknownTool`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call ID used to correlate the tool result
    pub id: String,

    /// Tool identifier as the model spelled it
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: HashMap<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: HashMap<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Build from a JSON-encoded argument object, as chat APIs deliver them
    pub fn from_json_arguments(id: impl Into<String>, name: impl Into<String>, raw: &str) -> Result<Self> {
        let name = name.into();
        let arguments = if raw.trim().is_empty() {
            HashMap::new()
        } else {
            serde_json::from_str(raw).map_err(|e| AgentError::ToolArguments {
                tool: name.clone(),
                message: format!("arguments are not a JSON object: {e}"),
            })?
        };
        Ok(Self::new(id, name, arguments))
    }

    /// Optional string argument
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }

    /// Required string argument
    pub fn required_str(&self, key: &str) -> Result<&str> {
        self.str_arg(key)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AgentError::ToolArguments {
                tool: self.name.clone(),
                message: format!("missing string parameter '{key}'"),
            })
    }
}

/// Result from tool execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Call ID this result answers
    pub id: String,

    /// Payload handed back to the model (typically JSON)
    pub output: String,
}

impl ToolResult {
    pub fn new(name: impl Into<String>, id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            output: output.into(),
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSchema {
    /// Plain string parameter
    pub fn string(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            param_type: "string".into(),
            description: description.into(),
            required,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSchema {
    /// JSON Schema object describing the parameters
    pub fn parameters_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(param.param_type));
            prop.insert("description".into(), json!(param.description));
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Function declaration in the shape chat-completion APIs expect
    pub fn to_function_declaration(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters_json_schema(),
            }
        })
    }
}

/// Closed set of tool names a catalog may expose
pub trait ToolName: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every variant; the registry requires a handler for each
    const ALL: &'static [Self];

    /// Wire name shown to the model
    fn as_str(self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == name)
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Validate arguments before execution
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let schema = self.schema();

        for param in &schema.parameters {
            if param.required && !call.arguments.contains_key(&param.name) {
                return Err(AgentError::ToolArguments {
                    tool: call.name.clone(),
                    message: format!("missing required parameter: {}", param.name),
                });
            }
        }

        Ok(())
    }
}

/// Registry mapping every tool name to its handler
pub struct ToolRegistry<K: ToolName> {
    tools: HashMap<K, Arc<dyn Tool>>,
}

impl<K: ToolName> std::fmt::Debug for ToolRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl<K: ToolName> ToolRegistry<K> {
    pub fn builder() -> ToolRegistryBuilder<K> {
        ToolRegistryBuilder {
            tools: HashMap::new(),
        }
    }

    /// Resolve a model-supplied name against the catalog
    pub fn resolve(&self, name: &str) -> Result<(K, Arc<dyn Tool>)> {
        let kind = K::from_name(name).ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
        let tool = self
            .tools
            .get(&kind)
            .cloned()
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;
        Ok((kind, tool))
    }

    /// Tool schemas in declaration order
    pub fn schemas(&self) -> Vec<ToolSchema> {
        K::ALL
            .iter()
            .filter_map(|k| self.tools.get(k))
            .map(|t| t.schema())
            .collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&'static str> {
        K::ALL.iter().map(|k| k.as_str()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Collects handlers, then checks the catalog is complete
pub struct ToolRegistryBuilder<K: ToolName> {
    tools: HashMap<K, Arc<dyn Tool>>,
}

impl<K: ToolName> ToolRegistryBuilder<K> {
    /// Register the handler for one tool name
    pub fn register<T: Tool + 'static>(self, kind: K, tool: T) -> Self {
        self.register_arc(kind, Arc::new(tool))
    }

    pub fn register_arc(mut self, kind: K, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(kind, tool);
        self
    }

    /// Build the registry, failing unless every name has a matching handler
    pub fn build(self) -> Result<ToolRegistry<K>> {
        for kind in K::ALL {
            let tool = self.tools.get(kind).ok_or_else(|| {
                AgentError::Config(format!("no handler registered for tool '{}'", kind.as_str()))
            })?;
            let declared = tool.schema().name;
            if declared != kind.as_str() {
                return Err(AgentError::Config(format!(
                    "handler for '{}' declares schema name '{declared}'",
                    kind.as_str()
                )));
            }
        }
        Ok(ToolRegistry { tools: self.tools })
    }
}
