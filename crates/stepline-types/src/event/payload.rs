use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event payload variants
///
/// The tag vocabulary is fixed; producers emitting a type outside it land on
/// `Unknown` and are ignored downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    /// 1. An agent run began (first event of a run)
    AgentStarted(AgentStartedPayload),

    /// 2. A model call began (the agent is reasoning)
    LlmStarted(LlmStartedPayload),

    /// 3. A model call finished
    ///
    /// Note: may announce tool calls the agent intends to make; each intent
    /// carries the same call id a later ToolStarted will use
    LlmEnded(LlmEndedPayload),

    /// 4. Tool execution began (Action Request)
    ToolStarted(ToolStartedPayload),

    /// 5. Tool execution finished (Action Result)
    ToolEnded(ToolEndedPayload),

    /// 6. Hosted web search performed by the provider
    WebSearch(WebSearchPayload),

    /// 7. Hosted code interpreter invocation
    CodeInterpreter(CodeInterpreterPayload),

    /// 8. Control handed to another agent
    Handoff(HandoffPayload),

    /// 9. The agent run finished (last useful event of a run)
    AgentEnded(AgentEndedPayload),

    /// Forward-compatibility catch-all for unrecognized event types
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentStartedPayload {
    /// Task description handed to the agent, when the runtime provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmStartedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmEndedPayload {
    /// Assistant text, if the response carried any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Tool calls announced inside the model response
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolIntent>,
}

/// A tool call announced inside a model response, before execution starts.
///
/// The id is the provider call id; the eventual ToolStarted/ToolEnded pair
/// for this call reuses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolIntent {
    pub call_id: String,
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStartedPayload {
    /// Raw tool identifier
    pub tool: String,

    /// Provider call id; mandatory for correlation. Events without one are
    /// dropped during normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,

    #[serde(default)]
    pub arguments: Value,

    /// Tool failed before producing output (e.g. timeout at dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEndedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Provider call id; when absent the consumer falls back to the most
    /// recent call id observed for the source agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebSearchPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SearchSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchSource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CodeInterpreterPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Often empty at call time; filled by the matching ToolEnded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffPayload {
    pub to_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentEndedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EventPayload {
    /// Short tag for diagnostics, mirroring the serialized `type` value
    pub fn kind_str(&self) -> &'static str {
        match self {
            EventPayload::AgentStarted(_) => "agent_started",
            EventPayload::LlmStarted(_) => "llm_started",
            EventPayload::LlmEnded(_) => "llm_ended",
            EventPayload::ToolStarted(_) => "tool_started",
            EventPayload::ToolEnded(_) => "tool_ended",
            EventPayload::WebSearch(_) => "web_search",
            EventPayload::CodeInterpreter(_) => "code_interpreter",
            EventPayload::Handoff(_) => "handoff",
            EventPayload::AgentEnded(_) => "agent_ended",
            EventPayload::Unknown => "unknown",
        }
    }
}
