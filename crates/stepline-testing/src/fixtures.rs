//! Event fixture builders.
//!
//! `EventScript` hands out lifecycle events with strictly increasing
//! timestamps so assembled timelines are deterministic regardless of how
//! fast the test runs.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use stepline_types::{
    AgentEndedPayload, AgentEvent, AgentStartedPayload, CodeInterpreterPayload, EventPayload,
    HandoffPayload, LlmEndedPayload, LlmStartedPayload, SearchSource, ToolEndedPayload,
    ToolIntent, ToolStartedPayload, WebSearchPayload,
};

/// Builds a causally-ordered stream of events, one second apart.
pub struct EventScript {
    clock: DateTime<Utc>,
}

impl Default for EventScript {
    fn default() -> Self {
        Self::new()
    }
}

impl EventScript {
    pub fn new() -> Self {
        Self {
            clock: Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap(),
        }
    }

    fn stamp(&mut self, source: &str, payload: EventPayload) -> AgentEvent {
        let event = AgentEvent {
            timestamp: self.clock,
            source: source.to_string(),
            span_id: None,
            payload,
        };
        self.clock = self.clock + Duration::seconds(1);
        event
    }

    pub fn agent_started(&mut self, source: &str) -> AgentEvent {
        self.stamp(
            source,
            EventPayload::AgentStarted(AgentStartedPayload::default()),
        )
    }

    pub fn llm_started(&mut self, source: &str) -> AgentEvent {
        self.stamp(source, EventPayload::LlmStarted(LlmStartedPayload::default()))
    }

    pub fn llm_ended(&mut self, source: &str) -> AgentEvent {
        self.stamp(source, EventPayload::LlmEnded(LlmEndedPayload::default()))
    }

    /// Model response announcing tool calls: `(call_id, tool)` pairs
    pub fn llm_ended_with_intents(&mut self, source: &str, calls: &[(&str, &str)]) -> AgentEvent {
        let tool_calls = calls
            .iter()
            .map(|(call_id, tool)| ToolIntent {
                call_id: call_id.to_string(),
                tool: tool.to_string(),
                arguments: Value::Null,
            })
            .collect();
        self.stamp(
            source,
            EventPayload::LlmEnded(LlmEndedPayload {
                response: None,
                tool_calls,
            }),
        )
    }

    pub fn tool_started(&mut self, source: &str, tool: &str, call_id: &str) -> AgentEvent {
        self.stamp(
            source,
            EventPayload::ToolStarted(ToolStartedPayload {
                tool: tool.to_string(),
                call_id: Some(call_id.to_string()),
                arguments: Value::Null,
                error: None,
            }),
        )
    }

    pub fn tool_started_with_error(
        &mut self,
        source: &str,
        tool: &str,
        call_id: &str,
        error: &str,
    ) -> AgentEvent {
        self.stamp(
            source,
            EventPayload::ToolStarted(ToolStartedPayload {
                tool: tool.to_string(),
                call_id: Some(call_id.to_string()),
                arguments: Value::Null,
                error: Some(error.to_string()),
            }),
        )
    }

    pub fn tool_ended(&mut self, source: &str, call_id: &str, output: &str) -> AgentEvent {
        self.stamp(
            source,
            EventPayload::ToolEnded(ToolEndedPayload {
                tool: None,
                call_id: Some(call_id.to_string()),
                output: Some(output.to_string()),
                error: None,
            }),
        )
    }

    /// Completion with no call id; consumers match it against the agent's
    /// most recent call
    pub fn tool_ended_untracked(&mut self, source: &str, output: &str) -> AgentEvent {
        self.stamp(
            source,
            EventPayload::ToolEnded(ToolEndedPayload {
                tool: None,
                call_id: None,
                output: Some(output.to_string()),
                error: None,
            }),
        )
    }

    pub fn tool_failed(&mut self, source: &str, call_id: &str, error: &str) -> AgentEvent {
        self.stamp(
            source,
            EventPayload::ToolEnded(ToolEndedPayload {
                tool: None,
                call_id: Some(call_id.to_string()),
                output: None,
                error: Some(error.to_string()),
            }),
        )
    }

    pub fn web_search(&mut self, source: &str, query: &str, urls: &[&str]) -> AgentEvent {
        let sources = urls
            .iter()
            .map(|url| SearchSource {
                url: url.to_string(),
                title: None,
            })
            .collect();
        self.stamp(
            source,
            EventPayload::WebSearch(WebSearchPayload {
                call_id: None,
                query: Some(query.to_string()),
                sources,
            }),
        )
    }

    pub fn code_interpreter(&mut self, source: &str, code: &str) -> AgentEvent {
        self.stamp(
            source,
            EventPayload::CodeInterpreter(CodeInterpreterPayload {
                call_id: None,
                code: Some(code.to_string()),
                outputs: Vec::new(),
            }),
        )
    }

    pub fn handoff(&mut self, source: &str, to_agent: &str) -> AgentEvent {
        self.stamp(
            source,
            EventPayload::Handoff(HandoffPayload {
                to_agent: to_agent.to_string(),
            }),
        )
    }

    pub fn agent_ended(&mut self, source: &str) -> AgentEvent {
        self.stamp(source, EventPayload::AgentEnded(AgentEndedPayload::default()))
    }
}
