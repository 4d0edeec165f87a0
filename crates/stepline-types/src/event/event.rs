use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payload::EventPayload;

// NOTE: Schema Design Goals
//
// 1. Normalization: one unified shape for every lifecycle occurrence, whatever
//    hook emitted it (agent lifecycle, model calls, tool calls, hosted tools)
// 2. Tolerance: event types this schema does not know deserialize to
//    EventPayload::Unknown instead of failing, so a newer producer never
//    breaks an older consumer
// 3. Correlation: tool start/end pairs and tool intents inside model
//    responses share a provider call id, which downstream consumers use to
//    collapse the pair into a single timeline entry

/// One lifecycle occurrence emitted by an agent run.
///
/// Immutable value type; producers publish these and never see them again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Event timestamp (UTC)
    pub timestamp: DateTime<Utc>,

    /// Name of the emitting agent. Not unique per run: every turn of the
    /// same agent shares this name, and retried runs reuse it.
    pub source: String,

    /// Optional tracing correlation id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,

    /// Event type and content (flattened enum)
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl AgentEvent {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.into(),
            span_id: None,
            payload,
        }
    }

    pub fn with_span(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::payload::LlmStartedPayload;

    #[test]
    fn test_serialization_round_trip() {
        let event = AgentEvent::new(
            "Researcher",
            EventPayload::LlmStarted(LlmStartedPayload {
                system_prompt: Some("be brief".to_string()),
            }),
        );

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: AgentEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.source, "Researcher");
        match deserialized.payload {
            EventPayload::LlmStarted(p) => {
                assert_eq!(p.system_prompt.as_deref(), Some("be brief"))
            }
            _ => panic!("Wrong payload type"),
        }
    }

    #[test]
    fn test_unknown_event_type_deserializes() {
        let json = r#"{
            "timestamp": "2026-01-10T12:00:00Z",
            "source": "Researcher",
            "type": "telemetry_flush",
            "content": {"spans": 12}
        }"#;

        let event: AgentEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event.payload, EventPayload::Unknown));
    }
}
