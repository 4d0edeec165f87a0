use chrono::{DateTime, Utc};
use stepline_types::{AgentEvent, Error, EventPayload, Phase, Result, ToolIntent};

/// Canonical shape of one lifecycle event after normalization.
///
/// Downstream code never matches on raw event types again; phase, call id
/// and intents carry everything the tracker and step manager need.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub phase: Phase,

    /// Correlation id for tool phases. None for hosted-tool events whose
    /// payload omits one; the step manager synthesizes a deterministic id.
    pub call_id: Option<String>,

    /// Tool calls announced inside a model response
    pub intents: Vec<ToolIntent>,

    /// True when this event completes its phase (model call ended, tool
    /// call ended, run ended) rather than opening it
    pub completes: bool,
}

/// Map a raw event into its canonical `(agent, phase, call_id)` shape.
///
/// Returns `Ok(None)` for event types that carry no timeline meaning; they
/// are ignored without touching any state. Returns `Err` only for events
/// that are malformed beyond use (missing mandatory correlation id) - the
/// caller logs and drops those, never propagates.
pub fn normalize(event: &AgentEvent) -> Result<Option<NormalizedEvent>> {
    let base = |phase: Phase, call_id: Option<String>, completes: bool| NormalizedEvent {
        timestamp: event.timestamp,
        agent: event.source.clone(),
        phase,
        call_id,
        intents: Vec::new(),
        completes,
    };

    let normalized = match &event.payload {
        EventPayload::AgentStarted(_) => base(Phase::Thinking, None, false),
        EventPayload::LlmStarted(_) => base(Phase::Thinking, None, false),

        EventPayload::LlmEnded(payload) => {
            if payload.tool_calls.is_empty() {
                base(Phase::Thinking, None, true)
            } else {
                let mut norm = base(Phase::Tool, None, false);
                norm.intents = payload.tool_calls.clone();
                norm
            }
        }

        EventPayload::ToolStarted(payload) => {
            let call_id = payload.call_id.clone().ok_or(Error::MissingField {
                event: "tool_started",
                field: "call_id",
            })?;
            base(Phase::Tool, Some(call_id), false)
        }

        // Call id may be absent; the manager falls back to the agent's most
        // recent call. Orphan completions (no matching start) are tolerated
        // upstream, so this never fails here.
        EventPayload::ToolEnded(payload) => base(Phase::Tool, payload.call_id.clone(), true),

        EventPayload::WebSearch(payload) => base(Phase::Tool, payload.call_id.clone(), true),
        EventPayload::CodeInterpreter(payload) => {
            base(Phase::Tool, payload.call_id.clone(), false)
        }

        // The source agent has handed control away; it is done acting for
        // this turn but the run continues elsewhere.
        EventPayload::Handoff(_) => base(Phase::Delivering, None, false),

        EventPayload::AgentEnded(_) => base(Phase::Finished, None, true),

        EventPayload::Unknown => return Ok(None),
    };

    Ok(Some(normalized))
}
