use stepline_types::{AgentEvent, EventPayload, truncate};

/// Characters of tool result shown in one-line event summaries
const RESULT_PREVIEW_CHARS: usize = 80;

/// One human-readable line for an event, for log-style surfaces that render
/// the raw stream instead of the folded timeline.
pub fn summarize_event(event: &AgentEvent) -> String {
    let source = &event.source;

    match &event.payload {
        EventPayload::AgentStarted(_) => format!("{} started planning", source),
        EventPayload::AgentEnded(_) => format!("{} delivered the response", source),
        EventPayload::Handoff(payload) => {
            format!("{} handed off to {}", source, payload.to_agent)
        }
        EventPayload::LlmStarted(_) => format!("{} is thinking", source),
        EventPayload::LlmEnded(payload) => {
            if payload.tool_calls.is_empty() {
                format!("{} finished reasoning", source)
            } else {
                let tools: Vec<&str> =
                    payload.tool_calls.iter().map(|c| c.tool.as_str()).collect();
                format!("{} decided to use {}", source, tools.join(", "))
            }
        }
        EventPayload::ToolStarted(payload) => {
            format!("{} is using {}", source, payload.tool)
        }
        EventPayload::ToolEnded(payload) => {
            let tool = payload.tool.as_deref().unwrap_or("a tool");
            match (&payload.error, &payload.output) {
                (Some(err), _) => format!("{} failed {}: {}", source, tool, err),
                (None, Some(output)) => format!(
                    "{} finished {} → {}",
                    source,
                    tool,
                    truncate(output, RESULT_PREVIEW_CHARS)
                ),
                (None, None) => format!("{} finished {}", source, tool),
            }
        }
        EventPayload::WebSearch(payload) => match &payload.query {
            Some(query) => format!("{} searched the web for \"{}\"", source, query),
            None => format!("{} searched the web", source),
        },
        EventPayload::CodeInterpreter(_) => format!("{} is running code", source),
        EventPayload::Unknown => format!("Unrecognized event from {}", source),
    }
}
