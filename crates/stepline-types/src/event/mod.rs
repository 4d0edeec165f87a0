mod event;
mod payload;

pub use event::AgentEvent;
pub use payload::{
    AgentEndedPayload, AgentStartedPayload, CodeInterpreterPayload, EventPayload, HandoffPayload,
    LlmEndedPayload, LlmStartedPayload, SearchSource, ToolEndedPayload, ToolIntent,
    ToolStartedPayload, WebSearchPayload,
};
