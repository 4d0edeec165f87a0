use std::collections::HashMap;

use stepline_types::{
    AgentEvent, EventPayload, StepData, StepKind, StepStatus, ToolIntent,
};

use crate::normalize::NormalizedEvent;

/// Resolves raw tool identifiers to display titles.
///
/// Lookup order: caller-supplied map, then (when enabled) the built-in
/// friendly table, then the raw identifier unchanged.
#[derive(Debug, Clone, Default)]
pub struct ToolTitles {
    map: HashMap<String, String>,
    friendly: bool,
}

/// Friendly names for tools common across agent runtimes
const FRIENDLY_TITLES: &[(&str, &str)] = &[
    ("search_web", "Searching the web"),
    ("execute_step", "Executing step"),
    ("draft_plan", "Drafting plan"),
    ("read_file", "Reading file"),
    ("write_file", "Writing file"),
    ("list_dir", "Listing directory"),
];

impl ToolTitles {
    pub fn new(map: HashMap<String, String>) -> Self {
        Self {
            map,
            friendly: false,
        }
    }

    /// Enable the built-in friendly table as a second lookup tier
    pub fn with_friendly_defaults(mut self) -> Self {
        self.friendly = true;
        self
    }

    pub fn resolve(&self, tool: &str) -> String {
        if let Some(title) = self.map.get(tool) {
            return title.clone();
        }
        if self.friendly {
            if let Some((_, title)) = FRIENDLY_TITLES.iter().find(|(name, _)| *name == tool) {
                return (*title).to_string();
            }
            if tool.to_lowercase().contains("search") {
                return "Searching the web".to_string();
            }
            return format!("Executing {}", tool);
        }
        tool.to_string()
    }
}

/// What a step for an event would look like at creation time.
///
/// Pure description; the step manager owns all state and applies status
/// monotonicity, truncation and error forcing after classification.
#[derive(Debug, Clone)]
pub struct Classification {
    pub kind: StepKind,
    pub title: String,
    pub status: StepStatus,
    pub data: StepData,
}

/// Classification strategy for one shape of event
pub trait StepClassifier: Send + Sync {
    fn matches(&self, event: &AgentEvent, norm: &NormalizedEvent) -> bool;

    fn classify(
        &self,
        event: &AgentEvent,
        norm: &NormalizedEvent,
        titles: &ToolTitles,
    ) -> Classification;
}

/// Ordered, first-match-wins classifier lookup.
///
/// Registration order is significant and caller-controlled; the generic tool
/// classifier answers whatever nothing else claimed.
pub struct ClassifierRegistry {
    classifiers: Vec<Box<dyn StepClassifier>>,
    fallback: GenericToolClassifier,
}

impl ClassifierRegistry {
    /// Registry with no strategies; everything resolves to the fallback
    pub fn empty() -> Self {
        Self {
            classifiers: Vec::new(),
            fallback: GenericToolClassifier,
        }
    }

    /// Registry with the built-in strategies in their canonical order
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(WebSearchClassifier));
        registry.register(Box::new(CodeInterpreterClassifier));
        registry.register(Box::new(ThinkingClassifier));
        registry.register(Box::new(FinishedClassifier));
        registry
    }

    pub fn register(&mut self, classifier: Box<dyn StepClassifier>) {
        self.classifiers.push(classifier);
    }

    pub fn resolve(&self, event: &AgentEvent, norm: &NormalizedEvent) -> &dyn StepClassifier {
        self.classifiers
            .iter()
            .find(|c| c.matches(event, norm))
            .map(|c| c.as_ref())
            .unwrap_or(&self.fallback)
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Classify a tool intent announced inside a model response.
///
/// Intents are sub-shapes of one event rather than events themselves, so
/// they do not go through the registry.
pub fn classify_intent(intent: &ToolIntent, titles: &ToolTitles) -> Classification {
    Classification {
        kind: StepKind::Tool,
        title: titles.resolve(&intent.tool),
        status: StepStatus::Running,
        data: StepData::Tool {
            tool: intent.tool.clone(),
            call_id: intent.call_id.clone(),
            arguments: intent.arguments.clone(),
            output: None,
            error: None,
        },
    }
}

// --- Built-in classifiers ---

pub struct ThinkingClassifier;

impl StepClassifier for ThinkingClassifier {
    fn matches(&self, _event: &AgentEvent, norm: &NormalizedEvent) -> bool {
        norm.phase == stepline_types::Phase::Thinking
    }

    fn classify(
        &self,
        event: &AgentEvent,
        norm: &NormalizedEvent,
        _titles: &ToolTitles,
    ) -> Classification {
        let response = match &event.payload {
            EventPayload::LlmEnded(p) => p.response.clone(),
            _ => None,
        };
        Classification {
            kind: StepKind::Thinking,
            title: "Thinking…".to_string(),
            status: if norm.completes {
                StepStatus::Completed
            } else {
                StepStatus::Running
            },
            data: StepData::Thinking { response },
        }
    }
}

pub struct WebSearchClassifier;

impl StepClassifier for WebSearchClassifier {
    fn matches(&self, event: &AgentEvent, _norm: &NormalizedEvent) -> bool {
        matches!(event.payload, EventPayload::WebSearch(_))
    }

    fn classify(
        &self,
        event: &AgentEvent,
        _norm: &NormalizedEvent,
        _titles: &ToolTitles,
    ) -> Classification {
        let (query, sources) = match &event.payload {
            EventPayload::WebSearch(p) => (p.query.clone(), p.sources.clone()),
            _ => (None, Vec::new()),
        };
        Classification {
            kind: StepKind::Tool,
            title: "Searching the web".to_string(),
            // Hosted searches report after the fact; the step is born done
            status: StepStatus::Completed,
            data: StepData::WebSearch { query, sources },
        }
    }
}

pub struct CodeInterpreterClassifier;

impl StepClassifier for CodeInterpreterClassifier {
    fn matches(&self, event: &AgentEvent, _norm: &NormalizedEvent) -> bool {
        matches!(event.payload, EventPayload::CodeInterpreter(_))
    }

    fn classify(
        &self,
        event: &AgentEvent,
        _norm: &NormalizedEvent,
        _titles: &ToolTitles,
    ) -> Classification {
        let (code, outputs) = match &event.payload {
            EventPayload::CodeInterpreter(p) => (p.code.clone(), p.outputs.clone()),
            _ => (None, Vec::new()),
        };
        Classification {
            kind: StepKind::Tool,
            title: "Running code".to_string(),
            // Outputs arrive with the matching tool_ended
            status: StepStatus::Running,
            data: StepData::CodeInterpreter { code, outputs },
        }
    }
}

pub struct FinishedClassifier;

impl StepClassifier for FinishedClassifier {
    fn matches(&self, _event: &AgentEvent, norm: &NormalizedEvent) -> bool {
        norm.phase == stepline_types::Phase::Finished
    }

    fn classify(
        &self,
        event: &AgentEvent,
        _norm: &NormalizedEvent,
        _titles: &ToolTitles,
    ) -> Classification {
        let (output, error) = match &event.payload {
            EventPayload::AgentEnded(p) => (p.output.clone(), p.error.clone()),
            _ => (None, None),
        };
        Classification {
            kind: StepKind::Finished,
            title: "Finished".to_string(),
            status: if error.is_some() {
                StepStatus::Error
            } else {
                StepStatus::Completed
            },
            data: StepData::Finished { output, error },
        }
    }
}

/// Fallback for every tool-phase event nothing else claimed
pub struct GenericToolClassifier;

impl StepClassifier for GenericToolClassifier {
    fn matches(&self, _event: &AgentEvent, norm: &NormalizedEvent) -> bool {
        norm.phase == stepline_types::Phase::Tool
    }

    fn classify(
        &self,
        event: &AgentEvent,
        norm: &NormalizedEvent,
        titles: &ToolTitles,
    ) -> Classification {
        let call_id = norm.call_id.clone().unwrap_or_default();

        let (tool, arguments, output, error) = match &event.payload {
            EventPayload::ToolStarted(p) => (
                Some(p.tool.clone()),
                p.arguments.clone(),
                None,
                p.error.clone(),
            ),
            EventPayload::ToolEnded(p) => (
                p.tool.clone(),
                serde_json::Value::Null,
                p.output.clone(),
                p.error.clone(),
            ),
            _ => (None, serde_json::Value::Null, None, None),
        };

        let title = tool
            .as_deref()
            .map(|t| titles.resolve(t))
            .unwrap_or_else(|| call_id.clone());

        Classification {
            kind: StepKind::Tool,
            title,
            status: if norm.completes {
                StepStatus::Completed
            } else {
                StepStatus::Running
            },
            data: StepData::Tool {
                tool: tool.unwrap_or_else(|| call_id.clone()),
                call_id,
                arguments,
                output,
                error,
            },
        }
    }
}
