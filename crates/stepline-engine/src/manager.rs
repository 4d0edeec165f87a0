use std::collections::HashMap;

use tracing::warn;

use stepline_types::{
    AgentEvent, DedupKey, EventPayload, OUTPUT_PREVIEW_CHARS, Phase, Step, StepData, StepKind,
    StepStatus, short_digest, truncate,
};

use crate::classify::{Classification, ClassifierRegistry, ToolTitles, classify_intent};
use crate::normalize::{NormalizedEvent, normalize};
use crate::tracker::AgentTracker;

/// Decides whether an event from the given agent surfaces as a visible step.
///
/// Arguments: agent name, nesting depth (0 for the main agent), payload.
/// Suppressed events still update tracker state.
pub type RelevancePredicate = Box<dyn Fn(&str, usize, &EventPayload) -> bool + Send + Sync>;

/// Caller-tunable knobs for one step manager instance
pub struct StepperConfig {
    pub tool_titles: ToolTitles,
    /// Characters of tool output kept on a step; applied when the data is
    /// stored, not at render time
    pub preview_chars: usize,
    relevance: Option<RelevancePredicate>,
}

impl StepperConfig {
    pub fn new() -> Self {
        Self {
            tool_titles: ToolTitles::default(),
            preview_chars: OUTPUT_PREVIEW_CHARS,
            relevance: None,
        }
    }

    /// Map raw tool identifiers to display titles
    pub fn with_tool_title_map(mut self, map: HashMap<String, String>) -> Self {
        self.tool_titles = ToolTitles::new(map);
        self
    }

    pub fn with_tool_titles(mut self, titles: ToolTitles) -> Self {
        self.tool_titles = titles;
        self
    }

    pub fn with_preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    /// Replace the default relevance policy (main agent plus hosted tools)
    pub fn with_relevance(
        mut self,
        predicate: impl Fn(&str, usize, &EventPayload) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.relevance = Some(Box::new(predicate));
        self
    }
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The event-to-step state machine.
///
/// Consumes lifecycle events one at a time and maintains an append-mostly
/// timeline of steps, upserted by dedup key. One instance per workflow
/// execution; sharing an instance across runs collides keys.
///
/// No error and no panic crosses `process` for any malformed input: bad
/// events are logged and dropped, tool failures become step state.
pub struct StepManager {
    config: StepperConfig,
    registry: ClassifierRegistry,
    tracker: AgentTracker,
    steps: Vec<Step>,
    index: HashMap<DedupKey, usize>,
    main_agent: Option<String>,
    headline: String,
    finished: bool,
}

impl StepManager {
    pub fn new(config: StepperConfig) -> Self {
        Self::with_registry(config, ClassifierRegistry::with_defaults())
    }

    pub fn with_registry(config: StepperConfig, registry: ClassifierRegistry) -> Self {
        Self {
            config,
            registry,
            tracker: AgentTracker::new(),
            steps: Vec::new(),
            index: HashMap::new(),
            main_agent: None,
            headline: "Agent ready".to_string(),
            finished: false,
        }
    }

    /// Ordered timeline; position of a step is fixed at first creation
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn find(&self, key: &DedupKey) -> Option<&Step> {
        self.index.get(key).map(|&idx| &self.steps[idx])
    }

    /// Short status line for UI headers, derived from the main agent's
    /// latest activity
    pub fn headline(&self) -> &str {
        &self.headline
    }

    /// True once the main agent's run ended; later events are no-ops
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fold one event into the timeline.
    ///
    /// Returns the steps that changed (zero or more, in mutation order) so
    /// the caller can re-render just those entries.
    pub fn process(&mut self, event: &AgentEvent) -> Vec<Step> {
        if self.finished {
            return Vec::new();
        }

        let mut norm = match normalize(event) {
            Ok(Some(norm)) => norm,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(event = event.payload.kind_str(), %err, "dropping malformed event");
                return Vec::new();
            }
        };

        if self.main_agent.is_none()
            && matches!(event.payload, EventPayload::AgentStarted(_))
        {
            self.main_agent = Some(norm.agent.clone());
        }

        self.resolve_call_id(&mut norm, event);

        let relevant = self.is_relevant(&norm.agent, &event.payload);
        let mut touched: Vec<usize> = Vec::new();

        match norm.phase {
            Phase::Thinking => {
                self.tracker
                    .observe(&norm.agent, Phase::Thinking, None, norm.completes);
                if relevant {
                    let key = self.thinking_key(&norm.agent);
                    self.upsert(event, &norm, key, &mut touched);
                }
            }

            Phase::Tool if !norm.intents.is_empty() => {
                // The model response both closes the reasoning step and
                // announces the calls the agent is about to make
                if relevant {
                    let response = match &event.payload {
                        EventPayload::LlmEnded(p) => p.response.clone(),
                        _ => None,
                    };
                    self.complete_thinking(&norm, response, &mut touched);
                }
                let intents = std::mem::take(&mut norm.intents);
                for intent in &intents {
                    self.tracker
                        .observe(&norm.agent, Phase::Tool, Some(&intent.call_id), false);
                    if relevant {
                        let key = DedupKey::new(&norm.agent, Phase::Tool, &intent.call_id);
                        let classification = classify_intent(intent, &self.config.tool_titles);
                        self.upsert_classified(classification, key, &norm, &mut touched);
                    }
                }
            }

            Phase::Tool => {
                let Some(call_id) = norm.call_id.clone() else {
                    warn!(
                        agent = %norm.agent,
                        event = event.payload.kind_str(),
                        "dropping tool event with no resolvable call id"
                    );
                    return Vec::new();
                };
                self.tracker
                    .observe(&norm.agent, Phase::Tool, Some(&call_id), norm.completes);
                if relevant {
                    let key = DedupKey::new(&norm.agent, Phase::Tool, &call_id);
                    self.upsert(event, &norm, key, &mut touched);
                }
            }

            Phase::Delivering => {
                // Handoff: tracker state only, never a step
                self.tracker
                    .observe(&norm.agent, Phase::Delivering, None, false);
            }

            Phase::Finished => {
                let key = DedupKey::new(
                    &norm.agent,
                    Phase::Finished,
                    &format!("turn_{}", self.tracker.turn(&norm.agent)),
                );
                self.tracker
                    .observe(&norm.agent, Phase::Finished, None, true);

                let ends_run = self
                    .main_agent
                    .as_deref()
                    .is_none_or(|main| main == norm.agent);

                if relevant {
                    if ends_run {
                        self.sweep_running_steps(&norm, &mut touched);
                    }
                    self.upsert(event, &norm, key, &mut touched);
                }
                if ends_run {
                    self.finished = true;
                }
            }
        }

        self.update_headline(event);

        touched.dedup();
        touched.into_iter().map(|idx| self.steps[idx].clone()).collect()
    }

    // --- upsert machinery ---

    fn upsert(
        &mut self,
        event: &AgentEvent,
        norm: &NormalizedEvent,
        key: DedupKey,
        touched: &mut Vec<usize>,
    ) {
        if let Some(&idx) = self.index.get(&key) {
            if self.steps[idx].status.is_terminal() {
                // Duplicate delivery of a settled step: accepted, no mutation
                return;
            }
            self.merge_into(idx, event, norm);
            touched.push(idx);
        } else {
            let classification = self
                .registry
                .resolve(event, norm)
                .classify(event, norm, &self.config.tool_titles);
            self.upsert_classified(classification, key, norm, touched);
        }
    }

    fn upsert_classified(
        &mut self,
        classification: Classification,
        key: DedupKey,
        norm: &NormalizedEvent,
        touched: &mut Vec<usize>,
    ) {
        if let Some(&idx) = self.index.get(&key) {
            if self.steps[idx].status.is_terminal() {
                return;
            }
            // Re-announcement of a known call (intent then start): refresh
            // title and fill data the first announcement lacked
            let status = classification.status;
            let step = &mut self.steps[idx];
            step.title = classification.title;
            merge_data(&mut step.data, classification.data, self.config.preview_chars);
            step.updated_at = norm.timestamp;
            Self::advance_status(step, status);
            touched.push(idx);
            return;
        }

        let Classification {
            kind,
            title,
            mut status,
            mut data,
        } = classification;

        if data_error(&data).is_some() {
            status = StepStatus::Error;
        }
        truncate_data(&mut data, self.config.preview_chars);

        let step = Step::new(kind, title, status, data, key.clone(), norm.timestamp);
        self.index.insert(key, self.steps.len());
        self.steps.push(step);
        touched.push(self.steps.len() - 1);
    }

    fn merge_into(&mut self, idx: usize, event: &AgentEvent, norm: &NormalizedEvent) {
        let max = self.config.preview_chars;
        let step = &mut self.steps[idx];
        step.updated_at = norm.timestamp;

        match &event.payload {
            EventPayload::LlmEnded(payload) => {
                if let StepData::Thinking { response } = &mut step.data {
                    if let Some(text) = &payload.response {
                        *response = Some(truncate(text, max));
                    }
                }
                Self::advance_status(step, StepStatus::Completed);
            }

            EventPayload::ToolStarted(payload) => {
                step.title = self.config.tool_titles.resolve(&payload.tool);
                if let StepData::Tool {
                    tool,
                    arguments,
                    error,
                    ..
                } = &mut step.data
                {
                    *tool = payload.tool.clone();
                    if arguments.is_null() && !payload.arguments.is_null() {
                        *arguments = payload.arguments.clone();
                    }
                    if payload.error.is_some() {
                        *error = payload.error.clone();
                    }
                }
                if payload.error.is_some() {
                    Self::advance_status(step, StepStatus::Error);
                } else {
                    Self::advance_status(step, StepStatus::Running);
                }
            }

            EventPayload::ToolEnded(payload) => {
                match &mut step.data {
                    StepData::Tool { output, error, .. } => {
                        if let Some(text) = &payload.output {
                            *output = Some(truncate(text, max));
                        }
                        if payload.error.is_some() {
                            *error = payload.error.clone();
                        }
                    }
                    StepData::CodeInterpreter { outputs, .. } => {
                        if let Some(text) = &payload.output {
                            let preview = truncate(text, max);
                            if !outputs.contains(&preview) {
                                outputs.push(preview);
                            }
                        }
                    }
                    _ => {}
                }
                if payload.error.is_some() {
                    Self::advance_status(step, StepStatus::Error);
                } else {
                    Self::advance_status(step, StepStatus::Completed);
                }
            }

            EventPayload::CodeInterpreter(payload) => {
                if let StepData::CodeInterpreter { code, outputs } = &mut step.data {
                    if code.is_none() {
                        *code = payload.code.clone();
                    }
                    for out in &payload.outputs {
                        let preview = truncate(out, max);
                        if !outputs.contains(&preview) {
                            outputs.push(preview);
                        }
                    }
                }
            }

            // AgentStarted/LlmStarted re-entering an open thinking step,
            // or payloads with nothing new to merge
            _ => {}
        }
    }

    /// Close the open reasoning step for the agent's current turn, creating
    /// it directly completed when the opening event was lost
    fn complete_thinking(
        &mut self,
        norm: &NormalizedEvent,
        response: Option<String>,
        touched: &mut Vec<usize>,
    ) {
        let key = self.thinking_key(&norm.agent);
        let max = self.config.preview_chars;

        if let Some(&idx) = self.index.get(&key) {
            let step = &mut self.steps[idx];
            if step.status.is_terminal() {
                return;
            }
            if let StepData::Thinking { response: slot } = &mut step.data {
                if let Some(text) = &response {
                    *slot = Some(truncate(text, max));
                }
            }
            step.updated_at = norm.timestamp;
            Self::advance_status(step, StepStatus::Completed);
            touched.push(idx);
        } else {
            let mut data = StepData::Thinking { response };
            truncate_data(&mut data, max);
            let step = Step::new(
                StepKind::Thinking,
                "Thinking…",
                StepStatus::Completed,
                data,
                key.clone(),
                norm.timestamp,
            );
            self.index.insert(key, self.steps.len());
            self.steps.push(step);
            touched.push(self.steps.len() - 1);
        }
    }

    /// The run is over; nothing should keep spinning
    fn sweep_running_steps(&mut self, norm: &NormalizedEvent, touched: &mut Vec<usize>) {
        for (idx, step) in self.steps.iter_mut().enumerate() {
            if matches!(step.status, StepStatus::Pending | StepStatus::Running) {
                step.status = StepStatus::Completed;
                step.updated_at = norm.timestamp;
                touched.push(idx);
            }
        }
    }

    fn advance_status(step: &mut Step, next: StepStatus) {
        if step.status.is_terminal() {
            return;
        }
        if next.rank() > step.status.rank() {
            step.status = next;
        }
    }

    // --- correlation and relevance ---

    /// Fill in call ids the payload omitted: deterministic synthetic ids for
    /// hosted tools, last-observed-call fallback for bare completions
    fn resolve_call_id(&self, norm: &mut NormalizedEvent, event: &AgentEvent) {
        if norm.call_id.is_some() {
            return;
        }
        let millis = event.timestamp.timestamp_millis().to_string();
        match &event.payload {
            EventPayload::WebSearch(payload) => {
                let digest = short_digest(&[
                    &norm.agent,
                    payload.query.as_deref().unwrap_or(""),
                    &millis,
                ]);
                norm.call_id = Some(format!("websearch_{}", digest));
            }
            EventPayload::CodeInterpreter(payload) => {
                let digest = short_digest(&[
                    &norm.agent,
                    payload.code.as_deref().unwrap_or(""),
                    &millis,
                ]);
                norm.call_id = Some(format!("codeint_{}", digest));
            }
            EventPayload::ToolEnded(_) => {
                norm.call_id = self.tracker.last_call_id(&norm.agent).map(String::from);
            }
            _ => {}
        }
    }

    fn is_relevant(&self, agent: &str, payload: &EventPayload) -> bool {
        let depth = self.depth_of(agent);
        if let Some(predicate) = &self.config.relevance {
            return predicate(agent, depth, payload);
        }
        // Default policy: hosted tool activity surfaces from any agent,
        // everything else only from the main agent
        if matches!(
            payload,
            EventPayload::WebSearch(_) | EventPayload::CodeInterpreter(_)
        ) {
            return true;
        }
        depth == 0
    }

    fn depth_of(&self, agent: &str) -> usize {
        match &self.main_agent {
            Some(main) if main != agent => 1,
            _ => 0,
        }
    }

    fn thinking_key(&self, agent: &str) -> DedupKey {
        DedupKey::new(
            agent,
            Phase::Thinking,
            &format!("turn_{}", self.tracker.turn(agent)),
        )
    }

    fn update_headline(&mut self, event: &AgentEvent) {
        if self.depth_of(&event.source) != 0 {
            return;
        }
        let next = match &event.payload {
            EventPayload::AgentStarted(_) => "Agent working…".to_string(),
            EventPayload::LlmStarted(_) => "Thinking…".to_string(),
            EventPayload::ToolStarted(payload) => self.config.tool_titles.resolve(&payload.tool),
            EventPayload::AgentEnded(_) => "Agent finished".to_string(),
            _ => return,
        };
        self.headline = next;
    }
}

fn data_error(data: &StepData) -> Option<&str> {
    match data {
        StepData::Tool { error, .. } => error.as_deref(),
        _ => None,
    }
}

/// Apply the preview policy to every long text field before storage
fn truncate_data(data: &mut StepData, max: usize) {
    match data {
        StepData::Thinking { response } => {
            if let Some(text) = response.take() {
                *response = Some(truncate(&text, max));
            }
        }
        StepData::Tool { output, .. } => {
            if let Some(text) = output.take() {
                *output = Some(truncate(&text, max));
            }
        }
        StepData::CodeInterpreter { outputs, .. } => {
            for out in outputs.iter_mut() {
                *out = truncate(out, max);
            }
        }
        StepData::Message { text } => {
            if let Some(t) = text.take() {
                *text = Some(truncate(&t, max));
            }
        }
        StepData::Finished { output, .. } => {
            if let Some(text) = output.take() {
                *output = Some(truncate(&text, max));
            }
        }
        StepData::WebSearch { .. } => {}
    }
}

/// Merge freshly classified data into an existing step's data, keeping
/// whatever the earlier announcement already knew
fn merge_data(existing: &mut StepData, incoming: StepData, max: usize) {
    match (existing, incoming) {
        (
            StepData::Tool {
                arguments, output, error, ..
            },
            StepData::Tool {
                arguments: new_args,
                output: new_output,
                error: new_error,
                ..
            },
        ) => {
            if arguments.is_null() && !new_args.is_null() {
                *arguments = new_args;
            }
            if let Some(text) = new_output {
                *output = Some(truncate(&text, max));
            }
            if new_error.is_some() {
                *error = new_error;
            }
        }
        (existing, incoming) => {
            let mut incoming = incoming;
            truncate_data(&mut incoming, max);
            *existing = incoming;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepline_types::{
        AgentEndedPayload, AgentStartedPayload, LlmStartedPayload, ToolEndedPayload,
        ToolStartedPayload,
    };

    fn manager() -> StepManager {
        StepManager::new(StepperConfig::new())
    }

    fn started(source: &str) -> AgentEvent {
        AgentEvent::new(
            source,
            EventPayload::AgentStarted(AgentStartedPayload::default()),
        )
    }

    fn llm_started(source: &str) -> AgentEvent {
        AgentEvent::new(source, EventPayload::LlmStarted(LlmStartedPayload::default()))
    }

    fn tool_started(source: &str, tool: &str, call_id: &str) -> AgentEvent {
        AgentEvent::new(
            source,
            EventPayload::ToolStarted(ToolStartedPayload {
                tool: tool.to_string(),
                call_id: Some(call_id.to_string()),
                arguments: serde_json::Value::Null,
                error: None,
            }),
        )
    }

    fn tool_ended(source: &str, call_id: &str, output: &str) -> AgentEvent {
        AgentEvent::new(
            source,
            EventPayload::ToolEnded(ToolEndedPayload {
                tool: None,
                call_id: Some(call_id.to_string()),
                output: Some(output.to_string()),
                error: None,
            }),
        )
    }

    #[test]
    fn headline_follows_main_agent() {
        let mut mgr = manager();
        assert_eq!(mgr.headline(), "Agent ready");

        mgr.process(&started("R"));
        assert_eq!(mgr.headline(), "Agent working…");

        mgr.process(&llm_started("R"));
        assert_eq!(mgr.headline(), "Thinking…");

        mgr.process(&tool_started("R", "search", "c1"));
        assert_eq!(mgr.headline(), "search");

        mgr.process(&AgentEvent::new(
            "R",
            EventPayload::AgentEnded(AgentEndedPayload::default()),
        ));
        assert_eq!(mgr.headline(), "Agent finished");
    }

    #[test]
    fn sub_agent_events_do_not_touch_headline() {
        let mut mgr = manager();
        mgr.process(&started("R"));
        mgr.process(&llm_started("Helper"));
        assert_eq!(mgr.headline(), "Agent working…");
    }

    #[test]
    fn tool_output_truncated_at_storage_time() {
        let mut mgr = StepManager::new(StepperConfig::new().with_preview_chars(10));
        mgr.process(&started("R"));
        mgr.process(&tool_started("R", "search", "c1"));
        mgr.process(&tool_ended("R", "c1", "0123456789ABCDEF"));

        let step = mgr
            .find(&DedupKey::new("R", Phase::Tool, "c1"))
            .expect("tool step exists");
        match &step.data {
            StepData::Tool { output, .. } => {
                assert_eq!(output.as_deref(), Some("0123456789…"));
            }
            other => panic!("expected tool data, got {:?}", other),
        }
    }

    #[test]
    fn events_after_run_end_are_noops() {
        let mut mgr = manager();
        mgr.process(&started("R"));
        mgr.process(&AgentEvent::new(
            "R",
            EventPayload::AgentEnded(AgentEndedPayload::default()),
        ));
        assert!(mgr.is_finished());

        let before = mgr.steps().len();
        let changed = mgr.process(&tool_started("R", "search", "c9"));
        assert!(changed.is_empty());
        assert_eq!(mgr.steps().len(), before);
    }

    #[test]
    fn error_status_is_frozen() {
        let mut mgr = manager();
        mgr.process(&started("R"));
        mgr.process(&AgentEvent::new(
            "R",
            EventPayload::ToolStarted(ToolStartedPayload {
                tool: "fetch".to_string(),
                call_id: Some("c2".to_string()),
                arguments: serde_json::Value::Null,
                error: Some("timeout".to_string()),
            }),
        ));

        let key = DedupKey::new("R", Phase::Tool, "c2");
        assert_eq!(mgr.find(&key).unwrap().status, StepStatus::Error);

        let changed = mgr.process(&tool_ended("R", "c2", "late output"));
        assert!(changed.is_empty());
        assert_eq!(mgr.find(&key).unwrap().status, StepStatus::Error);
    }

    #[test]
    fn custom_relevance_predicate_overrides_default() {
        let mut mgr = StepManager::new(
            StepperConfig::new().with_relevance(|_agent, _depth, _payload| true),
        );
        mgr.process(&started("R"));
        mgr.process(&llm_started("Helper"));

        // Helper's thinking surfaced because the predicate allows everything
        assert!(
            mgr.steps()
                .iter()
                .any(|s| s.dedup_key.as_str().starts_with("Helper:"))
        );
    }

    #[test]
    fn suppressed_events_still_update_tracker() {
        let mut mgr = manager();
        mgr.process(&started("R"));
        mgr.process(&tool_started("Helper", "probe", "h1"));
        assert!(mgr.steps().iter().all(|s| !s.dedup_key.as_str().starts_with("Helper:")));

        // The suppressed start still registered h1, so a bare completion
        // for Helper resolves against it without creating a visible step
        let changed = mgr.process(&AgentEvent::new(
            "Helper",
            EventPayload::ToolEnded(ToolEndedPayload {
                tool: None,
                call_id: None,
                output: Some("ok".to_string()),
                error: None,
            }),
        ));
        assert!(changed.is_empty());
    }
}
