use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use stepline_types::Phase;

/// How an observation relates to the agent's known state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A new reasoning cycle started; the turn id advanced
    NewTurn,
    /// Same phase, same correlation - the existing step continues
    Continuation,
    /// A call id not seen before in this turn (first or sibling tool call)
    NewCall,
    /// The last pending call drained; the agent is composing its response
    Delivering,
    /// Run ended; state for the agent is discarded
    Finished,
}

/// Per-agent state, keyed by agent name for the lifetime of one workflow
#[derive(Debug, Clone)]
pub struct AgentState {
    pub phase: Phase,
    pub turn: u32,
    pub last_call_id: Option<String>,
    pending_calls: HashSet<String>,
}

impl AgentState {
    fn new(turn: u32) -> Self {
        Self {
            phase: Phase::Thinking,
            turn,
            last_call_id: None,
            pending_calls: HashSet::new(),
        }
    }

    pub fn pending_calls(&self) -> usize {
        self.pending_calls.len()
    }
}

/// Turn and call bookkeeping for every agent name seen in a run.
///
/// Pure key-value state; decides continuation vs. new-step for the manager
/// but creates no steps itself.
#[derive(Debug, Default)]
pub struct AgentTracker {
    agents: HashMap<String, AgentState>,
    /// Turn numbering survives `Finished` so a retried agent name never
    /// reuses a dedup key from its previous run
    retired_turns: HashMap<String, u32>,
}

impl AgentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one normalized observation into the agent's state.
    ///
    /// `completes` marks events that close their phase (tool_ended, llm_ended)
    /// as opposed to opening it.
    pub fn observe(
        &mut self,
        agent: &str,
        phase: Phase,
        call_id: Option<&str>,
        completes: bool,
    ) -> Transition {
        match phase {
            Phase::Thinking => {
                let resumed_turn = self.next_turn_for(agent);
                match self.agents.entry(agent.to_string()) {
                    Entry::Vacant(slot) => {
                        slot.insert(AgentState::new(resumed_turn));
                        Transition::NewTurn
                    }
                    Entry::Occupied(mut slot) => {
                        let state = slot.get_mut();
                        if completes {
                            // A model call ended; the turn it belongs to stays open
                            state.phase = Phase::Thinking;
                            Transition::Continuation
                        } else if state.phase == Phase::Thinking {
                            // agent_started followed by llm_started: same cycle
                            Transition::Continuation
                        } else {
                            state.turn += 1;
                            state.phase = Phase::Thinking;
                            state.pending_calls.clear();
                            state.last_call_id = None;
                            Transition::NewTurn
                        }
                    }
                }
            }

            Phase::Tool => {
                let resumed_turn = self.next_turn_for(agent);
                let state = self
                    .agents
                    .entry(agent.to_string())
                    .or_insert_with(|| AgentState::new(resumed_turn));

                if completes {
                    if let Some(id) = call_id {
                        state.pending_calls.remove(id);
                        state.last_call_id = Some(id.to_string());
                    }
                    if state.pending_calls.is_empty() {
                        state.phase = Phase::Delivering;
                        Transition::Delivering
                    } else {
                        state.phase = Phase::Tool;
                        Transition::Continuation
                    }
                } else {
                    state.phase = Phase::Tool;
                    match call_id {
                        Some(id) if !state.pending_calls.contains(id) => {
                            state.pending_calls.insert(id.to_string());
                            state.last_call_id = Some(id.to_string());
                            Transition::NewCall
                        }
                        Some(id) => {
                            state.last_call_id = Some(id.to_string());
                            Transition::Continuation
                        }
                        None => Transition::Continuation,
                    }
                }
            }

            Phase::Delivering => {
                let resumed_turn = self.next_turn_for(agent);
                let state = self
                    .agents
                    .entry(agent.to_string())
                    .or_insert_with(|| AgentState::new(resumed_turn));
                state.phase = Phase::Delivering;
                Transition::Continuation
            }

            Phase::Finished => {
                if let Some(state) = self.agents.remove(agent) {
                    self.retired_turns.insert(agent.to_string(), state.turn);
                }
                Transition::Finished
            }
        }
    }

    pub fn current(&self, agent: &str) -> Option<&AgentState> {
        self.agents.get(agent)
    }

    /// Current turn id for the agent; falls back to the last retired turn so
    /// a terminal event observed after `Finished` still keys consistently
    pub fn turn(&self, agent: &str) -> u32 {
        self.agents
            .get(agent)
            .map(|s| s.turn)
            .or_else(|| self.retired_turns.get(agent).copied())
            .unwrap_or(0)
    }

    pub fn last_call_id(&self, agent: &str) -> Option<&str> {
        self.agents
            .get(agent)
            .and_then(|s| s.last_call_id.as_deref())
    }

    fn next_turn_for(&self, agent: &str) -> u32 {
        self.retired_turns.get(agent).copied().unwrap_or(0) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_thinking_starts_turn_one() {
        let mut tracker = AgentTracker::new();
        let t = tracker.observe("R", Phase::Thinking, None, false);
        assert_eq!(t, Transition::NewTurn);
        assert_eq!(tracker.turn("R"), 1);
    }

    #[test]
    fn thinking_while_thinking_continues_same_turn() {
        let mut tracker = AgentTracker::new();
        tracker.observe("R", Phase::Thinking, None, false); // agent_started
        let t = tracker.observe("R", Phase::Thinking, None, false); // llm_started
        assert_eq!(t, Transition::Continuation);
        assert_eq!(tracker.turn("R"), 1);
    }

    #[test]
    fn same_call_id_is_a_continuation() {
        let mut tracker = AgentTracker::new();
        tracker.observe("R", Phase::Thinking, None, false);
        assert_eq!(
            tracker.observe("R", Phase::Tool, Some("c1"), false),
            Transition::NewCall
        );
        assert_eq!(
            tracker.observe("R", Phase::Tool, Some("c1"), false),
            Transition::Continuation
        );
    }

    #[test]
    fn sibling_call_id_is_a_new_call_same_turn() {
        let mut tracker = AgentTracker::new();
        tracker.observe("R", Phase::Thinking, None, false);
        tracker.observe("R", Phase::Tool, Some("c1"), false);
        let t = tracker.observe("R", Phase::Tool, Some("c2"), false);
        assert_eq!(t, Transition::NewCall);
        assert_eq!(tracker.turn("R"), 1);
        assert_eq!(tracker.current("R").unwrap().pending_calls(), 2);
    }

    #[test]
    fn draining_last_call_moves_to_delivering() {
        let mut tracker = AgentTracker::new();
        tracker.observe("R", Phase::Thinking, None, false);
        tracker.observe("R", Phase::Tool, Some("c1"), false);
        tracker.observe("R", Phase::Tool, Some("c2"), false);

        assert_eq!(
            tracker.observe("R", Phase::Tool, Some("c1"), true),
            Transition::Continuation
        );
        assert_eq!(tracker.current("R").unwrap().phase, Phase::Tool);

        assert_eq!(
            tracker.observe("R", Phase::Tool, Some("c2"), true),
            Transition::Delivering
        );
        assert_eq!(tracker.current("R").unwrap().phase, Phase::Delivering);
    }

    #[test]
    fn thinking_after_delivering_starts_new_turn() {
        let mut tracker = AgentTracker::new();
        tracker.observe("R", Phase::Thinking, None, false);
        tracker.observe("R", Phase::Tool, Some("c1"), false);
        tracker.observe("R", Phase::Tool, Some("c1"), true);

        let t = tracker.observe("R", Phase::Thinking, None, false);
        assert_eq!(t, Transition::NewTurn);
        assert_eq!(tracker.turn("R"), 2);
    }

    #[test]
    fn finished_discards_state() {
        let mut tracker = AgentTracker::new();
        tracker.observe("R", Phase::Thinking, None, false);
        let t = tracker.observe("R", Phase::Finished, None, true);
        assert_eq!(t, Transition::Finished);
        assert!(tracker.current("R").is_none());
    }

    #[test]
    fn reappearing_agent_gets_fresh_turn_numbering() {
        let mut tracker = AgentTracker::new();
        tracker.observe("R", Phase::Thinking, None, false);
        tracker.observe("R", Phase::Thinking, None, false);
        tracker.observe("R", Phase::Finished, None, true);

        let t = tracker.observe("R", Phase::Thinking, None, false);
        assert_eq!(t, Transition::NewTurn);
        // Turn ids keep counting up; the retried run never collides with
        // keys minted by the first one
        assert_eq!(tracker.turn("R"), 2);
    }

    #[test]
    fn last_call_id_tracks_most_recent_observation() {
        let mut tracker = AgentTracker::new();
        tracker.observe("R", Phase::Tool, Some("c1"), false);
        tracker.observe("R", Phase::Tool, Some("c2"), false);
        assert_eq!(tracker.last_call_id("R"), Some("c2"));
    }

    #[test]
    fn agents_are_tracked_independently() {
        let mut tracker = AgentTracker::new();
        tracker.observe("R", Phase::Thinking, None, false);
        tracker.observe("W", Phase::Thinking, None, false);
        tracker.observe("R", Phase::Tool, Some("c1"), false);

        assert_eq!(tracker.current("R").unwrap().phase, Phase::Tool);
        assert_eq!(tracker.current("W").unwrap().phase, Phase::Thinking);
    }
}
