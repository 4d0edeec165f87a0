use serde::{Deserialize, Serialize};

/// Coarse-grained state bucket an event maps into during normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The agent is reasoning (agent/model call started)
    Thinking,
    /// The agent is executing a tool call
    Tool,
    /// The agent is composing its response, no tool calls pending
    Delivering,
    /// The agent run ended
    Finished,
}

impl Phase {
    /// Stable string form used inside dedup keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Thinking => "thinking",
            Phase::Tool => "tool",
            Phase::Delivering => "delivering",
            Phase::Finished => "finished",
        }
    }
}

/// Visualized step classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Thinking,
    Tool,
    Message,
    Finished,
}

/// Step lifecycle status
///
/// Monotonic: Pending -> Running -> Completed | Error. Error is terminal and
/// freezes the step against further updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Error)
    }

    /// Rank used to enforce forward-only transitions
    pub fn rank(&self) -> u8 {
        match self {
            StepStatus::Pending => 0,
            StepStatus::Running => 1,
            StepStatus::Completed => 2,
            StepStatus::Error => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ranks_are_ordered() {
        assert!(StepStatus::Pending.rank() < StepStatus::Running.rank());
        assert!(StepStatus::Running.rank() < StepStatus::Completed.rank());
        assert!(StepStatus::Completed.rank() < StepStatus::Error.rank());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!StepStatus::Pending.is_terminal());
        assert!(!StepStatus::Running.is_terminal());
        assert!(StepStatus::Completed.is_terminal());
        assert!(StepStatus::Error.is_terminal());
    }
}
