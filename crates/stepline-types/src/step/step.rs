use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::event::SearchSource;

use super::key::DedupKey;
use super::status::{StepKind, StepStatus};

/// One visible timeline entry representing a coherent unit of agent work.
///
/// Owned exclusively by the step manager; renderers hold references only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Stable identity for update-in-place semantics
    pub id: Uuid,

    pub kind: StepKind,

    /// Human-readable label; may be rewritten while the step is running
    /// (e.g. display-name substitution once the tool name is known)
    pub title: String,

    pub status: StepStatus,

    /// Last-known payload for the step. Long output is truncated before it
    /// is stored here, not at render time.
    pub data: StepData,

    /// Upsert identity; unique across the timeline at any instant
    pub dedup_key: DedupKey,

    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Step {
    pub fn new(
        kind: StepKind,
        title: impl Into<String>,
        status: StepStatus,
        data: StepData,
        dedup_key: DedupKey,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            status,
            data,
            dedup_key,
            started_at: timestamp,
            updated_at: timestamp,
        }
    }
}

/// Step payload, shaped by classification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepData {
    Thinking {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<String>,
    },
    Tool {
        tool: String,
        call_id: String,
        #[serde(default)]
        arguments: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    WebSearch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        sources: Vec<SearchSource>,
    },
    CodeInterpreter {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        outputs: Vec<String>,
    },
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    Finished {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::status::Phase;

    #[test]
    fn test_step_creation_sets_timestamps() {
        let now = Utc::now();
        let step = Step::new(
            StepKind::Tool,
            "search",
            StepStatus::Running,
            StepData::Tool {
                tool: "search".to_string(),
                call_id: "c1".to_string(),
                arguments: serde_json::json!({"query": "rust"}),
                output: None,
                error: None,
            },
            DedupKey::new("R", Phase::Tool, "c1"),
            now,
        );

        assert_eq!(step.started_at, now);
        assert_eq!(step.updated_at, now);
        assert_eq!(step.title, "search");
    }

    #[test]
    fn test_step_data_serialization_tags() {
        let data = StepData::WebSearch {
            query: Some("weather".to_string()),
            sources: vec![],
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["type"], "web_search");
        assert_eq!(json["query"], "weather");
    }
}
