use std::fmt;

use serde::{Deserialize, Serialize};

use super::status::Phase;

/// Identity used to upsert rather than duplicate timeline entries.
///
/// Shape: `{agent}:{phase}:{correlate}` where correlate is a call id for tool
/// phases and a turn id otherwise. Two events with equal keys refer to the
/// same logical step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn new(agent: &str, phase: Phase, correlate: &str) -> Self {
        Self(format!("{}:{}:{}", agent, phase.as_str(), correlate))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
