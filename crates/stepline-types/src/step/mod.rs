mod key;
mod status;
mod step;

pub use key::DedupKey;
pub use status::{Phase, StepKind, StepStatus};
pub use step::{Step, StepData};
