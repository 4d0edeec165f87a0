use stepline_types::Step;

/// NOTE: TimelineEvent design for incremental rendering
/// - StepChanged carries the full step snapshot, not a diff: renderers
///   redraw one entry, they do not patch fields
/// - revision is a per-stepper monotone counter so consumers can drop
///   stale updates that arrive after a newer one for the same step
/// - Finished fires once per run, after the last StepChanged of that run
#[derive(Debug, Clone)]
pub enum TimelineEvent {
    StepChanged {
        step: Step,
        revision: u64,
    },
    HeadlineChanged {
        headline: String,
    },
    Finished,
}
