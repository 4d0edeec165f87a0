use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use stepline_engine::{ClassifierRegistry, StepManager, StepperConfig};
use stepline_types::{AgentEvent, Step};

use crate::events::TimelineEvent;
use crate::publisher::EventSubscriber;

/// Owns one step manager per run and forwards its mutations to a channel.
///
/// `handle_event` never fails and never panics on malformed input; that is
/// the manager's contract, and this wrapper adds only notification.
pub struct Stepper {
    manager: StepManager,
    updates: UnboundedSender<TimelineEvent>,
    last_headline: String,
    revision: u64,
    finish_reported: bool,
}

impl Stepper {
    pub fn new(config: StepperConfig) -> (Self, UnboundedReceiver<TimelineEvent>) {
        Self::with_registry(config, ClassifierRegistry::with_defaults())
    }

    pub fn with_registry(
        config: StepperConfig,
        registry: ClassifierRegistry,
    ) -> (Self, UnboundedReceiver<TimelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = StepManager::with_registry(config, registry);
        let last_headline = manager.headline().to_string();
        (
            Self {
                manager,
                updates: tx,
                last_headline,
                revision: 0,
                finish_reported: false,
            },
            rx,
        )
    }

    /// Sole ingestion entry point; processes the event synchronously and
    /// notifies which steps changed
    pub fn handle_event(&mut self, event: &AgentEvent) {
        for step in self.manager.process(event) {
            self.revision += 1;
            self.emit(TimelineEvent::StepChanged {
                step,
                revision: self.revision,
            });
        }

        let headline = self.manager.headline();
        if headline != self.last_headline {
            self.last_headline = headline.to_string();
            self.emit(TimelineEvent::HeadlineChanged {
                headline: self.last_headline.clone(),
            });
        }

        if self.manager.is_finished() && !self.finish_reported {
            self.finish_reported = true;
            self.emit(TimelineEvent::Finished);
        }
    }

    pub fn steps(&self) -> &[Step] {
        self.manager.steps()
    }

    pub fn manager(&self) -> &StepManager {
        &self.manager
    }

    /// Wrap this stepper into a publisher subscriber, consuming it
    pub fn subscriber(self) -> EventSubscriber {
        Self::shared_subscriber(Arc::new(Mutex::new(self)))
    }

    /// Subscriber over a shared handle, for callers that also want to read
    /// `steps()` between events
    pub fn shared_subscriber(stepper: Arc<Mutex<Stepper>>) -> EventSubscriber {
        Box::new(move |event| {
            let stepper = stepper.clone();
            Box::pin(async move {
                stepper.lock().await.handle_event(&event);
            })
        })
    }

    fn emit(&self, update: TimelineEvent) {
        if self.updates.send(update).is_err() {
            debug!("timeline receiver dropped; update discarded");
        }
    }
}
