//! stepline-runtime: delivery plumbing between agent event producers and the
//! step timeline engine.
//!
//! The engine is a pure state machine; this crate gives it a home in an
//! async application. [`EventPublisher`] fans events out to subscribers in
//! order, and [`Stepper`] owns one `StepManager` per run, forwarding every
//! changed step over a channel for incremental re-rendering.
//!
//! ```no_run
//! use stepline_engine::StepperConfig;
//! use stepline_runtime::{EventPublisher, Stepper, TimelineEvent};
//! use stepline_types::{AgentEvent, AgentStartedPayload, EventPayload};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (stepper, mut timeline) = Stepper::new(StepperConfig::new());
//! let mut publisher = EventPublisher::new();
//! publisher.subscribe(Stepper::subscriber(stepper));
//!
//! publisher
//!     .publish(AgentEvent::new(
//!         "Researcher",
//!         EventPayload::AgentStarted(AgentStartedPayload::default()),
//!     ))
//!     .await;
//!
//! while let Ok(update) = timeline.try_recv() {
//!     if let TimelineEvent::StepChanged { step, .. } = update {
//!         println!("{}: {:?}", step.title, step.status);
//!     }
//! }
//! # }
//! ```

pub mod events;
pub mod publisher;
pub mod stepper;

pub use events::TimelineEvent;
pub use publisher::{EventPublisher, EventSubscriber};
pub use stepper::Stepper;
