use std::future::Future;

use futures::future::BoxFuture;
use stepline_types::AgentEvent;

/// Async handler invoked for every published event
pub type EventSubscriber = Box<dyn Fn(AgentEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Fans events out to subscribers, in subscription order, one event at a
/// time.
///
/// Delivery is sequential on purpose: the step machine downstream assumes
/// events arrive in the order the transport received them, so subscribers
/// are awaited rather than spawned.
#[derive(Default)]
pub struct EventPublisher {
    subscribers: Vec<EventSubscriber>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: EventSubscriber) {
        self.subscribers.push(subscriber);
    }

    /// Convenience wrapper for plain async closures
    pub fn subscribe_fn<F, Fut>(&mut self, handler: F)
    where
        F: Fn(AgentEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribers
            .push(Box::new(move |event| Box::pin(handler(event))));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub async fn publish(&self, event: AgentEvent) {
        for subscriber in &self.subscribers {
            subscriber(event.clone()).await;
        }
    }
}
