//! # Event Emission
//!
//! The dispatcher reports two kinds of events: a successful response on a
//! route that declares an `event` topic, and every internal error (on the
//! configured error topic). Emission is fire-and-forget: [`EventSink::emit`]
//! is synchronous and never blocks or fails the request.
//!
//! [`QueueEventSink`] decouples delivery from the request path by pushing
//! events onto an unbounded channel; an [`EventPump`] task drains that
//! channel into an [`EventBus`] and logs delivery failures.
//!
//! ```rust,ignore
//! let (sink, pump) = QueueEventSink::channel();
//! tokio::spawn(pump.run(my_bus));
//! let gateway = Gateway::builder(table).events(Arc::new(sink)).build()?;
//! ```

use crate::envelope::ResponseEnvelope;
use crate::ids::RequestId;
use crate::security::Principal;
use crate::spec::RouteDefinition;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Success,
    InternalError,
}

#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub topic: String,
    pub kind: EventKind,
    pub request_id: RequestId,
    pub route: Option<Arc<RouteDefinition>>,
    pub envelope: ResponseEnvelope,
    pub principal: Option<Principal>,
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event bus rejected '{topic}': {message}")]
    Rejected { topic: String, message: String },
    #[error("event bus unavailable: {0}")]
    Unavailable(String),
}

/// Non-blocking outbound event interface used by the dispatcher.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: GatewayEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, event: GatewayEvent) {
        debug!(topic = %event.topic, "Event dropped (no bus configured)");
    }
}

/// External event bus the pump delivers to.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: &GatewayEvent) -> Result<(), EventError>;
}

/// Sink backed by an unbounded queue.
#[derive(Debug, Clone)]
pub struct QueueEventSink {
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl QueueEventSink {
    /// A sink and the pump that drains it.
    pub fn channel() -> (Self, EventPump) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, EventPump { rx })
    }
}

impl EventSink for QueueEventSink {
    fn emit(&self, event: GatewayEvent) {
        let topic = event.topic.clone();
        match self.tx.send(event) {
            Ok(()) => debug!(topic = %topic, "Event queued"),
            Err(_) => warn!(topic = %topic, "Event queue closed, event dropped"),
        }
    }
}

/// Drains a [`QueueEventSink`] into an [`EventBus`].
#[derive(Debug)]
pub struct EventPump {
    rx: mpsc::UnboundedReceiver<GatewayEvent>,
}

impl EventPump {
    /// Deliver events until every sink is dropped. Returns the number of
    /// events delivered successfully.
    pub async fn run<B: EventBus>(mut self, bus: B) -> usize {
        let mut delivered = 0usize;
        while let Some(event) = self.rx.recv().await {
            match bus.publish(&event).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    topic = %event.topic,
                    request_id = %event.request_id,
                    error = %e,
                    "Event delivery failed"
                ),
            }
        }
        info!(delivered, "Event pump stopped");
        delivered
    }
}
