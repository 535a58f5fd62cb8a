use async_trait::async_trait;
use coach_core::EventPublisher;
use coach_shared::SeatEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Feeds the in-process SSE channel.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<SeatEvent>,
}

impl BroadcastPublisher {
    pub fn new(tx: broadcast::Sender<SeatEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: &SeatEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // No subscribers is not an error.
        if self.tx.send(event.clone()).is_err() {
            debug!(trip_id = event.trip_id(), "No SSE subscribers for seat event");
        }
        Ok(())
    }
}

/// Hands every event to each sink in turn. A failing sink is logged and
/// does not stop the others.
pub struct FanoutPublisher {
    sinks: Vec<Arc<dyn EventPublisher>>,
}

impl FanoutPublisher {
    pub fn new(sinks: Vec<Arc<dyn EventPublisher>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl EventPublisher for FanoutPublisher {
    async fn publish(&self, event: &SeatEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for sink in &self.sinks {
            if let Err(e) = sink.publish(event).await {
                warn!(topic = event.topic(), "Seat event sink failed: {}", e);
            }
        }
        Ok(())
    }
}
