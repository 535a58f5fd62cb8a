use async_trait::async_trait;
use coach_shared::SeatEvent;

/// Outbound port for seat events (event bus, live seat-map streams).
///
/// Callers treat publishing as best-effort: an error is logged, never
/// surfaced to the client whose hold already committed.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &SeatEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Publisher that drops everything.
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _event: &SeatEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}
