use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use prometheus::{IntCounter, Registry, TextEncoder};

use crate::state::AppState;

/// Hold lifecycle counters, registered on a private registry so that
/// several apps (tests) can live in one process.
pub struct Metrics {
    registry: Registry,
    pub holds_granted: IntCounter,
    pub hold_conflicts: IntCounter,
    pub seats_released: IntCounter,
    pub locks_swept: IntCounter,
    pub bookings_finalized: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let holds_granted =
            IntCounter::new("coach_holds_granted_total", "Hold requests that locked seats")?;
        let hold_conflicts =
            IntCounter::new("coach_hold_conflicts_total", "Hold requests refused with a conflict")?;
        let seats_released =
            IntCounter::new("coach_seats_released_total", "Seat locks removed by their holder")?;
        let locks_swept = IntCounter::new("coach_locks_swept_total", "Expired seat locks deleted")?;
        let bookings_finalized =
            IntCounter::new("coach_bookings_finalized_total", "Holds converted into bookings")?;

        registry.register(Box::new(holds_granted.clone()))?;
        registry.register(Box::new(hold_conflicts.clone()))?;
        registry.register(Box::new(seats_released.clone()))?;
        registry.register(Box::new(locks_swept.clone()))?;
        registry.register(Box::new(bookings_finalized.clone()))?;

        Ok(Self {
            registry,
            holds_granted,
            hold_conflicts,
            seats_released,
            locks_swept,
            bookings_finalized,
        })
    }

    /// Prometheus text exposition of every registered counter.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(export))
}

async fn export(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
