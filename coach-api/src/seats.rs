use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use coach_catalog::SeatView;
use coach_core::{SeatNumber, TripId};
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/trips/{trip}/availability", get(availability))
        .route("/trips/{trip}/seats", get(seat_map))
        .route("/trips/{trip}/seats/stream", get(seat_stream))
}

#[derive(Debug, Deserialize)]
pub struct ViewerQuery {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    trip: TripId,
    available: Vec<SeatNumber>,
}

async fn availability(
    State(state): State<AppState>,
    Path(trip): Path<TripId>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let available = state.holds.availability(trip, query.token.as_deref()).await?;
    Ok(Json(AvailabilityResponse { trip, available }))
}

#[derive(Debug, Serialize)]
pub struct SeatMapResponse {
    trip: TripId,
    seats: Vec<SeatView>,
}

async fn seat_map(
    State(state): State<AppState>,
    Path(trip): Path<TripId>,
    Query(query): Query<ViewerQuery>,
) -> Result<Json<SeatMapResponse>, AppError> {
    let seats = state.holds.seat_map(trip, query.token.as_deref()).await?;
    Ok(Json(SeatMapResponse { trip, seats }))
}

/// Live seat events for one trip. Lagged receivers skip what they missed
/// and keep streaming.
async fn seat_stream(
    State(state): State<AppState>,
    Path(trip): Path<TripId>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.sse_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |msg| async move {
        let event = msg.ok()?;
        if event.trip_id() != trip {
            return None;
        }
        match Event::default().event(event.name()).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                tracing::error!("Failed to encode seat event: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
