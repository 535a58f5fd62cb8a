use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use coach_core::{Booking, BookingStatus, CoreError, Passenger, SeatNumber, TripId};
use coach_hold::FinalizeRequest;
use coach_shared::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::holds::{require_trip_and_token, SeatRef};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/bookings", post(create_booking))
}

#[derive(Debug, Deserialize)]
pub struct PassengerBody {
    name: Option<String>,
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BookingBody {
    trip: Option<TripId>,
    token: Option<String>,
    seats: Option<Vec<SeatRef>>,
    passenger: Option<PassengerBody>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    id: Uuid,
    trip: TripId,
    seats: Vec<SeatNumber>,
    passenger: Passenger,
    status: BookingStatus,
    created_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            trip: booking.trip_id,
            seats: booking.seat_numbers,
            passenger: booking.passenger,
            status: booking.status,
            created_at: booking.created_at,
        }
    }
}

async fn create_booking(
    State(state): State<AppState>,
    payload: Result<Json<BookingBody>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let Json(body) = payload?;
    let (trip, token) = require_trip_and_token(body.trip, body.token)?;

    let passenger = match body.passenger {
        Some(PassengerBody { name: Some(name), phone: Some(phone) }) => Passenger {
            name,
            phone: Masked(phone),
        },
        _ => {
            return Err(CoreError::ValidationError(
                "passenger name and phone are required".to_string(),
            )
            .into())
        }
    };

    let booking = state
        .holds
        .finalize(FinalizeRequest {
            trip_id: trip,
            token: Masked(token),
            seats: body
                .seats
                .unwrap_or_default()
                .into_iter()
                .map(SeatNumber::from)
                .collect(),
            passenger,
        })
        .await?;

    state.metrics.bookings_finalized.inc();

    Ok((StatusCode::CREATED, Json(booking.into())))
}
