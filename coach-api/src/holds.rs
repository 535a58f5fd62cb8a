use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use coach_core::{CoreError, SeatNumber, TripId};
use coach_hold::{HoldRequest, ReleaseRequest};
use coach_shared::Masked;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/holds", post(create_hold))
        .route("/holds/release", post(release_hold))
        .route("/holds/sweep", post(sweep_holds))
}

/// Seat numbers arrive as strings, but clients that number seats with
/// plain integers may send those.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SeatRef {
    Text(String),
    Number(i64),
}

impl From<SeatRef> for SeatNumber {
    fn from(seat: SeatRef) -> Self {
        match seat {
            SeatRef::Text(s) => s,
            SeatRef::Number(n) => n.to_string(),
        }
    }
}

/// Pulls the two fields every hold-family request needs. Both are optional
/// in the body so that their absence reads as a 400, not a 422.
pub(crate) fn require_trip_and_token(
    trip: Option<TripId>,
    token: Option<String>,
) -> Result<(TripId, String), AppError> {
    match (trip, token) {
        (Some(trip), Some(token)) => Ok((trip, token)),
        _ => Err(CoreError::ValidationError("trip and token are required".to_string()).into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct HoldBody {
    trip: Option<TripId>,
    token: Option<String>,
    seats: Option<Vec<SeatRef>>,
    auto_assign: Option<i64>,
    ttl_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HoldResponse {
    trip: TripId,
    locked: Vec<SeatNumber>,
    expires_at: DateTime<Utc>,
}

async fn create_hold(
    State(state): State<AppState>,
    payload: Result<Json<HoldBody>, JsonRejection>,
) -> Result<Json<HoldResponse>, AppError> {
    let Json(body) = payload?;
    let (trip, token) = require_trip_and_token(body.trip, body.token)?;

    let mut req = HoldRequest::new(trip, token)
        .seats(body.seats.unwrap_or_default())
        .auto_assign(body.auto_assign.unwrap_or(0));
    if let Some(ttl) = body.ttl_seconds {
        req = req.ttl_seconds(ttl);
    }

    let outcome = match state.holds.hold(req).await {
        Ok(outcome) => outcome,
        Err(err) => {
            if matches!(err, CoreError::Conflict { .. }) {
                state.metrics.hold_conflicts.inc();
            }
            return Err(err.into());
        }
    };

    state.metrics.locks_swept.inc_by(outcome.swept);
    if !outcome.locked.is_empty() {
        state.metrics.holds_granted.inc();
    }

    Ok(Json(HoldResponse {
        trip: outcome.trip_id,
        locked: outcome.locked,
        expires_at: outcome.expires_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ReleaseBody {
    trip: Option<TripId>,
    token: Option<String>,
    seats: Option<Vec<SeatRef>>,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    released: Vec<SeatNumber>,
}

async fn release_hold(
    State(state): State<AppState>,
    payload: Result<Json<ReleaseBody>, JsonRejection>,
) -> Result<Json<ReleaseResponse>, AppError> {
    let Json(body) = payload?;
    let (trip, token) = require_trip_and_token(body.trip, body.token)?;

    let outcome = state
        .holds
        .release(ReleaseRequest {
            trip_id: trip,
            token: Masked(token),
            seats: body
                .seats
                .unwrap_or_default()
                .into_iter()
                .map(SeatNumber::from)
                .collect(),
        })
        .await?;

    state.metrics.seats_released.inc_by(outcome.removed.len() as u64);

    Ok(Json(ReleaseResponse { released: outcome.released }))
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    swept: u64,
}

async fn sweep_holds(State(state): State<AppState>) -> Result<Json<SweepResponse>, AppError> {
    let swept = state.holds.sweep().await?;
    state.metrics.locks_swept.inc_by(swept);
    Ok(Json(SweepResponse { swept }))
}
