use chrono::{DateTime, Utc};
use coach_core::{Passenger, SeatNumber, TripId};
use coach_shared::Masked;

pub const DEFAULT_HOLD_TTL_SECONDS: i64 = 300;
pub const MAX_HOLD_TTL_SECONDS: i64 = 3600;

/// Limits applied to hold requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldSettings {
    pub default_ttl_seconds: i64,
    pub max_ttl_seconds: i64,
}

impl Default for HoldSettings {
    fn default() -> Self {
        Self {
            default_ttl_seconds: DEFAULT_HOLD_TTL_SECONDS,
            max_ttl_seconds: MAX_HOLD_TTL_SECONDS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub trip_id: TripId,
    pub token: Masked<String>,
    /// Seats the customer picked on the seat map.
    pub seats: Vec<SeatNumber>,
    /// Extra seats to pick automatically, on top of `seats`.
    pub auto_assign: i64,
    pub ttl_seconds: Option<i64>,
}

impl HoldRequest {
    pub fn new(trip_id: TripId, token: impl Into<String>) -> Self {
        Self {
            trip_id,
            token: Masked(token.into()),
            seats: Vec::new(),
            auto_assign: 0,
            ttl_seconds: None,
        }
    }

    pub fn seats<I, S>(mut self, seats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SeatNumber>,
    {
        self.seats = seats.into_iter().map(Into::into).collect();
        self
    }

    pub fn auto_assign(mut self, count: i64) -> Self {
        self.auto_assign = count;
        self
    }

    pub fn ttl_seconds(mut self, ttl: i64) -> Self {
        self.ttl_seconds = Some(ttl);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoldOutcome {
    pub trip_id: TripId,
    /// Explicit seats in request order, then auto-assigned ones.
    pub locked: Vec<SeatNumber>,
    pub expires_at: DateTime<Utc>,
    /// Expired locks removed by the sweep that preceded this hold.
    pub swept: u64,
}

#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    pub trip_id: TripId,
    pub token: Masked<String>,
    pub seats: Vec<SeatNumber>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseOutcome {
    /// Echo of the requested seats.
    pub released: Vec<SeatNumber>,
    /// Seats whose lock actually went away.
    pub removed: Vec<SeatNumber>,
}

#[derive(Debug, Clone)]
pub struct FinalizeRequest {
    pub trip_id: TripId,
    pub token: Masked<String>,
    pub seats: Vec<SeatNumber>,
    pub passenger: Passenger,
}
