use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Booking, NewBooking, Seat, SeatLock, SeatNumber, TripId};
use crate::CoreResult;

/// Read access to the fixed seat inventory of the bus operating a trip.
#[async_trait]
pub trait SeatInventory: Send + Sync {
    /// Every seat of the trip's bus, or `None` when the trip does not exist.
    async fn trip_seats(&self, trip_id: TripId) -> CoreResult<Option<Vec<Seat>>>;
}

/// Permanently committed seat assignments.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    async fn booked_seats(&self, trip_id: TripId) -> CoreResult<Vec<SeatNumber>>;

    /// Converts live locks into a booking as one unit of work.
    ///
    /// Every seat in `booking.seat_numbers` must carry a lock owned by
    /// `booking.holder_token` that is live at `now`. Otherwise nothing is
    /// written and `CoreError::Conflict` lists the lost seats.
    async fn finalize(&self, booking: &NewBooking, now: DateTime<Utc>) -> CoreResult<Booking>;
}

/// The shared lock table. Implementations must be safe to call from many
/// processes at once; the (trip, seat) uniqueness is the serialization point.
#[async_trait]
pub trait SeatLockRepository: Send + Sync {
    /// Locks on `trip_id` with `expires_at > now`.
    async fn live_locks(&self, trip_id: TripId, now: DateTime<Utc>) -> CoreResult<Vec<SeatLock>>;

    /// Deletes every lock with `expires_at <= now`, whoever owns it.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> CoreResult<u64>;

    /// Creates or refreshes one lock per seat for `token`, all or nothing.
    ///
    /// Re-validates at write time: a seat with a live lock owned by another
    /// token, or a booking, fails the whole call with `CoreError::Conflict`
    /// naming that seat.
    async fn upsert_locks(
        &self,
        trip_id: TripId,
        token: &str,
        seats: &[SeatNumber],
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<Vec<SeatLock>>;

    /// Deletes the locks on `seats` owned by `token` and returns the seats
    /// whose lock was actually removed.
    async fn release(
        &self,
        trip_id: TripId,
        token: &str,
        seats: &[SeatNumber],
    ) -> CoreResult<Vec<SeatNumber>>;
}
