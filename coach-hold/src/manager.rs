use chrono::{DateTime, Duration, Utc};
use coach_catalog::{plan_hold, HoldPlanError, SeatView, TripInventory};
use coach_core::{
    Booking, BookingLedger, Clock, CoreError, CoreResult, EventPublisher, NewBooking, NoopPublisher,
    SeatInventory, SeatLockRepository, SeatNumber, TripId,
};
use coach_shared::{BookingConfirmedEvent, SeatEvent, SeatsHeldEvent, SeatsReleasedEvent};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::models::{
    FinalizeRequest, HoldOutcome, HoldRequest, HoldSettings, ReleaseOutcome, ReleaseRequest,
};

/// Grants, refreshes, releases and finalizes seat holds.
///
/// Holds no state of its own: every decision is re-derived from the
/// inventory, the booking ledger and the lock table, so any number of
/// managers (in any number of processes) can share one store.
pub struct SeatLockManager {
    inventory: Arc<dyn SeatInventory>,
    ledger: Arc<dyn BookingLedger>,
    locks: Arc<dyn SeatLockRepository>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    settings: HoldSettings,
}

impl SeatLockManager {
    pub fn new(
        inventory: Arc<dyn SeatInventory>,
        ledger: Arc<dyn BookingLedger>,
        locks: Arc<dyn SeatLockRepository>,
        clock: Arc<dyn Clock>,
        settings: HoldSettings,
    ) -> Self {
        Self {
            inventory,
            ledger,
            locks,
            events: Arc::new(NoopPublisher),
            clock,
            settings,
        }
    }

    /// Builds a manager over a single store that serves all three roles.
    pub fn from_store<S>(store: Arc<S>, clock: Arc<dyn Clock>, settings: HoldSettings) -> Self
    where
        S: SeatInventory + BookingLedger + SeatLockRepository + 'static,
    {
        Self::new(store.clone(), store.clone(), store, clock, settings)
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    pub fn settings(&self) -> HoldSettings {
        self.settings
    }

    /// Seats of `trip_id` that `token` could hold right now.
    pub async fn availability(&self, trip_id: TripId, token: Option<&str>) -> CoreResult<Vec<SeatNumber>> {
        let now = self.clock.now();
        let inventory = self.snapshot(trip_id, now).await?;
        Ok(inventory.available_for(token, now))
    }

    pub async fn seat_map(&self, trip_id: TripId, token: Option<&str>) -> CoreResult<Vec<SeatView>> {
        let now = self.clock.now();
        let inventory = self.snapshot(trip_id, now).await?;
        Ok(inventory.seat_map(token, now))
    }

    /// Locks the requested (and auto-assigned) seats for `req.token`.
    ///
    /// All or nothing: either every planned seat is locked with a fresh
    /// `expires_at`, or nothing changes and the first unavailable seat is
    /// reported as a conflict.
    pub async fn hold(&self, req: HoldRequest) -> CoreResult<HoldOutcome> {
        let token = require_token(&req.token)?;
        if req.auto_assign < 0 {
            return Err(CoreError::ValidationError("auto_assign must not be negative".to_string()));
        }
        let ttl = req.ttl_seconds.unwrap_or(self.settings.default_ttl_seconds);
        if ttl <= 0 || ttl > self.settings.max_ttl_seconds {
            return Err(CoreError::ValidationError(format!(
                "ttl_seconds must be between 1 and {}",
                self.settings.max_ttl_seconds
            )));
        }

        let now = self.clock.now();
        let swept = self.locks.sweep_expired(now).await?;

        let inventory = self.snapshot(req.trip_id, now).await?;
        let available = inventory.available_for(Some(token), now);

        let auto_assign = usize::try_from(req.auto_assign).unwrap_or(usize::MAX);
        let planned = plan_hold(&available, &req.seats, auto_assign).map_err(
            |HoldPlanError::Unavailable(seat)| {
                warn!(trip_id = req.trip_id, seat = %seat, "Hold rejected, seat not available");
                CoreError::conflict(seat)
            },
        )?;

        let expires_at = now + Duration::seconds(ttl);
        if planned.is_empty() {
            return Ok(HoldOutcome { trip_id: req.trip_id, locked: planned, expires_at, swept });
        }

        // The availability read above is advisory; the store re-checks
        // every seat inside the write transaction.
        if let Err(err) = self
            .locks
            .upsert_locks(req.trip_id, token, &planned, now, expires_at)
            .await
        {
            if let CoreError::Conflict { seats } = &err {
                warn!(trip_id = req.trip_id, seats = ?seats, "Hold lost a race at commit time");
            }
            return Err(err);
        }

        info!(trip_id = req.trip_id, seats = ?planned, ttl, "Seats held");

        self.publish(SeatEvent::SeatsHeld(SeatsHeldEvent {
            trip_id: req.trip_id,
            seat_numbers: planned.clone(),
            expires_at,
            held_at: now.timestamp(),
        }))
        .await;

        Ok(HoldOutcome { trip_id: req.trip_id, locked: planned, expires_at, swept })
    }

    /// Drops the caller's own locks on `req.seats`. Seats the caller does
    /// not hold are ignored.
    pub async fn release(&self, req: ReleaseRequest) -> CoreResult<ReleaseOutcome> {
        let token = require_token(&req.token)?;
        if req.seats.is_empty() {
            return Err(CoreError::ValidationError("seats are required".to_string()));
        }

        let removed = self.locks.release(req.trip_id, token, &req.seats).await?;
        info!(trip_id = req.trip_id, requested = req.seats.len(), removed = removed.len(), "Seats released");

        if !removed.is_empty() {
            self.publish(SeatEvent::SeatsReleased(SeatsReleasedEvent {
                trip_id: req.trip_id,
                seat_numbers: removed.clone(),
                released_at: self.clock.now().timestamp(),
            }))
            .await;
        }

        Ok(ReleaseOutcome { released: req.seats, removed })
    }

    /// Deletes every expired lock. Safe to run at any time, from anywhere.
    pub async fn sweep(&self) -> CoreResult<u64> {
        let swept = self.locks.sweep_expired(self.clock.now()).await?;
        if swept > 0 {
            info!(swept, "Expired seat locks swept");
        }
        Ok(swept)
    }

    /// Turns the caller's live locks into a confirmed booking.
    pub async fn finalize(&self, req: FinalizeRequest) -> CoreResult<Booking> {
        let token = require_token(&req.token)?;
        if req.seats.is_empty() {
            return Err(CoreError::ValidationError("seats are required".to_string()));
        }
        if req.passenger.name.trim().is_empty() || req.passenger.phone.trim().is_empty() {
            return Err(CoreError::ValidationError("passenger name and phone are required".to_string()));
        }

        if self.inventory.trip_seats(req.trip_id).await?.is_none() {
            return Err(CoreError::trip_not_found(req.trip_id));
        }

        let mut seen = HashSet::new();
        let seat_numbers: Vec<SeatNumber> = req
            .seats
            .into_iter()
            .filter(|seat| seen.insert(seat.clone()))
            .collect();

        let now = self.clock.now();
        let booking = self
            .ledger
            .finalize(
                &NewBooking {
                    trip_id: req.trip_id,
                    holder_token: token.to_string().into(),
                    seat_numbers,
                    passenger: req.passenger,
                },
                now,
            )
            .await
            .map_err(|err| {
                if let CoreError::Conflict { seats } = &err {
                    warn!(trip_id = req.trip_id, seats = ?seats, "Finalization lost seats");
                }
                err
            })?;

        info!(booking_id = %booking.id, trip_id = booking.trip_id, seats = ?booking.seat_numbers, "Booking confirmed");

        self.publish(SeatEvent::BookingConfirmed(BookingConfirmedEvent {
            booking_id: booking.id,
            trip_id: booking.trip_id,
            seat_numbers: booking.seat_numbers.clone(),
            confirmed_at: booking.created_at.timestamp(),
        }))
        .await;

        Ok(booking)
    }

    async fn snapshot(&self, trip_id: TripId, now: DateTime<Utc>) -> CoreResult<TripInventory> {
        let seats = self
            .inventory
            .trip_seats(trip_id)
            .await?
            .ok_or_else(|| CoreError::trip_not_found(trip_id))?;
        let booked = self.ledger.booked_seats(trip_id).await?;
        let locks = self.locks.live_locks(trip_id, now).await?;
        Ok(TripInventory::new(trip_id, seats, booked, locks))
    }

    async fn publish(&self, event: SeatEvent) {
        if let Err(e) = self.events.publish(&event).await {
            error!(topic = event.topic(), trip_id = event.trip_id(), "Failed to publish seat event: {}", e);
        }
    }
}

/// Tokens are opaque: blank ones are refused, anything else is used as sent.
fn require_token(token: &str) -> CoreResult<&str> {
    if token.trim().is_empty() {
        return Err(CoreError::ValidationError("token is required".to_string()));
    }
    Ok(token)
}
