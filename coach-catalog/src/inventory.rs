use chrono::{DateTime, Utc};
use coach_core::{Seat, SeatLock, SeatNumber, SeatType, TripId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::ordering::natural_cmp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Held,
    HeldByYou,
    Booked,
}

/// One row of a trip's seat map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeatView {
    pub seat_number: SeatNumber,
    pub seat_type: SeatType,
    pub status: SeatStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of a trip's seats: the bus inventory, the booking
/// ledger and the lock table, read separately and combined here.
///
/// Liveness is evaluated against the `now` passed to each query, so a
/// snapshot that still contains expired locks answers correctly.
#[derive(Debug, Clone)]
pub struct TripInventory {
    trip_id: TripId,
    seats: Vec<Seat>,
    booked: HashSet<SeatNumber>,
    locks: HashMap<SeatNumber, SeatLock>,
}

impl TripInventory {
    pub fn new(
        trip_id: TripId,
        mut seats: Vec<Seat>,
        booked: impl IntoIterator<Item = SeatNumber>,
        locks: impl IntoIterator<Item = SeatLock>,
    ) -> Self {
        seats.sort_by(|a, b| natural_cmp(&a.seat_number, &b.seat_number));
        Self {
            trip_id,
            seats,
            booked: booked.into_iter().collect(),
            locks: locks
                .into_iter()
                .map(|lock| (lock.seat_number.clone(), lock))
                .collect(),
        }
    }

    pub fn trip_id(&self) -> TripId {
        self.trip_id
    }

    /// Seats neither booked nor held live by someone other than `token`.
    /// With no token every live lock counts as foreign.
    pub fn available_for(&self, token: Option<&str>, now: DateTime<Utc>) -> Vec<SeatNumber> {
        self.seats
            .iter()
            .filter(|seat| {
                matches!(
                    self.status_of(&seat.seat_number, token, now),
                    SeatStatus::Available | SeatStatus::HeldByYou
                )
            })
            .map(|seat| seat.seat_number.clone())
            .collect()
    }

    pub fn status_of(&self, seat_number: &str, token: Option<&str>, now: DateTime<Utc>) -> SeatStatus {
        if self.booked.contains(seat_number) {
            return SeatStatus::Booked;
        }
        match self.locks.get(seat_number) {
            Some(lock) if lock.is_live(now) => match token {
                Some(token) if lock.is_held_by(token) => SeatStatus::HeldByYou,
                _ => SeatStatus::Held,
            },
            _ => SeatStatus::Available,
        }
    }

    pub fn seat_map(&self, token: Option<&str>, now: DateTime<Utc>) -> Vec<SeatView> {
        self.seats
            .iter()
            .map(|seat| {
                let status = self.status_of(&seat.seat_number, token, now);
                let expires_at = match status {
                    SeatStatus::HeldByYou => self.locks.get(&seat.seat_number).map(|l| l.expires_at),
                    _ => None,
                };
                SeatView {
                    seat_number: seat.seat_number.clone(),
                    seat_type: seat.seat_type,
                    status,
                    expires_at,
                }
            })
            .collect()
    }
}
