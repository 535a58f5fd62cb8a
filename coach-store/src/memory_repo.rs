use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coach_core::{
    Booking, BookingLedger, BookingStatus, CoreError, CoreResult, NewBooking, Seat, SeatInventory,
    SeatLock, SeatLockRepository, SeatNumber, TripId,
};
use coach_shared::Masked;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

struct TripRow {
    seats: Vec<Seat>,
    available_seats: i32,
}

#[derive(Default)]
struct Tables {
    trips: HashMap<TripId, TripRow>,
    bookings: HashMap<Uuid, Booking>,
    booking_seats: HashMap<(TripId, SeatNumber), Uuid>,
    locks: HashMap<(TripId, SeatNumber), SeatLock>,
}

/// Single-process store with the same contract as the Postgres
/// repositories. Every call runs under one mutex, which stands in for the
/// transaction and the (trip, seat) unique constraints.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a trip whose bus carries `seats`.
    pub async fn seed_trip(&self, trip_id: TripId, seats: Vec<Seat>) {
        let mut tables = self.tables.lock().await;
        let available_seats = seats.len() as i32;
        tables.trips.insert(trip_id, TripRow { seats, available_seats });
    }

    /// Number of lock rows, expired ones included.
    pub async fn lock_count(&self) -> usize {
        self.tables.lock().await.locks.len()
    }

    /// The trip's informational seat counter.
    pub async fn available_seats(&self, trip_id: TripId) -> Option<i32> {
        self.tables.lock().await.trips.get(&trip_id).map(|t| t.available_seats)
    }

    pub async fn booking(&self, id: Uuid) -> Option<Booking> {
        self.tables.lock().await.bookings.get(&id).cloned()
    }
}

fn has_seat(tables: &Tables, trip_id: TripId, seat: &str) -> bool {
    tables
        .trips
        .get(&trip_id)
        .map(|t| t.seats.iter().any(|s| s.seat_number == seat))
        .unwrap_or(false)
}

#[async_trait]
impl SeatInventory for MemoryStore {
    async fn trip_seats(&self, trip_id: TripId) -> CoreResult<Option<Vec<Seat>>> {
        let tables = self.tables.lock().await;
        Ok(tables.trips.get(&trip_id).map(|t| t.seats.clone()))
    }
}

#[async_trait]
impl BookingLedger for MemoryStore {
    async fn booked_seats(&self, trip_id: TripId) -> CoreResult<Vec<SeatNumber>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .booking_seats
            .keys()
            .filter(|(trip, _)| *trip == trip_id)
            .map(|(_, seat)| seat.clone())
            .collect())
    }

    async fn finalize(&self, booking: &NewBooking, now: DateTime<Utc>) -> CoreResult<Booking> {
        let mut tables = self.tables.lock().await;

        let lost: Vec<SeatNumber> = booking
            .seat_numbers
            .iter()
            .filter(|seat| {
                match tables.locks.get(&(booking.trip_id, (*seat).clone())) {
                    Some(lock) => !(lock.is_live(now) && lock.is_held_by(&booking.holder_token)),
                    None => true,
                }
            })
            .cloned()
            .collect();
        if !lost.is_empty() {
            return Err(CoreError::Conflict { seats: lost });
        }

        let confirmed = Booking {
            id: Uuid::new_v4(),
            trip_id: booking.trip_id,
            seat_numbers: booking.seat_numbers.clone(),
            passenger: booking.passenger.clone(),
            status: BookingStatus::Confirmed,
            created_at: now,
        };

        for seat in &booking.seat_numbers {
            let key = (booking.trip_id, seat.clone());
            tables.locks.remove(&key);
            tables.booking_seats.insert(key, confirmed.id);
        }
        if let Some(trip) = tables.trips.get_mut(&booking.trip_id) {
            trip.available_seats = (trip.available_seats - booking.seat_numbers.len() as i32).max(0);
        }
        tables.bookings.insert(confirmed.id, confirmed.clone());

        Ok(confirmed)
    }
}

#[async_trait]
impl SeatLockRepository for MemoryStore {
    async fn live_locks(&self, trip_id: TripId, now: DateTime<Utc>) -> CoreResult<Vec<SeatLock>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .locks
            .values()
            .filter(|lock| lock.trip_id == trip_id && lock.is_live(now))
            .cloned()
            .collect())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.locks.len();
        tables.locks.retain(|_, lock| lock.is_live(now));
        Ok((before - tables.locks.len()) as u64)
    }

    async fn upsert_locks(
        &self,
        trip_id: TripId,
        token: &str,
        seats: &[SeatNumber],
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<Vec<SeatLock>> {
        let mut tables = self.tables.lock().await;

        // Validate every seat before writing any of them.
        for seat in seats {
            let key = (trip_id, seat.clone());
            if !has_seat(&tables, trip_id, seat) || tables.booking_seats.contains_key(&key) {
                return Err(CoreError::conflict(seat.clone()));
            }
            if let Some(lock) = tables.locks.get(&key) {
                if lock.is_live(now) && !lock.is_held_by(token) {
                    return Err(CoreError::conflict(seat.clone()));
                }
            }
        }

        let mut written = Vec::with_capacity(seats.len());
        for seat in seats {
            let key = (trip_id, seat.clone());
            let created_at = match tables.locks.get(&key) {
                Some(lock) if lock.is_live(now) && lock.is_held_by(token) => lock.created_at,
                _ => now,
            };
            let lock = SeatLock {
                trip_id,
                seat_number: seat.clone(),
                holder_token: Masked(token.to_string()),
                created_at,
                expires_at,
            };
            tables.locks.insert(key, lock.clone());
            written.push(lock);
        }

        Ok(written)
    }

    async fn release(
        &self,
        trip_id: TripId,
        token: &str,
        seats: &[SeatNumber],
    ) -> CoreResult<Vec<SeatNumber>> {
        let mut tables = self.tables.lock().await;
        let mut removed = Vec::new();
        for seat in seats {
            let key = (trip_id, seat.clone());
            let owned = tables.locks.get(&key).map(|l| l.is_held_by(token)).unwrap_or(false);
            if owned {
                tables.locks.remove(&key);
                removed.push(seat.clone());
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use coach_core::{Passenger, SeatType};

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .seed_trip(1, vec![Seat::new("1", SeatType::Window), Seat::new("2", SeatType::Aisle)])
            .await;
        store
    }

    #[tokio::test]
    async fn test_upsert_is_all_or_nothing() {
        let store = store().await;
        let now = Utc::now();
        let later = now + Duration::seconds(300);

        store.upsert_locks(1, "a", &["2".to_string()], now, later).await.unwrap();
        let err = store
            .upsert_locks(1, "b", &["1".to_string(), "2".to_string()], now, later)
            .await
            .unwrap_err();

        assert_eq!(err, CoreError::conflict("2"));
        assert_eq!(store.lock_count().await, 1);
    }

    #[tokio::test]
    async fn test_refresh_keeps_created_at() {
        let store = store().await;
        let now = Utc::now();

        let first = store
            .upsert_locks(1, "a", &["1".to_string()], now, now + Duration::seconds(60))
            .await
            .unwrap();
        let later = now + Duration::seconds(30);
        let second = store
            .upsert_locks(1, "a", &["1".to_string()], later, later + Duration::seconds(60))
            .await
            .unwrap();

        assert_eq!(second[0].created_at, first[0].created_at);
        assert_eq!(second[0].expires_at, later + Duration::seconds(60));
    }

    #[tokio::test]
    async fn test_expired_foreign_lock_can_be_taken_over() {
        let store = store().await;
        let now = Utc::now();

        store
            .upsert_locks(1, "a", &["1".to_string()], now, now + Duration::seconds(10))
            .await
            .unwrap();
        let later = now + Duration::seconds(10);
        let taken = store
            .upsert_locks(1, "b", &["1".to_string()], later, later + Duration::seconds(10))
            .await
            .unwrap();

        assert!(taken[0].is_held_by("b"));
        assert_eq!(taken[0].created_at, later);
    }

    #[tokio::test]
    async fn test_finalize_moves_locks_to_bookings() {
        let store = store().await;
        let now = Utc::now();
        store
            .upsert_locks(1, "a", &["1".to_string()], now, now + Duration::seconds(60))
            .await
            .unwrap();

        let booking = store
            .finalize(
                &NewBooking {
                    trip_id: 1,
                    holder_token: Masked("a".to_string()),
                    seat_numbers: vec!["1".to_string()],
                    passenger: Passenger { name: "Bold".to_string(), phone: Masked("1".to_string()) },
                },
                now,
            )
            .await
            .unwrap();

        assert_eq!(store.lock_count().await, 0);
        assert_eq!(store.booked_seats(1).await.unwrap(), vec!["1".to_string()]);
        assert_eq!(store.available_seats(1).await, Some(1));
        assert_eq!(store.booking(booking.id).await.unwrap().status, BookingStatus::Confirmed);
    }
}
