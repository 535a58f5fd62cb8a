use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coach_core::{
    Booking, BookingLedger, BookingStatus, CoreError, CoreResult, NewBooking, SeatNumber, TripId,
};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{contention_or_storage, is_unique_violation, storage_error};

pub struct PgBookingLedger {
    pool: PgPool,
}

impl PgBookingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct HeldSeatRow {
    seat_number: String,
    holder_token: String,
    expires_at: DateTime<Utc>,
    seat_id: i64,
}

#[async_trait]
impl BookingLedger for PgBookingLedger {
    async fn booked_seats(&self, trip_id: TripId) -> CoreResult<Vec<SeatNumber>> {
        sqlx::query_scalar(
            r#"
            SELECT s.seat_number
            FROM booking_seats bs
            JOIN seats s ON s.id = bs.seat_id
            WHERE bs.trip_id = $1
            "#,
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)
    }

    async fn finalize(&self, booking: &NewBooking, now: DateTime<Utc>) -> CoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let held = sqlx::query_as::<_, HeldSeatRow>(
            r#"
            SELECT s.seat_number, l.holder_token, l.expires_at, l.seat_id
            FROM seat_locks l
            JOIN seats s ON s.id = l.seat_id
            WHERE l.trip_id = $1 AND s.seat_number = ANY($2)
            FOR UPDATE OF l
            "#,
        )
        .bind(booking.trip_id)
        .bind(booking.seat_numbers.clone())
        .fetch_all(&mut *tx)
        .await
        .map_err(|err| contention_or_storage(err, &booking.seat_numbers))?;

        let lost: Vec<SeatNumber> = booking
            .seat_numbers
            .iter()
            .filter(|seat| {
                !held.iter().any(|row| {
                    &row.seat_number == *seat
                        && row.holder_token == *booking.holder_token
                        && row.expires_at > now
                })
            })
            .cloned()
            .collect();

        if !lost.is_empty() {
            warn!(trip_id = booking.trip_id, ?lost, "Finalization refused, locks lost");
            tx.rollback().await.map_err(storage_error)?;
            return Err(CoreError::Conflict { seats: lost });
        }

        let booking_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO bookings (id, trip_id, holder_token, passenger_name, passenger_phone, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(booking_id)
        .bind(booking.trip_id)
        .bind(booking.holder_token.as_str())
        .bind(&booking.passenger.name)
        .bind(booking.passenger.phone.as_str())
        .bind(BookingStatus::Confirmed.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        let seat_ids: Vec<i64> = held.iter().map(|row| row.seat_id).collect();
        for seat_id in &seat_ids {
            let inserted = sqlx::query(
                "INSERT INTO booking_seats (booking_id, trip_id, seat_id) VALUES ($1, $2, $3)",
            )
            .bind(booking_id)
            .bind(booking.trip_id)
            .bind(seat_id)
            .execute(&mut *tx)
            .await;

            if let Err(err) = inserted {
                if is_unique_violation(&err) {
                    let seat = held
                        .iter()
                        .find(|row| row.seat_id == *seat_id)
                        .map(|row| row.seat_number.clone())
                        .unwrap_or_default();
                    tx.rollback().await.map_err(storage_error)?;
                    return Err(CoreError::conflict(seat));
                }
                return Err(storage_error(err));
            }
        }

        sqlx::query("DELETE FROM seat_locks WHERE trip_id = $1 AND seat_id = ANY($2)")
            .bind(booking.trip_id)
            .bind(&seat_ids[..])
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        sqlx::query(
            "UPDATE trips SET available_seats = GREATEST(available_seats - $2, 0) WHERE id = $1",
        )
        .bind(booking.trip_id)
        .bind(seat_ids.len() as i32)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit()
            .await
            .map_err(|err| contention_or_storage(err, &booking.seat_numbers))?;
        info!(%booking_id, trip_id = booking.trip_id, seats = seat_ids.len(), "Booking confirmed");

        Ok(Booking {
            id: booking_id,
            trip_id: booking.trip_id,
            seat_numbers: booking.seat_numbers.clone(),
            passenger: booking.passenger.clone(),
            status: BookingStatus::Confirmed,
            created_at: now,
        })
    }
}
