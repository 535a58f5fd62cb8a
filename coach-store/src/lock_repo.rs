use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coach_core::{CoreError, CoreResult, SeatLock, SeatLockRepository, SeatNumber, TripId};
use coach_shared::Masked;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::debug;

use crate::database::{contention_or_storage, storage_error};

pub struct PgSeatLockRepository {
    pool: PgPool,
}

impl PgSeatLockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct LockRow {
    trip_id: i64,
    seat_number: String,
    holder_token: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<LockRow> for SeatLock {
    fn from(row: LockRow) -> Self {
        SeatLock {
            trip_id: row.trip_id,
            seat_number: row.seat_number,
            holder_token: Masked(row.holder_token),
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UpsertedRow {
    trip_id: i64,
    holder_token: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

// Insert a fresh lock, or take over the existing row only when it belongs to
// the same token or has already expired. Zero rows back means the seat is
// unknown to the trip's bus or live under another token.
const UPSERT_LOCK: &str = r#"
    INSERT INTO seat_locks (trip_id, seat_id, holder_token, created_at, expires_at)
    SELECT t.id, s.id, $3, $4, $5
    FROM trips t
    JOIN seats s ON s.bus_id = t.bus_id
    WHERE t.id = $1 AND s.seat_number = $2
    ON CONFLICT (trip_id, seat_id) DO UPDATE SET
        holder_token = EXCLUDED.holder_token,
        created_at = CASE
            WHEN seat_locks.holder_token = EXCLUDED.holder_token AND seat_locks.expires_at > $4
            THEN seat_locks.created_at
            ELSE EXCLUDED.created_at
        END,
        expires_at = EXCLUDED.expires_at
    WHERE seat_locks.holder_token = EXCLUDED.holder_token OR seat_locks.expires_at <= $4
    RETURNING trip_id, holder_token, created_at, expires_at
"#;

#[async_trait]
impl SeatLockRepository for PgSeatLockRepository {
    async fn live_locks(&self, trip_id: TripId, now: DateTime<Utc>) -> CoreResult<Vec<SeatLock>> {
        let rows = sqlx::query_as::<_, LockRow>(
            r#"
            SELECT l.trip_id, s.seat_number, l.holder_token, l.created_at, l.expires_at
            FROM seat_locks l
            JOIN seats s ON s.id = l.seat_id
            WHERE l.trip_id = $1 AND l.expires_at > $2
            "#,
        )
        .bind(trip_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(rows.into_iter().map(SeatLock::from).collect())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM seat_locks WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(result.rows_affected())
    }

    async fn upsert_locks(
        &self,
        trip_id: TripId,
        token: &str,
        seats: &[SeatNumber],
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<Vec<SeatLock>> {
        // Rows are locked in one global order; overlapping holds queue
        // instead of deadlocking.
        let mut ordered: Vec<&SeatNumber> = seats.iter().collect();
        ordered.sort();
        ordered.dedup();

        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let mut written: HashMap<&SeatNumber, UpsertedRow> = HashMap::with_capacity(ordered.len());
        let mut refused: Vec<&SeatNumber> = Vec::new();

        for seat in ordered {
            let row = sqlx::query_as::<_, UpsertedRow>(UPSERT_LOCK)
                .bind(trip_id)
                .bind(seat.as_str())
                .bind(token)
                .bind(now)
                .bind(expires_at)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|err| contention_or_storage(err, std::slice::from_ref(seat)))?;

            match row {
                Some(row) => {
                    written.insert(seat, row);
                }
                None => refused.push(seat),
            }
        }

        // Report the first refused seat in request order.
        if let Some(seat) = seats.iter().find(|s| refused.contains(s)) {
            debug!(trip_id, seat = %seat, refused = refused.len(), "Seat lock refused");
            tx.rollback().await.map_err(storage_error)?;
            return Err(CoreError::conflict(seat.clone()));
        }

        // A booking committed after the caller's snapshot still wins.
        let booked: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT s.seat_number
            FROM booking_seats bs
            JOIN seats s ON s.id = bs.seat_id
            WHERE bs.trip_id = $1 AND s.seat_number = ANY($2)
            "#,
        )
        .bind(trip_id)
        .bind(seats.to_vec())
        .fetch_all(&mut *tx)
        .await
        .map_err(storage_error)?;

        if let Some(seat) = seats.iter().find(|s| booked.contains(s)) {
            tx.rollback().await.map_err(storage_error)?;
            return Err(CoreError::conflict(seat.clone()));
        }

        tx.commit()
            .await
            .map_err(|err| contention_or_storage(err, seats))?;

        let mut locks = Vec::with_capacity(written.len());
        for seat in seats {
            if let Some(row) = written.remove(seat) {
                locks.push(SeatLock {
                    trip_id: row.trip_id,
                    seat_number: seat.clone(),
                    holder_token: Masked(row.holder_token),
                    created_at: row.created_at,
                    expires_at: row.expires_at,
                });
            }
        }
        Ok(locks)
    }

    async fn release(
        &self,
        trip_id: TripId,
        token: &str,
        seats: &[SeatNumber],
    ) -> CoreResult<Vec<SeatNumber>> {
        let removed: Vec<String> = sqlx::query_scalar(
            r#"
            DELETE FROM seat_locks l
            USING seats s
            WHERE l.seat_id = s.id
              AND l.trip_id = $1
              AND l.holder_token = $2
              AND s.seat_number = ANY($3)
            RETURNING s.seat_number
            "#,
        )
        .bind(trip_id)
        .bind(token)
        .bind(seats.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        // Report in request order.
        Ok(seats.iter().filter(|s| removed.contains(s)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::PgPool;

    async fn seed(pool: &PgPool) -> i64 {
        let bus_id: i64 = sqlx::query_scalar(
            "INSERT INTO buses (bus_number, total_seats) VALUES ('B-1', 3) RETURNING id",
        )
        .fetch_one(pool)
        .await
        .unwrap();
        for seat in ["1", "2", "3"] {
            sqlx::query("INSERT INTO seats (bus_id, seat_number) VALUES ($1, $2)")
                .bind(bus_id)
                .bind(seat)
                .execute(pool)
                .await
                .unwrap();
        }
        sqlx::query_scalar(
            "INSERT INTO trips (bus_id, available_seats) VALUES ($1, 3) RETURNING id",
        )
        .bind(bus_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_foreign_live_lock_refuses_whole_request(pool: PgPool) {
        let trip = seed(&pool).await;
        let repo = PgSeatLockRepository::new(pool.clone());
        let now = Utc::now();
        let later = now + Duration::seconds(300);

        repo.upsert_locks(trip, "a", &["2".to_string()], now, later).await.unwrap();
        let err = repo
            .upsert_locks(trip, "b", &["1".to_string(), "2".to_string()], now, later)
            .await
            .unwrap_err();

        assert_eq!(err, CoreError::conflict("2"));
        let live = repo.live_locks(trip, now).await.unwrap();
        assert_eq!(live.len(), 1);
        assert!(live[0].is_held_by("a"));
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_unknown_seat_is_a_conflict(pool: PgPool) {
        let trip = seed(&pool).await;
        let repo = PgSeatLockRepository::new(pool);
        let now = Utc::now();

        let err = repo
            .upsert_locks(trip, "a", &["42".to_string()], now, now + Duration::seconds(60))
            .await
            .unwrap_err();

        assert_eq!(err, CoreError::conflict("42"));
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_sweep_and_takeover_of_expired_lock(pool: PgPool) {
        let trip = seed(&pool).await;
        let repo = PgSeatLockRepository::new(pool);
        let now = Utc::now();

        repo.upsert_locks(trip, "a", &["1".to_string()], now, now + Duration::seconds(5))
            .await
            .unwrap();
        let later = now + Duration::seconds(5);
        let taken = repo
            .upsert_locks(trip, "b", &["1".to_string()], later, later + Duration::seconds(60))
            .await
            .unwrap();
        assert!(taken[0].is_held_by("b"));

        let swept = repo.sweep_expired(later + Duration::seconds(60)).await.unwrap();
        assert_eq!(swept, 1);
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_release_only_removes_own_locks(pool: PgPool) {
        let trip = seed(&pool).await;
        let repo = PgSeatLockRepository::new(pool);
        let now = Utc::now();
        let later = now + Duration::seconds(300);

        repo.upsert_locks(trip, "a", &["1".to_string()], now, later).await.unwrap();
        repo.upsert_locks(trip, "b", &["2".to_string()], now, later).await.unwrap();

        let removed = repo
            .release(trip, "a", &["1".to_string(), "2".to_string()])
            .await
            .unwrap();

        assert_eq!(removed, vec!["1".to_string()]);
        assert_eq!(repo.live_locks(trip, now).await.unwrap().len(), 1);
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_concurrent_holds_have_one_winner(pool: PgPool) {
        let trip = seed(&pool).await;
        let repo = std::sync::Arc::new(PgSeatLockRepository::new(pool));
        let now = Utc::now();

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let token = format!("t{}", i);
                repo.upsert_locks(trip, &token, &["3".to_string()], now, now + Duration::seconds(60))
                    .await
            }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                granted += 1;
            }
        }
        assert_eq!(granted, 1);
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_conflict_names_first_seat_in_request_order(pool: PgPool) {
        let trip = seed(&pool).await;
        let repo = PgSeatLockRepository::new(pool);
        let now = Utc::now();
        let later = now + Duration::seconds(300);

        repo.upsert_locks(trip, "a", &["1".to_string(), "3".to_string()], now, later)
            .await
            .unwrap();
        let err = repo
            .upsert_locks(trip, "b", &["3".to_string(), "2".to_string(), "1".to_string()], now, later)
            .await
            .unwrap_err();

        assert_eq!(err, CoreError::conflict("3"));
        assert_eq!(repo.live_locks(trip, now).await.unwrap().len(), 2);
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_reversed_multi_seat_holds_have_one_winner(pool: PgPool) {
        let trip = seed(&pool).await;
        let repo = std::sync::Arc::new(PgSeatLockRepository::new(pool.clone()));
        let now = Utc::now();

        for _ in 0..10 {
            let barrier = std::sync::Arc::new(tokio::sync::Barrier::new(2));
            let mut handles = Vec::new();
            for (token, seats) in [("a", ["1", "2"]), ("b", ["2", "1"])] {
                let repo = repo.clone();
                let barrier = barrier.clone();
                handles.push(tokio::spawn(async move {
                    let seats: Vec<SeatNumber> = seats.iter().map(|s| s.to_string()).collect();
                    barrier.wait().await;
                    repo.upsert_locks(trip, token, &seats, now, now + Duration::seconds(60))
                        .await
                }));
            }

            let mut granted = 0;
            let mut conflicts = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(locks) => {
                        assert_eq!(locks.len(), 2);
                        granted += 1;
                    }
                    Err(CoreError::Conflict { .. }) => conflicts += 1,
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            assert_eq!((granted, conflicts), (1, 1));

            sqlx::query("DELETE FROM seat_locks").execute(&pool).await.unwrap();
        }
    }
}
