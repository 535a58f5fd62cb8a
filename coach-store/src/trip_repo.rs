use async_trait::async_trait;
use coach_core::{CoreError, CoreResult, Seat, SeatInventory, SeatType, TripId};
use sqlx::PgPool;

use crate::database::storage_error;

pub struct PgSeatInventory {
    pool: PgPool,
}

impl PgSeatInventory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    seat_number: String,
    seat_type: String,
}

impl TryFrom<SeatRow> for Seat {
    type Error = CoreError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        let seat_type: SeatType = row.seat_type.parse().map_err(CoreError::StorageError)?;
        Ok(Seat::new(row.seat_number, seat_type))
    }
}

#[async_trait]
impl SeatInventory for PgSeatInventory {
    async fn trip_seats(&self, trip_id: TripId) -> CoreResult<Option<Vec<Seat>>> {
        let bus_id: Option<i64> = sqlx::query_scalar("SELECT bus_id FROM trips WHERE id = $1")
            .bind(trip_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        let Some(bus_id) = bus_id else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, SeatRow>(
            "SELECT seat_number, seat_type FROM seats WHERE bus_id = $1 ORDER BY id",
        )
        .bind(bus_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.into_iter()
            .map(Seat::try_from)
            .collect::<CoreResult<Vec<_>>>()
            .map(Some)
    }
}
