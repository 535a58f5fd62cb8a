use chrono::{DateTime, Utc};
use coach_shared::Masked;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type TripId = i64;

/// Seat number as printed on the bus, unique within that bus.
pub type SeatNumber = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatType {
    Window,
    Aisle,
    Middle,
}

impl SeatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatType::Window => "WINDOW",
            SeatType::Aisle => "AISLE",
            SeatType::Middle => "MIDDLE",
        }
    }
}

impl fmt::Display for SeatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WINDOW" => Ok(SeatType::Window),
            "AISLE" => Ok(SeatType::Aisle),
            "MIDDLE" => Ok(SeatType::Middle),
            other => Err(format!("unknown seat type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub seat_number: SeatNumber,
    pub seat_type: SeatType,
}

impl Seat {
    pub fn new(seat_number: impl Into<SeatNumber>, seat_type: SeatType) -> Self {
        Self { seat_number: seat_number.into(), seat_type }
    }
}

/// A time-bounded claim on one seat of one trip.
///
/// There is no status column: a lock is live exactly while
/// `expires_at > now`.
#[derive(Debug, Clone, PartialEq)]
pub struct SeatLock {
    pub trip_id: TripId,
    pub seat_number: SeatNumber,
    pub holder_token: Masked<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SeatLock {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn is_held_by(&self, token: &str) -> bool {
        self.holder_token.as_str() == token
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    pub name: String,
    pub phone: Masked<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "CONFIRMED",
        }
    }
}

/// Input to finalization: the seats `holder_token` currently holds and wants
/// to turn into a permanent booking.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub trip_id: TripId,
    pub holder_token: Masked<String>,
    pub seat_numbers: Vec<SeatNumber>,
    pub passenger: Passenger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booking {
    pub id: Uuid,
    pub trip_id: TripId,
    pub seat_numbers: Vec<SeatNumber>,
    pub passenger: Passenger,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_lock_liveness_is_strict() {
        let now = Utc::now();
        let lock = SeatLock {
            trip_id: 1,
            seat_number: "4".to_string(),
            holder_token: Masked("a".to_string()),
            created_at: now - Duration::seconds(300),
            expires_at: now,
        };

        // expires_at == now is already expired
        assert!(!lock.is_live(now));
        assert!(lock.is_live(now - Duration::seconds(1)));
        assert!(lock.is_held_by("a"));
        assert!(!lock.is_held_by("b"));
    }

    #[test]
    fn test_seat_type_parsing() {
        assert_eq!("window".parse::<SeatType>().unwrap(), SeatType::Window);
        assert_eq!(SeatType::Aisle.to_string(), "AISLE");
        assert!("bunk".parse::<SeatType>().is_err());
    }
}
