use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Seats were locked (or refreshed) for a checkout session.
///
/// The holder token is deliberately absent: these events are fanned out to
/// every client watching the trip.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct SeatsHeldEvent {
    pub trip_id: i64,
    pub seat_numbers: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub held_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct SeatsReleasedEvent {
    pub trip_id: i64,
    pub seat_numbers: Vec<String>,
    pub released_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub trip_id: i64,
    pub seat_numbers: Vec<String>,
    pub confirmed_at: i64,
}

/// Envelope for everything published about a trip's seats.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeatEvent {
    SeatsHeld(SeatsHeldEvent),
    SeatsReleased(SeatsReleasedEvent),
    BookingConfirmed(BookingConfirmedEvent),
}

impl SeatEvent {
    pub fn trip_id(&self) -> i64 {
        match self {
            SeatEvent::SeatsHeld(e) => e.trip_id,
            SeatEvent::SeatsReleased(e) => e.trip_id,
            SeatEvent::BookingConfirmed(e) => e.trip_id,
        }
    }

    /// Event-bus topic the event is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            SeatEvent::SeatsHeld(_) => "holds.created",
            SeatEvent::SeatsReleased(_) => "holds.released",
            SeatEvent::BookingConfirmed(_) => "booking.confirmed",
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            SeatEvent::SeatsHeld(_) => "seats_held",
            SeatEvent::SeatsReleased(_) => "seats_released",
            SeatEvent::BookingConfirmed(_) => "booking_confirmed",
        }
    }
}
