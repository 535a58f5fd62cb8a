pub mod clock;
pub mod events;
pub mod models;
pub mod repository;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventPublisher, NoopPublisher};
pub use models::{
    Booking, BookingStatus, NewBooking, Passenger, Seat, SeatLock, SeatNumber, SeatType, TripId,
};
pub use repository::{BookingLedger, SeatInventory, SeatLockRepository};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{}", conflict_message(.seats))]
    Conflict { seats: Vec<SeatNumber> },
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl CoreError {
    pub fn conflict(seat: impl Into<SeatNumber>) -> Self {
        CoreError::Conflict { seats: vec![seat.into()] }
    }

    pub fn trip_not_found(trip_id: TripId) -> Self {
        CoreError::NotFound(format!("Trip {}", trip_id))
    }
}

fn conflict_message(seats: &[SeatNumber]) -> String {
    match seats {
        [seat] => format!("Seat {} not available", seat),
        _ => format!("Seats {} not available", seats.join(", ")),
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
