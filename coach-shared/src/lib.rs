pub mod models;
pub mod pii;

pub use models::events::{BookingConfirmedEvent, SeatEvent, SeatsHeldEvent, SeatsReleasedEvent};
pub use pii::Masked;
