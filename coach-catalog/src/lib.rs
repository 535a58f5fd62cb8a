pub mod inventory;
pub mod ordering;

pub use inventory::{SeatStatus, SeatView, TripInventory};
pub use ordering::{natural_cmp, plan_hold, sort_seat_numbers, HoldPlanError};
