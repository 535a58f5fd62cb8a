pub mod manager;
pub mod models;

pub use manager::SeatLockManager;
pub use models::{
    FinalizeRequest, HoldOutcome, HoldRequest, HoldSettings, ReleaseOutcome, ReleaseRequest,
};
