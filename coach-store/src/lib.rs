pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod events;
pub mod lock_repo;
pub mod memory_repo;
pub mod redis_repo;
pub mod trip_repo;

pub use app_config::Config;
pub use booking_repo::PgBookingLedger;
pub use database::DbClient;
pub use events::EventProducer;
pub use lock_repo::PgSeatLockRepository;
pub use memory_repo::MemoryStore;
pub use redis_repo::RedisClient;
pub use trip_repo::PgSeatInventory;
