use coach_hold::SeatLockManager;
use coach_shared::SeatEvent;
use coach_store::app_config::RateLimitConfig;
use coach_store::RedisClient;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub holds: Arc<SeatLockManager>,
    /// Rate limiting is skipped when no Redis is configured.
    pub redis: Option<Arc<RedisClient>>,
    pub sse_tx: broadcast::Sender<SeatEvent>,
    pub metrics: Arc<Metrics>,
    pub rate_limit: RateLimitConfig,
}
