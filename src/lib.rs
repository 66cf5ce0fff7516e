use config::Config;
use std::sync::Arc;
use whitelist::WhitelistGate;

pub mod config;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod utils;

pub mod cleanup;
pub mod database;
pub mod debounce;
pub mod dispatch;
pub mod generator;
pub mod pipeline;
pub mod rate_limit;
pub mod transport;
pub mod usage;
pub mod whitelist;

/// 管理接口共享状态
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub whitelist: Arc<WhitelistGate>,
}
